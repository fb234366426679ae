pub mod account;
pub mod schedule;
