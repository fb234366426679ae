// Admin back office: override mutations, bulk schedule edits, live events.
// Every mutation is audited to admin_actions and broadcast on the EventBus.

pub mod handlers;
pub mod privileges;
