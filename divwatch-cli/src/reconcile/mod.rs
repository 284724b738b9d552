pub mod diff;
pub mod handlers;

pub use diff::{change_ratio, AlertDecision, Reconciliation, ReconciliationEngine};
pub use handlers::alert_message;
