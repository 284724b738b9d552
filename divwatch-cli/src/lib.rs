pub mod app;
pub mod coordinator;
pub mod reconcile;
pub mod telemetry;

pub use app::run as run_app;
