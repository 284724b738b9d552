//! Core domain types shared by every divwatch crate.

mod event;
mod history;
mod state;
mod ticker;

pub use event::EventRecord;
pub use history::EntityHistory;
pub use state::PersistedState;
pub use ticker::Ticker;
