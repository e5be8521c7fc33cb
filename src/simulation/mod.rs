//! Patient simulation - scripted cases and the session store behind them.

pub mod cases;
pub mod fixture;
pub mod reaper;
pub mod session;
pub mod store;


pub use fixture::{Case, CaseCatalog, CaseFixture, CaseInfo, ResponseRule};
pub use reaper::spawn_reaper;
pub use session::{Actor, Session, SessionStatus, SessionSummary, SummaryRecord, TranscriptEntry};
pub use store::{Exchange, InMemorySessionStore, SessionStore, StoreError};
