//! A chess opponent that plays from an opening repertoire first, an
//! opening database second and a UCI engine last.

pub mod arbiter;
pub mod config;
pub mod ledger;
pub mod session;

pub use arbiter::{MoveSource, MoveSourceArbiter};
pub use ledger::{HistoryLedger, LedgerEntry, LedgerError, Navigation};
pub use session::{
    spawn_session, MoveRecord, SessionError, SessionEvent, SessionHandle, SessionOptions,
    SessionSnapshot,
};
