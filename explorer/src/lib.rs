//! Opening-statistics lookups for the Database move source.
//!
//! [`OpeningDatabase`] is the seam the session talks to; [`LichessExplorer`]
//! is the real implementation and `MockOpeningDatabase` (feature `mock`)
//! a scripted one for tests.

pub mod cache;
pub mod error;
pub mod filters;
pub mod lichess;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod traits;

pub use error::{ExplorerError, ExplorerResult};
pub use filters::QueryFilters;
pub use lichess::{LichessExplorer, DEFAULT_EXPLORER_URL};
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockCall, MockOpeningDatabase};
pub use traits::{to_candidates, DatabaseMove, OpeningDatabase};
