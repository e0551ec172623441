//! Rotacast - post a rotating set of text files to the social web
//!
//! Each cycle picks one not-yet-posted file from a content directory,
//! formats it under a length budget, publishes it and records it in a
//! history ledger so it is never posted twice.

pub mod config;
pub mod content;
pub mod error;
pub mod format;
pub mod ledger;
pub mod logging;
pub mod platforms;
pub mod rotator;
pub mod scheduling;
pub mod selector;

// Re-export commonly used types
pub use config::Config;
pub use content::{ContentItem, ContentStore};
pub use error::{PlatformError, Result, RotacastError};
pub use format::{FormattedPost, Formatter};
pub use ledger::Ledger;
pub use rotator::{CycleOutcome, CycleStats, FailureStage, Rotator};
pub use scheduling::Schedule;
pub use selector::Selector;
