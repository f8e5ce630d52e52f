//! media-sync library: provider adapters, result disambiguation and Notion sync.

pub mod config;
pub mod dates;
pub mod error;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod notion;
pub mod progress;
pub mod providers;
pub mod scoring;
pub mod similarity;
pub mod sync;

pub use error::{Result, SyncError};
pub use models::{Candidate, MediaRecord, MediaType, PopularitySignal, Target};
pub use scoring::{select_best, DateCap, ScoringPolicy, ScoringWeights};
