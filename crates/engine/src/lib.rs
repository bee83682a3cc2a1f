//! Clip detection and build engine.
//!
//! Turns stored comments and live chat into per-channel clip lists and
//! republishes them only when their content changed.

pub mod aggregate;
pub mod autodetect;
pub mod build;
pub mod clips;
pub mod merge;
pub mod publish;
pub mod store;
pub mod timecode;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use build::{build, BuildOptions, BuildSummary, ChannelReport, ChannelStatus};
pub use clips::Clip;
pub use publish::PublishOutcome;
pub use timecode::{duration_to_seconds, parse_time_ranges};
pub use types::{ChannelEntry, CommentRef, MergedRange, RangeEnd, RawTimeRange, VideoEntry};
