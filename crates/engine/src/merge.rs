//! Range merging: sorted, coalesced, non-overlapping ranges per video.

use clipper_core::BuildSettings;

use crate::types::{MergedRange, RangeEnd, TimeRangeEntry};

/// Knobs of the merge pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSettings {
    /// Ranges starting within this many seconds of each other are coalesced
    pub adjust_start_time_span: u64,
    /// Length given to a range whose end is still unknown
    pub default_clip_duration: u64,
}

impl From<&BuildSettings> for MergeSettings {
    fn from(settings: &BuildSettings) -> Self {
        Self {
            adjust_start_time_span: settings.adjust_start_time_span,
            default_clip_duration: settings.default_clip_duration,
        }
    }
}

/// Merge one video's ranges.
///
/// 1. sort by start;
/// 2. coalesce neighbours whose starts are within `adjust_start_time_span`,
///    keeping the later end and the union of comments;
/// 3. resolve unknown ends to `start + default_clip_duration`, capped at the
///    video duration;
/// 4. truncate any range that runs into its successor.
///
/// Running it again on its own output changes nothing.
pub fn merge_ranges(
    mut ranges: Vec<TimeRangeEntry>,
    settings: &MergeSettings,
    video_duration: u64,
) -> Vec<MergedRange> {
    ranges.sort_by_key(|range| range.start);

    let mut ranges = coalesce(ranges, settings.adjust_start_time_span);

    let mut merged: Vec<MergedRange> = ranges
        .drain(..)
        .map(|range| MergedRange {
            end: resolve_end(range.start, range.end, settings, video_duration),
            start: range.start,
            comments: range.comments,
        })
        .collect();

    for i in 1..merged.len() {
        let next_start = merged[i].start;
        let previous = &mut merged[i - 1];
        if previous.end > next_start {
            previous.end = next_start;
        }
    }

    merged
}

/// Fold each range into its predecessor while their starts are close.
///
/// Input is sorted and a fold keeps the predecessor's start, so one forward
/// pass reaches the fixed point.
fn coalesce(ranges: Vec<TimeRangeEntry>, span: u64) -> Vec<TimeRangeEntry> {
    let mut coalesced: Vec<TimeRangeEntry> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match coalesced.last_mut() {
            Some(previous) if previous.start.saturating_add(span) >= range.start => {
                previous.end = previous.end.later(range.end);
                previous.comments.union(range.comments);
            }
            _ => coalesced.push(range),
        }
    }
    coalesced
}

fn resolve_end(start: u64, end: RangeEnd, settings: &MergeSettings, video_duration: u64) -> u64 {
    match end {
        RangeEnd::At(end) => end,
        RangeEnd::Unknown => start
            .saturating_add(settings.default_clip_duration)
            .min(video_duration)
            .max(start),
    }
}
