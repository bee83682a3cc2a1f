//! Range aggregation: comments → per-video candidate ranges.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::merge::{merge_ranges, MergeSettings};
use crate::store::{ChannelRow, CommentRow, VideoRow};
use crate::timecode::{duration_to_seconds, parse_time_ranges};
use crate::types::{
    parse_timestamp, ChannelEntry, CommentRef, RawTimeRange, TimeRangeEntry, VideoEntry,
};

/// Candidate ranges collected for one video.
#[derive(Debug, Clone)]
pub struct VideoCandidates {
    pub video_id: String,
    pub title: String,
    pub twitter_handle: String,
    /// Video length in seconds
    pub duration: u64,
    pub last_update: DateTime<Utc>,
    pub ranges: Vec<TimeRangeEntry>,
}

impl VideoCandidates {
    /// Add a range, folding it into an existing entry with the same bounds.
    pub fn add_range(&mut self, entry: TimeRangeEntry) {
        match self
            .ranges
            .iter_mut()
            .find(|existing| existing.start == entry.start && existing.end == entry.end)
        {
            Some(existing) => existing.comments.union(entry.comments),
            None => self.ranges.push(entry),
        }
    }

    pub(crate) fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.last_update {
            self.last_update = at;
        }
    }
}

/// Fold state for one channel: videos in first-seen order, indexed by id.
#[derive(Debug, Default)]
pub struct ChannelAccumulator {
    videos: Vec<VideoCandidates>,
    index: HashMap<String, usize>,
}

impl ChannelAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The entry for `video`, created with `first_update` when missing.
    pub fn video_mut(
        &mut self,
        video: &VideoRow,
        twitter_handle: &str,
        first_update: DateTime<Utc>,
    ) -> &mut VideoCandidates {
        let idx = match self.index.get(&video.video_id) {
            Some(&idx) => idx,
            None => {
                self.videos.push(VideoCandidates {
                    video_id: video.video_id.clone(),
                    title: video.title.clone(),
                    twitter_handle: twitter_handle.to_string(),
                    duration: duration_to_seconds(&video.duration),
                    last_update: first_update,
                    ranges: Vec::new(),
                });
                let idx = self.videos.len() - 1;
                self.index.insert(video.video_id.clone(), idx);
                idx
            }
        };
        &mut self.videos[idx]
    }

    pub fn videos(&self) -> &[VideoCandidates] {
        &self.videos
    }

    /// Sort videos newest first, merge every video's ranges and freeze.
    pub fn into_channel_entry(self, channel_id: &str, settings: &MergeSettings) -> ChannelEntry {
        let mut videos: Vec<VideoEntry> = self
            .videos
            .into_iter()
            .map(|video| VideoEntry {
                ranges: merge_ranges(video.ranges, settings, video.duration),
                video_id: video.video_id,
                title: video.title,
                last_update: video.last_update,
                twitter_handle: video.twitter_handle,
            })
            .collect();

        // stable: equal timestamps keep first-seen order
        videos.sort_by(|a, b| b.last_update.cmp(&a.last_update));

        ChannelEntry {
            channel_id: channel_id.to_string(),
            videos,
        }
    }
}

/// Clamp both bounds into `[0, duration]`.
pub fn clamp_range(range: RawTimeRange, duration: u64) -> RawTimeRange {
    if range.start > duration {
        tracing::debug!(
            "time range start over duration (start = {}, duration = {})",
            range.start,
            duration
        );
    }
    RawTimeRange {
        start: range.start.min(duration),
        end: range.end.clamp_to(duration),
    }
}

/// Fold a channel's comments into the accumulator.
///
/// `videos` maps every video id the comments reference to its row; comments
/// whose video is missing or not embeddable are skipped.
pub fn collect_comment_ranges(
    mut acc: ChannelAccumulator,
    channel: &ChannelRow,
    comments: &[CommentRow],
    videos: &HashMap<String, VideoRow>,
    max_duration: u64,
) -> ChannelAccumulator {
    for comment in comments {
        let video = match videos.get(&comment.video_id) {
            Some(video) => video,
            None => {
                tracing::debug!(
                    "skip comment not found video (videoId = {}, commentId = {})",
                    comment.video_id,
                    comment.comment_id
                );
                continue;
            }
        };
        if !video.embeddable {
            tracing::debug!(
                "skip comment because unembeddable video (videoId = {}, commentId = {})",
                comment.video_id,
                comment.comment_id
            );
            continue;
        }

        let ranges = parse_time_ranges(&comment.text_original, max_duration);
        if ranges.is_empty() {
            continue;
        }

        let updated_at = parse_timestamp(&comment.updated_at);
        let entry = acc.video_mut(video, &channel.twitter_handle, updated_at);
        entry.touch(updated_at);

        for range in ranges {
            let range = clamp_range(range, entry.duration);
            let comment_ref = CommentRef {
                comment_id: comment.comment_id.clone(),
                author: comment.author_display_name.clone(),
                author_image_url: comment.author_profile_image_url.clone(),
                text: comment.text_original.clone(),
            };
            entry.add_range(TimeRangeEntry::new(range, comment_ref));
        }

        tracing::trace!(
            "collected ranges (videoId = {}, commentId = {}, duration = {})",
            comment.video_id,
            comment.comment_id,
            entry.duration
        );
    }
    acc
}
