//! Clip engine type definitions.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// End of a time range.
///
/// A comment that only names a start ("12:34") or an inverted range leaves the
/// end `Unknown`; the merge pass resolves it once the video's full range list
/// is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeEnd {
    Unknown,
    At(u64),
}

impl RangeEnd {
    /// Concrete end in seconds, if known.
    pub fn seconds(self) -> Option<u64> {
        match self {
            RangeEnd::Unknown => None,
            RangeEnd::At(seconds) => Some(seconds),
        }
    }

    /// The later of two ends. A known end always beats an unknown one.
    pub fn later(self, other: RangeEnd) -> RangeEnd {
        match (self, other) {
            (RangeEnd::At(a), RangeEnd::At(b)) => RangeEnd::At(a.max(b)),
            (RangeEnd::At(a), RangeEnd::Unknown) | (RangeEnd::Unknown, RangeEnd::At(a)) => {
                RangeEnd::At(a)
            }
            (RangeEnd::Unknown, RangeEnd::Unknown) => RangeEnd::Unknown,
        }
    }

    /// Pull a known end into `[0, ceiling]`.
    pub fn clamp_to(self, ceiling: u64) -> RangeEnd {
        match self {
            RangeEnd::At(seconds) => RangeEnd::At(seconds.min(ceiling)),
            RangeEnd::Unknown => RangeEnd::Unknown,
        }
    }
}

/// A range as parsed out of a piece of text, in seconds from video start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawTimeRange {
    pub start: u64,
    pub end: RangeEnd,
}

/// The comment (or synthetic detection) that recommended a range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRef {
    pub comment_id: String,
    pub author: String,
    pub author_image_url: String,
    pub text: String,
}

/// Insertion-ordered set of comments keyed by `comment_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentSet {
    comments: Vec<CommentRef>,
    ids: HashSet<String>,
}

impl CommentSet {
    pub fn single(comment: CommentRef) -> Self {
        let mut set = Self::default();
        set.insert(comment);
        set
    }

    /// Insert unless a comment with the same id is already present.
    pub fn insert(&mut self, comment: CommentRef) -> bool {
        if !self.ids.insert(comment.comment_id.clone()) {
            return false;
        }
        self.comments.push(comment);
        true
    }

    /// Append every comment of `other` not already present, keeping order.
    pub fn union(&mut self, other: CommentSet) {
        for comment in other.comments {
            self.insert(comment);
        }
    }

    pub fn contains(&self, comment_id: &str) -> bool {
        self.ids.contains(comment_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommentRef> {
        self.comments.iter()
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    /// Distinct author names in first-seen order.
    pub fn recommenders(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.comments
            .iter()
            .filter(|c| seen.insert(c.author.as_str()))
            .map(|c| c.author.clone())
            .collect()
    }
}

/// A candidate clip before merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRangeEntry {
    pub start: u64,
    pub end: RangeEnd,
    pub comments: CommentSet,
}

impl TimeRangeEntry {
    pub fn new(range: RawTimeRange, comment: CommentRef) -> Self {
        Self {
            start: range.start,
            end: range.end,
            comments: CommentSet::single(comment),
        }
    }
}

/// A finalized range: concrete end, no overlap with its neighbours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedRange {
    pub start: u64,
    pub end: u64,
    pub comments: CommentSet,
}

impl From<MergedRange> for TimeRangeEntry {
    fn from(range: MergedRange) -> Self {
        Self {
            start: range.start,
            end: RangeEnd::At(range.end),
            comments: range.comments,
        }
    }
}

/// A video with its merged ranges.
#[derive(Debug, Clone)]
pub struct VideoEntry {
    pub video_id: String,
    pub title: String,
    /// Latest contributing comment or publish time; display ordering only
    pub last_update: DateTime<Utc>,
    pub ranges: Vec<MergedRange>,
    pub twitter_handle: String,
}

/// All clip-bearing videos of a channel, most recently updated first.
#[derive(Debug, Clone)]
pub struct ChannelEntry {
    pub channel_id: String,
    pub videos: Vec<VideoEntry>,
}

/// Parse a stored RFC 3339 timestamp. Unparsable values sort last.
pub fn parse_timestamp(value: &str) -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339(value.trim()) {
        Ok(parsed) => parsed.with_timezone(&Utc),
        Err(e) => {
            tracing::debug!("can not parse timestamp {:?}: {}", value, e);
            DateTime::<Utc>::MIN_UTC
        }
    }
}
