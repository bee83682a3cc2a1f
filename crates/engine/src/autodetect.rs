//! Live-chat auto detection.
//!
//! Chat messages are binned along the video timeline and weighted; bins whose
//! weight is an outlier (above `mean + k * stddev`) become candidate ranges
//! recommended by a synthetic comment.

use clipper_core::BuildSettings;

use crate::aggregate::{clamp_range, ChannelAccumulator};
use crate::store::{ChannelRow, LiveChatRow, VideoRow};
use crate::timecode::duration_to_seconds;
use crate::types::{parse_timestamp, CommentRef, RangeEnd, RawTimeRange, TimeRangeEntry};

/// Author shown for ranges found by auto detection.
pub const AUTO_DETECT_AUTHOR: &str = "Automatic detection by clipper";

/// Substrings that mark a reaction message.
pub const REACTION_KEYWORDS: [&str; 14] = [
    "w", "W", "Ｗ", "ｗ", "lol", "LOL", "草", "くさ", "笑", "ワロ", "さす", "かっこいい", "ナイス",
    "ないす",
];

#[derive(Debug, Clone, PartialEq)]
pub struct AutoDetectSettings {
    pub unit_span: u64,
    pub threshold: f64,
    pub range_sec: u64,
    pub skip_duration: u64,
}

impl From<&BuildSettings> for AutoDetectSettings {
    fn from(settings: &BuildSettings) -> Self {
        Self {
            unit_span: settings.auto_detect_unit_span,
            threshold: settings.auto_detect_threshold,
            range_sec: settings.auto_detect_range_sec,
            skip_duration: settings.auto_detect_skip_duration,
        }
    }
}

/// A bin that crossed the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Highlight {
    pub bin: usize,
    pub score: u64,
    pub start: u64,
    pub end: u64,
}

/// Weight of one message: paid messages and reactions count double.
pub fn message_weight(message: &LiveChatRow) -> u64 {
    if !message.purchase_amount_text.is_empty() {
        return 2;
    }
    if REACTION_KEYWORDS
        .iter()
        .any(|keyword| message.message_text.contains(keyword))
    {
        return 2;
    }
    1
}

/// Weighted message counts per `unit_span` bin over `[0, duration]`.
///
/// Messages before `skip_duration`, past the end of the video, or with an
/// unparsable offset are left out.
pub fn bin_counts(events: &[LiveChatRow], duration: u64, settings: &AutoDetectSettings) -> Vec<u64> {
    if settings.unit_span == 0 {
        return Vec::new();
    }

    let size = (duration / settings.unit_span) as usize + 1;
    let mut counts = vec![0u64; size];

    for event in events {
        let offset_msec = match event.video_offset_time_msec.trim().parse::<i64>() {
            Ok(msec) => msec,
            Err(e) => {
                tracing::warn!(
                    "can not parse videoOffsetTimeMsec (uniqueId = {}, value = {:?}): {}",
                    event.unique_id,
                    event.video_offset_time_msec,
                    e
                );
                continue;
            }
        };
        let offset = offset_msec / 1000;
        if offset < 0 {
            continue;
        }
        let offset = offset as u64;
        if offset < settings.skip_duration || offset > duration {
            continue;
        }
        let bin = (offset / settings.unit_span) as usize;
        counts[bin] += message_weight(event);
    }

    counts
}

/// `mean + k * stddev` over `counts` (population statistics).
///
/// `None` for an empty slice.
pub fn outlier_threshold(counts: &[u64], k: f64) -> Option<f64> {
    if counts.is_empty() {
        return None;
    }
    let n = counts.len() as f64;
    let mean = counts.iter().map(|&c| c as f64).sum::<f64>() / n;
    let variance = counts
        .iter()
        .map(|&c| {
            let delta = c as f64 - mean;
            delta * delta
        })
        .sum::<f64>()
        / n;
    Some(mean + variance.sqrt() * k)
}

/// Find the outlier bins of one video's live chat.
pub fn detect_highlights(
    events: &[LiveChatRow],
    duration: u64,
    settings: &AutoDetectSettings,
) -> Vec<Highlight> {
    let counts = bin_counts(events, duration, settings);
    if counts.is_empty() {
        return Vec::new();
    }

    let first_bin = (settings.skip_duration / settings.unit_span) as usize;
    let threshold = match counts
        .get(first_bin..)
        .and_then(|tail| outlier_threshold(tail, settings.threshold))
    {
        Some(threshold) => threshold,
        None => {
            tracing::debug!(
                "skip window covers the whole video (duration = {}, skipDuration = {})",
                duration,
                settings.skip_duration
            );
            return Vec::new();
        }
    };
    tracing::debug!("standard deviation threshold = {}", threshold);

    if threshold == 0.0 {
        return Vec::new();
    }

    counts
        .iter()
        .enumerate()
        .filter(|&(_, &count)| count as f64 >= threshold)
        .map(|(bin, &score)| {
            let center = bin as u64 * settings.unit_span;
            let range = clamp_range(
                RawTimeRange {
                    start: center.saturating_sub(settings.range_sec),
                    end: RangeEnd::At(center + settings.range_sec / 3 * 2),
                },
                duration,
            );
            Highlight {
                bin,
                score,
                start: range.start,
                end: range.end.seconds().unwrap_or(duration),
            }
        })
        .collect()
}

/// Fold one video's auto-detected ranges into the accumulator.
pub fn collect_auto_ranges(
    mut acc: ChannelAccumulator,
    channel: &ChannelRow,
    video: &VideoRow,
    events: &[LiveChatRow],
    settings: &AutoDetectSettings,
) -> ChannelAccumulator {
    if !video.embeddable {
        tracing::debug!(
            "skip live chat comments because unembeddable video (channelId = {}, videoId = {})",
            channel.channel_id,
            video.video_id
        );
        return acc;
    }

    let duration = duration_to_seconds(&video.duration);
    let highlights = detect_highlights(events, duration, settings);
    if highlights.is_empty() {
        return acc;
    }

    let published_at = parse_timestamp(&video.published_at);
    let entry = acc.video_mut(video, &channel.twitter_handle, published_at);
    entry.touch(published_at);

    for highlight in highlights {
        tracing::debug!(
            "auto detected (videoId = {}, bin = {}, score = {})",
            video.video_id,
            highlight.bin,
            highlight.score
        );
        let comment = CommentRef {
            comment_id: format!(
                "AD.{}.{}.{}.{}.{}",
                channel.channel_id, video.video_id, highlight.bin, highlight.score, settings.unit_span
            ),
            author: AUTO_DETECT_AUTHOR.to_string(),
            author_image_url: String::new(),
            text: format!("Automatic detection score {}", highlight.score),
        };
        entry.add_range(TimeRangeEntry::new(
            RawTimeRange {
                start: highlight.start,
                end: RangeEnd::At(highlight.end),
            },
            comment,
        ));
    }

    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(skip_duration: u64) -> AutoDetectSettings {
        AutoDetectSettings {
            unit_span: 30,
            threshold: 2.0,
            range_sec: 60,
            skip_duration,
        }
    }

    fn chat(id: usize, offset_sec: u64, text: &str, purchase: &str) -> LiveChatRow {
        LiveChatRow {
            unique_id: format!("m{}", id),
            channel_id: "UC1".to_string(),
            video_id: "v1".to_string(),
            message_text: text.to_string(),
            purchase_amount_text: purchase.to_string(),
            video_offset_time_msec: (offset_sec * 1000 + 250).to_string(),
        }
    }

    /// One plain message in each of bins 0..40, ten reactions in bins 20 and 21.
    fn spike() -> Vec<LiveChatRow> {
        let mut events: Vec<LiveChatRow> = (0..40u64)
            .map(|bin| chat(bin as usize, bin * 30 + 5, "hello", ""))
            .collect();
        for bin in [20u64, 21] {
            for i in 0..10 {
                events.push(chat(1000 + bin as usize * 10 + i, bin * 30 + 10, "草", ""));
            }
        }
        events
    }

    fn video(embeddable: bool) -> VideoRow {
        VideoRow {
            video_id: "v1".to_string(),
            channel_id: "UC1".to_string(),
            title: "stream".to_string(),
            published_at: "2021-03-04T05:06:07Z".to_string(),
            duration: "PT20M".to_string(),
            embeddable,
        }
    }

    fn channel() -> ChannelRow {
        ChannelRow {
            channel_id: "UC1".to_string(),
            display_name: "One".to_string(),
            twitter_handle: "one_tw".to_string(),
        }
    }

    #[test]
    fn test_message_weight() {
        assert_eq!(message_weight(&chat(0, 0, "hello", "")), 1);
        assert_eq!(message_weight(&chat(0, 0, "hello", "¥500")), 2);
        assert_eq!(message_weight(&chat(0, 0, "ｗｗｗ", "")), 2);
        assert_eq!(message_weight(&chat(0, 0, "that was LOL", "")), 2);
    }

    #[test]
    fn test_bin_counts_skip_and_bounds() {
        let events = vec![
            chat(0, 10, "early", ""),
            chat(1, 95, "a", ""),
            chat(2, 119, "草", ""),
            chat(3, 130, "b", ""),
            chat(4, 1300, "late", ""),
            LiveChatRow {
                video_offset_time_msec: "n/a".to_string(),
                ..chat(5, 100, "broken", "")
            },
            LiveChatRow {
                video_offset_time_msec: "-4000".to_string(),
                ..chat(6, 100, "negative", "")
            },
        ];
        let counts = bin_counts(&events, 1200, &settings(60));
        assert_eq!(counts.len(), 41);
        assert_eq!(counts[0], 0);
        assert_eq!(counts[3], 3);
        assert_eq!(counts[4], 1);
        assert_eq!(counts.iter().sum::<u64>(), 4);
    }

    #[test]
    fn test_outlier_threshold() {
        assert_eq!(outlier_threshold(&[], 3.0), None);
        assert_eq!(outlier_threshold(&[4, 4, 4], 3.0), Some(4.0));
        let threshold = outlier_threshold(&[1, 3], 1.0).unwrap();
        assert!((threshold - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_spike_is_detected() {
        let highlights = detect_highlights(&spike(), 1200, &settings(0));
        let bins: Vec<_> = highlights.iter().map(|h| h.bin).collect();
        assert_eq!(bins, vec![20, 21]);
        assert_eq!((highlights[0].start, highlights[0].end), (540, 640));
        assert_eq!((highlights[1].start, highlights[1].end), (570, 670));
        assert_eq!(highlights[0].score, 21);
    }

    #[test]
    fn test_range_is_clamped_at_edges() {
        let mut events: Vec<LiveChatRow> = (0..10u64).map(|bin| chat(bin as usize, bin * 30, "x", "")).collect();
        for i in 0..20 {
            events.push(chat(100 + i, 1, "草", ""));
        }
        let highlights = detect_highlights(&events, 299, &settings(0));
        assert_eq!(highlights.len(), 1);
        assert_eq!((highlights[0].start, highlights[0].end), (0, 40));
    }

    #[test]
    fn test_skip_window_swallowing_everything() {
        assert!(detect_highlights(&spike(), 1200, &settings(5000)).is_empty());
    }

    #[test]
    fn test_mild_noise_has_no_highlights() {
        let mut events: Vec<LiveChatRow> = (0..40u64).map(|bin| chat(bin as usize, bin * 30, "x", "")).collect();
        for bin in (0..40u64).step_by(2) {
            events.push(chat(100 + bin as usize, bin * 30 + 1, "y", ""));
        }
        // counts alternate 2 and 1: threshold 1.5 + 2 * 0.5
        assert!(detect_highlights(&events, 1170, &settings(0)).is_empty());
        assert!(detect_highlights(&[], 1200, &settings(0)).is_empty());
    }

    #[test]
    fn test_collect_auto_ranges() {
        let acc = collect_auto_ranges(
            ChannelAccumulator::new(),
            &channel(),
            &video(true),
            &spike(),
            &settings(0),
        );

        let entry = &acc.videos()[0];
        assert_eq!(entry.twitter_handle, "one_tw");
        assert_eq!(entry.last_update, parse_timestamp("2021-03-04T05:06:07Z"));
        assert_eq!(entry.ranges.len(), 2);

        let comment = entry.ranges[0].comments.iter().next().unwrap();
        assert_eq!(comment.comment_id, "AD.UC1.v1.20.21.30");
        assert_eq!(comment.author, AUTO_DETECT_AUTHOR);
        assert_eq!(comment.text, "Automatic detection score 21");
    }

    #[test]
    fn test_unembeddable_video_is_skipped() {
        let acc = collect_auto_ranges(
            ChannelAccumulator::new(),
            &channel(),
            &video(false),
            &spike(),
            &settings(0),
        );
        assert!(acc.videos().is_empty());
    }
}
