//! Clip materialization.

use serde::{Deserialize, Serialize};

use crate::types::ChannelEntry;

/// One published highlight of a video.
///
/// Keys are PascalCase, as read by the page player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Clip {
    pub video_id: String,
    pub title: String,
    pub start: u64,
    pub end: u64,
    /// Distinct recommender names, first-seen order
    pub recommenders: Vec<String>,
    #[serde(rename = "TwitterName")]
    pub twitter_handle: String,
}

/// Project a channel's merged ranges into clips, videos in entry order.
pub fn materialize(channel: &ChannelEntry) -> Vec<Clip> {
    channel
        .videos
        .iter()
        .flat_map(|video| {
            video.ranges.iter().map(move |range| Clip {
                video_id: video.video_id.clone(),
                title: video.title.clone(),
                start: range.start,
                end: range.end,
                recommenders: range.comments.recommenders(),
                twitter_handle: video.twitter_handle.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{parse_timestamp, CommentRef, CommentSet, MergedRange, VideoEntry};

    fn comments(authors: &[(&str, &str)]) -> CommentSet {
        let mut set = CommentSet::default();
        for (id, author) in authors {
            set.insert(CommentRef {
                comment_id: id.to_string(),
                author: author.to_string(),
                author_image_url: String::new(),
                text: String::new(),
            });
        }
        set
    }

    #[test]
    fn test_materialize_keeps_order() {
        let channel = ChannelEntry {
            channel_id: "UC1".to_string(),
            videos: vec![
                VideoEntry {
                    video_id: "new".to_string(),
                    title: "New".to_string(),
                    last_update: parse_timestamp("2021-01-01T00:00:00Z"),
                    ranges: vec![
                        MergedRange {
                            start: 10,
                            end: 20,
                            comments: comments(&[("c1", "bob"), ("c2", "alice"), ("c3", "bob")]),
                        },
                        MergedRange {
                            start: 30,
                            end: 40,
                            comments: comments(&[("c4", "carol")]),
                        },
                    ],
                    twitter_handle: "tw".to_string(),
                },
                VideoEntry {
                    video_id: "old".to_string(),
                    title: "Old".to_string(),
                    last_update: parse_timestamp("2020-01-01T00:00:00Z"),
                    ranges: vec![MergedRange {
                        start: 5,
                        end: 6,
                        comments: comments(&[("c5", "dave")]),
                    }],
                    twitter_handle: "tw".to_string(),
                },
            ],
        };

        let clips = materialize(&channel);
        let keys: Vec<_> = clips.iter().map(|c| (c.video_id.as_str(), c.start)).collect();
        assert_eq!(keys, vec![("new", 10), ("new", 30), ("old", 5)]);
        assert_eq!(clips[0].recommenders, vec!["bob", "alice"]);
        assert_eq!(clips[2].title, "Old");
    }

    #[test]
    fn test_clip_json_field_names() {
        let clip = Clip {
            video_id: "v1".to_string(),
            title: "t".to_string(),
            start: 1,
            end: 2,
            recommenders: vec!["a".to_string()],
            twitter_handle: "h".to_string(),
        };
        let json = serde_json::to_string(&clip).unwrap();
        assert_eq!(
            json,
            r#"{"VideoId":"v1","Title":"t","Start":1,"End":2,"Recommenders":["a"],"TwitterName":"h"}"#
        );
    }
}
