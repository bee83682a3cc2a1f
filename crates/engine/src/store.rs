//! SQLite datastore shared with the ingestion collaborator.
//!
//! The engine only reads channels, videos, comments and live chat; the write
//! helpers for those tables exist for the ingestion side and for tests. The
//! `channelPage` table is the one the engine owns.

use clipper_core::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// Reserved channel page id for the aggregate front page.
pub const INDEX_PAGE_ID: &str = "index";

/// A tracked channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRow {
    pub channel_id: String,
    pub display_name: String,
    pub twitter_handle: String,
}

/// A video of a tracked channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRow {
    pub video_id: String,
    pub channel_id: String,
    pub title: String,
    pub published_at: String,
    /// Compact media duration, e.g. `PT1H2M3S`
    pub duration: String,
    pub embeddable: bool,
}

/// A top-level comment (`parent_id` is `None`) or a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRow {
    pub comment_id: String,
    pub parent_id: Option<String>,
    pub channel_id: String,
    pub video_id: String,
    pub author_display_name: String,
    pub author_profile_image_url: String,
    pub text_original: String,
    pub updated_at: String,
}

/// One live-chat message replayed against the video timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveChatRow {
    pub unique_id: String,
    pub channel_id: String,
    pub video_id: String,
    pub message_text: String,
    /// Empty unless the message was a paid one
    pub purchase_amount_text: String,
    /// Milliseconds from stream start, string-encoded as delivered upstream
    pub video_offset_time_msec: String,
}

/// Publish state of a channel page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelPageRecord {
    pub channel_id: String,
    pub content_hash: String,
    pub dirty: bool,
    /// Reference owned by the notification side (e.g. a posted message id)
    pub external_ref_id: Option<i64>,
}

/// Open the datastore, creating any missing tables.
pub fn open(db_path: &Path) -> AppResult<Connection> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Database(format!("Failed to create database directory: {}", e))
            })?;
        }
    }

    let conn = Connection::open(db_path)
        .map_err(|e| AppError::Database(format!("Failed to open {:?}: {}", db_path, e)))?;

    conn.busy_timeout(Duration::from_secs(10))
        .map_err(|e| AppError::Database(format!("Failed to set busy timeout: {}", e)))?;

    create_tables(&conn)?;

    tracing::debug!("Opened datastore at {:?}", db_path);
    Ok(conn)
}

fn create_tables(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS channel (
            channelId TEXT PRIMARY KEY,
            displayName TEXT NOT NULL,
            twitterHandle TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS video (
            videoId TEXT PRIMARY KEY,
            channelId TEXT NOT NULL,
            title TEXT NOT NULL,
            publishedAt TEXT NOT NULL,
            duration TEXT NOT NULL,
            embeddable INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS topLevelComment (
            commentId TEXT PRIMARY KEY,
            channelId TEXT NOT NULL,
            videoId TEXT NOT NULL,
            authorDisplayName TEXT NOT NULL,
            authorProfileImageUrl TEXT NOT NULL,
            textOriginal TEXT NOT NULL,
            updatedAt TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS replyComment (
            commentId TEXT PRIMARY KEY,
            parentId TEXT NOT NULL,
            channelId TEXT NOT NULL,
            videoId TEXT NOT NULL,
            authorDisplayName TEXT NOT NULL,
            authorProfileImageUrl TEXT NOT NULL,
            textOriginal TEXT NOT NULL,
            updatedAt TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS liveChatComment (
            uniqueId TEXT PRIMARY KEY,
            channelId TEXT NOT NULL,
            videoId TEXT NOT NULL,
            messageText TEXT NOT NULL,
            purchaseAmountText TEXT NOT NULL,
            videoOffsetTimeMsec TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS channelPage (
            channelId TEXT PRIMARY KEY,
            contentHash TEXT NOT NULL,
            dirty INTEGER NOT NULL,
            externalRefId INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_video_channel ON video(channelId);
        CREATE INDEX IF NOT EXISTS idx_top_level_comment_channel ON topLevelComment(channelId);
        CREATE INDEX IF NOT EXISTS idx_reply_comment_channel ON replyComment(channelId);
        CREATE INDEX IF NOT EXISTS idx_live_chat_video ON liveChatComment(videoId);
        "#,
    )
    .map_err(|e| AppError::Database(format!("Failed to create tables: {}", e)))?;

    Ok(())
}

/// Look up a channel.
pub fn get_channel(conn: &Connection, channel_id: &str) -> AppResult<Option<ChannelRow>> {
    conn.query_row(
        "SELECT channelId, displayName, twitterHandle FROM channel WHERE channelId = ?1",
        params![channel_id],
        |row| {
            Ok(ChannelRow {
                channel_id: row.get(0)?,
                display_name: row.get(1)?,
                twitter_handle: row.get(2)?,
            })
        },
    )
    .optional()
    .map_err(|e| {
        AppError::Database(format!(
            "can not get channel (channelId = {}): {}",
            channel_id, e
        ))
    })
}

/// Insert or replace a channel.
pub fn upsert_channel(conn: &Connection, channel: &ChannelRow) -> AppResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO channel (channelId, displayName, twitterHandle)
         VALUES (?1, ?2, ?3)",
        params![channel.channel_id, channel.display_name, channel.twitter_handle],
    )
    .map_err(|e| {
        AppError::Database(format!(
            "can not upsert channel (channelId = {}): {}",
            channel.channel_id, e
        ))
    })?;

    Ok(())
}

const VIDEO_COLUMNS: &str = "videoId, channelId, title, publishedAt, duration, embeddable";

fn video_from_row(row: &Row<'_>) -> rusqlite::Result<VideoRow> {
    Ok(VideoRow {
        video_id: row.get(0)?,
        channel_id: row.get(1)?,
        title: row.get(2)?,
        published_at: row.get(3)?,
        duration: row.get(4)?,
        embeddable: row.get::<_, i64>(5)? != 0,
    })
}

/// Look up a video by id, regardless of channel.
pub fn get_video(conn: &Connection, video_id: &str) -> AppResult<Option<VideoRow>> {
    conn.query_row(
        &format!("SELECT {} FROM video WHERE videoId = ?1", VIDEO_COLUMNS),
        params![video_id],
        video_from_row,
    )
    .optional()
    .map_err(|e| AppError::Database(format!("can not get video (videoId = {}): {}", video_id, e)))
}

/// All videos of a channel, in insertion order.
pub fn get_videos_by_channel(conn: &Connection, channel_id: &str) -> AppResult<Vec<VideoRow>> {
    let context = |e: rusqlite::Error| {
        AppError::Database(format!(
            "can not get videos (channelId = {}): {}",
            channel_id, e
        ))
    };

    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM video WHERE channelId = ?1 ORDER BY rowid",
            VIDEO_COLUMNS
        ))
        .map_err(context)?;

    let videos = stmt
        .query_map(params![channel_id], video_from_row)
        .map_err(context)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(context)?;

    Ok(videos)
}

/// Insert or replace a video.
pub fn upsert_video(conn: &Connection, video: &VideoRow) -> AppResult<()> {
    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO video ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            VIDEO_COLUMNS
        ),
        params![
            video.video_id,
            video.channel_id,
            video.title,
            video.published_at,
            video.duration,
            video.embeddable as i64,
        ],
    )
    .map_err(|e| {
        AppError::Database(format!(
            "can not upsert video (videoId = {}): {}",
            video.video_id, e
        ))
    })?;

    Ok(())
}

/// Top-level comments then replies of a channel whose text contains an ASCII
/// or fullwidth colon.
///
/// Only those can carry a time expression. Each table is read in insertion
/// order so repeated builds see the same sequence.
pub fn get_comments_with_colon(conn: &Connection, channel_id: &str) -> AppResult<Vec<CommentRow>> {
    let context = |e: rusqlite::Error| {
        AppError::Database(format!(
            "can not get comments (channelId = {}): {}",
            channel_id, e
        ))
    };

    let mut comments = Vec::new();

    let mut stmt = conn
        .prepare(
            "SELECT commentId, channelId, videoId, authorDisplayName, authorProfileImageUrl,
                    textOriginal, updatedAt
             FROM topLevelComment
             WHERE channelId = ?1
               AND (textOriginal LIKE '%:%' OR textOriginal LIKE '%：%')
             ORDER BY rowid",
        )
        .map_err(context)?;
    let top_level = stmt
        .query_map(params![channel_id], |row| {
            Ok(CommentRow {
                comment_id: row.get(0)?,
                parent_id: None,
                channel_id: row.get(1)?,
                video_id: row.get(2)?,
                author_display_name: row.get(3)?,
                author_profile_image_url: row.get(4)?,
                text_original: row.get(5)?,
                updated_at: row.get(6)?,
            })
        })
        .map_err(context)?;
    for comment in top_level {
        comments.push(comment.map_err(context)?);
    }

    let mut stmt = conn
        .prepare(
            "SELECT commentId, parentId, channelId, videoId, authorDisplayName,
                    authorProfileImageUrl, textOriginal, updatedAt
             FROM replyComment
             WHERE channelId = ?1
               AND (textOriginal LIKE '%:%' OR textOriginal LIKE '%：%')
             ORDER BY rowid",
        )
        .map_err(context)?;
    let replies = stmt
        .query_map(params![channel_id], |row| {
            Ok(CommentRow {
                comment_id: row.get(0)?,
                parent_id: Some(row.get(1)?),
                channel_id: row.get(2)?,
                video_id: row.get(3)?,
                author_display_name: row.get(4)?,
                author_profile_image_url: row.get(5)?,
                text_original: row.get(6)?,
                updated_at: row.get(7)?,
            })
        })
        .map_err(context)?;
    for comment in replies {
        comments.push(comment.map_err(context)?);
    }

    tracing::debug!(
        "Read {} comments with a colon (channelId = {})",
        comments.len(),
        channel_id
    );
    Ok(comments)
}

/// Insert or replace a comment; replies go to their own table.
pub fn upsert_comment(conn: &Connection, comment: &CommentRow) -> AppResult<()> {
    let result = match &comment.parent_id {
        None => conn.execute(
            "INSERT OR REPLACE INTO topLevelComment (commentId, channelId, videoId,
                 authorDisplayName, authorProfileImageUrl, textOriginal, updatedAt)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                comment.comment_id,
                comment.channel_id,
                comment.video_id,
                comment.author_display_name,
                comment.author_profile_image_url,
                comment.text_original,
                comment.updated_at,
            ],
        ),
        Some(parent_id) => conn.execute(
            "INSERT OR REPLACE INTO replyComment (commentId, parentId, channelId, videoId,
                 authorDisplayName, authorProfileImageUrl, textOriginal, updatedAt)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                comment.comment_id,
                parent_id,
                comment.channel_id,
                comment.video_id,
                comment.author_display_name,
                comment.author_profile_image_url,
                comment.text_original,
                comment.updated_at,
            ],
        ),
    };

    result.map_err(|e| {
        AppError::Database(format!(
            "can not upsert comment (commentId = {}, videoId = {}): {}",
            comment.comment_id, comment.video_id, e
        ))
    })?;

    Ok(())
}

/// Live-chat messages of a video, in insertion order.
pub fn get_live_chat_by_video(conn: &Connection, video_id: &str) -> AppResult<Vec<LiveChatRow>> {
    let context = |e: rusqlite::Error| {
        AppError::Database(format!(
            "can not get live chat (videoId = {}): {}",
            video_id, e
        ))
    };

    let mut stmt = conn
        .prepare(
            "SELECT uniqueId, channelId, videoId, messageText, purchaseAmountText,
                    videoOffsetTimeMsec
             FROM liveChatComment WHERE videoId = ?1 ORDER BY rowid",
        )
        .map_err(context)?;

    let messages = stmt
        .query_map(params![video_id], |row| {
            Ok(LiveChatRow {
                unique_id: row.get(0)?,
                channel_id: row.get(1)?,
                video_id: row.get(2)?,
                message_text: row.get(3)?,
                purchase_amount_text: row.get(4)?,
                video_offset_time_msec: row.get(5)?,
            })
        })
        .map_err(context)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(context)?;

    Ok(messages)
}

/// Insert live-chat messages in one transaction.
pub fn insert_live_chat(conn: &mut Connection, messages: &[LiveChatRow]) -> AppResult<()> {
    let tx = conn
        .transaction()
        .map_err(|e| AppError::Database(format!("can not start live chat transaction: {}", e)))?;

    for message in messages {
        tx.execute(
            "INSERT OR REPLACE INTO liveChatComment (uniqueId, channelId, videoId, messageText,
                 purchaseAmountText, videoOffsetTimeMsec)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.unique_id,
                message.channel_id,
                message.video_id,
                message.message_text,
                message.purchase_amount_text,
                message.video_offset_time_msec,
            ],
        )
        .map_err(|e| {
            AppError::Database(format!(
                "can not insert live chat (uniqueId = {}, videoId = {}): {}",
                message.unique_id, message.video_id, e
            ))
        })?;
    }

    tx.commit()
        .map_err(|e| AppError::Database(format!("can not commit live chat: {}", e)))?;

    Ok(())
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<ChannelPageRecord> {
    Ok(ChannelPageRecord {
        channel_id: row.get(0)?,
        content_hash: row.get(1)?,
        dirty: row.get::<_, i64>(2)? != 0,
        external_ref_id: row.get(3)?,
    })
}

/// Read the publish state of a channel page.
pub fn get_channel_page(conn: &Connection, channel_id: &str) -> AppResult<Option<ChannelPageRecord>> {
    conn.query_row(
        "SELECT channelId, contentHash, dirty, externalRefId FROM channelPage WHERE channelId = ?1",
        params![channel_id],
        page_from_row,
    )
    .optional()
    .map_err(|e| {
        AppError::Database(format!(
            "can not get channel page (channelId = {}): {}",
            channel_id, e
        ))
    })
}

/// All channel page records, the index record included.
pub fn list_channel_pages(conn: &Connection) -> AppResult<Vec<ChannelPageRecord>> {
    let context =
        |e: rusqlite::Error| AppError::Database(format!("can not list channel pages: {}", e));

    let mut stmt = conn
        .prepare(
            "SELECT channelId, contentHash, dirty, externalRefId FROM channelPage ORDER BY channelId",
        )
        .map_err(context)?;

    let pages = stmt
        .query_map([], page_from_row)
        .map_err(context)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(context)?;

    Ok(pages)
}

/// Insert or replace the publish state of a channel page.
pub fn upsert_channel_page(conn: &Connection, page: &ChannelPageRecord) -> AppResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO channelPage (channelId, contentHash, dirty, externalRefId)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            page.channel_id,
            page.content_hash,
            page.dirty as i64,
            page.external_ref_id,
        ],
    )
    .map_err(|e| {
        AppError::Database(format!(
            "can not update channel page (channelId = {}, contentHash = {}): {}",
            page.channel_id, page.content_hash, e
        ))
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn comment(id: &str, parent: Option<&str>, text: &str) -> CommentRow {
        CommentRow {
            comment_id: id.to_string(),
            parent_id: parent.map(str::to_string),
            channel_id: "UC1".to_string(),
            video_id: "v1".to_string(),
            author_display_name: "alice".to_string(),
            author_profile_image_url: "https://example.invalid/a.png".to_string(),
            text_original: text.to_string(),
            updated_at: "2020-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_open_creates_tables() {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = open(temp_file.path()).unwrap();

        let table_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table'",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert_eq!(table_count, 6);

        // reopening is idempotent
        drop(conn);
        assert!(open(temp_file.path()).is_ok());
    }

    #[test]
    fn test_channel_and_video_lookup() {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = open(temp_file.path()).unwrap();

        upsert_channel(
            &conn,
            &ChannelRow {
                channel_id: "UC1".to_string(),
                display_name: "Channel One".to_string(),
                twitter_handle: "one".to_string(),
            },
        )
        .unwrap();
        let video = VideoRow {
            video_id: "v1".to_string(),
            channel_id: "UC1".to_string(),
            title: "Stream".to_string(),
            published_at: "2020-01-01T00:00:00Z".to_string(),
            duration: "PT1H".to_string(),
            embeddable: false,
        };
        upsert_video(&conn, &video).unwrap();

        assert_eq!(get_channel(&conn, "UC1").unwrap().unwrap().twitter_handle, "one");
        assert!(get_channel(&conn, "UC2").unwrap().is_none());
        assert_eq!(get_video(&conn, "v1").unwrap(), Some(video.clone()));
        assert!(get_video(&conn, "v2").unwrap().is_none());
        assert_eq!(get_videos_by_channel(&conn, "UC1").unwrap(), vec![video]);
    }

    #[test]
    fn test_comments_with_colon() {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = open(temp_file.path()).unwrap();

        upsert_comment(&conn, &comment("c1", None, "1:23 nice")).unwrap();
        upsert_comment(&conn, &comment("c2", None, "no time here")).unwrap();
        upsert_comment(&conn, &comment("r1", Some("c1"), "also 2:00")).unwrap();
        upsert_comment(&conn, &comment("c3", None, "１２：３４～１３：１０")).unwrap();
        upsert_comment(&conn, &comment("r2", Some("c3"), "見て ２：００")).unwrap();

        let comments = get_comments_with_colon(&conn, "UC1").unwrap();
        let ids: Vec<_> = comments.iter().map(|c| c.comment_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c3", "r1", "r2"]);
        assert_eq!(comments[1].parent_id.as_deref(), Some("c1"));
        assert!(get_comments_with_colon(&conn, "UC2").unwrap().is_empty());
    }

    #[test]
    fn test_live_chat_roundtrip() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut conn = open(temp_file.path()).unwrap();

        let messages: Vec<LiveChatRow> = (0..3)
            .map(|i| LiveChatRow {
                unique_id: format!("m{}", i),
                channel_id: "UC1".to_string(),
                video_id: "v1".to_string(),
                message_text: "hello".to_string(),
                purchase_amount_text: String::new(),
                video_offset_time_msec: format!("{}", i * 1000),
            })
            .collect();
        insert_live_chat(&mut conn, &messages).unwrap();

        assert_eq!(get_live_chat_by_video(&conn, "v1").unwrap(), messages);
        assert!(get_live_chat_by_video(&conn, "v2").unwrap().is_empty());
    }

    #[test]
    fn test_channel_page_upsert() {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = open(temp_file.path()).unwrap();

        assert!(get_channel_page(&conn, "UC1").unwrap().is_none());

        let page = ChannelPageRecord {
            channel_id: "UC1".to_string(),
            content_hash: "abc".to_string(),
            dirty: true,
            external_ref_id: None,
        };
        upsert_channel_page(&conn, &page).unwrap();
        assert_eq!(get_channel_page(&conn, "UC1").unwrap(), Some(page));

        let page = ChannelPageRecord {
            channel_id: "UC1".to_string(),
            content_hash: "def".to_string(),
            dirty: false,
            external_ref_id: Some(42),
        };
        upsert_channel_page(&conn, &page).unwrap();
        assert_eq!(list_channel_pages(&conn).unwrap(), vec![page]);
    }
}
