//! Publish gatekeeper.
//!
//! A channel's clip list is serialized and hashed; artifacts are rewritten and
//! the channel page marked dirty only when the digest moved or a rebuild was
//! forced. The page's external reference is carried over untouched.

use clipper_core::{AppError, AppResult};
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::clips::Clip;
use crate::store::{self, ChannelPageRecord, INDEX_PAGE_ID};

/// What the gatekeeper did with a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published { hash: String },
    Skipped { hash: String },
}

impl PublishOutcome {
    pub fn hash(&self) -> &str {
        match self {
            PublishOutcome::Published { hash } | PublishOutcome::Skipped { hash } => hash,
        }
    }

    pub fn changed(&self) -> bool {
        matches!(self, PublishOutcome::Published { .. })
    }
}

/// Serialize clips in their given order.
pub fn serialize_clips(clips: &[Clip]) -> AppResult<Vec<u8>> {
    Ok(serde_json::to_vec(clips)?)
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Path of a channel's JSON artifact.
pub fn artifact_path(cache_dir: &Path, channel_id: &str) -> PathBuf {
    cache_dir.join(format!("{}.json", channel_id))
}

/// Path of the digest file next to the artifact.
pub fn digest_path(cache_dir: &Path, channel_id: &str) -> PathBuf {
    cache_dir.join(format!("{}.json.sha256", channel_id))
}

/// Write `contents` to a sibling temp file, then rename it over `path`.
pub fn write_atomic(path: &Path, contents: &[u8]) -> AppResult<()> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| AppError::Build(format!("invalid artifact path {:?}", path)))?;
    let temp_path = path.with_file_name(format!(".{}.tmp.{}", file_name, std::process::id()));

    std::fs::write(&temp_path, contents).map_err(|e| {
        AppError::Build(format!("can not write temp file (path = {:?}): {}", temp_path, e))
    })?;

    std::fs::rename(&temp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        AppError::Build(format!("can not rename into place (path = {:?}): {}", path, e))
    })
}

/// Publish one channel's clips unless its digest is unchanged.
pub fn publish_channel(
    conn: &Connection,
    cache_dir: &Path,
    channel_id: &str,
    clips: &[Clip],
    rebuild: bool,
) -> AppResult<PublishOutcome> {
    let bytes = serialize_clips(clips).map_err(|e| {
        AppError::Build(format!("can not serialize clips (channelId = {}): {}", channel_id, e))
    })?;
    let hash = content_digest(&bytes);

    let last = store::get_channel_page(conn, channel_id)?;
    if let Some(last) = &last {
        if !rebuild && last.content_hash == hash {
            tracing::debug!(
                "skip because same digest of channel page (channelId = {}, digest = {})",
                channel_id,
                hash
            );
            return Ok(PublishOutcome::Skipped { hash });
        }
    }

    write_atomic(&artifact_path(cache_dir, channel_id), &bytes)?;
    write_atomic(&digest_path(cache_dir, channel_id), hash.as_bytes())?;

    store::upsert_channel_page(
        conn,
        &ChannelPageRecord {
            channel_id: channel_id.to_string(),
            content_hash: hash.clone(),
            dirty: true,
            external_ref_id: last.and_then(|page| page.external_ref_id),
        },
    )?;

    tracing::info!(
        "published channel page (channelId = {}, clips = {}, digest = {})",
        channel_id,
        clips.len(),
        hash
    );
    Ok(PublishOutcome::Published { hash })
}

/// Mark the index page dirty when any channel changed, on rebuild, or when
/// it has never been recorded. Returns whether the record was written.
pub fn publish_index(conn: &Connection, any_changed: bool, rebuild: bool) -> AppResult<bool> {
    let last = store::get_channel_page(conn, INDEX_PAGE_ID)?;
    if !rebuild && !any_changed && last.is_some() {
        tracing::debug!("skip because no channel page changed");
        return Ok(false);
    }

    store::upsert_channel_page(
        conn,
        &ChannelPageRecord {
            channel_id: INDEX_PAGE_ID.to_string(),
            content_hash: String::new(),
            dirty: true,
            external_ref_id: last.and_then(|page| page.external_ref_id),
        },
    )?;
    Ok(true)
}
