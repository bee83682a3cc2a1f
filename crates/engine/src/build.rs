//! Build orchestration: every tracked channel through the pipeline.
//!
//! Channels are independent. Each one runs on a blocking worker with its own
//! datastore connection; at most `jobs` run at a time. A failed channel is
//! reported and does not stop the others.

use clipper_core::{AppConfig, AppError, AppResult, BuildSettings};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::aggregate::{collect_comment_ranges, ChannelAccumulator};
use crate::autodetect::{collect_auto_ranges, AutoDetectSettings};
use crate::clips::{materialize, Clip};
use crate::merge::MergeSettings;
use crate::publish::{publish_channel, publish_index, PublishOutcome};
use crate::store::{self, ChannelRow, VideoRow};
use crate::timecode::ensure_grammar;
use crate::types::ChannelEntry;

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Republish even when digests match
    pub rebuild: bool,
    /// Maximum channels processed at once
    pub jobs: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            rebuild: false,
            jobs: 4,
        }
    }
}

/// Result of one channel.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelReport {
    pub channel_id: String,
    pub status: ChannelStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clips: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStatus {
    Published,
    Skipped,
    /// Tracked but absent from the datastore
    Missing,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSummary {
    pub channels: Vec<ChannelReport>,
    pub index_updated: bool,
}

impl BuildSummary {
    pub fn count(&self, status: ChannelStatus) -> usize {
        self.channels.iter().filter(|r| r.status == status).count()
    }

    pub fn has_failures(&self) -> bool {
        self.count(ChannelStatus::Failed) > 0
    }
}

/// Run the aggregation, detection and merge stages for one channel.
pub fn build_channel_entry(
    conn: &Connection,
    channel: &ChannelRow,
    settings: &BuildSettings,
) -> AppResult<ChannelEntry> {
    let comments = store::get_comments_with_colon(conn, &channel.channel_id)?;

    let mut videos: HashMap<String, VideoRow> = HashMap::new();
    for comment in &comments {
        if videos.contains_key(&comment.video_id) {
            continue;
        }
        if let Some(video) = store::get_video(conn, &comment.video_id)? {
            videos.insert(video.video_id.clone(), video);
        }
    }

    let mut acc = collect_comment_ranges(
        ChannelAccumulator::new(),
        channel,
        &comments,
        &videos,
        settings.max_duration,
    );

    let auto_detect = AutoDetectSettings::from(settings);
    let videos = store::get_videos_by_channel(conn, &channel.channel_id)?;
    for video in videos.iter().filter(|video| video.embeddable) {
        let events = store::get_live_chat_by_video(conn, &video.video_id)?;
        acc = collect_auto_ranges(acc, channel, video, &events, &auto_detect);
    }

    Ok(acc.into_channel_entry(&channel.channel_id, &MergeSettings::from(settings)))
}

/// Clips of one channel, or `None` when the channel is not in the datastore.
pub fn build_clips(
    conn: &Connection,
    channel_id: &str,
    settings: &BuildSettings,
) -> AppResult<Option<Vec<Clip>>> {
    let channel = match store::get_channel(conn, channel_id)? {
        Some(channel) => channel,
        None => return Ok(None),
    };
    let entry = build_channel_entry(conn, &channel, settings)?;
    Ok(Some(materialize(&entry)))
}

/// Build and publish one channel.
pub fn build_channel(
    conn: &Connection,
    cache_dir: &Path,
    channel_id: &str,
    settings: &BuildSettings,
    rebuild: bool,
) -> AppResult<ChannelReport> {
    let _span = tracing::info_span!("channel", id = channel_id).entered();

    let clips = match build_clips(conn, channel_id, settings)? {
        Some(clips) => clips,
        None => {
            tracing::warn!("channel not found in datastore (channelId = {})", channel_id);
            return Ok(ChannelReport {
                channel_id: channel_id.to_string(),
                status: ChannelStatus::Missing,
                clips: None,
                digest: None,
                error: None,
            });
        }
    };

    let outcome = publish_channel(conn, cache_dir, channel_id, &clips, rebuild)?;
    let status = match outcome {
        PublishOutcome::Published { .. } => ChannelStatus::Published,
        PublishOutcome::Skipped { .. } => ChannelStatus::Skipped,
    };
    Ok(ChannelReport {
        channel_id: channel_id.to_string(),
        status,
        clips: Some(clips.len()),
        digest: Some(outcome.hash().to_string()),
        error: None,
    })
}

/// Build every configured channel, then the index record.
pub async fn build(config: &AppConfig, options: &BuildOptions) -> AppResult<BuildSummary> {
    config.validate()?;
    ensure_grammar()?;
    config.ensure_build_dirs()?;

    let mut seen = HashSet::new();
    let channel_ids: Vec<String> = config
        .channels
        .iter()
        .map(|c| c.channel_id.clone())
        .filter(|id| seen.insert(id.clone()))
        .collect();

    tracing::info!(
        "building {} channels (jobs = {}, rebuild = {})",
        channel_ids.len(),
        options.jobs,
        options.rebuild
    );

    let semaphore = Arc::new(Semaphore::new(options.jobs.max(1)));
    let settings = Arc::new(config.build.clone());
    let database_path = config.database_path.clone();
    let cache_dir = config.cache_dir();

    let mut tasks = JoinSet::new();
    for (position, channel_id) in channel_ids.iter().cloned().enumerate() {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| AppError::Other(format!("worker pool closed: {}", e)))?;
        let settings = Arc::clone(&settings);
        let database_path = database_path.clone();
        let cache_dir = cache_dir.clone();
        let rebuild = options.rebuild;

        tasks.spawn_blocking(move || {
            let _permit = permit;
            let report = run_worker(&database_path, &cache_dir, &channel_id, &settings, rebuild);
            (position, report)
        });
    }

    let mut reports: Vec<(usize, ChannelReport)> = Vec::with_capacity(channel_ids.len());
    while let Some(joined) = tasks.join_next().await {
        let (position, report) =
            joined.map_err(|e| AppError::Build(format!("channel worker panicked: {}", e)))?;
        reports.push((position, report));
    }
    reports.sort_by_key(|(position, _)| *position);
    let channels: Vec<ChannelReport> = reports.into_iter().map(|(_, report)| report).collect();

    let failed = channels
        .iter()
        .filter(|r| r.status == ChannelStatus::Failed)
        .count();
    let any_changed = channels
        .iter()
        .any(|r| r.status == ChannelStatus::Published);

    let index_updated = if failed > 0 {
        tracing::warn!("{} channels failed, index record left untouched", failed);
        false
    } else {
        let conn = store::open(&database_path)?;
        publish_index(&conn, any_changed, options.rebuild)?
    };

    Ok(BuildSummary {
        channels,
        index_updated,
    })
}

fn run_worker(
    database_path: &Path,
    cache_dir: &Path,
    channel_id: &str,
    settings: &BuildSettings,
    rebuild: bool,
) -> ChannelReport {
    let result = store::open(database_path)
        .and_then(|conn| build_channel(&conn, cache_dir, channel_id, settings, rebuild));

    match result {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("can not build channel (channelId = {}): {}", channel_id, e);
            ChannelReport {
                channel_id: channel_id.to_string(),
                status: ChannelStatus::Failed,
                clips: None,
                digest: None,
                error: Some(e.to_string()),
            }
        }
    }
}
