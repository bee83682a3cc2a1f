//! Build command handler.
//!
//! Runs every tracked channel through the clip engine and publishes the
//! channels whose clip list changed.

use clap::Args;
use clipper_core::{config::AppConfig, AppError, AppResult};
use clipper_engine::{BuildOptions, ChannelStatus};

/// Build clip lists for all tracked channels
#[derive(Args, Debug)]
pub struct BuildCommand {
    /// Republish every channel even when its digest is unchanged
    #[arg(long)]
    pub rebuild: bool,

    /// Number of channels built in parallel
    #[arg(short, long, default_value_t = 4)]
    pub jobs: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl BuildCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing build command");
        tracing::debug!("Build options: {:?}", self);

        let options = BuildOptions {
            rebuild: self.rebuild,
            jobs: self.jobs,
        };
        let summary = clipper_engine::build(config, &options).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            for report in &summary.channels {
                match report.status {
                    ChannelStatus::Published => println!(
                        "published  {}  ({} clips)",
                        report.channel_id,
                        report.clips.unwrap_or(0)
                    ),
                    ChannelStatus::Skipped => println!("unchanged  {}", report.channel_id),
                    ChannelStatus::Missing => println!("missing    {}", report.channel_id),
                    ChannelStatus::Failed => println!(
                        "failed     {}: {}",
                        report.channel_id,
                        report.error.as_deref().unwrap_or("unknown error")
                    ),
                }
            }
            println!();
            println!(
                "{} published, {} unchanged, {} missing, {} failed; index {}",
                summary.count(ChannelStatus::Published),
                summary.count(ChannelStatus::Skipped),
                summary.count(ChannelStatus::Missing),
                summary.count(ChannelStatus::Failed),
                if summary.index_updated {
                    "marked dirty"
                } else {
                    "unchanged"
                }
            );
        }

        if summary.has_failures() {
            return Err(AppError::Build(format!(
                "{} channels failed to build",
                summary.count(ChannelStatus::Failed)
            )));
        }

        Ok(())
    }
}
