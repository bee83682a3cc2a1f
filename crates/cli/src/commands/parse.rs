//! Parse command handler.
//!
//! Runs the time-expression grammar over a piece of text, which is handy when
//! checking why a comment did or did not produce a clip.

use clap::Args;
use clipper_core::{config::AppConfig, AppError, AppResult};
use clipper_engine::{parse_time_ranges, timecode::ensure_grammar, RangeEnd};

/// Extract time ranges from text
#[derive(Args, Debug)]
pub struct ParseCommand {
    /// Text to parse, e.g. "見て 12:34~13:10"
    pub text: String,

    /// Clip length ceiling in seconds (default: build.maxDuration)
    #[arg(long)]
    pub max_duration: Option<u64>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ParseCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing parse command");
        ensure_grammar()?;

        let max_duration = self.max_duration.unwrap_or(config.build.max_duration);
        if max_duration == 0 {
            return Err(AppError::Config(
                "no max duration: pass --max-duration or set build.maxDuration".to_string(),
            ));
        }

        let ranges = parse_time_ranges(&self.text, max_duration);

        if self.json {
            let output: Vec<_> = ranges
                .iter()
                .map(|range| {
                    serde_json::json!({
                        "start": range.start,
                        "end": range.end.seconds(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else if ranges.is_empty() {
            println!("no time ranges found");
        } else {
            for range in &ranges {
                match range.end {
                    RangeEnd::At(end) => println!("{} - {}", range.start, end),
                    RangeEnd::Unknown => println!("{} - ?", range.start),
                }
            }
        }

        Ok(())
    }
}
