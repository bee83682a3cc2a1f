//! Show command handler.
//!
//! Displays the publish state recorded for every channel page.

use clap::Args;
use clipper_core::{config::AppConfig, AppError, AppResult};
use clipper_engine::store;

/// Show channel page publish state
#[derive(Args, Debug)]
pub struct ShowCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ShowCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing show command");

        if !config.database_path.exists() {
            return Err(AppError::Config(format!(
                "Datastore does not exist: {:?}",
                config.database_path
            )));
        }

        let conn = store::open(&config.database_path)?;
        let pages = store::list_channel_pages(&conn)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&pages)?);
            return Ok(());
        }

        if pages.is_empty() {
            println!("no channel pages published yet");
            return Ok(());
        }

        println!("{:<28} {:<6} {:<14} {}", "CHANNEL", "DIRTY", "DIGEST", "EXTERNAL REF");
        for page in &pages {
            let digest: String = page.content_hash.chars().take(12).collect();
            let reference = page
                .external_ref_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<28} {:<6} {:<14} {}",
                page.channel_id, page.dirty, digest, reference
            );
        }

        Ok(())
    }
}
