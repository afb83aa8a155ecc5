// System status display: DB file, stored content, key pool.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::db::Database;

/// Display system status to the terminal.
pub async fn show(db: &Arc<dyn Database>, db_path: &str, env_key_count: usize) -> Result<()> {
    if !Path::new(db_path).exists() {
        println!("Database: not initialized");
        println!("\nRun `tubekit init` to set up the database.");
        return Ok(());
    }

    let file_size = std::fs::metadata(db_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Database: {} ({})", db_path, file_size);

    let keys = db.list_api_keys().await?;
    let active = keys.iter().filter(|k| k.active).count();
    println!(
        "API keys: {} from env, {} stored ({} active)",
        env_key_count,
        keys.len(),
        active
    );
    if env_key_count + active == 0 {
        println!("  Set YOUTUBE_API_KEYS or run `tubekit keys add <KEY>`");
    }

    let recent = db.list_content(5).await?;
    if recent.is_empty() {
        println!("Content: none yet");
        println!("  Run `tubekit content create --title ...` to add some");
    } else {
        println!("Recent content ({} most recent):", recent.len());
        for item in &recent {
            let open_reports = item.reactions.reports.iter().filter(|r| !r.fixed).count();
            println!(
                "  {} \"{}\" +{} -{} ({} open reports)",
                item.id,
                crate::output::truncate_chars(&item.title, 40),
                item.reactions.likes,
                item.reactions.unlikes,
                open_reports
            );
        }
    }

    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
