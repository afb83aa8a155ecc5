// Colored terminal output for content, reactions, videos and API keys.
//
// main.rs calls into here for anything more than a one-line confirmation.

use colored::Colorize;

use crate::db::models::{ApiKey, Content, ContentReactions, UserAction};
use crate::quota::Credential;
use crate::youtube::channels::ChannelVideo;
use crate::youtube::videos::VideoMetadata;

/// Display a list of content items, newest first.
pub fn display_content_list(items: &[Content]) {
    if items.is_empty() {
        println!("No content yet. Create some with `tubekit content create`.");
        return;
    }

    println!(
        "\n{}",
        format!("=== Content ({} items) ===", items.len()).bold()
    );
    println!();
    println!(
        "  {:<36}  {:<8}  {:<34}  {:>6}  {:>6}  {:>7}",
        "ID".dimmed(),
        "Kind".dimmed(),
        "Title".dimmed(),
        "Likes".dimmed(),
        "Unlike".dimmed(),
        "Reports".dimmed(),
    );
    println!("  {}", "-".repeat(106).dimmed());

    for item in items {
        let open_reports = item.reactions.reports.iter().filter(|r| !r.fixed).count();
        let reports = if open_reports > 0 {
            open_reports.to_string().red().bold()
        } else {
            item.reactions.reports.len().to_string().normal()
        };
        println!(
            "  {:<36}  {:<8}  {:<34}  {:>6}  {:>6}  {:>7}",
            item.id,
            item.kind,
            super::truncate_chars(&item.title, 31),
            item.reactions.likes.to_string().green(),
            item.reactions.unlikes.to_string().yellow(),
            reports,
        );
    }
    println!();
}

/// Display one content item with its full reaction state.
pub fn display_content_detail(content: &Content) {
    println!("\n{}", format!("=== {} ===", content.title).bold());
    println!("  ID: {}", content.id);
    println!("  Kind: {}", content.kind);
    if let Some(author) = &content.author_id {
        println!("  Author: {author}");
    }
    println!("  Created: {}", content.created_at.dimmed());
    if !content.body.is_empty() {
        println!("\n  {}", super::truncate_chars(&content.body, 280));
    }
    display_reactions(&content.reactions);
}

/// Display counters, per-user entries and the report log.
pub fn display_reactions(reactions: &ContentReactions) {
    println!(
        "\n  {} {}   {} {}",
        "Likes:".bold(),
        reactions.likes.to_string().green(),
        "Unlikes:".bold(),
        reactions.unlikes.to_string().yellow(),
    );

    if !reactions.users.is_empty() {
        println!("\n  Users:");
        for (user, action) in &reactions.users {
            println!("    {:<24} {}", user, colorize_action(*action));
        }
    }

    if !reactions.reports.is_empty() {
        println!("\n  Reports ({}):", reactions.reports.len());
        for report in &reactions.reports {
            let status = if report.fixed {
                "fixed".green()
            } else {
                "open".red().bold()
            };
            println!(
                "    [{}] {} ({}): {}",
                status,
                report.reported_by,
                report.reported_at.dimmed(),
                super::truncate_chars(&report.report_text, 120),
            );
        }
    }
}

/// Display video metadata.
pub fn display_video(video: &VideoMetadata) {
    println!("\n{}", format!("=== {} ===", video.title).bold());
    println!("  Video ID: {}", video.id);
    println!("  Channel: {} ({})", video.channel_title, video.channel_id.dimmed());
    if let Some(published) = &video.published_at {
        println!("  Published: {published}");
    }
    if let Some(secs) = video.duration_secs {
        println!("  Duration: {}", super::format_duration(secs));
    }

    let count = |n: Option<u64>| n.map_or_else(|| "hidden".dimmed().to_string(), |n| n.to_string());
    println!(
        "  Views: {}  Likes: {}  Comments: {}",
        count(video.view_count),
        count(video.like_count),
        count(video.comment_count),
    );

    if !video.tags.is_empty() {
        println!("  Tags: {}", video.tags.join(", ").dimmed());
    }
    if let Some(thumb) = &video.thumbnail_url {
        println!("  Thumbnail: {}", thumb.dimmed());
    }
    if !video.description.is_empty() {
        println!("\n  {}", super::truncate_chars(&video.description, 280));
    }
}

/// Display a channel's uploads or a playlist's items under `heading`.
pub fn display_video_list(heading: &str, videos: &[ChannelVideo]) {
    println!(
        "\n{}",
        format!("=== {} ({} videos) ===", heading, videos.len()).bold()
    );
    println!();
    for (i, video) in videos.iter().enumerate() {
        println!(
            "  {:>4}. {:<11}  {:<25}  {}",
            i + 1,
            video.video_id,
            video.published_at.as_deref().unwrap_or("-").dimmed(),
            super::truncate_chars(&video.title, 60),
        );
    }
    println!();
}

/// Display stored API keys plus how many env keys are in play.
///
/// Tokens are shown masked.
pub fn display_api_keys(stored: &[ApiKey], env_key_count: usize) {
    println!("\n{}", "=== YouTube API keys ===".bold());
    if env_key_count > 0 {
        println!(
            "  {} from YOUTUBE_API_KEYS (tried first)",
            env_key_count.to_string().bold()
        );
    }

    if stored.is_empty() {
        println!("  No keys stored in the database.");
        return;
    }

    println!();
    println!(
        "  {:>4}  {:<10}  {:<8}  {:<20}  {}",
        "ID".dimmed(),
        "Key".dimmed(),
        "Status".dimmed(),
        "Label".dimmed(),
        "Added".dimmed(),
    );
    for key in stored {
        let status = if key.active {
            "active".green()
        } else {
            "disabled".dimmed()
        };
        println!(
            "  {:>4}  {:<10}  {:<8}  {:<20}  {}",
            key.id,
            Credential::new(key.token.as_str()).masked(),
            status,
            key.label.as_deref().unwrap_or("-"),
            key.created_at.dimmed(),
        );
    }
}

fn colorize_action(action: UserAction) -> colored::ColoredString {
    match action {
        UserAction::Like => action.as_str().green(),
        UserAction::Unlike => action.as_str().yellow(),
        UserAction::Report => action.as_str().red(),
    }
}
