use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::sync::Arc;
use tracing::info;

use tubekit::config::Config;
use tubekit::db::models::NewContent;
use tubekit::db::Database;
use tubekit::quota::credential::load_credentials;
use tubekit::quota::{Credential, QuotaRotatingFetcher};
use tubekit::reactions::{LedgerOptions, ReactionLedger};
use tubekit::youtube::client::YouTubeClient;

/// Tubekit: YouTube Data API access with key rotation, and a reaction
/// ledger for platform content.
#[derive(Parser)]
#[command(name = "tubekit", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Show system status (DB, key pool, recent content)
    Status,

    /// Fetch metadata for a YouTube video
    Video {
        /// The video ID (e.g. dQw4w9WgXcQ)
        video_id: String,

        /// Print raw JSON instead of the formatted view
        #[arg(long)]
        json: bool,
    },

    /// List a channel's uploads, newest first
    ChannelVideos {
        /// The channel ID (e.g. UC...)
        channel_id: String,

        /// Maximum number of videos to list (default: 50)
        #[arg(long, default_value = "50")]
        max: usize,

        /// Print raw JSON instead of the formatted view
        #[arg(long)]
        json: bool,
    },

    /// List a playlist's items in playlist order
    PlaylistVideos {
        /// The playlist ID (e.g. PL...)
        playlist_id: String,

        /// Maximum number of videos to list (default: 50)
        #[arg(long, default_value = "50")]
        max: usize,

        /// Print raw JSON instead of the formatted view
        #[arg(long)]
        json: bool,
    },

    /// Manage stored YouTube API keys
    Keys {
        #[command(subcommand)]
        action: KeyCommands,
    },

    /// Manage content items
    Content {
        #[command(subcommand)]
        action: ContentCommands,
    },

    /// Apply a reaction (like, unlike, report) to a content item
    React {
        content_id: String,

        /// The acting user's ID
        #[arg(long)]
        user: String,

        /// like | unlike | report
        action: String,

        /// Report text (required for `report`)
        #[arg(long)]
        text: Option<String>,
    },

    /// Mark a user's report on a content item as fixed
    FixReport {
        content_id: String,

        /// The user who filed the report
        #[arg(long)]
        reported_by: String,
    },

    /// Start the JSON API server
    #[cfg(feature = "web")]
    Serve {
        /// Port to listen on (default: 8080)
        #[arg(long, default_value = "8080")]
        port: u16,

        /// Address to bind (default: 127.0.0.1)
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
    },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// List stored keys (masked)
    List,
    /// Store a new key
    Add {
        token: String,
        #[arg(long)]
        label: Option<String>,
    },
    /// Put a stored key back into rotation
    Enable { id: i64 },
    /// Take a stored key out of rotation
    Disable { id: i64 },
}

#[derive(Subcommand)]
enum ContentCommands {
    /// Create a content item
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        body: String,
        #[arg(long, default_value = "blog")]
        kind: String,
        #[arg(long)]
        author: Option<String>,
    },
    /// Show one item with its reactions
    Show { id: String },
    /// List the newest items
    List {
        #[arg(long, default_value = "20")]
        limit: u32,
    },
    /// Delete an item and its reactions
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tubekit=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            info!("Initializing Tubekit database...");
            let config = Config::load()?;
            let db = tubekit::db::initialize_sqlite(&config.db_path)?;
            let table_count = db.table_count().await?;
            println!("Database initialized at: {}", config.db_path);
            println!("Tables created: {table_count}");
            println!("\nNext step: add YouTube API keys, either in .env as");
            println!("  YOUTUBE_API_KEYS=key1,key2");
            println!("or with: tubekit keys add <KEY>");
        }

        Commands::Status => {
            let config = Config::load()?;
            let db = tubekit::db::open_sqlite(&config.db_path)?;
            tubekit::status::show(&db, &config.db_path, config.youtube_api_keys.len()).await?;
        }

        Commands::Video { video_id, json } => {
            let config = Config::load()?;
            let db = tubekit::db::open_sqlite(&config.db_path)?;
            let credentials = youtube_credentials(&config, &db).await?;
            let client = YouTubeClient::new(&config.youtube_api_url)?;
            let fetcher = QuotaRotatingFetcher::new(config.fatal_policy());
            let deadline = config.fetch_deadline();

            let video = tubekit::youtube::videos::fetch_video(
                &client,
                &fetcher,
                &credentials,
                deadline.token(),
                &video_id,
            )
            .await?;

            match video {
                Some(video) if json => println!("{}", serde_json::to_string_pretty(&video)?),
                Some(video) => tubekit::output::terminal::display_video(&video),
                None => anyhow::bail!("No video found with ID {video_id}"),
            }
        }

        Commands::ChannelVideos {
            channel_id,
            max,
            json,
        } => {
            let config = Config::load()?;
            let db = tubekit::db::open_sqlite(&config.db_path)?;
            let credentials = youtube_credentials(&config, &db).await?;
            let client = YouTubeClient::new(&config.youtube_api_url)?;
            let fetcher = QuotaRotatingFetcher::new(config.fatal_policy());
            let deadline = config.fetch_deadline();

            let videos = tubekit::youtube::channels::fetch_channel_uploads(
                &client,
                &fetcher,
                &credentials,
                deadline.token(),
                &channel_id,
                Some(max.max(1)),
            )
            .await?;

            match videos {
                Some(videos) if json => println!("{}", serde_json::to_string_pretty(&videos)?),
                Some(videos) => tubekit::output::terminal::display_video_list(
                    &format!("Uploads for {channel_id}"),
                    &videos,
                ),
                None => anyhow::bail!("No channel found with ID {channel_id}"),
            }
        }

        Commands::PlaylistVideos {
            playlist_id,
            max,
            json,
        } => {
            let config = Config::load()?;
            let db = tubekit::db::open_sqlite(&config.db_path)?;
            let credentials = youtube_credentials(&config, &db).await?;
            let client = YouTubeClient::new(&config.youtube_api_url)?;
            let fetcher = QuotaRotatingFetcher::new(config.fatal_policy());
            let deadline = config.fetch_deadline();

            let videos = tubekit::youtube::channels::fetch_playlist_videos(
                &client,
                &fetcher,
                &credentials,
                deadline.token(),
                &playlist_id,
                Some(max.max(1)),
            )
            .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&videos)?);
            } else {
                tubekit::output::terminal::display_video_list(
                    &format!("Playlist {playlist_id}"),
                    &videos,
                );
            }
        }

        Commands::Keys { action } => {
            let config = Config::load()?;
            let db = tubekit::db::open_sqlite(&config.db_path)?;
            run_key_command(action, &config, &db).await?;
        }

        Commands::Content { action } => {
            let config = Config::load()?;
            let db = tubekit::db::open_sqlite(&config.db_path)?;
            run_content_command(action, &db).await?;
        }

        Commands::React {
            content_id,
            user,
            action,
            text,
        } => {
            let config = Config::load()?;
            let db = tubekit::db::open_sqlite(&config.db_path)?;
            let ledger = ledger_for(&config, &db);

            let reactions = ledger
                .apply_action(&content_id, &user, &action, text.as_deref())
                .await?;
            println!("{} {} by {}", "✓".green(), action.bold(), user);
            tubekit::output::terminal::display_reactions(&reactions);
        }

        Commands::FixReport {
            content_id,
            reported_by,
        } => {
            let config = Config::load()?;
            let db = tubekit::db::open_sqlite(&config.db_path)?;
            let ledger = ledger_for(&config, &db);

            let reactions = ledger.mark_report_fixed(&content_id, &reported_by).await?;
            println!("{} Report from {} marked fixed", "✓".green(), reported_by);
            tubekit::output::terminal::display_reactions(&reactions);
        }

        #[cfg(feature = "web")]
        Commands::Serve { port, bind } => {
            let config = Config::load()?;
            let db = tubekit::db::initialize_sqlite(&config.db_path)?;
            tubekit::web::run_server(config, db, port, &bind).await?;
        }
    }

    Ok(())
}

async fn run_key_command(action: KeyCommands, config: &Config, db: &Arc<dyn Database>) -> Result<()> {
    match action {
        KeyCommands::List => {
            let keys = db.list_api_keys().await?;
            tubekit::output::terminal::display_api_keys(&keys, config.youtube_api_keys.len());
        }
        KeyCommands::Add { token, label } => {
            let token = token.trim();
            if token.is_empty() {
                anyhow::bail!("Key token is empty");
            }
            let id = db
                .add_api_key(label.as_deref(), token)
                .await
                .context("Failed to store key (is it already stored?)")?;
            println!(
                "{} Stored key {} as #{id}",
                "✓".green(),
                Credential::new(token).masked()
            );
        }
        KeyCommands::Enable { id } => set_key_active(db, id, true).await?,
        KeyCommands::Disable { id } => set_key_active(db, id, false).await?,
    }
    Ok(())
}

async fn set_key_active(db: &Arc<dyn Database>, id: i64, active: bool) -> Result<()> {
    if !db.set_api_key_active(id, active).await? {
        anyhow::bail!("No stored key with ID {id}");
    }
    let state = if active {
        "enabled".green()
    } else {
        "disabled".yellow()
    };
    println!("{} Key #{id} {state}", "✓".green());
    Ok(())
}

async fn run_content_command(action: ContentCommands, db: &Arc<dyn Database>) -> Result<()> {
    match action {
        ContentCommands::Create {
            title,
            body,
            kind,
            author,
        } => {
            let id = uuid::Uuid::new_v4().to_string();
            let content = db
                .insert_content(
                    &id,
                    &NewContent {
                        kind,
                        title,
                        body,
                        author_id: author,
                    },
                )
                .await?;
            println!("{} Created content {}", "✓".green(), content.id.bold());
        }
        ContentCommands::Show { id } => match db.get_content(&id).await? {
            Some(content) => tubekit::output::terminal::display_content_detail(&content),
            None => anyhow::bail!("No content with ID {id}"),
        },
        ContentCommands::List { limit } => {
            let items = db.list_content(limit).await?;
            tubekit::output::terminal::display_content_list(&items);
        }
        ContentCommands::Delete { id } => {
            if !db.delete_content(&id).await? {
                anyhow::bail!("No content with ID {id}");
            }
            println!("{} Deleted content {id}", "✓".green());
        }
    }
    Ok(())
}

/// Load the rotation list, or bail with a helpful message if it's empty.
async fn youtube_credentials(config: &Config, db: &Arc<dyn Database>) -> Result<Vec<Credential>> {
    let credentials = load_credentials(&config.youtube_api_keys, db.as_ref()).await?;
    config.require_youtube_keys(credentials.len())?;
    info!(keys = credentials.len(), "YouTube key pool ready");
    Ok(credentials)
}

fn ledger_for(config: &Config, db: &Arc<dyn Database>) -> ReactionLedger {
    ReactionLedger::with_options(
        db.clone(),
        LedgerOptions {
            report_policy: config.report_policy,
            ..LedgerOptions::default()
        },
    )
}
