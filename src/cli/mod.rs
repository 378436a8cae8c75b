use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config;
use crate::storage;

#[derive(Parser)]
#[command(name = "medialib")]
#[command(version = "0.1")]
#[command(about = "Personal media library backend")]
pub struct Cli {
    /// Path to the config TOML file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run http server hosting the library
    Serve,
    /// List tracks uploaded by a user
    Tracks {
        #[arg(short, long)]
        owner: String,
    },
    /// List playlists of a user
    Playlists {
        #[arg(short, long)]
        owner: String,
    },
    /// List favorite track ids of a user
    Favorites {
        #[arg(short, long)]
        owner: String,
    },
}

/// Entrypoint for CLI
pub fn run() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let cfg = config::Config::load(&cli.config)?;

    let store = storage::connect(&cfg.database).with_context(|| "Failed to open document store")?;

    match &cli.command {
        Commands::Serve => {
            let http_server = crate::http::server::HttpServer::new(store, cfg.media, cfg.http);

            println!(
                "HTTP server running at http://{}:{}",
                http_server.config.bind_addr, http_server.config.port
            );
            http_server.run();
        }

        Commands::Tracks { owner } => {
            let tracks = store.tracks().get_by_owner(owner)?;
            println!("{} track(s) of {owner}:", tracks.len());
            for track in tracks {
                println!(
                    "  {}  {} - {} [{}]",
                    track.id,
                    track.artist,
                    track.title,
                    track.file_path.to_string_lossy()
                );
            }
        }

        Commands::Playlists { owner } => {
            let playlists = store.playlists().get_by_owner(owner)?;
            println!("{} playlist(s) of {owner}:", playlists.len());
            for playlist in playlists {
                println!(
                    "  {}  {} ({} tracks, created {})",
                    playlist.id,
                    playlist.name,
                    playlist.track_refs.len(),
                    playlist.id.created_at().with_timezone(&chrono::Local)
                );
            }
        }

        Commands::Favorites { owner } => {
            let favorites = store.favorites().get_by_owner(owner)?;
            println!("{} favorite(s) of {owner}:", favorites.len());
            for track_id in favorites {
                println!("  {track_id}");
            }
        }
    }

    Ok(())
}
