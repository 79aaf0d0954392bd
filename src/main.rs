mod config;
mod database;
mod entities;
mod error;
mod logging;
mod ports;
mod services;
mod spotify_rs;
#[cfg(test)]
mod test_utils;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};

use crate::{
    config::{Config, ConfigError},
    database::Database,
    logging::setup_logging,
    ports::spotify::PlaylistTarget,
    services::{engine::PlaylistEngine, ordering},
    spotify_rs::{
        auth::{exchange_code_for_token, initiate_oauth, parse_redirect, refresh_access_token},
        client::SpotifyWebClient,
    },
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, env = "PLAYLIST_SORTER_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Console log level (default: off)
    #[arg(long, default_value = "off", global = true, env = "LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// File log level (default: debug)
    #[arg(long, default_value = "debug", global = true)]
    log_file_level: log::LevelFilter,

    /// Path to log file
    #[arg(long, env = "PLAYLIST_SORTER_LOG_FILE", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch and list your playlists
    Playlists,
    /// Fetch and list the tracks of a playlist, or of your liked songs
    Tracks {
        /// Playlist id, liked songs when omitted
        #[arg(short, long)]
        playlist: Option<String>,
    },
    /// List the available orderings
    Orderings,
    /// Reorder a playlist, or your liked songs
    Reorder {
        /// Playlist id, liked songs when omitted
        #[arg(short, long)]
        playlist: Option<String>,

        /// Ordering name, see `orderings`
        #[arg(short, long)]
        ordering: String,

        /// Print the resolved order without changing anything on Spotify
        #[arg(long)]
        dry_run: bool,

        /// Reuse the mirrored tracks instead of fetching them again
        #[arg(long)]
        skip_fetch: bool,
    },
    /// Pick a playlist and an ordering interactively
    Sort,
    /// Authorize with Spotify and store the refresh token in the config file
    Login,
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    setup_logging(args.log_level, args.log_file.clone(), args.log_file_level)?;

    log::debug!("Playlist sorter starting");

    let config_path = match args.config {
        Some(path) => path,
        None => Config::config_path().ok_or(ConfigError::NoConfigDirectory)?,
    };

    match args.command {
        Commands::Playlists => {
            let engine = connect(&config_path).await?;
            for (index, entry) in engine.list_playlists().await?.iter().enumerate() {
                match entry.target().playlist_id() {
                    Some(id) => println!("{index:>3}  {entry}  [{id}]"),
                    None => println!("{index:>3}  {entry}"),
                }
            }
        }
        Commands::Tracks { playlist } => {
            let engine = connect(&config_path).await?;
            let target = PlaylistTarget::from_playlist_id(playlist);
            for track in engine.fetch_tracks(&target).await? {
                println!(
                    "{}  {} - {} ({}, {})",
                    track.id, track.artists, track.name, track.album, track.release_date
                );
            }
        }
        Commands::Orderings => {
            for (index, named) in ordering::catalog().iter().enumerate() {
                println!("{index:>3}  {:<14} {}", named.name, named.order);
            }
        }
        Commands::Reorder {
            playlist,
            ordering: ordering_name,
            dry_run,
            skip_fetch,
        } => {
            let engine = connect(&config_path).await?;
            let target = PlaylistTarget::from_playlist_id(playlist);

            if dry_run {
                ordering::resolve(&ordering_name, &target)?;
                if !skip_fetch {
                    engine.fetch_tracks(&target).await?;
                }
                let (order, tracks) = engine.preview(&target, &ordering_name).await?;
                println!("ORDER BY {order}");
                for track in tracks {
                    println!("{}  {} - {}", track.id, track.artists, track.name);
                }
            } else {
                let summary = if skip_fetch {
                    engine.reorder_mirrored(&target, &ordering_name).await?
                } else {
                    engine.reorder(&target, &ordering_name).await?
                };
                println!(
                    "Reordered {target}: removed {} and added {} tracks",
                    summary.removed, summary.added
                );
            }
        }
        Commands::Sort => {
            let engine = connect(&config_path).await?;
            let entries = engine.list_playlists().await?;
            for (index, entry) in entries.iter().enumerate() {
                println!("{index:>3}  {entry}");
            }
            let entry = &entries[prompt_index("Playlist", entries.len())?];

            let orderings = engine.list_orderings();
            for (index, name) in orderings.iter().enumerate() {
                println!("{index:>3}  {name}");
            }
            let ordering_name = orderings[prompt_index("Ordering", orderings.len())?];

            let summary = engine.reorder(&entry.target(), ordering_name).await?;
            println!(
                "Reordered {}: removed {} and added {} tracks",
                entry.name(),
                summary.removed,
                summary.added
            );
        }
        Commands::Login => {
            let mut config = load_config(&config_path)?;
            login(&mut config, &config_path).await?;
        }
        Commands::Config(config_commands) => match config_commands {
            ConfigCommands::CreateDefault => {
                log::debug!("Creating default config");
                if Config::create_default(&config_path)? {
                    println!("Created {}", config_path.display());
                } else {
                    println!("{} already exists", config_path.display());
                }
            }
            ConfigCommands::Path => println!("{}", config_path.display()),
        },
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<Config> {
    log::debug!("Loading configuration from: {}", path.display());
    Config::from_file(path).with_context(|| "Failed to load playlist-sorter config")
}

/// Open the session every engine command runs in: a fresh access token and the mirror.
async fn connect(config_path: &Path) -> Result<PlaylistEngine<SpotifyWebClient>> {
    let config = load_config(config_path)?;

    let token = refresh_access_token(
        &config.client_id,
        &config.client_secret,
        config.refresh_token()?,
    )
    .await
    .wrap_err("Failed to refresh the Spotify access token")?;
    log::debug!("Access token valid for {}s", token.expires_in);
    let client = SpotifyWebClient::new(token.access_token, token.expires_in);

    let database = Database::open(&config.database_path())
        .await
        .wrap_err("Failed to open the mirror database")?;
    Ok(PlaylistEngine::new(Arc::new(database), client))
}

async fn login(config: &mut Config, config_path: &Path) -> Result<()> {
    let (auth, session) = initiate_oauth(&config.client_id, &config.redirect_uri);
    println!(
        "Open this url in your browser and authorize the app:\n\n{}\n",
        auth.auth_url
    );

    let redirect = prompt("Paste the url you were redirected to")?;
    let code = parse_redirect(&redirect, &session)?;

    let token = exchange_code_for_token(
        &config.client_id,
        &config.client_secret,
        &code,
        &config.redirect_uri,
        &session,
    )
    .await?;
    log::debug!("Granted scopes: {}", token.scope);
    let refresh_token = token
        .refresh_token
        .ok_or_else(|| eyre!("Spotify did not return a refresh token"))?;

    config.refresh_token = Some(refresh_token);
    config.save(config_path)?;
    log::info!("Stored refresh token in {}", config_path.display());
    println!("Logged in, refresh token saved to {}", config_path.display());
    Ok(())
}

fn prompt(message: &str) -> Result<String> {
    print!("{message}: ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .wrap_err("Failed to read from stdin")?;
    Ok(line.trim().to_string())
}

fn prompt_index(message: &str, len: usize) -> Result<usize> {
    let answer = prompt(message)?;
    match answer.parse::<usize>() {
        Ok(index) if index < len => Ok(index),
        _ => Err(eyre!(
            "`{answer}` is not a number between 0 and {}",
            len.saturating_sub(1)
        )),
    }
}
