mod logging;
mod watch;

use std::error::Error;

use clap::{Parser, Subcommand};
use tsuzuki_core::config::AppConfig;
use tsuzuki_core::models::{LinkButton, MAX_CANDIDATE_LINKS};

use crate::watch::Playlist;

#[derive(Parser)]
#[command(name = "tsuzuki", version, about = "Watch in mpv, show it on Discord")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play one or more episodes in order
    Play {
        /// Files or URLs, one per episode
        #[arg(required = true)]
        targets: Vec<String>,
        /// Series title (defaults to the file name)
        #[arg(long)]
        title: Option<String>,
        /// Label of the first episode; numbers count up per target
        #[arg(long, default_value = "1")]
        episode: String,
        /// Cover art URL shown as the large image
        #[arg(long)]
        artwork: Option<String>,
        /// Episode length in seconds, used until mpv reports one
        #[arg(long, default_value_t = 0)]
        duration: u64,
        /// Link button as Label=URL (repeatable)
        #[arg(long = "link", value_parser = parse_link)]
        links: Vec<LinkButton>,
        /// Do not touch Discord at all
        #[arg(long)]
        no_presence: bool,
    },
    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the config file location
    Path,
    /// Write the default config (overwrites an existing file)
    Init,
}

fn parse_link(value: &str) -> Result<LinkButton, String> {
    LinkButton::parse(value).ok_or_else(|| format!("expected Label=https://..., got `{value}`"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Config { action } => match action {
            ConfigAction::Path => println!("{}", AppConfig::config_path().display()),
            ConfigAction::Init => {
                let path = AppConfig::default().save()?;
                println!("Wrote {}", path.display());
            }
        },
        Command::Play {
            targets,
            title,
            episode,
            artwork,
            duration,
            links,
            no_presence,
        } => {
            let _guard = logging::init_logging();
            let config = AppConfig::load()?;

            if links.len() > MAX_CANDIDATE_LINKS {
                tracing::warn!(
                    given = links.len(),
                    kept = MAX_CANDIDATE_LINKS,
                    "Too many links, ignoring the rest"
                );
            }
            let playlist = Playlist {
                targets,
                title,
                first_episode: episode,
                artwork_url: artwork,
                duration_hint: duration,
                links,
            };
            watch::run(&config, &playlist, !no_presence).await?;
        }
    }

    Ok(())
}
