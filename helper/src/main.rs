use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use postern_lib::common::AppResult;
use postern_lib::config::HelperConfig;
use postern_lib::settings::{FileSettingsStore, SettingsStore};

#[derive(Parser, Debug)]
#[command(name = "postern-helper", version, about = "Privileged local command helper")]
struct Args {
    /// Socket path (overrides config and POSTERN_SOCKET)
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    /// Config file (default ~/.postern/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve requests on the socket (default)
    Serve,
    /// Refuse every request until resumed
    Pause,
    /// Accept requests again
    Resume,
    /// Print the current settings, optionally setting the default sound
    Settings {
        /// Default notification sound; an empty string clears it
        #[arg(long)]
        default_sound: Option<String>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> AppResult<()> {
    let mut config = HelperConfig::load(args.config.as_deref())?;
    if let Some(socket) = args.socket {
        config.socket_path = Some(socket);
    }

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(postern_lib::serve(config))
        }
        Command::Pause => {
            FileSettingsStore::open(config.settings_path()?).set_paused(true)?;
            println!("paused");
            Ok(())
        }
        Command::Resume => {
            FileSettingsStore::open(config.settings_path()?).set_paused(false)?;
            println!("resumed");
            Ok(())
        }
        Command::Settings { default_sound } => {
            let store = FileSettingsStore::open(config.settings_path()?);
            if let Some(sound) = default_sound {
                store.set_default_sound(Some(sound).filter(|s| !s.is_empty()))?;
            }
            println!("{}", serde_json::to_string_pretty(&store.snapshot())?);
            Ok(())
        }
    }
}
