use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use postern_protocol::{
    CapabilityKind, EnsurePermissionsParams, NotifyParams, Request, Response, RunShellParams,
    ScreenshotParams, SocketClient,
};

#[derive(Parser, Debug)]
#[command(name = "postern", version, about = "Talk to the Postern helper")]
struct Args {
    /// Helper socket (default ~/.postern/postern.sock)
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Post a desktop notification
    Notify {
        #[arg(long)]
        title: String,
        #[arg(long)]
        body: String,
        /// Sound name; an empty string posts silently
        #[arg(long)]
        sound: Option<String>,
    },
    /// Check (and with --interactive, request) capabilities
    EnsurePermissions {
        /// notifications, accessibility, screenRecording
        #[arg(required = true)]
        capabilities: Vec<String>,
        #[arg(long)]
        interactive: bool,
    },
    /// Check the helper is up and not paused
    Status,
    /// Capture a PNG screenshot
    Screenshot {
        #[arg(long)]
        display_id: Option<u32>,
        #[arg(long)]
        window_id: Option<u32>,
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Run a command through the helper
    Run {
        #[arg(long)]
        cwd: Option<String>,
        /// KEY=VALUE; when given at least once it replaces the environment
        #[arg(long = "env")]
        env: Vec<String>,
        /// Seconds before the command is terminated
        #[arg(long)]
        timeout: Option<f64>,
        #[arg(long)]
        requires_screen_capture: bool,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

fn parse_capabilities(names: &[String]) -> anyhow::Result<BTreeSet<CapabilityKind>> {
    names
        .iter()
        .map(|name| {
            CapabilityKind::parse(name).with_context(|| format!("unknown capability: {}", name))
        })
        .collect()
}

fn parse_env(pairs: &[String]) -> anyhow::Result<Option<BTreeMap<String, String>>> {
    if pairs.is_empty() {
        return Ok(None);
    }
    let mut env = BTreeMap::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("expected KEY=VALUE, got {}", pair);
        };
        env.insert(key.to_string(), value.to_string());
    }
    Ok(Some(env))
}

/// Build the request; for screenshots also return where the image goes.
fn build_request(command: Command) -> anyhow::Result<(Request, Option<PathBuf>)> {
    let request = match command {
        Command::Notify { title, body, sound } => {
            Request::Notify(NotifyParams { title, body, sound })
        }
        Command::EnsurePermissions {
            capabilities,
            interactive,
        } => Request::EnsurePermissions(EnsurePermissionsParams {
            capabilities: parse_capabilities(&capabilities)?,
            interactive,
        }),
        Command::Status => Request::Status,
        Command::Screenshot {
            display_id,
            window_id,
            output,
        } => {
            let request = Request::Screenshot(ScreenshotParams {
                display_id,
                window_id,
            });
            return Ok((request, Some(output)));
        }
        Command::Run {
            cwd,
            env,
            timeout,
            requires_screen_capture,
            command,
        } => Request::RunShell(RunShellParams {
            command,
            cwd,
            env: parse_env(&env)?,
            timeout_seconds: timeout,
            requires_screen_capture_permission: requires_screen_capture,
        }),
    };
    Ok((request, None))
}

fn report(response: &Response, output: Option<PathBuf>) -> anyhow::Result<()> {
    if let Some(message) = &response.message {
        if response.ok {
            println!("{}", message);
        } else {
            eprintln!("{}", message);
        }
    }
    let Some(payload) = &response.payload else {
        return Ok(());
    };
    match output {
        Some(path) => std::fs::write(&path, payload)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(payload)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

async fn run(args: Args) -> anyhow::Result<bool> {
    let (request, output) = build_request(args.command)?;
    let mut client = match &args.socket {
        Some(path) => SocketClient::connect_to(path).await?,
        None => SocketClient::connect().await?,
    };
    tracing::debug!(method = request.method(), "Sending request");

    let response = client.send(&request).await?;
    report(&response, output)?;
    Ok(response.ok)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Args::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("postern: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
