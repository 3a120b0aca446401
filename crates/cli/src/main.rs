//! winlayout CLI
//!
//! Command-line interface for saving and restoring window layouts.
//!
//! Commands are sent to the daemon via IPC (named pipe).

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::time::Duration;
use winlayout_ipc::{IpcCommand, IpcResponse, RestoreSummary};

/// How often `restore --wait` polls the daemon.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Give up on `--wait` after this long; a restore takes at most a minute or so.
const WAIT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Parser)]
#[command(name = "winlayout")]
#[command(author, version, about = "Save and restore window layouts")]
struct Cli {
    /// Print daemon responses as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture all current windows under a name
    Save {
        /// Layout name
        name: String,
    },
    /// Move windows back to a saved layout
    Restore {
        /// Layout name
        name: String,
        /// Wait for late windows and print the final report
        #[arg(short, long)]
        wait: bool,
        /// Launch applications whose windows are missing
        #[arg(long, conflicts_with = "no_launch")]
        launch: bool,
        /// Never launch missing applications
        #[arg(long)]
        no_launch: bool,
    },
    /// List saved layouts
    List,
    /// Delete a saved layout
    Delete {
        /// Layout name
        name: String,
    },
    /// Show prior versions of a layout
    History {
        /// Layout name
        name: String,
    },
    /// Make a prior version of a layout current again
    Revert {
        /// Layout name
        name: String,
        /// Version index from `history` (0 = newest)
        #[arg(default_value = "0")]
        index: usize,
    },
    /// Show daemon status
    Status,
    /// Reload configuration
    Reload,
    /// Stop the daemon
    Stop,
}

impl Commands {
    fn to_ipc(&self) -> IpcCommand {
        match self {
            Commands::Save { name } => IpcCommand::SaveLayout { name: name.clone() },
            Commands::Restore {
                name,
                launch,
                no_launch,
                ..
            } => IpcCommand::RestoreLayout {
                name: name.clone(),
                launch_missing: match (*launch, *no_launch) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                },
            },
            Commands::List => IpcCommand::ListLayouts,
            Commands::Delete { name } => IpcCommand::DeleteLayout { name: name.clone() },
            Commands::History { name } => IpcCommand::LayoutHistory { name: name.clone() },
            Commands::Revert { name, index } => IpcCommand::RestoreVersion {
                name: name.clone(),
                index: *index,
            },
            Commands::Status => IpcCommand::QueryStatus,
            Commands::Reload => IpcCommand::Reload,
            Commands::Stop => IpcCommand::Stop,
        }
    }
}

#[cfg(windows)]
async fn send_command(cmd: &IpcCommand) -> Result<IpcResponse> {
    use anyhow::Context;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::windows::named_pipe::ClientOptions;
    use winlayout_ipc::{decode_line, encode_line, IPC_READ_TIMEOUT, MAX_IPC_MESSAGE_SIZE, PIPE_NAME};

    let pipe = ClientOptions::new()
        .open(PIPE_NAME)
        .with_context(|| format!("Failed to connect to {}. Is winlayoutd running?", PIPE_NAME))?;
    let (reader, mut writer) = tokio::io::split(pipe);

    writer.write_all(encode_line(cmd)?.as_bytes()).await?;

    let mut reader = BufReader::new(reader.take(MAX_IPC_MESSAGE_SIZE as u64));
    let mut line = String::new();
    // Restores run their first pass before replying.
    tokio::time::timeout(IPC_READ_TIMEOUT * 6, reader.read_line(&mut line))
        .await
        .context("Timed out waiting for the daemon")??;

    Ok(decode_line(&line)?)
}

#[cfg(not(windows))]
async fn send_command(_cmd: &IpcCommand) -> Result<IpcResponse> {
    bail!("winlayout talks to winlayoutd over a Windows named pipe and only runs on Windows")
}

fn format_timestamp(secs: u64) -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(secs);
    let age = now.saturating_sub(secs);
    match age {
        0..=59 => "just now".to_string(),
        60..=3599 => format!("{} min ago", age / 60),
        3600..=86_399 => format!("{} h ago", age / 3600),
        _ => format!("{} days ago", age / 86_400),
    }
}

fn format_report(report: &RestoreSummary) -> String {
    let mut out = format!(
        "Restored '{}': {}/{} windows placed",
        report.layout, report.placed, report.total
    );
    if report.attempts > 0 {
        out.push_str(&format!(" after {} retries", report.attempts));
    }
    if report.launched > 0 {
        out.push_str(&format!(", {} app(s) launched", report.launched));
    }
    if report.placement_failures > 0 {
        out.push_str(&format!("\n  {} window(s) could not be moved", report.placement_failures));
    }
    for w in &report.unresolved {
        out.push_str(&format!("\n  not found: {} [{}] \"{}\"", w.process, w.class, w.title));
    }
    out
}

/// Human-readable rendering of a response; errors are returned separately.
fn format_response(response: &IpcResponse) -> std::result::Result<String, String> {
    let text = match response {
        IpcResponse::Ok => "OK".to_string(),
        IpcResponse::Error { message } => return Err(message.clone()),
        IpcResponse::Saved {
            name,
            windows,
            replaced,
        } => {
            let verb = if *replaced { "Updated" } else { "Saved" };
            format!("{} '{}' with {} window(s)", verb, name, windows)
        }
        IpcResponse::RestoreStarted { name, placed, total } => format!(
            "Restoring '{}': {}/{} placed, waiting for the rest",
            name, placed, total
        ),
        IpcResponse::RestoreFinished { report } => format_report(report),
        IpcResponse::LayoutList { layouts } if layouts.is_empty() => "No saved layouts".to_string(),
        IpcResponse::LayoutList { layouts } => layouts
            .iter()
            .map(|l| {
                format!(
                    "{:<20} {:>3} window(s)  {:<12} {}  history: {}",
                    l.name,
                    l.windows,
                    format_timestamp(l.timestamp),
                    l.monitor_fingerprint,
                    l.history
                )
            })
            .collect::<Vec<_>>()
            .join("\n"),
        IpcResponse::History { name, versions } if versions.is_empty() => {
            format!("'{}' has no prior versions", name)
        }
        IpcResponse::History { name, versions } => {
            let mut out = format!("Prior versions of '{}':", name);
            for v in versions {
                out.push_str(&format!(
                    "\n  [{}] {} window(s), {}",
                    v.index,
                    v.windows,
                    format_timestamp(v.timestamp)
                ));
            }
            out
        }
        IpcResponse::Status {
            active_restore,
            last_restored,
            last_report,
            layouts,
            monitor_fingerprint,
            uptime_secs,
        } => {
            let mut out = format!(
                "Daemon up {}s, {} layout(s)\nMonitors: {}",
                uptime_secs, layouts, monitor_fingerprint
            );
            if let Some(name) = active_restore {
                out.push_str(&format!("\nRestoring: {}", name));
            }
            if let Some(name) = last_restored {
                out.push_str(&format!("\nLast restored: {}", name));
            }
            if let Some(report) = last_report {
                out.push_str(&format!("\n{}", format_report(report)));
            }
            out
        }
    };
    Ok(text)
}

/// Poll until no restore is active, then return the last report.
async fn wait_for_restore() -> Result<Option<RestoreSummary>> {
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    loop {
        match send_command(&IpcCommand::QueryStatus).await? {
            IpcResponse::Status {
                active_restore: None,
                last_report,
                ..
            } => return Ok(last_report),
            IpcResponse::Status { .. } => {}
            IpcResponse::Error { message } => bail!(message),
            other => bail!("Unexpected response: {:?}", other),
        }
        if tokio::time::Instant::now() >= deadline {
            bail!("Restore still running after {}s", WAIT_TIMEOUT.as_secs());
        }
        tokio::time::sleep(WAIT_POLL_INTERVAL).await;
    }
}

fn print(response: &IpcResponse, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
        if let IpcResponse::Error { message } = response {
            bail!(message.clone());
        }
        return Ok(());
    }
    match format_response(response) {
        Ok(text) => {
            println!("{}", text);
            Ok(())
        }
        Err(message) => bail!(message),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let wait = matches!(cli.command, Commands::Restore { wait: true, .. });

    let response = send_command(&cli.command.to_ipc()).await?;
    print(&response, cli.json)?;

    if wait && matches!(response, IpcResponse::RestoreStarted { .. }) {
        match wait_for_restore().await? {
            Some(report) => print(&IpcResponse::RestoreFinished { report }, cli.json)?,
            None => println!("Restore finished"),
        }
    }

    Ok(())
}
