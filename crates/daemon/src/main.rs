//! winlayout Daemon
//!
//! Main daemon process for winlayout.
//!
//! Responsibilities:
//! - Load configuration and saved layouts
//! - Handle IPC commands from the CLI
//! - Drive restore jobs with timer ticks
//! - Watch the display topology and switch layouts on change
//! - Persist layouts after changes settle

use anyhow::Result;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;
use winlayout_core::LayoutBook;
use winlayout_daemon::LayoutStore;
use winlayout_ipc::{IpcCommand, IpcResponse};

/// Events that the daemon event loop processes.
#[cfg_attr(not(windows), allow(dead_code))]
enum DaemonEvent {
    /// An IPC command from a CLI client.
    IpcCommand {
        cmd: IpcCommand,
        responder: oneshot::Sender<IpcResponse>,
    },
    /// The active restore's next step is due.
    RestoreTick,
    /// Pending layout changes have been quiet long enough to write.
    PersistLayouts,
    /// Time to recompute the monitor fingerprint.
    TopologyPoll,
    /// Shutdown signal.
    Shutdown,
}

/// Log filter from `RUST_LOG` when set and valid, else the configured level.
fn log_filter(env: Option<&str>, level: &str) -> EnvFilter {
    env.and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(level))
}

/// Send `event` to the loop after `delay`. Aborting the handle cancels it.
#[cfg_attr(not(windows), allow(dead_code))]
fn schedule_after(
    delay: Duration,
    tx: mpsc::Sender<DaemonEvent>,
    event: DaemonEvent,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = tx.send(event).await;
    })
}

/// Send [`DaemonEvent::TopologyPoll`] every `period`.
#[cfg_attr(not(windows), allow(dead_code))]
fn spawn_topology_poll(period: Duration, tx: mpsc::Sender<DaemonEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            if tx.send(DaemonEvent::TopologyPoll).await.is_err() {
                break; // Channel closed
            }
        }
    })
}

/// Write layouts in the background; failures are logged.
#[cfg_attr(not(windows), allow(dead_code))]
fn persist(store: &LayoutStore, book: &LayoutBook) {
    let store = store.clone();
    let book = book.clone();
    tokio::task::spawn_blocking(move || {
        if let Err(e) = store.save(&book) {
            tracing::warn!("Failed to save layouts: {:#}", e);
        }
    });
}

#[cfg(windows)]
mod server {
    //! Named pipe IPC server.

    use super::DaemonEvent;
    use anyhow::Result;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::windows::named_pipe::{NamedPipeServer, PipeMode, ServerOptions};
    use tokio::sync::{mpsc, oneshot};
    use tracing::{debug, error, warn};
    use winlayout_ipc::{
        decode_line, encode_line, IpcCommand, IpcResponse, IPC_READ_TIMEOUT, MAX_IPC_MESSAGE_SIZE,
        PIPE_NAME,
    };

    const SERIALIZATION_ERROR: &str =
        "{\"status\":\"error\",\"message\":\"Internal serialization error\"}\n";

    /// Run the IPC server, accepting connections and dispatching commands.
    pub(crate) async fn run_ipc_server(event_tx: mpsc::Sender<DaemonEvent>) {
        let mut is_first_instance = true;

        loop {
            // Create a new pipe server instance
            let server = match ServerOptions::new()
                .first_pipe_instance(is_first_instance)
                .pipe_mode(PipeMode::Byte)
                .create(PIPE_NAME)
            {
                Ok(s) => {
                    is_first_instance = false;
                    s
                }
                Err(e) => {
                    error!("Failed to create named pipe server: {}", e);
                    if is_first_instance {
                        error!("Is another winlayout daemon already running?");
                    }
                    tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
                    continue;
                }
            };

            debug!("Waiting for client connection on {}", PIPE_NAME);

            if let Err(e) = server.connect().await {
                error!("Failed to accept client connection: {}", e);
                continue;
            }

            debug!("Client connected");

            let event_tx = event_tx.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_client(server, event_tx).await {
                    warn!("Client handler error: {}", e);
                }
            });
        }
    }

    async fn write_response<W: AsyncWriteExt + Unpin>(writer: &mut W, response: &IpcResponse) -> Result<()> {
        let line = match encode_line(response) {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to serialize IPC response: {}", e);
                SERIALIZATION_ERROR.to_string()
            }
        };
        writer.write_all(line.as_bytes()).await?;
        Ok(())
    }

    /// Handle a single client connection.
    async fn handle_client(pipe: NamedPipeServer, event_tx: mpsc::Sender<DaemonEvent>) -> Result<()> {
        let (reader, mut writer) = tokio::io::split(pipe);
        let limited_reader = reader.take(MAX_IPC_MESSAGE_SIZE as u64);
        let mut reader = BufReader::new(limited_reader);
        let mut line = String::new();

        // Read command (single line of JSON) with timeout and size bound
        let read_result = tokio::time::timeout(IPC_READ_TIMEOUT, reader.read_line(&mut line)).await;
        let bytes_read = match read_result {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                // Timeout: client did not send in time, silently close
                return Ok(());
            }
        };
        if bytes_read == 0 {
            return Ok(()); // Client disconnected
        }

        debug!("Received command: {}", line.trim());

        let cmd: IpcCommand = match decode_line(&line) {
            Ok(cmd) => cmd,
            Err(e) => {
                write_response(&mut writer, &IpcResponse::error(format!("Invalid command: {}", e))).await?;
                return Ok(());
            }
        };

        let is_stop = matches!(cmd, IpcCommand::Stop);
        let (resp_tx, resp_rx) = oneshot::channel();

        if event_tx
            .send(DaemonEvent::IpcCommand {
                cmd,
                responder: resp_tx,
            })
            .await
            .is_err()
        {
            write_response(&mut writer, &IpcResponse::error("Daemon is shutting down")).await?;
            return Ok(());
        }

        let response = match resp_rx.await {
            Ok(resp) => resp,
            Err(_) => IpcResponse::error("Failed to get response from daemon"),
        };
        write_response(&mut writer, &response).await?;

        // The stop reply goes out before the loop exits.
        if is_stop {
            let _ = event_tx.send(DaemonEvent::Shutdown).await;
        }

        Ok(())
    }

    /// Check if another daemon instance is already running by probing the named pipe.
    pub(crate) async fn check_already_running() -> bool {
        tokio::net::windows::named_pipe::ClientOptions::new()
            .open(PIPE_NAME)
            .is_ok()
    }
}

#[cfg(windows)]
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    use tracing::{debug, error, info, warn};
    use winlayout_core::WindowSystem;
    use winlayout_daemon::{AppState, Config, Platform, RestoreProgress};
    use winlayout_ipc::PIPE_NAME;
    use winlayout_platform_win32::{
        desktop_chain, enable_per_monitor_dpi_awareness, ProcessLauncher, Win32WindowSystem,
    };

    // Set DPI awareness before any window/GDI operations
    if let Err(e) = enable_per_monitor_dpi_awareness() {
        eprintln!("[winlayout] Warning: {} (may already be set)", e);
    }

    // Load configuration first (needed for log level)
    let mut config = Config::load().unwrap_or_else(|e| {
        // Can't use tracing yet, fall back to eprintln
        eprintln!("Failed to load configuration: {:#}. Using defaults.", e);
        Config::default()
    });
    let config_warnings = config.validate();

    let env = std::env::var("RUST_LOG").ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(env.as_deref(), &config.behavior.log_level))
        .init();

    for w in &config_warnings {
        warn!("Config: {} - {}", w.field, w.message);
    }

    info!("winlayout daemon starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    if server::check_already_running().await {
        error!("Another winlayoutd instance is already running (pipe {} is active)", PIPE_NAME);
        return Ok(());
    }

    let system = Win32WindowSystem::new();
    let monitors = system.monitors();
    info!("Detected {} monitor(s):", monitors.len());
    for m in &monitors {
        info!(
            "  {}: {}x{} at {},{} (work area: {}x{}, scale {:.2}){}",
            m.device_name,
            m.bounds.width,
            m.bounds.height,
            m.bounds.x,
            m.bounds.y,
            m.work_area.width,
            m.work_area.height,
            m.dpi_scale,
            if m.is_primary { " [PRIMARY]" } else { "" },
        );
    }

    let store = LayoutStore::new(config.layouts_path());
    let book = store.load_or_recover();

    let platform = Platform {
        system: Box::new(system),
        desktops: desktop_chain(config.desktops.use_internal_interface),
        launcher: Some(Box::new(ProcessLauncher::new())),
    };
    let mut state = AppState::new(config, platform, book);

    // Create event channel
    let (event_tx, mut event_rx) = mpsc::channel::<DaemonEvent>(100);

    tokio::spawn(server::run_ipc_server(event_tx.clone()));
    info!("IPC server listening on {}", PIPE_NAME);

    // Install Ctrl+C handler so terminal kill triggers graceful shutdown
    {
        let shutdown_tx = event_tx.clone();
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Ctrl+C received, initiating shutdown...");
                let _ = shutdown_tx.send(DaemonEvent::Shutdown).await;
            }
        });
    }

    let mut topology_poll = spawn_topology_poll(state.config().topology_poll_interval(), event_tx.clone());
    let mut restore_timer: Option<JoinHandle<()>> = None;
    let mut persist_timer: Option<JoinHandle<()>> = None;

    info!("Ready. Use winlayout to send commands.");

    // Main event loop
    while let Some(event) = event_rx.recv().await {
        match event {
            DaemonEvent::IpcCommand { cmd, responder } => {
                let is_reload = matches!(cmd, IpcCommand::Reload);
                let response = state.handle_command(cmd);

                if is_reload && matches!(response, IpcResponse::Ok) {
                    topology_poll.abort();
                    topology_poll =
                        spawn_topology_poll(state.config().topology_poll_interval(), event_tx.clone());
                }

                // Log if client disconnected before receiving response
                if responder.send(response).is_err() {
                    debug!("Client disconnected before receiving IPC response");
                }
            }
            DaemonEvent::RestoreTick => {
                restore_timer = None;
                match state.step_restore() {
                    Some(RestoreProgress::Running { placed, total }) => {
                        debug!(placed, total, "Restore still running");
                    }
                    Some(RestoreProgress::Finished(_)) => {}
                    None => debug!("Restore tick with no active restore"),
                }
            }
            DaemonEvent::TopologyPoll => {
                state.check_topology();
            }
            DaemonEvent::PersistLayouts => {
                persist_timer = None;
                persist(&store, state.book());
            }
            DaemonEvent::Shutdown => {
                info!("Shutdown signal received");
                if let Some(handle) = persist_timer.take() {
                    handle.abort();
                    if let Err(e) = store.save(state.book()) {
                        warn!("Failed to save layouts: {:#}", e);
                    }
                }
                break;
            }
        }

        if let Some(delay) = state.take_scheduled_tick() {
            if let Some(handle) = restore_timer.take() {
                handle.abort();
            }
            restore_timer = Some(schedule_after(delay, event_tx.clone(), DaemonEvent::RestoreTick));
        }

        if state.take_dirty() {
            // Each change re-arms the timer; the write happens once things settle.
            if let Some(handle) = persist_timer.take() {
                handle.abort();
            }
            persist_timer = Some(schedule_after(
                state.config().persistence_debounce(),
                event_tx.clone(),
                DaemonEvent::PersistLayouts,
            ));
        }
    }

    topology_poll.abort();
    if let Some(handle) = restore_timer {
        handle.abort();
    }
    state.abort_restore();

    info!("winlayout daemon shutting down.");
    Ok(())
}

#[cfg(not(windows))]
fn main() -> Result<()> {
    anyhow::bail!("winlayoutd manages Win32 windows and only runs on Windows")
}
