//! Unix domain socket server for control panels
//!
//! Provides request-response communication and push notifications of
//! status and controller events to subscribed panels. Panel input is
//! forwarded to the coordinator's input channel, never dispatched here.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::events::ControllerEvent;
use crate::state::{InputEvent, ModeSnapshot, Status, StatusCell};

use super::protocol::{Notification, PanelStatus, Request, Response, MAX_FRAME_LEN};

/// Controller handles the panel server reads from and writes to
pub struct PanelHandles {
    pub input_tx: mpsc::Sender<InputEvent>,
    pub status: StatusCell,
    pub snapshot_rx: watch::Receiver<ModeSnapshot>,
    pub event_tx: broadcast::Sender<ControllerEvent>,
    pub speech_available: bool,
}

/// Shared per-server state
struct PanelContext {
    handles: PanelHandles,
    start_time: Instant,
}

/// Control panel server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    context: Arc<PanelContext>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Bind the panel socket
    pub fn new(socket_path: &Path, handles: PanelHandles) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "control panel listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            context: Arc::new(PanelContext {
                handles,
                start_time: Instant::now(),
            }),
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("panel connected");
                    let context = Arc::clone(&self.context);
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, context) => {
                                if let Err(e) = result {
                                    warn!(?e, "panel handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("panel handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single panel connection
    async fn handle_client(stream: UnixStream, context: Arc<PanelContext>) -> Result<()> {
        let (mut reader, mut writer) = stream.into_split();

        // frames are read on their own task so a partial read is never
        // cancelled by a notification
        let (request_tx, mut request_rx) = mpsc::channel::<Result<Request, String>>(8);
        let _reader = AbortOnDrop(tokio::spawn(async move {
            loop {
                match read_frame(&mut reader).await {
                    Ok(Some(body)) => {
                        let request =
                            serde_json::from_slice::<Request>(&body).map_err(|e| e.to_string());
                        if request_tx.send(request).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("panel disconnected");
                        break;
                    }
                    Err(e) => {
                        warn!(?e, "panel read error, disconnecting");
                        break;
                    }
                }
            }
        }));

        let mut status_rx: Option<watch::Receiver<Status>> = None;
        let mut event_rx: Option<broadcast::Receiver<ControllerEvent>> = None;

        loop {
            tokio::select! {
                request = request_rx.recv() => {
                    let response = match request {
                        Some(Ok(request)) => {
                            debug!(?request, "received request");
                            if request == Request::Subscribe && status_rx.is_none() {
                                let mut rx = context.handles.status.subscribe();
                                rx.borrow_and_update();
                                status_rx = Some(rx);
                                event_rx = Some(context.handles.event_tx.subscribe());
                                debug!("panel subscribed to notifications");
                            }
                            Self::process_request(request, &context).await
                        }
                        Some(Err(e)) => Response::Error {
                            code: "bad_request".to_string(),
                            message: e,
                        },
                        None => return Ok(()),
                    };
                    write_frame(&mut writer, &response).await?;
                }
                Some(status) = next_status(&mut status_rx) => {
                    let notification = Notification::StatusChanged { status };
                    write_frame(&mut writer, &Response::Notification(notification)).await?;
                }
                Some(event) = next_event(&mut event_rx) => {
                    let notification = Notification::Event { event };
                    write_frame(&mut writer, &Response::Notification(notification)).await?;
                }
            }
        }
    }

    /// Process a request and return a response
    async fn process_request(request: Request, context: &PanelContext) -> Response {
        let handles = &context.handles;

        let input = match request {
            Request::Ping => return Response::Pong,
            Request::Subscribe => return Response::Subscribed,
            Request::GetStatus => {
                let snapshot = *handles.snapshot_rx.borrow();
                return Response::Status(PanelStatus {
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    mode: snapshot.mode,
                    listening: snapshot.listening,
                    speech_available: handles.speech_available,
                    status: handles.status.get().to_string(),
                    uptime_secs: context.start_time.elapsed().as_secs(),
                });
            }
            Request::SetMode { mode } => InputEvent::SelectMode(mode),
            Request::Press { command } => InputEvent::Button(command),
            Request::SetSpeed { level } => InputEvent::Speed(level),
        };

        match handles.input_tx.send(input).await {
            Ok(()) => Response::Accepted,
            Err(_) => Response::Error {
                code: "unavailable".to_string(),
                message: "controller is shutting down".to_string(),
            },
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("control panel shutdown complete");
    }
}

/// Aborts the wrapped task when the connection handler exits
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Wait for the next status change on a subscribed connection
async fn next_status(slot: &mut Option<watch::Receiver<Status>>) -> Option<String> {
    let Some(rx) = slot.as_mut() else {
        return std::future::pending().await;
    };
    match rx.changed().await {
        Ok(()) => Some(rx.borrow_and_update().to_string()),
        Err(_) => {
            *slot = None;
            None
        }
    }
}

/// Wait for the next controller event on a subscribed connection
async fn next_event(
    slot: &mut Option<broadcast::Receiver<ControllerEvent>>,
) -> Option<ControllerEvent> {
    let Some(rx) = slot.as_mut() else {
        return std::future::pending().await;
    };
    loop {
        match rx.recv().await {
            Ok(event) => return Some(event),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "panel event receiver lagged");
            }
            Err(broadcast::error::RecvError::Closed) => {
                *slot = None;
                return None;
            }
        }
    }
}

/// Read one length-prefixed frame; `None` on clean end of stream
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];

    // Read message length (4-byte little-endian)
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        anyhow::bail!("frame of {len} bytes exceeds limit");
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

/// Send a length-prefixed JSON message
pub async fn write_frame<W: AsyncWrite + Unpin, T: serde::Serialize>(
    writer: &mut W,
    msg: &T,
) -> Result<()> {
    let msg_bytes = serde_json::to_vec(msg)?;
    let msg_len = (msg_bytes.len() as u32).to_le_bytes();

    writer.write_all(&msg_len).await?;
    writer.write_all(&msg_bytes).await?;

    Ok(())
}
