//! TCP server: the listening endpoint and its accept loop.
//!
//! `EchoServer` owns the lifecycle of exactly one listening socket:
//! `start()` binds it and spawns the accept loop, `stop()` signals the loop
//! to shut the listener down. Each accepted connection is handed to its own
//! session task and never touched by the server again; accept failures are
//! logged and the loop keeps going.

use std::io;
use std::net::SocketAddr;
use std::sync::Mutex;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::session;

/// Listen backlog for the bound socket.
const BACKLOG: i32 = 1024;

/// Host used when the server is constructed with a bare port.
const DEFAULT_HOST: &str = "127.0.0.1";

/// Errors from server lifecycle operations.
#[derive(Debug)]
pub enum ServerError {
    /// The listening endpoint could not be created.
    Bind(u16, io::Error),
    /// `start()` was called on a server that is running or was stopped;
    /// the lifecycle is one-shot and a fresh instance serves again.
    AlreadyStarted,
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Bind(port, e) => write!(f, "Failed to bind port {}: {}", port, e),
            ServerError::AlreadyStarted => write!(f, "Server already started"),
        }
    }
}

impl std::error::Error for ServerError {}

/// Server lifecycle state. `Stopped` is terminal.
enum Lifecycle {
    /// Created; no resources held yet.
    Idle,
    /// Accept loop live; holds the shutdown signal and the bound address.
    Running {
        shutdown: watch::Sender<bool>,
        local_addr: SocketAddr,
    },
    /// Stopped; the listener is closed and stays closed.
    Stopped,
}

/// A line-echo TCP server bound to one host/port pair.
pub struct EchoServer {
    host: String,
    port: u16,
    state: Mutex<Lifecycle>,
}

impl EchoServer {
    /// Create a server for the given port on the loopback host.
    ///
    /// No resources are acquired and nothing is validated until `start()`.
    pub fn new(port: u16) -> Self {
        Self::with_host(DEFAULT_HOST, port)
    }

    /// Create a server bound to an explicit host.
    pub fn with_host(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            state: Mutex::new(Lifecycle::Idle),
        }
    }

    /// Bind the listening endpoint and launch the accept loop.
    ///
    /// Returns as soon as the loop task is spawned; the loop then runs
    /// until `stop()`. Port 0 asks the OS for an ephemeral port, with
    /// `local_addr()` reporting what was actually bound.
    pub async fn start(&self) -> Result<(), ServerError> {
        {
            let state = self.state.lock().unwrap();
            if !matches!(*state, Lifecycle::Idle) {
                return Err(ServerError::AlreadyStarted);
            }
        }

        let listener =
            bind_listener(&self.host, self.port).map_err(|e| ServerError::Bind(self.port, e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Bind(self.port, e))?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        {
            let mut state = self.state.lock().unwrap();
            if !matches!(*state, Lifecycle::Idle) {
                // Lost a start race; dropping the listener releases the port.
                return Err(ServerError::AlreadyStarted);
            }
            *state = Lifecycle::Running {
                shutdown: shutdown_tx,
                local_addr,
            };
        }

        tokio::spawn(accept_loop(listener, shutdown_rx));
        info!(address = %local_addr, "Server listening");
        Ok(())
    }

    /// Stop accepting connections.
    ///
    /// Signals the accept loop, which unblocks its pending accept and
    /// closes the listener. Sessions already running are left to finish on
    /// their own. Idempotent; a no-op on a server that is not running.
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        if !matches!(*state, Lifecycle::Running { .. }) {
            return;
        }
        if let Lifecycle::Running { shutdown, .. } =
            std::mem::replace(&mut *state, Lifecycle::Stopped)
        {
            let _ = shutdown.send(true);
            info!("Server stopping, listener closing");
        }
    }

    /// The bound address while running, `None` otherwise.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &*self.state.lock().unwrap() {
            Lifecycle::Running { local_addr, .. } => Some(*local_addr),
            _ => None,
        }
    }

    /// Whether the accept loop is live.
    pub fn is_running(&self) -> bool {
        matches!(*self.state.lock().unwrap(), Lifecycle::Running { .. })
    }
}

/// Accept connections until the shutdown signal fires.
///
/// Each accepted connection gets its own task, unbounded by design; a slow
/// or stuck session never blocks this loop. Dropping the listener on exit
/// is what actually closes the endpoint.
async fn accept_loop(listener: TcpListener, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                // Requested stop, or the server handle was dropped.
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(peer = %peer, "Accepted connection");
                    tokio::spawn(session::handle_connection(stream, peer));
                }
                Err(e) => {
                    // Transient; keep serving.
                    error!(error = %e, "Failed to accept connection");
                }
            },
        }
    }
    info!("Accept loop stopped");
}

/// Create the listening socket: `SO_REUSEADDR`, non-blocking, fixed
/// backlog, then hand it to Tokio.
fn bind_listener(host: &str, port: u16) -> io::Result<TcpListener> {
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;

    TcpListener::from_std(socket.into())
}
