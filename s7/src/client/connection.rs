use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

use crate::address::{resolve, AddressDescriptor};
use crate::client::config::ConnectionConfig;
use crate::client::connector::{Connector, TcpConnector};
use crate::client::handshake::{establish, Established};
use crate::client::message::Request;
use crate::client::pending::{pending, PendingRead};
use crate::client::request::ReadRequest;
use crate::client::task::{SessionEnd, SessionTask};
use crate::error::{AddressError, ConnectError, ConnectionErrorCause, ReadError, UrlError};
use crate::url::ConnectionDescriptor;

/// Lifecycle state of a [`Connection`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// no session; `connect` may be called
    Disconnected,
    /// a call to `connect` is in progress
    Connecting,
    /// a session is established and reads are accepted
    Connected,
    /// the last connection attempt failed; `disconnect` resets to `Disconnected`
    Failed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Operations a connection supports, fixed when it is constructed
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Capabilities {
    /// values can be read but not written
    ReadOnly,
    /// values can be written but not read
    WriteOnly,
    /// values can be read and written
    ReadWrite,
}

impl Capabilities {
    /// true if reads are supported
    pub fn can_read(self) -> bool {
        matches!(self, Capabilities::ReadOnly | Capabilities::ReadWrite)
    }

    /// true if writes are supported
    pub fn can_write(self) -> bool {
        matches!(self, Capabilities::WriteOnly | Capabilities::ReadWrite)
    }
}

struct SessionHandle {
    tx: mpsc::Sender<Request>,
    close: oneshot::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl SessionHandle {
    async fn close(self) {
        let SessionHandle { tx, close, task } = self;
        drop(tx);
        // the task may already have ended on its own
        let _ = close.send(());
        if let Err(err) = task.await {
            tracing::warn!("session task did not complete: {}", err);
        }
    }
}

struct Inner {
    state: ConnectionState,
    // present iff state == Connected
    session: Option<SessionHandle>,
    // incremented by every connect attempt and every disconnect
    generation: u64,
}

impl Inner {
    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            tracing::info!("connection state: {} -> {}", self.state, state);
            self.state = state;
        }
    }
}

struct Shared {
    descriptor: ConnectionDescriptor,
    config: ConnectionConfig,
    connector: Box<dyn Connector>,
    inner: Mutex<Inner>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn on_session_end(&self, generation: u64, end: SessionEnd) {
        let mut inner = self.lock();
        if inner.generation != generation || inner.state != ConnectionState::Connected {
            return;
        }
        if let SessionEnd::Link(err) = end {
            tracing::warn!("connection lost: {}", err);
        }
        inner.session = None;
        inner.set_state(ConnectionState::Disconnected);
    }
}

/// resets `Connecting` to `Disconnected` if a connect future is dropped before finishing
struct ConnectGuard<'a> {
    shared: &'a Shared,
    generation: u64,
    armed: bool,
}

impl Drop for ConnectGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.shared.lock();
        if inner.generation == self.generation && inner.state == ConnectionState::Connecting {
            inner.set_state(ConnectionState::Disconnected);
        }
    }
}

/// A connection to one PLC
///
/// A `Connection` is created in the [`ConnectionState::Disconnected`] state
/// without performing any I/O. [`connect`](Self::connect) establishes the
/// session and spawns a task onto the Tokio runtime that owns the transport.
/// [`read`](Self::read) may then be called from any thread, inside or outside
/// the runtime.
///
/// Dropping the connection closes the session and cancels outstanding reads.
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    /// Create a connection that reaches the PLC over TCP
    pub fn new(descriptor: ConnectionDescriptor, config: ConnectionConfig) -> Self {
        Self::with_connector(descriptor, config, TcpConnector)
    }

    /// Parse `url` and create a connection that reaches the PLC over TCP
    pub fn from_url(url: &str, config: ConnectionConfig) -> Result<Self, UrlError> {
        Ok(Self::new(ConnectionDescriptor::parse(url)?, config))
    }

    /// Create a connection whose transport is opened by `connector`
    pub fn with_connector<C: Connector>(
        descriptor: ConnectionDescriptor,
        config: ConnectionConfig,
        connector: C,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                descriptor,
                config,
                connector: Box::new(connector),
                inner: Mutex::new(Inner {
                    state: ConnectionState::Disconnected,
                    session: None,
                    generation: 0,
                }),
            }),
        }
    }

    /// Establish the session
    ///
    /// Must be called from within a Tokio runtime because it spawns the
    /// session task. Calling it while connected does nothing.
    pub async fn connect(&self) -> Result<(), ConnectError> {
        let generation = {
            let mut inner = self.shared.lock();
            match inner.state {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Connecting => return Err(ConnectError::ConnectionInProgress),
                ConnectionState::Failed => return Err(ConnectError::Failed),
                ConnectionState::Disconnected => {}
            }
            inner.generation = inner.generation.wrapping_add(1);
            inner.set_state(ConnectionState::Connecting);
            inner.generation
        };

        let mut guard = ConnectGuard {
            shared: &self.shared,
            generation,
            armed: true,
        };

        let result = tokio::time::timeout(self.shared.config.connect_timeout, self.open())
            .await
            .unwrap_or(Err(ConnectionErrorCause::Timeout));

        guard.armed = false;

        let mut inner = self.shared.lock();
        if inner.generation != generation || inner.state != ConnectionState::Connecting {
            tracing::info!("connection attempt aborted by disconnect");
            return Err(ConnectError::Aborted);
        }

        match result {
            Ok(established) => {
                inner.session = Some(self.spawn_session(established, generation));
                inner.set_state(ConnectionState::Connected);
                Ok(())
            }
            Err(cause) => {
                tracing::warn!("unable to connect to {}: {}", self.shared.descriptor, cause);
                inner.set_state(ConnectionState::Failed);
                Err(ConnectError::Connection(cause))
            }
        }
    }

    async fn open(&self) -> Result<Established, ConnectionErrorCause> {
        let shared = &self.shared;
        tracing::info!("connecting to {}", shared.descriptor);
        let io = shared
            .connector
            .connect(&shared.descriptor, shared.config.port)
            .get()
            .await?;
        establish(io, &shared.descriptor, &shared.config).await
    }

    fn spawn_session(&self, established: Established, generation: u64) -> SessionHandle {
        let config = &self.shared.config;
        let (tx, rx) = mpsc::channel(config.max_queued_requests.max(1));
        let (close_tx, close_rx) = oneshot::channel();

        let session = SessionTask::new(
            established.io,
            established.reader,
            rx.into(),
            close_rx,
            config.decode,
            established.negotiated.max_amq,
            established.pdu_ref,
        );

        let weak = Arc::downgrade(&self.shared);
        let span = tracing::info_span!("S7", plc = %self.shared.descriptor);
        let task = tokio::spawn(
            async move {
                let end = session.run().await;
                if let Some(shared) = weak.upgrade() {
                    shared.on_session_end(generation, end);
                }
            }
            .instrument(span),
        );

        SessionHandle {
            tx,
            close: close_tx,
            task,
        }
    }

    /// Close the session, cancelling every queued or in-flight read
    ///
    /// Valid in any state. An in-progress `connect` completes with
    /// [`ConnectError::Aborted`]. Returns once the session task has finished.
    pub async fn disconnect(&self) {
        let session = {
            let mut inner = self.shared.lock();
            inner.generation = inner.generation.wrapping_add(1);
            inner.set_state(ConnectionState::Disconnected);
            inner.session.take()
        };

        if let Some(session) = session {
            session.close().await;
        }
    }

    /// Start a read using the configured response timeout
    ///
    /// The request is validated and queued synchronously; the returned
    /// [`PendingRead`] completes once every item has an outcome.
    pub fn read(&self, request: ReadRequest) -> Result<PendingRead, ReadError> {
        self.read_with_timeout(request, self.shared.config.response_timeout)
    }

    /// Start a read with an explicit response timeout
    pub fn read_with_timeout(
        &self,
        request: ReadRequest,
        timeout: Duration,
    ) -> Result<PendingRead, ReadError> {
        // the lock is held while queueing so that a concurrent disconnect cancels this read
        let inner = self.shared.lock();
        let session = match (inner.state, inner.session.as_ref()) {
            (ConnectionState::Connected, Some(session)) => session,
            _ => return Err(ReadError::NotConnected),
        };

        request.validate()?;

        let (promise, read) = pending();
        session
            .tx
            .try_send(Request::new(request, timeout, promise))
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => ReadError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => ReadError::NotConnected,
            })?;

        Ok(read)
    }

    /// Resolve a symbolic address, see [`resolve`]
    pub fn parse_address(&self, address: &str) -> Result<AddressDescriptor, AddressError> {
        resolve(address)
    }

    /// current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    /// identity of the PLC
    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.shared.descriptor
    }

    /// host name or IP address of the PLC
    pub fn host(&self) -> &str {
        self.shared.descriptor.host()
    }

    /// rack number of the PLC
    pub fn rack(&self) -> u8 {
        self.shared.descriptor.rack()
    }

    /// slot number of the PLC's CPU
    pub fn slot(&self) -> u8 {
        self.shared.descriptor.slot()
    }

    /// configuration supplied at construction
    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    /// operations supported by this connection, always [`Capabilities::ReadOnly`]
    pub fn capabilities(&self) -> Capabilities {
        Capabilities::ReadOnly
    }

    /// true if reads are supported
    pub fn can_read(&self) -> bool {
        self.capabilities().can_read()
    }

    /// true if writes are supported
    pub fn can_write(&self) -> bool {
        self.capabilities().can_write()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("descriptor", &self.shared.descriptor)
            .field("state", &self.state())
            .finish()
    }
}
