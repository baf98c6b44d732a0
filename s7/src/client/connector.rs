use crate::common::phys::PhysLayer;
use crate::maybe_async::MaybeAsync;
use crate::url::ConnectionDescriptor;

/// Opens the transport underneath a [`Connection`](crate::client::Connection)
///
/// The default [`TcpConnector`] resolves the descriptor's host and connects
/// over TCP. Other implementations can hand over any
/// [`Stream`](crate::Stream), e.g. an in-memory pipe to a
/// simulated PLC.
pub trait Connector: Send + Sync + 'static {
    /// open a transport to the PLC identified by `descriptor`
    fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
        port: u16,
    ) -> MaybeAsync<std::io::Result<PhysLayer>>;
}

/// Connects over TCP, port 102 unless configured otherwise
#[derive(Copy, Clone, Debug, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
        port: u16,
    ) -> MaybeAsync<std::io::Result<PhysLayer>> {
        let host = descriptor.host().to_string();
        MaybeAsync::asynchronous(async move {
            let socket = tokio::net::TcpStream::connect((host.as_str(), port)).await?;
            if let Err(err) = socket.set_nodelay(true) {
                tracing::warn!("unable to enable TCP_NODELAY: {}", err);
            }
            Ok(PhysLayer::new_tcp(socket))
        })
    }
}

impl<F> Connector for F
where
    F: Fn(&ConnectionDescriptor, u16) -> MaybeAsync<std::io::Result<PhysLayer>>
        + Send
        + Sync
        + 'static,
{
    fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
        port: u16,
    ) -> MaybeAsync<std::io::Result<PhysLayer>> {
        self(descriptor, port)
    }
}
