use std::fmt::Write;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::decode::PhysDecodeLevel;

/// Any bidirectional byte stream that can carry ISO-on-TCP
pub trait Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Stream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Transport owned by a connection's session task
///
/// Constructed by a [`Connector`](crate::client::Connector) when a connection is opened.
pub struct PhysLayer {
    layer: PhysLayerImpl,
}

// encapsulates all possible physical layers as an enum
enum PhysLayerImpl {
    Tcp(tokio::net::TcpStream),
    Stream(Box<dyn Stream>),
}

impl std::fmt::Debug for PhysLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self.layer {
            PhysLayerImpl::Tcp(_) => f.write_str("Tcp"),
            PhysLayerImpl::Stream(_) => f.write_str("Stream"),
        }
    }
}

impl PhysLayer {
    /// wrap a connected TCP socket
    pub fn new_tcp(socket: tokio::net::TcpStream) -> Self {
        Self {
            layer: PhysLayerImpl::Tcp(socket),
        }
    }

    /// wrap an arbitrary stream, e.g. one half of [`tokio::io::duplex`]
    pub fn new_stream<S: Stream>(stream: S) -> Self {
        Self {
            layer: PhysLayerImpl::Stream(Box::new(stream)),
        }
    }

    pub(crate) async fn read(
        &mut self,
        buffer: &mut [u8],
        decode_level: PhysDecodeLevel,
    ) -> Result<usize, std::io::Error> {
        let length = match &mut self.layer {
            PhysLayerImpl::Tcp(x) => x.read(buffer).await?,
            PhysLayerImpl::Stream(x) => x.read(buffer).await?,
        };

        if decode_level.enabled() {
            if let Some(x) = buffer.get(0..length) {
                tracing::info!("PHYS RX - {}", PhysDisplay::new(decode_level, x))
            }
        }

        Ok(length)
    }

    pub(crate) async fn write(
        &mut self,
        data: &[u8],
        decode_level: PhysDecodeLevel,
    ) -> Result<(), std::io::Error> {
        if decode_level.enabled() {
            tracing::info!("PHYS TX - {}", PhysDisplay::new(decode_level, data));
        }

        match &mut self.layer {
            PhysLayerImpl::Tcp(x) => x.write_all(data).await,
            PhysLayerImpl::Stream(x) => {
                x.write_all(data).await?;
                x.flush().await
            }
        }
    }

    pub(crate) async fn shutdown(&mut self) {
        let result = match &mut self.layer {
            PhysLayerImpl::Tcp(x) => x.shutdown().await,
            PhysLayerImpl::Stream(x) => x.shutdown().await,
        };
        if let Err(err) = result {
            tracing::debug!("error shutting down the transport: {}", err);
        }
    }
}

pub(crate) struct PhysDisplay<'a> {
    level: PhysDecodeLevel,
    data: &'a [u8],
}

impl<'a> PhysDisplay<'a> {
    pub(crate) fn new(level: PhysDecodeLevel, data: &'a [u8]) -> Self {
        PhysDisplay { level, data }
    }
}

impl std::fmt::Display for PhysDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} bytes", self.data.len())?;
        if self.level.data_enabled() {
            format_bytes(f, self.data)?;
        }
        Ok(())
    }
}

const BYTES_PER_DECODE_LINE: usize = 18;

pub(crate) fn format_bytes(f: &mut std::fmt::Formatter, bytes: &[u8]) -> std::fmt::Result {
    for chunk in bytes.chunks(BYTES_PER_DECODE_LINE) {
        writeln!(f)?;
        let mut first = true;
        for byte in chunk {
            if !first {
                f.write_char(' ')?;
            }
            first = false;
            write!(f, "{byte:02X?}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Hex<'a>(&'a [u8]);

    impl std::fmt::Display for Hex<'_> {
        fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            format_bytes(f, self.0)
        }
    }

    #[test]
    fn formats_bytes_as_hex_lines() {
        assert_eq!(Hex(&[0x03, 0x00, 0xCA]).to_string(), "\n03 00 CA");
        let long = [0u8; 20];
        assert_eq!(Hex(&long).to_string().lines().count(), 3);
    }

    #[test]
    fn length_only_display_omits_data() {
        let display = PhysDisplay::new(PhysDecodeLevel::Length, &[0x01, 0x02]);
        assert_eq!(display.to_string(), "2 bytes");
    }

    #[tokio::test]
    async fn reads_and_writes_through_a_stream() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut phys = PhysLayer::new_stream(client);

        phys.write(&[0xCA, 0xFE], PhysDecodeLevel::Data).await.unwrap();
        let mut received = [0u8; 2];
        server.read_exact(&mut received).await.unwrap();
        assert_eq!(received, [0xCA, 0xFE]);

        server.write_all(&[0x01]).await.unwrap();
        let mut buffer = [0u8; 4];
        assert_eq!(phys.read(&mut buffer, PhysDecodeLevel::Nothing).await.unwrap(), 1);
        assert_eq!(buffer[0], 0x01);
    }
}
