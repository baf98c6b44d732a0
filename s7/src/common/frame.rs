use scursor::WriteCursor;

use crate::common::buffer::ReadBuffer;
use crate::common::phys::{format_bytes, PhysLayer};
use crate::common::traits::Serialize;
use crate::constants::{cotp, limits, tpkt};
use crate::decode::{DecodeLevel, FrameDecodeLevel};
use crate::error::{ConnectionErrorCause, FrameError, InternalError, RequestError};

/// smallest frame: TPKT header followed by a COTP DT header
const MIN_TPKT_LENGTH: usize = tpkt::HEADER_LENGTH + cotp::DATA_HEADER_LENGTH;

/// TPKT header and COTP DT header preceding every S7 PDU
const DATA_FRAME_HEADER_LENGTH: usize = tpkt::HEADER_LENGTH + cotp::DATA_HEADER_LENGTH;

/// Failures of the framed link that end the session
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum LinkError {
    Io(std::io::ErrorKind),
    BadFrame(FrameError),
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        LinkError::Io(err.kind())
    }
}

impl From<FrameError> for LinkError {
    fn from(err: FrameError) -> Self {
        LinkError::BadFrame(err)
    }
}

impl From<LinkError> for RequestError {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::Io(kind) => RequestError::Io(kind),
            LinkError::BadFrame(err) => RequestError::BadFrame(err),
        }
    }
}

impl From<LinkError> for ConnectionErrorCause {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::Io(kind) => ConnectionErrorCause::Io(kind),
            LinkError::BadFrame(err) => ConnectionErrorCause::BadFrame(err),
        }
    }
}

impl std::fmt::Display for LinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            LinkError::Io(kind) => write!(f, "i/o error: {kind}"),
            LinkError::BadFrame(err) => write!(f, "bad frame: {err}"),
        }
    }
}

/// A COTP TPDU received inside a TPKT
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Frame {
    /// TPDU code with the credit nibble masked off
    pub(crate) code: u8,
    /// user data following the COTP header
    pub(crate) payload: Vec<u8>,
}

#[derive(Copy, Clone)]
enum ParseState {
    Begin,
    Header(usize),
}

/// Reads complete TPKT/COTP frames from the physical layer
///
/// Parsing state lives in the reader so `next_frame` may be cancelled in a
/// `select!` without losing partially received data.
pub(crate) struct FramedReader {
    state: ParseState,
    buffer: ReadBuffer,
}

impl FramedReader {
    pub(crate) fn new() -> Self {
        Self {
            state: ParseState::Begin,
            buffer: ReadBuffer::new(limits::MAX_FRAME_LENGTH),
        }
    }

    pub(crate) async fn next_frame(
        &mut self,
        io: &mut PhysLayer,
        decode: DecodeLevel,
    ) -> Result<Frame, LinkError> {
        loop {
            if let Some(frame) = self.parse()? {
                if decode.frame.enabled() {
                    tracing::info!("COTP RX - {}", FrameDisplay::new(decode.frame, &frame));
                }
                return Ok(frame);
            }
            self.buffer.read_some(io, decode.physical).await?;
        }
    }

    fn parse(&mut self) -> Result<Option<Frame>, FrameError> {
        let length = match self.state {
            ParseState::Header(length) => length,
            ParseState::Begin => {
                if self.buffer.len() < tpkt::HEADER_LENGTH {
                    return Ok(None);
                }
                let length = self.parse_header()?;
                self.state = ParseState::Header(length);
                length
            }
        };

        if self.buffer.len() < length {
            return Ok(None);
        }

        let payload = self
            .buffer
            .read(length)
            .map_err(|_| FrameError::MalformedHeader)?;
        self.state = ParseState::Begin;

        Self::parse_cotp(payload).map(Some)
    }

    // returns the number of bytes that follow the TPKT header
    fn parse_header(&mut self) -> Result<usize, FrameError> {
        let version = self.read_u8()?;
        let _reserved = self.read_u8()?;
        let length = self
            .buffer
            .read_u16_be()
            .map_err(|_| FrameError::MalformedHeader)?;

        if version != tpkt::VERSION {
            return Err(FrameError::UnknownTpktVersion(version));
        }

        if usize::from(length) < MIN_TPKT_LENGTH {
            return Err(FrameError::TpktLengthTooSmall(length));
        }

        if usize::from(length) > limits::MAX_FRAME_LENGTH {
            return Err(FrameError::TpktLengthTooBig(length, limits::MAX_FRAME_LENGTH));
        }

        Ok(usize::from(length) - tpkt::HEADER_LENGTH)
    }

    fn read_u8(&mut self) -> Result<u8, FrameError> {
        self.buffer
            .read_u8()
            .map_err(|_| FrameError::MalformedHeader)
    }

    fn parse_cotp(payload: &[u8]) -> Result<Frame, FrameError> {
        let (&indicator, rest) = payload
            .split_first()
            .ok_or(FrameError::BadCotpLength(0))?;

        let header_length = usize::from(indicator);
        if header_length == 0 || header_length > rest.len() {
            return Err(FrameError::BadCotpLength(indicator));
        }

        let (header, user_data) = rest.split_at(header_length);
        let code = header[0] & 0xF0;

        if code == cotp::DATA && header.get(1).map_or(true, |x| x & cotp::EOT == 0) {
            tracing::warn!("COTP data unit without EOT, segmented TPDUs are not supported");
        }

        Ok(Frame {
            code,
            payload: user_data.to_vec(),
        })
    }
}

/// Formats outgoing TPKT/COTP frames into a reusable buffer
pub(crate) struct FrameWriter {
    buffer: Vec<u8>,
}

impl FrameWriter {
    pub(crate) fn new() -> Self {
        Self {
            buffer: vec![0; limits::MAX_FRAME_LENGTH],
        }
    }

    /// COTP connection request selecting the remote TSAP
    pub(crate) fn format_connection_request(
        &mut self,
        local_tsap: u16,
        remote_tsap: u16,
        level: FrameDecodeLevel,
    ) -> Result<&[u8], InternalError> {
        let mut cursor = WriteCursor::new(self.buffer.as_mut_slice());
        // TPKT
        cursor.write_u8(tpkt::VERSION)?;
        cursor.write_u8(0)?;
        cursor.write_u16_be(22)?;
        // COTP CR, length indicator excludes itself
        cursor.write_u8(17)?;
        cursor.write_u8(cotp::CONNECTION_REQUEST)?;
        cursor.write_u16_be(0x0000)?; // destination reference
        cursor.write_u16_be(0x0001)?; // source reference
        cursor.write_u8(0x00)?; // class 0
        cursor.write_u8(cotp::PARAM_TPDU_SIZE)?;
        cursor.write_u8(1)?;
        cursor.write_u8(cotp::TPDU_SIZE_1024)?;
        cursor.write_u8(cotp::PARAM_SRC_TSAP)?;
        cursor.write_u8(2)?;
        cursor.write_u16_be(local_tsap)?;
        cursor.write_u8(cotp::PARAM_DST_TSAP)?;
        cursor.write_u8(2)?;
        cursor.write_u16_be(remote_tsap)?;
        let length = cursor.position();

        let bytes = self
            .buffer
            .get(..length)
            .ok_or(InternalError::InsufficientWriteSpace)?;

        if level.enabled() {
            tracing::info!(
                "COTP TX - CR (local TSAP: {:#06X} remote TSAP: {:#06X})",
                local_tsap,
                remote_tsap
            );
        }

        Ok(bytes)
    }

    /// COTP data transfer carrying one S7 PDU
    pub(crate) fn format_data(
        &mut self,
        pdu: &dyn Serialize,
        level: FrameDecodeLevel,
    ) -> Result<&[u8], InternalError> {
        let (header, body) = self.buffer.split_at_mut(DATA_FRAME_HEADER_LENGTH);

        let mut cursor = WriteCursor::new(body);
        pdu.serialize(&mut cursor)?;
        let total = DATA_FRAME_HEADER_LENGTH + cursor.position();
        let total_u16 = u16::try_from(total).map_err(|_| InternalError::FrameTooBig)?;

        let mut cursor = WriteCursor::new(header);
        cursor.write_u8(tpkt::VERSION)?;
        cursor.write_u8(0)?;
        cursor.write_u16_be(total_u16)?;
        cursor.write_u8(2)?;
        cursor.write_u8(cotp::DATA)?;
        cursor.write_u8(cotp::EOT)?;

        let bytes = self
            .buffer
            .get(..total)
            .ok_or(InternalError::InsufficientWriteSpace)?;

        if level.enabled() {
            if let Some(payload) = bytes.get(DATA_FRAME_HEADER_LENGTH..) {
                tracing::info!(
                    "COTP TX - {}",
                    DataDisplay {
                        level,
                        length: total,
                        payload
                    }
                );
            }
        }

        Ok(bytes)
    }
}

struct FrameDisplay<'a> {
    level: FrameDecodeLevel,
    frame: &'a Frame,
}

impl<'a> FrameDisplay<'a> {
    fn new(level: FrameDecodeLevel, frame: &'a Frame) -> Self {
        Self { level, frame }
    }
}

impl std::fmt::Display for FrameDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self.frame.code {
            cotp::CONNECTION_REQUEST => "CR",
            cotp::CONNECTION_CONFIRM => "CC",
            cotp::DATA => "DT",
            _ => "unknown",
        };
        write!(
            f,
            "{} ({:#04X}) user data: {} bytes",
            name,
            self.frame.code,
            self.frame.payload.len()
        )?;
        if self.level.payload_enabled() {
            format_bytes(f, &self.frame.payload)?;
        }
        Ok(())
    }
}

struct DataDisplay<'a> {
    level: FrameDecodeLevel,
    length: usize,
    payload: &'a [u8],
}

impl std::fmt::Display for DataDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "DT (TPKT length: {})", self.length)?;
        if self.level.payload_enabled() {
            format_bytes(f, self.payload)?;
        }
        Ok(())
    }
}
