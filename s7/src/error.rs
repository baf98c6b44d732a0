use crate::address::AddressDescriptor;
use crate::types::{DataType, ReturnCode};

/// Errors that occur while parsing a connection URL
///
/// These are configuration errors and are always returned synchronously
/// before any network activity takes place.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    /// The URL does not match `s7://host/rack/slot`
    #[error("invalid connection url '{url}': {reason}")]
    InvalidUrlFormat {
        /// the URL that was rejected
        url: String,
        /// what was wrong with it
        reason: UrlFormatError,
    },
    /// Credentials were supplied, but the S7 protocol has no authentication
    #[error("the s7 protocol does not support authentication")]
    UnsupportedAuthentication,
}

/// Specific reason a URL was rejected with [`UrlError::InvalidUrlFormat`]
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum UrlFormatError {
    /// The URL does not start with `s7://`
    #[error("expected the scheme 's7://'")]
    UnknownScheme,
    /// The host segment is empty
    #[error("the host segment is empty")]
    EmptyHost,
    /// A required path segment is missing
    #[error("missing the {0} segment")]
    MissingSegment(&'static str),
    /// A segment is not an unsigned decimal integer
    #[error("the {segment} segment '{value}' is not an unsigned decimal integer")]
    NotNumeric {
        /// name of the segment
        segment: &'static str,
        /// rejected text
        value: String,
    },
    /// A segment is numeric but exceeds what the protocol can encode
    #[error("the {segment} value {value} exceeds the maximum of {max}")]
    OutOfRange {
        /// name of the segment
        segment: &'static str,
        /// rejected value
        value: u32,
        /// maximum allowed value
        max: u32,
    },
    /// Extra path segments follow the slot
    #[error("unexpected trailing segment '{0}'")]
    TrailingSegment(String),
    /// A `;key=value` parameter is malformed or unknown
    #[error("unsupported parameter '{0}'")]
    BadParameter(String),
}

/// Errors that occur while resolving a symbolic address
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// The memory area token is not one of the known areas
    #[error("unknown address area: '{0}'")]
    UnknownAddressArea(String),
    /// The offset, bit, or data block number could not be parsed
    #[error("invalid address '{address}': {reason}")]
    InvalidAddressFormat {
        /// the address text that was rejected
        address: String,
        /// what was wrong with it
        reason: &'static str,
    },
}

/// Errors returned by [`Connection::connect`](crate::client::Connection::connect)
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    /// Another call to `connect` is already in progress
    #[error("a connection attempt is already in progress")]
    ConnectionInProgress,
    /// The connection previously failed and must be reset with `disconnect` first
    #[error("the connection has failed and must be disconnected before reconnecting")]
    Failed,
    /// The connection attempt was aborted by a call to `disconnect`
    #[error("the connection attempt was aborted by a disconnect")]
    Aborted,
    /// Transport or session setup failed
    #[error("connection error: {0}")]
    Connection(ConnectionErrorCause),
}

/// Underlying cause carried by [`ConnectError::Connection`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionErrorCause {
    /// I/O error while opening or using the transport
    #[error("i/o error: {0}")]
    Io(std::io::ErrorKind),
    /// The transport or session setup did not complete within the connect timeout
    #[error("timeout while establishing the connection")]
    Timeout,
    /// The PLC refused the session setup
    #[error("rejected by the PLC: {0}")]
    Rejected(RejectReason),
    /// The PLC sent a frame that could not be parsed
    #[error("bad frame during session setup: {0}")]
    BadFrame(FrameError),
    /// A setup request could not be encoded, indicating a bug in the library
    #[error("internal error: {0}")]
    Internal(InternalError),
}

/// Reasons the PLC may refuse a session
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    /// The COTP connection request was not answered with a connection confirm
    #[error("expected COTP connection confirm, received TPDU code {0:#04X}")]
    NoConnectionConfirm(u8),
    /// The setup communication request was answered with an error
    #[error("setup communication failed with error class {class:#04X} code {code:#04X}")]
    SetupFailed {
        /// S7 error class
        class: u8,
        /// S7 error code
        code: u8,
    },
    /// The setup communication response was not what the client expected
    #[error("unexpected response to setup communication")]
    UnexpectedSetupResponse,
}

/// Errors that cause [`Connection::read`](crate::client::Connection::read) to be
/// rejected synchronously without starting any work
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    /// The connection is not in the `Connected` state
    #[error("the connection is not connected")]
    NotConnected,
    /// The request contains no items
    #[error("the read request contains no items")]
    EmptyRequest,
    /// The same address appears more than once in the request
    #[error("the address {0} appears more than once in the request")]
    DuplicateAddress(AddressDescriptor),
    /// The data type cannot be read from this address
    #[error("{data_type} cannot be read from the bit address {address}")]
    IncompatibleType {
        /// the address
        address: AddressDescriptor,
        /// the requested type
        data_type: DataType,
    },
    /// The request queue is full
    #[error("the request queue is full")]
    QueueFull,
}

/// Errors delivered through a [`PendingRead`](crate::client::PendingRead) when a
/// read request as a whole does not complete
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// No response arrived before the request timeout elapsed
    #[error("timeout occurred before receiving a response from the PLC")]
    Timeout,
    /// The request was cancelled by the caller or by a disconnect
    #[error("the request was cancelled")]
    Cancelled,
    /// The transport failed while the request was outstanding
    #[error("i/o error: {0}")]
    Io(std::io::ErrorKind),
    /// The PLC sent a frame that could not be parsed, ending the session
    #[error("bad frame: {0}")]
    BadFrame(FrameError),
    /// The session task ended without completing the request
    #[error("the task processing requests has shut down")]
    Shutdown,
    /// The request could not be encoded, indicating a bug in the library
    #[error("internal error: {0}")]
    Internal(InternalError),
}

/// Per-address failure stored in a [`ReadResponse`](crate::client::ReadResponse)
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ItemError {
    /// The PLC refused access to the item
    #[error("access refused: {0}")]
    Access(ReturnCode),
    /// The item could not be decoded as the requested type
    #[error("decode error: {0}")]
    Decode(DecodeError),
    /// The PLC rejected the job containing the item
    #[error("job rejected with error class {class:#04X} code {code:#04X}")]
    Rejected {
        /// S7 error class
        class: u8,
        /// S7 error code
        code: u8,
    },
}

/// Errors returned by the typed accessors of a [`ReadResponse`](crate::client::ReadResponse)
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    /// The address was not part of the request
    #[error("the address {0} was not requested")]
    NotRequested(AddressDescriptor),
    /// The item failed
    #[error("{0}")]
    Item(ItemError),
    /// The value has a different type than the one requested from the accessor
    #[error("value has type {actual} but {requested} was requested")]
    TypeMismatch {
        /// type the accessor asked for
        requested: DataType,
        /// type of the value in the response
        actual: DataType,
    },
}

/// Errors that occur while interpreting a read-var response for a particular type
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The response ended before all expected fields were read
    #[error("response is too short")]
    InsufficientBytes,
    /// The response is not an ack-data for a read-var job
    #[error("unexpected function code {0:#04X} in response")]
    UnexpectedFunction(u8),
    /// The response carries a different number of items than requested
    #[error("expected one item but the response contains {0}")]
    UnexpectedItemCount(u8),
    /// The transport size does not match the requested type
    #[error("transport size {actual:#04X} does not match the requested {expected}")]
    UnexpectedTransportSize {
        /// the requested type
        expected: DataType,
        /// the transport size in the response
        actual: u8,
    },
    /// The number of data bytes does not match the requested type
    #[error("expected {expected} data bytes but received {actual}")]
    LengthMismatch {
        /// bytes implied by the requested type
        expected: usize,
        /// bytes present in the response
        actual: usize,
    },
}

/// Errors that occur while parsing TPKT and COTP framing off a stream
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// TPKT version other than 3
    #[error("unsupported TPKT version: {0}")]
    UnknownTpktVersion(u8),
    /// TPKT length smaller than the minimum frame
    #[error("TPKT length {0} is too small")]
    TpktLengthTooSmall(u16),
    /// TPKT length larger than the receive buffer
    #[error("TPKT length {0} exceeds the maximum of {1}")]
    TpktLengthTooBig(u16, usize),
    /// COTP length indicator inconsistent with the TPKT payload
    #[error("COTP length indicator {0} is inconsistent with the frame")]
    BadCotpLength(u8),
    /// COTP TPDU code not expected in this context
    #[error("unexpected COTP TPDU code: {0:#04X}")]
    UnexpectedTpdu(u8),
    /// S7 protocol id other than 0x32
    #[error("unknown S7 protocol id: {0:#04X}")]
    UnknownProtocolId(u8),
    /// S7 header could not be parsed
    #[error("malformed S7 header")]
    MalformedHeader,
}

/// Errors that should only occur if there is a logic error in the library
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InternalError {
    /// A frame did not fit in the write buffer
    #[error("insufficient space in the write buffer")]
    InsufficientWriteSpace,
    /// A computed length does not fit its length field
    #[error("frame length does not fit the length field")]
    FrameTooBig,
    /// Attempted to read more bytes than present in the receive buffer
    #[error("attempted to read {0} bytes with only {1} remaining")]
    InsufficientBytesForRead(usize, usize),
}

impl From<scursor::WriteError> for InternalError {
    fn from(_: scursor::WriteError) -> Self {
        InternalError::InsufficientWriteSpace
    }
}

impl From<scursor::ReadError> for DecodeError {
    fn from(_: scursor::ReadError) -> Self {
        DecodeError::InsufficientBytes
    }
}

impl From<scursor::ReadError> for FrameError {
    fn from(_: scursor::ReadError) -> Self {
        FrameError::MalformedHeader
    }
}

impl From<DecodeError> for ItemError {
    fn from(err: DecodeError) -> Self {
        ItemError::Decode(err)
    }
}

impl From<FrameError> for RequestError {
    fn from(err: FrameError) -> Self {
        RequestError::BadFrame(err)
    }
}

impl From<std::io::Error> for RequestError {
    fn from(err: std::io::Error) -> Self {
        RequestError::Io(err.kind())
    }
}

impl From<InternalError> for RequestError {
    fn from(err: InternalError) -> Self {
        RequestError::Internal(err)
    }
}

impl From<InternalError> for ConnectionErrorCause {
    fn from(err: InternalError) -> Self {
        ConnectionErrorCause::Internal(err)
    }
}

impl From<std::io::Error> for ConnectionErrorCause {
    fn from(err: std::io::Error) -> Self {
        ConnectionErrorCause::Io(err.kind())
    }
}

impl From<FrameError> for ConnectionErrorCause {
    fn from(err: FrameError) -> Self {
        ConnectionErrorCause::BadFrame(err)
    }
}

impl From<RejectReason> for ConnectionErrorCause {
    fn from(err: RejectReason) -> Self {
        ConnectionErrorCause::Rejected(err)
    }
}

impl From<ConnectionErrorCause> for ConnectError {
    fn from(err: ConnectionErrorCause) -> Self {
        ConnectError::Connection(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_errors_render_the_reason() {
        let err = UrlError::InvalidUrlFormat {
            url: "s7://localhost/hurz/2".to_string(),
            reason: UrlFormatError::NotNumeric {
                segment: "rack",
                value: "hurz".to_string(),
            },
        };
        assert_eq!(
            err.to_string(),
            "invalid connection url 's7://localhost/hurz/2': the rack segment 'hurz' is not an unsigned decimal integer"
        );
    }

    #[test]
    fn connection_error_carries_the_cause() {
        let err: ConnectError =
            ConnectionErrorCause::from(std::io::Error::from(std::io::ErrorKind::ConnectionRefused))
                .into();
        assert_eq!(
            err,
            ConnectError::Connection(ConnectionErrorCause::Io(
                std::io::ErrorKind::ConnectionRefused
            ))
        );
    }
}
