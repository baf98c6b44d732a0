use std::str::FromStr;

use crate::address::parse_decimal;
use crate::constants::limits;
use crate::error::{UrlError, UrlFormatError};

/// URL scheme handled by this driver
pub const SCHEME: &str = "s7";

/// Credentials a caller may try to supply with a connection URL
///
/// The S7 protocol has no authentication handshake, so any value of this type
/// causes parsing to fail with [`UrlError::UnsupportedAuthentication`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Authentication {
    /// username and password pair
    Username {
        /// user name
        user: String,
        /// password
        password: String,
    },
}

/// Validated identity of a PLC: `s7://host/rack/slot`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    host: String,
    rack: u8,
    slot: u8,
}

impl ConnectionDescriptor {
    /// Parse and validate a connection URL
    ///
    /// No I/O is performed; the result can be used to build a
    /// [`Connection`](crate::client::Connection) later.
    pub fn parse(url: &str) -> Result<Self, UrlError> {
        let invalid = |reason: UrlFormatError| UrlError::InvalidUrlFormat {
            url: url.to_string(),
            reason,
        };

        let rest = url
            .strip_prefix(SCHEME)
            .and_then(|x| x.strip_prefix("://"))
            .ok_or_else(|| invalid(UrlFormatError::UnknownScheme))?;

        let (path, parameters) = match rest.split_once(';') {
            Some((path, parameters)) => (path, Some(parameters)),
            None => (rest, None),
        };

        let mut segments = path.split('/');
        let host = segments.next().unwrap_or_default();
        if host.is_empty() {
            return Err(invalid(UrlFormatError::EmptyHost));
        }

        let rack = Self::parse_segment(segments.next(), "rack", limits::MAX_RACK).map_err(invalid)?;
        let slot = Self::parse_segment(segments.next(), "slot", limits::MAX_SLOT).map_err(invalid)?;

        if let Some(extra) = segments.next() {
            return Err(invalid(UrlFormatError::TrailingSegment(extra.to_string())));
        }

        if let Some(parameters) = parameters {
            Self::check_parameters(parameters).map_err(|err| match err {
                ParameterError::Credentials => UrlError::UnsupportedAuthentication,
                ParameterError::Unknown(param) => invalid(UrlFormatError::BadParameter(param)),
            })?;
        }

        Ok(Self {
            host: host.to_string(),
            rack,
            slot,
        })
    }

    /// Parse a connection URL supplied together with separate credentials
    ///
    /// The URL is validated first so that a malformed URL is reported as such.
    /// A well-formed URL then fails with [`UrlError::UnsupportedAuthentication`].
    pub fn parse_with_authentication(url: &str, _auth: Authentication) -> Result<Self, UrlError> {
        Self::parse(url)?;
        Err(UrlError::UnsupportedAuthentication)
    }

    /// always [`SCHEME`]
    pub fn scheme(&self) -> &'static str {
        SCHEME
    }

    /// host name or IP address of the PLC
    pub fn host(&self) -> &str {
        &self.host
    }

    /// rack number
    pub fn rack(&self) -> u8 {
        self.rack
    }

    /// slot number of the CPU
    pub fn slot(&self) -> u8 {
        self.slot
    }

    /// remote TSAP selecting the CPU at rack/slot
    pub(crate) fn remote_tsap(&self) -> u16 {
        crate::constants::cotp::REMOTE_TSAP_PG | (u16::from(self.rack) << 5) | u16::from(self.slot)
    }

    fn parse_segment(
        segment: Option<&str>,
        name: &'static str,
        max: u32,
    ) -> Result<u8, UrlFormatError> {
        let text = segment.ok_or(UrlFormatError::MissingSegment(name))?;
        let value = parse_decimal(text).ok_or_else(|| UrlFormatError::NotNumeric {
            segment: name,
            value: text.to_string(),
        })?;
        if value > max {
            return Err(UrlFormatError::OutOfRange {
                segment: name,
                value,
                max,
            });
        }
        // max is at most 31
        Ok(value as u8)
    }

    fn check_parameters(parameters: &str) -> Result<(), ParameterError> {
        let mut unknown = None;
        for param in parameters.split(';').filter(|x| !x.is_empty()) {
            match param.split_once('=') {
                Some(("user", _)) | Some(("pass", _)) | Some(("password", _)) => {
                    return Err(ParameterError::Credentials)
                }
                _ => {
                    unknown.get_or_insert_with(|| param.to_string());
                }
            }
        }
        match unknown {
            Some(param) => Err(ParameterError::Unknown(param)),
            None => Ok(()),
        }
    }
}

enum ParameterError {
    Credentials,
    Unknown(String),
}

impl FromStr for ConnectionDescriptor {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{SCHEME}://{}/{}/{}", self.host, self.rack, self.slot)
    }
}
