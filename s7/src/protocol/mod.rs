//! S7 PDUs carried inside COTP data transfer frames

use scursor::{ReadCursor, WriteCursor};

use crate::common::traits::{Loggable, Serialize};
use crate::decode::AppDecodeLevel;
use crate::error::{FrameError, InternalError};

pub(crate) mod header;
pub(crate) mod read_var;
pub(crate) mod setup;

use header::{Header, PduRef};

/// parameter block of a job PDU
pub(crate) trait JobParams: Serialize + Loggable {
    fn length(&self) -> Result<u16, InternalError>;
}

/// a complete job PDU without a data block
pub(crate) struct Job<'a, P: JobParams> {
    pub(crate) pdu_ref: PduRef,
    pub(crate) params: &'a P,
}

impl<'a, P: JobParams> Job<'a, P> {
    pub(crate) fn new(pdu_ref: PduRef, params: &'a P) -> Self {
        Self { pdu_ref, params }
    }
}

impl<P: JobParams> Serialize for Job<'_, P> {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), InternalError> {
        Header::job(self.pdu_ref, self.params.length()?, 0).serialize(cursor)?;
        self.params.serialize(cursor)
    }
}

impl<P: JobParams> Loggable for Job<'_, P> {
    fn log(&self, level: AppDecodeLevel, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "JOB ref: {} ", self.pdu_ref)?;
        self.params.log(level, f)
    }
}

/// a received PDU split into its header, parameter, and data blocks
#[derive(Debug)]
pub(crate) struct Response<'a> {
    pub(crate) header: Header,
    pub(crate) params: &'a [u8],
    pub(crate) data: &'a [u8],
}

impl<'a> Response<'a> {
    pub(crate) fn parse(bytes: &'a [u8]) -> Result<Self, FrameError> {
        let mut cursor = ReadCursor::new(bytes);
        let header = Header::parse(&mut cursor)?;
        let params = cursor.read_bytes(usize::from(header.param_length))?;
        let data = cursor.read_bytes(usize::from(header.data_length))?;
        if !cursor.is_empty() {
            tracing::warn!(
                "ignoring {} trailing bytes after S7 PDU",
                cursor.remaining()
            );
        }
        Ok(Self {
            header,
            params,
            data,
        })
    }
}

impl std::fmt::Display for Response<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} ref: {} params: {} data: {}",
            self.header.rosctr_name(),
            self.header.pdu_ref,
            self.params.len(),
            self.data.len()
        )?;
        if let Some(err) = self.header.error.filter(|x| x.is_error()) {
            write!(f, " error class: {:#04X} code: {:#04X}", err.class, err.code)?;
        }
        Ok(())
    }
}
