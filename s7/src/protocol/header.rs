use scursor::{ReadCursor, WriteCursor};

use crate::constants::{header, rosctr};
use crate::error::{FrameError, InternalError};

/// PDU reference used to correlate an ack-data with its job
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug, Default)]
pub(crate) struct PduRef {
    value: u16,
}

impl PduRef {
    pub(crate) fn new(value: u16) -> Self {
        PduRef { value }
    }

    pub(crate) fn to_u16(self) -> u16 {
        self.value
    }

    /// return the current value and advance, wrapping at `u16::MAX`
    pub(crate) fn next(&mut self) -> PduRef {
        let ret = *self;
        self.value = self.value.wrapping_add(1);
        ret
    }
}

impl std::fmt::Display for PduRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06X}", self.value)
    }
}

/// error class and code carried by ack and ack-data headers
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct HeaderError {
    pub(crate) class: u8,
    pub(crate) code: u8,
}

impl HeaderError {
    pub(crate) fn is_error(&self) -> bool {
        self.class != 0 || self.code != 0
    }
}

/// S7 PDU header
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Header {
    pub(crate) rosctr: u8,
    pub(crate) pdu_ref: PduRef,
    pub(crate) param_length: u16,
    pub(crate) data_length: u16,
    pub(crate) error: Option<HeaderError>,
}

impl Header {
    pub(crate) fn job(pdu_ref: PduRef, param_length: u16, data_length: u16) -> Self {
        Self {
            rosctr: rosctr::JOB,
            pdu_ref,
            param_length,
            data_length,
            error: None,
        }
    }

    pub(crate) fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), InternalError> {
        cursor.write_u8(header::PROTOCOL_ID)?;
        cursor.write_u8(self.rosctr)?;
        cursor.write_u16_be(0)?;
        cursor.write_u16_be(self.pdu_ref.to_u16())?;
        cursor.write_u16_be(self.param_length)?;
        cursor.write_u16_be(self.data_length)?;
        if let Some(err) = self.error {
            cursor.write_u8(err.class)?;
            cursor.write_u8(err.code)?;
        }
        Ok(())
    }

    pub(crate) fn parse(cursor: &mut ReadCursor) -> Result<Self, FrameError> {
        let protocol_id = cursor.read_u8()?;
        if protocol_id != header::PROTOCOL_ID {
            return Err(FrameError::UnknownProtocolId(protocol_id));
        }
        let rosctr = cursor.read_u8()?;
        let _reserved = cursor.read_u16_be()?;
        let pdu_ref = PduRef::new(cursor.read_u16_be()?);
        let param_length = cursor.read_u16_be()?;
        let data_length = cursor.read_u16_be()?;
        let error = match rosctr {
            rosctr::ACK | rosctr::ACK_DATA => Some(HeaderError {
                class: cursor.read_u8()?,
                code: cursor.read_u8()?,
            }),
            _ => None,
        };
        Ok(Self {
            rosctr,
            pdu_ref,
            param_length,
            data_length,
            error,
        })
    }

    pub(crate) fn rosctr_name(&self) -> &'static str {
        match self.rosctr {
            rosctr::JOB => "JOB",
            rosctr::ACK => "ACK",
            rosctr::ACK_DATA => "ACK-DATA",
            _ => "UNKNOWN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdu_ref_wraps_around() {
        let mut pdu_ref = PduRef::new(u16::MAX);
        assert_eq!(pdu_ref.next(), PduRef::new(u16::MAX));
        assert_eq!(pdu_ref.next(), PduRef::new(0));
        assert_eq!(pdu_ref.next(), PduRef::new(1));
    }

    #[test]
    fn parses_ack_data_header_with_error_fields() {
        let bytes = [
            0x32, 0x03, 0x00, 0x00, 0x12, 0x34, 0x00, 0x02, 0x00, 0x05, 0x81, 0x04,
        ];
        let header = Header::parse(&mut ReadCursor::new(&bytes)).unwrap();
        assert_eq!(header.rosctr, rosctr::ACK_DATA);
        assert_eq!(header.pdu_ref, PduRef::new(0x1234));
        assert_eq!(header.param_length, 2);
        assert_eq!(header.data_length, 5);
        assert_eq!(
            header.error,
            Some(HeaderError {
                class: 0x81,
                code: 0x04
            })
        );
    }

    #[test]
    fn rejects_unknown_protocol_id() {
        let bytes = [0x72, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(
            Header::parse(&mut ReadCursor::new(&bytes)),
            Err(FrameError::UnknownProtocolId(0x72))
        );
    }

    #[test]
    fn rejects_truncated_header() {
        let bytes = [0x32, 0x03, 0x00];
        assert_eq!(
            Header::parse(&mut ReadCursor::new(&bytes)),
            Err(FrameError::MalformedHeader)
        );
    }
}
