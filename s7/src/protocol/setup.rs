use scursor::{ReadCursor, WriteCursor};

use crate::common::traits::{Loggable, Serialize};
use crate::constants::{function, rosctr};
use crate::decode::AppDecodeLevel;
use crate::error::{InternalError, RejectReason};
use crate::protocol::{JobParams, Response};

/// Setup communication job negotiating the PDU size and parallel jobs
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct SetupCommunication {
    pub(crate) max_amq_calling: u16,
    pub(crate) max_amq_called: u16,
    pub(crate) pdu_length: u16,
}

/// Parameters agreed with the PLC
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Negotiated {
    /// maximum number of unacknowledged jobs
    pub(crate) max_amq: u16,
    pub(crate) pdu_length: u16,
}

impl SetupCommunication {
    pub(crate) fn new(max_amq: u16, pdu_length: u16) -> Self {
        Self {
            max_amq_calling: max_amq,
            max_amq_called: max_amq,
            pdu_length,
        }
    }

    pub(crate) fn parse_response(&self, response: &Response) -> Result<Negotiated, RejectReason> {
        if let Some(err) = response.header.error.filter(|x| x.is_error()) {
            return Err(RejectReason::SetupFailed {
                class: err.class,
                code: err.code,
            });
        }

        if response.header.rosctr != rosctr::ACK_DATA {
            return Err(RejectReason::UnexpectedSetupResponse);
        }

        let (code, calling, pdu_length) = read_params(&mut ReadCursor::new(response.params))
            .map_err(|_| RejectReason::UnexpectedSetupResponse)?;

        if code != function::SETUP_COMMUNICATION || pdu_length == 0 {
            return Err(RejectReason::UnexpectedSetupResponse);
        }

        Ok(Negotiated {
            max_amq: calling.clamp(1, self.max_amq_calling.max(1)),
            pdu_length: pdu_length.min(self.pdu_length),
        })
    }
}

// returns the function code, max AMQ calling, and PDU length
fn read_params(cursor: &mut ReadCursor) -> Result<(u8, u16, u16), scursor::ReadError> {
    let code = cursor.read_u8()?;
    let _reserved = cursor.read_u8()?;
    let calling = cursor.read_u16_be()?;
    let _called = cursor.read_u16_be()?;
    let pdu_length = cursor.read_u16_be()?;
    Ok((code, calling, pdu_length))
}

impl Serialize for SetupCommunication {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), InternalError> {
        cursor.write_u8(function::SETUP_COMMUNICATION)?;
        cursor.write_u8(0x00)?;
        cursor.write_u16_be(self.max_amq_calling)?;
        cursor.write_u16_be(self.max_amq_called)?;
        cursor.write_u16_be(self.pdu_length)?;
        Ok(())
    }
}

impl JobParams for SetupCommunication {
    fn length(&self) -> Result<u16, InternalError> {
        Ok(8)
    }
}

impl Loggable for SetupCommunication {
    fn log(&self, level: AppDecodeLevel, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("SETUP COMMUNICATION")?;
        if level.item_headers() {
            write!(
                f,
                " (max AMQ: {} PDU length: {})",
                self.max_amq_calling, self.pdu_length
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::frame::FrameWriter;
    use crate::decode::FrameDecodeLevel;
    use crate::protocol::header::PduRef;
    use crate::protocol::Job;

    fn response(bytes: &[u8]) -> Response<'_> {
        Response::parse(bytes).unwrap()
    }

    #[test]
    fn formats_setup_communication_job() {
        let setup = SetupCommunication::new(1, 480);
        let mut writer = FrameWriter::new();
        let bytes = writer
            .format_data(&Job::new(PduRef::new(0), &setup), FrameDecodeLevel::Nothing)
            .unwrap();
        assert_eq!(
            bytes,
            &[
                0x03, 0x00, 0x00, 0x19, 0x02, 0xF0, 0x80, 0x32, 0x01, 0x00, 0x00, 0x00, 0x00,
                0x00, 0x08, 0x00, 0x00, 0xF0, 0x00, 0x00, 0x01, 0x00, 0x01, 0x01, 0xE0
            ]
        );
    }

    #[test]
    fn negotiates_smaller_of_requested_and_offered() {
        let setup = SetupCommunication::new(4, 480);
        let bytes = [
            0x32, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00, 0xF0, 0x00,
            0x00, 0x03, 0x00, 0x03, 0x00, 0xF0,
        ];
        assert_eq!(
            setup.parse_response(&response(&bytes)),
            Ok(Negotiated {
                max_amq: 3,
                pdu_length: 240
            })
        );
    }

    #[test]
    fn header_error_fails_the_setup() {
        let setup = SetupCommunication::new(1, 480);
        let bytes = [
            0x32, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x81, 0x04,
        ];
        assert_eq!(
            setup.parse_response(&response(&bytes)),
            Err(RejectReason::SetupFailed {
                class: 0x81,
                code: 0x04
            })
        );
    }

    #[test]
    fn wrong_function_is_unexpected() {
        let setup = SetupCommunication::new(1, 480);
        let bytes = [
            0x32, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x04, 0x01,
        ];
        assert_eq!(
            setup.parse_response(&response(&bytes)),
            Err(RejectReason::UnexpectedSetupResponse)
        );
    }
}
