use scursor::{ReadCursor, WriteCursor};

use crate::address::AddressDescriptor;
use crate::common::traits::{Loggable, Serialize};
use crate::constants::{function, item, return_code, transport_size};
use crate::decode::AppDecodeLevel;
use crate::error::{DecodeError, InternalError, ItemError};
use crate::protocol::{JobParams, Response};
use crate::types::{DataType, ReturnCode, Value};

/// one address and the type it is read as
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct ReadItem {
    pub(crate) address: AddressDescriptor,
    pub(crate) data_type: DataType,
}

impl ReadItem {
    pub(crate) fn new(address: AddressDescriptor, data_type: DataType) -> Self {
        Self { address, data_type }
    }

    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), InternalError> {
        let bit_address = self.address.bit_address();
        cursor.write_u8(item::VARIABLE_SPECIFICATION)?;
        cursor.write_u8(item::ANY_LENGTH)?;
        cursor.write_u8(item::SYNTAX_ID_S7ANY)?;
        cursor.write_u8(self.data_type.request_transport_size())?;
        cursor.write_u16_be(1)?; // element count
        cursor.write_u16_be(self.address.db_number())?;
        cursor.write_u8(self.address.area().to_u8())?;
        // 24-bit address, high byte first
        cursor.write_u8(((bit_address >> 16) & 0xFF) as u8)?;
        cursor.write_u16_be((bit_address & 0xFFFF) as u16)?;
        Ok(())
    }
}

/// outcome of one item in a read-var response
pub(crate) type ItemResult = Result<Value, ItemError>;

/// Read-var job parameters
pub(crate) struct ReadVar<'a> {
    items: &'a [ReadItem],
}

impl<'a> ReadVar<'a> {
    pub(crate) fn new(items: &'a [ReadItem]) -> Self {
        Self { items }
    }

    fn count(&self) -> Result<u8, InternalError> {
        u8::try_from(self.items.len()).map_err(|_| InternalError::FrameTooBig)
    }

    /// Interpret an ack-data as the answer to this job
    ///
    /// A job-level error in the header is reported as [`ItemError::Rejected`]
    /// for every item. Structural problems in the parameter or data blocks are
    /// returned as a single [`DecodeError`] that applies to every item.
    pub(crate) fn parse_response(
        &self,
        response: &Response,
    ) -> Result<Vec<ItemResult>, DecodeError> {
        if let Some(err) = response.header.error.filter(|x| x.is_error()) {
            return Ok(self
                .items
                .iter()
                .map(|_| {
                    Err(ItemError::Rejected {
                        class: err.class,
                        code: err.code,
                    })
                })
                .collect());
        }

        let mut params = ReadCursor::new(response.params);
        let code = params.read_u8()?;
        if code != function::READ_VAR {
            return Err(DecodeError::UnexpectedFunction(code));
        }
        let count = params.read_u8()?;
        if usize::from(count) != self.items.len() {
            return Err(DecodeError::UnexpectedItemCount(count));
        }

        let mut data = ReadCursor::new(response.data);
        let mut results = Vec::with_capacity(self.items.len());
        for (index, item) in self.items.iter().enumerate() {
            let last = index + 1 == self.items.len();
            results.push(parse_item(&mut data, item.data_type, last)?);
        }
        Ok(results)
    }
}

fn parse_item(
    cursor: &mut ReadCursor,
    data_type: DataType,
    last: bool,
) -> Result<ItemResult, DecodeError> {
    let code = cursor.read_u8()?;
    let actual = cursor.read_u8()?;
    let length = usize::from(cursor.read_u16_be()?);

    let byte_length = match actual {
        transport_size::response::BIT
        | transport_size::response::BYTE
        | transport_size::response::INTEGER => (length + 7) / 8,
        transport_size::response::REAL | transport_size::response::OCTET_STRING => length,
        // failed items carry a null transport size
        0 if code != return_code::SUCCESS => length,
        _ => {
            return Err(DecodeError::UnexpectedTransportSize {
                expected: data_type,
                actual,
            })
        }
    };

    let bytes = cursor.read_bytes(byte_length)?;

    // every item but the last is padded to an even length
    if !last && byte_length % 2 == 1 && !cursor.is_empty() {
        cursor.read_u8()?;
    }

    if code != return_code::SUCCESS {
        return Ok(Err(ItemError::Access(ReturnCode::from_u8(code))));
    }

    if actual != data_type.response_transport_size() && actual != transport_size::response::BYTE {
        return Ok(Err(ItemError::Decode(
            DecodeError::UnexpectedTransportSize {
                expected: data_type,
                actual,
            },
        )));
    }

    if bytes.len() != data_type.size() {
        return Ok(Err(ItemError::Decode(DecodeError::LengthMismatch {
            expected: data_type.size(),
            actual: bytes.len(),
        })));
    }

    Ok(data_type.decode(bytes).ok_or(ItemError::Decode(
        DecodeError::LengthMismatch {
            expected: data_type.size(),
            actual: bytes.len(),
        },
    )))
}

impl Serialize for ReadVar<'_> {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), InternalError> {
        cursor.write_u8(function::READ_VAR)?;
        cursor.write_u8(self.count()?)?;
        for item in self.items {
            item.serialize(cursor)?;
        }
        Ok(())
    }
}

impl JobParams for ReadVar<'_> {
    fn length(&self) -> Result<u16, InternalError> {
        let length = 2 + item::REQUEST_ITEM_LENGTH * usize::from(self.count()?);
        u16::try_from(length).map_err(|_| InternalError::FrameTooBig)
    }
}

impl Loggable for ReadVar<'_> {
    fn log(&self, level: AppDecodeLevel, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "READ VAR (items: {})", self.items.len())?;
        if level.item_headers() {
            for item in self.items {
                write!(f, "\n{} : {}", item.address, item.data_type)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::resolve;
    use crate::common::frame::FrameWriter;
    use crate::decode::FrameDecodeLevel;
    use crate::protocol::header::PduRef;
    use crate::protocol::Job;

    fn item(address: &str, data_type: DataType) -> ReadItem {
        ReadItem::new(resolve(address).unwrap(), data_type)
    }

    fn ack_data(params: &[u8], data: &[u8]) -> Vec<u8> {
        let mut bytes = vec![
            0x32,
            0x03,
            0x00,
            0x00,
            0x00,
            0x01,
            0x00,
            params.len() as u8,
            0x00,
            data.len() as u8,
            0x00,
            0x00,
        ];
        bytes.extend_from_slice(params);
        bytes.extend_from_slice(data);
        bytes
    }

    #[test]
    fn formats_read_of_a_data_block_word() {
        let items = [item("DATA_BLOCKS/1/2", DataType::Word)];
        let mut writer = FrameWriter::new();
        let bytes = writer
            .format_data(
                &Job::new(PduRef::new(5), &ReadVar::new(&items)),
                FrameDecodeLevel::Nothing,
            )
            .unwrap();
        assert_eq!(
            bytes,
            &[
                0x03, 0x00, 0x00, 0x1F, 0x02, 0xF0, 0x80, // TPKT + COTP
                0x32, 0x01, 0x00, 0x00, 0x00, 0x05, 0x00, 0x0E, 0x00, 0x00, // header
                0x04, 0x01, // read var, 1 item
                0x12, 0x0A, 0x10, 0x04, 0x00, 0x01, 0x00, 0x01, 0x84, 0x00, 0x00, 0x10,
            ]
        );
    }

    #[test]
    fn encodes_bit_addresses() {
        let items = [item("MEMORY/4.2", DataType::Bit)];
        let mut writer = FrameWriter::new();
        let bytes = writer
            .format_data(
                &Job::new(PduRef::new(0), &ReadVar::new(&items)),
                FrameDecodeLevel::Nothing,
            )
            .unwrap();
        assert_eq!(
            &bytes[19..],
            &[0x12, 0x0A, 0x10, 0x01, 0x00, 0x01, 0x00, 0x00, 0x83, 0x00, 0x00, 0x22]
        );
    }

    #[test]
    fn decodes_mixed_success_and_failure() {
        let items = [
            item("INPUTS/0", DataType::Byte),
            item("DATA_BLOCKS/9/0", DataType::Int),
            item("MEMORY/0", DataType::Real),
        ];
        let request = ReadVar::new(&items);
        let bytes = ack_data(
            &[0x04, 0x03],
            &[
                0xFF, 0x04, 0x00, 0x08, 0x2A, 0x00, // byte + padding
                0x0A, 0x00, 0x00, 0x00, // object does not exist
                0xFF, 0x07, 0x00, 0x04, 0x3F, 0x80, 0x00, 0x00,
            ],
        );
        let response = Response::parse(&bytes).unwrap();
        assert_eq!(
            request.parse_response(&response),
            Ok(vec![
                Ok(Value::Byte(0x2A)),
                Err(ItemError::Access(ReturnCode::ObjectDoesNotExist)),
                Ok(Value::Real(1.0)),
            ])
        );
    }

    #[test]
    fn accepts_byte_transport_size_for_integers() {
        let items = [item("MEMORY/0", DataType::Int)];
        let bytes = ack_data(&[0x04, 0x01], &[0xFF, 0x04, 0x00, 0x10, 0xFF, 0xFF]);
        let response = Response::parse(&bytes).unwrap();
        assert_eq!(
            ReadVar::new(&items).parse_response(&response),
            Ok(vec![Ok(Value::Int(-1))])
        );
    }

    #[test]
    fn reports_wrong_length_per_item() {
        let items = [item("MEMORY/0", DataType::DWord)];
        let bytes = ack_data(&[0x04, 0x01], &[0xFF, 0x04, 0x00, 0x10, 0x00, 0x01]);
        let response = Response::parse(&bytes).unwrap();
        assert_eq!(
            ReadVar::new(&items).parse_response(&response),
            Ok(vec![Err(ItemError::Decode(DecodeError::LengthMismatch {
                expected: 4,
                actual: 2
            }))])
        );
    }

    #[test]
    fn header_error_rejects_every_item() {
        let items = [
            item("MEMORY/0", DataType::Byte),
            item("MEMORY/1", DataType::Byte),
        ];
        let mut bytes = ack_data(&[], &[]);
        bytes[10] = 0x85;
        bytes[11] = 0x00;
        let response = Response::parse(&bytes).unwrap();
        let rejected = Err(ItemError::Rejected {
            class: 0x85,
            code: 0x00,
        });
        assert_eq!(
            ReadVar::new(&items).parse_response(&response),
            Ok(vec![rejected, rejected])
        );
    }

    #[test]
    fn structural_errors_apply_to_the_job() {
        let items = [item("MEMORY/0", DataType::Byte)];

        let bytes = ack_data(&[0x05, 0x01], &[]);
        let response = Response::parse(&bytes).unwrap();
        assert_eq!(
            ReadVar::new(&items).parse_response(&response),
            Err(DecodeError::UnexpectedFunction(0x05))
        );

        let bytes = ack_data(&[0x04, 0x02], &[]);
        let response = Response::parse(&bytes).unwrap();
        assert_eq!(
            ReadVar::new(&items).parse_response(&response),
            Err(DecodeError::UnexpectedItemCount(2))
        );

        let bytes = ack_data(&[0x04, 0x01], &[0xFF, 0x04, 0x00]);
        let response = Response::parse(&bytes).unwrap();
        assert_eq!(
            ReadVar::new(&items).parse_response(&response),
            Err(DecodeError::InsufficientBytes)
        );
    }
}
