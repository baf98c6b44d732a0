use std::str::FromStr;

use crate::constants::{area, limits};
use crate::error::AddressError;

/// Memory areas of the PLC that can be addressed
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MemoryArea {
    /// process image of the inputs (I)
    Inputs,
    /// process image of the outputs (Q)
    Outputs,
    /// bit memory / flags (M)
    Memory,
    /// data blocks (DB)
    DataBlocks,
}

impl MemoryArea {
    /// token used in the symbolic address grammar
    pub fn token(self) -> &'static str {
        match self {
            MemoryArea::Inputs => "INPUTS",
            MemoryArea::Outputs => "OUTPUTS",
            MemoryArea::Memory => "MEMORY",
            MemoryArea::DataBlocks => "DATA_BLOCKS",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "INPUTS" => Some(MemoryArea::Inputs),
            "OUTPUTS" => Some(MemoryArea::Outputs),
            "MEMORY" => Some(MemoryArea::Memory),
            "DATA_BLOCKS" => Some(MemoryArea::DataBlocks),
            _ => None,
        }
    }

    pub(crate) fn to_u8(self) -> u8 {
        match self {
            MemoryArea::Inputs => area::INPUTS,
            MemoryArea::Outputs => area::OUTPUTS,
            MemoryArea::Memory => area::MEMORY,
            MemoryArea::DataBlocks => area::DATA_BLOCKS,
        }
    }
}

impl std::fmt::Display for MemoryArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// A validated location in PLC memory
///
/// Resolved once from a symbolic string and reused for any number of reads.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct AddressDescriptor {
    area: MemoryArea,
    db_number: u16,
    byte_offset: u32,
    bit: Option<u8>,
}

impl AddressDescriptor {
    /// memory area
    pub fn area(&self) -> MemoryArea {
        self.area
    }

    /// data block number, always 0 outside [`MemoryArea::DataBlocks`]
    pub fn db_number(&self) -> u16 {
        self.db_number
    }

    /// byte position within the area
    pub fn byte_offset(&self) -> u32 {
        self.byte_offset
    }

    /// bit within the byte, if the address names a single bit
    pub fn bit(&self) -> Option<u8> {
        self.bit
    }

    /// 24-bit item address, `byte * 8 + bit`
    pub(crate) fn bit_address(&self) -> u32 {
        (self.byte_offset << 3) | u32::from(self.bit.unwrap_or(0))
    }
}

impl std::fmt::Display for AddressDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/", self.area)?;
        if self.area == MemoryArea::DataBlocks {
            write!(f, "{}/", self.db_number)?;
        }
        write!(f, "{}", self.byte_offset)?;
        if let Some(bit) = self.bit {
            write!(f, ".{bit}")?;
        }
        Ok(())
    }
}

impl FromStr for AddressDescriptor {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        resolve(s)
    }
}

/// Resolve a symbolic address such as `INPUTS/0`, `MEMORY/4.2` or `DATA_BLOCKS/10/8`
pub fn resolve(address: &str) -> Result<AddressDescriptor, AddressError> {
    let invalid = |reason: &'static str| AddressError::InvalidAddressFormat {
        address: address.to_string(),
        reason,
    };

    let mut segments = address.split('/');
    let area_token = segments.next().unwrap_or_default();
    let area = MemoryArea::from_token(area_token)
        .ok_or_else(|| AddressError::UnknownAddressArea(area_token.to_string()))?;

    let db_number = if area == MemoryArea::DataBlocks {
        let db = segments.next().ok_or_else(|| invalid("missing data block number"))?;
        let db = parse_decimal(db).ok_or_else(|| invalid("data block number is not numeric"))?;
        u16::try_from(db).map_err(|_| invalid("data block number is out of range"))?
    } else {
        0
    };

    let location = segments.next().ok_or_else(|| invalid("missing offset"))?;
    if segments.next().is_some() {
        return Err(invalid("unexpected trailing segment"));
    }

    let (offset, bit) = match location.split_once('.') {
        Some((offset, bit)) => (offset, Some(bit)),
        None => (location, None),
    };

    let byte_offset = parse_decimal(offset).ok_or_else(|| invalid("offset is not numeric"))?;
    if byte_offset > limits::MAX_BYTE_OFFSET {
        return Err(invalid("offset is out of range"));
    }

    let bit = match bit {
        None => None,
        Some(bit) => {
            let bit = parse_decimal(bit).ok_or_else(|| invalid("bit is not numeric"))?;
            if bit > u32::from(limits::MAX_BIT) {
                return Err(invalid("bit must be in the range 0..=7"));
            }
            Some(bit as u8)
        }
    };

    Ok(AddressDescriptor {
        area,
        db_number,
        byte_offset,
        bit,
    })
}

/// Parse an unsigned decimal made only of ASCII digits, rejecting signs and whitespace
pub(crate) fn parse_decimal(text: &str) -> Option<u32> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}
