use crate::constants::{return_code, transport_size};

/// Type tag of a value read from the PLC
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    /// single bit, maps to `bool`
    Bit,
    /// 8-bit unsigned, maps to `u8`
    Byte,
    /// 16-bit unsigned, maps to `u16`
    Word,
    /// 32-bit unsigned, maps to `u32`
    DWord,
    /// 16-bit signed, maps to `i16`
    Int,
    /// 32-bit signed, maps to `i32`
    DInt,
    /// IEEE-754 single precision, maps to `f32`
    Real,
}

impl DataType {
    /// number of data bytes the PLC returns for one value of this type
    pub fn size(self) -> usize {
        match self {
            DataType::Bit | DataType::Byte => 1,
            DataType::Word | DataType::Int => 2,
            DataType::DWord | DataType::DInt | DataType::Real => 4,
        }
    }

    /// transport size used in the read-var item specification
    pub(crate) fn request_transport_size(self) -> u8 {
        match self {
            DataType::Bit => transport_size::request::BIT,
            DataType::Byte => transport_size::request::BYTE,
            DataType::Word => transport_size::request::WORD,
            DataType::DWord => transport_size::request::DWORD,
            DataType::Int => transport_size::request::INT,
            DataType::DInt => transport_size::request::DINT,
            DataType::Real => transport_size::request::REAL,
        }
    }

    /// transport size the PLC uses in the data section of the response
    pub(crate) fn response_transport_size(self) -> u8 {
        match self {
            DataType::Bit => transport_size::response::BIT,
            DataType::Byte | DataType::Word | DataType::DWord => transport_size::response::BYTE,
            DataType::Int | DataType::DInt => transport_size::response::INTEGER,
            DataType::Real => transport_size::response::REAL,
        }
    }

    pub(crate) fn decode(self, data: &[u8]) -> Option<Value> {
        let value = match self {
            DataType::Bit => Value::Bit((*data.first()? & 0x01) != 0),
            DataType::Byte => Value::Byte(*data.first()?),
            DataType::Word => Value::Word(u16::from_be_bytes(data.try_into().ok()?)),
            DataType::DWord => Value::DWord(u32::from_be_bytes(data.try_into().ok()?)),
            DataType::Int => Value::Int(i16::from_be_bytes(data.try_into().ok()?)),
            DataType::DInt => Value::DInt(i32::from_be_bytes(data.try_into().ok()?)),
            DataType::Real => Value::Real(f32::from_be_bytes(data.try_into().ok()?)),
        };
        Some(value)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DataType::Bit => "BIT",
            DataType::Byte => "BYTE",
            DataType::Word => "WORD",
            DataType::DWord => "DWORD",
            DataType::Int => "INT",
            DataType::DInt => "DINT",
            DataType::Real => "REAL",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for DataType {
    type Err = UnknownDataType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BIT" | "BOOL" => Ok(DataType::Bit),
            "BYTE" => Ok(DataType::Byte),
            "WORD" => Ok(DataType::Word),
            "DWORD" => Ok(DataType::DWord),
            "INT" => Ok(DataType::Int),
            "DINT" => Ok(DataType::DInt),
            "REAL" => Ok(DataType::Real),
            _ => Err(UnknownDataType(s.to_string())),
        }
    }
}

/// Returned when a data type name is not recognized
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown data type: '{0}'")]
pub struct UnknownDataType(pub String);

/// A value read from the PLC
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Value {
    /// value of a [`DataType::Bit`]
    Bit(bool),
    /// value of a [`DataType::Byte`]
    Byte(u8),
    /// value of a [`DataType::Word`]
    Word(u16),
    /// value of a [`DataType::DWord`]
    DWord(u32),
    /// value of a [`DataType::Int`]
    Int(i16),
    /// value of a [`DataType::DInt`]
    DInt(i32),
    /// value of a [`DataType::Real`]
    Real(f32),
}

impl Value {
    /// type tag of this value
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Bit(_) => DataType::Bit,
            Value::Byte(_) => DataType::Byte,
            Value::Word(_) => DataType::Word,
            Value::DWord(_) => DataType::DWord,
            Value::Int(_) => DataType::Int,
            Value::DInt(_) => DataType::DInt,
            Value::Real(_) => DataType::Real,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bit(x) => write!(f, "{x}"),
            Value::Byte(x) => write!(f, "{x:#04X}"),
            Value::Word(x) => write!(f, "{x:#06X}"),
            Value::DWord(x) => write!(f, "{x:#010X}"),
            Value::Int(x) => write!(f, "{x}"),
            Value::DInt(x) => write!(f, "{x}"),
            Value::Real(x) => write!(f, "{x}"),
        }
    }
}

/// Rust types that can be read from the PLC
///
/// This ties a Rust type to the [`DataType`] tag sent on the wire so that
/// requests and responses can be built and inspected without runtime casts.
pub trait S7Type: Sized {
    /// the tag sent in the request
    const DATA_TYPE: DataType;

    /// extract the value if it has the matching type
    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! impl_s7_type {
    ($ty:ty, $variant:ident) => {
        impl S7Type for $ty {
            const DATA_TYPE: DataType = DataType::$variant;

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::$variant(x) => Some(x),
                    _ => None,
                }
            }
        }
    };
}

impl_s7_type!(bool, Bit);
impl_s7_type!(u8, Byte);
impl_s7_type!(u16, Word);
impl_s7_type!(u32, DWord);
impl_s7_type!(i16, Int);
impl_s7_type!(i32, DInt);
impl_s7_type!(f32, Real);

/// Per-item return code in a read-var response
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReturnCode {
    /// hardware fault in the PLC
    HardwareFault,
    /// accessing the object is not allowed
    AccessDenied,
    /// the address is out of range
    AddressOutOfRange,
    /// the data type is not supported for this area
    DataTypeNotSupported,
    /// the data type is inconsistent with the object
    DataTypeInconsistent,
    /// the object does not exist (e.g. data block not loaded)
    ObjectDoesNotExist,
    /// return code not defined in the protocol
    Unknown(u8),
}

impl ReturnCode {
    /// map a non-success raw return code
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            return_code::HARDWARE_FAULT => ReturnCode::HardwareFault,
            return_code::ACCESS_DENIED => ReturnCode::AccessDenied,
            return_code::ADDRESS_OUT_OF_RANGE => ReturnCode::AddressOutOfRange,
            return_code::DATA_TYPE_NOT_SUPPORTED => ReturnCode::DataTypeNotSupported,
            return_code::DATA_TYPE_INCONSISTENT => ReturnCode::DataTypeInconsistent,
            return_code::OBJECT_DOES_NOT_EXIST => ReturnCode::ObjectDoesNotExist,
            _ => ReturnCode::Unknown(value),
        }
    }

    /// raw value on the wire
    pub fn to_u8(self) -> u8 {
        match self {
            ReturnCode::HardwareFault => return_code::HARDWARE_FAULT,
            ReturnCode::AccessDenied => return_code::ACCESS_DENIED,
            ReturnCode::AddressOutOfRange => return_code::ADDRESS_OUT_OF_RANGE,
            ReturnCode::DataTypeNotSupported => return_code::DATA_TYPE_NOT_SUPPORTED,
            ReturnCode::DataTypeInconsistent => return_code::DATA_TYPE_INCONSISTENT,
            ReturnCode::ObjectDoesNotExist => return_code::OBJECT_DOES_NOT_EXIST,
            ReturnCode::Unknown(value) => value,
        }
    }
}

impl std::fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReturnCode::HardwareFault => f.write_str("hardware fault"),
            ReturnCode::AccessDenied => f.write_str("accessing the object is not allowed"),
            ReturnCode::AddressOutOfRange => f.write_str("address out of range"),
            ReturnCode::DataTypeNotSupported => f.write_str("data type not supported"),
            ReturnCode::DataTypeInconsistent => f.write_str("data type inconsistent"),
            ReturnCode::ObjectDoesNotExist => f.write_str("object does not exist"),
            ReturnCode::Unknown(code) => write!(f, "unknown return code: {code:#04X}"),
        }
    }
}
