use std::collections::HashSet;

use crate::address::AddressDescriptor;
use crate::error::{ItemError, ReadError, ValueError};
use crate::protocol::read_var::{ItemResult, ReadItem};
use crate::types::{DataType, S7Type, Value};

/// Ordered set of addresses to read together
///
/// ```
/// use s7::client::ReadRequest;
/// use s7::{resolve, DataType};
///
/// let request = ReadRequest::new()
///     .add::<u8>(resolve("INPUTS/0").unwrap())
///     .item(resolve("DATA_BLOCKS/1/4").unwrap(), DataType::Real);
/// assert_eq!(request.len(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadRequest {
    items: Vec<ReadItem>,
}

impl ReadRequest {
    /// create an empty request
    pub fn new() -> Self {
        Self::default()
    }

    /// add an address read as the [`DataType`] of `T`
    pub fn add<T: S7Type>(self, address: AddressDescriptor) -> Self {
        self.item(address, T::DATA_TYPE)
    }

    /// add an address read as `data_type`
    pub fn item(mut self, address: AddressDescriptor, data_type: DataType) -> Self {
        self.push(address, data_type);
        self
    }

    /// add an address read as `data_type`
    pub fn push(&mut self, address: AddressDescriptor, data_type: DataType) {
        self.items.push(ReadItem::new(address, data_type));
    }

    /// number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// true if no items were added
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// iterate over the items in request order
    pub fn iter(&self) -> impl Iterator<Item = (AddressDescriptor, DataType)> + '_ {
        self.items.iter().map(|x| (x.address, x.data_type))
    }

    pub(crate) fn items(&self) -> &[ReadItem] {
        &self.items
    }

    pub(crate) fn validate(&self) -> Result<(), ReadError> {
        if self.items.is_empty() {
            return Err(ReadError::EmptyRequest);
        }

        let mut seen = HashSet::with_capacity(self.items.len());
        for item in &self.items {
            if !seen.insert(item.address) {
                return Err(ReadError::DuplicateAddress(item.address));
            }
        }

        for item in &self.items {
            if item.address.bit().is_some() && item.data_type != DataType::Bit {
                return Err(ReadError::IncompatibleType {
                    address: item.address,
                    data_type: item.data_type,
                });
            }
        }

        Ok(())
    }
}

/// Outcome of a read: one result per requested address, in request order
#[derive(Clone, Debug, PartialEq)]
pub struct ReadResponse {
    items: Vec<(AddressDescriptor, ItemResult)>,
}

impl ReadResponse {
    pub(crate) fn new(items: Vec<(AddressDescriptor, ItemResult)>) -> Self {
        Self { items }
    }

    /// number of items, always equal to the number requested
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// true if the response has no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// result for an address, or `None` if it was not requested
    pub fn result(&self, address: &AddressDescriptor) -> Option<Result<Value, ItemError>> {
        self.items
            .iter()
            .find(|(x, _)| x == address)
            .map(|(_, result)| *result)
    }

    /// dynamically typed value at an address
    pub fn value(&self, address: &AddressDescriptor) -> Result<Value, ValueError> {
        self.result(address)
            .ok_or(ValueError::NotRequested(*address))?
            .map_err(ValueError::Item)
    }

    /// statically typed value at an address
    pub fn get<T: S7Type>(&self, address: &AddressDescriptor) -> Result<T, ValueError> {
        let value = self.value(address)?;
        T::from_value(value).ok_or(ValueError::TypeMismatch {
            requested: T::DATA_TYPE,
            actual: value.data_type(),
        })
    }

    /// iterate over the results in request order
    pub fn iter(&self) -> impl Iterator<Item = (AddressDescriptor, Result<Value, ItemError>)> + '_ {
        self.items.iter().map(|(address, result)| (*address, *result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::resolve;
    use crate::types::ReturnCode;

    #[test]
    fn rejects_empty_requests() {
        assert_eq!(ReadRequest::new().validate(), Err(ReadError::EmptyRequest));
    }

    #[test]
    fn rejects_duplicate_addresses_before_type_checks() {
        let bit = resolve("MEMORY/0.1").unwrap();
        let request = ReadRequest::new()
            .add::<u8>(bit)
            .add::<bool>(bit);
        assert_eq!(request.validate(), Err(ReadError::DuplicateAddress(bit)));
    }

    #[test]
    fn bit_addresses_only_read_bits() {
        let bit = resolve("MEMORY/0.1").unwrap();
        assert_eq!(
            ReadRequest::new().add::<u16>(bit).validate(),
            Err(ReadError::IncompatibleType {
                address: bit,
                data_type: DataType::Word
            })
        );
        assert_eq!(ReadRequest::new().add::<bool>(bit).validate(), Ok(()));
        // a byte address may be read as a bit, selecting bit 0
        let byte = resolve("MEMORY/0").unwrap();
        assert_eq!(ReadRequest::new().add::<bool>(byte).validate(), Ok(()));
    }

    #[test]
    fn typed_access_to_responses() {
        let a = resolve("INPUTS/0").unwrap();
        let b = resolve("INPUTS/1").unwrap();
        let missing = resolve("INPUTS/2").unwrap();
        let response = ReadResponse::new(vec![
            (a, Ok(Value::Byte(7))),
            (b, Err(ItemError::Access(ReturnCode::AccessDenied))),
        ]);

        assert_eq!(response.len(), 2);
        assert_eq!(response.get::<u8>(&a), Ok(7));
        assert_eq!(
            response.get::<u16>(&a),
            Err(ValueError::TypeMismatch {
                requested: DataType::Word,
                actual: DataType::Byte
            })
        );
        assert_eq!(
            response.get::<u8>(&b),
            Err(ValueError::Item(ItemError::Access(ReturnCode::AccessDenied)))
        );
        assert_eq!(response.value(&missing), Err(ValueError::NotRequested(missing)));
        assert_eq!(
            response.iter().map(|(x, _)| x).collect::<Vec<_>>(),
            vec![a, b]
        );
    }
}
