//! Segment values through serde and bincode.

use super::{EncodingError, Value};
use crate::error::Result;
use serde::{de::DeserializeOwned, Serialize};

pub fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value)
        .map_err(|e| EncodingError::InvalidFormat(format!("Serialization failed: {}", e)).into())
}

pub fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes)
        .map_err(|e| EncodingError::InvalidFormat(format!("Deserialization failed: {}", e)).into())
}

// Lines (primary) and offsets (secondary) both land here.
impl<T: Serialize + DeserializeOwned> Value for T {
    fn encode(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        deserialize(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_and_offset_values() {
        let line = "2,Fritz,55".to_string();
        assert_eq!(String::decode(&line.encode().unwrap()).unwrap(), line);

        let offset = 11u64;
        assert_eq!(u64::decode(&offset.encode().unwrap()).unwrap(), offset);
    }

    #[test]
    fn test_line_with_separators_survives() {
        let line = "7,\"Smith, Jane\",\t40\r".to_string();
        let bytes = serialize(&line).unwrap();
        assert_eq!(deserialize::<String>(&bytes).unwrap(), line);
    }

    #[test]
    fn test_garbage_rejected() {
        let result: Result<String> = deserialize(&[0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(matches!(result, Err(crate::Error::Encoding(_))));
    }

    #[test]
    fn test_truncated_offset() {
        assert!(u64::decode(&[0x01, 0x02]).is_err());
    }
}
