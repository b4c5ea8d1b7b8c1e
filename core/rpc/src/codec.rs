// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Codec traits for message serialization and deserialization
//!
//! Handlers and callers exchange typed messages; the engine only moves bytes.
//! Any type implementing both traits can travel in a call. Types deriving
//! `bincode::Encode` and `bincode::Decode` get both through
//! [`bincode_message!`](crate::bincode_message).

use crate::Status;

/// Trait for encoding messages to bytes
pub trait Encoder {
    /// Encode a message to bytes
    fn encode(self) -> Result<Vec<u8>, Status>;
}

/// Trait for decoding messages from bytes
pub trait Decoder: Sized {
    /// Decode a message from bytes
    fn decode(buf: impl Into<Vec<u8>>) -> Result<Self, Status>;
}

// Pass-through implementations for raw payloads
impl Encoder for Vec<u8> {
    fn encode(self) -> Result<Vec<u8>, Status> {
        Ok(self)
    }
}

impl Decoder for Vec<u8> {
    fn decode(buf: impl Into<Vec<u8>>) -> Result<Self, Status> {
        Ok(buf.into())
    }
}

/// Encode with the standard bincode configuration.
pub fn encode_bincode<T: bincode::Encode>(value: T) -> Result<Vec<u8>, Status> {
    bincode::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| Status::internal(format!("Encoding error: {}", e)))
}

/// Decode with the standard bincode configuration.
///
/// Malformed input is the caller's fault, hence `InvalidArgument`.
pub fn decode_bincode<T: bincode::Decode<()>>(buf: &[u8]) -> Result<T, Status> {
    let (decoded, _len) = bincode::decode_from_slice(buf, bincode::config::standard())
        .map_err(|e| Status::invalid_argument(format!("Decoding error: {}", e)))?;
    Ok(decoded)
}

/// Implement [`Encoder`] and [`Decoder`] through bincode for the given types.
#[macro_export]
macro_rules! bincode_message {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::codec::Encoder for $ty {
                fn encode(self) -> ::std::result::Result<Vec<u8>, $crate::Status> {
                    $crate::codec::encode_bincode(self)
                }
            }

            impl $crate::codec::Decoder for $ty {
                fn decode(buf: impl Into<Vec<u8>>) -> ::std::result::Result<Self, $crate::Status> {
                    $crate::codec::decode_bincode(&buf.into())
                }
            }
        )+
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Code;

    #[derive(Debug, Clone, Default, PartialEq, bincode::Encode, bincode::Decode)]
    struct Greeting {
        first_name: String,
        times: u32,
    }

    bincode_message!(Greeting);

    #[test]
    fn test_raw_bytes_pass_through() {
        let encoded = vec![1, 2, 3, 4].encode().unwrap();
        assert_eq!(encoded, vec![1, 2, 3, 4]);
        let decoded = Vec::<u8>::decode(encoded).unwrap();
        assert_eq!(decoded, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_bincode_message() {
        let msg = Greeting {
            first_name: "Ada".to_string(),
            times: 3,
        };
        let bytes = msg.clone().encode().unwrap();
        assert_eq!(Greeting::decode(bytes).unwrap(), msg);
    }

    #[test]
    fn test_decode_garbage_is_invalid_argument() {
        let err = Greeting::decode(vec![0xff, 0xff, 0xff]).unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }
}
