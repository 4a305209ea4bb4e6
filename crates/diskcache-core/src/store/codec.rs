//! Value encoding: JSON serialization, optionally DEFLATE-compressed with
//! gzip framing.

use crate::{CacheError, Result};
use serde::{de::DeserializeOwned, Serialize};

/// Serialize a value and compress it if requested.
pub fn encode<T: Serialize + ?Sized>(value: &T, compression: bool) -> Result<Vec<u8>> {
    let serialized = serde_json::to_vec(value).map_err(|e| CacheError::Json {
        message: format!("Failed to serialize value: {}", e),
        source: Some(e),
    })?;
    if compression {
        compress(&serialized)
    } else {
        Ok(serialized)
    }
}

/// Decompress if requested and deserialize a stored payload.
pub fn decode<T: DeserializeOwned>(payload: &[u8], compression: bool) -> Result<T> {
    let raw = unpack(payload, compression)?;
    serde_json::from_slice(&raw).map_err(|e| CacheError::Json {
        message: format!("Failed to deserialize value: {}", e),
        source: Some(e),
    })
}

/// Undo compression only, returning the serialized bytes.
pub fn unpack(payload: &[u8], compression: bool) -> Result<Vec<u8>> {
    if compression {
        decompress(payload)
    } else {
        Ok(payload.to_vec())
    }
}

#[cfg(feature = "compression")]
fn compress(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    let to_error = |e: std::io::Error| CacheError::Compression {
        message: format!("Failed to compress value: {}", e),
    };
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data).map_err(to_error)?;
    encoder.finish().map_err(to_error)
}

#[cfg(feature = "compression")]
fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::read::GzDecoder;
    use std::io::Read;

    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::with_capacity(data.len() * 2);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CacheError::Compression {
            message: format!("Failed to decompress value: {}", e),
        })?;
    Ok(out)
}

#[cfg(not(feature = "compression"))]
fn compress(_data: &[u8]) -> Result<Vec<u8>> {
    Err(CacheError::CompressionUnavailable)
}

#[cfg(not(feature = "compression"))]
fn decompress(_data: &[u8]) -> Result<Vec<u8>> {
    Err(CacheError::CompressionUnavailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Profile {
        id: u32,
        tags: Vec<String>,
    }

    #[test]
    fn test_plain_encoding_is_json() {
        let bytes = encode("hello", false).unwrap();
        assert_eq!(bytes, br#""hello""#);
        let back: String = decode(&bytes, false).unwrap();
        assert_eq!(back, "hello");
    }

    #[cfg(feature = "compression")]
    #[test]
    fn test_compressed_struct() {
        let profile = Profile {
            id: 7,
            tags: vec!["a".repeat(500), "b".repeat(500)],
        };
        let plain = encode(&profile, false).unwrap();
        let packed = encode(&profile, true).unwrap();
        assert!(packed.len() < plain.len());

        let back: Profile = decode(&packed, true).unwrap();
        assert_eq!(back, profile);
        assert_eq!(unpack(&packed, true).unwrap(), plain);
    }

    #[cfg(feature = "compression")]
    #[test]
    fn test_decompress_garbage_fails() {
        let result: Result<String> = decode(b"definitely not gzip", true);
        assert!(matches!(result, Err(CacheError::Compression { .. })));
    }

    #[test]
    fn test_decode_type_mismatch_fails() {
        let bytes = encode(&vec![1, 2, 3], false).unwrap();
        let result: Result<Profile> = decode(&bytes, false);
        assert!(matches!(result, Err(CacheError::Json { .. })));
    }
}
