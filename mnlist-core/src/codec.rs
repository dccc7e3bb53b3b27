//! Canonical binary encoding.
//!
//! Every consensus-relevant structure (payloads, provider state, stored
//! diffs and snapshots) goes through this codec so that independent nodes
//! produce byte-identical encodings:
//! - fixed-width little-endian integers
//! - length-prefixed sequences
//! - decoding must consume the whole input

use bincode::Options;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Encode a value.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    Ok(options().serialize(value)?)
}

/// Decode a value, rejecting any trailing bytes.
pub fn decode_exact<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(options().deserialize(bytes)?)
}
