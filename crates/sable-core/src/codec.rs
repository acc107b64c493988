//! Versioned JSON envelope for structured column values.
//!
//! Structured values (lists, maps, nested records) are stored in a text column
//! as `{"v":1,"data":...}`. The version tag lets the layout evolve without
//! guessing at old rows; [`decode`] rejects versions it does not know.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Current envelope version.
pub const CODEC_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a, T: ?Sized> {
    v: u32,
    data: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    v: u32,
    data: T,
}

/// Encode `value` into envelope text.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(&EnvelopeRef {
        v: CODEC_VERSION,
        data: value,
    })?)
}

/// Decode envelope text produced by [`encode`].
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T> {
    let envelope: Envelope<T> = serde_json::from_str(text)?;
    if envelope.v != CODEC_VERSION {
        return Err(<serde_json::Error as serde::de::Error>::custom(format!(
            "unsupported envelope version {}",
            envelope.v
        ))
        .into());
    }
    Ok(envelope.data)
}
