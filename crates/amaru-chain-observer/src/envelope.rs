// Copyright 2025 PRAGMA
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::chainsync::block::encode_value;
use amaru_minicbor_extra::lazy_array;
use cbor4ii::core::Value;
use minicbor::{Decoder, data::Type};

/// Block bytes recovered from a roll-forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// The block body, exactly as found on the wire.
    Extracted(Vec<u8>),
    /// The re-serialised structured block, used when the raw bytes don't have the expected shape.
    Fallback {
        reason: EnvelopeMismatch,
        bytes: Vec<u8>,
    },
}

impl Extraction {
    pub fn bytes(&self) -> &[u8] {
        match self {
            Extraction::Extracted(bytes) | Extraction::Fallback { bytes, .. } => bytes,
        }
    }
}

/// Why raw roll-forward bytes couldn't be unwrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeMismatch {
    #[error("no raw bytes")]
    Absent,
    #[error("raw bytes aren't valid CBOR")]
    Unparseable,
    #[error("envelope isn't an array")]
    NotAnArray,
    #[error("envelope has fewer than 2 elements")]
    TooShort,
    #[error("second envelope element isn't a tagged byte string")]
    NotTaggedBytes,
    #[error("wrapped bytes aren't an array")]
    InnerNotArray,
    #[error("wrapped array has fewer than 2 elements")]
    InnerTooShort,
}

/// Recover the block body from the raw bytes of a roll-forward message.
///
/// The body sits two levels deep: `[_, #tag(bytes([_, body])), ..]`. Only the outer message is
/// validated as a whole; the wrapped array is split lazily and `body` is returned untouched. On
/// any shape mismatch, falls back to serialising `fallback`. Never fails.
pub fn extract(raw: Option<&[u8]>, fallback: &Value) -> Extraction {
    match unwrap_envelope(raw) {
        Ok(body) => Extraction::Extracted(body.to_vec()),
        Err(reason) => Extraction::Fallback {
            reason,
            bytes: encode_value(fallback),
        },
    }
}

fn unwrap_envelope(raw: Option<&[u8]>) -> Result<&[u8], EnvelopeMismatch> {
    let raw = raw.ok_or(EnvelopeMismatch::Absent)?;

    Decoder::new(raw)
        .skip()
        .map_err(|_| EnvelopeMismatch::Unparseable)?;

    match Decoder::new(raw).datatype() {
        Ok(Type::Array | Type::ArrayIndef) => {}
        Ok(_) | Err(_) => return Err(EnvelopeMismatch::NotAnArray),
    }

    let outer = lazy_array(raw).map_err(|_| EnvelopeMismatch::Unparseable)?;
    let wrapped = match outer.as_slice() {
        [_, wrapped, ..] => *wrapped,
        _ => return Err(EnvelopeMismatch::TooShort),
    };

    let inner = tagged_bytes(wrapped).ok_or(EnvelopeMismatch::NotTaggedBytes)?;

    let elements = lazy_array(inner).map_err(|_| EnvelopeMismatch::InnerNotArray)?;
    match elements.as_slice() {
        [_, body, ..] => Ok(*body),
        _ => Err(EnvelopeMismatch::InnerTooShort),
    }
}

fn tagged_bytes(bytes: &[u8]) -> Option<&[u8]> {
    let mut d = Decoder::new(bytes);
    d.tag().ok()?;
    d.bytes().ok()
}
