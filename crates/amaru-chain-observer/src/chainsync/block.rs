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

use amaru_minicbor_extra::{lazy_array, to_cbor};
use cbor4ii::core::{
    Value,
    dec::Decode as _,
    enc::Encode as _,
    utils::{IoWriter, SliceReader},
};
use minicbor::{
    Decode, Decoder, Encode, Encoder,
    data::{IanaTag, Tag},
    decode, encode,
};

/// A block as served by a node-to-client chain-sync: an era discriminant and the block body,
/// serialised together and wrapped as an embedded CBOR data item (tag 24).
///
/// The block body is materialised as a generic CBOR value. This is the structured fallback used
/// whenever the untouched wire bytes of the block aren't available.
#[derive(Debug, Clone, PartialEq)]
pub struct WrappedBlock {
    pub era: u16,
    pub block: Value,
}

impl WrappedBlock {
    pub fn new(era: u16, block: Value) -> Self {
        Self { era, block }
    }

    /// The CBOR serialisation of `[era, block]`, i.e. the content of the tag 24 envelope.
    pub fn inner_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0x82];
        bytes.extend(to_cbor(&self.era));
        bytes.extend(encode_value(&self.block));
        bytes
    }
}

/// Serialise a generic CBOR value.
#[allow(clippy::expect_used)]
pub fn encode_value(value: &Value) -> Vec<u8> {
    let mut writer = IoWriter::new(Vec::new());
    value
        .encode(&mut writer)
        .expect("serialization to a vec should not fail");
    writer.into_inner()
}

/// Parse a single generic CBOR value from the start of `bytes`.
pub fn decode_value(bytes: &[u8]) -> Result<Value, decode::Error> {
    Value::decode(&mut SliceReader::new(bytes))
        .map_err(|e| decode::Error::message(format!("invalid block body: {e:?}")))
}

impl Encode<()> for WrappedBlock {
    fn encode<W: encode::Write>(
        &self,
        e: &mut Encoder<W>,
        _ctx: &mut (),
    ) -> Result<(), encode::Error<W::Error>> {
        e.tag(IanaTag::Cbor)?;
        e.bytes(&self.inner_bytes())?;
        Ok(())
    }
}

impl<'b> Decode<'b, ()> for WrappedBlock {
    fn decode(d: &mut Decoder<'b>, _ctx: &mut ()) -> Result<Self, decode::Error> {
        let tag = d.tag()?;
        if tag != Tag::from(IanaTag::Cbor) {
            return Err(decode::Error::message(format!(
                "expected wrapped block (tag 24), got tag {}",
                tag.as_u64()
            )));
        }

        let bytes = d.bytes()?;

        // NOTE: the envelope is complete at this point; running out of input inside it is not a
        // reason to wait for more bytes.
        let malformed =
            |e: decode::Error| decode::Error::message(format!("malformed wrapped block: {e}"));

        let elements = lazy_array(bytes).map_err(malformed)?;
        let (era, block) = match elements.as_slice() {
            [era, block, ..] => (*era, *block),
            _ => {
                return Err(decode::Error::message(format!(
                    "expected [era, block] inside wrapped block, got {} element(s)",
                    elements.len()
                )));
            }
        };

        Ok(WrappedBlock {
            era: minicbor::decode(era).map_err(malformed)?,
            block: decode_value(block)?,
        })
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod tests {
    use super::*;
    use proptest::prelude::*;

    /// A Shelley-like block body: a header (itself `[header_body, signature]`) followed by
    /// transaction bodies, witnesses and auxiliary data.
    pub fn sample_block(slot: u64) -> Value {
        Value::Array(vec![
            Value::Array(vec![
                Value::Array(vec![
                    Value::Integer(slot.into()),
                    Value::Bytes(vec![0xca; 32]),
                ]),
                Value::Bytes(vec![0x51; 64]),
            ]),
            Value::Array(vec![]),
            Value::Array(vec![]),
            Value::Map(vec![]),
        ])
    }

    pub fn any_block() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            any::<i64>().prop_map(|n| Value::Integer(n.into())),
            proptest::collection::vec(any::<u8>(), 0..48).prop_map(Value::Bytes),
            "[a-z]{0,8}".prop_map(Value::Text),
        ];
        leaf.prop_recursive(3, 32, 6, |inner| {
            proptest::collection::vec(inner, 0..6).prop_map(Value::Array)
        })
    }

}
