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

use amaru_minicbor_extra::check_tagged_array_length;
use minicbor::{Decode, Decoder, Encode, Encoder, decode, encode};
use pallas_crypto::hash::Hash;
use std::fmt::{self, Debug, Display};

pub const HEADER_HASH_SIZE: usize = 32;

/// Type alias for a header hash to improve readability
pub type HeaderHash = Hash<HEADER_HASH_SIZE>;

pub type Slot = u64;

pub type BlockHeight = u64;

/// A position on the chain. `Specific` points are immutable (slot, header hash) pairs; `Origin`
/// is the conventional point before the first block.
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash, Default)]
pub enum Point {
    #[default]
    Origin,
    Specific(Slot, HeaderHash),
}

impl Point {
    pub fn slot_or_default(&self) -> Slot {
        match self {
            Point::Origin => 0,
            Point::Specific(slot, _) => *slot,
        }
    }

    pub fn hash(&self) -> HeaderHash {
        match self {
            // By convention, the hash of `Genesis` is all 0s.
            Point::Origin => Hash::from([0; HEADER_HASH_SIZE]),
            Point::Specific(_, header_hash) => *header_hash,
        }
    }
}

impl Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Point::Origin => write!(f, "Origin"),
            Point::Specific(slot, _hash) => write!(f, "Specific({slot}, {})", self.hash()),
        }
    }
}

impl Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.slot_or_default(), self.hash())
    }
}

/// Parse a point of the form '<slot>.<hash>', where `<slot>` is a number and `<hash>` is a
/// hex-encoded 32 bytes hash.
impl TryFrom<&str> for Point {
    type Error = String;

    fn try_from(raw_str: &str) -> Result<Self, Self::Error> {
        let mut split = raw_str.split('.');

        let slot = split
            .next()
            .ok_or("missing slot number before '.'")
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|_| "failed to parse point's slot as a non-negative integer")
            })?;

        let block_header_hash = split
            .next()
            .ok_or("missing block header hash after '.'".to_string())
            .and_then(|s| {
                s.parse::<HeaderHash>()
                    .map_err(|e| format!("failed to parse block header hash: {}", e))
            })?;

        Ok(Point::Specific(slot, block_header_hash))
    }
}

impl std::str::FromStr for Point {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Point::try_from(s)
    }
}

impl Encode<()> for Point {
    fn encode<W: encode::Write>(
        &self,
        e: &mut Encoder<W>,
        _ctx: &mut (),
    ) -> Result<(), encode::Error<W::Error>> {
        match self {
            Point::Origin => e.array(0)?,
            Point::Specific(slot, hash) => e.array(2)?.u64(*slot)?.bytes(&hash[..])?,
        };

        Ok(())
    }
}

impl<'b> Decode<'b, ()> for Point {
    fn decode(d: &mut Decoder<'b>, _ctx: &mut ()) -> Result<Self, decode::Error> {
        let size = d.array()?;

        match size {
            Some(0) => Ok(Point::Origin),
            Some(2) => {
                let slot = d.u64()?;
                let hash = d.bytes()?;
                if hash.len() != HEADER_HASH_SIZE {
                    return Err(decode::Error::message("header hash must be 32 bytes"));
                }
                Ok(Point::Specific(slot, HeaderHash::from(hash)))
            }
            _ => Err(decode::Error::message(format!(
                "can't decode Point from array of size {size:?}"
            ))),
        }
    }
}

/// The peer's view of its own chain tip, attached to most chain-sync replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tip(Point, BlockHeight);

impl Tip {
    pub fn origin() -> Self {
        Self(Point::Origin, 0)
    }

    pub fn new(point: Point, block_height: BlockHeight) -> Self {
        Self(point, block_height)
    }

    pub fn point(&self) -> Point {
        self.0
    }

    pub fn slot(&self) -> Slot {
        self.0.slot_or_default()
    }

    pub fn block_height(&self) -> BlockHeight {
        self.1
    }
}

impl Display for Tip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.1, self.0.hash())
    }
}

impl Encode<()> for Tip {
    fn encode<W: encode::Write>(
        &self,
        e: &mut Encoder<W>,
        _ctx: &mut (),
    ) -> Result<(), encode::Error<W::Error>> {
        e.array(2)?;
        e.encode(self.0)?;
        e.u64(self.1)?;

        Ok(())
    }
}

impl<'b> Decode<'b, ()> for Tip {
    fn decode(d: &mut Decoder<'b>, _ctx: &mut ()) -> Result<Self, decode::Error> {
        let len = d.array()?;
        check_tagged_array_length(0, len, 2)?;
        let point = d.decode()?;
        let block_height = d.u64()?;
        Ok(Tip(point, block_height))
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod tests {
    use super::*;
    use proptest::prelude::*;

    prop_compose! {
        pub fn any_point()(
            slot in any::<u64>(),
            bytes in proptest::array::uniform32(any::<u8>()),
        ) -> Point {
            Point::Specific(slot, Hash::new(bytes))
        }
    }

    prop_compose! {
        pub fn any_tip()(point in any_point(), block_height in any::<u64>()) -> Tip {
            Tip::new(point, block_height)
        }
    }

    #[cfg(test)]
    mod internal {
        use super::*;
        use amaru_minicbor_extra::{from_cbor_no_leftovers, to_cbor};
        use test_case::test_case;

        const HASH: [u8; 32] = [
            254, 252, 156, 3, 124, 63, 156, 139, 79, 183, 138, 155, 15, 19, 123, 94, 208, 128, 60,
            61, 70, 189, 45, 14, 64, 197, 159, 169, 12, 160, 2, 193,
        ];

        #[test_case(Point::Origin => "Origin")]
        #[test_case(
            Point::Specific(42, Hash::new(HASH))
                => "Specific(42, fefc9c037c3f9c8b4fb78a9b0f137b5ed0803c3d46bd2d0e40c59fa90ca002c1)";
            "specific"
        )]
        fn better_debug_point(point: Point) -> String {
            format!("{point:?}")
        }

        #[test_case(
            Point::Origin => "0.0000000000000000000000000000000000000000000000000000000000000000";
           "origin"
        )]
        #[test_case(
            Point::Specific(42, Hash::new(HASH))
                => "42.fefc9c037c3f9c8b4fb78a9b0f137b5ed0803c3d46bd2d0e40c59fa90ca002c1";
            "specific"
        )]
        fn better_display_point(point: Point) -> String {
            format!("{point}")
        }

        #[test]
        fn parse_point_with_short_hash() {
            let error = Point::try_from("42.0123456789abcdef").unwrap_err();
            assert!(error.starts_with("failed to parse block header hash"), "{error}");
        }

        #[test]
        fn parse_default_intersection() {
            let point = Point::try_from(
                "41084896.35af5a4cfaf14d0783f21963926b0422dde37f570274faa4ed83f32938fbf07c",
            )
            .unwrap();
            assert_eq!(point.slot_or_default(), 41084896);
            assert_eq!(
                point.hash().to_string(),
                "35af5a4cfaf14d0783f21963926b0422dde37f570274faa4ed83f32938fbf07c"
            );
        }

        #[test]
        fn origin_encodes_as_empty_array() {
            assert_eq!(to_cbor(&Point::Origin), vec![0x80]);
        }

        #[test]
        fn rejects_short_hashes() {
            let bytes = to_cbor(&(42_u64, minicbor::bytes::ByteVec::from(vec![0_u8; 31])));
            assert!(from_cbor_no_leftovers::<Point>(&bytes).is_err());
        }

        proptest! {
            #[test]
            fn tip_cbor_roundtrip(tip in any_tip()) {
                let decoded = from_cbor_no_leftovers::<Tip>(&to_cbor(&tip));
                prop_assert_eq!(Some(tip), decoded.ok());
            }
        }
    }
}
