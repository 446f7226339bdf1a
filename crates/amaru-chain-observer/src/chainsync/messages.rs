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

use crate::{
    chainsync::block::WrappedBlock,
    point::{Point, Tip},
};
use amaru_minicbor_extra::check_tagged_array_length;
use minicbor::{Decode, Decoder, Encode, Encoder, decode, encode};

/// Node-to-client chain-sync messages.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    RequestNext,
    AwaitReply,
    RollForward(WrappedBlock, Tip),
    RollBackward(Point, Tip),
    FindIntersect(Vec<Point>),
    IntersectFound(Point, Tip),
    IntersectNotFound(Tip),
    Done,
}

impl Message {
    pub fn name(&self) -> &'static str {
        match self {
            Message::RequestNext => "RequestNext",
            Message::AwaitReply => "AwaitReply",
            Message::RollForward(..) => "RollForward",
            Message::RollBackward(..) => "RollBackward",
            Message::FindIntersect(_) => "FindIntersect",
            Message::IntersectFound(..) => "IntersectFound",
            Message::IntersectNotFound(_) => "IntersectNotFound",
            Message::Done => "Done",
        }
    }
}

impl Encode<()> for Message {
    fn encode<W: encode::Write>(
        &self,
        e: &mut Encoder<W>,
        _ctx: &mut (),
    ) -> Result<(), encode::Error<W::Error>> {
        match self {
            Message::RequestNext => {
                e.array(1)?.u16(0)?;
            }
            Message::AwaitReply => {
                e.array(1)?.u16(1)?;
            }
            Message::RollForward(block, tip) => {
                e.array(3)?.u16(2)?;
                e.encode(block)?;
                e.encode(tip)?;
            }
            Message::RollBackward(point, tip) => {
                e.array(3)?.u16(3)?;
                e.encode(point)?;
                e.encode(tip)?;
            }
            Message::FindIntersect(points) => {
                e.array(2)?.u16(4)?;
                e.array(points.len() as u64)?;
                for point in points.iter() {
                    e.encode(point)?;
                }
            }
            Message::IntersectFound(point, tip) => {
                e.array(3)?.u16(5)?;
                e.encode(point)?;
                e.encode(tip)?;
            }
            Message::IntersectNotFound(tip) => {
                e.array(2)?.u16(6)?;
                e.encode(tip)?;
            }
            Message::Done => {
                e.array(1)?.u16(7)?;
            }
        }

        Ok(())
    }
}

impl<'b> Decode<'b, ()> for Message {
    fn decode(d: &mut Decoder<'b>, _ctx: &mut ()) -> Result<Self, decode::Error> {
        let len = d.array()?;
        let label = d.u16()?;

        match label {
            0 => {
                check_tagged_array_length(0, len, 1)?;
                Ok(Message::RequestNext)
            }
            1 => {
                check_tagged_array_length(1, len, 1)?;
                Ok(Message::AwaitReply)
            }
            2 => {
                check_tagged_array_length(2, len, 3)?;
                let block = d.decode()?;
                let tip = d.decode()?;
                Ok(Message::RollForward(block, tip))
            }
            3 => {
                check_tagged_array_length(3, len, 3)?;
                let point = d.decode()?;
                let tip = d.decode()?;
                Ok(Message::RollBackward(point, tip))
            }
            4 => {
                check_tagged_array_length(4, len, 2)?;
                let points = d.array_iter::<Point>()?.collect::<Result<_, _>>()?;
                Ok(Message::FindIntersect(points))
            }
            5 => {
                check_tagged_array_length(5, len, 3)?;
                let point = d.decode()?;
                let tip = d.decode()?;
                Ok(Message::IntersectFound(point, tip))
            }
            6 => {
                check_tagged_array_length(6, len, 2)?;
                let tip = d.decode()?;
                Ok(Message::IntersectNotFound(tip))
            }
            7 => {
                check_tagged_array_length(7, len, 1)?;
                Ok(Message::Done)
            }
            n => Err(decode::Error::message(format!(
                "unknown variant for chainsync message: {n}"
            ))),
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod tests {
    use super::*;
    use crate::{
        chainsync::block::tests::any_block,
        point::tests::{any_point, any_tip},
    };
    use proptest::prelude::*;

    pub fn any_message() -> impl Strategy<Value = Message> {
        prop_oneof![
            Just(Message::RequestNext),
            Just(Message::AwaitReply),
            (0_u16..8, any_block(), any_tip())
                .prop_map(|(era, block, tip)| Message::RollForward(WrappedBlock::new(era, block), tip)),
            (any_point(), any_tip()).prop_map(|(point, tip)| Message::RollBackward(point, tip)),
            proptest::collection::vec(any_point(), 0..4).prop_map(Message::FindIntersect),
            (any_point(), any_tip()).prop_map(|(point, tip)| Message::IntersectFound(point, tip)),
            any_tip().prop_map(Message::IntersectNotFound),
            Just(Message::Done),
        ]
    }

    #[cfg(test)]
    mod internal {
        use super::*;
        use amaru_minicbor_extra::{from_cbor_no_leftovers, to_cbor};
        use test_case::test_case;

        #[test_case(Message::RequestNext => "8100")]
        #[test_case(Message::Done => "8107")]
        #[test_case(Message::FindIntersect(vec![Point::Origin]) => "82048180" ; "find origin")]
        fn encode_messages(message: Message) -> String {
            hex::encode(to_cbor(&message))
        }

        #[test]
        fn find_default_intersection() {
            let point = Point::try_from(
                "41084896.35af5a4cfaf14d0783f21963926b0422dde37f570274faa4ed83f32938fbf07c",
            )
            .unwrap();
            assert_eq!(
                hex::encode(to_cbor(&Message::FindIntersect(vec![point]))),
                "82048182\
                 1a0272e7e0\
                 582035af5a4cfaf14d0783f21963926b0422dde37f570274faa4ed83f32938fbf07c"
            );
        }

        #[test_case("820080" ; "wrong arity")]
        #[test_case("8108" ; "unknown label")]
        #[test_case("83038080" ; "truncated roll backward")]
        fn rejects_malformed_messages(bytes: &str) {
            assert!(from_cbor_no_leftovers::<Message>(&hex::decode(bytes).unwrap()).is_err());
        }

        proptest! {
            #[test]
            fn chainsync_roundtrip(message in any_message()) {
                let decoded = from_cbor_no_leftovers::<Message>(&to_cbor(&message));
                prop_assert_eq!(Some(message), decoded.ok());
            }
        }
    }
}
