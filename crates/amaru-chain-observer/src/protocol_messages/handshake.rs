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

use crate::protocol_messages::{
    version_data::VersionData,
    version_number::VersionNumber,
    version_table::{VersionProposal, VersionTable},
};
use amaru_minicbor_extra::check_tagged_array_length;
use minicbor::{Decode, Decoder, Encode, Encoder, decode, encode};
use std::fmt;

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum HandshakeOutcome {
    Accepted(VersionNumber, VersionData),
    Refused(RefuseReason),
}

#[derive(Debug, PartialEq, Eq, Clone, PartialOrd, Ord)]
pub enum RefuseReason {
    VersionMismatch(Vec<VersionNumber>),
    HandshakeDecodeError(VersionNumber, String),
    Refused(VersionNumber, String),
}

impl fmt::Display for RefuseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefuseReason::VersionMismatch(versions) => {
                let versions = versions
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "version mismatch, peer supports [{versions}]")
            }
            RefuseReason::HandshakeDecodeError(version, msg) => {
                write!(f, "peer failed to decode {version} parameters: {msg}")
            }
            RefuseReason::Refused(version, msg) => write!(f, "{version} refused: {msg}"),
        }
    }
}

impl Encode<()> for RefuseReason {
    fn encode<W: encode::Write>(
        &self,
        e: &mut Encoder<W>,
        _ctx: &mut (),
    ) -> Result<(), encode::Error<W::Error>> {
        match self {
            RefuseReason::VersionMismatch(versions) => {
                e.array(2)?;
                e.u16(0)?;
                e.array(versions.len() as u64)?;
                for v in versions.iter() {
                    e.encode(v)?;
                }
            }
            RefuseReason::HandshakeDecodeError(version, msg) => {
                e.array(3)?;
                e.u16(1)?;
                e.encode(version)?;
                e.str(msg)?;
            }
            RefuseReason::Refused(version, msg) => {
                e.array(3)?;
                e.u16(2)?;
                e.encode(version)?;
                e.str(msg)?;
            }
        }

        Ok(())
    }
}

impl<'b> Decode<'b, ()> for RefuseReason {
    fn decode(d: &mut Decoder<'b>, _ctx: &mut ()) -> Result<Self, decode::Error> {
        let len = d.array()?;

        match d.u16()? {
            0 => {
                check_tagged_array_length(0, len, 2)?;
                let versions = d.array_iter::<VersionNumber>()?;
                let versions = versions.collect::<Result<_, _>>()?;
                Ok(RefuseReason::VersionMismatch(versions))
            }
            1 => {
                check_tagged_array_length(1, len, 3)?;
                let version = d.decode()?;
                let msg = d.str()?;
                Ok(RefuseReason::HandshakeDecodeError(version, msg.to_string()))
            }
            2 => {
                check_tagged_array_length(2, len, 3)?;
                let version = d.decode()?;
                let msg = d.str()?;
                Ok(RefuseReason::Refused(version, msg.to_string()))
            }
            n => Err(decode::Error::message(format!(
                "unknown variant for refusereason: {n}"
            ))),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Message {
    Propose(VersionProposal),
    Accept(VersionNumber, VersionData),
    Refuse(RefuseReason),
    QueryReply(VersionProposal),
}

impl Message {
    pub fn name(&self) -> &'static str {
        match self {
            Message::Propose(_) => "Propose",
            Message::Accept(..) => "Accept",
            Message::Refuse(_) => "Refuse",
            Message::QueryReply(_) => "QueryReply",
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
            Message::Propose(version_table) => {
                e.array(2)?.u16(0)?;
                e.encode(version_table)?;
            }
            Message::Accept(version_number, version_data) => {
                e.array(3)?.u16(1)?;
                e.encode(version_number)?;
                let mut ctx = *version_number;
                e.encode_with(version_data, &mut ctx)?;
            }
            Message::Refuse(reason) => {
                e.array(2)?.u16(2)?;
                e.encode(reason)?;
            }
            Message::QueryReply(version_table) => {
                e.array(2)?.u16(3)?;
                e.encode(version_table)?;
            }
        };

        Ok(())
    }
}

impl<'b> Decode<'b, ()> for Message {
    fn decode(d: &mut Decoder<'b>, _ctx: &mut ()) -> Result<Self, decode::Error> {
        let len = d.array()?;

        match d.u16()? {
            0 => {
                check_tagged_array_length(0, len, 2)?;
                Ok(Message::Propose(d.decode()?))
            }
            1 => {
                check_tagged_array_length(1, len, 3)?;
                let version_number = d.decode()?;
                let mut ctx = version_number;
                let version_data = d.decode_with(&mut ctx)?;
                Ok(Message::Accept(version_number, version_data))
            }
            2 => {
                check_tagged_array_length(2, len, 2)?;
                Ok(Message::Refuse(d.decode()?))
            }
            3 => {
                check_tagged_array_length(3, len, 2)?;
                Ok(Message::QueryReply(d.decode()?))
            }
            n => Err(decode::Error::message(format!(
                "unknown variant for handshake message: {n}"
            ))),
        }
    }
}

/// Answer a proposal the way a responder does: pick the highest version both sides support, and
/// accept it when the network magics agree.
pub fn respond_to_proposal(proposal: &VersionProposal, supported: &VersionTable<VersionData>) -> Message {
    let common = proposal
        .values
        .iter()
        .rev()
        .find_map(|(version, data)| supported.values.get(version).map(|ours| (*version, data, ours)));

    match common {
        None => Message::Refuse(RefuseReason::VersionMismatch(
            supported.values.keys().copied().collect(),
        )),
        Some((version, theirs, ours)) if theirs.network_magic() != ours.network_magic() => {
            Message::Refuse(RefuseReason::Refused(
                version,
                format!(
                    "network magic mismatch: {} != {}",
                    theirs.network_magic(),
                    ours.network_magic()
                ),
            ))
        }
        Some((version, theirs, _)) => Message::Accept(version, *theirs),
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod tests {
    use super::*;
    use crate::protocol_messages::version_number::tests::any_version_number;
    use proptest::prelude::*;

    prop_compose! {
        pub fn any_handshake_decode_error_reason()(
            version_number in any_version_number(),
            message in any::<String>(),
        ) -> RefuseReason {
            RefuseReason::HandshakeDecodeError(version_number, message)
        }
    }

    prop_compose! {
        pub fn any_refused_reason()(
            version_number in any_version_number(),
            message in any::<String>(),
        ) -> RefuseReason {
            RefuseReason::Refused(version_number, message)
        }
    }

    prop_compose! {
        pub fn any_version_mismatch_reason()(
            versions in proptest::collection::vec(any_version_number(), 1..3),
        ) -> RefuseReason {
            RefuseReason::VersionMismatch(versions)
        }
    }

    pub fn any_refuse_reason() -> impl Strategy<Value = RefuseReason> {
        prop_oneof![
            1 => any_version_mismatch_reason(),
            1 => any_handshake_decode_error_reason(),
            1 => any_refused_reason(),
        ]
    }

}
