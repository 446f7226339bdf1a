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

use crate::protocol_messages::{network_magic::NetworkMagic, version_number::VersionNumber};
use minicbor::{Decode, Decoder, Encode, Encoder, data::Type, decode, encode};

/// Node-to-client version parameters. Versions before 15 only carry the network magic, as a bare
/// integer; later versions wrap it in an array along with the `query` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VersionData {
    network_magic: NetworkMagic,
    query: bool,
}

impl VersionData {
    pub fn new(network_magic: NetworkMagic, query: bool) -> Self {
        VersionData {
            network_magic,
            query,
        }
    }

    pub fn network_magic(&self) -> NetworkMagic {
        self.network_magic
    }

    pub fn query(&self) -> bool {
        self.query
    }
}

impl<T: AsRef<VersionNumber>> Encode<T> for VersionData {
    fn encode<W: encode::Write>(
        &self,
        e: &mut Encoder<W>,
        ctx: &mut T,
    ) -> Result<(), encode::Error<W::Error>> {
        if ctx.as_ref().has_query() {
            e.array(2)?.encode(self.network_magic)?.bool(self.query)?;
        } else {
            e.encode(self.network_magic)?;
        }
        Ok(())
    }
}

impl<'b, T: AsRef<VersionNumber>> Decode<'b, T> for VersionData {
    fn decode(d: &mut Decoder<'b>, ctx: &mut T) -> Result<Self, decode::Error> {
        // NOTE: some nodes answer with the array form regardless of the version; accept both.
        if ctx.as_ref().has_query() || d.datatype()? == Type::Array {
            let len = d.array()?;
            if len != Some(2) {
                return Err(decode::Error::message(format!(
                    "expected version data as [magic, query], got an array of length {len:?}"
                )));
            }
            let network_magic = d.decode()?;
            let query = d.bool()?;
            Ok(Self {
                network_magic,
                query,
            })
        } else {
            Ok(Self {
                network_magic: d.decode()?,
                query: false,
            })
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod tests {
    use super::*;
    use crate::protocol_messages::network_magic::tests::any_network_magic;
    use proptest::prelude::any;
    use proptest::prop_compose;

    prop_compose! {
        pub fn any_version_data()(
            network_magic in any_network_magic(),
            query in any::<bool>(),
        ) -> VersionData {
            VersionData::new(network_magic, query)
        }
    }

    #[cfg(test)]
    mod internal {
        use super::*;
        use test_case::test_case;

        fn encode_with(data: VersionData, mut version: VersionNumber) -> String {
            let mut e = Encoder::new(Vec::new());
            e.encode_with(data, &mut version).unwrap();
            hex::encode(e.into_writer())
        }

        #[test_case(VersionNumber::V10 => "01" ; "bare magic before v15")]
        #[test_case(VersionNumber::V15 => "8201f4" ; "magic and query from v15")]
        fn version_data_layout(version: VersionNumber) -> String {
            encode_with(VersionData::new(NetworkMagic::PREPROD, false), version)
        }

        #[test]
        fn decode_array_form_on_old_versions() {
            let bytes = hex::decode("8202f5").unwrap();
            let mut ctx = VersionNumber::V10;
            let data: VersionData = minicbor::decode_with(&bytes, &mut ctx).unwrap();
            assert_eq!(data, VersionData::new(NetworkMagic::PREVIEW, true));
        }

        #[test_case("8101" ; "missing query")]
        #[test_case("8301f400" ; "extra element")]
        fn reject_wrongly_sized_arrays(bytes: &str) {
            let bytes = hex::decode(bytes).unwrap();
            let mut ctx = VersionNumber::V15;
            let result: Result<VersionData, _> = minicbor::decode_with(&bytes, &mut ctx);
            let error = result.unwrap_err();
            assert!(error.to_string().contains("[magic, query]"), "{error}");
            assert!(!error.to_string().contains("label"), "{error}");
        }
    }
}
