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
    network_magic::NetworkMagic, version_data::VersionData, version_number::VersionNumber,
};
use minicbor::{Decode, Decoder, Encode, Encoder, decode, encode};
use std::{collections::BTreeMap, fmt};

/// An ordered mapping from protocol versions to their parameters. On the client side, this is
/// the proposal sent during the handshake.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct VersionTable<T>
where
    T: fmt::Debug + Clone,
{
    pub values: BTreeMap<VersionNumber, T>,
}

pub type VersionProposal = VersionTable<VersionData>;

impl VersionTable<VersionData> {
    pub fn empty() -> VersionTable<VersionData> {
        VersionTable {
            values: BTreeMap::new(),
        }
    }

    /// Propose a single version.
    pub fn single(version: VersionNumber, network_magic: NetworkMagic) -> VersionTable<VersionData> {
        Self::from_versions([version], network_magic)
    }

    /// Propose every node-to-client version in `[from, to]`.
    pub fn node_to_client_range(
        from: u64,
        to: u64,
        network_magic: NetworkMagic,
    ) -> VersionTable<VersionData> {
        Self::from_versions((from..=to).map(VersionNumber::node_to_client), network_magic)
    }

    pub fn from_versions(
        versions: impl IntoIterator<Item = VersionNumber>,
        network_magic: NetworkMagic,
    ) -> VersionTable<VersionData> {
        let values = versions
            .into_iter()
            .map(|version| (version, VersionData::new(network_magic, false)))
            .collect::<BTreeMap<VersionNumber, VersionData>>();

        VersionTable { values }
    }

    pub fn highest(&self) -> Option<(&VersionNumber, &VersionData)> {
        self.values.last_key_value()
    }
}

impl<T> Encode<()> for VersionTable<T>
where
    T: fmt::Debug + Clone + Encode<VersionNumber>,
{
    fn encode<W: encode::Write>(
        &self,
        e: &mut Encoder<W>,
        _ctx: &mut (),
    ) -> Result<(), encode::Error<W::Error>> {
        e.map(self.values.len() as u64)?;

        for (key, value) in self.values.iter() {
            e.encode(key)?;
            let mut ctx = *key;
            e.encode_with(value, &mut ctx)?;
        }

        Ok(())
    }
}

impl<'b, T> Decode<'b, ()> for VersionTable<T>
where
    T: fmt::Debug + Clone + Decode<'b, VersionNumber>,
{
    fn decode(d: &mut Decoder<'b>, _ctx: &mut ()) -> Result<Self, decode::Error> {
        let len = d.map()?.ok_or(decode::Error::message(
            "expected def-length map for versiontable",
        ))?;
        let mut values = BTreeMap::new();

        for _ in 0..len {
            let key = d.decode()?;
            let mut ctx = key;
            let value = d.decode_with(&mut ctx)?;
            values.insert(key, value);
        }
        Ok(VersionTable { values })
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod tests {
    use super::*;
    use crate::protocol_messages::{
        version_data::tests::any_version_data, version_number::tests::any_version_number,
    };
    use proptest::prelude::*;

    pub fn any_version_table() -> impl Strategy<Value = VersionTable<VersionData>> {
        proptest::collection::btree_map(any_version_number(), any_version_data(), 0..4)
            .prop_map(|values| VersionTable {
                values: values
                    .into_iter()
                    .map(|(version, data)| {
                        // The query flag only exists on the wire from v15 onwards.
                        let query = data.query() && version.has_query();
                        (version, VersionData::new(data.network_magic(), query))
                    })
                    .collect(),
            })
    }

    #[cfg(test)]
    mod internal {
        use super::*;
        use amaru_minicbor_extra::{from_cbor_no_leftovers, to_cbor};

        #[test]
        fn single_v10_preprod_proposal() {
            let table = VersionTable::single(VersionNumber::V10, NetworkMagic::PREPROD);
            assert_eq!(hex::encode(to_cbor(&table)), "a119800a01");
        }

        #[test]
        fn range_proposal_is_ordered() {
            let table = VersionTable::node_to_client_range(9, 16, NetworkMagic::MAINNET);
            let versions = table.values.keys().copied().collect::<Vec<_>>();
            assert_eq!(versions.len(), 8);
            assert_eq!(versions.first(), Some(&VersionNumber::V9));
            assert_eq!(table.highest().map(|(v, _)| *v), Some(VersionNumber::V16));
        }

        proptest! {
            #[test]
            fn version_table_roundtrip(table in any_version_table()) {
                let decoded = from_cbor_no_leftovers::<VersionTable<VersionData>>(&to_cbor(&table));
                prop_assert_eq!(Some(table), decoded.ok());
            }
        }
    }
}
