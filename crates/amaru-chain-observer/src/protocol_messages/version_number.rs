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

use minicbor::{Decode, Decoder, Encode, Encoder, decode, encode};
use std::fmt;

/// Node-to-client version numbers are set apart from node-to-node ones by bit 15.
pub const NODE_TO_CLIENT_BIT: u64 = 0x8000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionNumber(u64);

impl From<u64> for VersionNumber {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<VersionNumber> for u64 {
    fn from(value: VersionNumber) -> Self {
        value.0
    }
}

impl AsRef<VersionNumber> for VersionNumber {
    fn as_ref(&self) -> &VersionNumber {
        self
    }
}

impl VersionNumber {
    pub const V9: VersionNumber = VersionNumber::node_to_client(9);
    pub const V10: VersionNumber = VersionNumber::node_to_client(10);
    pub const V14: VersionNumber = VersionNumber::node_to_client(14);
    pub const V15: VersionNumber = VersionNumber::node_to_client(15);
    pub const V16: VersionNumber = VersionNumber::node_to_client(16);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Build the on-wire number of the node-to-client protocol version `n`.
    pub const fn node_to_client(n: u64) -> Self {
        Self(n | NODE_TO_CLIENT_BIT)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The protocol version, without the node-to-client marker.
    pub const fn protocol_version(self) -> u64 {
        self.0 & !NODE_TO_CLIENT_BIT
    }

    pub const fn has_query(self) -> bool {
        self.protocol_version() >= 15
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 & NODE_TO_CLIENT_BIT != 0 {
            write!(f, "n2c-v{}", self.protocol_version())
        } else {
            write!(f, "v{}", self.0)
        }
    }
}

impl<C> Encode<C> for VersionNumber {
    fn encode<W: encode::Write>(
        &self,
        e: &mut Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        self.0.encode(e, ctx)
    }
}

impl<'b, C> Decode<'b, C> for VersionNumber {
    fn decode(d: &mut Decoder<'b>, ctx: &mut C) -> Result<Self, decode::Error> {
        u64::decode(d, ctx).map(VersionNumber)
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod tests {
    use super::*;
    use proptest::prelude::Strategy;

    pub fn any_version_number() -> impl Strategy<Value = VersionNumber> {
        (9_u64..=20).prop_map(VersionNumber::node_to_client)
    }

    #[cfg(test)]
    mod internal {
        use super::*;
        use test_case::test_case;

        #[test_case(VersionNumber::V10 => 0x800a)]
        #[test_case(VersionNumber::V16 => 0x8010)]
        fn node_to_client_bit_is_set(version: VersionNumber) -> u64 {
            version.as_u64()
        }

        #[test_case(VersionNumber::V14 => false)]
        #[test_case(VersionNumber::V15 => true)]
        fn query_flag_appears_in_v15(version: VersionNumber) -> bool {
            version.has_query()
        }

        #[test]
        fn display_version() {
            assert_eq!(VersionNumber::V10.to_string(), "n2c-v10");
            assert_eq!(VersionNumber::new(14).to_string(), "v14");
        }
    }
}
