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

use crate::point::HeaderHash;
use pallas_crypto::hash::Hasher;

/// Identify a block by the blake2b-256 digest of its serialised header.
pub fn digest(header: &[u8]) -> HeaderHash {
    Hasher::<256>::hash(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn digest_of_empty_input() {
        assert_eq!(
            digest(&[]).to_string(),
            "0e5751c026e543b2e8ab2eb06099daa1d1e5df47778f7787faab45cdf12fe3a8"
        );
    }

    proptest! {
        #[test]
        fn digest_is_deterministic(header in proptest::collection::vec(any::<u8>(), 0..512)) {
            prop_assert_eq!(digest(&header), digest(&header));
        }

        #[test]
        fn digest_tells_headers_apart(
            a in proptest::collection::vec(any::<u8>(), 0..64),
            b in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            prop_assume!(a != b);
            prop_assert_ne!(digest(&a), digest(&b));
        }
    }
}
