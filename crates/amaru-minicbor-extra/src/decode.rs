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

use crate::cbor;
use minicbor::decode;

// Misc
// ----------------------------------------------------------------------------

pub fn decode_break<'d>(
    d: &mut cbor::Decoder<'d>,
    len: Option<u64>,
) -> Result<bool, cbor::decode::Error> {
    if d.datatype()? == cbor::data::Type::Break {
        // NOTE: If we encounter a rogue Break while decoding a definite array, that's an error.
        if len.is_some() {
            return Err(cbor::decode::Error::type_mismatch(cbor::data::Type::Break));
        }

        d.skip()?;

        return Ok(true);
    }

    Ok(false)
}

/// Decode a chunk, but retain a reference to the decoded bytes.
pub fn tee<'d, A>(
    d: &mut cbor::Decoder<'d>,
    decoder: impl FnOnce(&mut cbor::Decoder<'d>) -> Result<A, cbor::decode::Error>,
) -> Result<(A, &'d [u8]), cbor::decode::Error> {
    let original_bytes = d.input();
    let start = d.position();
    let a = decoder(d)?;
    let end = d.position();
    Ok((a, &original_bytes[start..end]))
}

/// This function checks the size of an array containing a tagged value.
/// The `label` parameter is used to identify which variant is being checked.
pub fn check_tagged_array_length(
    label: usize,
    actual: Option<u64>,
    expected: u64,
) -> Result<(), decode::Error> {
    if actual != Some(expected) {
        Err(decode::Error::message(format!(
            "expected array length {expected} for label {label}, got: {actual:?}"
        )))
    } else {
        Ok(())
    }
}

// Lazy arrays
// ----------------------------------------------------------------------------

/// Split the CBOR array found at the start of `bytes` into the raw bytes of each of its elements.
///
/// Elements are only skipped over: nested structures are checked for well-formedness but never
/// materialized, and the returned slices are the original, untouched encoding of each element.
/// Both definite and indefinite arrays are supported. Trailing bytes after the array are ignored.
pub fn lazy_array(bytes: &[u8]) -> Result<Vec<&[u8]>, cbor::decode::Error> {
    lazy_elements(&mut cbor::Decoder::new(bytes))
}

/// Same as [`lazy_array`], but reading from an existing decoder.
pub fn lazy_elements<'d>(
    d: &mut cbor::Decoder<'d>,
) -> Result<Vec<&'d [u8]>, cbor::decode::Error> {
    let len = d.array()?;

    // NOTE: never trust the advertised length for allocation; it comes straight off the wire.
    let mut elements = Vec::new();
    let mut n = 0;
    while len.is_none() || Some(n) < len {
        if decode_break(d, len)? {
            break;
        }

        let ((), raw) = tee(d, |d| d.skip())?;
        elements.push(raw);

        n += 1;
    }

    Ok(elements)
}

#[cfg(test)]
mod tests {
    use crate::{check_tagged_array_length, lazy_array, tee, to_cbor};
    use minicbor as cbor;
    use proptest::prelude::*;
    use test_case::test_case;

    fn indefinite(elements: &[u64]) -> Vec<u8> {
        let mut e = cbor::Encoder::new(Vec::new());
        e.begin_array().unwrap();
        for element in elements {
            e.u64(*element).unwrap();
        }
        e.end().unwrap();
        e.into_writer()
    }

    #[test]
    fn lazy_array_returns_untouched_element_bytes() {
        let first = to_cbor(&(1_u8, "header"));
        let second = to_cbor(&vec![0xde_u8, 0xad, 0xbe, 0xef]);

        let mut bytes = vec![0x82];
        bytes.extend(&first);
        bytes.extend(&second);

        let elements = lazy_array(&bytes).unwrap();

        assert_eq!(elements, vec![first.as_slice(), second.as_slice()]);
    }

    #[test]
    fn lazy_array_supports_indefinite_arrays() {
        let bytes = indefinite(&[1, 2, 3]);

        let elements = lazy_array(&bytes).unwrap();

        assert_eq!(elements, vec![&[0x01_u8][..], &[0x02_u8][..], &[0x03_u8][..]]);
    }

    #[test_case(&[] ; "empty input")]
    #[test_case(&[0x01] ; "not an array")]
    #[test_case(&[0x83, 0x01, 0x02] ; "truncated definite array")]
    #[test_case(&[0x9f, 0x01] ; "unterminated indefinite array")]
    #[test_case(&[0x82, 0x01, 0xff] ; "rogue break in definite array")]
    #[test_case(&[0x9b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff] ; "absurd length")]
    fn lazy_array_rejects(bytes: &[u8]) {
        assert!(lazy_array(bytes).is_err());
    }

    #[test]
    fn tee_captures_decoded_bytes() {
        let bytes = to_cbor(&(42_u64, 14_u64));
        let mut d = cbor::Decoder::new(&bytes);
        d.array().unwrap();

        let (value, raw) = tee(&mut d, |d| d.u64()).unwrap();

        assert_eq!(value, 42);
        assert_eq!(raw, &[0x18_u8, 0x2a][..]);
    }

    #[test]
    fn check_tagged_array_length_mismatch() {
        assert!(check_tagged_array_length(2, Some(3), 3).is_ok());
        assert!(check_tagged_array_length(2, Some(2), 3).is_err());
        assert!(check_tagged_array_length(2, None, 3).is_err());
    }

    proptest! {
        #[test]
        fn lazy_array_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let _ = lazy_array(&bytes);
        }

        #[test]
        fn lazy_array_splits_any_list(elements in proptest::collection::vec(any::<u64>(), 0..32)) {
            let bytes = to_cbor(&elements);
            let split = lazy_array(&bytes).unwrap();
            let expected = elements.iter().map(to_cbor).collect::<Vec<_>>();
            prop_assert_eq!(split, expected.iter().map(Vec::as_slice).collect::<Vec<_>>());
        }
    }
}
