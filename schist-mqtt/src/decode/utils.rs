/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::error::{SchistError, SchistResult};

use log::*;

#[derive(Eq, PartialEq, Debug)]
pub(crate) enum DecodeVliResult<'a> {
    InsufficientData,
    Value(u32, &'a[u8]), /* (decoded value, remaining bytes) */
}

pub(crate) fn decode_vli(buffer: &[u8]) -> SchistResult<DecodeVliResult<'_>> {
    let mut value: u32 = 0;
    for (index, byte) in buffer.iter().take(4).enumerate() {
        value |= ((byte & 0x7F) as u32) << (7 * index);
        if byte & 0x80 == 0 {
            return Ok(DecodeVliResult::Value(value, &buffer[(index + 1)..]));
        }
    }

    if buffer.len() < 4 {
        return Ok(DecodeVliResult::InsufficientData);
    }

    error!("Packet Decode - remaining length continues past its fourth byte");
    Err(SchistError::new_decoding_failure("invalid variable length integer"))
}

fn decode_length_prefix(bytes: &[u8]) -> SchistResult<(usize, &[u8])> {
    if bytes.len() < 2 {
        error!("Packet Decode - value does not have a full length prefix");
        return Err(SchistError::new_decoding_failure("value does not have a full length prefix"));
    }

    let value_length = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
    let mutable_bytes = &bytes[2..];
    if value_length > mutable_bytes.len() {
        error!("Packet Decode - value has length larger than remaining packet bytes");
        return Err(SchistError::new_decoding_failure("value has length longer than remaining packet bytes"));
    }

    Ok((value_length, mutable_bytes))
}

pub(crate) fn decode_length_prefixed_string<'a>(bytes: &'a[u8], value: &mut String) -> SchistResult<&'a[u8]> {
    let (value_length, mutable_bytes) = decode_length_prefix(bytes)?;

    let decode_utf8_result = std::str::from_utf8(&mutable_bytes[..value_length]).map_err(|err| {
        error!("Packet Decode - Utf-8 string value is not valid utf-8");
        SchistError::from(err)
    })?;

    *value = decode_utf8_result.to_string();
    Ok(&mutable_bytes[(value_length)..])
}

pub(crate) fn decode_length_prefixed_bytes<'a>(bytes: &'a[u8], value: &mut Vec<u8>) -> SchistResult<&'a[u8]> {
    let (value_length, mutable_bytes) = decode_length_prefix(bytes)?;

    *value = Vec::from(&mutable_bytes[..value_length]);
    Ok(&mutable_bytes[(value_length)..])
}

pub(crate) fn decode_u8<'a>(bytes: &'a[u8], value: &mut u8) -> SchistResult<&'a[u8]> {
    if bytes.is_empty() {
        error!("Packet Decode - Insufficent packet bytes for u8 field");
        return Err(SchistError::new_decoding_failure("insufficient packet data for u8 value"));
    }

    *value = bytes[0];

    Ok(&bytes[1..])
}

pub(crate) fn decode_u8_as_enum<'a, T>(bytes: &'a[u8], value: &mut T, converter: fn(u8) -> SchistResult<T>) -> SchistResult<&'a[u8]> {
    if bytes.is_empty() {
        error!("Packet Decode - Insufficent packet bytes for enum field");
        return Err(SchistError::new_decoding_failure("insufficient packet data for enum value"));
    }

    *value = converter(bytes[0])?;

    Ok(&bytes[1..])
}

pub(crate) fn decode_u16<'a>(bytes: &'a[u8], value: &mut u16) -> SchistResult<&'a[u8]> {
    if bytes.len() < 2 {
        error!("Packet Decode - Insufficent packet bytes for u16 field");
        return Err(SchistError::new_decoding_failure("insufficient packet data for u16 value"));
    }

    *value = u16::from_be_bytes([bytes[0], bytes[1]]);

    Ok(&bytes[2..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn decode_vli_rejects_fifth_byte() {
        let bytes = [0x80u8, 0x80, 0x80, 0x80, 0x01];
        assert_matches!(decode_vli(&bytes), Err(SchistError::DecodingFailure(_)));
    }

    #[test]
    fn decode_vli_insufficient_data() {
        assert_eq!(DecodeVliResult::InsufficientData, decode_vli(&[]).unwrap());
        assert_eq!(DecodeVliResult::InsufficientData, decode_vli(&[0xFFu8, 0xFF]).unwrap());
    }

    #[test]
    fn decode_string_success() {
        let bytes = [0u8, 3, b'a', b'/', b'b', 0xFF];
        let mut value = String::new();
        let remaining = decode_length_prefixed_string(&bytes, &mut value).unwrap();
        assert_eq!("a/b", value);
        assert_eq!([0xFFu8], remaining);
    }

    #[test]
    fn decode_string_invalid_utf8() {
        let bytes = [0u8, 2, 0xC3, 0x28];
        let mut value = String::new();
        assert_matches!(decode_length_prefixed_string(&bytes, &mut value), Err(SchistError::DecodingFailure(_)));
    }

    #[test]
    fn decode_string_truncated() {
        let mut value = String::new();
        assert_matches!(decode_length_prefixed_string(&[0u8], &mut value), Err(SchistError::DecodingFailure(_)));
        assert_matches!(decode_length_prefixed_string(&[0u8, 4, b'a'], &mut value), Err(SchistError::DecodingFailure(_)));
    }

    #[test]
    fn decode_bytes_success() {
        let bytes = [0u8, 2, 1, 2];
        let mut value = Vec::new();
        let remaining = decode_length_prefixed_bytes(&bytes, &mut value).unwrap();
        assert_eq!(vec![1u8, 2], value);
        assert!(remaining.is_empty());
    }

    #[test]
    fn decode_integers() {
        let mut byte = 0u8;
        let mut short = 0u16;
        let remaining = decode_u8(&[5u8, 1, 2], &mut byte).unwrap();
        let remaining = decode_u16(remaining, &mut short).unwrap();
        assert_eq!(5, byte);
        assert_eq!(258, short);
        assert!(remaining.is_empty());

        assert_matches!(decode_u16(&[1u8], &mut short), Err(SchistError::DecodingFailure(_)));
        assert_matches!(decode_u8(&[], &mut byte), Err(SchistError::DecodingFailure(_)));
    }
}
