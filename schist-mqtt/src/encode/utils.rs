/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

///
/// Internal utilities to encode MQTT 3.1.1 packets, based on the MQTT 3.1.1 spec
use std::collections::VecDeque;

use crate::error::{SchistError, SchistResult};

pub(crate) enum EncodingStep<'a> {
    Uint8(u8),
    Uint16(u16),
    StringSlice(&'a str),
    BytesSlice(&'a [u8]),
}

macro_rules! encode_integral_expression {
    ($target: ident, $enum_variant: ident, $value: expr) => {
        $target.push_back(EncodingStep::$enum_variant($value));
    };
}

pub(crate) use encode_integral_expression;

macro_rules! encode_enum {
    ($target: ident, $enum_variant: ident, $int_type: ty, $value: expr) => {
        $target.push_back(EncodingStep::$enum_variant($value as $int_type));
    };
}

pub(crate) use encode_enum;

macro_rules! encode_length_prefixed_string {
    ($target: ident, $value: expr) => {
        $target.push_back(EncodingStep::Uint16(compute_length_prefix($value.len())?));
        $target.push_back(EncodingStep::StringSlice(&$value));
    };
}

pub(crate) use encode_length_prefixed_string;

macro_rules! encode_length_prefixed_optional_string {
    ($target: ident, $optional_value: expr) => {
        if let Some(val) = &$optional_value {
            $target.push_back(EncodingStep::Uint16(compute_length_prefix(val.len())?));
            $target.push_back(EncodingStep::StringSlice(val));
        }
    };
}

pub(crate) use encode_length_prefixed_optional_string;

macro_rules! encode_length_prefixed_bytes {
    ($target: ident, $value: expr) => {
        $target.push_back(EncodingStep::Uint16(compute_length_prefix($value.len())?));
        $target.push_back(EncodingStep::BytesSlice(&$value));
    };
}

pub(crate) use encode_length_prefixed_bytes;

macro_rules! encode_length_prefixed_optional_bytes {
    ($target: ident, $optional_value: expr) => {
        if let Some(val) = &$optional_value {
            $target.push_back(EncodingStep::Uint16(compute_length_prefix(val.len())?));
            $target.push_back(EncodingStep::BytesSlice(val));
        }
    };
}

pub(crate) use encode_length_prefixed_optional_bytes;

macro_rules! encode_raw_bytes {
    ($target: ident, $value: expr) => {
        $target.push_back(EncodingStep::BytesSlice(&$value));
    };
}

pub(crate) use encode_raw_bytes;

/*****************************************************/

macro_rules! define_ack_packet_encoding_impl {
    ($function_name: ident, $packet_type: ident) => {
        pub(crate) fn $function_name<'a>(packet: &'a $packet_type, steps: &mut VecDeque<EncodingStep<'a>>) -> SchistResult<()> {
            encode_integral_expression!(steps, Uint16, packet.packet_id);

            Ok(())
        }
    };
}

pub(crate) use define_ack_packet_encoding_impl;

macro_rules! define_empty_packet_encoding_impl {
    ($function_name: ident, $packet_type: ident) => {
        pub(crate) fn $function_name<'a>(_: &'a $packet_type, _: &mut VecDeque<EncodingStep<'a>>) -> SchistResult<()> {
            Ok(())
        }
    };
}

pub(crate) use define_empty_packet_encoding_impl;

/*****************************************************/

pub(crate) const MAXIMUM_VARIABLE_LENGTH_INTEGER: usize = (1 << 28) - 1;

pub(crate) fn compute_length_prefix(length: usize) -> SchistResult<u16> {
    u16::try_from(length).map_err(|_| {
        SchistError::new_encoding_failure("length-prefixed value exceeds 65535 bytes")
    })
}

pub(crate) fn compute_variable_length_integer_encode_size(value: usize) -> SchistResult<usize> {
    if value < 1usize << 7 {
        Ok(1)
    } else if value < 1usize << 14 {
        Ok(2)
    } else if value < 1usize << 21 {
        Ok(3)
    } else if value < 1usize << 28 {
        Ok(4)
    } else {
        Err(SchistError::new_encoding_failure("vli value exceeds the protocol maximum (2 ^ 28 - 1)"))
    }
}

pub(crate) fn encode_vli(value: u32, dest: &mut Vec<u8>) -> SchistResult<()> {
    if value > MAXIMUM_VARIABLE_LENGTH_INTEGER as u32 {
        return Err(SchistError::new_encoding_failure("vli value exceeds the protocol maximum (2 ^ 28 - 1)"));
    }

    let mut remaining = value;
    loop {
        let low_bits = (remaining & 0x7F) as u8;
        remaining >>= 7;

        if remaining == 0 {
            dest.push(low_bits);
            return Ok(());
        }

        dest.push(low_bits | 0x80);
    }
}

pub(crate) fn process_encoding_steps(steps: &mut VecDeque<EncodingStep>, dest: &mut Vec<u8>) -> SchistResult<()> {
    while let Some(step) = steps.pop_front() {
        match step {
            EncodingStep::Uint8(val) => {
                dest.push(val);
            }
            EncodingStep::Uint16(val) => {
                dest.extend_from_slice(&val.to_be_bytes());
            }
            EncodingStep::StringSlice(val) => {
                dest.extend_from_slice(val.as_bytes());
            }
            EncodingStep::BytesSlice(val) => {
                dest.extend_from_slice(val);
            }
        }
    }

    Ok(())
}
