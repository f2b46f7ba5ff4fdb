/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::decode::utils::*;
use crate::encode::utils::*;
use crate::error::{SchistError, SchistResult};
use crate::logging::*;
use crate::mqtt::*;
use crate::mqtt::utils::*;

use log::*;

use std::collections::VecDeque;
use std::fmt;

pub(crate) fn write_suback_encoding_steps<'a>(packet: &'a SubackPacket, steps: &mut VecDeque<EncodingStep<'a>>) -> SchistResult<()> {
    encode_integral_expression!(steps, Uint16, packet.packet_id);

    for return_code in &packet.return_codes {
        encode_enum!(steps, Uint8, u8, *return_code);
    }

    Ok(())
}

pub(crate) fn decode_suback_packet(first_byte: u8, packet_body: &[u8]) -> SchistResult<MqttPacket> {
    if first_byte != SUBACK_FIRST_BYTE {
        error!("SubackPacket Decode - invalid first byte");
        return Err(SchistError::new_decoding_failure("invalid first byte for suback packet"));
    }

    let mut packet = SubackPacket { ..Default::default() };

    let mut mutable_body = decode_u16(packet_body, &mut packet.packet_id)?;
    if mutable_body.is_empty() {
        error!("SubackPacket Decode - no return codes");
        return Err(SchistError::new_decoding_failure("suback packet must contain at least one return code"));
    }

    packet.return_codes.reserve(mutable_body.len());
    while !mutable_body.is_empty() {
        let mut return_code = SubackReturnCode::default();
        mutable_body = decode_u8_as_enum(mutable_body, &mut return_code, convert_u8_to_suback_return_code)?;
        packet.return_codes.push(return_code);
    }

    Ok(MqttPacket::Suback(packet))
}

impl fmt::Display for SubackPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SubackPacket {{")?;
        log_primitive_value!(self.packet_id, f, "packet_id");
        write!(f, " return_codes: [")?;
        for (i, return_code) in self.return_codes.iter().enumerate() {
            write!(f, " {}:{}", i, suback_return_code_to_str(*return_code))?;
        }
        write!(f, " ]")?;
        write!(f, " }}")
    }
}
