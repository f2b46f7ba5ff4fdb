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

pub(crate) fn write_connack_encoding_steps<'a>(packet: &'a ConnackPacket, steps: &mut VecDeque<EncodingStep<'a>>) -> SchistResult<()> {
    let flags = if packet.session_present { CONNACK_SESSION_PRESENT_FLAG_MASK } else { 0 };

    encode_integral_expression!(steps, Uint8, flags);
    encode_enum!(steps, Uint8, u8, packet.return_code);

    Ok(())
}

pub(crate) fn decode_connack_packet(first_byte: u8, packet_body: &[u8]) -> SchistResult<MqttPacket> {
    if first_byte != CONNACK_FIRST_BYTE {
        error!("ConnackPacket Decode - invalid first byte");
        return Err(SchistError::new_decoding_failure("invalid first byte for connack packet"));
    }

    if packet_body.len() != 2 {
        error!("ConnackPacket Decode - body must be exactly two bytes");
        return Err(SchistError::new_decoding_failure("invalid remaining length for connack packet"));
    }

    let mut packet = ConnackPacket { ..Default::default() };

    let mut flags : u8 = 0;
    let mut mutable_body = decode_u8(packet_body, &mut flags)?;
    if (flags & !CONNACK_SESSION_PRESENT_FLAG_MASK) != 0 {
        error!("ConnackPacket Decode - invalid acknowledge flags");
        return Err(SchistError::new_decoding_failure("invalid acknowledge flags in connack packet"));
    }

    packet.session_present = (flags & CONNACK_SESSION_PRESENT_FLAG_MASK) != 0;
    mutable_body = decode_u8_as_enum(mutable_body, &mut packet.return_code, convert_u8_to_connect_return_code)?;
    debug_assert!(mutable_body.is_empty());

    Ok(MqttPacket::Connack(packet))
}

impl fmt::Display for ConnackPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ConnackPacket {{")?;
        log_primitive_value!(self.session_present, f, "session_present");
        log_enum!(self.return_code, f, "return_code", connect_return_code_to_str);
        write!(f, " }}")
    }
}
