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

fn compute_connect_flags(packet: &ConnectPacket) -> u8 {
    let mut flags: u8 = 0;
    if packet.clean_session {
        flags |= CONNECT_PACKET_CLEAN_SESSION_FLAG_MASK;
    }

    if let Some(will) = &packet.will {
        flags |= CONNECT_PACKET_HAS_WILL_FLAG_MASK;
        flags |= (will.qos as u8) << CONNECT_PACKET_WILL_QOS_FLAG_SHIFT;
        if will.retain {
            flags |= CONNECT_PACKET_WILL_RETAIN_FLAG_MASK;
        }
    }

    if packet.password.is_some() {
        flags |= CONNECT_PACKET_HAS_PASSWORD_FLAG_MASK;
    }

    if packet.username.is_some() {
        flags |= CONNECT_PACKET_HAS_USERNAME_FLAG_MASK;
    }

    flags
}

pub(crate) fn write_connect_encoding_steps<'a>(packet: &'a ConnectPacket, steps: &mut VecDeque<EncodingStep<'a>>) -> SchistResult<()> {
    /* Variable header */
    encode_integral_expression!(steps, Uint16, CONNECT_PACKET_PROTOCOL_NAME.len() as u16);
    encode_integral_expression!(steps, StringSlice, CONNECT_PACKET_PROTOCOL_NAME);
    encode_integral_expression!(steps, Uint8, CONNECT_PACKET_PROTOCOL_LEVEL);
    encode_integral_expression!(steps, Uint8, compute_connect_flags(packet));
    encode_integral_expression!(steps, Uint16, packet.keep_alive_interval_seconds);

    /* Payload */
    encode_length_prefixed_string!(steps, packet.client_id);

    if let Some(will) = &packet.will {
        encode_length_prefixed_string!(steps, will.topic);
        encode_length_prefixed_bytes!(steps, will.payload);
    }

    encode_length_prefixed_optional_string!(steps, packet.username);
    encode_length_prefixed_optional_bytes!(steps, packet.password);

    Ok(())
}

pub(crate) fn decode_connect_packet(first_byte: u8, packet_body: &[u8]) -> SchistResult<MqttPacket> {
    if first_byte != CONNECT_FIRST_BYTE {
        error!("ConnectPacket Decode - invalid first byte");
        return Err(SchistError::new_decoding_failure("invalid first byte for connect packet"));
    }

    let mut packet = ConnectPacket { ..Default::default() };
    let mut mutable_body = packet_body;

    let mut protocol_name = String::new();
    mutable_body = decode_length_prefixed_string(mutable_body, &mut protocol_name)?;
    if protocol_name != CONNECT_PACKET_PROTOCOL_NAME {
        error!("ConnectPacket Decode - invalid protocol name");
        return Err(SchistError::new_decoding_failure("invalid protocol name in connect packet"));
    }

    let mut protocol_level : u8 = 0;
    mutable_body = decode_u8(mutable_body, &mut protocol_level)?;
    if protocol_level != CONNECT_PACKET_PROTOCOL_LEVEL {
        error!("ConnectPacket Decode - unsupported protocol level ({})", protocol_level);
        return Err(SchistError::new_decoding_failure("unsupported protocol level in connect packet"));
    }

    let mut connect_flags : u8 = 0;
    mutable_body = decode_u8(mutable_body, &mut connect_flags)?;
    if (connect_flags & 0x01) != 0 {
        error!("ConnectPacket Decode - reserved connect flag set");
        return Err(SchistError::new_decoding_failure("reserved flag set in connect packet"));
    }

    packet.clean_session = (connect_flags & CONNECT_PACKET_CLEAN_SESSION_FLAG_MASK) != 0;
    let has_will = (connect_flags & CONNECT_PACKET_HAS_WILL_FLAG_MASK) != 0;
    let will_retain = (connect_flags & CONNECT_PACKET_WILL_RETAIN_FLAG_MASK) != 0;
    let will_qos = convert_u8_to_quality_of_service((connect_flags >> CONNECT_PACKET_WILL_QOS_FLAG_SHIFT) & QOS_MASK)?;

    if !has_will && (will_retain || will_qos != QualityOfService::AtMostOnce) {
        error!("ConnectPacket Decode - will flags set without a will");
        return Err(SchistError::new_decoding_failure("will flags set without a will in connect packet"));
    }

    mutable_body = decode_u16(mutable_body, &mut packet.keep_alive_interval_seconds)?;
    mutable_body = decode_length_prefixed_string(mutable_body, &mut packet.client_id)?;

    if has_will {
        let mut will = PublishPacket {
            qos: will_qos,
            retain: will_retain,
            ..Default::default()
        };

        mutable_body = decode_length_prefixed_string(mutable_body, &mut will.topic)?;
        mutable_body = decode_length_prefixed_bytes(mutable_body, &mut will.payload)?;
        packet.will = Some(will);
    }

    if (connect_flags & CONNECT_PACKET_HAS_USERNAME_FLAG_MASK) != 0 {
        let mut username = String::new();
        mutable_body = decode_length_prefixed_string(mutable_body, &mut username)?;
        packet.username = Some(username);
    }

    if (connect_flags & CONNECT_PACKET_HAS_PASSWORD_FLAG_MASK) != 0 {
        let mut password = Vec::new();
        mutable_body = decode_length_prefixed_bytes(mutable_body, &mut password)?;
        packet.password = Some(password);
    }

    if !mutable_body.is_empty() {
        error!("ConnectPacket Decode - trailing bytes after payload");
        return Err(SchistError::new_decoding_failure("trailing bytes in connect packet"));
    }

    Ok(MqttPacket::Connect(packet))
}

impl fmt::Display for ConnectPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ConnectPacket {{")?;
        log_primitive_value!(self.keep_alive_interval_seconds, f, "keep_alive_interval_seconds");
        log_primitive_value!(self.clean_session, f, "clean_session");
        log_string!(self.client_id, f, "client_id");
        log_optional_string!(self.username, f, "username", value);
        log_optional_binary_data_sensitive!(self.password, f, "password");

        if let Some(will) = &self.will {
            write!(f, " will:{{")?;
            log_string!(will.topic, f, "topic");
            log_enum!(will.qos, f, "qos", quality_of_service_to_str);
            log_primitive_value!(will.retain, f, "retain");
            log_binary_data!(will.payload, f, "payload");
            write!(f, " }}")?;
        }

        write!(f, " }}")
    }
}
