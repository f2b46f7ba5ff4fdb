/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

pub(crate) mod utils;

use crate::encode::utils::*;
use crate::error::{SchistError, SchistResult};
use crate::logging::*;
use crate::mqtt::*;
use crate::mqtt::connack::*;
use crate::mqtt::connect::*;
use crate::mqtt::disconnect::*;
use crate::mqtt::pingreq::*;
use crate::mqtt::pingresp::*;
use crate::mqtt::puback::*;
use crate::mqtt::pubcomp::*;
use crate::mqtt::publish::*;
use crate::mqtt::pubrec::*;
use crate::mqtt::pubrel::*;
use crate::mqtt::suback::*;
use crate::mqtt::subscribe::*;
use crate::mqtt::unsuback::*;
use crate::mqtt::unsubscribe::*;
use crate::mqtt::utils::*;

use log::*;

use std::collections::VecDeque;

fn write_encoding_steps<'a>(mqtt_packet: &'a MqttPacket, steps: &mut VecDeque<EncodingStep<'a>>) -> SchistResult<()> {
    log_packet("Writing encode steps for packet: ", mqtt_packet);

    match mqtt_packet {
        MqttPacket::Connect(packet) => { write_connect_encoding_steps(packet, steps) }
        MqttPacket::Connack(packet) => { write_connack_encoding_steps(packet, steps) }
        MqttPacket::Publish(packet) => { write_publish_encoding_steps(packet, steps) }
        MqttPacket::Puback(packet) => { write_puback_encoding_steps(packet, steps) }
        MqttPacket::Pubrec(packet) => { write_pubrec_encoding_steps(packet, steps) }
        MqttPacket::Pubrel(packet) => { write_pubrel_encoding_steps(packet, steps) }
        MqttPacket::Pubcomp(packet) => { write_pubcomp_encoding_steps(packet, steps) }
        MqttPacket::Subscribe(packet) => { write_subscribe_encoding_steps(packet, steps) }
        MqttPacket::Suback(packet) => { write_suback_encoding_steps(packet, steps) }
        MqttPacket::Unsubscribe(packet) => { write_unsubscribe_encoding_steps(packet, steps) }
        MqttPacket::Unsuback(packet) => { write_unsuback_encoding_steps(packet, steps) }
        MqttPacket::Pingreq(packet) => { write_pingreq_encoding_steps(packet, steps) }
        MqttPacket::Pingresp(packet) => { write_pingresp_encoding_steps(packet, steps) }
        MqttPacket::Disconnect(packet) => { write_disconnect_encoding_steps(packet, steps) }
    }
}

/*
 * Fixed Header
 * byte 1:
 *  bits 4-7: MQTT Control Packet Type
 *  bits 0-3: packet-type-specific flags
 * byte 2-x: Remaining Length as Variable Byte Integer (1-4 bytes)
 */
pub(crate) fn compute_fixed_header_first_byte(mqtt_packet: &MqttPacket) -> u8 {
    match mqtt_packet {
        MqttPacket::Connect(_) => { CONNECT_FIRST_BYTE }
        MqttPacket::Connack(_) => { CONNACK_FIRST_BYTE }
        MqttPacket::Publish(packet) => { compute_publish_fixed_header_first_byte(packet) }
        MqttPacket::Puback(_) => { PUBACK_FIRST_BYTE }
        MqttPacket::Pubrec(_) => { PUBREC_FIRST_BYTE }
        MqttPacket::Pubrel(_) => { PUBREL_FIRST_BYTE }
        MqttPacket::Pubcomp(_) => { PUBCOMP_FIRST_BYTE }
        MqttPacket::Subscribe(_) => { SUBSCRIBE_FIRST_BYTE }
        MqttPacket::Suback(_) => { SUBACK_FIRST_BYTE }
        MqttPacket::Unsubscribe(_) => { UNSUBSCRIBE_FIRST_BYTE }
        MqttPacket::Unsuback(_) => { UNSUBACK_FIRST_BYTE }
        MqttPacket::Pingreq(_) => { PINGREQ_FIRST_BYTE }
        MqttPacket::Pingresp(_) => { PINGRESP_FIRST_BYTE }
        MqttPacket::Disconnect(_) => { DISCONNECT_FIRST_BYTE }
    }
}

/// Serializes everything after the fixed header (variable header and payload) of a packet.
pub(crate) fn encode_packet_body(mqtt_packet: &MqttPacket) -> SchistResult<Vec<u8>> {
    let mut steps = VecDeque::new();
    write_encoding_steps(mqtt_packet, &mut steps)?;

    let mut body = Vec::new();
    process_encoding_steps(&mut steps, &mut body)?;

    if body.len() > MAXIMUM_VARIABLE_LENGTH_INTEGER {
        error!("encode_packet_body - {} body length {} exceeds the maximum remaining length", mqtt_packet_to_packet_type(mqtt_packet), body.len());
        return Err(SchistError::new_encoding_failure("packet remaining length exceeds protocol maximum"));
    }

    Ok(body)
}

/// Serializes a complete packet: fixed header, remaining length, and body.
#[cfg(test)]
pub(crate) fn encode_packet_to_bytes(mqtt_packet: &MqttPacket) -> SchistResult<Vec<u8>> {
    let body = encode_packet_body(mqtt_packet)?;

    let mut bytes = Vec::with_capacity(body.len() + 5);
    bytes.push(compute_fixed_header_first_byte(mqtt_packet));
    encode_vli(body.len() as u32, &mut bytes)?;
    bytes.extend_from_slice(&body);

    Ok(bytes)
}
