/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

pub(crate) mod utils;

use crate::error::SchistResult;
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

macro_rules! define_ack_packet_decode_function {
    ($function_name: ident, $mqtt_packet_type:ident, $packet_type: ident, $packet_type_as_string: expr, $first_byte: expr) => {
        pub(crate) fn $function_name(first_byte: u8, packet_body: &[u8]) -> SchistResult<MqttPacket> {
            if first_byte != $first_byte {
                error!("{}Packet Decode - invalid first byte", $packet_type_as_string);
                return Err(SchistError::new_decoding_failure("invalid first byte for ack packet"));
            }

            if packet_body.len() != 2 {
                error!("{}Packet Decode - body must be exactly two bytes", $packet_type_as_string);
                return Err(SchistError::new_decoding_failure("invalid remaining length for ack packet"));
            }

            let mut packet = $packet_type { ..Default::default() };
            decode_u16(packet_body, &mut packet.packet_id)?;

            Ok(MqttPacket::$mqtt_packet_type(packet))
        }
    };
}

pub(crate) use define_ack_packet_decode_function;

macro_rules! define_empty_packet_decode_function {
    ($function_name: ident, $mqtt_packet_type:ident, $packet_type: ident, $packet_type_as_string: expr, $first_byte: expr) => {
        pub(crate) fn $function_name(first_byte: u8, packet_body: &[u8]) -> SchistResult<MqttPacket> {
            if first_byte != $first_byte {
                error!("{}Packet Decode - invalid first byte", $packet_type_as_string);
                return Err(SchistError::new_decoding_failure("invalid first byte for empty packet"));
            }

            if !packet_body.is_empty() {
                error!("{}Packet Decode - non-zero remaining length", $packet_type_as_string);
                return Err(SchistError::new_decoding_failure("non-zero remaining length for empty packet"));
            }

            Ok(MqttPacket::$mqtt_packet_type($packet_type {}))
        }
    };
}

pub(crate) use define_empty_packet_decode_function;

/// Decodes a single packet from its fixed header first byte and its complete body.  Returns
/// `Ok(None)` for reserved packet types, which carry no meaning and are skipped.
pub(crate) fn decode_packet(first_byte: u8, packet_body: &[u8]) -> SchistResult<Option<MqttPacket>> {
    let packet_type = first_byte >> 4;

    debug!("Decoding a packet of type {}", packet_type_to_str(packet_type));

    let packet = match packet_type {
        PACKET_TYPE_CONNECT => { decode_connect_packet(first_byte, packet_body)? }
        PACKET_TYPE_CONNACK => { decode_connack_packet(first_byte, packet_body)? }
        PACKET_TYPE_PUBLISH => { decode_publish_packet(first_byte, packet_body)? }
        PACKET_TYPE_PUBACK => { decode_puback_packet(first_byte, packet_body)? }
        PACKET_TYPE_PUBREC => { decode_pubrec_packet(first_byte, packet_body)? }
        PACKET_TYPE_PUBREL => { decode_pubrel_packet(first_byte, packet_body)? }
        PACKET_TYPE_PUBCOMP => { decode_pubcomp_packet(first_byte, packet_body)? }
        PACKET_TYPE_SUBSCRIBE => { decode_subscribe_packet(first_byte, packet_body)? }
        PACKET_TYPE_SUBACK => { decode_suback_packet(first_byte, packet_body)? }
        PACKET_TYPE_UNSUBSCRIBE => { decode_unsubscribe_packet(first_byte, packet_body)? }
        PACKET_TYPE_UNSUBACK => { decode_unsuback_packet(first_byte, packet_body)? }
        PACKET_TYPE_PINGREQ => { decode_pingreq_packet(first_byte, packet_body)? }
        PACKET_TYPE_PINGRESP => { decode_pingresp_packet(first_byte, packet_body)? }
        PACKET_TYPE_DISCONNECT => { decode_disconnect_packet(first_byte, packet_body)? }
        _ => {
            warn!("decode_packet - skipping reserved packet type {} with {} body bytes", packet_type, packet_body.len());
            return Ok(None);
        }
    };

    Ok(Some(packet))
}
