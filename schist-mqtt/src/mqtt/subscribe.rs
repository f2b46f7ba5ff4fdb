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

pub(crate) fn write_subscribe_encoding_steps<'a>(packet: &'a SubscribePacket, steps: &mut VecDeque<EncodingStep<'a>>) -> SchistResult<()> {
    encode_integral_expression!(steps, Uint16, packet.packet_id);

    for subscription in &packet.subscriptions {
        encode_length_prefixed_string!(steps, subscription.topic_filter);
        encode_enum!(steps, Uint8, u8, subscription.qos);
    }

    Ok(())
}

pub(crate) fn decode_subscribe_packet(first_byte: u8, packet_body: &[u8]) -> SchistResult<MqttPacket> {
    if first_byte != SUBSCRIBE_FIRST_BYTE {
        error!("SubscribePacket Decode - invalid first byte");
        return Err(SchistError::new_decoding_failure("invalid first byte for subscribe packet"));
    }

    let mut packet = SubscribePacket { ..Default::default() };

    let mut mutable_body = decode_u16(packet_body, &mut packet.packet_id)?;
    if packet.packet_id == 0 {
        error!("SubscribePacket Decode - packet id must be non zero");
        return Err(SchistError::new_decoding_failure("zero packet id in subscribe packet"));
    }

    if mutable_body.is_empty() {
        error!("SubscribePacket Decode - no subscriptions");
        return Err(SchistError::new_decoding_failure("subscribe packet must contain at least one subscription"));
    }

    while !mutable_body.is_empty() {
        let mut subscription = Subscription { ..Default::default() };
        mutable_body = decode_length_prefixed_string(mutable_body, &mut subscription.topic_filter)?;

        let mut options : u8 = 0;
        mutable_body = decode_u8(mutable_body, &mut options)?;
        if (options & !QOS_MASK) != 0 {
            error!("SubscribePacket Decode - reserved subscription option bits set");
            return Err(SchistError::new_decoding_failure("reserved bits set in subscription options"));
        }

        subscription.qos = convert_u8_to_quality_of_service(options)?;
        packet.subscriptions.push(subscription);
    }

    Ok(MqttPacket::Subscribe(packet))
}

impl fmt::Display for SubscribePacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SubscribePacket {{")?;
        log_primitive_value!(self.packet_id, f, "packet_id");
        write!(f, " subscriptions: [")?;
        for (i, subscription) in self.subscriptions.iter().enumerate() {
            write!(f, " {}: {{", i)?;
            log_string!(subscription.topic_filter, f, "topic_filter");
            log_enum!(subscription.qos, f, "qos", quality_of_service_to_str);
            write!(f, " }}")?;
        }
        write!(f, " ]")?;
        write!(f, " }}")
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::decode::testing::*;

    fn create_subscribe_packet() -> SubscribePacket {
        SubscribePacket {
            packet_id: 123,
            subscriptions: vec![
                Subscription::new("hello/world", QualityOfService::AtLeastOnce),
                Subscription::new("sensors/+/temperature", QualityOfService::ExactlyOnce),
                Subscription::new("#", QualityOfService::AtMostOnce),
            ],
        }
    }

    #[test]
    fn subscribe_round_trip_encode_decode_single() {
        let packet = SubscribePacket {
            packet_id: 1,
            subscriptions: vec![ Subscription::new("a", QualityOfService::AtMostOnce) ],
        };

        assert!(do_round_trip_encode_decode_test(&MqttPacket::Subscribe(packet)));
    }

    #[test]
    fn subscribe_round_trip_encode_decode_multiple() {
        assert!(do_round_trip_encode_decode_test(&MqttPacket::Subscribe(create_subscribe_packet())));
    }

    #[test]
    fn subscribe_encoding_matches_wire_format() {
        let packet = MqttPacket::Subscribe(SubscribePacket {
            packet_id: 10,
            subscriptions: vec![ Subscription::new("a/b", QualityOfService::AtLeastOnce) ],
        });

        let bytes = crate::encode::encode_packet_to_bytes(&packet).unwrap();
        assert_eq!(vec![0x82u8, 8, 0, 10, 0, 3, b'a', b'/', b'b', 1], bytes);
    }

    #[test]
    fn subscribe_decode_failure_bad_fixed_header() {
        do_fixed_header_flag_decode_failure_test(&MqttPacket::Subscribe(create_subscribe_packet()), 4);
    }

    #[test]
    fn subscribe_decode_failure_missing_required_flags() {
        let clear_flags = | bytes: &[u8] | -> Vec<u8> {
            let mut clone = bytes.to_vec();
            clone[0] &= 0xF0;
            clone
        };

        do_mutated_decode_failure_test(&MqttPacket::Subscribe(create_subscribe_packet()), clear_flags);
    }

    #[test]
    fn subscribe_decode_failure_reserved_option_bits() {
        let packet = SubscribePacket {
            packet_id: 5,
            subscriptions: vec![ Subscription::new("a", QualityOfService::AtLeastOnce) ],
        };

        let set_reserved_bits = | bytes: &[u8] | -> Vec<u8> {
            let mut clone = bytes.to_vec();
            // first byte, remaining length, packet id, 3 bytes of filter, then the options
            clone[7] |= 0x04;
            clone
        };

        do_mutated_decode_failure_test(&MqttPacket::Subscribe(packet), set_reserved_bits);
    }

    #[test]
    fn subscribe_decode_failure_invalid_qos() {
        let packet = SubscribePacket {
            packet_id: 5,
            subscriptions: vec![ Subscription::new("a", QualityOfService::AtLeastOnce) ],
        };

        let set_qos3 = | bytes: &[u8] | -> Vec<u8> {
            let mut clone = bytes.to_vec();
            clone[7] = 3;
            clone
        };

        do_mutated_decode_failure_test(&MqttPacket::Subscribe(packet), set_qos3);
    }

    #[test]
    fn subscribe_decode_failure_no_subscriptions() {
        let packet = SubscribePacket {
            packet_id: 5,
            subscriptions: vec![ Subscription::new("a", QualityOfService::AtLeastOnce) ],
        };

        let remove_subscriptions = | bytes: &[u8] | -> Vec<u8> {
            let mut clone = bytes.to_vec();
            clone.truncate(4);
            clone[1] = 2;
            clone
        };

        do_mutated_decode_failure_test(&MqttPacket::Subscribe(packet), remove_subscriptions);
    }

    #[test]
    fn subscribe_decode_failure_truncated_subscription() {
        let packet = SubscribePacket {
            packet_id: 5,
            subscriptions: vec![ Subscription::new("a", QualityOfService::AtLeastOnce) ],
        };

        let drop_options = | bytes: &[u8] | -> Vec<u8> {
            let mut clone = bytes.to_vec();
            clone.pop();
            clone[1] -= 1;
            clone
        };

        do_mutated_decode_failure_test(&MqttPacket::Subscribe(packet), drop_options);
    }
}
