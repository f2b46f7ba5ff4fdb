/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::decode::*;
use crate::decode::utils::*;
use crate::encode::utils::*;
use crate::error::{SchistError, SchistResult};
use crate::logging::*;
use crate::mqtt::*;
use crate::mqtt::utils::*;

use log::*;

use std::collections::VecDeque;
use std::fmt;

define_ack_packet_encoding_impl!(write_unsuback_encoding_steps, UnsubackPacket);

define_ack_packet_decode_function!(decode_unsuback_packet, Unsuback, UnsubackPacket, "Unsuback", UNSUBACK_FIRST_BYTE);

define_ack_packet_display_trait!(UnsubackPacket, "UnsubackPacket");

#[cfg(test)]
mod tests {

    use super::*;
    use crate::decode::testing::*;

    #[test]
    fn unsuback_round_trip_encode_decode_default() {
        let packet = UnsubackPacket {
            ..Default::default()
        };

        assert!(do_round_trip_encode_decode_test(&MqttPacket::Unsuback(packet)));
    }

    #[test]
    fn unsuback_round_trip_encode_decode() {
        let packet = UnsubackPacket {
            packet_id: 7,
        };

        assert!(do_round_trip_encode_decode_test(&MqttPacket::Unsuback(packet)));
    }

    #[test]
    fn unsuback_decode_failure_bad_fixed_header() {
        let packet = UnsubackPacket {
            packet_id: 7,
        };

        do_fixed_header_flag_decode_failure_test(&MqttPacket::Unsuback(packet), 2);
    }

    #[test]
    fn unsuback_decode_failure_trailing_bytes() {
        let packet = UnsubackPacket {
            packet_id: 7,
        };

        do_trailing_byte_decode_failure_test(&MqttPacket::Unsuback(packet));
    }
}
