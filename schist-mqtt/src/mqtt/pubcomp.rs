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

define_ack_packet_encoding_impl!(write_pubcomp_encoding_steps, PubcompPacket);

define_ack_packet_decode_function!(decode_pubcomp_packet, Pubcomp, PubcompPacket, "Pubcomp", PUBCOMP_FIRST_BYTE);

define_ack_packet_display_trait!(PubcompPacket, "PubcompPacket");

#[cfg(test)]
mod tests {

    use super::*;
    use crate::decode::testing::*;

    #[test]
    fn pubcomp_round_trip_encode_decode_default() {
        let packet = PubcompPacket {
            ..Default::default()
        };

        assert!(do_round_trip_encode_decode_test(&MqttPacket::Pubcomp(packet)));
    }

    #[test]
    fn pubcomp_round_trip_encode_decode() {
        let packet = PubcompPacket {
            packet_id: 65535,
        };

        assert!(do_round_trip_encode_decode_test(&MqttPacket::Pubcomp(packet)));
    }

    #[test]
    fn pubcomp_decode_failure_bad_fixed_header() {
        let packet = PubcompPacket {
            packet_id: 65535,
        };

        do_fixed_header_flag_decode_failure_test(&MqttPacket::Pubcomp(packet), 8);
    }

    #[test]
    fn pubcomp_decode_failure_trailing_bytes() {
        let packet = PubcompPacket {
            packet_id: 65535,
        };

        do_trailing_byte_decode_failure_test(&MqttPacket::Pubcomp(packet));
    }
}
