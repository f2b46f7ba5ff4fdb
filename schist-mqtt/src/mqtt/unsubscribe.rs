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

pub(crate) fn write_unsubscribe_encoding_steps<'a>(packet: &'a UnsubscribePacket, steps: &mut VecDeque<EncodingStep<'a>>) -> SchistResult<()> {
    encode_integral_expression!(steps, Uint16, packet.packet_id);

    for topic_filter in &packet.topic_filters {
        encode_integral_expression!(steps, Uint16, compute_length_prefix(topic_filter.len())?);
        encode_integral_expression!(steps, StringSlice, topic_filter.as_str());
    }

    Ok(())
}

pub(crate) fn decode_unsubscribe_packet(first_byte: u8, packet_body: &[u8]) -> SchistResult<MqttPacket> {
    if first_byte != UNSUBSCRIBE_FIRST_BYTE {
        error!("UnsubscribePacket Decode - invalid first byte");
        return Err(SchistError::new_decoding_failure("invalid first byte for unsubscribe packet"));
    }

    let mut packet = UnsubscribePacket { ..Default::default() };

    let mut mutable_body = decode_u16(packet_body, &mut packet.packet_id)?;
    if packet.packet_id == 0 {
        error!("UnsubscribePacket Decode - packet id must be non zero");
        return Err(SchistError::new_decoding_failure("zero packet id in unsubscribe packet"));
    }

    if mutable_body.is_empty() {
        error!("UnsubscribePacket Decode - no topic filters");
        return Err(SchistError::new_decoding_failure("unsubscribe packet must contain at least one topic filter"));
    }

    while !mutable_body.is_empty() {
        let mut topic_filter = String::new();
        mutable_body = decode_length_prefixed_string(mutable_body, &mut topic_filter)?;
        packet.topic_filters.push(topic_filter);
    }

    Ok(MqttPacket::Unsubscribe(packet))
}

impl fmt::Display for UnsubscribePacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "UnsubscribePacket {{")?;
        log_primitive_value!(self.packet_id, f, "packet_id");
        write!(f, " topic_filters: [")?;
        for (i, topic_filter) in self.topic_filters.iter().enumerate() {
            write!(f, " {}:\"{}\"", i, topic_filter)?;
        }
        write!(f, " ]")?;
        write!(f, " }}")
    }
}
