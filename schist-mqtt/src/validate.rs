/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Outbound packet validation.  Everything the client builds from application input is checked
here before it is allowed into the send queue.
 */

use crate::encode::utils::MAXIMUM_VARIABLE_LENGTH_INTEGER;
use crate::error::{SchistError, SchistResult};
use crate::mqtt::*;
use crate::mqtt::utils::*;

use log::*;

fn validate_string_length(value: &str, packet_type: PacketType, field_name: &str) -> SchistResult<()> {
    if value.len() > MAXIMUM_STRING_LENGTH {
        error!("{} Validation - {} string field too long", packet_type, field_name);
        return Err(SchistError::new_packet_validation(packet_type, format!("{} exceeds 65535 bytes", field_name)));
    }

    Ok(())
}

fn validate_optional_string_length(optional_string: &Option<String>, packet_type: PacketType, field_name: &str) -> SchistResult<()> {
    if let Some(value) = optional_string {
        validate_string_length(value, packet_type, field_name)?;
    }

    Ok(())
}

fn validate_optional_binary_length(optional_data: &Option<Vec<u8>>, packet_type: PacketType, field_name: &str) -> SchistResult<()> {
    if let Some(value) = optional_data {
        if value.len() > MAXIMUM_STRING_LENGTH {
            error!("{} Validation - {} binary field too long", packet_type, field_name);
            return Err(SchistError::new_packet_validation(packet_type, format!("{} exceeds 65535 bytes", field_name)));
        }
    }

    Ok(())
}

/// Returns true if the topic can be published to: non-empty, encodable, and wildcard-free.
pub(crate) fn is_valid_topic(topic: &str) -> bool {
    if topic.is_empty() || topic.len() > MAXIMUM_STRING_LENGTH {
        return false;
    }

    if topic.contains(['#', '+']) {
        return false;
    }

    true
}

/// Returns true if the filter can be subscribed to.  Wildcards must occupy an entire level and
/// the multi-level wildcard may only appear as the final level.
pub(crate) fn is_valid_topic_filter(filter: &str) -> bool {
    if filter.is_empty() || filter.len() > MAXIMUM_STRING_LENGTH {
        return false;
    }

    let mut seen_mlw = false;
    for segment in filter.split('/') {
        if seen_mlw {
            return false;
        }

        if segment.len() == 1 {
            if segment == "#" {
                seen_mlw = true;
            }
        } else if segment.contains(['#', '+']) {
            return false;
        }
    }

    true
}

fn validate_will(will: &PublishPacket) -> SchistResult<()> {
    if !is_valid_topic(&will.topic) {
        error!("ConnectPacket Validation - invalid will topic");
        return Err(SchistError::new_packet_validation(PacketType::Connect, "invalid will topic"));
    }

    if will.payload.len() > MAXIMUM_STRING_LENGTH {
        error!("ConnectPacket Validation - will payload too long");
        return Err(SchistError::new_packet_validation(PacketType::Connect, "will payload exceeds 65535 bytes"));
    }

    Ok(())
}

fn validate_connect_packet_outbound(packet: &ConnectPacket) -> SchistResult<()> {
    validate_string_length(&packet.client_id, PacketType::Connect, "client_id")?;

    if packet.client_id.is_empty() && !packet.clean_session {
        error!("ConnectPacket Validation - an empty client id requires a clean session");
        return Err(SchistError::new_packet_validation(PacketType::Connect, "empty client id without clean session"));
    }

    validate_optional_string_length(&packet.username, PacketType::Connect, "username")?;
    validate_optional_binary_length(&packet.password, PacketType::Connect, "password")?;

    if packet.password.is_some() && packet.username.is_none() {
        error!("ConnectPacket Validation - password set without a username");
        return Err(SchistError::new_packet_validation(PacketType::Connect, "password requires a username"));
    }

    if let Some(will) = &packet.will {
        validate_will(will)?;
    }

    Ok(())
}

/// Checks the application-supplied parts of a publish: the topic, and that topic plus payload
/// fit within the maximum remaining length.
pub(crate) fn validate_publish_fields(topic: &str, payload_length: usize) -> SchistResult<()> {
    if !is_valid_topic(topic) {
        error!("PublishPacket Validation - invalid topic \"{}\"", topic);
        return Err(SchistError::new_packet_validation(PacketType::Publish, "invalid topic"));
    }

    // topic length prefix, topic, packet id
    let header_length = 2 + topic.len() + 2;
    if payload_length > MAXIMUM_VARIABLE_LENGTH_INTEGER - header_length {
        error!("PublishPacket Validation - payload of {} bytes too long", payload_length);
        return Err(SchistError::new_packet_validation(PacketType::Publish, "payload too long"));
    }

    Ok(())
}

fn validate_publish_packet_outbound(packet: &PublishPacket) -> SchistResult<()> {
    validate_publish_fields(&packet.topic, packet.payload.len())?;

    if packet.qos == QualityOfService::AtMostOnce {
        if packet.packet_id != 0 {
            error!("PublishPacket Validation - packet id set on a qos 0 publish");
            return Err(SchistError::new_packet_validation(PacketType::Publish, "qos 0 publish with a packet id"));
        }

        if packet.duplicate {
            error!("PublishPacket Validation - duplicate flag set on a qos 0 publish");
            return Err(SchistError::new_packet_validation(PacketType::Publish, "qos 0 publish with the duplicate flag"));
        }
    } else if packet.packet_id == 0 {
        error!("PublishPacket Validation - packet id is zero");
        return Err(SchistError::new_packet_validation(PacketType::Publish, "qos 1+ publish without a packet id"));
    }

    Ok(())
}

fn validate_subscribe_packet_outbound(packet: &SubscribePacket) -> SchistResult<()> {
    if packet.subscriptions.is_empty() {
        error!("SubscribePacket Validation - empty subscription set");
        return Err(SchistError::new_packet_validation(PacketType::Subscribe, "no subscriptions"));
    }

    for subscription in &packet.subscriptions {
        if !is_valid_topic_filter(&subscription.topic_filter) {
            error!("SubscribePacket Validation - invalid topic filter \"{}\"", subscription.topic_filter);
            return Err(SchistError::new_packet_validation(PacketType::Subscribe, "invalid topic filter"));
        }
    }

    Ok(())
}

fn validate_unsubscribe_packet_outbound(packet: &UnsubscribePacket) -> SchistResult<()> {
    if packet.topic_filters.is_empty() {
        error!("UnsubscribePacket Validation - empty topic filter set");
        return Err(SchistError::new_packet_validation(PacketType::Unsubscribe, "no topic filters"));
    }

    for filter in &packet.topic_filters {
        if !is_valid_topic_filter(filter) {
            error!("UnsubscribePacket Validation - invalid topic filter \"{}\"", filter);
            return Err(SchistError::new_packet_validation(PacketType::Unsubscribe, "invalid topic filter"));
        }
    }

    Ok(())
}

/// Validates a packet built from application input before it is queued.
pub(crate) fn validate_packet_outbound(packet: &MqttPacket) -> SchistResult<()> {
    match packet {
        MqttPacket::Connect(connect) => { validate_connect_packet_outbound(connect) }
        MqttPacket::Publish(publish) => { validate_publish_packet_outbound(publish) }
        MqttPacket::Subscribe(subscribe) => { validate_subscribe_packet_outbound(subscribe) }
        MqttPacket::Unsubscribe(unsubscribe) => { validate_unsubscribe_packet_outbound(unsubscribe) }
        _ => { Ok(()) }
    }
}

pub(crate) fn validate_host(host: &str) -> SchistResult<()> {
    if host.is_empty() {
        error!("connect - empty host");
        return Err(SchistError::new_invalid_argument("host must not be empty"));
    }

    Ok(())
}
