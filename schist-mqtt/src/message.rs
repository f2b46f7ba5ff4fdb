/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
QoS 1 and QoS 2 delivery tracking.

Every outbound QoS 1/2 publish and every inbound QoS 2 publish is represented by a [`Message`]
from the moment it enters the session until its handshake finishes.  All state changes go through
[`next_state`], which encodes the acknowledgement handshakes of the MQTT 3.1.1 specification.
 */

use crate::mqtt::*;

use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

/// Which side of the connection originated a message
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MessageDirection {

    /// published by this client
    Outbound,

    /// published by the broker to this client
    Inbound,
}

/// Delivery state of a tracked message
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MessageState {

    /// Waiting for an inflight slot.  Nothing has been queued for the wire.
    Queued,

    /// A PUBLISH for this message is in the send queue.
    Publish,

    /// QoS 1 PUBLISH written, waiting for PUBACK.
    WaitPubAck,

    /// QoS 2 PUBLISH written, waiting for PUBREC.
    WaitPubRec,

    /// QoS 2 PUBREL sent, waiting for PUBCOMP.
    WaitPubComp,

    /// Inbound QoS 2 PUBLISH delivered and PUBREC sent, waiting for PUBREL.
    WaitPubRel,

    /// Inbound QoS 2 handshake finished.  Kept for one retry timeout to answer duplicate PUBRELs.
    PubCompSent,
}

impl MessageState {

    /// Returns true if an outbound message in this state occupies an inflight slot
    pub fn is_inflight(&self) -> bool {
        matches!(self, MessageState::Publish | MessageState::WaitPubAck | MessageState::WaitPubRec | MessageState::WaitPubComp)
    }
}

impl fmt::Display for MessageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageState::Queued => { "Queued" }
            MessageState::Publish => { "Publish" }
            MessageState::WaitPubAck => { "WaitPubAck" }
            MessageState::WaitPubRec => { "WaitPubRec" }
            MessageState::WaitPubComp => { "WaitPubComp" }
            MessageState::WaitPubRel => { "WaitPubRel" }
            MessageState::PubCompSent => { "PubCompSent" }
        };

        write!(f, "{}", name)
    }
}

/// Something that happened to a tracked message
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum MessageEvent {
    Promote,
    PublishWritten,
    Puback,
    Pubrec,
    Pubcomp,
    Pubrel,
    RetryElapsed,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Transition {
    Next(MessageState),
    Complete,
}

/// Computes the effect of an event on a message.  `duplicate` is the message's dup flag, which
/// is set once its PUBLISH has been written at least once.  Returns `None` for events that are
/// not valid in the current state.
pub(crate) fn next_state(state: MessageState, qos: QualityOfService, event: MessageEvent, duplicate: bool) -> Option<Transition> {
    use MessageEvent::*;
    use MessageState::*;
    use QualityOfService::*;

    match (state, qos, event) {
        (Queued, AtLeastOnce | ExactlyOnce, Promote) => { Some(Transition::Next(Publish)) }

        (Publish, AtLeastOnce, PublishWritten) => { Some(Transition::Next(WaitPubAck)) }
        (Publish, ExactlyOnce, PublishWritten) => { Some(Transition::Next(WaitPubRec)) }

        // an ack for the original PUBLISH while the retransmission is still queued
        (Publish, AtLeastOnce, Puback) if duplicate => { Some(Transition::Complete) }
        (Publish, ExactlyOnce, Pubrec) if duplicate => { Some(Transition::Next(WaitPubComp)) }

        (WaitPubAck, AtLeastOnce, Puback) => { Some(Transition::Complete) }
        (WaitPubRec, ExactlyOnce, Pubrec) => { Some(Transition::Next(WaitPubComp)) }
        (WaitPubComp, ExactlyOnce, Pubrec) => { Some(Transition::Next(WaitPubComp)) }
        (WaitPubComp, ExactlyOnce, Pubcomp) => { Some(Transition::Complete) }

        (WaitPubAck | WaitPubRec, _, RetryElapsed) => { Some(Transition::Next(Publish)) }
        (WaitPubComp, ExactlyOnce, RetryElapsed) => { Some(Transition::Next(WaitPubComp)) }

        (WaitPubRel, ExactlyOnce, Pubrel) => { Some(Transition::Next(PubCompSent)) }
        (PubCompSent, ExactlyOnce, Pubrel) => { Some(Transition::Next(PubCompSent)) }
        (WaitPubRel, ExactlyOnce, RetryElapsed) => { Some(Transition::Next(WaitPubRel)) }
        (PubCompSent, ExactlyOnce, RetryElapsed) => { Some(Transition::Complete) }

        _ => { None }
    }
}

/// A QoS 1 or QoS 2 message whose handshake is in progress
#[derive(Clone, Debug)]
pub(crate) struct Message {
    pub(crate) direction: MessageDirection,
    pub(crate) qos: QualityOfService,
    pub(crate) retain: bool,
    pub(crate) dup: bool,
    pub(crate) state: MessageState,
    pub(crate) packet_id: u16,
    pub(crate) topic: String,
    pub(crate) payload: Vec<u8>,

    /// last time the message was sent, received, or changed state
    pub(crate) timestamp: Instant,
}

impl Message {
    pub(crate) fn new_outbound(packet_id: u16, topic: String, payload: Vec<u8>, qos: QualityOfService, retain: bool, now: Instant) -> Message {
        Message {
            direction: MessageDirection::Outbound,
            qos,
            retain,
            dup: false,
            state: MessageState::Queued,
            packet_id,
            topic,
            payload,
            timestamp: now,
        }
    }

    /// Tracks an inbound QoS 2 publish.  Topic and payload are not kept; the application has
    /// already seen them.
    pub(crate) fn new_inbound(packet_id: u16, now: Instant) -> Message {
        Message {
            direction: MessageDirection::Inbound,
            qos: QualityOfService::ExactlyOnce,
            retain: false,
            dup: false,
            state: MessageState::WaitPubRel,
            packet_id,
            topic: String::new(),
            payload: Vec::new(),
            timestamp: now,
        }
    }

    pub(crate) fn to_publish_packet(&self) -> PublishPacket {
        PublishPacket {
            packet_id: self.packet_id,
            topic: self.topic.clone(),
            qos: self.qos,
            duplicate: self.dup,
            retain: self.retain,
            payload: self.payload.clone(),
        }
    }

    /// Once PUBREC arrives the broker owns the message; only the packet id is needed afterwards.
    pub(crate) fn release_content(&mut self) {
        self.topic = String::new();
        self.payload = Vec::new();
    }

    pub(crate) fn apply(&mut self, event: MessageEvent) -> Option<Transition> {
        let transition = next_state(self.state, self.qos, event, self.dup)?;
        if let Transition::Next(state) = transition {
            self.state = state;
        }

        Some(transition)
    }
}

/// Ordered collections of tracked messages, one per direction.  Order is creation order, which
/// is also the order queued messages get promoted and retried in.
#[derive(Default)]
pub(crate) struct MessageStore {
    pub(crate) outbound: VecDeque<Message>,
    pub(crate) inbound: VecDeque<Message>,
}

impl MessageStore {
    pub(crate) fn new() -> MessageStore {
        MessageStore::default()
    }

    fn collection(&self, direction: MessageDirection) -> &VecDeque<Message> {
        match direction {
            MessageDirection::Outbound => { &self.outbound }
            MessageDirection::Inbound => { &self.inbound }
        }
    }

    fn collection_mut(&mut self, direction: MessageDirection) -> &mut VecDeque<Message> {
        match direction {
            MessageDirection::Outbound => { &mut self.outbound }
            MessageDirection::Inbound => { &mut self.inbound }
        }
    }

    pub(crate) fn find(&self, direction: MessageDirection, packet_id: u16) -> Option<&Message> {
        self.collection(direction).iter().find(|message| message.packet_id == packet_id)
    }

    pub(crate) fn find_mut(&mut self, direction: MessageDirection, packet_id: u16) -> Option<&mut Message> {
        self.collection_mut(direction).iter_mut().find(|message| message.packet_id == packet_id)
    }

    pub(crate) fn remove(&mut self, direction: MessageDirection, packet_id: u16) -> Option<Message> {
        let collection = self.collection_mut(direction);
        let index = collection.iter().position(|message| message.packet_id == packet_id)?;
        collection.remove(index)
    }

    pub(crate) fn push(&mut self, message: Message) {
        self.collection_mut(message.direction).push_back(message);
    }

    pub(crate) fn inflight_count(&self) -> usize {
        self.outbound.iter().filter(|message| message.state.is_inflight()).count()
    }

    pub(crate) fn queued_count(&self) -> usize {
        self.outbound.iter().filter(|message| message.state == MessageState::Queued).count()
    }

    pub(crate) fn clear(&mut self) {
        self.outbound.clear();
        self.inbound.clear();
    }
}
