/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Protocol state for a single client: connection identity, the send queue, tracked QoS 1/2
messages, and the packet id allocator.

The session does no I/O.  The client feeds it decoded packets and write completions, and drains
its send queue into the transport.  Applications reach it directly from callbacks.
 */

use crate::client::config::*;
use crate::error::{SchistError, SchistResult};
use crate::logging::*;
use crate::message::*;
use crate::mqtt::*;
use crate::mqtt::utils::*;
use crate::stream::OutboundPacket;
use crate::validate::*;

use log::*;

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

const DEFAULT_WAIT_TIMEOUT : Duration = Duration::from_secs(30);

/// Connection-level state of a session
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionState {

    /// No connection attempt has been made, or the last one ended with a clean DISCONNECT.
    Disconnected,

    /// CONNECT has been queued; waiting for the broker's CONNACK.
    PendingConnack,

    /// The broker accepted the connection.
    Connected,

    /// DISCONNECT has been queued.  The connection closes once it is written.
    PendingDisconnect,

    /// The connection was torn down by an error.
    Halted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => { "Disconnected" }
            SessionState::PendingConnack => { "PendingConnack" }
            SessionState::Connected => { "Connected" }
            SessionState::PendingDisconnect => { "PendingDisconnect" }
            SessionState::Halted => { "Halted" }
        };

        write!(f, "{}", name)
    }
}

/// Things the application needs to hear about, produced while handling inbound packets
#[derive(Debug, Eq, PartialEq)]
pub(crate) enum SessionEvent {
    Connack { return_code: ConnectReturnCode, session_present: bool },
    Message(PublishPacket),
    PublishComplete(u16),
    Suback(SubackPacket),
    Unsuback(u16),
}

/// Client-side MQTT session state.  Obtained from a [`Client`](crate::client::Client) and passed
/// to every callback.
pub struct Session {
    client_id: String,
    clean_session: bool,
    keep_alive_seconds: u16,
    username: Option<String>,
    password: Option<Vec<u8>>,
    will: Option<Will>,

    max_inflight: usize,
    max_queued: usize,
    publish_retry_timeout: Duration,
    redelivery_policy: RedeliveryPolicy,

    state: SessionState,
    paused: bool,

    send_queue: VecDeque<OutboundPacket>,
    messages: MessageStore,
    pending_subscribes: Vec<u16>,
    pending_unsubscribes: Vec<u16>,
    next_packet_id: u16,

    connect_time: Instant,
    last_write_time: Instant,
    pending_ping_time: Option<Instant>,
}

impl Session {
    pub(crate) fn new(options: ClientOptions) -> Session {
        Session {
            client_id: options.client_id,
            clean_session: true,
            keep_alive_seconds: 0,
            username: options.username,
            password: options.password,
            will: options.will,
            max_inflight: options.max_inflight,
            max_queued: options.max_queued,
            publish_retry_timeout: options.publish_retry_timeout,
            redelivery_policy: options.redelivery_policy,
            state: SessionState::Disconnected,
            paused: false,
            send_queue: VecDeque::new(),
            messages: MessageStore::new(),
            pending_subscribes: Vec::new(),
            pending_unsubscribes: Vec::new(),
            next_packet_id: 1,
            connect_time: Instant::now(),
            last_write_time: Instant::now(),
            pending_ping_time: None,
        }
    }

    /// Returns the connection-level state of the session
    pub fn state(&self) -> SessionState { self.state }

    /// Returns true once the broker has accepted the connection, until it closes
    pub fn is_connected(&self) -> bool { self.state == SessionState::Connected }

    /// Returns the client id used in CONNECT
    pub fn client_id(&self) -> &str { self.client_id.as_str() }

    /// Returns the number of outbound QoS 1/2 messages not yet fully acknowledged, queued ones
    /// included
    pub fn outbound_message_count(&self) -> usize { self.messages.outbound.len() }

    /// Returns the number of inbound QoS 2 messages still tracked
    pub fn inbound_message_count(&self) -> usize { self.messages.inbound.len() }

    /// Stops delivering inbound messages to the application.  Acknowledgements are still sent.
    pub fn pause(&mut self) {
        debug!("pause - inbound message delivery suspended");
        self.paused = true;
    }

    /// Resumes delivering inbound messages to the application.  Messages that arrived while
    /// paused are not replayed.
    pub fn resume(&mut self) {
        debug!("resume - inbound message delivery resumed");
        self.paused = false;
    }

    /// Returns true while inbound message delivery is paused
    pub fn is_paused(&self) -> bool { self.paused }

    /// Sets the will message sent with the next CONNECT.  Fails while a connection is active.
    pub fn set_will(&mut self, topic: &str, payload: &[u8], qos: QualityOfService, retain: bool) -> SchistResult<()> {
        self.check_configurable("set_will")?;

        if !is_valid_topic(topic) {
            error!("set_will - invalid will topic \"{}\"", topic);
            return Err(SchistError::new_packet_validation(PacketType::Connect, "invalid will topic"));
        }

        self.will = Some(Will::new(topic, payload, qos, retain));
        Ok(())
    }

    /// Sets the credentials sent with the next CONNECT.  Fails while a connection is active.
    pub fn set_auth(&mut self, username: Option<&str>, password: Option<&[u8]>) -> SchistResult<()> {
        self.check_configurable("set_auth")?;

        self.username = username.map(|value| value.to_string());
        self.password = password.map(|value| value.to_vec());
        Ok(())
    }

    /// Sets how many outbound QoS 1/2 messages may await acknowledgement at once.  Zero means
    /// unlimited.
    pub fn set_max_inflight(&mut self, max_inflight: usize) {
        self.max_inflight = max_inflight;
    }

    /// Sets how many outbound QoS 1/2 messages may wait for an inflight slot.  Zero means
    /// unlimited.
    pub fn set_max_queued(&mut self, max_queued: usize) {
        self.max_queued = max_queued;
    }

    /// Sets the acknowledgement timeout after which messages are retransmitted
    pub fn set_publish_retry_timeout(&mut self, publish_retry_timeout: Duration) {
        self.publish_retry_timeout = publish_retry_timeout;
    }

    /// Publishes a message.  Returns the packet id tracking a QoS 1/2 message, or 0 for QoS 0.
    ///
    /// QoS 1/2 messages beyond the inflight limit are queued; once the queue limit is reached
    /// the call fails with `QueueFull` and nothing is queued.
    pub fn publish(&mut self, qos: QualityOfService, retain: bool, topic: &str, payload: &[u8]) -> SchistResult<u16> {
        self.check_active("publish")?;
        validate_publish_fields(topic, payload.len())?;

        if qos == QualityOfService::AtMostOnce {
            let packet = MqttPacket::Publish(PublishPacket {
                topic: topic.to_string(),
                qos,
                retain,
                payload: payload.to_vec(),
                ..Default::default()
            });

            self.enqueue_packet(&packet, None)?;
            return Ok(0);
        }

        let queued_count = self.messages.queued_count();
        let will_queue = queued_count > 0 || !self.has_free_inflight_slot();
        if will_queue && self.max_queued != 0 && queued_count >= self.max_queued {
            warn!("publish - rejecting publish to \"{}\", {} messages already queued", topic, queued_count);
            return Err(SchistError::new_queue_full(self.max_queued));
        }

        let packet_id = self.acquire_free_packet_id()?;
        debug!("publish - qos {} publish to \"{}\" bound to packet id {}", qos as u8, topic, packet_id);

        self.messages.push(Message::new_outbound(packet_id, topic.to_string(), payload.to_vec(), qos, retain, Instant::now()));
        self.promote_queued_messages()?;

        Ok(packet_id)
    }

    /// Subscribes to a single topic filter.  Returns the packet id of the SUBSCRIBE.
    pub fn subscribe(&mut self, topic_filter: &str, qos: QualityOfService) -> SchistResult<u16> {
        self.subscribe_many(&[(topic_filter, qos)])
    }

    /// Subscribes to several topic filters with one SUBSCRIBE.  The SUBACK reports a result per
    /// filter, in order.
    pub fn subscribe_many(&mut self, subscriptions: &[(&str, QualityOfService)]) -> SchistResult<u16> {
        self.check_active("subscribe")?;

        let packet_id = self.acquire_free_packet_id()?;
        let packet = MqttPacket::Subscribe(SubscribePacket {
            packet_id,
            subscriptions: subscriptions.iter().map(|(topic_filter, qos)| Subscription::new(topic_filter, *qos)).collect(),
        });

        self.enqueue_packet(&packet, None)?;
        self.pending_subscribes.push(packet_id);

        Ok(packet_id)
    }

    /// Unsubscribes from a topic filter.  Returns the packet id of the UNSUBSCRIBE.
    pub fn unsubscribe(&mut self, topic_filter: &str) -> SchistResult<u16> {
        self.check_active("unsubscribe")?;

        let packet_id = self.acquire_free_packet_id()?;
        let packet = MqttPacket::Unsubscribe(UnsubscribePacket {
            packet_id,
            topic_filters: vec![ topic_filter.to_string() ],
        });

        self.enqueue_packet(&packet, None)?;
        self.pending_unsubscribes.push(packet_id);

        Ok(packet_id)
    }

    /// Queues a DISCONNECT behind everything already queued.  The connection closes once it
    /// has been written.
    pub fn disconnect(&mut self) -> SchistResult<()> {
        self.check_active("disconnect")?;

        self.enqueue_packet(&MqttPacket::Disconnect(DisconnectPacket {}), None)?;
        self.change_state(SessionState::PendingDisconnect);

        Ok(())
    }

    fn change_state(&mut self, next_state: SessionState) {
        debug!("change_state - transitioning from {} to {}", self.state, next_state);
        self.state = next_state;
    }

    pub(crate) fn is_active(&self) -> bool {
        matches!(self.state, SessionState::PendingConnack | SessionState::Connected | SessionState::PendingDisconnect)
    }

    fn check_active(&self, operation: &str) -> SchistResult<()> {
        match self.state {
            SessionState::PendingConnack | SessionState::Connected => { Ok(()) }
            _ => {
                error!("{} - session is not connected (state {})", operation, self.state);
                Err(SchistError::new_not_connected())
            }
        }
    }

    fn check_configurable(&self, operation: &str) -> SchistResult<()> {
        if self.is_active() {
            error!("{} - cannot change connection settings while a session is active", operation);
            return Err(SchistError::new_invalid_argument("connection settings cannot change while a session is active"));
        }

        Ok(())
    }

    fn has_free_inflight_slot(&self) -> bool {
        self.max_inflight == 0 || self.messages.inflight_count() < self.max_inflight
    }

    fn is_packet_id_in_use(&self, packet_id: u16) -> bool {
        self.messages.find(MessageDirection::Outbound, packet_id).is_some()
            || self.pending_subscribes.contains(&packet_id)
            || self.pending_unsubscribes.contains(&packet_id)
    }

    fn acquire_free_packet_id(&mut self) -> SchistResult<u16> {
        let start_id = self.next_packet_id;
        let mut check_id = start_id;

        loop {
            if self.next_packet_id == u16::MAX {
                self.next_packet_id = 1;
            } else {
                self.next_packet_id += 1;
            }

            if !self.is_packet_id_in_use(check_id) {
                return Ok(check_id);
            }

            if self.next_packet_id == start_id {
                error!("acquire_free_packet_id - could not find an unbound packet id");
                return Err(SchistError::new_internal_state_error("packet id space exhausted"));
            }

            check_id = self.next_packet_id;
        }
    }

    fn enqueue_packet(&mut self, packet: &MqttPacket, owner: Option<(MessageDirection, u16)>) -> SchistResult<()> {
        validate_packet_outbound(packet)?;

        let outbound_packet = OutboundPacket::new(packet, owner)?;
        self.send_queue.push_back(outbound_packet);

        Ok(())
    }

    // the packet at the front may already be partially written, so it stays
    fn drop_queued_publishes(&mut self, packet_id: u16) {
        let owner = Some((MessageDirection::Outbound, packet_id));
        let mut index = 0;
        self.send_queue.retain(|packet| {
            index += 1;
            index == 1 || packet.packet_type != PacketType::Publish || packet.owner != owner
        });
    }

    fn promote_queued_messages(&mut self) -> SchistResult<()> {
        if self.state != SessionState::Connected {
            return Ok(());
        }

        while self.has_free_inflight_slot() {
            let Some(message) = self.messages.outbound.iter_mut().find(|message| message.state == MessageState::Queued) else {
                break;
            };

            message.apply(MessageEvent::Promote);
            let packet_id = message.packet_id;
            let packet = MqttPacket::Publish(message.to_publish_packet());

            debug!("promote_queued_messages - publish {} moved to an inflight slot", packet_id);
            self.enqueue_packet(&packet, Some((MessageDirection::Outbound, packet_id)))?;
        }

        Ok(())
    }

    /// Builds and validates the CONNECT for a new connection attempt without touching any
    /// session state.
    pub(crate) fn build_connect_packet(&self, keep_alive_seconds: u16, clean_session: bool) -> SchistResult<ConnectPacket> {
        let packet = ConnectPacket {
            keep_alive_interval_seconds: keep_alive_seconds,
            clean_session,
            client_id: self.client_id.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            will: self.will.as_ref().map(|will| will.to_publish_packet()),
        };

        validate_packet_outbound(&MqttPacket::Connect(packet.clone()))?;

        Ok(packet)
    }

    /// Resets the session for a new connection and queues CONNECT.
    pub(crate) fn begin_connect(&mut self, connect: ConnectPacket, now: Instant) -> SchistResult<()> {
        let redeliver = self.redelivery_policy == RedeliveryPolicy::RedeliverOnReconnect && !connect.clean_session;

        self.send_queue.clear();
        self.pending_subscribes.clear();
        self.pending_unsubscribes.clear();
        self.pending_ping_time = None;
        self.keep_alive_seconds = connect.keep_alive_interval_seconds;
        self.clean_session = connect.clean_session;

        let mut pubrels = Vec::new();
        if redeliver {
            for message in self.messages.outbound.iter_mut() {
                match message.state {
                    MessageState::WaitPubAck | MessageState::WaitPubRec => {
                        message.dup = true;
                        message.state = MessageState::Queued;
                    }
                    MessageState::Publish => {
                        message.state = MessageState::Queued;
                    }
                    MessageState::WaitPubComp => {
                        pubrels.push(message.packet_id);
                    }
                    _ => {}
                }
            }

            info!("begin_connect - redelivering {} outbound messages", self.messages.outbound.len());
        } else {
            self.messages.clear();
        }

        self.enqueue_packet(&MqttPacket::Connect(connect), None)?;
        for packet_id in pubrels {
            self.enqueue_packet(&MqttPacket::Pubrel(PubrelPacket { packet_id }), Some((MessageDirection::Outbound, packet_id)))?;
        }

        self.connect_time = now;
        self.last_write_time = now;
        self.change_state(SessionState::PendingConnack);

        Ok(())
    }

    /// Stops the session after an error.  Tracked messages are kept for a later reconnect.
    pub(crate) fn halt(&mut self) {
        if self.state != SessionState::Halted {
            self.change_state(SessionState::Halted);
        }

        self.send_queue.clear();
        self.pending_subscribes.clear();
        self.pending_unsubscribes.clear();
        self.pending_ping_time = None;
    }

    pub(crate) fn has_pending_output(&self) -> bool {
        !self.send_queue.is_empty()
    }

    pub(crate) fn next_outbound_packet(&self) -> Option<&OutboundPacket> {
        self.send_queue.front()
    }

    /// How long the client may wait for transport readiness.  No timeout means one keep alive
    /// interval, and no wait may exceed a non-zero keep alive.
    pub(crate) fn compute_wait_timeout(&self, requested_timeout: Option<Duration>) -> Duration {
        let keep_alive = Duration::from_secs(self.keep_alive_seconds as u64);

        match requested_timeout {
            None => {
                if keep_alive.is_zero() { DEFAULT_WAIT_TIMEOUT } else { keep_alive }
            }
            Some(timeout) => {
                if !keep_alive.is_zero() && timeout > keep_alive { keep_alive } else { timeout }
            }
        }
    }

    /// Called once the packet at the front of the send queue has been completely written.
    pub(crate) fn on_packet_written(&mut self, now: Instant) -> SchistResult<()> {
        let Some(packet) = self.send_queue.pop_front() else {
            error!("on_packet_written - send queue is empty");
            return Err(SchistError::new_internal_state_error("write completion with an empty send queue"));
        };

        self.last_write_time = now;

        if let Some((direction, packet_id)) = packet.owner {
            if let Some(message) = self.messages.find_mut(direction, packet_id) {
                if packet.packet_type == PacketType::Publish && message.state == MessageState::Publish {
                    message.apply(MessageEvent::PublishWritten);
                }

                message.timestamp = now;
            }
        }

        if packet.packet_type == PacketType::Disconnect {
            info!("on_packet_written - DISCONNECT written");
            self.send_queue.clear();
            self.change_state(SessionState::Disconnected);
        }

        Ok(())
    }

    /// Retransmits everything whose acknowledgement is overdue, frees expired tombstones, and
    /// fills free inflight slots.
    pub(crate) fn service_retries(&mut self, now: Instant) -> SchistResult<()> {
        if self.state == SessionState::Connected {
            let retry_timeout = self.publish_retry_timeout;
            let mut retransmissions = Vec::new();

            for message in self.messages.outbound.iter_mut() {
                if now.saturating_duration_since(message.timestamp) < retry_timeout {
                    continue;
                }

                let packet_id = message.packet_id;
                match message.state {
                    MessageState::WaitPubAck | MessageState::WaitPubRec => {
                        message.apply(MessageEvent::RetryElapsed);
                        message.dup = true;
                        message.timestamp = now;

                        info!("service_retries - retransmitting publish {}", packet_id);
                        retransmissions.push((MqttPacket::Publish(message.to_publish_packet()), MessageDirection::Outbound, packet_id));
                    }
                    MessageState::WaitPubComp => {
                        message.apply(MessageEvent::RetryElapsed);
                        message.timestamp = now;

                        info!("service_retries - retransmitting pubrel {}", packet_id);
                        retransmissions.push((MqttPacket::Pubrel(PubrelPacket { packet_id }), MessageDirection::Outbound, packet_id));
                    }
                    _ => {}
                }
            }

            let mut expired = Vec::new();
            for message in self.messages.inbound.iter_mut() {
                if now.saturating_duration_since(message.timestamp) < retry_timeout {
                    continue;
                }

                let packet_id = message.packet_id;
                match message.apply(MessageEvent::RetryElapsed) {
                    Some(Transition::Next(MessageState::WaitPubRel)) => {
                        message.timestamp = now;

                        info!("service_retries - retransmitting pubrec {}", packet_id);
                        retransmissions.push((MqttPacket::Pubrec(PubrecPacket { packet_id }), MessageDirection::Inbound, packet_id));
                    }
                    Some(Transition::Complete) => {
                        expired.push(packet_id);
                    }
                    _ => {}
                }
            }

            for packet_id in expired {
                debug!("service_retries - releasing completed inbound message {}", packet_id);
                self.messages.remove(MessageDirection::Inbound, packet_id);
            }

            for (packet, direction, packet_id) in retransmissions {
                self.enqueue_packet(&packet, Some((direction, packet_id)))?;
            }
        }

        self.promote_queued_messages()
    }

    /// Sends PINGREQ once the connection has been idle for a keep alive interval, and fails the
    /// session if a PINGREQ has gone unanswered for as long.
    ///
    /// Before CONNACK arrives the session fails once a keep alive interval (or the default wait
    /// when keep alive is disabled) has passed since CONNECT was queued.
    pub(crate) fn service_keep_alive(&mut self, now: Instant) -> SchistResult<()> {
        let keep_alive = Duration::from_secs(self.keep_alive_seconds as u64);

        if self.state == SessionState::PendingConnack {
            let connack_timeout = if keep_alive.is_zero() { DEFAULT_WAIT_TIMEOUT } else { keep_alive };
            if now.saturating_duration_since(self.connect_time) >= connack_timeout {
                error!("service_keep_alive - no CONNACK within {} seconds", connack_timeout.as_secs());
                return Err(SchistError::new_connack_timeout());
            }

            return Ok(());
        }

        if self.state != SessionState::Connected || keep_alive.is_zero() {
            return Ok(());
        }

        if let Some(ping_time) = self.pending_ping_time {
            if now.saturating_duration_since(ping_time) >= keep_alive {
                error!("service_keep_alive - no PINGRESP within {} seconds", self.keep_alive_seconds);
                return Err(SchistError::new_ping_timeout());
            }

            return Ok(());
        }

        if self.send_queue.is_empty() && now.saturating_duration_since(self.last_write_time) >= keep_alive {
            debug!("service_keep_alive - connection idle, sending PINGREQ");
            self.enqueue_packet(&MqttPacket::Pingreq(PingreqPacket {}), None)?;
            self.pending_ping_time = Some(now);
        }

        Ok(())
    }

    /// Applies an inbound packet to the session.  Anything the application should see is
    /// appended to `events`, including on failure.
    pub(crate) fn handle_packet(&mut self, packet: MqttPacket, now: Instant, events: &mut VecDeque<SessionEvent>) -> SchistResult<()> {
        log_packet("Received packet: ", &packet);

        if self.state == SessionState::PendingConnack && !matches!(packet, MqttPacket::Connack(_)) {
            error!("handle_packet - {} received before CONNACK", mqtt_packet_to_packet_type(&packet));
            return Err(SchistError::new_protocol_error("packet received before connack"));
        }

        match packet {
            MqttPacket::Connack(connack) => { self.handle_connack(connack, events) }
            MqttPacket::Publish(publish) => { self.handle_publish(publish, now, events) }
            MqttPacket::Puback(puback) => { self.handle_puback(puback.packet_id, events) }
            MqttPacket::Pubrec(pubrec) => { self.handle_pubrec(pubrec.packet_id, now) }
            MqttPacket::Pubrel(pubrel) => { self.handle_pubrel(pubrel.packet_id, now) }
            MqttPacket::Pubcomp(pubcomp) => { self.handle_pubcomp(pubcomp.packet_id, events) }
            MqttPacket::Suback(suback) => { self.handle_suback(suback, events) }
            MqttPacket::Unsuback(unsuback) => { self.handle_unsuback(unsuback.packet_id, events) }
            MqttPacket::Pingresp(_) => { self.handle_pingresp() }
            MqttPacket::Connect(_) | MqttPacket::Subscribe(_) | MqttPacket::Unsubscribe(_) | MqttPacket::Pingreq(_) | MqttPacket::Disconnect(_) => {
                error!("handle_packet - received client-only packet {}", mqtt_packet_to_packet_type(&packet));
                Err(SchistError::new_protocol_error("received a packet only a client may send"))
            }
        }
    }

    fn handle_connack(&mut self, connack: ConnackPacket, events: &mut VecDeque<SessionEvent>) -> SchistResult<()> {
        if self.state != SessionState::PendingConnack {
            error!("handle_connack - CONNACK received in state {}", self.state);
            return Err(SchistError::new_protocol_error("connack received outside of connection establishment"));
        }

        events.push_back(SessionEvent::Connack {
            return_code: connack.return_code,
            session_present: connack.session_present,
        });

        if !connack.return_code.is_success() {
            error!("handle_connack - connection rejected: {}", connack.return_code);
            self.change_state(SessionState::Halted);
            return Err(SchistError::new_connection_rejected(connack.return_code));
        }

        info!("handle_connack - connection accepted, session present: {}", connack.session_present);
        self.change_state(SessionState::Connected);

        self.promote_queued_messages()
    }

    fn deliver(&self, publish: PublishPacket, events: &mut VecDeque<SessionEvent>) {
        if self.paused {
            debug!("deliver - paused, not delivering message on \"{}\"", publish.topic);
            return;
        }

        events.push_back(SessionEvent::Message(publish));
    }

    fn handle_publish(&mut self, publish: PublishPacket, now: Instant, events: &mut VecDeque<SessionEvent>) -> SchistResult<()> {
        let packet_id = publish.packet_id;

        match publish.qos {
            QualityOfService::AtMostOnce => {
                self.deliver(publish, events);
            }
            QualityOfService::AtLeastOnce => {
                self.deliver(publish, events);
                self.enqueue_packet(&MqttPacket::Puback(PubackPacket { packet_id }), None)?;
            }
            QualityOfService::ExactlyOnce => {
                let existing_state = self.messages.find(MessageDirection::Inbound, packet_id).map(|message| message.state);
                if existing_state == Some(MessageState::WaitPubRel) {
                    debug!("handle_publish - duplicate delivery of qos 2 message {}", packet_id);
                    if let Some(message) = self.messages.find_mut(MessageDirection::Inbound, packet_id) {
                        message.timestamp = now;
                    }
                } else {
                    if existing_state.is_some() {
                        debug!("handle_publish - packet id {} reused, replacing completed message", packet_id);
                        self.messages.remove(MessageDirection::Inbound, packet_id);
                    }

                    self.messages.push(Message::new_inbound(packet_id, now));
                    self.deliver(publish, events);
                }

                self.enqueue_packet(&MqttPacket::Pubrec(PubrecPacket { packet_id }), Some((MessageDirection::Inbound, packet_id)))?;
            }
        }

        Ok(())
    }

    fn complete_outbound_message(&mut self, packet_id: u16, events: &mut VecDeque<SessionEvent>) -> SchistResult<()> {
        self.messages.remove(MessageDirection::Outbound, packet_id);
        self.drop_queued_publishes(packet_id);

        info!("complete_outbound_message - publish {} acknowledged", packet_id);
        events.push_back(SessionEvent::PublishComplete(packet_id));

        self.promote_queued_messages()
    }

    fn handle_puback(&mut self, packet_id: u16, events: &mut VecDeque<SessionEvent>) -> SchistResult<()> {
        let Some(message) = self.messages.find_mut(MessageDirection::Outbound, packet_id) else {
            error!("handle_puback - no outbound message with packet id {}", packet_id);
            return Err(SchistError::new_protocol_error("puback for an unknown packet id"));
        };

        let state = message.state;
        match message.apply(MessageEvent::Puback) {
            Some(Transition::Complete) => { self.complete_outbound_message(packet_id, events) }
            _ => {
                error!("handle_puback - message {} cannot be acknowledged in state {}", packet_id, state);
                Err(SchistError::new_protocol_error("unexpected puback"))
            }
        }
    }

    fn handle_pubrec(&mut self, packet_id: u16, now: Instant) -> SchistResult<()> {
        let Some(message) = self.messages.find_mut(MessageDirection::Outbound, packet_id) else {
            error!("handle_pubrec - no outbound message with packet id {}", packet_id);
            return Err(SchistError::new_protocol_error("pubrec for an unknown packet id"));
        };

        let state = message.state;
        match message.apply(MessageEvent::Pubrec) {
            Some(Transition::Next(MessageState::WaitPubComp)) => {
                message.release_content();
                message.timestamp = now;

                self.drop_queued_publishes(packet_id);
                self.enqueue_packet(&MqttPacket::Pubrel(PubrelPacket { packet_id }), Some((MessageDirection::Outbound, packet_id)))
            }
            _ => {
                error!("handle_pubrec - message {} cannot accept PUBREC in state {}", packet_id, state);
                Err(SchistError::new_protocol_error("unexpected pubrec"))
            }
        }
    }

    fn handle_pubcomp(&mut self, packet_id: u16, events: &mut VecDeque<SessionEvent>) -> SchistResult<()> {
        let Some(message) = self.messages.find_mut(MessageDirection::Outbound, packet_id) else {
            warn!("handle_pubcomp - ignoring PUBCOMP for unknown packet id {}", packet_id);
            return Ok(());
        };

        let state = message.state;
        match message.apply(MessageEvent::Pubcomp) {
            Some(Transition::Complete) => { self.complete_outbound_message(packet_id, events) }
            _ => {
                error!("handle_pubcomp - message {} cannot accept PUBCOMP in state {}", packet_id, state);
                Err(SchistError::new_protocol_error("unexpected pubcomp"))
            }
        }
    }

    fn handle_pubrel(&mut self, packet_id: u16, now: Instant) -> SchistResult<()> {
        let Some(message) = self.messages.find_mut(MessageDirection::Inbound, packet_id) else {
            error!("handle_pubrel - no inbound message with packet id {}", packet_id);
            return Err(SchistError::new_protocol_error("pubrel for an unknown packet id"));
        };

        let state = message.state;
        match message.apply(MessageEvent::Pubrel) {
            Some(Transition::Next(MessageState::PubCompSent)) => {
                message.timestamp = now;
                self.enqueue_packet(&MqttPacket::Pubcomp(PubcompPacket { packet_id }), Some((MessageDirection::Inbound, packet_id)))
            }
            _ => {
                error!("handle_pubrel - message {} cannot accept PUBREL in state {}", packet_id, state);
                Err(SchistError::new_protocol_error("unexpected pubrel"))
            }
        }
    }

    fn handle_suback(&mut self, suback: SubackPacket, events: &mut VecDeque<SessionEvent>) -> SchistResult<()> {
        let Some(index) = self.pending_subscribes.iter().position(|packet_id| *packet_id == suback.packet_id) else {
            error!("handle_suback - no pending subscribe with packet id {}", suback.packet_id);
            return Err(SchistError::new_protocol_error("suback for an unknown packet id"));
        };

        self.pending_subscribes.remove(index);
        events.push_back(SessionEvent::Suback(suback));

        Ok(())
    }

    fn handle_unsuback(&mut self, packet_id: u16, events: &mut VecDeque<SessionEvent>) -> SchistResult<()> {
        let Some(index) = self.pending_unsubscribes.iter().position(|pending_id| *pending_id == packet_id) else {
            error!("handle_unsuback - no pending unsubscribe with packet id {}", packet_id);
            return Err(SchistError::new_protocol_error("unsuback for an unknown packet id"));
        };

        self.pending_unsubscribes.remove(index);
        events.push_back(SessionEvent::Unsuback(packet_id));

        Ok(())
    }

    fn handle_pingresp(&mut self) -> SchistResult<()> {
        if self.pending_ping_time.take().is_none() {
            debug!("handle_pingresp - PINGRESP without an outstanding PINGREQ");
        }

        Ok(())
    }
}
