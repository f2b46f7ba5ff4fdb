/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Module containing the public MQTT client, its callbacks, and the single-threaded event loop that
drives a session over a transport.
 */

#![warn(missing_docs)]

pub mod config;

use crate::client::config::*;
use crate::error::{SchistError, SchistResult};
use crate::mqtt::*;
use crate::session::*;
use crate::stream::*;
use crate::transport::*;
use crate::validate::validate_host;

use log::*;

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Invoked when the broker answers CONNECT, with the return code and the session-present flag.
pub type OnConnectCallback = Box<dyn FnMut(&mut Session, ConnectReturnCode, bool)>;

/// Invoked when a SUBACK arrives, with the SUBSCRIBE's packet id and one result per filter.
pub type OnSubscribeCallback = Box<dyn FnMut(&mut Session, u16, &[SubackReturnCode])>;

/// Invoked when an UNSUBACK arrives, with the UNSUBSCRIBE's packet id.
pub type OnUnsubscribeCallback = Box<dyn FnMut(&mut Session, u16)>;

/// Invoked for every application message the broker delivers, unless delivery is paused.
pub type OnMessageCallback = Box<dyn FnMut(&mut Session, &PublishPacket)>;

/// Invoked when an outbound QoS 1 or QoS 2 publish completes its handshake, with its packet id.
pub type OnPublishCallback = Box<dyn FnMut(&mut Session, u16)>;

#[derive(Default)]
struct ClientCallbacks {
    on_connect: Option<OnConnectCallback>,
    on_subscribe: Option<OnSubscribeCallback>,
    on_unsubscribe: Option<OnUnsubscribeCallback>,
    on_message: Option<OnMessageCallback>,
    on_publish: Option<OnPublishCallback>,
}

/// An MQTT 3.1.1 client.
///
/// The client does nothing on its own: after [`connect`](Client::connect), the application
/// drives it by calling [`run_once`](Client::run_once) or [`run`](Client::run) from a single
/// thread.  Callbacks fire from inside those calls and receive the [`Session`], through which
/// they may issue further operations.
pub struct Client {
    session: Session,
    transport: Option<Box<dyn Transport>>,
    transport_factory: TransportFactory,
    reader: PacketReader,
    writer: PacketWriter,
    events: VecDeque<SessionEvent>,
    callbacks: ClientCallbacks,
    clock: Box<dyn Fn() -> Instant>,
}

impl Client {

    /// Creates a new client with default options and the supplied client id.
    pub fn new(client_id: &str) -> Client {
        Client::new_with_options(ClientOptions::builder(client_id).build())
    }

    /// Creates a new client that connects over TCP.
    pub fn new_with_options(options: ClientOptions) -> Client {
        Client::new_with_transport_factory(options, tcp_transport_factory())
    }

    /// Creates a new client that opens its connections through the supplied factory.
    pub fn new_with_transport_factory(options: ClientOptions, transport_factory: TransportFactory) -> Client {
        Client {
            session: Session::new(options),
            transport: None,
            transport_factory,
            reader: PacketReader::new(),
            writer: PacketWriter::new(),
            events: VecDeque::new(),
            callbacks: ClientCallbacks::default(),
            clock: Box::new(Instant::now),
        }
    }

    /// Sets the callback invoked when the broker answers CONNECT.
    pub fn set_on_connect<F>(&mut self, callback: F) where F: FnMut(&mut Session, ConnectReturnCode, bool) + 'static {
        self.callbacks.on_connect = Some(Box::new(callback));
    }

    /// Sets the callback invoked when a subscription is acknowledged.
    pub fn set_on_subscribe<F>(&mut self, callback: F) where F: FnMut(&mut Session, u16, &[SubackReturnCode]) + 'static {
        self.callbacks.on_subscribe = Some(Box::new(callback));
    }

    /// Sets the callback invoked when an unsubscribe is acknowledged.
    pub fn set_on_unsubscribe<F>(&mut self, callback: F) where F: FnMut(&mut Session, u16) + 'static {
        self.callbacks.on_unsubscribe = Some(Box::new(callback));
    }

    /// Sets the callback invoked for inbound application messages.
    pub fn set_on_message<F>(&mut self, callback: F) where F: FnMut(&mut Session, &PublishPacket) + 'static {
        self.callbacks.on_message = Some(Box::new(callback));
    }

    /// Sets the callback invoked when an outbound QoS 1/2 publish completes.
    pub fn set_on_publish<F>(&mut self, callback: F) where F: FnMut(&mut Session, u16) + 'static {
        self.callbacks.on_publish = Some(Box::new(callback));
    }

    /// Returns the client's session
    pub fn session(&self) -> &Session { &self.session }

    /// Returns the client's session for direct manipulation
    pub fn session_mut(&mut self) -> &mut Session { &mut self.session }

    /// Sets the will message sent with the next CONNECT.  See [`Session::set_will`].
    pub fn set_will(&mut self, topic: &str, payload: &[u8], qos: QualityOfService, retain: bool) -> SchistResult<()> {
        self.session.set_will(topic, payload, qos, retain)
    }

    /// Sets the credentials sent with the next CONNECT.  See [`Session::set_auth`].
    pub fn set_auth(&mut self, username: Option<&str>, password: Option<&[u8]>) -> SchistResult<()> {
        self.session.set_auth(username, password)
    }

    /// See [`Session::set_max_inflight`].
    pub fn set_max_inflight(&mut self, max_inflight: usize) {
        self.session.set_max_inflight(max_inflight);
    }

    /// See [`Session::set_max_queued`].
    pub fn set_max_queued(&mut self, max_queued: usize) {
        self.session.set_max_queued(max_queued);
    }

    /// See [`Session::set_publish_retry_timeout`].
    pub fn set_publish_retry_timeout(&mut self, publish_retry_timeout: Duration) {
        self.session.set_publish_retry_timeout(publish_retry_timeout);
    }

    /// Opens a connection to a broker and queues CONNECT.  Returns without waiting for the
    /// CONNACK; its outcome is reported through the on_connect callback.
    ///
    /// Any existing connection is closed first.
    pub fn connect(&mut self, host: &str, port: u16, keep_alive_seconds: u16, clean_session: bool) -> SchistResult<()> {
        validate_host(host)?;
        let connect = self.session.build_connect_packet(keep_alive_seconds, clean_session)?;

        info!("connect - opening connection to {}:{}", host, port);
        let transport = (self.transport_factory)(host, port)?;

        if !self.writer.is_idle() {
            debug!("connect - abandoning a partially written packet");
        }

        self.close_transport();
        self.transport = Some(transport);
        self.reader.reset();
        self.writer.reset();
        self.events.clear();

        let result = self.session.begin_connect(connect, (self.clock)());
        if result.is_err() {
            self.session.halt();
            self.close_transport();
        }

        result
    }

    /// Queues a DISCONNECT.  The connection closes once it has been written.
    pub fn disconnect(&mut self) -> SchistResult<()> {
        self.session.disconnect()
    }

    /// Returns true once the broker has accepted the connection, until it closes
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Publishes a message.  See [`Session::publish`].
    pub fn publish(&mut self, qos: QualityOfService, retain: bool, topic: &str, payload: &[u8]) -> SchistResult<u16> {
        self.session.publish(qos, retain, topic, payload)
    }

    /// Subscribes to a topic filter.  See [`Session::subscribe`].
    pub fn subscribe(&mut self, topic_filter: &str, qos: QualityOfService) -> SchistResult<u16> {
        self.session.subscribe(topic_filter, qos)
    }

    /// Subscribes to several topic filters at once.  See [`Session::subscribe_many`].
    pub fn subscribe_many(&mut self, subscriptions: &[(&str, QualityOfService)]) -> SchistResult<u16> {
        self.session.subscribe_many(subscriptions)
    }

    /// Unsubscribes from a topic filter.  See [`Session::unsubscribe`].
    pub fn unsubscribe(&mut self, topic_filter: &str) -> SchistResult<u16> {
        self.session.unsubscribe(topic_filter)
    }

    /// Stops delivering inbound messages to on_message.
    pub fn pause(&mut self) {
        self.session.pause();
    }

    /// Resumes delivering inbound messages to on_message.
    pub fn resume(&mut self) {
        self.session.resume();
    }

    /// Performs one iteration of the event loop: retransmits overdue messages, waits for the
    /// transport (at most `timeout`, bounded by the keep alive), writes queued packets, reads and
    /// dispatches at most one inbound packet, and services the keep alive.
    ///
    /// An error stops the session and closes the transport.  Returns `Ok` once a DISCONNECT has
    /// been written.
    pub fn run_once(&mut self, timeout: Option<Duration>) -> SchistResult<()> {
        if !self.session.is_active() || self.transport.is_none() {
            error!("run_once - no active session (state {})", self.session.state());
            return Err(SchistError::new_not_connected());
        }

        let result = self.service(timeout);
        if let Err(error) = &result {
            error!("run_once - stopping session: {}", error);
            self.session.halt();
            self.close_transport();
        }

        result
    }

    /// Runs the event loop until the session stops, returning the first error.
    pub fn run(&mut self) -> SchistResult<()> {
        if !self.session.is_active() {
            error!("run - no active session (state {})", self.session.state());
            return Err(SchistError::new_not_connected());
        }

        while self.session.is_active() {
            self.run_once(None)?;
        }

        Ok(())
    }

    fn service(&mut self, timeout: Option<Duration>) -> SchistResult<()> {
        self.session.service_retries((self.clock)())?;

        let interest = Interest {
            readable: true,
            writable: self.session.has_pending_output(),
        };
        let wait_timeout = self.session.compute_wait_timeout(timeout);

        let readiness = {
            let transport = self.current_transport()?;
            transport.select(interest, wait_timeout)?
        };

        if readiness.writable {
            self.write_pending()?;

            if self.session.state() == SessionState::Disconnected {
                info!("service - disconnect complete, closing transport");
                self.close_transport();
                return Ok(());
            }
        }

        if readiness.readable {
            self.read_incoming()?;
        }

        self.session.service_keep_alive((self.clock)())
    }

    fn current_transport(&mut self) -> SchistResult<&mut Box<dyn Transport>> {
        self.transport.as_mut().ok_or_else(|| SchistError::new_internal_state_error("no transport"))
    }

    fn write_pending(&mut self) -> SchistResult<()> {
        while let Some(packet) = self.session.next_outbound_packet() {
            let Some(transport) = self.transport.as_mut() else {
                return Err(SchistError::new_internal_state_error("no transport"));
            };

            if !self.writer.write_packet(packet, transport.as_mut())? {
                return Ok(());
            }

            self.session.on_packet_written((self.clock)())?;
        }

        Ok(())
    }

    fn read_incoming(&mut self) -> SchistResult<()> {
        let packet = {
            let Some(transport) = self.transport.as_mut() else {
                return Err(SchistError::new_internal_state_error("no transport"));
            };

            self.reader.read_packet(transport.as_mut())?
        };

        let Some(packet) = packet else {
            return Ok(());
        };

        let result = self.session.handle_packet(packet, (self.clock)(), &mut self.events);
        self.dispatch_events();

        result
    }

    fn dispatch_events(&mut self) {
        while let Some(event) = self.events.pop_front() {
            match event {
                SessionEvent::Connack { return_code, session_present } => {
                    if let Some(callback) = self.callbacks.on_connect.as_mut() {
                        callback(&mut self.session, return_code, session_present);
                    }
                }
                SessionEvent::Message(publish) => {
                    if let Some(callback) = self.callbacks.on_message.as_mut() {
                        callback(&mut self.session, &publish);
                    }
                }
                SessionEvent::PublishComplete(packet_id) => {
                    if let Some(callback) = self.callbacks.on_publish.as_mut() {
                        callback(&mut self.session, packet_id);
                    }
                }
                SessionEvent::Suback(suback) => {
                    if let Some(callback) = self.callbacks.on_subscribe.as_mut() {
                        callback(&mut self.session, suback.packet_id, &suback.return_codes);
                    }
                }
                SessionEvent::Unsuback(packet_id) => {
                    if let Some(callback) = self.callbacks.on_unsubscribe.as_mut() {
                        callback(&mut self.session, packet_id);
                    }
                }
            }
        }
    }

    fn close_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(error) = transport.close() {
                warn!("close_transport - error while closing transport: {}", error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    use assert_matches::assert_matches;

    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    const TIMEOUT : Option<Duration> = Some(Duration::from_millis(10));

    struct TestContext {
        client: Client,
        factory: MockTransportFactory,
        now: Rc<Cell<Instant>>,
    }

    impl TestContext {
        fn new(options: ClientOptions) -> TestContext {
            let factory = MockTransportFactory::new();
            let mut client = Client::new_with_transport_factory(options, factory.create_factory());

            let now = Rc::new(Cell::new(Instant::now()));
            let clock = now.clone();
            client.clock = Box::new(move || clock.get());

            TestContext {
                client,
                factory,
                now,
            }
        }

        fn advance(&self, duration: Duration) {
            self.now.set(self.now.get() + duration);
        }

        fn broker(&self) -> MockTransportHandle {
            self.factory.latest()
        }

        fn connect(&mut self, keep_alive_seconds: u16) {
            self.client.connect("broker.example", 1883, keep_alive_seconds, true).unwrap();
            self.client.run_once(TIMEOUT).unwrap();
            assert_matches!(&self.broker().take_written_packets()[..], [MqttPacket::Connect(_)]);

            self.broker().push_packet(&connack(false, ConnectReturnCode::Accepted));
            self.client.run_once(TIMEOUT).unwrap();
            assert!(self.client.is_connected());
        }
    }

    #[test]
    fn connect_queues_connect_and_waits_for_connack() {
        let mut context = TestContext::new(ClientOptions::builder("client-1").build());

        context.client.connect("broker.example", 1883, 30, true).unwrap();
        assert_eq!(1, context.factory.connection_count());
        assert_eq!(SessionState::PendingConnack, context.client.session().state());
        assert!(!context.client.is_connected());

        context.client.run_once(TIMEOUT).unwrap();

        let bytes = context.broker().written_bytes();
        assert_eq!(0x10, bytes[0]);
        assert_eq!(0x02, bytes[9]);

        assert_matches!(&context.broker().take_written_packets()[..], [MqttPacket::Connect(connect)] => {
            assert_eq!("client-1", connect.client_id);
            assert_eq!(30, connect.keep_alive_interval_seconds);
            assert!(connect.clean_session);
        });
        assert_eq!(SessionState::PendingConnack, context.client.session().state());
    }

    #[test]
    fn connect_argument_failures_open_nothing() {
        let mut context = TestContext::new(ClientOptions::builder("").build());

        assert_matches!(context.client.connect("", 1883, 30, true), Err(SchistError::InvalidArgument(_)));
        assert_matches!(context.client.connect("broker.example", 1883, 30, false), Err(SchistError::PacketValidation(_)));
        assert_eq!(0, context.factory.connection_count());
        assert_eq!(SessionState::Disconnected, context.client.session().state());
    }

    #[test]
    fn run_once_without_connection() {
        let mut client = Client::new("idle");

        assert_matches!(client.run_once(TIMEOUT), Err(SchistError::NotConnected(_)));
        assert_matches!(client.run(), Err(SchistError::NotConnected(_)));
    }

    #[test]
    fn on_connect_reports_connack() {
        let mut context = TestContext::new(ClientOptions::builder("client").build());
        let results = Rc::new(RefCell::new(Vec::new()));
        let results_clone = results.clone();
        context.client.set_on_connect(move |_, return_code, session_present| {
            results_clone.borrow_mut().push((return_code, session_present));
        });

        context.client.connect("broker.example", 1883, 0, false).unwrap();
        context.broker().push_packet(&connack(true, ConnectReturnCode::Accepted));
        context.client.run_once(TIMEOUT).unwrap();

        assert_eq!(vec![(ConnectReturnCode::Accepted, true)], *results.borrow());
        assert!(context.client.is_connected());
    }

    #[test]
    fn rejected_connection_stops_session() {
        let mut context = TestContext::new(ClientOptions::builder("client").build());
        let results = Rc::new(RefCell::new(Vec::new()));
        let results_clone = results.clone();
        context.client.set_on_connect(move |_, return_code, _| {
            results_clone.borrow_mut().push(return_code);
        });

        context.client.connect("broker.example", 1883, 0, true).unwrap();
        context.broker().push_packet(&connack(false, ConnectReturnCode::BadUsernameOrPassword));

        assert_matches!(context.client.run_once(TIMEOUT), Err(SchistError::ConnectionRejected(rejection)) => {
            assert_eq!(ConnectReturnCode::BadUsernameOrPassword, rejection.return_code);
        });
        assert_eq!(vec![ConnectReturnCode::BadUsernameOrPassword], *results.borrow());
        assert_eq!(SessionState::Halted, context.client.session().state());
        assert!(context.broker().is_closed());
    }

    #[test]
    fn qos1_publish_completes_on_puback() {
        let mut context = TestContext::new(ClientOptions::builder("client").build());
        let completed = Rc::new(RefCell::new(Vec::new()));
        let completed_clone = completed.clone();
        context.client.set_on_publish(move |_, packet_id| {
            completed_clone.borrow_mut().push(packet_id);
        });

        context.connect(0);

        assert_eq!(1, context.client.publish(QualityOfService::AtLeastOnce, false, "t", "hello".as_bytes()).unwrap());
        context.client.run_once(TIMEOUT).unwrap();

        let bytes = context.broker().written_bytes();
        assert_eq!(0x32, bytes[0]);
        assert_eq!(vec![MqttPacket::Publish(PublishPacket {
            packet_id: 1,
            topic: "t".to_string(),
            qos: QualityOfService::AtLeastOnce,
            payload: "hello".as_bytes().to_vec(),
            ..Default::default()
        })], context.broker().take_written_packets());
        assert_eq!(1, context.client.session().outbound_message_count());

        context.broker().push_packet(&puback(1));
        context.client.run_once(TIMEOUT).unwrap();

        assert_eq!(0, context.client.session().outbound_message_count());
        assert_eq!(vec![1u16], *completed.borrow());

        context.client.disconnect().unwrap();
        context.client.run_once(TIMEOUT).unwrap();

        assert_eq!(vec![MqttPacket::Disconnect(DisconnectPacket {})], context.broker().take_written_packets());
        assert!(context.broker().is_closed());
        assert_eq!(SessionState::Disconnected, context.client.session().state());
        assert_matches!(context.client.run_once(TIMEOUT), Err(SchistError::NotConnected(_)));
    }

    #[test]
    fn callbacks_drive_further_operations() {
        let mut context = TestContext::new(ClientOptions::builder("client").build());
        let granted = Rc::new(RefCell::new(Vec::new()));
        let messages = Rc::new(RefCell::new(Vec::new()));

        context.client.set_on_connect(|session, _, _| {
            session.subscribe_many(&[("sensors/#", QualityOfService::ExactlyOnce), ("alerts", QualityOfService::AtMostOnce)]).unwrap();
        });

        let granted_clone = granted.clone();
        context.client.set_on_subscribe(move |_, packet_id, return_codes| {
            granted_clone.borrow_mut().push((packet_id, return_codes.to_vec()));
        });

        let messages_clone = messages.clone();
        context.client.set_on_message(move |session, publish| {
            messages_clone.borrow_mut().push((publish.topic().to_string(), publish.payload().to_vec()));
            session.unsubscribe("alerts").unwrap();
        });

        let unsubscribed = Rc::new(Cell::new(0u16));
        let unsubscribed_clone = unsubscribed.clone();
        context.client.set_on_unsubscribe(move |session, packet_id| {
            unsubscribed_clone.set(packet_id);
            session.disconnect().unwrap();
        });

        context.connect(0);
        context.client.run_once(TIMEOUT).unwrap();
        assert_matches!(&context.broker().take_written_packets()[..], [MqttPacket::Subscribe(subscribe)] => {
            assert_eq!(1, subscribe.packet_id);
            assert_eq!(2, subscribe.subscriptions.len());
        });

        context.broker().push_packet(&suback(1, vec![SubackReturnCode::GrantedQos2, SubackReturnCode::GrantedQos0]));
        context.client.run_once(TIMEOUT).unwrap();
        assert_eq!(vec![(1u16, vec![SubackReturnCode::GrantedQos2, SubackReturnCode::GrantedQos0])], *granted.borrow());

        context.broker().push_packet(&inbound_publish(0, "sensors/temp", QualityOfService::AtMostOnce, false, "21".as_bytes()));
        context.client.run_once(TIMEOUT).unwrap();
        assert_eq!(vec![("sensors/temp".to_string(), "21".as_bytes().to_vec())], *messages.borrow());

        context.client.run_once(TIMEOUT).unwrap();
        assert_matches!(&context.broker().take_written_packets()[..], [MqttPacket::Unsubscribe(unsubscribe)] => {
            assert_eq!(2, unsubscribe.packet_id);
        });

        context.broker().push_packet(&unsuback(2));
        context.client.run_once(TIMEOUT).unwrap();
        assert_eq!(2, unsubscribed.get());

        context.client.run().unwrap();
        assert_eq!(vec![MqttPacket::Disconnect(DisconnectPacket {})], context.broker().take_written_packets());
        assert!(context.broker().is_closed());
    }

    #[test]
    fn inbound_qos2_handshake_over_transport() {
        let mut context = TestContext::new(ClientOptions::builder("client").build());
        let count = Rc::new(Cell::new(0));
        let count_clone = count.clone();
        context.client.set_on_message(move |_, _| {
            count_clone.set(count_clone.get() + 1);
        });

        context.connect(0);

        let publish = inbound_publish(12, "q2", QualityOfService::ExactlyOnce, false, &[9]);
        let redelivery = inbound_publish(12, "q2", QualityOfService::ExactlyOnce, true, &[9]);
        context.broker().push_packet(&publish);
        context.broker().push_packet(&redelivery);

        // one inbound packet per iteration
        context.client.run_once(TIMEOUT).unwrap();
        context.client.run_once(TIMEOUT).unwrap();
        context.client.run_once(TIMEOUT).unwrap();
        assert_eq!(vec![pubrec(12), pubrec(12)], context.broker().take_written_packets());
        assert_eq!(1, count.get());

        context.broker().push_packet(&pubrel(12));
        context.client.run_once(TIMEOUT).unwrap();
        context.client.run_once(TIMEOUT).unwrap();
        assert_eq!(vec![pubcomp(12)], context.broker().take_written_packets());
    }

    #[test]
    fn partial_reads_and_writes() {
        let mut context = TestContext::new(ClientOptions::builder("client").build());
        let received = Rc::new(RefCell::new(Vec::new()));
        let received_clone = received.clone();
        context.client.set_on_message(move |_, publish| {
            received_clone.borrow_mut().push(publish.payload().to_vec());
        });

        context.connect(0);

        let broker = context.broker();
        broker.set_write_chunk_size(3);
        broker.set_interleave_write_would_block(true);
        broker.set_read_chunk_size(2);
        broker.set_interleave_read_would_block(true);

        let payload : Vec<u8> = (0..200u8).collect();
        context.client.publish(QualityOfService::AtLeastOnce, false, "big/payload", &payload).unwrap();
        broker.push_packet(&inbound_publish(0, "in", QualityOfService::AtMostOnce, false, &payload));

        for _ in 0..500 {
            context.client.run_once(TIMEOUT).unwrap();
        }

        assert_matches!(&broker.take_written_packets()[..], [MqttPacket::Publish(publish)] => {
            assert_eq!(payload, publish.payload);
        });
        assert_eq!(vec![payload], *received.borrow());
    }

    #[test]
    fn keep_alive_ping_then_timeout() {
        let mut context = TestContext::new(ClientOptions::builder("client").build());
        context.connect(1);

        context.client.run_once(None).unwrap();
        let selects = context.broker().select_calls();
        assert_eq!(Duration::from_secs(1), selects.last().unwrap().1);
        assert!(context.broker().take_written_packets().is_empty());

        context.advance(Duration::from_secs(1));
        context.client.run_once(None).unwrap();
        context.client.run_once(None).unwrap();
        assert_eq!(vec![MqttPacket::Pingreq(PingreqPacket {})], context.broker().take_written_packets());

        context.broker().push_packet(&MqttPacket::Pingresp(PingrespPacket {}));
        context.client.run_once(None).unwrap();

        context.advance(Duration::from_secs(1));
        context.client.run_once(None).unwrap();
        context.client.run_once(None).unwrap();
        assert_eq!(vec![MqttPacket::Pingreq(PingreqPacket {})], context.broker().take_written_packets());

        context.advance(Duration::from_secs(1));
        assert_matches!(context.client.run_once(None), Err(SchistError::PingTimeout(_)));
        assert!(context.broker().is_closed());
        assert_eq!(SessionState::Halted, context.client.session().state());
    }

    #[test]
    fn unanswered_connect_stops_session() {
        let mut context = TestContext::new(ClientOptions::builder("client").build());
        context.client.connect("broker.example", 1883, 1, true).unwrap();
        context.client.run_once(None).unwrap();
        assert_matches!(&context.broker().take_written_packets()[..], [MqttPacket::Connect(_)]);

        context.client.run_once(None).unwrap();
        assert_eq!(SessionState::PendingConnack, context.client.session().state());

        context.advance(Duration::from_secs(1));
        assert_matches!(context.client.run_once(None), Err(SchistError::ConnackTimeout(_)));
        assert!(context.broker().take_written_packets().is_empty());
        assert!(context.broker().is_closed());
        assert_eq!(SessionState::Halted, context.client.session().state());
        assert_matches!(context.client.run_once(None), Err(SchistError::NotConnected(_)));
    }

    #[test]
    fn protocol_error_stops_session() {
        let mut context = TestContext::new(ClientOptions::builder("client").build());
        context.connect(0);

        context.broker().push_packet(&puback(42));
        assert_matches!(context.client.run_once(TIMEOUT), Err(SchistError::ProtocolError(_)));
        assert!(context.broker().is_closed());
        assert!(!context.client.is_connected());
    }

    #[test]
    fn malformed_input_stops_session() {
        let mut context = TestContext::new(ClientOptions::builder("client").build());
        context.connect(0);

        context.broker().push_bytes(&[0x41, 0x02, 0x00, 0x01]);
        assert_matches!(context.client.run_once(TIMEOUT), Err(SchistError::DecodingFailure(_)));
        assert!(context.broker().is_closed());
    }

    #[test]
    fn transport_failures_stop_session() {
        let mut context = TestContext::new(ClientOptions::builder("client").build());
        context.connect(0);

        context.broker().close_from_peer();
        assert_matches!(context.client.run(), Err(SchistError::ConnectionClosed(_)));
        assert_eq!(SessionState::Halted, context.client.session().state());

        context.connect(0);
        context.broker().inject_read_error(std::io::ErrorKind::ConnectionReset);
        assert_matches!(context.client.run_once(TIMEOUT), Err(SchistError::StdIoError(_)));
        assert_eq!(2, context.factory.connection_count());
    }

    #[test]
    fn reconnect_replaces_transport() {
        let mut context = TestContext::new(ClientOptions::builder("client").build());
        context.connect(0);
        let first = context.broker();

        context.client.publish(QualityOfService::AtLeastOnce, false, "t", &[]).unwrap();
        context.client.connect("broker.example", 1883, 0, true).unwrap();

        assert!(first.is_closed());
        assert_eq!(2, context.factory.connection_count());
        assert_eq!(0, context.client.session().outbound_message_count());

        context.client.run_once(TIMEOUT).unwrap();
        assert_matches!(&context.broker().take_written_packets()[..], [MqttPacket::Connect(_)]);
    }

    #[test]
    fn paused_client_still_acknowledges() {
        let mut context = TestContext::new(ClientOptions::builder("client").build());
        let count = Rc::new(Cell::new(0));
        let count_clone = count.clone();
        context.client.set_on_message(move |_, _| {
            count_clone.set(count_clone.get() + 1);
        });

        context.connect(0);
        context.client.pause();

        context.broker().push_packet(&inbound_publish(3, "t", QualityOfService::AtLeastOnce, false, &[]));
        context.client.run_once(TIMEOUT).unwrap();
        context.client.run_once(TIMEOUT).unwrap();

        assert_eq!(0, count.get());
        assert_eq!(vec![puback(3)], context.broker().take_written_packets());

        context.client.resume();
        context.broker().push_packet(&inbound_publish(0, "t", QualityOfService::AtMostOnce, false, &[]));
        context.client.run_once(TIMEOUT).unwrap();
        assert_eq!(1, count.get());
    }

    #[test]
    fn configuration_setters_apply_to_session() {
        let mut context = TestContext::new(ClientOptions::builder("client").build());
        context.client.set_will("status/client", "offline".as_bytes(), QualityOfService::AtLeastOnce, true).unwrap();
        context.client.set_auth(Some("user"), Some("pw".as_bytes())).unwrap();
        context.client.set_max_inflight(1);
        context.client.set_max_queued(1);
        context.client.set_publish_retry_timeout(Duration::from_secs(1));

        context.connect(0);
        assert_matches!(context.client.set_auth(None, None), Err(SchistError::InvalidArgument(_)));

        context.client.publish(QualityOfService::AtLeastOnce, false, "t", &[1]).unwrap();
        context.client.publish(QualityOfService::AtLeastOnce, false, "t", &[2]).unwrap();
        assert_matches!(context.client.publish(QualityOfService::AtLeastOnce, false, "t", &[3]), Err(SchistError::QueueFull(_)));

        context.client.run_once(TIMEOUT).unwrap();
        assert_eq!(1, context.broker().take_written_packets().len());

        context.advance(Duration::from_secs(1));
        context.client.run_once(TIMEOUT).unwrap();
        assert_matches!(&context.broker().take_written_packets()[..], [MqttPacket::Publish(publish)] => {
            assert_eq!(1, publish.packet_id);
            assert!(publish.duplicate);
        });
    }
}
