/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Module containing a set of structured data types that model the MQTT 3.1.1 specification.
 */

use std::fmt;
use crate::error::SchistError;

pub(crate) mod connack;
pub(crate) mod connect;
pub(crate) mod disconnect;
pub(crate) mod pingreq;
pub(crate) mod pingresp;
pub(crate) mod puback;
pub(crate) mod pubcomp;
pub(crate) mod publish;
pub(crate) mod pubrec;
pub(crate) mod pubrel;
pub(crate) mod suback;
pub(crate) mod subscribe;
pub(crate) mod unsuback;
pub(crate) mod unsubscribe;
pub mod utils;

/// MQTT message delivery quality of service.
///
/// Enum values match [MQTT 3.1.1 spec](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718099) encoding values.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum QualityOfService {

    /// The message is delivered according to the capabilities of the underlying network. No response is sent by the
    /// receiver and no retry is performed by the sender. The message arrives at the receiver either once or not at all.
    #[default]
    AtMostOnce = 0,

    /// A level of service that ensures that the message arrives at the receiver at least once.
    AtLeastOnce = 1,

    /// A level of service that ensures that the message arrives at the receiver exactly once.
    ExactlyOnce = 2,
}

impl TryFrom<u8> for QualityOfService {
    type Error = SchistError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        utils::convert_u8_to_quality_of_service(value)
    }
}

/// Broker return code for connection attempts.
///
/// Enum values match [MQTT 3.1.1 spec](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718035) encoding values.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ConnectReturnCode {

    /// Returned when the connection is accepted.
    #[default]
    Accepted = 0,

    /// The broker does not support the level of the MQTT protocol requested by the client.
    UnacceptableProtocolVersion = 1,

    /// The client identifier is correct UTF-8 but not allowed by the broker.
    IdentifierRejected = 2,

    /// The network connection has been made but the MQTT service is unavailable.
    ServerUnavailable = 3,

    /// The data in the user name or password is malformed.
    BadUsernameOrPassword = 4,

    /// The client is not authorized to connect.
    NotAuthorized = 5,
}

impl ConnectReturnCode {
    /// Returns whether or not the return code represents a successful connect
    pub fn is_success(&self) -> bool {
        matches!(self, ConnectReturnCode::Accepted)
    }
}

impl fmt::Display for ConnectReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", utils::connect_return_code_to_str(*self))
    }
}

/// Per-filter result inside a SUBACK packet.
///
/// Enum values match [MQTT 3.1.1 spec](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718071) encoding values.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SubackReturnCode {

    /// The subscription was accepted and the maximum quality of service sent will be QoS 0.
    #[default]
    GrantedQos0 = 0,

    /// The subscription was accepted and the maximum quality of service sent will be QoS 1.
    GrantedQos1 = 1,

    /// The subscription was accepted and the maximum quality of service sent will be QoS 2.
    GrantedQos2 = 2,

    /// The subscription was rejected.
    Failure = 128,
}

impl SubackReturnCode {
    /// Returns whether or not the return code represents a successful subscription
    pub fn is_success(&self) -> bool {
        !matches!(self, SubackReturnCode::Failure)
    }

    /// Returns the quality of service granted by the broker, if the subscription was accepted.
    pub fn granted_qos(&self) -> Option<QualityOfService> {
        match self {
            SubackReturnCode::GrantedQos0 => { Some(QualityOfService::AtMostOnce) }
            SubackReturnCode::GrantedQos1 => { Some(QualityOfService::AtLeastOnce) }
            SubackReturnCode::GrantedQos2 => { Some(QualityOfService::ExactlyOnce) }
            SubackReturnCode::Failure => { None }
        }
    }
}

/// Specifies a single subscription within a Subscribe operation
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Subscription {
    pub(crate) topic_filter: String,
    pub(crate) qos: QualityOfService,
}

impl Subscription {

    /// Creates a new subscription to a topic filter at the requested quality of service
    pub fn new(topic_filter: &str, qos: QualityOfService) -> Self {
        Subscription {
            topic_filter: topic_filter.to_string(),
            qos,
        }
    }

    /// Returns the topic filter to subscribe to
    pub fn topic_filter(&self) -> &str { self.topic_filter.as_str() }

    /// Returns the maximum QoS on which the subscriber will accept publish messages
    pub fn qos(&self) -> QualityOfService { self.qos }
}

/// Data model of an [MQTT 3.1.1 CONNACK](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718033) packet.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConnackPacket {
    pub(crate) session_present: bool,
    pub(crate) return_code: ConnectReturnCode,
}

impl ConnackPacket {

    /// Returns true if the broker resumed an existing session.
    pub fn session_present(&self) -> bool { self.session_present }

    /// Returns the broker's verdict on the connection attempt.
    pub fn return_code(&self) -> ConnectReturnCode { self.return_code }
}

/// Data model of an [MQTT 3.1.1 CONNECT](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718028) packet.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct ConnectPacket {
    pub(crate) keep_alive_interval_seconds: u16,
    pub(crate) clean_session: bool,
    pub(crate) client_id: String,
    pub(crate) username: Option<String>,
    pub(crate) password: Option<Vec<u8>>,
    pub(crate) will: Option<PublishPacket>,
}

/// Data model of an [MQTT 3.1.1 DISCONNECT](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718090) packet.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct DisconnectPacket {}

/// Data model of an [MQTT 3.1.1 PINGREQ](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718081) packet.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct PingreqPacket {}

/// Data model of an [MQTT 3.1.1 PINGRESP](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718086) packet.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct PingrespPacket {}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct PubackPacket {
    pub(crate) packet_id: u16,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct PubrecPacket {
    pub(crate) packet_id: u16,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct PubrelPacket {
    pub(crate) packet_id: u16,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct PubcompPacket {
    pub(crate) packet_id: u16,
}

/// Data model of an [MQTT 3.1.1 PUBLISH](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718037) packet
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PublishPacket {
    pub(crate) packet_id: u16,
    pub(crate) topic: String,
    pub(crate) qos: QualityOfService,
    pub(crate) duplicate: bool,
    pub(crate) retain: bool,
    pub(crate) payload: Vec<u8>,
}

impl PublishPacket {

    /// Returns the packet id of the publish.  Zero for QoS 0 messages.
    pub fn packet_id(&self) -> u16 { self.packet_id }

    /// Returns the topic the message was published to.
    pub fn topic(&self) -> &str { self.topic.as_str() }

    /// Returns the delivery quality of service of the message.
    pub fn qos(&self) -> QualityOfService { self.qos }

    /// Returns true if the sender flagged this PUBLISH as a possible redelivery.
    pub fn duplicate(&self) -> bool { self.duplicate }

    /// Returns true if the message is (or should be) retained by the broker.
    pub fn retain(&self) -> bool { self.retain }

    /// Returns the message payload.
    pub fn payload(&self) -> &[u8] { self.payload.as_slice() }
}

/// Data model of an [MQTT 3.1.1 SUBACK](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718068) packet.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SubackPacket {
    pub(crate) packet_id: u16,
    pub(crate) return_codes: Vec<SubackReturnCode>,
}

impl SubackPacket {

    /// Returns the packet id of the SUBSCRIBE this packet acknowledges.
    pub fn packet_id(&self) -> u16 { self.packet_id }

    /// Returns one result per filter, in the order the filters appeared in the SUBSCRIBE.
    pub fn return_codes(&self) -> &[SubackReturnCode] { self.return_codes.as_slice() }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct SubscribePacket {
    pub(crate) packet_id: u16,
    pub(crate) subscriptions: Vec<Subscription>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct UnsubackPacket {
    pub(crate) packet_id: u16,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct UnsubscribePacket {
    pub(crate) packet_id: u16,
    pub(crate) topic_filters: Vec<String>,
}

/// Algebraic union of all MQTT 3.1.1 packet types.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum MqttPacket {
    Connect(ConnectPacket),
    Connack(ConnackPacket),
    Publish(PublishPacket),
    Puback(PubackPacket),
    Pubrec(PubrecPacket),
    Pubrel(PubrelPacket),
    Pubcomp(PubcompPacket),
    Subscribe(SubscribePacket),
    Suback(SubackPacket),
    Unsubscribe(UnsubscribePacket),
    Unsuback(UnsubackPacket),
    Pingreq(PingreqPacket),
    Pingresp(PingrespPacket),
    Disconnect(DisconnectPacket),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
/// An enum indicating the kind of MQTT packet
pub enum PacketType {
    /// A [Connect](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718028) packet
    Connect,

    /// A [Connack](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718033) packet
    Connack,

    /// A [Publish](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718037) packet
    Publish,

    /// A [Puback](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718043) packet
    Puback,

    /// A [Pubrec](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718048) packet
    Pubrec,

    /// A [Pubrel](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718053) packet
    Pubrel,

    /// A [Pubcomp](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718058) packet
    Pubcomp,

    /// A [Subscribe](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718063) packet
    Subscribe,

    /// A [Suback](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718068) packet
    Suback,

    /// An [Unsubscribe](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718072) packet
    Unsubscribe,

    /// An [Unsuback](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718077) packet
    Unsuback,

    /// A [Pingreq](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718081) packet
    Pingreq,

    /// A [Pingresp](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718086) packet
    Pingresp,

    /// A [Disconnect](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718090) packet
    Disconnect,
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketType::Connect => { write!(f, "ConnectPacket") }
            PacketType::Connack => { write!(f, "ConnackPacket") }
            PacketType::Publish => { write!(f, "PublishPacket") }
            PacketType::Puback => { write!(f, "PubackPacket") }
            PacketType::Pubrec => { write!(f, "PubrecPacket") }
            PacketType::Pubrel => { write!(f, "PubrelPacket") }
            PacketType::Pubcomp => { write!(f, "PubcompPacket") }
            PacketType::Subscribe => { write!(f, "SubscribePacket") }
            PacketType::Suback => { write!(f, "SubackPacket") }
            PacketType::Unsubscribe => { write!(f, "UnsubscribePacket") }
            PacketType::Unsuback => { write!(f, "UnsubackPacket") }
            PacketType::Pingreq => { write!(f, "PingreqPacket") }
            PacketType::Pingresp => { write!(f, "PingrespPacket") }
            PacketType::Disconnect => { write!(f, "DisconnectPacket") }
        }
    }
}
