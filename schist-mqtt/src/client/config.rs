/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Module containing types for configuring an MQTT client.
 */

use crate::mqtt::*;

use std::time::Duration;

pub(crate) const DEFAULT_MAX_INFLIGHT : usize = 20;
pub(crate) const DEFAULT_MAX_QUEUED : usize = 0;
pub(crate) const DEFAULT_PUBLISH_RETRY_TIMEOUT : Duration = Duration::from_secs(20);

/// Controls what happens to unacknowledged QoS 1 and QoS 2 messages when the client connects
/// again after losing a connection.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
#[non_exhaustive]
pub enum RedeliveryPolicy {

    /// Every (re)connect starts with empty message collections.  Messages that were not fully
    /// acknowledged are lost.
    #[default]
    DropOnReconnect,

    /// When connecting with `clean_session` set to false, unacknowledged outbound messages are
    /// sent again (with the duplicate flag where they had been sent before), pending PUBRELs are
    /// re-sent, and inbound QoS 2 state is kept so that redelivered messages are not reported
    /// twice.  Connecting with a clean session behaves like `DropOnReconnect`.
    RedeliverOnReconnect,
}

/// A message the broker publishes on the client's behalf if the client disappears without
/// sending DISCONNECT.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Will {
    pub(crate) topic: String,
    pub(crate) payload: Vec<u8>,
    pub(crate) qos: QualityOfService,
    pub(crate) retain: bool,
}

impl Will {

    /// Creates a new will message
    pub fn new(topic: &str, payload: &[u8], qos: QualityOfService, retain: bool) -> Self {
        Will {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            qos,
            retain,
        }
    }

    /// Returns the topic the will is published to
    pub fn topic(&self) -> &str { self.topic.as_str() }

    /// Returns the will message body
    pub fn payload(&self) -> &[u8] { self.payload.as_slice() }

    /// Returns the quality of service the will is published with
    pub fn qos(&self) -> QualityOfService { self.qos }

    /// Returns whether the broker retains the will
    pub fn retain(&self) -> bool { self.retain }

    pub(crate) fn to_publish_packet(&self) -> PublishPacket {
        PublishPacket {
            topic: self.topic.clone(),
            qos: self.qos,
            retain: self.retain,
            payload: self.payload.clone(),
            ..Default::default()
        }
    }
}

/// Client identity and behavioral configuration
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub(crate) client_id: String,
    pub(crate) will: Option<Will>,
    pub(crate) username: Option<String>,
    pub(crate) password: Option<Vec<u8>>,
    pub(crate) max_inflight: usize,
    pub(crate) max_queued: usize,
    pub(crate) publish_retry_timeout: Duration,
    pub(crate) redelivery_policy: RedeliveryPolicy,
}

impl ClientOptions {

    /// Creates a builder for client options, starting from the supplied client id
    pub fn builder(client_id: &str) -> ClientOptionsBuilder {
        ClientOptionsBuilder::new(client_id)
    }

    /// Returns the client id the client identifies itself with
    pub fn client_id(&self) -> &str { self.client_id.as_str() }
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            client_id: String::new(),
            will: None,
            username: None,
            password: None,
            max_inflight: DEFAULT_MAX_INFLIGHT,
            max_queued: DEFAULT_MAX_QUEUED,
            publish_retry_timeout: DEFAULT_PUBLISH_RETRY_TIMEOUT,
            redelivery_policy: RedeliveryPolicy::default(),
        }
    }
}

/// A builder for [`ClientOptions`]
#[derive(Debug, Default)]
pub struct ClientOptionsBuilder {
    options: ClientOptions
}

impl ClientOptionsBuilder {

    /// Creates a new builder object for ClientOptions.  An empty client id asks the broker to
    /// assign one, which MQTT 3.1.1 only permits together with a clean session.
    pub fn new(client_id: &str) -> Self {
        ClientOptionsBuilder {
            options: ClientOptions {
                client_id: client_id.to_string(),
                ..Default::default()
            }
        }
    }

    /// Sets the message the broker should publish if the client disconnects uncleanly.
    pub fn with_will(&mut self, will: Will) -> &mut Self {
        self.options.will = Some(will);
        self
    }

    /// Sets the username sent in CONNECT.
    pub fn with_username(&mut self, username: &str) -> &mut Self {
        self.options.username = Some(username.to_string());
        self
    }

    /// Sets the password sent in CONNECT.  MQTT 3.1.1 requires a username whenever a password
    /// is present.
    pub fn with_password(&mut self, password: &[u8]) -> &mut Self {
        self.options.password = Some(password.to_vec());
        self
    }

    /// Sets how many outbound QoS 1/2 messages may be awaiting acknowledgement at once.  Further
    /// messages wait in the queue.  Zero means no limit.  Defaults to 20.
    pub fn with_max_inflight(&mut self, max_inflight: usize) -> &mut Self {
        self.options.max_inflight = max_inflight;
        self
    }

    /// Sets how many outbound QoS 1/2 messages may wait for an inflight slot.  Publishing past
    /// this limit fails with `QueueFull`.  Zero means no limit, which is the default.
    pub fn with_max_queued(&mut self, max_queued: usize) -> &mut Self {
        self.options.max_queued = max_queued;
        self
    }

    /// Sets how long the client waits for an acknowledgement before retransmitting.  Defaults
    /// to twenty seconds.
    pub fn with_publish_retry_timeout(&mut self, publish_retry_timeout: Duration) -> &mut Self {
        self.options.publish_retry_timeout = publish_retry_timeout;
        self
    }

    /// Sets what happens to unacknowledged messages across reconnects.
    pub fn with_redelivery_policy(&mut self, redelivery_policy: RedeliveryPolicy) -> &mut Self {
        self.options.redelivery_policy = redelivery_policy;
        self
    }

    /// Builds a new set of client options
    pub fn build(&self) -> ClientOptions {
        self.options.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let options = ClientOptions::builder("client").build();

        assert_eq!("client", options.client_id());
        assert!(options.will.is_none());
        assert!(options.username.is_none());
        assert!(options.password.is_none());
        assert_eq!(20, options.max_inflight);
        assert_eq!(0, options.max_queued);
        assert_eq!(Duration::from_secs(20), options.publish_retry_timeout);
        assert_eq!(RedeliveryPolicy::DropOnReconnect, options.redelivery_policy);
    }

    #[test]
    fn builder_overrides() {
        let options = ClientOptionsBuilder::new("c")
            .with_will(Will::new("last/words", "bye".as_bytes(), QualityOfService::AtLeastOnce, true))
            .with_username("user")
            .with_password("secret".as_bytes())
            .with_max_inflight(1)
            .with_max_queued(5)
            .with_publish_retry_timeout(Duration::from_millis(500))
            .with_redelivery_policy(RedeliveryPolicy::RedeliverOnReconnect)
            .build();

        let will = options.will.as_ref().unwrap();
        assert_eq!("last/words", will.topic());
        assert_eq!("bye".as_bytes(), will.payload());
        assert_eq!(QualityOfService::AtLeastOnce, will.qos());
        assert!(will.retain());

        assert_eq!(Some("user".to_string()), options.username);
        assert_eq!(Some("secret".as_bytes().to_vec()), options.password);
        assert_eq!(1, options.max_inflight);
        assert_eq!(5, options.max_queued);
        assert_eq!(Duration::from_millis(500), options.publish_retry_timeout);
        assert_eq!(RedeliveryPolicy::RedeliverOnReconnect, options.redelivery_policy);
    }

    #[test]
    fn will_to_publish_packet() {
        let packet = Will::new("w", &[1, 2], QualityOfService::ExactlyOnce, false).to_publish_packet();
        assert_eq!("w", packet.topic);
        assert_eq!(vec![1u8, 2], packet.payload);
        assert_eq!(QualityOfService::ExactlyOnce, packet.qos);
        assert_eq!(0, packet.packet_id);
    }
}
