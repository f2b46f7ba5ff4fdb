/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
A single-threaded, non-blocking MQTT 3.1.1 client.

The crate is a protocol engine: it encodes and decodes control packets, moves them over a
non-blocking [`Transport`](transport::Transport) one packet at a time, and tracks every QoS 1 and
QoS 2 message through its acknowledgement handshake, with retransmission, inflight limits and
queueing.  The application drives it from one thread by calling
[`Client::run_once`](client::Client::run_once) or [`Client::run`](client::Client::run);
callbacks fire from inside those calls.

```no_run
use schist_mqtt::client::Client;
use schist_mqtt::QualityOfService;

let mut client = Client::new("sensor-7");
client.set_on_connect(|session, return_code, _| {
    if return_code.is_success() {
        let _ = session.publish(QualityOfService::AtLeastOnce, false, "sensors/7/temp", b"21.5");
    }
});
client.set_on_publish(|session, _| {
    let _ = session.disconnect();
});

client.connect("localhost", 1883, 30, true)?;
client.run()?;
# Ok::<(), schist_mqtt::error::SchistError>(())
```
 */

pub mod client;
mod decode;
mod encode;
pub mod error;
mod logging;
mod message;
pub mod mqtt;
pub mod session;
mod stream;
pub mod transport;
mod validate;

#[cfg(test)]
mod testing;

/* Re-export packet model types at the root level */
pub use mqtt::QualityOfService;
pub use mqtt::ConnectReturnCode;
pub use mqtt::SubackReturnCode;
pub use mqtt::Subscription;
pub use mqtt::PacketType;
pub use mqtt::ConnackPacket;
pub use mqtt::PublishPacket;
pub use mqtt::SubackPacket;

pub use message::{MessageDirection, MessageState};

pub use client::Client;
pub use client::config::{ClientOptions, ClientOptionsBuilder, RedeliveryPolicy, Will};
pub use error::{SchistError, SchistResult};
pub use session::{Session, SessionState};
