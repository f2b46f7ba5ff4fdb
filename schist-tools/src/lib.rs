/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Pieces shared by the schist command-line tools: endpoint parsing, argument parsing helpers and
logger setup.
 */

use schist_mqtt::{PublishPacket, QualityOfService};
use simplelog::*;
use url::Url;

use std::error::Error;
use std::fs::File;
use std::path::Path;

/// Broker used when no endpoint is given on the command line
pub const DEFAULT_ENDPOINT : &str = "mqtt://test.mosquitto.org:1883";

/// Keep alive the tools connect with
pub const DEFAULT_KEEP_ALIVE_SECONDS : u16 = 60;

const DEFAULT_MQTT_PORT : u16 = 1883;

/// Host and port of a broker
#[derive(Debug, Eq, PartialEq)]
pub struct Endpoint {

    /// broker host name or address
    pub host: String,

    /// broker TCP port
    pub port: u16,
}

/// Parses an `mqtt://host[:port]` URI.  The port defaults to 1883.
pub fn parse_endpoint(endpoint_uri: &str) -> Result<Endpoint, Box<dyn Error>> {
    let uri = Url::parse(endpoint_uri)?;

    if uri.scheme().to_lowercase() != "mqtt" {
        return Err(format!("unsupported scheme \"{}\"; only mqtt:// endpoints are supported", uri.scheme()).into());
    }

    let Some(host) = uri.host_str() else {
        return Err(format!("endpoint \"{}\" has no host", endpoint_uri).into());
    };

    Ok(Endpoint {
        host: host.to_string(),
        port: uri.port().unwrap_or(DEFAULT_MQTT_PORT),
    })
}

/// Parses a quality of service given as 0, 1 or 2.  Shaped for argh's `from_str_fn`.
pub fn parse_qos(value: &str) -> Result<QualityOfService, String> {
    let numeric = value.parse::<u8>().map_err(|_| format!("invalid qos: {}", value))?;

    QualityOfService::try_from(numeric).map_err(|_| format!("invalid qos: {}", value))
}

/// Formats an incoming message the way the tools print it
pub fn describe_message(publish: &PublishPacket) -> String {
    format!("on_message topic=<{}> message=<{}>", publish.topic(), String::from_utf8_lossy(publish.payload()))
}

/// Installs the process logger.  With a log path everything down to debug goes to that file;
/// otherwise warnings (or everything down to debug, when verbose) go to the terminal.
pub fn init_logging(logpath: Option<&Path>, verbose: bool) -> Result<(), Box<dyn Error>> {
    let log_config = ConfigBuilder::new().build();

    if let Some(log_file_path) = logpath {
        let log_file = File::create(log_file_path)?;
        WriteLogger::init(LevelFilter::Debug, log_config, log_file)?;
        return Ok(());
    }

    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };
    TermLogger::init(level, log_config, TerminalMode::Stderr, ColorChoice::Auto)?;

    Ok(())
}
