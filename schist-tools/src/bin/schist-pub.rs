/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

extern crate argh;
extern crate schist_mqtt;
extern crate schist_tools;

use argh::FromArgs;
use log::*;
use schist_mqtt::*;
use schist_tools::*;
use std::path::PathBuf;

#[derive(FromArgs, Debug, PartialEq)]
/// schist-pub - publish one message to an MQTT 3.1.1 broker, then disconnect
struct CommandLineArgs {

    /// URI of the broker to connect to, `mqtt://host[:port]`
    #[argh(positional)]
    endpoint_uri: Option<String>,

    /// quality of service to publish with: 0, 1 or 2
    #[argh(option, default = "QualityOfService::AtMostOnce", from_str_fn(parse_qos))]
    qos: QualityOfService,

    /// ask the broker to retain the message
    #[argh(switch)]
    retain: bool,

    /// topic to publish to
    #[argh(option, default = "String::from(\"my/topic\")")]
    topic: String,

    /// message body to publish
    #[argh(option, default = "String::from(\"hello, world!\")")]
    message: String,

    /// client id to connect with.  By default the broker assigns one.
    #[argh(option, default = "String::new()")]
    id: String,

    /// path to a log file that should be written
    #[argh(option)]
    logpath: Option<PathBuf>,

    /// log debug output to the terminal
    #[argh(switch, short = 'v')]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli_args: CommandLineArgs = argh::from_env();

    init_logging(cli_args.logpath.as_deref(), cli_args.verbose)?;

    let endpoint = parse_endpoint(cli_args.endpoint_uri.as_deref().unwrap_or(DEFAULT_ENDPOINT))?;

    let qos = cli_args.qos;
    let retain = cli_args.retain;
    let topic = cli_args.topic;
    let message = cli_args.message;

    let mut client = Client::new(&cli_args.id);

    client.set_on_connect(move |session, return_code, session_present| {
        println!("on_connect return_code={} session_present={}", return_code, session_present);
        if !return_code.is_success() {
            return;
        }

        match session.publish(qos, retain, &topic, message.as_bytes()) {
            Ok(packet_id) => {
                info!("publish queued with packet id {}", packet_id);
                if qos != QualityOfService::AtMostOnce {
                    return;
                }
            }
            Err(error) => {
                error!("publish failed: {}", error);
            }
        }

        if let Err(error) = session.disconnect() {
            error!("disconnect failed: {}", error);
        }
    });

    client.set_on_publish(|session, packet_id| {
        println!("on_publish id={}", packet_id);
        if let Err(error) = session.disconnect() {
            error!("disconnect failed: {}", error);
        }
    });

    client.connect(&endpoint.host, endpoint.port, DEFAULT_KEEP_ALIVE_SECONDS, true)?;
    client.run()?;

    Ok(())
}
