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
/// schist-sub - subscribe to a topic filter on an MQTT 3.1.1 broker and print what arrives
struct CommandLineArgs {

    /// URI of the broker to connect to, `mqtt://host[:port]`
    #[argh(positional)]
    endpoint_uri: Option<String>,

    /// maximum quality of service to subscribe with: 0, 1 or 2
    #[argh(option, default = "QualityOfService::AtMostOnce", from_str_fn(parse_qos))]
    qos: QualityOfService,

    /// topic filter to subscribe to
    #[argh(option, default = "String::from(\"$SYS/broker/load/messages/#\")")]
    topic: String,

    /// connect without a clean session.  Requires --id.
    #[argh(switch)]
    no_clean: bool,

    /// client id to connect with.  By default the broker assigns one.
    #[argh(option)]
    id: Option<String>,

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
    let topic = cli_args.topic;

    let mut client = Client::new(cli_args.id.as_deref().unwrap_or(""));

    client.set_on_connect(move |session, return_code, session_present| {
        println!("on_connect return_code={} session_present={}", return_code, session_present);
        if !return_code.is_success() {
            return;
        }

        if let Err(error) = session.subscribe(&topic, qos) {
            error!("subscribe failed: {}", error);
        }
    });

    client.set_on_subscribe(|_, packet_id, return_codes| {
        for return_code in return_codes {
            println!("on_subscribe id={} status={:?}", packet_id, return_code);
        }
    });

    client.set_on_message(|_, publish| {
        println!("{}", describe_message(publish));
    });

    client.connect(&endpoint.host, endpoint.port, DEFAULT_KEEP_ALIVE_SECONDS, !cli_args.no_clean)?;
    client.run()?;

    Ok(())
}
