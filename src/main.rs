//! CLI for replymq
//!
//! Subcommands:
//! - `respond`: answer requests on a topic, echoing the payload back in parts
//! - `request`: send one request and print replies until the final part

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use replymq::config::{Settings, load_config, load_config_from};
use replymq::transport::RumqttTransport;
use replymq::utils::logging;
use replymq::{Client, LastWill, QoS};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "replymq", about = "Request/reply over MQTT v5")]
struct Cli {
    /// Configuration file; defaults to config/default.* when present
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer requests published on TOPIC
    Respond {
        #[arg(long)]
        topic: String,
        /// Split each reply into this many parts
        #[arg(long, default_value_t = 1)]
        parts: usize,
    },
    /// Publish one request and print the replies
    Request {
        #[arg(long)]
        topic: String,
        #[arg(long)]
        payload: String,
        /// Give up after this many seconds
        #[arg(long, default_value_t = 10)]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let settings = match cli.config.as_deref() {
        Some(path) => load_config_from(path),
        None => load_config(),
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(2);
        }
    };
    logging::init(&settings.logging.level);

    let result = match cli.command {
        Command::Respond { topic, parts } => run_responder(&settings, &topic, parts).await,
        Command::Request {
            topic,
            payload,
            timeout,
        } => run_request(&settings, &topic, &payload, Duration::from_secs(timeout)).await,
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}

fn connect(settings: &Settings) -> replymq::Result<Arc<Client<RumqttTransport>>> {
    let client = Arc::new(Client::from_settings(settings));
    let status = format!("replymq/status/{}", client.id());
    let will = LastWill::new(status, b"offline".to_vec(), QoS::AtLeastOnce, false);

    client.connect(&settings.mqtt.host, settings.mqtt.port, Some(&will))?;
    client.start()?;
    Ok(client)
}

fn shutdown(client: &Client<RumqttTransport>) {
    if let Err(e) = client.disconnect() {
        warn!("disconnect failed: {e}");
    }
    if let Err(e) = client.stop(false) {
        warn!("stopping network loop failed: {e}");
    }
}

async fn run_responder(settings: &Settings, topic: &str, parts: usize) -> replymq::Result<()> {
    let client = connect(settings)?;
    let qos = settings.client.default_qos;
    let parts = parts.max(1);

    let responder = Arc::downgrade(&client);
    client.subscribe(
        topic,
        move |msg, _, payload, _| {
            let Some(client) = responder.upgrade() else {
                return;
            };
            if !msg.expects_reply() {
                warn!(topic = %msg.topic, "request without response topic ignored");
                return;
            }

            let chunk = payload.len().div_ceil(parts).max(1);
            let chunks: Vec<&[u8]> = if payload.is_empty() {
                vec![payload]
            } else {
                payload.chunks(chunk).collect()
            };
            let last = chunks.len() - 1;
            for (i, part) in chunks.into_iter().enumerate() {
                let reply = msg.clone().with_sequence(i as i32 + 1).with_end_sequence(i == last);
                if let Err(e) = client.send_reply(&reply, part, qos, false) {
                    error!(error = %e, "reply failed");
                    return;
                }
            }
        },
        None,
        qos,
    )?;
    info!(topic = %topic, "responding, ctrl-c to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to wait for ctrl-c: {e}");
    }
    info!("Shutdown signal received. Exiting gracefully.");
    shutdown(&client);
    Ok(())
}

async fn run_request(settings: &Settings, topic: &str, payload: &str, timeout: Duration) -> replymq::Result<()> {
    let client = connect(settings)?;
    let qos = settings.client.default_qos;
    let correlation = Uuid::new_v4().to_string();
    let reply_topic = format!("{topic}/reply/{}", client.id());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let expected = correlation.clone().into_bytes();
    client.subscribe(
        &reply_topic,
        move |msg, _, payload, _| {
            if msg.correlation() != expected.as_slice() {
                return;
            }
            let _ = tx.send((msg.sequence, msg.is_end_sequence, payload.to_vec()));
        },
        None,
        qos,
    )?;

    client.publish_with_reply(topic, payload.as_bytes(), qos, false, &reply_topic, correlation.as_bytes())?;
    info!(topic = %topic, correlation = %correlation, "request sent");

    let wait = async {
        while let Some((sequence, is_end, part)) = rx.recv().await {
            println!("[{sequence}] {}", String::from_utf8_lossy(&part));
            if is_end {
                break;
            }
        }
    };
    tokio::select! {
        _ = wait => {}
        _ = tokio::time::sleep(timeout) => warn!("no final reply within {timeout:?}"),
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received."),
    }

    shutdown(&client);
    Ok(())
}
