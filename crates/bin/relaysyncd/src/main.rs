//! # relaysyncd — relaysync daemon
//!
//! Composition root that wires all adapters together and runs the control loop.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Initialize logging
//! - Open the `SQLite` key-value store and run migrations
//! - Connect to the MQTT broker and spawn its event pump
//! - Bind the radio transport and spawn its receiver
//! - Restore persisted schedules and run the control loop
//! - Handle graceful shutdown (SIGTERM/SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use relaysync_adapter_mqtt::MqttBus;
use relaysync_adapter_storage_sqlite_sqlx::SqliteKeyValueStore;
use relaysync_adapter_udp::UdpRadio;
use relaysync_adapter_virtual::{DEFAULT_NODE, VirtualRadio};
use relaysync_app::bridge::CommandBridge;
use relaysync_app::control_loop::{ControlLoop, LoopConfig};
use relaysync_app::mailbox::{RadioInbox, TelemetryMailbox};
use relaysync_app::ports::{
    BusEvent, InboundFrame, LocalWallClock, RadioTransport, SystemMonotonicClock,
};
use relaysync_app::topics::Topics;

use crate::config::{Config, RadioKind};

const FRAME_QUEUE: usize = 32;
const BUS_QUEUE: usize = 64;
const VIRTUAL_TELEMETRY_PERIOD: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Storage
    let db = relaysync_adapter_storage_sqlite_sqlx::Config {
        database_url: config.storage.database_url.clone(),
    }
    .build()
    .await?;
    let store = SqliteKeyValueStore::new(db.pool().clone());

    // Bus
    let topics = Topics::new(&config.mqtt.base_topic);
    let (bus_tx, bus_rx) = mpsc::channel::<BusEvent>(BUS_QUEUE);
    let (bus, pump) = relaysync_adapter_mqtt::connect(&config.mqtt, topics.subscriptions(), bus_tx)?;
    tokio::spawn(pump.run());
    tracing::info!(
        broker = %config.mqtt.broker_host,
        port = config.mqtt.broker_port,
        base_topic = topics.base(),
        "mqtt client started"
    );

    // Radio
    let telemetry = Arc::new(TelemetryMailbox::new());
    let (frames_tx, frames_rx) = mpsc::channel::<InboundFrame>(FRAME_QUEUE);
    let inbox = RadioInbox::new(Arc::clone(&telemetry), frames_tx);

    let wiring = Wiring {
        bus,
        store,
        topics,
        telemetry,
        frames: frames_rx,
        bus_events: bus_rx,
        loop_config: config.control.loop_config(),
    };

    match config.radio.kind {
        RadioKind::Udp => {
            let (radio, receiver) = UdpRadio::bind(&config.radio.udp).await?;
            tracing::info!(addr = ?radio.local_addr().ok(), "udp radio listening");
            tokio::spawn(receiver.run(inbox));
            wiring.run(radio).await;
        }
        RadioKind::Virtual => {
            let radio = VirtualRadio::new(DEFAULT_NODE, config.radio.auto_ack);
            radio.attach(inbox);
            tracing::info!(node = %radio.node_address(), auto_ack = config.radio.auto_ack, "virtual radio attached");
            tokio::spawn(radio.clone().run(VIRTUAL_TELEMETRY_PERIOD));
            wiring.run(radio).await;
        }
    }

    db.close().await;
    Ok(())
}

/// Everything the control loop needs besides the radio.
struct Wiring {
    bus: MqttBus,
    store: SqliteKeyValueStore,
    topics: Topics,
    telemetry: Arc<TelemetryMailbox>,
    frames: mpsc::Receiver<InboundFrame>,
    bus_events: mpsc::Receiver<BusEvent>,
    loop_config: LoopConfig,
}

impl Wiring {
    async fn run<R: RadioTransport + Sync>(self, radio: R) {
        let mut bridge =
            CommandBridge::new(radio, self.bus, self.store, self.topics, self.telemetry);
        bridge.restore().await;

        ControlLoop::new(
            bridge,
            self.frames,
            self.bus_events,
            SystemMonotonicClock::default(),
            LocalWallClock,
            self.loop_config,
        )
        .run(shutdown_signal())
        .await;
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(%err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::warn!(%err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
