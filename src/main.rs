use clap::{Args, Parser, Subcommand};
use knx_mqtt_bridge::bridge::{PublishProfile, PublishSession, SessionTiming, SubscribeSession};
use knx_mqtt_bridge::config::{self, Config, PUBLISH_KEEP_ALIVE_SECS, SUBSCRIBE_KEEP_ALIVE_SECS};
use knx_mqtt_bridge::error::Result;
use knx_mqtt_bridge::knx::KnxdClient;
use knx_mqtt_bridge::mqtt::{MqttPublisher, MqttSubscription};
use log::{error, info, warn};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

/// Broker used by the fixed single-topic bridge.
const ONE_SHOT_BROKER_HOST: &str = "127.0.0.1";
const ONE_SHOT_BROKER_PORT: u16 = 1883;

#[derive(Parser)]
#[command(name = "knx-mqtt-bridge")]
#[command(about = "Bridge KNX group telegrams from knxd to MQTT and back")]
struct Cli {
    /// knxd address: ip:host[:port] or local:/path [env: KNX_URL]
    #[arg(long)]
    knx_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct BrokerArgs {
    /// Broker host [env: MQTT_BROKER_HOST]
    #[arg(long)]
    host: Option<String>,

    /// Broker port [env: MQTT_BROKER_PORT]
    #[arg(long)]
    port: Option<u16>,

    /// Base topic (publish) or topic filter (subscribe), at most 64 characters [env: MQTT_TOPIC]
    #[arg(long)]
    topic: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Forward bus writes to knx/write on 127.0.0.1:1883 (QoS 2, retained)
    Bridge,
    /// Forward bus writes to <topic> and <topic>/<main>/<middle>/<sub> (QoS 2)
    Publish(BrokerArgs),
    /// Inject single-byte writes received on <topic> onto the bus (QoS 0)
    Subscribe(BrokerArgs),
}

impl Cli {
    /// Environment first, then command line flags on top.
    fn config(&self) -> Config {
        let mut config = Config::from_env();

        if let Some(url) = &self.knx_url {
            config.knx.url = url.clone();
        }

        match &self.command {
            Commands::Bridge => {
                config.mqtt.broker_host = ONE_SHOT_BROKER_HOST.to_string();
                config.mqtt.broker_port = ONE_SHOT_BROKER_PORT;
                config.mqtt.topic = PublishProfile::ONE_SHOT_TOPIC.to_string();
            }
            Commands::Publish(args) | Commands::Subscribe(args) => {
                if let Some(host) = &args.host {
                    config.mqtt.broker_host = host.clone();
                }
                if let Some(port) = args.port {
                    config.mqtt.broker_port = port;
                }
                if let Some(topic) = &args.topic {
                    config.mqtt.topic = topic.clone();
                }
            }
        }

        config
    }
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() -> ExitCode {
    // Before the runtime starts any threads
    config::load_dotenv();
    init_logger();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => {
            info!("KNX-MQTT bridge stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("[Bridge] Fatal: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.config();
    config.validate()?;

    info!("Starting KNX-MQTT bridge");
    info!("  knxd: {}", config.knx.url);
    info!(
        "  Broker: {}:{}",
        config.mqtt.broker_host, config.mqtt.broker_port
    );
    info!("  Topic: {}", config.mqtt.topic);

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown_signal(cancel.clone()));

    let bus = KnxdClient::connect(&config.knxd_url()?).await?;

    match cli.command {
        Commands::Bridge => {
            let publisher = MqttPublisher::new(
                config.mqtt.clone(),
                config.mqtt.keep_alive_or(PUBLISH_KEEP_ALIVE_SECS),
                config.session.reconnect_backoff(),
            );
            PublishSession::new(bus, publisher, PublishProfile::one_shot())?
                .run(cancel)
                .await
        }
        Commands::Publish(_) => {
            let publisher = MqttPublisher::new(
                config.mqtt.clone(),
                config.mqtt.keep_alive_or(PUBLISH_KEEP_ALIVE_SECS),
                config.session.reconnect_backoff(),
            );
            let profile = PublishProfile::publish_only(config.mqtt.topic.clone());
            PublishSession::new(bus, publisher, profile)?
                .run(cancel)
                .await
        }
        Commands::Subscribe(_) => {
            let broker = MqttSubscription::new(
                &config.mqtt,
                config.mqtt.keep_alive_or(SUBSCRIBE_KEEP_ALIVE_SECS),
            );
            SubscribeSession::new(
                bus,
                broker,
                config.mqtt.topic.clone(),
                SessionTiming::from(&config.session),
            )?
            .run(cancel)
            .await
        }
    }
}

/// Cancel the bridge on Ctrl+C or SIGTERM.
async fn cancel_on_shutdown_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for shutdown signal: {}", e);
                return;
            }
        }
        _ = terminate => {}
    }

    info!("Received shutdown signal");
    cancel.cancel();
}
