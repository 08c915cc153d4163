use crate::error::Result;
use crate::knx::KnxdUrl;
use crate::mqtt::topic::validate_base_topic;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Keep-alive the publish direction has always used.
pub const PUBLISH_KEEP_ALIVE_SECS: u64 = 15;
/// Keep-alive the subscribe direction has always used.
pub const SUBSCRIBE_KEEP_ALIVE_SECS: u64 = 60;

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    if !env_path.exists() {
        return;
    }

    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for (key, value) in parse_dotenv(&content) {
        // Only set if not already set (env vars take precedence)
        if std::env::var(key).is_err() {
            // SAFETY: We're single-threaded at this point (called before any async runtime)
            unsafe { std::env::set_var(key, value) };
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();

    for line in content.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Find the first '=' and split there
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let mut value = value.trim();

            // Remove surrounding quotes if present
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }

            pairs.push((key, value));
        }
    }

    pairs
}

#[derive(Debug, Clone)]
pub struct Config {
    pub knx: KnxConfig,
    pub mqtt: MqttConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone)]
pub struct KnxConfig {
    /// knxd address, `ip:host[:port]` or `local:/path`.
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    /// Random per run when unset.
    pub client_id: Option<String>,
    /// Base topic for publishing, or topic filter for subscribing.
    pub topic: String,
    /// Falls back to the per-direction default when unset.
    pub keep_alive_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Pause before reconnecting after a broker error.
    pub reconnect_backoff_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            knx: KnxConfig {
                url: "ip:localhost:6720".to_string(),
            },
            mqtt: MqttConfig {
                broker_host: "127.0.0.1".to_string(),
                broker_port: 1883,
                client_id: None,
                topic: "knx".to_string(),
                keep_alive_secs: None,
            },
            session: SessionConfig {
                reconnect_backoff_ms: 3000,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("KNX_URL") {
            config.knx.url = url;
        }

        // MQTT configuration
        if let Ok(host) = std::env::var("MQTT_BROKER_HOST") {
            config.mqtt.broker_host = host;
        }
        if let Ok(port) = std::env::var("MQTT_BROKER_PORT")
            && let Ok(p) = port.parse()
        {
            config.mqtt.broker_port = p;
        }
        if let Ok(client_id) = std::env::var("MQTT_CLIENT_ID") {
            config.mqtt.client_id = Some(client_id);
        }
        if let Ok(topic) = std::env::var("MQTT_TOPIC") {
            config.mqtt.topic = topic;
        }
        if let Ok(keep_alive) = std::env::var("MQTT_KEEP_ALIVE_SECS")
            && let Ok(k) = keep_alive.parse()
        {
            config.mqtt.keep_alive_secs = Some(k);
        }

        // Session timing
        if let Ok(backoff) = std::env::var("BRIDGE_RECONNECT_BACKOFF_MS")
            && let Ok(b) = backoff.parse()
        {
            config.session.reconnect_backoff_ms = b;
        }

        config
    }

    /// Check everything that can be checked before connecting.
    pub fn validate(&self) -> Result<()> {
        validate_base_topic(&self.mqtt.topic)?;
        self.knxd_url()?;
        Ok(())
    }

    pub fn knxd_url(&self) -> Result<KnxdUrl> {
        self.knx.url.parse()
    }
}

impl MqttConfig {
    pub fn keep_alive_or(&self, default_secs: u64) -> Duration {
        Duration::from_secs(self.keep_alive_secs.unwrap_or(default_secs))
    }
}

impl SessionConfig {
    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }
}
