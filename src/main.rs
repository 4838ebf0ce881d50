use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info};
use vicenza_sim::{log_reading, Config, MqttChannel, Publisher, SensorModel, ShutdownHandle};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (YAML); built-in defaults when omitted
    config: Option<PathBuf>,

    /// MQTT broker host
    #[arg(long)]
    host: Option<String>,

    /// MQTT broker port
    #[arg(long)]
    port: Option<u16>,

    /// Topic readings are published to
    #[arg(long)]
    topic: Option<String>,

    /// Seconds between readings
    #[arg(long)]
    interval: Option<u64>,

    /// MQTT username
    #[arg(long, env = "MQTT_USERNAME")]
    username: Option<String>,

    /// MQTT password
    #[arg(long, env = "MQTT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// MQTT client identifier
    #[arg(long)]
    client_id: Option<String>,

    /// Seed for a reproducible sequence of readings
    #[arg(long)]
    seed: Option<u64>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::read(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(host) = &self.host {
            config.mqtt.host = host.clone();
        }
        if let Some(port) = self.port {
            config.mqtt.port = port;
        }
        if let Some(client_id) = &self.client_id {
            config.mqtt.client_id = client_id.clone();
        }
        if self.username.is_some() {
            config.mqtt.username = self.username.clone();
        }
        if self.password.is_some() {
            config.mqtt.password = self.password.clone();
        }
        if let Some(topic) = &self.topic {
            config.publish.topic = topic.clone();
        }
        if let Some(interval) = self.interval {
            config.publish.interval_secs = interval;
            // Keep the reconnect backoff shorter than a short interval
            if config.publish.backoff_ms >= config.publish.interval_ms() {
                config.publish.backoff_ms = config.publish.interval_ms() / 2;
            }
        }
        if self.seed.is_some() {
            config.simulator.seed = self.seed;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("vicenza_sim=info".parse().expect("static directive"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Stop the publisher on Ctrl+C, or SIGTERM on unix.
async fn wait_for_interrupt(handle: ShutdownHandle) {
    #[cfg(unix)]
    {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                error!("Cannot install SIGTERM handler: {}", e);
                let _ = signal::ctrl_c().await;
                info!("Received shutdown signal");
                handle.stop();
                return;
            }
        };

        tokio::select! {
            _ = signal::ctrl_c() => info!("Received shutdown signal"),
            _ = sigterm.recv() => info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
        info!("Received shutdown signal");
    }

    handle.stop();
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.json_logs);

    info!("vicenza-sim {} starting", vicenza_sim::build_info_string());

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = args.load_config()?;
    info!(
        "Broker {}:{}, topic '{}', interval {}s",
        config.mqtt.host, config.mqtt.port, config.publish.topic, config.publish.interval_secs
    );

    let channel = MqttChannel::new(&config.mqtt).context("creating MQTT client")?;
    let model = SensorModel::from_config(&config.simulator);
    let mut publisher = Publisher::new(channel, model, config.publish);

    tokio::spawn(wait_for_interrupt(publisher.shutdown_handle()));

    let stats = publisher.run(log_reading).await.context("publisher failed")?;
    info!(
        "Final stats: {} published, {} failed, {} connection waits, uptime: {}s",
        stats.published, stats.failed, stats.connection_waits, stats.uptime_secs
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Mutex, MutexGuard};
    use tempfile::NamedTempFile;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Serialise access to the credential variables and start without them.
    fn clean_env() -> MutexGuard<'static, ()> {
        let guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::remove_var("MQTT_USERNAME");
        std::env::remove_var("MQTT_PASSWORD");
        guard
    }

    fn parse(argv: &[&str]) -> Args {
        Args::parse_from(std::iter::once("vicenza-sim").chain(argv.iter().copied()))
    }

    fn config_file(yaml: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", yaml).unwrap();
        file
    }

    #[test]
    fn test_defaults_without_file() {
        let _env = clean_env();
        let config = parse(&[]).load_config().unwrap();
        assert_eq!(config.mqtt.host, "127.0.0.1");
        assert_eq!(config.publish.interval_secs, 5);
        assert_eq!(config.publish.backoff_ms, 2000);
        assert_eq!(config.mqtt.credentials(), None);
    }

    #[test]
    fn test_flag_overrides() {
        let _env = clean_env();
        let config = parse(&[
            "--host", "broker.local",
            "--port", "8883",
            "--topic", "vicenza/weather/test",
            "--client-id", "station-2",
            "--seed", "42",
        ])
        .load_config()
        .unwrap();

        assert_eq!(config.mqtt.host, "broker.local");
        assert_eq!(config.mqtt.port, 8883);
        assert_eq!(config.mqtt.client_id, "station-2");
        assert_eq!(config.publish.topic, "vicenza/weather/test");
        assert_eq!(config.simulator.seed, Some(42));
    }

    #[test]
    fn test_one_second_interval_shortens_backoff() {
        let _env = clean_env();
        let config = parse(&["--interval", "1"]).load_config().unwrap();
        assert_eq!(config.publish.interval_secs, 1);
        assert_eq!(config.publish.backoff_ms, 500);
    }

    #[test]
    fn test_long_interval_keeps_backoff() {
        let _env = clean_env();
        let config = parse(&["--interval", "30"]).load_config().unwrap();
        assert_eq!(config.publish.backoff_ms, 2000);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let _env = clean_env();
        assert!(parse(&["--interval", "0"]).load_config().is_err());
    }

    #[test]
    fn test_flags_override_file() {
        let _env = clean_env();
        let file = config_file("mqtt:\n  host: from-file\n  port: 1884\npublish:\n  interval_secs: 10\n");
        let path = file.path().to_str().unwrap();

        let config = parse(&[path, "--port", "1885"]).load_config().unwrap();
        assert_eq!(config.mqtt.host, "from-file");
        assert_eq!(config.mqtt.port, 1885);
        assert_eq!(config.publish.interval_secs, 10);
    }

    #[test]
    fn test_credentials_from_environment() {
        let _env = clean_env();
        std::env::set_var("MQTT_USERNAME", "station");
        std::env::set_var("MQTT_PASSWORD", "secret");
        let args = parse(&[]);
        std::env::remove_var("MQTT_USERNAME");
        std::env::remove_var("MQTT_PASSWORD");

        let config = args.load_config().unwrap();
        assert_eq!(config.mqtt.credentials(), Some(("station", "secret")));
    }

    #[test]
    fn test_environment_completes_file_credentials() {
        let _env = clean_env();
        let file = config_file("mqtt:\n  username: station\n");
        let path = file.path().to_str().unwrap();

        std::env::set_var("MQTT_PASSWORD", "secret");
        let args = parse(&[path]);
        std::env::remove_var("MQTT_PASSWORD");

        let config = args.load_config().unwrap();
        assert_eq!(config.mqtt.credentials(), Some(("station", "secret")));
    }

    #[test]
    fn test_half_credentials_rejected() {
        let _env = clean_env();
        assert!(parse(&["--username", "station"]).load_config().is_err());

        let file = config_file("mqtt:\n  password: secret\n");
        let path = file.path().to_str().unwrap();
        assert!(parse(&[path]).load_config().is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let _env = clean_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        assert!(parse(&[path.to_str().unwrap()]).load_config().is_err());
    }
}
