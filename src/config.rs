use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::annotate::Color;
use crate::capture::RetryPolicy;
use crate::error::{Error, Result};
use crate::export::{Credentials, ExporterSettings, ImageEncoding, TransportKind};
use crate::ingest::{CameraConfig, DeviceId};
use crate::pipeline::{MarkerStyle, RunMode};
use crate::transport::{parse_endpoint, TlsMaterials};

pub const DEFAULT_DEVICE: &str = "1";
pub const DEFAULT_RATE_MS: u64 = 1000;
pub const DEFAULT_CLASSIFIER: &str = "haarcascade_frontalface_default.xml";
pub const DEFAULT_ENDPOINT: &str = "endpoint-grpc.meroxa.io:80";
pub const DEFAULT_MARKER_THICKNESS: u32 = 3;
pub const DEFAULT_MQTT_CLIENT_ID: &str = "facecast";

/// Command-line flags. Every flag can also be set from the environment.
///
/// Unset options fall back to the config file, then to built-in defaults.
#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "facecast",
    author,
    version,
    about = "Detect faces on a camera feed and publish annotated frames to a broker"
)]
pub struct Args {
    /// JSON config file.
    #[arg(long, env = "FACECAST_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Camera index, device path, or stub://<name> for synthetic frames.
    #[arg(long, env = "FACECAST_DEVICE")]
    pub device: Option<String>,

    /// Capture interval in milliseconds (retry sleep and display wait).
    #[arg(long, env = "FACECAST_RATE_MS")]
    pub rate_ms: Option<u64>,

    /// Cascade classifier file, or stub://center / stub://none.
    #[arg(long, env = "FACECAST_CLASSIFIER", value_name = "PATH")]
    pub classifier: Option<String>,

    /// Give up after this many reads without a face.
    #[arg(long, env = "FACECAST_MAX_ATTEMPTS")]
    pub max_attempts: Option<u32>,

    /// Give up when no face is found within this many milliseconds.
    #[arg(long, env = "FACECAST_CAPTURE_DEADLINE_MS")]
    pub capture_deadline_ms: Option<u64>,

    /// Broker address: host:port, optionally with a scheme.
    #[arg(long, env = "FACECAST_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Broker protocol: grpc (Kafka-Pixy) or mqtt.
    #[arg(long, env = "FACECAST_TRANSPORT")]
    pub transport: Option<String>,

    /// Use TLS for the broker connection.
    #[arg(long, env = "FACECAST_TLS")]
    pub tls: bool,

    /// PEM-encoded CA certificate to trust.
    #[arg(long, env = "FACECAST_TLS_CA_PATH")]
    pub tls_ca_path: Option<PathBuf>,

    /// PEM-encoded client certificate for mutual TLS.
    #[arg(long, env = "FACECAST_TLS_CLIENT_CERT_PATH")]
    pub tls_client_cert_path: Option<PathBuf>,

    /// PEM-encoded client private key for mutual TLS.
    #[arg(long, env = "FACECAST_TLS_CLIENT_KEY_PATH")]
    pub tls_client_key_path: Option<PathBuf>,

    #[arg(long, env = "FACECAST_USERNAME")]
    pub username: Option<String>,

    #[arg(long, env = "FACECAST_PASSWORD")]
    pub password: Option<String>,

    /// Send credentials without TLS. They can be read by anyone on the path.
    #[arg(long, env = "FACECAST_ALLOW_INSECURE_CREDENTIALS")]
    pub allow_insecure_credentials: bool,

    /// Destination topic or stream.
    #[arg(long, env = "FACECAST_TOPIC")]
    pub topic: Option<String>,

    /// Payload encoding: raw (BGR), raw-rgb, jpeg or png.
    #[arg(long, env = "FACECAST_ENCODING")]
    pub encoding: Option<String>,

    /// Marker color as r,g,b.
    #[arg(long, env = "FACECAST_MARKER_COLOR")]
    pub marker_color: Option<String>,

    /// Marker stroke width in pixels.
    #[arg(long, env = "FACECAST_MARKER_THICKNESS")]
    pub marker_thickness: Option<u32>,

    /// Do not open a preview window.
    #[arg(long, env = "FACECAST_HEADLESS")]
    pub headless: bool,

    /// Keep capturing until Ctrl-C.
    #[arg(long, env = "FACECAST_CONTINUOUS")]
    pub continuous: bool,

    #[arg(long, env = "FACECAST_MQTT_CLIENT_ID")]
    pub mqtt_client_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FacecastConfigFile {
    capture: Option<CaptureConfigFile>,
    broker: Option<BrokerConfigFile>,
    display: Option<DisplayConfigFile>,
    continuous: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CaptureConfigFile {
    device: Option<String>,
    rate_ms: Option<u64>,
    classifier: Option<String>,
    max_attempts: Option<u32>,
    deadline_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct BrokerConfigFile {
    endpoint: Option<String>,
    transport: Option<String>,
    tls: Option<bool>,
    tls_ca_path: Option<PathBuf>,
    tls_client_cert_path: Option<PathBuf>,
    tls_client_key_path: Option<PathBuf>,
    username: Option<String>,
    password: Option<String>,
    allow_insecure_credentials: Option<bool>,
    topic: Option<String>,
    encoding: Option<String>,
    mqtt_client_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DisplayConfigFile {
    headless: Option<bool>,
    marker_color: Option<String>,
    marker_thickness: Option<u32>,
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct FacecastConfig {
    pub camera: CameraConfig,
    pub classifier: String,
    pub retry: RetryPolicy,
    pub exporter: ExporterSettings,
    pub marker: MarkerStyle,
    pub headless: bool,
    pub run_mode: RunMode,
}

impl FacecastConfig {
    /// Resolve flags and environment over the optional config file.
    pub fn load(args: &Args) -> Result<Self> {
        let file = match args.config.as_deref() {
            Some(path) => read_config_file(path)?,
            None => FacecastConfigFile::default(),
        };
        let cfg = Self::resolve(args, file)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn resolve(args: &Args, file: FacecastConfigFile) -> Result<Self> {
        let capture = file.capture.unwrap_or_default();
        let broker = file.broker.unwrap_or_default();
        let display = file.display.unwrap_or_default();

        let device: DeviceId = non_empty(args.device.clone())
            .or(capture.device)
            .unwrap_or_else(|| DEFAULT_DEVICE.to_string())
            .parse()?;
        let camera = CameraConfig {
            device,
            ..CameraConfig::default()
        };

        let classifier = non_empty(args.classifier.clone())
            .or(capture.classifier)
            .unwrap_or_else(|| DEFAULT_CLASSIFIER.to_string());

        let retry = RetryPolicy {
            interval: Duration::from_millis(
                args.rate_ms.or(capture.rate_ms).unwrap_or(DEFAULT_RATE_MS),
            ),
            max_attempts: args.max_attempts.or(capture.max_attempts),
            deadline: args
                .capture_deadline_ms
                .or(capture.deadline_ms)
                .map(Duration::from_millis),
        };

        let tls = args.tls || broker.tls.unwrap_or(false);
        let endpoint_addr = non_empty(args.endpoint.clone())
            .or(broker.endpoint)
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let endpoint = parse_endpoint(&endpoint_addr, tls)?;

        let tls_materials = TlsMaterials::load(
            args.tls_ca_path
                .as_deref()
                .or(broker.tls_ca_path.as_deref()),
            args.tls_client_cert_path
                .as_deref()
                .or(broker.tls_client_cert_path.as_deref()),
            args.tls_client_key_path
                .as_deref()
                .or(broker.tls_client_key_path.as_deref()),
        )?;

        let transport = match non_empty(args.transport.clone()).or(broker.transport) {
            Some(value) => value.parse()?,
            None => TransportKind::default(),
        };
        let encoding = match non_empty(args.encoding.clone()).or(broker.encoding) {
            Some(value) => value.parse()?,
            None => ImageEncoding::default(),
        };
        let credentials = Credentials::new(
            args.username.clone().or(broker.username).unwrap_or_default(),
            args.password.clone().or(broker.password).unwrap_or_default(),
        );
        let topic = args.topic.clone().or(broker.topic).unwrap_or_default();

        let exporter = ExporterSettings {
            transport,
            tls: tls_materials,
            credentials,
            encoding,
            allow_insecure_credentials: args.allow_insecure_credentials
                || broker.allow_insecure_credentials.unwrap_or(false),
            mqtt_client_id: non_empty(args.mqtt_client_id.clone())
                .or(broker.mqtt_client_id)
                .unwrap_or_else(|| DEFAULT_MQTT_CLIENT_ID.to_string()),
            ..ExporterSettings::new(endpoint, topic)
        };

        let marker = MarkerStyle {
            color: match non_empty(args.marker_color.clone()).or(display.marker_color) {
                Some(value) => value.parse()?,
                None => Color::BLUE,
            },
            thickness: args
                .marker_thickness
                .or(display.marker_thickness)
                .unwrap_or(DEFAULT_MARKER_THICKNESS),
        };

        let run_mode = if args.continuous || file.continuous.unwrap_or(false) {
            RunMode::Continuous
        } else {
            RunMode::Once
        };

        Ok(Self {
            camera,
            classifier,
            retry,
            exporter,
            marker,
            headless: args.headless || display.headless.unwrap_or(false),
            run_mode,
        })
    }

    fn validate(&self) -> Result<()> {
        if self.exporter.topic.trim().is_empty() {
            return Err(Error::Config(
                "destination topic is required (--topic or FACECAST_TOPIC)".into(),
            ));
        }
        if self.retry.interval.is_zero() {
            return Err(Error::Config("capture rate must be greater than zero".into()));
        }
        if self.retry.max_attempts == Some(0) {
            return Err(Error::Config("max attempts must be greater than zero".into()));
        }
        if self.marker.thickness == 0 {
            return Err(Error::Config(
                "marker thickness must be greater than zero".into(),
            ));
        }
        if self.classifier.trim().is_empty() {
            return Err(Error::Config("classifier path must not be empty".into()));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<FacecastConfigFile> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;
    serde_json::from_str(&raw)
        .map_err(|e| Error::Config(format!("invalid config file {}: {}", path.display(), e)))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
