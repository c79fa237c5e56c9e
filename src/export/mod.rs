//! Image export to a remote broker.
//!
//! An exporter session is created once at startup and never mutated after
//! construction. Each `send` encodes the frame and performs exactly one
//! remote call.

pub mod auth;
pub mod encoding;
pub mod grpc;
pub mod mqtt;
pub mod proto;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub use auth::{basic_auth_header, parse_basic_auth_header, Credentials};
pub use encoding::ImageEncoding;
pub use grpc::GrpcExporter;
pub use mqtt::MqttExporter;

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::transport::{Endpoint, TlsMaterials};

/// Publishes annotated frames.
pub trait ImageExporter {
    /// Destination topic or stream name.
    fn destination(&self) -> &str;

    /// Encode and publish one frame. Success carries no data.
    fn send(&mut self, frame: &Frame) -> Result<()>;

    /// Release the connection. Calling it more than once is a no-op.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<E: ImageExporter + ?Sized> ImageExporter for Box<E> {
    fn destination(&self) -> &str {
        (**self).destination()
    }

    fn send(&mut self, frame: &Frame) -> Result<()> {
        (**self).send(frame)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Broker protocol.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransportKind {
    /// Kafka-Pixy `Produce` over gRPC.
    #[default]
    Grpc,
    Mqtt,
}

impl FromStr for TransportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "grpc" | "kafka-pixy" | "kafkapixy" => Ok(Self::Grpc),
            "mqtt" => Ok(Self::Mqtt),
            other => Err(Error::Config(format!(
                "unknown transport '{}': expected grpc or mqtt",
                other
            ))),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grpc => write!(f, "grpc"),
            Self::Mqtt => write!(f, "mqtt"),
        }
    }
}

/// Everything needed to open an exporter session.
#[derive(Clone, Debug)]
pub struct ExporterSettings {
    pub transport: TransportKind,
    pub endpoint: Endpoint,
    pub tls: TlsMaterials,
    pub credentials: Credentials,
    pub topic: String,
    pub encoding: ImageEncoding,
    /// Send credentials over a plaintext channel (logged loudly).
    pub allow_insecure_credentials: bool,
    pub connect_timeout: Duration,
    /// Per-call deadline for gRPC produce requests.
    pub call_timeout: Duration,
    pub mqtt_client_id: String,
}

impl ExporterSettings {
    /// gRPC settings with no credentials and default timeouts.
    pub fn new(endpoint: Endpoint, topic: impl Into<String>) -> Self {
        Self {
            transport: TransportKind::Grpc,
            endpoint,
            tls: TlsMaterials::default(),
            credentials: Credentials::default(),
            topic: topic.into(),
            encoding: ImageEncoding::Raw,
            allow_insecure_credentials: false,
            connect_timeout: Duration::from_secs(10),
            call_timeout: Duration::from_secs(30),
            mqtt_client_id: "facecast".to_string(),
        }
    }

    /// Refuse to put credentials on a plaintext channel unless explicitly
    /// allowed, and warn when it is.
    pub fn check_credential_channel(&self) -> Result<()> {
        if self.credentials.is_empty() || self.endpoint.use_tls {
            return Ok(());
        }
        if !self.allow_insecure_credentials {
            return Err(Error::InsecureCredentials {
                endpoint: self.endpoint.to_string(),
            });
        }
        log::warn!(
            "sending credentials for user '{}' to {} WITHOUT TLS; they can be read by anyone on the path",
            self.credentials.username(),
            self.endpoint
        );
        Ok(())
    }
}

/// Open an exporter session for the configured transport.
pub fn connect(settings: &ExporterSettings) -> Result<Box<dyn ImageExporter>> {
    if settings.topic.trim().is_empty() {
        return Err(Error::Config("destination topic must not be empty".into()));
    }
    settings.check_credential_channel()?;
    match settings.transport {
        TransportKind::Grpc => Ok(Box::new(GrpcExporter::connect(settings)?)),
        TransportKind::Mqtt => Ok(Box::new(MqttExporter::connect(settings)?)),
    }
}
