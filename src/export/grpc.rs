//! Kafka-Pixy gRPC exporter.
//!
//! The exporter is synchronous: it owns a current-thread tokio runtime and
//! blocks on each call. One `Produce` call per frame, no queueing.

use std::time::Duration;

use tonic::metadata::AsciiMetadataValue;
use tonic::transport::Channel;

use crate::error::{Error, Result};
use crate::export::auth::Credentials;
use crate::export::encoding::ImageEncoding;
use crate::export::proto::{KafkaPixyClient, ProdRq};
use crate::export::{ExporterSettings, ImageExporter};
use crate::frame::Frame;

/// Metadata key carrying the basic-auth header.
pub const AUTHORIZATION: &str = "authorization";

pub struct GrpcExporter {
    runtime: tokio::runtime::Runtime,
    client: KafkaPixyClient,
    endpoint: String,
    topic: String,
    credentials: Credentials,
    encoding: ImageEncoding,
    call_timeout: Duration,
}

impl GrpcExporter {
    pub fn connect(settings: &ExporterSettings) -> Result<Self> {
        let endpoint = settings.endpoint.to_string();
        let conn_err = |reason: String| Error::Connection {
            endpoint: endpoint.clone(),
            reason,
        };
        settings
            .tls
            .check_endpoint(&settings.endpoint)
            .map_err(|e| conn_err(e.to_string()))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| conn_err(format!("failed to start runtime: {}", e)))?;

        let mut channel = Channel::from_shared(settings.endpoint.grpc_uri())
            .map_err(|e| conn_err(e.to_string()))?
            .connect_timeout(settings.connect_timeout);
        if settings.endpoint.use_tls {
            channel = channel
                .tls_config(settings.tls.tonic_config(&settings.endpoint))
                .map_err(|e| conn_err(e.to_string()))?;
        }
        let channel = runtime
            .block_on(channel.connect())
            .map_err(|e| conn_err(e.to_string()))?;

        log::info!(
            "Connected to gRPC endpoint {} (TLS: {}, auth: {})",
            endpoint,
            settings.endpoint.use_tls,
            !settings.credentials.is_empty()
        );

        Ok(Self {
            runtime,
            client: KafkaPixyClient::new(channel),
            endpoint,
            topic: settings.topic.clone(),
            credentials: settings.credentials.clone(),
            encoding: settings.encoding,
            call_timeout: settings.call_timeout,
        })
    }
}

impl ImageExporter for GrpcExporter {
    fn destination(&self) -> &str {
        &self.topic
    }

    fn send(&mut self, frame: &Frame) -> Result<()> {
        let payload = self.encoding.encode(frame)?;
        let size = payload.len();
        let mut request = produce_request(&self.topic, payload, &self.credentials)?;
        request.set_timeout(self.call_timeout);

        let response = self
            .runtime
            .block_on(self.client.produce(request))
            .map_err(|status| Error::Publish {
                topic: self.topic.clone(),
                reason: format!("{}: {}", status.code(), status.message()),
            })?
            .into_inner();

        log::info!(
            "{} acknowledged {} bytes on {}: partition={} offset={}",
            self.endpoint,
            size,
            self.topic,
            response.partition,
            response.offset
        );
        Ok(())
    }
}

/// Build the `Produce` request for one payload.
///
/// The message key is left undefined so the broker picks the partition. The
/// authorization metadata is derived from `credentials` on every call.
pub fn produce_request(
    topic: &str,
    payload: Vec<u8>,
    credentials: &Credentials,
) -> Result<tonic::Request<ProdRq>> {
    let mut request = tonic::Request::new(ProdRq {
        topic: topic.to_string(),
        key_undefined: true,
        message: payload,
        ..Default::default()
    });
    let header = AsciiMetadataValue::try_from(credentials.authorization_header()).map_err(|e| {
        Error::Publish {
            topic: topic.to_string(),
            reason: format!("invalid authorization header: {}", e),
        }
    })?;
    request.metadata_mut().insert(AUTHORIZATION, header);
    Ok(request)
}
