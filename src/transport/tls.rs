//! TLS materials shared by the gRPC and MQTT exporters.
//!
//! - CA verification: custom CA path or webpki roots
//! - Client certificates: mutual TLS support
//! - No insecure (skip-verify) mode

use std::path::Path;

use crate::error::{Error, Result};
use crate::transport::Endpoint;

/// PEM-encoded TLS certificate materials.
#[derive(Clone, Debug, Default)]
pub struct TlsMaterials {
    /// CA certificate bytes. When None, webpki root certificates are trusted.
    pub ca: Option<Vec<u8>>,

    /// Client certificate and key for mutual TLS, provided together.
    pub client_auth: Option<(Vec<u8>, Vec<u8>)>,
}

impl TlsMaterials {
    /// Load TLS materials from file paths.
    ///
    /// The CA path is optional; client cert and key must be provided together.
    pub fn load(
        ca_path: Option<&Path>,
        client_cert_path: Option<&Path>,
        client_key_path: Option<&Path>,
    ) -> Result<Self> {
        let ca = ca_path.map(|path| read_pem(path, "CA")).transpose()?;

        let client_auth = match (client_cert_path, client_key_path) {
            (Some(cert_path), Some(key_path)) => Some((
                read_pem(cert_path, "client cert")?,
                read_pem(key_path, "client key")?,
            )),
            (None, None) => None,
            (Some(_), None) => {
                return Err(Error::Config(
                    "TLS client certificate provided without key".into(),
                ))
            }
            (None, Some(_)) => {
                return Err(Error::Config(
                    "TLS client key provided without certificate".into(),
                ))
            }
        };

        Ok(Self { ca, client_auth })
    }

    /// Check if any TLS materials are configured.
    pub fn is_configured(&self) -> bool {
        self.ca.is_some() || self.client_auth.is_some()
    }

    /// Reject materials that would be silently ignored on a plaintext channel.
    pub fn check_endpoint(&self, endpoint: &Endpoint) -> Result<()> {
        if !endpoint.use_tls && self.is_configured() {
            return Err(Error::Config(
                "TLS materials provided but TLS is disabled (use --tls or an https:// endpoint)"
                    .into(),
            ));
        }
        Ok(())
    }

    /// Client TLS settings for a tonic channel.
    pub fn tonic_config(&self, endpoint: &Endpoint) -> tonic::transport::ClientTlsConfig {
        use tonic::transport::{Certificate, ClientTlsConfig, Identity};

        let mut config = ClientTlsConfig::new().domain_name(endpoint.host.clone());
        config = match &self.ca {
            Some(ca) => config.ca_certificate(Certificate::from_pem(ca)),
            None => config.with_webpki_roots(),
        };
        if let Some((cert, key)) = &self.client_auth {
            config = config.identity(Identity::from_pem(cert, key));
        }
        config
    }

    /// rumqttc transport for the endpoint.
    pub fn mqtt_transport(&self, endpoint: &Endpoint) -> Result<rumqttc::Transport> {
        self.check_endpoint(endpoint)?;
        if !endpoint.use_tls {
            return Ok(rumqttc::Transport::tcp());
        }
        if !self.is_configured() {
            return Ok(rumqttc::Transport::tls_with_default_config());
        }
        let ca = self.ca.clone().ok_or_else(|| {
            Error::Config(
                "MQTT TLS CA certificate is required when providing client certificates".into(),
            )
        })?;
        Ok(rumqttc::Transport::tls(ca, self.client_auth.clone(), None))
    }
}

fn read_pem(path: &Path, what: &str) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        Error::Config(format!("failed to read TLS {} '{}': {}", what, path.display(), e))
    })
}
