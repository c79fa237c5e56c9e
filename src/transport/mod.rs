//! Broker connection plumbing shared by the exporters: endpoint parsing and
//! TLS material loading.

mod endpoint;
mod tls;

pub use endpoint::{parse_endpoint, Endpoint};
pub use tls::TlsMaterials;
