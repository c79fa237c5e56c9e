//! Kafka-Pixy gRPC messages and client (`kafkapixy.KafkaPixy`).
//!
//! Only the `Produce` call is carried. Field tags follow `kafkapixy.proto`.

use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;

const PRODUCE_PATH: &str = "/kafkapixy.KafkaPixy/Produce";

#[derive(Clone, PartialEq, prost::Message)]
pub struct RecordHeader {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

/// Produce request.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ProdRq {
    /// Cluster name; empty selects the proxy's default cluster.
    #[prost(string, tag = "1")]
    pub cluster: String,
    #[prost(string, tag = "2")]
    pub topic: String,
    #[prost(bytes = "vec", tag = "3")]
    pub key_value: Vec<u8>,
    /// When true the message carries no key and `key_value` is ignored.
    #[prost(bool, tag = "4")]
    pub key_undefined: bool,
    #[prost(bytes = "vec", tag = "5")]
    pub message: Vec<u8>,
    #[prost(bool, tag = "6")]
    pub async_mode: bool,
    #[prost(message, repeated, tag = "7")]
    pub headers: Vec<RecordHeader>,
}

/// Produce acknowledgment.
#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct ProdRs {
    #[prost(int32, tag = "1")]
    pub partition: i32,
    #[prost(int64, tag = "2")]
    pub offset: i64,
}

/// Unary client for the Kafka-Pixy service.
#[derive(Clone, Debug)]
pub struct KafkaPixyClient {
    inner: tonic::client::Grpc<Channel>,
}

impl KafkaPixyClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: tonic::client::Grpc::new(channel),
        }
    }

    pub async fn produce(
        &mut self,
        request: tonic::Request<ProdRq>,
    ) -> Result<tonic::Response<ProdRs>, tonic::Status> {
        self.inner
            .ready()
            .await
            .map_err(|e| tonic::Status::unknown(format!("service was not ready: {}", e)))?;
        let codec = tonic::codec::ProstCodec::default();
        let path = PathAndQuery::from_static(PRODUCE_PATH);
        self.inner.unary(request, path, codec).await
    }
}
