//! MQTT exporter.
//!
//! Publishes each payload to the destination topic with QoS 1 and waits for
//! the broker's PUBACK. A background thread drives the rumqttc event loop and
//! forwards acknowledgments to the publishing side.

use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

use rumqttc::v5::mqttbytes::v5::{Packet, PubAck, PubAckReason};
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{Client, Connection, Event, MqttOptions};
use rumqttc::Outgoing;

use crate::error::{Error, Result};
use crate::export::encoding::ImageEncoding;
use crate::export::{ExporterSettings, ImageExporter};
use crate::frame::Frame;

type ConnectOutcome = std::result::Result<(), String>;

/// Broker verdict for one publish: the packet id on success.
type AckOutcome = std::result::Result<u16, String>;

pub struct MqttExporter {
    client: Client,
    acks: mpsc::Receiver<AckOutcome>,
    connection_handle: Option<JoinHandle<()>>,
    endpoint: String,
    topic: String,
    encoding: ImageEncoding,
    call_timeout: Duration,
}

impl MqttExporter {
    /// Connect and wait for the broker's CONNACK.
    pub fn connect(settings: &ExporterSettings) -> Result<Self> {
        let endpoint = settings.endpoint.to_string();
        let conn_err = |reason: String| Error::Connection {
            endpoint: endpoint.clone(),
            reason,
        };

        let mut options = MqttOptions::new(
            settings.mqtt_client_id.clone(),
            settings.endpoint.host.clone(),
            settings.endpoint.port,
        );
        options.set_keep_alive(Duration::from_secs(60));
        options.set_clean_start(true);
        if !settings.credentials.is_empty() {
            options.set_credentials(
                settings.credentials.username(),
                settings.credentials.password(),
            );
        }
        options.set_transport(
            settings
                .tls
                .mqtt_transport(&settings.endpoint)
                .map_err(|e| conn_err(e.to_string()))?,
        );

        let (client, connection) = Client::new(options, 10);
        let (connected_tx, connected_rx) = mpsc::channel();
        let (ack_tx, ack_rx) = mpsc::channel();
        let handle =
            std::thread::spawn(move || drive_connection(connection, connected_tx, ack_tx));

        let outcome = match connected_rx.recv_timeout(settings.connect_timeout) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(reason),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                let _ = client.disconnect();
                Err("timed out waiting for CONNACK".to_string())
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err("connection closed before CONNACK".to_string())
            }
        };
        if let Err(reason) = outcome {
            join_connection(handle);
            return Err(conn_err(reason));
        }

        log::info!(
            "Connected to MQTT broker {} (TLS: {}, auth: {})",
            endpoint,
            settings.endpoint.use_tls,
            !settings.credentials.is_empty()
        );

        Ok(Self {
            client,
            acks: ack_rx,
            connection_handle: Some(handle),
            endpoint,
            topic: settings.topic.clone(),
            encoding: settings.encoding,
            call_timeout: settings.call_timeout,
        })
    }

    fn publish_err(&self, reason: String) -> Error {
        Error::Publish {
            topic: self.topic.clone(),
            reason,
        }
    }
}

fn drive_connection(
    mut connection: Connection,
    connected: mpsc::Sender<ConnectOutcome>,
    acks: mpsc::Sender<AckOutcome>,
) {
    let mut connected = Some(connected);
    for event in connection.iter() {
        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                if let Some(tx) = connected.take() {
                    let _ = tx.send(Ok(()));
                }
            }
            Ok(Event::Incoming(Packet::PubAck(ack))) => {
                let _ = acks.send(ack_outcome(&ack));
            }
            Ok(Event::Incoming(Packet::Disconnect(disconnect))) => {
                log::warn!("MQTT broker sent disconnect: {:?}", disconnect);
                let _ = acks.send(Err("broker disconnected".into()));
                break;
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
            Ok(_) => {}
            Err(e) => {
                match connected.take() {
                    Some(tx) => {
                        let _ = tx.send(Err(e.to_string()));
                    }
                    None => {
                        log::warn!("MQTT connection error: {}", e);
                        let _ = acks.send(Err(e.to_string()));
                    }
                }
                break;
            }
        }
    }
}

fn ack_outcome(ack: &PubAck) -> AckOutcome {
    match ack.reason {
        PubAckReason::Success | PubAckReason::NoMatchingSubscribers => Ok(ack.pkid),
        reason => Err(format!("broker rejected publish pkid={}: {:?}", ack.pkid, reason)),
    }
}

fn join_connection(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        log::warn!("MQTT connection thread panicked");
    }
}

impl ImageExporter for MqttExporter {
    fn destination(&self) -> &str {
        &self.topic
    }

    fn send(&mut self, frame: &Frame) -> Result<()> {
        let payload = self.encoding.encode(frame)?;
        let size = payload.len();

        // Acks for publishes that already timed out belong to no caller.
        while let Ok(stale) = self.acks.try_recv() {
            log::debug!("discarding late MQTT acknowledgment: {:?}", stale);
        }

        self.client
            .publish(self.topic.clone(), QoS::AtLeastOnce, false, payload)
            .map_err(|e| self.publish_err(e.to_string()))?;

        let pkid = match self.acks.recv_timeout(self.call_timeout) {
            Ok(Ok(pkid)) => pkid,
            Ok(Err(reason)) => return Err(self.publish_err(reason)),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                return Err(self.publish_err(format!(
                    "no acknowledgment within {:?}",
                    self.call_timeout
                )))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(self.publish_err("connection closed".into()))
            }
        };

        log::info!(
            "{} acknowledged {} bytes on {}: pkid={}",
            self.endpoint,
            size,
            self.topic,
            pkid
        );
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let Some(handle) = self.connection_handle.take() else {
            return Ok(());
        };
        let result = self.client.disconnect().map_err(|e| Error::Connection {
            endpoint: self.endpoint.clone(),
            reason: format!("disconnect failed: {}", e),
        });
        join_connection(handle);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::TransportKind;
    use crate::transport::Endpoint;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};

    const CONNECT: u8 = 1;
    const PUBLISH: u8 = 3;

    /// Reply to the next PUBLISH with this PUBACK reason, or stay silent.
    #[derive(Clone, Copy)]
    enum Reply {
        PubAck(u8),
        Silent,
    }

    struct Published {
        topic: String,
        payload: Vec<u8>,
    }

    /// Minimal MQTT 5 broker that accepts one client and one publish.
    struct FakeBroker {
        port: u16,
        handle: JoinHandle<Option<Published>>,
    }

    impl FakeBroker {
        fn spawn(reply: Reply) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let port = listener.local_addr().unwrap().port();
            let handle = std::thread::spawn(move || {
                let (mut stream, _) = listener.accept().ok()?;
                stream
                    .set_read_timeout(Some(Duration::from_secs(5)))
                    .unwrap();
                serve(&mut stream, reply)
            });
            Self { port, handle }
        }

        fn published(self) -> Published {
            self.handle.join().unwrap().expect("broker saw a publish")
        }
    }

    fn serve(stream: &mut TcpStream, reply: Reply) -> Option<Published> {
        let (kind, _) = read_packet(stream)?;
        assert_eq!(kind, CONNECT);
        // CONNACK: no session, success, no properties.
        stream.write_all(&[0x20, 0x03, 0x00, 0x00, 0x00]).ok()?;

        let published = loop {
            let (kind, body) = read_packet(stream)?;
            if kind != PUBLISH {
                continue;
            }
            let (published, pkid) = parse_publish(&body);
            if let Reply::PubAck(reason) = reply {
                let [hi, lo] = pkid.to_be_bytes();
                stream.write_all(&[0x40, 0x04, hi, lo, reason, 0x00]).ok()?;
            }
            break published;
        };

        // Drain until the client hangs up.
        while read_packet(stream).is_some() {}
        Some(published)
    }

    fn read_packet(stream: &mut TcpStream) -> Option<(u8, Vec<u8>)> {
        let mut byte = [0u8; 1];
        stream.read_exact(&mut byte).ok()?;
        let kind = byte[0] >> 4;
        let mut len = 0usize;
        let mut shift = 0;
        loop {
            stream.read_exact(&mut byte).ok()?;
            len |= ((byte[0] & 0x7F) as usize) << shift;
            if byte[0] & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        let mut body = vec![0u8; len];
        stream.read_exact(&mut body).ok()?;
        Some((kind, body))
    }

    /// QoS 1 PUBLISH body: topic, packet id, properties, payload.
    fn parse_publish(body: &[u8]) -> (Published, u16) {
        let topic_len = u16::from_be_bytes([body[0], body[1]]) as usize;
        let topic = String::from_utf8(body[2..2 + topic_len].to_vec()).unwrap();
        let mut at = 2 + topic_len;
        let pkid = u16::from_be_bytes([body[at], body[at + 1]]);
        at += 2;
        let mut props_len = 0usize;
        let mut shift = 0;
        loop {
            let b = body[at];
            at += 1;
            props_len |= ((b & 0x7F) as usize) << shift;
            if b & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        at += props_len;
        let payload = body[at..].to_vec();
        (Published { topic, payload }, pkid)
    }

    fn settings(port: u16) -> ExporterSettings {
        let endpoint = Endpoint {
            host: "127.0.0.1".into(),
            port,
            use_tls: false,
        };
        ExporterSettings {
            transport: TransportKind::Mqtt,
            connect_timeout: Duration::from_secs(3),
            call_timeout: Duration::from_secs(3),
            ..ExporterSettings::new(endpoint, "faces")
        }
    }

    #[test]
    fn acknowledged_publish_succeeds() {
        let broker = FakeBroker::spawn(Reply::PubAck(0x00));
        let mut exporter = MqttExporter::connect(&settings(broker.port)).unwrap();

        exporter.send(&Frame::filled(2, 1, [1, 2, 3])).unwrap();
        exporter.close().unwrap();
        exporter.close().unwrap();

        let published = broker.published();
        assert_eq!(published.topic, "faces");
        assert_eq!(published.payload, vec![3, 2, 1, 3, 2, 1]);
    }

    #[test]
    fn rejected_publish_is_a_publish_error() {
        // 0x87: not authorized.
        let broker = FakeBroker::spawn(Reply::PubAck(0x87));
        let mut exporter = MqttExporter::connect(&settings(broker.port)).unwrap();

        let err = exporter.send(&Frame::filled(2, 1, [1, 2, 3])).unwrap_err();
        assert!(err.is_publish(), "{}", err);

        let _ = exporter.close();
        assert_eq!(broker.published().topic, "faces");
    }

    #[test]
    fn missing_acknowledgment_times_out() {
        let broker = FakeBroker::spawn(Reply::Silent);
        let mut exporter = MqttExporter::connect(&ExporterSettings {
            call_timeout: Duration::from_millis(300),
            ..settings(broker.port)
        })
        .unwrap();

        let err = exporter.send(&Frame::filled(1, 1, [0, 0, 0])).unwrap_err();
        assert!(err.is_publish(), "{}", err);
        assert!(err.to_string().contains("no acknowledgment"), "{}", err);

        let _ = exporter.close();
        let _ = broker.published();
    }

    #[test]
    fn silent_broker_times_out_and_releases_connection_thread() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let broker = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let (kind, _) = read_packet(&mut stream).unwrap();
            // Never answer; wait for the client to give up.
            while read_packet(&mut stream).is_some() {}
            kind
        });

        let err = MqttExporter::connect(&ExporterSettings {
            connect_timeout: Duration::from_millis(300),
            ..settings(port)
        })
        .err()
        .unwrap();
        assert!(matches!(err, Error::Connection { .. }), "{}", err);
        assert!(err.to_string().contains("CONNACK"), "{}", err);

        // connect() has joined its thread, so the socket is closed by now.
        assert_eq!(broker.join().unwrap(), CONNECT);
    }

    #[test]
    fn refused_connection_is_a_connection_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = MqttExporter::connect(&settings(port)).err().unwrap();
        assert!(matches!(err, Error::Connection { .. }), "{}", err);
    }
}
