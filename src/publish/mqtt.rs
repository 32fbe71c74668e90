//! MQTT frame transport.
//!
//! One `MqttRuntime` owns the broker connection: a bounded-queue sync client
//! plus a background thread draining the connection event loop. Each stereo
//! side gets an `MqttFramePublisher` bound to its own topic
//! (`<prefix>/left/image_raw`, `<prefix>/right/image_raw`).
//!
//! Frames go out as JSON envelopes (sequence, stamp, frame id, dimensions,
//! encoding tag) with the pixel payload base64-encoded, QoS 0, non-retained.
//! The enqueue is non-blocking: a full request queue drops the frame instead
//! of stalling the scheduler. An availability topic (`<prefix>/status`)
//! carries retained online/offline states with a Last Will.
//!
//! Brokers must be loopback unless remote brokers are explicitly allowed.

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rumqttc::v5::{mqttbytes::QoS, Client, ClientError, Connection, Event, MqttOptions};
use serde::Serialize;
use std::net::IpAddr;
use std::time::Duration;

use super::{FramePublisher, PublishOutcome};
use crate::config::MqttSettings;
use crate::frame::{ImageMessage, StereoSide};

const PAYLOAD_ONLINE: &str = "online";
const PAYLOAD_OFFLINE: &str = "offline";
const AVAILABILITY_TOPIC_SUFFIX: &str = "status";

/// JSON envelope for one published frame.
#[derive(Serialize)]
struct ImageEnvelope<'a> {
    seq: u64,
    stamp_ms: u64,
    frame_id: &'a str,
    width: u32,
    height: u32,
    encoding: &'a str,
    /// Base64-encoded raw pixel bytes.
    data: String,
}

fn encode_envelope(message: &ImageMessage<'_>) -> Result<Vec<u8>> {
    let envelope = ImageEnvelope {
        seq: message.sequence,
        stamp_ms: message.stamp.as_millis(),
        frame_id: message.frame_id,
        width: message.frame.width,
        height: message.frame.height,
        encoding: message.frame.encoding.as_str(),
        data: BASE64.encode(&message.frame.data),
    };
    serde_json::to_vec(&envelope).context("serialize image envelope")
}

fn image_topic(prefix: &str, side: StereoSide) -> String {
    format!("{}/{}/image_raw", prefix, side.label())
}

fn availability_topic(prefix: &str) -> String {
    format!("{}/{}", prefix, AVAILABILITY_TOPIC_SUFFIX)
}

// ----------------------------------------------------------------------------
// Connection runtime
// ----------------------------------------------------------------------------

/// Broker connection plus its event-loop drain thread.
pub struct MqttRuntime {
    client: Client,
    availability_topic: String,
    topic_prefix: String,
    connection_handle: Option<std::thread::JoinHandle<()>>,
}

impl MqttRuntime {
    /// Connect to the configured broker and announce availability.
    pub fn connect(settings: &MqttSettings) -> Result<Self> {
        let endpoint = parse_mqtt_endpoint(&settings.broker_addr)?;
        if !settings.allow_remote {
            validate_loopback_addr(&endpoint, &settings.broker_addr)?;
        } else {
            log::warn!("Remote MQTT enabled - ensure broker is in a trusted network");
        }

        let mut options = MqttOptions::new(&settings.client_id, &endpoint.host, endpoint.port);
        options.set_keep_alive(Duration::from_secs(60));
        options.set_clean_start(true);
        if let Some(user) = &settings.username {
            options.set_credentials(user, settings.password.as_deref().unwrap_or_default());
        }
        let availability = availability_topic(&settings.topic_prefix);
        let will = rumqttc::v5::mqttbytes::v5::LastWill::new(
            availability.as_str(),
            PAYLOAD_OFFLINE.as_bytes().to_vec(),
            QoS::AtLeastOnce,
            true,
            None,
        );
        options.set_last_will(will);

        let (client, connection) = Client::new(options, settings.queue_capacity);
        let connection_handle = spawn_drain_thread(connection);
        log::info!(
            "Connected to MQTT broker {} (auth: {})",
            settings.broker_addr,
            settings.username.is_some()
        );

        let runtime = Self {
            client,
            availability_topic: availability,
            topic_prefix: settings.topic_prefix.clone(),
            connection_handle: Some(connection_handle),
        };
        runtime.publish_availability(PAYLOAD_ONLINE)?;
        Ok(runtime)
    }

    /// A publisher bound to one side's image topic, sharing this connection.
    pub fn publisher(&self, side: StereoSide) -> MqttFramePublisher {
        MqttFramePublisher {
            client: self.client.clone(),
            channel: side.label(),
            topic: image_topic(&self.topic_prefix, side),
        }
    }

    fn publish_availability(&self, payload: &str) -> Result<()> {
        self.client
            .publish(
                self.availability_topic.as_str(),
                QoS::AtLeastOnce,
                true,
                payload.as_bytes().to_vec(),
            )
            .with_context(|| format!("publish availability to {}", self.availability_topic))?;
        Ok(())
    }

    /// Announce offline, disconnect, and join the drain thread.
    pub fn disconnect(mut self) -> Result<()> {
        if let Err(e) = self.publish_availability(PAYLOAD_OFFLINE) {
            log::warn!("failed to publish offline availability: {e:#}");
        }
        self.client.disconnect()?;
        if let Some(handle) = self.connection_handle.take() {
            let _ = handle.join();
        }
        Ok(())
    }
}

fn spawn_drain_thread(mut connection: Connection) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        for event in connection.iter() {
            match event {
                Ok(Event::Incoming(_)) | Ok(Event::Outgoing(_)) => {}
                Err(e) => {
                    log::warn!("MQTT connection error: {}", e);
                    break;
                }
            }
        }
    })
}

// ----------------------------------------------------------------------------
// Per-channel publisher
// ----------------------------------------------------------------------------

/// Publishes one side's frames to its MQTT topic.
pub struct MqttFramePublisher {
    client: Client,
    channel: &'static str,
    topic: String,
}

impl FramePublisher for MqttFramePublisher {
    fn publish(&mut self, message: &ImageMessage<'_>) -> Result<PublishOutcome> {
        let payload = encode_envelope(message)?;
        match self
            .client
            .try_publish(self.topic.as_str(), QoS::AtMostOnce, false, payload)
        {
            Ok(()) => Ok(PublishOutcome::Accepted),
            // Bounded request queue is full: reject-newest, keep streaming.
            Err(ClientError::TryRequest(_)) => Ok(PublishOutcome::Dropped),
            Err(e) => Err(anyhow!(e)).with_context(|| format!("publish to {}", self.topic)),
        }
    }

    fn channel(&self) -> &str {
        self.channel
    }
}

// ----------------------------------------------------------------------------
// Broker address handling
// ----------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct MqttEndpoint {
    host: String,
    port: u16,
}

fn parse_mqtt_endpoint(addr: &str) -> Result<MqttEndpoint> {
    let mut remainder = addr.trim();

    if let Some((scheme, rest)) = remainder.split_once("://") {
        match scheme {
            "mqtt" | "tcp" => {}
            other => return Err(anyhow!("unsupported MQTT scheme: {}", other)),
        }
        remainder = rest;
    }

    let (host, port) = split_host_port(remainder)?;
    Ok(MqttEndpoint { host, port })
}

fn split_host_port(addr: &str) -> Result<(String, u16)> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, rest) = rest
            .split_once(']')
            .ok_or_else(|| anyhow!("invalid MQTT address: {}", addr))?;
        let port = rest
            .strip_prefix(':')
            .ok_or_else(|| anyhow!("missing MQTT port in {}", addr))?;
        let port: u16 = port.parse().context("invalid MQTT port")?;
        return Ok((host.to_string(), port));
    }

    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("missing MQTT port in {}", addr))?;
    let port: u16 = port.parse().context("invalid MQTT port")?;
    Ok((host.to_string(), port))
}

fn validate_loopback_addr(endpoint: &MqttEndpoint, original: &str) -> Result<()> {
    let host = endpoint.host.as_str();
    if host == "localhost" || host == "127.0.0.1" || host == "::1" {
        return Ok(());
    }
    if let Ok(ip) = host.parse::<IpAddr>() {
        if ip.is_loopback() {
            return Ok(());
        }
    }
    Err(anyhow!(
        "MQTT broker must be loopback for security: {} (use --allow-remote-mqtt to override)",
        original
    ))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{PixelEncoding, VideoFrame};
    use crate::Timestamp;

    #[test]
    fn envelope_carries_stamp_sequence_and_encoding() -> Result<()> {
        let frame = VideoFrame::new(vec![1, 2, 3], 1, 1, PixelEncoding::Bgr8);
        let message = ImageMessage {
            sequence: 31,
            stamp: Timestamp::from_millis(1_700_000_000_123),
            frame_id: "left_camera",
            frame: &frame,
        };

        let payload = encode_envelope(&message)?;
        let json: serde_json::Value = serde_json::from_slice(&payload)?;

        assert_eq!(json["seq"], 31);
        assert_eq!(json["stamp_ms"], 1_700_000_000_123u64);
        assert_eq!(json["frame_id"], "left_camera");
        assert_eq!(json["encoding"], "bgr8");
        assert_eq!(json["width"], 1);
        assert_eq!(json["data"], BASE64.encode([1u8, 2, 3]));

        Ok(())
    }

    #[test]
    fn image_topics_are_per_side() {
        assert_eq!(image_topic("camera", StereoSide::Left), "camera/left/image_raw");
        assert_eq!(
            image_topic("camera", StereoSide::Right),
            "camera/right/image_raw"
        );
        assert_eq!(availability_topic("camera"), "camera/status");
    }

    #[test]
    fn endpoint_parses_bare_and_scheme_addresses() -> Result<()> {
        let endpoint = parse_mqtt_endpoint("127.0.0.1:1883")?;
        assert_eq!(endpoint.host, "127.0.0.1");
        assert_eq!(endpoint.port, 1883);

        let endpoint = parse_mqtt_endpoint("mqtt://broker.local:1884")?;
        assert_eq!(endpoint.host, "broker.local");
        assert_eq!(endpoint.port, 1884);

        let endpoint = parse_mqtt_endpoint("[::1]:1883")?;
        assert_eq!(endpoint.host, "::1");
        assert_eq!(endpoint.port, 1883);

        Ok(())
    }

    #[test]
    fn tls_schemes_are_rejected() {
        assert!(parse_mqtt_endpoint("mqtts://broker:8883").is_err());
    }

    #[test]
    fn broker_rejects_non_loopback_without_flag() {
        let endpoint = parse_mqtt_endpoint("192.168.1.10:1883").expect("endpoint");
        let err = validate_loopback_addr(&endpoint, "192.168.1.10:1883").unwrap_err();
        assert!(format!("{err}").contains("loopback"));
    }

    #[test]
    fn broker_accepts_loopback_hosts() {
        for addr in ["127.0.0.1:1883", "localhost:1883", "[::1]:1883"] {
            let endpoint = parse_mqtt_endpoint(addr).expect("endpoint");
            assert!(validate_loopback_addr(&endpoint, addr).is_ok(), "{addr}");
        }
    }
}
