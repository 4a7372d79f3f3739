// src/publisher.rs
//
// Publisher (spec.md §4.6): publishes each frame to the broker under
// `<namespace>/<site>/<tank>/<device>/telemetry`. Built directly on
// rumqttc::AsyncClient, the teacher's own MQTT dependency — its
// reconnect/event loop is a given, not reimplemented here.

use rumqttc::{AsyncClient, MqttOptions, QoS};
use std::time::Duration;

use crate::config::GatewayConfig;
use crate::types::TelemetryFrame;

pub struct Publisher {
    client: AsyncClient,
    namespace: String,
    site_id: String,
}

impl Publisher {
    /// Connects a client and spawns its event loop driver task (rumqttc
    /// requires the eventloop to be polled continuously or publishes
    /// silently stall).
    pub fn connect(config: &GatewayConfig) -> Self {
        let client_id = format!("pollgate-{}", config.site_id);
        let mut opts = MqttOptions::new(client_id, config.mqtt_host.clone(), config.mqtt_port);
        opts.set_keep_alive(Duration::from_secs(30));
        if let (Some(user), Some(pass)) = (&config.mqtt_username, &config.mqtt_password) {
            opts.set_credentials(user.clone(), pass.clone());
        }

        let (client, mut eventloop) = AsyncClient::new(opts, 64);

        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(_event) => {}
                    Err(e) => {
                        tlog!("[publisher] mqtt event loop error: {}", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Self {
            client,
            namespace: config.mqtt_namespace.clone(),
            site_id: config.site_id.clone(),
        }
    }

    pub fn topic_for(&self, frame: &TelemetryFrame) -> String {
        format!(
            "{}/{}/{}/{}/telemetry",
            self.namespace, self.site_id, frame.tank_id, frame.device_id
        )
    }

    /// Publish a frame. Errors are logged but never fail the tick
    /// (spec.md §4.6).
    pub async fn publish(&self, frame: &TelemetryFrame) {
        let topic = self.topic_for(frame);
        let payload = match serde_json::to_vec(frame) {
            Ok(p) => p,
            Err(e) => {
                tlog!("[publisher] failed to serialize frame for {}: {}", topic, e);
                return;
            }
        };

        if let Err(e) = self
            .client
            .publish(&topic, QoS::AtLeastOnce, false, payload)
            .await
        {
            tlog!("[publisher] publish to {} failed: {}", topic, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_matches_spec_pattern() {
        let frame = TelemetryFrame {
            ts_utc: chrono::Utc::now(),
            schema_ver: 1,
            site_id: "site01".to_string(),
            tank_id: "T1".to_string(),
            device_id: "ctrl-T1".to_string(),
            fw: None,
            s: Default::default(),
            qc: crate::types::Qc {
                status: crate::types::QcStatus::Ok,
                error: None,
            },
        };
        let publisher_namespace = "telemetry";
        let site_id = "site01";
        let topic = format!(
            "{}/{}/{}/{}/telemetry",
            publisher_namespace, site_id, frame.tank_id, frame.device_id
        );
        assert_eq!(topic, "telemetry/site01/T1/ctrl-T1/telemetry");
    }
}
