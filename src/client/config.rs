//! Connector connection settings.

use std::time::Duration;

use uuid::Uuid;

/// Read-only settings for one broker connection attempt.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Connector instance owning every device this link reports on.
    pub connector: Uuid,
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive: Duration,
    /// Bound on every command wait and on in-flight exchanges.
    pub flow_timeout: Duration,
}

impl ConnectorConfig {
    pub fn new(connector: Uuid, host: &str, port: u16) -> Self {
        Self {
            connector,
            host: host.to_owned(),
            port,
            client_id: format!("fb-mqtt-{connector}"),
            username: None,
            password: None,
            keep_alive: Duration::from_secs(20),
            flow_timeout: Duration::from_secs(10),
        }
    }

    /// Convenience for local development brokers.
    pub fn localhost(connector: Uuid) -> Self {
        Self::new(connector, "localhost", 1883)
    }

    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.username = Some(username.to_owned());
        self.password = Some(password.to_owned());

        self
    }
}
