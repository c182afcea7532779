use super::RequestsLoggingLevel;
use crate::config::{AppConfig, SslSettings, DEFAULT_BIND_ADDRESS};

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub bind_address: String,
    pub port: u16,
    /// When set, the primary listener serves HTTPS.
    pub ssl: Option<SslSettings>,
}

impl ServerConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            requests_logging_level: config.logging_level.clone(),
            bind_address: config.bind_address.clone(),
            port: config.port,
            ssl: config.ssl.clone(),
        }
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Plain HTTP redirect listener, only when HTTPS is served on the standard port.
    pub fn redirect_address(&self) -> Option<String> {
        if self.ssl.is_some() && self.port == 443 {
            Some(format!("{}:80", self.bind_address))
        } else {
            None
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: 3001,
            ssl: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_redirect_only_for_https_on_443() {
        let ssl = Some(SslSettings {
            cert_path: PathBuf::from("cert.pem"),
            key_path: PathBuf::from("key.pem"),
        });

        let plain = ServerConfig {
            port: 443,
            ..Default::default()
        };
        assert_eq!(plain.redirect_address(), None);

        let https_other_port = ServerConfig {
            port: 8443,
            ssl: ssl.clone(),
            ..Default::default()
        };
        assert_eq!(https_other_port.redirect_address(), None);

        let https = ServerConfig {
            bind_address: "0.0.0.0".to_string(),
            port: 443,
            ssl,
            ..Default::default()
        };
        assert_eq!(https.listen_address(), "0.0.0.0:443");
        assert_eq!(https.redirect_address(), Some("0.0.0.0:80".to_string()));
    }
}
