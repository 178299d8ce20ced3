use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_players")]
    pub max_players: u32,
    #[serde(default = "default_protocol_fingerprint")]
    pub protocol_fingerprint: String,
    #[serde(default = "default_handshake_timeout_millis")]
    pub handshake_timeout_millis: u64,
    #[serde(default = "default_keepalive_interval_millis")]
    pub keepalive_interval_millis: u64,
    #[serde(default = "default_keepalive_grace_millis")]
    pub keepalive_grace_millis: u64,
    #[serde(default)]
    pub worlds: Vec<WorldConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorldConfig {
    pub name: String,
    #[serde(default = "default_day_length")]
    pub day_length_millis: u64,
    #[serde(default = "default_night_length")]
    pub night_length_millis: u64,
    #[serde(default = "default_dilation")]
    pub dilation: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: "overworld".into(),
            day_length_millis: default_day_length(),
            night_length_millis: default_night_length(),
            dilation: default_dilation(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    25566
}

fn default_max_players() -> u32 {
    20
}

fn default_protocol_fingerprint() -> String {
    "ember-v1".into()
}

fn default_handshake_timeout_millis() -> u64 {
    10_000
}

fn default_keepalive_interval_millis() -> u64 {
    1_000
}

fn default_keepalive_grace_millis() -> u64 {
    10_000
}

fn default_day_length() -> u64 {
    24_000
}

fn default_night_length() -> u64 {
    12_000
}

fn default_dilation() -> f32 {
    1.0
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            max_players: default_max_players(),
            protocol_fingerprint: default_protocol_fingerprint(),
            handshake_timeout_millis: default_handshake_timeout_millis(),
            keepalive_interval_millis: default_keepalive_interval_millis(),
            keepalive_grace_millis: default_keepalive_grace_millis(),
            worlds: vec![WorldConfig::default()],
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: ServerConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::info!("No config file found at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = ServerConfig::load(Path::new("/nonexistent/ember.toml")).unwrap();
        assert_eq!(config.port, default_port());
        assert_eq!(config.worlds.len(), 1);
    }

    #[test]
    fn partial_toml_fills_remaining_fields_with_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            bind = "127.0.0.1"
            [[worlds]]
            name = "nether"
            "#,
        )
        .unwrap();
        assert_eq!(config.bind, "127.0.0.1");
        assert_eq!(config.port, default_port());
        assert_eq!(config.worlds[0].name, "nether");
        assert_eq!(config.worlds[0].day_length_millis, default_day_length());
    }
}
