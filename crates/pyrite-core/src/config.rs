//! Configuration for the pyrite driver

use serde::{Deserialize, Serialize};

/// Driver configuration
///
/// The driver supports a single framebuffer resolution; `viewport` calls for
/// any other extent are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Framebuffer width in pixels
    pub framebuffer_width: u32,
    /// Framebuffer height in pixels
    pub framebuffer_height: u32,
    /// Maximum depth value of the fixed-point z buffer
    pub max_z: f32,
    /// Push buffer capacity in 32-bit words
    pub push_buffer_words: usize,
    /// Default log filter when RUST_LOG is unset
    pub log_filter: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            framebuffer_width: 640,
            framebuffer_height: 480,
            max_z: 0x00FF_FFFF as f32,
            push_buffer_words: 64 * 1024,
            log_filter: "info".to_string(),
        }
    }
}

impl DriverConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Serialize the configuration to TOML text
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DriverConfig::default();
        assert_eq!(config.framebuffer_width, 640);
        assert_eq!(config.framebuffer_height, 480);
        assert!(config.push_buffer_words > 0);
    }

    #[test]
    fn test_partial_toml() {
        let config = DriverConfig::from_toml("framebuffer_width = 640\n").unwrap();
        assert_eq!(config.framebuffer_width, 640);
        assert_eq!(config.framebuffer_height, 480);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = DriverConfig::default();
        let text = config.to_toml();
        let back = DriverConfig::from_toml(&text).unwrap();
        assert_eq!(back.max_z, config.max_z);
        assert_eq!(back.log_filter, config.log_filter);
    }
}
