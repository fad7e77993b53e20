use crate::spectate::policy::{RoomPolicy, DEFAULT_DELAY_SECONDS, DEFAULT_MAX_SPECTATORS};

/// Spectator service configuration
#[derive(Debug, Clone)]
pub struct SpectateConfig {
    /// Delay applied to rooms without an explicit policy
    pub default_delay_seconds: i64,
    /// Spectator cap for rooms without an explicit policy
    pub default_max_spectators: i64,
    /// Whether rooms accept spectators unless configured otherwise
    pub default_allow_spectators: bool,
    /// Whether delayed views include hole cards unless configured otherwise
    pub default_show_hole_cards: bool,
    /// Port for the metrics endpoint
    pub metrics_port: u16,
}

impl Default for SpectateConfig {
    fn default() -> Self {
        Self {
            default_delay_seconds: DEFAULT_DELAY_SECONDS,
            default_max_spectators: DEFAULT_MAX_SPECTATORS,
            default_allow_spectators: true,
            default_show_hole_cards: true,
            metrics_port: 9090,
        }
    }
}

impl SpectateConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        Self::load_from(|key| std::env::var(key).ok())
    }

    /// Load config through `lookup` (environment in production)
    pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(delay) = lookup("SPECTATOR_DEFAULT_DELAY") {
            match delay.parse::<i64>() {
                Ok(parsed) if parsed > 0 => config.default_delay_seconds = parsed,
                Ok(_) => {
                    tracing::warn!("SPECTATOR_DEFAULT_DELAY must be > 0, using default");
                }
                Err(_) => {
                    tracing::warn!("Invalid SPECTATOR_DEFAULT_DELAY '{}', using default", delay);
                }
            }
        }

        if let Some(max) = lookup("SPECTATOR_MAX_DEFAULT") {
            if let Ok(parsed) = max.parse::<i64>() {
                config.default_max_spectators = parsed;
            } else {
                tracing::warn!("Invalid SPECTATOR_MAX_DEFAULT '{}', using default", max);
            }
        }

        if let Some(allow) = lookup("SPECTATOR_ALLOW_DEFAULT") {
            match parse_bool(&allow) {
                Some(parsed) => config.default_allow_spectators = parsed,
                None => tracing::warn!("Invalid SPECTATOR_ALLOW_DEFAULT '{}', using default", allow),
            }
        }

        if let Some(show) = lookup("SPECTATOR_SHOW_HOLE_CARDS") {
            match parse_bool(&show) {
                Some(parsed) => config.default_show_hole_cards = parsed,
                None => tracing::warn!("Invalid SPECTATOR_SHOW_HOLE_CARDS '{}', using default", show),
            }
        }

        if let Some(port) = lookup("METRICS_PORT") {
            if let Ok(parsed) = port.parse::<u16>() {
                if parsed > 0 {
                    config.metrics_port = parsed;
                } else {
                    tracing::warn!("METRICS_PORT must be > 0, using default");
                }
            } else {
                tracing::warn!("Invalid METRICS_PORT '{}', using default", port);
            }
        }

        config
    }

    /// Policy for rooms that never had one set
    pub fn default_policy(&self) -> RoomPolicy {
        RoomPolicy {
            spectating_allowed: self.default_allow_spectators,
            delay_seconds: self.default_delay_seconds,
            max_spectators: self.default_max_spectators,
            show_hole_cards: self.default_show_hole_cards,
        }
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.metrics_port == 0 {
            return Err("Metrics port cannot be 0".to_string());
        }
        if self.default_delay_seconds <= 0 {
            return Err("default_delay_seconds must be at least 1".to_string());
        }
        if self.default_max_spectators < 0 {
            return Err("default_max_spectators cannot be negative".to_string());
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
