use crate::error::ConfigError;

/// Tunables for a running server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Connections beyond this count are refused with a "Server full" error
    pub max_players: usize,
    /// A game whose move log grows past this length ends in a draw
    pub move_limit: usize,
    /// Fixes the color assignment RNG; random when None
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_players: 64,
            move_limit: 200,
            seed: None,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_players < 2 {
            return Err(ConfigError::Validation(
                "max_players must be at least 2".into(),
            ));
        }
        if self.move_limit == 0 {
            return Err(ConfigError::Validation("move_limit must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ServerConfig::default();
        assert_eq!(config.move_limit, 200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_degenerate_limits() {
        let config = ServerConfig {
            max_players: 1,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            move_limit: 0,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
