//! Simulation settings read from the environment.

use monopoly_core::ActionSpace;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}={value} is not a valid number")]
    InvalidNumber { var: &'static str, value: String },

    #[error("Unknown action space {0:?} (expected flat or hierarchical)")]
    UnknownActionSpace(String),
}

/// How many games to play and how agents choose actions.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub games: u64,
    pub players: usize,
    pub seed: u64,
    /// Actions per game before the game is abandoned.
    pub max_steps: usize,
    pub space: ActionSpace,
    pub include_messages: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            games: 10,
            players: 4,
            seed: 0,
            max_steps: 5_000,
            space: ActionSpace::Flat,
            include_messages: false,
        }
    }
}

impl SimConfig {
    /// Read `SIM_*` variables, falling back to defaults for unset ones.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let space = match std::env::var("SIM_ACTION_SPACE") {
            Ok(value) => parse_space(&value)?,
            Err(_) => defaults.space,
        };
        Ok(Self {
            games: number("SIM_GAMES", defaults.games)?,
            players: number("SIM_PLAYERS", defaults.players)?,
            seed: number("SIM_SEED", defaults.seed)?,
            max_steps: number("SIM_MAX_STEPS", defaults.max_steps)?,
            space,
            include_messages: std::env::var("SIM_MESSAGES")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.include_messages),
        })
    }
}

fn number<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
        Err(_) => Ok(default),
    }
}

fn parse_space(value: &str) -> Result<ActionSpace, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "flat" => Ok(ActionSpace::Flat),
        "hierarchical" => Ok(ActionSpace::Hierarchical),
        _ => Err(ConfigError::UnknownActionSpace(value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_space() {
        assert_eq!(parse_space("Flat").unwrap(), ActionSpace::Flat);
        assert_eq!(parse_space(" hierarchical").unwrap(), ActionSpace::Hierarchical);
        assert!(matches!(
            parse_space("tree"),
            Err(ConfigError::UnknownActionSpace(_))
        ));
    }

    #[test]
    fn test_number_falls_back_to_default() {
        let value: u64 = number("SIM_TEST_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(value, 7);
    }
}
