//! Configuration d'un appel

use audio::AudioConfig;
use network::SessionConfig;
use serde::{Deserialize, Serialize};

/// Configuration complète d'un appel
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CallConfig {
    /// Format audio et réglages du gate
    pub audio: AudioConfig,

    /// Canal duplex
    pub session: SessionConfig,

    /// Micro coupé au démarrage
    pub start_muted: bool,

    /// Repasser à l'écoute quand la file de lecture se vide
    ///
    /// Par défaut l'appel reste `Speaking` après la première réponse.
    pub listen_after_playback: bool,
}

impl CallConfig {
    /// Valide l'ensemble de la configuration
    pub fn validate(&self) -> Result<(), String> {
        self.audio.validate()?;
        self.session.validate()?;
        Ok(())
    }

    /// Configuration pour les tests
    pub fn test_config() -> Self {
        Self {
            audio: AudioConfig::default(),
            session: SessionConfig::test_config(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = CallConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.start_muted);
        assert!(!config.listen_after_playback);
    }

    #[test]
    fn test_invalid_nested_config() {
        let mut config = CallConfig::test_config();
        config.session.server_url = "localhost".to_string();
        assert!(config.validate().is_err());
    }
}
