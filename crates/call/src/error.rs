//! Gestion d'erreurs du contrôleur d'appel

use audio::AudioError;
use network::NetworkError;
use thiserror::Error;

/// Erreurs remontées par le contrôleur
#[derive(Error, Debug)]
pub enum CallError {
    /// Un appel est déjà en cours
    #[error("Un appel est déjà en cours")]
    AlreadyActive,

    /// Aucun appel en cours
    #[error("Aucun appel en cours")]
    NotActive,

    /// Le micro n'a pas pu démarrer ; l'appel n'a pas eu lieu
    #[error("Capture impossible: {0}")]
    Capture(#[from] AudioError),

    /// Le canal n'a pas pu s'ouvrir ou a échoué
    #[error("Erreur réseau: {0}")]
    Network(#[from] NetworkError),

    /// Configuration invalide
    #[error("Configuration d'appel invalide: {0}")]
    Config(String),
}

pub type CallResult<T> = Result<T, CallError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = CallError::from(AudioError::NoDeviceFound);
        assert_eq!(error.to_string(), "Capture impossible: Aucun périphérique audio trouvé");
        assert_eq!(CallError::AlreadyActive.to_string(), "Un appel est déjà en cours");
    }
}
