//! Gestion d'erreurs pour la chaîne audio de l'appel
//!
//! Chaque famille d'erreur correspond à une politique différente côté appel :
//! une erreur de capture empêche l'appel de démarrer, une erreur de décodage
//! fait perdre un seul message, une erreur de lecture fait sauter un seul buffer.

use thiserror::Error;

/// Erreurs de la capture micro, du décodage et de la lecture
#[derive(Error, Debug)]
pub enum AudioError {
    /// Pas de micro ou pas de sortie audio sur l'hôte
    #[error("Aucun périphérique audio trouvé")]
    NoDeviceFound,

    /// L'accès au microphone a été refusé par le système
    #[error("Accès au microphone refusé: {0}")]
    PermissionDenied(String),

    /// Format du périphérique inutilisable ou `AudioConfig` invalide
    #[error("Erreur de configuration audio: {0}")]
    ConfigError(String),

    /// Erreur provenant de la librairie cpal au démarrage d'un stream
    #[error("Erreur cpal: {0}")]
    CpalError(#[from] cpal::PlayStreamError),

    /// Payload PCM reçu impossible à décoder
    #[error("Payload audio invalide: {0}")]
    DecodeError(String),

    /// Impossible de démarrer la lecture d'un buffer
    #[error("Échec de lecture: {0}")]
    PlaybackError(String),

    /// Périphérique retiré pendant l'appel
    #[error("Périphérique audio déconnecté")]
    DeviceDisconnected,

    /// Stream impossible à ouvrir
    #[error("Erreur d'initialisation: {0}")]
    InitializationError(String),
}

impl From<cpal::BuildStreamError> for AudioError {
    fn from(err: cpal::BuildStreamError) -> Self {
        match err {
            cpal::BuildStreamError::DeviceNotAvailable => AudioError::DeviceDisconnected,
            other => AudioError::ConfigError(format!("Erreur construction stream: {:?}", other)),
        }
    }
}

impl From<cpal::DefaultStreamConfigError> for AudioError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        AudioError::ConfigError(format!("Format par défaut du périphérique illisible: {:?}", err))
    }
}

impl From<cpal::PauseStreamError> for AudioError {
    fn from(err: cpal::PauseStreamError) -> Self {
        AudioError::ConfigError(format!("Mise en pause du stream impossible: {:?}", err))
    }
}

/// Result du crate audio
pub type AudioResult<T> = Result<T, AudioError>;
