//! Gestion d'erreurs pour la session réseau
//!
//! Ce module suit les mêmes patterns que le module audio : une énumération
//! `thiserror` avec messages en français et un alias `NetworkResult`.

use thiserror::Error;

/// Énumération de toutes les erreurs possibles côté réseau
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Impossible d'établir la connexion vers le serveur
    #[error("Connexion impossible vers {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    /// Le serveur n'a pas répondu dans le délai de connexion
    #[error("Timeout de connexion vers {url} après {timeout_ms}ms")]
    ConnectionTimeout { url: String, timeout_ms: u64 },

    /// Erreur de la couche WebSocket
    #[error("Erreur WebSocket: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Erreur lors de la sérialisation/désérialisation JSON
    #[error("Erreur de sérialisation: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Payload base64 invalide
    #[error("Payload base64 invalide: {0}")]
    InvalidPayload(#[from] base64::DecodeError),

    /// Le canal n'est pas ouvert
    #[error("Canal non prêt (état {state})")]
    NotReady { state: String },

    /// La session est fermée
    #[error("Session fermée")]
    Closed,

    /// URL invalide fournie par l'utilisateur
    #[error("Adresse invalide: {addr}")]
    InvalidAddress { addr: String },

    /// Erreur HTTP vers l'API de catalogue
    #[error("Erreur HTTP: {0}")]
    Http(#[from] reqwest::Error),

    /// Réponse non 2xx de l'API de catalogue
    #[error("Échec de l'appel {endpoint} (statut {status})")]
    Api { endpoint: String, status: u16 },

    /// Erreur de configuration réseau
    #[error("Configuration réseau invalide: {0}")]
    ConfigError(String),
}

/// Type Result personnalisé pour notre crate network
pub type NetworkResult<T> = Result<T, NetworkError>;

impl NetworkError {
    /// Crée une erreur de connexion avec contexte
    pub fn connection_failed(url: &str, cause: impl std::fmt::Display) -> Self {
        Self::ConnectionFailed {
            url: url.to_string(),
            reason: cause.to_string(),
        }
    }

    /// L'erreur termine-t-elle la session ?
    ///
    /// Les erreurs de payload ne coûtent qu'un message ; les erreurs de
    /// transport ferment la session et l'appel avec.
    pub fn ends_session(&self) -> bool {
        matches!(
            self,
            NetworkError::ConnectionFailed { .. }
                | NetworkError::ConnectionTimeout { .. }
                | NetworkError::WebSocket(_)
                | NetworkError::Closed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = NetworkError::Api {
            endpoint: "/chats".to_string(),
            status: 500,
        };
        assert_eq!(error.to_string(), "Échec de l'appel /chats (statut 500)");

        let error = NetworkError::connection_failed("ws://localhost:8000/ws", "refusée");
        assert_eq!(
            error.to_string(),
            "Connexion impossible vers ws://localhost:8000/ws: refusée"
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(NetworkError::Closed.ends_session());

        let payload = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = NetworkError::from(payload);
        assert!(!error.ends_session());

        let not_ready = NetworkError::NotReady {
            state: "Connecting".to_string(),
        };
        assert!(!not_ready.ends_session());
    }
}
