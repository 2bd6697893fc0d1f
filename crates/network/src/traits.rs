//! Traits abstraits pour le transport de messages
//!
//! La session ne dépend que de ces traits : `WebSocketConnector` les
//! implémente avec tokio-tungstenite, `SimulatedConnector` en mémoire pour
//! les tests.

use async_trait::async_trait;

use crate::NetworkResult;

/// Canal duplex de trames texte
///
/// `#[async_trait]` permet d'avoir des fonctions async dans les traits.
/// `Send` permet de confier le transport à la tâche de la session.
#[async_trait]
pub trait MessageTransport: Send {
    /// Envoie une trame texte
    ///
    /// # Erreurs
    /// - `NetworkError::WebSocket` : écriture impossible
    /// - `NetworkError::Closed` : le canal est fermé
    async fn send_text(&mut self, text: String) -> NetworkResult<()>;

    /// Attend la prochaine trame texte
    ///
    /// Retourne `None` quand le pair ferme proprement le canal. Les trames
    /// non textuelles (binaire, ping) sont ignorées par l'implémentation.
    async fn recv_text(&mut self) -> Option<NetworkResult<String>>;

    /// Ferme le canal
    ///
    /// Sans effet si le canal est déjà fermé.
    async fn close(&mut self) -> NetworkResult<()>;
}

/// Fabrique de transports
#[async_trait]
pub trait TransportConnector: Send + Sync {
    type Transport: MessageTransport + 'static;

    /// Ouvre un canal vers `url`
    ///
    /// # Erreurs
    /// `NetworkError::ConnectionFailed` si le serveur est injoignable
    async fn connect(&self, url: &str) -> NetworkResult<Self::Transport>;
}
