//! Crate network - session duplex de l'appel vocal
//!
//! Ce crate fournit la partie réseau de l'appel : le protocole de messages
//! JSON, le transport WebSocket, la session qui envoie l'audio capturé et
//! remonte l'audio synthétisé, et le client HTTP du catalogue.
//!
//! # Architecture
//!
//! - `error` : gestion d'erreurs
//! - `types` : messages du protocole, états, configuration, statistiques
//! - `traits` : traits abstraits de transport
//! - `transport` : implémentations WebSocket (réelle) et simulée
//! - `session` : session vocale pilotée par une tâche tokio
//! - `api` : client HTTP du catalogue
//!
//! # Example
//!
//! ```rust,no_run
//! use network::{SessionConfig, SessionEvent, VoiceSession, WebSocketConnector};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::from_api_base("http://localhost:8000")?;
//! let mut session = VoiceSession::open(&WebSocketConnector::new(), &config, "chat-id").await?;
//!
//! while let Some(event) = session.next_event().await {
//!     match event {
//!         SessionEvent::Audio(pcm) => println!("{} octets reçus", pcm.len()),
//!         SessionEvent::Closed(reason) => println!("fin: {}", reason.description()),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

// Modules internes
mod error;
mod types;
mod traits;
mod transport;
mod session;
pub mod api;

// Re-exports publics
pub use error::{NetworkError, NetworkResult};

pub use types::{
    decode_audio_payload, websocket_url, CloseReason, ConnectionState, SessionConfig,
    SessionStats, WireMessage,
};

pub use traits::{MessageTransport, TransportConnector};

pub use transport::{
    RemotePeer, SimulatedConnector, SimulatedTransport, WebSocketConnector, WebSocketTransport,
};

pub use session::{SessionEvent, VoiceSession};

pub use api::ApiClient;

/// Version du crate network
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fonctions utilitaires pour l'affichage d'un appel
pub mod utils {
    use std::time::Duration;

    /// Formate une durée d'appel en `mm:ss` (`h:mm:ss` au-delà d'une heure)
    ///
    /// # Example
    /// ```rust
    /// use network::utils;
    /// use std::time::Duration;
    ///
    /// assert_eq!(utils::format_call_duration(Duration::from_secs(75)), "01:15");
    /// assert_eq!(utils::format_call_duration(Duration::from_secs(3725)), "1:02:05");
    /// ```
    pub fn format_call_duration(duration: Duration) -> String {
        let total = duration.as_secs();
        let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);

        if hours > 0 {
            format!("{hours}:{minutes:02}:{seconds:02}")
        } else {
            format!("{minutes:02}:{seconds:02}")
        }
    }

    /// Formate un volume de données audio
    ///
    /// # Example
    /// ```rust
    /// use network::utils;
    ///
    /// assert_eq!(utils::format_bytes(4096), "4.0 KiB");
    /// assert_eq!(utils::format_bytes(512), "512 o");
    /// ```
    pub fn format_bytes(bytes: u64) -> String {
        const KIB: f64 = 1024.0;
        const MIB: f64 = KIB * 1024.0;

        match bytes as f64 {
            b if b >= MIB => format!("{:.1} MiB", b / MIB),
            b if b >= KIB => format!("{:.1} KiB", b / KIB),
            _ => format!("{bytes} o"),
        }
    }
}

/// Tests d'intégration du crate complet
#[cfg(test)]
mod integration_tests {
    use super::*;
    use audio::{AudioFrame, PlaybackBuffer};

    #[tokio::test]
    async fn test_audio_survives_the_wire() {
        let (connector, mut peers) = SimulatedConnector::new();
        let mut session = VoiceSession::open(&connector, &SessionConfig::test_config(), "boucle")
            .await
            .unwrap();
        let mut peer = peers.recv().await.unwrap();
        peer.recv().await.unwrap();

        // Le serveur renvoie tel quel ce qu'il reçoit
        let samples: Vec<i16> = vec![0, 16384, -16384, 32767];
        session.send_audio(&AudioFrame::new(samples, 16000, 0));
        let Some(Ok(WireMessage::Audio { data })) = peer.recv_message().await else {
            panic!("message audio attendu");
        };
        peer.send_raw(WireMessage::Audio { data }.to_json().unwrap());

        let Some(SessionEvent::Audio(pcm)) = session.next_event().await else {
            panic!("audio attendu");
        };
        let buffer = PlaybackBuffer::from_pcm16le(&pcm, 24000).unwrap();
        assert_eq!(buffer.samples[..3], [0.0, 0.5, -0.5]);

        session.shutdown().await;
    }

    #[test]
    fn test_display_helpers() {
        assert_eq!(utils::format_call_duration(std::time::Duration::from_millis(59_999)), "00:59");
        assert_eq!(utils::format_bytes(3 * 1024 * 1024), "3.0 MiB");
    }
}
