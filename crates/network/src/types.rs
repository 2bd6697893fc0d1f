//! Types de données pour la session réseau
//!
//! - WireMessage : messages JSON échangés sur le canal duplex
//! - ConnectionState : états du canal
//! - SessionConfig : configuration de la session
//! - SessionStats : compteurs de la session

use std::time::{Duration, Instant};

use audio::{encode_pcm16le, AudioFrame};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{NetworkError, NetworkResult};

/// Message échangé sur le canal duplex, en trame texte JSON
///
/// Le champ `type` porte le discriminant :
///
/// ```json
/// {"type": "initialize", "chat_id": "abc"}
/// {"type": "audio", "data": "<base64 PCM16 LE>"}
/// {"type": "text", "data": "bonjour"}
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    /// Ouvre la conversation ; envoyé une seule fois, juste après l'ouverture
    Initialize { chat_id: String },

    /// Audio PCM16 little-endian mono encodé en base64
    ///
    /// 16 kHz en envoi, 24 kHz en réception.
    Audio { data: String },

    /// Texte saisi par l'utilisateur
    Text { data: String },
}

impl WireMessage {
    pub fn initialize(chat_id: impl Into<String>) -> Self {
        Self::Initialize {
            chat_id: chat_id.into(),
        }
    }

    /// Encode une frame capturée en message `audio`
    ///
    /// # Example
    /// ```rust
    /// use audio::AudioFrame;
    /// use network::WireMessage;
    ///
    /// let message = WireMessage::audio_frame(&AudioFrame::new(vec![1, -1], 16000, 0));
    /// assert_eq!(message, WireMessage::Audio { data: "AQD//w==".to_string() });
    /// ```
    pub fn audio_frame(frame: &AudioFrame) -> Self {
        Self::audio_bytes(&encode_pcm16le(&frame.samples))
    }

    /// Encode des octets PCM bruts en message `audio`
    pub fn audio_bytes(bytes: &[u8]) -> Self {
        Self::Audio {
            data: STANDARD.encode(bytes),
        }
    }

    pub fn text(data: impl Into<String>) -> Self {
        Self::Text { data: data.into() }
    }

    /// Sérialise en trame texte
    pub fn to_json(&self) -> NetworkResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Désérialise une trame texte
    pub fn from_json(text: &str) -> NetworkResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Nom du type, pour les logs
    pub fn kind(&self) -> &'static str {
        match self {
            WireMessage::Initialize { .. } => "initialize",
            WireMessage::Audio { .. } => "audio",
            WireMessage::Text { .. } => "text",
        }
    }
}

/// Décode le champ `data` d'un message `audio`
pub fn decode_audio_payload(data: &str) -> NetworkResult<Vec<u8>> {
    Ok(STANDARD.decode(data)?)
}

/// États du canal duplex
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connexion en cours
    Connecting,
    /// Canal ouvert et prêt à envoyer
    Open,
    /// Canal fermé, définitivement pour cette session
    Closed,
}

impl ConnectionState {
    /// Le canal accepte-t-il des envois ?
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    pub fn description(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "Connexion en cours",
            ConnectionState::Open => "Ouvert",
            ConnectionState::Closed => "Fermé",
        }
    }
}

/// Raison de fermeture d'une session
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// Fin d'appel demandée localement
    Local,
    /// Fermeture par le serveur
    Remote,
    /// Erreur de transport
    Error(String),
}

impl CloseReason {
    pub fn description(&self) -> String {
        match self {
            CloseReason::Local => "fin d'appel".to_string(),
            CloseReason::Remote => "fermé par le serveur".to_string(),
            CloseReason::Error(e) => format!("erreur de transport: {e}"),
        }
    }
}

/// Configuration de la session duplex
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// URL du canal duplex (`ws://` ou `wss://`)
    pub server_url: String,

    /// Délai maximal d'ouverture du canal
    pub connect_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://localhost:8000/ws".to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl SessionConfig {
    /// Configuration dérivée de l'URL de l'API HTTP
    ///
    /// `http://hote/` devient `ws://hote/ws`, `https` devient `wss`.
    pub fn from_api_base(api_base: &str) -> NetworkResult<Self> {
        Ok(Self {
            server_url: websocket_url(api_base)?,
            ..Default::default()
        })
    }

    /// Configuration pour les tests : timeout très court
    pub fn test_config() -> Self {
        Self {
            server_url: "ws://test.invalid/ws".to_string(),
            connect_timeout: Duration::from_millis(200),
        }
    }

    /// Valide que la configuration est cohérente
    pub fn validate(&self) -> Result<(), String> {
        if !(self.server_url.starts_with("ws://") || self.server_url.starts_with("wss://")) {
            return Err(format!(
                "URL de session invalide: {} (doit commencer par ws:// ou wss://)",
                self.server_url
            ));
        }

        if self.connect_timeout.is_zero() {
            return Err("Timeout de connexion nul".to_string());
        }

        Ok(())
    }
}

/// Dérive l'URL du canal duplex depuis l'URL de base de l'API
pub fn websocket_url(api_base: &str) -> NetworkResult<String> {
    let base = api_base.trim_end_matches('/');
    let rest = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        return Err(NetworkError::InvalidAddress {
            addr: api_base.to_string(),
        });
    };
    Ok(format!("{rest}/ws"))
}

/// Statistiques d'une session
#[derive(Clone, Debug)]
pub struct SessionStats {
    /// Frames audio envoyées
    pub frames_sent: u64,

    /// Frames abandonnées car le canal n'était pas ouvert
    pub frames_dropped: u64,

    /// Messages audio reçus et décodés
    pub audio_received: u64,

    /// Messages reçus illisibles ou inattendus
    pub malformed_received: u64,

    pub bytes_sent: u64,
    pub bytes_received: u64,

    /// Moment d'ouverture du canal
    pub opened_at: Option<Instant>,

    /// Moment de fermeture du canal, local ou distant
    pub closed_at: Option<Instant>,
}

// Implémentation manuelle de Default pour garder les instants à None
impl Default for SessionStats {
    fn default() -> Self {
        Self {
            frames_sent: 0,
            frames_dropped: 0,
            audio_received: 0,
            malformed_received: 0,
            bytes_sent: 0,
            bytes_received: 0,
            opened_at: None,
            closed_at: None,
        }
    }
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pourcentage de frames abandonnées
    pub fn drop_percentage(&self) -> f32 {
        let total = self.frames_sent + self.frames_dropped;
        if total == 0 {
            return 0.0;
        }
        self.frames_dropped as f32 / total as f32 * 100.0
    }

    /// Durée d'ouverture du canal, figée à la fermeture
    pub fn uptime(&self) -> Duration {
        match (self.opened_at, self.closed_at) {
            (Some(opened), Some(closed)) => closed.saturating_duration_since(opened),
            (Some(opened), None) => opened.elapsed(),
            _ => Duration::ZERO,
        }
    }

    /// Marque la fermeture ; seule la première compte
    pub fn mark_closed(&mut self) {
        if self.closed_at.is_none() {
            self.closed_at = Some(Instant::now());
        }
    }
}
