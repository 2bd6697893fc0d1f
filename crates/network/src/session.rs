//! Session vocale sur le canal duplex
//!
//! Une session par appel. À l'ouverture, un seul message `initialize` part
//! avec l'identifiant de conversation. Ensuite une tâche pilote possède le
//! transport : elle envoie les messages sortants et transforme les trames
//! entrantes en `SessionEvent`. Pas de reconnexion : une fois fermée, la
//! session est morte.
//!
//! ```text
//! contrôleur ──send_audio()──> [file sortante] ──> tâche pilote ──> transport
//! contrôleur <──next_event()── [événements]   <── tâche pilote <── transport
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use audio::AudioFrame;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::types::decode_audio_payload;
use crate::{
    CloseReason, ConnectionState, MessageTransport, NetworkError, NetworkResult, SessionConfig,
    SessionStats, TransportConnector, WireMessage,
};

/// Événement remonté par la session
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// Payload audio décodé (PCM16 LE, 24 kHz)
    Audio(Vec<u8>),
    /// Le canal est fermé ; dernier événement de la session
    Closed(CloseReason),
}

/// Commande vers la tâche pilote
#[derive(Debug)]
enum Outbound {
    Frame(String),
    Close,
}

type SharedStats = Arc<Mutex<SessionStats>>;

fn lock_stats(stats: &SharedStats) -> MutexGuard<'_, SessionStats> {
    stats.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Session vocale ouverte
pub struct VoiceSession {
    chat_id: String,
    outbound: mpsc::UnboundedSender<Outbound>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    state: Arc<watch::Sender<ConnectionState>>,
    stats: SharedStats,
    driver: Option<JoinHandle<()>>,
}

impl VoiceSession {
    /// Ouvre le canal et démarre la conversation `chat_id`
    ///
    /// # Erreurs
    /// - `NetworkError::ConfigError` : configuration invalide
    /// - `NetworkError::ConnectionTimeout` : serveur trop lent
    /// - `NetworkError::ConnectionFailed` : serveur injoignable
    pub async fn open<C: TransportConnector>(
        connector: &C,
        config: &SessionConfig,
        chat_id: &str,
    ) -> NetworkResult<Self> {
        config.validate().map_err(NetworkError::ConfigError)?;

        let (state, _) = watch::channel(ConnectionState::Connecting);
        let state = Arc::new(state);

        info!(url = %config.server_url, chat_id, "📞 ouverture de la session");
        let mut transport = timeout(config.connect_timeout, connector.connect(&config.server_url))
            .await
            .map_err(|_| NetworkError::ConnectionTimeout {
                url: config.server_url.clone(),
                timeout_ms: config.connect_timeout.as_millis() as u64,
            })??;

        let initialize = WireMessage::initialize(chat_id).to_json()?;
        transport.send_text(initialize).await?;

        let stats = Arc::new(Mutex::new(SessionStats {
            opened_at: Some(std::time::Instant::now()),
            ..Default::default()
        }));
        state.send_replace(ConnectionState::Open);

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let driver = tokio::spawn(drive(
            transport,
            outbound_rx,
            events_tx,
            Arc::clone(&state),
            Arc::clone(&stats),
        ));

        info!(chat_id, "✅ session ouverte");
        Ok(Self {
            chat_id: chat_id.to_string(),
            outbound: outbound_tx,
            events: events_rx,
            state,
            stats,
            driver: Some(driver),
        })
    }

    /// Envoie une frame capturée
    ///
    /// La frame est abandonnée, sans erreur, si le canal n'est pas ouvert.
    /// Retourne `true` si elle a été confiée au transport.
    pub fn send_audio(&self, frame: &AudioFrame) -> bool {
        if !self.is_open() {
            lock_stats(&self.stats).frames_dropped += 1;
            debug!(seq = frame.sequence_number, "frame abandonnée, canal non ouvert");
            return false;
        }

        let text = match WireMessage::audio_frame(frame).to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "frame impossible à sérialiser");
                lock_stats(&self.stats).frames_dropped += 1;
                return false;
            }
        };

        let len = text.len() as u64;
        let mut stats = lock_stats(&self.stats);
        if self.outbound.send(Outbound::Frame(text)).is_ok() {
            stats.frames_sent += 1;
            stats.bytes_sent += len;
            true
        } else {
            stats.frames_dropped += 1;
            false
        }
    }

    /// Envoie un message texte saisi par l'utilisateur
    ///
    /// # Erreurs
    /// `NetworkError::NotReady` si le canal n'est pas ouvert
    pub fn send_text(&self, text: &str) -> NetworkResult<()> {
        if !self.is_open() {
            return Err(NetworkError::NotReady {
                state: self.state().description().to_string(),
            });
        }
        let json = WireMessage::text(text).to_json()?;
        self.outbound
            .send(Outbound::Frame(json))
            .map_err(|_| NetworkError::Closed)
    }

    /// Attend le prochain événement
    ///
    /// Retourne `None` une fois l'événement `Closed` consommé.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Ferme la session (idempotent)
    ///
    /// Les envois suivants sont abandonnés immédiatement ; l'événement
    /// `Closed(Local)` arrive quand la tâche pilote a fermé le transport.
    pub fn close(&self) {
        if self.state() == ConnectionState::Closed {
            return;
        }
        self.state.send_replace(ConnectionState::Closed);
        lock_stats(&self.stats).mark_closed();
        let _ = self.outbound.send(Outbound::Close);
    }

    /// Ferme la session et attend la fin de la tâche pilote
    pub async fn shutdown(mut self) {
        self.close();
        if let Some(driver) = self.driver.take() {
            let _ = driver.await;
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    pub fn stats(&self) -> SessionStats {
        lock_stats(&self.stats).clone()
    }
}

impl Drop for VoiceSession {
    fn drop(&mut self) {
        // La tâche pilote voit la file sortante se fermer et ferme le transport
        if self.state() != ConnectionState::Closed {
            debug!(chat_id = %self.chat_id, "session détruite sans fermeture explicite");
        }
    }
}

/// Boucle de la tâche pilote
async fn drive<T: MessageTransport>(
    mut transport: T,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<SessionEvent>,
    state: Arc<watch::Sender<ConnectionState>>,
    stats: SharedStats,
) {
    let reason = loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Frame(text)) => {
                    if let Err(e) = transport.send_text(text).await {
                        if e.ends_session() {
                            break CloseReason::Error(e.to_string());
                        }
                        warn!(error = %e, "envoi impossible, message perdu");
                    }
                }
                Some(Outbound::Close) | None => {
                    if let Err(e) = transport.close().await {
                        debug!(error = %e, "fermeture du transport en erreur");
                    }
                    break CloseReason::Local;
                }
            },
            inbound = transport.recv_text() => match inbound {
                Some(Ok(text)) => handle_inbound(&text, &events, &stats),
                Some(Err(e)) => break CloseReason::Error(e.to_string()),
                None => break CloseReason::Remote,
            },
        }
    };

    state.send_replace(ConnectionState::Closed);
    lock_stats(&stats).mark_closed();
    match &reason {
        CloseReason::Error(e) => error!(error = %e, "❌ session interrompue"),
        other => info!(reason = %other.description(), "🔌 session fermée"),
    }
    let _ = events.send(SessionEvent::Closed(reason));
}

/// Traite une trame entrante
///
/// Une trame illisible est journalisée et ignorée : elle ne ferme pas la session.
fn handle_inbound(text: &str, events: &mpsc::UnboundedSender<SessionEvent>, stats: &SharedStats) {
    let decoded = WireMessage::from_json(text).and_then(|message| match message {
        WireMessage::Audio { data } => decode_audio_payload(&data).map(Some),
        other => {
            debug!(kind = other.kind(), "message entrant inattendu ignoré");
            Ok(None)
        }
    });

    let mut stats = lock_stats(stats);
    stats.bytes_received += text.len() as u64;
    match decoded {
        Ok(Some(pcm)) => {
            stats.audio_received += 1;
            drop(stats);
            let _ = events.send(SessionEvent::Audio(pcm));
        }
        Ok(None) => stats.malformed_received += 1,
        Err(e) => {
            stats.malformed_received += 1;
            warn!(error = %e, len = text.len(), "message entrant invalide ignoré");
        }
    }
}
