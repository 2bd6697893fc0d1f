//! Implémentations du transport de messages
//!
//! - `WebSocketConnector` / `WebSocketTransport` : vrai canal WebSocket avec
//!   tokio-tungstenite
//! - `SimulatedConnector` / `SimulatedTransport` : canal en mémoire, piloté par
//!   un `RemotePeer` qui joue le rôle du serveur dans les tests

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace};

use crate::{MessageTransport, NetworkError, NetworkResult, TransportConnector, WireMessage};

/// Connecteur WebSocket
#[derive(Clone, Debug, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransportConnector for WebSocketConnector {
    type Transport = WebSocketTransport;

    async fn connect(&self, url: &str) -> NetworkResult<Self::Transport> {
        debug!(url, "ouverture du WebSocket");
        let (stream, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| NetworkError::connection_failed(url, e))?;

        info!(url, status = %response.status(), "🌐 WebSocket ouvert");
        Ok(WebSocketTransport {
            stream,
            closed: false,
        })
    }
}

/// Canal WebSocket ouvert
pub struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

#[async_trait]
impl MessageTransport for WebSocketTransport {
    async fn send_text(&mut self, text: String) -> NetworkResult<()> {
        if self.closed {
            return Err(NetworkError::Closed);
        }
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv_text(&mut self) -> Option<NetworkResult<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "fermeture reçue du serveur");
                    self.closed = true;
                    return None;
                }
                Ok(other) => {
                    // Binaire, ping, pong : rien à faire côté appel
                    trace!(len = other.len(), "trame non textuelle ignorée");
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) -> NetworkResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.stream.close(None).await {
            Ok(()) => Ok(()),
            Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed)
            | Err(tokio_tungstenite::tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Trame livrée au client simulé
#[derive(Debug)]
enum SimulatedFrame {
    Text(String),
    Error(String),
}

/// Extrémité serveur d'un canal simulé
///
/// Le test reçoit un `RemotePeer` par connexion ouverte et s'en sert pour
/// lire ce que le client envoie et pousser des messages vers lui.
pub struct RemotePeer {
    url: String,
    to_client: Option<mpsc::UnboundedSender<SimulatedFrame>>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl RemotePeer {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Prochaine trame texte envoyée par le client ; `None` après sa fermeture
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Prochaine trame décodée en `WireMessage`
    pub async fn recv_message(&mut self) -> Option<NetworkResult<WireMessage>> {
        let text = self.recv().await?;
        Some(WireMessage::from_json(&text))
    }

    /// Trame déjà reçue, sans attendre
    pub fn try_recv(&mut self) -> Option<String> {
        self.from_client.try_recv().ok()
    }

    /// Envoie une trame texte brute au client
    pub fn send_raw(&self, text: impl Into<String>) -> bool {
        self.push(SimulatedFrame::Text(text.into()))
    }

    /// Envoie un message au client
    pub fn send_message(&self, message: &WireMessage) -> bool {
        match message.to_json() {
            Ok(text) => self.send_raw(text),
            Err(_) => false,
        }
    }

    /// Envoie un message `audio` contenant ces octets PCM
    pub fn send_audio(&self, pcm: &[u8]) -> bool {
        self.send_message(&WireMessage::audio_bytes(pcm))
    }

    /// Simule une erreur de transport côté client
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.push(SimulatedFrame::Error(reason.into()))
    }

    /// Ferme proprement le canal côté serveur
    pub fn close(&mut self) {
        self.to_client = None;
    }

    fn push(&self, frame: SimulatedFrame) -> bool {
        self.to_client
            .as_ref()
            .map(|tx| tx.send(frame).is_ok())
            .unwrap_or(false)
    }
}

#[derive(Default)]
struct ConnectorState {
    refuse: bool,
    connections: u32,
}

/// Connecteur en mémoire pour les tests
#[derive(Clone)]
pub struct SimulatedConnector {
    state: Arc<Mutex<ConnectorState>>,
    peers: mpsc::UnboundedSender<RemotePeer>,
}

impl SimulatedConnector {
    /// Crée un connecteur et le flux des extrémités serveur de ses connexions
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RemotePeer>) {
        let (peers, peers_rx) = mpsc::unbounded_channel();
        let connector = Self {
            state: Arc::new(Mutex::new(ConnectorState::default())),
            peers,
        };
        (connector, peers_rx)
    }

    /// Les connexions suivantes sont refusées
    pub fn refuse_connections(&self, refuse: bool) {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).refuse = refuse;
    }

    /// Nombre de connexions ouvertes
    pub fn connections(&self) -> u32 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).connections
    }
}

#[async_trait]
impl TransportConnector for SimulatedConnector {
    type Transport = SimulatedTransport;

    async fn connect(&self, url: &str) -> NetworkResult<Self::Transport> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.refuse {
                return Err(NetworkError::connection_failed(url, "connexion refusée (simulée)"));
            }
            state.connections += 1;
        }

        let (to_client, from_server) = mpsc::unbounded_channel();
        let (to_server, from_client) = mpsc::unbounded_channel();

        let peer = RemotePeer {
            url: url.to_string(),
            to_client: Some(to_client),
            from_client,
        };
        if self.peers.send(peer).is_err() {
            return Err(NetworkError::connection_failed(url, "aucun serveur simulé"));
        }

        debug!(url, "transport simulé ouvert");
        Ok(SimulatedTransport {
            url: url.to_string(),
            incoming: from_server,
            outgoing: Some(to_server),
        })
    }
}

/// Extrémité client d'un canal simulé
pub struct SimulatedTransport {
    url: String,
    incoming: mpsc::UnboundedReceiver<SimulatedFrame>,
    outgoing: Option<mpsc::UnboundedSender<String>>,
}

#[async_trait]
impl MessageTransport for SimulatedTransport {
    async fn send_text(&mut self, text: String) -> NetworkResult<()> {
        let outgoing = self.outgoing.as_ref().ok_or(NetworkError::Closed)?;
        outgoing.send(text).map_err(|_| NetworkError::Closed)
    }

    async fn recv_text(&mut self) -> Option<NetworkResult<String>> {
        match self.incoming.recv().await? {
            SimulatedFrame::Text(text) => Some(Ok(text)),
            SimulatedFrame::Error(reason) => {
                Some(Err(NetworkError::connection_failed(&self.url, reason)))
            }
        }
    }

    async fn close(&mut self) -> NetworkResult<()> {
        // Le serveur simulé voit la fin de son flux
        self.outgoing = None;
        Ok(())
    }
}
