//! Contrôleur d'appel
//!
//! Le contrôleur orchestre la capture, la session et le séquenceur de
//! lecture, et tient la machine à états de l'appel. Il tourne dans une seule
//! tâche : `next_update` attend le prochain événement parmi les frames
//! capturées, les événements de session et les fins de lecture, le traite,
//! et le remonte à l'interface.
//!
//! Toutes les ressources d'un appel (processeur de capture, session, file
//! de lecture) sont créées par `start_call` et détruites ensemble par la fin
//! d'appel, qu'elle soit locale, distante ou due à une erreur.

use audio::{
    AudioFrame, AudioInput, AudioOutput, CaptureHandle, CaptureProcessor, PlaybackBuffer,
    PlaybackId, PlaybackProgress, PlaybackSequencer,
};
use network::{CloseReason, SessionEvent, SessionStats, TransportConnector, VoiceSession};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::CallConfig;
use crate::error::{CallError, CallResult};
use crate::state::{transition, CallEvent, CallState};

/// Ce qui s'est passé pendant un tour de `next_update`
#[derive(Clone, Debug, PartialEq)]
pub enum CallUpdate {
    /// L'état visible a changé
    StateChanged { from: CallState, to: CallState },
    /// Une frame a été confiée au canal
    FrameSent { sequence: u64 },
    /// Une frame a été retenue car le micro est coupé
    FrameMuted { sequence: u64 },
    /// Une frame a été abandonnée car le canal n'était pas prêt
    FrameDropped { sequence: u64 },
    /// Un buffer reçu a été mis en file de lecture
    AudioQueued { samples: usize },
    /// Un payload reçu était illisible
    AudioDiscarded,
    /// Un buffer a fini de jouer
    PlaybackAdvanced { progress: PlaybackProgress },
    /// L'appel est terminé ; l'état est `Idle`
    Ended(CloseReason),
}

/// Compteurs cumulés sur la vie du contrôleur
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallStats {
    pub calls_started: u64,
    pub frames_forwarded: u64,
    pub frames_muted: u64,
    pub frames_dropped: u64,
    pub buffers_queued: u64,
    pub decode_failures: u64,
}

/// Ressources d'un appel en cours
struct ActiveCall {
    session: VoiceSession,
    capture: CaptureHandle,
    frames: mpsc::UnboundedReceiver<AudioFrame>,
    capture_closed: bool,
}

/// Réveil de la boucle d'événements
enum Wake {
    Frame(Option<AudioFrame>),
    Session(Option<SessionEvent>),
    Completion(PlaybackId),
}

/// Contrôleur d'appel générique sur ses périphériques et son transport
pub struct CallController<I: AudioInput, O: AudioOutput, C: TransportConnector> {
    config: CallConfig,
    connector: C,
    input: I,
    sequencer: PlaybackSequencer<O>,
    completions: mpsc::UnboundedReceiver<PlaybackId>,
    state: CallState,
    muted: bool,
    active: Option<ActiveCall>,
    last_session: Option<SessionStats>,
    stats: CallStats,
}

impl<I: AudioInput, O: AudioOutput, C: TransportConnector> CallController<I, O, C> {
    /// Crée un contrôleur au repos
    ///
    /// # Erreurs
    /// `CallError::Config` si la configuration est invalide
    pub fn new(config: CallConfig, input: I, output: O, connector: C) -> CallResult<Self> {
        config.validate().map_err(CallError::Config)?;

        let (sequencer, completions) = PlaybackSequencer::new(output);
        Ok(Self {
            muted: config.start_muted,
            config,
            connector,
            input,
            sequencer,
            completions,
            state: CallState::Idle,
            active: None,
            last_session: None,
            stats: CallStats::default(),
        })
    }

    /// Démarre un appel avec l'interlocuteur `chat_id`
    ///
    /// Ouvre la session, passe à `Listening`, puis démarre la capture.
    ///
    /// # Erreurs
    /// - `CallError::AlreadyActive` : un appel est déjà en cours
    /// - `CallError::Network` : le canal n'a pas pu s'ouvrir
    /// - `CallError::Capture` : le micro n'a pas pu démarrer ; la session est
    ///   refermée et l'état revient à `Idle`
    pub async fn start_call(&mut self, chat_id: &str) -> CallResult<()> {
        if self.active.is_some() {
            return Err(CallError::AlreadyActive);
        }

        let session = VoiceSession::open(&self.connector, &self.config.session, chat_id).await?;
        self.apply(CallEvent::SessionOpened);

        let (processor, capture, frames) = CaptureProcessor::new(&self.config.audio);
        if let Err(e) = self.input.start(processor) {
            warn!(error = %e, "❌ micro indisponible, appel annulé");
            session.shutdown().await;
            self.apply(CallEvent::SessionClosed);
            return Err(CallError::Capture(e));
        }

        self.stats.calls_started += 1;
        info!(chat_id, device = %self.input.device_info(), muted = self.muted, "📞 appel démarré");

        self.active = Some(ActiveCall {
            session,
            capture,
            frames,
            capture_closed: false,
        });
        Ok(())
    }

    /// Attend et traite le prochain événement de l'appel
    ///
    /// Retourne `None` s'il n'y a pas d'appel en cours.
    pub async fn next_update(&mut self) -> Option<CallUpdate> {
        loop {
            let wake = {
                let active = self.active.as_mut()?;
                tokio::select! {
                    frame = active.frames.recv(), if !active.capture_closed => Wake::Frame(frame),
                    event = active.session.next_event() => Wake::Session(event),
                    Some(id) = self.completions.recv() => Wake::Completion(id),
                }
            };

            let update = match wake {
                Wake::Frame(Some(frame)) => self.forward_frame(frame),
                Wake::Frame(None) => {
                    // Le périphérique a libéré le processeur ; l'appel continue côté écoute
                    debug!("flux de capture terminé");
                    if let Some(active) = self.active.as_mut() {
                        active.capture_closed = true;
                    }
                    continue;
                }
                Wake::Session(Some(SessionEvent::Audio(pcm))) => self.handle_remote_audio(&pcm),
                Wake::Session(Some(SessionEvent::Closed(reason))) => {
                    self.teardown().await;
                    CallUpdate::Ended(reason)
                }
                Wake::Session(None) => {
                    self.teardown().await;
                    CallUpdate::Ended(CloseReason::Error("session interrompue".to_string()))
                }
                Wake::Completion(id) => self.handle_completion(id),
            };
            return Some(update);
        }
    }

    fn forward_frame(&mut self, frame: AudioFrame) -> CallUpdate {
        let sequence = frame.sequence_number;

        if self.muted {
            self.stats.frames_muted += 1;
            return CallUpdate::FrameMuted { sequence };
        }

        let sent = self
            .active
            .as_ref()
            .map(|active| active.session.send_audio(&frame))
            .unwrap_or(false);

        if sent {
            self.stats.frames_forwarded += 1;
            CallUpdate::FrameSent { sequence }
        } else {
            self.stats.frames_dropped += 1;
            CallUpdate::FrameDropped { sequence }
        }
    }

    fn handle_remote_audio(&mut self, pcm: &[u8]) -> CallUpdate {
        let buffer = match PlaybackBuffer::from_pcm16le(pcm, self.config.audio.playback_sample_rate) {
            Ok(buffer) => buffer,
            Err(e) => {
                warn!(error = %e, "payload audio ignoré");
                self.stats.decode_failures += 1;
                return CallUpdate::AudioDiscarded;
            }
        };

        let samples = buffer.len();
        self.sequencer.enqueue(buffer);
        self.stats.buffers_queued += 1;

        let from = self.state;
        let to = self.apply(CallEvent::RemoteAudio);
        if from != to {
            CallUpdate::StateChanged { from, to }
        } else {
            CallUpdate::AudioQueued { samples }
        }
    }

    fn handle_completion(&mut self, id: PlaybackId) -> CallUpdate {
        let progress = self.sequencer.on_playback_complete(id);
        if progress == PlaybackProgress::Drained {
            let from = self.state;
            let to = self.apply(CallEvent::PlaybackDrained);
            if from != to {
                return CallUpdate::StateChanged { from, to };
            }
        }
        CallUpdate::PlaybackAdvanced { progress }
    }

    /// Termine l'appel en cours (idempotent)
    ///
    /// Arrête l'émission, ferme le canal, libère le micro, vide la file de
    /// lecture et revient à `Idle`.
    pub async fn end_call(&mut self) {
        if self.active.is_none() {
            self.state = CallState::Idle;
            return;
        }
        info!("📴 fin d'appel demandée");
        self.teardown().await;
    }

    async fn teardown(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        active.capture.stop();
        active.session.close();

        if let Err(e) = self.input.stop() {
            warn!(error = %e, "arrêt du micro en échec");
        }

        self.sequencer.clear();
        // Frames en vol : abandonnées avec le récepteur
        drop(active.frames);

        self.apply(CallEvent::SessionClosed);

        let session_stats = active.session.stats();
        info!(
            sent = session_stats.frames_sent,
            dropped = session_stats.frames_dropped,
            received = session_stats.audio_received,
            "appel terminé"
        );
        self.last_session = Some(session_stats);

        // Seul point d'attente : l'état est déjà cohérent si l'appelant abandonne ici
        active.session.shutdown().await;
    }

    fn apply(&mut self, event: CallEvent) -> CallState {
        let next = transition(self.state, event, self.config.listen_after_playback);
        if next != self.state {
            debug!(from = ?self.state, to = ?next, ?event, "changement d'état");
            self.state = next;
        }
        next
    }

    /// Coupe ou rétablit le micro ; retourne le nouvel état
    ///
    /// Le gate continue de tourner micro coupé, seules les émissions sont retenues.
    pub fn toggle_mute(&mut self) -> bool {
        self.set_muted(!self.muted);
        self.muted
    }

    pub fn set_muted(&mut self, muted: bool) {
        if self.muted != muted {
            info!(muted, "🎙️ micro {}", if muted { "coupé" } else { "rétabli" });
        }
        self.muted = muted;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Envoie un message texte dans l'appel en cours
    pub fn send_text(&self, text: &str) -> CallResult<()> {
        let active = self.active.as_ref().ok_or(CallError::NotActive)?;
        active.session.send_text(text)?;
        Ok(())
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn config(&self) -> &CallConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Niveau d'entrée du micro (0.0 à 1.0), 0.0 hors appel
    pub fn amplitude(&self) -> f32 {
        self.active
            .as_ref()
            .map(|active| active.capture.level())
            .unwrap_or(0.0)
    }

    pub fn stats(&self) -> CallStats {
        self.stats
    }

    /// Statistiques de la session en cours, sinon de la dernière terminée
    pub fn session_stats(&self) -> Option<SessionStats> {
        match &self.active {
            Some(active) => Some(active.session.stats()),
            None => self.last_session.clone(),
        }
    }

    /// Buffers en attente de lecture (hors buffer courant)
    pub fn queued_playback(&self) -> usize {
        self.sequencer.queued()
    }

    pub fn input(&self) -> &I {
        &self.input
    }

    pub fn output(&self) -> &O {
        self.sequencer.output()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audio::{MockInput, MockOutput};
    use network::{NetworkError, RemotePeer, SimulatedConnector, WireMessage};
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::timeout;

    type TestController = CallController<MockInput, MockOutput, SimulatedConnector>;

    struct Harness {
        controller: TestController,
        input: MockInput,
        output: MockOutput,
        connector: SimulatedConnector,
        peers: UnboundedReceiver<RemotePeer>,
    }

    fn harness(config: CallConfig) -> Harness {
        harness_with_output(config, MockOutput::new())
    }

    fn harness_with_output(config: CallConfig, output: MockOutput) -> Harness {
        let input = MockInput::new(16000);
        let (connector, peers) = SimulatedConnector::new();
        let controller =
            CallController::new(config, input.clone(), output.clone(), connector.clone()).unwrap();
        Harness {
            controller,
            input,
            output,
            connector,
            peers,
        }
    }

    async fn started(config: CallConfig) -> (Harness, RemotePeer) {
        start(harness(config)).await
    }

    async fn start(mut h: Harness) -> (Harness, RemotePeer) {
        h.controller.start_call("chat-1").await.unwrap();
        let mut peer = h.peers.recv().await.unwrap();
        let init = peer.recv_message().await.unwrap().unwrap();
        assert_eq!(init, WireMessage::initialize("chat-1"));
        (h, peer)
    }

    async fn update(controller: &mut TestController) -> CallUpdate {
        timeout(Duration::from_secs(2), controller.next_update())
            .await
            .expect("aucun événement")
            .expect("pas d'appel en cours")
    }

    fn loud(len: usize) -> Vec<f32> {
        vec![0.5; len]
    }

    #[tokio::test]
    async fn test_start_call_listens() {
        let (h, _peer) = started(CallConfig::test_config()).await;

        assert_eq!(h.controller.state(), CallState::Listening);
        assert!(h.controller.is_active());
        assert!(h.input.is_recording());
        assert_eq!(h.connector.connections(), 1);
    }

    #[tokio::test]
    async fn test_idle_controller_has_no_updates() {
        let mut h = harness(CallConfig::test_config());
        assert!(h.controller.next_update().await.is_none());
        assert_eq!(h.controller.amplitude(), 0.0);
    }

    #[tokio::test]
    async fn test_frames_reach_the_server() {
        let (mut h, mut peer) = started(CallConfig::test_config()).await;

        h.input.push(&loud(2048));
        assert_eq!(update(&mut h.controller).await, CallUpdate::FrameSent { sequence: 0 });

        let message = peer.recv_message().await.unwrap().unwrap();
        let WireMessage::Audio { data } = message else {
            panic!("message audio attendu");
        };
        let pcm = network::decode_audio_payload(&data).unwrap();
        assert_eq!(pcm.len(), 4096);
        assert!(h.controller.amplitude() > 0.4);
    }

    #[tokio::test]
    async fn test_silence_sends_nothing() {
        let (mut h, mut peer) = started(CallConfig::test_config()).await;

        for _ in 0..20 {
            h.input.push(&[0.0; 128]);
        }
        assert_eq!(h.input.pending_samples(), Some(0));

        h.controller.end_call().await;
        assert!(peer.recv().await.is_none());
        assert_eq!(h.controller.stats().frames_forwarded, 0);
    }

    #[tokio::test]
    async fn test_one_frame_then_end_call() {
        let (mut h, mut peer) = started(CallConfig::test_config()).await;

        h.input.push(&loud(2048));
        assert!(matches!(update(&mut h.controller).await, CallUpdate::FrameSent { .. }));
        h.controller.end_call().await;

        assert!(matches!(peer.recv_message().await, Some(Ok(WireMessage::Audio { .. }))));
        assert!(peer.recv().await.is_none());
        assert_eq!(h.controller.state(), CallState::Idle);
        assert!(!h.input.is_recording());
        assert_eq!(h.input.pending_samples(), None);
    }

    #[tokio::test]
    async fn test_end_call_discards_playback_and_partial_frame() {
        let (mut h, peer) = started(CallConfig::test_config()).await;

        peer.send_audio(&vec![0u8; 4096]);
        peer.send_audio(&vec![0u8; 2048]);
        peer.send_audio(&vec![0u8; 1024]);
        for _ in 0..3 {
            update(&mut h.controller).await;
        }
        assert_eq!(h.output.started_lengths(), vec![2048]);
        assert_eq!(h.controller.queued_playback(), 2);
        let playing = h.output.current_id().unwrap();

        // Moins d'une frame : reste dans l'accumulateur
        h.input.push(&loud(100));
        assert_eq!(h.input.pending_samples(), Some(100));

        h.controller.end_call().await;

        assert_eq!(h.controller.state(), CallState::Idle);
        assert_eq!(h.controller.queued_playback(), 0);
        assert_eq!(h.output.stop_count(), 1);
        assert_eq!(h.output.active_count(), 0);
        assert_eq!(h.input.pending_samples(), None);
        assert_eq!(h.output.started_lengths(), vec![2048]);

        // Fin de lecture tardive du buffer coupé
        assert_eq!(
            h.controller.handle_completion(playing),
            CallUpdate::PlaybackAdvanced {
                progress: PlaybackProgress::Stale
            }
        );
        assert_eq!(h.controller.state(), CallState::Idle);
        assert_eq!(h.controller.stats().frames_forwarded, 0);
    }

    #[tokio::test]
    async fn test_session_stats_kept_after_end() {
        let (mut h, _peer) = started(CallConfig::test_config()).await;

        h.input.push(&loud(2048));
        update(&mut h.controller).await;
        h.controller.end_call().await;

        let stats = h.controller.session_stats().unwrap();
        assert_eq!(stats.frames_sent, 1);
        assert_eq!(stats.drop_percentage(), 0.0);
        assert!(stats.closed_at.is_some());

        let uptime = stats.uptime();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.controller.session_stats().unwrap().uptime(), uptime);
    }

    #[tokio::test]
    async fn test_mute_skips_send_but_keeps_gate() {
        let (mut h, mut peer) = started(CallConfig::test_config()).await;

        assert!(h.controller.toggle_mute());
        h.input.push(&loud(2048));
        assert_eq!(update(&mut h.controller).await, CallUpdate::FrameMuted { sequence: 0 });

        assert!(!h.controller.toggle_mute());
        h.input.push(&loud(2048));
        assert_eq!(update(&mut h.controller).await, CallUpdate::FrameSent { sequence: 1 });

        let message = peer.recv_message().await.unwrap().unwrap();
        assert!(matches!(message, WireMessage::Audio { .. }));
        assert!(peer.try_recv().is_none());
        assert_eq!(h.controller.stats().frames_muted, 1);
    }

    #[tokio::test]
    async fn test_remote_audio_plays_in_order() {
        let (mut h, peer) = started(CallConfig::test_config()).await;

        peer.send_audio(&vec![0u8; 4096]);
        peer.send_audio(&vec![0u8; 2048]);

        assert_eq!(
            update(&mut h.controller).await,
            CallUpdate::StateChanged {
                from: CallState::Listening,
                to: CallState::Speaking
            }
        );
        assert_eq!(update(&mut h.controller).await, CallUpdate::AudioQueued { samples: 1024 });
        assert_eq!(h.output.started_lengths(), vec![2048]);

        // Le second buffer démarre exactement à la fin du premier
        assert!(h.output.complete_current());
        assert_eq!(
            update(&mut h.controller).await,
            CallUpdate::PlaybackAdvanced {
                progress: PlaybackProgress::Advanced
            }
        );
        assert_eq!(h.output.started_lengths(), vec![2048, 1024]);

        assert!(h.output.complete_current());
        assert_eq!(
            update(&mut h.controller).await,
            CallUpdate::PlaybackAdvanced {
                progress: PlaybackProgress::Drained
            }
        );
        assert_eq!(h.controller.state(), CallState::Speaking);
    }

    #[tokio::test]
    async fn test_listen_after_playback() {
        let config = CallConfig {
            listen_after_playback: true,
            ..CallConfig::test_config()
        };
        let (mut h, peer) = started(config).await;

        peer.send_audio(&[0u8; 64]);
        update(&mut h.controller).await;
        assert_eq!(h.controller.state(), CallState::Speaking);

        h.output.complete_current();
        assert_eq!(
            update(&mut h.controller).await,
            CallUpdate::StateChanged {
                from: CallState::Speaking,
                to: CallState::Listening
            }
        );
    }

    #[tokio::test]
    async fn test_instant_playback_returns_to_listening() {
        let config = CallConfig {
            listen_after_playback: true,
            ..CallConfig::test_config()
        };
        let (mut h, peer) = start(harness_with_output(config, MockOutput::auto_completing())).await;

        peer.send_audio(&[0u8; 64]);
        assert_eq!(
            update(&mut h.controller).await,
            CallUpdate::StateChanged {
                from: CallState::Listening,
                to: CallState::Speaking
            }
        );
        assert_eq!(
            update(&mut h.controller).await,
            CallUpdate::StateChanged {
                from: CallState::Speaking,
                to: CallState::Listening
            }
        );
        assert_eq!(h.output.started_lengths(), vec![32]);
        assert_eq!(h.output.active_count(), 0);
    }

    #[tokio::test]
    async fn test_bad_payload_does_not_end_call() {
        let (mut h, peer) = started(CallConfig::test_config()).await;

        peer.send_audio(&[1, 2, 3]);
        assert_eq!(update(&mut h.controller).await, CallUpdate::AudioDiscarded);
        assert_eq!(h.controller.state(), CallState::Listening);
        assert_eq!(h.controller.stats().decode_failures, 1);
    }

    #[tokio::test]
    async fn test_remote_close_tears_down() {
        let (mut h, mut peer) = started(CallConfig::test_config()).await;

        peer.send_audio(&[0u8; 64]);
        peer.send_audio(&[0u8; 64]);
        update(&mut h.controller).await;
        update(&mut h.controller).await;
        peer.close();

        assert_eq!(update(&mut h.controller).await, CallUpdate::Ended(CloseReason::Remote));
        assert_eq!(h.controller.state(), CallState::Idle);
        assert!(!h.controller.is_active());
        assert_eq!(h.input.stop_count(), 1);
        assert_eq!(h.output.stop_count(), 1);
        assert_eq!(h.controller.queued_playback(), 0);
        assert!(h.controller.next_update().await.is_none());
    }

    #[tokio::test]
    async fn test_transport_error_ends_call() {
        let (mut h, peer) = started(CallConfig::test_config()).await;

        peer.fail("coupure");
        assert!(matches!(
            update(&mut h.controller).await,
            CallUpdate::Ended(CloseReason::Error(_))
        ));
        assert_eq!(h.controller.state(), CallState::Idle);
    }

    #[tokio::test]
    async fn test_end_call_is_idempotent() {
        let (mut h, _peer) = started(CallConfig::test_config()).await;

        h.controller.end_call().await;
        h.controller.end_call().await;

        assert_eq!(h.controller.state(), CallState::Idle);
        assert_eq!(h.input.stop_count(), 1);
    }

    #[tokio::test]
    async fn test_capture_failure_aborts_call() {
        let mut h = harness(CallConfig::test_config());
        h.input.fail_on_start();

        let result = h.controller.start_call("chat-1").await;
        assert!(matches!(result, Err(CallError::Capture(_))));
        assert_eq!(h.controller.state(), CallState::Idle);
        assert!(!h.controller.is_active());

        let mut peer = h.peers.recv().await.unwrap();
        assert!(peer.recv().await.is_some());
        assert!(peer.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_second_call_rejected_while_active() {
        let (mut h, _peer) = started(CallConfig::test_config()).await;

        let result = h.controller.start_call("chat-2").await;
        assert!(matches!(result, Err(CallError::AlreadyActive)));
        assert_eq!(h.connector.connections(), 1);
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let mut h = harness(CallConfig::test_config());
        h.connector.refuse_connections(true);

        let result = h.controller.start_call("chat-1").await;
        assert!(matches!(
            result,
            Err(CallError::Network(NetworkError::ConnectionFailed { .. }))
        ));
        assert_eq!(h.controller.state(), CallState::Idle);
        assert_eq!(h.input.start_count(), 0);
    }

    #[tokio::test]
    async fn test_new_call_after_end() {
        let (mut h, _peer) = started(CallConfig::test_config()).await;
        h.controller.end_call().await;

        h.controller.start_call("chat-2").await.unwrap();
        assert_eq!(h.controller.state(), CallState::Listening);
        assert_eq!(h.controller.stats().calls_started, 2);
    }

    #[tokio::test]
    async fn test_start_muted_and_text() {
        let config = CallConfig {
            start_muted: true,
            ..CallConfig::test_config()
        };
        let (mut h, mut peer) = started(config).await;
        assert!(h.controller.is_muted());

        h.controller.send_text("bonjour").unwrap();
        assert_eq!(peer.recv_message().await.unwrap().unwrap(), WireMessage::text("bonjour"));

        h.controller.end_call().await;
        assert!(matches!(h.controller.send_text("x"), Err(CallError::NotActive)));
    }
}
