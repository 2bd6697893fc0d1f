//! Processeur de capture temps réel
//!
//! Le processeur est appelé une fois par quantum de rendu sur le thread audio.
//! Il enchaîne rééchantillonnage vers 16 kHz, quantification PCM16, gate
//! d'activité vocale et découpage en frames de taille fixe, puis pousse les
//! frames vers le contexte de contrôle par un channel non bloquant.
//!
//! Un processeur est construit pour un seul appel : l'accumulateur, les
//! compteurs du gate et les buffers de travail vivent et meurent avec lui.
//!
//! # Architecture thread
//!
//! ```text
//! callback cpal ──process()──> [gate + accumulateur] ──frames (mpsc)──> contrôleur
//!                     ^                                                    │
//!                     └──────────── commandes (mpsc, try_recv) <───────────┘
//! ```

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::config::AudioConfig;
use crate::error::AudioError;
use crate::gate::{GateDecision, VoiceActivityGate};
use crate::resample::{quantize_into, resample_nearest_into};
use crate::types::{peak_amplitude, AudioFrame, GateState};

/// Commande envoyée du contexte de contrôle vers le processeur
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureCommand {
    /// Arrête l'émission de frames (idempotent)
    Stop,
}

impl FromStr for CaptureCommand {
    type Err = AudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stop" => Ok(CaptureCommand::Stop),
            other => Err(AudioError::ConfigError(format!(
                "Commande de capture inconnue: {other}"
            ))),
        }
    }
}

/// Niveau crête du dernier quantum capturé, partagé sans verrou
///
/// Écrit par le thread audio, lu par le visualiseur. La valeur est un f32
/// entre 0.0 et 1.0 stocké sous forme de bits dans un `AtomicU32`.
#[derive(Clone, Debug, Default)]
pub struct LevelMeter {
    bits: Arc<AtomicU32>,
}

impl LevelMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, level: f32) {
        self.bits.store(level.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// Poignée côté contrôle d'un processeur de capture
#[derive(Clone, Debug)]
pub struct CaptureHandle {
    control: mpsc::UnboundedSender<CaptureCommand>,
    level: LevelMeter,
}

impl CaptureHandle {
    /// Demande l'arrêt de l'émission
    ///
    /// Peut être appelé plusieurs fois, et après la destruction du processeur.
    pub fn stop(&self) {
        let _ = self.control.send(CaptureCommand::Stop);
    }

    /// Envoie une commande textuelle (`"stop"`)
    pub fn send_command(&self, command: &str) -> Result<(), AudioError> {
        let command = command.parse::<CaptureCommand>()?;
        let _ = self.control.send(command);
        Ok(())
    }

    /// Niveau d'entrée courant (0.0 à 1.0)
    pub fn level(&self) -> f32 {
        self.level.get()
    }

    pub fn level_meter(&self) -> LevelMeter {
        self.level.clone()
    }
}

/// Statistiques de capture d'un appel
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Quanta traités
    pub quanta_processed: u64,
    /// Frames transmises au contexte de contrôle
    pub frames_emitted: u64,
    /// Frames complètes jetées car le processeur était arrêté
    pub frames_discarded: u64,
    /// Remises à zéro du gate (accumulateur vidé)
    pub gate_resets: u64,
}

/// Processeur de capture pour un appel
pub struct CaptureProcessor {
    input_sample_rate: u32,
    target_sample_rate: u32,
    frame_size: usize,
    gate: VoiceActivityGate,
    accumulator: Vec<i16>,
    resampled: Vec<f32>,
    quantized: Vec<i16>,
    active: bool,
    next_sequence: u64,
    frames: mpsc::UnboundedSender<AudioFrame>,
    control: mpsc::UnboundedReceiver<CaptureCommand>,
    level: LevelMeter,
    stats: CaptureStats,
}

impl CaptureProcessor {
    /// Crée un processeur, sa poignée de contrôle et le flux de frames émises
    ///
    /// La fréquence d'entrée vaut par défaut la fréquence cible ; le
    /// périphérique de capture la fixe avec `set_input_sample_rate` avant de
    /// démarrer son stream.
    pub fn new(
        config: &AudioConfig,
    ) -> (Self, CaptureHandle, mpsc::UnboundedReceiver<AudioFrame>) {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let level = LevelMeter::new();

        let processor = Self {
            input_sample_rate: config.target_sample_rate,
            target_sample_rate: config.target_sample_rate,
            frame_size: config.target_frame_size,
            gate: VoiceActivityGate::new(config.amplitude_threshold, config.max_silence_chunks),
            accumulator: Vec::with_capacity(config.target_frame_size * 2),
            resampled: Vec::with_capacity(config.render_quantum),
            quantized: Vec::with_capacity(config.render_quantum),
            active: true,
            next_sequence: 0,
            frames: frame_tx,
            control: control_rx,
            level: level.clone(),
            stats: CaptureStats::default(),
        };

        let handle = CaptureHandle {
            control: control_tx,
            level,
        };

        (processor, handle, frame_rx)
    }

    pub fn set_input_sample_rate(&mut self, sample_rate: u32) {
        debug!(
            input = sample_rate,
            target = self.target_sample_rate,
            "fréquence d'entrée de la capture"
        );
        self.input_sample_rate = sample_rate;
    }

    pub fn input_sample_rate(&self) -> u32 {
        self.input_sample_rate
    }

    /// Traite un quantum de rendu (échantillons mono flottants)
    ///
    /// Appelé sur le thread temps réel : ne bloque jamais.
    pub fn process(&mut self, quantum: &[f32]) {
        self.drain_commands();
        self.stats.quanta_processed += 1;

        self.resampled.clear();
        resample_nearest_into(
            quantum,
            self.input_sample_rate,
            self.target_sample_rate,
            &mut self.resampled,
        );
        self.quantized.clear();
        quantize_into(&self.resampled, &mut self.quantized);

        self.level.set(peak_amplitude(&self.quantized) as f32 / 32768.0);

        match self.gate.observe(&self.quantized) {
            GateDecision::Voice => self.accumulator.extend_from_slice(&self.quantized),
            GateDecision::TrailingSilence => {
                let len = self.accumulator.len() + self.quantized.len();
                self.accumulator.resize(len, 0);
            }
            GateDecision::Suppressed => {}
            GateDecision::Reset => {
                trace!(pending = self.accumulator.len(), "hang-time dépassé, accumulateur vidé");
                self.accumulator.clear();
                self.stats.gate_resets += 1;
            }
        }

        if !self.gate.is_emitting() {
            return;
        }

        while self.accumulator.len() >= self.frame_size {
            let samples: Vec<i16> = self.accumulator.drain(..self.frame_size).collect();
            self.emit(samples);
        }
    }

    fn emit(&mut self, samples: Vec<i16>) {
        if !self.active {
            self.stats.frames_discarded += 1;
            return;
        }

        let frame = AudioFrame::new(samples, self.target_sample_rate, self.next_sequence);
        self.next_sequence += 1;

        if self.frames.send(frame).is_err() {
            // Plus personne n'écoute : équivalent à un stop
            self.active = false;
            self.stats.frames_discarded += 1;
        } else {
            self.stats.frames_emitted += 1;
        }
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.control.try_recv() {
            match command {
                CaptureCommand::Stop => self.active = false,
            }
        }
    }

    /// Le processeur émet-il encore des frames ?
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Nombre d'échantillons en attente dans l'accumulateur
    pub fn pending_samples(&self) -> usize {
        self.accumulator.len()
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }
}
