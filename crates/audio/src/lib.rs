//! Crate audio - chaîne audio temps réel de l'appel vocal
//!
//! Ce crate gère les deux sens de l'audio :
//! - Capture micro avec cpal, rééchantillonnage à 16 kHz, gate d'activité vocale
//!   et découpage en frames PCM16 de taille fixe
//! - Décodage des payloads PCM16 24 kHz et lecture séquencée, un buffer à la fois
//! - Périphériques simulés pour les tests

pub mod config;      // Configuration audio
pub mod types;       // Types de données (AudioFrame, PlaybackBuffer, GateState)
pub mod traits;      // Traits abstraits des périphériques
pub mod resample;    // Rééchantillonnage et quantification
pub mod gate;        // Gate d'activité vocale
pub mod processor;   // Processeur de capture temps réel
pub mod pcm;         // Encodage PCM16 little-endian
pub mod sequencer;   // Séquenceur de lecture FIFO
pub mod capture;     // Implémentation capture avec cpal
pub mod playback;    // Implémentation lecture avec cpal
pub mod mock;        // Périphériques simulés
pub mod error;       // Gestion d'erreurs

// Réexports pour faciliter l'utilisation
pub use config::*;
pub use types::*;
pub use traits::*;
pub use error::*;

pub use gate::{GateDecision, VoiceActivityGate};
pub use processor::{CaptureCommand, CaptureHandle, CaptureProcessor, CaptureStats, LevelMeter};
pub use pcm::{decode_pcm16le, encode_pcm16le};
pub use sequencer::{PlaybackProgress, PlaybackSequencer, SequencerStats};

// Réexports des implémentations principales
pub use capture::{list_input_devices, CpalCapture};
pub use playback::{list_output_devices, CpalPlayback};
pub use mock::{MockInput, MockOutput};
