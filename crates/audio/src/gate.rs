//! Gate d'activité vocale
//!
//! Le gate décide, bloc par bloc, si le processeur de capture doit ajouter
//! les vrais échantillons, un bloc de silence (hang-time après la voix) ou
//! rien du tout. Il évite d'inonder le lien quand personne ne parle, sans
//! couper les fins de phrases.

use crate::types::{peak_amplitude, GateState};

/// Décision du gate pour un bloc
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    /// Le bloc contient de la voix : ajouter les échantillons réels
    Voice,
    /// Silence pendant le hang-time : ajouter un bloc de zéros de même longueur
    TrailingSilence,
    /// Aucune voix depuis la dernière remise à zéro : ne rien ajouter
    Suppressed,
    /// Le hang-time vient d'être dépassé : vider l'accumulateur en attente
    Reset,
}

impl GateDecision {
    /// Le bloc doit-il être ajouté à l'accumulateur ?
    pub fn appends(self) -> bool {
        matches!(self, GateDecision::Voice | GateDecision::TrailingSilence)
    }
}

/// Gate d'activité vocale à seuil d'amplitude et hang-time
#[derive(Debug, Clone)]
pub struct VoiceActivityGate {
    state: GateState,
    amplitude_threshold: u16,
    max_silence_chunks: u32,
}

impl VoiceActivityGate {
    /// Crée un gate fermé
    ///
    /// # Arguments
    /// * `amplitude_threshold` - amplitude quantifiée strictement supérieure = voix
    /// * `max_silence_chunks` - blocs silencieux tolérés avant remise à zéro
    pub fn new(amplitude_threshold: u16, max_silence_chunks: u32) -> Self {
        Self {
            state: GateState::default(),
            amplitude_threshold,
            max_silence_chunks,
        }
    }

    /// Observe un bloc quantifié et met à jour l'état
    ///
    /// Un bloc silencieux qui fait dépasser le hang-time renvoie `Reset` :
    /// l'appelant doit alors vider son accumulateur et ne rien ajouter.
    pub fn observe(&mut self, block: &[i16]) -> GateDecision {
        let sound_now = peak_amplitude(block) > self.amplitude_threshold;

        let decision = if sound_now {
            self.state.silence_run_length = 0;
            self.state.has_sound = true;
            GateDecision::Voice
        } else if self.state.has_sound {
            self.state.silence_run_length += 1;
            GateDecision::TrailingSilence
        } else {
            GateDecision::Suppressed
        };

        if self.state.has_sound && self.state.silence_run_length > self.max_silence_chunks {
            self.state = GateState::default();
            return GateDecision::Reset;
        }

        decision
    }

    /// Les données accumulées peuvent-elles être émises ?
    pub fn is_emitting(&self) -> bool {
        self.state.has_sound && self.state.silence_run_length <= self.max_silence_chunks
    }

    pub fn state(&self) -> GateState {
        self.state
    }
}
