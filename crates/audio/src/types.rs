//! Types de données pour le système audio
//!
//! - AudioFrame : frame PCM 16 bits mono prête pour le fil
//! - PlaybackBuffer : audio décodé en flottants, prêt à être joué
//! - GateState : état du gate d'activité vocale

use std::time::{Duration, Instant};

/// Frame audio PCM 16 bits mono
///
/// Côté envoi, chaque frame transmise contient exactement
/// `AudioConfig::target_frame_size` échantillons à 16 kHz.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioFrame {
    /// Échantillons signés 16 bits
    pub samples: Vec<i16>,

    /// Fréquence d'échantillonnage de la frame (Hz)
    pub sample_rate: u32,

    /// Numéro de séquence, incrémenté pour chaque frame émise par un même processeur
    pub sequence_number: u64,

    /// Instant de création de la frame
    pub timestamp: Instant,
}

impl AudioFrame {
    /// Crée une nouvelle frame audio
    ///
    /// # Example
    /// ```rust
    /// use audio::AudioFrame;
    ///
    /// let frame = AudioFrame::new(vec![0, 120, -120, 0], 16000, 7);
    /// assert_eq!(frame.len(), 4);
    /// ```
    pub fn new(samples: Vec<i16>, sample_rate: u32, sequence_number: u64) -> Self {
        Self {
            samples,
            sample_rate,
            sequence_number,
            timestamp: Instant::now(),
        }
    }

    /// Crée une frame de silence
    pub fn silence(sample_count: usize, sample_rate: u32, sequence_number: u64) -> Self {
        Self::new(vec![0; sample_count], sample_rate, sequence_number)
    }

    /// Nombre d'échantillons
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Durée de la frame
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.samples.len() as u64 * 1_000_000 / self.sample_rate as u64)
    }

    /// Amplitude absolue maximale de la frame
    pub fn peak_amplitude(&self) -> u16 {
        peak_amplitude(&self.samples)
    }
}

/// Amplitude absolue maximale d'un bloc quantifié
///
/// `unsigned_abs` évite le débordement sur -32768.
pub fn peak_amplitude(samples: &[i16]) -> u16 {
    samples.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0)
}

/// Audio décodé prêt à être joué
///
/// Les échantillons sont des flottants dans [-1.0, 1.0].
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl PlaybackBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Durée de lecture du buffer
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.samples.len() as u64 * 1_000_000 / self.sample_rate as u64)
    }
}

/// État du gate d'activité vocale
///
/// Remis à `{false, 0}` quand le silence dépasse le hang-time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GateState {
    /// De la voix a été détectée depuis la dernière remise à zéro
    pub has_sound: bool,

    /// Nombre de blocs silencieux consécutifs depuis la dernière voix
    pub silence_run_length: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_duration() {
        let frame = AudioFrame::silence(2048, 16000, 0);
        assert_eq!(frame.duration(), Duration::from_millis(128));
        assert_eq!(frame.peak_amplitude(), 0);
    }

    #[test]
    fn test_peak_amplitude_handles_min_value() {
        assert_eq!(peak_amplitude(&[0, -32768, 12]), 32768);
        assert_eq!(peak_amplitude(&[]), 0);
    }

    #[test]
    fn test_playback_buffer_duration() {
        let buffer = PlaybackBuffer::new(vec![0.5; 24000], 24000);
        assert_eq!(buffer.duration(), Duration::from_secs(1));
        assert_eq!(buffer.len(), 24000);
    }

    #[test]
    fn test_gate_state_default() {
        let state = GateState::default();
        assert!(!state.has_sound);
        assert_eq!(state.silence_run_length, 0);
    }
}
