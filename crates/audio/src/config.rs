//! Configuration audio de l'appel vocal
//!
//! Ce module regroupe les constantes du format de fil (16 kHz en envoi,
//! 24 kHz en réception, frames de 2048 échantillons) et les réglages du
//! gate d'activité vocale.

use serde::{Deserialize, Serialize};

/// Configuration principale pour tout le système audio
///
/// Tous les champs ont une valeur par défaut alignée sur le protocole
/// attendu par le service distant. Modifier les fréquences casse la
/// compatibilité avec le serveur, les seuils du gate peuvent être ajustés.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Fréquence des frames envoyées au serveur (Hz)
    pub target_sample_rate: u32,

    /// Fréquence des payloads audio reçus du serveur (Hz)
    pub playback_sample_rate: u32,

    /// Taille exacte de chaque frame envoyée, en échantillons
    ///
    /// 2048 échantillons à 16 kHz = 128 ms
    pub target_frame_size: usize,

    /// Nombre d'échantillons d'entrée traités par quantum de rendu
    pub render_quantum: usize,

    /// Amplitude quantifiée (sur 32768) au-delà de laquelle un bloc contient de la voix
    pub amplitude_threshold: u16,

    /// Nombre de blocs silencieux tolérés après de la voix avant de couper l'émission
    pub max_silence_chunks: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000,
            playback_sample_rate: 24000,
            target_frame_size: 2048,
            render_quantum: 128,
            amplitude_threshold: 100,
            max_silence_chunks: 10,
        }
    }
}

impl AudioConfig {
    /// Durée d'une frame envoyée en millisecondes
    ///
    /// Exemple : 2048 * 1000 / 16000 = 128 ms
    pub fn frame_duration_ms(&self) -> u32 {
        (self.target_frame_size as u64 * 1000 / self.target_sample_rate as u64) as u32
    }

    /// Taille en bytes d'une frame PCM16 encodée
    pub fn frame_size_bytes(&self) -> usize {
        self.target_frame_size * 2
    }

    /// Valide que la configuration est cohérente
    pub fn validate(&self) -> Result<(), String> {
        if self.target_sample_rate < 8000 || self.target_sample_rate > 48000 {
            return Err(format!(
                "Sample rate d'envoi invalide: {} (doit être entre 8000 et 48000)",
                self.target_sample_rate
            ));
        }

        if self.playback_sample_rate < 8000 || self.playback_sample_rate > 48000 {
            return Err(format!(
                "Sample rate de lecture invalide: {} (doit être entre 8000 et 48000)",
                self.playback_sample_rate
            ));
        }

        if self.target_frame_size == 0 {
            return Err("Taille de frame nulle".to_string());
        }

        if self.render_quantum == 0 {
            return Err("Quantum de rendu nul".to_string());
        }

        if self.amplitude_threshold >= i16::MAX as u16 {
            return Err(format!(
                "Seuil d'amplitude invalide: {} (doit être inférieur à {})",
                self.amplitude_threshold,
                i16::MAX
            ));
        }

        Ok(())
    }

    /// Gate plus sensible, pour les micros faibles ou lointains
    pub fn sensitive() -> Self {
        Self {
            amplitude_threshold: 40,
            max_silence_chunks: 20,
            ..Default::default()
        }
    }

    /// Configuration pour les tests : petites frames et hang-time court
    pub fn test_config() -> Self {
        Self {
            target_frame_size: 256,
            max_silence_chunks: 2,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AudioConfig::default();

        assert_eq!(config.frame_duration_ms(), 128);
        assert_eq!(config.frame_size_bytes(), 4096);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = AudioConfig::default();

        config.target_sample_rate = 1000;
        assert!(config.validate().is_err());

        config.target_sample_rate = 16000;
        config.target_frame_size = 0;
        assert!(config.validate().is_err());

        config.target_frame_size = 2048;
        config.amplitude_threshold = 40000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_preset_configs() {
        let sensitive = AudioConfig::sensitive();
        assert!(sensitive.amplitude_threshold < AudioConfig::default().amplitude_threshold);
        assert!(sensitive.validate().is_ok());

        let test = AudioConfig::test_config();
        assert_eq!(test.target_frame_size, 256);
        assert!(test.validate().is_ok());
    }
}
