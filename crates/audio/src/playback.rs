//! Module de lecture audio utilisant cpal
//!
//! Ce module implémente le trait AudioOutput avec cpal. Un seul stream de
//! sortie reste ouvert pendant l'appel ; chaque buffer confié par le
//! séquenceur est rééchantillonné à la fréquence du périphérique puis déposé
//! dans un emplacement partagé que le callback vide. Quand le dernier
//! échantillon est rendu, le callback signale la fin de lecture.
//!
//! # Architecture thread
//!
//! Le contexte de contrôle écrit l'emplacement via `play()` / `stop()`.
//! Le callback cpal (thread temps réel) n'y accède qu'avec `try_lock` et
//! joue du silence s'il ne l'obtient pas.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, SupportedStreamConfig};
use tracing::{debug, error, info};

use crate::resample::{quantize, resample_nearest};
use crate::traits::PlaybackNotifier;
use crate::{AudioConfig, AudioError, AudioOutput, AudioResult, PlaybackBuffer};

/// Buffer en cours de rendu
struct ActiveBuffer {
    samples: Vec<f32>,
    position: usize,
    done: Option<PlaybackNotifier>,
}

type SharedSlot = Arc<Mutex<Option<ActiveBuffer>>>;

/// Remplit un buffer de sortie entrelacé depuis l'emplacement partagé
///
/// Appelée dans le callback audio : ne bloque jamais.
fn fill_output<S: Copy>(output: &mut [S], channels: usize, slot: &SharedSlot, from_f32: fn(f32) -> S) {
    let silence = from_f32(0.0);
    let Ok(mut guard) = slot.try_lock() else {
        output.fill(silence);
        return;
    };

    let Some(active) = guard.as_mut() else {
        output.fill(silence);
        return;
    };

    for frame in output.chunks_mut(channels.max(1)) {
        let value = active
            .samples
            .get(active.position)
            .map(|&s| from_f32(s))
            .unwrap_or(silence);
        frame.fill(value);
        active.position += 1;
    }

    if active.position >= active.samples.len() {
        if let Some(done) = active.done.take() {
            done.notify();
        }
        *guard = None;
    }
}

fn f32_identity(sample: f32) -> f32 {
    sample
}

fn f32_to_u16(sample: f32) -> u16 {
    ((sample.clamp(-1.0, 1.0) + 1.0) * 0.5 * u16::MAX as f32) as u16
}

/// Implémentation de lecture audio avec cpal
pub struct CpalPlayback {
    /// Périphérique audio de sortie (haut-parleurs)
    device: Device,

    /// Configuration retenue pour le stream de sortie
    stream_config: SupportedStreamConfig,

    /// Stream ouvert au premier buffer joué
    stream: Option<Stream>,

    slot: SharedSlot,

    device_name: String,
}

impl CpalPlayback {
    /// Ouvre la sortie par défaut sans démarrer de stream
    ///
    /// # Erreurs
    /// - `AudioError::NoDeviceFound` si aucun haut-parleur n'est disponible
    /// - `AudioError::ConfigError` si le périphérique n'expose pas de configuration
    pub fn new(config: &AudioConfig) -> AudioResult<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or(AudioError::NoDeviceFound)?;

        let device_name = device
            .description()
            .ok()
            .map(|desc| desc.name().to_string())
            .unwrap_or_else(|| "Périphérique inconnu".to_string());

        let stream_config = device.default_output_config()?;

        info!(
            device = %device_name,
            device_rate = stream_config.sample_rate(),
            source_rate = config.playback_sample_rate,
            "🔊 périphérique de lecture trouvé"
        );

        Ok(Self {
            device,
            stream_config,
            stream: None,
            slot: Arc::new(Mutex::new(None)),
            device_name,
        })
    }

    /// Fréquence de rendu du périphérique
    pub fn device_sample_rate(&self) -> u32 {
        self.stream_config.sample_rate()
    }

    fn build_stream(&self) -> AudioResult<Stream> {
        let channels = self.stream_config.channels() as usize;
        let sample_format = self.stream_config.sample_format();
        let config = self.stream_config.config();
        let slot = Arc::clone(&self.slot);
        let on_error = |err: cpal::StreamError| error!(error = %err, "❌ erreur stream audio de sortie");

        let stream = match sample_format {
            SampleFormat::F32 => self.device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    fill_output(data, channels, &slot, f32_identity);
                },
                on_error,
                None,
            )?,
            SampleFormat::I16 => self.device.build_output_stream(
                &config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    fill_output(data, channels, &slot, quantize);
                },
                on_error,
                None,
            )?,
            SampleFormat::U16 => self.device.build_output_stream(
                &config,
                move |data: &mut [u16], _: &cpal::OutputCallbackInfo| {
                    fill_output(data, channels, &slot, f32_to_u16);
                },
                on_error,
                None,
            )?,
            _ => {
                return Err(AudioError::ConfigError(format!(
                    "Format d'échantillon non supporté : {:?}",
                    sample_format
                )));
            }
        };

        Ok(stream)
    }

    fn ensure_stream(&mut self) -> AudioResult<()> {
        if self.stream.is_none() {
            let stream = self.build_stream()?;
            stream.play()?;
            self.stream = Some(stream);
            debug!(device = %self.device_name, "stream de sortie ouvert");
        }
        Ok(())
    }
}

impl AudioOutput for CpalPlayback {
    fn play(&mut self, buffer: PlaybackBuffer, done: PlaybackNotifier) -> AudioResult<()> {
        self.ensure_stream()
            .map_err(|e| AudioError::PlaybackError(e.to_string()))?;

        let samples = resample_nearest(&buffer.samples, buffer.sample_rate, self.device_sample_rate());

        let mut slot = self
            .slot
            .lock()
            .map_err(|_| AudioError::PlaybackError("emplacement de lecture empoisonné".to_string()))?;

        if slot.is_some() {
            return Err(AudioError::PlaybackError("lecture déjà en cours".to_string()));
        }

        if samples.is_empty() {
            // Rien à rendre : la lecture est terminée aussitôt
            done.notify();
            return Ok(());
        }

        *slot = Some(ActiveBuffer {
            samples,
            position: 0,
            done: Some(done),
        });
        Ok(())
    }

    fn stop(&mut self) -> AudioResult<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| AudioError::PlaybackError("emplacement de lecture empoisonné".to_string()))?;
        *slot = None;
        Ok(())
    }

    fn device_info(&self) -> String {
        self.device_name.clone()
    }
}

impl Drop for CpalPlayback {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.pause();
            debug!("🧹 stream de sortie fermé");
        }
    }
}

/// Noms des périphériques de sortie disponibles
pub fn list_output_devices() -> AudioResult<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| AudioError::ConfigError(format!("Énumération des sorties impossible: {}", e)))?;

    Ok(devices
        .filter_map(|device| device.description().ok().map(|d| d.name().to_string()))
        .collect())
}
