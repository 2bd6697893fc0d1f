//! Module de capture audio utilisant cpal
//!
//! Ce module implémente le trait AudioInput avec cpal. Le callback cpal
//! livre des buffers de longueur et de nombre de canaux quelconques : on garde
//! le premier canal, on découpe en quanta de rendu, et chaque quantum passe
//! par le `CaptureProcessor` de l'appel.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream};
use tracing::{debug, error, info};

use crate::processor::CaptureProcessor;
use crate::{AudioConfig, AudioError, AudioInput, AudioResult};

/// Découpe le flux mono en quanta de taille fixe
///
/// Le reste d'un callback est conservé pour le suivant.
struct QuantumSplitter {
    pending: Vec<f32>,
    quantum: usize,
}

impl QuantumSplitter {
    fn new(quantum: usize) -> Self {
        Self {
            pending: Vec::with_capacity(quantum * 4),
            quantum,
        }
    }

    /// Ajoute un buffer entrelacé et traite chaque quantum complet
    fn feed<S: Copy>(
        &mut self,
        data: &[S],
        channels: usize,
        to_f32: fn(S) -> f32,
        processor: &mut CaptureProcessor,
    ) {
        // Mono : on ne garde que le premier canal
        self.pending
            .extend(data.chunks(channels.max(1)).map(|frame| to_f32(frame[0])));

        let complete = self.pending.len() - self.pending.len() % self.quantum;
        for quantum in self.pending[..complete].chunks_exact(self.quantum) {
            processor.process(quantum);
        }
        self.pending.drain(..complete);
    }
}

fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

fn u16_to_f32(sample: u16) -> f32 {
    (sample as f32 / u16::MAX as f32) * 2.0 - 1.0
}

fn f32_identity(sample: f32) -> f32 {
    sample
}

/// Implémentation de capture audio avec cpal
pub struct CpalCapture {
    /// Périphérique audio d'entrée (microphone)
    device: Device,

    config: AudioConfig,

    /// Stream actif ; le processeur de l'appel vit dans son callback
    stream: Option<Stream>,

    device_name: String,
}

impl CpalCapture {
    /// Ouvre le microphone par défaut sans démarrer la capture
    ///
    /// # Erreurs
    /// - `AudioError::NoDeviceFound` si aucun microphone n'est disponible
    pub fn new(config: AudioConfig) -> AudioResult<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or(AudioError::NoDeviceFound)?;

        let device_name = device
            .description()
            .ok()
            .map(|desc| desc.name().to_string())
            .unwrap_or_else(|| "Périphérique inconnu".to_string());

        info!(device = %device_name, "🎤 périphérique de capture trouvé");

        Ok(Self {
            device,
            config,
            stream: None,
            device_name,
        })
    }

    /// Construit le stream d'entrée et y installe le processeur
    fn build_stream(&self, mut processor: CaptureProcessor) -> AudioResult<Stream> {
        let supported = self.device.default_input_config().map_err(|e| {
            AudioError::ConfigError(format!("Impossible d'obtenir config par défaut: {}", e))
        })?;

        let sample_rate = supported.sample_rate();
        let channels = supported.channels() as usize;
        let sample_format = supported.sample_format();

        debug!(
            sample_rate,
            channels,
            format = ?sample_format,
            quantum = self.config.render_quantum,
            "configuration du stream de capture"
        );

        processor.set_input_sample_rate(sample_rate);
        let mut splitter = QuantumSplitter::new(self.config.render_quantum);
        let stream_config = supported.config();
        let on_error = |err: cpal::StreamError| error!(error = %err, "❌ erreur stream audio d'entrée");

        let stream = match sample_format {
            SampleFormat::F32 => self.device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    splitter.feed(data, channels, f32_identity, &mut processor);
                },
                on_error,
                None,
            )?,
            SampleFormat::I16 => self.device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    splitter.feed(data, channels, i16_to_f32, &mut processor);
                },
                on_error,
                None,
            )?,
            SampleFormat::U16 => self.device.build_input_stream(
                &stream_config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    splitter.feed(data, channels, u16_to_f32, &mut processor);
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
}

impl AudioInput for CpalCapture {
    fn start(&mut self, processor: CaptureProcessor) -> AudioResult<()> {
        if self.stream.is_some() {
            return Err(AudioError::InitializationError(
                "Capture déjà démarrée".to_string(),
            ));
        }

        let stream = self.build_stream(processor)?;
        stream.play()?;
        self.stream = Some(stream);

        info!(device = %self.device_name, "✅ capture audio démarrée");
        Ok(())
    }

    fn stop(&mut self) -> AudioResult<()> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };

        stream.pause()?;
        // Le processeur est détruit avec le stream
        drop(stream);

        info!("🛑 capture audio arrêtée");
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.stream.is_some()
    }

    fn device_info(&self) -> String {
        self.device_name.clone()
    }
}

/// Noms des périphériques d'entrée disponibles
pub fn list_input_devices() -> AudioResult<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| AudioError::ConfigError(format!("Énumération des entrées impossible: {}", e)))?;

    Ok(devices
        .filter_map(|device| device.description().ok().map(|d| d.name().to_string()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splitter_carries_remainder() {
        let config = AudioConfig::test_config();
        let (mut processor, _handle, mut frames) = CaptureProcessor::new(&config);
        let mut splitter = QuantumSplitter::new(128);

        // 200 trames stéréo : seul le canal gauche (fort) est gardé
        let data: Vec<f32> = (0..400).map(|i| if i % 2 == 0 { 0.5 } else { 0.0 }).collect();
        splitter.feed(&data, 2, f32_identity, &mut processor);
        assert_eq!(splitter.pending.len(), 72);
        assert_eq!(processor.stats().quanta_processed, 1);

        splitter.feed(&data, 2, f32_identity, &mut processor);
        assert_eq!(splitter.pending.len(), 16);
        assert_eq!(processor.stats().quanta_processed, 3);

        let frame = frames.try_recv().unwrap();
        assert!(frame.samples.iter().all(|&s| s == 16384));
    }

    #[test]
    fn test_sample_conversions() {
        assert_eq!(i16_to_f32(-32768), -1.0);
        assert_eq!(u16_to_f32(0), -1.0);
        assert_eq!(u16_to_f32(u16::MAX), 1.0);
    }

    #[test]
    fn test_capture_creation() {
        // Peut échouer si aucun microphone n'est disponible
        match CpalCapture::new(AudioConfig::default()) {
            Ok(capture) => {
                assert!(!capture.is_recording());
                assert!(!capture.device_info().is_empty());
            }
            Err(AudioError::NoDeviceFound) => {
                println!("⚠️  Pas de microphone disponible pour le test");
            }
            Err(e) => panic!("Erreur inattendue: {}", e),
        }
    }

    #[test]
    #[ignore] // Nécessite un vrai microphone
    fn test_capture_start_stop() {
        let config = AudioConfig::default();
        let (processor, handle, _frames) = CaptureProcessor::new(&config);

        if let Ok(mut capture) = CpalCapture::new(config) {
            capture.start(processor).unwrap();
            assert!(capture.is_recording());
            std::thread::sleep(std::time::Duration::from_millis(200));
            handle.stop();
            capture.stop().unwrap();
            capture.stop().unwrap();
            assert!(!capture.is_recording());
        }
    }
}
