//! Périphériques audio factices pour les tests
//!
//! `MockInput` garde le processeur de capture et laisse le test pousser des
//! quanta à la main. `MockOutput` enregistre les buffers démarrés et laisse
//! le test décider quand une lecture se termine.
//!
//! Les deux types sont `Clone` : le test garde une copie pour inspecter
//! l'état pendant que le contrôleur possède l'autre.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{AudioError, AudioResult};
use crate::processor::CaptureProcessor;
use crate::traits::{AudioInput, AudioOutput, PlaybackId, PlaybackNotifier};
use crate::types::PlaybackBuffer;

#[derive(Default)]
struct InputState {
    processor: Option<CaptureProcessor>,
    sample_rate: u32,
    fail_start: bool,
    starts: u32,
    stops: u32,
}

/// Entrée audio pilotée par le test
#[derive(Clone)]
pub struct MockInput {
    state: Arc<Mutex<InputState>>,
}

impl MockInput {
    /// Entrée simulée à la fréquence donnée
    pub fn new(sample_rate: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(InputState {
                sample_rate,
                ..Default::default()
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, InputState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Le prochain `start` échouera comme un refus d'accès au micro
    pub fn fail_on_start(&self) {
        self.state().fail_start = true;
    }

    /// Pousse un quantum dans le processeur courant
    ///
    /// Retourne `false` si la capture n'est pas démarrée.
    pub fn push(&self, quantum: &[f32]) -> bool {
        match self.state().processor.as_mut() {
            Some(processor) => {
                processor.process(quantum);
                true
            }
            None => false,
        }
    }

    /// Nombre d'échantillons en attente dans le processeur courant
    pub fn pending_samples(&self) -> Option<usize> {
        self.state().processor.as_ref().map(|p| p.pending_samples())
    }

    pub fn start_count(&self) -> u32 {
        self.state().starts
    }

    pub fn stop_count(&self) -> u32 {
        self.state().stops
    }
}

impl AudioInput for MockInput {
    fn start(&mut self, mut processor: CaptureProcessor) -> AudioResult<()> {
        let mut state = self.state();
        if state.fail_start {
            state.fail_start = false;
            return Err(AudioError::PermissionDenied("micro simulé refusé".to_string()));
        }
        processor.set_input_sample_rate(state.sample_rate);
        state.processor = Some(processor);
        state.starts += 1;
        Ok(())
    }

    fn stop(&mut self) -> AudioResult<()> {
        let mut state = self.state();
        if state.processor.take().is_some() {
            state.stops += 1;
        }
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.state().processor.is_some()
    }

    fn device_info(&self) -> String {
        format!("Micro simulé ({} Hz)", self.state().sample_rate)
    }
}

#[derive(Default)]
struct OutputState {
    current: Option<PlaybackNotifier>,
    started: Vec<usize>,
    failures_pending: u32,
    auto_complete: bool,
    stops: u32,
}

/// Sortie audio pilotée par le test
#[derive(Clone, Default)]
pub struct MockOutput {
    state: Arc<Mutex<OutputState>>,
}

impl MockOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chaque lecture se termine immédiatement après son démarrage
    pub fn auto_completing() -> Self {
        let output = Self::new();
        output.state().auto_complete = true;
        output
    }

    fn state(&self) -> MutexGuard<'_, OutputState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Les `count` prochaines lectures échoueront
    pub fn fail_next(&self, count: u32) {
        self.state().failures_pending = count;
    }

    /// Termine la lecture en cours ; `false` si rien ne joue
    pub fn complete_current(&self) -> bool {
        let current = self.state().current.take();
        match current {
            Some(notifier) => {
                notifier.notify();
                true
            }
            None => false,
        }
    }

    /// Longueurs des buffers démarrés, dans l'ordre
    pub fn started_lengths(&self) -> Vec<usize> {
        self.state().started.clone()
    }

    /// Nombre de buffers audibles en ce moment (0 ou 1)
    pub fn active_count(&self) -> usize {
        usize::from(self.state().current.is_some())
    }

    pub fn current_id(&self) -> Option<PlaybackId> {
        self.state().current.as_ref().map(|n| n.id())
    }

    pub fn stop_count(&self) -> u32 {
        self.state().stops
    }
}

impl AudioOutput for MockOutput {
    fn play(&mut self, buffer: PlaybackBuffer, done: PlaybackNotifier) -> AudioResult<()> {
        let mut state = self.state();
        if state.failures_pending > 0 {
            state.failures_pending -= 1;
            return Err(AudioError::PlaybackError("sortie simulée en échec".to_string()));
        }
        if state.current.is_some() {
            return Err(AudioError::PlaybackError("lecture déjà en cours".to_string()));
        }

        state.started.push(buffer.len());
        if state.auto_complete {
            done.notify();
        } else {
            state.current = Some(done);
        }
        Ok(())
    }

    fn stop(&mut self) -> AudioResult<()> {
        let mut state = self.state();
        state.current = None;
        state.stops += 1;
        Ok(())
    }

    fn device_info(&self) -> String {
        "Sortie simulée".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AudioConfig;
    use tokio::sync::mpsc;

    #[test]
    fn test_mock_input_feeds_processor() {
        let config = AudioConfig::test_config();
        let (processor, _handle, mut frames) = CaptureProcessor::new(&config);
        let mut input = MockInput::new(16000);

        assert!(!input.push(&[0.5; 128]));
        input.start(processor).unwrap();
        assert!(input.is_recording());

        assert!(input.push(&[0.5; 256]));
        assert!(frames.try_recv().is_ok());

        input.stop().unwrap();
        input.stop().unwrap();
        assert_eq!(input.stop_count(), 1);
        assert!(!input.is_recording());
    }

    #[test]
    fn test_mock_input_start_failure() {
        let config = AudioConfig::default();
        let (processor, _handle, _frames) = CaptureProcessor::new(&config);
        let mut input = MockInput::new(48000);
        input.fail_on_start();

        let result = input.start(processor);
        assert!(matches!(result, Err(AudioError::PermissionDenied(_))));
        assert!(!input.is_recording());
    }

    #[test]
    fn test_mock_output_auto_complete() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut output = MockOutput::auto_completing();

        output.play(PlaybackBuffer::new(vec![0.0; 8], 24000), PlaybackNotifier::new(3, tx)).unwrap();

        assert_eq!(rx.try_recv().unwrap(), 3);
        assert_eq!(output.active_count(), 0);
        assert_eq!(output.started_lengths(), vec![8]);
    }
}
