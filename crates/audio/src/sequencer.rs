//! Séquenceur de lecture
//!
//! Les buffers reçus sont joués dans leur ordre d'arrivée, un seul à la fois,
//! chacun jusqu'au bout avant le suivant. L'enchaînement est une boucle de
//! vidage de file pilotée par les événements de fin de lecture : aucun
//! callback récursif.

use std::collections::VecDeque;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::traits::{AudioOutput, PlaybackId, PlaybackNotifier};
use crate::types::PlaybackBuffer;

/// Résultat du traitement d'une fin de lecture
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackProgress {
    /// Le buffer suivant a démarré
    Advanced,
    /// La file est vide, plus rien ne joue
    Drained,
    /// Fin de lecture d'un buffer qui n'est plus le buffer courant
    Stale,
}

/// Statistiques du séquenceur
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SequencerStats {
    pub buffers_enqueued: u64,
    pub buffers_played: u64,
    pub playback_failures: u64,
    pub buffers_discarded: u64,
}

/// File FIFO de buffers avec un seul buffer audible
pub struct PlaybackSequencer<O: AudioOutput> {
    output: O,
    queue: VecDeque<PlaybackBuffer>,
    playing: Option<PlaybackId>,
    next_id: PlaybackId,
    completions: mpsc::UnboundedSender<PlaybackId>,
    stats: SequencerStats,
}

impl<O: AudioOutput> PlaybackSequencer<O> {
    /// Crée un séquenceur et le flux de ses fins de lecture
    ///
    /// Chaque identifiant reçu sur le flux doit être repassé à
    /// `on_playback_complete`.
    pub fn new(output: O) -> (Self, mpsc::UnboundedReceiver<PlaybackId>) {
        let (completions, completions_rx) = mpsc::unbounded_channel();
        let sequencer = Self {
            output,
            queue: VecDeque::new(),
            playing: None,
            next_id: 0,
            completions,
            stats: SequencerStats::default(),
        };
        (sequencer, completions_rx)
    }

    /// Ajoute un buffer en fin de file et démarre la lecture si rien ne joue
    pub fn enqueue(&mut self, buffer: PlaybackBuffer) {
        self.stats.buffers_enqueued += 1;
        self.queue.push_back(buffer);
        if self.playing.is_none() {
            self.play_next();
        }
    }

    /// Traite la fin de lecture `id`
    pub fn on_playback_complete(&mut self, id: PlaybackId) -> PlaybackProgress {
        if self.playing != Some(id) {
            debug!(id, "fin de lecture ignorée (buffer déjà abandonné)");
            return PlaybackProgress::Stale;
        }

        self.playing = None;
        self.play_next();

        if self.playing.is_some() {
            PlaybackProgress::Advanced
        } else {
            PlaybackProgress::Drained
        }
    }

    /// Démarre le prochain buffer jouable
    ///
    /// Un buffer dont la lecture échoue est abandonné et le suivant est essayé.
    fn play_next(&mut self) {
        while let Some(buffer) = self.queue.pop_front() {
            let id = self.next_id;
            self.next_id += 1;

            let samples = buffer.len();
            match self.output.play(buffer, PlaybackNotifier::new(id, self.completions.clone())) {
                Ok(()) => {
                    debug!(id, samples, restants = self.queue.len(), "lecture démarrée");
                    self.playing = Some(id);
                    self.stats.buffers_played += 1;
                    return;
                }
                Err(e) => {
                    warn!(id, error = %e, "lecture impossible, buffer ignoré");
                    self.stats.playback_failures += 1;
                }
            }
        }
    }

    /// Vide la file et coupe le buffer en cours
    pub fn clear(&mut self) {
        self.stats.buffers_discarded += self.queue.len() as u64;
        self.queue.clear();

        if self.playing.take().is_some() {
            if let Err(e) = self.output.stop() {
                warn!(error = %e, "arrêt de la sortie audio en échec");
            }
        }
    }

    /// Un buffer est-il en cours de lecture ?
    pub fn is_playing(&self) -> bool {
        self.playing.is_some()
    }

    /// Nombre de buffers en attente (hors buffer courant)
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.playing.is_none() && self.queue.is_empty()
    }

    pub fn stats(&self) -> SequencerStats {
        self.stats
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockOutput;

    fn buffer(len: usize) -> PlaybackBuffer {
        PlaybackBuffer::new(vec![0.1; len], 24000)
    }

    #[test]
    fn test_first_buffer_starts_immediately() {
        let output = MockOutput::new();
        let (mut sequencer, _completions) = PlaybackSequencer::new(output.clone());

        sequencer.enqueue(buffer(2048));

        assert!(sequencer.is_playing());
        assert_eq!(output.started_lengths(), vec![2048]);
    }

    #[test]
    fn test_second_buffer_waits_for_completion() {
        let output = MockOutput::new();
        let (mut sequencer, mut completions) = PlaybackSequencer::new(output.clone());

        // 4096 octets puis 2048 octets = 2048 puis 1024 échantillons
        sequencer.enqueue(buffer(2048));
        sequencer.enqueue(buffer(1024));
        assert_eq!(output.started_lengths(), vec![2048]);
        assert_eq!(sequencer.queued(), 1);

        assert!(output.complete_current());
        let id = completions.try_recv().unwrap();
        assert_eq!(sequencer.on_playback_complete(id), PlaybackProgress::Advanced);
        assert_eq!(output.started_lengths(), vec![2048, 1024]);

        assert!(output.complete_current());
        let id = completions.try_recv().unwrap();
        assert_eq!(sequencer.on_playback_complete(id), PlaybackProgress::Drained);
        assert!(sequencer.is_idle());
    }

    #[test]
    fn test_fifo_order_and_single_flight() {
        let output = MockOutput::new();
        let (mut sequencer, mut completions) = PlaybackSequencer::new(output.clone());

        for len in [10, 20, 30, 40, 50] {
            sequencer.enqueue(buffer(len));
            assert!(output.active_count() <= 1);
        }

        while output.complete_current() {
            let id = completions.try_recv().unwrap();
            sequencer.on_playback_complete(id);
            assert!(output.active_count() <= 1);
        }

        assert_eq!(output.started_lengths(), vec![10, 20, 30, 40, 50]);
        assert_eq!(sequencer.stats().buffers_played, 5);
    }

    #[test]
    fn test_failed_playback_is_skipped() {
        let output = MockOutput::new();
        output.fail_next(1);
        let (mut sequencer, _completions) = PlaybackSequencer::new(output.clone());

        sequencer.enqueue(buffer(10));
        assert!(!sequencer.is_playing());
        assert_eq!(sequencer.stats().playback_failures, 1);

        sequencer.enqueue(buffer(20));
        assert!(sequencer.is_playing());
        assert_eq!(output.started_lengths(), vec![20]);
    }

    #[test]
    fn test_failure_mid_queue_advances() {
        let output = MockOutput::new();
        let (mut sequencer, mut completions) = PlaybackSequencer::new(output.clone());

        sequencer.enqueue(buffer(10));
        sequencer.enqueue(buffer(20));
        sequencer.enqueue(buffer(30));

        output.fail_next(1);
        output.complete_current();
        let id = completions.try_recv().unwrap();
        assert_eq!(sequencer.on_playback_complete(id), PlaybackProgress::Advanced);
        assert_eq!(output.started_lengths(), vec![10, 30]);
    }

    #[test]
    fn test_clear_discards_queue_and_ignores_late_completion() {
        let output = MockOutput::new();
        let (mut sequencer, mut completions) = PlaybackSequencer::new(output.clone());

        sequencer.enqueue(buffer(10));
        sequencer.enqueue(buffer(20));
        let notifier_id = output.current_id().unwrap();

        sequencer.clear();
        assert!(sequencer.is_idle());
        assert_eq!(output.stop_count(), 1);
        assert_eq!(sequencer.stats().buffers_discarded, 1);

        // Une fin de lecture tardive ne relance rien
        assert_eq!(sequencer.on_playback_complete(notifier_id), PlaybackProgress::Stale);
        assert!(completions.try_recv().is_err());

        sequencer.enqueue(buffer(30));
        assert_eq!(output.started_lengths(), vec![10, 30]);
    }
}
