//! Traits abstraits pour les périphériques audio de l'appel
//!
//! Le contrôleur d'appel ne parle qu'à ces traits : les implémentations cpal
//! servent en production, `mock::MockInput` et `mock::MockOutput` servent
//! dans les tests sans matériel.
//!
//! Les traits sont synchrones : démarrer un stream cpal ne bloque pas, et
//! le contrôleur les appelle depuis sa propre tâche.

use tokio::sync::mpsc;

use crate::error::AudioResult;
use crate::processor::CaptureProcessor;
use crate::types::PlaybackBuffer;

/// Trait pour capturer l'audio depuis un périphérique d'entrée
pub trait AudioInput {
    /// Démarre la capture en confiant le processeur au thread audio
    ///
    /// Le périphérique fixe la fréquence d'entrée du processeur puis
    /// l'appelle une fois par quantum de rendu.
    ///
    /// # Erreurs
    /// - `AudioError::NoDeviceFound` : aucun microphone
    /// - `AudioError::PermissionDenied` : accès refusé
    /// - `AudioError::ConfigError` : format non supporté
    fn start(&mut self, processor: CaptureProcessor) -> AudioResult<()>;

    /// Arrête la capture et libère le processeur
    ///
    /// Sans effet si la capture est déjà arrêtée.
    fn stop(&mut self) -> AudioResult<()>;

    fn is_recording(&self) -> bool;

    /// Description du périphérique, pour l'affichage
    fn device_info(&self) -> String {
        "Périphérique inconnu".to_string()
    }
}

/// Identifiant d'une lecture démarrée par le séquenceur
pub type PlaybackId = u64;

/// Jeton de fin de lecture
///
/// Le périphérique le consomme quand le dernier échantillon du buffer a été
/// rendu. Un jeton détruit sans `notify` ne produit aucun événement.
#[derive(Debug)]
pub struct PlaybackNotifier {
    id: PlaybackId,
    completions: mpsc::UnboundedSender<PlaybackId>,
}

impl PlaybackNotifier {
    pub fn new(id: PlaybackId, completions: mpsc::UnboundedSender<PlaybackId>) -> Self {
        Self { id, completions }
    }

    pub fn id(&self) -> PlaybackId {
        self.id
    }

    /// Signale la fin de lecture (une seule fois, par construction)
    pub fn notify(self) {
        let _ = self.completions.send(self.id);
    }
}

/// Trait pour jouer l'audio sur un périphérique de sortie
pub trait AudioOutput {
    /// Démarre la lecture d'un buffer
    ///
    /// Le séquenceur garantit qu'un seul buffer est confié à la fois.
    ///
    /// # Erreurs
    /// `AudioError::PlaybackError` si la lecture ne peut pas démarrer
    fn play(&mut self, buffer: PlaybackBuffer, done: PlaybackNotifier) -> AudioResult<()>;

    /// Coupe le buffer en cours, sans notification de fin
    fn stop(&mut self) -> AudioResult<()>;

    fn device_info(&self) -> String {
        "Périphérique inconnu".to_string()
    }
}
