//! Machine à états de l'appel
//!
//! ```text
//!            SessionOpened            RemoteAudio
//!   Idle ──────────────────> Listening ──────────> Speaking
//!    ^                          │  ^                   │
//!    │        SessionClosed     │  └── PlaybackDrained ┘ (si listen_after_playback)
//!    └──────────────────────────┴──────────────────────┘
//! ```
//!
//! `transition` est la seule façon de changer d'état. Le mute n'est pas un
//! état : il est orthogonal.

use serde::{Deserialize, Serialize};

/// État visible de l'appel
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    /// Pas d'appel
    #[default]
    Idle,
    /// Appel ouvert, le micro est écouté
    Listening,
    /// L'interlocuteur parle
    Speaking,
}

impl CallState {
    /// Un appel est-il en cours ?
    pub fn is_active(&self) -> bool {
        !matches!(self, CallState::Idle)
    }

    pub fn label(&self) -> &'static str {
        match self {
            CallState::Idle => "Inactif",
            CallState::Listening => "À l'écoute",
            CallState::Speaking => "Parle",
        }
    }
}

/// Événement qui peut faire changer l'état
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallEvent {
    /// Le canal est ouvert et `initialize` est parti
    SessionOpened,
    /// Un message audio est arrivé
    RemoteAudio,
    /// La file de lecture vient de se vider
    PlaybackDrained,
    /// Le canal est fermé (fin d'appel, serveur ou erreur)
    SessionClosed,
}

/// Calcule l'état suivant
///
/// Avec `listen_after_playback` à `false`, l'appel reste `Speaking` jusqu'à
/// sa fin une fois que l'interlocuteur a parlé.
pub fn transition(state: CallState, event: CallEvent, listen_after_playback: bool) -> CallState {
    use CallEvent::*;
    use CallState::*;

    match (state, event) {
        (_, SessionClosed) => Idle,
        (Idle, SessionOpened) => Listening,
        (Idle, _) => Idle,
        (Listening, RemoteAudio) | (Speaking, RemoteAudio) => Speaking,
        (Speaking, PlaybackDrained) if listen_after_playback => Listening,
        (current, _) => current,
    }
}
