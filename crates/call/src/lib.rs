//! Crate call - pilotage d'un appel vocal
//!
//! Ce crate relie la chaîne audio et la session réseau :
//! - Machine à états de l'appel (`Idle`, `Listening`, `Speaking`)
//! - Contrôleur qui démarre et termine les appels, route les frames
//!   capturées vers le canal et l'audio reçu vers la lecture
//! - Mute orthogonal à l'état
//!
//! # Example
//!
//! ```rust,no_run
//! use audio::{CpalCapture, CpalPlayback};
//! use call::{CallConfig, CallController, CallUpdate};
//! use network::WebSocketConnector;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CallConfig::default();
//! let input = CpalCapture::new(config.audio.clone())?;
//! let output = CpalPlayback::new(&config.audio)?;
//! let mut controller = CallController::new(config, input, output, WebSocketConnector::new())?;
//!
//! controller.start_call("chat-id").await?;
//! while let Some(update) = controller.next_update().await {
//!     if let CallUpdate::Ended(reason) = update {
//!         println!("fin: {}", reason.description());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;      // Configuration d'un appel
pub mod state;       // Machine à états
pub mod controller;  // Contrôleur d'appel
pub mod error;       // Gestion d'erreurs

pub use config::CallConfig;
pub use state::{transition, CallEvent, CallState};
pub use controller::{CallController, CallStats, CallUpdate};
pub use error::{CallError, CallResult};
