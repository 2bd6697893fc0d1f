// Client en ligne de commande pour les appels vocaux
//
// Cette application permet :
// - De parcourir le catalogue d'interlocuteurs (liste, création, likes)
// - De traduire un texte via l'API
// - De lister les périphériques audio
// - De passer un appel vocal en temps réel avec un interlocuteur

mod visualizer;

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use audio::{list_input_devices, list_output_devices, AudioConfig, CpalCapture, CpalPlayback};
use call::{CallConfig, CallController, CallUpdate};
use clap::{Parser, Subcommand};
use network::api::{catalog, CatalogFilter};
use network::{utils, ApiClient, SessionConfig, WebSocketConnector};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::visualizer::{render_meter, DEFAULT_SENSITIVITY};

/// Nombre de barres du visualiseur
const METER_BARS: usize = 24;

/// Rafraîchissement du visualiseur
const METER_REFRESH: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(author, version, about = "Client d'appel vocal temps réel")]
struct Cli {
    /// URL de l'API HTTP du catalogue
    #[arg(long, env = "VOICE_CALL_API", default_value = "http://localhost:8000", global = true)]
    api: String,

    /// URL du canal duplex (dérivée de --api par défaut)
    #[arg(long, env = "VOICE_CALL_SERVER", global = true)]
    server: Option<String>,

    /// Niveau de log si RUST_LOG n'est pas défini
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Liste les interlocuteurs disponibles
    Chats {
        /// Ordre d'affichage : all, popular ou recent
        #[arg(short, long, default_value = "all")]
        filter: String,
    },
    /// Crée un interlocuteur à partir d'une description
    Create {
        #[arg(short, long)]
        prompt: String,
    },
    /// Ajoute un like à un interlocuteur
    Like {
        #[arg(short, long)]
        chat_id: String,
    },
    /// Traduit un texte vers l'anglais
    Translate {
        #[arg(short, long)]
        text: String,
        /// Langue source
        #[arg(short, long, default_value = "fr")]
        from: String,
    },
    /// Liste les périphériques audio
    Devices,
    /// Appelle un interlocuteur
    Call {
        #[arg(short, long)]
        chat_id: String,
        /// Démarre micro coupé
        #[arg(long)]
        muted: bool,
        /// Repasse à l'écoute quand l'interlocuteur a fini de parler
        #[arg(long)]
        listen_after_playback: bool,
        /// Gate plus sensible, pour les micros faibles ou lointains
        #[arg(long)]
        sensitive: bool,
        /// Sensibilité du visualiseur, de 0 (gain 1x) à 1 (gain 10x)
        #[arg(long, default_value_t = DEFAULT_SENSITIVITY, value_parser = parse_sensitivity)]
        meter_sensitivity: f32,
        /// Délai d'ouverture du canal en secondes
        #[arg(long, default_value = "10")]
        connect_timeout: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Chats { ref filter } => list_chats(&cli.api, filter).await,
        Commands::Create { ref prompt } => create_chat(&cli.api, prompt).await,
        Commands::Like { ref chat_id } => like_chat(&cli.api, chat_id).await,
        Commands::Translate { ref text, ref from } => translate(&cli.api, text, from).await,
        Commands::Devices => show_devices(),
        Commands::Call {
            ref chat_id,
            muted,
            listen_after_playback,
            sensitive,
            meter_sensitivity,
            connect_timeout,
        } => {
            let mut session = match &cli.server {
                Some(url) => SessionConfig {
                    server_url: url.clone(),
                    ..Default::default()
                },
                None => SessionConfig::from_api_base(&cli.api)?,
            };
            session.connect_timeout = Duration::from_secs(connect_timeout);

            let audio = if sensitive {
                AudioConfig::sensitive()
            } else {
                AudioConfig::default()
            };
            let config = CallConfig {
                audio,
                session,
                start_muted: muted,
                listen_after_playback,
            };
            run_call(config, chat_id, meter_sensitivity).await
        }
    }
}

/// Affiche le catalogue
async fn list_chats(api: &str, filter: &str) -> Result<()> {
    let filter: CatalogFilter = filter.parse()?;
    let client = ApiClient::new(api)?;

    let chats = client
        .get_chats()
        .await
        .with_context(|| format!("Catalogue indisponible sur {}", api))?;
    let entries = catalog(chats, filter);

    if entries.is_empty() {
        println!("📭 Aucun interlocuteur disponible");
        return Ok(());
    }

    println!("📒 {} interlocuteur(s) :", entries.len());
    for entry in entries {
        println!(
            "   {:<36} {:<24} ❤️  {:<5} 🗣️  {}",
            entry.chat_id, entry.name, entry.chat.likes, entry.chat.voice
        );
    }
    Ok(())
}

async fn create_chat(api: &str, prompt: &str) -> Result<()> {
    let client = ApiClient::new(api)?;
    let created = client.create_chat(prompt).await?;

    println!("✅ Interlocuteur créé :");
    println!("   Identifiant : {}", created.chat_id);
    println!("   Voix : {}", created.voice);
    println!("   Image : {}", created.image_url);
    println!("\n📞 Pour l'appeler : voice-call call --chat-id {}", created.chat_id);
    Ok(())
}

async fn like_chat(api: &str, chat_id: &str) -> Result<()> {
    let client = ApiClient::new(api)?;
    let likes = client.like_chat(chat_id).await?;
    println!("❤️  {} : {} like(s)", chat_id, likes);
    Ok(())
}

async fn translate(api: &str, text: &str, from: &str) -> Result<()> {
    let client = ApiClient::new(api)?;
    let translated = client.translate(text, from).await?;
    println!("🌍 {}", translated);
    Ok(())
}

/// Liste les périphériques audio disponibles
fn show_devices() -> Result<()> {
    println!("🎤 Périphériques d'entrée :");
    for device in list_input_devices()? {
        println!("   • {}", device);
    }

    println!("🔊 Périphériques de sortie :");
    for device in list_output_devices()? {
        println!("   • {}", device);
    }
    Ok(())
}

fn parse_sensitivity(value: &str) -> Result<f32, String> {
    let sensitivity: f32 = value
        .parse()
        .map_err(|_| format!("sensibilité invalide: {}", value))?;
    if !(0.0..=1.0).contains(&sensitivity) {
        return Err(format!("sensibilité hors de [0, 1]: {}", sensitivity));
    }
    Ok(sensitivity)
}

/// Action demandée au clavier pendant l'appel
#[derive(Debug, PartialEq)]
enum KeyCommand {
    ToggleMute,
    Quit,
    Text(String),
    Unknown,
}

fn parse_command(line: &str) -> KeyCommand {
    let line = line.trim();
    match line {
        "m" => KeyCommand::ToggleMute,
        "q" => KeyCommand::Quit,
        _ => match line.strip_prefix("t ") {
            Some(text) if !text.trim().is_empty() => KeyCommand::Text(text.trim().to_string()),
            _ => KeyCommand::Unknown,
        },
    }
}

/// Boucle d'appel : événements du contrôleur, clavier, Ctrl+C et visualiseur
async fn run_call(config: CallConfig, chat_id: &str, meter_sensitivity: f32) -> Result<()> {
    let input = CpalCapture::new(config.audio.clone())?;
    let output = CpalPlayback::new(&config.audio)?;
    let mut controller = CallController::new(config, input, output, WebSocketConnector::new())?;

    println!("📞 Appel de {}...", chat_id);
    controller
        .start_call(chat_id)
        .await
        .with_context(|| format!("Impossible d'appeler {}", chat_id))?;

    println!("✅ Appel en cours");
    println!("\n📋 Commandes :");
    println!("   • m + Entrée : couper / rétablir le micro");
    println!("   • t <texte> + Entrée : envoyer un message texte");
    println!("   • q + Entrée ou Ctrl+C : raccrocher\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(METER_REFRESH);
    let mut stdin_open = true;
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            update = controller.next_update() => match update {
                Some(CallUpdate::StateChanged { to, .. }) => {
                    debug!(state = ?to, "état affiché");
                }
                Some(CallUpdate::Ended(reason)) => {
                    println!("\n🔌 Appel terminé : {}", reason.description());
                    break;
                }
                Some(_) => {}
                None => break,
            },

            _ = &mut ctrl_c => {
                println!("\n🛑 Raccrochage demandé");
                controller.end_call().await;
                break;
            }

            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => match parse_command(&line) {
                    KeyCommand::ToggleMute => {
                        let muted = controller.toggle_mute();
                        println!("{}", if muted { "🔇 Micro coupé" } else { "🎙️ Micro rétabli" });
                    }
                    KeyCommand::Quit => {
                        controller.end_call().await;
                        break;
                    }
                    KeyCommand::Text(text) => {
                        if let Err(e) = controller.send_text(&text) {
                            println!("❌ Message non envoyé : {}", e);
                        }
                    }
                    KeyCommand::Unknown => println!("❌ Commande inconnue"),
                },
                None => stdin_open = false,
            },

            _ = ticker.tick() => {
                let mute = if controller.is_muted() { " 🔇" } else { "" };
                let elapsed = controller
                    .session_stats()
                    .map(|stats| utils::format_call_duration(stats.uptime()))
                    .unwrap_or_default();
                let meter = render_meter(controller.state(), controller.amplitude(), meter_sensitivity, METER_BARS);
                print!("\r{} {}{}   ", meter, elapsed, mute);
                io::stdout().flush()?;
            }
        }
    }

    print_summary(&controller);
    Ok(())
}

fn print_summary<I, O, C>(controller: &CallController<I, O, C>)
where
    I: audio::AudioInput,
    O: audio::AudioOutput,
    C: network::TransportConnector,
{
    let stats = controller.stats();
    info!(?stats, "statistiques d'appel");

    println!("\n📊 Bilan :");
    if let Some(session) = controller.session_stats() {
        println!("   Durée : {}", utils::format_call_duration(session.uptime()));
    }
    println!("   Frames envoyées : {}", stats.frames_forwarded);
    println!("   Frames retenues (micro coupé) : {}", stats.frames_muted);
    match controller.session_stats() {
        Some(session) => println!(
            "   Frames perdues : {} ({:.1}%)",
            stats.frames_dropped,
            session.drop_percentage()
        ),
        None => println!("   Frames perdues : {}", stats.frames_dropped),
    }
    println!("   Réponses reçues : {}", stats.buffers_queued);
    if stats.decode_failures > 0 {
        println!("   Réponses illisibles : {}", stats.decode_failures);
    }
    let audio_sent = stats.frames_forwarded * controller.config().audio.frame_size_bytes() as u64;
    println!("   Audio émis : {}", utils::format_bytes(audio_sent));
    println!("👋 Au revoir !");
}
