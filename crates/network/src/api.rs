//! Client HTTP de l'API de catalogue
//!
//! Le catalogue liste les interlocuteurs disponibles (`chat_id`), permet d'en
//! créer, de les « liker » et de traduire un texte. Ce client est un simple
//! collaborateur de l'appel : il sert à trouver le `chat_id` à appeler.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{NetworkError, NetworkResult};

/// Identifiant réservé du catalogue, jamais affiché
pub const DEFAULT_CHAT_ID: &str = "default";

/// Interlocuteur tel que renvoyé par `GET /chats`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub prompt: String,
    pub voice: String,
    pub image_url: String,
    pub likes: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreateChatRequest {
    pub prompt: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreateChatResponse {
    pub chat_id: String,
    pub voice: String,
    pub image_url: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LikeChatRequest {
    pub chat_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LikeChatResponse {
    pub likes: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TranslateRequest {
    pub text: String,
    pub from_lang: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TranslateResponse {
    pub translated: String,
}

/// Client de l'API de catalogue
#[derive(Clone, Debug)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    /// Crée un client pour l'API à `base_url` (ex: `http://localhost:8000`)
    pub fn new(base_url: &str) -> NetworkResult<Self> {
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(NetworkError::InvalidAddress {
                addr: base_url.to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn parse<T: DeserializeOwned>(endpoint: &str, response: reqwest::Response) -> NetworkResult<T> {
        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Api {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.json::<T>().await?)
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, endpoint: &str, body: &B) -> NetworkResult<T> {
        debug!(endpoint, "POST");
        let response = self.http.post(self.url(endpoint)).json(body).send().await?;
        Self::parse(endpoint, response).await
    }

    /// `GET /chats` : tous les interlocuteurs, indexés par `chat_id`
    pub async fn get_chats(&self) -> NetworkResult<HashMap<String, Chat>> {
        debug!(endpoint = "/chats", "GET");
        let response = self.http.get(self.url("/chats")).send().await?;
        Self::parse("/chats", response).await
    }

    /// `POST /create_chat`
    pub async fn create_chat(&self, prompt: &str) -> NetworkResult<CreateChatResponse> {
        self.post(
            "/create_chat",
            &CreateChatRequest {
                prompt: prompt.to_string(),
            },
        )
        .await
    }

    /// `POST /like_chat` : retourne le nouveau nombre de likes
    pub async fn like_chat(&self, chat_id: &str) -> NetworkResult<u64> {
        let response: LikeChatResponse = self
            .post(
                "/like_chat",
                &LikeChatRequest {
                    chat_id: chat_id.to_string(),
                },
            )
            .await?;
        Ok(response.likes)
    }

    /// `POST /translate`
    pub async fn translate(&self, text: &str, from_lang: &str) -> NetworkResult<String> {
        let response: TranslateResponse = self
            .post(
                "/translate",
                &TranslateRequest {
                    text: text.to_string(),
                    from_lang: from_lang.to_string(),
                },
            )
            .await?;
        Ok(response.translated)
    }
}

/// Nom affiché d'un interlocuteur : première phrase du prompt, 20 caractères max
///
/// # Example
/// ```rust
/// use network::api::partner_name;
///
/// assert_eq!(partner_name("Marie. Une guide de musée."), "Marie");
/// assert_eq!(partner_name("Un capitaine de navire très bavard"), "Un capitaine de navi...");
/// ```
pub fn partner_name(prompt: &str) -> String {
    let first_sentence = prompt.split('.').next().unwrap_or_default();
    if first_sentence.chars().count() > 20 {
        let truncated: String = first_sentence.chars().take(20).collect();
        format!("{truncated}...")
    } else {
        first_sentence.to_string()
    }
}

/// Ordre d'affichage du catalogue
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CatalogFilter {
    #[default]
    All,
    Popular,
    Recent,
}

impl FromStr for CatalogFilter {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(CatalogFilter::All),
            "popular" => Ok(CatalogFilter::Popular),
            "recent" => Ok(CatalogFilter::Recent),
            other => Err(NetworkError::ConfigError(format!("Filtre inconnu: {other}"))),
        }
    }
}

/// Entrée du catalogue prête à afficher
#[derive(Clone, Debug, PartialEq)]
pub struct CatalogEntry {
    pub chat_id: String,
    pub name: String,
    pub chat: Chat,
}

/// Construit la liste affichable : entrée par défaut masquée, ordre selon le filtre
///
/// `All` et `Recent` gardent l'ordre des identifiants ; `Popular` trie par
/// likes décroissants.
pub fn catalog(chats: HashMap<String, Chat>, filter: CatalogFilter) -> Vec<CatalogEntry> {
    let mut entries: Vec<CatalogEntry> = chats
        .into_iter()
        .filter(|(id, _)| id != DEFAULT_CHAT_ID)
        .map(|(chat_id, chat)| CatalogEntry {
            name: partner_name(&chat.prompt),
            chat_id,
            chat,
        })
        .collect();

    entries.sort_by(|a, b| a.chat_id.cmp(&b.chat_id));
    if filter == CatalogFilter::Popular {
        entries.sort_by(|a, b| b.chat.likes.cmp(&a.chat.likes));
    }
    entries
}
