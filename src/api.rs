//! Remote character source
//!
//! A focused client for the Rick and Morty GraphQL API:
//! - Paged character list with optional name filter
//! - Character detail by id
//!
//! GraphQL here is plain JSON over HTTP POST; queries are fixed documents
//! and responses decode into typed structs.

use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use thiserror::Error;

use crate::assignments::CharacterSummary;

const API_ENDPOINT: &str = "https://rickandmortyapi.com/graphql";

const CHARACTERS_QUERY: &str = "\
query Characters($page: Int, $filter: FilterCharacter) {
  characters(page: $page, filter: $filter) {
    info { pages next prev }
    results {
      id name status species gender image
      origin { name }
      location { name }
    }
  }
}";

const CHARACTER_QUERY: &str = "\
query Character($id: ID!) {
  character(id: $id) {
    id name status species gender type image
    origin { name dimension }
    location { name dimension type }
    episode { id name episode }
  }
}";

/// Errors that can occur when querying the character API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to parse response: {0}")]
    Parse(String),
}

/// A named place as the remote API reports it on a character.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LocationRef {
    #[serde(default)]
    pub name: String,
}

/// One character from the paged list query.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Character {
    pub id: String,
    pub name: String,
    pub status: String,
    pub species: String,
    pub gender: String,
    pub image: String,
    #[serde(default)]
    pub origin: LocationRef,
    #[serde(default)]
    pub location: LocationRef,
}

/// Pagination info for the character list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PageInfo {
    #[serde(default)]
    pub pages: u32,
    pub next: Option<u32>,
    pub prev: Option<u32>,
}

impl PageInfo {
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    pub fn has_prev(&self) -> bool {
        self.prev.is_some()
    }
}

/// One page of the character list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CharacterPage {
    #[serde(default)]
    pub info: PageInfo,
    #[serde(default)]
    pub results: Vec<Character>,
}

/// Origin with the extra detail-only fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OriginDetail {
    #[serde(default)]
    pub name: String,
    pub dimension: Option<String>,
}

/// Location with the extra detail-only fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LocationDetail {
    #[serde(default)]
    pub name: String,
    pub dimension: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// An episode appearance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Episode {
    pub id: String,
    pub name: String,
    pub episode: String,
}

/// Full character detail from the by-id query.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CharacterDetail {
    pub id: String,
    pub name: String,
    pub status: String,
    pub species: String,
    pub gender: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub image: String,
    #[serde(default)]
    pub origin: OriginDetail,
    #[serde(default)]
    pub location: LocationDetail,
    #[serde(default)]
    pub episode: Vec<Episode>,
}

/// How many episodes the detail view highlights.
pub const HIGHLIGHTED_EPISODES: usize = 6;

impl CharacterDetail {
    /// The first few episode appearances, for the detail view.
    pub fn highlighted_episodes(&self) -> &[Episode] {
        let count = self.episode.len().min(HIGHLIGHTED_EPISODES);
        &self.episode[..count]
    }
}

impl From<&Character> for CharacterSummary {
    fn from(character: &Character) -> Self {
        Self {
            id: character.id.clone(),
            name: character.name.clone(),
            image: character.image.clone(),
            status: character.status.clone(),
            species: character.species.clone(),
        }
    }
}

impl From<&CharacterDetail> for CharacterSummary {
    fn from(character: &CharacterDetail) -> Self {
        Self {
            id: character.id.clone(),
            name: character.name.clone(),
            image: character.image.clone(),
            status: character.status.clone(),
            species: character.species.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct CharactersData {
    characters: Option<CharacterPage>,
}

#[derive(Debug, Deserialize)]
struct CharacterData {
    character: Option<CharacterDetail>,
}

/// Character API client.
#[derive(Clone)]
pub struct CharacterClient {
    client: reqwest::Client,
    endpoint: String,
}

impl Default for CharacterClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CharacterClient {
    /// Create a client against the public endpoint.
    pub fn new() -> Self {
        Self::with_endpoint(API_ENDPOINT)
    }

    /// Create a client against a custom endpoint.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Fetch one page of characters, optionally filtered by name.
    ///
    /// A filter that matches nothing comes back from the API as a
    /// not-found error with null data; that decodes to an empty page.
    pub async fn fetch_characters(
        &self,
        page: u32,
        name_filter: Option<&str>,
    ) -> Result<CharacterPage, ApiError> {
        let filter = name_filter
            .filter(|name| !name.is_empty())
            .map(|name| json!({ "name": name }));
        let variables = json!({ "page": page, "filter": filter });

        let data: CharactersData = self.post(CHARACTERS_QUERY, variables).await?;
        Ok(data.characters.unwrap_or_default())
    }

    /// Fetch full detail for one character; `None` when it does not exist.
    pub async fn fetch_character_by_id(
        &self,
        id: &str,
    ) -> Result<Option<CharacterDetail>, ApiError> {
        let variables = json!({ "id": id });
        let data: CharacterData = self.post(CHARACTER_QUERY, variables).await?;
        Ok(data.character)
    }

    async fn post<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, ApiError> {
        let body = json!({ "query": query, "variables": variables });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Api { status, message });
        }

        let envelope: GraphQlResponse<T> = response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;

        match envelope.data {
            Some(data) => Ok(data),
            // The API reports per-field not-found alongside null data;
            // data-less responses with errors are real failures.
            None => {
                let message = envelope
                    .errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; ");
                Err(ApiError::Api {
                    status: 200,
                    message,
                })
            }
        }
    }
}
