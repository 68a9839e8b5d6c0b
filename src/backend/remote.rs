/// Remote provider: GraphQL over HTTP, an HTTP object store and a bearer session
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::{Arc, RwLock};
use url::Url;

use super::graphql::{
    self, CreateNoteData, DeleteNoteData, GraphQlRequest, GraphQlResponse, ListNotesData,
};
use super::{
    AuthCapability, BackendError, BackendResult, BlobStore, CreateNoteInput, GraphApi, NoteRecord,
};
use crate::config::RemoteConfig;

/// Prefix under which blobs are published, as the platform's storage does.
const PUBLIC_PREFIX: &str = "public";

/// Upper bound on listNotes pages followed in one refresh
const MAX_PAGES: usize = 100;

/// Bearer token shared by every remote capability.
#[derive(Debug, Clone, Default)]
pub struct Session {
    token: Arc<RwLock<Option<String>>>,
}

impl Session {
    pub fn new(token: Option<String>) -> Self {
        Session {
            token: Arc::new(RwLock::new(token)),
        }
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|guard| guard.clone())
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.token.write() {
            *guard = None;
        }
    }

    fn headers(&self, api_key: Option<&str>) -> BackendResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            headers.insert("x-api-key", header_value(key)?);
        }
        if let Some(token) = self.token() {
            headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", token))?);
        }
        if headers.is_empty() {
            return Err(BackendError::Auth("no API key or session token".into()));
        }
        Ok(headers)
    }
}

fn header_value(value: &str) -> BackendResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| BackendError::Auth(format!("bad header value: {}", e)))
}

fn parse_url(raw: &str) -> BackendResult<Url> {
    Url::parse(raw).map_err(|e| BackendError::Unexpected(format!("invalid URL {:?}: {}", raw, e)))
}

/// The three remote capabilities, sharing one HTTP client and session.
pub struct RemoteBackend {
    pub auth: TokenAuth,
    pub api: GraphQlApi,
    pub store: HttpBlobStore,
}

impl RemoteBackend {
    pub fn new(config: &RemoteConfig, username: Option<String>) -> BackendResult<Self> {
        let http = Client::new();
        let session = Session::new(config.auth_token.clone());

        let sign_out_url = config.sign_out_url.as_deref().map(parse_url).transpose()?;

        Ok(RemoteBackend {
            auth: TokenAuth {
                http: http.clone(),
                session: session.clone(),
                sign_out_url,
                username,
            },
            api: GraphQlApi {
                http: http.clone(),
                session: session.clone(),
                endpoint: parse_url(&config.graphql_url)?,
                api_key: config.api_key.clone(),
            },
            store: HttpBlobStore {
                http,
                session,
                base_url: parse_url(&config.storage_url)?,
                api_key: config.api_key.clone(),
            },
        })
    }
}

pub struct GraphQlApi {
    http: Client,
    session: Session,
    endpoint: Url,
    api_key: Option<String>,
}

impl GraphQlApi {
    async fn execute<T: DeserializeOwned>(
        &self,
        query: String,
        variables: serde_json::Value,
    ) -> BackendResult<T> {
        let headers = self.session.headers(self.api_key.as_deref())?;
        let response = self
            .http
            .post(self.endpoint.clone())
            .headers(headers)
            .json(&GraphQlRequest { query, variables })
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(BackendError::Auth(format!("API rejected credentials ({})", status)));
        }
        if !status.is_success() {
            return Err(BackendError::Api(format!("HTTP {}", status)));
        }

        let body: GraphQlResponse<T> = response.json().await?;
        body.into_result()
    }
}

#[async_trait]
impl GraphApi for GraphQlApi {
    async fn list_notes(&self) -> BackendResult<Vec<NoteRecord>> {
        let mut notes = Vec::new();
        let mut next_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let data: ListNotesData = self
                .execute(graphql::list_notes_query(), json!({ "nextToken": next_token }))
                .await?;
            notes.extend(data.list_notes.items.into_iter().flatten());

            next_token = data.list_notes.next_token;
            if next_token.is_none() {
                return Ok(notes);
            }
        }

        log::warn!("⚠️  listNotes still paging after {} pages, truncating", MAX_PAGES);
        Ok(notes)
    }

    async fn create_note(&self, input: &CreateNoteInput) -> BackendResult<NoteRecord> {
        let data: CreateNoteData = self
            .execute(graphql::create_note_mutation(), json!({ "input": input }))
            .await?;
        Ok(data.create_note)
    }

    async fn delete_note(&self, id: &str) -> BackendResult<NoteRecord> {
        let data: DeleteNoteData = self
            .execute(graphql::delete_note_mutation(), json!({ "input": { "id": id } }))
            .await?;
        data.delete_note
            .ok_or_else(|| BackendError::NotFound(format!("note {}", id)))
    }
}

pub struct HttpBlobStore {
    http: Client,
    session: Session,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpBlobStore {
    /// `{base}/public/{key}` with the key percent-encoded as one segment.
    pub fn object_url(&self, key: &str) -> BackendResult<Url> {
        if key.is_empty() {
            return Err(BackendError::InvalidKey(key.to_string()));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::Unexpected(format!("cannot-be-a-base URL: {}", self.base_url)))?
            .pop_if_empty()
            .push(PUBLIC_PREFIX)
            .push(key);
        Ok(url)
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> BackendResult<()> {
        let url = self.object_url(key)?;
        let headers = self.session.headers(self.api_key.as_deref())?;
        let size = bytes.len();

        let response = self.http.put(url).headers(headers).body(bytes).send().await?;
        if !response.status().is_success() {
            return Err(BackendError::Storage(format!(
                "upload of {} failed: HTTP {}",
                key,
                response.status()
            )));
        }

        log::info!("📸 Uploaded {:.1}KB as {}", size as f64 / 1024.0, key);
        Ok(())
    }

    async fn get_url(&self, key: &str) -> BackendResult<String> {
        Ok(self.object_url(key)?.to_string())
    }
}

pub struct TokenAuth {
    http: Client,
    session: Session,
    sign_out_url: Option<Url>,
    username: Option<String>,
}

#[async_trait]
impl AuthCapability for TokenAuth {
    async fn sign_out(&self) -> BackendResult<()> {
        if let (Some(url), Some(token)) = (&self.sign_out_url, self.session.token()) {
            let response = self.http.post(url.clone()).bearer_auth(token).send().await?;
            if !response.status().is_success() {
                return Err(BackendError::Auth(format!("sign-out failed: HTTP {}", response.status())));
            }
        }
        self.session.clear();
        log::info!("👋 Signed out");
        Ok(())
    }

    fn username(&self) -> Option<String> {
        self.username.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RemoteConfig {
        RemoteConfig {
            graphql_url: "https://api.example.com/graphql".into(),
            api_key: None,
            auth_token: Some("secret".into()),
            storage_url: "https://files.example.com/bucket/".into(),
            sign_out_url: None,
        }
    }

    #[test]
    fn test_object_url_encodes_key() {
        let backend = RemoteBackend::new(&config(), None).unwrap();

        let url = backend.store.object_url("my cat?.png").unwrap();
        assert_eq!(
            url.as_str(),
            "https://files.example.com/bucket/public/my%20cat%3F.png"
        );
        assert!(backend.store.object_url("").is_err());
    }

    #[test]
    fn test_session_headers() {
        let session = Session::new(Some("secret".into()));
        let headers = session.headers(Some("key-1")).unwrap();
        assert_eq!(headers.get("x-api-key").unwrap(), "key-1");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer secret");

        session.clear();
        assert_eq!(session.token(), None);
        assert!(matches!(session.headers(None), Err(BackendError::Auth(_))));
    }

    #[tokio::test]
    async fn test_sign_out_without_endpoint_clears_token() {
        let backend = RemoteBackend::new(&config(), Some("ayman".into())).unwrap();
        assert_eq!(backend.api.session.token().as_deref(), Some("secret"));

        backend.auth.sign_out().await.unwrap();

        assert_eq!(backend.api.session.token(), None);
        assert_eq!(backend.auth.username().as_deref(), Some("ayman"));
    }

    #[test]
    fn test_rejects_invalid_endpoint() {
        let mut bad = config();
        bad.graphql_url = "not a url".into();
        assert!(matches!(
            RemoteBackend::new(&bad, None),
            Err(BackendError::Unexpected(_))
        ));
    }
}
