//! REST gateway for an Elasticsearch-compatible engine.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use catalog_types::EngineSettings;

use crate::error::EngineError;
use crate::gateway::EngineGateway;
use crate::query::{SearchHit, SearchQuery, SearchRequest, SearchResults, StoredDocument};

/// Configuration for the REST gateway.
#[derive(Debug, Clone)]
pub struct ElasticsearchConfig {
    /// Base URL (e.g., "http://localhost:9200")
    pub base_url: String,

    pub username: Option<String>,

    pub password: Option<SecretString>,

    /// Request timeout
    pub timeout: Duration,
}

impl ElasticsearchConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            username: None,
            password: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(SecretString::from(password.into()));
        self
    }

    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self {
            base_url: settings.url.clone(),
            username: settings.username.clone(),
            password: settings.password.clone().map(SecretString::from),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }
}

/// Engine gateway speaking the Elasticsearch REST API.
pub struct ElasticsearchGateway {
    client: Client,
    base_url: Url,
    config: ElasticsearchConfig,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Structured {
        #[serde(rename = "type")]
        kind: String,
        reason: Option<String>,
    },
    Plain(String),
}

impl ErrorDetail {
    fn kind(&self) -> &str {
        match self {
            ErrorDetail::Structured { kind, .. } => kind.as_str(),
            ErrorDetail::Plain(_) => "",
        }
    }

    fn describe(&self) -> String {
        match self {
            ErrorDetail::Structured { kind, reason } => match reason {
                Some(reason) => format!("{}: {}", kind, reason),
                None => kind.clone(),
            },
            ErrorDetail::Plain(message) => message.clone(),
        }
    }
}

impl ElasticsearchGateway {
    /// Create a new gateway. No request is made until the first call.
    pub fn new(config: ElasticsearchConfig) -> Result<Self, EngineError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| EngineError::Config(format!("invalid engine url: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(EngineError::Config(format!(
                "engine url '{}' cannot be a base",
                config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EngineError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, EngineError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| EngineError::Config("engine url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, EngineError> {
        let url = self.url(segments)?;
        debug!(%method, %url, "Engine request");
        let builder = self.client.request(method, url);
        Ok(match &self.config.username {
            Some(user) => builder.basic_auth(
                user,
                self.config.password.as_ref().map(|p| p.expose_secret()),
            ),
            None => builder,
        })
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, EngineError> {
        builder
            .send()
            .await
            .map_err(|e| EngineError::Unavailable(e.to_string()))
    }

    /// Map a non-success response onto the error taxonomy.
    async fn failure(operation: &str, target: &str, response: Response) -> EngineError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.error);

        if matches!(
            status,
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
        ) {
            return EngineError::Unavailable(format!("HTTP {} during {}", status, operation));
        }
        if status == StatusCode::NOT_FOUND {
            return EngineError::NotFound(target.to_string());
        }
        if let Some(detail) = &detail {
            if detail.kind() == "resource_already_exists_exception" {
                return EngineError::AlreadyExists(target.to_string());
            }
        }

        let reason = detail
            .map(|d| d.describe())
            .unwrap_or_else(|| format!("HTTP {}: {}", status, body));
        EngineError::operation(operation, reason)
    }

    async fn expect_success(
        &self,
        operation: &str,
        target: &str,
        builder: RequestBuilder,
    ) -> Result<Response, EngineError> {
        let response = self.send(builder).await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::failure(operation, target, response).await)
        }
    }

    async fn json<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, EngineError> {
        response
            .json()
            .await
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))
    }

    /// HEAD probe: 200 -> true, 404 -> false.
    async fn head(&self, operation: &str, segments: &[&str]) -> Result<bool, EngineError> {
        let response = self.send(self.request(Method::HEAD, segments)?).await?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::failure(operation, &segments.join("/"), response).await),
        }
    }
}

fn index_target(name: &str) -> String {
    format!("index '{}'", name)
}

fn document_target(name: &str, id: &str) -> String {
    format!("document '{}' in '{}'", id, name)
}

#[derive(Deserialize)]
struct AliasEntry {
    #[serde(default)]
    aliases: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct CatIndex {
    index: String,
}

#[async_trait]
impl EngineGateway for ElasticsearchGateway {
    async fn exists(&self, name: &str) -> Result<bool, EngineError> {
        // HEAD /{name} also answers true for aliases
        if !self.head("exists", &[name]).await? {
            return Ok(false);
        }
        Ok(!self.head("alias_exists", &["_alias", name]).await?)
    }

    async fn create(&self, name: &str) -> Result<String, EngineError> {
        let builder = self.request(Method::PUT, &[name])?;
        self.expect_success("create_index", &index_target(name), builder)
            .await?;
        self.get_engine_id(name)
            .await
            .map_err(|e| EngineError::CreatedWithoutId {
                index: name.to_string(),
                reason: e.to_string(),
            })
    }

    async fn delete(&self, name: &str) -> Result<(), EngineError> {
        let builder = self.request(Method::DELETE, &[name])?;
        self.expect_success("delete_index", &index_target(name), builder)
            .await?;
        Ok(())
    }

    async fn get_engine_id(&self, name: &str) -> Result<String, EngineError> {
        let builder = self.request(Method::GET, &[name, "_settings", "index.uuid"])?;
        let response = self
            .expect_success("get_settings", &index_target(name), builder)
            .await?;
        let body: Value = Self::json(response).await?;

        // An alias resolves to its concrete index; only an exact key is ours
        let entry = body
            .get(name)
            .ok_or_else(|| EngineError::NotFound(index_target(name)))?;
        entry
            .pointer("/settings/index/uuid")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| EngineError::InvalidResponse(format!("no uuid for '{}'", name)))
    }

    async fn list_index_names(&self) -> Result<BTreeSet<String>, EngineError> {
        let builder = self
            .request(Method::GET, &["_cat", "indices"])?
            .query(&[("h", "index"), ("format", "json")]);
        let response = self.expect_success("list_indices", "_cat/indices", builder).await?;
        let rows: Vec<CatIndex> = Self::json(response).await?;

        Ok(rows
            .into_iter()
            .map(|r| r.index)
            .filter(|name| !name.starts_with('.'))
            .collect())
    }

    async fn create_alias(&self, name: &str, alias: &str) -> Result<(), EngineError> {
        let builder = self.request(Method::PUT, &[name, "_alias", alias])?;
        self.expect_success("create_alias", &index_target(name), builder)
            .await?;
        Ok(())
    }

    async fn list_aliases_for(&self, name: &str) -> Result<BTreeSet<String>, EngineError> {
        let builder = self.request(Method::GET, &[name, "_alias"])?;
        let response = self
            .expect_success("get_alias", &index_target(name), builder)
            .await?;
        let body: HashMap<String, AliasEntry> = Self::json(response).await?;

        Ok(body
            .into_values()
            .flat_map(|entry| entry.aliases.into_keys())
            .collect())
    }

    async fn delete_alias(&self, name: &str, alias: &str) -> Result<(), EngineError> {
        let builder = self.request(Method::DELETE, &[name, "_alias", alias])?;
        self.expect_success(
            "delete_alias",
            &format!("alias '{}' on '{}'", alias, name),
            builder,
        )
        .await?;
        Ok(())
    }

    async fn indices_for_alias(&self, alias: &str) -> Result<BTreeSet<String>, EngineError> {
        let builder = self.request(Method::GET, &["_alias", alias])?;
        let response = self.send(builder).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(BTreeSet::new());
        }
        if !response.status().is_success() {
            return Err(Self::failure("get_alias", alias, response).await);
        }
        let body: HashMap<String, AliasEntry> = Self::json(response).await?;
        Ok(body.into_keys().collect())
    }

    async fn alias_exists(&self, alias: &str) -> Result<bool, EngineError> {
        self.head("alias_exists", &["_alias", alias]).await
    }

    async fn alias_or_index_exists(&self, name_or_alias: &str) -> Result<bool, EngineError> {
        self.head("exists", &[name_or_alias]).await
    }

    async fn index_document(
        &self,
        name: &str,
        id: Option<&str>,
        document: &Value,
    ) -> Result<String, EngineError> {
        // The engine would auto-create a missing index on write
        if !self.alias_or_index_exists(name).await? {
            return Err(EngineError::NotFound(index_target(name)));
        }

        let builder = match id {
            Some(id) => self.request(Method::PUT, &[name, "_doc", id])?,
            None => self.request(Method::POST, &[name, "_doc"])?,
        }
        .query(&[("refresh", "wait_for")])
        .json(document);

        #[derive(Deserialize)]
        struct IndexResponse {
            #[serde(rename = "_id")]
            id: String,
        }

        let response = self
            .expect_success("index_document", &index_target(name), builder)
            .await?;
        let body: IndexResponse = Self::json(response).await?;
        Ok(body.id)
    }

    async fn get_document(&self, name: &str, id: &str) -> Result<StoredDocument, EngineError> {
        #[derive(Deserialize)]
        struct GetResponse {
            #[serde(rename = "_index")]
            index: String,
            #[serde(rename = "_id")]
            id: String,
            #[serde(rename = "_source", default)]
            source: Value,
        }

        let builder = self.request(Method::GET, &[name, "_doc", id])?;
        let response = self
            .expect_success("get_document", &document_target(name, id), builder)
            .await?;
        let body: GetResponse = Self::json(response).await?;
        Ok(StoredDocument {
            index: body.index,
            id: body.id,
            source: body.source,
        })
    }

    async fn update_document(
        &self,
        name: &str,
        id: &str,
        partial: &Value,
    ) -> Result<(), EngineError> {
        let builder = self
            .request(Method::POST, &[name, "_update", id])?
            .query(&[("refresh", "wait_for")])
            .json(&json!({ "doc": partial }));
        self.expect_success("update_document", &document_target(name, id), builder)
            .await?;
        Ok(())
    }

    async fn delete_document_by_id(&self, name: &str, id: &str) -> Result<(), EngineError> {
        let builder = self
            .request(Method::DELETE, &[name, "_doc", id])?
            .query(&[("refresh", "wait_for")]);
        self.expect_success("delete_document", &document_target(name, id), builder)
            .await?;
        Ok(())
    }

    async fn delete_documents_by_query(
        &self,
        name: &str,
        query: &SearchQuery,
    ) -> Result<u64, EngineError> {
        #[derive(Deserialize)]
        struct DeleteByQueryResponse {
            #[serde(default)]
            deleted: u64,
        }

        let builder = self
            .request(Method::POST, &[name, "_delete_by_query"])?
            .query(&[("refresh", "true")])
            .json(&json!({ "query": query.to_dsl() }));
        let response = self
            .expect_success("delete_by_query", &index_target(name), builder)
            .await?;
        let body: DeleteByQueryResponse = Self::json(response).await?;
        Ok(body.deleted)
    }

    async fn search(
        &self,
        name: &str,
        request: &SearchRequest,
    ) -> Result<SearchResults, EngineError> {
        #[derive(Deserialize)]
        struct SearchResponse {
            hits: HitsEnvelope,
        }

        #[derive(Deserialize)]
        struct HitsEnvelope {
            total: Option<Total>,
            hits: Vec<RawHit>,
        }

        #[derive(Deserialize)]
        struct Total {
            value: u64,
        }

        #[derive(Deserialize)]
        struct RawHit {
            #[serde(rename = "_index")]
            index: String,
            #[serde(rename = "_id")]
            id: String,
            #[serde(rename = "_score")]
            score: Option<f64>,
            #[serde(rename = "_source", default)]
            source: Value,
        }

        let builder = self
            .request(Method::POST, &[name, "_search"])?
            .json(&request.to_body());
        let response = self
            .expect_success("search", &index_target(name), builder)
            .await?;
        let body: SearchResponse = Self::json(response).await?;

        let hits: Vec<SearchHit> = body
            .hits
            .hits
            .into_iter()
            .map(|h| SearchHit {
                index: h.index,
                id: h.id,
                score: h.score,
                source: h.source,
            })
            .collect();
        let total = body.hits.total.map(|t| t.value).unwrap_or(hits.len() as u64);

        Ok(SearchResults { total, hits })
    }
}
