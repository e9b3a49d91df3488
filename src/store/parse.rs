//! ParseStore - REST client for a Parse-compatible document server.
//!
//! Requires the `parse` feature.
//!
//! ## Mapping
//!
//! - `find` → `GET /classes/{C}?where=<json>&order=createdAt,objectId&limit=..&skip=..`,
//!   answer `{"results": [...]}`, fetched page by page until a short page
//! - `insert` → `POST /classes/{C}`, answer `{"objectId": "..."}`
//! - `update` → `PUT /classes/{C}/{id}`, answer echoes the new `version`
//! - `conditional_update` → `PUT /classes/{C}/{id}?where={"objectId":id,"version":v}`
//! - `delete` → `DELETE /classes/{C}/{id}`
//!
//! Every write increments `version` with Parse's `Increment` operator, so the
//! counter is advanced by the server, not computed here. A 404 or Parse error
//! code 101 ("object not found") means the predicate matched nothing.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{
    to_fields, DocumentStore, Fields, Filter, Record, StoreError, Versioned, WriteOutcome,
};

const APP_ID_HEADER: &str = "X-Parse-Application-Id";
const JS_KEY_HEADER: &str = "X-Parse-Javascript-Key";

/// Parse error code for a missing object (or a failed `where` on update).
const OBJECT_NOT_FOUND: i64 = 101;

/// Results per `find` page. Parse answers 100 when no limit is sent.
const DEFAULT_PAGE_SIZE: usize = 1000;

/// Oldest first; `objectId` breaks ties between equal timestamps.
const CREATION_ORDER: &str = "createdAt,objectId";

/// Server-managed fields stripped before a document is decoded into a record.
const METADATA_FIELDS: &[&str] = &["objectId", "version", "createdAt", "updatedAt", "ACL"];

#[derive(Deserialize)]
struct FindResponse {
    results: Vec<Fields>,
}

#[derive(Deserialize)]
struct CreateResponse {
    #[serde(rename = "objectId")]
    object_id: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: Option<i64>,
    error: Option<String>,
}

/// Document store talking to a Parse server over HTTP.
#[derive(Clone)]
pub struct ParseStore {
    base_url: String,
    app_id: String,
    js_key: String,
    page_size: usize,
    client: Client,
}

impl ParseStore {
    /// Build a client for `base_url` (e.g. `https://parseapi.back4app.com`).
    ///
    /// `timeout` bounds every request, so a stalled server fails the request
    /// instead of holding it open.
    pub fn new(
        base_url: impl Into<String>,
        app_id: impl Into<String>,
        js_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            app_id: app_id.into(),
            js_key: js_key.into(),
            page_size: DEFAULT_PAGE_SIZE,
            client,
        })
    }

    /// Fetch `find` results in pages of `page_size` (at least 1).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/classes/{}", self.base_url, path))
            .header(APP_ID_HEADER, &self.app_id)
            .header(JS_KEY_HEADER, &self.js_key)
    }

    async fn send(request: RequestBuilder) -> Result<Response, StoreError> {
        request.send().await.map_err(|e| {
            warn!(error = %e, "store request failed");
            StoreError::Unavailable(e.to_string())
        })
    }

    async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, StoreError> {
        let status = response.status();
        if !status.is_success() {
            return Err(Self::rejection(response).await.0);
        }
        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))
    }

    /// `Ok` if a failed write means "nothing matched" rather than a real error.
    async fn not_found_or_error(response: Response) -> Result<(), StoreError> {
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        match Self::rejection(response).await {
            (_, Some(OBJECT_NOT_FOUND)) => Ok(()),
            (err, _) => Err(err),
        }
    }

    /// Turn a non-success response into an error plus the Parse error code, if any.
    async fn rejection(response: Response) -> (StoreError, Option<i64>) {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let (message, code) = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(ErrorBody {
                code: Some(code),
                error,
            }) => (format!("[{code}] {}", error.unwrap_or_default()), Some(code)),
            _ => (text, None),
        };
        (StoreError::Rejected { status, message }, code)
    }

    fn decode<R: Record>(mut document: Fields) -> Result<Versioned<R>, StoreError> {
        let id = match document.get("objectId") {
            Some(Value::String(id)) => id.clone(),
            _ => {
                return Err(StoreError::InvalidResponse(format!(
                    "{} document without objectId",
                    R::COLLECTION
                )))
            }
        };
        let version = document
            .get("version")
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                StoreError::InvalidResponse(format!("{} {} has no numeric version", R::COLLECTION, id))
            })?;
        for field in METADATA_FIELDS {
            document.remove(*field);
        }
        let data = serde_json::from_value(Value::Object(document))?;
        Ok(Versioned { id, data, version })
    }

    /// The counter Parse echoes after an `Increment`, if present.
    async fn echoed_version(response: Response) -> Result<Option<u64>, StoreError> {
        let body: Fields = Self::read_json(response).await?;
        Ok(body.get("version").and_then(Value::as_u64))
    }

    fn with_increment(changes: &Fields) -> Fields {
        let mut body = changes.clone();
        body.insert("version".into(), json!({ "__op": "Increment", "amount": 1 }));
        body
    }
}

#[async_trait]
impl DocumentStore for ParseStore {
    async fn find<R: Record>(&self, filter: &Filter) -> Result<Vec<Versioned<R>>, StoreError> {
        let predicate = if filter.is_empty() {
            None
        } else {
            Some(serde_json::to_string(filter)?)
        };

        let mut documents = Vec::new();
        loop {
            let mut request = self.request(Method::GET, R::COLLECTION).query(&[
                ("order", CREATION_ORDER.to_string()),
                ("limit", self.page_size.to_string()),
                ("skip", documents.len().to_string()),
            ]);
            if let Some(predicate) = &predicate {
                request = request.query(&[("where", predicate)]);
            }
            let response = Self::send(request).await?;
            let page: FindResponse = Self::read_json(response).await?;
            let last_page = page.results.len() < self.page_size;
            documents.extend(page.results);
            if last_page {
                break;
            }
        }
        debug!(collection = R::COLLECTION, matches = documents.len(), "find");

        documents.into_iter().map(Self::decode::<R>).collect()
    }

    async fn insert<R: Record>(&self, record: &R) -> Result<Versioned<R>, StoreError> {
        let mut body = to_fields(record)?;
        body.insert("version".into(), json!(1));

        let response = Self::send(self.request(Method::POST, R::COLLECTION).json(&body)).await?;
        let created: CreateResponse = Self::read_json(response).await?;
        debug!(collection = R::COLLECTION, id = %created.object_id, "insert");

        Ok(Versioned {
            id: created.object_id,
            data: record.clone(),
            version: 1,
        })
    }

    async fn update<R: Record>(
        &self,
        id: &str,
        changes: &Fields,
    ) -> Result<WriteOutcome, StoreError> {
        let request = self
            .request(Method::PUT, &format!("{}/{}", R::COLLECTION, id))
            .json(&Self::with_increment(changes));
        let response = Self::send(request).await?;

        if !response.status().is_success() {
            Self::not_found_or_error(response).await?;
            return Ok(WriteOutcome::NotApplied);
        }
        let version = Self::echoed_version(response).await?.ok_or_else(|| {
            StoreError::InvalidResponse(format!("{} {} update without version", R::COLLECTION, id))
        })?;
        Ok(WriteOutcome::Applied { version })
    }

    async fn conditional_update<R: Record>(
        &self,
        id: &str,
        expected_version: u64,
        changes: &Fields,
    ) -> Result<WriteOutcome, StoreError> {
        let predicate = json!({ "objectId": id, "version": expected_version });
        let request = self
            .request(Method::PUT, &format!("{}/{}", R::COLLECTION, id))
            .query(&[("where", predicate.to_string())])
            .json(&Self::with_increment(changes));
        let response = Self::send(request).await?;

        if !response.status().is_success() {
            Self::not_found_or_error(response).await?;
            debug!(collection = R::COLLECTION, id, expected_version, "conditional update not applied");
            return Ok(WriteOutcome::NotApplied);
        }

        // The predicate pinned the old version, so the increment landed on it.
        let version = Self::echoed_version(response)
            .await?
            .unwrap_or(expected_version + 1);
        Ok(WriteOutcome::Applied { version })
    }

    async fn delete<R: Record>(&self, id: &str) -> Result<bool, StoreError> {
        let request = self.request(Method::DELETE, &format!("{}/{}", R::COLLECTION, id));
        let response = Self::send(request).await?;

        if response.status().is_success() {
            return Ok(true);
        }
        Self::not_found_or_error(response).await?;
        Ok(false)
    }
}
