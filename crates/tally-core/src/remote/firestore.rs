//! Firestore REST v1 client

use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::value::{decode_fields, encode_fields};
use super::{RemoteError, RemoteResult, RemoteStore};
use crate::config::ClientConfig;
use crate::models::{Collection, Record};
use crate::util::compact_text;

const PAGE_SIZE: u32 = 300;

#[derive(Clone)]
pub struct FirestoreClient {
    /// `{base}/projects/{project}/databases/{database}/documents`
    documents_url: String,
    /// `projects/{project}/databases/{database}/documents`
    documents_root: String,
    client: Client,
    id_token: Option<String>,
}

impl std::fmt::Debug for FirestoreClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("FirestoreClient")
            .field("documents_url", &self.documents_url)
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl FirestoreClient {
    pub fn new(config: &ClientConfig) -> RemoteResult<Self> {
        if config.project_id.trim().is_empty() {
            return Err(RemoteError::InvalidConfiguration(
                "project id must not be empty".to_string(),
            ));
        }

        let documents_root = format!(
            "projects/{}/databases/{}/documents",
            config.project_id, config.database_id
        );
        Ok(Self {
            documents_url: format!(
                "{}/{}",
                config.firestore_url.trim_end_matches('/'),
                documents_root
            ),
            documents_root,
            client: Client::builder().timeout(config.request_timeout).build()?,
            id_token: None,
        })
    }

    /// Attach the signed-in user's id token to every request.
    #[must_use]
    pub fn with_id_token(mut self, id_token: impl Into<String>) -> Self {
        self.id_token = Some(id_token.into());
        self
    }

    fn collection_url(&self, uid: &str, collection: Collection) -> String {
        format!(
            "{}/users/{}/{}",
            self.documents_url,
            urlencoding::encode(uid),
            collection.as_str()
        )
    }

    fn document_name(&self, uid: &str, collection: Collection, id: &str) -> String {
        format!(
            "{}/users/{uid}/{}/{id}",
            self.documents_root,
            collection.as_str()
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.id_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn commit(&self, write: Value) -> RemoteResult<()> {
        let request = self
            .client
            .post(format!("{}:commit", self.documents_url))
            .json(&json!({ "writes": [write] }));
        let response = self.authorize(request).send().await?;
        check_status(response).await?;
        Ok(())
    }

    fn update_write(
        &self,
        uid: &str,
        collection: Collection,
        id: &str,
        data: &Map<String, Value>,
    ) -> Value {
        json!({
            "update": {
                "name": self.document_name(uid, collection, id),
                "fields": encode_fields(data),
            }
        })
    }
}

impl RemoteStore for FirestoreClient {
    async fn read_collection(
        &self,
        uid: &str,
        collection: Collection,
        order_field: &str,
    ) -> RemoteResult<Vec<Record>> {
        let url = self.collection_url(uid, collection);
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("orderBy", order_field.to_string()),
                ("pageSize", PAGE_SIZE.to_string()),
            ];
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }

            let request = self.client.get(&url).query(&query);
            let response = check_status(self.authorize(request).send().await?).await?;
            let page = response.json::<ListDocumentsResponse>().await?;

            for document in page.documents {
                records.push(document.into_record()?);
            }

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::debug!(
            "Read {} documents from users/{uid}/{collection}",
            records.len()
        );
        Ok(records)
    }

    async fn write_document(
        &self,
        uid: &str,
        collection: Collection,
        id: &str,
        data: &Map<String, Value>,
        merge: bool,
    ) -> RemoteResult<()> {
        let mut write = self.update_write(uid, collection, id, data);
        if merge {
            write["updateMask"] = json!({ "fieldPaths": field_paths(data) });
        }
        self.commit(write).await
    }

    async fn update_document(
        &self,
        uid: &str,
        collection: Collection,
        id: &str,
        data: &Map<String, Value>,
    ) -> RemoteResult<()> {
        let mut write = self.update_write(uid, collection, id, data);
        write["updateMask"] = json!({ "fieldPaths": field_paths(data) });
        write["currentDocument"] = json!({ "exists": true });
        self.commit(write).await
    }

    async fn delete_document(
        &self,
        uid: &str,
        collection: Collection,
        id: &str,
    ) -> RemoteResult<()> {
        self.commit(json!({ "delete": self.document_name(uid, collection, id) }))
            .await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<FirestoreDocument>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FirestoreDocument {
    name: String,
    #[serde(default)]
    fields: Option<Value>,
}

impl FirestoreDocument {
    fn into_record(self) -> RemoteResult<Record> {
        let id = self
            .name
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .ok_or_else(|| {
                RemoteError::InvalidPayload(format!("document name '{}' has no id", self.name))
            })?;
        let id = urlencoding::decode(id)
            .map_or_else(|_| id.to_string(), std::borrow::Cow::into_owned);
        Ok(Record::new(id, decode_fields(self.fields.as_ref())?))
    }
}

#[derive(Debug, Deserialize)]
struct FirestoreErrorResponse {
    error: Option<FirestoreErrorBody>,
}

#[derive(Debug, Deserialize)]
struct FirestoreErrorBody {
    message: Option<String>,
    status: Option<String>,
}

async fn check_status(response: Response) -> RemoteResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<FirestoreErrorResponse>(&body) {
        Ok(FirestoreErrorResponse { error: Some(error) }) => (
            error.status,
            error
                .message
                .map_or_else(|| compact_text(&body), |message| message.trim().to_string()),
        ),
        _ if body.trim().is_empty() => (None, format!("HTTP {status}")),
        _ => (None, compact_text(&body)),
    };

    Err(RemoteError::Api {
        status,
        code,
        message,
    })
}

/// Top-level field paths for an update mask, backtick-quoting names that
/// are not simple identifiers.
fn field_paths(data: &Map<String, Value>) -> Vec<String> {
    data.keys().map(|key| quote_field_path(key)).collect()
}

fn quote_field_path(segment: &str) -> String {
    let mut chars = segment.chars();
    let simple = chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        segment.to_string()
    } else {
        let escaped = segment.replace('\\', "\\\\").replace('`', "\\`");
        format!("`{escaped}`")
    }
}
