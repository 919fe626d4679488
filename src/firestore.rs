//! Document store access.
//!
//! The [DocumentStore] trait is the seam between the services and the database. The
//! [FirestoreClient] implementation talks to the Cloud Firestore REST API and decodes its typed
//! values into plain JSON.

use crate::auth::TokenSource;
use crate::error::PastizalesError;
use crate::upstream::{send_json, send_json_optional};

use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use url::Url;

const SERVICE: &str = "firestore";

/// Path of a collection, possibly nested under a document.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CollectionPath {
    /// Path of the parent document relative to the database root, if any
    parent: Vec<String>,
    /// Collection id
    collection_id: String,
}

impl CollectionPath {
    /// A top level collection.
    pub fn root(collection_id: &str) -> Self {
        CollectionPath {
            parent: vec![],
            collection_id: collection_id.to_string(),
        }
    }

    /// A sub-collection of one document of this collection.
    ///
    /// # Arguments
    ///
    /// * `document_id`: Id of the parent document in this collection
    /// * `collection_id`: Id of the sub-collection
    pub fn child(&self, document_id: &str, collection_id: &str) -> Self {
        let mut parent = self.parent.clone();
        parent.push(self.collection_id.clone());
        parent.push(document_id.to_string());
        CollectionPath {
            parent,
            collection_id: collection_id.to_string(),
        }
    }

    /// Id of the collection itself.
    pub fn collection_id(&self) -> &str {
        &self.collection_id
    }

    /// Path segments of the parent document.
    pub fn parent(&self) -> &[String] {
        &self.parent
    }
}

impl Display for CollectionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for segment in &self.parent {
            write!(f, "{}/", segment)?;
        }
        write!(f, "{}", self.collection_id)
    }
}

/// A document, with its fields decoded to plain JSON.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Document {
    /// Deserialise the fields into a record type, returning it along with the document id.
    pub fn decode<T: DeserializeOwned>(self) -> Result<(String, T), PastizalesError> {
        let Document { id, fields } = self;
        match serde_json::from_value(Value::Object(fields)) {
            Ok(record) => Ok((id, record)),
            Err(source) => Err(PastizalesError::MalformedDocument { id, source }),
        }
    }
}

/// A structured query on one collection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    /// Equality filter, as a field path and value
    pub filter: Option<(String, Value)>,
    /// Field to sort by, ascending
    pub order_by: Option<String>,
}

/// Read access to a document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch one document by id. A missing document is `Ok(None)`.
    async fn get(
        &self,
        collection: &CollectionPath,
        id: &str,
    ) -> Result<Option<Document>, PastizalesError>;

    /// Run a structured query against one collection.
    async fn run_query(
        &self,
        collection: &CollectionPath,
        query: &Query,
    ) -> Result<Vec<Document>, PastizalesError>;

    /// List all documents of a collection, optionally sorted by a field.
    async fn list(
        &self,
        collection: &CollectionPath,
        order_by: Option<&str>,
    ) -> Result<Vec<Document>, PastizalesError> {
        let query = Query {
            filter: None,
            order_by: order_by.map(str::to_string),
        };
        self.run_query(collection, &query).await
    }

    /// Find the documents whose field equals a value.
    async fn find(
        &self,
        collection: &CollectionPath,
        field: &str,
        value: Value,
        order_by: Option<&str>,
    ) -> Result<Vec<Document>, PastizalesError> {
        let query = Query {
            filter: Some((field.to_string(), value)),
            order_by: order_by.map(str::to_string),
        };
        self.run_query(collection, &query).await
    }
}

/// Document as returned by the REST API
#[derive(Deserialize)]
struct RestDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl From<RestDocument> for Document {
    fn from(document: RestDocument) -> Self {
        let id = document
            .name
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let fields = document
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), decode_value(value)))
            .collect();
        Document { id, fields }
    }
}

/// One element of a `runQuery` response stream
#[derive(Deserialize)]
struct RunQueryItem {
    document: Option<RestDocument>,
}

/// Cloud Firestore REST client.
pub struct FirestoreClient {
    client: reqwest::Client,
    /// Base URL of the API
    base_url: Url,
    project: String,
    database: String,
    tokens: Arc<TokenSource>,
}

impl FirestoreClient {
    /// Create a Firestore client.
    ///
    /// # Arguments
    ///
    /// * `client`: HTTP client
    /// * `base_url`: Base URL of the REST API or emulator
    /// * `project`: Google Cloud project id
    /// * `database`: Database id, usually `(default)`
    /// * `tokens`: Source of access tokens
    pub fn new(
        client: reqwest::Client,
        base_url: Url,
        project: &str,
        database: &str,
        tokens: Arc<TokenSource>,
    ) -> Self {
        FirestoreClient {
            client,
            base_url,
            project: project.to_string(),
            database: database.to_string(),
            tokens,
        }
    }

    /// Build a URL below the documents root of the database.
    ///
    /// The last segment may carry a `:method` suffix.
    fn documents_url<'a, I>(&self, segments: I) -> Result<Url, PastizalesError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| PastizalesError::UnexpectedResult {
                service: SERVICE,
                detail: format!("base URL {} cannot hold a path", self.base_url),
            })?
            .pop_if_empty()
            .extend([
                "v1",
                "projects",
                self.project.as_str(),
                "databases",
                self.database.as_str(),
                "documents",
            ])
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    #[tracing::instrument(level = "DEBUG", skip(self))]
    async fn get(
        &self,
        collection: &CollectionPath,
        id: &str,
    ) -> Result<Option<Document>, PastizalesError> {
        let segments = collection
            .parent()
            .iter()
            .map(String::as_str)
            .chain([collection.collection_id(), id]);
        let url = self.documents_url(segments)?;
        let request = self.tokens.authorize(self.client.get(url)).await?;
        let document: Option<RestDocument> = send_json_optional(SERVICE, request).await?;
        Ok(document.map(Document::from))
    }

    #[tracing::instrument(level = "DEBUG", skip(self))]
    async fn run_query(
        &self,
        collection: &CollectionPath,
        query: &Query,
    ) -> Result<Vec<Document>, PastizalesError> {
        // runQuery is a method on the parent document, or on the documents root.
        let mut segments: Vec<String> = collection.parent().to_vec();
        match segments.last_mut() {
            Some(last) => last.push_str(":runQuery"),
            None => segments.push(String::new()),
        }
        let mut url = self.documents_url(segments.iter().map(String::as_str))?;
        if collection.parent().is_empty() {
            // Turn `.../documents/` into `.../documents:runQuery`.
            let path = url.path().trim_end_matches('/').to_string() + ":runQuery";
            url.set_path(&path);
        }
        let body = structured_query(collection, query);
        let request = self
            .tokens
            .authorize(self.client.post(url).json(&body))
            .await?;
        let items: Vec<RunQueryItem> = send_json(SERVICE, request).await?;
        Ok(items
            .into_iter()
            .filter_map(|item| item.document.map(Document::from))
            .collect())
    }
}

/// Build the body of a `runQuery` request.
fn structured_query(collection: &CollectionPath, query: &Query) -> Value {
    let mut structured = Map::new();
    structured.insert(
        "from".to_string(),
        json!([{"collectionId": collection.collection_id()}]),
    );
    if let Some((field, value)) = &query.filter {
        structured.insert(
            "where".to_string(),
            json!({
                "fieldFilter": {
                    "field": {"fieldPath": field},
                    "op": "EQUAL",
                    "value": encode_value(value),
                }
            }),
        );
    }
    if let Some(order_by) = &query.order_by {
        structured.insert(
            "orderBy".to_string(),
            json!([{"field": {"fieldPath": order_by}, "direction": "ASCENDING"}]),
        );
    }
    json!({ "structuredQuery": structured })
}

/// Encode a plain JSON value as a Firestore typed value.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({"nullValue": null}),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({"integerValue": i.to_string()}),
            None => json!({"doubleValue": n}),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(values) => {
            json!({"arrayValue": {"values": values.iter().map(encode_value).collect::<Vec<_>>()}})
        }
        Value::Object(fields) => {
            let fields: Map<String, Value> = fields
                .iter()
                .map(|(k, v)| (k.clone(), encode_value(v)))
                .collect();
            json!({"mapValue": {"fields": fields}})
        }
    }
}

/// Decode a Firestore typed value into plain JSON.
///
/// Integers arrive as strings and become numbers. Geo points become
/// `{"latitude", "longitude"}` objects. Unrecognised shapes decode to null.
pub fn decode_value(value: &Value) -> Value {
    let Some(typed) = value.as_object() else {
        return Value::Null;
    };
    let Some((kind, inner)) = typed.iter().next() else {
        return Value::Null;
    };
    match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => inner.clone(),
        "integerValue" => match inner {
            Value::String(s) => s.parse::<i64>().map(Value::from).unwrap_or(Value::Null),
            Value::Number(_) => inner.clone(),
            _ => Value::Null,
        },
        "doubleValue" => match inner {
            // Infinities and NaN are sent as strings and have no JSON representation.
            Value::String(_) => Value::Null,
            _ => inner.clone(),
        },
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner.clone(),
        "geoPointValue" => json!({
            "latitude": inner.get("latitude").cloned().unwrap_or(json!(0.0)),
            "longitude": inner.get("longitude").cloned().unwrap_or(json!(0.0)),
        }),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => Value::Object(
            inner
                .get("fields")
                .and_then(Value::as_object)
                .map(|fields| {
                    fields
                        .iter()
                        .map(|(k, v)| (k.clone(), decode_value(v)))
                        .collect()
                })
                .unwrap_or_default(),
        ),
        _ => Value::Null,
    }
}
