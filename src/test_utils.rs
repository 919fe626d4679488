use crate::earth_engine::catalog::Visualization;
use crate::earth_engine::client::{ComputeEngine, TileMap};
use crate::earth_engine::expression::Expr;
use crate::error::PastizalesError;
use crate::firestore::{CollectionPath, Document, DocumentStore, Query};
use crate::models::ExportTask;
use crate::object_store::{is_placeholder, public_url, ObjectStore};

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};
use url::Url;

/// Serve a router on an ephemeral local port and return its base URL.
pub(crate) fn spawn_router(router: axum::Router) -> Url {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::Server::from_tcp(listener)
            .unwrap()
            .serve(router.into_make_service())
            .await
            .unwrap();
    });
    Url::parse(&format!("http://{}/", addr)).unwrap()
}

/// Create a Document from an id and a JSON object of fields.
pub(crate) fn document(id: &str, fields: Value) -> Document {
    let fields: Map<String, Value> = fields.as_object().cloned().unwrap_or_default();
    Document {
        id: id.to_string(),
        fields,
    }
}

/// Order two field values the way the document store does: numbers before strings.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Number(_), _) => Ordering::Less,
        (_, Value::Number(_)) => Ordering::Greater,
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

/// In-memory document store.
#[derive(Default)]
pub(crate) struct MemoryDocumentStore {
    collections: HashMap<String, Vec<Document>>,
    /// Queries received, as collection path and query
    pub queries: Mutex<Vec<(String, Query)>>,
}

impl MemoryDocumentStore {
    pub(crate) fn with(mut self, collection: &CollectionPath, documents: Vec<Document>) -> Self {
        self.collections.insert(collection.to_string(), documents);
        self
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(
        &self,
        collection: &CollectionPath,
        id: &str,
    ) -> Result<Option<Document>, PastizalesError> {
        Ok(self
            .collections
            .get(&collection.to_string())
            .and_then(|documents| documents.iter().find(|d| d.id == id))
            .cloned())
    }

    async fn run_query(
        &self,
        collection: &CollectionPath,
        query: &Query,
    ) -> Result<Vec<Document>, PastizalesError> {
        self.queries
            .lock()
            .unwrap()
            .push((collection.to_string(), query.clone()));
        let mut documents: Vec<Document> = self
            .collections
            .get(&collection.to_string())
            .cloned()
            .unwrap_or_default();
        if let Some((field, value)) = &query.filter {
            documents.retain(|d| d.fields.get(field) == Some(value));
        }
        if let Some(order_by) = &query.order_by {
            // Documents lacking the field are left out of ordered results.
            documents.retain(|d| d.fields.contains_key(order_by));
            documents.sort_by(|a, b| compare_values(&a.fields[order_by], &b.fields[order_by]));
        }
        Ok(documents)
    }
}

/// A document store whose every call fails.
pub(crate) struct FailingDocumentStore;

#[async_trait]
impl DocumentStore for FailingDocumentStore {
    async fn get(
        &self,
        _collection: &CollectionPath,
        _id: &str,
    ) -> Result<Option<Document>, PastizalesError> {
        Err(unavailable("firestore"))
    }

    async fn run_query(
        &self,
        _collection: &CollectionPath,
        _query: &Query,
    ) -> Result<Vec<Document>, PastizalesError> {
        Err(unavailable("firestore"))
    }
}

pub(crate) fn unavailable(service: &'static str) -> PastizalesError {
    PastizalesError::Upstream {
        service,
        status: 503,
        message: "unavailable".to_string(),
    }
}

/// In-memory object store for bucket `bucket`.
pub(crate) struct MemoryObjectStore {
    pub keys: Vec<String>,
}

impl MemoryObjectStore {
    pub(crate) fn new(keys: &[&str]) -> Self {
        MemoryObjectStore {
            keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list_public_urls(&self, prefix: &str) -> Result<Vec<String>, PastizalesError> {
        let base = Url::parse("https://storage.example.com").unwrap();
        Ok(self
            .keys
            .iter()
            .filter(|key| key.starts_with(prefix) && !is_placeholder(key))
            .filter_map(|key| public_url(&base, "bucket", key))
            .map(String::from)
            .collect())
    }
}

type Responder = Box<dyn Fn(&Expr) -> Result<Value, PastizalesError> + Send + Sync>;

/// Compute engine answering with a closure and recording what it was asked.
pub(crate) struct FakeComputeEngine {
    responder: Responder,
    pub computed: Mutex<Vec<Expr>>,
    pub maps: Mutex<Vec<(Expr, Visualization)>>,
    pub exports: Mutex<Vec<(Expr, String)>>,
}

impl FakeComputeEngine {
    pub(crate) fn new<F>(responder: F) -> Self
    where
        F: Fn(&Expr) -> Result<Value, PastizalesError> + Send + Sync + 'static,
    {
        FakeComputeEngine {
            responder: Box::new(responder),
            computed: Mutex::new(vec![]),
            maps: Mutex::new(vec![]),
            exports: Mutex::new(vec![]),
        }
    }
}

#[async_trait]
impl ComputeEngine for FakeComputeEngine {
    async fn compute(&self, expression: &Expr) -> Result<Value, PastizalesError> {
        self.computed.lock().unwrap().push(expression.clone());
        (self.responder)(expression)
    }

    async fn create_map(
        &self,
        expression: &Expr,
        visualization: &Visualization,
    ) -> Result<TileMap, PastizalesError> {
        let mut maps = self.maps.lock().unwrap();
        maps.push((expression.clone(), visualization.clone()));
        let map_id = format!("projects/p/maps/{}", maps.len());
        Ok(TileMap {
            url_template: format!("https://ee.example.com/v1/{}/tiles/{{z}}/{{x}}/{{y}}", map_id),
            map_id,
        })
    }

    async fn export_image(
        &self,
        expression: &Expr,
        asset_id: &str,
        description: &str,
    ) -> Result<ExportTask, PastizalesError> {
        self.exports
            .lock()
            .unwrap()
            .push((expression.clone(), asset_id.to_string()));
        Ok(ExportTask {
            name: "projects/p/operations/1".to_string(),
            description: Some(description.to_string()),
            state: "PENDING".to_string(),
            done: false,
            error: None,
        })
    }

    async fn list_tasks(&self) -> Result<Vec<ExportTask>, PastizalesError> {
        Ok(vec![ExportTask {
            name: "projects/p/operations/1".to_string(),
            description: Some("ppna_2023".to_string()),
            state: "SUCCEEDED".to_string(),
            done: true,
            error: None,
        }])
    }
}

/// Find the first invocation of a function in an expression and return one of its arguments.
pub(crate) fn find_argument<'a>(
    expr: &'a Expr,
    function_name: &str,
    argument: &str,
) -> Option<&'a Expr> {
    match expr {
        Expr::Constant(_) => None,
        Expr::Call {
            function,
            arguments,
        } => {
            if *function == function_name {
                if let Some((_, value)) = arguments.iter().find(|(name, _)| *name == argument) {
                    return Some(value);
                }
            }
            arguments
                .iter()
                .find_map(|(_, arg)| find_argument(arg, function_name, argument))
        }
    }
}

/// The band selector of the first `Image.select` in an expression.
pub(crate) fn band_selector(expr: &Expr) -> Option<String> {
    match find_argument(expr, "Image.select", "bandSelectors")? {
        Expr::Constant(Value::Array(selectors)) => {
            selectors.first()?.as_str().map(str::to_string)
        }
        _ => None,
    }
}

/// The asset id of the first `Image.load` in an expression.
pub(crate) fn loaded_asset(expr: &Expr) -> Option<String> {
    match find_argument(expr, "Image.load", "id")? {
        Expr::Constant(Value::String(id)) => Some(id.clone()),
        _ => None,
    }
}
