//! Earth Engine REST client.

use crate::auth::TokenSource;
use crate::earth_engine::catalog::Visualization;
use crate::earth_engine::expression::Expr;
use crate::error::PastizalesError;
use crate::models::ExportTask;
use crate::upstream::send_json;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use url::Url;

const SERVICE: &str = "earth engine";

/// A rendered map registered on the platform
#[derive(Clone, Debug, PartialEq)]
pub struct TileMap {
    /// Map resource name
    pub map_id: String,
    /// Tile URL with `{z}`, `{x}` and `{y}` placeholders
    pub url_template: String,
}

/// Remote evaluation of expression graphs.
#[async_trait]
pub trait ComputeEngine: Send + Sync {
    /// Evaluate an expression and return its value.
    async fn compute(&self, expression: &Expr) -> Result<Value, PastizalesError>;

    /// Register an image for tile rendering.
    async fn create_map(
        &self,
        expression: &Expr,
        visualization: &Visualization,
    ) -> Result<TileMap, PastizalesError>;

    /// Start a task writing an image to an asset.
    async fn export_image(
        &self,
        expression: &Expr,
        asset_id: &str,
        description: &str,
    ) -> Result<ExportTask, PastizalesError>;

    /// List the tasks of the project.
    async fn list_tasks(&self) -> Result<Vec<ExportTask>, PastizalesError>;
}

#[derive(Deserialize)]
struct ComputeResponse {
    #[serde(default)]
    result: Value,
}

#[derive(Deserialize)]
struct MapResponse {
    name: String,
}

#[derive(Deserialize)]
struct OperationError {
    #[serde(default)]
    message: String,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationMetadata {
    state: Option<String>,
    description: Option<String>,
}

/// Long-running operation
#[derive(Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    metadata: OperationMetadata,
    error: Option<OperationError>,
}

impl From<Operation> for ExportTask {
    fn from(operation: Operation) -> Self {
        ExportTask {
            name: operation.name,
            description: operation.metadata.description,
            state: operation
                .metadata
                .state
                .unwrap_or_else(|| "PENDING".to_string()),
            done: operation.done,
            error: operation.error.map(|e| e.message),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListOperationsResponse {
    #[serde(default)]
    operations: Vec<Operation>,
    next_page_token: Option<String>,
}

/// Render visualization parameters as REST `visualizationOptions`.
pub fn visualization_options(visualization: &Visualization) -> Value {
    let mut options = Map::new();
    if visualization.min.is_some() || visualization.max.is_some() {
        options.insert(
            "ranges".to_string(),
            json!([{
                "min": visualization.min.unwrap_or(0.0),
                "max": visualization.max.unwrap_or(1.0),
            }]),
        );
    }
    if !visualization.palette.is_empty() {
        options.insert("paletteColors".to_string(), json!(visualization.palette));
    }
    if let Some(opacity) = visualization.opacity {
        options.insert("opacity".to_string(), json!(opacity));
    }
    Value::Object(options)
}

/// Earth Engine REST API client
pub struct EarthEngineClient {
    client: reqwest::Client,
    base_url: Url,
    project: String,
    tokens: Arc<TokenSource>,
}

impl EarthEngineClient {
    /// Create an Earth Engine client.
    ///
    /// # Arguments
    ///
    /// * `client`: HTTP client
    /// * `base_url`: Base URL of the REST API
    /// * `project`: Cloud project registered for Earth Engine
    /// * `tokens`: Source of access tokens
    pub fn new(
        client: reqwest::Client,
        base_url: Url,
        project: &str,
        tokens: Arc<TokenSource>,
    ) -> Self {
        EarthEngineClient {
            client,
            base_url,
            project: project.to_string(),
            tokens,
        }
    }

    /// URL of a method or collection below `v1/projects/{project}`.
    fn project_url(&self, method: &str) -> String {
        format!(
            "{}/v1/projects/{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            self.project,
            method
        )
    }

    /// Tile URL template of a map resource.
    fn tile_url_template(&self, map_name: &str) -> String {
        format!(
            "{}/v1/{}/tiles/{{z}}/{{x}}/{{y}}",
            self.base_url.as_str().trim_end_matches('/'),
            map_name
        )
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
    ) -> Result<T, PastizalesError> {
        let request = self.client.post(self.project_url(method)).json(body);
        let request = self.tokens.authorize(request).await?;
        send_json(SERVICE, request).await
    }
}

#[async_trait]
impl ComputeEngine for EarthEngineClient {
    #[tracing::instrument(level = "DEBUG", skip_all)]
    async fn compute(&self, expression: &Expr) -> Result<Value, PastizalesError> {
        let body = json!({ "expression": expression.to_graph() });
        let response: ComputeResponse = self.post("value:compute", &body).await?;
        Ok(response.result)
    }

    #[tracing::instrument(level = "DEBUG", skip_all)]
    async fn create_map(
        &self,
        expression: &Expr,
        visualization: &Visualization,
    ) -> Result<TileMap, PastizalesError> {
        let mut body = json!({
            "expression": expression.to_graph(),
            "fileFormat": "AUTO_JPEG_PNG",
            "visualizationOptions": visualization_options(visualization),
        });
        if !visualization.bands.is_empty() {
            body["bandIds"] = json!(visualization.bands);
        }
        let response: MapResponse = self.post("maps", &body).await?;
        Ok(TileMap {
            url_template: self.tile_url_template(&response.name),
            map_id: response.name,
        })
    }

    #[tracing::instrument(level = "DEBUG", skip(self, expression))]
    async fn export_image(
        &self,
        expression: &Expr,
        asset_id: &str,
        description: &str,
    ) -> Result<ExportTask, PastizalesError> {
        let body = json!({
            "expression": expression.to_graph(),
            "description": description,
            "assetExportOptions": {
                "earthEngineDestination": {"name": asset_id},
            },
        });
        let operation: Operation = self.post("image:export", &body).await?;
        tracing::info!("started export task {}", operation.name);
        Ok(operation.into())
    }

    #[tracing::instrument(level = "DEBUG", skip(self))]
    async fn list_tasks(&self) -> Result<Vec<ExportTask>, PastizalesError> {
        let mut tasks = vec![];
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self.client.get(self.project_url("operations"));
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }
            let request = self.tokens.authorize(request).await?;
            let page: ListOperationsResponse = send_json(SERVICE, request).await?;
            tasks.extend(page.operations.into_iter().map(ExportTask::from));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(tasks)
    }
}
