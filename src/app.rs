use crate::app_state::{AppState, SharedAppState};
use crate::cli::CommandLineArgs;
use crate::earth_engine::catalog::{BasinGrade, CommunityOrder, Indicator, MapType, Statistic};
use crate::error::PastizalesError;
use crate::metrics;
use crate::models::{
    AnnualSeries, Community, ExportTask, MapLayer, MeanSeries, Reply, Species, SpeciesRef,
    SubCommunity, YearPoint, Zone, ZoneGeometry, ZoneInformation,
};
use crate::services::community::CommunityService;
use crate::services::gee::{self, Region};
use crate::validated_json::ValidatedJson;

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::Value;
use tower::Layer;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;

/// Service type returned by [service] and served by [crate::server::serve]
pub type Service = NormalizePath<Router>;

type Handled<T> = Result<Reply<T>, PastizalesError>;

/// A community catalog mounted under its own path, with its envelope keys
struct Catalog {
    service: CommunityService,
    list_key: &'static str,
    item_key: &'static str,
}

type SharedCatalog = Arc<Catalog>;

/// Query parameters of historical series
#[derive(Debug, Default, Deserialize)]
struct HistoricalParams {
    #[serde(default)]
    statistic: Statistic,
}

/// Query parameters of export tasks
#[derive(Debug, Default, Deserialize)]
struct UpdateParams {
    year: Option<i32>,
}

/// Build the API router over the given state.
pub fn router(state: SharedAppState) -> Router {
    fn species() -> Router<SharedAppState> {
        Router::new()
            .route("/", get(list_species))
            .route("/:id", get(get_species))
            .route("/:id/images", get(species_images))
    }

    fn communities(catalog: Catalog) -> Router<SharedAppState> {
        Router::new()
            .route("/", get(list_communities))
            .route("/:id", get(get_community))
            .route("/findByOrder/:order", get(community_by_order))
            .route("/:id/species", get(community_species))
            .route("/:id/subcommunities", get(subcommunities))
            .route(
                "/:id/subcommunities/:sid/images",
                get(subcommunity_images),
            )
            .with_state(Arc::new(catalog))
    }

    fn gee() -> Router<SharedAppState> {
        Router::new()
            .route("/maps/information", get(information_maps))
            .route("/maps/communities", get(community_maps))
            .route("/maps/:id", get(map))
            .route("/zone/information", post(zone_information))
            .route("/zone/:indicator/annual/mean", post(zone_mean_series))
            .route("/zone/:indicator/annual/:year", post(zone_annual_series))
            .route("/zone/:indicator/historical", post(zone_historical_series))
            .route(
                "/community/:order/:indicator/annual/mean",
                get(community_mean_series),
            )
            .route(
                "/community/:order/:indicator/annual/:year",
                get(community_annual_series),
            )
            .route(
                "/community/:order/:indicator/historical",
                get(community_historical_series),
            )
            .route("/police-sectionals", get(police_sectionals))
            .route("/basins/:grade", get(basins))
            .route("/update-ppna", post(update_ppna))
            .route("/update-et", post(update_et))
            .route("/check-tasks", get(check_tasks))
    }

    let communities_catalog = Catalog {
        service: state.communities.clone(),
        list_key: "communities",
        item_key: "community",
    };
    let grassland_catalog = Catalog {
        service: state.grassland_communities.clone(),
        list_key: "grasslandCommunities",
        item_key: "grasslandCommunity",
    };
    let api = Router::new()
        .nest("/species", species())
        .nest("/communities", communities(communities_catalog))
        .nest("/grassland-communities", communities(grassland_catalog))
        .route("/zones/:user_id", get(zones))
        .nest("/gee", gee());

    Router::new()
        .route("/metrics", get(metrics::metrics_handler))
        .nest("/api", api)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .on_request(metrics::request_counter)
                        .on_response(metrics::record_response_metrics),
                )
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}

/// Wrap a router so that trailing slashes are ignored.
pub fn service_with_state(state: SharedAppState) -> Service {
    NormalizePathLayer::trim_trailing_slash().layer(router(state))
}

/// Returns a [Service] talking to the providers configured on the command line.
pub fn service(args: &CommandLineArgs) -> Result<Service, PastizalesError> {
    Ok(service_with_state(Arc::new(AppState::new(args)?)))
}

fn parse_indicator(indicator: &str) -> Result<Indicator, PastizalesError> {
    Indicator::from_str(indicator).map_err(|_| PastizalesError::UnknownIndicator {
        indicator: indicator.to_string(),
    })
}

fn parse_order(order: &str) -> Result<CommunityOrder, PastizalesError> {
    CommunityOrder::from_str(order).map_err(|_| PastizalesError::UnknownCommunityOrder {
        order: order.to_string(),
    })
}

fn parse_year(year: &str) -> Result<i32, PastizalesError> {
    year.parse().map_err(|_| PastizalesError::InvalidYear {
        year: year.to_string(),
    })
}

// Species

async fn list_species(State(state): State<SharedAppState>) -> Handled<Vec<Species>> {
    Ok(Reply::new("species", state.species.list().await?))
}

async fn get_species(
    State(state): State<SharedAppState>,
    Path(id): Path<String>,
) -> Handled<Species> {
    Ok(Reply::new("specie", state.species.get(&id).await?))
}

async fn species_images(
    State(state): State<SharedAppState>,
    Path(id): Path<String>,
) -> Handled<Vec<String>> {
    Ok(Reply::new("imageList", state.species.images(&id).await?))
}

// Communities

async fn list_communities(State(catalog): State<SharedCatalog>) -> Handled<Vec<Community>> {
    Ok(Reply::new(catalog.list_key, catalog.service.list().await?))
}

async fn get_community(
    State(catalog): State<SharedCatalog>,
    Path(id): Path<String>,
) -> Handled<Community> {
    Ok(Reply::new(catalog.item_key, catalog.service.get(&id).await?))
}

async fn community_by_order(
    State(catalog): State<SharedCatalog>,
    Path(order): Path<String>,
) -> Handled<Community> {
    Ok(Reply::new(
        catalog.item_key,
        catalog.service.get_by_order(&order).await?,
    ))
}

async fn community_species(
    State(catalog): State<SharedCatalog>,
    Path(id): Path<String>,
) -> Handled<Vec<SpeciesRef>> {
    Ok(Reply::new("species", catalog.service.species(&id).await?))
}

async fn subcommunities(
    State(catalog): State<SharedCatalog>,
    Path(id): Path<String>,
) -> Handled<Vec<SubCommunity>> {
    Ok(Reply::new(
        "subcommunities",
        catalog.service.subcommunities(&id).await?,
    ))
}

async fn subcommunity_images(
    State(catalog): State<SharedCatalog>,
    Path((id, sid)): Path<(String, String)>,
) -> Handled<Vec<String>> {
    Ok(Reply::new(
        "imageList",
        catalog.service.subcommunity_images(&id, &sid).await?,
    ))
}

// Zones

async fn zones(
    State(state): State<SharedAppState>,
    Path(user_id): Path<String>,
) -> Handled<Vec<Zone>> {
    Ok(Reply::new("zones", state.zones.list_by_user(&user_id).await?))
}

// Maps

async fn information_maps(State(state): State<SharedAppState>) -> Handled<Vec<MapLayer>> {
    Ok(Reply::new("layers", state.gee.information_maps().await?))
}

async fn community_maps(State(state): State<SharedAppState>) -> Handled<Vec<MapLayer>> {
    Ok(Reply::new("layers", state.gee.community_maps().await?))
}

async fn map(State(state): State<SharedAppState>, Path(id): Path<String>) -> Handled<MapLayer> {
    let map_type =
        MapType::from_str(&id).map_err(|_| PastizalesError::UnknownMapType { map_type: id })?;
    Ok(Reply::new("layer", state.gee.map(map_type).await?))
}

// Zonal statistics

async fn zone_information(
    State(state): State<SharedAppState>,
    ValidatedJson(zone): ValidatedJson<ZoneGeometry>,
) -> Handled<ZoneInformation> {
    Ok(Reply::new(
        "zoneInformation",
        state.gee.zone_information(&zone).await?,
    ))
}

async fn zone_annual_series(
    State(state): State<SharedAppState>,
    Path((indicator, year)): Path<(String, String)>,
    ValidatedJson(zone): ValidatedJson<ZoneGeometry>,
) -> Handled<AnnualSeries> {
    let indicator = parse_indicator(&indicator)?;
    let year = parse_year(&year)?;
    let series = state
        .gee
        .annual_series(indicator, &Region::Zone(zone), year, gee::today())
        .await?;
    Ok(Reply::new(indicator.response_key(), series))
}

async fn zone_mean_series(
    State(state): State<SharedAppState>,
    Path(indicator): Path<String>,
    ValidatedJson(zone): ValidatedJson<ZoneGeometry>,
) -> Handled<MeanSeries> {
    let indicator = parse_indicator(&indicator)?;
    let series = state
        .gee
        .mean_series(indicator, &Region::Zone(zone))
        .await?;
    Ok(Reply::new(indicator.response_key(), series))
}

async fn zone_historical_series(
    State(state): State<SharedAppState>,
    Path(indicator): Path<String>,
    params: Result<Query<HistoricalParams>, QueryRejection>,
    ValidatedJson(zone): ValidatedJson<ZoneGeometry>,
) -> Handled<Vec<YearPoint>> {
    let indicator = parse_indicator(&indicator)?;
    let Query(params) = params?;
    let series = state
        .gee
        .historical_series(indicator, &Region::Zone(zone), params.statistic)
        .await?;
    Ok(Reply::new(indicator.response_key(), series))
}

async fn community_annual_series(
    State(state): State<SharedAppState>,
    Path((order, indicator, year)): Path<(String, String, String)>,
) -> Handled<AnnualSeries> {
    let region = Region::Community(parse_order(&order)?);
    let indicator = parse_indicator(&indicator)?;
    let year = parse_year(&year)?;
    let series = state
        .gee
        .annual_series(indicator, &region, year, gee::today())
        .await?;
    Ok(Reply::new(indicator.response_key(), series))
}

async fn community_mean_series(
    State(state): State<SharedAppState>,
    Path((order, indicator)): Path<(String, String)>,
) -> Handled<MeanSeries> {
    let region = Region::Community(parse_order(&order)?);
    let indicator = parse_indicator(&indicator)?;
    let series = state.gee.mean_series(indicator, &region).await?;
    Ok(Reply::new(indicator.response_key(), series))
}

async fn community_historical_series(
    State(state): State<SharedAppState>,
    Path((order, indicator)): Path<(String, String)>,
    params: Result<Query<HistoricalParams>, QueryRejection>,
) -> Handled<Vec<YearPoint>> {
    let region = Region::Community(parse_order(&order)?);
    let indicator = parse_indicator(&indicator)?;
    let Query(params) = params?;
    let series = state
        .gee
        .historical_series(indicator, &region, params.statistic)
        .await?;
    Ok(Reply::new(indicator.response_key(), series))
}

// Feature collections

async fn police_sectionals(State(state): State<SharedAppState>) -> Handled<Value> {
    Ok(Reply::new(
        "policeSectionals",
        state.gee.police_sectionals().await?,
    ))
}

async fn basins(
    State(state): State<SharedAppState>,
    Path(grade): Path<String>,
) -> Handled<Value> {
    let grade =
        BasinGrade::from_str(&grade).map_err(|_| PastizalesError::UnknownBasinGrade { grade })?;
    Ok(Reply::new("basins", state.gee.basins(grade).await?))
}

// Exports

async fn update(
    state: SharedAppState,
    indicator: Indicator,
    params: Result<Query<UpdateParams>, QueryRejection>,
) -> Handled<ExportTask> {
    let Query(params) = params?;
    let today = gee::today();
    let year = params.year.unwrap_or(today.year());
    Ok(Reply::new(
        "task",
        state.gee.update(indicator, year, today).await?,
    ))
}

async fn update_ppna(
    State(state): State<SharedAppState>,
    params: Result<Query<UpdateParams>, QueryRejection>,
) -> Handled<ExportTask> {
    update(state, Indicator::Ppna, params).await
}

async fn update_et(
    State(state): State<SharedAppState>,
    params: Result<Query<UpdateParams>, QueryRejection>,
) -> Handled<ExportTask> {
    update(state, Indicator::Et, params).await
}

async fn check_tasks(State(state): State<SharedAppState>) -> Handled<Vec<ExportTask>> {
    Ok(Reply::new("tasks", state.gee.tasks().await?))
}
