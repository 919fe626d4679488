//! Map layers and zonal statistics on the compute platform.

use crate::earth_engine::catalog::{
    BasinGrade, CommunityOrder, Indicator, MapType, Statistic, CLASSIFICATION,
    CLASSIFICATION_SCALE, COMMUNITY_MAPS, FOOTPRINT_MAX_ERROR, INFORMATION_MAPS, MAX_PIXELS,
    POLICE_SECTIONALS, REDUCTION_SCALE,
};
use crate::earth_engine::client::ComputeEngine;
use crate::earth_engine::expression::Expr;
use crate::error::PastizalesError;
use crate::models::{
    two_decimals, AnnualSeries, CommunityArea, CommunityInfo, ExportTask, MapLayer, MeanSeries,
    SeriesPoint, YearPoint, ZoneGeometry, ZoneInformation, ZoneKind,
};
use crate::series::{
    annual_plan, band_series, numbered_series, productive_offset, productive_rotation,
    productive_year, yearly_series, Band,
};
use crate::services::community::CommunityService;
use crate::services::join_ordered;

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use time::Date;

const SERVICE: &str = "earth engine";

/// Error margin of area and perimeter computations, in metres
const GEOMETRY_MAX_ERROR: f64 = 1.0;

/// The region a zonal statistic is computed over
#[derive(Clone, Debug)]
pub enum Region {
    /// A zone drawn by the user
    Zone(ZoneGeometry),
    /// The footprint of a community, with pixels outside the community masked
    Community(CommunityOrder),
}

impl Region {
    /// Geometry to reduce over.
    pub fn geometry(&self) -> Expr {
        match self {
            Region::Zone(zone) => zone_geometry(zone),
            Region::Community(order) => order.raster().footprint(FOOTPRINT_MAX_ERROR),
        }
    }

    /// Restrict an image to the region.
    pub fn mask(&self, image: Expr) -> Expr {
        match self {
            Region::Zone(_) => image,
            Region::Community(order) => image.update_mask(order.raster()),
        }
    }
}

/// Build the geometry of a validated zone.
pub fn zone_geometry(zone: &ZoneGeometry) -> Expr {
    let c = &zone.coordinates;
    match zone.kind {
        ZoneKind::Marker => Expr::point(c),
        ZoneKind::Polygon => Expr::polygon(c),
        ZoneKind::Rectangle => Expr::rectangle([c[3], c[2]], [c[5], c[0]]),
    }
}

/// Output of the grouped area reduction
#[derive(Deserialize)]
struct GroupedAreas {
    #[serde(default)]
    groups: Vec<GroupArea>,
}

#[derive(Deserialize)]
struct GroupArea {
    group: i64,
    sum: f64,
}

fn as_dictionary(value: Value) -> Result<Map<String, Value>, PastizalesError> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(PastizalesError::UnexpectedResult {
            service: SERVICE,
            detail: format!("expected a dictionary, got {}", other),
        }),
    }
}

fn as_number(value: Value, what: &str) -> Result<f64, PastizalesError> {
    value
        .as_f64()
        .ok_or_else(|| PastizalesError::UnexpectedResult {
            service: SERVICE,
            detail: format!("expected {} to be a number, got {}", what, value),
        })
}

fn points(bands: Vec<Band<u32>>, key: &'static str) -> Vec<SeriesPoint> {
    bands
        .into_iter()
        .map(|band| SeriesPoint {
            day: band.key,
            value: band.value,
            key,
        })
        .collect()
}

/// Current date in UTC.
pub fn today() -> Date {
    time::OffsetDateTime::now_utc().date()
}

/// Compute platform queries
#[derive(Clone)]
pub struct GeeService {
    engine: Arc<dyn ComputeEngine>,
    communities: CommunityService,
}

impl GeeService {
    pub fn new(engine: Arc<dyn ComputeEngine>, communities: CommunityService) -> Self {
        GeeService {
            engine,
            communities,
        }
    }

    /// Community identity for an order, if one is stored.
    async fn community_info(&self, order: CommunityOrder) -> Option<CommunityInfo> {
        match self.communities.get_by_order(&order.to_string()).await {
            Ok(community) => Some(community.into()),
            Err(e) => {
                tracing::debug!("no community info for order {}: {}", order, e);
                None
            }
        }
    }

    /// Render one map layer.
    #[tracing::instrument(level = "DEBUG", skip(self))]
    pub async fn map(&self, map_type: MapType) -> Result<MapLayer, PastizalesError> {
        let visualization = map_type.visualization();
        let expression = map_type.expression();
        let community_info = async {
            match map_type.community_order() {
                Some(order) => self.community_info(order).await,
                None => None,
            }
        };
        let (tile_map, community_info) = tokio::join!(
            self.engine.create_map(&expression, &visualization),
            community_info
        );
        let tile_map = tile_map?;
        Ok(MapLayer {
            map_type,
            map_id: tile_map.map_id,
            url_template: tile_map.url_template,
            layer_label: map_type.label(),
            layer_description: map_type.description(),
            community_info,
        })
    }

    async fn maps(&self, map_types: &[MapType]) -> Result<Vec<MapLayer>, PastizalesError> {
        join_ordered(map_types.iter().map(|&map_type| {
            let service = self.clone();
            async move { service.map(map_type).await }
        }))
        .await
    }

    /// Layers of the information panel.
    pub async fn information_maps(&self) -> Result<Vec<MapLayer>, PastizalesError> {
        self.maps(&INFORMATION_MAPS).await
    }

    /// Community layers along with their community info.
    pub async fn community_maps(&self) -> Result<Vec<MapLayer>, PastizalesError> {
        self.maps(&COMMUNITY_MAPS).await
    }

    /// Geometric summary of a zone and the area of each community within it.
    #[tracing::instrument(level = "DEBUG", skip(self))]
    pub async fn zone_information(
        &self,
        zone: &ZoneGeometry,
    ) -> Result<ZoneInformation, PastizalesError> {
        let geometry = zone_geometry(zone);
        let communities_areas = self.communities_areas(geometry.clone());
        if zone.kind == ZoneKind::Marker {
            return Ok(ZoneInformation {
                latitude: Some(zone.coordinates[1]),
                longitude: Some(zone.coordinates[0]),
                area: None,
                perimeter: None,
                communities_areas: communities_areas.await?,
            });
        }
        let area = geometry.clone().area(GEOMETRY_MAX_ERROR);
        let perimeter = geometry.perimeter(GEOMETRY_MAX_ERROR);
        let area = self.engine.compute(&area);
        let perimeter = self.engine.compute(&perimeter);
        let (area, perimeter, communities_areas) =
            tokio::try_join!(area, perimeter, communities_areas)?;
        // Square metres to hectares, metres to kilometres.
        let hectares = as_number(area, "area")? * 0.0001;
        let kilometres = as_number(perimeter, "perimeter")? / 1000.0;
        Ok(ZoneInformation {
            latitude: None,
            longitude: None,
            area: Some(two_decimals(hectares)),
            perimeter: Some(two_decimals(kilometres)),
            communities_areas,
        })
    }

    async fn communities_areas(&self, geometry: Expr) -> Result<Vec<CommunityArea>, PastizalesError> {
        let expression = Expr::pixel_area()
            .multiply(Expr::constant(0.0001))
            .add_bands(Expr::image(CLASSIFICATION))
            .reduce_region(
                Expr::sum().group(1),
                geometry,
                CLASSIFICATION_SCALE,
                MAX_PIXELS,
            );
        let result = self.engine.compute(&expression).await?;
        let areas: GroupedAreas = serde_json::from_value(result)
            .map_err(|source| PastizalesError::UpstreamDecode {
                service: SERVICE,
                source,
            })?;
        join_ordered(areas.groups.into_iter().map(|group| {
            let service = self.clone();
            async move {
                let order = CommunityOrder::from_class(group.group);
                let info = match order {
                    Some(order) => service.community_info(order).await,
                    None => None,
                };
                Ok(CommunityArea {
                    order: order.map(|o| o.to_string()),
                    id: info.as_ref().map(|i| i.id.clone()),
                    name: info.and_then(|i| i.name),
                    area: two_decimals(group.sum),
                })
            }
        }))
        .await
    }

    /// Mean of the composites of one year within a region.
    async fn reduce_year(
        &self,
        indicator: Indicator,
        region: &Region,
        year: i32,
    ) -> Result<Vec<Band<u32>>, PastizalesError> {
        let image = Expr::image(indicator.composite_asset()).select(&format!("b{}.*", year));
        let expression = region.mask(image).reduce_region(
            Expr::mean(),
            region.geometry(),
            REDUCTION_SCALE,
            MAX_PIXELS,
        );
        let result = self.engine.compute(&expression).await?;
        Ok(band_series(&as_dictionary(result)?))
    }

    async fn reduce_year_if(
        &self,
        fetch: bool,
        indicator: Indicator,
        region: &Region,
        year: i32,
    ) -> Result<Vec<Band<u32>>, PastizalesError> {
        if fetch {
            self.reduce_year(indicator, region, year).await
        } else {
            Ok(vec![])
        }
    }

    /// Productive-year series starting in July of `year`, as of `today`.
    #[tracing::instrument(level = "DEBUG", skip(self))]
    pub async fn annual_series(
        &self,
        indicator: Indicator,
        region: &Region,
        year: i32,
        today: Date,
    ) -> Result<AnnualSeries, PastizalesError> {
        if !indicator.has_annual_series() {
            return Err(PastizalesError::UnsupportedSeries {
                indicator: indicator.value_key(),
                series: "annual",
            });
        }
        let plan = annual_plan(year, today);
        let (current, next) = tokio::try_join!(
            self.reduce_year_if(plan.year, indicator, region, year),
            self.reduce_year_if(plan.next_year, indicator, region, year + 1),
        )?;
        let offset = productive_offset(indicator.period_days());
        let values = productive_year(&current, &next, offset);
        Ok(AnnualSeries {
            year,
            values: points(values, indicator.value_key()),
        })
    }

    /// Historical mean of each composite, in productive-year order.
    #[tracing::instrument(level = "DEBUG", skip(self))]
    pub async fn mean_series(
        &self,
        indicator: Indicator,
        region: &Region,
    ) -> Result<MeanSeries, PastizalesError> {
        let asset = indicator
            .mean_asset()
            .ok_or(PastizalesError::UnsupportedSeries {
                indicator: indicator.value_key(),
                series: "annual mean",
            })?;
        let image = Expr::image(asset).select("b.*");
        let expression = region.mask(image).reduce_region(
            Expr::mean(),
            region.geometry(),
            REDUCTION_SCALE,
            MAX_PIXELS,
        );
        let result = self.engine.compute(&expression).await?;
        let bands = numbered_series(&as_dictionary(result)?);
        let offset = productive_offset(indicator.period_days());
        Ok(MeanSeries {
            values: points(productive_rotation(&bands, offset), indicator.value_key()),
        })
    }

    /// One value per year, reduced with the given statistic.
    #[tracing::instrument(level = "DEBUG", skip(self))]
    pub async fn historical_series(
        &self,
        indicator: Indicator,
        region: &Region,
        statistic: Statistic,
    ) -> Result<Vec<YearPoint>, PastizalesError> {
        let image = Expr::image(indicator.yearly_asset());
        let expression = region.mask(image).reduce_region(
            statistic.reducer(),
            region.geometry(),
            REDUCTION_SCALE,
            MAX_PIXELS,
        );
        let result = self.engine.compute(&expression).await?;
        Ok(yearly_series(&as_dictionary(result)?)
            .into_iter()
            .map(|band| YearPoint {
                year: band.key,
                value: band.value,
                key: indicator.value_key(),
            })
            .collect())
    }

    /// Police sectionals as a GeoJSON feature collection.
    #[tracing::instrument(level = "DEBUG", skip(self))]
    pub async fn police_sectionals(&self) -> Result<Value, PastizalesError> {
        self.engine.compute(&Expr::table(POLICE_SECTIONALS)).await
    }

    /// Basins of one grade as a GeoJSON feature collection.
    #[tracing::instrument(level = "DEBUG", skip(self))]
    pub async fn basins(&self, grade: BasinGrade) -> Result<Value, PastizalesError> {
        self.engine.compute(&Expr::table(grade.table_id())).await
    }

    /// Start a task writing the yearly mean of an indicator to its per-year asset.
    #[tracing::instrument(level = "DEBUG", skip(self))]
    pub async fn update(
        &self,
        indicator: Indicator,
        year: i32,
        today: Date,
    ) -> Result<ExportTask, PastizalesError> {
        if year <= 2000 || year > today.year() {
            return Err(PastizalesError::InvalidYear {
                year: year.to_string(),
            });
        }
        let band = format!("b{}", year);
        let expression = Expr::image(indicator.composite_asset())
            .select(&format!("{}.*", band))
            .reduce(Expr::mean())
            .rename(&[band]);
        let asset_id = format!("{}_{}", indicator.yearly_asset(), year);
        let description = format!("{}_{}", indicator.value_key(), year);
        self.engine
            .export_image(&expression, &asset_id, &description)
            .await
    }

    /// Export tasks of the project.
    pub async fn tasks(&self) -> Result<Vec<ExportTask>, PastizalesError> {
        self.engine.list_tasks().await
    }
}
