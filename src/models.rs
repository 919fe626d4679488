//! Data types and associated functions and methods

use crate::earth_engine::catalog::MapType;

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::{ser::SerializeMap, Deserialize, Deserializer, Serialize, Serializer};
use strum_macros::Display;
use validator::{Validate, ValidationError};

/// Kind of a user-drawn zone
#[derive(Clone, Copy, Debug, Deserialize, Display, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ZoneKind {
    /// A single point, `[lng, lat]`
    Marker,
    /// A closed ring of `[lng, lat]` pairs
    Polygon,
    /// Flattened bounds sent by the map client
    Rectangle,
}

/// Geometry descriptor carried by zone queries
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, Validate)]
#[validate(schema(function = "validate_zone_geometry"))]
pub struct ZoneGeometry {
    /// Zone kind
    #[serde(rename = "type")]
    pub kind: ZoneKind,
    /// Flat list of coordinates
    pub coordinates: Vec<f64>,
}

impl ZoneGeometry {
    /// Return a new ZoneGeometry object.
    pub fn new(kind: ZoneKind, coordinates: Vec<f64>) -> Self {
        ZoneGeometry { kind, coordinates }
    }
}

/// Validate the number of coordinates against the zone kind
fn validate_zone_geometry(zone: &ZoneGeometry) -> Result<(), ValidationError> {
    let count = zone.coordinates.len();
    if zone.coordinates.iter().any(|c| !c.is_finite()) {
        return Err(ValidationError::new("Coordinates must be finite numbers"));
    }
    let valid = match zone.kind {
        ZoneKind::Marker => count == 2,
        ZoneKind::Polygon => count >= 6 && count % 2 == 0,
        ZoneKind::Rectangle => count >= 6,
    };
    if !valid {
        let code = match zone.kind {
            ZoneKind::Marker => "A marker needs exactly one longitude and latitude",
            ZoneKind::Polygon => "A polygon needs at least three longitude and latitude pairs",
            ZoneKind::Rectangle => "A rectangle needs at least six bound coordinates",
        };
        let mut error = ValidationError::new(code);
        error.add_param("coordinates".into(), &count);
        return Err(error);
    }
    Ok(())
}

/// Deserialise a field that the document store may hold either as a string or as a number.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Species record as stored in the document store
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SpeciesRecord {
    name: Option<String>,
    common_names: Vec<String>,
    etymology: Option<String>,
    characteristics: Option<String>,
    synonyms: Vec<String>,
    identification_aspects: Vec<String>,
}

/// A grassland species
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Species {
    pub id: String,
    pub name: Option<String>,
    pub common_names: Vec<String>,
    pub etymology: Option<String>,
    pub characteristics: Option<String>,
    pub synonyms: Vec<String>,
    pub identification_aspects: Vec<String>,
}

impl Species {
    pub(crate) fn from_record(id: String, record: SpeciesRecord) -> Self {
        Species {
            id,
            name: record.name,
            common_names: record.common_names,
            etymology: record.etymology,
            characteristics: record.characteristics,
            synonyms: record.synonyms,
            identification_aspects: record.identification_aspects,
        }
    }
}

/// Community record as stored in the document store
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct CommunityRecord {
    name: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    order: Option<String>,
    subcommunities_counter: Option<u32>,
}

/// A classified vegetation community
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Community {
    pub id: String,
    pub name: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub order: Option<String>,
    pub subcommunities_counter: Option<u32>,
}

impl Community {
    pub(crate) fn from_record(id: String, record: CommunityRecord) -> Self {
        Community {
            id,
            name: record.name,
            link: record.link,
            description: record.description,
            order: record.order,
            subcommunities_counter: record.subcommunities_counter,
        }
    }
}

/// Species reference, as listed under a community or sub-community
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct SpeciesRef {
    pub id: String,
    pub name: Option<String>,
}

/// Community species record as stored in the document store
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SpeciesRefRecord {
    name: Option<String>,
}

impl SpeciesRef {
    pub(crate) fn from_record(id: String, record: SpeciesRefRecord) -> Self {
        SpeciesRef {
            id,
            name: record.name,
        }
    }
}

/// Sub-community record as stored in the document store
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SubCommunityRecord {
    #[serde(deserialize_with = "lenient_string")]
    order: Option<String>,
    predominant_species: Vec<SpeciesRef>,
    indicator_species: Vec<SpeciesRef>,
}

/// A sub-community of a community
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubCommunity {
    pub id: String,
    pub order: Option<String>,
    pub predominant_species: Vec<SpeciesRef>,
    pub indicator_species: Vec<SpeciesRef>,
}

impl SubCommunity {
    pub(crate) fn from_record(id: String, record: SubCommunityRecord) -> Self {
        SubCommunity {
            id,
            order: record.order,
            predominant_species: record.predominant_species,
            indicator_species: record.indicator_species,
        }
    }
}

/// A point on the map
///
/// Geo points from the document store arrive as `latitude`/`longitude`.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Coordinate {
    #[serde(alias = "latitude")]
    pub lat: f64,
    #[serde(alias = "longitude")]
    pub lng: f64,
}

/// Zone record as stored in the document store
#[derive(Debug, Deserialize)]
pub(crate) struct ZoneRecord {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    order: Option<String>,
    #[serde(rename = "type")]
    kind: ZoneKind,
    #[serde(default)]
    visible: bool,
    #[serde(default)]
    coordinates: Vec<Coordinate>,
}

/// A zone drawn by a user
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Zone {
    pub id: String,
    pub name: Option<String>,
    pub order: Option<String>,
    #[serde(rename = "type")]
    pub kind: ZoneKind,
    pub visible: bool,
    pub coordinates: Vec<Coordinate>,
}

impl Zone {
    pub(crate) fn from_record(id: String, record: ZoneRecord) -> Self {
        Zone {
            id,
            name: record.name,
            order: record.order,
            kind: record.kind,
            visible: record.visible,
            coordinates: record.coordinates,
        }
    }
}

/// Community identity attached to map layers and zone areas
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CommunityInfo {
    pub id: String,
    pub order: Option<String>,
    pub name: Option<String>,
}

impl From<Community> for CommunityInfo {
    fn from(community: Community) -> Self {
        CommunityInfo {
            id: community.id,
            order: community.order,
            name: community.name,
        }
    }
}

/// Tile layer metadata for the map client
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapLayer {
    pub map_type: MapType,
    pub map_id: String,
    pub url_template: String,
    pub layer_label: &'static str,
    pub layer_description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub community_info: Option<CommunityInfo>,
}

/// Area of a zone covered by one community
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CommunityArea {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Hectares, two decimals
    pub area: String,
}

/// Geometric and community summary of a zone
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneInformation {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Hectares, two decimals
    pub area: Option<String>,
    /// Kilometres, two decimals
    pub perimeter: Option<String>,
    pub communities_areas: Vec<CommunityArea>,
}

/// Format a reduced value the way the map client displays it.
pub fn two_decimals(value: f64) -> String {
    format!("{:.2}", value)
}

/// One value of an intra-annual series
///
/// Serialises as `{"day": <period>, "<key>": "<value>"}` where the key names the indicator.
#[derive(Clone, Debug, PartialEq)]
pub struct SeriesPoint {
    /// Day of year or period index of the composite
    pub day: u32,
    /// Reduced value, `None` when the region had no valid pixels
    pub value: Option<f64>,
    /// Name of the value field
    pub key: &'static str,
}

impl Serialize for SeriesPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("day", &self.day)?;
        map.serialize_entry(self.key, &self.value.map(two_decimals))?;
        map.end()
    }
}

/// One value of a year-by-year series
#[derive(Clone, Debug, PartialEq)]
pub struct YearPoint {
    pub year: i32,
    pub value: Option<f64>,
    pub key: &'static str,
}

impl Serialize for YearPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("year", &self.year.to_string())?;
        map.serialize_entry(self.key, &self.value.map(two_decimals))?;
        map.end()
    }
}

/// Productive-year series for one year
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnnualSeries {
    pub year: i32,
    pub values: Vec<SeriesPoint>,
}

/// Historical mean series in productive-year order
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MeanSeries {
    pub values: Vec<SeriesPoint>,
}

/// An export task on the compute platform
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportTask {
    pub name: String,
    pub description: Option<String>,
    pub state: String,
    pub done: bool,
    pub error: Option<String>,
}

/// Successful response envelope
///
/// Serialises as `{"statusCode": 200, "<key>": <payload>}`.
pub struct Reply<T> {
    key: &'static str,
    payload: T,
}

impl<T> Reply<T> {
    /// Return a Reply object
    pub fn new(key: &'static str, payload: T) -> Self {
        Reply { key, payload }
    }
}

impl<T: Serialize> Serialize for Reply<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("statusCode", &200)?;
        map.serialize_entry(self.key, &self.payload)?;
        map.end()
    }
}

impl<T: Serialize> IntoResponse for Reply<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
