//! Asset paths, visualization parameters and layer definitions.

use crate::earth_engine::expression::Expr;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Nominal scale of the productivity rasters, in metres
pub const REDUCTION_SCALE: f64 = 231.65635826395828;
/// Upper bound on the pixels of one reduction
pub const MAX_PIXELS: f64 = 1e12;
/// Scale of the community classification, in metres
pub const CLASSIFICATION_SCALE: f64 = 30.0;
/// Error margin of image footprints, in metres
pub const FOOTPRINT_MAX_ERROR: f64 = 500.0;

const CPUR: &str = "users/bagnato/PronosticoForrajero/ComunidadesDePastizal/PastizalesUruguay_moda";
/// Community classification used for zone areas
pub const CLASSIFICATION: &str =
    "users/bagnato/PronosticoForrajero/ComunidadesDePastizal/ComunidadesPastizal";
const ROU: &str = "users/bagnato/LimiteOficial-ROU";
const PPT: &str = "users/bagnato/PronosticoForrajero/PPT2003-2020";
const TAIR: &str = "users/bagnato/PronosticoForrajero/Tair16_2001-2020";
const MAPBIOMAS: &str =
    "projects/MapBiomas_Pampa/public/collection2/mapbiomas_pampa_collection2_integration_v1";
/// Police sectionals
pub const POLICE_SECTIONALS: &str = "projects/gee-inia/assets/Seccionales_Policiales";
const PADRONES: &str = "projects/pastizalesrou/assets/padrones/padrones_colonia";

const PRODUCTIVITY_PALETTE: &[&str] = &["86622e", "dc7d0b", "f8d911", "d2ff11", "709426", "38841e"];
const OUTLINE_PALETTE: &[&str] = &["ffffff", "eeeeee"];
/// Stroke colour of feature collection outlines
const OUTLINE_COLOUR: &str = "000000";

/// Parameters for rendering an image as map tiles
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Visualization {
    pub bands: &'static [&'static str],
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub palette: &'static [&'static str],
    pub opacity: Option<f64>,
}

impl Visualization {
    const fn new(
        bands: &'static [&'static str],
        min: Option<f64>,
        max: Option<f64>,
        palette: &'static [&'static str],
        opacity: Option<f64>,
    ) -> Self {
        Visualization {
            bands,
            min,
            max,
            palette,
            opacity,
        }
    }

    const fn outline() -> Self {
        Self::new(&[], None, Some(126.0), OUTLINE_PALETTE, Some(0.1))
    }

    const fn community(colour: &'static [&'static str]) -> Self {
        Self::new(&[], Some(0.0), Some(1.0), colour, Some(1.0))
    }
}

/// Map layers served to the client
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, Deserialize, Display, EnumString, Eq, Hash, PartialEq, Serialize)]
pub enum MapType {
    ET,
    PPT,
    T,
    PPNA,
    APAR,
    RH,
    IOSE,
    Mapbiomas,
    CPUr,
    ROU,
    BHr,
    PrB,
    Pr,
    PdB,
    Pd,
    PE,
    SP,
    #[strum(serialize = "C_I")]
    #[serde(rename = "C_I")]
    BasinI,
    #[strum(serialize = "C_II")]
    #[serde(rename = "C_II")]
    BasinII,
    #[strum(serialize = "C_III")]
    #[serde(rename = "C_III")]
    BasinIII,
    #[strum(serialize = "C_IV")]
    #[serde(rename = "C_IV")]
    BasinIV,
    #[strum(serialize = "C_V")]
    #[serde(rename = "C_V")]
    BasinV,
    PADRONES,
}

/// Layers of the information panel, in display order
pub const INFORMATION_MAPS: [MapType; 5] = [
    MapType::ROU,
    MapType::CPUr,
    MapType::PPNA,
    MapType::PPT,
    MapType::T,
];

/// Community layers, in display order
pub const COMMUNITY_MAPS: [MapType; 5] = [
    MapType::PrB,
    MapType::Pr,
    MapType::PdB,
    MapType::Pd,
    MapType::PE,
];

impl MapType {
    /// Expression producing the image to render.
    pub fn expression(&self) -> Expr {
        let cpur = || Expr::image(CPUR);
        let class = |n: f64| cpur().equals(n.into()).self_mask();
        match self {
            MapType::ET => Indicator::Et.raster().divide(3.0.into()),
            MapType::PPT => Expr::image(PPT).select("b.*"),
            MapType::T => Expr::image(TAIR).select("b.*"),
            MapType::PPNA => Indicator::Ppna.raster().select("b.*"),
            MapType::APAR => Indicator::Apar.raster().select("b.*"),
            MapType::RH => Indicator::Rh.raster().select("b.*"),
            MapType::IOSE => Indicator::Iose.raster(),
            MapType::Mapbiomas => Expr::image(MAPBIOMAS),
            MapType::CPUr => cpur(),
            MapType::BHr => MapType::PPT
                .expression()
                .subtract(MapType::ET.expression()),
            MapType::PrB => class(4.0),
            MapType::Pr => class(5.0),
            MapType::PdB => class(2.0),
            MapType::Pd => class(3.0),
            MapType::PE => class(1.0),
            MapType::ROU
            | MapType::SP
            | MapType::BasinI
            | MapType::BasinII
            | MapType::BasinIII
            | MapType::BasinIV
            | MapType::BasinV
            | MapType::PADRONES => {
                Expr::table(self.table_id().unwrap_or(ROU)).draw(OUTLINE_COLOUR, 1)
            }
        }
    }

    /// Table id of layers drawn from feature collections.
    pub fn table_id(&self) -> Option<&'static str> {
        match self {
            MapType::ROU => Some(ROU),
            MapType::SP => Some(POLICE_SECTIONALS),
            MapType::BasinI => Some(BasinGrade::I.table_id()),
            MapType::BasinII => Some(BasinGrade::II.table_id()),
            MapType::BasinIII => Some(BasinGrade::III.table_id()),
            MapType::BasinIV => Some(BasinGrade::IV.table_id()),
            MapType::BasinV => Some(BasinGrade::V.table_id()),
            MapType::PADRONES => Some(PADRONES),
            _ => None,
        }
    }

    pub fn visualization(&self) -> Visualization {
        match self {
            MapType::ET => Visualization::new(
                &["b2023-33"],
                None,
                Some(80.0),
                &["ffffff", "9dfcf7", "3387ff", "0256bd", "0a0561", "000000"],
                Some(1.0),
            ),
            MapType::PPT => Visualization::new(
                &["b2020-12-21"],
                None,
                Some(40.0),
                &["ffffff", "eac107", "e47200", "d42e00", "a52828"],
                Some(1.0),
            ),
            MapType::T => Visualization::new(
                &["b2020-353"],
                Some(20.892060261680967),
                Some(25.18325027284169),
                &["0007b3", "5027ff", "9889c7", "f68893", "d02e2e", "b30000"],
                Some(1.0),
            ),
            MapType::APAR => Visualization::new(
                &["b2023-3"],
                None,
                Some(600.0),
                PRODUCTIVITY_PALETTE,
                Some(1.0),
            ),
            MapType::PPNA => Visualization::new(
                &["b2023-33"],
                None,
                Some(600.0),
                PRODUCTIVITY_PALETTE,
                Some(1.0),
            ),
            MapType::RH => Visualization::new(
                &["b2022-353"],
                Some(-200.0),
                Some(150.0),
                &["a70000", "e21818", "ff8479", "ffffff", "6bbdff", "4861ff", "00069b"],
                Some(1.0),
            ),
            MapType::IOSE => Visualization::new(&["b2021"], Some(0.0), Some(1.0), &[], None),
            MapType::Mapbiomas => {
                Visualization::new(&["classification_2021"], Some(0.0), Some(1.0), &[], None)
            }
            MapType::CPUr => Visualization::new(
                &["b1"],
                Some(1.0),
                Some(5.0),
                &["724800", "f26d00", "e8b60e", "ffe225", "6e9916"],
                Some(1.0),
            ),
            MapType::BHr => Visualization::new(&[], Some(0.0), Some(60.0), &[], Some(1.0)),
            MapType::PrB => Visualization::community(&["ffe225"]),
            MapType::Pr => Visualization::community(&["6e9916"]),
            MapType::PdB => Visualization::community(&["f26d00"]),
            MapType::Pd => Visualization::community(&["e8b60e"]),
            MapType::PE => Visualization::community(&["724800"]),
            MapType::ROU
            | MapType::SP
            | MapType::BasinI
            | MapType::BasinII
            | MapType::BasinIII
            | MapType::BasinIV
            | MapType::BasinV
            | MapType::PADRONES => Visualization::outline(),
        }
    }

    /// Short label shown in the layer list.
    pub fn label(&self) -> &'static str {
        match self {
            MapType::PrB => "COMUNIDAD I",
            MapType::Pr => "COMUNIDAD II",
            MapType::PdB => "COMUNIDAD III",
            MapType::Pd => "COMUNIDAD IV",
            MapType::PE => "COMUNIDAD V",
            MapType::ET => "ET",
            MapType::PPT => "PPT",
            MapType::T => "T",
            MapType::PPNA => "PPNA",
            MapType::APAR => "APAR",
            MapType::RH => "RH",
            MapType::IOSE => "IOSE",
            MapType::Mapbiomas => "Mapbiomas",
            MapType::CPUr => "CPUr",
            MapType::ROU => "ROU",
            MapType::BHr => "BHr",
            MapType::SP => "SP",
            MapType::BasinI => "C_I",
            MapType::BasinII => "C_II",
            MapType::BasinIII => "C_III",
            MapType::BasinIV => "C_IV",
            MapType::BasinV => "C_V",
            MapType::PADRONES => "PADRONES",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            MapType::ET => "Evapotranspiración",
            MapType::PPT => "Precipitación",
            MapType::T => "Temperatura",
            MapType::PPNA => "Productividad",
            MapType::APAR => "Radiación fotosintéticamente activa absorbida",
            MapType::RH => "Rendimiento hídrico",
            MapType::IOSE => "Índice de oferta de servicios ecosistémicos",
            MapType::Mapbiomas => "Cobertura y uso del suelo",
            MapType::CPUr => "Comunidades de Pastizales",
            MapType::ROU => "Contorno del Uruguay",
            MapType::BHr => "Balance Hidrológico resultante",
            MapType::PrB => "Pastizales Ralos de la región Basáltica",
            MapType::Pr => "Pastizales Ralos",
            MapType::PdB => "Pastizales Densos de la región Basáltica",
            MapType::Pd => "Pastizales Densos",
            MapType::PE => "Pastizales del Este",
            MapType::SP => "Seccionales Policiales",
            MapType::BasinI
            | MapType::BasinII
            | MapType::BasinIII
            | MapType::BasinIV
            | MapType::BasinV => "Cuencas hidrográficas",
            MapType::PADRONES => "Padrones",
        }
    }

    /// Order of the community a layer depicts.
    pub fn community_order(&self) -> Option<CommunityOrder> {
        match self {
            MapType::PrB => Some(CommunityOrder::I),
            MapType::Pr => Some(CommunityOrder::II),
            MapType::PdB => Some(CommunityOrder::III),
            MapType::Pd => Some(CommunityOrder::IV),
            MapType::PE => Some(CommunityOrder::V),
            _ => None,
        }
    }
}

/// Community orders, as stored in the `order` field of community documents
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, Display, EnumString, Eq, Hash, PartialEq)]
pub enum CommunityOrder {
    I,
    II,
    III,
    IV,
    V,
    VI,
}

impl CommunityOrder {
    /// Binary raster covering the community.
    pub fn raster(&self) -> Expr {
        const PREFIX: &str = "users/bagnato/PronosticoForrajero/ComunidadesDePastizal/";
        let name = match self {
            CommunityOrder::I => "PastizalesRalosBasalto",
            CommunityOrder::II => "PastizalesRalos",
            CommunityOrder::III => "PastizalesDensosBasalto",
            CommunityOrder::IV => "PastizalesDensos",
            CommunityOrder::V | CommunityOrder::VI => "PastizalesDelEste",
        };
        Expr::image(&format!("{}{}", PREFIX, name))
    }

    /// Community order of a class of the zone-area classification.
    pub fn from_class(class: i64) -> Option<Self> {
        match class {
            1 => Some(CommunityOrder::VI),
            2 => Some(CommunityOrder::III),
            3 => Some(CommunityOrder::IV),
            4 => Some(CommunityOrder::I),
            5 => Some(CommunityOrder::II),
            _ => None,
        }
    }
}

/// Basin grades
#[derive(Clone, Copy, Debug, Display, EnumString, Eq, Hash, PartialEq)]
pub enum BasinGrade {
    I,
    II,
    III,
    IV,
    V,
}

impl BasinGrade {
    pub fn table_id(&self) -> &'static str {
        match self {
            BasinGrade::I => "projects/pastizalesrou/assets/cuencas/Cuencas_G1",
            BasinGrade::II => "projects/pastizalesrou/assets/cuencas/Cuencas_G2",
            BasinGrade::III => "projects/pastizalesrou/assets/cuencas/Cuencas_G3",
            BasinGrade::IV => "projects/pastizalesrou/assets/cuencas/Cuencas_G4",
            BasinGrade::V => "projects/pastizalesrou/assets/cuencas/Cuencas_G5",
        }
    }
}

/// Raster indicators with zonal series
#[derive(Clone, Copy, Debug, Display, EnumString, Eq, Hash, PartialEq)]
pub enum Indicator {
    #[strum(serialize = "ppna")]
    Ppna,
    #[strum(serialize = "apar")]
    Apar,
    #[strum(serialize = "et")]
    Et,
    #[strum(serialize = "rh")]
    Rh,
    #[strum(serialize = "rhProp")]
    RhProp,
    #[strum(serialize = "iose")]
    Iose,
}

impl Indicator {
    /// Name of the value field of series points.
    pub fn value_key(&self) -> &'static str {
        match self {
            Indicator::Ppna => "ppna",
            Indicator::Apar => "apar",
            Indicator::Et => "et",
            Indicator::Rh => "rh",
            Indicator::RhProp => "rhProp",
            Indicator::Iose => "iose",
        }
    }

    /// Key of the response envelope.
    pub fn response_key(&self) -> &'static str {
        match self {
            Indicator::Ppna => "ppnaInformation",
            Indicator::Apar => "aparInformation",
            Indicator::Et => "etInformation",
            Indicator::Rh => "rhInformation",
            Indicator::RhProp => "rhPropInformation",
            Indicator::Iose => "ioseInformation",
        }
    }

    /// Composite length in days.
    pub fn period_days(&self) -> u32 {
        match self {
            Indicator::Et => 8,
            _ => 16,
        }
    }

    /// Asset holding one band per composite, named `b{year}-{period}`.
    pub fn composite_asset(&self) -> &'static str {
        match self {
            Indicator::Ppna => "projects/pastizalesrou/assets/ppna/ppna-16",
            Indicator::Apar => "projects/pastizalesrou/assets/apar/apar-16",
            Indicator::Et => "projects/pastizalesrou/assets/et/et-8",
            Indicator::Rh => "projects/pastizalesrou/assets/rh/rh-16_Historica",
            Indicator::RhProp => "projects/pastizalesrou/assets/rhProp/rhProp-16_Historica",
            Indicator::Iose => "projects/pastizalesrou/assets/iose/iose_Historica",
        }
    }

    /// Raster for map rendering.
    pub fn raster(&self) -> Expr {
        Expr::image(self.composite_asset())
    }

    /// Whether the indicator publishes intra-annual series.
    pub fn has_annual_series(&self) -> bool {
        !matches!(self, Indicator::Iose)
    }

    /// Asset holding the historical mean of each composite, bands `b1..bN`.
    pub fn mean_asset(&self) -> Option<&'static str> {
        match self {
            Indicator::Ppna => Some("projects/pastizalesrou/assets/ppna/ppna-16_PromedioHistorico"),
            Indicator::Apar => Some("projects/pastizalesrou/assets/apar/apar-16_PromedioHistorico"),
            Indicator::Et => Some("projects/pastizalesrou/assets/et/et-8_PromedioHistorico"),
            Indicator::Rh => Some("projects/pastizalesrou/assets/rh/rh-16_PromedioHistorico"),
            Indicator::RhProp => {
                Some("projects/pastizalesrou/assets/rhProp/rhProp-16_PromedioHistorico")
            }
            Indicator::Iose => None,
        }
    }

    /// Asset holding one band per year, named `b{year}`.
    pub fn yearly_asset(&self) -> &'static str {
        match self {
            Indicator::Ppna => "projects/pastizalesrou/assets/ppna/ppna_PromedioAnual",
            Indicator::Apar => "projects/pastizalesrou/assets/apar/apar_PromedioAnual",
            Indicator::Et => "projects/pastizalesrou/assets/et/et_PromedioAnual",
            Indicator::Rh => "projects/pastizalesrou/assets/rh/rh_PromedioAnual",
            Indicator::RhProp => "projects/pastizalesrou/assets/rhProp/rhProp_PromedioAnual",
            Indicator::Iose => "projects/pastizalesrou/assets/iose/iose_Historica",
        }
    }
}

/// Reducer applied to historical series
#[derive(Clone, Copy, Debug, Default, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Statistic {
    #[default]
    Mean,
    StdDev,
    Min,
    Max,
    Median,
    P10,
    P25,
    P75,
    P90,
}

impl Statistic {
    pub fn reducer(&self) -> Expr {
        match self {
            Statistic::Mean => Expr::mean(),
            Statistic::StdDev => Expr::std_dev(),
            Statistic::Min => Expr::min(),
            Statistic::Max => Expr::max(),
            Statistic::Median => Expr::median(),
            Statistic::P10 => Expr::percentile(&[10]),
            Statistic::P25 => Expr::percentile(&[25]),
            Statistic::P75 => Expr::percentile(&[75]),
            Statistic::P90 => Expr::percentile(&[90]),
        }
    }
}
