//! Expression graph builder.

use serde_json::{json, Map, Value};

/// A node of an Earth Engine expression graph.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// A literal JSON value
    Constant(Value),
    /// An invocation of a platform function with named arguments
    Call {
        function: &'static str,
        arguments: Vec<(&'static str, Expr)>,
    },
}

impl Expr {
    /// A constant node.
    pub fn constant(value: impl Into<Value>) -> Self {
        Expr::Constant(value.into())
    }

    /// A function invocation node.
    pub fn call(function: &'static str, arguments: Vec<(&'static str, Expr)>) -> Self {
        Expr::Call {
            function,
            arguments,
        }
    }

    /// Render as a value node of the REST API.
    pub fn to_node(&self) -> Value {
        match self {
            Expr::Constant(value) => json!({ "constantValue": value }),
            Expr::Call {
                function,
                arguments,
            } => {
                let arguments: Map<String, Value> = arguments
                    .iter()
                    .map(|(name, arg)| (name.to_string(), arg.to_node()))
                    .collect();
                json!({
                    "functionInvocationValue": {
                        "functionName": function,
                        "arguments": arguments,
                    }
                })
            }
        }
    }

    /// Render as a complete expression graph.
    pub fn to_graph(&self) -> Value {
        json!({"result": "0", "values": {"0": self.to_node()}})
    }

    // Images

    pub fn image(asset_id: &str) -> Self {
        Self::call("Image.load", vec![("id", Self::constant(asset_id))])
    }

    pub fn pixel_area() -> Self {
        Self::call("Image.pixelArea", vec![])
    }

    /// Select bands by regular expression.
    pub fn select(self, pattern: &str) -> Self {
        Self::call(
            "Image.select",
            vec![
                ("input", self),
                ("bandSelectors", Self::constant(json!([pattern]))),
            ],
        )
    }

    pub fn divide(self, other: Expr) -> Self {
        Self::call("Image.divide", vec![("image1", self), ("image2", other)])
    }

    pub fn subtract(self, other: Expr) -> Self {
        Self::call("Image.subtract", vec![("image1", self), ("image2", other)])
    }

    pub fn multiply(self, other: Expr) -> Self {
        Self::call("Image.multiply", vec![("image1", self), ("image2", other)])
    }

    /// Pixel-wise equality, 1 where equal and 0 elsewhere.
    pub fn equals(self, other: Expr) -> Self {
        Self::call("Image.eq", vec![("image1", self), ("image2", other)])
    }

    pub fn self_mask(self) -> Self {
        Self::call("Image.selfMask", vec![("image", self)])
    }

    pub fn update_mask(self, mask: Expr) -> Self {
        Self::call("Image.updateMask", vec![("image", self), ("mask", mask)])
    }

    pub fn add_bands(self, other: Expr) -> Self {
        Self::call("Image.addBands", vec![("dstImg", self), ("srcImg", other)])
    }

    pub fn rename(self, names: &[String]) -> Self {
        Self::call(
            "Image.rename",
            vec![("input", self), ("names", Self::constant(json!(names)))],
        )
    }

    /// Reduce all bands of an image into one band per reducer output.
    pub fn reduce(self, reducer: Expr) -> Self {
        Self::call("Image.reduce", vec![("image", self), ("reducer", reducer)])
    }

    /// Reduce the pixels of an image within a region to a dictionary.
    ///
    /// # Arguments
    ///
    /// * `reducer`: Reducer to apply to each band
    /// * `geometry`: Region to reduce over
    /// * `scale`: Nominal scale in metres
    /// * `max_pixels`: Maximum number of pixels to reduce
    pub fn reduce_region(self, reducer: Expr, geometry: Expr, scale: f64, max_pixels: f64) -> Self {
        Self::call(
            "Image.reduceRegion",
            vec![
                ("image", self),
                ("reducer", reducer),
                ("geometry", geometry),
                ("scale", Self::constant(scale)),
                ("maxPixels", Self::constant(max_pixels)),
            ],
        )
    }

    /// Footprint of an image or feature.
    pub fn footprint(self, max_error: f64) -> Self {
        Self::call(
            "Element.geometry",
            vec![("feature", self), ("maxError", Self::constant(max_error))],
        )
    }

    // Geometries

    /// A point from `[lng, lat]`.
    pub fn point(coordinates: &[f64]) -> Self {
        Self::call(
            "GeometryConstructors.Point",
            vec![("coordinates", Self::constant(json!(coordinates)))],
        )
    }

    /// A polygon from a flat list of `lng, lat` pairs.
    pub fn polygon(coordinates: &[f64]) -> Self {
        let ring: Vec<[f64; 2]> = coordinates
            .chunks_exact(2)
            .map(|pair| [pair[0], pair[1]])
            .collect();
        Self::call(
            "GeometryConstructors.Polygon",
            vec![("coordinates", Self::constant(json!([ring])))],
        )
    }

    /// A rectangle from two opposite corners.
    pub fn rectangle(corner: [f64; 2], opposite: [f64; 2]) -> Self {
        Self::call(
            "GeometryConstructors.Rectangle",
            vec![("coordinates", Self::constant(json!([corner, opposite])))],
        )
    }

    /// Area in square metres.
    pub fn area(self, max_error: f64) -> Self {
        Self::call(
            "Geometry.area",
            vec![("geometry", self), ("maxError", Self::constant(max_error))],
        )
    }

    /// Perimeter in metres.
    pub fn perimeter(self, max_error: f64) -> Self {
        Self::call(
            "Geometry.perimeter",
            vec![("geometry", self), ("maxError", Self::constant(max_error))],
        )
    }

    // Feature collections

    pub fn table(table_id: &str) -> Self {
        Self::call(
            "Collection.loadTable",
            vec![("tableId", Self::constant(table_id))],
        )
    }

    /// Paint the features of a collection into an RGB image.
    pub fn draw(self, color: &str, stroke_width: u32) -> Self {
        Self::call(
            "Collection.draw",
            vec![
                ("collection", self),
                ("color", Self::constant(color)),
                ("strokeWidth", Self::constant(stroke_width)),
            ],
        )
    }

    // Reducers

    pub fn mean() -> Self {
        Self::call("Reducer.mean", vec![])
    }

    pub fn sum() -> Self {
        Self::call("Reducer.sum", vec![])
    }

    pub fn std_dev() -> Self {
        Self::call("Reducer.stdDev", vec![])
    }

    pub fn min() -> Self {
        Self::call("Reducer.min", vec![])
    }

    pub fn max() -> Self {
        Self::call("Reducer.max", vec![])
    }

    pub fn median() -> Self {
        Self::call("Reducer.median", vec![])
    }

    /// Percentile reducer. Output bands are suffixed with `_p{percentile}`.
    pub fn percentile(percentiles: &[u32]) -> Self {
        Self::call(
            "Reducer.percentile",
            vec![("percentiles", Self::constant(json!(percentiles)))],
        )
    }

    /// Group the output of a reducer by the values of another input band.
    ///
    /// The result lists `{"group": <value>, ...}` entries under `groups`.
    pub fn group(self, group_field: u32) -> Self {
        Self::call(
            "Reducer.group",
            vec![
                ("reducer", self),
                ("groupField", Self::constant(group_field)),
                ("groupName", Self::constant("group")),
            ],
        )
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::constant(value)
    }
}
