use std::fmt;

use thiserror::Error;

/// Application-level identifier of a plot. Stable for the lifetime of an editing
/// session and independent of any identifier the drawing toolkit assigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlotId(pub u64);

impl fmt::Display for PlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plot-{}", self.0)
    }
}

/// A single farm plot boundary: a GeoJSON feature plus its stable id.
#[derive(Debug, Clone, PartialEq)]
pub struct Plot {
    pub id: PlotId,
    pub feature: geojson::Feature,
}

#[derive(Debug, Error, PartialEq)]
pub enum FeatureError {
    #[error("Feature has no geometry")]
    MissingGeometry,
    #[error("Expected a Polygon or MultiPolygon, got {0}")]
    UnsupportedGeometry(String),
}

/// Turn a drawn shape into a clean plot feature: the toolkit's `id` member is
/// removed and only areal geometries are accepted.
pub fn normalize_drawn_feature(
    mut feature: geojson::Feature,
) -> Result<geojson::Feature, FeatureError> {
    match &feature.geometry {
        None => return Err(FeatureError::MissingGeometry),
        Some(geometry) => match &geometry.value {
            geojson::Value::Polygon(_) | geojson::Value::MultiPolygon(_) => {}
            other => {
                return Err(FeatureError::UnsupportedGeometry(
                    geometry_name(other).into(),
                ))
            }
        },
    }
    feature.id = None;
    Ok(feature)
}

fn geometry_name(value: &geojson::Value) -> &'static str {
    match value {
        geojson::Value::Point(_) => "Point",
        geojson::Value::MultiPoint(_) => "MultiPoint",
        geojson::Value::LineString(_) => "LineString",
        geojson::Value::MultiLineString(_) => "MultiLineString",
        geojson::Value::Polygon(_) => "Polygon",
        geojson::Value::MultiPolygon(_) => "MultiPolygon",
        geojson::Value::GeometryCollection(_) => "GeometryCollection",
    }
}

/// Wrap features, in order, into a FeatureCollection.
pub fn to_feature_collection<'a, I>(features: I) -> geojson::FeatureCollection
where
    I: IntoIterator<Item = &'a geojson::Feature>,
{
    geojson::FeatureCollection {
        bbox: None,
        features: features.into_iter().cloned().collect(),
        foreign_members: None,
    }
}
