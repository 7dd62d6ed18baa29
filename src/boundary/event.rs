//! Drawing events, converted from the toolkit's untyped JSON at the boundary.
//!
//! The toolkit reports events as loosely shaped objects:
//!
//! ```json
//! {"type": "draw:created", "layer_id": 57, "geojson": {"type": "Feature", ...}}
//! {"type": "draw:edited",  "layers": {"57": {"type": "Feature", ...}}}
//! {"type": "draw:deleted", "layers": {"57": {...}, "61": {...}}}
//! ```
//!
//! Only the closed [`DrawingEvent`] union leaves this module.

use std::{
    collections::{BTreeMap, HashSet},
    fmt,
};

use serde::Deserialize;
use thiserror::Error;

use crate::geofile::feature::{normalize_drawn_feature, FeatureError};

/// Identifier the drawing toolkit gives to a layer on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub u64);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawingEvent {
    Created {
        layer_id: LayerId,
        feature: geojson::Feature,
    },
    Edited(Vec<(LayerId, geojson::Feature)>),
    Deleted(HashSet<LayerId>),
}

#[derive(Debug, Error)]
pub enum DrawingEventError {
    #[error("Malformed drawing event: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Layer key {0:?} is not a numeric layer id")]
    InvalidLayerKey(String),
    #[error("Layer {layer_id} does not hold a GeoJSON feature: {source}")]
    InvalidFeature {
        layer_id: LayerId,
        source: serde_json::Error,
    },
    #[error("Layer {layer_id} cannot be used as a plot: {source}")]
    UnsupportedShape {
        layer_id: LayerId,
        source: FeatureError,
    },
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
enum RawDrawingEvent {
    #[serde(rename = "draw:created")]
    Created {
        layer_id: u64,
        geojson: serde_json::Value,
    },
    #[serde(rename = "draw:edited")]
    Edited {
        layers: BTreeMap<String, serde_json::Value>,
    },
    #[serde(rename = "draw:deleted")]
    Deleted {
        layers: BTreeMap<String, serde_json::Value>,
    },
}

impl TryFrom<&serde_json::Value> for DrawingEvent {
    type Error = DrawingEventError;

    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        let raw: RawDrawingEvent = serde_json::from_value(value.clone())?;
        match raw {
            RawDrawingEvent::Created { layer_id, geojson } => {
                let layer_id = LayerId(layer_id);
                Ok(DrawingEvent::Created {
                    layer_id,
                    feature: parse_shape(layer_id, geojson)?,
                })
            }
            RawDrawingEvent::Edited { layers } => {
                let edited: Result<Vec<_>, DrawingEventError> = layers
                    .into_iter()
                    .map(|(key, geojson)| -> Result<_, DrawingEventError> {
                        let layer_id = parse_layer_key(&key)?;
                        Ok((layer_id, parse_shape(layer_id, geojson)?))
                    })
                    .collect();
                Ok(DrawingEvent::Edited(edited?))
            }
            RawDrawingEvent::Deleted { layers } => {
                let deleted: Result<HashSet<_>, DrawingEventError> =
                    layers.keys().map(|key| parse_layer_key(key)).collect();
                Ok(DrawingEvent::Deleted(deleted?))
            }
        }
    }
}

fn parse_layer_key(key: &str) -> Result<LayerId, DrawingEventError> {
    key.parse()
        .map(LayerId)
        .map_err(|_| DrawingEventError::InvalidLayerKey(key.to_string()))
}

fn parse_shape(
    layer_id: LayerId,
    geojson: serde_json::Value,
) -> Result<geojson::Feature, DrawingEventError> {
    let feature: geojson::Feature = serde_json::from_value(geojson)
        .map_err(|source| DrawingEventError::InvalidFeature { layer_id, source })?;
    normalize_drawn_feature(feature)
        .map_err(|source| DrawingEventError::UnsupportedShape { layer_id, source })
}
