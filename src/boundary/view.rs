use serde::{Deserialize, Serialize};

/// Zoom level requested whenever the view jumps to a single coordinate
/// (geolocation fix or places search selection).
pub const LOCATE_ZOOM: f64 = 18.0;

/// Fallback center used until features or a location are known.
pub const DEFAULT_CENTER: LatLng = LatLng {
    lat: 10.648021,
    lng: 76.549728,
};

/// A WGS84 coordinate in the latitude-first order map renderers expect.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl From<geo::Coord> for LatLng {
    fn from(coord: geo::Coord) -> Self {
        Self {
            lat: coord.y,
            lng: coord.x,
        }
    }
}

/// Background rendering mode of the map.
///
/// The modes form a cycle: road, satellite, hybrid, terrain, then back to road.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BaseLayer {
    #[serde(rename = "roadmap")]
    Road,
    Satellite,
    #[default]
    Hybrid,
    Terrain,
}

impl BaseLayer {
    const CYCLE: [BaseLayer; 4] = [
        BaseLayer::Road,
        BaseLayer::Satellite,
        BaseLayer::Hybrid,
        BaseLayer::Terrain,
    ];

    /// The layer following this one in the cycle.
    pub fn next(self) -> Self {
        let index = Self::CYCLE
            .iter()
            .position(|layer| *layer == self)
            .unwrap_or(0);
        Self::CYCLE[(index + 1) % Self::CYCLE.len()]
    }

    /// Name used by the tile provider.
    pub fn name(&self) -> &'static str {
        match self {
            BaseLayer::Road => "roadmap",
            BaseLayer::Satellite => "satellite",
            BaseLayer::Hybrid => "hybrid",
            BaseLayer::Terrain => "terrain",
        }
    }

    /// Tooltip shown on the layer-cycle control.
    pub fn control_title(&self) -> String {
        let name = self.name();
        let mut chars = name.chars();
        let capitalized = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => String::new(),
        };
        format!("Current: {} - Click to change", capitalized)
    }
}

/// What the map currently shows: where, how close, and over which base layer.
#[derive(Debug, Clone, PartialEq)]
pub struct MapViewState {
    pub center: LatLng,
    pub zoom: f64,
    pub base_layer: BaseLayer,
}

impl MapViewState {
    pub fn new(center: LatLng, zoom: f64, base_layer: BaseLayer) -> Self {
        Self {
            center,
            zoom,
            base_layer,
        }
    }
}

impl Default for MapViewState {
    fn default() -> Self {
        Self::new(DEFAULT_CENTER, LOCATE_ZOOM, BaseLayer::default())
    }
}
