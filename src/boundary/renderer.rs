use serde::Deserialize;

use super::{
    editor::EditorHandle,
    event::LayerId,
    view::{BaseLayer, LatLng},
};

/// Handle for a control registered on a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlId(pub u64);

/// Controls the editor places in the top-right corner of the map.
#[derive(Debug, Clone, PartialEq)]
pub enum MapControl {
    /// "Locate me" button stacked over the base layer cycle button.
    LocateAndCycle { title: String, locating: bool },
    PlacesSearch { placeholder: String },
}

/// Which drawing tools the toolkit offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawToolbarOptions {
    pub polygon: bool,
    pub rectangle: bool,
    pub circle: bool,
    pub marker: bool,
    pub polyline: bool,
    pub circle_marker: bool,
}

impl DrawToolbarOptions {
    /// Freeform polygons only; every other tool is disabled.
    pub fn polygon_only() -> Self {
        Self {
            polygon: true,
            rectangle: false,
            circle: false,
            marker: false,
            polyline: false,
            circle_marker: false,
        }
    }
}

/// WMS layer with cadastral boundaries drawn over the base layer.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CadastralOverlay {
    pub url: String,
    pub layers: String,
    pub format: String,
    pub transparent: bool,
}

impl Default for CadastralOverlay {
    fn default() -> Self {
        Self {
            url: "https://bhuvan-vec1.nrsc.gov.in/bhuvan/gwc/service/wms".to_string(),
            layers: "cadastral:cadastral_india".to_string(),
            format: "image/png".to_string(),
            transparent: true,
        }
    }
}

impl CadastralOverlay {
    /// The overlay is stronger over the plain road map than over imagery.
    pub fn opacity_over(&self, base_layer: BaseLayer) -> f64 {
        match base_layer {
            BaseLayer::Road => 0.6,
            _ => 0.3,
        }
    }
}

/// The map engine the editor drives. Implementations wrap a tile renderer plus its
/// vector drawing plugin.
pub trait MapRenderer {
    fn set_view(&mut self, center: LatLng, zoom: f64);

    fn zoom(&self) -> f64;

    fn set_base_layer(&mut self, base_layer: BaseLayer, overlay: &CadastralOverlay, opacity: f64);

    fn configure_drawing(&mut self, options: &DrawToolbarOptions);

    /// Put an existing feature into the editable group and return the toolkit's id
    /// for it.
    fn add_editable_layer(&mut self, feature: &geojson::Feature) -> LayerId;

    fn clear_editable_layers(&mut self);

    /// Replace the read-only GeoJSON display with `features`.
    fn show_features(&mut self, features: &geojson::FeatureCollection);

    fn add_control(&mut self, control: &MapControl, handle: EditorHandle) -> ControlId;

    fn update_control(&mut self, id: ControlId, control: &MapControl);

    fn remove_control(&mut self, id: ControlId);
}
