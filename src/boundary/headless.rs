use std::collections::HashMap;

use super::{
    editor::EditorHandle,
    event::LayerId,
    renderer::{CadastralOverlay, ControlId, DrawToolbarOptions, MapControl, MapRenderer},
    view::{BaseLayer, LatLng},
};

/// First id the headless renderer hands out. Recorded toolkit layer ids are small
/// counters, so ids from this range never collide with replayed ones.
pub const HEADLESS_ID_BASE: u64 = 1 << 32;

/// Renderer without a display. It keeps track of what a real map would show and
/// logs every call, which is enough to replay a recorded drawing session.
pub struct HeadlessRenderer {
    center: Option<LatLng>,
    zoom: f64,
    next_id: u64,
    editable_layers: Vec<LayerId>,
    shown_features: usize,
    controls: HashMap<ControlId, (MapControl, EditorHandle)>,
}

impl HeadlessRenderer {
    pub fn new(zoom: f64) -> Self {
        Self {
            center: None,
            zoom,
            next_id: HEADLESS_ID_BASE,
            editable_layers: Vec::new(),
            shown_features: 0,
            controls: HashMap::new(),
        }
    }

    pub fn center(&self) -> Option<LatLng> {
        self.center
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl MapRenderer for HeadlessRenderer {
    fn set_view(&mut self, center: LatLng, zoom: f64) {
        log::debug!("View at {}, {} zoom {}", center.lat, center.lng, zoom);
        self.center = Some(center);
        self.zoom = zoom;
    }

    fn zoom(&self) -> f64 {
        self.zoom
    }

    fn set_base_layer(
        &mut self,
        base_layer: BaseLayer,
        overlay: &CadastralOverlay,
        opacity: f64,
    ) {
        log::debug!(
            "Base layer {} with overlay {} at opacity {}",
            base_layer.name(),
            overlay.layers,
            opacity
        );
    }

    fn configure_drawing(&mut self, options: &DrawToolbarOptions) {
        log::debug!("Drawing tools: {:?}", options);
    }

    fn add_editable_layer(&mut self, _feature: &geojson::Feature) -> LayerId {
        let layer_id = LayerId(self.allocate_id());
        self.editable_layers.push(layer_id);
        layer_id
    }

    fn clear_editable_layers(&mut self) {
        self.editable_layers.clear();
    }

    fn show_features(&mut self, features: &geojson::FeatureCollection) {
        self.shown_features = features.features.len();
        log::debug!("Showing {} plots", self.shown_features);
    }

    fn add_control(&mut self, control: &MapControl, handle: EditorHandle) -> ControlId {
        let id = ControlId(self.allocate_id());
        log::debug!("Added control {:?}: {:?}", id, control);
        self.controls.insert(id, (control.clone(), handle));
        id
    }

    fn update_control(&mut self, id: ControlId, control: &MapControl) {
        if let Some(entry) = self.controls.get_mut(&id) {
            entry.0 = control.clone();
        }
    }

    fn remove_control(&mut self, id: ControlId) {
        log::debug!("Removed control {:?}", id);
        self.controls.remove(&id);
    }
}
