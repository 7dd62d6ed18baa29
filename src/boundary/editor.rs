use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    rc::{Rc, Weak},
};

use serde::Deserialize;
use thiserror::Error;

use crate::geofile::feature::{normalize_drawn_feature, to_feature_collection, Plot, PlotId};

use super::{
    center::features_center,
    event::{DrawingEvent, LayerId},
    location::{GeolocationProvider, LocationError, PositionOptions},
    renderer::{CadastralOverlay, ControlId, DrawToolbarOptions, MapControl, MapRenderer},
    view::{BaseLayer, LatLng, MapViewState, DEFAULT_CENTER, LOCATE_ZOOM},
};

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MapConfig {
    pub default_center: LatLng,
    pub default_zoom: f64,
    pub initial_base_layer: BaseLayer,
    pub places_search: bool,
    pub places_placeholder: String,
    pub cadastral_overlay: CadastralOverlay,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            default_center: DEFAULT_CENTER,
            default_zoom: 18.0,
            initial_base_layer: BaseLayer::default(),
            places_search: true,
            places_placeholder: "Search places...".to_string(),
            cadastral_overlay: CadastralOverlay::default(),
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EditorError {
    #[error("Map control fired after its editor was unmounted")]
    StaleControlReference,
    #[error("Editor is already handling an event")]
    Busy,
}

/// View state plus the renderer, shared between the editor and the callbacks it
/// hands out. Callbacks only ever hold a weak reference.
struct MapSurface {
    view: MapViewState,
    renderer: Box<dyn MapRenderer>,
    config: MapConfig,
    geolocation: Option<Rc<dyn GeolocationProvider>>,
    locating: bool,
    last_location_error: Option<LocationError>,
    locate_control: Option<ControlId>,
    retired_controls: RetiredControls,
}

/// Controls whose registration ended. Kept outside the surface so a registration
/// can retire its control while the surface is borrowed.
type RetiredControls = Rc<RefCell<Vec<ControlId>>>;

impl MapSurface {
    fn recenter(&mut self, coord: LatLng) {
        self.view.center = coord;
        self.view.zoom = LOCATE_ZOOM;
        self.renderer.set_view(coord, LOCATE_ZOOM);
    }

    /// Move to `center` keeping whatever zoom the user has.
    fn follow_features(&mut self, center: LatLng) {
        self.view.center = center;
        self.view.zoom = self.renderer.zoom();
        self.renderer.set_view(center, self.view.zoom);
    }

    fn apply_base_layer(&mut self) {
        let base_layer = self.view.base_layer;
        let opacity = self.config.cadastral_overlay.opacity_over(base_layer);
        self.renderer
            .set_base_layer(base_layer, &self.config.cadastral_overlay, opacity);
    }

    fn cycle_base_layer(&mut self) -> BaseLayer {
        self.view.base_layer = self.view.base_layer.next();
        log::debug!("Switching base layer to {}", self.view.base_layer.name());
        self.apply_base_layer();
        self.refresh_locate_control();
        self.view.base_layer
    }

    fn locate_control(&self) -> MapControl {
        MapControl::LocateAndCycle {
            title: self.view.base_layer.control_title(),
            locating: self.locating,
        }
    }

    fn refresh_locate_control(&mut self) {
        if let Some(id) = self.locate_control {
            let control = self.locate_control();
            self.renderer.update_control(id, &control);
        }
    }

    /// Take every retired control off the map.
    fn remove_retired_controls(&mut self) {
        let retired: Vec<ControlId> = self.retired_controls.borrow_mut().drain(..).collect();
        for id in retired {
            self.renderer.remove_control(id);
            if self.locate_control == Some(id) {
                self.locate_control = None;
            }
        }
    }

    fn report_location_error(&mut self, err: LocationError) {
        log::warn!("Could not fetch location: {}", err);
        self.last_location_error = Some(err);
    }

    fn finish_location(&mut self, result: Result<LatLng, LocationError>) {
        self.locating = false;
        match result {
            Ok(position) => {
                log::info!("Located at {}, {}", position.lat, position.lng);
                self.recenter(position);
            }
            Err(err) => self.report_location_error(err),
        }
        self.refresh_locate_control();
    }
}

fn request_location(surface: &Rc<RefCell<MapSurface>>) {
    let provider = {
        let mut surface = surface.borrow_mut();
        let provider = surface.geolocation.clone();
        match &provider {
            Some(_) => {
                surface.locating = true;
                surface.last_location_error = None;
                surface.refresh_locate_control();
            }
            None => surface.report_location_error(LocationError::Unavailable),
        }
        surface.remove_retired_controls();
        match provider {
            Some(provider) => provider,
            None => return,
        }
    };
    // The surface is not borrowed here, so the provider may answer synchronously.
    let weak_surface = Rc::downgrade(surface);
    provider.get_current_position(
        &PositionOptions::default(),
        Box::new(move |result| {
            let Some(surface) = weak_surface.upgrade() else {
                log::debug!("Location result arrived after unmount, ignoring");
                return;
            };
            let borrowed = surface.try_borrow_mut();
            match borrowed {
                Ok(mut surface) => {
                surface.finish_location(result);
                surface.remove_retired_controls();
            }
                Err(_) => log::warn!("Dropping location result, editor is busy"),
            }
        }),
    );
}

/// Weak handle given to map controls. Every action checks that the editor is
/// still alive and reports [`EditorError::StaleControlReference`] otherwise.
#[derive(Clone)]
pub struct EditorHandle {
    surface: Weak<RefCell<MapSurface>>,
}

impl EditorHandle {
    pub fn is_alive(&self) -> bool {
        self.surface.strong_count() > 0
    }

    fn with_surface<T>(
        &self,
        action: impl FnOnce(&mut MapSurface) -> T,
    ) -> Result<T, EditorError> {
        let surface = self
            .surface
            .upgrade()
            .ok_or(EditorError::StaleControlReference)?;
        let mut surface = surface.try_borrow_mut().map_err(|_| EditorError::Busy)?;
        let result = action(&mut surface);
        // The action may have ended the editor and retired its controls.
        surface.remove_retired_controls();
        Ok(result)
    }

    pub fn request_current_location(&self) -> Result<(), EditorError> {
        let surface = self
            .surface
            .upgrade()
            .ok_or(EditorError::StaleControlReference)?;
        if surface.try_borrow_mut().is_err() {
            return Err(EditorError::Busy);
        }
        request_location(&surface);
        Ok(())
    }

    pub fn cycle_base_layer(&self) -> Result<BaseLayer, EditorError> {
        self.with_surface(|surface| surface.cycle_base_layer())
    }

    /// A place was picked in the search box.
    pub fn place_selected(&self, position: LatLng) -> Result<(), EditorError> {
        self.with_surface(|surface| surface.recenter(position))
    }
}

/// Removes its control from the map when dropped. If the surface is borrowed at
/// that moment the control is retired and the current borrower removes it before
/// releasing the surface.
struct ControlRegistration {
    surface: Weak<RefCell<MapSurface>>,
    retired: RetiredControls,
    id: ControlId,
}

impl Drop for ControlRegistration {
    fn drop(&mut self) {
        self.retired.borrow_mut().push(self.id);
        let Some(surface) = self.surface.upgrade() else {
            return;
        };
        let borrowed = surface.try_borrow_mut();
        match borrowed {
            Ok(mut surface) => surface.remove_retired_controls(),
            Err(_) => log::debug!("Map control {:?} retired while editor is busy", self.id),
        };
    }
}

pub type FeatureCollectionListener = Box<dyn FnMut(&geojson::FeatureCollection)>;

/// Keeps the plots drawn on the map and the GeoJSON handed to the host in sync.
///
/// Plots get a [`PlotId`] when they are created or loaded. The toolkit's layer
/// ids are only kept in a binding table, so edits and deletions are matched by
/// layer id and applied in place while the emitted features stay free of any
/// toolkit identifier.
pub struct BoundaryEditor {
    // Declared before `surface` so registrations drop while the surface is alive.
    controls: Vec<ControlRegistration>,
    surface: Rc<RefCell<MapSurface>>,
    plots: Vec<Plot>,
    layer_bindings: HashMap<LayerId, PlotId>,
    next_plot_id: u64,
    on_change: FeatureCollectionListener,
}

impl BoundaryEditor {
    pub fn new(
        config: MapConfig,
        renderer: Box<dyn MapRenderer>,
        geolocation: Option<Rc<dyn GeolocationProvider>>,
        on_change: impl FnMut(&geojson::FeatureCollection) + 'static,
    ) -> Self {
        let view = MapViewState::new(
            config.default_center,
            config.default_zoom,
            config.initial_base_layer,
        );
        let surface = MapSurface {
            view,
            renderer,
            config,
            geolocation,
            locating: false,
            last_location_error: None,
            locate_control: None,
            retired_controls: Rc::new(RefCell::new(Vec::new())),
        };
        Self {
            controls: Vec::new(),
            surface: Rc::new(RefCell::new(surface)),
            plots: Vec::new(),
            layer_bindings: HashMap::new(),
            next_plot_id: 0,
            on_change: Box::new(on_change),
        }
    }

    /// Seed the editor with previously saved plots. Saved plots are cleaned like
    /// drawn ones and non-areal features are skipped. The view centers on the plots
    /// if there are any and stays on the default center otherwise.
    pub fn initialize(&mut self, initial_features: Vec<geojson::Feature>) {
        self.plots.clear();
        self.layer_bindings.clear();
        let mut surface = self.surface.borrow_mut();
        surface.renderer.clear_editable_layers();
        for feature in initial_features {
            let feature = match normalize_drawn_feature(feature) {
                Ok(feature) => feature,
                Err(err) => {
                    log::warn!("Skipping saved plot: {}", err);
                    continue;
                }
            };
            let plot_id = PlotId(self.next_plot_id);
            self.next_plot_id += 1;
            let layer_id = surface.renderer.add_editable_layer(&feature);
            self.layer_bindings.insert(layer_id, plot_id);
            self.plots.push(Plot {
                id: plot_id,
                feature,
            });
        }
        log::info!("Loaded {} plots", self.plots.len());
        if let Some(center) = features_center(self.plots.iter().map(|plot| &plot.feature)) {
            surface.follow_features(center);
        }
        let collection = to_feature_collection(self.plots.iter().map(|plot| &plot.feature));
        surface.renderer.show_features(&collection);
    }

    /// Attach to a ready map: configure the toolkit, apply the view and register
    /// the editor's controls. The controls are removed again by [`Self::unmount`]
    /// or when the editor is dropped.
    pub fn mount(&mut self) {
        if self.is_mounted() {
            return;
        }
        let handle = self.handle();
        let mut surface = self.surface.borrow_mut();
        surface
            .renderer
            .configure_drawing(&DrawToolbarOptions::polygon_only());
        let view = surface.view.clone();
        surface.renderer.set_view(view.center, view.zoom);
        surface.apply_base_layer();

        let locate_control = surface.locate_control();
        let locate_id = surface
            .renderer
            .add_control(&locate_control, handle.clone());
        surface.locate_control = Some(locate_id);
        let mut registered = vec![locate_id];

        if surface.config.places_search {
            let places_control = MapControl::PlacesSearch {
                placeholder: surface.config.places_placeholder.clone(),
            };
            registered.push(surface.renderer.add_control(&places_control, handle));
        }
        let retired = surface.retired_controls.clone();
        drop(surface);

        log::debug!("Registered {} map controls", registered.len());
        self.controls = registered
            .into_iter()
            .map(|id| ControlRegistration {
                surface: Rc::downgrade(&self.surface),
                retired: retired.clone(),
                id,
            })
            .collect();
    }

    pub fn unmount(&mut self) {
        log::debug!("Removing {} map controls", self.controls.len());
        self.controls.clear();
    }

    pub fn is_mounted(&self) -> bool {
        !self.controls.is_empty()
    }

    pub fn handle(&self) -> EditorHandle {
        EditorHandle {
            surface: Rc::downgrade(&self.surface),
        }
    }

    pub fn handle_event(&mut self, event: DrawingEvent) {
        match event {
            DrawingEvent::Created { layer_id, feature } => {
                self.on_shape_created(layer_id, feature)
            }
            DrawingEvent::Edited(edited) => self.on_shape_edited(edited),
            DrawingEvent::Deleted(deleted) => self.on_shape_deleted(&deleted),
        }
    }

    /// Convert and apply an event in the toolkit's untyped form. Malformed events
    /// are logged and ignored; returns whether the event was applied.
    pub fn handle_raw_event(&mut self, raw: &serde_json::Value) -> bool {
        match DrawingEvent::try_from(raw) {
            Ok(event) => {
                self.handle_event(event);
                true
            }
            Err(err) => {
                log::warn!("Ignoring drawing event: {}", err);
                false
            }
        }
    }

    pub fn on_shape_created(&mut self, layer_id: LayerId, feature: geojson::Feature) {
        let feature = match normalize_drawn_feature(feature) {
            Ok(feature) => feature,
            Err(err) => {
                log::warn!("Ignoring shape drawn on layer {}: {}", layer_id, err);
                return;
            }
        };
        if let Some(plot_id) = self.layer_bindings.get(&layer_id) {
            log::warn!(
                "Ignoring shape drawn on layer {}, already bound to {}",
                layer_id,
                plot_id
            );
            return;
        }
        let plot_id = self.allocate_plot_id();
        log::debug!("Layer {} drawn as {}", layer_id, plot_id);
        self.layer_bindings.insert(layer_id, plot_id);
        self.plots.push(Plot {
            id: plot_id,
            feature,
        });
        self.reconcile();
    }

    /// Replace edited plots in place. Plots that were not part of the edit keep
    /// their features, and layers the editor does not know are skipped.
    pub fn on_shape_edited(&mut self, edited: Vec<(LayerId, geojson::Feature)>) {
        for (layer_id, feature) in edited {
            let Some(plot_id) = self.layer_bindings.get(&layer_id).copied() else {
                log::warn!("Edited layer {} is not a known plot, skipping", layer_id);
                continue;
            };
            let feature = match normalize_drawn_feature(feature) {
                Ok(feature) => feature,
                Err(err) => {
                    log::warn!("Ignoring edit of layer {}: {}", layer_id, err);
                    continue;
                }
            };
            if let Some(plot) = self.plots.iter_mut().find(|plot| plot.id == plot_id) {
                plot.feature = feature;
            }
        }
        self.reconcile();
    }

    /// Remove the plots bound to `deleted`. When the last plot goes the view stays
    /// where it is.
    pub fn on_shape_deleted(&mut self, deleted: &HashSet<LayerId>) {
        let removed: HashSet<PlotId> = deleted
            .iter()
            .filter_map(|layer_id| self.layer_bindings.remove(layer_id))
            .collect();
        if removed.len() != deleted.len() {
            log::warn!(
                "{} of {} deleted layers were not known plots",
                deleted.len() - removed.len(),
                deleted.len()
            );
        }
        self.plots.retain(|plot| !removed.contains(&plot.id));
        self.reconcile();
    }

    /// Drop every plot, e.g. after the host saved them.
    pub fn clear(&mut self) {
        self.plots.clear();
        self.layer_bindings.clear();
        self.surface.borrow_mut().renderer.clear_editable_layers();
        self.reconcile();
    }

    pub fn recenter_to_coordinate(&self, coord: LatLng) {
        self.surface.borrow_mut().recenter(coord);
    }

    pub fn cycle_base_layer(&self) -> BaseLayer {
        self.surface.borrow_mut().cycle_base_layer()
    }

    /// Ask the geolocation provider for a fix. The outcome lands in the view state
    /// or in [`Self::last_location_error`].
    pub fn request_current_location(&self) {
        request_location(&self.surface);
    }

    pub fn view(&self) -> MapViewState {
        self.surface.borrow().view.clone()
    }

    pub fn is_locating(&self) -> bool {
        self.surface.borrow().locating
    }

    pub fn last_location_error(&self) -> Option<LocationError> {
        self.surface.borrow().last_location_error
    }

    pub fn plots(&self) -> &[Plot] {
        &self.plots
    }

    pub fn feature_collection(&self) -> geojson::FeatureCollection {
        to_feature_collection(self.plots.iter().map(|plot| &plot.feature))
    }

    fn allocate_plot_id(&mut self) -> PlotId {
        let plot_id = PlotId(self.next_plot_id);
        self.next_plot_id += 1;
        plot_id
    }

    fn reconcile(&mut self) {
        let collection = self.feature_collection();
        {
            let mut surface = self.surface.borrow_mut();
            if let Some(center) = features_center(&collection.features) {
                surface.follow_features(center);
            }
            surface.renderer.show_features(&collection);
        }
        (self.on_change)(&collection);
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::RefCell,
        collections::{HashMap, HashSet},
        rc::Rc,
    };

    use approx::assert_abs_diff_eq;

    use crate::{
        boundary::{
            event::LayerId,
            location::{GeolocationProvider, LocationError, PositionCallback, PositionOptions},
            renderer::{
                CadastralOverlay, ControlId, DrawToolbarOptions, MapControl, MapRenderer,
            },
            view::{BaseLayer, LatLng, DEFAULT_CENTER},
        },
        geofile::feature::tests::square_feature,
    };

    use super::{BoundaryEditor, EditorError, EditorHandle, MapConfig};

    #[derive(Default)]
    struct RendererLog {
        views: Vec<(LatLng, f64)>,
        zoom: f64,
        base_layers: Vec<(BaseLayer, f64)>,
        drawing: Option<DrawToolbarOptions>,
        next_id: u64,
        editable_layers: Vec<LayerId>,
        shown: Vec<geojson::FeatureCollection>,
        controls: HashMap<ControlId, (MapControl, EditorHandle)>,
        removed_controls: Vec<ControlId>,
        on_show_features: Option<Box<dyn FnMut()>>,
        on_update_control: Option<Box<dyn FnMut()>>,
    }

    /// Runs a one-shot hook without holding the log borrowed.
    fn run_hook(
        log: &RefCell<RendererLog>,
        take: fn(&mut RendererLog) -> Option<Box<dyn FnMut()>>,
    ) {
        let hook = take(&mut log.borrow_mut());
        if let Some(mut hook) = hook {
            hook();
        }
    }

    struct FakeRenderer {
        log: Rc<RefCell<RendererLog>>,
    }

    impl MapRenderer for FakeRenderer {
        fn set_view(&mut self, center: LatLng, zoom: f64) {
            let mut log = self.log.borrow_mut();
            log.zoom = zoom;
            log.views.push((center, zoom));
        }

        fn zoom(&self) -> f64 {
            self.log.borrow().zoom
        }

        fn set_base_layer(
            &mut self,
            base_layer: BaseLayer,
            _overlay: &CadastralOverlay,
            opacity: f64,
        ) {
            self.log.borrow_mut().base_layers.push((base_layer, opacity));
        }

        fn configure_drawing(&mut self, options: &DrawToolbarOptions) {
            self.log.borrow_mut().drawing = Some(*options);
        }

        fn add_editable_layer(&mut self, _feature: &geojson::Feature) -> LayerId {
            let mut log = self.log.borrow_mut();
            log.next_id += 1;
            let layer_id = LayerId(1000 + log.next_id);
            log.editable_layers.push(layer_id);
            layer_id
        }

        fn clear_editable_layers(&mut self) {
            self.log.borrow_mut().editable_layers.clear();
        }

        fn show_features(&mut self, features: &geojson::FeatureCollection) {
            self.log.borrow_mut().shown.push(features.clone());
            run_hook(&self.log, |log| log.on_show_features.take());
        }

        fn add_control(&mut self, control: &MapControl, handle: EditorHandle) -> ControlId {
            let mut log = self.log.borrow_mut();
            log.next_id += 1;
            let id = ControlId(log.next_id);
            log.controls.insert(id, (control.clone(), handle));
            id
        }

        fn update_control(&mut self, id: ControlId, control: &MapControl) {
            if let Some(entry) = self.log.borrow_mut().controls.get_mut(&id) {
                entry.0 = control.clone();
            }
            run_hook(&self.log, |log| log.on_update_control.take());
        }

        fn remove_control(&mut self, id: ControlId) {
            let mut log = self.log.borrow_mut();
            log.controls.remove(&id);
            log.removed_controls.push(id);
        }
    }

    /// Holds callbacks until the test answers them.
    #[derive(Default)]
    struct PendingGeolocation {
        pending: RefCell<Vec<PositionCallback>>,
    }

    impl PendingGeolocation {
        fn answer(&self, result: Result<LatLng, LocationError>) {
            let callbacks: Vec<PositionCallback> = self.pending.borrow_mut().drain(..).collect();
            for callback in callbacks {
                callback(result);
            }
        }
    }

    impl GeolocationProvider for PendingGeolocation {
        fn get_current_position(&self, options: &PositionOptions, callback: PositionCallback) {
            assert!(options.high_accuracy);
            self.pending.borrow_mut().push(callback);
        }
    }

    struct Fixture {
        editor: BoundaryEditor,
        renderer: Rc<RefCell<RendererLog>>,
        emitted: Rc<RefCell<Vec<geojson::FeatureCollection>>>,
        geolocation: Rc<PendingGeolocation>,
    }

    fn fixture_with_config(config: MapConfig) -> Fixture {
        let renderer = Rc::new(RefCell::new(RendererLog {
            zoom: 16.0,
            ..Default::default()
        }));
        let emitted = Rc::new(RefCell::new(Vec::new()));
        let geolocation = Rc::new(PendingGeolocation::default());
        let sink = emitted.clone();
        let editor = BoundaryEditor::new(
            config,
            Box::new(FakeRenderer {
                log: renderer.clone(),
            }),
            Some(geolocation.clone() as Rc<dyn GeolocationProvider>),
            move |collection| sink.borrow_mut().push(collection.clone()),
        );
        Fixture {
            editor,
            renderer,
            emitted,
            geolocation,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_config(MapConfig::default())
    }

    impl Fixture {
        fn last_emitted(&self) -> geojson::FeatureCollection {
            self.emitted.borrow().last().cloned().unwrap()
        }

        fn control_handle(&self, matches: impl Fn(&MapControl) -> bool) -> EditorHandle {
            self.renderer
                .borrow()
                .controls
                .values()
                .find(|(control, _)| matches(control))
                .map(|(_, handle)| handle.clone())
                .unwrap()
        }
    }

    #[test]
    fn test_initialize_empty_keeps_default_center() {
        let mut fixture = fixture();
        fixture.editor.initialize(vec![]);
        assert_eq!(DEFAULT_CENTER, fixture.editor.view().center);
        assert!(fixture.editor.plots().is_empty());
        assert!(fixture.emitted.borrow().is_empty());
    }

    #[test]
    fn test_initialize_centers_on_feature() {
        let mut fixture = fixture();
        fixture.editor.initialize(vec![square_feature(76.5, 10.0, 0.02)]);
        let center = fixture.editor.view().center;
        assert_abs_diff_eq!(center.lat, 10.01, epsilon = 1e-9);
        assert_abs_diff_eq!(center.lng, 76.51, epsilon = 1e-9);
        assert_eq!(1, fixture.renderer.borrow().editable_layers.len());
    }

    #[test]
    fn test_initial_plots_can_be_deleted_by_layer() {
        let mut fixture = fixture();
        fixture.editor.initialize(vec![
            square_feature(76.5, 10.0, 0.01),
            square_feature(76.6, 10.1, 0.01),
        ]);
        let second_layer = fixture.renderer.borrow().editable_layers[1];
        fixture
            .editor
            .on_shape_deleted(&HashSet::from([second_layer]));
        assert_eq!(
            vec![square_feature(76.5, 10.0, 0.01)],
            fixture.last_emitted().features
        );
    }

    #[test]
    fn test_create_emits_full_collection() {
        let mut fixture = fixture();
        fixture.editor.initialize(vec![]);
        let polygon_a = square_feature(76.5, 10.0, 0.01);
        fixture.editor.on_shape_created(LayerId(1), polygon_a.clone());

        let emitted = serde_json::to_value(fixture.last_emitted()).unwrap();
        let expected = serde_json::json!({
            "type": "FeatureCollection",
            "features": [serde_json::to_value(&polygon_a).unwrap()],
        });
        assert_eq!(expected, emitted);
    }

    #[test]
    fn test_created_feature_round_trips_without_toolkit_id() {
        let mut fixture = fixture();
        let mut drawn = square_feature(76.5, 10.0, 0.01);
        drawn.id = Some(geojson::feature::Id::String("57".to_string()));
        fixture.editor.on_shape_created(LayerId(57), drawn.clone());

        drawn.id = None;
        assert_eq!(vec![drawn], fixture.last_emitted().features);
    }

    #[test]
    fn test_create_recenters_keeping_zoom() {
        let mut fixture = fixture();
        fixture
            .editor
            .on_shape_created(LayerId(1), square_feature(76.0, 10.0, 1.0));
        let (center, zoom) = *fixture.renderer.borrow().views.last().unwrap();
        assert_abs_diff_eq!(center.lat, 10.5, epsilon = 1e-9);
        assert_abs_diff_eq!(center.lng, 76.5, epsilon = 1e-9);
        assert_eq!(16.0, zoom);
    }

    #[test]
    fn test_delete_second_of_two() {
        let mut fixture = fixture();
        let first = square_feature(76.5, 10.0, 0.01);
        let second = square_feature(76.6, 10.1, 0.01);
        fixture.editor.on_shape_created(LayerId(1), first.clone());
        fixture.editor.on_shape_created(LayerId(2), second);
        fixture.editor.on_shape_deleted(&HashSet::from([LayerId(2)]));

        assert_eq!(vec![first], fixture.last_emitted().features);
        assert_eq!(3, fixture.emitted.borrow().len());
    }

    #[test]
    fn test_delete_last_plot_keeps_center() {
        let mut fixture = fixture();
        fixture
            .editor
            .on_shape_created(LayerId(1), square_feature(76.0, 10.0, 1.0));
        let center = fixture.editor.view().center;
        fixture.editor.on_shape_deleted(&HashSet::from([LayerId(1)]));

        assert!(fixture.last_emitted().features.is_empty());
        assert_eq!(center, fixture.editor.view().center);
    }

    #[test]
    fn test_edit_merges_by_layer_id() {
        let mut fixture = fixture();
        let first = square_feature(76.5, 10.0, 0.01);
        let second = square_feature(76.6, 10.1, 0.01);
        let moved = square_feature(76.7, 10.2, 0.01);
        fixture.editor.on_shape_created(LayerId(1), first.clone());
        fixture.editor.on_shape_created(LayerId(2), second);
        fixture.editor.on_shape_edited(vec![(LayerId(2), moved.clone())]);

        assert_eq!(vec![first, moved], fixture.last_emitted().features);
        let plot_ids: Vec<u64> = fixture.editor.plots().iter().map(|plot| plot.id.0).collect();
        assert_eq!(vec![0, 1], plot_ids);
    }

    #[test]
    fn test_edit_of_unknown_layer_is_ignored() {
        let mut fixture = fixture();
        let first = square_feature(76.5, 10.0, 0.01);
        fixture.editor.on_shape_created(LayerId(1), first.clone());
        fixture
            .editor
            .on_shape_edited(vec![(LayerId(99), square_feature(0.0, 0.0, 1.0))]);

        assert_eq!(vec![first], fixture.last_emitted().features);
    }

    #[test]
    fn test_malformed_raw_event_is_ignored() {
        let mut fixture = fixture();
        let applied = fixture
            .editor
            .handle_raw_event(&serde_json::json!({"type": "draw:created", "layer_id": "x"}));
        assert!(!applied);
        assert!(fixture.emitted.borrow().is_empty());
        assert!(fixture.editor.plots().is_empty());
    }

    #[test]
    fn test_raw_created_event_is_applied() {
        let mut fixture = fixture();
        let feature = square_feature(76.5, 10.0, 0.01);
        let raw = serde_json::json!({
            "type": "draw:created",
            "layer_id": 8,
            "geojson": serde_json::to_value(&feature).unwrap(),
        });
        assert!(fixture.editor.handle_raw_event(&raw));
        assert_eq!(vec![feature], fixture.last_emitted().features);
    }

    #[test]
    fn test_recenter_to_coordinate() {
        let fixture = fixture();
        fixture.editor.recenter_to_coordinate(LatLng::new(10.0, 76.5));

        let view = fixture.editor.view();
        assert_eq!(LatLng::new(10.0, 76.5), view.center);
        assert_eq!(18.0, view.zoom);
        assert_eq!(
            Some(&(LatLng::new(10.0, 76.5), 18.0)),
            fixture.renderer.borrow().views.last()
        );
    }

    #[test]
    fn test_cycle_base_layer_four_times() {
        let fixture = fixture();
        let start = fixture.editor.view().base_layer;
        assert_eq!(BaseLayer::Hybrid, start);
        assert_eq!(BaseLayer::Terrain, fixture.editor.cycle_base_layer());
        assert_eq!(BaseLayer::Road, fixture.editor.cycle_base_layer());
        assert_eq!(BaseLayer::Satellite, fixture.editor.cycle_base_layer());
        assert_eq!(start, fixture.editor.cycle_base_layer());
        let opacities: Vec<f64> = fixture
            .renderer
            .borrow()
            .base_layers
            .iter()
            .map(|(_, opacity)| *opacity)
            .collect();
        assert_eq!(vec![0.3, 0.6, 0.3, 0.3], opacities);
    }

    #[test]
    fn test_mount_registers_and_unmount_removes_controls() {
        let mut fixture = fixture();
        fixture.editor.mount();
        assert!(fixture.editor.is_mounted());
        assert_eq!(2, fixture.renderer.borrow().controls.len());
        assert_eq!(
            Some(DrawToolbarOptions::polygon_only()),
            fixture.renderer.borrow().drawing
        );

        fixture.editor.unmount();
        assert!(fixture.renderer.borrow().controls.is_empty());
        assert_eq!(2, fixture.renderer.borrow().removed_controls.len());
    }

    #[test]
    fn test_dropping_editor_removes_controls() {
        let mut fixture = fixture();
        fixture.editor.mount();
        let renderer = fixture.renderer.clone();
        drop(fixture);
        assert!(renderer.borrow().controls.is_empty());
        assert_eq!(2, renderer.borrow().removed_controls.len());
    }

    #[test]
    fn test_places_search_can_be_disabled() {
        let mut fixture = fixture_with_config(MapConfig {
            places_search: false,
            ..MapConfig::default()
        });
        fixture.editor.mount();
        let renderer = fixture.renderer.borrow();
        assert_eq!(1, renderer.controls.len());
        assert!(matches!(
            renderer.controls.values().next().unwrap().0,
            MapControl::LocateAndCycle { .. }
        ));
    }

    #[test]
    fn test_control_cycle_updates_title() {
        let mut fixture = fixture();
        fixture.editor.mount();
        let handle = fixture.control_handle(|control| {
            matches!(control, MapControl::LocateAndCycle { .. })
        });
        assert_eq!(Ok(BaseLayer::Terrain), handle.cycle_base_layer());

        let renderer = fixture.renderer.borrow();
        let title = renderer
            .controls
            .values()
            .find_map(|(control, _)| match control {
                MapControl::LocateAndCycle { title, .. } => Some(title.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!("Current: Terrain - Click to change", title);
    }

    #[test]
    fn test_places_selection_recenters() {
        let mut fixture = fixture();
        fixture.editor.mount();
        let handle =
            fixture.control_handle(|control| matches!(control, MapControl::PlacesSearch { .. }));
        handle.place_selected(LatLng::new(11.0, 77.0)).unwrap();
        assert_eq!(LatLng::new(11.0, 77.0), fixture.editor.view().center);
        assert_eq!(18.0, fixture.editor.view().zoom);
    }

    #[test]
    fn test_stale_control_handle() {
        let mut fixture = fixture();
        fixture.editor.mount();
        let handle = fixture.editor.handle();
        drop(fixture.editor);

        assert!(!handle.is_alive());
        assert_eq!(Err(EditorError::StaleControlReference), handle.cycle_base_layer());
        assert_eq!(
            Err(EditorError::StaleControlReference),
            handle.place_selected(LatLng::new(1.0, 2.0))
        );
        assert_eq!(
            Err(EditorError::StaleControlReference),
            handle.request_current_location()
        );
    }

    #[test]
    fn test_location_success_recenters() {
        let fixture = fixture();
        fixture.editor.request_current_location();
        assert!(fixture.editor.is_locating());

        fixture.geolocation.answer(Ok(LatLng::new(10.0, 76.5)));
        assert!(!fixture.editor.is_locating());
        assert_eq!(LatLng::new(10.0, 76.5), fixture.editor.view().center);
        assert_eq!(18.0, fixture.editor.view().zoom);
        assert_eq!(None, fixture.editor.last_location_error());
    }

    #[test]
    fn test_location_permission_denied() {
        let mut fixture = fixture();
        fixture
            .editor
            .on_shape_created(LayerId(1), square_feature(76.5, 10.0, 0.01));
        let plots_before = fixture.editor.plots().to_vec();
        let view_before = fixture.editor.view();

        fixture.editor.request_current_location();
        fixture
            .geolocation
            .answer(Err(LocationError::from_code(1)));

        assert_eq!(
            Some(LocationError::PermissionDenied),
            fixture.editor.last_location_error()
        );
        assert_eq!(plots_before, fixture.editor.plots());
        assert_eq!(view_before.center, fixture.editor.view().center);
        assert!(!fixture.editor.is_locating());
    }

    #[test]
    fn test_location_unavailable_without_provider() {
        let editor = BoundaryEditor::new(
            MapConfig::default(),
            Box::new(FakeRenderer {
                log: Rc::new(RefCell::new(RendererLog::default())),
            }),
            None,
            |_| {},
        );
        editor.request_current_location();
        assert_eq!(Some(LocationError::Unavailable), editor.last_location_error());
        assert!(!editor.is_locating());
    }

    #[test]
    fn test_location_after_unmount_is_ignored() {
        let fixture = fixture();
        fixture.editor.request_current_location();
        let geolocation = fixture.geolocation.clone();
        drop(fixture);
        geolocation.answer(Ok(LatLng::new(10.0, 76.5)));
    }

    #[test]
    fn test_clear_emits_empty_collection() {
        let mut fixture = fixture();
        fixture
            .editor
            .on_shape_created(LayerId(1), square_feature(76.5, 10.0, 0.01));
        fixture.editor.clear();
        assert!(fixture.last_emitted().features.is_empty());
        assert!(fixture.editor.plots().is_empty());
    }

    #[test]
    fn test_initialize_cleans_saved_plots() {
        let mut fixture = fixture();
        let mut saved = square_feature(76.5, 10.0, 0.01);
        saved.id = Some(geojson::feature::Id::Number(57.into()));
        let marker = geojson::Feature::from(geojson::Geometry::new(geojson::Value::Point(
            vec![76.5, 10.0],
        )));
        fixture.editor.initialize(vec![saved, marker]);
        assert_eq!(1, fixture.editor.plots().len());
        assert_eq!(1, fixture.renderer.borrow().editable_layers.len());

        fixture
            .editor
            .on_shape_created(LayerId(900), square_feature(76.6, 10.0, 0.01));
        let emitted = fixture.last_emitted();
        assert_eq!(2, emitted.features.len());
        assert!(emitted.features.iter().all(|feature| feature.id.is_none()));
    }

    #[test]
    fn test_create_on_bound_layer_is_ignored() {
        let mut fixture = fixture();
        fixture.editor.initialize(vec![square_feature(76.5, 10.0, 0.01)]);
        let saved_layer = fixture.renderer.borrow().editable_layers[0];

        fixture
            .editor
            .on_shape_created(saved_layer, square_feature(76.6, 10.0, 0.01));
        assert_eq!(1, fixture.editor.plots().len());
        assert!(fixture.emitted.borrow().is_empty());

        fixture
            .editor
            .on_shape_deleted(&HashSet::from([saved_layer]));
        assert!(fixture.editor.plots().is_empty());
        assert!(fixture.last_emitted().features.is_empty());
    }

    #[test]
    fn test_reentrant_handle_calls_are_busy() {
        let mut fixture = fixture();
        fixture.editor.mount();
        let handle = fixture.editor.handle();
        let results = Rc::new(RefCell::new(Vec::new()));
        let sink = results.clone();
        fixture.renderer.borrow_mut().on_show_features = Some(Box::new(move || {
            let mut sink = sink.borrow_mut();
            sink.push(handle.cycle_base_layer().map(|_| ()));
            sink.push(handle.request_current_location());
            sink.push(handle.place_selected(LatLng::new(1.0, 2.0)));
        }));

        fixture
            .editor
            .on_shape_created(LayerId(1), square_feature(76.5, 10.0, 0.01));
        assert_eq!(vec![Err(EditorError::Busy); 3], *results.borrow());
        assert_eq!(BaseLayer::Hybrid, fixture.editor.view().base_layer);
        assert!(!fixture.editor.is_locating());
        assert_eq!(1, fixture.emitted.borrow().len());
    }

    #[test]
    fn test_editor_dropped_during_control_action_removes_controls() {
        let Fixture {
            mut editor,
            renderer,
            ..
        } = fixture();
        editor.mount();
        let handle = editor.handle();
        let slot = Rc::new(RefCell::new(Some(editor)));
        let owner = slot.clone();
        renderer.borrow_mut().on_update_control = Some(Box::new(move || {
            owner.borrow_mut().take();
        }));

        assert_eq!(Ok(BaseLayer::Terrain), handle.cycle_base_layer());
        assert!(slot.borrow().is_none());
        assert!(!handle.is_alive());
        assert!(renderer.borrow().controls.is_empty());
        assert_eq!(2, renderer.borrow().removed_controls.len());
    }

    mod properties {
        use std::collections::HashSet;

        use proptest::prelude::*;

        use crate::{boundary::event::LayerId, geofile::feature::tests::square_feature};

        use super::fixture;

        #[derive(Debug, Clone)]
        enum Op {
            Create(u8),
            Edit(Vec<u8>, u8),
            Delete(Vec<u8>),
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0u8..50).prop_map(Op::Create),
                (prop::collection::vec(0u8..12, 0..4), 0u8..50)
                    .prop_map(|(layers, offset)| Op::Edit(layers, offset)),
                prop::collection::vec(0u8..12, 0..4).prop_map(Op::Delete),
            ]
        }

        fn shape(offset: u8) -> geojson::Feature {
            square_feature(76.0 + offset as f64 * 0.01, 10.0, 0.005)
        }

        proptest! {
            /// The emitted collection always equals the merge-by-id model.
            #[test]
            fn prop_emitted_matches_model(ops in prop::collection::vec(op_strategy(), 1..30)) {
                let mut fixture = fixture();
                let mut model: Vec<(LayerId, geojson::Feature)> = Vec::new();
                let mut next_layer = 0u64;

                for op in ops {
                    match op {
                        Op::Create(offset) => {
                            let layer_id = LayerId(next_layer);
                            next_layer += 1;
                            fixture.editor.on_shape_created(layer_id, shape(offset));
                            model.push((layer_id, shape(offset)));
                        }
                        Op::Edit(layers, offset) => {
                            let mut seen = HashSet::new();
                            let edited: Vec<(LayerId, geojson::Feature)> = layers
                                .into_iter()
                                .map(|layer| LayerId(layer as u64))
                                .filter(|layer_id| seen.insert(*layer_id))
                                .map(|layer_id| (layer_id, shape(offset)))
                                .collect();
                            for (layer_id, feature) in &edited {
                                for entry in model.iter_mut().filter(|(id, _)| id == layer_id) {
                                    entry.1 = feature.clone();
                                }
                            }
                            fixture.editor.on_shape_edited(edited);
                        }
                        Op::Delete(layers) => {
                            let deleted: HashSet<LayerId> =
                                layers.into_iter().map(|layer| LayerId(layer as u64)).collect();
                            model.retain(|(id, _)| !deleted.contains(id));
                            fixture.editor.on_shape_deleted(&deleted);
                        }
                    }
                    let expected: Vec<geojson::Feature> =
                        model.iter().map(|(_, feature)| feature.clone()).collect();
                    prop_assert_eq!(expected, fixture.last_emitted().features);
                }
            }
        }
    }
}
