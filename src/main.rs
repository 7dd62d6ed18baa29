use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
    rc::Rc,
    time::Duration,
};

use anyhow::{anyhow, Context};
use clap::Parser;
use krishisat::{
    api::{
        crop::radar,
        farms::{ApiConfig, FarmApiClient},
        http::ReqwestTransport,
        session::Session,
    },
    boundary::{
        editor::{BoundaryEditor, MapConfig},
        headless::HeadlessRenderer,
        location::{FixedGeolocation, GeolocationProvider, UnsupportedGeolocation},
        view::LatLng,
    },
    farm::form::{FarmDetails, FarmForm},
    geofile::geojson::{read_features_from_geojson, write_features_to_geojson},
};
use serde::Deserialize;

const TOKEN_ENV_VAR: &str = "KRISHISAT_TOKEN";

/// Replay a recorded farm boundary drawing session and optionally save the farm.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input config file.
    #[arg(short, long)]
    config_filepath: String,
}

#[derive(Deserialize, Debug)]
struct FarmConfig {
    farmer_id: i64,
    /// Existing farm to edit instead of creating a new one.
    #[serde(default)]
    farm_id: Option<u64>,
    #[serde(default)]
    details: Option<FarmDetails>,
    /// Run the analysis and notify the farmer once the farm is saved.
    #[serde(default)]
    analyze: bool,
}

#[derive(Deserialize, Debug)]
struct Config {
    data_dir: PathBuf,
    #[serde(default)]
    map: MapConfig,
    initial_geojson_path: Option<PathBuf>,
    drawing_events_path: PathBuf,
    fixed_location: Option<LatLng>,
    #[serde(default)]
    locate_on_start: bool,
    farm: Option<FarmConfig>,
    api: Option<ApiConfig>,
}

fn read_drawing_events(filepath: &Path) -> anyhow::Result<Vec<serde_json::Value>> {
    let contents = read_to_string(filepath)
        .with_context(|| format!("Could not read drawing events from {:?}", filepath))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Drawing events in {:?} are not a JSON array", filepath))
}

fn try_main() -> anyhow::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    env_logger::init();

    let args = Args::try_parse()?;
    if !Path::new(&args.config_filepath).exists() {
        return Err(anyhow!("Config file {} not found", &args.config_filepath));
    }
    let config_contents = read_to_string(args.config_filepath)?;
    let config: Config = serde_yaml::from_str(&config_contents)?;
    let session = std::env::var(TOKEN_ENV_VAR).ok().and_then(Session::new);

    let client = match &config.api {
        Some(api) => {
            let transport = ReqwestTransport::new(Duration::from_secs(api.timeout_secs))?;
            Some(FarmApiClient::new(api, transport))
        }
        None => None,
    };

    let mut form = config
        .farm
        .as_ref()
        .map(|farm_config| FarmForm::new(farm_config.farmer_id));
    let mut initial_features = match &config.initial_geojson_path {
        Some(filepath) => {
            log::info!("Reading initial plots from {:?}", filepath);
            read_features_from_geojson(filepath)?
        }
        None => Vec::new(),
    };
    if let (Some(form), Some(farm_config)) = (form.as_mut(), &config.farm) {
        if let (Some(farm_id), Some(client)) = (farm_config.farm_id, &client) {
            let session = session.as_ref().ok_or_else(|| {
                anyhow!("{} is needed to edit farm {}", TOKEN_ENV_VAR, farm_id)
            })?;
            let farmer_id = farm_config.farmer_id;
            let farm = client
                .list_farms(session, farmer_id)?
                .into_iter()
                .find(|farm| farm.id == farm_id)
                .ok_or_else(|| anyhow!("Farmer {} has no farm {}", farmer_id, farm_id))?;
            let saved_features = form.edit(&farm);
            if config.initial_geojson_path.is_none() {
                initial_features = saved_features;
            }
        }
        if let Some(details) = &farm_config.details {
            form.details = details.clone();
        }
    }

    let mut forward = form.as_ref().map(|form| form.listener());
    let geolocation: Rc<dyn GeolocationProvider> = match config.fixed_location {
        Some(position) => Rc::new(FixedGeolocation { position }),
        None => Rc::new(UnsupportedGeolocation),
    };
    let mut editor = BoundaryEditor::new(
        config.map.clone(),
        Box::new(HeadlessRenderer::new(config.map.default_zoom)),
        Some(geolocation),
        move |collection| {
            log::info!("Boundary now has {} plots", collection.features.len());
            if let Some(forward) = forward.as_mut() {
                forward(collection);
            }
        },
    );
    editor.initialize(initial_features);
    if let Some(form) = form.as_ref() {
        form.sync_plots(&editor.feature_collection());
    }
    editor.mount();

    if config.locate_on_start {
        editor.request_current_location();
        match editor.last_location_error() {
            Some(err) => log::warn!("{}", err),
            None => {
                let center = editor.view().center;
                log::info!("Located at {}, {}", center.lat, center.lng);
            }
        }
    }

    let events = read_drawing_events(&config.drawing_events_path)?;
    let applied = events
        .iter()
        .filter(|event| editor.handle_raw_event(event))
        .count();
    log::info!("Applied {} of {} drawing events", applied, events.len());

    let boundary_filepath = config.data_dir.join("farm_boundary.geojson");
    log::info!("Writing farm boundary to {:?}", boundary_filepath);
    write_features_to_geojson(&editor.feature_collection(), &boundary_filepath)?;

    let view = editor.view();
    log::info!(
        "Final view at {}, {} zoom {} on {}",
        view.center.lat,
        view.center.lng,
        view.zoom,
        view.base_layer.name()
    );

    if let (Some(form), Some(client), Some(farm_config)) = (form.as_mut(), &client, &config.farm)
    {
        let farm = form.submit(client, session.as_ref())?;
        editor.clear();
        log::info!("Farm {} saved", farm.id);

        if farm_config.analyze {
            if let Some(session) = session.as_ref() {
                let report = client.analyze_farm(session, farm_config.farmer_id, farm.id)?;
                log::info!("Analysis report: {}", report);
                client.send_notifications(session, farm_config.farmer_id, farm.id)?;
                let records = client.crop_performance(session, farm_config.farmer_id, farm.id)?;
                match radar(&records) {
                    Some(indices) => {
                        for (index, value) in indices.iter() {
                            log::info!("{}: {:.1}", index.label(), value);
                        }
                    }
                    None => log::info!("No crop performance data for farm {} yet", farm.id),
                }
            }
        }
    }
    editor.unmount();
    Ok(())
}

fn main() {
    if let Err(e) = try_main() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1)
    }
}
