use anyhow::{anyhow, Context};
use std::{fs, path::Path};

pub fn write_features_to_geojson(
    feature_collection: &geojson::FeatureCollection,
    output_filepath: &Path,
) -> anyhow::Result<()> {
    let geojson_contents = geojson::GeoJson::from(feature_collection.clone());
    fs::write(output_filepath, geojson_contents.to_string())
        .with_context(|| format!("Writing GeoJSON to {:?}", output_filepath))
}

/// Read the features of a GeoJSON file. A bare Feature is accepted as a
/// collection of one; a bare Geometry is rejected.
pub fn read_features_from_geojson(filepath: &Path) -> anyhow::Result<Vec<geojson::Feature>> {
    let contents =
        fs::read_to_string(filepath).with_context(|| format!("Reading {:?}", filepath))?;
    let geojson: geojson::GeoJson = contents
        .parse()
        .with_context(|| format!("Parsing GeoJSON from {:?}", filepath))?;
    match geojson {
        geojson::GeoJson::FeatureCollection(collection) => Ok(collection.features),
        geojson::GeoJson::Feature(feature) => Ok(vec![feature]),
        geojson::GeoJson::Geometry(_) => Err(anyhow!(
            "{:?} holds a bare geometry, expected features",
            filepath
        )),
    }
}
