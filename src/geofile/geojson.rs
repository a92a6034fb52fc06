use std::{fs, io, path::Path};

use anyhow::{anyhow, Context};

use crate::crs::crs_utils::CrsKind;

use super::feature::{Attributes, Feature, FeatureCollection, PolygonFeature};

/// Read raw features from a GeoJSON file.
///
/// Accepts a FeatureCollection, a single Feature or a bare Geometry. Features without a
/// geometry are kept with `geometry: None` and rejected later by `FeatureCollection::new`.
pub fn read_features_from_geojson(filepath: &Path) -> anyhow::Result<Vec<Feature>> {
    let contents = fs::read_to_string(filepath)
        .with_context(|| format!("Reading GeoJSON file {:?}", filepath))?;
    let geojson: geojson::GeoJson = contents
        .parse()
        .with_context(|| format!("Parsing GeoJSON file {:?}", filepath))?;
    let features = match geojson {
        geojson::GeoJson::FeatureCollection(collection) => collection.features,
        geojson::GeoJson::Feature(feature) => vec![feature],
        geojson::GeoJson::Geometry(geometry) => vec![geojson::Feature::from(geometry)],
    };
    let features = features
        .into_iter()
        .enumerate()
        .map(|(index, feature)| feature_from_geojson(feature, index))
        .collect::<anyhow::Result<Vec<Feature>>>()?;
    log::info!("Read {} features from {:?}", features.len(), filepath);
    Ok(features)
}

fn feature_from_geojson(feature: geojson::Feature, index: usize) -> anyhow::Result<Feature> {
    let geometry = match feature.geometry {
        Some(geometry) => Some(
            geo::Geometry::<f64>::try_from(geometry.value)
                .map_err(|err| anyhow!("Could not convert geometry of feature {}, {}", index, err))?,
        ),
        None => None,
    };
    Ok(Feature {
        geometry,
        attributes: feature.properties.unwrap_or_else(Attributes::new),
    })
}

fn feature_to_geojson(feature: &PolygonFeature) -> geojson::Feature {
    let mut properties = feature.attributes().clone();
    if let Some(risk) = feature.risk() {
        properties.insert(
            "wetland_adjacent".to_string(),
            geojson::JsonValue::from(risk.wetland_adjacent),
        );
        properties.insert(
            "total_score".to_string(),
            geojson::JsonValue::from(risk.total_score),
        );
    }
    geojson::Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(
            feature.geometry(),
        ))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Write features as a GeoJSON FeatureCollection. Annotated features carry
/// `wetland_adjacent` and `total_score` next to their own attributes.
pub fn write_features_to_geojson<'a>(
    features: impl IntoIterator<Item = &'a PolygonFeature>,
    output_filepath: &Path,
) -> io::Result<()> {
    let feature_collection: geojson::FeatureCollection =
        features.into_iter().map(feature_to_geojson).collect();
    let geojson_contents = geojson::GeoJson::from(feature_collection);
    fs::write(output_filepath, geojson_contents.to_string())
}

pub fn write_collection_to_geojson<K: CrsKind>(
    collection: &FeatureCollection<K>,
    output_filepath: &Path,
) -> io::Result<()> {
    log::info!(
        "Writing {} features in {} to {:?}",
        collection.len(),
        collection.crs(),
        output_filepath
    );
    write_features_to_geojson(collection, output_filepath)
}
