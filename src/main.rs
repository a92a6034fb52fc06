extern crate log;
use std::{fs, iter, path::Path, path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use parcel_risk::{
    config::Config,
    crs::{
        crs_utils::{Crs, Geographic},
        reproject::Reprojector,
    },
    geofile::{
        feature::{FeatureCollection, QueryPoint},
        geojson::{read_features_from_geojson, write_collection_to_geojson, write_features_to_geojson},
    },
    parcels::{
        index::ParcelIndex,
        resolver::{MatchKind, NearestParcelResolver, Resolution},
        risk::{annotate, ScoreSummary},
    },
};

/// Score parcels by wetland adjacency and look up the parcel of a geocoded address.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input config file.
    #[arg(short, long)]
    config_filepath: PathBuf,

    /// Longitude of a geocoded address, in the geographic CRS of the config.
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lon: Option<f64>,

    /// Latitude of a geocoded address, in the geographic CRS of the config.
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    lat: Option<f64>,
}

fn load_collection(
    filepath: &Path,
    crs: Crs<Geographic>,
) -> anyhow::Result<FeatureCollection<Geographic>> {
    let features = read_features_from_geojson(filepath)?;
    FeatureCollection::new(crs, features)
        .with_context(|| format!("Validating features of {:?}", filepath))
}

fn try_main() -> anyhow::Result<()> {
    let args = Args::try_parse()?;
    let config = Config::load(&args.config_filepath)?;
    let geographic_crs = config.geographic_crs();

    let parcels = load_collection(&config.parcels_geofile_path, geographic_crs)?;
    let wetlands = load_collection(&config.wetlands_geofile_path, geographic_crs)?;
    log::info!(
        "Read {} parcels and {} wetlands",
        parcels.len(),
        wetlands.len()
    );

    let projected_crs = config.projected_crs.resolve(&parcels)?;
    log::info!("Projecting parcels and wetlands to {}", projected_crs);
    let to_projected = Reprojector::new(geographic_crs, projected_crs)?;
    let projected_parcels = to_projected.reproject(&parcels)?;
    let projected_wetlands = to_projected.reproject(&wetlands)?;

    let annotated = annotate(
        &projected_parcels,
        &projected_wetlands,
        config.wetland_buffer_distance,
    )?;
    let summary = ScoreSummary::of(&annotated, config.risk_threshold);
    log::info!(
        "Scores range from {:?} to {:?}, {} parcels score above {}",
        summary.min_score,
        summary.max_score,
        summary.above_threshold,
        config.risk_threshold
    );

    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("Creating output directory {:?}", config.output_dir))?;
    let to_geographic = Reprojector::new(projected_crs, geographic_crs)?;
    write_collection_to_geojson(
        &to_geographic.reproject(&annotated)?,
        &config.output_dir.join("annotated_parcels.geojson"),
    )?;

    if let (Some(lon), Some(lat)) = (args.lon, args.lat) {
        let resolver =
            NearestParcelResolver::with_index(Arc::new(ParcelIndex::build(annotated)), geographic_crs)?;
        let point = QueryPoint::new(geographic_crs, geo::Point::new(lon, lat));
        match resolver.resolve(&point)? {
            Resolution::Found(parcel) => {
                match parcel.match_kind {
                    MatchKind::Contained => log::info!("({}, {}) lies in parcel {}", lon, lat, parcel.index),
                    MatchKind::Nearest { distance } => log::info!(
                        "Nearest parcel to ({}, {}) is parcel {}, {:.1} away",
                        lon,
                        lat,
                        parcel.index,
                        distance
                    ),
                }
                if let Some(risk) = parcel.feature.risk() {
                    log::info!(
                        "Total risk score {}, wetland adjacent: {}",
                        risk.total_score,
                        risk.wetland_adjacent
                    );
                }
                write_features_to_geojson(
                    iter::once(&parcel.feature),
                    &config.output_dir.join("resolved_parcel.geojson"),
                )?;
            }
            Resolution::NotFound => log::warn!("No parcel found for ({}, {})", lon, lat),
        }
    }
    Ok(())
}

fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    env_logger::init();
    if let Err(e) = try_main() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1)
    }
}
