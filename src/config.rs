use std::{fs::read_to_string, path::Path, path::PathBuf};

use anyhow::{anyhow, Context};
use serde::Deserialize;

use crate::{
    crs::crs_utils::{utm_crs_for_lon_lat, Crs, EpsgCode, Geographic, Projected},
    geofile::feature::FeatureCollection,
};

/// How to pick the projected CRS that distances and buffers are computed in.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProjectedCrsConfig {
    /// A fixed EPSG code, e.g. 26985 for NAD83 / Maryland in metres.
    Epsg { code: EpsgCode },
    /// The WGS84 UTM zone of the first parcel.
    Utm,
}

impl ProjectedCrsConfig {
    pub fn resolve(&self, parcels: &FeatureCollection<Geographic>) -> anyhow::Result<Crs<Projected>> {
        match self {
            ProjectedCrsConfig::Epsg { code } => {
                let crs = Crs::projected(*code);
                crs.verify()?;
                Ok(crs)
            }
            ProjectedCrsConfig::Utm => {
                let coord = parcels
                    .iter()
                    .flat_map(|parcel| parcel.geometry().0.iter())
                    .flat_map(|polygon| polygon.exterior().coords())
                    .next()
                    .ok_or_else(|| anyhow!("Could not determine UTM zone because there are no parcels"))?;
                Ok(utm_crs_for_lon_lat(coord.x, coord.y)?)
            }
        }
    }
}

fn default_geographic_epsg() -> EpsgCode {
    4326
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub parcels_geofile_path: PathBuf,
    pub wetlands_geofile_path: PathBuf,
    /// CRS of both input files.
    #[serde(default = "default_geographic_epsg")]
    pub geographic_epsg: EpsgCode,
    pub projected_crs: ProjectedCrsConfig,
    /// In the linear unit of the projected CRS.
    pub wetland_buffer_distance: f64,
    /// Parcels scoring strictly above this are reported as high risk.
    #[serde(default)]
    pub risk_threshold: u32,
    pub output_dir: PathBuf,
}

impl Config {
    pub fn load(filepath: &Path) -> anyhow::Result<Self> {
        if !filepath.exists() {
            return Err(anyhow!("Config file {:?} not found", filepath));
        }
        let config_contents = read_to_string(filepath)?;
        Self::from_yaml(&config_contents).with_context(|| format!("Parsing config file {:?}", filepath))
    }

    pub fn from_yaml(contents: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(contents)?;
        if !config.wetland_buffer_distance.is_finite() || config.wetland_buffer_distance < 0.0 {
            return Err(anyhow!(
                "wetland_buffer_distance must be a non-negative distance, got {}",
                config.wetland_buffer_distance
            ));
        }
        Ok(config)
    }

    pub fn geographic_crs(&self) -> Crs<Geographic> {
        Crs::geographic(self.geographic_epsg)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use geo::polygon;
    use rstest::rstest;

    use crate::{
        crs::crs_utils::Crs,
        error::CrsError,
        geofile::feature::{Feature, FeatureCollection},
    };

    use super::{Config, ProjectedCrsConfig};

    #[test]
    fn test_full_config() {
        let config = Config::from_yaml(
            r#"
parcels_geofile_path: data/parcels.geojson
wetlands_geofile_path: data/wetlands.geojson
geographic_epsg: 4269
projected_crs:
  kind: epsg
  code: 26985
wetland_buffer_distance: 100.0
risk_threshold: 0
output_dir: out
"#,
        )
        .unwrap();

        assert_eq!(
            config,
            Config {
                parcels_geofile_path: PathBuf::from("data/parcels.geojson"),
                wetlands_geofile_path: PathBuf::from("data/wetlands.geojson"),
                geographic_epsg: 4269,
                projected_crs: ProjectedCrsConfig::Epsg { code: 26985 },
                wetland_buffer_distance: 100.0,
                risk_threshold: 0,
                output_dir: PathBuf::from("out"),
            }
        );
        assert_eq!(config.geographic_crs(), Crs::geographic(4269));
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_yaml(
            r#"
parcels_geofile_path: parcels.geojson
wetlands_geofile_path: wetlands.geojson
projected_crs:
  kind: utm
wetland_buffer_distance: 50
output_dir: out
"#,
        )
        .unwrap();

        assert_eq!(config.geographic_crs(), Crs::wgs84());
        assert_eq!(config.projected_crs, ProjectedCrsConfig::Utm);
        assert_eq!(config.risk_threshold, 0);
    }

    #[rstest]
    // The buffer distance is required, there is no regional default.
    #[case("projected_crs:\n  kind: utm\n")]
    #[case("projected_crs:\n  kind: utm\nwetland_buffer_distance: -5\n")]
    #[case("wetland_buffer_distance: 100\n")]
    fn test_invalid_config(#[case] tail: &str) {
        let contents = format!(
            "parcels_geofile_path: p.geojson\nwetlands_geofile_path: w.geojson\noutput_dir: out\n{}",
            tail
        );
        assert!(Config::from_yaml(&contents).is_err());
    }

    #[test]
    fn test_utm_from_first_parcel() {
        let parcels = FeatureCollection::new(
            Crs::wgs84(),
            vec![Feature::from(geo::Geometry::Polygon(polygon![
                (x: -76.61, y: 39.05),
                (x: -76.60, y: 39.05),
                (x: -76.60, y: 39.06),
            ]))],
        )
        .unwrap();

        assert_eq!(
            ProjectedCrsConfig::Utm.resolve(&parcels).unwrap(),
            Crs::projected(32618)
        );
        assert!(ProjectedCrsConfig::Utm
            .resolve(&FeatureCollection::empty(Crs::wgs84()))
            .is_err());
    }

    #[test]
    fn test_epsg_must_be_projected() {
        let parcels = FeatureCollection::empty(Crs::wgs84());

        assert_eq!(
            ProjectedCrsConfig::Epsg { code: 26985 }.resolve(&parcels).unwrap(),
            Crs::projected(26985)
        );
        let error = ProjectedCrsConfig::Epsg { code: 4326 }
            .resolve(&parcels)
            .unwrap_err();
        assert!(matches!(
            error.downcast_ref::<CrsError>(),
            Some(CrsError::WrongKind { .. })
        ));
    }
}
