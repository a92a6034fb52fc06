use crate::{
    crs::crs_utils::{Crs, CrsKind, Geographic},
    error::{GeometryError, GeometryErrorKind},
    parcels::risk::RiskAnnotation,
};

use super::validation::validate_multi_polygon;

/// Attribute map of a feature, e.g. parcel id, owner and area. Passed through untouched.
pub type Attributes = geojson::JsonObject;

/// A feature as delivered by a data source, before validation.
#[derive(Debug, Clone, Default)]
pub struct Feature {
    pub geometry: Option<geo::Geometry>,
    pub attributes: Attributes,
}

impl From<geo::Geometry> for Feature {
    fn from(value: geo::Geometry) -> Self {
        Self {
            geometry: Some(value),
            attributes: Attributes::new(),
        }
    }
}

/// One validated parcel or wetland unit.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonFeature {
    geometry: geo::MultiPolygon,
    attributes: Attributes,
    risk: Option<RiskAnnotation>,
}

impl PolygonFeature {
    pub fn geometry(&self) -> &geo::MultiPolygon {
        &self.geometry
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Present once the feature went through `annotate`.
    pub fn risk(&self) -> Option<&RiskAnnotation> {
        self.risk.as_ref()
    }

    pub(crate) fn with_geometry(&self, geometry: geo::MultiPolygon) -> Self {
        Self {
            geometry,
            attributes: self.attributes.clone(),
            risk: self.risk,
        }
    }

    pub(crate) fn with_risk(&self, risk: RiskAnnotation) -> Self {
        Self {
            geometry: self.geometry.clone(),
            attributes: self.attributes.clone(),
            risk: Some(risk),
        }
    }

    fn try_from_feature(feature: Feature, index: usize) -> Result<Self, GeometryError> {
        let fail = |kind| GeometryError { index, kind };
        let geometry = match feature.geometry {
            Some(geo::Geometry::Polygon(polygon)) => geo::MultiPolygon::new(vec![polygon]),
            Some(geo::Geometry::MultiPolygon(multi_polygon)) => multi_polygon,
            Some(other) => {
                return Err(fail(GeometryErrorKind::Unsupported(
                    geometry_type_name(&other).to_string(),
                )))
            }
            None => return Err(fail(GeometryErrorKind::Null)),
        };
        validate_multi_polygon(&geometry).map_err(fail)?;
        Ok(Self {
            geometry,
            attributes: feature.attributes,
            risk: None,
        })
    }
}

fn geometry_type_name(geometry: &geo::Geometry) -> &'static str {
    match geometry {
        geo::Geometry::Point(_) => "Point",
        geo::Geometry::Line(_) => "Line",
        geo::Geometry::LineString(_) => "LineString",
        geo::Geometry::Polygon(_) => "Polygon",
        geo::Geometry::MultiPoint(_) => "MultiPoint",
        geo::Geometry::MultiLineString(_) => "MultiLineString",
        geo::Geometry::MultiPolygon(_) => "MultiPolygon",
        geo::Geometry::GeometryCollection(_) => "GeometryCollection",
        geo::Geometry::Rect(_) => "Rect",
        geo::Geometry::Triangle(_) => "Triangle",
    }
}

/// An ordered set of polygon features sharing one CRS.
///
/// Collections are values: reprojection and scoring build new collections and never
/// touch the geometry of an existing one.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection<K: CrsKind> {
    crs: Crs<K>,
    features: Vec<PolygonFeature>,
}

impl<K: CrsKind> FeatureCollection<K> {
    /// Validate raw features and collect them in input order.
    ///
    /// Null, non-polygonal, non-finite, degenerate and self-intersecting geometries are
    /// rejected with the index of the offending feature.
    pub fn new(crs: Crs<K>, features: Vec<Feature>) -> Result<Self, GeometryError> {
        let features = features
            .into_iter()
            .enumerate()
            .map(|(index, feature)| PolygonFeature::try_from_feature(feature, index))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { crs, features })
    }

    pub fn empty(crs: Crs<K>) -> Self {
        Self {
            crs,
            features: Vec::new(),
        }
    }

    pub(crate) fn from_validated(crs: Crs<K>, features: Vec<PolygonFeature>) -> Self {
        Self { crs, features }
    }

    pub fn crs(&self) -> Crs<K> {
        self.crs
    }

    pub fn features(&self) -> &[PolygonFeature] {
        &self.features
    }

    pub fn get(&self, index: usize) -> Option<&PolygonFeature> {
        self.features.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PolygonFeature> {
        self.features.iter()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl<'a, K: CrsKind> IntoIterator for &'a FeatureCollection<K> {
    type Item = &'a PolygonFeature;
    type IntoIter = std::slice::Iter<'a, PolygonFeature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

/// A single coordinate tagged with its CRS, e.g. the output of a geocoder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryPoint<K: CrsKind> {
    crs: Crs<K>,
    point: geo::Point,
}

impl<K: CrsKind> QueryPoint<K> {
    pub fn new(crs: Crs<K>, point: geo::Point) -> Self {
        Self { crs, point }
    }

    pub fn crs(&self) -> Crs<K> {
        self.crs
    }

    pub fn point(&self) -> geo::Point {
        self.point
    }
}

impl QueryPoint<Geographic> {
    /// WGS84 point from longitude and latitude in degrees.
    pub fn wgs84(lon: f64, lat: f64) -> Self {
        Self::new(Crs::wgs84(), geo::Point::new(lon, lat))
    }
}
