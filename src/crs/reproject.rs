use geo::CoordsIter;
use proj::Transform;

use crate::{
    error::CrsError,
    geofile::feature::{FeatureCollection, PolygonFeature, QueryPoint},
};

use super::crs_utils::{Crs, CrsKind};

/// Transforms geometries from `from` to `to`.
///
/// The PROJ pipeline is created once in `new` and reused for every call. Reprojection
/// never modifies its input; it returns a new value tagged with the target CRS.
pub struct Reprojector<F: CrsKind, T: CrsKind> {
    // None when both ends name the same EPSG code.
    projection: Option<proj::Proj>,
    from: Crs<F>,
    to: Crs<T>,
}

impl<F: CrsKind, T: CrsKind> Reprojector<F, T> {
    pub fn new(from: Crs<F>, to: Crs<T>) -> Result<Self, CrsError> {
        from.verify()?;
        to.verify()?;
        if from.code() == to.code() {
            return Ok(Self {
                projection: None,
                from,
                to,
            });
        }

        let projection = proj::Proj::new_known_crs(&from.authority(), &to.authority(), None)
            .map_err(|err| CrsError::NoTransform {
                from: from.to_string(),
                to: to.to_string(),
                reason: err.to_string(),
            })?;
        log::debug!("Created projection from {} to {}", from, to);
        Ok(Self {
            projection: Some(projection),
            from,
            to,
        })
    }

    pub fn from_crs(&self) -> Crs<F> {
        self.from
    }

    pub fn to_crs(&self) -> Crs<T> {
        self.to
    }

    /// Reproject a point or a feature collection.
    pub fn reproject<G: Reproject<F, T>>(&self, value: &G) -> Result<G::Output, CrsError> {
        value.reproject_with(self)
    }

    fn ensure_source<K: CrsKind>(&self, found: Crs<K>) -> Result<(), CrsError> {
        if found.code() != self.from.code() {
            return Err(CrsError::Mismatch {
                expected: self.from.to_string(),
                found: found.to_string(),
            });
        }
        Ok(())
    }

    /// Reproject a single feature. `index` is the feature's position in its collection and
    /// only used to report failures.
    pub(crate) fn reproject_feature(
        &self,
        feature: &PolygonFeature,
        index: usize,
    ) -> Result<PolygonFeature, CrsError> {
        let projection = match &self.projection {
            Some(projection) => projection,
            None => return Ok(feature.clone()),
        };
        let fail = |reason: String| CrsError::FeatureTransform {
            from: self.from.to_string(),
            to: self.to.to_string(),
            index,
            reason,
        };
        let geometry = feature
            .geometry()
            .transformed(projection)
            .map_err(|err| fail(err.to_string()))?;
        if !geometry
            .coords_iter()
            .all(|coord| coord.x.is_finite() && coord.y.is_finite())
        {
            return Err(fail("transform produced non-finite coordinates".to_string()));
        }
        Ok(feature.with_geometry(geometry))
    }
}

/// Values that can be moved from CRS `F` to CRS `T`.
pub trait Reproject<F: CrsKind, T: CrsKind> {
    type Output;

    fn reproject_with(&self, reprojector: &Reprojector<F, T>) -> Result<Self::Output, CrsError>;
}

impl<F: CrsKind, T: CrsKind> Reproject<F, T> for QueryPoint<F> {
    type Output = QueryPoint<T>;

    fn reproject_with(&self, reprojector: &Reprojector<F, T>) -> Result<QueryPoint<T>, CrsError> {
        reprojector.ensure_source(self.crs())?;
        let point = self.point();
        let projection = match &reprojector.projection {
            Some(projection) => projection,
            None => return Ok(QueryPoint::new(reprojector.to, point)),
        };
        let out_of_range = || CrsError::OutOfRange {
            crs: reprojector.to.to_string(),
            x: point.x(),
            y: point.y(),
        };
        let (x, y) = projection
            .convert((point.x(), point.y()))
            .map_err(|_| out_of_range())?;
        if !x.is_finite() || !y.is_finite() {
            return Err(out_of_range());
        }
        Ok(QueryPoint::new(reprojector.to, geo::Point::new(x, y)))
    }
}

impl<F: CrsKind, T: CrsKind> Reproject<F, T> for FeatureCollection<F> {
    type Output = FeatureCollection<T>;

    fn reproject_with(
        &self,
        reprojector: &Reprojector<F, T>,
    ) -> Result<FeatureCollection<T>, CrsError> {
        reprojector.ensure_source(self.crs())?;
        let features = self
            .iter()
            .enumerate()
            .map(|(index, feature)| reprojector.reproject_feature(feature, index))
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!(
            "Reprojected {} features from {} to {}",
            features.len(),
            reprojector.from,
            reprojector.to
        );
        Ok(FeatureCollection::from_validated(reprojector.to, features))
    }
}
