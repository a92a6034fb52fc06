use std::sync::Arc;

use crate::{
    crs::{
        crs_utils::{Crs, Geographic, Projected},
        reproject::Reprojector,
    },
    error::Error,
    geofile::feature::{FeatureCollection, PolygonFeature, QueryPoint},
};

use super::index::{ParcelIndex, ParcelMatch};

/// How the resolved parcel relates to the query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchKind {
    /// The point lies strictly inside the parcel.
    Contained,
    /// The point lies outside every parcel; `distance` is in the projected CRS unit.
    Nearest { distance: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParcel {
    /// Position of the parcel in the resolved collection.
    pub index: usize,
    pub match_kind: MatchKind,
    /// The parcel with its geometry back in the geographic CRS of the query.
    pub feature: PolygonFeature,
    pub crs: Crs<Geographic>,
}

/// Outcome of a lookup. `NotFound` is an ordinary answer, not a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(ResolvedParcel),
    NotFound,
}

impl Resolution {
    pub fn found(&self) -> Option<&ResolvedParcel> {
        match self {
            Resolution::Found(parcel) => Some(parcel),
            Resolution::NotFound => None,
        }
    }
}

/// Finds the parcel for a geocoded point.
///
/// Owns the transforms between the geographic CRS of the data and the projected CRS the
/// queries run in, and a parcel index built once per dataset. `rebuild` swaps in a new
/// index; readers holding the previous `Arc` keep a consistent snapshot.
pub struct NearestParcelResolver {
    to_projected: Reprojector<Geographic, Projected>,
    to_geographic: Reprojector<Projected, Geographic>,
    index: Arc<ParcelIndex>,
}

impl NearestParcelResolver {
    /// Project `parcels` into `projected_crs` and index them.
    pub fn new(
        parcels: &FeatureCollection<Geographic>,
        projected_crs: Crs<Projected>,
    ) -> Result<Self, Error> {
        let to_projected = Reprojector::new(parcels.crs(), projected_crs)?;
        let projected_parcels = to_projected.reproject(parcels)?;
        Ok(Self {
            to_geographic: Reprojector::new(projected_crs, parcels.crs())?,
            to_projected,
            index: Arc::new(ParcelIndex::build(projected_parcels)),
        })
    }

    /// Serve queries from an existing index. Results are returned in `geographic_crs`.
    pub fn with_index(index: Arc<ParcelIndex>, geographic_crs: Crs<Geographic>) -> Result<Self, Error> {
        Ok(Self {
            to_projected: Reprojector::new(geographic_crs, index.crs())?,
            to_geographic: Reprojector::new(index.crs(), geographic_crs)?,
            index,
        })
    }

    pub fn index(&self) -> Arc<ParcelIndex> {
        Arc::clone(&self.index)
    }

    pub fn geographic_crs(&self) -> Crs<Geographic> {
        self.to_projected.from_crs()
    }

    pub fn projected_crs(&self) -> Crs<Projected> {
        self.to_projected.to_crs()
    }

    /// Replace the index with one built from a new dataset version.
    pub fn rebuild(&mut self, parcels: &FeatureCollection<Geographic>) -> Result<(), Error> {
        *self = Self::new(parcels, self.projected_crs())?;
        Ok(())
    }

    /// Resolve `point` to the parcel containing it or, failing that, the nearest parcel.
    pub fn resolve(&self, point: &QueryPoint<Geographic>) -> Result<Resolution, Error> {
        let projected_point = self.to_projected.reproject(point)?;
        if self.index.is_empty() {
            log::debug!("No parcels loaded, nothing to resolve {:?} to", point.point());
            return Ok(Resolution::NotFound);
        }

        let (found, match_kind) = match self.index.contains(&projected_point)? {
            Some(found) => (found, MatchKind::Contained),
            None => {
                let found = self.index.nearest(&projected_point)?;
                let distance = found.distance;
                (found, MatchKind::Nearest { distance })
            }
        };
        log::debug!(
            "Resolved {:?} to parcel {} ({:?})",
            point.point(),
            found.index,
            match_kind
        );
        self.back_project(found, match_kind)
    }

    fn back_project(&self, found: ParcelMatch<'_>, match_kind: MatchKind) -> Result<Resolution, Error> {
        let feature = self.to_geographic.reproject_feature(found.feature, found.index)?;
        Ok(Resolution::Found(ResolvedParcel {
            index: found.index,
            match_kind,
            feature,
            crs: self.to_geographic.to_crs(),
        }))
    }
}

/// One-shot lookup: index `parcels` in `projected_crs` and resolve a single point.
///
/// Callers answering more than one query should keep a `NearestParcelResolver` instead.
pub fn resolve(
    point: &QueryPoint<Geographic>,
    parcels: &FeatureCollection<Geographic>,
    projected_crs: Crs<Projected>,
) -> Result<Resolution, Error> {
    NearestParcelResolver::new(parcels, projected_crs)?.resolve(point)
}
