use geo::{Contains, EuclideanDistance};
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::{
    crs::crs_utils::{Crs, Projected},
    error::{CrsError, Error},
    geofile::feature::{FeatureCollection, PolygonFeature, QueryPoint},
};

/// A parcel polygon stored in the R-tree, keyed by its position in the collection.
struct IndexedParcel {
    index: usize,
    envelope: AABB<[f64; 2]>,
    geometry: geo::MultiPolygon,
}

impl RTreeObject for IndexedParcel {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl PointDistance for IndexedParcel {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let distance = distance_to_multi_polygon(&self.geometry, &geo::Point::new(point[0], point[1]));
        distance * distance
    }

    fn contains_point(&self, point: &[f64; 2]) -> bool {
        self.geometry.contains(&geo::Point::new(point[0], point[1]))
    }
}

/// Euclidean distance from a point to the area of a multipolygon; zero inside or on it.
pub(crate) fn distance_to_multi_polygon(multi_polygon: &geo::MultiPolygon, point: &geo::Point) -> f64 {
    if multi_polygon.contains(point) {
        return 0.0;
    }
    multi_polygon
        .0
        .iter()
        .flat_map(|polygon| std::iter::once(polygon.exterior()).chain(polygon.interiors()))
        .map(|ring| point.euclidean_distance(ring))
        .fold(f64::INFINITY, f64::min)
}

/// Bounding box of the exterior rings, which enclose the interiors.
pub(crate) fn compute_envelope(multi_polygon: &geo::MultiPolygon) -> AABB<[f64; 2]> {
    let mut min = [f64::INFINITY, f64::INFINITY];
    let mut max = [f64::NEG_INFINITY, f64::NEG_INFINITY];
    for coord in multi_polygon.0.iter().flat_map(|polygon| polygon.exterior().coords()) {
        min = [min[0].min(coord.x), min[1].min(coord.y)];
        max = [max[0].max(coord.x), max[1].max(coord.y)];
    }
    AABB::from_corners(min, max)
}

/// A parcel returned by an index query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParcelMatch<'a> {
    /// Position of the parcel in the collection the index was built from.
    pub index: usize,
    pub feature: &'a PolygonFeature,
    /// Distance from the query point, in the unit of the index CRS. Zero when contained.
    pub distance: f64,
}

/// Read-only spatial index over parcel polygons in one projected CRS.
///
/// Built once per dataset version. A new dataset means a new index; there is no
/// in-place update, so an index behind an `Arc` can serve concurrent readers.
pub struct ParcelIndex {
    rtree: RTree<IndexedParcel>,
    parcels: FeatureCollection<Projected>,
}

impl ParcelIndex {
    /// Bulk-load an R-tree over the parcels.
    pub fn build(parcels: FeatureCollection<Projected>) -> Self {
        let entries = parcels
            .iter()
            .enumerate()
            .map(|(index, feature)| IndexedParcel {
                index,
                envelope: compute_envelope(feature.geometry()),
                geometry: feature.geometry().clone(),
            })
            .collect();
        let rtree = RTree::bulk_load(entries);
        log::info!(
            "Built parcel index with {} parcels in {}",
            rtree.size(),
            parcels.crs()
        );
        Self { rtree, parcels }
    }

    pub fn crs(&self) -> Crs<Projected> {
        self.parcels.crs()
    }

    pub fn parcels(&self) -> &FeatureCollection<Projected> {
        &self.parcels
    }

    pub fn len(&self) -> usize {
        self.parcels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parcels.is_empty()
    }

    fn check_query(&self, point: &QueryPoint<Projected>) -> Result<[f64; 2], Error> {
        if point.crs() != self.crs() {
            return Err(CrsError::Mismatch {
                expected: self.crs().to_string(),
                found: point.crs().to_string(),
            }
            .into());
        }
        if self.is_empty() {
            return Err(Error::EmptyIndex);
        }
        Ok([point.point().x(), point.point().y()])
    }

    fn to_match(&self, index: usize, distance: f64) -> ParcelMatch<'_> {
        ParcelMatch {
            index,
            feature: &self.parcels.features()[index],
            distance,
        }
    }

    /// The parcel closest to `point` by Euclidean distance.
    ///
    /// Equidistant parcels resolve to the one with the lowest collection index.
    pub fn nearest(&self, point: &QueryPoint<Projected>) -> Result<ParcelMatch<'_>, Error> {
        let query = self.check_query(point)?;
        let mut candidates = self.rtree.nearest_neighbor_iter_with_distance_2(&query);
        let (first, best_distance_2) = candidates.next().ok_or(Error::EmptyIndex)?;
        // The iterator yields in ascending distance, so ties follow the first hit.
        let index = candidates
            .take_while(|(_, distance_2)| *distance_2 <= best_distance_2)
            .map(|(parcel, _)| parcel.index)
            .fold(first.index, usize::min);
        Ok(self.to_match(index, best_distance_2.sqrt()))
    }

    /// The parcel whose polygon strictly contains `point`, if any.
    ///
    /// Overlapping parcels resolve to the one with the lowest collection index.
    pub fn contains(&self, point: &QueryPoint<Projected>) -> Result<Option<ParcelMatch<'_>>, Error> {
        let query = self.check_query(point)?;
        let index = self
            .rtree
            .locate_all_at_point(&query)
            .map(|parcel| parcel.index)
            .min();
        Ok(index.map(|index| self.to_match(index, 0.0)))
    }
}
