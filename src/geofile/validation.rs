use geo::{
    algorithm::line_intersection::{line_intersection, LineIntersection},
    Area, CoordsIter,
};
use rstar::{RTree, RTreeObject, AABB};

use crate::error::GeometryErrorKind;

/// Check that a multipolygon can safely enter distance and containment queries.
///
/// Rings are numbered across the whole multipolygon: each polygon contributes its
/// exterior followed by its interiors. Relations between rings (holes outside their
/// shell, overlapping members) are not checked.
pub fn validate_multi_polygon(multi_polygon: &geo::MultiPolygon) -> Result<(), GeometryErrorKind> {
    if multi_polygon.0.is_empty() {
        return Err(GeometryErrorKind::Null);
    }
    if !multi_polygon
        .coords_iter()
        .all(|coord| coord.x.is_finite() && coord.y.is_finite())
    {
        return Err(GeometryErrorKind::NonFinite);
    }

    let mut ring_number = 0;
    for polygon in &multi_polygon.0 {
        for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
            validate_ring(ring, ring_number)?;
            ring_number += 1;
        }
        if polygon.unsigned_area() == 0.0 {
            return Err(GeometryErrorKind::ZeroArea);
        }
    }
    Ok(())
}

/// A ring segment keyed by its position along the ring.
struct IndexedSegment {
    index: usize,
    line: geo::Line,
}

impl RTreeObject for IndexedSegment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.line.start.x, self.line.start.y],
            [self.line.end.x, self.line.end.y],
        )
    }
}

fn validate_ring(ring: &geo::LineString, ring_number: usize) -> Result<(), GeometryErrorKind> {
    // Repeated consecutive vertices are harmless but produce zero-length segments.
    let segments: Vec<IndexedSegment> = ring
        .lines()
        .filter(|line| line.start != line.end)
        .enumerate()
        .map(|(index, line)| IndexedSegment { index, line })
        .collect();
    if segments.len() < 3 {
        return Err(GeometryErrorKind::TooFewCoordinates {
            ring: ring_number,
            count: segments.len(),
        });
    }

    let last = segments.len() - 1;
    let tree = RTree::bulk_load(segments);
    for segment in tree.iter() {
        let i = segment.index;
        // Only pairs with touching envelopes can intersect.
        for other in tree.locate_in_envelope_intersecting(&segment.envelope()) {
            let j = other.index;
            if j <= i {
                continue;
            }
            let adjacent = j == i + 1 || (i == 0 && j == last);
            match line_intersection(segment.line, other.line) {
                None => {}
                // Neighbours share exactly their common vertex.
                Some(LineIntersection::SinglePoint { .. }) if adjacent => {}
                Some(_) => {
                    return Err(GeometryErrorKind::SelfIntersection { ring: ring_number });
                }
            }
        }
    }
    Ok(())
}
