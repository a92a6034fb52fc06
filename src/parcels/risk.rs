use geo::{EuclideanDistance, Intersects};
use rayon::prelude::*;
use rstar::{RTree, RTreeObject, AABB};

use crate::{
    crs::crs_utils::{CrsKind, Projected},
    error::{CrsError, Error},
    geofile::feature::{FeatureCollection, PolygonFeature},
};

use super::index::compute_envelope;

/// Risk attributes derived for a parcel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskAnnotation {
    /// The parcel lies within the buffer distance of at least one wetland.
    pub wetland_adjacent: bool,
    pub total_score: u32,
}

impl RiskAnnotation {
    pub fn from_wetland_adjacency(wetland_adjacent: bool) -> Self {
        Self {
            wetland_adjacent,
            total_score: u32::from(wetland_adjacent),
        }
    }
}

/// A wetland whose envelope is grown by the buffer distance, so that an envelope query
/// with a parcel's bounding box returns every wetland the parcel might be adjacent to.
struct BufferedWetland {
    envelope: AABB<[f64; 2]>,
    geometry: geo::MultiPolygon,
}

impl RTreeObject for BufferedWetland {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn within_distance(a: &geo::MultiPolygon, b: &geo::MultiPolygon, distance: f64) -> bool {
    a.0.iter().any(|p| {
        b.0.iter()
            .any(|q| p.intersects(q) || p.euclidean_distance(q) <= distance)
    })
}

/// Mark every parcel that intersects a wetland buffered by `buffer_distance`.
///
/// A parcel intersects the buffered wetland exactly when its distance to the wetland is
/// at most `buffer_distance`, so no buffer polygon is built. Both collections must be in
/// the same projected CRS and `buffer_distance` is in its linear unit.
///
/// Returns a new collection with the same features in the same order. Existing
/// annotations are replaced, so annotating twice gives the same result as once.
pub fn annotate(
    parcels: &FeatureCollection<Projected>,
    wetlands: &FeatureCollection<Projected>,
    buffer_distance: f64,
) -> Result<FeatureCollection<Projected>, Error> {
    if !buffer_distance.is_finite() || buffer_distance < 0.0 {
        return Err(Error::InvalidBufferDistance(buffer_distance));
    }
    if parcels.crs() != wetlands.crs() {
        return Err(CrsError::Mismatch {
            expected: parcels.crs().to_string(),
            found: wetlands.crs().to_string(),
        }
        .into());
    }

    let wetland_tree = RTree::bulk_load(
        wetlands
            .iter()
            .map(|wetland| {
                let envelope = compute_envelope(wetland.geometry());
                let (lower, upper) = (envelope.lower(), envelope.upper());
                BufferedWetland {
                    envelope: AABB::from_corners(
                        [lower[0] - buffer_distance, lower[1] - buffer_distance],
                        [upper[0] + buffer_distance, upper[1] + buffer_distance],
                    ),
                    geometry: wetland.geometry().clone(),
                }
            })
            .collect(),
    );

    let annotated: Vec<PolygonFeature> = parcels
        .features()
        .par_iter()
        .map(|parcel| {
            let adjacent = wetland_tree
                .locate_in_envelope_intersecting(&compute_envelope(parcel.geometry()))
                .any(|wetland| {
                    within_distance(parcel.geometry(), &wetland.geometry, buffer_distance)
                });
            parcel.with_risk(RiskAnnotation::from_wetland_adjacency(adjacent))
        })
        .collect();

    let summary = ScoreSummary::of_features(&annotated, 0);
    log::info!(
        "Annotated {} parcels against {} wetlands with a {} buffer: {} wetland adjacent",
        annotated.len(),
        wetlands.len(),
        buffer_distance,
        summary.above_threshold
    );
    Ok(FeatureCollection::from_validated(parcels.crs(), annotated))
}

/// Score statistics over the annotated features of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreSummary {
    pub annotated: usize,
    pub min_score: Option<u32>,
    pub max_score: Option<u32>,
    /// Annotated features whose score is strictly above the threshold.
    pub above_threshold: usize,
}

impl ScoreSummary {
    pub fn of<K: CrsKind>(collection: &FeatureCollection<K>, threshold: u32) -> Self {
        Self::of_features(collection.features(), threshold)
    }

    fn of_features(features: &[PolygonFeature], threshold: u32) -> Self {
        let scores: Vec<u32> = features
            .iter()
            .filter_map(|feature| feature.risk().map(|risk| risk.total_score))
            .collect();
        Self {
            annotated: scores.len(),
            min_score: scores.iter().copied().min(),
            max_score: scores.iter().copied().max(),
            above_threshold: scores.iter().filter(|score| **score > threshold).count(),
        }
    }
}

/// Annotated features scoring strictly above `threshold`, with their collection index.
pub fn high_risk_parcels<K: CrsKind>(
    collection: &FeatureCollection<K>,
    threshold: u32,
) -> Vec<(usize, &PolygonFeature)> {
    collection
        .iter()
        .enumerate()
        .filter(|(_, feature)| {
            feature
                .risk()
                .map_or(false, |risk| risk.total_score > threshold)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use geo::polygon;
    use rstest::rstest;

    use crate::{
        crs::crs_utils::{Crs, Projected},
        error::{CrsError, Error},
        geofile::feature::{Feature, FeatureCollection},
    };

    use super::{annotate, high_risk_parcels, RiskAnnotation, ScoreSummary};

    const CRS: Crs<Projected> = Crs::projected(26985);

    fn square(center_x: f64, center_y: f64, size: f64) -> Feature {
        let half = size / 2.0;
        Feature::from(geo::Geometry::Polygon(polygon![
            (x: center_x - half, y: center_y - half),
            (x: center_x + half, y: center_y - half),
            (x: center_x + half, y: center_y + half),
            (x: center_x - half, y: center_y + half),
        ]))
    }

    /// Three 10 m parcels on the corners of a triangle with 100 m sides.
    fn triangle_parcels() -> FeatureCollection<Projected> {
        let height = 100.0 * 3f64.sqrt() / 2.0;
        FeatureCollection::new(
            CRS,
            vec![
                square(0.0, 0.0, 10.0),
                square(100.0, 0.0, 10.0),
                square(50.0, height, 10.0),
            ],
        )
        .unwrap()
    }

    /// A wetland 45 m west of the first parcel's western edge.
    fn wetlands() -> FeatureCollection<Projected> {
        FeatureCollection::new(CRS, vec![square(-60.0, 0.0, 20.0)]).unwrap()
    }

    fn annotations(collection: &FeatureCollection<Projected>) -> Vec<RiskAnnotation> {
        collection
            .iter()
            .map(|feature| *feature.risk().unwrap())
            .collect()
    }

    #[test]
    fn test_buffer_marks_exactly_one_parcel() {
        let annotated = annotate(&triangle_parcels(), &wetlands(), 50.0).unwrap();

        assert_eq!(
            annotations(&annotated),
            vec![
                RiskAnnotation {
                    wetland_adjacent: true,
                    total_score: 1
                },
                RiskAnnotation {
                    wetland_adjacent: false,
                    total_score: 0
                },
                RiskAnnotation {
                    wetland_adjacent: false,
                    total_score: 0
                },
            ]
        );
        // Geometry and attributes pass through unchanged.
        for (original, scored) in triangle_parcels().iter().zip(annotated.iter()) {
            assert_eq!(original.geometry(), scored.geometry());
            assert_eq!(original.attributes(), scored.attributes());
        }
    }

    #[rstest]
    #[case(44.9, false)]
    #[case(45.0, true)]
    #[case(200.0, true)]
    fn test_buffer_distance_threshold(#[case] buffer_distance: f64, #[case] adjacent: bool) {
        let annotated = annotate(&triangle_parcels(), &wetlands(), buffer_distance).unwrap();

        assert_eq!(annotated.get(0).unwrap().risk().unwrap().wetland_adjacent, adjacent);
    }

    #[test]
    fn test_overlapping_wetland_with_zero_buffer() {
        let wetlands = FeatureCollection::new(CRS, vec![square(100.0, 0.0, 4.0)]).unwrap();

        let annotated = annotate(&triangle_parcels(), &wetlands, 0.0).unwrap();

        let adjacent: Vec<bool> = annotations(&annotated)
            .iter()
            .map(|annotation| annotation.wetland_adjacent)
            .collect();
        assert_eq!(adjacent, vec![false, true, false]);
    }

    #[test]
    fn test_annotate_is_idempotent() {
        let parcels = triangle_parcels();

        let once = annotate(&parcels, &wetlands(), 50.0).unwrap();
        let again = annotate(&parcels, &wetlands(), 50.0).unwrap();
        let twice = annotate(&once, &wetlands(), 50.0).unwrap();

        assert_eq!(once, again);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_no_wetlands() {
        let annotated = annotate(&triangle_parcels(), &FeatureCollection::empty(CRS), 100.0).unwrap();

        assert!(annotations(&annotated)
            .iter()
            .all(|annotation| !annotation.wetland_adjacent && annotation.total_score == 0));
    }

    #[rstest]
    #[case(-1.0)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn test_invalid_buffer_distance(#[case] buffer_distance: f64) {
        assert!(matches!(
            annotate(&triangle_parcels(), &wetlands(), buffer_distance),
            Err(Error::InvalidBufferDistance(_))
        ));
    }

    #[test]
    fn test_wetlands_in_other_crs() {
        let utm_wetlands = FeatureCollection::new(Crs::projected(32618), vec![square(0.0, 0.0, 10.0)]).unwrap();

        assert!(matches!(
            annotate(&triangle_parcels(), &utm_wetlands, 50.0),
            Err(Error::Crs(CrsError::Mismatch { .. }))
        ));
    }

    #[test]
    fn test_score_summary_and_high_risk() {
        let annotated = annotate(&triangle_parcels(), &wetlands(), 50.0).unwrap();

        assert_eq!(
            ScoreSummary::of(&annotated, 0),
            ScoreSummary {
                annotated: 3,
                min_score: Some(0),
                max_score: Some(1),
                above_threshold: 1,
            }
        );
        let high_risk = high_risk_parcels(&annotated, 0);
        assert_eq!(high_risk.len(), 1);
        assert_eq!(high_risk[0].0, 0);
        assert!(high_risk_parcels(&annotated, 1).is_empty());
    }

    #[test]
    fn test_score_summary_of_unannotated_collection() {
        assert_eq!(
            ScoreSummary::of(&triangle_parcels(), 0),
            ScoreSummary {
                annotated: 0,
                min_score: None,
                max_score: None,
                above_threshold: 0,
            }
        );
    }
}
