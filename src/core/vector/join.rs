//! Fine/coarse spatial join with grouped totals and double-count diagnostics.
//!
//! The fine layer (e.g. wards) carries a magnitude such as population, the coarse
//! layer (e.g. counties) carries the group identifier. A fine feature touching
//! several coarse features is joined to each of them, so its magnitude is counted
//! once per group. That over-count is kept on purpose and reported through
//! [`OverlapReport`].

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use geo::{Area, BoundingRect};
use geo_types::Rect;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::params::AggregationParams;
use crate::core::vector::feature::{AttributeValue, Feature, FeatureCollection};
use crate::error::{Error, Result};

/// Add area and density attributes to every fine feature.
///
/// `area` is the polygon area in the layer CRS divided by the configured unit
/// scale, so the layer must already be in a projected CRS. `density` is
/// `magnitude / area`; a zero-area polygon yields an infinite (or NaN) density,
/// and a Null magnitude yields a Null density.
///
/// Returns a new collection; `fine` is left untouched.
pub fn derive_attributes(
    fine: &FeatureCollection,
    params: &AggregationParams,
) -> Result<FeatureCollection> {
    let scale = params.area_unit.scale();
    let mut derived = Vec::with_capacity(fine.len());
    for (i, feature) in fine.iter().enumerate() {
        let area = feature.polygons(i)?.unsigned_area() / scale;
        let density = match feature.numeric_property(i, &params.measure_key)? {
            Some(magnitude) => AttributeValue::Float(magnitude / area),
            None => AttributeValue::Null,
        };
        let mut out = feature.clone();
        out.set_property(params.area_key.clone(), AttributeValue::Float(area));
        out.set_property(params.density_key.clone(), density);
        derived.push(out);
    }
    debug!(
        "Derived {} and {} for {} features ({})",
        params.area_key,
        params.density_key,
        derived.len(),
        params.area_unit
    );
    Ok(FeatureCollection { features: derived })
}

/// One intersecting (coarse, fine) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinRecord {
    /// Position of the coarse feature in its layer
    pub coarse_index: usize,
    /// Position of the fine feature in its layer
    pub fine_index: usize,
    /// Both parents' attributes; names present in both layers appear as
    /// `<name>_left` (coarse) and `<name>_right` (fine)
    pub attributes: HashMap<String, AttributeValue>,
}

impl JoinRecord {
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }
}

fn merge_attributes(coarse: &Feature, fine: &Feature) -> HashMap<String, AttributeValue> {
    let mut merged = HashMap::with_capacity(coarse.properties.len() + fine.properties.len());
    for (key, value) in &coarse.properties {
        if fine.properties.contains_key(key) {
            merged.insert(format!("{key}_left"), value.clone());
        } else {
            merged.insert(key.clone(), value.clone());
        }
    }
    for (key, value) in &fine.properties {
        if coarse.properties.contains_key(key) {
            merged.insert(format!("{key}_right"), value.clone());
        } else {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

fn rects_overlap(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    a.min().x <= b.max().x && a.max().x >= b.min().x && a.min().y <= b.max().y && a.max().y >= b.min().y
}

/// Inner spatial join: one record per (coarse, fine) pair whose geometries
/// intersect, boundary contact included.
///
/// Records come out coarse-major: all matches of coarse feature 0 first, fine
/// features in layer order within each. A fine feature spanning N coarse
/// features appears N times with its full attributes each time.
pub fn spatial_join(coarse: &FeatureCollection, fine: &FeatureCollection) -> Result<Vec<JoinRecord>> {
    let coarse_boxes = bounding_rects(coarse)?;
    let fine_boxes = bounding_rects(fine)?;

    let mut records = Vec::new();
    for (ci, (coarse_feature, coarse_box)) in coarse.iter().zip(&coarse_boxes).enumerate() {
        for (fi, (fine_feature, fine_box)) in fine.iter().zip(&fine_boxes).enumerate() {
            let candidate = match (coarse_box, fine_box) {
                (Some(a), Some(b)) => rects_overlap(a, b),
                _ => false,
            };
            if candidate && coarse_feature.intersects(fine_feature) {
                records.push(JoinRecord {
                    coarse_index: ci,
                    fine_index: fi,
                    attributes: merge_attributes(coarse_feature, fine_feature),
                });
            }
        }
    }

    info!(
        "Spatial join: {} coarse x {} fine features -> {} records",
        coarse.len(),
        fine.len(),
        records.len()
    );
    Ok(records)
}

fn bounding_rects(layer: &FeatureCollection) -> Result<Vec<Option<Rect<f64>>>> {
    layer
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let polygons = f.polygons(i)?;
            Ok(polygons.bounding_rect())
        })
        .collect()
}

fn record_measure(record: &JoinRecord, key: &str) -> Result<Option<f64>> {
    match record.get(key) {
        None => Err(Error::MissingAttribute {
            feature: record.fine_index,
            key: key.to_string(),
        }),
        Some(AttributeValue::Null) => Ok(None),
        Some(value) => value.as_f64().map(Some).ok_or_else(|| Error::NonNumericAttribute {
            feature: record.fine_index,
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Sum `measure_key` per distinct `group_key` value across join records.
///
/// Groups are keyed by the display form of the group attribute. Records whose
/// group is Null belong to no group and are left out of the totals. Null
/// measures contribute nothing; a missing group or measure attribute is an error.
pub fn aggregate(
    records: &[JoinRecord],
    group_key: &str,
    measure_key: &str,
) -> Result<BTreeMap<String, f64>> {
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for record in records {
        let group = record.get(group_key).ok_or_else(|| Error::MissingAttribute {
            feature: record.coarse_index,
            key: group_key.to_string(),
        })?;
        if group.is_null() {
            continue;
        }
        let total = totals.entry(group.to_string()).or_insert(0.0);
        if let Some(v) = record_measure(record, measure_key)? {
            *total += v;
        }
    }
    Ok(totals)
}

/// The fine feature with the largest magnitude.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaxFeature {
    pub index: usize,
    pub magnitude: f64,
    pub label: Option<String>,
}

/// Fine-layer totals versus joined totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlapReport {
    /// Measure summed straight over the fine layer
    pub fine_total: f64,
    /// Measure summed over every join record
    pub joined_total: f64,
    pub fine_count: usize,
    pub record_count: usize,
    /// `(record_count - fine_count) / 2`; assumes no feature spans more than two groups
    pub multiply_counted: f64,
    /// `(joined_total - fine_total) / 2`, same assumption
    pub excess_magnitude: f64,
    /// Fine features matched by more than one record
    pub spanning_features: usize,
    /// Σ magnitude × (matches − 1) over fine features; exact for any span count
    pub exact_excess: f64,
    /// Fine features that matched no coarse feature
    pub unmatched_features: usize,
    pub max_feature: Option<MaxFeature>,
}

impl OverlapReport {
    pub fn from_join(
        fine: &FeatureCollection,
        records: &[JoinRecord],
        measure_key: &str,
        label_key: Option<&str>,
    ) -> Result<Self> {
        let fine_total = fine.sum(measure_key)?;
        let mut joined_total = 0.0;
        for record in records {
            if let Some(v) = record_measure(record, measure_key)? {
                joined_total += v;
            }
        }

        let mut multiplicity = vec![0usize; fine.len()];
        for record in records {
            if let Some(m) = multiplicity.get_mut(record.fine_index) {
                *m += 1;
            }
        }

        let mut spanning_features = 0;
        let mut unmatched_features = 0;
        let mut exact_excess = 0.0;
        let mut max_feature: Option<MaxFeature> = None;
        for (i, feature) in fine.iter().enumerate() {
            let matches = multiplicity[i];
            match matches {
                0 => unmatched_features += 1,
                1 => {}
                _ => spanning_features += 1,
            }
            let Some(magnitude) = feature.numeric_property(i, measure_key)? else {
                continue;
            };
            if matches > 1 {
                exact_excess += magnitude * (matches - 1) as f64;
            }
            if max_feature.as_ref().is_none_or(|m| magnitude > m.magnitude) {
                max_feature = Some(MaxFeature {
                    index: i,
                    magnitude,
                    label: label_key
                        .and_then(|k| feature.get_property(k))
                        .map(|v| v.to_string()),
                });
            }
        }

        if unmatched_features > 0 {
            warn!("{} fine features intersect no coarse feature", unmatched_features);
        }

        let fine_count = fine.len();
        let record_count = records.len();
        Ok(Self {
            fine_total,
            joined_total,
            fine_count,
            record_count,
            multiply_counted: (record_count as f64 - fine_count as f64) / 2.0,
            excess_magnitude: (joined_total - fine_total) / 2.0,
            spanning_features,
            exact_excess,
            unmatched_features,
            max_feature,
        })
    }
}

/// Everything one fine/coarse aggregation run produces.
#[derive(Debug, Clone, Serialize)]
pub struct AggregationReport {
    pub generated_at: DateTime<Utc>,
    pub group_key: String,
    pub measure_key: String,
    pub group_totals: BTreeMap<String, f64>,
    pub overlap: OverlapReport,
    #[serde(skip)]
    pub records: Vec<JoinRecord>,
    #[serde(skip)]
    pub derived: FeatureCollection,
}

/// Derive attributes, join, aggregate and diagnose in one go.
pub fn run_aggregation(
    fine: &FeatureCollection,
    coarse: &FeatureCollection,
    params: &AggregationParams,
) -> Result<AggregationReport> {
    let derived = derive_attributes(fine, params)?;
    let records = spatial_join(coarse, &derived)?;
    let group_totals = aggregate(&records, &params.group_key, &params.measure_key)?;
    let overlap = OverlapReport::from_join(
        &derived,
        &records,
        &params.measure_key,
        params.label_key.as_deref(),
    )?;

    info!(
        "Aggregated {} groups: fine total={:.2}, joined total={:.2}, multiply counted={}",
        group_totals.len(),
        overlap.fine_total,
        overlap.joined_total,
        overlap.multiply_counted
    );

    Ok(AggregationReport {
        generated_at: Utc::now(),
        group_key: params.group_key.clone(),
        measure_key: params.measure_key.clone(),
        group_totals,
        overlap,
        records,
        derived,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AreaUnit;
    use geo_types::{LineString, Polygon, polygon};

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1), (x: x0, y: y0)]
    }

    /// Counties A = [0,10]x[0,10] and B = [10,20]x[0,10].
    fn counties() -> FeatureCollection {
        vec![
            Feature::new(rect(0.0, 0.0, 10.0, 10.0)).with_property("county", "A"),
            Feature::new(rect(10.0, 0.0, 20.0, 10.0)).with_property("county", "B"),
        ]
        .into_iter()
        .collect()
    }

    fn ward(x0: f64, y0: f64, x1: f64, y1: f64, name: &str, pop: i64) -> Feature {
        Feature::new(rect(x0, y0, x1, y1))
            .with_property("ward", name)
            .with_property("pop", pop)
    }

    fn params() -> AggregationParams {
        AggregationParams {
            group_key: "county".into(),
            measure_key: "pop".into(),
            label_key: Some("ward".into()),
            ..AggregationParams::default()
        }
    }

    #[test]
    fn test_derive_area_and_density() {
        let wards: FeatureCollection = vec![ward(1.0, 1.0, 3.0, 6.0, "w1", 50)].into_iter().collect();
        let out = derive_attributes(&wards, &params()).unwrap();
        assert_eq!(out.features[0].get_property("area"), Some(&AttributeValue::Float(10.0)));
        assert_eq!(out.features[0].get_property("density"), Some(&AttributeValue::Float(5.0)));
        assert!(wards.features[0].get_property("area").is_none());
    }

    #[test]
    fn test_derive_square_kilometers() {
        let wards: FeatureCollection = vec![ward(0.0, 0.0, 2000.0, 1000.0, "w", 400)].into_iter().collect();
        let p = AggregationParams {
            area_unit: AreaUnit::SquareKilometers,
            ..params()
        };
        let out = derive_attributes(&wards, &p).unwrap();
        assert_eq!(out.features[0].get_property("area"), Some(&AttributeValue::Float(2.0)));
        assert_eq!(out.features[0].get_property("density"), Some(&AttributeValue::Float(200.0)));
    }

    #[test]
    fn test_zero_area_density_is_not_finite() {
        let flat = Polygon::new(LineString::from(vec![(0.0, 0.0), (5.0, 0.0), (0.0, 0.0)]), vec![]);
        let wards: FeatureCollection = vec![Feature::new(flat).with_property("pop", 10i64)]
            .into_iter()
            .collect();
        let out = derive_attributes(&wards, &params()).unwrap();
        match out.features[0].get_property("density") {
            Some(AttributeValue::Float(d)) => assert!(!d.is_finite()),
            other => panic!("unexpected density {other:?}"),
        }
    }

    #[test]
    fn test_derive_requires_polygon_and_measure() {
        let line: FeatureCollection = vec![
            Feature::new(LineString::from(vec![(0.0, 0.0), (1.0, 1.0)])).with_property("pop", 1i64),
        ]
        .into_iter()
        .collect();
        assert!(matches!(
            derive_attributes(&line, &params()),
            Err(Error::NonPolygonal { feature: 0 })
        ));

        let unnamed: FeatureCollection = vec![Feature::new(rect(0.0, 0.0, 1.0, 1.0))].into_iter().collect();
        assert!(matches!(
            derive_attributes(&unnamed, &params()),
            Err(Error::MissingAttribute { .. })
        ));
    }

    #[test]
    fn test_join_without_straddlers() {
        let wards: FeatureCollection = vec![
            ward(1.0, 1.0, 4.0, 4.0, "w1", 100),
            ward(5.0, 5.0, 9.0, 9.0, "w2", 30),
            ward(12.0, 2.0, 18.0, 8.0, "w3", 70),
        ]
        .into_iter()
        .collect();
        let records = spatial_join(&counties(), &wards).unwrap();
        assert_eq!(records.len(), wards.len());

        let report = OverlapReport::from_join(&wards, &records, "pop", Some("ward")).unwrap();
        assert_eq!(report.multiply_counted, 0.0);
        assert_eq!(report.excess_magnitude, 0.0);
        assert_eq!(report.spanning_features, 0);
        assert_eq!(report.fine_total, report.joined_total);
    }

    #[test]
    fn test_join_one_straddler() {
        let wards: FeatureCollection = vec![
            ward(1.0, 1.0, 4.0, 4.0, "w1", 100),
            ward(8.0, 2.0, 12.0, 4.0, "w2", 50),
        ]
        .into_iter()
        .collect();
        let records = spatial_join(&counties(), &wards).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(
            records.iter().map(|r| (r.coarse_index, r.fine_index)).collect::<Vec<_>>(),
            vec![(0, 0), (0, 1), (1, 1)]
        );

        let report = OverlapReport::from_join(&wards, &records, "pop", None).unwrap();
        assert_eq!(report.fine_total, 150.0);
        assert_eq!(report.joined_total, 200.0);
        assert_eq!(report.record_count, wards.len() + 1);
        // the pairwise formula gives half a feature for a single straddler
        assert_eq!(report.multiply_counted, 0.5);
        assert_eq!(report.spanning_features, 1);
        assert_eq!(report.exact_excess, 50.0);
    }

    #[test]
    fn test_join_two_straddlers() {
        let wards: FeatureCollection = vec![
            ward(1.0, 1.0, 4.0, 4.0, "w1", 100),
            ward(8.0, 1.0, 12.0, 4.0, "w2", 40),
            ward(8.0, 6.0, 12.0, 9.0, "w3", 60),
            ward(14.0, 1.0, 18.0, 4.0, "w4", 20),
        ]
        .into_iter()
        .collect();
        let records = spatial_join(&counties(), &wards).unwrap();
        assert_eq!(records.len(), wards.len() + 2);

        let report = OverlapReport::from_join(&wards, &records, "pop", Some("ward")).unwrap();
        assert_eq!(report.multiply_counted, 1.0);
        assert_eq!(report.excess_magnitude, 50.0);
        assert_eq!(report.exact_excess, 100.0);
        assert_eq!(report.spanning_features, 2);
        assert_eq!(
            report.max_feature,
            Some(MaxFeature {
                index: 0,
                magnitude: 100.0,
                label: Some("w1".into())
            })
        );
    }

    #[test]
    fn test_shared_edge_counts_as_intersection() {
        let wards: FeatureCollection = vec![ward(5.0, 2.0, 10.0, 4.0, "edge", 10)].into_iter().collect();
        let records = spatial_join(&counties(), &wards).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_attribute_collisions_get_suffixes() {
        let coarse: FeatureCollection = vec![
            Feature::new(rect(0.0, 0.0, 10.0, 10.0))
                .with_property("name", "County A")
                .with_property("county", "A"),
        ]
        .into_iter()
        .collect();
        let fine: FeatureCollection = vec![
            Feature::new(rect(1.0, 1.0, 2.0, 2.0))
                .with_property("name", "Ward 1")
                .with_property("pop", 5i64),
        ]
        .into_iter()
        .collect();
        let records = spatial_join(&coarse, &fine).unwrap();
        let r = &records[0];
        assert_eq!(r.get("name_left"), Some(&AttributeValue::from("County A")));
        assert_eq!(r.get("name_right"), Some(&AttributeValue::from("Ward 1")));
        assert_eq!(r.get("county"), Some(&AttributeValue::from("A")));
        assert_eq!(r.get("pop"), Some(&AttributeValue::Int(5)));
        assert!(r.get("name").is_none());
    }

    #[test]
    fn test_group_totals_sum_to_joined_total() {
        let wards: FeatureCollection = vec![
            ward(1.0, 1.0, 4.0, 4.0, "w1", 100),
            ward(8.0, 1.0, 12.0, 4.0, "w2", 40),
            ward(14.0, 1.0, 18.0, 4.0, "w3", 25),
        ]
        .into_iter()
        .collect();
        let records = spatial_join(&counties(), &wards).unwrap();
        let totals = aggregate(&records, "county", "pop").unwrap();
        assert_eq!(totals.get("A"), Some(&140.0));
        assert_eq!(totals.get("B"), Some(&65.0));

        let joined: f64 = records.iter().map(|r| r.get("pop").and_then(|v| v.as_f64()).unwrap()).sum();
        assert_eq!(totals.values().sum::<f64>(), joined);
    }

    #[test]
    fn test_aggregate_missing_group_key() {
        let wards: FeatureCollection = vec![ward(1.0, 1.0, 4.0, 4.0, "w1", 100)].into_iter().collect();
        let records = spatial_join(&counties(), &wards).unwrap();
        assert!(matches!(
            aggregate(&records, "district", "pop"),
            Err(Error::MissingAttribute { .. })
        ));
    }

    #[test]
    fn test_aggregate_skips_null_groups() {
        let counties: FeatureCollection = vec![
            Feature::new(rect(0.0, 0.0, 10.0, 10.0)).with_property("county", "A"),
            Feature::new(rect(10.0, 0.0, 20.0, 10.0)).with_property("county", AttributeValue::Null),
        ]
        .into_iter()
        .collect();
        let wards: FeatureCollection = vec![
            ward(1.0, 1.0, 4.0, 4.0, "w1", 100),
            ward(12.0, 1.0, 14.0, 4.0, "w2", 50),
        ]
        .into_iter()
        .collect();
        let records = spatial_join(&counties, &wards).unwrap();
        assert_eq!(records.len(), 2);
        let totals = aggregate(&records, "county", "pop").unwrap();
        assert_eq!(totals.len(), 1);
        assert_eq!(totals.get("A"), Some(&100.0));
        assert!(!totals.contains_key("null"));
    }

    #[test]
    fn test_max_feature_ties_pick_first() {
        let wards: FeatureCollection = vec![
            ward(1.0, 1.0, 2.0, 2.0, "first", 9),
            ward(3.0, 3.0, 4.0, 4.0, "second", 9),
        ]
        .into_iter()
        .collect();
        let records = spatial_join(&counties(), &wards).unwrap();
        let report = OverlapReport::from_join(&wards, &records, "pop", Some("ward")).unwrap();
        assert_eq!(report.max_feature.unwrap().label.as_deref(), Some("first"));
    }

    #[test]
    fn test_unmatched_features_reported() {
        let wards: FeatureCollection = vec![
            ward(1.0, 1.0, 2.0, 2.0, "in", 9),
            ward(30.0, 30.0, 31.0, 31.0, "out", 3),
        ]
        .into_iter()
        .collect();
        let records = spatial_join(&counties(), &wards).unwrap();
        let report = OverlapReport::from_join(&wards, &records, "pop", None).unwrap();
        assert_eq!(report.unmatched_features, 1);
        assert_eq!(report.record_count, 1);
        assert_eq!(report.multiply_counted, -0.5);
    }

    #[test]
    fn test_run_aggregation() {
        let wards: FeatureCollection = vec![
            ward(1.0, 1.0, 4.0, 4.0, "w1", 100),
            ward(8.0, 1.0, 12.0, 4.0, "w2", 40),
        ]
        .into_iter()
        .collect();
        let report = run_aggregation(&wards, &counties(), &params()).unwrap();
        assert_eq!(report.records.len(), 3);
        assert_eq!(report.group_totals.len(), 2);
        assert_eq!(report.overlap.fine_total, 140.0);
        assert_eq!(report.overlap.joined_total, 180.0);
        assert!(report.derived.features[1].get_property("density").is_some());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["group_totals"]["A"], 140.0);
        assert!(json.get("records").is_none());
    }
}
