use geo::{Area, Contains};
use geo_types::{Point, Polygon, polygon};
use ndarray::{Array3, Axis};

use geoscope::{
    AggregationParams, AreaUnit, AttributeValue, CompositeParams, Error, Extent, Feature,
    FeatureCollection, GeoRaster, StretchParams, aggregate, build_overlay_mask, compose,
    compose_georeferenced, derive_attributes, percentile_stretch, run_aggregation, spatial_join,
};

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
    polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1), (x: x0, y: y0)]
}

/// Three counties side by side in a UTM-like metre grid, each 10 km x 10 km.
fn counties() -> FeatureCollection {
    ["Antrim", "Down", "Armagh"]
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let x0 = i as f64 * 10_000.0;
            Feature::new(rect(x0, 0.0, x0 + 10_000.0, 10_000.0)).with_property("CountyName", *name)
        })
        .collect()
}

fn ward(x0: f64, y0: f64, x1: f64, y1: f64, name: &str, population: i64) -> Feature {
    Feature::new(rect(x0, y0, x1, y1))
        .with_property("Ward", name)
        .with_property("Population", population)
}

fn wards() -> FeatureCollection {
    vec![
        ward(1_000.0, 1_000.0, 3_000.0, 3_000.0, "Ballee", 2_000),
        ward(8_000.0, 5_000.0, 12_000.0, 7_000.0, "Border North", 3_000),
        ward(18_000.0, 1_000.0, 22_000.0, 3_000.0, "Border South", 1_500),
        ward(24_000.0, 4_000.0, 27_000.0, 9_000.0, "Mall", 9_464),
    ]
    .into_iter()
    .collect()
}

fn params() -> AggregationParams {
    AggregationParams {
        group_key: "CountyName".into(),
        measure_key: "Population".into(),
        label_key: Some("Ward".into()),
        area_key: "WARDAREA".into(),
        density_key: "Ward_ppsqkm".into(),
        area_unit: AreaUnit::SquareKilometers,
    }
}

#[test]
fn ward_county_report_matches_hand_counts() {
    let report = run_aggregation(&wards(), &counties(), &params()).unwrap();

    assert_eq!(report.group_totals.get("Antrim"), Some(&5_000.0));
    assert_eq!(report.group_totals.get("Down"), Some(&4_500.0));
    assert_eq!(report.group_totals.get("Armagh"), Some(&10_964.0));

    let o = &report.overlap;
    assert_eq!(o.fine_count, 4);
    assert_eq!(o.record_count, 6);
    assert_eq!(o.fine_total, 15_964.0);
    assert_eq!(o.joined_total, 20_464.0);
    assert_eq!(o.multiply_counted, 1.0);
    assert_eq!(o.excess_magnitude, 2_250.0);
    assert_eq!(o.exact_excess, 4_500.0);
    assert_eq!(o.spanning_features, 2);
    assert_eq!(o.unmatched_features, 0);

    let max = o.max_feature.as_ref().unwrap();
    assert_eq!(max.magnitude, 9_464.0);
    assert_eq!(max.label.as_deref(), Some("Mall"));

    let sum: f64 = report.group_totals.values().sum();
    assert_eq!(sum, o.joined_total);
}

#[test]
fn derived_density_is_people_per_square_km() {
    let derived = derive_attributes(&wards(), &params()).unwrap();
    let ballee = &derived.features[0];
    assert_eq!(ballee.get_property("WARDAREA"), Some(&AttributeValue::Float(4.0)));
    assert_eq!(ballee.get_property("Ward_ppsqkm"), Some(&AttributeValue::Float(500.0)));
}

#[test]
fn chained_operations_agree_with_run_aggregation() {
    let derived = derive_attributes(&wards(), &params()).unwrap();
    let records = spatial_join(&counties(), &derived).unwrap();
    let totals = aggregate(&records, "CountyName", "Population").unwrap();
    let report = run_aggregation(&wards(), &counties(), &params()).unwrap();
    assert_eq!(totals, report.group_totals);
    assert!(records.iter().all(|r| r.get("Ward_ppsqkm").is_some()));
}

#[test]
fn overlay_mask_over_county_extent() {
    let extent = Extent::new(-5_000.0, -5_000.0, 35_000.0, 15_000.0);
    let mask = build_overlay_mask(&extent, &counties()).unwrap();
    let expected = 40_000.0 * 20_000.0 - 30_000.0 * 10_000.0;
    assert!((mask.unsigned_area() - expected).abs() < 1e-3);
    assert!(mask.contains(&Point::new(-1_000.0, -1_000.0)));
    assert!(!mask.contains(&Point::new(15_000.0, 5_000.0)));
}

#[test]
fn overlay_mask_with_empty_layer_is_the_extent() {
    let extent = Extent::new(0.0, 0.0, 10.0, 10.0);
    let mask = build_overlay_mask(&extent, &FeatureCollection::new()).unwrap();
    assert_eq!(mask.0.len(), 1);
    assert_eq!(mask.unsigned_area(), 100.0);
}

fn mosaic() -> Array3<u16> {
    // blue, green, red, nir with a few hot pixels in every band
    Array3::from_shape_fn((4, 20, 30), |(b, r, c)| {
        if (r * 30 + c) % 97 == 0 {
            60_000
        } else {
            (500 + b * 250 + r * 11 + c * 7) as u16
        }
    })
}

#[test]
fn true_colour_composite_from_bgr_stack() {
    let params = CompositeParams {
        bands: [2, 1, 0],
        stretch: Some(StretchParams::new(0.1, 99.9)),
    };
    let composite = compose(&mosaic(), &params).unwrap();
    assert_eq!(composite.dim(), (20, 30, 3));
    assert!(composite.iter().all(|&v| (0.0..=1.0).contains(&v)));

    // channel 0 is the stretched red band
    let red = mosaic().index_axis(Axis(0), 2).mapv(f64::from);
    let expected = percentile_stretch(&red, StretchParams::new(0.1, 99.9)).unwrap();
    assert_eq!(composite.index_axis(Axis(2), 0), expected);
}

#[test]
fn georeferenced_composite_keeps_extent() {
    let raster = GeoRaster {
        data: mosaic().mapv(f64::from),
        extent: Extent::new(190_000.0, 5_980_000.0, 370_000.0, 6_150_000.0),
        projection: "EPSG:32629".into(),
    };
    let composite = compose_georeferenced(&raster, &CompositeParams::default()).unwrap();
    assert_eq!(composite.extent, raster.extent);
    assert_eq!(
        composite.extent.plot_extent(),
        [190_000.0, 370_000.0, 5_980_000.0, 6_150_000.0]
    );
}

#[test]
fn composite_fails_whole_on_bad_stretch() {
    let params = CompositeParams {
        bands: [0, 1, 2],
        stretch: Some(StretchParams::new(99.0, 1.0)),
    };
    assert!(matches!(
        compose(&mosaic(), &params),
        Err(Error::InvalidParameter { .. })
    ));
}

#[test]
fn independent_stretches_can_run_in_parallel() {
    let raster = mosaic().mapv(f64::from);
    let handles: Vec<_> = (0..4)
        .map(|b| {
            let band = raster.index_axis(Axis(0), b).to_owned();
            std::thread::spawn(move || {
                percentile_stretch(&band, StretchParams::new(2.0, 98.0)).map_err(|e| e.to_string())
            })
        })
        .collect();
    for (b, handle) in handles.into_iter().enumerate() {
        let threaded = handle.join().unwrap().unwrap();
        let direct =
            percentile_stretch(&raster.index_axis(Axis(0), b), StretchParams::new(2.0, 98.0)).unwrap();
        assert_eq!(threaded, direct);
    }
}
