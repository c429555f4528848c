//! End-to-end tests: building an index, radius queries, and file-backed
//! processing.

use geonear::{
    ColumnMapping, Config, GeoNearError, GeoSearchEngine, Point, ProcessorBuilder, RTree,
    Rectangle, build_index, build_index_with, query,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::io::Write;
use std::ops::Range;
use tempfile::NamedTempFile;

fn random_points(
    rng: &mut StdRng,
    count: usize,
    lat: Range<f64>,
    lon: Range<f64>,
) -> Vec<(f64, f64, u64)> {
    (0..count)
        .map(|i| (rng.gen_range(lat.clone()), rng.gen_range(lon.clone()), i as u64))
        .collect()
}

fn offsets(points: &[Point]) -> Vec<u64> {
    points.iter().filter_map(Point::offset).collect()
}

#[test]
fn test_nearest_first_excludes_far_points() {
    let index = build_index(vec![(0.0, 0.0, 0), (0.0, 1.0, 1), (10.0, 10.0, 2)]);

    let found = query(&index, 0.0, 0.0, 200.0);
    assert_eq!(offsets(&found), vec![0, 1]);

    let target = Point::new(0.0, 0.0);
    assert_eq!(target.distance(&found[0]), 0.0);
    assert!(target.distance(&found[1]) > 0.0);
}

#[test]
fn test_split_keeps_every_point_reachable() {
    let index = build_index_with(
        vec![
            (0.0, 0.0, 0),
            (1.0, 1.0, 1),
            (2.0, 2.0, 2),
            (3.0, 3.0, 3),
            (4.0, 4.0, 4),
        ],
        4,
    );

    assert!(index.height() >= 2);
    assert_eq!(index.len(), 5);

    let bounds = index.bounds().unwrap();
    assert_eq!(bounds.min_lat(), 0.0);
    assert_eq!(bounds.max_lon(), 4.0);

    let mut found = offsets(&index.range_query(&bounds));
    found.sort_unstable();
    assert_eq!(found, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_zero_radius_at_absent_point() {
    let index = build_index(vec![(0.0, 0.0, 0), (0.0, 1.0, 1), (10.0, 10.0, 2)]);
    assert!(query(&index, 5.0, 5.0, 0.0).is_empty());
}

#[test]
fn test_results_capped_at_five_nearest() {
    // Eight points east of the origin, inserted farthest first
    let points: Vec<(f64, f64, u64)> =
        (1..=8u64).rev().map(|i| (0.0, i as f64 * 0.05, i)).collect();
    let index = build_index(points);

    let found = query(&index, 0.0, 0.0, 100.0);
    assert_eq!(offsets(&found), vec![1, 2, 3, 4, 5]);

    let target = Point::new(0.0, 0.0);
    let distances: Vec<f64> = found.iter().map(|p| target.distance(p)).collect();
    assert!(distances.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_range_query_matches_rstar() {
    use rstar::AABB;
    use rstar::primitives::GeomWithData;

    let mut rng = StdRng::seed_from_u64(0x2545_F491_4F6C_DD1D);
    let points = random_points(&mut rng, 2_000, -60.0..60.0, -170.0..170.0);

    let oracle = rstar::RTree::bulk_load(
        points
            .iter()
            .map(|&(lat, lon, offset)| GeomWithData::new([lat, lon], offset))
            .collect(),
    );

    for max_keys in [2, 4, 9] {
        let index = build_index_with(points.iter().copied(), max_keys);

        for _ in 0..25 {
            let a = Point::new(rng.gen_range(-60.0..60.0), rng.gen_range(-170.0..170.0));
            let b = Point::new(
                a.lat() + rng.gen_range(-10.0..10.0),
                a.lon() + rng.gen_range(-15.0..15.0),
            );
            let window = Rectangle::new(a, b);

            let mut found = offsets(&index.range_query(&window));
            found.sort_unstable();

            let envelope = AABB::from_corners(
                [window.min_lat(), window.min_lon()],
                [window.max_lat(), window.max_lon()],
            );
            let mut expected: Vec<u64> = oracle
                .locate_in_envelope(&envelope)
                .map(|entry| entry.data)
                .collect();
            expected.sort_unstable();

            assert_eq!(found, expected, "window {} with M = {}", window, max_keys);
        }
    }
}

/// Every indexed point within `radius_km` of `target`, nearest first
fn brute_force(points: &[(f64, f64, u64)], target: &Point, radius_km: f64) -> Vec<(f64, u64)> {
    let mut within: Vec<(f64, u64)> = points
        .iter()
        .map(|&(lat, lon, offset)| (target.distance(&Point::new(lat, lon)), offset))
        .filter(|(distance, _)| *distance <= radius_km)
        .collect();
    within.sort_by(|a, b| a.0.total_cmp(&b.0));
    within
}

#[test]
fn test_radius_results_follow_ranking_law() {
    let mut rng = StdRng::seed_from_u64(0xDEAD_BEEF_CAFE_F00D);
    let points = random_points(&mut rng, 3_000, 30.0..50.0, -10.0..20.0);
    let index = build_index(points.iter().copied());
    let engine = GeoSearchEngine::with_max_results(10);

    for _ in 0..50 {
        let target = Point::new(rng.gen_range(30.0..50.0), rng.gen_range(-10.0..20.0));
        let radius = rng.gen_range(0.0..80.0);

        let found = engine.search(&index, &target, radius);
        assert!(found.len() <= 10);

        let distances: Vec<f64> = found.iter().map(|p| target.distance(p)).collect();
        assert!(distances.iter().all(|d| *d <= radius));
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));

        let mut expected = brute_force(&points, &target, radius);
        expected.truncate(10);
        let expected_distances: Vec<f64> = expected.iter().map(|(d, _)| *d).collect();
        assert_eq!(distances, expected_distances);
    }
}

#[test]
fn test_search_returns_every_point_in_radius() {
    let mut rng = StdRng::seed_from_u64(0x5EED);
    let engine = GeoSearchEngine::with_max_results(usize::MAX);

    for center in [0.0_f64, 35.0, -50.0, 60.0, 75.0, -85.0, 89.0] {
        let south = (center - 5.0).max(-90.0);
        let north = (center + 5.0).min(90.0);
        let points = random_points(&mut rng, 1_500, south..north, -180.0..180.0);
        let index = build_index(points.iter().copied());

        for _ in 0..20 {
            let target = Point::new(rng.gen_range(south..north), rng.gen_range(-180.0..180.0));
            let radius = rng.gen_range(10.0..600.0);

            let mut found = offsets(&engine.search(&index, &target, radius));
            found.sort_unstable();
            let mut expected: Vec<u64> = brute_force(&points, &target, radius)
                .into_iter()
                .map(|(_, offset)| offset)
                .collect();
            expected.sort_unstable();

            assert_eq!(
                found, expected,
                "target {} radius {} km at latitude band {}",
                target, radius, center
            );
        }
    }
}

#[test]
fn test_search_at_high_latitude_uses_full_radius() {
    // About 78 km from the target, outside a bare Mercator box
    let index = build_index(vec![(60.7, 0.0, 0), (60.0, 1.4, 1), (61.5, 0.0, 2)]);

    let found = query(&index, 60.0, 0.0, 100.0);
    let mut found = offsets(&found);
    found.sort_unstable();
    assert_eq!(found, vec![0, 1]);
}

#[test]
fn test_every_point_returned_once() {
    let mut rng = StdRng::seed_from_u64(42);
    let points = random_points(&mut rng, 500, -5.0..5.0, -5.0..5.0);
    let index = build_index_with(points, 3);

    let world = Rectangle::new(Point::new(-90.0, -180.0), Point::new(90.0, 180.0));
    let everything = index.range_query(&world);
    let unique: HashSet<u64> = offsets(&everything).into_iter().collect();
    assert_eq!(everything.len(), 500);
    assert_eq!(unique.len(), 500);
    assert_eq!(index.points().len(), 500);
}

#[test]
fn test_duplicate_coordinates() {
    let index = build_index((0..12).map(|i| (12.5, -7.25, i)));
    assert_eq!(index.len(), 12);

    let engine = GeoSearchEngine::with_max_results(20);
    let found = engine.search(&index, &Point::new(12.5, -7.25), 0.0);
    let mut found = offsets(&found);
    found.sort_unstable();
    assert_eq!(found, (0..12).collect::<Vec<_>>());
}

#[test]
fn test_empty_index() {
    let index = RTree::default();
    assert!(index.is_empty());
    assert!(index.bounds().is_none());
    assert!(query(&index, 0.0, 0.0, 20_000.0).is_empty());
}

fn airports_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "id,name,lat,lon,alt").unwrap();
    write!(file, "1,\"Charles de Gaulle, Paris\",49.0097,2.5479,392\r\n").unwrap();
    writeln!(file, "2,Orly,48.7262,2.3652,291").unwrap();
    writeln!(file, "3,Beauvais,49.4544,2.1128,359").unwrap();
    writeln!(file).unwrap();
    writeln!(file, "4,Heathrow,51.4700,-0.4543,83").unwrap();
    writeln!(file, "5,Lyon,45.7256,5.0811,821").unwrap();
    file.flush().unwrap();
    file
}

fn airports_config() -> Config {
    Config::default()
        .with_columns(ColumnMapping::new(2, 3).with_elevation(4))
        .with_header(true)
}

#[test]
fn test_file_processor_end_to_end() {
    let file = airports_file();
    let mut processor = ProcessorBuilder::new()
        .dataset(file.path())
        .config(airports_config())
        .build()
        .unwrap();

    let stats = processor.preprocess().unwrap().stats();
    assert_eq!(stats.points, 5);

    let paris = Point::new(48.8566, 2.3522);
    let records = processor.process(&paris, 100.0).unwrap();
    let lines: Vec<String> = records.iter().map(|r| r.to_string()).collect();
    assert_eq!(
        lines,
        vec![
            "2,Orly,48.7262,2.3652,291",
            "1,\"Charles de Gaulle, Paris\",49.0097,2.5479,392",
            "3,Beauvais,49.4544,2.1128,359",
        ]
    );

    let london = processor.process(&Point::new(51.5074, -0.1278), 50.0).unwrap();
    assert_eq!(london.len(), 1);
    assert!(london[0].as_str().contains("Heathrow"));

    assert!(processor.process(&Point::new(0.0, 0.0), 100.0).unwrap().is_empty());
}

#[test]
fn test_file_processor_invalid_rows() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "a,10.0,10.0").unwrap();
    writeln!(file, "b,not-a-number,10.0").unwrap();
    writeln!(file, "c,10.1,10.1").unwrap();
    file.flush().unwrap();

    let config = Config::default().with_columns(ColumnMapping::new(1, 2));

    let mut strict = ProcessorBuilder::new()
        .dataset(file.path())
        .config(config.clone())
        .build()
        .unwrap();
    assert!(matches!(
        strict.preprocess(),
        Err(GeoNearError::Parse { line: 2, .. })
    ));

    let mut lenient = ProcessorBuilder::new()
        .dataset(file.path())
        .config(config.with_skip_invalid_rows(true))
        .build()
        .unwrap();
    assert_eq!(lenient.preprocess().unwrap().len(), 2);

    let records = lenient.process(&Point::new(10.0, 10.0), 50.0).unwrap();
    let names: Vec<String> = records
        .iter()
        .map(|r| r.as_str().split(',').next().unwrap_or_default().to_string())
        .collect();
    assert_eq!(names, vec!["a", "c"]);
}

#[test]
fn test_missing_dataset_fails_preprocess() {
    let dir = tempfile::tempdir().unwrap();
    let mut processor = ProcessorBuilder::new()
        .dataset(dir.path().join("absent.csv"))
        .build()
        .unwrap();

    assert!(matches!(processor.preprocess(), Err(GeoNearError::Io(_))));
    assert!(matches!(
        processor.search(&Point::new(0.0, 0.0), 1.0),
        Err(GeoNearError::NotIndexed)
    ));
}

#[test]
fn test_concurrent_queries() {
    let mut file = NamedTempFile::new().unwrap();
    let mut rng = StdRng::seed_from_u64(7);
    for (lat, lon, i) in random_points(&mut rng, 1_000, 40.0..50.0, 0.0..10.0) {
        writeln!(file, "{},{:.6},{:.6}", i, lat, lon).unwrap();
    }
    file.flush().unwrap();

    let mut processor = ProcessorBuilder::new()
        .dataset(file.path())
        .config(Config::default().with_columns(ColumnMapping::new(1, 2)))
        .build()
        .unwrap();
    processor.preprocess().unwrap();
    let processor = &processor;

    let targets: Vec<Point> = (0..8)
        .map(|i| Point::new(41.0 + i as f64, 1.0 + i as f64))
        .collect();
    let sequential: Vec<Vec<String>> = targets
        .iter()
        .map(|t| {
            processor
                .process(t, 60.0)
                .unwrap()
                .iter()
                .map(|r| r.to_string())
                .collect()
        })
        .collect();

    std::thread::scope(|scope| {
        let handles: Vec<_> = targets
            .iter()
            .map(|target| {
                scope.spawn(move || {
                    processor
                        .process(target, 60.0)
                        .unwrap()
                        .iter()
                        .map(|r| r.to_string())
                        .collect::<Vec<String>>()
                })
            })
            .collect();

        for (handle, expected) in handles.into_iter().zip(&sequential) {
            assert_eq!(&handle.join().unwrap(), expected);
        }
    });
}
