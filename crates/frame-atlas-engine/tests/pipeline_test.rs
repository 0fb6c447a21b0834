//! End-to-end pipeline tests: generate, cluster, persist, reload, locate,
//! embed. These cross the module seams the unit tests stay inside of.

use ndarray::{Array1, Array2};
use rand::prelude::*;
use std::fs;
use std::path::Path;

use frame_atlas_core::{ClusterStore, VectorSource};
use frame_atlas_engine::artifacts::{
    self, ANCHORS_FILE, COUNTS_FILE, DCC_FILE, MEMBERSHIP_FILE,
};
use frame_atlas_engine::cluster::{ClusterConfig, ClusterEngine, ClusterOutcome};
use frame_atlas_engine::embed::{self, EmbeddingConfig, EmbeddingEngine};
use frame_atlas_engine::gen::{GeneratorConfig, Pattern, StreamGenerator};
use frame_atlas_engine::locate::{LocateConfig, LocateEngine, LocateMode};
use frame_atlas_engine::matrix::DistanceMatrixBuilder;
use frame_atlas_engine::source::{self, InMemorySource, TextVectorSource};

/// Six circle clusters revisited ten times with mild jitter. The geometry
/// is chosen so rlim 0.3 separates the base points with a wide margin.
fn circle_stream() -> Vec<Array1<f64>> {
    StreamGenerator::new(
        GeneratorConfig::new(Pattern::Circle2d, 6)
            .with_repeat(10)
            .with_noise(0.05)
            .with_seed(42),
    )
    .unwrap()
    .generate()
}

fn cluster_rows(rows: Vec<Array1<f64>>, config: ClusterConfig) -> ClusterOutcome {
    let mut source = InMemorySource::new(rows);
    let mut engine = ClusterEngine::new(config).unwrap();
    engine.run(&mut source).unwrap();
    engine.finish()
}

fn write_map(dir: &Path, outcome: &ClusterOutcome) {
    let dcc = DistanceMatrixBuilder::default().build(&outcome.store).unwrap();
    artifacts::write_anchors(dir, &outcome.store).unwrap();
    artifacts::write_dcc(dir, &dcc).unwrap();
    artifacts::write_membership(dir, &outcome.assignments).unwrap();
    artifacts::write_counts(dir, &outcome.store).unwrap();
}

#[test]
fn full_pipeline_round_trips_through_disk() {
    let frames = circle_stream();
    let outcome = cluster_rows(frames.clone(), ClusterConfig::new(0.3));

    assert_eq!(outcome.store.len(), 6);
    assert_eq!(outcome.assignments.len(), 60);
    for (i, &cluster) in outcome.assignments.iter().enumerate() {
        assert_eq!(cluster, i % 6, "frame {i} landed in the wrong cluster");
    }
    assert_eq!(outcome.statistics.dist_hist.total_frames(), 60);

    // Persist the map and reload it the way a locate run would.
    let dir = tempfile::tempdir().unwrap();
    write_map(dir.path(), &outcome);

    let membership = fs::read_to_string(dir.path().join(MEMBERSHIP_FILE)).unwrap();
    assert_eq!(membership.lines().count(), 60);

    let counts = fs::read_to_string(dir.path().join(COUNTS_FILE)).unwrap();
    let total: u64 = counts
        .lines()
        .map(|l| l.rsplit(' ').nth(1).unwrap().parse::<u64>().unwrap())
        .sum();
    assert_eq!(total, 60);

    let store = artifacts::read_anchors(&dir.path().join(ANCHORS_FILE)).unwrap();
    let dcc = artifacts::read_dcc(&dir.path().join(DCC_FILE)).unwrap();
    assert_eq!(store.len(), 6);
    dcc.check_store(&store).unwrap();

    // Every original frame still maps to the cluster it was assigned to.
    let mut engine = LocateEngine::new(&store, &dcc, LocateConfig::new(1)).unwrap();
    let mut source = InMemorySource::new(frames);
    let results = engine.run(&mut source).unwrap();
    assert_eq!(results.len(), 60);
    for (i, neighbors) in results.iter().enumerate() {
        assert_eq!(neighbors[0].cluster, i % 6);
        assert!(neighbors[0].distance < 0.3);
    }
    assert_eq!(engine.statistics().dist_hist.total_frames(), 60);
}

#[test]
fn text_format_runs_identically_to_memory() {
    let frames = circle_stream();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frames.txt");
    source::write_vectors(&path, &frames).unwrap();

    let in_memory = cluster_rows(frames, ClusterConfig::new(0.3));

    let mut text_source = TextVectorSource::open(&path).unwrap();
    let mut engine = ClusterEngine::new(ClusterConfig::new(0.3)).unwrap();
    engine.run(&mut text_source).unwrap();
    let from_text = engine.finish();

    assert_eq!(from_text.store.len(), in_memory.store.len());
    assert_eq!(from_text.assignments, in_memory.assignments);
}

#[test]
fn pruned_search_equals_brute_force_everywhere() {
    for &dim in &[2usize, 5] {
        for &seed in &[1u64, 2] {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut store = ClusterStore::new();
            for _ in 0..40 {
                let anchor: Vec<f64> = (0..dim).map(|_| rng.gen::<f64>() * 100.0).collect();
                store.create(Array1::from_vec(anchor)).unwrap();
            }
            let dcc = DistanceMatrixBuilder::default().build(&store).unwrap();

            let queries: Vec<Array1<f64>> = (0..20)
                .map(|_| Array1::from_vec((0..dim).map(|_| rng.gen::<f64>() * 100.0).collect()))
                .collect();

            for &k in &[1usize, 3, 7] {
                for &num_refs in &[1usize, 3, 9] {
                    let mut pruned = LocateEngine::new(
                        &store,
                        &dcc,
                        LocateConfig::new(k).with_num_refs(num_refs),
                    )
                    .unwrap();
                    let mut brute = LocateEngine::new(
                        &store,
                        &dcc,
                        LocateConfig::new(k).with_mode(LocateMode::BruteForce),
                    )
                    .unwrap();

                    for q in &queries {
                        let a = pruned.locate_one(q).unwrap();
                        let b = brute.locate_one(q).unwrap();
                        assert_eq!(
                            a, b,
                            "pruned != brute (dim={dim} seed={seed} k={k} refs={num_refs})"
                        );
                    }
                    assert!(
                        pruned.statistics().distance_computations
                            <= brute.statistics().distance_computations
                    );
                }
            }
        }
    }
}

#[test]
fn identical_seeds_produce_identical_artifacts() {
    let run = |dir: &Path| {
        let outcome = cluster_rows(circle_stream(), ClusterConfig::new(0.3));
        write_map(dir, &outcome);
    };

    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    run(a.path());
    run(b.path());

    for file in [ANCHORS_FILE, DCC_FILE, MEMBERSHIP_FILE, COUNTS_FILE] {
        let text_a = fs::read_to_string(a.path().join(file)).unwrap();
        let text_b = fs::read_to_string(b.path().join(file)).unwrap();
        assert_eq!(text_a, text_b, "{file} differs between identical runs");
    }
}

#[test]
fn frame_cap_truncates_the_run_cleanly() {
    let frames = circle_stream();
    let outcome = cluster_rows(frames, ClusterConfig::new(0.3).with_max_frames(Some(30)));

    assert_eq!(outcome.statistics.total_frames, 30);
    assert_eq!(outcome.assignments.len(), 30);

    let dir = tempfile::tempdir().unwrap();
    artifacts::write_membership(dir.path(), &outcome.assignments).unwrap();
    let membership = fs::read_to_string(dir.path().join(MEMBERSHIP_FILE)).unwrap();
    assert_eq!(membership.lines().count(), 30);
}

#[test]
fn embedding_from_disk_beats_the_collapsed_layout() {
    let outcome = cluster_rows(circle_stream(), ClusterConfig::new(0.3));
    let dir = tempfile::tempdir().unwrap();
    write_map(dir.path(), &outcome);

    let dcc = artifacts::read_dcc(&dir.path().join(DCC_FILE)).unwrap();
    let engine = EmbeddingEngine::new(EmbeddingConfig::default().with_seed(5)).unwrap();
    let result = engine.embed(&dcc);

    assert_eq!(result.coordinates.nrows(), 6);
    assert_eq!(result.coordinates.ncols(), 2);
    assert!(result.stress.is_finite());

    // Everything-at-the-origin is the do-nothing layout; annealing must do
    // clearly better than that.
    let collapsed = Array2::zeros((dcc.dim(), 2));
    assert!(result.stress < embed::stress(&collapsed, &dcc));

    artifacts::write_embedding(dir.path(), &result.coordinates).unwrap();
    let text = fs::read_to_string(dir.path().join(artifacts::EMBEDDING_FILE)).unwrap();
    assert_eq!(text.lines().count(), 6);
    for line in text.lines() {
        assert_eq!(line.split_whitespace().count(), 3);
    }
}

#[test]
fn channel_feed_matches_batch_clustering() {
    use frame_atlas_engine::source::ChannelSource;
    use std::sync::mpsc;
    use std::thread;

    let frames = circle_stream();
    let batch = cluster_rows(frames.clone(), ClusterConfig::new(0.3));

    let (tx, rx) = mpsc::channel();
    let producer = thread::spawn(move || {
        for frame in frames {
            tx.send(frame).unwrap();
        }
    });

    let mut live = ChannelSource::new(rx);
    let mut engine = ClusterEngine::new(ClusterConfig::new(0.3)).unwrap();
    engine.run(&mut live).unwrap();
    producer.join().unwrap();

    let outcome = engine.finish();
    assert_eq!(outcome.assignments, batch.assignments);
    assert_eq!(outcome.store.len(), batch.store.len());
}

#[test]
fn dimension_hint_follows_the_stream() {
    let mut src = InMemorySource::from_rows(vec![vec![1.0, 2.0, 3.0]]);
    assert_eq!(src.dim_hint(), Some(3));
    assert_eq!(src.next_vector().unwrap().unwrap().len(), 3);
}
