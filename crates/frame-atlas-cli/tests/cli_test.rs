//! End-to-end tests driving the subcommand entry points the way the binary
//! does, against real files in a temporary directory.

use std::fs;
use std::path::Path;

use tempfile::tempdir;

use frame_atlas_cli::commands::{
    self, ClusterArgs, EmbedArgs, GenArgs, LocateArgs, PatternArg, ScanArgs,
};
use frame_atlas_engine::config::RunConfig;

fn cluster_args(rlim: f64, input: &Path, outdir: &Path) -> ClusterArgs {
    ClusterArgs {
        rlim,
        input: input.to_path_buf(),
        outdir: Some(outdir.to_path_buf()),
        max_clusters: None,
        max_frames: None,
        metric: None,
        anchor_policy: None,
        anchors: true,
        dcc: true,
        counts: true,
        transitions: true,
        no_membership: false,
        config: None,
        save_config: None,
    }
}

#[test]
fn cluster_writes_every_requested_artifact() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("frames.txt");
    fs::write(&input, "0.0 0.0\n10.0 10.0\n0.1 0.0\n").unwrap();
    let outdir = dir.path().join("out");

    commands::cluster(cluster_args(0.5, &input, &outdir)).unwrap();

    for name in [
        "anchors.txt",
        "dcc.txt",
        "cluster_counts.txt",
        "transition_matrix.txt",
        "frame_membership.txt",
        "cluster_run.log",
    ] {
        assert!(outdir.join(name).is_file(), "{name} missing");
    }

    let membership = fs::read_to_string(outdir.join("frame_membership.txt")).unwrap();
    assert_eq!(membership, "0 0\n1 1\n2 0\n");

    let log = fs::read_to_string(outdir.join("cluster_run.log")).unwrap();
    assert!(log.starts_with("CMD: "));
    assert!(log.contains("PARAM_RLIM: 0.500000"));
    assert!(log.contains("STATS_CLUSTERS: 2"));
    assert!(log.contains("STATS_FRAMES: 3"));
}

#[test]
fn locate_runs_against_cluster_output() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("frames.txt");
    fs::write(&input, "0.0 0.0\n10.0 10.0\n0.1 0.0\n").unwrap();
    let outdir = dir.path().join("out");
    commands::cluster(cluster_args(0.5, &input, &outdir)).unwrap();

    commands::locate(LocateArgs {
        anchors: outdir.join("anchors.txt"),
        dcc: outdir.join("dcc.txt"),
        input,
        neighbors: Some(2),
        num_refs: None,
        brute: false,
        metric: None,
        outdir: Some(outdir.clone()),
        config: None,
    })
    .unwrap();

    let log = fs::read_to_string(outdir.join("locate_run.log")).unwrap();
    assert!(log.contains("STATS_TOTAL_FRAMES_PROCESSED: 3"));
}

#[test]
fn embed_writes_one_row_per_cluster() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("frames.txt");
    fs::write(&input, "0.0 0.0\n10.0 10.0\n0.1 0.0\n").unwrap();
    let outdir = dir.path().join("out");
    commands::cluster(cluster_args(0.5, &input, &outdir)).unwrap();

    commands::embed(EmbedArgs {
        dcc: outdir.join("dcc.txt"),
        dim: Some(2),
        temperature: None,
        rate: None,
        iterations: Some(2_000),
        seed: Some(11),
        outdir: Some(outdir.clone()),
        config: None,
    })
    .unwrap();

    let embedding = fs::read_to_string(outdir.join("embedding.txt")).unwrap();
    let rows: Vec<&str> = embedding.lines().collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].split(' ').count(), 3);
}

#[test]
fn gen_then_scan_round_trips() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("synthetic.txt");

    commands::gen(GenArgs {
        pattern: PatternArg::Circle2d,
        count: 8,
        output: output.clone(),
        repeat: 3,
        noise: 0.0,
        scale: 1.0,
        shuffle: false,
        seed: Some(5),
    })
    .unwrap();

    let written = fs::read_to_string(&output).unwrap();
    assert_eq!(written.lines().count(), 24);

    commands::scan(ScanArgs {
        input: output,
        metric: commands::MetricArg::Euclidean,
    })
    .unwrap();
}

#[test]
fn saved_config_reproduces_the_run() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("frames.txt");
    fs::write(&input, "0.0 0.0\n10.0 10.0\n0.1 0.0\n").unwrap();

    let first_out = dir.path().join("first");
    let config_path = dir.path().join("run.json");
    let mut args = cluster_args(0.5, &input, &first_out);
    args.save_config = Some(config_path.clone());
    commands::cluster(args).unwrap();

    let saved = RunConfig::from_json(&config_path).unwrap();
    assert_eq!(saved.cluster.rlim, 0.5);
    assert!(saved.artifacts.dcc);

    // A second run driven only by the saved file lands on the same map.
    let second_out = dir.path().join("second");
    let mut replay = cluster_args(0.5, &input, &second_out);
    replay.anchors = false;
    replay.dcc = false;
    replay.counts = false;
    replay.transitions = false;
    replay.config = Some(config_path);
    commands::cluster(replay).unwrap();

    let first = fs::read_to_string(first_out.join("anchors.txt")).unwrap();
    let second = fs::read_to_string(second_out.join("anchors.txt")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn truncated_input_still_flushes_partial_artifacts() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("frames.txt");
    fs::write(&input, "0.0 0.0\n10.0 10.0\nbroken line here\n").unwrap();
    let outdir = dir.path().join("out");

    let err = commands::cluster(cluster_args(0.5, &input, &outdir)).unwrap_err();
    assert!(err.to_string().contains("2 frames"));

    let membership = fs::read_to_string(outdir.join("frame_membership.txt")).unwrap();
    assert_eq!(membership, "0 0\n1 1\n");
    assert!(outdir.join("cluster_run.log").is_file());
}
