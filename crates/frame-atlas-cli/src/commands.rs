//! CLI subcommands.
//!
//! Each subcommand resolves its configuration in three layers: engine
//! defaults, then the `--config` JSON document if given, then explicit
//! flags. The effective configuration can be written back out with
//! `--save-config`, which is how a one-off invocation becomes a repeatable
//! run.
//!
//! Results go to stdout (locate lines, scan summaries); status and progress
//! go through `tracing`; artifacts go to the output directory.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

use frame_atlas_core::{AnchorPolicy, AtlasError, Metric, VectorSource};
use frame_atlas_engine::artifacts::{self, RunLog};
use frame_atlas_engine::cluster::ClusterEngine;
use frame_atlas_engine::config::RunConfig;
use frame_atlas_engine::embed::EmbeddingEngine;
use frame_atlas_engine::gen::{GeneratorConfig, Pattern, StreamGenerator};
use frame_atlas_engine::locate::{LocateEngine, LocateMode};
use frame_atlas_engine::matrix::DistanceMatrixBuilder;
use frame_atlas_engine::scan::DistanceScan;
use frame_atlas_engine::source::{self, TextVectorSource};

// ---------------------------------------------------------------------------
// Shared argument enums
// ---------------------------------------------------------------------------

/// Distance metric argument
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum MetricArg {
    Euclidean,
    Manhattan,
}

impl From<MetricArg> for Metric {
    fn from(val: MetricArg) -> Self {
        match val {
            MetricArg::Euclidean => Metric::Euclidean,
            MetricArg::Manhattan => Metric::Manhattan,
        }
    }
}

/// Anchor evolution argument
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum PolicyArg {
    RunningMean,
    FirstMember,
}

impl From<PolicyArg> for AnchorPolicy {
    fn from(val: PolicyArg) -> Self {
        match val {
            PolicyArg::RunningMean => AnchorPolicy::RunningMean,
            PolicyArg::FirstMember => AnchorPolicy::FirstMember,
        }
    }
}

/// Synthetic pattern argument
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum PatternArg {
    Random2d,
    Walk2d,
    Spiral2d,
    Circle2d,
    Sphere3d,
}

impl From<PatternArg> for Pattern {
    fn from(val: PatternArg) -> Self {
        match val {
            PatternArg::Random2d => Pattern::Random2d,
            PatternArg::Walk2d => Pattern::Walk2d,
            PatternArg::Spiral2d => Pattern::Spiral2d,
            PatternArg::Circle2d => Pattern::Circle2d,
            PatternArg::Sphere3d => Pattern::Sphere3d,
        }
    }
}

fn load_run_config(path: Option<&PathBuf>) -> Result<RunConfig> {
    match path {
        Some(p) => {
            RunConfig::from_json(p).with_context(|| format!("loading config {}", p.display()))
        }
        None => Ok(RunConfig::default()),
    }
}

// ---------------------------------------------------------------------------
// cluster
// ---------------------------------------------------------------------------

/// Arguments for the cluster command
#[derive(Args, Debug)]
pub struct ClusterArgs {
    /// Absorption radius: a frame within this distance of the nearest
    /// anchor joins that cluster
    pub rlim: f64,

    /// Input stream, one whitespace-separated vector per line
    pub input: PathBuf,

    /// Output directory (default: `<input>.clusterdat`)
    #[arg(short, long)]
    pub outdir: Option<PathBuf>,

    /// Cap on clusters created; 0 lifts the cap
    #[arg(long)]
    pub max_clusters: Option<usize>,

    /// Cap on frames consumed; 0 lifts the cap
    #[arg(long)]
    pub max_frames: Option<u64>,

    /// Distance metric
    #[arg(long, value_enum)]
    pub metric: Option<MetricArg>,

    /// How anchors evolve as members arrive
    #[arg(long, value_enum)]
    pub anchor_policy: Option<PolicyArg>,

    /// Write anchors.txt
    #[arg(long)]
    pub anchors: bool,

    /// Write dcc.txt (the inter-cluster distance matrix)
    #[arg(long)]
    pub dcc: bool,

    /// Write cluster_counts.txt
    #[arg(long)]
    pub counts: bool,

    /// Write transition_matrix.txt
    #[arg(long)]
    pub transitions: bool,

    /// Skip frame_membership.txt (on by default)
    #[arg(long)]
    pub no_membership: bool,

    /// JSON run configuration; explicit flags override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the effective configuration to this path before running
    #[arg(long)]
    pub save_config: Option<PathBuf>,
}

/// Run the clustering pass and write its artifacts.
pub fn cluster(args: ClusterArgs) -> Result<()> {
    let cmd = std::env::args().collect::<Vec<_>>().join(" ");
    let start_time = chrono::Local::now()
        .format("%Y-%m-%d %H:%M:%S%.9f")
        .to_string();

    let mut run_config = load_run_config(args.config.as_ref())?;
    run_config.cluster.rlim = args.rlim;
    if let Some(v) = args.max_clusters {
        run_config.cluster.max_clusters = (v != 0).then_some(v);
    }
    if let Some(v) = args.max_frames {
        run_config.cluster.max_frames = (v != 0).then_some(v);
    }
    if let Some(m) = args.metric {
        run_config.cluster.metric = m.into();
    }
    if let Some(p) = args.anchor_policy {
        run_config.cluster.anchor_policy = p.into();
    }
    run_config.artifacts.anchors |= args.anchors;
    run_config.artifacts.dcc |= args.dcc;
    run_config.artifacts.counts |= args.counts;
    run_config.artifacts.transitions |= args.transitions;
    if args.no_membership {
        run_config.artifacts.membership = false;
    }
    if let Some(path) = &args.save_config {
        run_config.to_json(path)?;
        info!(path = %path.display(), "effective configuration saved");
    }
    let cluster_config = run_config.cluster.clone();
    let artifact_config = run_config.artifacts.clone();

    let clustering_start = Instant::now();
    let mut source = TextVectorSource::open(&args.input)
        .with_context(|| format!("opening input {}", args.input.display()))?;
    let mut engine = ClusterEngine::new(cluster_config.clone())?;

    // Input failures flush everything processed so far before the run
    // fails; anything else aborts with nothing written.
    let run_error = match engine.run(&mut source) {
        Ok(_) => None,
        Err(e) if e.preserves_partial_results() => {
            warn!(error = %e, "input failed, flushing partial results");
            Some(e)
        }
        Err(e) => return Err(e.into()),
    };
    let clustering_ms = clustering_start.elapsed().as_secs_f64() * 1000.0;
    let outcome = engine.finish();

    let output_start = Instant::now();
    let outdir = args
        .outdir
        .clone()
        .unwrap_or_else(|| artifacts::default_output_dir(&args.input));
    artifacts::ensure_output_dir(&outdir)?;

    let mut files = Vec::new();
    if artifact_config.dcc {
        let dcc = DistanceMatrixBuilder::new(cluster_config.metric).build(&outcome.store)?;
        files.push(artifacts::write_dcc(&outdir, &dcc)?);
    }
    if artifact_config.transitions {
        files.push(artifacts::write_transitions(&outdir, &outcome.assignments)?);
    }
    if artifact_config.anchors {
        files.push(artifacts::write_anchors(&outdir, &outcome.store)?);
    }
    if artifact_config.counts {
        files.push(artifacts::write_counts(&outdir, &outcome.store)?);
    }
    if artifact_config.membership {
        files.push(artifacts::write_membership(&outdir, &outcome.assignments)?);
    }
    let output_ms = output_start.elapsed().as_secs_f64() * 1000.0;

    RunLog {
        cmd: &cmd,
        start_time: &start_time,
        clustering_ms,
        output_ms,
        output_dir: &outdir,
        config: &cluster_config,
        files: &files,
        statistics: &outcome.statistics,
    }
    .write()?;

    info!(
        clusters = outcome.store.len(),
        frames = outcome.statistics.total_frames,
        fallback = outcome.statistics.fallback_assignments,
        outdir = %outdir.display(),
        "clustering complete"
    );
    match run_error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// locate
// ---------------------------------------------------------------------------

/// Arguments for the locate command
#[derive(Args, Debug)]
pub struct LocateArgs {
    /// anchors.txt from a clustering run
    pub anchors: PathBuf,

    /// dcc.txt from the same run
    pub dcc: PathBuf,

    /// New frames to classify
    pub input: PathBuf,

    /// Nearest clusters to report per frame
    #[arg(short = 'k', long)]
    pub neighbors: Option<usize>,

    /// Reference anchors used for pruning bounds
    #[arg(long)]
    pub num_refs: Option<usize>,

    /// Exact distance to every cluster instead of pruned search
    #[arg(long)]
    pub brute: bool,

    /// Distance metric; must match the clustering run
    #[arg(long, value_enum)]
    pub metric: Option<MetricArg>,

    /// Directory for locate_run.log (default: current directory)
    #[arg(short, long)]
    pub outdir: Option<PathBuf>,

    /// JSON run configuration; explicit flags override it
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Classify new frames against a saved cluster map.
pub fn locate(args: LocateArgs) -> Result<()> {
    let run_config = load_run_config(args.config.as_ref())?;
    let mut locate_config = run_config.locate;
    if let Some(k) = args.neighbors {
        locate_config.k = k;
    }
    if let Some(refs) = args.num_refs {
        locate_config.num_refs = refs;
    }
    if args.brute {
        locate_config.mode = LocateMode::BruteForce;
    }
    if let Some(m) = args.metric {
        locate_config.metric = m.into();
    }

    let store = artifacts::read_anchors(&args.anchors)
        .with_context(|| format!("loading anchors {}", args.anchors.display()))?;
    let dcc = artifacts::read_dcc(&args.dcc)
        .with_context(|| format!("loading distance matrix {}", args.dcc.display()))?;
    let mut engine = LocateEngine::new(&store, &dcc, locate_config)?;

    let mut source = TextVectorSource::open(&args.input)
        .with_context(|| format!("opening input {}", args.input.display()))?;

    // Results stream to stdout as frames arrive, so an input failure late
    // in the stream still leaves everything before it printed.
    let mut frame: u64 = 0;
    let run_error = loop {
        match source.next_vector() {
            Ok(Some(v)) => {
                let found = engine.locate_one(&v)?;
                println!("{}", artifacts::format_locate_line(frame, &found));
                frame += 1;
            }
            Ok(None) => break None,
            Err(AtlasError::Input(e)) => {
                warn!(error = %e, "input failed, keeping results printed so far");
                break Some(AtlasError::input_after(frame, e));
            }
            Err(e) => return Err(e.into()),
        }
    };

    let outdir = args.outdir.clone().unwrap_or_else(|| PathBuf::from("."));
    artifacts::ensure_output_dir(&outdir)?;
    artifacts::write_locate_log(&outdir, engine.statistics())?;

    info!(
        frames = engine.statistics().total_frames,
        avg_computations = engine.statistics().avg_computations_per_frame(),
        pruned = engine.statistics().pruned_candidates,
        "locate complete"
    );
    match run_error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// embed
// ---------------------------------------------------------------------------

/// Arguments for the embed command
#[derive(Args, Debug)]
pub struct EmbedArgs {
    /// dcc.txt from a clustering run
    pub dcc: PathBuf,

    /// Dimension of the embedded space
    #[arg(short, long)]
    pub dim: Option<usize>,

    /// Starting temperature
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Geometric cooling factor per iteration
    #[arg(long)]
    pub rate: Option<f64>,

    /// Iteration budget
    #[arg(long)]
    pub iterations: Option<u64>,

    /// Random seed for a reproducible layout
    #[arg(long)]
    pub seed: Option<u64>,

    /// Directory for embedding.txt (default: current directory)
    #[arg(short, long)]
    pub outdir: Option<PathBuf>,

    /// JSON run configuration; explicit flags override it
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Anneal a low-dimensional layout for a saved distance matrix.
pub fn embed(args: EmbedArgs) -> Result<()> {
    let run_config = load_run_config(args.config.as_ref())?;
    let mut embed_config = run_config.embed;
    if let Some(d) = args.dim {
        embed_config.target_dim = d;
    }
    if let Some(t) = args.temperature {
        embed_config.initial_temperature = t;
    }
    if let Some(r) = args.rate {
        embed_config.cooling_rate = r;
    }
    if let Some(n) = args.iterations {
        embed_config.iterations = n;
    }
    if let Some(s) = args.seed {
        embed_config.seed = Some(s);
    }

    let dcc = artifacts::read_dcc(&args.dcc)
        .with_context(|| format!("loading distance matrix {}", args.dcc.display()))?;
    let engine = EmbeddingEngine::new(embed_config)?;
    let outcome = engine.embed(&dcc);

    let outdir = args.outdir.clone().unwrap_or_else(|| PathBuf::from("."));
    artifacts::ensure_output_dir(&outdir)?;
    artifacts::write_embedding(&outdir, &outcome.coordinates)?;

    println!("stress: {:.6}", outcome.stress);
    info!(
        clusters = dcc.dim(),
        iterations = outcome.statistics.iterations_run,
        accepted = outcome.statistics.accepted,
        uphill = outcome.statistics.accepted_uphill,
        "embedding complete"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// scan
// ---------------------------------------------------------------------------

/// Arguments for the scan command
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Input stream to measure
    pub input: PathBuf,

    /// Distance metric
    #[arg(long, value_enum, default_value = "euclidean")]
    pub metric: MetricArg,
}

/// Summarize consecutive-frame distances and suggest an rlim.
pub fn scan(args: ScanArgs) -> Result<()> {
    let mut source = TextVectorSource::open(&args.input)
        .with_context(|| format!("opening input {}", args.input.display()))?;
    let report = DistanceScan::new(args.metric.into()).scan(&mut source)?;

    println!("frames: {}", report.frames);
    println!("pairs: {}", report.pairs);
    if report.pairs > 0 {
        println!("min: {:.6}", report.min);
        println!("max: {:.6}", report.max);
        println!("mean: {:.6}", report.mean);
        println!("median: {:.6}", report.median);
        println!("p20: {:.6}", report.p20);
        println!("p80: {:.6}", report.p80);
    }
    match report.suggested_rlim() {
        Some(rlim) => println!("suggested_rlim: {rlim:.6}"),
        None => warn!("need at least two frames to suggest an rlim"),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// gen
// ---------------------------------------------------------------------------

/// Arguments for the gen command
#[derive(Args, Debug)]
pub struct GenArgs {
    /// Base point layout
    #[arg(value_enum)]
    pub pattern: PatternArg,

    /// Base points per cycle
    pub count: usize,

    /// Output file, written in the text vector format
    pub output: PathBuf,

    /// Times the base layout is replayed
    #[arg(long, default_value = "1")]
    pub repeat: usize,

    /// Per-component uniform jitter amplitude
    #[arg(long, default_value = "0.0")]
    pub noise: f64,

    /// Coordinate scale applied to the base layout
    #[arg(long, default_value = "1.0")]
    pub scale: f64,

    /// Shuffle the final stream order
    #[arg(long)]
    pub shuffle: bool,

    /// Random seed for a reproducible stream
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Generate a synthetic vector stream.
pub fn gen(args: GenArgs) -> Result<()> {
    let mut config = GeneratorConfig::new(args.pattern.into(), args.count)
        .with_repeat(args.repeat)
        .with_noise(args.noise)
        .with_scale(args.scale)
        .with_shuffle(args.shuffle);
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }

    let stream = StreamGenerator::new(config)?.generate();
    source::write_vectors(&args.output, &stream)
        .with_context(|| format!("writing {}", args.output.display()))?;

    info!(
        frames = stream.len(),
        path = %args.output.display(),
        "synthetic stream written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::Cli;
    use clap::CommandFactory;
    use clap::Parser;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cluster_args_parse() {
        let cli = Cli::try_parse_from([
            "frame-atlas",
            "cluster",
            "0.25",
            "frames.txt",
            "--anchors",
            "--dcc",
            "--max-clusters",
            "500",
        ])
        .unwrap();
        match cli.command {
            crate::Commands::Cluster(args) => {
                assert_eq!(args.rlim, 0.25);
                assert!(args.anchors);
                assert!(args.dcc);
                assert_eq!(args.max_clusters, Some(500));
                assert!(!args.no_membership);
            }
            other => panic!("parsed the wrong command: {other:?}"),
        }
    }

    #[test]
    fn locate_args_parse() {
        let cli = Cli::try_parse_from([
            "frame-atlas",
            "locate",
            "anchors.txt",
            "dcc.txt",
            "new.txt",
            "-k",
            "3",
            "--brute",
        ])
        .unwrap();
        match cli.command {
            crate::Commands::Locate(args) => {
                assert_eq!(args.neighbors, Some(3));
                assert!(args.brute);
            }
            other => panic!("parsed the wrong command: {other:?}"),
        }
    }

    #[test]
    fn gen_args_parse() {
        let cli = Cli::try_parse_from([
            "frame-atlas",
            "gen",
            "circle2d",
            "12",
            "out.txt",
            "--repeat",
            "5",
            "--seed",
            "9",
        ])
        .unwrap();
        match cli.command {
            crate::Commands::Gen(args) => {
                assert_eq!(args.count, 12);
                assert_eq!(args.repeat, 5);
                assert_eq!(args.seed, Some(9));
            }
            other => panic!("parsed the wrong command: {other:?}"),
        }
    }
}
