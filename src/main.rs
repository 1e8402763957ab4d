use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use evplan::config::Root;
use evplan::coverage::coverage_percentage;
use evplan::engine::{self, Outcome, RunSettings};
use evplan::instance::{pune_areas, ProblemInstance};
use evplan::io::{self as out, CsvWriter};
use evplan::nsga2::GenerationStats;
use evplan::report::OptimizationRequest;
use evplan::EngineError;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::fs;
use std::ops::ControlFlow;
use std::path::Path;
use std::time::{Duration, Instant};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SCHEMA_VERSION: &str = "1.0.0";

#[derive(Parser, Debug)]
#[command(name = "evplan")]
#[command(version)]
#[command(about = "Multi-objective EV charging station placement (cost vs. coverage)")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Path to TOML configuration file (built-in defaults when omitted)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Output path
    #[arg(short, long, global = true)]
    out: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Optimize station placement and write the response payload
    Optimize {
        /// JSON optimization request overriding the config
        #[arg(long)]
        request: Option<String>,
        /// Also write the Pareto front as CSV
        #[arg(long)]
        csv: Option<String>,
        /// Override the optimizer seed
        #[arg(long)]
        seed: Option<u64>,
        /// Cancel the run after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Write a run summary with manifest next to the response
        #[arg(long)]
        json: bool,
    },
    /// Validate a configuration file
    Validate,
    /// List the built-in city areas
    Areas,
    /// Generate a synthetic problem instance as JSON
    Instance {
        /// Number of users to distribute across areas
        #[arg(long)]
        users: Option<usize>,
        /// Instance generation seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print version information
    Version,
}

// ============================================================================
// JSON Output Structures
// ============================================================================

#[derive(Serialize)]
struct Manifest {
    schema_version: String,
    engine_version: String,
    timestamp_utc: String,
    platform: String,
    config_hash: String,
    config_snapshot: Root,
}

#[derive(Serialize)]
struct RunSummary {
    manifest: Manifest,
    seed: u64,
    population_size: usize,
    generations: usize,
    coverage_radius: f64,
    metric: String,
    num_users: usize,
    num_stations: usize,
    front_size: usize,
    wall_time_ms: f64,
    history: Vec<GenerationStats>,
}

// ============================================================================
// Helper Functions
// ============================================================================

fn compute_hash(data: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

fn get_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

fn create_manifest(cfg: &Root, cfg_text: &str) -> Manifest {
    Manifest {
        schema_version: SCHEMA_VERSION.to_string(),
        engine_version: VERSION.to_string(),
        timestamp_utc: get_timestamp(),
        platform: std::env::consts::OS.to_string(),
        config_hash: compute_hash(cfg_text),
        config_snapshot: cfg.clone(),
    }
}

/// Config from `path`, or the built-in defaults serialized as the config text.
fn load_config(path: Option<&str>) -> Result<(Root, String)> {
    match path {
        Some(p) => Root::load(p),
        None => {
            let cfg = Root::default();
            let text = toml::to_string(&cfg)?;
            Ok((cfg, text))
        }
    }
}

fn load_request(path: &str) -> Result<OptimizationRequest> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read request: {}", path))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse request: {}", path))
}

fn print_top(outcome: &Outcome, top: usize) {
    eprintln!();
    eprintln!("  Top Pareto solutions:");
    eprintln!(
        "  {:>4} {:>14} {:>9} {:>9}  {}",
        "ID", "Cost", "Coverage", "Pct", "Stations"
    );
    eprintln!("  {}", "-".repeat(70));

    for point in outcome.response.pareto_front.iter().take(top) {
        let names: Vec<&str> = outcome
            .response
            .solution(point.solution_id)
            .map(|s| s.selected_stations.iter().map(|st| st.name.as_str()).collect())
            .unwrap_or_default();
        eprintln!(
            "  {:>4} {:>14.2} {:>9} {:>8.2}%  {}",
            point.solution_id,
            point.cost,
            point.coverage,
            point.coverage_percentage,
            names.join(", ")
        );
    }
}

// ============================================================================
// Commands
// ============================================================================

struct OptimizeArgs {
    out_path: String,
    request: Option<String>,
    csv: Option<String>,
    seed: Option<u64>,
    timeout_ms: Option<u64>,
    json_output: bool,
}

fn run_optimize(cfg: &Root, cfg_text: &str, args: OptimizeArgs) -> Result<()> {
    let instance = cfg.build_instance()?;
    let summary_path = if args.json_output {
        Some(out::sibling_path(Path::new(&args.out_path), "summary")?)
    } else {
        None
    };

    let mut settings: RunSettings = cfg.run_settings();
    if let Some(path) = &args.request {
        let request = load_request(path)?;
        settings = settings.with_request(&request)?;
    }
    if let Some(seed) = args.seed {
        settings.optimizer.seed = seed;
    }

    eprintln!("[evplan] starting NSGA-II optimization");
    eprintln!(
        "  Users: {}, Stations: {}, Radius: {} {}",
        instance.num_users(),
        instance.num_stations(),
        settings.coverage_radius,
        settings.metric.unit()
    );
    eprintln!(
        "  Population: {}, Generations: {}, Seed: {}",
        settings.optimizer.pop_size, settings.optimizer.generations, settings.optimizer.seed
    );

    let start = Instant::now();
    let deadline = args.timeout_ms.map(Duration::from_millis);
    let outcome = engine::run_with(&instance, &settings, |_| match deadline {
        Some(limit) if start.elapsed() >= limit => ControlFlow::Break(()),
        _ => ControlFlow::Continue(()),
    });
    let outcome = match outcome {
        Ok(o) => o,
        Err(EngineError::Cancelled { generation }) => {
            bail!(
                "run cancelled after generation {} (timeout {} ms)",
                generation,
                args.timeout_ms.unwrap_or_default()
            );
        }
        Err(e) => return Err(e.into()),
    };
    let wall_time_ms = start.elapsed().as_secs_f64() * 1000.0;

    let front = &outcome.response.pareto_front;
    eprintln!("[evplan] optimization complete");
    eprintln!("  Pareto front size: {}", front.len());
    eprintln!("  Wall time: {:.1} ms", wall_time_ms);
    if let Some(last) = outcome.result.history.last() {
        eprintln!("  Hypervolume (2D): {:.4e}", last.hypervolume);
        match last.best_full_coverage_cost {
            Some(c) => eprintln!("  Cheapest full coverage: {:.2}", c),
            None => eprintln!(
                "  Best coverage: {:.2}%",
                coverage_percentage(last.max_coverage, instance.num_users())
            ),
        }
    }

    out::write_json(&args.out_path, &outcome.response)?;
    eprintln!("[evplan] response written to: {}", args.out_path);

    if let Some(csv_path) = &args.csv {
        let mut w = CsvWriter::create(csv_path)?;
        w.write_header()?;
        for point in front {
            let solution = outcome
                .response
                .solution(point.solution_id)
                .with_context(|| format!("missing solution {}", point.solution_id))?;
            w.write_row(point, solution)?;
        }
        w.flush()?;
        eprintln!("[evplan] Pareto front CSV: {}", csv_path);
    }

    print_top(&outcome, cfg.report.top);

    if let Some(summary_path) = summary_path {
        let summary = RunSummary {
            manifest: create_manifest(cfg, cfg_text),
            seed: settings.optimizer.seed,
            population_size: settings.optimizer.pop_size,
            generations: outcome.result.generations,
            coverage_radius: settings.coverage_radius,
            metric: settings.metric.unit().to_string(),
            num_users: instance.num_users(),
            num_stations: instance.num_stations(),
            front_size: front.len(),
            wall_time_ms,
            history: outcome.result.history.clone(),
        };
        out::write_json(&summary_path, &summary)?;
        eprintln!("[evplan] JSON summary: {}", summary_path.display());
    }

    Ok(())
}

fn validate_config(cfg_path: &str) -> Result<()> {
    let (cfg, _) = Root::load(cfg_path)?;

    eprintln!("[evplan] config valid: {}", cfg_path);
    eprintln!("  program: {} v{}", cfg.evplan.program, cfg.evplan.version);
    eprintln!(
        "  optimizer: population={}, generations={}, crossover={}, mutation={:?}, seed={}",
        cfg.optimizer.population_size,
        cfg.optimizer.generations,
        cfg.optimizer.crossover_prob,
        cfg.optimizer.mutation_prob,
        cfg.optimizer.seed
    );
    eprintln!(
        "  coverage: radius={} {}",
        cfg.coverage.radius,
        cfg.coverage.metric.unit()
    );
    match cfg.instance.source.as_str() {
        "file" => eprintln!("  instance: file {:?}", cfg.instance.path),
        _ => eprintln!(
            "  instance: pune preset, users={}, seed={}",
            cfg.instance.total_users, cfg.instance.seed
        ),
    }

    Ok(())
}

fn list_areas() {
    eprintln!("  {:<16} {:>9} {:>9} {:>8}", "Area", "Lat", "Lon", "Density");
    eprintln!("  {}", "-".repeat(46));
    for area in pune_areas() {
        eprintln!(
            "  {:<16} {:>9.3} {:>9.3} {:>8}",
            area.name, area.lat, area.lon, area.density
        );
    }
}

fn write_instance(
    cfg: &Root,
    out_path: &str,
    users: Option<usize>,
    seed: Option<u64>,
) -> Result<()> {
    let total_users = users.unwrap_or(cfg.instance.total_users);
    let seed = seed.unwrap_or(cfg.instance.seed);
    let mut rng = StdRng::seed_from_u64(seed);
    let instance = ProblemInstance::generate(&pune_areas(), total_users, &mut rng);

    out::ensure_parent(Path::new(out_path))?;
    instance.write_json(out_path)?;
    eprintln!(
        "[evplan] instance written to: {} ({} users, {} stations, seed {})",
        out_path,
        instance.num_users(),
        instance.num_stations(),
        seed
    );
    Ok(())
}

fn print_version() {
    eprintln!("evplan - EV charging station placement optimizer");
    eprintln!();
    eprintln!("  Engine Version:    {}", VERSION);
    eprintln!("  Schema Version:    {}", SCHEMA_VERSION);
    eprintln!("  Platform:          {}", std::env::consts::OS);
    eprintln!("  Architecture:      {}", std::env::consts::ARCH);
    eprintln!();
    eprintln!("Optimization:");
    eprintln!("  - NSGA-II over station-selection bit vectors");
    eprintln!("  - Objectives: minimize installation cost, maximize covered users");
    eprintln!("  - Distance: planar (degrees) or haversine (km)");
}

// ============================================================================
// Main
// ============================================================================

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match args.command {
        Commands::Version => {
            print_version();
            Ok(())
        }
        Commands::Areas => {
            list_areas();
            Ok(())
        }
        Commands::Validate => {
            let cfg_path = args.config.context("--config required for validate")?;
            validate_config(&cfg_path)
        }
        Commands::Instance { users, seed } => {
            let (cfg, _) = load_config(args.config.as_deref())?;
            let out_path = args.out.unwrap_or_else(|| "results/instance.json".to_string());
            write_instance(&cfg, &out_path, users, seed)
        }
        Commands::Optimize {
            request,
            csv,
            seed,
            timeout_ms,
            json,
        } => {
            let (cfg, cfg_text) = load_config(args.config.as_deref())?;
            info!("{} v{}", cfg.evplan.program, cfg.evplan.version);
            let out_path = args.out.unwrap_or_else(|| "results/response.json".to_string());
            run_optimize(
                &cfg,
                &cfg_text,
                OptimizeArgs {
                    out_path,
                    request,
                    csv,
                    seed,
                    timeout_ms,
                    json_output: json,
                },
            )
        }
    }
}
