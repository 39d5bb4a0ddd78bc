use clap::{Args, Parser, Subcommand};
use ensemble_separator_core::{
    utils, CombinationMethod, CommandBackend, EnsembleProgress, EnsembleRunner, ModelRegistry,
    OutputFormat, RoleFilter, SeparationJob, SeparationParams,
};
use std::{
    path::{Path, PathBuf},
    process,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ensemble-separator")]
#[command(about = "Multi-model audio separation ensembles", long_about = None)]
#[command(version)]
struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run several models and merge their stems per role
    Run {
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[arg(short, long = "model")]
        models: Vec<String>,

        #[arg(long, default_value = "avg_wave")]
        method: String,

        #[arg(long)]
        instrumental_only: bool,

        /// Load the whole job from a JSON file instead
        #[arg(long, conflicts_with_all = ["input", "models"])]
        job: Option<PathBuf>,

        #[command(flatten)]
        common: CommonArgs,

        #[arg(long)]
        tta: bool,
    },

    /// Separate with a single model
    Split {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        model: String,

        /// Only output this stem (e.g. Instrumental)
        #[arg(long)]
        single_stem: Option<String>,

        #[arg(long, default_value_t = 0)]
        pitch_shift: i32,

        #[arg(long)]
        override_segment_size: bool,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// List available models
    List {
        #[arg(long)]
        registry: Option<PathBuf>,
    },
}

#[derive(Args)]
struct CommonArgs {
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    #[arg(short, long, default_value = "wav")]
    format: String,

    #[arg(long, default_value_t = 256)]
    segment_size: u32,

    #[arg(long, default_value_t = 8)]
    overlap: u32,

    #[arg(long, default_value_t = 1)]
    batch_size: u32,

    #[arg(long, default_value_t = 0.9)]
    norm_threshold: f32,

    #[arg(long, default_value_t = 0.6)]
    amp_threshold: f32,

    /// Model registry JSON (defaults to the built-in list)
    #[arg(long)]
    registry: Option<PathBuf>,

    #[arg(short, long)]
    quiet: bool,
}

impl CommonArgs {
    fn params(&self) -> SeparationParams {
        SeparationParams {
            segment_size: self.segment_size,
            overlap: self.overlap,
            batch_size: self.batch_size,
            normalization_threshold: self.norm_threshold,
            amplification_threshold: self.amp_threshold,
            ..SeparationParams::default()
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            input,
            models,
            method,
            instrumental_only,
            job,
            common,
            tta,
        } => handle_run(input, models, method, instrumental_only, job, common, tta),
        Commands::Split {
            input,
            model,
            single_stem,
            pitch_shift,
            override_segment_size,
            common,
        } => handle_split(input, model, single_stem, pitch_shift, override_segment_size, common),
        Commands::List { registry } => handle_list(registry.as_deref()),
    };

    match result {
        Ok(()) => process::exit(0),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

fn load_registry(path: Option<&Path>) -> ensemble_separator_core::Result<ModelRegistry> {
    match path.map(Path::to_path_buf).or_else(utils::registry_path) {
        Some(p) => ModelRegistry::from_path(&p),
        None => ModelRegistry::embedded(),
    }
}

fn print_progress(p: &EnsembleProgress) {
    eprintln!("⏳ {:>3.0}% {}", p.fraction * 100.0, p.phase);
}

fn handle_run(
    input: Option<PathBuf>,
    models: Vec<String>,
    method: String,
    instrumental_only: bool,
    job_file: Option<PathBuf>,
    common: CommonArgs,
    tta: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let job = match job_file {
        Some(path) => {
            let json = std::fs::read_to_string(&path)?;
            serde_json::from_str::<SeparationJob>(&json)?
        }
        None => {
            let input = input.ok_or("--input is required unless --job is given")?;
            let params = SeparationParams {
                use_tta: tta,
                ..common.params()
            };
            let role_filter = if instrumental_only {
                RoleFilter::InstrumentalOnly
            } else {
                RoleFilter::AllRoles
            };
            SeparationJob::builder(input)
                .models(models)
                .params(params)
                .method(method.parse::<CombinationMethod>()?)
                .output_format(common.format.parse::<OutputFormat>()?)
                .role_filter(role_filter)
                .output_dir(&common.output)
                .build()
        }
    };

    let registry = load_registry(common.registry.as_deref())?;
    let mut runner = EnsembleRunner::new(registry, CommandBackend::from_env());
    if !common.quiet {
        runner = runner.with_progress(print_progress);

        eprintln!("🎵 Ensemble Separator");
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("Input:  {}", job.audio_path.display());
        eprintln!("Output: {}", job.output_dir.display());
        eprintln!("Models: {}", job.models.join(", "));
        eprintln!("Method: {}", job.method);
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!();
    }

    let result = runner.run(&job)?;

    if !common.quiet {
        eprintln!();
        eprintln!("✅ Ensemble completed with {}", job.method);
        if !result.skipped_models.is_empty() {
            eprintln!("⚠️  Skipped unknown models: {}", result.skipped_models.join(", "));
        }
        eprintln!();
        eprintln!("Output files:");
        if let Some(p) = &result.vocal_output {
            eprintln!("  🎤 Vocals:       {}", p.display());
        }
        if let Some(p) = &result.instrumental_output {
            eprintln!("  🎹 Instrumental: {}", p.display());
        }
    } else {
        // Quiet mode: just print paths
        for p in [&result.vocal_output, &result.instrumental_output]
            .into_iter()
            .flatten()
        {
            println!("{}", p.display());
        }
    }

    Ok(())
}

fn handle_split(
    input: PathBuf,
    model: String,
    single_stem: Option<String>,
    pitch_shift: i32,
    override_segment_size: bool,
    common: CommonArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let params = SeparationParams {
        pitch_shift,
        override_segment_size,
        single_stem,
        ..common.params()
    };
    let format = common.format.parse::<OutputFormat>()?;

    let registry = load_registry(common.registry.as_deref())?;
    let mut runner = EnsembleRunner::new(registry, CommandBackend::from_env());
    if !common.quiet {
        runner = runner.with_progress(print_progress);
    }

    let stems = runner.separate_single(&input, &model, &params, &common.output, format)?;

    for stem in &stems {
        if common.quiet {
            println!("{}", stem.path.display());
        } else {
            eprintln!("  {:<12} {}", stem.role, stem.path.display());
        }
    }

    Ok(())
}

fn handle_list(registry: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let registry = load_registry(registry)?;

    eprintln!("📋 Available Models");
    eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    for category in registry.categories() {
        eprintln!("\n{}:", category);
        for model in registry.models_in(category) {
            eprintln!("  • {}", model.key);
        }
    }

    eprintln!();
    eprintln!("Use --model <name> (repeatable) to select models");

    Ok(())
}
