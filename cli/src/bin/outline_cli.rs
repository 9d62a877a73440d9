use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use outline::{
    save_contour_to_dxf, save_contour_to_geojson, MemorySink, OutlineError, ParameterRanges,
    ProcessingConfig, ScaledContour, Stage, StageOutput, StageRunner,
};
use outline_cli::{config_to_string, load_config, ConfigFormat, ConfigOverrides};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about = "Trace objects on a lightbox into scaled outlines", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trace an image into a DXF and/or GeoJSON outline
    Trace {
        /// Photograph of the object on the lightbox
        input: PathBuf,
        /// DXF output (defaults to the input name with a .dxf extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also write the outline as GeoJSON
        #[arg(long)]
        geojson: Option<PathBuf>,
        /// Write numbered debug snapshots into this directory
        #[arg(long)]
        debug_dir: Option<PathBuf>,
        #[command(flatten)]
        overrides: ConfigOverrides,
    },
    /// Stop at a checkpoint and save its image
    Stage {
        input: PathBuf,
        /// Checkpoint name (e.g. `lightbox_cropped`) or index 0-7
        #[arg(short, long, value_parser = parse_stage)]
        stage: Stage,
        /// PNG output for the checkpoint image
        #[arg(short, long)]
        output: PathBuf,
        /// Write the checkpoint contour and calibration as JSON
        #[arg(long)]
        contour_json: Option<PathBuf>,
        #[arg(long)]
        debug_dir: Option<PathBuf>,
        #[command(flatten)]
        overrides: ConfigOverrides,
    },
    /// Print the default configuration
    Params {
        #[arg(short, long, value_enum, default_value = "toml")]
        format: ConfigFormat,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print slider ranges for every tunable parameter as JSON
    Ranges,
    /// Print the JSON schema of the configuration
    Schema,
    /// Check a configuration file against the parameter ranges
    Validate {
        config: PathBuf,
    },
    /// List the pipeline checkpoints
    Stages,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Trace {
            input,
            output,
            geojson,
            debug_dir,
            overrides,
        } => {
            let output = output.unwrap_or_else(|| input.with_extension("dxf"));
            trace(&input, &output, geojson.as_deref(), debug_dir.as_deref(), &overrides)?;
        }
        Commands::Stage {
            input,
            stage,
            output,
            contour_json,
            debug_dir,
            overrides,
        } => {
            run_stage(&input, stage, &output, contour_json.as_deref(), debug_dir.as_deref(), &overrides)?;
        }
        Commands::Params { format, output } => {
            let content = config_to_string(&ProcessingConfig::default(), format)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, content)?;
                    info!("Default configuration written to {}", path.display());
                }
                None => println!("{content}"),
            }
        }
        Commands::Ranges => {
            println!("{}", serde_json::to_string_pretty(&ParameterRanges::default())?);
        }
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&ProcessingConfig::schema())?);
        }
        Commands::Validate { config } => {
            let config = load_config(&config)?;
            config.validate().map_err(report)?;
            info!("✅ Configuration is valid");
        }
        Commands::Stages => {
            for stage in Stage::ALL {
                println!("{} {:<18} {}", stage.index(), stage.to_string(), stage.description());
            }
        }
    }

    Ok(())
}

fn parse_stage(value: &str) -> Result<Stage, String> {
    if let Ok(index) = value.parse::<usize>() {
        return Stage::from_index(index).ok_or_else(|| format!("stage index must be 0-{}", Stage::COUNT - 1));
    }
    value
        .parse::<Stage>()
        .map_err(|_| format!("unknown stage `{value}`"))
}

/// Log the stable status code before handing the error to color-eyre.
fn report(err: OutlineError) -> color_eyre::Report {
    let code = err.code();
    error!(code = code.as_i32(), "{}", code.message());
    eyre!(err)
}

fn run(
    input: &Path,
    stage: Stage,
    config: &ProcessingConfig,
    debug_dir: Option<&Path>,
) -> Result<StageOutput> {
    config.validate().map_err(report)?;

    let mut sink = MemorySink::new();
    let mut progress = |fraction: f64, label: &str| {
        info!("[{:>3.0}%] {}", fraction * 100.0, label);
    };
    let mut builder = StageRunner::builder(config).progress(&mut progress);
    if debug_dir.is_some() {
        builder = builder.debug_sink(&mut sink);
    }
    let result = builder.build().run_path(input, stage);

    // Snapshots are useful even when a later stage failed
    if let Some(dir) = debug_dir {
        sink.write_to_dir(dir)?;
    }
    result.map_err(report)
}

fn trace(
    input: &Path,
    output: &Path,
    geojson: Option<&Path>,
    debug_dir: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<()> {
    let config = overrides.resolve()?;
    info!("🖼️ Tracing {}", input.display());

    let final_stage = run(input, Stage::Final, &config, debug_dir)?;
    let calibration = final_stage
        .calibration
        .ok_or_else(|| eyre!("pipeline finished without a calibration"))?;
    let traced = ScaledContour {
        contour: final_stage.contour,
        calibration,
    };

    save_contour_to_dxf(&traced.contour, traced.calibration, output).map_err(report)?;
    info!("📐 DXF written to {}", output.display());
    if let Some(path) = geojson {
        save_contour_to_geojson(&traced.contour, traced.calibration, path).map_err(report)?;
        info!("🗺️ GeoJSON written to {}", path.display());
    }

    info!(
        points = traced.contour.len(),
        area_mm2 = traced.contour.area() / (calibration.pixels_per_mm_x() * calibration.pixels_per_mm_y()),
        "✅ Outline traced"
    );
    Ok(())
}

fn run_stage(
    input: &Path,
    stage: Stage,
    output: &Path,
    contour_json: Option<&Path>,
    debug_dir: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<()> {
    let config = overrides.resolve()?;
    let result = run(input, stage, &config, debug_dir)?;

    result.image.save(output)?;
    info!("Checkpoint '{}' image written to {}", stage.name(), output.display());

    if let Some(path) = contour_json {
        let body = serde_json::json!({
            "stage": result.stage,
            "contour": result.contour,
            "calibration": result.calibration,
        });
        std::fs::write(path, serde_json::to_string_pretty(&body)?)?;
        info!("Checkpoint contour written to {}", path.display());
    }
    Ok(())
}
