use clap::{Parser, Subcommand};
use dia::config::{self, DiaConfig};
use dia::imaging::rust_backend::save_rgb_png;
use dia::output;
use dia::process::{self, ProcessConfig, ProcessEvent};
use dia::reconstruct::Reconstructor;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;
use tracing_subscriber::EnvFilter;

/// Flags shared by commands that scan an input directory.
#[derive(clap::Args, Clone)]
struct InputArgs {
    /// Directory holding the image sequence (scanned recursively)
    input: PathBuf,

    /// Pair-scoring workers, used as given (default: half the CPU cores)
    #[arg(short, long)]
    workers: Option<usize>,
}

fn version_string() -> &'static str {
    let on_tag = env!("DIA_ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("DIA_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "dia")]
#[command(about = "Delta-encoded archives for image sequences")]
#[command(long_about = "\
Delta-encoded archives for image sequences

Every pair of frames is scored by how many pixels they share. Frames are
linked along the strongest scores into a spanning forest; the smallest file
of each connected group is stored as-is, every other frame as a diff against
its parent where unchanged pixels are fully transparent.

Archive layout (.dia is a plain zip):

  clip.dia
  ├── optimization_map.json    # frame ids, roots, child → parent
  ├── 0001.png                 # root: byte copy of the source
  ├── 0002.png                 # diff: RGBA, opaque where it changed
  └── scene2/0040.png          # input subdirectories are kept

Run 'dia gen-config' to generate a documented dia.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (default: dia.toml in the input directory, if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Score, plan, encode, and write a .dia archive
    Encode {
        #[command(flatten)]
        input: InputArgs,

        /// Archive path (default: <INPUT>.dia)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the manifest that `encode` would write, without writing anything
    Plan {
        #[command(flatten)]
        input: InputArgs,
    },
    /// List the frames of an archive with their parents
    List {
        /// The .dia archive
        archive: PathBuf,
    },
    /// Rebuild one frame from an archive as a PNG
    Extract {
        /// The .dia archive
        archive: PathBuf,

        /// Frame id or relative path
        frame: String,

        /// Output PNG
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print a stock dia.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Encode {
            input,
            output: archive,
        } => {
            let process_config = resolve_process_config(cli.config.as_deref(), &input)?;
            let archive = archive.unwrap_or_else(|| process::default_output_path(&input.input));

            println!("==> Encoding {}", input.input.display());
            let (tx, printer) = spawn_printer(false);
            let result = process::encode(&input.input, &archive, &process_config, Some(tx));
            printer.join().map_err(|_| "progress printer panicked")?;
            let result = result?;

            output::print_encode_summary(&result);
        }
        Command::Plan { input } => {
            let process_config = resolve_process_config(cli.config.as_deref(), &input)?;

            // stdout carries the manifest; progress goes to stderr
            let (tx, printer) = spawn_printer(true);
            let plan = process::plan(&input.input, &process_config, Some(tx));
            printer.join().map_err(|_| "progress printer panicked")?;

            println!("{}", plan?.manifest.to_json()?);
        }
        Command::List { archive } => {
            let config = archive_config(cli.config.as_deref())?;
            let reader = Reconstructor::open(&archive, &config.archive.manifest_name)?;
            output::print_frame_list(&reader.list()?);
        }
        Command::Extract {
            archive,
            frame,
            output: png,
        } => {
            let config = archive_config(cli.config.as_deref())?;
            let mut reader = Reconstructor::open(&archive, &config.archive.manifest_name)?;
            let id = reader.resolve(&frame)?;
            let image = reader.frame(id)?;
            save_rgb_png(&image, &png)?;
            println!("{} → {}", frame, png.display());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr. Default level is `warn`; each `-v` raises it one step.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load config for an input directory and apply the `-w` override.
fn resolve_process_config(
    explicit: Option<&Path>,
    input: &InputArgs,
) -> Result<ProcessConfig, config::ConfigError> {
    let dia_config = config::load_config(explicit, &input.input)?;
    Ok(ProcessConfig::from_dia_config(&dia_config).with_score_workers(input.workers))
}

/// Commands that read archives only honour an explicit `--config`.
fn archive_config(explicit: Option<&Path>) -> Result<DiaConfig, config::ConfigError> {
    match explicit {
        Some(path) => config::load_config(Some(path), Path::new(".")),
        None => Ok(DiaConfig::default()),
    }
}

/// Print progress events from a dedicated thread until the sender drops.
fn spawn_printer(to_stderr: bool) -> (Sender<ProcessEvent>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_process_event(&event) {
                if to_stderr {
                    eprintln!("{}", line);
                } else {
                    println!("{}", line);
                }
            }
        }
    });
    (tx, printer)
}
