use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facedb_cli::config::Config;
use facedb_cli::notice::Notice;
use facedb_cli::shell::Shell;
use facedb_core::{EncodingStore, FaceService, Matcher, OnnxProvider};
use facedb_hw::{Camera, Frame, FrameSource, StillImage};
use facedb_store::SqliteStore;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

type Service = FaceService<OnnxProvider, SqliteStore, Box<dyn Matcher>>;

#[derive(Parser)]
#[command(name = "facedb", about = "Register faces and recognize them against a local database")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive session on the camera (default)
    Shell {
        /// Use a still image instead of the camera
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Register the face in one captured frame
    Register {
        /// Name to store with the face
        #[arg(short, long)]
        label: String,
        /// Use a still image instead of the camera
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Recognize the face in one captured frame
    Recognize {
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// List registered faces
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List V4L2 capture devices
    Devices,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command.unwrap_or(Commands::Shell { image: None }) {
        Commands::Shell { image } => {
            let service = build_service(&config)?;
            let service = match image {
                Some(path) => run_shell(StillImage::open(path)?, service)?,
                None => run_shell(open_camera(&config)?, service)?,
            };
            service.into_store().close()?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Register { label, image } => {
            let mut service = build_service(&config)?;
            let frame = grab_from(&config, image)?;
            let notice = Notice::for_register(&service.register(&label, &frame.image));
            finish(service, notice)
        }
        Commands::Recognize { image } => {
            let mut service = build_service(&config)?;
            let frame = grab_from(&config, image)?;
            let notice = Notice::for_recognize(&service.recognize(&frame.image));
            finish(service, notice)
        }
        Commands::List { json } => {
            if !config.db_path.exists() {
                println!("No face database at {}", config.db_path.display());
                return Ok(ExitCode::SUCCESS);
            }
            let store = SqliteStore::open_read_only(&config.db_path)?;
            let records = store.scan_all()?;
            if json {
                let rows: Vec<_> = records
                    .iter()
                    .map(|r| {
                        serde_json::json!({
                            "id": r.id,
                            "label": r.label,
                            "dimension": r.embedding.dimension(),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if records.is_empty() {
                println!("No faces registered in {}", config.db_path.display());
            } else {
                for r in &records {
                    println!("{:>6}  {:<24} dim={}", r.id, r.label, r.embedding.dimension());
                }
            }
            store.close()?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No V4L2 capture devices found");
            }
            for d in devices {
                println!("{}  {} ({}, {})", d.path, d.name, d.driver, d.bus);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_service(config: &Config) -> Result<Service> {
    let provider = OnnxProvider::load(&config.model_dir)
        .with_context(|| format!("loading models from {}", config.model_dir.display()))?;
    let store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("opening face database {}", config.db_path.display()))?;
    tracing::info!(
        strategy = %config.match_strategy,
        tolerance = config.tolerance,
        "matcher configured"
    );
    if config.is_strict_for_onnx() {
        tracing::warn!(
            tolerance = config.tolerance,
            recommended = OnnxProvider::recommended_tolerance(),
            "tolerance is strict for unit-length ArcFace embeddings; genuine matches may be rejected"
        );
    }
    Ok(FaceService::with_matcher(
        provider,
        store,
        config.match_strategy.matcher(),
        config.tolerance,
    ))
}

fn open_camera(config: &Config) -> Result<Camera> {
    let camera = Camera::open(&config.camera_device)?;
    camera.warm_up(config.warmup_frames)?;
    Ok(camera)
}

fn grab_from(config: &Config, image: Option<PathBuf>) -> Result<Frame> {
    match image {
        Some(path) => grab_one(StillImage::open(path)?),
        None => grab_one(open_camera(config)?),
    }
}

fn grab_one<F: FrameSource>(mut source: F) -> Result<Frame> {
    let frame = source
        .grab()
        .with_context(|| format!("capturing from {}", source.describe()))?;
    if frame.is_dark() {
        tracing::warn!(brightness = frame.avg_brightness(), "captured frame is very dark");
    }
    Ok(frame)
}

fn run_shell<F: FrameSource>(source: F, service: Service) -> Result<Service> {
    let mut shell = Shell::new(source, service);
    shell.run(io::stdin().lock(), &mut io::stdout().lock())?;
    Ok(shell.into_service())
}

fn finish(service: Service, notice: Notice) -> Result<ExitCode> {
    println!("{notice}");
    service.into_store().close()?;
    Ok(if notice.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
