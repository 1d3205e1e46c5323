use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};

use filedrop::config::StorageConfig;
use filedrop::store::{MemoryRecordStore, UploadRecordStore};
use filedrop::upload::{SimulatedTransfer, StorageTransfer, TransferStrategy, UploadController};
use filedrop::{Config, FileHandle, FileStorage, FiledropError, Result};

#[derive(Parser)]
#[command(
    name = "filedrop",
    version,
    about = "Upload files and track their progress",
    long_about = "Validate, upload and record a batch of files, then print the outcome of each."
)]
struct Cli {
    /// Files to upload.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Record store backend (overrides the configuration).
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,

    /// How files are transferred.
    #[arg(long, value_enum, default_value_t = StrategyArg::Simulated)]
    strategy: StrategyArg,

    /// Maximum number of concurrent uploads (overrides the configuration).
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Print the upload records as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Memory,
    Sqlite,
}

impl BackendArg {
    fn as_str(self) -> &'static str {
        match self {
            BackendArg::Memory => "memory",
            BackendArg::Sqlite => "sqlite",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    Simulated,
    Storage,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match Config::load_with_env(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", cli.config.display());
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    if let Some(backend) = cli.backend {
        config.storage.backend = backend.as_str().to_string();
    }
    if let Some(max) = cli.max_concurrent {
        config.upload.max_concurrent_uploads = max;
    }
    if let Err(e) = config.validate() {
        eprintln!("{e}");
        return ExitCode::from(2);
    }

    // Initialize logging
    if let Err(e) = filedrop::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        filedrop::logging::init_console_only(&config.logging.level);
    }

    match run(&cli, &config).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, config: &Config) -> Result<ExitCode> {
    let store = open_store(&config.storage).await?;
    let strategy: Arc<dyn TransferStrategy> = match cli.strategy {
        StrategyArg::Simulated => Arc::new(SimulatedTransfer::new(config.simulator.clone())),
        StrategyArg::Storage => {
            let storage = FileStorage::new(&config.storage.files_path)?;
            Arc::new(StorageTransfer::new(storage).with_chunk_size(config.storage.chunk_size_bytes()))
        }
    };
    let controller = UploadController::from_config(config, Arc::clone(&store), strategy);

    let mut accepted = Vec::new();
    for path in &cli.files {
        let handle = match FileHandle::from_path(path) {
            Ok(handle) => handle,
            Err(e) => {
                eprintln!("{}: {e}", path.display());
                continue;
            }
        };

        let rejections = controller.validator().check(&handle);
        if rejections.is_empty() {
            accepted.push(handle);
        } else {
            for rejection in rejections {
                eprintln!("{rejection}");
            }
        }
    }

    if accepted.is_empty() {
        eprintln!("No files accepted for upload.");
        return Ok(ExitCode::FAILURE);
    }

    controller.add(accepted).await;

    let mut code = ExitCode::SUCCESS;
    match controller.upload_all().await {
        Ok(summary) => {
            for message in summary.messages() {
                println!("{message}");
            }
            if summary.failed > 0 {
                code = ExitCode::FAILURE;
            }
        }
        Err(e) if e.is_informational() => println!("{e}"),
        Err(e) => {
            warn!("Upload batch failed: {e}");
            eprintln!("{e}");
            code = ExitCode::FAILURE;
        }
    }

    for file in controller.files().await {
        println!(
            "{:<32} {:>10}  {:<12} {}",
            file.name,
            file.formatted_size(),
            file.category().as_str(),
            file.status.label()
        );
    }
    println!("{}", controller.stats().await.summary_line());

    if cli.json {
        let records = store.list_all().await?;
        let json = serde_json::to_string_pretty(&records).map_err(std::io::Error::from)?;
        println!("{json}");
    }

    Ok(code)
}

async fn open_store(config: &StorageConfig) -> Result<Arc<dyn UploadRecordStore>> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryRecordStore::new())),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            info!("Using SQLite record store");
            let store = filedrop::store::SqliteRecordStore::open(&config.database_path).await?;
            Ok(Arc::new(store))
        }
        other => Err(FiledropError::Config(format!(
            "storage backend {other} is not available"
        ))),
    }
}
