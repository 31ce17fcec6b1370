use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use recsync_core::app::{SynchronizerBuilder, UploadTask};
use recsync_core::domain::{LocalId, PassScope, RemoteFolderReference};
use recsync_core::host::{DefaultDecider, ExistingWork, HostOptions, SyncHost, WorkRequest};
use recsync_core::impls::{FileDestinationStore, FsCatalog, TracingStatusSink};
use recsync_core::ports::{DestinationStore, FanoutStatusSink, SystemClock, UlidGenerator};
use recsync_core::settings::Settings;

mod console;

use console::{ConsoleStatusSink, exit_code, print_report};

#[derive(Debug, Parser)]
#[command(name = "recsync", version, about = "Push local recordings to a Google Drive (or plain directory) folder")]
struct Cli {
    /// Settings file (default: <config dir>/recsync/config.toml)
    #[arg(long, global = true, env = "RECSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides `recordings_dir` from the settings file
    #[arg(long, global = true, env = "RECSYNC_RECORDINGS_DIR")]
    recordings_dir: Option<PathBuf>,

    /// -v: debug, -vv: trace
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload every recording missing from the destination folder
    Sync {
        /// Keep retrying transient failures with backoff until done
        #[arg(long)]
        wait: bool,

        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Upload one recording by its local id
    Upload {
        local_id: String,

        #[arg(long)]
        json: bool,
    },

    /// List recordings that the next sync would upload
    Pending,

    /// Copy an audio file into the recordings directory
    Import {
        file: PathBuf,

        /// Upload it right away
        #[arg(long)]
        upload: bool,
    },

    /// Manage the destination folder
    Destination {
        #[command(subcommand)]
        action: DestinationAction,
    },
}

#[derive(Debug, Subcommand)]
enum DestinationAction {
    /// Select the folder recordings are uploaded to
    Set { folder: String },
    Show,
    Clear,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "recsync=info,recsync_core=info",
        1 => "recsync=debug,recsync_core=debug",
        _ => "recsync=trace,recsync_core=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let settings = load_settings(&cli)?;
    let destinations = FileDestinationStore::new(&settings.state_file);

    match cli.command {
        Command::Destination { action } => {
            destination(&destinations, action)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Pending => {
            let task = upload_task(&settings, Arc::new(destinations))?;
            let pending = task.pending(&PassScope::All).await?;
            if pending.is_empty() {
                println!("nothing to upload");
            }
            for artifact in pending {
                println!("{}\t{}", artifact.local_id, artifact.display_name);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Import { file, upload } => {
            let catalog = FsCatalog::new(&settings.recordings_dir);
            let artifact = catalog
                .import(&settings.namespace, &file)
                .await
                .with_context(|| format!("failed to import {}", file.display()))?;
            println!("imported {} as {}", file.display(), artifact.display_name);
            if !upload {
                return Ok(ExitCode::SUCCESS);
            }
            let request = WorkRequest::upload(artifact.local_id);
            run_work(&settings, destinations, request, true, false).await
        }
        Command::Sync { wait, json } => {
            run_work(&settings, destinations, WorkRequest::sync_all(), wait, json).await
        }
        Command::Upload { local_id, json } => {
            let request = WorkRequest::upload(LocalId::new(local_id));
            run_work(&settings, destinations, request, true, json).await
        }
    }
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => Settings::default_path(),
    };
    let mut settings = match path {
        Some(path) => Settings::load(&path)?,
        None => Settings::default(),
    };
    if let Some(dir) = &cli.recordings_dir {
        settings.recordings_dir = dir.clone();
    }
    Ok(settings)
}

fn destination(store: &FileDestinationStore, action: DestinationAction) -> Result<()> {
    match action {
        DestinationAction::Set { folder } => {
            let Some(reference) = RemoteFolderReference::parse(folder) else {
                bail!("folder name must not be blank");
            };
            store.save(&reference)?;
            println!("destination set to {reference}");
        }
        DestinationAction::Show => match store.load()? {
            Some(reference) => println!("{reference}"),
            None => println!("no destination selected"),
        },
        DestinationAction::Clear => {
            store.clear()?;
            println!("destination cleared");
        }
    }
    Ok(())
}

fn upload_task(settings: &Settings, destinations: Arc<dyn DestinationStore>) -> Result<UploadTask> {
    let catalog = Arc::new(FsCatalog::new(&settings.recordings_dir));
    let remote = settings.remote_store()?;
    let status = FanoutStatusSink::new()
        .with(Arc::new(TracingStatusSink))
        .with(Arc::new(ConsoleStatusSink));
    let synchronizer = SynchronizerBuilder::new(catalog, remote)
        .namespace(settings.namespace.clone())
        .parent(settings.remote.parent.clone())
        .status_sink(Arc::new(status))
        .build()?;
    Ok(UploadTask::new(
        Arc::new(synchronizer),
        destinations,
        settings.credential_provider(),
    ))
}

/// Run one named work on an in-process host until it is terminal.
///
/// `retry = false` で 1 回だけ実行する。Ctrl-C は実行中の pass をキャンセルする。
async fn run_work(
    settings: &Settings,
    destinations: FileDestinationStore,
    request: WorkRequest,
    retry: bool,
    json: bool,
) -> Result<ExitCode> {
    let task = upload_task(settings, Arc::new(destinations))?;
    let options = HostOptions {
        max_attempts: if retry { settings.retry.max_attempts } else { 1 },
        decider: Arc::new(DefaultDecider::new(settings.retry_policy())),
    };
    let host = SyncHost::spawn(
        Arc::new(task),
        Arc::new(UlidGenerator::new(SystemClock)),
        options,
    );

    let name = request.name.clone();
    let handle = host.submit(request, ExistingWork::Keep).await?;
    info!(work_id = %handle.work_id(), name = %name, "work submitted");

    let wait = handle.wait();
    tokio::pin!(wait);
    let report = tokio::select! {
        report = &mut wait => report?,
        _ = tokio::signal::ctrl_c() => {
            warn!(name = %name, "interrupted, cancelling");
            host.cancel(&name).await;
            wait.await?
        }
    };
    host.shutdown().await;

    print_report(&report, json)?;
    Ok(exit_code(&report))
}
