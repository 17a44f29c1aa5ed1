use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use canvas::doc::{CanvasElement, validate_snapshot};
use canvas::transform::GestureKind;
use canvas_sync::config::SyncConfig;
use canvas_sync::engine::Notice;
use canvas_sync::runtime::{Command as SyncCommand, SyncHandle, connect};
use canvas_sync::store::{HttpProjectStore, ProjectStore, StoreError};
use canvas_sync::transport::ConnectionStatus;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[cfg(test)]
#[path = "main_test.rs"]
mod main_test;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("invalid document: {0}")]
    InvalidDocument(#[from] canvas::doc::SnapshotError),
    #[error("sync runtime stopped")]
    RuntimeStopped,
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("relay unreachable; gave up reconnecting")]
    Offline,
    #[error("relay rejected request ({code}): {message}")]
    Relay { code: String, message: String },
    #[error("element not found: {0}")]
    ElementNotFound(String),
    #[error("persist failed: {0}")]
    PersistFailed(String),
}

#[derive(Parser, Debug)]
#[command(name = "canvas-cli", about = "Canvas project API and live-channel CLI")]
struct Cli {
    /// Project REST API root.
    #[arg(long, env = "CANVAS_BASE_URL", default_value = "http://127.0.0.1:8080")]
    base_url: String,

    /// Relay websocket endpoint.
    #[arg(long, env = "CANVAS_WS_URL", default_value = "ws://127.0.0.1:3000/ws")]
    ws_url: String,

    /// User id that owns created projects.
    #[arg(long, env = "CANVAS_UID", default_value = "cli")]
    uid: String,

    /// Seconds to wait for the relay at each step.
    #[arg(long, default_value_t = 15)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Projects(ProjectsCommand),
    /// Join a project channel and print every accepted snapshot.
    Watch {
        project_id: String,
        /// Exit after this many snapshots.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Join a project channel, drag one element to `x`,`y`, and broadcast.
    Move {
        project_id: String,
        element_id: String,
        x: f64,
        y: f64,
        /// Also write the result to the project store.
        #[arg(long, default_value_t = false)]
        persist: bool,
    },
}

#[derive(Args, Debug)]
struct ProjectsCommand {
    #[command(subcommand)]
    command: ProjectsSubcommand,
}

#[derive(Subcommand, Debug)]
enum ProjectsSubcommand {
    List,
    Get {
        project_id: String,
    },
    Create {
        #[arg(long, default_value = "Untitled Project")]
        name: String,
        #[arg(long, help = "Element array JSON file, or - for stdin")]
        data: Option<String>,
    },
    Delete {
        project_id: String,
    },
}

struct CliContext {
    base_url: String,
    ws_url: String,
    uid: String,
    wait: Duration,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = CliContext { base_url: cli.base_url, ws_url: cli.ws_url, uid: cli.uid, wait: Duration::from_secs(cli.timeout_secs) };

    match cli.command {
        Command::Projects(projects) => run_projects(&ctx, projects).await,
        Command::Watch { project_id, limit } => run_watch(&ctx, &project_id, limit).await,
        Command::Move { project_id, element_id, x, y, persist } => {
            run_move(&ctx, &project_id, &element_id, (x, y), persist).await
        }
    }
}

// =============================================================================
// PROJECTS
// =============================================================================

async fn run_projects(ctx: &CliContext, projects: ProjectsCommand) -> Result<(), CliError> {
    let store = HttpProjectStore::new(&ctx.base_url)?;
    match projects.command {
        ProjectsSubcommand::List => {
            let records = store.list(&ctx.uid).await?;
            print_json(&serde_json::to_value(records)?)
        }
        ProjectsSubcommand::Get { project_id } => {
            let elements = store.get(&project_id).await?;
            print_json(&serde_json::to_value(elements)?)
        }
        ProjectsSubcommand::Create { name, data } => {
            let elements = match data {
                Some(source) => read_elements(&source)?,
                None => Vec::new(),
            };
            let id = store.create(&ctx.uid, &name, &elements).await?;
            print_json(&serde_json::json!({ "id": id, "name": name, "count": elements.len() }))
        }
        ProjectsSubcommand::Delete { project_id } => {
            store.delete(&project_id).await?;
            eprintln!("deleted project: {project_id}");
            Ok(())
        }
    }
}

fn read_elements(source: &str) -> Result<Vec<CanvasElement>, CliError> {
    let text = if source == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(source)?
    };
    parse_elements(&text)
}

fn parse_elements(text: &str) -> Result<Vec<CanvasElement>, CliError> {
    let elements: Vec<CanvasElement> = serde_json::from_str(text)?;
    validate_snapshot(&elements)?;
    Ok(elements)
}

// =============================================================================
// LIVE CHANNEL
// =============================================================================

fn start_sync(ctx: &CliContext) -> Result<SyncHandle, CliError> {
    let store: Arc<dyn ProjectStore> = Arc::new(HttpProjectStore::new(&ctx.base_url)?);
    Ok(connect(ctx.ws_url.clone(), SyncConfig::from_env(), store, ctx.uid.clone()))
}

/// Wait for a notice matching `pred`. Relay errors and going offline end
/// the wait early.
async fn wait_for(
    handle: &mut SyncHandle,
    wait: Duration,
    what: &'static str,
    pred: impl Fn(&Notice) -> bool,
) -> Result<Notice, CliError> {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        let notice = tokio::time::timeout_at(deadline, handle.notices.recv())
            .await
            .map_err(|_| CliError::Timeout(what))?
            .ok_or(CliError::RuntimeStopped)?;
        if pred(&notice) {
            return Ok(notice);
        }
        match notice {
            Notice::Status(ConnectionStatus::Offline) => return Err(CliError::Offline),
            Notice::RelayError { code, message } => return Err(CliError::Relay { code, message }),
            other => tracing::debug!(notice = ?other, "waiting for {what}"),
        }
    }
}

async fn send(handle: &SyncHandle, command: SyncCommand) -> Result<(), CliError> {
    handle.send(command).await.map_err(|_| CliError::RuntimeStopped)
}

async fn join(ctx: &CliContext, handle: &mut SyncHandle, project_id: &str) -> Result<(), CliError> {
    wait_for(handle, ctx.wait, "relay connection", |n| matches!(n, Notice::Status(ConnectionStatus::Connected))).await?;
    send(handle, SyncCommand::Join(project_id.to_owned())).await?;
    wait_for(handle, ctx.wait, "canvas-init", |n| matches!(n, Notice::Initialized { project_id: p, .. } if p == project_id))
        .await?;
    Ok(())
}

async fn run_watch(ctx: &CliContext, project_id: &str, limit: Option<usize>) -> Result<(), CliError> {
    let mut handle = start_sync(ctx)?;
    join(ctx, &mut handle, project_id).await?;
    eprintln!("watching {project_id}");

    let mut seen = 0_usize;
    while limit.is_none_or(|limit| seen < limit) {
        let notice = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            notice = handle.notices.recv() => notice.ok_or(CliError::RuntimeStopped)?,
        };
        if matches!(notice, Notice::RemoteApplied { .. } | Notice::Initialized { .. }) {
            seen += 1;
        }
        if let Some(line) = describe_notice(&notice) {
            println!("{line}");
        }
        if notice == Notice::Status(ConnectionStatus::Offline) {
            return Err(CliError::Offline);
        }
    }
    Ok(())
}

async fn run_move(
    ctx: &CliContext,
    project_id: &str,
    element_id: &str,
    (x, y): (f64, f64),
    persist: bool,
) -> Result<(), CliError> {
    let mut handle = start_sync(ctx)?;
    join(ctx, &mut handle, project_id).await?;

    let view = handle.view().await.ok_or(CliError::RuntimeStopped)?;
    if !view.elements.iter().any(|el| el.id == element_id) {
        return Err(CliError::ElementNotFound(element_id.to_owned()));
    }

    send(&handle, SyncCommand::Click(element_id.to_owned())).await?;
    send(&handle, SyncCommand::BeginGesture(GestureKind::Drag)).await?;
    send(&handle, SyncCommand::DragTo { left: x, top: y }).await?;
    send(&handle, SyncCommand::EndGesture).await?;

    // Give the debouncer time to flush before the socket closes.
    tokio::time::sleep(SyncConfig::from_env().debounce * 2).await;

    if persist {
        send(&handle, SyncCommand::PersistNow).await?;
        let outcome = wait_for(&mut handle, ctx.wait, "persist", |n| {
            matches!(n, Notice::Saved { .. } | Notice::PersistFailed { .. })
        })
        .await?;
        if let Notice::PersistFailed { message, .. } = outcome {
            return Err(CliError::PersistFailed(message));
        }
    }

    let view = handle.view().await.ok_or(CliError::RuntimeStopped)?;
    let moved = view.elements.iter().find(|el| el.id == element_id).ok_or_else(|| CliError::ElementNotFound(element_id.to_owned()))?;
    print_json(&serde_json::to_value(moved)?)
}

// =============================================================================
// OUTPUT
// =============================================================================

/// One-line summary of a notice, or `None` for noise.
fn describe_notice(notice: &Notice) -> Option<String> {
    let line = match notice {
        Notice::Status(status) => format!("status: {status:?}"),
        Notice::Initialized { project_id, count } => format!("init {project_id}: {count} elements"),
        Notice::RemoteApplied { project_id, count } => format!("update {project_id}: {count} elements"),
        Notice::SnapshotRejected { reason } => format!("rejected snapshot: {reason}"),
        Notice::RelayError { code, message } => format!("relay error {code}: {message}"),
        Notice::Saved { project_id, revision } => format!("saved {project_id} at revision {revision}"),
        Notice::PersistFailed { project_id, message } => format!("save of {project_id} failed: {message}"),
        _ => return None,
    };
    Some(line)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
