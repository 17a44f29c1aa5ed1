//! Event-loop runtime: runs a [`SyncCore`] on one task.
//!
//! ARCHITECTURE
//! ============
//! One loop serializes every input onto the core: host commands, transport
//! events, the debounce deadline, the persistence poll, and store
//! completions. Store calls run on spawned tasks so the loop never waits on
//! the network; their results come back through an internal channel and are
//! checked against the current session generation by the core.
//!
//! ```text
//! commands ──┐
//! transport ─┼─▶ SyncCore ──▶ effects ──┬─▶ outbound events
//! timers ────┤                          ├─▶ store tasks ──▶ completions ─┐
//! completions┘◀─────────────────────────┘                                │
//!            ◀───────────────────────────────────────────────────────────┘
//! ```

#[cfg(test)]
#[path = "runtime_test.rs"]
mod runtime_test;

use std::sync::Arc;

use canvas::doc::{CanvasElement, ElementId, ElementKind};
use canvas::transform::{Bounds, ClickTarget, GestureKind};
use frames::Event;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::engine::{DocumentView, Effect, Notice, SyncCore};
use crate::persist::PersistTicket;
use crate::store::{ProjectRecord, ProjectStore};
use crate::transport::{TransportEvent, spawn_transport};

const COMMAND_CAPACITY: usize = 256;
const NOTICE_CAPACITY: usize = 256;
const COMPLETION_CAPACITY: usize = 64;

/// Host requests to the runtime.
#[derive(Debug)]
pub enum Command {
    Join(String),
    Open(String),
    Leave,
    Add(ElementKind),
    Click(ElementId),
    DoubleClick(ElementId),
    ClickCanvas(ClickTarget),
    SetBounds(Bounds),
    BeginGesture(GestureKind),
    EndGesture,
    DragTo { left: f64, top: f64 },
    ResizeTo { width: f64, height: f64 },
    ScaleBy { sx: f64, sy: f64 },
    RotateTo(f64),
    SetProperty { key: String, value: Value },
    DeleteSelected,
    Import(Vec<CanvasElement>),
    PersistNow,
    SaveAs(String),
    ListProjects(oneshot::Sender<Result<Vec<ProjectRecord>, String>>),
    View(oneshot::Sender<DocumentView>),
}

/// Store results flowing back into the loop.
enum Completion {
    Load { generation: u64, project_id: String, result: Result<Vec<CanvasElement>, String> },
    Persist { ticket: PersistTicket, result: Result<(), String> },
    Create { generation: u64, name: String, result: Result<String, String> },
}

/// Handle to a running sync runtime.
pub struct SyncHandle {
    pub commands: mpsc::Sender<Command>,
    pub notices: mpsc::Receiver<Notice>,
    pub task: JoinHandle<()>,
}

impl SyncHandle {
    /// Queue a command.
    ///
    /// # Errors
    ///
    /// Returns the command back if the runtime has stopped.
    pub async fn send(&self, command: Command) -> Result<(), Box<mpsc::error::SendError<Command>>> {
        self.commands.send(command).await.map_err(Box::new)
    }

    /// Fetch a copy of the current state. `None` if the runtime has stopped.
    pub async fn view(&self) -> Option<DocumentView> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(Command::View(tx)).await.ok()?;
        rx.await.ok()
    }
}

/// Connect to the relay at `ws_url` and start syncing.
#[must_use]
pub fn connect(ws_url: String, config: SyncConfig, store: Arc<dyn ProjectStore>, uid: String) -> SyncHandle {
    let transport = spawn_transport(ws_url, &config);
    spawn_sync(config, store, uid, transport.outbound, transport.events)
}

/// Start the runtime over an existing pair of transport channels.
#[must_use]
pub fn spawn_sync(
    config: SyncConfig,
    store: Arc<dyn ProjectStore>,
    uid: String,
    outbound: mpsc::Sender<Event>,
    inbound: mpsc::Receiver<TransportEvent>,
) -> SyncHandle {
    let (commands, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
    let (notices_tx, notices) = mpsc::channel(NOTICE_CAPACITY);
    let (completions, completions_rx) = mpsc::channel(COMPLETION_CAPACITY);
    let runtime = Runtime { core: SyncCore::new(&config), store, uid, outbound, notices: notices_tx, completions };
    let task = tokio::spawn(runtime.run(config, commands_rx, inbound, completions_rx));
    SyncHandle { commands, notices, task }
}

struct Runtime {
    core: SyncCore,
    store: Arc<dyn ProjectStore>,
    uid: String,
    outbound: mpsc::Sender<Event>,
    notices: mpsc::Sender<Notice>,
    completions: mpsc::Sender<Completion>,
}

impl Runtime {
    async fn run(
        mut self,
        config: SyncConfig,
        mut commands: mpsc::Receiver<Command>,
        mut inbound: mpsc::Receiver<TransportEvent>,
        mut completions_rx: mpsc::Receiver<Completion>,
    ) {
        let mut persist_tick = tokio::time::interval_at(Instant::now() + config.persist_interval, config.persist_interval);
        persist_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut transport_open = true;

        info!(debounce_ms = config.debounce.as_millis(), persist_ms = config.persist_interval.as_millis(), "sync runtime started");
        loop {
            let deadline = self.core.next_deadline();
            let effects = tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.apply(command),
                    None => break,
                },
                event = inbound.recv(), if transport_open => match event {
                    Some(TransportEvent::Status(status)) => self.core.set_status(status),
                    Some(TransportEvent::Inbound(event)) => self.core.handle_event(event, Instant::now()),
                    None => {
                        debug!("transport channel closed");
                        transport_open = false;
                        Vec::new()
                    }
                },
                () = sleep_until(deadline) => self.core.tick(Instant::now()),
                _ = persist_tick.tick() => self.core.persist_due(),
                Some(done) = completions_rx.recv() => self.complete(done),
            };
            self.execute(effects);
        }
        info!("sync runtime stopped");
    }

    fn apply(&mut self, command: Command) -> Vec<Effect> {
        let now = Instant::now();
        let core = &mut self.core;
        match command {
            Command::Join(project_id) => return core.join(&project_id),
            Command::Open(project_id) => return core.open_project(&project_id),
            Command::Leave => {
                core.leave();
            }
            Command::Add(kind) => {
                core.add(kind, now);
            }
            Command::Click(id) => {
                core.click(&id);
            }
            Command::DoubleClick(id) => {
                core.double_click(&id);
            }
            Command::ClickCanvas(target) => {
                core.click_canvas(target);
            }
            Command::SetBounds(bounds) => core.set_bounds(bounds),
            Command::BeginGesture(kind) => {
                core.begin_gesture(kind);
            }
            Command::EndGesture => {
                core.end_gesture();
            }
            Command::DragTo { left, top } => {
                core.drag_to(left, top, now);
            }
            Command::ResizeTo { width, height } => {
                core.resize_to(width, height, now);
            }
            Command::ScaleBy { sx, sy } => {
                core.scale_by(sx, sy, now);
            }
            Command::RotateTo(degrees) => {
                core.rotate_to(degrees, now);
            }
            Command::SetProperty { key, value } => {
                if let Err(e) = core.set_property(&key, value, now) {
                    debug!(%key, error = %e, "property edit rejected");
                    return vec![Effect::Notify(Notice::EditRejected { message: e.to_string() })];
                }
            }
            Command::DeleteSelected => {
                core.delete_selected(now);
            }
            Command::Import(elements) => {
                core.import(elements, now);
            }
            Command::PersistNow => return core.persist_due(),
            Command::SaveAs(name) => return core.save_as(&name),
            Command::ListProjects(reply) => list_projects(Arc::clone(&self.store), self.uid.clone(), reply),
            Command::View(reply) => {
                if reply.send(core.view()).is_err() {
                    debug!("view requester went away");
                }
            }
        }
        Vec::new()
    }

    fn complete(&mut self, done: Completion) -> Vec<Effect> {
        match done {
            Completion::Load { generation, project_id, result } => self.core.load_completed(generation, &project_id, result),
            Completion::Persist { ticket, result } => self.core.persist_completed(&ticket, result),
            Completion::Create { generation, name, result } => self.core.create_completed(generation, &name, result),
        }
    }

    fn execute(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send(event) => self.send(event),
                Effect::Notify(notice) => self.notify(notice),
                Effect::Persist { ticket, elements } => {
                    let store = Arc::clone(&self.store);
                    let completions = self.completions.clone();
                    tokio::spawn(async move {
                        let result = store.update(&ticket.project_id, &elements).await.map_err(|e| e.to_string());
                        deliver(&completions, Completion::Persist { ticket, result }).await;
                    });
                }
                Effect::Load { generation, project_id } => {
                    let store = Arc::clone(&self.store);
                    let completions = self.completions.clone();
                    tokio::spawn(async move {
                        let result = store.get(&project_id).await.map_err(|e| e.to_string());
                        deliver(&completions, Completion::Load { generation, project_id, result }).await;
                    });
                }
                Effect::Create { generation, name, elements } => {
                    let store = Arc::clone(&self.store);
                    let completions = self.completions.clone();
                    let uid = self.uid.clone();
                    tokio::spawn(async move {
                        let result = store.create(&uid, &name, &elements).await.map_err(|e| e.to_string());
                        deliver(&completions, Completion::Create { generation, name, result }).await;
                    });
                }
            }
        }
    }

    fn send(&self, event: Event) {
        let name = event.name();
        match self.outbound.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => warn!(event = name, "outbound queue full; event dropped"),
            Err(mpsc::error::TrySendError::Closed(_)) => debug!(event = name, "transport closed; event dropped"),
        }
    }

    fn notify(&self, notice: Notice) {
        match self.notices.try_send(notice) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(n)) => warn!(notice = ?n, "notice queue full; notice dropped"),
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

fn list_projects(store: Arc<dyn ProjectStore>, uid: String, reply: oneshot::Sender<Result<Vec<ProjectRecord>, String>>) {
    tokio::spawn(async move {
        let result = store.list(&uid).await.map_err(|e| e.to_string());
        if reply.send(result).is_err() {
            debug!("project list requester went away");
        }
    });
}

async fn deliver(completions: &mpsc::Sender<Completion>, done: Completion) {
    if completions.send(done).await.is_err() {
        debug!("runtime stopped before store completion");
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
