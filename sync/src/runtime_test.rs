#![allow(clippy::float_cmp)]

use std::time::Duration;

use super::*;
use crate::store::MemoryProjectStore;
use crate::transport::ConnectionStatus;
use frames::CanvasUpdate;

struct Harness {
    handle: SyncHandle,
    transport: mpsc::Sender<TransportEvent>,
    wire: mpsc::Receiver<Event>,
    store: Arc<MemoryProjectStore>,
}

fn element(id: &str, x: f64, y: f64) -> CanvasElement {
    let mut el = CanvasElement::create(ElementKind::Rectangle, 0);
    el.id = id.to_owned();
    el.x = x;
    el.y = y;
    el
}

fn harness() -> Harness {
    let config = SyncConfig { persist_interval: Duration::from_secs(60), ..SyncConfig::default() };
    let store = Arc::new(MemoryProjectStore::new());
    let (outbound, wire) = mpsc::channel(64);
    let (transport, inbound) = mpsc::channel(64);
    let handle = spawn_sync(config, store.clone(), "u1".into(), outbound, inbound);
    Harness { handle, transport, wire, store }
}

impl Harness {
    async fn notice(&mut self) -> Notice {
        tokio::time::timeout(Duration::from_secs(3_600), self.handle.notices.recv()).await.unwrap().unwrap()
    }

    async fn wait_for(&mut self, pred: impl Fn(&Notice) -> bool) -> Notice {
        loop {
            let notice = self.notice().await;
            if pred(&notice) {
                return notice;
            }
        }
    }

    async fn wire_event(&mut self) -> Event {
        tokio::time::timeout(Duration::from_secs(3_600), self.wire.recv()).await.unwrap().unwrap()
    }

    async fn inbound(&self, event: TransportEvent) {
        self.transport.send(event).await.unwrap();
    }

    async fn command(&self, command: Command) {
        self.handle.send(command).await.unwrap();
    }

    /// Connect, join `p1`, and seed the document with A and B.
    async fn joined(&mut self) {
        self.inbound(TransportEvent::Status(ConnectionStatus::Connected)).await;
        self.wait_for(|n| *n == Notice::Status(ConnectionStatus::Connected)).await;
        self.command(Command::Join("p1".into())).await;
        assert_eq!(self.wire_event().await, Event::JoinProject { project_id: "p1".into() });

        let elements = vec![element("a", 50.0, 50.0), element("b", 200.0, 100.0)];
        self.inbound(TransportEvent::Inbound(Event::CanvasInit { elements })).await;
        self.wait_for(|n| matches!(n, Notice::Initialized { .. })).await;
    }
}

#[tokio::test(start_paused = true)]
async fn local_move_is_broadcast_after_quiet_window() {
    let mut h = harness();
    h.joined().await;

    let started = Instant::now();
    h.command(Command::Click("a".into())).await;
    h.command(Command::BeginGesture(GestureKind::Drag)).await;
    h.command(Command::DragTo { left: 55.0, top: 52.0 }).await;
    h.command(Command::DragTo { left: 60.0, top: 55.0 }).await;
    h.command(Command::EndGesture).await;

    let Event::CanvasUpdate(update) = h.wire_event().await else {
        panic!("expected canvas-update");
    };
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(update.project_id, "p1");
    let a = update.elements.iter().find(|e| e.id == "a").unwrap();
    assert_eq!((a.x, a.y), (60.0, 55.0));
    assert!(h.wire.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn remote_update_applies_without_echo() {
    let mut h = harness();
    h.joined().await;

    let update = CanvasUpdate { project_id: "p1".into(), elements: vec![element("a", 60.0, 55.0)] };
    h.inbound(TransportEvent::Inbound(Event::CanvasUpdate(update))).await;
    h.wait_for(|n| matches!(n, Notice::RemoteApplied { .. })).await;

    let view = h.handle.view().await.unwrap();
    assert_eq!(view.elements.len(), 1);
    assert_eq!(view.elements[0].x, 60.0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(h.wire.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn reconnect_rejoins_session() {
    let mut h = harness();
    h.joined().await;

    h.inbound(TransportEvent::Status(ConnectionStatus::Disconnected)).await;
    h.inbound(TransportEvent::Status(ConnectionStatus::Connecting)).await;
    h.inbound(TransportEvent::Status(ConnectionStatus::Connected)).await;
    assert_eq!(h.wire_event().await, Event::JoinProject { project_id: "p1".into() });
}

#[tokio::test(start_paused = true)]
async fn open_project_loads_from_store() {
    let mut h = harness();
    let id = h.store.create("u1", "Demo", &[element("a", 1.0, 2.0)]).await.unwrap();

    h.command(Command::Open(id.clone())).await;
    let loaded = h.wait_for(|n| matches!(n, Notice::Loaded { .. } | Notice::LoadFailed { .. })).await;
    assert_eq!(loaded, Notice::Loaded { project_id: id.clone(), count: 1 });

    let view = h.handle.view().await.unwrap();
    assert_eq!(view.project_id.as_deref(), Some(id.as_str()));
    assert_eq!(view.elements[0].id, "a");
}

#[tokio::test(start_paused = true)]
async fn open_project_joins_after_load_and_keeps_live_init() {
    let mut h = harness();
    let id = h.store.create("u1", "Demo", &[element("a", 50.0, 50.0)]).await.unwrap();
    h.inbound(TransportEvent::Status(ConnectionStatus::Connected)).await;
    h.wait_for(|n| *n == Notice::Status(ConnectionStatus::Connected)).await;

    h.command(Command::Open(id.clone())).await;
    h.wait_for(|n| matches!(n, Notice::Loaded { .. })).await;
    assert_eq!(h.wire_event().await, Event::JoinProject { project_id: id.clone() });

    let live = vec![element("a", 60.0, 55.0), element("b", 200.0, 100.0)];
    h.inbound(TransportEvent::Inbound(Event::CanvasInit { elements: live })).await;
    h.wait_for(|n| matches!(n, Notice::Initialized { .. })).await;

    let view = h.handle.view().await.unwrap();
    assert_eq!(view.elements.len(), 2);
    assert_eq!(view.elements.iter().find(|e| e.id == "a").unwrap().x, 60.0);
}

#[tokio::test(start_paused = true)]
async fn persist_now_writes_dirty_document() {
    let mut h = harness();
    let id = h.store.create("u1", "Demo", &[]).await.unwrap();
    h.command(Command::Open(id.clone())).await;
    h.wait_for(|n| matches!(n, Notice::Loaded { .. })).await;

    h.command(Command::Add(ElementKind::Button)).await;
    h.command(Command::PersistNow).await;
    h.wait_for(|n| matches!(n, Notice::Saved { .. })).await;
    assert_eq!(h.store.get(&id).await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn persist_poll_reports_failure() {
    let mut h = harness();
    let id = h.store.create("u1", "Demo", &[]).await.unwrap();
    h.command(Command::Open(id)).await;
    h.wait_for(|n| matches!(n, Notice::Loaded { .. })).await;

    h.store.set_failing(true);
    h.command(Command::Add(ElementKind::Text)).await;
    let failed = h.wait_for(|n| matches!(n, Notice::PersistFailed { .. })).await;
    assert!(matches!(failed, Notice::PersistFailed { message, .. } if message.contains("503")));
}

#[tokio::test(start_paused = true)]
async fn property_errors_are_notified() {
    let mut h = harness();
    h.joined().await;
    h.command(Command::SetProperty { key: "x".into(), value: Value::from(1) }).await;
    let notice = h.wait_for(|n| matches!(n, Notice::EditRejected { .. })).await;
    assert_eq!(notice, Notice::EditRejected { message: "no element selected".into() });
}

#[tokio::test(start_paused = true)]
async fn save_as_and_list_projects() {
    let mut h = harness();
    h.command(Command::Add(ElementKind::Circle)).await;
    h.command(Command::SaveAs("copy".into())).await;
    let created = h.wait_for(|n| matches!(n, Notice::Created { .. })).await;
    let Notice::Created { project_id, .. } = created else { unreachable!() };

    let (tx, rx) = oneshot::channel();
    h.command(Command::ListProjects(tx)).await;
    let projects = rx.await.unwrap().unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].id, project_id);
    assert_eq!(projects[0].data.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_commands_stops_runtime() {
    let h = harness();
    let Harness { handle, .. } = h;
    let SyncHandle { commands, task, .. } = handle;
    drop(commands);
    tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
}
