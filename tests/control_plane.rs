use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

use servicevisor::{
    BackoffPolicy, CheckResult, Collaborator, CollaboratorError, Config, ControlSurface, EventKind,
    Health, OperationOutcome, RestartError, RuntimeError, ServiceStatus, Supervisor, api,
};

/// Scriptable collaborator counting every call.
struct Fake {
    name: &'static str,
    healthy: AtomicBool,
    start_fails: AtomicBool,
    start_heals: bool,
    start_delay: Duration,
    probe_delay: Duration,
    self_test: Option<&'static str>,
    probes: AtomicUsize,
    probes_done: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl Fake {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            healthy: AtomicBool::new(true),
            start_fails: AtomicBool::new(false),
            start_heals: true,
            start_delay: Duration::ZERO,
            probe_delay: Duration::ZERO,
            self_test: None,
            probes: AtomicUsize::new(0),
            probes_done: AtomicUsize::new(0),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        }
    }

    fn unhealthy(self) -> Self {
        self.healthy.store(false, Ordering::SeqCst);
        self
    }

    fn failing_start(self) -> Self {
        self.start_fails.store(true, Ordering::SeqCst);
        self
    }

    fn slow_start(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    /// `start()` succeeds but the service stays unhealthy.
    fn stays_down(mut self) -> Self {
        self.start_heals = false;
        self
    }

    fn slow_probe(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }

    fn with_self_test(mut self, details: &'static str) -> Self {
        self.self_test = Some(details);
        self
    }

    fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    fn set_start_fails(&self, fails: bool) {
        self.start_fails.store(fails, Ordering::SeqCst);
    }

    fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    fn probes_done(&self) -> usize {
        self.probes_done.load(Ordering::SeqCst)
    }

    fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Collaborator for Fake {
    fn name(&self) -> &str {
        self.name
    }

    async fn probe(&self) -> Health {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if !self.probe_delay.is_zero() {
            tokio::time::sleep(self.probe_delay).await;
        }
        let health = if self.healthy.load(Ordering::SeqCst) {
            Health::healthy("connected")
        } else {
            Health::unhealthy("disconnected")
        };
        self.probes_done.fetch_add(1, Ordering::SeqCst);
        health
    }

    async fn start(&self) -> Result<(), CollaboratorError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if !self.start_delay.is_zero() {
            tokio::time::sleep(self.start_delay).await;
        }
        if self.start_fails.load(Ordering::SeqCst) {
            return Err(CollaboratorError::new("session expired"));
        }
        if self.start_heals {
            self.healthy.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), CollaboratorError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.healthy.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn self_test(&self) -> Option<Result<String, CollaboratorError>> {
        self.self_test.map(|d| Ok(d.to_string()))
    }
}

fn fast_config() -> Config {
    Config {
        tick_interval: Duration::from_millis(10),
        probe_timeout: Duration::from_millis(200),
        connect_attempts: 1,
        ..Config::default()
    }
}

fn control_for(cfg: Config, fakes: &[Arc<Fake>]) -> ControlSurface {
    let sup = Supervisor::builder(cfg)
        .with_collaborators(fakes.iter().map(|f| Arc::clone(f) as Arc<dyn Collaborator>))
        .build()
        .expect("valid wiring");
    ControlSurface::new(sup)
}

fn spawn_run(
    sup: &Arc<Supervisor>,
    token: &CancellationToken,
) -> tokio::task::JoinHandle<Result<(), RuntimeError>> {
    let sup = Arc::clone(sup);
    let token = token.clone();
    tokio::spawn(async move { sup.run(token).await })
}

async fn eventually(what: &str, cond: impl Fn() -> bool) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition never held: {what}");
}

#[tokio::test]
async fn test_concurrent_restarts_share_one_attempt() {
    let db = Arc::new(Fake::new("database").slow_start(Duration::from_millis(50)));
    let control = control_for(Config::default(), &[db.clone()]);

    let (a, b) = tokio::join!(control.restart("database"), control.restart("database"));

    assert_eq!(a, b);
    assert!(a.success);
    assert_eq!(a.attempt, 1);
    assert_eq!(db.stops(), 1);
    assert_eq!(db.starts(), 1);
    assert_eq!(
        control.supervisor().registry().status_of("database"),
        Some(ServiceStatus::Connecting)
    );
}

#[tokio::test]
async fn test_restart_of_unknown_service_is_reported() {
    let control = control_for(Config::default(), &[Arc::new(Fake::new("database"))]);

    let outcome = control.restart("nope").await;

    assert!(!outcome.success);
    assert_eq!(
        outcome.error,
        Some(RestartError::UnknownService { name: "nope".into() })
    );
    assert!(control.supervisor().registry().get("nope").is_none());
}

#[tokio::test]
async fn test_start_all_reports_partial_failure() {
    let db = Arc::new(Fake::new("database"));
    let catalog = Arc::new(Fake::new("catalog").slow_start(Duration::from_millis(500)));
    let chat = Arc::new(Fake::new("whatsapp"));
    let cfg = Config {
        lifecycle_timeout: Duration::from_millis(50),
        ..Config::default()
    };
    let control = control_for(cfg, &[db.clone(), catalog.clone(), chat.clone()]);

    let report = control.start_all().await;

    assert!(!report.success);
    assert_eq!(report.outcome("database"), Some(&OperationOutcome::Ok));
    assert_eq!(report.outcome("whatsapp"), Some(&OperationOutcome::Ok));
    assert!(matches!(report.outcome("catalog"), Some(OperationOutcome::Error { .. })));

    let registry = control.supervisor().registry();
    assert_eq!(registry.status_of("database"), Some(ServiceStatus::Connecting));
    assert_eq!(registry.status_of("catalog"), Some(ServiceStatus::Error));
    assert_eq!(registry.status_of("whatsapp"), Some(ServiceStatus::Connecting));
    assert_eq!(chat.starts(), 1);
}

#[tokio::test]
async fn test_failed_restarts_back_off() {
    let chat = Arc::new(Fake::new("whatsapp").failing_start());
    let control = control_for(Config::default(), &[chat.clone()]);

    let mut delays = Vec::new();
    for expected_attempt in 1..=3 {
        let outcome = control.restart("whatsapp").await;
        assert!(!outcome.success);
        assert_eq!(outcome.attempt, expected_attempt);
        delays.push(outcome.retry_in.expect("failed restart schedules a retry"));
    }

    assert_eq!(
        delays,
        vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)]
    );
    assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    assert!(delays.iter().all(|d| *d <= Duration::from_secs(60)));
    assert_eq!(
        control.supervisor().registry().status_of("whatsapp"),
        Some(ServiceStatus::Error)
    );
}

#[tokio::test]
async fn test_run_detects_failure_and_restarts() {
    let db = Arc::new(Fake::new("database"));
    let control = control_for(fast_config(), &[db.clone()]);
    let sup = Arc::clone(control.supervisor());

    let token = CancellationToken::new();
    let runner = tokio::spawn({
        let sup = Arc::clone(&sup);
        let token = token.clone();
        async move { sup.run(token).await }
    });

    eventually("database running", || {
        sup.registry().status_of("database") == Some(ServiceStatus::Running)
    })
    .await;

    db.set_healthy(false);
    eventually("automatic restart", || db.starts() >= 1).await;
    eventually("database back to running", || {
        sup.registry().status_of("database") == Some(ServiceStatus::Running)
    })
    .await;
    assert_eq!(db.stops(), 1);

    token.cancel();
    runner.await.expect("join").expect("clean shutdown");
    assert!(sup.broadcaster().is_closed());
}

#[tokio::test]
async fn test_stopped_services_are_not_probed() {
    let db = Arc::new(Fake::new("database"));
    let control = control_for(fast_config(), &[db.clone()]);
    let sup = Arc::clone(control.supervisor());

    let token = CancellationToken::new();
    let runner = tokio::spawn({
        let sup = Arc::clone(&sup);
        let token = token.clone();
        async move { sup.run(token).await }
    });
    eventually("first probe", || db.probes() > 0).await;

    let report = control.stop_all().await;
    assert!(report.success);
    tokio::time::sleep(Duration::from_millis(30)).await;
    let probes = db.probes();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(db.probes(), probes);
    assert_eq!(sup.registry().status_of("database"), Some(ServiceStatus::Stopped));
    assert_eq!(db.starts(), 0);

    token.cancel();
    runner.await.expect("join").expect("clean shutdown");
}

#[tokio::test]
async fn test_subscribers_resync_from_snapshot() {
    let control = control_for(Config::default(), &[Arc::new(Fake::new("database"))]);
    let sup = Arc::clone(control.supervisor());
    sup.logs().info("a");
    sup.logs().info("b");
    sup.logs().info("c");

    let mut sub = control.subscribe(2);
    let first = sub.recv().await.expect("snapshot");
    match &first.kind {
        EventKind::StatusUpdate(snap) => {
            assert_eq!(snap.status_of("database"), Some(ServiceStatus::Unknown));
        }
        other => panic!("expected snapshot first, got {other:?}"),
    }
    let mut backlog = Vec::new();
    for _ in 0..2 {
        match &sub.recv().await.expect("backlog").kind {
            EventKind::LogAppend(entry) => backlog.push(entry.message.clone()),
            other => panic!("expected backlog entry, got {other:?}"),
        }
    }
    assert_eq!(backlog, vec!["b", "c"]);

    sup.registry().upsert("database", ServiceStatus::Running, "connected");
    let live = sub.recv().await.expect("live update");
    assert!(live.is_status_update());
    assert!(live.seq > first.seq);
    drop(sub);

    let mut again = control.subscribe(0);
    match &again.recv().await.expect("snapshot").kind {
        EventKind::StatusUpdate(snap) => {
            assert_eq!(snap.status_of("database"), Some(ServiceStatus::Running));
        }
        other => panic!("expected snapshot first, got {other:?}"),
    }
    assert!(again.try_recv().is_none());
}

#[tokio::test]
async fn test_diagnostic_reports_pass_fail_and_skip() {
    let db = Arc::new(Fake::new("database").with_self_test("ping answered in 3ms"));
    let chat = Arc::new(Fake::new("whatsapp").unhealthy().with_self_test("unused"));
    let catalog = Arc::new(Fake::new("catalog"));
    let control = control_for(Config::default(), &[db, chat, catalog]);

    let checks = control.diagnostic().await;
    let result = |name: &str| {
        checks
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.result)
            .unwrap_or_else(|| panic!("missing check {name}"))
    };

    assert_eq!(checks.len(), 6);
    assert_eq!(result("database probe"), CheckResult::Pass);
    assert_eq!(result("database self-test"), CheckResult::Pass);
    assert_eq!(result("whatsapp probe"), CheckResult::Fail);
    assert_eq!(result("whatsapp self-test"), CheckResult::Skip);
    assert_eq!(result("catalog probe"), CheckResult::Pass);
    assert_eq!(result("catalog self-test"), CheckResult::Skip);

    let snapshot = control.supervisor().registry().snapshot();
    assert!(snapshot.services.values().all(|r| r.status == ServiceStatus::Unknown));
}

#[tokio::test]
async fn test_shutdown_reports_stuck_restarts() {
    let db = Arc::new(Fake::new("database").slow_start(Duration::from_secs(5)));
    let cfg = Config {
        grace: Duration::from_millis(50),
        ..Config::default()
    };
    let control = control_for(cfg, &[db.clone()]);
    let sup = Arc::clone(control.supervisor());

    let pending = tokio::spawn({
        let control = control.clone();
        async move { control.restart("database").await }
    });
    eventually("restart in flight", || db.starts() == 1).await;

    let token = CancellationToken::new();
    token.cancel();
    match sup.run(token).await {
        Err(RuntimeError::GraceExceeded { stuck, .. }) => assert_eq!(stuck, vec!["database"]),
        other => panic!("expected grace exceeded, got {other:?}"),
    }
    pending.abort();
}

#[tokio::test]
async fn test_run_twice_is_rejected() {
    let control = control_for(fast_config(), &[Arc::new(Fake::new("database"))]);
    let sup = Arc::clone(control.supervisor());

    let token = CancellationToken::new();
    let runner = tokio::spawn({
        let sup = Arc::clone(&sup);
        let token = token.clone();
        async move { sup.run(token).await }
    });
    eventually("loop started", || {
        sup.logs().recent(10).iter().any(|e| e.message.starts_with("Monitoring started"))
    })
    .await;

    let second = sup.run(CancellationToken::new()).await;
    assert!(matches!(second, Err(RuntimeError::AlreadyRunning)));

    token.cancel();
    runner.await.expect("join").expect("clean shutdown");
}

#[tokio::test]
async fn test_http_surface() {
    let control = control_for(Config::default(), &[Arc::new(Fake::new("database"))]);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let base = format!("http://{}", listener.local_addr().expect("addr"));
    let server = tokio::spawn(async move { axum::serve(listener, api::router(control)).await });
    let client = reqwest::Client::new();

    let health = client.get(format!("{base}/health")).send().await.expect("health");
    assert!(health.status().is_success());

    let status: serde_json::Value = client
        .get(format!("{base}/api/control/status"))
        .send()
        .await
        .expect("status")
        .json()
        .await
        .expect("status json");
    assert_eq!(status["services"]["database"]["status"], "unknown");
    assert!(status["system"]["cpus"].as_u64().is_some());

    let missing = client
        .post(format!("{base}/api/control/restart/nope"))
        .send()
        .await
        .expect("restart");
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

    let restarted: serde_json::Value = client
        .post(format!("{base}/api/control/restart/database"))
        .send()
        .await
        .expect("restart")
        .json()
        .await
        .expect("restart json");
    assert_eq!(restarted["success"], true);
    assert_eq!(restarted["service"], "database");

    let logs: Vec<serde_json::Value> = client
        .get(format!("{base}/api/control/logs?limit=1"))
        .send()
        .await
        .expect("logs")
        .json()
        .await
        .expect("logs json");
    assert_eq!(logs.len(), 1);

    server.abort();
}

#[tokio::test]
async fn test_tick_waits_out_the_backoff_window() {
    let chat = Arc::new(Fake::new("whatsapp"));
    let cfg = Config {
        backoff: BackoffPolicy::constant(Duration::from_millis(400)),
        ..fast_config()
    };
    let control = control_for(cfg, &[chat.clone()]);
    let sup = Arc::clone(control.supervisor());

    let token = CancellationToken::new();
    let runner = spawn_run(&sup, &token);
    eventually("whatsapp running", || {
        sup.registry().status_of("whatsapp") == Some(ServiceStatus::Running)
    })
    .await;

    chat.set_start_fails(true);
    chat.set_healthy(false);
    eventually("first automatic restart", || chat.starts() == 1).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(chat.starts(), 1, "restarted again inside the backoff window");
    assert_eq!(sup.registry().status_of("whatsapp"), Some(ServiceStatus::Error));

    eventually("restart after the window", || chat.starts() >= 2).await;

    token.cancel();
    runner.await.expect("join").expect("clean shutdown");
}

#[tokio::test]
async fn test_connecting_service_errors_after_connect_attempts() {
    let db = Arc::new(Fake::new("database").unhealthy().stays_down());
    let cfg = Config {
        connect_attempts: 3,
        ..fast_config()
    };
    let control = control_for(cfg, &[db.clone()]);
    let sup = Arc::clone(control.supervisor());

    let mut sub = control.subscribe(0);
    assert!(control.start_all().await.success);
    assert_eq!(sup.registry().status_of("database"), Some(ServiceStatus::Connecting));

    let token = CancellationToken::new();
    let runner = spawn_run(&sup, &token);

    let mut connecting = Vec::new();
    let errored = tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(ev) = sub.recv().await {
            let EventKind::StatusUpdate(snap) = &ev.kind else {
                continue;
            };
            let Some(record) = snap.get("database") else {
                continue;
            };
            match record.status {
                ServiceStatus::Connecting => connecting.push(record.details.clone()),
                ServiceStatus::Error => return true,
                _ => {}
            }
        }
        false
    })
    .await
    .expect("database never reached error");
    assert!(errored);
    assert!(db.probes() >= 3);

    assert_eq!(connecting.first().map(String::as_str), Some("started, awaiting probe"));
    assert!(connecting.iter().any(|d| d.ends_with("(attempt 1/3)")));
    assert!(connecting.iter().any(|d| d.ends_with("(attempt 2/3)")));
    assert!(!connecting.iter().any(|d| d.ends_with("(attempt 3/3)")));

    token.cancel();
    runner.await.expect("join").expect("clean shutdown");
}

#[tokio::test]
async fn test_shutdown_lets_running_tick_finish() {
    let db = Arc::new(Fake::new("database").slow_probe(Duration::from_millis(200)));
    let cfg = Config {
        grace: Duration::from_secs(2),
        ..fast_config()
    };
    let control = control_for(cfg, &[db.clone()]);
    let sup = Arc::clone(control.supervisor());

    let token = CancellationToken::new();
    let runner = spawn_run(&sup, &token);
    eventually("probe in progress", || db.probes() == 1).await;

    token.cancel();
    runner.await.expect("join").expect("clean shutdown");

    assert_eq!(db.probes_done(), db.probes());
    assert_eq!(sup.registry().status_of("database"), Some(ServiceStatus::Running));
}

#[tokio::test]
async fn test_shutdown_reports_tick_stuck_past_grace() {
    let db = Arc::new(Fake::new("database").slow_probe(Duration::from_secs(5)));
    let cfg = Config {
        grace: Duration::from_millis(50),
        probe_timeout: Duration::from_secs(10),
        ..fast_config()
    };
    let control = control_for(cfg, &[db.clone()]);
    let sup = Arc::clone(control.supervisor());

    let token = CancellationToken::new();
    let runner = spawn_run(&sup, &token);
    eventually("probe in progress", || db.probes() == 1).await;

    token.cancel();
    match runner.await.expect("join") {
        Err(RuntimeError::GraceExceeded { stuck, .. }) => assert_eq!(stuck, vec!["database"]),
        other => panic!("expected grace exceeded, got {other:?}"),
    }
    assert!(sup.broadcaster().is_closed());
}

#[tokio::test]
async fn test_paused_monitoring_skips_ticks() {
    let db = Arc::new(Fake::new("database"));
    let control = control_for(fast_config(), &[db.clone()]);
    let sup = Arc::clone(control.supervisor());

    let token = CancellationToken::new();
    let runner = spawn_run(&sup, &token);
    eventually("first probe", || db.probes() > 0).await;

    assert!(control.pause_monitoring().success);
    assert!(!control.status().monitoring);
    tokio::time::sleep(Duration::from_millis(30)).await;
    let probes = db.probes();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(db.probes(), probes);

    control.resume_monitoring();
    eventually("probing resumed", || db.probes() > probes).await;
    let messages: Vec<String> = control.logs(20).into_iter().map(|e| e.message).collect();
    assert!(messages.iter().any(|m| m == "Monitoring paused"));
    assert!(messages.iter().any(|m| m == "Monitoring resumed"));

    token.cancel();
    runner.await.expect("join").expect("clean shutdown");
}

#[tokio::test]
async fn test_restart_all_stops_then_starts_everything() {
    let db = Arc::new(Fake::new("database"));
    let chat = Arc::new(Fake::new("whatsapp").failing_start());
    let cfg = Config {
        restart_all_pause: Duration::from_millis(10),
        ..Config::default()
    };
    let control = control_for(cfg, &[db.clone(), chat.clone()]);

    let report = control.restart_all().await;

    assert!(!report.success);
    assert!(report.stopped.success);
    assert!(!report.started.success);
    assert_eq!(report.started.outcome("database"), Some(&OperationOutcome::Ok));
    assert_eq!((db.stops(), db.starts()), (1, 1));
    assert_eq!((chat.stops(), chat.starts()), (1, 1));

    let registry = control.supervisor().registry();
    assert_eq!(registry.status_of("database"), Some(ServiceStatus::Connecting));
    assert_eq!(registry.status_of("whatsapp"), Some(ServiceStatus::Error));
}

async fn next_json<S>(ws: &mut S) -> serde_json::Value
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("frame in time")
            .expect("stream open")
            .expect("valid frame");
        if msg.is_text() {
            return serde_json::from_str(msg.to_text().expect("utf-8")).expect("json frame");
        }
    }
}

#[tokio::test]
async fn test_push_channel_over_websocket() {
    let control = control_for(Config::default(), &[Arc::new(Fake::new("database"))]);
    let sup = Arc::clone(control.supervisor());
    sup.logs().info("a");
    sup.logs().info("b");

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let server = tokio::spawn(async move { axum::serve(listener, api::router(control)).await });

    let too_big = format!("ws://{addr}/api/control/ws?backlog={}", usize::MAX);
    assert!(connect_async(too_big.as_str()).await.is_err());

    let url = format!("ws://{addr}/api/control/ws?backlog=1");
    let (mut ws, _) = connect_async(url.as_str()).await.expect("connect");

    let first = next_json(&mut ws).await;
    assert_eq!(first["type"], "status-update");
    assert_eq!(first["payload"]["services"]["database"]["status"], "unknown");
    assert!(first["seq"].is_u64());

    let backlog = next_json(&mut ws).await;
    assert_eq!(backlog["type"], "log-append");
    assert_eq!(backlog["payload"]["message"], "b");

    let connected = next_json(&mut ws).await;
    assert_eq!(connected["payload"]["message"], "Push client connected");

    sup.registry().upsert("database", ServiceStatus::Running, "connected");
    let live = next_json(&mut ws).await;
    assert_eq!(live["type"], "status-update");
    assert_eq!(live["payload"]["services"]["database"]["status"], "running");

    sup.broadcaster().close();
    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(msg) = ws.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => return,
                Ok(_) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "socket not closed after the mailbox went away");
    eventually("disconnect logged", || {
        sup.logs().recent(5).iter().any(|e| e.message == "Push client disconnected")
    })
    .await;

    server.abort();
}
