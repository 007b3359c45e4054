//! End-to-end pool behavior over loopback: sizing, respawn, reload,
//! drain, and log emission.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time;

use servisor::{
    AppRequest, AppResponse, Handler, HandlerFn, HandlerRef, LogTarget, PoolConfig, RuntimeError,
    ServeError, Supervisor, SupervisorHandle,
};

fn test_config(workers: usize) -> PoolConfig {
    PoolConfig {
        workers,
        drain_timeout: Duration::from_secs(5),
        boot_timeout: Duration::from_secs(5),
        ..PoolConfig::default()
    }
}

fn ok_app() -> HandlerRef {
    HandlerFn::arc(|_req: AppRequest| async { Ok::<_, ServeError>(AppResponse::text("ok")) })
}

fn temp_log(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "servisor-test-{}-{name}.log",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);
    path
}

async fn start(
    cfg: PoolConfig,
    app: HandlerRef,
) -> (
    SupervisorHandle,
    SocketAddr,
    JoinHandle<Result<(), RuntimeError>>,
) {
    let sup = Supervisor::builder(cfg)
        .with_handler(app)
        .build()
        .expect("build supervisor");
    let handle = sup.handle();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let run = tokio::spawn(sup.run_on(listener));
    (handle, addr, run)
}

async fn wait_live(handle: &SupervisorHandle, n: usize) {
    for _ in 0..200 {
        if handle.live_count().await == n {
            return;
        }
        time::sleep(Duration::from_millis(25)).await;
    }
    panic!("pool never reached {n} live workers");
}

async fn read_lines(path: &PathBuf) -> Vec<String> {
    std::fs::read_to_string(path)
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pool_reaches_configured_size() {
    for n in [1usize, 4, 16] {
        let (handle, _addr, run) = start(test_config(n), ok_app()).await;
        wait_live(&handle, n).await;

        let live = handle.live_workers().await;
        assert_eq!(live.len(), n, "expected {n} live workers");
        let mut slots: Vec<usize> = live.iter().map(|w| w.slot).collect();
        slots.sort_unstable();
        assert_eq!(slots, (0..n).collect::<Vec<_>>(), "one worker per slot");

        handle.shutdown(true).await.expect("shutdown");
        run.await.expect("join").expect("clean shutdown");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn requests_are_served_and_access_logged() {
    let access = temp_log("access");
    let cfg = PoolConfig {
        access_log: LogTarget::File(access.clone()),
        ..test_config(2)
    };
    let (handle, addr, run) = start(cfg, ok_app()).await;
    wait_live(&handle, 2).await;

    let resp = reqwest::get(format!("http://{addr}/lobby"))
        .await
        .expect("request");
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.expect("body"), "ok");

    // Exactly one access line, carrying status and duration.
    let mut lines = read_lines(&access).await;
    for _ in 0..100 {
        if !lines.is_empty() {
            break;
        }
        time::sleep(Duration::from_millis(25)).await;
        lines = read_lines(&access).await;
    }
    assert_eq!(lines.len(), 1, "one completed request, one access line");
    assert!(lines[0].contains("\"GET /lobby HTTP/1.1\""));
    assert!(lines[0].contains(" 200 "));
    assert!(lines[0].ends_with("ms"));

    handle.shutdown(true).await.expect("shutdown");
    run.await.expect("join").expect("clean shutdown");
    let _ = std::fs::remove_file(&access);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn killed_worker_is_replaced() {
    let (handle, _addr, run) = start(test_config(4), ok_app()).await;
    wait_live(&handle, 4).await;

    let victim = handle.live_workers().await[0].clone();
    assert!(handle.kill(victim.id).await.expect("kill command"));

    // Exactly one replacement: pool returns to 4, victim id is gone, and
    // the victim's slot carries an incremented restart count.
    let mut replaced = false;
    for _ in 0..200 {
        let live = handle.live_workers().await;
        if live.len() == 4 && !live.iter().any(|w| w.id == victim.id) {
            let successor = live
                .iter()
                .find(|w| w.slot == victim.slot)
                .expect("slot refilled");
            assert_eq!(successor.restarts, victim.restarts + 1);
            replaced = true;
            break;
        }
        time::sleep(Duration::from_millis(25)).await;
    }
    assert!(replaced, "killed worker was not replaced");

    handle.shutdown(true).await.expect("shutdown");
    run.await.expect("join").expect("clean shutdown");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unknown_worker_kill_is_rejected() {
    let (handle, _addr, run) = start(test_config(1), ok_app()).await;
    wait_live(&handle, 1).await;

    // A long-dead id: kill must report false and the pool stays intact.
    let old = handle.live_workers().await[0].id;
    handle.kill(old).await.expect("kill");
    let mut replaced = false;
    for _ in 0..200 {
        let live = handle.live_workers().await;
        if live.len() == 1 && live[0].id != old {
            replaced = true;
            break;
        }
        time::sleep(Duration::from_millis(25)).await;
    }
    assert!(replaced);
    assert!(!handle.kill(old).await.expect("second kill"));

    handle.shutdown(true).await.expect("shutdown");
    run.await.expect("join").expect("clean shutdown");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reload_swaps_generations_without_dropping_requests() {
    let app: HandlerRef = HandlerFn::arc(|req: AppRequest| async move {
        if req.uri.path() == "/slow" {
            time::sleep(Duration::from_millis(400)).await;
            return Ok::<_, ServeError>(AppResponse::text("slow-ok"));
        }
        Ok(AppResponse::text("ok"))
    });
    let (handle, addr, run) = start(test_config(2), app).await;
    wait_live(&handle, 2).await;
    let before: Vec<_> = handle.live_workers().await.iter().map(|w| w.id).collect();

    // A request in flight across the reload must still complete.
    let slow = tokio::spawn(reqwest::get(format!("http://{addr}/slow")));
    time::sleep(Duration::from_millis(50)).await;

    handle.reload().await.expect("reload");

    let resp = slow.await.expect("join").expect("slow request");
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.expect("body"), "slow-ok");

    let mut swapped = false;
    for _ in 0..200 {
        let after = handle.live_workers().await;
        if after.len() == 2 && after.iter().all(|w| w.generation == 2) {
            assert!(
                after.iter().all(|w| !before.contains(&w.id)),
                "all-new worker identities after reload"
            );
            swapped = true;
            break;
        }
        time::sleep(Duration::from_millis(25)).await;
    }
    assert!(swapped, "pool never settled on the new generation");

    handle.shutdown(true).await.expect("shutdown");
    run.await.expect("join").expect("clean shutdown");
}

/// Boots fine for the first generation, hangs for every later worker.
struct FlakyBoot {
    boots: AtomicUsize,
    good: usize,
}

#[async_trait]
impl Handler for FlakyBoot {
    async fn boot(&self) -> Result<(), ServeError> {
        let n = self.boots.fetch_add(1, Ordering::SeqCst);
        if n >= self.good {
            time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(())
    }

    async fn handle(&self, _req: AppRequest) -> Result<AppResponse, ServeError> {
        Ok(AppResponse::text("ok"))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn aborted_reload_keeps_previous_pool() {
    let cfg = PoolConfig {
        boot_timeout: Duration::from_millis(500),
        ..test_config(2)
    };
    let app = Arc::new(FlakyBoot {
        boots: AtomicUsize::new(0),
        good: 2,
    });
    let (handle, addr, run) = start(cfg, app).await;
    wait_live(&handle, 2).await;
    let before: Vec<_> = handle.live_workers().await.iter().map(|w| w.id).collect();

    let err = handle.reload().await.expect_err("reload must abort");
    assert_eq!(err.as_label(), "reload_failed");

    // Original pool intact: same size, same identities, still serving.
    wait_live(&handle, 2).await;
    let after: Vec<_> = handle.live_workers().await.iter().map(|w| w.id).collect();
    assert_eq!(after, before, "original worker identities unchanged");

    let resp = reqwest::get(format!("http://{addr}/")).await.expect("request");
    assert_eq!(resp.status(), 200);

    handle.shutdown(true).await.expect("shutdown");
    run.await.expect("join").expect("clean shutdown");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn graceful_shutdown_completes_in_flight_requests() {
    let app: HandlerRef = HandlerFn::arc(|_req: AppRequest| async {
        time::sleep(Duration::from_millis(500)).await;
        Ok::<_, ServeError>(AppResponse::text("drained"))
    });
    let (handle, addr, run) = start(test_config(2), app).await;
    wait_live(&handle, 2).await;

    let inflight = tokio::spawn(reqwest::get(format!("http://{addr}/")));
    time::sleep(Duration::from_millis(100)).await;

    handle.shutdown(true).await.expect("shutdown");
    run.await.expect("join").expect("clean shutdown");

    let resp = inflight.await.expect("join").expect("in-flight request");
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.expect("body"), "drained");

    // Socket is closed after teardown.
    assert!(reqwest::get(format!("http://{addr}/")).await.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn drain_timeout_terminates_stuck_requests() {
    let cfg = PoolConfig {
        drain_timeout: Duration::from_millis(200),
        ..test_config(1)
    };
    let app: HandlerRef = HandlerFn::arc(|_req: AppRequest| async {
        time::sleep(Duration::from_secs(30)).await;
        Ok::<_, ServeError>(AppResponse::text("too late"))
    });
    let (handle, addr, run) = start(cfg, app).await;
    wait_live(&handle, 1).await;

    let stuck = tokio::spawn(reqwest::get(format!("http://{addr}/")));
    time::sleep(Duration::from_millis(100)).await;

    // The stuck request is forcibly terminated and teardown still
    // completes well under the handler's sleep.
    handle.shutdown(true).await.expect("shutdown");
    let res = time::timeout(Duration::from_secs(5), run)
        .await
        .expect("shutdown bounded by drain timeout + delta")
        .expect("join");
    assert!(res.is_ok(), "teardown completed: {res:?}");

    let out = stuck.await.expect("join");
    assert!(out.is_err(), "request past the drain window must be dropped");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn handler_failure_is_contained_and_logged_once() {
    let access = temp_log("fail-access");
    let errors = temp_log("fail-errors");
    let cfg = PoolConfig {
        access_log: LogTarget::File(access.clone()),
        error_log: LogTarget::File(errors.clone()),
        ..test_config(1)
    };
    let app: HandlerRef = HandlerFn::arc(|req: AppRequest| async move {
        if req.uri.path() == "/boom" {
            return Err(ServeError::Fail {
                error: "synthetic failure".into(),
            });
        }
        Ok(AppResponse::text("ok"))
    });
    let (handle, addr, run) = start(cfg, app).await;
    wait_live(&handle, 1).await;
    let worker = handle.live_workers().await[0].clone();

    let resp = reqwest::get(format!("http://{addr}/boom")).await.expect("request");
    assert_eq!(resp.status(), 500);
    assert_eq!(resp.text().await.expect("body"), "Internal Server Error\n");

    // Exactly one error line for the failure; the access log still gets
    // its line with the 500.
    let mut error_lines = read_lines(&errors).await;
    for _ in 0..100 {
        if error_lines.iter().any(|l| l.contains("handler_failed")) {
            break;
        }
        time::sleep(Duration::from_millis(25)).await;
        error_lines = read_lines(&errors).await;
    }
    let failures: Vec<_> = error_lines
        .iter()
        .filter(|l| l.contains("handler_failed"))
        .collect();
    assert_eq!(failures.len(), 1, "exactly one error line per failure");

    let access_lines = read_lines(&access).await;
    assert!(access_lines.iter().any(|l| l.contains(" 500 ")));

    // The worker survived: same identity, still serving.
    let resp = reqwest::get(format!("http://{addr}/")).await.expect("request");
    assert_eq!(resp.status(), 200);
    assert_eq!(handle.live_workers().await[0].id, worker.id);

    handle.shutdown(true).await.expect("shutdown");
    run.await.expect("join").expect("clean shutdown");
    let _ = std::fs::remove_file(&access);
    let _ = std::fs::remove_file(&errors);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fatal_handler_error_respawns_the_worker() {
    let app: HandlerRef = HandlerFn::arc(|req: AppRequest| async move {
        if req.uri.path() == "/fatal" {
            return Err(ServeError::Fatal {
                error: "simulated resource exhaustion".into(),
            });
        }
        Ok(AppResponse::text("ok"))
    });
    let (handle, addr, run) = start(test_config(1), app).await;
    wait_live(&handle, 1).await;
    let original = handle.live_workers().await[0].clone();

    // Client still sees the generic failure response.
    let resp = reqwest::get(format!("http://{addr}/fatal")).await.expect("request");
    assert_eq!(resp.status(), 500);

    // The worker exits and a fresh identity takes the slot.
    let mut respawned = false;
    for _ in 0..200 {
        let live = handle.live_workers().await;
        if live.len() == 1 && live[0].id != original.id {
            respawned = true;
            break;
        }
        time::sleep(Duration::from_millis(25)).await;
    }
    assert!(respawned, "fatal error did not respawn the worker");

    let resp = reqwest::get(format!("http://{addr}/")).await.expect("request");
    assert_eq!(resp.status(), 200);

    handle.shutdown(true).await.expect("shutdown");
    run.await.expect("join").expect("clean shutdown");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn bind_conflict_is_fatal_at_startup() {
    let occupied = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = occupied.local_addr().expect("local addr");

    let cfg = PoolConfig {
        bind: addr,
        ..test_config(1)
    };
    let sup = Supervisor::builder(cfg)
        .with_handler(ok_app())
        .build()
        .expect("build");
    let err = sup.run().await.expect_err("bind must fail");
    assert_eq!(err.as_label(), "bind_error");
    assert!(err.is_startup_fatal());
}
