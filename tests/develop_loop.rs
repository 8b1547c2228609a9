// tests/develop_loop.rs

use std::sync::{Arc, Mutex};
use std::time::Duration;

use hammerpack::cancel::CancellationToken;
use hammerpack::engine::{DevelopEvent, DevelopRuntime, RunFuture, RunId, RunLauncher};
use hammerpack::watch::{WatchEvent, WatchEventKind};
use hammerpack_test_utils::{init_tracing, with_timeout};
use tokio::sync::{Notify, mpsc};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Seen {
    Started(RunId, usize),
    Cancelled(RunId),
    Completed(RunId),
}

/// Each run waits for either cancellation or a `finish` signal.
#[derive(Clone, Default)]
struct FakeLauncher {
    seen: Arc<Mutex<Vec<Seen>>>,
    started: Arc<Notify>,
    finish: Arc<Notify>,
}

impl FakeLauncher {
    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

impl RunLauncher for FakeLauncher {
    fn launch(&self, run_id: RunId, changes: Vec<WatchEvent>, token: CancellationToken) -> RunFuture {
        let this = self.clone();
        Box::pin(async move {
            this.seen.lock().unwrap().push(Seen::Started(run_id, changes.len()));
            this.started.notify_one();
            tokio::select! {
                _ = token.cancelled() => {
                    this.seen.lock().unwrap().push(Seen::Cancelled(run_id));
                    false
                }
                _ = this.finish.notified() => {
                    this.seen.lock().unwrap().push(Seen::Completed(run_id));
                    true
                }
            }
        })
    }
}

fn change(path: &str) -> DevelopEvent {
    DevelopEvent::FilesChanged(vec![WatchEvent::new(WatchEventKind::Change, path)])
}

#[tokio::test]
async fn change_during_run_cancels_and_reruns_with_all_changes() {
    init_tracing();
    let (tx, rx) = mpsc::channel(16);
    let launcher = FakeLauncher::default();
    let runtime = DevelopRuntime::new(rx, tx.clone(), launcher.clone())
        .with_debounce(Duration::from_millis(20));
    let handle = tokio::spawn(runtime.run());

    with_timeout(launcher.started.notified()).await;

    tx.send(change("a.ts")).await.unwrap();
    tx.send(change("b.ts")).await.unwrap();
    with_timeout(launcher.started.notified()).await;

    launcher.finish.notify_one();
    // Let the second run complete before shutting down.
    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(DevelopEvent::ShutdownRequested).await.unwrap();
    with_timeout(handle).await.unwrap().unwrap();

    assert_eq!(
        launcher.seen(),
        vec![
            Seen::Started(1, 0),
            Seen::Cancelled(1),
            Seen::Started(2, 2),
            Seen::Completed(2),
        ]
    );
}

#[tokio::test]
async fn shutdown_cancels_the_current_run_and_exits() {
    let (tx, rx) = mpsc::channel(16);
    let launcher = FakeLauncher::default();
    let runtime = DevelopRuntime::new(rx, tx.clone(), launcher.clone());
    let handle = tokio::spawn(runtime.run());

    with_timeout(launcher.started.notified()).await;
    tx.send(DevelopEvent::ShutdownRequested).await.unwrap();
    with_timeout(handle).await.unwrap().unwrap();

    assert_eq!(launcher.seen(), vec![Seen::Started(1, 0), Seen::Cancelled(1)]);
}

#[tokio::test]
async fn changes_while_idle_start_a_new_run() {
    let (tx, rx) = mpsc::channel(16);
    let launcher = FakeLauncher::default();
    let runtime = DevelopRuntime::new(rx, tx.clone(), launcher.clone())
        .with_debounce(Duration::ZERO);
    let handle = tokio::spawn(runtime.run());

    with_timeout(launcher.started.notified()).await;
    launcher.finish.notify_one();
    tokio::time::sleep(Duration::from_millis(30)).await;

    tx.send(change("c.ts")).await.unwrap();
    with_timeout(launcher.started.notified()).await;
    tx.send(DevelopEvent::ShutdownRequested).await.unwrap();
    with_timeout(handle).await.unwrap().unwrap();

    assert_eq!(
        launcher.seen(),
        vec![
            Seen::Started(1, 0),
            Seen::Completed(1),
            Seen::Started(2, 1),
            Seen::Cancelled(2),
        ]
    );
}
