use super::*;

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;

// =============================================================================
// TaskHandle
// =============================================================================

#[tokio::test(start_paused = true)]
async fn task_handle_cancel_stops_loop() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = ticks.clone();
    let handle = TaskHandle::spawn("ticker", async move {
        loop {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    });

    tokio::time::sleep(Duration::from_millis(2_500)).await;
    let seen = ticks.load(Ordering::SeqCst);
    assert_eq!(seen, 3);

    handle.cancel();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), seen);
    assert!(handle.is_finished());
    assert_eq!(handle.name(), "ticker");
}

#[tokio::test(start_paused = true)]
async fn task_handle_drop_aborts() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = ticks.clone();
    let handle = TaskHandle::spawn("dropped", async move {
        loop {
            tokio::time::sleep(Duration::from_secs(1)).await;
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });
    drop(handle);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Scheduler
// =============================================================================

#[tokio::test(start_paused = true)]
async fn scheduler_fires_after_delay() {
    let scheduler = Scheduler::new();
    let fired = Arc::new(AtomicBool::new(false));
    let flag = fired.clone();

    assert!(scheduler.after(Duration::from_secs(2), move || flag.store(true, Ordering::SeqCst)));
    assert_eq!(scheduler.pending(), 1);

    tokio::time::sleep(Duration::from_millis(1_999)).await;
    assert!(!fired.load(Ordering::SeqCst));

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert!(fired.load(Ordering::SeqCst));
    assert_eq!(scheduler.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn scheduler_cancel_all_prevents_callbacks() {
    let scheduler = Scheduler::new();
    let fired = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        let counter = fired.clone();
        scheduler.after(Duration::from_secs(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    }

    assert_eq!(scheduler.cancel_all(), 3);
    assert!(scheduler.is_closed());
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
    assert_eq!(scheduler.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn scheduler_rejects_after_close() {
    let scheduler = Scheduler::new();
    scheduler.cancel_all();
    assert!(!scheduler.after(Duration::from_secs(1), || {}));
    assert_eq!(scheduler.pending(), 0);
}
