//! 定时器驱动集成测试
//! Timer driver integration tests

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use timer_loop::{TimerError, TimerStore};
use tokio::sync::mpsc;
use tokio::time::{Duration, sleep, timeout};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn test_driver_fires_one_shot_timer() {
    init_tracing();
    let store = TimerStore::new();
    let driver = store.start_driver(Duration::from_millis(5)).unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    store.add_one_shot(Duration::from_millis(30), "once", move || {
        let _ = tx.send("fired");
    });

    let fired = timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
    assert_eq!(fired, Some("fired"));
    assert_eq!(store.size().pending, 0);

    driver.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_driver_fires_repeating_timer_until_cancelled() {
    init_tracing();
    let store = TimerStore::new();
    let driver = store.start_driver(Duration::from_millis(5)).unwrap();

    let count = Arc::new(AtomicUsize::new(0));
    let counted = count.clone();
    let handle = store.add_repeating(Duration::from_millis(20), "every", move || {
        counted.fetch_add(1, Ordering::SeqCst);
    });

    // 等待至少触发三次
    timeout(Duration::from_secs(2), async {
        while count.load(Ordering::SeqCst) < 3 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    assert!(handle.cancel());
    // 已经在执行的回调不会被中断，给它一个 tick 的时间结束
    sleep(Duration::from_millis(50)).await;
    let after_cancel = count.load(Ordering::SeqCst);
    sleep(Duration::from_millis(100)).await;
    assert_eq!(count.load(Ordering::SeqCst), after_cancel);

    driver.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_cancel_by_key_before_deadline() {
    let store = TimerStore::new();
    let driver = store.start_driver(Duration::from_millis(5)).unwrap();

    let count = Arc::new(AtomicUsize::new(0));
    let counted = count.clone();
    store.add_one_shot(Duration::from_millis(50), "c", move || {
        counted.fetch_add(1, Ordering::SeqCst);
    });
    assert!(store.cancel_by_key("c"));

    sleep(Duration::from_millis(150)).await;
    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert_eq!(store.size().pending, 0);

    driver.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_driver_survives_panicking_callback() {
    init_tracing();
    let store = TimerStore::new();
    let driver = store.start_driver(Duration::from_millis(5)).unwrap();

    store.add_one_shot(Duration::from_millis(10), "bad", || panic!("callback failure"));
    let (tx, mut rx) = mpsc::unbounded_channel();
    store.add_one_shot(Duration::from_millis(40), "good", move || {
        let _ = tx.send(());
    });

    let fired = timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
    assert!(fired.is_some());

    let stats = driver.stats().await.unwrap();
    assert_eq!(stats.panicked, 1);
    assert_eq!(stats.fired, 2);

    driver.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_only_one_driver_per_store() {
    let store = TimerStore::new();
    let driver = store.start_driver(Duration::from_millis(5)).unwrap();
    assert!(store.is_driver_running());

    let second = store.start_driver(Duration::from_millis(5));
    assert_eq!(second.unwrap_err(), TimerError::DriverAlreadyRunning);

    driver.shutdown().await.unwrap();
    assert!(!store.is_driver_running());

    // 关闭后可以重新启动
    let restarted = store.start_default_driver().unwrap();
    restarted.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_drains_due_entries_and_rejects_commands() {
    let store = TimerStore::new();
    // tick 足够长，保证到期条目由关闭时的最后一次处理执行
    let driver = store.start_driver(Duration::from_secs(60)).unwrap();

    let count = Arc::new(AtomicUsize::new(0));
    let counted = count.clone();
    store.add_one_shot(Duration::from_millis(1), "due", move || {
        counted.fetch_add(1, Ordering::SeqCst);
    });
    store.add_one_shot(Duration::from_secs(30), "later", || {});
    sleep(Duration::from_millis(20)).await;

    let report = driver.shutdown().await.unwrap();
    assert_eq!(report.fired, 1);
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(store.size().pending, 1);

    // 等待任务退出
    timeout(Duration::from_secs(1), async {
        while !driver.is_closed() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(driver.drain_now().await.unwrap_err(), TimerError::DriverShutdown);
}

#[tokio::test]
async fn test_drain_now_runs_without_waiting_for_tick() {
    let store = TimerStore::new();
    let driver = store.start_driver(Duration::from_secs(60)).unwrap();

    store.add_one_shot(Duration::from_millis(1), "now", || {});
    sleep(Duration::from_millis(10)).await;

    let report = driver.drain_now().await.unwrap();
    assert_eq!(report.fired, 1);
    assert_eq!(store.size().pending, 0);

    driver.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_dropping_all_handles_stops_driver() {
    let store = TimerStore::new();
    let driver = store.start_driver(Duration::from_millis(5)).unwrap();
    drop(driver);

    timeout(Duration::from_secs(1), async {
        while store.is_driver_running() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_producers() {
    let store = TimerStore::new();
    let driver = store.start_driver(Duration::from_millis(2)).unwrap();
    let count = Arc::new(AtomicUsize::new(0));

    let producers: Vec<_> = (0..4)
        .map(|producer| {
            let store = store.clone();
            let count = count.clone();
            tokio::spawn(async move {
                for i in 0..250 {
                    let count = count.clone();
                    store.add_one_shot(Duration::from_millis(20), format!("{producer}-{i}"), move || {
                        count.fetch_add(1, Ordering::SeqCst);
                    });
                }
            })
        })
        .collect();
    for producer in producers {
        producer.await.unwrap();
    }

    timeout(Duration::from_secs(5), async {
        while count.load(Ordering::SeqCst) < 1000 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let size = store.size();
    assert_eq!(size.pending, 0);
    assert_eq!(size.indexed, 0);

    driver.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_restarted_driver_keeps_store_claimed() {
    init_tracing();
    let store = TimerStore::new();

    for _ in 0..200 {
        let first = store.start_driver(Duration::from_millis(1)).unwrap();
        first.shutdown().await.unwrap();

        let second = store.start_driver(Duration::from_millis(1)).unwrap();
        // 给第一个驱动任务完全退出的时间
        // Gives the first driver task time to exit completely
        sleep(Duration::from_millis(2)).await;
        assert!(store.is_driver_running());
        assert_eq!(
            store.start_driver(Duration::from_millis(1)).unwrap_err(),
            TimerError::DriverAlreadyRunning
        );

        second.shutdown().await.unwrap();
    }
    assert!(!store.is_driver_running());
}
