use delay_wheel::{
    default_runtime, default_wheel, set_default_wheel, stop_default_wheel, FaultLogger, TaskKey,
    TimerError, TimerWheel,
};
use futures::future;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct RecordingLogger {
    errors: Mutex<Vec<String>>,
    warnings: Mutex<Vec<String>>,
}

impl FaultLogger for RecordingLogger {
    fn error(&self, message: &str) {
        self.errors.lock().push(message.to_string());
    }

    fn warn(&self, message: &str) {
        self.warnings.lock().push(message.to_string());
    }
}

fn started_timer() -> Arc<TimerWheel> {
    let timer = TimerWheel::new(Duration::from_millis(10), 100).unwrap();
    timer.start(CancellationToken::new()).unwrap();
    Arc::new(timer)
}

#[tokio::test]
async fn test_large_scale_timers() {
    // 测试大规模并发定时器（10000 个）
    let timer = started_timer();
    let counter = Arc::new(AtomicU32::new(0));
    const TIMER_COUNT: u32 = 10_000;

    let start = Instant::now();

    let mut futures = Vec::new();
    for i in 0..TIMER_COUNT {
        let timer_clone = Arc::clone(&timer);
        let counter_clone = Arc::clone(&counter);
        let delay = Duration::from_millis(10 + (i % 100) as u64);

        futures.push(async move {
            timer_clone
                .add_timer(delay, move || async move {
                    counter_clone.fetch_add(1, Ordering::SeqCst);
                })
                .await
                .unwrap()
        });
    }

    future::join_all(futures).await;
    println!("创建 {} 个定时器耗时: {:?}", TIMER_COUNT, start.elapsed());

    // 等待所有定时器触发
    tokio::time::sleep(Duration::from_millis(400)).await;

    let count = counter.load(Ordering::SeqCst);
    assert_eq!(count, TIMER_COUNT, "所有定时器都应该被触发");
}

#[tokio::test]
async fn test_generated_keys_are_unique_and_cancellable() {
    let timer = started_timer();
    let counter = Arc::new(AtomicU32::new(0));

    let mut keys = Vec::with_capacity(10_000);
    for _ in 0..10_000 {
        let counter_clone = Arc::clone(&counter);
        let key = timer
            .add_timer(Duration::from_secs(5), move || async move {
                counter_clone.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap()
            .unwrap();
        keys.push(key);
    }

    let unique: FxHashSet<_> = keys.iter().cloned().collect();
    assert_eq!(unique.len(), 10_000);
    assert_eq!(timer.pending_count().await.unwrap(), 10_000);

    // 逐个取消其中一半
    for key in keys.iter().step_by(2) {
        timer.remove_timer(key.clone()).await.unwrap();
    }
    assert_eq!(timer.pending_count().await.unwrap(), 5_000);

    timer.remove_timers(keys).await.unwrap();
    assert_eq!(timer.pending_count().await.unwrap(), 0);
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_timer_precision() {
    // 测试定时器的精度
    let timer = started_timer();
    let start_time = Instant::now();
    let end_time = Arc::new(Mutex::new(None::<Instant>));

    let end_clone = Arc::clone(&end_time);
    timer
        .add_timer(Duration::from_millis(100), move || async move {
            *end_clone.lock() = Some(Instant::now());
        })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;

    let end = end_time.lock().expect("定时器应该已经触发");
    let elapsed = end.duration_since(start_time);
    println!("预期延迟: 100ms, 实际延迟: {:?}", elapsed);

    // 触发不早于 floor(d / tick) 个 tick，上限放宽以容忍调度抖动
    assert!(
        elapsed >= Duration::from_millis(95) && elapsed <= Duration::from_millis(180),
        "定时器精度在可接受范围内，实际延迟: {:?}",
        elapsed
    );
}

#[tokio::test]
async fn test_concurrent_add_and_remove() {
    // 并发添加和取消定时器（5 组 × 200 个）
    let timer = started_timer();
    let counter = Arc::new(AtomicU32::new(0));

    let mut workers = Vec::new();
    for group in 0..5 {
        let timer = Arc::clone(&timer);
        let counter = Arc::clone(&counter);
        workers.push(tokio::spawn(async move {
            for i in 0..200 {
                let key = format!("group-{}-{}", group, i);
                let counter = Arc::clone(&counter);
                timer
                    .add_timer_with_key(Duration::from_millis(150), key.as_str(), move || async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                    })
                    .await
                    .unwrap();
                if i % 2 == 0 {
                    timer.remove_timer(key).await.unwrap();
                }
            }
        }));
    }

    future::join_all(workers).await;
    assert_eq!(timer.pending_count().await.unwrap(), 500);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 500);
}

#[tokio::test]
async fn test_fault_isolation_with_injected_logger() {
    let logger = Arc::new(RecordingLogger::default());
    let timer = TimerWheel::with_defaults().with_logger(Arc::clone(&logger) as Arc<dyn FaultLogger>);
    timer.start(CancellationToken::new()).unwrap();
    let counter = Arc::new(AtomicU32::new(0));

    for i in 0..6 {
        let counter = Arc::clone(&counter);
        timer
            .add_timer(Duration::from_millis(30), move || async move {
                if i % 3 == 0 {
                    panic!("task {} failed", i);
                }
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 4);
    assert_eq!(logger.errors.lock().len(), 2);
    assert!(logger.warnings.lock().is_empty());

    // 同键重新调度会以警告上报
    for _ in 0..2 {
        timer
            .add_timer_with_key(Duration::from_secs(5), "lease", || async {})
            .await
            .unwrap();
    }
    assert_eq!(timer.pending_count().await.unwrap(), 1);
    assert_eq!(logger.warnings.lock().len(), 1);

    // 调度循环仍然正常工作
    let counter_clone = Arc::clone(&counter);
    timer
        .add_timer(Duration::from_millis(20), move || async move {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_default_wheel_lifecycle() {
    // 进程级默认实例只在这一个测试里使用
    let default = default_wheel().unwrap();
    assert_eq!(default.config().wheel.bucket_count, 100);
    assert!(default.is_running());

    let (fired_tx, fired_rx) = tokio::sync::oneshot::channel();
    default
        .add_timer(Duration::from_millis(20), move || async move {
            let _ = fired_tx.send(());
        })
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(1), fired_rx)
        .await
        .expect("默认定时器应该触发")
        .unwrap();

    // 替换默认实例
    let replacement = TimerWheel::new(Duration::from_millis(5), 10).unwrap();
    replacement.start_on(&default_runtime().unwrap(), CancellationToken::new()).unwrap();
    let previous = set_default_wheel(Arc::new(replacement)).unwrap();
    assert!(Arc::ptr_eq(&previous, &default));
    assert_eq!(default_wheel().unwrap().config().wheel.bucket_count, 10);

    stop_default_wheel();

    // 两个实例的调度循环都会退出，之后的请求不再生效
    for timer in [previous, default_wheel().unwrap()] {
        let mut closed = false;
        for _ in 0..100 {
            if timer.pending_count().await == Err(TimerError::ChannelClosed) {
                closed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(closed);
        assert_eq!(
            timer.add_timer_with_key(Duration::from_millis(10), TaskKey::from("late"), || async {}).await,
            Err(TimerError::ChannelClosed)
        );
    }
}
