use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 自动生成的键达到该值后回绕到 1
const GENERATED_KEY_LIMIT: u64 = i64::MAX as u64;

/// 定时器任务的标识，用于取消定时器
///
/// `Id` 由 [`KeyGenerator`] 自动生成，`Named` 由调用方提供。
/// 两种变体互不冲突，调用方的名字不会与自动生成的编号撞车。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskKey {
    /// 自动生成的编号（从 1 开始，永远不为 0）
    Id(u64),
    /// 调用方提供的名字
    Named(Arc<str>),
}

impl From<&str> for TaskKey {
    fn from(name: &str) -> Self {
        TaskKey::Named(Arc::from(name))
    }
}

impl From<String> for TaskKey {
    fn from(name: String) -> Self {
        TaskKey::Named(Arc::from(name))
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKey::Id(id) => write!(f, "#{}", id),
            TaskKey::Named(name) => write!(f, "{}", name),
        }
    }
}

/// 时间轮范围内的键生成器
///
/// 单调递增，溢出有符号 64 位整数范围时回绕到 1，0 永远不会作为键出现。
#[derive(Debug, Default)]
pub struct KeyGenerator {
    last: AtomicU64,
}

impl KeyGenerator {
    /// 创建新的生成器，第一个键为 1
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn starting_after(last: u64) -> Self {
        Self {
            last: AtomicU64::new(last),
        }
    }

    /// 生成下一个键
    pub fn next_key(&self) -> TaskKey {
        let previous = self
            .last
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |last| {
                Some(Self::successor(last))
            })
            .unwrap_or_else(|last| last);
        TaskKey::Id(Self::successor(previous))
    }

    fn successor(last: u64) -> u64 {
        if last >= GENERATED_KEY_LIMIT {
            1
        } else {
            last + 1
        }
    }
}

/// 定时器回调 trait
///
/// 回调只会被调用一次，参数由闭包自行捕获。
///
/// # 示例
///
/// ```
/// use delay_wheel::TimerCallback;
/// use futures::future::BoxFuture;
///
/// struct Greet(String);
///
/// impl TimerCallback for Greet {
///     fn call(self: Box<Self>) -> BoxFuture<'static, ()> {
///         Box::pin(async move {
///             println!("hello {}", self.0);
///         })
///     }
/// }
/// ```
pub trait TimerCallback: Send + 'static {
    /// 执行回调，返回一个 Future
    fn call(self: Box<Self>) -> BoxFuture<'static, ()>;
}

/// 为闭包实现 TimerCallback trait
impl<F, Fut> TimerCallback for F
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn call(self: Box<Self>) -> BoxFuture<'static, ()> {
        Box::pin((*self)())
    }
}

/// 回调包装器类型
pub type CallbackWrapper = Box<dyn TimerCallback>;

/// 定时器任务
pub struct TimerTask {
    /// 任务标识
    pub key: TaskKey,

    /// 请求的延迟时间（创建后不变）
    pub delay: Duration,

    /// 到期前还需要转过的整圈数，插入时计算，之后只会递减
    pub revolutions: u64,

    /// 到期后执行的回调
    pub callback: CallbackWrapper,
}

impl TimerTask {
    /// 创建定时器任务，圈数在插入时间轮时计算
    pub fn new<C>(key: TaskKey, delay: Duration, callback: C) -> Self
    where
        C: TimerCallback,
    {
        Self {
            key,
            delay,
            revolutions: 0,
            callback: Box::new(callback),
        }
    }
}

impl fmt::Debug for TimerTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerTask")
            .field("key", &self.key)
            .field("delay", &self.delay)
            .field("revolutions", &self.revolutions)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    #[test]
    fn test_generated_keys_start_at_one() {
        let keys = KeyGenerator::new();
        assert_eq!(keys.next_key(), TaskKey::Id(1));
        assert_eq!(keys.next_key(), TaskKey::Id(2));
    }

    #[test]
    fn test_generated_keys_wrap_to_one() {
        let keys = KeyGenerator::starting_after(GENERATED_KEY_LIMIT - 1);
        assert_eq!(keys.next_key(), TaskKey::Id(GENERATED_KEY_LIMIT));
        assert_eq!(keys.next_key(), TaskKey::Id(1));
    }

    #[test]
    fn test_generated_keys_are_unique_across_threads() {
        let keys = Arc::new(KeyGenerator::new());
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let keys = Arc::clone(&keys);
                std::thread::spawn(move || (0..2500).map(|_| keys.next_key()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = FxHashSet::default();
        for worker in workers {
            for key in worker.join().unwrap() {
                assert!(seen.insert(key));
            }
        }
        assert_eq!(seen.len(), 10_000);
    }

    #[test]
    fn test_named_keys_do_not_collide_with_ids() {
        assert_ne!(TaskKey::from("1"), TaskKey::Id(1));
        assert_eq!(TaskKey::from("job"), TaskKey::from(String::from("job")));
        assert_eq!(TaskKey::Id(7).to_string(), "#7");
        assert_eq!(TaskKey::from("job").to_string(), "job");
    }
}
