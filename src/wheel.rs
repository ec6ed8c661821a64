use crate::config::WheelConfig;
use crate::task::{TaskKey, TimerTask};
use rustc_hash::FxHashMap;
use std::time::Duration;

/// 时间轮数据结构
///
/// 只由调度循环持有和修改，因此内部不需要任何锁。
pub struct Wheel {
    /// 槽位数组，每个槽位按插入顺序存储一组定时器任务
    buckets: Vec<Vec<TimerTask>>,

    /// 下一个 tick 要扫描的槽位
    cursor: usize,

    /// 槽位数量
    bucket_count: usize,

    /// 每个 tick 的时间长度
    tick_interval: Duration,

    /// 任务键到所在槽位的索引，用于取消任务
    key_index: FxHashMap<TaskKey, usize>,
}

impl Wheel {
    /// 创建新的时间轮
    ///
    /// # 注意
    /// 配置参数已在 `WheelConfig::builder().build()` 中验证，
    /// 因此此方法不会失败。
    pub fn new(config: &WheelConfig) -> Self {
        let bucket_count = config.bucket_count;
        let mut buckets = Vec::with_capacity(bucket_count);
        for _ in 0..bucket_count {
            buckets.push(Vec::new());
        }

        Self {
            buckets,
            cursor: 0,
            bucket_count,
            tick_interval: config.tick_interval,
            key_index: FxHashMap::default(),
        }
    }

    /// 获取下一个 tick 要扫描的槽位
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// 获取 tick 时长
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// 获取槽位数量
    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    /// 等待中的任务数量
    pub fn len(&self) -> usize {
        self.key_index.len()
    }

    /// 检查时间轮是否为空
    pub fn is_empty(&self) -> bool {
        self.key_index.is_empty()
    }

    /// 检查某个键是否仍在等待
    pub fn contains(&self, key: &TaskKey) -> bool {
        self.key_index.contains_key(key)
    }

    /// 计算延迟对应的 tick 数（向下取整，不足一个 tick 记为 0）
    pub fn delay_to_ticks(&self, delay: Duration) -> u64 {
        let ticks = delay.as_nanos() / self.tick_interval.as_nanos();
        u64::try_from(ticks).unwrap_or(u64::MAX)
    }

    /// 计算延迟对应的槽位和圈数
    ///
    /// # 返回
    /// `(bucket_index, revolutions)`：
    /// - `bucket_index = (cursor + ticks) mod bucket_count`
    /// - `revolutions = ticks / bucket_count`
    pub fn position(&self, delay: Duration) -> (usize, u64) {
        let ticks = self.delay_to_ticks(delay);
        let buckets = self.bucket_count as u64;
        let offset = (ticks % buckets) as usize;
        let bucket_index = (self.cursor + offset) % self.bucket_count;
        (bucket_index, ticks / buckets)
    }

    /// 插入定时器任务
    ///
    /// 相同键的任务如果仍在等待，会先被移除，以保证键与槽位一一对应。
    ///
    /// # 返回
    /// 被替换掉的旧任务（如果有）
    pub fn insert(&mut self, mut task: TimerTask) -> Option<TimerTask> {
        let replaced = self.cancel(&task.key);

        let (bucket_index, revolutions) = self.position(task.delay);
        task.revolutions = revolutions;

        tracing::trace!(
            key = %task.key,
            bucket = bucket_index,
            revolutions,
            "task inserted"
        );

        self.key_index.insert(task.key.clone(), bucket_index);
        self.buckets[bucket_index].push(task);

        replaced
    }

    /// 取消定时器任务
    ///
    /// 只扫描索引指向的那个槽位。键不存在（已经触发或从未调度）时什么也不做。
    ///
    /// # 返回
    /// 被移除的任务
    pub fn cancel(&mut self, key: &TaskKey) -> Option<TimerTask> {
        let bucket_index = self.key_index.remove(key)?;
        let bucket = &mut self.buckets[bucket_index];
        let position = bucket.iter().position(|task| &task.key == key)?;

        tracing::trace!(key = %key, bucket = bucket_index, "task cancelled");
        Some(bucket.remove(position))
    }

    /// 批量取消定时器任务
    ///
    /// # 返回
    /// 成功取消的任务数量
    pub fn cancel_batch(&mut self, keys: &[TaskKey]) -> usize {
        keys.iter()
            .filter(|key| self.cancel(key).is_some())
            .count()
    }

    /// 推进时间轮，返回所有到期的任务
    ///
    /// 扫描当前游标指向的槽位并将游标前移一格。还有剩余圈数的任务
    /// 圈数减一并留在原位，其余任务从槽位和索引中移除后按插入顺序返回。
    pub fn advance(&mut self) -> Vec<TimerTask> {
        let bucket_index = self.cursor;
        self.cursor = (self.cursor + 1) % self.bucket_count;

        let bucket = &mut self.buckets[bucket_index];
        if bucket.is_empty() {
            return Vec::new();
        }

        let scanned = std::mem::take(bucket);
        let mut expired_tasks = Vec::new();

        for mut task in scanned {
            if task.revolutions > 0 {
                task.revolutions -= 1;
                bucket.push(task);
            } else {
                self.key_index.remove(&task.key);
                expired_tasks.push(task);
            }
        }

        expired_tasks
    }
}
