use crate::info;
use chrono::{DateTime, Local, NaiveTime, TimeZone};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::AbortHandle;

/// 全局定时任务管理器
pub struct Scheduler {
    tasks: Mutex<HashMap<u64, AbortHandle>>,
    next_id: AtomicU64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// 添加一个灵活调度任务
    ///
    /// `next_run_calculator` 接收当前时间并返回下一次执行时间，返回 None 时任务结束；
    /// `task_gen` 每次触发时生成一个新的 Future。
    pub fn add_schedule<C, F, Fut>(&self, mut next_run_calculator: C, mut task_gen: F) -> u64
    where
        C: FnMut(DateTime<Local>) -> Option<DateTime<Local>> + Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let mut next_time = next_run_calculator(Local::now());

        let handle = tokio::spawn(async move {
            while let Some(target_time) = next_time {
                let now = Local::now();
                if target_time > now {
                    let duration = (target_time - now).to_std().unwrap_or(Duration::ZERO);
                    tokio::time::sleep(duration).await;
                }

                task_gen().await;

                next_time = next_run_calculator(Local::now());
            }
        });

        self.tasks
            .lock()
            .unwrap()
            .insert(id, handle.abort_handle());
        id
    }

    /// 固定间隔执行（首次在一个间隔之后）
    pub fn add_interval<F, Fut>(&self, duration: Duration, task_gen: F) -> u64
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let step = chrono::Duration::from_std(duration).ok();
        self.add_schedule(move |now| step.map(|s| now + s), task_gen)
    }

    /// 每天特定时间执行 (HH:MM:SS)
    pub fn add_daily_at<F, Fut>(&self, hour: u32, minute: u32, second: u32, task_gen: F) -> u64
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.add_schedule(
            move |now| next_daily(now, hour, minute, second),
            task_gen,
        )
    }

    pub fn remove(&self, id: u64) {
        if let Some(handle) = self.tasks.lock().unwrap().remove(&id) {
            handle.abort();
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shutdown(&self) {
        info!(target: "Scheduler", "正在清理定时任务...");
        let mut tasks = self.tasks.lock().unwrap();
        for (_, handle) in tasks.drain() {
            handle.abort();
        }
    }
}

/// 计算下一个 HH:MM:SS；今天已过（或时间无效，如夏令时跳变）则顺延到明天
pub fn next_daily(
    now: DateTime<Local>,
    hour: u32,
    minute: u32,
    second: u32,
) -> Option<DateTime<Local>> {
    let today = now.date_naive();
    let target_today = today
        .and_hms_opt(hour, minute, second)
        .and_then(|t| Local.from_local_datetime(&t).single());

    if let Some(target) = target_today
        && target > now
    {
        return Some(target);
    }

    today
        .succ_opt()?
        .and_hms_opt(hour, minute, second)
        .and_then(|t| Local.from_local_datetime(&t).single())
}

/// 解析 "HH:MM" 或 "HH:MM:SS"
pub fn parse_daily_time(s: &str) -> Option<(u32, u32, u32)> {
    let s = s.trim();
    let t = NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()?;
    use chrono::Timelike;
    Some((t.hour(), t.minute(), t.second()))
}
