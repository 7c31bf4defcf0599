use super::api::PostDraft;
use super::config::{JobConfig, JobsConfig};
use super::error::QzoneResult;
use super::llm::{self, ChatSource, DiaryRequest, DiaryStyle};
use super::render::fmt_time;
use super::service::QzoneService;
use crate::scheduler::{Scheduler, parse_daily_time};
use crate::{error, info, warn};
use rand::Rng;
use rand::seq::IndexedRandom;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Post,
    Comment,
    Like,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::Post, JobKind::Comment, JobKind::Like];

    pub fn label(self) -> &'static str {
        match self {
            JobKind::Post => "自动发说说",
            JobKind::Comment => "自动评论",
            JobKind::Like => "自动点赞",
        }
    }

    pub fn config(self, jobs: &JobsConfig) -> &JobConfig {
        match self {
            JobKind::Post => &jobs.post,
            JobKind::Comment => &jobs.comment,
            JobKind::Like => &jobs.like,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// 触发方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Daily(u32, u32, u32),
    Every(Duration),
}

impl Trigger {
    /// daily_at 有效时按每日定点，否则按间隔（至少 1 分钟）
    pub fn from_config(cfg: &JobConfig) -> Trigger {
        match parse_daily_time(&cfg.daily_at) {
            Some((h, m, s)) => Trigger::Daily(h, m, s),
            None => Trigger::Every(Duration::from_secs(cfg.interval_mins.max(1) * 60)),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Trigger::Daily(h, m, _) => format!("每天 {:02}:{:02}", h, m),
            Trigger::Every(d) => format!("每 {} 分钟", d.as_secs() / 60),
        }
    }
}

#[derive(Default)]
struct JobSlot {
    running: AtomicBool,
    runs: AtomicU64,
    failures: AtomicU64,
    skipped: AtomicU64,
    /// (时间戳, 结果摘要)
    last_run: Mutex<Option<(i64, String)>>,
}

/// 运行标记的守卫，任务结束（含 panic）时复位
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// 定时任务的运行状态
#[derive(Default)]
pub struct JobBoard {
    slots: [JobSlot; 3],
    task_ids: Mutex<Vec<u64>>,
}

impl JobBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, kind: JobKind) -> &JobSlot {
        &self.slots[kind.index()]
    }

    pub fn is_running(&self, kind: JobKind) -> bool {
        self.slot(kind).running.load(Ordering::SeqCst)
    }

    pub fn last_run(&self, kind: JobKind) -> Option<(i64, String)> {
        self.slot(kind).last_run.lock().unwrap().clone()
    }

    /// 执行一次任务；同类任务仍在运行时跳过并返回 None
    pub async fn run_exclusive<F, Fut>(&self, kind: JobKind, job: F) -> Option<QzoneResult<String>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = QzoneResult<String>>,
    {
        let slot = self.slot(kind);
        if slot
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            slot.skipped.fetch_add(1, Ordering::SeqCst);
            warn!(target: "Qzone/Job", "[{}] 上一次运行尚未结束，跳过本次触发", kind.label());
            return None;
        }
        let _guard = RunningGuard(&slot.running);

        info!(target: "Qzone/Job", "[{}] 开始执行", kind.label());
        let result = job().await;
        slot.runs.fetch_add(1, Ordering::SeqCst);

        let summary = match &result {
            Ok(s) => {
                info!(target: "Qzone/Job", "[{}] 完成: {}", kind.label(), s);
                s.clone()
            }
            Err(e) => {
                slot.failures.fetch_add(1, Ordering::SeqCst);
                error!(target: "Qzone/Job", "[{}] 失败: {}", kind.label(), e);
                format!("失败: {}", e)
            }
        };
        *slot.last_run.lock().unwrap() = Some((chrono::Local::now().timestamp(), summary));
        Some(result)
    }

    /// 记录新注册的调度任务，返回旧任务 ID 以便移除
    fn replace_tasks(&self, ids: Vec<u64>) -> Vec<u64> {
        std::mem::replace(&mut *self.task_ids.lock().unwrap(), ids)
    }
}

const POST_TOPICS: &[&str] = &["生活感悟", "科技发展", "情感交流", "学习心得", "娱乐休闲"];

/// 自动发说说的随机选择，在任何 await 之前确定
#[derive(Debug, Clone, Copy)]
struct PostPlan {
    style: DiaryStyle,
    topic: Option<&'static str>,
    multi_group: bool,
    with_images: bool,
}

/// NaN 视为 0
fn chance(p: f64) -> f64 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
}

fn plan_post(cfg: &JobConfig) -> PostPlan {
    let mut rng = rand::rng();
    // 多出的一档表示不限主题
    let topic_idx = rng.random_range(0..=POST_TOPICS.len());
    PostPlan {
        style: DiaryStyle::ALL
            .choose(&mut rng)
            .copied()
            .unwrap_or_default(),
        topic: POST_TOPICS.get(topic_idx).copied(),
        multi_group: rng.random_bool(chance(cfg.multi_group_chance)),
        with_images: rng.random_bool(chance(cfg.image_chance)),
    }
}

async fn post_once(svc: &QzoneService, chat: &dyn ChatSource) -> QzoneResult<String> {
    let plan = plan_post(&svc.config.jobs.post);
    let req = DiaryRequest {
        group_id: None,
        topic: plan.topic,
        style: plan.style,
        multi_group: plan.multi_group,
    };
    let text =
        llm::generate_diary(svc.generator.as_ref(), chat, &svc.config.llm, &req).await?;

    let images = if plan.with_images {
        llm::illustrate(svc.painter.as_ref(), plan.style.into(), &text).await
    } else {
        Vec::new()
    };
    let analysis = llm::analyze(svc.generator.as_ref(), &text).await;

    let image_info = match images.len() {
        0 => "纯文本".to_string(),
        n => format!("配图 {} 张", n),
    };
    let receipt = svc.api.publish(&PostDraft { text, images }).await?;
    Ok(format!(
        "已发布说说 tid={}（风格：{}，主题：{}，模式：{}，{}，情感：{}，话题：{}）",
        receipt.tid,
        plan.style.label(),
        plan.topic.unwrap_or("不限"),
        if plan.multi_group { "多群聊" } else { "单群聊" },
        image_info,
        analysis.sentiment,
        analysis.topic
    ))
}

async fn comment_once(svc: &QzoneService, batch: usize) -> QzoneResult<String> {
    let self_uin = svc.api.self_uin().await?;
    let feeds = svc.api.recent_feeds(1).await?;
    let mut done = 0;

    for feed in feeds
        .iter()
        .filter(|f| f.uin != self_uin && !f.commented_by(self_uin))
        .take(batch)
    {
        let content =
            match llm::generate_comment(svc.generator.as_ref(), &svc.config.llm, &feed.text).await
            {
                Ok(c) => c,
                Err(e) => {
                    warn!(target: "Qzone/Job", "为 {} 生成评论失败: {}", feed.tid, e);
                    continue;
                }
            };
        match svc.api.comment(feed, &content).await {
            Ok(()) => done += 1,
            Err(e) => warn!(target: "Qzone/Job", "评论 {} 失败: {}", feed.tid, e),
        }
    }
    Ok(format!("评论了 {} 条说说", done))
}

async fn like_once(svc: &QzoneService, batch: usize) -> QzoneResult<String> {
    let self_uin = svc.api.self_uin().await?;
    let feeds = svc.api.recent_feeds(1).await?;
    let mut done = 0;

    for feed in feeds
        .iter()
        .filter(|f| f.uin != self_uin && !f.liked)
        .take(batch)
    {
        match svc.api.like(feed).await {
            Ok(()) => done += 1,
            Err(e) => warn!(target: "Qzone/Job", "点赞 {} 失败: {}", feed.tid, e),
        }
    }
    Ok(format!("点赞了 {} 条说说", done))
}

/// 执行一次指定任务（带重入保护）
pub async fn run_job(
    svc: &QzoneService,
    kind: JobKind,
    chat: &dyn ChatSource,
) -> Option<QzoneResult<String>> {
    let batch = kind.config(&svc.config.jobs).batch.max(1);
    svc.jobs
        .run_exclusive(kind, || async move {
            match kind {
                JobKind::Post => post_once(svc, chat).await,
                JobKind::Comment => comment_once(svc, batch).await,
                JobKind::Like => like_once(svc, batch).await,
            }
        })
        .await
}

/// 注册所有启用的任务，并移除上一次连接注册的旧任务
pub fn register(svc: Arc<QzoneService>, scheduler: &Scheduler, chat: Arc<dyn ChatSource>) {
    let mut ids = Vec::new();

    for kind in JobKind::ALL {
        let cfg = kind.config(&svc.config.jobs);
        if !cfg.enabled {
            continue;
        }
        let trigger = Trigger::from_config(cfg);

        let svc = svc.clone();
        let chat = chat.clone();
        let task = move || {
            let svc = svc.clone();
            let chat = chat.clone();
            async move {
                run_job(&svc, kind, chat.as_ref()).await;
            }
        };

        let id = match trigger {
            Trigger::Daily(h, m, s) => scheduler.add_daily_at(h, m, s, task),
            Trigger::Every(d) => scheduler.add_interval(d, task),
        };
        info!(target: "Qzone/Job", "[{}] 已注册，{}", kind.label(), trigger.describe());
        ids.push(id);
    }

    for old in svc.jobs.replace_tasks(ids) {
        scheduler.remove(old);
    }
}

pub fn status_report(svc: &QzoneService) -> String {
    let mut out = String::from("⏰ 定时任务状态");
    for kind in JobKind::ALL {
        let cfg = kind.config(&svc.config.jobs);
        let slot = svc.jobs.slot(kind);
        out.push_str(&format!("\n\n【{}】", kind.label()));
        if !cfg.enabled {
            out.push_str(" 未启用");
            continue;
        }
        out.push_str(&format!(
            "\n周期：{}\n状态：{}\n运行 {} 次，失败 {} 次，跳过 {} 次",
            Trigger::from_config(cfg).describe(),
            if svc.jobs.is_running(kind) { "运行中" } else { "空闲" },
            slot.runs.load(Ordering::SeqCst),
            slot.failures.load(Ordering::SeqCst),
            slot.skipped.load(Ordering::SeqCst),
        ));
        match svc.jobs.last_run(kind) {
            Some((ts, summary)) => {
                out.push_str(&format!("\n上次运行：{}（{}）", fmt_time(ts), summary))
            }
            None => out.push_str("\n上次运行：从未运行"),
        }
    }
    out
}
