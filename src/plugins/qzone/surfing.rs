use super::api::PostDraft;
use super::config::{AccessMode, SurfingConfig};
use super::error::{QzoneError, QzoneResult};
use super::filter;
use super::llm::{self, ImageStyle};
use super::router::{Args, Invocation};
use super::service::{Outcome, QzoneService};
use crate::{error, info, warn};
use anyhow::{Context as _, bail};
use chrono::{Local, NaiveDate};
use futures_util::future::BoxFuture;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::sync::Mutex as AsyncMutex;

const TAVILY_URL: &str = "https://api.tavily.com/search";
const TRENDING_QUERY: &str = "今日热门话题 热搜";
const RETAIN_DAYS: i64 = 30;

pub const CATEGORIES: &[(&str, &[&str])] = &[
    ("科技", &["人工智能", "ChatGPT", "AI绘画", "元宇宙", "区块链", "量子计算"]),
    ("娱乐", &["电影", "音乐", "游戏", "综艺", "明星", "网红"]),
    ("生活", &["美食", "旅游", "健身", "养生", "宠物", "家居"]),
    ("社会", &["热点", "时事", "民生", "教育", "职场", "情感"]),
    ("知识", &["冷知识", "历史", "科学", "文化", "哲学", "心理学"]),
];

pub const STYLES: &[(&str, &str)] = &[
    ("幽默", "用幽默风趣的语言，加入一些俏皮话和轻松的笑点"),
    ("深度", "深入分析问题，提供有深度的见解和思考"),
    ("简洁", "用简洁明了的语言，直击要点"),
    ("文艺", "用诗意的语言表达，适当使用比喻和意象"),
    ("实用", "提供实用的信息和建议，帮助读者解决问题"),
];

const DEFAULT_TOPICS: &[&str] = &["人工智能", "ChatGPT", "AI绘画", "元宇宙", "区块链"];

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub content: String,
}

/// 联网搜索能力
pub trait WebSearch: Send + Sync {
    fn search<'a>(
        &'a self,
        query: &'a str,
        max_results: usize,
    ) -> BoxFuture<'a, anyhow::Result<Vec<SearchHit>>>;
}

pub struct TavilySearch {
    http: reqwest::Client,
    api_key: String,
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'a str,
    include_answer: bool,
    include_images: bool,
    max_results: usize,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

/// 解析 Tavily 响应；AI 总结作为第一条结果
fn parse_tavily(body: &str) -> anyhow::Result<Vec<SearchHit>> {
    let resp: TavilyResponse = serde_json::from_str(body).context("Tavily 响应格式错误")?;
    let mut hits: Vec<SearchHit> = resp
        .results
        .into_iter()
        .map(|r| SearchHit {
            title: r.title,
            url: r.url,
            content: r.content,
        })
        .collect();
    if let Some(answer) = resp.answer.filter(|a| !a.trim().is_empty()) {
        hits.insert(
            0,
            SearchHit {
                title: "AI总结".to_string(),
                url: String::new(),
                content: answer,
            },
        );
    }
    Ok(hits)
}

impl TavilySearch {
    pub fn new(api_key: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
        })
    }

    async fn do_search(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<SearchHit>> {
        let payload = TavilyRequest {
            api_key: &self.api_key,
            query,
            search_depth: "advanced",
            include_answer: true,
            include_images: false,
            max_results,
        };
        let resp = self
            .http
            .post(TAVILY_URL)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_string(&payload)?)
            .send()
            .await
            .context("请求 Tavily 失败")?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            bail!("Tavily 返回 {}: {}", status, body.chars().take(200).collect::<String>());
        }
        let hits = parse_tavily(&body)?;
        info!(target: "Qzone/Surfing", "Tavily 搜索「{}」得到 {} 条结果", query, hits.len());
        Ok(hits)
    }
}

impl WebSearch for TavilySearch {
    fn search<'a>(
        &'a self,
        query: &'a str,
        max_results: usize,
    ) -> BoxFuture<'a, anyhow::Result<Vec<SearchHit>>> {
        Box::pin(self.do_search(query, max_results))
    }
}

/// 用户 -> 日期 -> 次数
type UsageData = BTreeMap<String, BTreeMap<String, u32>>;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserStats {
    pub total: u32,
    pub today: u32,
    /// 最近 7 天 (日期, 次数)，从今天开始
    pub recent: Vec<(String, u32)>,
}

fn date_key(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// 剩余次数，-1 表示不限
pub fn remaining(limit: u32, used: u32) -> i64 {
    if limit == 0 {
        -1
    } else {
        i64::from(limit.saturating_sub(used))
    }
}

fn fmt_remaining(n: i64) -> String {
    if n < 0 {
        "无限制".to_string()
    } else {
        n.to_string()
    }
}

/// 冲浪次数统计，持久化为 JSON
pub struct UsageStore {
    path: Option<PathBuf>,
    data: AsyncMutex<UsageData>,
}

impl UsageStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: AsyncMutex::new(UsageData::new()),
        }
    }

    pub async fn load(path: PathBuf) -> Self {
        let data = match fs::read_to_string(&path).await {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                error!(target: "Qzone/Surfing", "解析使用记录失败: {}", e);
                UsageData::new()
            }),
            Err(_) => UsageData::new(),
        };
        Self {
            path: Some(path),
            data: AsyncMutex::new(data),
        }
    }

    async fn persist(&self, data: &UsageData) {
        let Some(path) = &self.path else {
            return;
        };
        match serde_json::to_string_pretty(data) {
            Ok(s) => {
                if let Err(e) = fs::write(path, s).await {
                    error!(target: "Qzone/Surfing", "保存使用记录失败: {}", e);
                }
            }
            Err(e) => error!(target: "Qzone/Surfing", "序列化使用记录失败: {}", e),
        }
    }

    pub async fn used_on(&self, user: i64, day: NaiveDate) -> u32 {
        let data = self.data.lock().await;
        data.get(&user.to_string())
            .and_then(|days| days.get(&date_key(day)))
            .copied()
            .unwrap_or(0)
    }

    /// 额度未满时占用一次（limit 为 0 表示不限），检查与计数在同一把锁内完成
    pub async fn try_reserve(&self, user: i64, day: NaiveDate, limit: u32) -> bool {
        let mut data = self.data.lock().await;
        let counter = data
            .entry(user.to_string())
            .or_default()
            .entry(date_key(day))
            .or_insert(0);
        if limit != 0 && *counter >= limit {
            return false;
        }
        *counter += 1;

        // 清理 30 天前的数据
        let cutoff = date_key(day - chrono::Duration::days(RETAIN_DAYS));
        for days in data.values_mut() {
            days.retain(|d, n| *d >= cutoff && *n > 0);
        }
        data.retain(|_, days| !days.is_empty());

        self.persist(&data).await;
        true
    }

    /// 归还 try_reserve 占用的一次
    pub async fn release(&self, user: i64, day: NaiveDate) {
        let mut data = self.data.lock().await;
        let key = user.to_string();
        let Some(days) = data.get_mut(&key) else {
            return;
        };
        if let Some(n) = days.get_mut(&date_key(day)) {
            *n = n.saturating_sub(1);
        }
        days.retain(|_, n| *n > 0);
        if days.is_empty() {
            data.remove(&key);
        }
        self.persist(&data).await;
    }

    pub async fn stats_on(&self, user: i64, day: NaiveDate) -> UserStats {
        let data = self.data.lock().await;
        let Some(days) = data.get(&user.to_string()) else {
            return UserStats::default();
        };
        let recent = (0..7)
            .map(|i| {
                let key = date_key(day - chrono::Duration::days(i));
                let n = days.get(&key).copied().unwrap_or(0);
                (key, n)
            })
            .collect();
        UserStats {
            total: days.values().sum(),
            today: days.get(&date_key(day)).copied().unwrap_or(0),
            recent,
        }
    }

    /// 重置指定用户或全部用户，返回被清除的用户数
    pub async fn reset(&self, user: Option<i64>) -> usize {
        let mut data = self.data.lock().await;
        let cleared = match user {
            Some(u) => usize::from(data.remove(&u.to_string()).is_some()),
            None => {
                let n = data.len();
                data.clear();
                n
            }
        };
        self.persist(&data).await;
        cleared
    }

    pub async fn snapshot(&self) -> UsageData {
        self.data.lock().await.clone()
    }
}

pub struct Surfing {
    search: Option<Arc<dyn WebSearch>>,
    pub usage: UsageStore,
}

impl Surfing {
    /// search 为 None 表示未配置 API Key
    pub fn new(search: Option<Arc<dyn WebSearch>>, usage: UsageStore) -> Self {
        Self { search, usage }
    }

    fn search(&self) -> QzoneResult<&dyn WebSearch> {
        self.search
            .as_deref()
            .ok_or_else(|| QzoneError::Search("未配置 Tavily API 密钥".to_string()))
    }
}

pub fn check_access(cfg: &SurfingConfig, admins: &[i64], user_id: i64) -> QzoneResult<()> {
    match cfg.access_mode {
        AccessMode::Everyone => Ok(()),
        AccessMode::Whitelist if cfg.whitelist.contains(&user_id) => Ok(()),
        AccessMode::Whitelist => Err(QzoneError::AccessDenied(
            "您不在白名单中，无法使用此功能".to_string(),
        )),
        AccessMode::MasterOnly => {
            let masters = if cfg.master.is_empty() {
                admins
            } else {
                cfg.master.as_slice()
            };
            if masters.contains(&user_id) {
                Ok(())
            } else {
                Err(QzoneError::AccessDenied("此功能仅限主人使用".to_string()))
            }
        }
    }
}

/// 选择搜索主题：显式主题优先，其次按分类随机，分类无效时全局随机
pub fn pick_query(category: Option<&str>, topic: Option<&str>) -> String {
    if let Some(t) = topic.filter(|t| !t.is_empty()) {
        return t.to_string();
    }
    let mut rng = rand::rng();
    let topics = category
        .and_then(|c| CATEGORIES.iter().find(|(name, _)| *name == c))
        .or_else(|| CATEGORIES.choose(&mut rng))
        .map(|(_, topics)| *topics)
        .unwrap_or(DEFAULT_TOPICS);
    topics
        .choose(&mut rng)
        .copied()
        .unwrap_or("热点")
        .to_string()
}

fn style_description(style: &str) -> &'static str {
    STYLES
        .iter()
        .find(|(name, _)| *name == style)
        .map(|(_, d)| *d)
        .unwrap_or(STYLES[0].1)
}

pub fn system_prompt(base: &str, style: &str, max_length: usize) -> String {
    format!(
        "{}\n\n写作要求：\n1. {}\n2. 内容长度不超过{}字\n3. 语言生动有趣，吸引读者\n4. 可以适当加入表情符号增加趣味性\n5. 避免敏感话题和政治内容\n6. 保持积极向上的基调\n7. 不要添加标签和来源信息\n\n请直接输出说说内容，不需要标题或其他格式。",
        base.trim(),
        style_description(style),
        max_length
    )
}

pub fn user_prompt(query: &str, hits: &[SearchHit]) -> String {
    let mut prompt = format!("搜索主题：{}\n\n以下是网络搜索结果：\n", query);
    for (i, hit) in hits.iter().take(3).enumerate() {
        let content: String = hit.content.chars().take(200).collect();
        prompt.push_str(&format!("{}. {}: {}...\n", i + 1, hit.title, content));
    }
    prompt.push_str("\n不要在说说中提及信息来源，也不要直接复制原文。");
    prompt
}

/// 从搜索结果标题提取热门话题
pub fn trending_from(hits: &[SearchHit]) -> Vec<String> {
    hits.iter()
        .map(|h| h.title.trim())
        .filter(|t| t.chars().count() > 5)
        .take(5)
        .map(String::from)
        .collect()
}

/// 冲浪写作风格对应的配图风格
pub fn image_style_for(style: &str) -> ImageStyle {
    match style {
        "文艺" => ImageStyle::Artistic,
        "简洁" => ImageStyle::Minimalist,
        "幽默" => ImageStyle::Vibrant,
        _ => ImageStyle::Default,
    }
}

struct SurfReport {
    query: String,
    style: String,
    searched: usize,
    painted: usize,
}

async fn write_post(
    svc: &QzoneService,
    inv: &Invocation,
    words: &[&str],
    with_images: bool,
) -> QzoneResult<Outcome> {
    let cfg = &svc.config.surfing;
    check_access(cfg, &svc.config.admins, inv.user_id)?;

    let day = today();
    if !svc
        .surfing
        .usage
        .try_reserve(inv.user_id, day, cfg.daily_limit)
        .await
    {
        return Err(QzoneError::Quota(format!(
            "今日使用次数已达上限（{}次），请明天再试",
            cfg.daily_limit
        )));
    }

    match surf_and_publish(svc, inv, words, with_images).await {
        Ok(report) => {
            let left = remaining(cfg.daily_limit, svc.surfing.usage.used_on(inv.user_id, day).await);
            let mut text = format!(
                "✅ 上网冲浪说说发布成功！\n📝 主题：{}\n🎨 风格：{}\n🔍 搜索了 {} 条信息",
                report.query, report.style, report.searched
            );
            if with_images {
                text.push_str(&format!("\n🖼️ 配图：{} 张", report.painted));
            }
            text.push_str(&format!("\n📊 今日剩余次数：{}", fmt_remaining(left)));
            Ok(Outcome::text(text))
        }
        Err(e) => {
            // 没发出去就不占次数
            svc.surfing.usage.release(inv.user_id, day).await;
            Err(e)
        }
    }
}

/// 搜索 -> 生成 -> [配图] -> 发布
async fn surf_and_publish(
    svc: &QzoneService,
    inv: &Invocation,
    words: &[&str],
    with_images: bool,
) -> QzoneResult<SurfReport> {
    let cfg = &svc.config.surfing;
    let category = words.first().copied().filter(|c| *c != "随机");
    let topic = words.get(1).copied();
    let style = words.get(2).copied().unwrap_or("幽默");
    let query = pick_query(category, topic);
    info!(target: "Qzone/Surfing", "{} 开始冲浪: {}", inv.user_id, query);

    let hits = svc
        .surfing
        .search()?
        .search(&query, cfg.max_results.max(1))
        .await
        .map_err(|e| QzoneError::Search(format!("{:#}", e)))?;
    if hits.is_empty() {
        return Err(QzoneError::Search("未搜索到相关信息".to_string()));
    }

    let raw = svc
        .generator
        .generate_text(
            &system_prompt(&cfg.prompt, style, cfg.max_length),
            &user_prompt(&query, &hits),
        )
        .await?;
    let text = filter::sanitize(
        &raw.split_whitespace().collect::<Vec<_>>().join(" "),
        cfg.max_length,
    )?;

    let mut images = inv.images.clone();
    let painted = if with_images {
        let generated = llm::illustrate(svc.painter.as_ref(), image_style_for(style), &text).await;
        let n = generated.len();
        images.extend(generated);
        n
    } else {
        0
    };

    svc.api.publish(&PostDraft { text, images }).await?;
    Ok(SurfReport {
        query,
        style: style.to_string(),
        searched: hits.len().min(3),
        painted,
    })
}

async fn trending(svc: &QzoneService) -> QzoneResult<Outcome> {
    let topics = match svc.surfing.search()?.search(TRENDING_QUERY, 3).await {
        Ok(hits) => trending_from(&hits),
        Err(e) => {
            warn!(target: "Qzone/Surfing", "获取热门话题失败: {:#}", e);
            DEFAULT_TOPICS.iter().map(|s| s.to_string()).collect()
        }
    };
    if topics.is_empty() {
        return Ok(Outcome::text("暂时没有获取到热门话题，请稍后再试"));
    }
    let list: Vec<String> = topics.iter().map(|t| format!("• {}", t)).collect();
    Ok(Outcome::text(format!(
        "🔥 当前热门话题：\n{}\n\n💡 使用命令：冲浪 写说说 <分类> <话题> <风格> 来生成说说",
        list.join("\n")
    )))
}

async fn my_stats(svc: &QzoneService, user_id: i64) -> QzoneResult<Outcome> {
    let stats = svc.surfing.usage.stats_on(user_id, today()).await;
    let left = remaining(svc.config.surfing.daily_limit, stats.today);
    let mut recent: Vec<String> = stats
        .recent
        .iter()
        .filter(|(_, n)| *n > 0)
        .map(|(d, n)| format!("• {}: {}次", d, n))
        .collect();
    if recent.is_empty() {
        recent.push("• 最近7天无使用记录".to_string());
    }
    Ok(Outcome::text(format!(
        "📊 您的上网冲浪使用统计\n\n📈 总体统计：\n• 总使用次数：{}次\n• 今日使用次数：{}次\n• 剩余使用次数：{}\n\n📅 最近7天使用情况：\n{}",
        stats.total,
        stats.today,
        fmt_remaining(left),
        recent.join("\n")
    )))
}

async fn help(svc: &QzoneService, user_id: i64) -> QzoneResult<Outcome> {
    let cfg = &svc.config.surfing;
    let used = svc.surfing.usage.used_on(user_id, today()).await;
    let limit = if cfg.daily_limit == 0 {
        "无限制".to_string()
    } else {
        format!("{}次", cfg.daily_limit)
    };
    let categories: Vec<&str> = CATEGORIES.iter().map(|(n, _)| *n).collect();
    let styles: Vec<&str> = STYLES.iter().map(|(n, _)| *n).collect();
    Ok(Outcome::text(format!(
        "🌊 上网冲浪功能帮助\n\n📊 当前状态：\n• 访问模式：{}\n• 每日限制：{}\n• 您今日已使用：{}次\n• 剩余次数：{}\n\n📚 可用命令：\n• 冲浪 写说说 <分类> <主题> <风格> - 生成并发布说说\n• 冲浪 写说说配图 <分类> <主题> <风格> - 生成说说并配上 AI 图片\n• 冲浪 热门话题 - 获取当前热门话题\n• 冲浪 我的统计 - 查看个人使用统计\n• 冲浪 帮助 - 显示此帮助\n\n🎯 分类：{}/随机\n✍️ 风格：{}\n\n💡 示例：冲浪 写说说 科技 AI发展 幽默",
        cfg.access_mode.label(),
        limit,
        used,
        fmt_remaining(remaining(cfg.daily_limit, used)),
        categories.join("/"),
        styles.join("/")
    )))
}

async fn reset(svc: &QzoneService, inv: &Invocation, words: &[&str]) -> QzoneResult<Outcome> {
    let target = match inv.mentions.first() {
        Some(id) => Some(*id),
        None => match words.first() {
            Some(w) => Some(
                w.trim_start_matches('@')
                    .parse::<i64>()
                    .map_err(|_| QzoneError::BadArgument("请输入正确的QQ号".to_string()))?,
            ),
            None => None,
        },
    };
    let cleared = svc.surfing.usage.reset(target).await;
    Ok(Outcome::text(match target {
        Some(id) => format!("✅ 已重置用户 {} 的使用次数", id),
        None => format!("✅ 已重置所有 {} 个用户的使用次数", cleared),
    }))
}

async fn all_stats(svc: &QzoneService) -> QzoneResult<Outcome> {
    let data = svc.surfing.usage.snapshot().await;
    if data.is_empty() {
        return Ok(Outcome::text("📊 暂无用户使用记录"));
    }
    let day = today();
    let mut users: Vec<(&String, u32)> = data
        .iter()
        .map(|(u, days)| (u, days.values().sum()))
        .collect();
    users.sort_by(|a, b| b.1.cmp(&a.1));

    let mut out = String::from("📊 所有用户上网冲浪使用统计\n");
    for (i, (user, total)) in users.iter().take(10).enumerate() {
        let days = &data[*user];
        let today_n = days.get(&date_key(day)).copied().unwrap_or(0);
        out.push_str(&format!(
            "\n{}. 用户 {}:\n   • 总使用次数: {}次\n   • 今日使用次数: {}次",
            i + 1,
            user,
            total,
            today_n
        ));
        let recent: Vec<String> = (0..3)
            .filter_map(|j| {
                let key = date_key(day - chrono::Duration::days(j));
                days.get(&key).map(|n| format!("{}: {}次", key, n))
            })
            .collect();
        if !recent.is_empty() {
            out.push_str(&format!("\n   • 最近使用: {}", recent.join(", ")));
        }
    }
    if users.len() > 10 {
        out.push_str(&format!("\n\n... 还有 {} 个用户", users.len() - 10));
    }
    out.push_str("\n\n💡 使用「冲浪 重置次数 @用户」来重置指定用户的使用次数");
    Ok(Outcome::text(out))
}

/// 冲浪 <子指令> [参数...]
pub async fn handle(svc: &QzoneService, inv: &Invocation, args: &Args) -> QzoneResult<Outcome> {
    let words: Vec<&str> = args.text.split_whitespace().collect();
    let (sub, rest) = match words.split_first() {
        Some((sub, rest)) => (*sub, rest),
        None => ("帮助", &[][..]),
    };

    match sub {
        "写说说" => write_post(svc, inv, rest, false).await,
        "写说说配图" => write_post(svc, inv, rest, true).await,
        "热门话题" => trending(svc).await,
        "我的统计" => my_stats(svc, inv.user_id).await,
        "帮助" => help(svc, inv.user_id).await,
        "重置次数" | "查看统计" => {
            if !svc.config.is_admin(inv.user_id) {
                return Err(QzoneError::PermissionDenied(format!("冲浪 {}", sub)));
            }
            if sub == "重置次数" {
                reset(svc, inv, rest).await
            } else {
                all_stats(svc).await
            }
        }
        other => Err(QzoneError::BadArgument(format!(
            "未知的冲浪子指令「{}」，发送「冲浪 帮助」查看用法",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::qzone::service::fixture::{self, ADMIN, BOT, USER};
    use crate::plugins::qzone::testing::{FAKE_IMAGE, FakeQzone};

    struct FakeSearch;

    impl WebSearch for FakeSearch {
        fn search<'a>(
            &'a self,
            query: &'a str,
            _max_results: usize,
        ) -> BoxFuture<'a, anyhow::Result<Vec<SearchHit>>> {
            Box::pin(async move {
                Ok(vec![
                    SearchHit {
                        title: format!("{}最新进展一览", query),
                        url: "https://example.com".into(),
                        content: "内容".repeat(150),
                    },
                    SearchHit {
                        title: "短".into(),
                        url: String::new(),
                        content: "x".into(),
                    },
                ])
            })
        }
    }

    /// 搜索前先睡一会，让并发请求在发布前交错
    struct SlowSearch;

    impl WebSearch for SlowSearch {
        fn search<'a>(
            &'a self,
            query: &'a str,
            max_results: usize,
        ) -> BoxFuture<'a, anyhow::Result<Vec<SearchHit>>> {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                FakeSearch.search(query, max_results).await
            })
        }
    }

    fn inv(user_id: i64, text: &str) -> (Invocation, Args) {
        let inv = Invocation {
            user_id,
            text: text.into(),
            ..Invocation::default()
        };
        let args = Args {
            text: text.into(),
            ..Args::default()
        };
        (inv, args)
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn remaining_quota() {
        assert_eq!(remaining(0, 10), -1);
        assert_eq!(remaining(3, 1), 2);
        assert_eq!(remaining(3, 5), 0);
    }

    #[test]
    fn tavily_answer_comes_first() {
        let body = r#"{"answer":"总结","results":[{"title":"t","url":"u","content":"c","score":0.5}]}"#;
        let hits = parse_tavily(body).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "AI总结");
        assert_eq!(hits[1].url, "u");
        assert!(parse_tavily("not json").is_err());
    }

    #[test]
    fn prompts_and_queries() {
        assert_eq!(pick_query(Some("科技"), Some("AI发展")), "AI发展");
        let q = pick_query(Some("生活"), None);
        assert!(CATEGORIES[2].1.contains(&q.as_str()));
        assert!(!pick_query(Some("不存在"), None).is_empty());

        let hits = vec![SearchHit {
            title: "标题".into(),
            url: String::new(),
            content: "字".repeat(300),
        }];
        let p = user_prompt("主题", &hits);
        assert!(p.starts_with("搜索主题：主题\n\n以下是网络搜索结果：\n1. 标题: "));
        assert!(p.contains(&format!("{}...", "字".repeat(200))));
        assert!(system_prompt("基础", "文艺", 300).contains("诗意"));
        assert!(system_prompt("基础", "乱写", 300).contains("幽默风趣"));
    }

    #[test]
    fn access_modes() {
        let mut cfg = SurfingConfig::default();
        assert!(check_access(&cfg, &[], 5).is_ok());

        cfg.access_mode = AccessMode::Whitelist;
        cfg.whitelist = vec![5];
        assert!(check_access(&cfg, &[], 5).is_ok());
        assert!(check_access(&cfg, &[], 6).is_err());

        cfg.access_mode = AccessMode::MasterOnly;
        assert!(check_access(&cfg, &[1], 1).is_ok());
        assert!(check_access(&cfg, &[1], 5).is_err());
        cfg.master = vec![5];
        assert!(check_access(&cfg, &[1], 5).is_ok());
        assert!(check_access(&cfg, &[1], 1).is_err());
    }

    #[tokio::test]
    async fn usage_store_counts_and_prunes() {
        let store = UsageStore::in_memory();
        assert!(store.try_reserve(7, d("2024-01-01"), 0).await);
        assert!(store.try_reserve(7, d("2024-02-10"), 0).await);
        assert!(store.try_reserve(7, d("2024-02-10"), 2).await);
        assert!(!store.try_reserve(7, d("2024-02-10"), 2).await);

        assert_eq!(store.used_on(7, d("2024-02-10")).await, 2);
        // 超过 30 天的数据已被清理
        assert_eq!(store.used_on(7, d("2024-01-01")).await, 0);

        let stats = store.stats_on(7, d("2024-02-11")).await;
        assert_eq!(stats.total, 2);
        assert_eq!(stats.today, 0);
        assert_eq!(stats.recent[1], ("2024-02-10".to_string(), 2));

        store.release(7, d("2024-02-10")).await;
        assert_eq!(store.used_on(7, d("2024-02-10")).await, 1);
        assert!(store.try_reserve(7, d("2024-02-10"), 2).await);

        assert!(store.try_reserve(8, d("2024-02-10"), 0).await);
        assert_eq!(store.reset(Some(7)).await, 1);
        assert_eq!(store.used_on(7, d("2024-02-10")).await, 0);
        assert_eq!(store.reset(None).await, 1);
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn quota_blocks_after_limit() {
        let reply = "今天在网上看到人工智能的新进展，感觉未来真的越来越近了";
        let fx = fixture::build(FakeQzone::new(BOT), reply, Some(Arc::new(FakeSearch)), |c| {
            c.surfing.daily_limit = 1
        })
        .await;

        let (i, a) = inv(USER, "写说说 科技 人工智能 幽默");
        let out = handle(&fx.svc, &i, &a).await.unwrap();
        assert!(out.text.contains("📝 主题：人工智能"));
        assert!(out.text.contains("🔍 搜索了 2 条信息"));
        assert!(out.text.contains("今日剩余次数：0"));
        assert_eq!(fx.api.published().len(), 1);

        let err = handle(&fx.svc, &i, &a).await.unwrap_err();
        assert!(matches!(err, QzoneError::Quota(_)));
        assert_eq!(fx.api.published().len(), 1);

        // 管理员重置后恢复
        let (ri, ra) = inv(ADMIN, &format!("重置次数 {}", USER));
        handle(&fx.svc, &ri, &ra).await.unwrap();
        assert!(handle(&fx.svc, &i, &a).await.is_ok());
    }

    #[tokio::test]
    async fn failed_publish_does_not_count() {
        let reply = "今天在网上看到人工智能的新进展，感觉未来真的越来越近了";
        let fx = fixture::build(FakeQzone::new(BOT), reply, Some(Arc::new(FakeSearch)), |_| {}).await;
        fx.api.fail_publish(true);

        let (i, a) = inv(USER, "写说说");
        assert!(handle(&fx.svc, &i, &a).await.is_err());
        assert_eq!(fx.svc.surfing.usage.used_on(USER, today()).await, 0);
    }

    #[tokio::test]
    async fn admin_subcommands_and_trending() {
        let fx = fixture::build(FakeQzone::new(BOT), "x", Some(Arc::new(FakeSearch)), |_| {}).await;

        let (i, a) = inv(USER, "查看统计");
        assert!(matches!(
            handle(&fx.svc, &i, &a).await,
            Err(QzoneError::PermissionDenied(_))
        ));

        let (i, a) = inv(USER, "热门话题");
        let out = handle(&fx.svc, &i, &a).await.unwrap();
        assert!(out.text.contains("• 今日热门话题 热搜最新进展一览"));
        assert!(!out.text.contains("• 短"));

        let (i, a) = inv(USER, "");
        assert!(handle(&fx.svc, &i, &a).await.unwrap().text.contains("上网冲浪功能帮助"));
    }

    #[tokio::test]
    async fn missing_api_key_is_reported() {
        let fx = fixture::basic(FakeQzone::new(BOT)).await;
        let (i, a) = inv(USER, "写说说");
        assert!(matches!(
            handle(&fx.svc, &i, &a).await,
            Err(QzoneError::Search(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_slot() {
        let reply = "今天在网上看到人工智能的新进展，感觉未来真的越来越近了";
        let fx = fixture::build(FakeQzone::new(BOT), reply, Some(Arc::new(SlowSearch)), |c| {
            c.surfing.daily_limit = 1
        })
        .await;

        let (i, a) = inv(USER, "写说说 科技 人工智能");
        let (first, second) = tokio::join!(handle(&fx.svc, &i, &a), handle(&fx.svc, &i, &a));

        let quota_errors = [&first, &second]
            .iter()
            .filter(|r| matches!(r, Err(QzoneError::Quota(_))))
            .count();
        assert_eq!(quota_errors, 1);
        assert!(first.is_ok() || second.is_ok());
        assert_eq!(fx.api.published().len(), 1);
        assert_eq!(fx.svc.surfing.usage.used_on(USER, today()).await, 1);
    }

    #[tokio::test]
    async fn post_with_images_appends_generated_picture() {
        let reply = "今天在网上看到人工智能的新进展，感觉未来真的越来越近了";
        let fx = fixture::build(FakeQzone::new(BOT), reply, Some(Arc::new(FakeSearch)), |_| {}).await;

        let (mut i, a) = inv(USER, "写说说配图 科技 人工智能 文艺");
        i.images = vec!["https://img.example.com/user.png".into()];
        let out = handle(&fx.svc, &i, &a).await.unwrap();
        assert!(out.text.contains("🖼️ 配图：1 张"));

        let published = fx.api.published();
        assert_eq!(
            published[0].images,
            vec!["https://img.example.com/user.png".to_string(), FAKE_IMAGE.to_string()]
        );
        assert!(fx.generator.image_prompts()[0].starts_with("生成一张具有艺术感的图片"));
    }

    #[tokio::test]
    async fn failed_picture_still_publishes_text() {
        let reply = "今天在网上看到人工智能的新进展，感觉未来真的越来越近了";
        let fx = fixture::build(FakeQzone::new(BOT), reply, Some(Arc::new(FakeSearch)), |_| {}).await;
        fx.generator.fail_images(true);

        let (i, a) = inv(USER, "写说说配图");
        let out = handle(&fx.svc, &i, &a).await.unwrap();
        assert!(out.text.contains("🖼️ 配图：0 张"));
        assert!(fx.api.published()[0].images.is_empty());
        assert_eq!(fx.svc.surfing.usage.used_on(USER, today()).await, 1);
    }
}
