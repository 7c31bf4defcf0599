use crate::adapters::onebot::{LockedWriter, send_msg};
use crate::command::match_any;
use crate::config::build_config;
use crate::event::Context;
use crate::message::Message;
use crate::plugins::{PluginError, get_config, get_data_dir};
use crate::{error, info, warn};
use futures_util::future::BoxFuture;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use toml::Value;

pub mod api;
pub mod args;
pub mod bridge;
pub mod client;
pub mod config;
pub mod entity;
pub mod error;
pub mod feeds;
pub mod filter;
pub mod jobs;
pub mod llm;
pub mod queue;
pub mod render;
pub mod router;
pub mod service;
pub mod session;
pub mod surfing;
pub mod wall;

#[cfg(test)]
pub(crate) mod testing;

use bridge::OneBotBridge;
use client::QzoneClient;
use config::QzoneConfig;
use llm::OpenAiGenerator;
use queue::SubmissionQueue;
use router::Invocation;
use service::{Outcome, QzoneService};
use session::SessionManager;
use surfing::{Surfing, TavilySearch, UsageStore, WebSearch};

static SERVICE: OnceLock<Arc<QzoneService>> = OnceLock::new();

pub fn default_config() -> Value {
    build_config(QzoneConfig::default())
}

async fn build_service(ctx: &Context, config: QzoneConfig) -> Result<QzoneService, PluginError> {
    let session = Arc::new(SessionManager::new(&config.cookies));
    let api = QzoneClient::new(
        session.clone(),
        Duration::from_secs(config.request_timeout_secs.max(1)),
    )?;

    if config.llm.api_key.is_empty() {
        warn!(target: "Qzone", "未配置 LLM api_key，写说说 / 评论功能将不可用");
    }
    let generator = Arc::new(OpenAiGenerator::new(&config.llm));

    let queue = SubmissionQueue::new(ctx.db.clone());
    queue.init_schema().await?;

    let search: Option<Arc<dyn WebSearch>> = if config.surfing.tavily_api_key.is_empty() {
        None
    } else {
        Some(Arc::new(TavilySearch::new(&config.surfing.tavily_api_key)?))
    };
    let usage_path = get_data_dir("qzone").await?.join("surfing_usage.json");
    let surfing = Surfing::new(search, UsageStore::load(usage_path).await);

    Ok(QzoneService {
        config,
        api: Arc::new(api),
        session,
        painter: generator.clone(),
        generator,
        queue,
        jobs: jobs::JobBoard::new(),
        surfing,
    })
}

pub fn init(ctx: Context) -> BoxFuture<'static, Result<(), PluginError>> {
    Box::pin(async move {
        let config: QzoneConfig = get_config(&ctx, "qzone").unwrap_or_default();
        if config.admins.is_empty() {
            warn!(target: "Qzone", "未配置管理员，所有管理指令将无法使用");
        }
        let service = build_service(&ctx, config).await?;
        if SERVICE.set(Arc::new(service)).is_err() {
            warn!(target: "Qzone", "服务已初始化，忽略重复的 init");
        }
        Ok(())
    })
}

/// 连接建立后：绑定 Cookie 来源并（重新）注册定时任务
pub fn on_connected(
    ctx: Context,
    writer: LockedWriter,
) -> BoxFuture<'static, Result<Option<Context>, PluginError>> {
    Box::pin(async move {
        let Some(svc) = SERVICE.get() else {
            return Ok(Some(ctx));
        };

        let bridge = Arc::new(OneBotBridge::new(ctx.clone(), writer));
        svc.session.bind(bridge.clone());
        jobs::register(svc.clone(), &ctx.scheduler, bridge);

        info!(
            target: "Qzone",
            "已连接 {}，QQ空间会话将按需获取",
            ctx.bot.login_user.id
        );
        Ok(Some(ctx))
    })
}

async fn deliver(
    ctx: &Context,
    writer: LockedWriter,
    inv: &Invocation,
    reply_to: i64,
    outcome: Outcome,
) {
    let mut msg = Message::new();
    if reply_to != 0 {
        msg = msg.reply(reply_to);
    }
    msg = msg.text(outcome.text);
    for image in outcome.images {
        msg = msg.image(image);
    }
    if let Err(e) = send_msg(ctx, writer.clone(), inv.group_id, Some(inv.user_id), msg).await {
        error!(target: "Qzone", "发送回复失败: {}", e);
    }

    for notice in outcome.notices {
        let text = Message::from(notice.text);
        if let Err(e) = send_msg(ctx, writer.clone(), Some(notice.group_id), None, text).await {
            error!(target: "Qzone", "发送通知到群 {} 失败: {}", notice.group_id, e);
        }
    }
}

pub fn handle(
    ctx: Context,
    writer: LockedWriter,
) -> BoxFuture<'static, Result<Option<Context>, PluginError>> {
    Box::pin(async move {
        let Some(svc) = SERVICE.get() else {
            return Ok(Some(ctx));
        };
        let Some(msg) = ctx.as_message() else {
            return Ok(Some(ctx));
        };
        let Some((keyword, m)) = match_any(&ctx, &router::keywords()) else {
            return Ok(Some(ctx));
        };

        let inv = Invocation {
            user_id: msg.user_id(),
            user_name: msg.sender_name().to_string(),
            group_id: msg.group_id(),
            self_id: msg.self_id().or(ctx.bot.self_id()),
            self_name: ctx.bot.login_user.name.clone().unwrap_or_default(),
            text: m.text(),
            images: m.image_urls(),
            mentions: m.mentions(),
        };
        let reply_to = msg.message_id();

        info!(
            target: "Qzone",
            "[{}] 来自 {}{}",
            keyword,
            inv.user_id,
            inv.group_id.map(|g| format!(" @群{}", g)).unwrap_or_default()
        );

        let chat = OneBotBridge::new(ctx.clone(), writer.clone());
        let outcome = router::dispatch(svc, keyword, &inv, &chat).await;
        deliver(&ctx, writer, &inv, reply_to, outcome).await;

        Ok(Some(ctx))
    })
}
