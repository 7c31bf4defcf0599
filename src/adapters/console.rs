use crate::adapters::onebot::{LockedWriter, process_frame};
use crate::config::{AppConfig, BotConfig};
use crate::event::{BotStatus, Context as BotContext, EventType, LoginUser};
use crate::matcher::Matcher;
use crate::message::Message;
use crate::plugins;
use crate::scheduler::Scheduler;
use crate::{info, warn};
use futures_util::Sink;
use futures_util::future::BoxFuture;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use simd_json::base::{ValueAsArray, ValueAsScalar};
use simd_json::derived::{ValueObjectAccess, ValueObjectAccessAsScalar};
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex as AsyncMutex;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};

/// 控制台模拟身份：用户 1（管理员时请在 qzone.admins 中加入 1）
const CONSOLE_USER: i64 = 1;
const CONSOLE_SELF: i64 = 10000;

#[derive(Serialize)]
struct MockSender {
    user_id: i64,
    nickname: String,
    card: String,
}

#[derive(Serialize)]
struct MockMessageEvent {
    post_type: &'static str,
    message_type: &'static str,
    time: i64,
    self_id: i64,
    sub_type: &'static str,
    user_id: i64,
    message_id: i64,
    sender: MockSender,
    raw_message: String,
    message: Message,
}

/// 控制台适配器入口：每行输入视为一条私聊消息
pub fn entry(
    _bot_config: BotConfig,
    global_config: Arc<RwLock<AppConfig>>,
    db: DatabaseConnection,
    scheduler: Arc<Scheduler>,
    save_lock: Arc<AsyncMutex<()>>,
    config_path: String,
) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        info!(target: "Console", "已启动控制台模式。请输入指令 (例如: /说说帮助)");
        info!(target: "Console", "模拟环境: User ID: {} | Group ID: None (Private)", CONSOLE_USER);

        let writer: LockedWriter = Arc::new(AsyncMutex::new(Box::new(ConsoleSink)));

        let base = BotContext {
            event: EventType::Init,
            config: global_config,
            config_save_lock: save_lock,
            db,
            scheduler,
            matcher: Arc::new(Matcher::new()),
            config_path,
            bot: BotStatus {
                adapter: "console".to_string(),
                platform: "console".to_string(),
                login_user: LoginUser {
                    id: CONSOLE_SELF.to_string(),
                    name: Some("ConsoleBot".to_string()),
                },
            },
        };

        // 控制台没有登录流程，直接触发连接钩子
        if let Err(e) = plugins::do_connected(base.clone(), writer.clone()).await {
            warn!(target: "Console", "连接钩子执行失败: {}", e);
        }

        let mut reader = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = reader.next_line().await {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let now = chrono::Local::now();
            let event = MockMessageEvent {
                post_type: "message",
                message_type: "private",
                time: now.timestamp(),
                self_id: CONSOLE_SELF,
                sub_type: "friend",
                user_id: CONSOLE_USER,
                message_id: now.timestamp_millis(),
                sender: MockSender {
                    user_id: CONSOLE_USER,
                    nickname: "ConsoleUser".to_string(),
                    card: String::new(),
                },
                raw_message: line.to_string(),
                message: Message::new().text(line),
            };

            let mut json_bytes = match simd_json::to_vec(&event) {
                Ok(b) => b,
                Err(e) => {
                    warn!(target: "Console", "构造模拟消息失败: {}", e);
                    continue;
                }
            };

            if let Err(e) = process_frame(&mut json_bytes, writer.clone(), base.clone()).await {
                warn!(target: "Console", "处理消息时出错: {}", e);
            }
        }
    })
}

/// 把 Bot 发出的动作打印到终端
struct ConsoleSink;

fn render_message(msg: &simd_json::OwnedValue) -> String {
    if let Some(s) = msg.as_str() {
        return s.to_string();
    }
    let Some(segs) = msg.as_array() else {
        return format!("{:?}", msg);
    };
    let mut out = String::new();
    for seg in segs {
        let data = seg.get("data");
        match seg.get_str("type") {
            Some("text") => out.push_str(data.and_then(|d| d.get_str("text")).unwrap_or("")),
            Some("image") => out.push_str("[图片]"),
            Some("at") => {
                out.push_str(&format!("@{} ", data.and_then(|d| d.get_str("qq")).unwrap_or("?")))
            }
            Some("reply") => {}
            Some(other) => out.push_str(&format!("[{}]", other)),
            None => {}
        }
    }
    out
}

impl Sink<WsMessage> for ConsoleSink {
    type Error = WsError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: WsMessage) -> Result<(), Self::Error> {
        if let WsMessage::Text(text) = item {
            let mut data = text.as_bytes().to_vec();
            match simd_json::to_owned_value(&mut data) {
                Ok(val) => {
                    let action = val.get_str("action").unwrap_or("unknown");
                    if action == "send_msg"
                        && let Some(msg) = val.get("params").and_then(|p| p.get("message"))
                    {
                        println!("\x1b[36m[Bot Reply] > \x1b[0m{}", render_message(msg));
                    } else {
                        // 控制台无法应答 API 调用，依赖 API 的功能会在超时后报错
                        println!("\x1b[90m[API Call] > {}\x1b[0m", action);
                    }
                }
                Err(_) => println!("\x1b[36m[Bot Raw] > \x1b[0m{}", text.as_str()),
            }
        }
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }
}
