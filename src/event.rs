use crate::config::AppConfig;
use crate::matcher::Matcher;
use crate::scheduler::Scheduler;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use simd_json::OwnedValue;
use simd_json::derived::{ValueObjectAccess, ValueObjectAccessAsArray, ValueObjectAccessAsScalar};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex as AsyncMutex;

pub type Event = OwnedValue;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoginUser {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BotStatus {
    pub adapter: String,
    pub platform: String,
    pub login_user: LoginUser,
}

impl BotStatus {
    /// 当前登录账号的 QQ 号（未知时为 None）
    pub fn self_id(&self) -> Option<i64> {
        self.login_user.id.parse::<i64>().ok().filter(|&id| id != 0)
    }
}

/// 统一的上下文，包含事件数据、可变配置和任务调度器
/// event 字段直接持有 EventType，在插件链中通过 Move 移交所有权。
#[derive(Clone)]
pub struct Context {
    pub event: EventType,
    pub config: Arc<RwLock<AppConfig>>,
    pub config_save_lock: Arc<AsyncMutex<()>>,
    pub db: DatabaseConnection,
    pub scheduler: Arc<Scheduler>,
    pub matcher: Arc<Matcher>,
    pub config_path: String,
    pub bot: BotStatus,
}

impl Context {
    /// 基于当前上下文派生一个新事件的上下文
    pub fn with_event(&self, event: EventType) -> Context {
        Context {
            event,
            config: self.config.clone(),
            config_save_lock: self.config_save_lock.clone(),
            db: self.db.clone(),
            scheduler: self.scheduler.clone(),
            matcher: self.matcher.clone(),
            config_path: self.config_path.clone(),
            bot: self.bot.clone(),
        }
    }

    /// 尝试将当前事件视为 OneBot 消息事件
    pub fn as_message(&self) -> Option<MessageEvent<'_>> {
        if let EventType::Onebot(event) = &self.event
            && event.get_str("post_type") == Some("message")
        {
            return Some(MessageEvent(event));
        }
        None
    }

    /// 获取事件的 Post Type (如果是 OneBot 事件)
    pub fn post_type(&self) -> Option<&str> {
        if let EventType::Onebot(event) = &self.event {
            event.get_str("post_type")
        } else {
            None
        }
    }
}

fn read_id(v: &OwnedValue, key: &str) -> Option<i64> {
    v.get_i64(key)
        .or_else(|| v.get_u64(key).map(|x| x as i64))
        .or_else(|| v.get_str(key).and_then(|s| s.parse().ok()))
}

/// 消息事件封装，提供便捷的强类型访问
pub struct MessageEvent<'a>(pub &'a Event);

impl<'a> MessageEvent<'a> {
    /// 群号 (如果是群消息)
    pub fn group_id(&self) -> Option<i64> {
        read_id(self.0, "group_id").filter(|&id| id != 0)
    }

    pub fn user_id(&self) -> i64 {
        read_id(self.0, "user_id").unwrap_or(0)
    }

    pub fn self_id(&self) -> Option<i64> {
        read_id(self.0, "self_id").filter(|&id| id != 0)
    }

    pub fn message_id(&self) -> i64 {
        read_id(self.0, "message_id").unwrap_or(0)
    }

    /// 纯文本内容 (raw_message)
    pub fn text(&self) -> &'a str {
        self.0.get_str("raw_message").unwrap_or("")
    }

    pub fn is_group(&self) -> bool {
        self.0.get_str("message_type") == Some("group")
    }

    pub fn sender_nickname(&self) -> Option<&'a str> {
        self.0.get("sender").and_then(|s| s.get_str("nickname"))
    }

    /// 发送者群名片 (为空则返回 None)
    pub fn sender_card(&self) -> Option<&'a str> {
        self.0
            .get("sender")
            .and_then(|s| s.get_str("card"))
            .filter(|s| !s.is_empty())
    }

    /// 发送者显示名称 (优先名片，其次昵称)
    pub fn sender_name(&self) -> &'a str {
        self.sender_card()
            .or_else(|| self.sender_nickname())
            .unwrap_or("Unknown")
    }

    /// 消息中所有图片的地址（优先 url，其次 file）
    pub fn image_urls(&self) -> Vec<String> {
        let Some(segments) = self.0.get_array("message") else {
            return Vec::new();
        };
        segments
            .iter()
            .filter(|seg| seg.get_str("type") == Some("image"))
            .filter_map(|seg| {
                let data = seg.get("data")?;
                data.get_str("url")
                    .filter(|s| !s.is_empty())
                    .or_else(|| data.get_str("file"))
                    .map(String::from)
            })
            .collect()
    }
}

/// 事件类型
#[derive(Debug, Clone)]
pub enum EventType {
    /// 来自 OneBot 的原始事件
    Onebot(Event),
    /// 插件准备发送消息前的拦截事件
    BeforeSend(SendPacket),
    /// 系统初始化事件 (用于插件 on_init 生命周期)
    Init,
}

/// 发送包结构，用于在 BeforeSend 中传递
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SendPacket {
    pub action: String,
    pub params: OwnedValue,
    /// 原始触发事件（不参与序列化发送给 Bot）
    #[serde(skip)]
    pub original_event: Option<Event>,
}
