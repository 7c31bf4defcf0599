use crate::config::{AppConfig, BotConfig};
use crate::scheduler::Scheduler;
use crate::{info, warn};
use futures_util::future::BoxFuture;
use sea_orm::DatabaseConnection;
use std::sync::{Arc, OnceLock, RwLock};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

pub mod console;
pub mod onebot;

/// 适配器处理函数签名
pub type AdapterHandler = fn(
    BotConfig,
    Arc<RwLock<AppConfig>>,
    DatabaseConnection,
    Arc<Scheduler>,
    Arc<AsyncMutex<()>>,
    String,
) -> BoxFuture<'static, ()>;

/// 适配器定义
pub struct Adapter {
    /// 协议名称，对应配置中 bots[].protocol
    pub protocol: &'static str,
    pub handler: AdapterHandler,
}

static ADAPTERS: OnceLock<Vec<Adapter>> = OnceLock::new();

pub fn get_adapters() -> &'static [Adapter] {
    ADAPTERS.get_or_init(|| {
        vec![
            Adapter {
                protocol: "onebot",
                handler: onebot::entry,
            },
            // 本地调试用，输入即私聊消息
            Adapter {
                protocol: "console",
                handler: console::entry,
            },
        ]
    })
}

pub fn find_adapter(protocol: &str) -> Option<&'static Adapter> {
    get_adapters().iter().find(|a| a.protocol == protocol)
}

/// 为每个启用的 Bot 启动对应适配器，返回各自的任务句柄
pub fn spawn_enabled(
    config: Arc<RwLock<AppConfig>>,
    db: DatabaseConnection,
    scheduler: Arc<Scheduler>,
    save_lock: Arc<AsyncMutex<()>>,
    config_path: &str,
) -> Vec<JoinHandle<()>> {
    let bots: Vec<BotConfig> = config
        .read()
        .unwrap()
        .bots
        .iter()
        .filter(|b| b.enabled)
        .cloned()
        .collect();

    let mut handles = Vec::new();
    for bot in bots {
        let Some(adapter) = find_adapter(&bot.protocol) else {
            warn!(target: "System", "未知的适配器协议: {}", bot.protocol);
            continue;
        };
        info!(target: "System", "启动适配器: {}", adapter.protocol);
        let fut = (adapter.handler)(
            bot,
            config.clone(),
            db.clone(),
            scheduler.clone(),
            save_lock.clone(),
            config_path.to_string(),
        );
        handles.push(tokio::spawn(fut));
    }
    handles
}
