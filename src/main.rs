use qzone_bot::config::AppConfig;
use qzone_bot::event::{BotStatus, Context, EventType};
use qzone_bot::matcher::Matcher;
use qzone_bot::scheduler::Scheduler;
use qzone_bot::{adapters, db, error, info, log, plugins, warn};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex as AsyncMutex;

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut config = AppConfig::load_or_create(CONFIG_PATH).await?;
    log::set_level(log::Level::parse(&config.log_level));

    // 补全缺失的插件配置块并写回
    if config.fill_plugin_defaults(plugins::default_configs()) {
        config.save(CONFIG_PATH).await?;
        info!(target: "System", "已写入默认插件配置: {}", CONFIG_PATH);
    }

    let db = db::init().await?;
    let scheduler = Arc::new(Scheduler::new());
    let config = Arc::new(RwLock::new(config));
    let save_lock = Arc::new(AsyncMutex::new(()));

    let init_ctx = Context {
        event: EventType::Init,
        config: config.clone(),
        config_save_lock: save_lock.clone(),
        db: db.clone(),
        scheduler: scheduler.clone(),
        matcher: Arc::new(Matcher::new()),
        config_path: CONFIG_PATH.to_string(),
        bot: BotStatus::default(),
    };
    plugins::do_init(init_ctx).await?;

    let handles = adapters::spawn_enabled(
        config.clone(),
        db.clone(),
        scheduler.clone(),
        save_lock,
        CONFIG_PATH,
    );
    if handles.is_empty() {
        warn!(target: "System", "没有启用任何适配器，请检查 {} 中的 bots 配置", CONFIG_PATH);
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(target: "System", "监听退出信号失败: {}", e);
    }

    info!(target: "System", "正在退出...");
    scheduler.shutdown();
    for handle in handles {
        handle.abort();
    }
    Ok(())
}
