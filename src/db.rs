use sea_orm::{Database, DatabaseConnection, DbErr};
use std::path::Path;
use tokio::fs;

use crate::info;

pub const DEFAULT_DB_URL: &str = "sqlite:data/bot.db?mode=rwc";

/// 初始化默认数据库 (data/bot.db)
pub async fn init() -> Result<DatabaseConnection, DbErr> {
    if !Path::new("data").exists() {
        let _ = fs::create_dir("data").await;
    }
    connect(DEFAULT_DB_URL).await
}

/// 连接任意数据库地址（测试中使用 sqlite::memory:）
pub async fn connect(db_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(db_url).await?;
    info!(target: "Database", "连接成功: {}", db_url);
    Ok(db)
}
