use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;
use toml::Value;

pub type ConfigError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    // 全局指令前缀（支持多个，如 ["/", "#"]）
    #[serde(default = "default_prefix")]
    pub command_prefix: Vec<String>,

    // 日志等级: debug / info / warn / error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // Bot 连接配置
    #[serde(default = "default_bots")]
    pub bots: Vec<BotConfig>,

    // 插件配置
    #[serde(flatten)]
    pub plugins: HashMap<String, Value>,
}

impl AppConfig {
    /// 读取配置文件；文件不存在时写入默认配置
    pub async fn load_or_create(path: &str) -> Result<Self, ConfigError> {
        if !Path::new(path).exists() {
            let cfg = AppConfig::default();
            cfg.save(path).await?;
            return Ok(cfg);
        }

        let content = fs::read_to_string(path).await?;
        let cfg: AppConfig = toml::from_str(&content)?;
        Ok(cfg)
    }

    /// 原子写入（写临时文件后 rename 覆盖）
    pub async fn save(&self, path: &str) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)?;
        let target = Path::new(path);
        if let Some(parent) = target.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        let tmp = target.with_extension("tmp");
        fs::write(&tmp, toml_string).await?;
        fs::rename(&tmp, target).await?;
        Ok(())
    }

    /// 为缺失配置块的插件补全默认配置，返回是否发生了修改
    pub fn fill_plugin_defaults<'a, I>(&mut self, defaults: I) -> bool
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let mut modified = false;
        for (name, value) in defaults {
            if !self.plugins.contains_key(name) {
                self.plugins.insert(name.to_string(), value);
                modified = true;
            }
        }
        modified
    }
}

fn default_prefix() -> Vec<String> {
    vec!["/".to_string()]
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_bots() -> Vec<BotConfig> {
    vec![
        // 控制台适配器：保持简洁，仅需启用
        BotConfig {
            enabled: true,
            protocol: "console".to_string(),
            url: None,
            access_token: None,
        },
        // OneBot 适配器：生成配置占位符，默认禁用以防误连
        BotConfig {
            enabled: false,
            protocol: "onebot".to_string(),
            url: Some("ws://127.0.0.1:3001".to_string()),
            access_token: Some("YOUR_TOKEN_HERE".to_string()),
        },
    ]
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BotConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    // 协议类型 (例如 "onebot")
    #[serde(default = "default_protocol")]
    pub protocol: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_protocol() -> String {
    "onebot".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            command_prefix: default_prefix(),
            log_level: default_log_level(),
            bots: default_bots(),
            plugins: HashMap::new(),
        }
    }
}

/// 辅助函数：构建默认配置 Value，并确保包含 enabled 字段
pub fn build_config<T: Serialize>(data: T) -> Value {
    let mut val = Value::try_from(data).unwrap_or(Value::Table(Default::default()));
    if let Value::Table(ref mut map) = val
        && !map.contains_key("enabled")
    {
        map.insert("enabled".to_string(), Value::Boolean(true));
    }
    val
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Sample {
        limit: u32,
    }

    #[test]
    fn build_config_injects_enabled() {
        let v = build_config(Sample { limit: 3 });
        assert_eq!(v.get("enabled").and_then(|x| x.as_bool()), Some(true));
        assert_eq!(v.get("limit").and_then(|x| x.as_integer()), Some(3));
    }

    #[test]
    fn plugin_tables_are_flattened() {
        let raw = r##"
            command_prefix = ["#"]

            [qzone]
            enabled = true
            admins = [10001]
        "##;
        let cfg: AppConfig = toml::from_str(raw).unwrap();
        assert_eq!(cfg.command_prefix, vec!["#".to_string()]);
        assert_eq!(cfg.log_level, "info");
        assert!(cfg.plugins.contains_key("qzone"));
        assert!(!cfg.plugins.contains_key("command_prefix"));
    }

    #[test]
    fn fill_defaults_only_adds_missing() {
        let mut cfg = AppConfig::default();
        cfg.plugins
            .insert("qzone".into(), build_config(Sample { limit: 1 }));

        let changed = cfg.fill_plugin_defaults([
            ("qzone", build_config(Sample { limit: 9 })),
            ("other", build_config(Sample { limit: 2 })),
        ]);

        assert!(changed);
        let kept = cfg.plugins["qzone"].get("limit").and_then(|v| v.as_integer());
        assert_eq!(kept, Some(1));
        assert!(cfg.plugins.contains_key("other"));
    }
}
