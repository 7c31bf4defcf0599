use serde::{Deserialize, Serialize};

pub const DEFAULT_DIARY_PROMPT: &str = "你是一个爱分享生活的年轻人，请根据群聊里大家聊的内容，用第一人称写一条自然、有趣的QQ空间说说，不要出现群聊、聊天记录等字眼，可以适当使用 emoji。";
pub const DEFAULT_COMMENT_PROMPT: &str = "请根据帖子内容生成一条精辟简短的评论, 评论要抓住主题";
pub const DEFAULT_SURFING_PROMPT: &str = "你是一个喜欢上网冲浪、紧跟潮流的年轻人，擅长把网上看到的新鲜事写成有趣的QQ空间说说。";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QzoneConfig {
    pub enabled: bool,
    /// 管理员 QQ 号
    pub admins: Vec<i64>,
    /// 审核群：新稿件通知发往此群（0 为不通知）
    pub manage_group: i64,
    /// 静态 Cookie，留空则通过 OneBot get_cookies 获取
    pub cookies: String,
    pub request_timeout_secs: u64,
    pub llm: LlmConfig,
    pub jobs: JobsConfig,
    pub surfing: SurfingConfig,
}

impl Default for QzoneConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            admins: Vec::new(),
            manage_group: 0,
            cookies: String::new(),
            request_timeout_secs: 15,
            llm: LlmConfig::default(),
            jobs: JobsConfig::default(),
            surfing: SurfingConfig::default(),
        }
    }
}

impl QzoneConfig {
    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admins.contains(&user_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub diary_prompt: String,
    pub comment_prompt: String,
    /// 写说说时最多参考的群聊消息条数
    pub diary_max_msg: usize,
    pub diary_max_length: usize,
    pub timeout_secs: u64,
    /// 配图模型，留空则不生成配图
    pub image_model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.8,
            diary_prompt: DEFAULT_DIARY_PROMPT.to_string(),
            comment_prompt: DEFAULT_COMMENT_PROMPT.to_string(),
            diary_max_msg: 200,
            diary_max_length: 500,
            timeout_secs: 60,
            image_model: "dall-e-3".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub post: JobConfig,
    pub comment: JobConfig,
    pub like: JobConfig,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            post: JobConfig {
                daily_at: "01:45".to_string(),
                ..JobConfig::default()
            },
            comment: JobConfig::default(),
            like: JobConfig::default(),
        }
    }
}

/// 单个定时任务；daily_at 非空时优先按每日定点执行，否则按 interval_mins
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub enabled: bool,
    pub interval_mins: u64,
    pub daily_at: String,
    /// 评论 / 点赞任务每次处理的说说数量
    pub batch: usize,
    /// 发说说任务：综合多个群聊的概率
    pub multi_group_chance: f64,
    /// 发说说任务：生成配图的概率
    pub image_chance: f64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_mins: 60,
            daily_at: String::new(),
            batch: 5,
            multi_group_chance: 0.3,
            image_chance: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AccessMode {
    #[default]
    #[serde(rename = "所有人")]
    Everyone,
    #[serde(rename = "白名单")]
    Whitelist,
    #[serde(rename = "主人模式")]
    MasterOnly,
}

impl AccessMode {
    pub fn label(self) -> &'static str {
        match self {
            AccessMode::Everyone => "所有人",
            AccessMode::Whitelist => "白名单",
            AccessMode::MasterOnly => "主人模式",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfingConfig {
    pub tavily_api_key: String,
    pub access_mode: AccessMode,
    pub whitelist: Vec<i64>,
    pub master: Vec<i64>,
    /// 每人每日次数，0 为不限
    pub daily_limit: u32,
    pub prompt: String,
    pub max_length: usize,
    pub max_results: usize,
}

impl Default for SurfingConfig {
    fn default() -> Self {
        Self {
            tavily_api_key: String::new(),
            access_mode: AccessMode::Everyone,
            whitelist: Vec::new(),
            master: Vec::new(),
            daily_limit: 3,
            prompt: DEFAULT_SURFING_PROMPT.to_string(),
            max_length: 300,
            max_results: 5,
        }
    }
}
