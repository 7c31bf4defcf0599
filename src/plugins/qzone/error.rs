use super::entity::submission::Status;
use thiserror::Error;

/// 错误种类：用户输入 / 状态冲突 / 外部服务
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    User,
    State,
    External,
}

#[derive(Debug, Error)]
pub enum QzoneError {
    #[error("权限不足: {0} 仅限管理员使用")]
    PermissionDenied(String),

    #[error("{0}")]
    AccessDenied(String),

    #[error("参数错误: {0}")]
    BadArgument(String),

    #[error("未找到: {0}")]
    NotFound(String),

    #[error("稿件 #{id} 当前状态为「{}」，不是待审核", .state.label())]
    InvalidState { id: i64, state: Status },

    #[error("投稿内容不能为空（需要文字或图片）")]
    EmptySubmission,

    #[error("{0}")]
    Quota(String),

    #[error("QQ空间登录已失效")]
    SessionExpired,

    #[error("无法获取QQ空间登录信息: {0}")]
    NoSession(String),

    #[error("QQ空间返回错误 (code={code}): {message}")]
    Remote { code: i64, message: String },

    #[error("网络请求失败: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM 调用失败: {0}")]
    Llm(String),

    #[error("生成内容未通过审核: {0}")]
    Filtered(String),

    #[error("数据库错误: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("响应解析失败: {0}")]
    Parse(String),

    #[error("联网搜索失败: {0}")]
    Search(String),
}

pub type QzoneResult<T> = Result<T, QzoneError>;

impl QzoneError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QzoneError::PermissionDenied(_)
            | QzoneError::AccessDenied(_)
            | QzoneError::BadArgument(_)
            | QzoneError::NotFound(_)
            | QzoneError::EmptySubmission
            | QzoneError::Quota(_) => ErrorKind::User,
            QzoneError::InvalidState { .. } => ErrorKind::State,
            _ => ErrorKind::External,
        }
    }

    pub fn is_user_error(&self) -> bool {
        self.kind() == ErrorKind::User
    }

    /// 回复到聊天中的文本
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::User => format!("❌ {}", self),
            ErrorKind::State => format!("⚠️ {}", self),
            ErrorKind::External => match self {
                QzoneError::SessionExpired => {
                    "❌ 操作失败: QQ空间登录已失效，已清除缓存，请稍后重试".to_string()
                }
                QzoneError::Filtered(_) => format!("❌ {}", self),
                _ => format!("❌ 操作失败: {}", self),
            },
        }
    }
}

impl From<serde_json::Error> for QzoneError {
    fn from(e: serde_json::Error) -> Self {
        QzoneError::Parse(e.to_string())
    }
}
