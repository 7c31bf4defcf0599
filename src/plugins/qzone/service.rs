use super::api::QzoneApi;
use super::config::QzoneConfig;
use super::jobs::JobBoard;
use super::llm::{ImageGenerator, TextGenerator};
use super::queue::SubmissionQueue;
use super::session::SessionManager;
use super::surfing::Surfing;
use std::sync::Arc;

/// 插件的进程级上下文，由 init 钩子构建后在各处理函数间共享
pub struct QzoneService {
    pub config: QzoneConfig,
    pub api: Arc<dyn QzoneApi>,
    pub session: Arc<SessionManager>,
    pub generator: Arc<dyn TextGenerator>,
    pub painter: Arc<dyn ImageGenerator>,
    pub queue: SubmissionQueue,
    pub jobs: JobBoard,
    pub surfing: Surfing,
}

/// 发往其他群的通知（如审核群）
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub group_id: i64,
    pub text: String,
}

/// 指令执行结果：回复内容 + 附带通知
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub text: String,
    pub images: Vec<String>,
    pub notices: Vec<Notice>,
}

impl Outcome {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    /// group_id 为 0 时忽略
    pub fn notify(mut self, group_id: i64, text: impl Into<String>) -> Self {
        if group_id != 0 {
            self.notices.push(Notice {
                group_id,
                text: text.into(),
            });
        }
        self
    }
}
