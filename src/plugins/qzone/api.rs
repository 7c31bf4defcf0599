use super::error::QzoneResult;
use futures_util::future::BoxFuture;

/// 一条说说
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Feed {
    pub tid: String,
    pub uin: i64,
    pub name: String,
    pub text: String,
    /// 发布时间 (Unix 秒)
    pub created_at: i64,
    pub images: Vec<String>,
    pub comments: Vec<FeedComment>,
    /// 当前账号是否已点赞
    pub liked: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedComment {
    pub uin: i64,
    pub name: String,
    pub text: String,
}

impl Feed {
    pub fn commented_by(&self, uin: i64) -> bool {
        self.comments.iter().any(|c| c.uin == uin)
    }

    /// 截取前 n 个字符作为摘要
    pub fn excerpt(&self, n: usize) -> String {
        self.text.chars().take(n).collect()
    }
}

/// 待发布的说说
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostDraft {
    pub text: String,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublishReceipt {
    pub tid: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Visitor {
    pub uin: i64,
    pub name: String,
    pub time: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisitorReport {
    pub today: i64,
    pub total: i64,
    pub items: Vec<Visitor>,
}

/// QQ 空间能力边界，真实实现见 client.rs
///
/// 注意：点赞接口即使未实际生效也可能返回成功，调用方只能据返回码判断。
pub trait QzoneApi: Send + Sync {
    /// 当前登录账号
    fn self_uin(&self) -> BoxFuture<'_, QzoneResult<i64>>;

    /// 发布说说（含图片上传）
    fn publish<'a>(&'a self, draft: &'a PostDraft) -> BoxFuture<'a, QzoneResult<PublishReceipt>>;

    /// 某用户的说说列表，pos 为从 0 开始的偏移
    fn list_feeds(
        &self,
        target: i64,
        pos: usize,
        num: usize,
    ) -> BoxFuture<'_, QzoneResult<Vec<Feed>>>;

    /// 好友动态（仅说说），page 从 1 开始
    fn recent_feeds(&self, page: usize) -> BoxFuture<'_, QzoneResult<Vec<Feed>>>;

    fn like<'a>(&'a self, feed: &'a Feed) -> BoxFuture<'a, QzoneResult<()>>;

    fn comment<'a>(&'a self, feed: &'a Feed, text: &'a str) -> BoxFuture<'a, QzoneResult<()>>;

    /// 删除自己的说说
    fn delete<'a>(&'a self, tid: &'a str) -> BoxFuture<'a, QzoneResult<()>>;

    fn visitors(&self) -> BoxFuture<'_, QzoneResult<VisitorReport>>;
}
