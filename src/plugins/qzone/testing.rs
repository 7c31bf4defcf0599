//! 测试用的假 QQ 空间 / LLM / 群聊实现

use super::api::{Feed, FeedComment, PostDraft, PublishReceipt, QzoneApi, Visitor, VisitorReport};
use super::error::{QzoneError, QzoneResult};
use super::llm::{ChatGroup, ChatSource, ImageGenerator, TextGenerator};
use futures_util::future::BoxFuture;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

pub struct FakeQzone {
    uin: i64,
    feeds: Mutex<Vec<Feed>>,
    published: Mutex<Vec<PostDraft>>,
    liked: Mutex<Vec<String>>,
    commented: Mutex<Vec<(String, String)>>,
    deleted: Mutex<Vec<String>>,
    calls: AtomicUsize,
    fail_publish: AtomicBool,
    publish_delay_ms: AtomicU64,
}

impl FakeQzone {
    pub fn new(uin: i64) -> Self {
        Self {
            uin,
            feeds: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
            liked: Mutex::new(Vec::new()),
            commented: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            fail_publish: AtomicBool::new(false),
            publish_delay_ms: AtomicU64::new(0),
        }
    }

    /// 为 owner 生成 count 条说说，tid 为 "{owner}-{序号}"（序号从 1 开始）
    pub fn with_feeds(self, owner: i64, count: usize) -> Self {
        {
            let mut feeds = self.feeds.lock().unwrap();
            for i in 1..=count {
                feeds.push(Feed {
                    tid: format!("{}-{}", owner, i),
                    uin: owner,
                    name: format!("用户{}", owner),
                    text: format!("第{}条说说的内容", i),
                    created_at: 1_700_000_000 + i as i64,
                    ..Feed::default()
                });
            }
        }
        self
    }

    /// 给某条说说追加一条评论
    pub fn add_comment(&self, tid: &str, uin: i64) {
        let mut feeds = self.feeds.lock().unwrap();
        if let Some(f) = feeds.iter_mut().find(|f| f.tid == tid) {
            f.comments.push(FeedComment {
                uin,
                name: "评论者".into(),
                text: "沙发".into(),
            });
        }
    }

    pub fn fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// 发布前等待一段时间，用于并发测试
    pub fn publish_delay(&self, delay: Duration) {
        self.publish_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn published(&self) -> Vec<PostDraft> {
        self.published.lock().unwrap().clone()
    }

    pub fn liked(&self) -> Vec<String> {
        self.liked.lock().unwrap().clone()
    }

    pub fn commented(&self) -> Vec<(String, String)> {
        self.commented.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl QzoneApi for FakeQzone {
    fn self_uin(&self) -> BoxFuture<'_, QzoneResult<i64>> {
        Box::pin(async move { Ok(self.uin) })
    }

    fn publish<'a>(&'a self, draft: &'a PostDraft) -> BoxFuture<'a, QzoneResult<PublishReceipt>> {
        Box::pin(async move {
            self.hit();
            let delay = self.publish_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            if self.fail_publish.load(Ordering::SeqCst) {
                return Err(QzoneError::Remote {
                    code: -1,
                    message: "发布失败".into(),
                });
            }
            let mut published = self.published.lock().unwrap();
            published.push(draft.clone());
            Ok(PublishReceipt {
                tid: format!("tid{}", published.len()),
                created_at: 1_700_000_000,
            })
        })
    }

    fn list_feeds(
        &self,
        target: i64,
        pos: usize,
        num: usize,
    ) -> BoxFuture<'_, QzoneResult<Vec<Feed>>> {
        Box::pin(async move {
            self.hit();
            Ok(self
                .feeds
                .lock()
                .unwrap()
                .iter()
                .filter(|f| f.uin == target)
                .skip(pos)
                .take(num)
                .cloned()
                .collect())
        })
    }

    fn recent_feeds(&self, page: usize) -> BoxFuture<'_, QzoneResult<Vec<Feed>>> {
        Box::pin(async move {
            self.hit();
            if page != 1 {
                return Ok(Vec::new());
            }
            Ok(self.feeds.lock().unwrap().clone())
        })
    }

    fn like<'a>(&'a self, feed: &'a Feed) -> BoxFuture<'a, QzoneResult<()>> {
        Box::pin(async move {
            self.hit();
            self.liked.lock().unwrap().push(feed.tid.clone());
            let mut feeds = self.feeds.lock().unwrap();
            if let Some(f) = feeds.iter_mut().find(|f| f.tid == feed.tid) {
                f.liked = true;
            }
            Ok(())
        })
    }

    fn comment<'a>(&'a self, feed: &'a Feed, text: &'a str) -> BoxFuture<'a, QzoneResult<()>> {
        Box::pin(async move {
            self.hit();
            self.commented
                .lock()
                .unwrap()
                .push((feed.tid.clone(), text.to_string()));
            Ok(())
        })
    }

    fn delete<'a>(&'a self, tid: &'a str) -> BoxFuture<'a, QzoneResult<()>> {
        Box::pin(async move {
            self.hit();
            self.deleted.lock().unwrap().push(tid.to_string());
            self.feeds.lock().unwrap().retain(|f| f.tid != tid);
            Ok(())
        })
    }

    fn visitors(&self) -> BoxFuture<'_, QzoneResult<VisitorReport>> {
        Box::pin(async move {
            self.hit();
            Ok(VisitorReport {
                today: 1,
                total: 10,
                items: vec![Visitor {
                    uin: 2002,
                    name: "访客".into(),
                    time: 1_700_000_000,
                }],
            })
        })
    }
}

pub const FAKE_IMAGE: &str = "https://img.example.com/1.png";

/// 固定回复的生成器，记录每次调用的 (system, prompt)
pub struct FakeGenerator {
    reply: String,
    /// prompt 含有标记时改用对应回复
    rules: Vec<(String, String)>,
    calls: Mutex<Vec<(String, String)>>,
    fail_images: AtomicBool,
    image_prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn reply(text: &str) -> Self {
        Self {
            reply: text.to_string(),
            rules: Vec::new(),
            calls: Mutex::new(Vec::new()),
            fail_images: AtomicBool::new(false),
            image_prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn on(mut self, marker: &str, reply: &str) -> Self {
        self.rules.push((marker.to_string(), reply.to_string()));
        self
    }

    pub fn last_call(&self) -> Option<(String, String)> {
        self.calls.lock().unwrap().last().cloned()
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn fail_images(&self, fail: bool) {
        self.fail_images.store(fail, Ordering::SeqCst);
    }

    pub fn image_prompts(&self) -> Vec<String> {
        self.image_prompts.lock().unwrap().clone()
    }
}

impl TextGenerator for FakeGenerator {
    fn generate_text<'a>(
        &'a self,
        system: &'a str,
        prompt: &'a str,
    ) -> BoxFuture<'a, QzoneResult<String>> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap()
                .push((system.to_string(), prompt.to_string()));
            let reply = self
                .rules
                .iter()
                .find(|(marker, _)| prompt.contains(marker.as_str()))
                .map_or(&self.reply, |(_, r)| r);
            Ok(reply.clone())
        })
    }
}

impl ImageGenerator for FakeGenerator {
    fn generate_image<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, QzoneResult<Vec<String>>> {
        Box::pin(async move {
            self.image_prompts.lock().unwrap().push(prompt.to_string());
            if self.fail_images.load(Ordering::SeqCst) {
                return Err(QzoneError::Llm("配图服务不可用".into()));
            }
            Ok(vec![FAKE_IMAGE.to_string()])
        })
    }
}

/// 群名为 "群{id}"
#[derive(Default)]
pub struct FakeChat {
    groups: Vec<(i64, Vec<String>)>,
    failing: Vec<i64>,
}

impl FakeChat {
    pub fn with_group(group_id: i64, lines: &[&str]) -> Self {
        Self::default().and_group(group_id, lines)
    }

    pub fn and_group(mut self, group_id: i64, lines: &[&str]) -> Self {
        self.groups
            .push((group_id, lines.iter().map(|s| s.to_string()).collect()));
        self
    }

    /// 该群的记录获取总是失败
    pub fn and_failing(mut self, group_id: i64) -> Self {
        self.groups.push((group_id, Vec::new()));
        self.failing.push(group_id);
        self
    }
}

impl ChatSource for FakeChat {
    fn groups(&self) -> BoxFuture<'_, QzoneResult<Vec<ChatGroup>>> {
        Box::pin(async move {
            Ok(self
                .groups
                .iter()
                .map(|(id, _)| ChatGroup {
                    id: *id,
                    name: format!("群{}", id),
                })
                .collect())
        })
    }

    fn group_history(&self, group_id: i64, max: usize) -> BoxFuture<'_, QzoneResult<Vec<String>>> {
        Box::pin(async move {
            if self.failing.contains(&group_id) {
                return Err(QzoneError::Remote {
                    code: -1,
                    message: "获取群聊记录失败".into(),
                });
            }
            Ok(self
                .groups
                .iter()
                .find(|(id, _)| *id == group_id)
                .map(|(_, lines)| lines.iter().take(max).cloned().collect())
                .unwrap_or_default())
        })
    }
}
