use super::error::{QzoneError, QzoneResult};
use super::llm::{ChatGroup, ChatSource};
use super::session::CookieSource;
use crate::adapters::onebot::{LockedWriter, api};
use crate::debug;
use crate::event::Context;
use futures_util::future::BoxFuture;

const COOKIE_DOMAIN: &str = "user.qzone.qq.com";
const HISTORY_PAGE: u32 = 200;

/// 通过当前 OneBot 连接获取 Cookie 与群聊记录
#[derive(Clone)]
pub struct OneBotBridge {
    ctx: Context,
    writer: LockedWriter,
}

impl OneBotBridge {
    pub fn new(ctx: Context, writer: LockedWriter) -> Self {
        Self { ctx, writer }
    }

    async fn history(&self, group_id: i64, max: usize) -> QzoneResult<Vec<String>> {
        let mut pages: Vec<Vec<String>> = Vec::new();
        let mut collected = 0;
        let mut seq: Option<i64> = None;

        while collected < max {
            let messages =
                api::get_group_msg_history(&self.ctx, self.writer.clone(), group_id, seq, HISTORY_PAGE)
                    .await
                    .map_err(|e| QzoneError::Remote {
                        code: -1,
                        message: format!("获取群聊记录失败: {}", e),
                    })?;
            let Some(first) = messages.first() else {
                break;
            };
            // 到达最早的消息后接口会重复返回同一页
            if seq == Some(first.message_id) {
                break;
            }
            seq = Some(first.message_id);

            let lines: Vec<String> = messages
                .iter()
                .filter_map(|m| {
                    let text = m.plain_text();
                    (!text.is_empty()).then(|| format!("{}: {}", m.display_name(), text))
                })
                .collect();
            collected += lines.len();
            pages.push(lines);
        }

        // 页按从新到旧拉取，拼回时间正序后保留最近的 max 条
        let mut all: Vec<String> = pages.into_iter().rev().flatten().collect();
        if all.len() > max {
            all.drain(..all.len() - max);
        }
        debug!(target: "Qzone/Bridge", "群 {} 获取到 {} 条聊天记录", group_id, all.len());
        Ok(all)
    }
}

impl CookieSource for OneBotBridge {
    fn fetch_cookies(&self) -> BoxFuture<'_, QzoneResult<String>> {
        Box::pin(async move {
            api::get_cookies(&self.ctx, self.writer.clone(), COOKIE_DOMAIN)
                .await
                .map_err(|e| QzoneError::NoSession(e.to_string()))
        })
    }
}

impl ChatSource for OneBotBridge {
    fn groups(&self) -> BoxFuture<'_, QzoneResult<Vec<ChatGroup>>> {
        Box::pin(async move {
            let groups = api::get_group_list(&self.ctx, self.writer.clone(), false)
                .await
                .map_err(|e| QzoneError::Remote {
                    code: -1,
                    message: format!("获取群列表失败: {}", e),
                })?;
            Ok(groups
                .into_iter()
                .map(|g| ChatGroup {
                    id: g.group_id,
                    name: g.group_name,
                })
                .collect())
        })
    }

    fn group_history(&self, group_id: i64, max: usize) -> BoxFuture<'_, QzoneResult<Vec<String>>> {
        Box::pin(self.history(group_id, max))
    }
}
