use super::{LockedWriter, send_frame_raw};
use crate::event::Context;
use serde::{Deserialize, Serialize};
use simd_json::OwnedValue;
use simd_json::base::ValueAsArray;
use simd_json::derived::{ValueObjectAccess, ValueObjectAccessAsScalar};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub type ApiError = Box<dyn std::error::Error + Send + Sync>;

static ECHO_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_echo() -> String {
    let count = ECHO_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("api-req-{}", count)
}

#[derive(Serialize)]
struct ApiRequest<T> {
    action: String,
    params: T,
    echo: String,
}

/// 通用 API 调用：按 echo 关联响应，默认 60 秒超时
pub async fn call_action<P, R>(
    ctx: &Context,
    writer: LockedWriter,
    action: &str,
    params: P,
) -> Result<R, ApiError>
where
    P: Serialize,
    R: serde::de::DeserializeOwned,
{
    let echo = next_echo();
    let req = ApiRequest {
        action: action.to_string(),
        params,
        echo: echo.clone(),
    };

    let json_str = simd_json::to_string(&req)?;

    // 先注册监听再发送，避免响应先于等待者到达
    let wait_future = ctx.matcher.wait_resp(echo, Duration::from_secs(60));
    send_frame_raw(writer, json_str).await?;

    let resp_event = wait_future
        .await
        .ok_or_else(|| format!("API 请求超时: {}", action))?;

    // 响应格式: { status, retcode, data, echo }
    let retcode = resp_event
        .get_i64("retcode")
        .or_else(|| resp_event.get_u64("retcode").map(|v| v as i64))
        .unwrap_or(-1);

    if retcode != 0 {
        let msg = resp_event
            .get_str("wording")
            .or_else(|| resp_event.get_str("msg"))
            .unwrap_or("Unknown Error");
        return Err(format!("API {} 调用失败 (retcode={}): {}", action, retcode, msg).into());
    }

    let data_val = resp_event
        .get("data")
        .cloned()
        .unwrap_or(OwnedValue::from(()));

    let data: R = simd_json::serde::from_owned_value(data_val)?;
    Ok(data)
}

// --- get_login_info ---

#[derive(Serialize)]
struct GetLoginInfoParams {}

#[derive(Debug, Deserialize)]
pub struct LoginInfo {
    pub user_id: i64,
    pub nickname: String,
}

pub async fn get_login_info(ctx: &Context, writer: LockedWriter) -> Result<LoginInfo, ApiError> {
    call_action(ctx, writer, "get_login_info", GetLoginInfoParams {}).await
}

// --- get_group_list ---

#[derive(Serialize)]
struct GetGroupListParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    no_cache: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct GroupInfo {
    pub group_id: i64,
    pub group_name: String,
    pub member_count: Option<i32>,
}

pub async fn get_group_list(
    ctx: &Context,
    writer: LockedWriter,
    no_cache: bool,
) -> Result<Vec<GroupInfo>, ApiError> {
    call_action(
        ctx,
        writer,
        "get_group_list",
        GetGroupListParams {
            no_cache: Some(no_cache),
        },
    )
    .await
}

// --- get_cookies ---

#[derive(Serialize)]
struct GetCookiesParams<'a> {
    domain: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct CookiesData {
    pub cookies: String,
}

/// 获取指定域名的 Cookie 字符串（QQ 空间使用 user.qzone.qq.com）
pub async fn get_cookies(
    ctx: &Context,
    writer: LockedWriter,
    domain: &str,
) -> Result<String, ApiError> {
    let data: CookiesData =
        call_action(ctx, writer, "get_cookies", GetCookiesParams { domain }).await?;
    Ok(data.cookies)
}

// --- get_group_msg_history ---

#[derive(Serialize)]
struct GetGroupMsgHistoryParams {
    group_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_seq: Option<i64>,
    count: u32,
    #[serde(rename = "reverseOrder")]
    reverse_order: bool,
}

#[derive(Debug, Deserialize, Default)]
pub struct HistorySender {
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub card: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryMessage {
    #[serde(default)]
    pub message_id: i64,
    #[serde(default)]
    pub sender: HistorySender,
    #[serde(default)]
    pub message: OwnedValue,
}

impl HistoryMessage {
    /// 拼接消息中的文本段
    pub fn plain_text(&self) -> String {
        let Some(segments) = self.message.as_array() else {
            return String::new();
        };
        segments
            .iter()
            .filter(|seg| seg.get_str("type") == Some("text"))
            .filter_map(|seg| seg.get("data").and_then(|d| d.get_str("text")))
            .collect::<String>()
            .trim()
            .to_string()
    }

    pub fn display_name(&self) -> &str {
        if self.sender.card.is_empty() {
            &self.sender.nickname
        } else {
            &self.sender.card
        }
    }
}

#[derive(Debug, Deserialize)]
struct GroupMsgHistory {
    #[serde(default)]
    messages: Vec<HistoryMessage>,
}

/// 拉取群历史消息（reverseOrder），`message_seq` 为 None 时从最新一条开始
pub async fn get_group_msg_history(
    ctx: &Context,
    writer: LockedWriter,
    group_id: i64,
    message_seq: Option<i64>,
    count: u32,
) -> Result<Vec<HistoryMessage>, ApiError> {
    let params = GetGroupMsgHistoryParams {
        group_id,
        message_seq,
        count,
        reverse_order: true,
    };
    let data: GroupMsgHistory =
        call_action(ctx, writer, "get_group_msg_history", params).await?;
    Ok(data.messages)
}
