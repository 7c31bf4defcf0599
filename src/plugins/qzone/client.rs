//! QQ 空间 HTTP 接口（非公开协议，尽力而为）

use super::api::{
    Feed, FeedComment, PostDraft, PublishReceipt, QzoneApi, Visitor, VisitorReport,
};
use super::error::{QzoneError, QzoneResult};
use super::session::{Session, SessionManager};
use crate::{debug, warn};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures_util::future::BoxFuture;
use regex::Regex;
use reqwest::header::{COOKIE, REFERER};
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

const PUBLISH_URL: &str = "https://user.qzone.qq.com/proxy/domain/taotao.qzone.qq.com/cgi-bin/emotion_cgi_publish_v6";
const UPLOAD_URL: &str = "https://up.qzone.qq.com/cgi-bin/upload/cgi_upload_image";
const MSGLIST_URL: &str = "https://user.qzone.qq.com/proxy/domain/taotao.qq.com/cgi-bin/emotion_cgi_msglist_v6";
const ACTIVE_FEEDS_URL: &str = "https://h5.qzone.qq.com/webapp/json/mqzone_feeds/getActiveFeeds";
const LIKE_URL: &str = "https://user.qzone.qq.com/proxy/domain/w.qzone.qq.com/cgi-bin/likes/internal_dolike_app";
const COMMENT_URL: &str = "https://user.qzone.qq.com/proxy/domain/taotao.qzone.qq.com/cgi-bin/emotion_cgi_re_feeds";
const DELETE_URL: &str = "https://user.qzone.qq.com/proxy/domain/taotao.qzone.qq.com/cgi-bin/emotion_cgi_delete_v6";
const VISITOR_URL: &str = "https://h5.qzone.qq.com/proxy/domain/g.qzone.qq.com/cgi-bin/friendshow/cgi_get_visitor_more";

/// 说说的 appid
const MOOD_APPID: i64 = 311;
/// 未登录 / 登录失效
const CODE_NOT_LOGGED_IN: i64 = -3000;

static EMOTICON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[em\]e\d+\[/em\]").expect("valid emoticon regex"));

/// 去掉 [em]e100[/em] 形式的表情代码
pub fn strip_emoticons(text: &str) -> String {
    EMOTICON_RE.replace_all(text, "").trim().to_string()
}

/// 取出 JSONP / callback(...) 包裹的 JSON 主体
pub fn unwrap_jsonp(body: &str) -> &str {
    let trimmed = body.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return trimmed;
    }
    match (trimmed.find('('), trimmed.rfind(')')) {
        (Some(l), Some(r)) if l < r => trimmed[l + 1..r].trim(),
        _ => trimmed,
    }
}

fn parse_body(body: &str) -> QzoneResult<Value> {
    let inner = unwrap_jsonp(body);
    serde_json::from_str(inner).map_err(|e| {
        let head: String = inner.chars().take(120).collect();
        QzoneError::Parse(format!("{} (响应: {})", e, head))
    })
}

fn as_i64(v: &Value) -> Option<i64> {
    v.as_i64()
        .or_else(|| v.as_u64().map(|x| x as i64))
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

fn str_field(v: &Value, key: &str) -> String {
    match v.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(other) if !other.is_null() => other.to_string(),
        _ => String::new(),
    }
}

/// 检查返回码：code / ret 为 0 视为成功，-3000 为登录失效
pub fn check_code(v: &Value) -> QzoneResult<()> {
    let code = v
        .get("code")
        .and_then(as_i64)
        .or_else(|| v.get("ret").and_then(as_i64))
        .unwrap_or(0);
    if code == 0 {
        return Ok(());
    }
    if code == CODE_NOT_LOGGED_IN {
        return Err(QzoneError::SessionExpired);
    }
    let message = ["message", "msg"]
        .iter()
        .map(|k| str_field(v, k))
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| "未知错误".to_string());
    Err(QzoneError::Remote { code, message })
}

/// 解析 emotion_cgi_msglist_v6
pub fn parse_msglist(v: &Value) -> Vec<Feed> {
    let Some(list) = v.get("msglist").and_then(Value::as_array) else {
        return Vec::new();
    };
    list.iter()
        .map(|item| {
            let images = item
                .get("pic")
                .and_then(Value::as_array)
                .map(|pics| {
                    pics.iter()
                        .filter_map(|p| {
                            ["url2", "url1", "url3", "smallurl"]
                                .iter()
                                .map(|k| str_field(p, k))
                                .find(|s| !s.is_empty())
                        })
                        .collect()
                })
                .unwrap_or_default();

            let comments = item
                .get("commentlist")
                .and_then(Value::as_array)
                .map(|cs| {
                    cs.iter()
                        .map(|c| FeedComment {
                            uin: c.get("uin").and_then(as_i64).unwrap_or(0),
                            name: str_field(c, "name"),
                            text: strip_emoticons(&str_field(c, "content")),
                        })
                        .collect()
                })
                .unwrap_or_default();

            Feed {
                tid: str_field(item, "tid"),
                uin: item.get("uin").and_then(as_i64).unwrap_or(0),
                name: str_field(item, "name"),
                text: strip_emoticons(&str_field(item, "content")),
                created_at: item.get("created_time").and_then(as_i64).unwrap_or(0),
                images,
                comments,
                liked: false,
            }
        })
        .collect()
}

/// 解析 getActiveFeeds，仅保留说说 (appid 311)；返回动态与翻页游标
pub fn parse_active_feeds(v: &Value) -> (Vec<Feed>, String) {
    let data = v.get("data").unwrap_or(&Value::Null);
    let attach = str_field(data, "attachinfo");
    let Some(list) = data.get("vFeeds").and_then(Value::as_array) else {
        return (Vec::new(), attach);
    };

    let feeds = list
        .iter()
        .filter(|f| {
            f.pointer("/comm/appid").and_then(as_i64) == Some(MOOD_APPID)
        })
        .map(|f| {
            let images = f
                .pointer("/pic/picdata")
                .and_then(Value::as_array)
                .map(|pics| {
                    pics.iter()
                        .filter_map(|p| {
                            let urls = p.get("photourl")?.as_object()?;
                            // 取分辨率最高的一档（key 为数字字符串）
                            urls.iter()
                                .max_by_key(|(k, _)| k.parse::<i64>().unwrap_or(0))
                                .map(|(_, u)| str_field(u, "url"))
                                .filter(|s| !s.is_empty())
                        })
                        .collect()
                })
                .unwrap_or_default();

            let comments = f
                .pointer("/comment/comments")
                .and_then(Value::as_array)
                .map(|cs| {
                    cs.iter()
                        .map(|c| FeedComment {
                            uin: c.pointer("/user/uin").and_then(as_i64).unwrap_or(0),
                            name: c
                                .pointer("/user/nickname")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            text: strip_emoticons(&str_field(c, "content")),
                        })
                        .collect()
                })
                .unwrap_or_default();

            Feed {
                tid: f
                    .pointer("/id/cellid")
                    .map(|c| match c {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .unwrap_or_default(),
                uin: f.pointer("/userinfo/user/uin").and_then(as_i64).unwrap_or(0),
                name: f
                    .pointer("/userinfo/user/nickname")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                text: strip_emoticons(
                    f.pointer("/summary/summary")
                        .and_then(Value::as_str)
                        .unwrap_or_default(),
                ),
                created_at: f.pointer("/comm/time").and_then(as_i64).unwrap_or(0),
                images,
                comments,
                liked: f.pointer("/like/isliked").and_then(as_i64).unwrap_or(0) == 1,
            }
        })
        .collect();

    (feeds, attach)
}

/// 解析访客列表
pub fn parse_visitors(v: &Value) -> VisitorReport {
    let data = v.get("data").unwrap_or(&Value::Null);
    let items = data
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|it| Visitor {
                    uin: it.get("uin").and_then(as_i64).unwrap_or(0),
                    name: str_field(it, "name"),
                    time: it.get("time").and_then(as_i64).unwrap_or(0),
                })
                .collect()
        })
        .unwrap_or_default();
    VisitorReport {
        today: data.get("todaycount").and_then(as_i64).unwrap_or(0),
        total: data.get("totalcount").and_then(as_i64).unwrap_or(0),
        items,
    }
}

/// 上传图片后的富文本参数
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedImage {
    pub pic_bo: String,
    pub richval: String,
}

pub fn parse_upload(v: &Value) -> QzoneResult<UploadedImage> {
    check_code(v)?;
    let d = v
        .get("data")
        .ok_or_else(|| QzoneError::Parse("上传响应缺少 data".to_string()))?;
    let field = |k: &str| str_field(d, k);
    let url = field("url");
    let pic_bo = url::Url::parse(&url)
        .ok()
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "bo")
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or_default();
    let (height, width) = (field("height"), field("width"));
    let richval = format!(
        ",{},{},{},{},{},{},,{},{}",
        field("albumid"),
        field("lloc"),
        field("sloc"),
        field("type"),
        height,
        width,
        height,
        width
    );
    Ok(UploadedImage { pic_bo, richval })
}

/// 基于 reqwest 的 QQ 空间客户端
pub struct QzoneClient {
    http: reqwest::Client,
    session: Arc<SessionManager>,
}

impl QzoneClient {
    pub fn new(session: Arc<SessionManager>, timeout: Duration) -> QzoneResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { http, session })
    }

    /// 会话失效时清空缓存，下次调用重新获取 Cookie
    fn observe<T>(&self, result: QzoneResult<T>) -> QzoneResult<T> {
        if let Err(QzoneError::SessionExpired) = &result {
            warn!(target: "Qzone", "QQ 空间返回登录失效，清除会话");
            self.session.invalidate();
        }
        result
    }

    fn referer(s: &Session) -> String {
        format!("https://user.qzone.qq.com/{}", s.uin)
    }

    async fn get(&self, s: &Session, url: &str, query: &[(&str, String)]) -> QzoneResult<Value> {
        let body = self
            .http
            .get(url)
            .query(query)
            .header(COOKIE, &s.cookies)
            .header(REFERER, Self::referer(s))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let v = parse_body(&body)?;
        self.observe(check_code(&v))?;
        Ok(v)
    }

    async fn post(
        &self,
        s: &Session,
        url: &str,
        form: &[(&str, String)],
    ) -> QzoneResult<Value> {
        let body = self
            .http
            .post(url)
            .query(&[("g_tk", s.g_tk.to_string())])
            .header(COOKIE, &s.cookies)
            .header(REFERER, Self::referer(s))
            .form(form)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let v = parse_body(&body)?;
        self.observe(check_code(&v))?;
        Ok(v)
    }

    async fn session(&self) -> QzoneResult<Arc<Session>> {
        self.session.get().await
    }

    /// 读取图片内容：支持 base64:// 与 http(s) 地址
    async fn load_image(&self, src: &str) -> QzoneResult<Vec<u8>> {
        if let Some(b64) = src.strip_prefix("base64://") {
            return BASE64
                .decode(b64)
                .map_err(|e| QzoneError::BadArgument(format!("图片 base64 无效: {}", e)));
        }
        let bytes = self
            .http
            .get(src)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }

    async fn upload_image(&self, s: &Session, src: &str) -> QzoneResult<UploadedImage> {
        let data = self.load_image(src).await?;
        let uin = s.uin.to_string();
        let form: Vec<(&str, String)> = vec![
            ("filename", "filename".into()),
            ("zzpanelkey", String::new()),
            ("uploadtype", "1".into()),
            ("albumtype", "7".into()),
            ("exttype", "0".into()),
            ("refer", "shuoshuo".into()),
            ("output_type", "json".into()),
            ("charset", "utf-8".into()),
            ("output_charset", "utf-8".into()),
            ("upload_hd", "1".into()),
            ("hd_width", "2048".into()),
            ("hd_height", "10000".into()),
            ("hd_quality", "96".into()),
            ("url", format!("{}?g_tk={}", UPLOAD_URL, s.g_tk)),
            ("base64", "1".into()),
            ("uin", uin.clone()),
            ("p_uin", uin.clone()),
            ("zzpaneluin", uin),
            ("p_skey", s.p_skey.clone()),
            ("picfile", BASE64.encode(&data)),
        ];
        let v = self.post(s, UPLOAD_URL, &form).await?;
        parse_upload(&v)
    }

    async fn do_publish(&self, draft: &PostDraft) -> QzoneResult<PublishReceipt> {
        let s = self.session().await?;

        let mut uploaded = Vec::with_capacity(draft.images.len());
        for src in &draft.images {
            uploaded.push(self.upload_image(&s, src).await?);
        }

        let mut form: Vec<(&str, String)> = vec![
            ("syn_tweet_verson", "1".into()),
            ("paramstr", "1".into()),
            ("who", "1".into()),
            ("con", draft.text.clone()),
            ("feedversion", "1".into()),
            ("ver", "1".into()),
            ("ugc_right", "1".into()),
            ("to_sign", "0".into()),
            ("hostuin", s.uin.to_string()),
            ("code_version", "1".into()),
            ("format", "json".into()),
            ("qzreferrer", Self::referer(&s)),
        ];
        if !uploaded.is_empty() {
            let bos: Vec<&str> = uploaded.iter().map(|u| u.pic_bo.as_str()).collect();
            let richvals: Vec<&str> = uploaded.iter().map(|u| u.richval.as_str()).collect();
            form.push(("pic_bo", format!("{}\t{}", bos.join(","), bos.join(","))));
            form.push(("richtype", "1".into()));
            form.push(("richval", richvals.join("\t")));
            form.push(("subrichtype", "1".into()));
        }

        let v = self.post(&s, PUBLISH_URL, &form).await?;
        let tid = str_field(&v, "tid");
        if tid.is_empty() {
            return Err(QzoneError::Parse("发布响应缺少 tid".to_string()));
        }
        Ok(PublishReceipt {
            tid,
            created_at: v.get("now").and_then(as_i64).unwrap_or_else(|| chrono::Local::now().timestamp()),
        })
    }

    async fn do_list(&self, target: i64, pos: usize, num: usize) -> QzoneResult<Vec<Feed>> {
        let s = self.session().await?;
        let query = [
            ("uin", target.to_string()),
            ("ftype", "0".into()),
            ("sort", "0".into()),
            ("pos", pos.to_string()),
            ("num", num.to_string()),
            ("replynum", "100".into()),
            ("g_tk", s.g_tk.to_string()),
            ("callback", "_preloadCallback".into()),
            ("code_version", "1".into()),
            ("format", "jsonp".into()),
            ("need_private_comment", "1".into()),
        ];
        let v = self.get(&s, MSGLIST_URL, &query).await?;
        Ok(parse_msglist(&v))
    }

    async fn do_recent(&self, page: usize) -> QzoneResult<Vec<Feed>> {
        let s = self.session().await?;
        let mut attach = String::new();
        let mut feeds = Vec::new();
        for current in 1..=page.max(1) {
            let form = [
                ("res_type", "0".to_string()),
                ("res_attach", attach.clone()),
                ("refresh_type", "2".into()),
                ("format", "json".into()),
                ("attach_info", attach.clone()),
            ];
            let v = self.post(&s, ACTIVE_FEEDS_URL, &form).await?;
            let (list, next) = parse_active_feeds(&v);
            debug!(target: "Qzone", "好友动态第 {} 页: {} 条", current, list.len());
            feeds = list;
            if next.is_empty() {
                break;
            }
            attach = next;
        }
        Ok(feeds)
    }

    async fn do_like(&self, feed: &Feed) -> QzoneResult<()> {
        let s = self.session().await?;
        let unikey = format!("http://user.qzone.qq.com/{}/mood/{}", feed.uin, feed.tid);
        let form = [
            ("qzreferrer", Self::referer(&s)),
            ("opuin", s.uin.to_string()),
            ("unikey", unikey.clone()),
            ("curkey", unikey),
            ("from", "1".into()),
            ("appid", MOOD_APPID.to_string()),
            ("typeid", "0".into()),
            ("abstime", feed.created_at.to_string()),
            ("fid", feed.tid.clone()),
            ("active", "0".into()),
            ("fupdate", "1".into()),
            ("format", "json".into()),
        ];
        self.post(&s, LIKE_URL, &form).await?;
        Ok(())
    }

    async fn do_comment(&self, feed: &Feed, text: &str) -> QzoneResult<()> {
        let s = self.session().await?;
        let form = [
            ("topicId", format!("{}_{}__1", feed.uin, feed.tid)),
            ("feedsType", "100".into()),
            ("inCharset", "utf-8".into()),
            ("outCharset", "utf-8".into()),
            ("plat", "qzone".into()),
            ("source", "ic".into()),
            ("hostUin", feed.uin.to_string()),
            ("platformid", "52".into()),
            ("uin", s.uin.to_string()),
            ("format", "json".into()),
            ("ref", "feeds".into()),
            ("content", text.to_string()),
            ("private", "0".into()),
            ("paramstr", "1".into()),
            ("qzreferrer", Self::referer(&s)),
        ];
        self.post(&s, COMMENT_URL, &form).await?;
        Ok(())
    }

    async fn do_delete(&self, tid: &str) -> QzoneResult<()> {
        let s = self.session().await?;
        let form = [
            ("hostuin", s.uin.to_string()),
            ("tid", tid.to_string()),
            ("t1_source", "1".into()),
            ("code_version", "1".into()),
            ("format", "json".into()),
            ("qzreferrer", Self::referer(&s)),
        ];
        self.post(&s, DELETE_URL, &form).await?;
        Ok(())
    }

    async fn do_visitors(&self) -> QzoneResult<VisitorReport> {
        let s = self.session().await?;
        let query = [
            ("uin", s.uin.to_string()),
            ("mask", "7".into()),
            ("g_tk", s.g_tk.to_string()),
            ("page", "1".into()),
            ("fupdate", "1".into()),
            ("clear", "1".into()),
        ];
        let v = self.get(&s, VISITOR_URL, &query).await?;
        Ok(parse_visitors(&v))
    }
}

impl QzoneApi for QzoneClient {
    fn self_uin(&self) -> BoxFuture<'_, QzoneResult<i64>> {
        Box::pin(async move { Ok(self.session().await?.uin) })
    }

    fn publish<'a>(&'a self, draft: &'a PostDraft) -> BoxFuture<'a, QzoneResult<PublishReceipt>> {
        Box::pin(self.do_publish(draft))
    }

    fn list_feeds(
        &self,
        target: i64,
        pos: usize,
        num: usize,
    ) -> BoxFuture<'_, QzoneResult<Vec<Feed>>> {
        Box::pin(self.do_list(target, pos, num))
    }

    fn recent_feeds(&self, page: usize) -> BoxFuture<'_, QzoneResult<Vec<Feed>>> {
        Box::pin(self.do_recent(page))
    }

    fn like<'a>(&'a self, feed: &'a Feed) -> BoxFuture<'a, QzoneResult<()>> {
        Box::pin(self.do_like(feed))
    }

    fn comment<'a>(&'a self, feed: &'a Feed, text: &'a str) -> BoxFuture<'a, QzoneResult<()>> {
        Box::pin(self.do_comment(feed, text))
    }

    fn delete<'a>(&'a self, tid: &'a str) -> BoxFuture<'a, QzoneResult<()>> {
        Box::pin(self.do_delete(tid))
    }

    fn visitors(&self) -> BoxFuture<'_, QzoneResult<VisitorReport>> {
        Box::pin(self.do_visitors())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn jsonp_is_unwrapped() {
        assert_eq!(unwrap_jsonp(r#"_preloadCallback({"code":0});"#), r#"{"code":0}"#);
        assert_eq!(unwrap_jsonp(r#" {"code":0} "#), r#"{"code":0}"#);
        let v = parse_body(r#"callback({"a":"(x)"})"#).unwrap();
        assert_eq!(v["a"], "(x)");
    }

    #[test]
    fn not_logged_in_maps_to_session_expired() {
        let v = json!({"code": -3000, "message": "请先登录"});
        assert!(matches!(check_code(&v), Err(QzoneError::SessionExpired)));

        let v = json!({"ret": "-3000"});
        assert!(matches!(check_code(&v), Err(QzoneError::SessionExpired)));
    }

    #[test]
    fn vendor_failure_carries_message() {
        let v = json!({"code": -10001, "msg": "操作过于频繁"});
        match check_code(&v) {
            Err(QzoneError::Remote { code, message }) => {
                assert_eq!(code, -10001);
                assert_eq!(message, "操作过于频繁");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(check_code(&json!({"code": 0})).is_ok());
        assert!(check_code(&json!({})).is_ok());
    }

    #[test]
    fn emoticons_are_removed() {
        assert_eq!(strip_emoticons("早安[em]e100[/em]世界 "), "早安世界");
    }

    #[test]
    fn msglist_is_parsed() {
        let v = json!({
            "code": 0,
            "msglist": [{
                "tid": "abc123",
                "uin": 10001,
                "name": "小明",
                "content": "今天[em]e400[/em]吃了火锅",
                "created_time": 1700000000,
                "pic": [{"url1": "http://a/1.jpg", "url2": "http://a/2.jpg"}],
                "commentlist": [{"uin": 20002, "name": "小红", "content": "好吃吗"}]
            }]
        });
        let feeds = parse_msglist(&v);
        assert_eq!(feeds.len(), 1);
        let f = &feeds[0];
        assert_eq!(f.tid, "abc123");
        assert_eq!(f.text, "今天吃了火锅");
        assert_eq!(f.images, vec!["http://a/2.jpg".to_string()]);
        assert!(f.commented_by(20002));
        assert!(!f.commented_by(10001));

        assert!(parse_msglist(&json!({"code": 0, "msglist": null})).is_empty());
    }

    #[test]
    fn active_feeds_keep_only_moods() {
        let v = json!({
            "ret": 0,
            "data": {
                "attachinfo": "next-page",
                "vFeeds": [
                    {
                        "comm": {"appid": 311, "time": 1700000001},
                        "id": {"cellid": "t1"},
                        "userinfo": {"user": {"uin": 30003, "nickname": "阿强"}},
                        "summary": {"summary": "周末爬山"},
                        "like": {"isliked": 1},
                        "pic": {"picdata": [{"photourl": {"0": {"url": "small"}, "1": {"url": "big"}}}]},
                        "comment": {"comments": [{"user": {"uin": 1, "nickname": "bot"}, "content": "赞"}]}
                    },
                    {"comm": {"appid": 4}, "id": {"cellid": "album"}}
                ]
            }
        });
        let (feeds, attach) = parse_active_feeds(&v);
        assert_eq!(attach, "next-page");
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].uin, 30003);
        assert!(feeds[0].liked);
        assert_eq!(feeds[0].images, vec!["big".to_string()]);
        assert!(feeds[0].commented_by(1));
    }

    #[test]
    fn upload_response_builds_richval() {
        let v = json!({
            "ret": 0,
            "data": {
                "albumid": "A", "lloc": "L", "sloc": "S", "type": 1,
                "height": 600, "width": 800,
                "url": "http://b.qpic.cn/x?bo=BOVALUE&rf=viewer"
            }
        });
        let up = parse_upload(&v).unwrap();
        assert_eq!(up.pic_bo, "BOVALUE");
        assert_eq!(up.richval, ",A,L,S,1,600,800,,600,800");
    }

    #[test]
    fn visitors_are_parsed() {
        let v = json!({"code": 0, "data": {"todaycount": 2, "totalcount": 99,
            "items": [{"uin": 5, "name": "访客", "time": 1700000002}]}});
        let r = parse_visitors(&v);
        assert_eq!((r.today, r.total), (2, 99));
        assert_eq!(r.items[0].name, "访客");
    }
}
