use super::error::{QzoneError, QzoneResult};
use crate::{debug, info};
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// QQ 空间登录凭据
#[derive(Debug, Clone)]
pub struct Session {
    pub uin: i64,
    pub cookies: String,
    pub g_tk: i64,
    pub p_skey: String,
}

/// 由 skey / p_skey 计算 g_tk（bkn）
pub fn g_tk(key: &str) -> i64 {
    let mut hash: u64 = 5381;
    for c in key.chars() {
        hash = hash.wrapping_add((hash << 5).wrapping_add(c as u64));
    }
    (hash & 0x7fff_ffff) as i64
}

/// 解析 "k1=v1; k2=v2" 形式的 Cookie 字符串
pub fn parse_cookies(raw: &str) -> HashMap<String, String> {
    raw.split(';')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            let k = k.trim();
            if k.is_empty() {
                return None;
            }
            Some((k.to_string(), v.trim().to_string()))
        })
        .collect()
}

/// "o0123456" -> 123456
fn parse_uin(raw: &str) -> Option<i64> {
    raw.trim_start_matches(['o', 'O'])
        .trim_start_matches('0')
        .parse()
        .ok()
}

impl Session {
    pub fn from_cookies(raw: &str) -> QzoneResult<Session> {
        let map = parse_cookies(raw);

        let uin = map
            .get("uin")
            .or_else(|| map.get("p_uin"))
            .and_then(|v| parse_uin(v))
            .ok_or_else(|| QzoneError::NoSession("Cookie 中缺少 uin".to_string()))?;

        let p_skey = map
            .get("p_skey")
            .or_else(|| map.get("skey"))
            .cloned()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| QzoneError::NoSession("Cookie 中缺少 p_skey".to_string()))?;

        Ok(Session {
            uin,
            g_tk: g_tk(&p_skey),
            cookies: raw.trim().to_string(),
            p_skey,
        })
    }
}

/// Cookie 来源（OneBot 实现或静态配置）
pub trait CookieSource: Send + Sync {
    fn fetch_cookies(&self) -> BoxFuture<'_, QzoneResult<String>>;
}

/// 进程内共享的会话缓存：首次使用时获取，登录失效后清空重取
pub struct SessionManager {
    fixed: Option<String>,
    source: RwLock<Option<Arc<dyn CookieSource>>>,
    cached: RwLock<Option<Arc<Session>>>,
}

impl SessionManager {
    /// `fixed_cookies` 非空时始终使用该静态 Cookie
    pub fn new(fixed_cookies: &str) -> Self {
        let fixed = Some(fixed_cookies.trim().to_string()).filter(|s| !s.is_empty());
        Self {
            fixed,
            source: RwLock::new(None),
            cached: RwLock::new(None),
        }
    }

    /// 绑定新的 Cookie 来源（每次重连时调用），同时丢弃旧会话
    pub fn bind(&self, source: Arc<dyn CookieSource>) {
        *self.source.write().unwrap() = Some(source);
        if self.fixed.is_none() {
            self.invalidate();
        }
    }

    pub fn invalidate(&self) {
        if self.cached.write().unwrap().take().is_some() {
            info!(target: "Qzone", "已清除 QQ 空间会话缓存");
        }
    }

    pub fn cached(&self) -> Option<Arc<Session>> {
        self.cached.read().unwrap().clone()
    }

    pub async fn get(&self) -> QzoneResult<Arc<Session>> {
        if let Some(s) = self.cached() {
            return Ok(s);
        }

        let raw = match &self.fixed {
            Some(c) => c.clone(),
            None => {
                let source = self.source.read().unwrap().clone().ok_or_else(|| {
                    QzoneError::NoSession("Bot 尚未连接，且未配置静态 Cookie".to_string())
                })?;
                source.fetch_cookies().await?
            }
        };

        let session = Arc::new(Session::from_cookies(&raw)?);
        debug!(target: "Qzone", "已获取会话: uin={} g_tk={}", session.uin, session.g_tk);
        *self.cached.write().unwrap() = Some(session.clone());
        Ok(session)
    }
}
