use crate::event::Event;
use simd_json::derived::ValueObjectAccessAsScalar;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, oneshot};

/// 事件匹配器：按 echo 把 API 响应交还给发起调用的任务
pub struct Matcher {
    waiters: AsyncMutex<Vec<Waiter>>,
}

struct Waiter {
    echo: String,
    sender: oneshot::Sender<Event>,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Matcher {
    pub fn new() -> Self {
        Self {
            waiters: AsyncMutex::new(Vec::new()),
        }
    }

    /// 等待 echo 对应的 API 响应，超时返回 None
    pub async fn wait_resp(&self, echo: String, timeout_duration: Duration) -> Option<Event> {
        let (tx, rx) = oneshot::channel();
        {
            let mut guard = self.waiters.lock().await;
            // 顺手清理已超时（接收端已丢弃）的等待者
            guard.retain(|w| !w.sender.is_closed());
            guard.push(Waiter { echo, sender: tx });
        }

        match tokio::time::timeout(timeout_duration, rx).await {
            Ok(Ok(event)) => Some(event),
            _ => None,
        }
    }

    /// 尝试把事件交给等待者。被消费时返回 None，否则原样返还。
    pub async fn dispatch(&self, event: Event) -> Option<Event> {
        let Some(echo) = event.get_str("echo").map(str::to_string) else {
            return Some(event);
        };

        let mut guard = self.waiters.lock().await;
        guard.retain(|w| !w.sender.is_closed());

        match guard.iter().position(|w| w.echo == echo) {
            Some(idx) => {
                let waiter = guard.remove(idx);
                let _ = waiter.sender.send(event);
                None
            }
            None => Some(event),
        }
    }

    #[cfg(test)]
    async fn pending(&self) -> usize {
        self.waiters.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn parse(raw: &str) -> Event {
        let mut bytes = raw.as_bytes().to_vec();
        simd_json::to_owned_value(&mut bytes).unwrap()
    }

    #[tokio::test]
    async fn echo_response_reaches_waiter() {
        let matcher = Arc::new(Matcher::new());
        let m = matcher.clone();
        let waiting =
            tokio::spawn(async move { m.wait_resp("req-1".into(), Duration::from_secs(2)).await });

        // 让等待者先注册
        while matcher.pending().await == 0 {
            tokio::task::yield_now().await;
        }

        let left = matcher
            .dispatch(parse(r#"{"echo":"req-1","retcode":0}"#))
            .await;
        assert!(left.is_none());

        let got = waiting.await.unwrap().unwrap();
        assert_eq!(got.get_i64("retcode"), Some(0));
    }

    #[tokio::test]
    async fn unmatched_event_is_returned() {
        let matcher = Matcher::new();
        let ev = parse(r#"{"post_type":"message","user_id":1}"#);
        assert!(matcher.dispatch(ev).await.is_some());
        let ev = parse(r#"{"echo":"nobody","retcode":0}"#);
        assert!(matcher.dispatch(ev).await.is_some());
    }

    #[tokio::test]
    async fn timed_out_waiters_are_dropped() {
        let matcher = Matcher::new();
        assert!(
            matcher
                .wait_resp("late".into(), Duration::from_millis(5))
                .await
                .is_none()
        );
        // 超时的等待者在下次分发时被清理，响应不会被吞掉
        let ev = parse(r#"{"echo":"late","retcode":0}"#);
        assert!(matcher.dispatch(ev).await.is_some());
        assert_eq!(matcher.pending().await, 0);
    }
}
