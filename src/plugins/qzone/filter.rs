use super::error::{QzoneError, QzoneResult};
use crate::warn;

const SENSITIVE: &[(&str, &[&str])] = &[
    ("政治敏感", &["政治", "政府", "领导人", "国家", "政策", "体制", "民主"]),
    ("暴力违法", &["暴力", "违法", "犯罪", "毒品", "赌博", "诈骗", "杀人"]),
    ("色情低俗", &["色情", "淫秽", "低俗", "性爱", "淫乱", "猥亵"]),
];

const MEANINGLESS: &[&str] = &[
    "啊啊啊啊", "哈哈哈", "。。。", "？？？", "！！！", "test", "测试", "hello", "你好", "123",
    "abc",
];

const PUNCTUATION: &str = "，。！？；：、";

const REPEAT_THRESHOLD: usize = 5;
const MIN_LENGTH: usize = 10;

/// 最长的连续相同字符长度
fn longest_run(content: &str) -> usize {
    let mut best = 0;
    let mut run = 0;
    let mut prev = None;
    for c in content.chars() {
        if Some(c) == prev {
            run += 1;
        } else {
            run = 1;
            prev = Some(c);
        }
        best = best.max(run);
    }
    best
}

fn is_low_quality(content: &str) -> bool {
    if longest_run(content) >= REPEAT_THRESHOLD {
        return true;
    }
    if MEANINGLESS.iter().any(|p| content.contains(p)) {
        return true;
    }
    let total = content.chars().count();
    let punct = content.chars().filter(|c| PUNCTUATION.contains(*c)).count();
    total > 0 && punct * 2 > total
}

/// 审核生成内容：敏感词 -> 低质量 -> 过短
pub fn review(content: &str) -> QzoneResult<()> {
    for (category, words) in SENSITIVE {
        if let Some(word) = words.iter().find(|w| content.contains(*w)) {
            warn!(target: "Qzone/Filter", "检测到敏感内容：{} - {}", category, word);
            return Err(QzoneError::Filtered(format!("内容包含敏感信息（{}）", category)));
        }
    }

    if is_low_quality(content) {
        warn!(target: "Qzone/Filter", "内容质量过低，已过滤");
        return Err(QzoneError::Filtered("内容质量不符合要求".to_string()));
    }

    if content.trim().chars().count() < MIN_LENGTH {
        warn!(target: "Qzone/Filter", "内容过短，已过滤");
        return Err(QzoneError::Filtered("内容过短".to_string()));
    }

    Ok(())
}

/// 超出长度时截断为 max_length - 3 个字符加 "..."
pub fn truncate(content: &str, max_length: usize) -> String {
    if content.chars().count() <= max_length {
        return content.to_string();
    }
    let keep = max_length.saturating_sub(3);
    let mut out: String = content.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// 审核并截断
pub fn sanitize(content: &str, max_length: usize) -> QzoneResult<String> {
    let content = content.trim();
    review(content)?;
    Ok(truncate(content, max_length))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensitive_words_are_rejected() {
        let err = review("今天聊了聊国家大事，感觉收获满满的一天").unwrap_err();
        assert!(matches!(err, QzoneError::Filtered(ref m) if m.contains("政治敏感")));
    }

    #[test]
    fn repeated_runs_are_low_quality() {
        assert_eq!(longest_run("好好好好好"), 5);
        assert_eq!(longest_run("好好好好"), 4);
        assert!(review("今天天气好好好好好，出去走了一圈心情不错").is_err());
        assert!(review("今天天气好好好好，出去走了一圈心情不错").is_ok());
    }

    #[test]
    fn meaningless_patterns_and_punctuation() {
        assert!(review("哈哈哈今天终于放假了，准备出去旅游").is_err());
        assert!(is_low_quality("嗯，。！？；：、好"));
        assert!(!is_low_quality("周末和朋友去看了电影，很开心。"));
    }

    #[test]
    fn short_content_is_rejected() {
        assert!(matches!(review("晚安"), Err(QzoneError::Filtered(_))));
    }

    #[test]
    fn long_content_is_truncated() {
        let text = "春".repeat(20);
        let out = truncate(&text, 10);
        assert_eq!(out.chars().count(), 10);
        assert!(out.ends_with("..."));
        assert_eq!(truncate("短文本", 10), "短文本");
    }

    #[test]
    fn sanitize_trims_then_checks() {
        let ok = sanitize("  周末去公园散步，看到很多人在放风筝，心情很好  ", 100).unwrap();
        assert!(ok.starts_with("周末"));
    }
}
