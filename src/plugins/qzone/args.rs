use super::error::{QzoneError, QzoneResult};

/// 单次最多处理的说说条数
pub const MAX_RANGE: usize = 20;
/// 起始序号上限
pub const MAX_START: usize = 1000;

/// 说说序号范围，start 从 1 开始
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostRange {
    pub start: usize,
    pub count: usize,
}

impl Default for PostRange {
    fn default() -> Self {
        Self { start: 1, count: 1 }
    }
}

fn parse_index(s: &str, raw: &str) -> QzoneResult<usize> {
    let n: usize = s
        .trim()
        .parse()
        .map_err(|_| QzoneError::BadArgument(format!("无法识别的范围「{}」", raw)))?;
    if n == 0 {
        return Err(QzoneError::BadArgument("序号从 1 开始".to_string()));
    }
    if n > MAX_START {
        return Err(QzoneError::BadArgument(format!(
            "序号不能超过 {}",
            MAX_START
        )));
    }
    Ok(n)
}

impl PostRange {
    /// 取文本最后一个词作为范围："3" / "2~5"；其他内容视为默认第 1 条
    pub fn parse(text: &str) -> QzoneResult<PostRange> {
        let Some(token) = text.split_whitespace().last() else {
            return Ok(PostRange::default());
        };

        let range = if let Some((a, b)) = token.split_once(['~', '～']) {
            let start = parse_index(a, token)?;
            let end = parse_index(b, token)?;
            if end < start {
                return Err(QzoneError::BadArgument(format!(
                    "范围「{}」的结束序号小于起始序号",
                    token
                )));
            }
            PostRange {
                start,
                count: end - start + 1,
            }
        } else if token.chars().all(|c| c.is_ascii_digit()) {
            PostRange {
                start: parse_index(token, token)?,
                count: 1,
            }
        } else {
            return Ok(PostRange::default());
        };

        if range.count > MAX_RANGE {
            return Err(QzoneError::BadArgument(format!(
                "一次最多处理 {} 条说说",
                MAX_RANGE
            )));
        }
        Ok(range)
    }

    /// 从 0 开始的偏移
    pub fn offset(&self) -> usize {
        self.start - 1
    }

    /// 在已获取的列表上截取对应区间
    pub fn select<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(self.offset())
            .take(self.count)
            .cloned()
            .collect()
    }
}

/// 解析可选的稿件编号（允许 "#3" 写法）
pub fn parse_id(token: Option<&str>) -> QzoneResult<Option<i64>> {
    let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    let digits = token.trim_start_matches(['#', '＃']);
    digits
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .map(Some)
        .ok_or_else(|| QzoneError::BadArgument(format!("无效的稿件编号「{}」", token)))
}

/// "[编号] [理由...]"：首词为编号时拆出，其余作为理由
pub fn parse_id_and_reason(text: &str) -> QzoneResult<(Option<i64>, Option<String>)> {
    let text = text.trim();
    let (first, rest) = match text.split_once(char::is_whitespace) {
        Some((f, r)) => (f, r.trim()),
        None => (text, ""),
    };

    let digits = first.trim_start_matches(['#', '＃']);
    let looks_like_id = !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit());

    let (id, reason) = if looks_like_id {
        (parse_id(Some(first))?, rest)
    } else {
        (None, text)
    };

    let reason = Some(reason.to_string()).filter(|r| !r.is_empty());
    Ok((id, reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_forms() {
        assert_eq!(PostRange::parse("").unwrap(), PostRange::default());
        assert_eq!(PostRange::parse("3").unwrap(), PostRange { start: 3, count: 1 });
        assert_eq!(PostRange::parse("2~5").unwrap(), PostRange { start: 2, count: 4 });
        assert_eq!(PostRange::parse("看看 1～2").unwrap(), PostRange { start: 1, count: 2 });
        // 非数字的最后一个词不当作范围
        assert_eq!(PostRange::parse("随便看看").unwrap(), PostRange::default());
    }

    #[test]
    fn malformed_ranges_are_user_errors() {
        for bad in ["5~2", "x~3", "0", "0~3", "1~50", "1001", "1001~1002"] {
            let err = PostRange::parse(bad).unwrap_err();
            assert!(err.is_user_error(), "{bad}");
        }
    }

    #[test]
    fn select_is_bounded() {
        let items: Vec<i32> = (1..=6).collect();
        let r = PostRange::parse("2~5").unwrap();
        assert_eq!(r.offset(), 1);
        assert_eq!(r.select(&items), vec![2, 3, 4, 5]);
        assert_eq!(r.select(&items[..3]), vec![2, 3]);
        assert!(r.select::<i32>(&[]).is_empty());
    }

    #[test]
    fn start_is_capped() {
        let r = PostRange::parse("990~1000").unwrap();
        assert_eq!((r.start, r.count), (990, 11));
        assert!(PostRange::parse("18446744073709551615").is_err());
    }

    #[test]
    fn ids_and_reasons() {
        assert_eq!(parse_id(None).unwrap(), None);
        assert_eq!(parse_id(Some("#12")).unwrap(), Some(12));
        assert!(parse_id(Some("abc")).is_err());

        assert_eq!(
            parse_id_and_reason("3 内容违规").unwrap(),
            (Some(3), Some("内容违规".to_string()))
        );
        assert_eq!(
            parse_id_and_reason("广告太多").unwrap(),
            (None, Some("广告太多".to_string()))
        );
        assert_eq!(parse_id_and_reason("").unwrap(), (None, None));

        // 单独的 "#" 不是编号，整体作为理由
        assert_eq!(
            parse_id_and_reason("#").unwrap(),
            (None, Some("#".to_string()))
        );
        assert_eq!(
            parse_id_and_reason("＃ 重复投稿").unwrap(),
            (None, Some("＃ 重复投稿".to_string()))
        );
    }
}
