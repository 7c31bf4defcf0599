use crate::event::Context;
use simd_json::OwnedValue;
use simd_json::derived::{ValueObjectAccess, ValueObjectAccessAsArray, ValueObjectAccessAsScalar};

pub struct CommandMatch {
    /// 指令名之后剩余的消息段
    pub args: Vec<OwnedValue>,
    /// 被过滤掉的引用回复 ID
    pub reply_id: Option<String>,
    /// 指令前出现的 AT 用户 ID
    pub at_ids: Vec<String>,
}

fn seg_id(data: &OwnedValue, key: &str) -> Option<String> {
    data.get_str(key)
        .map(String::from)
        .or_else(|| data.get_i64(key).map(|v| v.to_string()))
        .or_else(|| data.get_u64(key).map(|v| v.to_string()))
}

impl CommandMatch {
    /// 参数中的纯文本（各文本段拼接后去除首尾空白）
    pub fn text(&self) -> String {
        self.args
            .iter()
            .filter(|seg| seg.get_str("type") == Some("text"))
            .filter_map(|seg| seg.get("data").and_then(|d| d.get_str("text")))
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// 指令前后所有被 AT 的 QQ 号（忽略 @全体成员）
    pub fn mentions(&self) -> Vec<i64> {
        let after = self
            .args
            .iter()
            .filter(|seg| seg.get_str("type") == Some("at"))
            .filter_map(|seg| seg.get("data").and_then(|d| seg_id(d, "qq")));
        self.at_ids
            .iter()
            .cloned()
            .chain(after)
            .filter_map(|qq| qq.parse::<i64>().ok())
            .collect()
    }

    /// 参数中的图片地址
    pub fn image_urls(&self) -> Vec<String> {
        self.args
            .iter()
            .filter(|seg| seg.get_str("type") == Some("image"))
            .filter_map(|seg| {
                let data = seg.get("data")?;
                data.get_str("url")
                    .filter(|s| !s.is_empty())
                    .or_else(|| data.get_str("file"))
                    .map(String::from)
            })
            .collect()
    }
}

pub fn get_prefixes(ctx: &Context) -> Vec<String> {
    ctx.config.read().unwrap().command_prefix.clone()
}

/// 解析指令：跳过头部的 Reply/At/空白，按候选名依次匹配 [Prefix][Command]，
/// 返回首个命中的名字与参数
pub fn match_any<'a>(ctx: &Context, names: &[&'a str]) -> Option<(&'a str, CommandMatch)> {
    let prefixes = get_prefixes(ctx);
    let msg_arr = ctx.as_message()?.0.get_array("message")?;
    names
        .iter()
        .find_map(|name| match_segments(msg_arr, &prefixes, name).map(|m| (*name, m)))
}

fn match_segments(
    msg_arr: &[OwnedValue],
    prefixes: &[String],
    command_name: &str,
) -> Option<CommandMatch> {
    let mut reply_id = None;
    let mut at_ids = Vec::new();

    for (i, segment) in msg_arr.iter().enumerate() {
        let type_ = segment.get_str("type")?;
        let data = segment.get("data")?;

        match type_ {
            "reply" => {
                if reply_id.is_none() {
                    reply_id = seg_id(data, "id");
                }
            }
            "at" => {
                if let Some(qq) = seg_id(data, "qq") {
                    at_ids.push(qq);
                }
            }
            "text" => {
                let trimmed_start = data.get_str("text").unwrap_or("").trim_start();
                if trimmed_start.is_empty() {
                    continue;
                }

                for prefix in prefixes {
                    let target = format!("{}{}", prefix, command_name);
                    if let Some(rest) = trimmed_start.strip_prefix(&target) {
                        let mut args = Vec::new();

                        let args_text = rest.trim_start();
                        if !args_text.is_empty() {
                            let mut new_seg = segment.clone();
                            new_seg["data"]["text"] = OwnedValue::from(args_text);
                            args.push(new_seg);
                        }

                        args.extend(msg_arr.iter().skip(i + 1).cloned());

                        return Some(CommandMatch {
                            reply_id,
                            at_ids,
                            args,
                        });
                    }
                }
                // 第一个有效文本未命中，视为匹配失败
                return None;
            }
            _ => return None,
        }
    }

    None
}
