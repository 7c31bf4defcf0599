use super::api::{Feed, PostDraft, PublishReceipt, VisitorReport};
use super::entity::submission::{self, Status};
use super::router::{COMMANDS, Tier};
use chrono::{Local, TimeZone};

pub fn fmt_time(ts: i64) -> String {
    Local
        .timestamp_opt(ts, 0)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn excerpt(text: &str, n: usize) -> String {
    if text.chars().count() <= n {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(n).collect::<String>())
    }
}

pub fn published(draft: &PostDraft, receipt: &PublishReceipt) -> String {
    let mut out = format!("✅ 说说已发布（tid: {}）", receipt.tid);
    if !draft.text.is_empty() {
        out.push('\n');
        out.push_str(&draft.text);
    }
    if !draft.images.is_empty() {
        out.push_str(&format!("\n🖼️ 图片 {} 张", draft.images.len()));
    }
    out
}

/// start 为第一条的序号
pub fn feed_list(feeds: &[Feed], start: usize) -> String {
    feeds
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let mut block = format!("{}. {}（{}）\n{}", start + i, f.name, fmt_time(f.created_at), f.text);
            let mut meta = Vec::new();
            if !f.images.is_empty() {
                meta.push(format!("🖼️ {}", f.images.len()));
            }
            meta.push(format!("💬 {}", f.comments.len()));
            if f.liked {
                meta.push("❤️ 已赞".to_string());
            }
            block.push_str(&format!("\n{}", meta.join(" | ")));
            for c in f.comments.iter().take(3) {
                block.push_str(&format!("\n  └ {}: {}", c.name, excerpt(&c.text, 30)));
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn visitors(report: &VisitorReport) -> String {
    let mut out = format!("👀 今日访客 {} 人，累计 {} 人", report.today, report.total);
    if report.items.is_empty() {
        out.push_str("\n暂无访客记录");
    }
    for v in report.items.iter().take(20) {
        out.push_str(&format!("\n• {}({}) {}", v.name, v.uin, fmt_time(v.time)));
    }
    out
}

fn author_label(sub: &submission::Model) -> String {
    if sub.anonymous {
        format!("匿名（{}）", sub.author_id)
    } else {
        format!("{}（{}）", sub.author_name, sub.author_id)
    }
}

pub fn submission_detail(sub: &submission::Model) -> String {
    let mut out = format!(
        "📄 稿件 #{}\n状态：{}\n投稿人：{}\n时间：{}",
        sub.id,
        sub.status.label(),
        author_label(sub),
        fmt_time(sub.created_at)
    );
    if !sub.text.is_empty() {
        out.push_str(&format!("\n内容：{}", sub.text));
    }
    let images = sub.image_list();
    if !images.is_empty() {
        out.push_str(&format!("\n图片：{} 张", images.len()));
    }
    match sub.status {
        Status::Approved => {
            if let Some(tid) = &sub.tid {
                out.push_str(&format!("\n说说 tid：{}", tid));
            }
        }
        Status::Rejected => {
            out.push_str(&format!(
                "\n拒绝理由：{}",
                sub.reason.as_deref().unwrap_or("未填写")
            ));
        }
        Status::Pending => {}
    }
    out
}

pub fn submission_brief(sub: &submission::Model) -> String {
    let images = sub.image_list().len();
    let mut line = format!("#{} {}: {}", sub.id, author_label(sub), excerpt(&sub.text, 20));
    if images > 0 {
        line.push_str(&format!(" [图片×{}]", images));
    }
    line
}

/// 审核群收到的新稿件通知
pub fn review_notice(sub: &submission::Model) -> String {
    format!(
        "📬 收到新稿件 #{}\n投稿人：{}\n内容：{}\n\n发送「通过稿件 {}」或「拒绝稿件 {} 理由」处理",
        sub.id,
        author_label(sub),
        excerpt(&sub.text, 100),
        sub.id,
        sub.id
    )
}

pub fn help(is_admin: bool) -> String {
    let mut out = String::from("📖 QQ空间指令");
    for spec in COMMANDS {
        if spec.tier == Tier::Admin && !is_admin {
            continue;
        }
        let mark = if spec.tier == Tier::Admin { " 🔒" } else { "" };
        out.push_str(&format!("\n• {}{}", spec.usage, mark));
    }
    if !is_admin {
        out.push_str("\n\n部分管理指令未显示");
    }
    out
}
