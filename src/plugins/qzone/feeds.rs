use super::api::{Feed, PostDraft};
use super::args::PostRange;
use super::error::{QzoneError, QzoneResult};
use super::llm::{self, ChatSource, DiaryRequest, DiaryStyle};
use super::queue::Author;
use super::render;
use super::router::{Args, Invocation};
use super::service::{Outcome, QzoneService};
use crate::{info, warn};

/// 按目标与范围获取说说：指定用户时取其说说列表，否则在好友动态首页上截取
pub async fn fetch(
    svc: &QzoneService,
    target: Option<i64>,
    range: PostRange,
) -> QzoneResult<Vec<Feed>> {
    let feeds = match target {
        Some(uin) => {
            svc.api
                .list_feeds(uin, range.offset(), range.count)
                .await?
        }
        None => range.select(&svc.api.recent_feeds(1).await?),
    };
    if feeds.is_empty() {
        return Err(QzoneError::NotFound("指定范围内没有说说".to_string()));
    }
    Ok(feeds)
}

pub async fn publish(svc: &QzoneService, args: &Args) -> QzoneResult<Outcome> {
    if args.text.trim().is_empty() && args.images.is_empty() {
        return Err(QzoneError::BadArgument("说说内容不能为空".to_string()));
    }
    let draft = PostDraft {
        text: args.text.trim().to_string(),
        images: args.images.clone(),
    };
    let receipt = svc.api.publish(&draft).await?;
    info!(target: "Qzone", "说说已发布 tid={}", receipt.tid);
    Ok(Outcome::text(render::published(&draft, &receipt)))
}

/// [风格] [主题]：开头是风格名时按该风格写，其余作为主题
fn diary_request<'a>(inv: &Invocation, args: &'a Args) -> DiaryRequest<'a> {
    let text = args.text.trim();
    let first = text.split_whitespace().next().unwrap_or_default();
    let (style, topic) = match DiaryStyle::parse(first) {
        Some(style) => (style, text[first.len()..].trim()),
        None => (DiaryStyle::Default, text),
    };
    DiaryRequest {
        group_id: inv.group_id,
        topic: Some(topic).filter(|t| !t.is_empty()),
        style,
        multi_group: false,
    }
}

/// 根据群聊记录生成说说并直接发布
pub async fn write_diary(
    svc: &QzoneService,
    chat: &dyn ChatSource,
    inv: &Invocation,
    args: &Args,
) -> QzoneResult<Outcome> {
    let text = llm::generate_diary(
        svc.generator.as_ref(),
        chat,
        &svc.config.llm,
        &diary_request(inv, args),
    )
    .await?;

    let draft = PostDraft {
        text,
        images: args.images.clone(),
    };
    let receipt = svc.api.publish(&draft).await?;
    info!(target: "Qzone", "AI 说说已发布 tid={}", receipt.tid);
    Ok(Outcome::text(render::published(&draft, &receipt)))
}

/// 生成说说草稿，以 Bot 名义匿名存入稿件队列等待审核
pub async fn draft(
    svc: &QzoneService,
    chat: &dyn ChatSource,
    inv: &Invocation,
    args: &Args,
) -> QzoneResult<Outcome> {
    let text = llm::generate_diary(
        svc.generator.as_ref(),
        chat,
        &svc.config.llm,
        &diary_request(inv, args),
    )
    .await?;

    let author = Author {
        id: inv.self_id.unwrap_or_default(),
        name: if inv.self_name.is_empty() {
            "Bot".to_string()
        } else {
            inv.self_name.clone()
        },
        group_id: inv.group_id.unwrap_or_default(),
    };
    let sub = svc
        .queue
        .submit(&author, &text, args.images.clone(), true)
        .await?;
    info!(target: "Qzone", "{} 生成了草稿 #{}", inv.user_id, sub.id);

    Ok(
        Outcome::text(format!("📝 草稿已保存为稿件 #{}，等待审核：\n{}", sub.id, sub.text))
            .notify(svc.config.manage_group, render::review_notice(&sub)),
    )
}

pub async fn view(svc: &QzoneService, args: &Args) -> QzoneResult<Outcome> {
    let feeds = fetch(svc, args.target, args.range).await?;
    let outcome = Outcome::text(render::feed_list(&feeds, args.range.start));
    // 只查看单条时附带原图
    Ok(match feeds.as_slice() {
        [single] => outcome.with_images(single.images.clone()),
        _ => outcome,
    })
}

pub async fn like(svc: &QzoneService, args: &Args) -> QzoneResult<Outcome> {
    let feeds = fetch(svc, args.target, args.range).await?;
    let mut lines = Vec::with_capacity(feeds.len());

    for (i, feed) in (args.range.start..).zip(&feeds) {
        match svc.api.like(feed).await {
            Ok(()) => lines.push(format!(
                "{}. 已给{}的说说点赞: {}",
                i,
                feed.name,
                feed.excerpt(10)
            )),
            Err(e) => {
                warn!(target: "Qzone", "点赞 {} 失败: {}", feed.tid, e);
                lines.push(format!("{}. 点赞{}的说说失败: {}", i, feed.name, e));
            }
        }
    }
    Ok(Outcome::text(lines.join("\n")))
}

pub async fn comment(svc: &QzoneService, args: &Args) -> QzoneResult<Outcome> {
    let feeds = fetch(svc, args.target, args.range).await?;
    let self_uin = svc.api.self_uin().await?;
    let mut lines = Vec::new();

    for (i, feed) in (args.range.start..).zip(&feeds) {
        if feed.uin == self_uin {
            continue;
        }
        let result = async {
            let content =
                llm::generate_comment(svc.generator.as_ref(), &svc.config.llm, &feed.text).await?;
            svc.api.comment(feed, &content).await?;
            Ok::<_, QzoneError>(content)
        }
        .await;

        match result {
            Ok(content) => lines.push(format!(
                "{}. 已给{}的说说评论: {}...",
                i,
                feed.name,
                content.chars().take(20).collect::<String>()
            )),
            Err(e) => {
                warn!(target: "Qzone", "评论 {} 失败: {}", feed.tid, e);
                lines.push(format!("{}. 评论{}的说说失败: {}", i, feed.name, e));
            }
        }
    }

    if lines.is_empty() {
        return Err(QzoneError::NotFound("没有可评论的说说（已跳过自己的说说）".to_string()));
    }
    Ok(Outcome::text(lines.join("\n")))
}

/// 删除 Bot 自己的说说
pub async fn delete(svc: &QzoneService, args: &Args) -> QzoneResult<Outcome> {
    let self_uin = svc.api.self_uin().await?;
    let feeds = fetch(svc, Some(self_uin), args.range).await?;
    let mut lines = Vec::with_capacity(feeds.len());

    for (i, feed) in (args.range.start..).zip(&feeds) {
        match svc.api.delete(&feed.tid).await {
            Ok(()) => {
                info!(target: "Qzone", "已删除说说 tid={}", feed.tid);
                lines.push(format!(
                    "{}. 已删除{}的说说: {}",
                    i,
                    feed.name,
                    feed.excerpt(10)
                ));
            }
            Err(e) => {
                warn!(target: "Qzone", "删除 {} 失败: {}", feed.tid, e);
                lines.push(format!("{}. 删除说说失败: {}", i, e));
            }
        }
    }
    Ok(Outcome::text(lines.join("\n")))
}

pub async fn visitors(svc: &QzoneService) -> QzoneResult<Outcome> {
    let report = svc.api.visitors().await?;
    Ok(Outcome::text(render::visitors(&report)))
}
