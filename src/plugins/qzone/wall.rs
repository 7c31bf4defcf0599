use super::error::{QzoneError, QzoneResult};
use super::queue::Author;
use super::render;
use super::router::{Args, Invocation};
use super::service::{Outcome, QzoneService};

const LIST_LIMIT: u64 = 10;

pub async fn submit(
    svc: &QzoneService,
    inv: &Invocation,
    args: &Args,
    anonymous: bool,
) -> QzoneResult<Outcome> {
    let author = Author {
        id: inv.user_id,
        name: inv.user_name.clone(),
        group_id: inv.group_id.unwrap_or_default(),
    };
    let sub = svc
        .queue
        .submit(&author, &args.text, args.images.clone(), anonymous)
        .await?;

    let reply = if anonymous {
        format!("✅ 匿名投稿成功，稿件编号 #{}，请等待管理员审核", sub.id)
    } else {
        format!("✅ 投稿成功，稿件编号 #{}，请等待管理员审核", sub.id)
    };
    Ok(Outcome::text(reply).notify(svc.config.manage_group, render::review_notice(&sub)))
}

pub async fn view(svc: &QzoneService, args: &Args) -> QzoneResult<Outcome> {
    let sub = svc.queue.view(args.id).await?;
    Ok(Outcome::text(render::submission_detail(&sub)).with_images(sub.image_list()))
}

pub async fn list(svc: &QzoneService) -> QzoneResult<Outcome> {
    let pending = svc.queue.pending(LIST_LIMIT).await?;
    if pending.is_empty() {
        return Ok(Outcome::text("📭 暂无待审核的稿件"));
    }
    let lines: Vec<String> = pending.iter().map(render::submission_brief).collect();
    Ok(Outcome::text(format!(
        "📋 待审核稿件（最早 {} 条）\n{}",
        pending.len(),
        lines.join("\n")
    )))
}

pub async fn approve(svc: &QzoneService, args: &Args) -> QzoneResult<Outcome> {
    let (sub, receipt) = svc.queue.approve(args.id, svc.api.as_ref()).await?;
    Ok(Outcome::text(format!(
        "✅ 稿件 #{} 已通过并发布（tid: {}）",
        sub.id, receipt.tid
    ))
    .notify(
        sub.group_id,
        format!("🎉 稿件 #{} 已通过审核并发布到空间", sub.id),
    ))
}

pub async fn reject(svc: &QzoneService, args: &Args) -> QzoneResult<Outcome> {
    let sub = svc.queue.reject(args.id, args.reason.as_deref()).await?;
    let reason = sub.reason.as_deref().unwrap_or("未填写");
    Ok(Outcome::text(format!("🚫 稿件 #{} 已拒绝，理由：{}", sub.id, reason)))
}

pub async fn delete(svc: &QzoneService, args: &Args) -> QzoneResult<Outcome> {
    let id = args
        .id
        .ok_or_else(|| QzoneError::BadArgument("请指定要删除的稿件编号".to_string()))?;
    let sub = svc.queue.delete(id).await?;
    Ok(Outcome::text(format!(
        "🗑️ 已删除稿件 #{}（{}）",
        sub.id,
        sub.status.label()
    )))
}
