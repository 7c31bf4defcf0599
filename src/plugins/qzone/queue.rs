use super::api::{PostDraft, PublishReceipt, QzoneApi};
use super::entity::submission::{self, Status};
use super::error::{QzoneError, QzoneResult};
use crate::info;
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Schema,
};
use tokio::sync::Mutex as AsyncMutex;

/// 投稿人
#[derive(Debug, Clone)]
pub struct Author {
    pub id: i64,
    pub name: String,
    /// 来源群 (私聊为 0)
    pub group_id: i64,
}

/// 表白墙稿件队列
pub struct SubmissionQueue {
    db: DatabaseConnection,
    /// 审核操作串行执行，避免并发通过导致重复发布
    moderation: AsyncMutex<()>,
}

/// 稿件发布到空间时的正文
pub fn publish_text(sub: &submission::Model) -> String {
    if sub.anonymous {
        sub.text.clone()
    } else {
        format!("【来自 {} 的投稿】\n{}", sub.author_name, sub.text)
    }
}

fn now() -> i64 {
    chrono::Local::now().timestamp()
}

impl SubmissionQueue {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            moderation: AsyncMutex::new(()),
        }
    }

    /// 建表及状态索引
    pub async fn init_schema(&self) -> QzoneResult<()> {
        let builder = self.db.get_database_backend();
        let schema = Schema::new(builder);

        self.db
            .execute(
                builder.build(
                    schema
                        .create_table_from_entity(submission::Entity)
                        .if_not_exists(),
                ),
            )
            .await?;

        let idx = sea_orm::sea_query::Index::create()
            .name("idx_qzone_submissions_status")
            .table(submission::Entity)
            .col(submission::Column::Status)
            .if_not_exists()
            .to_owned();
        self.db.execute(builder.build(&idx)).await?;
        Ok(())
    }

    pub async fn submit(
        &self,
        author: &Author,
        text: &str,
        images: Vec<String>,
        anonymous: bool,
    ) -> QzoneResult<submission::Model> {
        let text = text.trim();
        if text.is_empty() && images.is_empty() {
            return Err(QzoneError::EmptySubmission);
        }

        let ts = now();
        let record = submission::ActiveModel {
            id: NotSet,
            author_id: Set(author.id),
            author_name: Set(author.name.clone()),
            group_id: Set(author.group_id),
            text: Set(text.to_string()),
            images: Set(serde_json::to_string(&images)?),
            anonymous: Set(anonymous),
            status: Set(Status::Pending),
            reason: Set(None),
            tid: Set(None),
            created_at: Set(ts),
            updated_at: Set(ts),
        }
        .insert(&self.db)
        .await?;

        info!(
            target: "Qzone/Wall",
            "收到稿件 #{} 来自 {}({}){}",
            record.id,
            author.name,
            author.id,
            if anonymous { " [匿名]" } else { "" }
        );
        Ok(record)
    }

    /// 查看指定稿件；未指定时取最新的待审核稿件
    pub async fn view(&self, id: Option<i64>) -> QzoneResult<submission::Model> {
        match id {
            Some(id) => submission::Entity::find_by_id(id)
                .one(&self.db)
                .await?
                .ok_or_else(|| QzoneError::NotFound(format!("稿件 #{}", id))),
            None => submission::Entity::find()
                .filter(submission::Column::Status.eq(Status::Pending))
                .order_by_desc(submission::Column::Id)
                .one(&self.db)
                .await?
                .ok_or_else(|| QzoneError::NotFound("暂无待审核的稿件".to_string())),
        }
    }

    async fn load_pending(&self, id: Option<i64>) -> QzoneResult<submission::Model> {
        let sub = self.view(id).await?;
        if sub.status != Status::Pending {
            return Err(QzoneError::InvalidState {
                id: sub.id,
                state: sub.status,
            });
        }
        Ok(sub)
    }

    /// 通过并发布；发布失败时稿件保持待审核
    pub async fn approve(
        &self,
        id: Option<i64>,
        api: &dyn QzoneApi,
    ) -> QzoneResult<(submission::Model, PublishReceipt)> {
        let _guard = self.moderation.lock().await;
        let sub = self.load_pending(id).await?;

        let draft = PostDraft {
            text: publish_text(&sub),
            images: sub.image_list(),
        };
        let receipt = api.publish(&draft).await?;

        let mut am: submission::ActiveModel = sub.into();
        am.status = Set(Status::Approved);
        am.tid = Set(Some(receipt.tid.clone()));
        am.updated_at = Set(now());
        let updated = am.update(&self.db).await?;

        info!(target: "Qzone/Wall", "稿件 #{} 已通过并发布 (tid={})", updated.id, receipt.tid);
        Ok((updated, receipt))
    }

    pub async fn reject(
        &self,
        id: Option<i64>,
        reason: Option<&str>,
    ) -> QzoneResult<submission::Model> {
        let _guard = self.moderation.lock().await;
        let sub = self.load_pending(id).await?;

        let mut am: submission::ActiveModel = sub.into();
        am.status = Set(Status::Rejected);
        am.reason = Set(reason.map(str::trim).filter(|r| !r.is_empty()).map(String::from));
        am.updated_at = Set(now());
        let updated = am.update(&self.db).await?;

        info!(target: "Qzone/Wall", "稿件 #{} 已拒绝", updated.id);
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> QzoneResult<submission::Model> {
        let _guard = self.moderation.lock().await;
        let sub = self.view(Some(id)).await?;
        submission::Entity::delete_by_id(id).exec(&self.db).await?;
        info!(target: "Qzone/Wall", "稿件 #{} 已删除", id);
        Ok(sub)
    }

    /// 最早的若干条待审核稿件
    pub async fn pending(&self, limit: u64) -> QzoneResult<Vec<submission::Model>> {
        Ok(submission::Entity::find()
            .filter(submission::Column::Status.eq(Status::Pending))
            .order_by_asc(submission::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?)
    }
}

#[cfg(test)]
pub(crate) async fn memory_queue() -> SubmissionQueue {
    let db = crate::db::connect("sqlite::memory:").await.unwrap();
    let queue = SubmissionQueue::new(db);
    queue.init_schema().await.unwrap();
    queue
}
