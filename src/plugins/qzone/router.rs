use super::args::{PostRange, parse_id, parse_id_and_reason};
use super::config::QzoneConfig;
use super::error::{QzoneError, QzoneResult};
use super::llm::ChatSource;
use super::service::{Outcome, QzoneService};
use super::{feeds, jobs, render, surfing, wall};
use crate::{error, warn};

/// 权限等级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    User,
    Admin,
}

/// 参数形态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgShape {
    None,
    /// 文本 + 图片
    Content,
    /// [@用户] [序号 | 起~止]
    TargetRange,
    OptionalId,
    RequiredId,
    /// [编号] [理由]
    IdAndReason,
    /// 子指令 + 参数
    Subcommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Publish,
    WriteDiary,
    Draft,
    ViewFeeds,
    LikeFeeds,
    CommentFeeds,
    DeleteFeeds,
    Visitors,
    Submit,
    SubmitAnonymous,
    ViewSubmission,
    ListSubmissions,
    Approve,
    Reject,
    DeleteSubmission,
    JobStatus,
    Surf,
    Help,
}

pub struct CommandSpec {
    pub keywords: &'static [&'static str],
    pub tier: Tier,
    pub shape: ArgShape,
    pub action: Action,
    pub usage: &'static str,
}

macro_rules! cmd {
    ([$($kw:literal),+], $tier:ident, $shape:ident, $action:ident, $usage:literal) => {
        CommandSpec {
            keywords: &[$($kw),+],
            tier: Tier::$tier,
            shape: ArgShape::$shape,
            action: Action::$action,
            usage: $usage,
        }
    };
}

pub static COMMANDS: &[CommandSpec] = &[
    cmd!(["发说说"], Admin, Content, Publish, "发说说 <内容> [图片] - 立即发布说说"),
    cmd!(["写说说"], Admin, Content, WriteDiary, "写说说 [风格] [主题] [图片] - 根据群聊生成并发布说说"),
    cmd!(["写稿", "写草稿"], User, Content, Draft, "写稿 [风格] [主题] [图片] - 生成说说草稿并提交审核"),
    cmd!(["查看说说"], User, TargetRange, ViewFeeds, "查看说说 [@用户] [序号|起~止] - 查看说说"),
    cmd!(["点赞说说"], User, TargetRange, LikeFeeds, "点赞说说 [@用户] [序号|起~止] - 给说说点赞"),
    cmd!(["评论说说"], User, TargetRange, CommentFeeds, "评论说说 [@用户] [序号|起~止] - 用 AI 评论说说"),
    cmd!(["删除说说"], Admin, TargetRange, DeleteFeeds, "删除说说 [序号|起~止] - 删除自己的说说"),
    cmd!(["查看访客"], Admin, None, Visitors, "查看访客 - 查看空间访客"),
    cmd!(["投稿"], User, Content, Submit, "投稿 <内容> [图片] - 向表白墙投稿"),
    cmd!(["匿名投稿"], User, Content, SubmitAnonymous, "匿名投稿 <内容> [图片] - 匿名投稿"),
    cmd!(["查看稿件"], User, OptionalId, ViewSubmission, "查看稿件 [编号] - 查看稿件（默认最新待审核）"),
    cmd!(["稿件列表"], Admin, None, ListSubmissions, "稿件列表 - 列出待审核稿件"),
    cmd!(["通过稿件"], Admin, OptionalId, Approve, "通过稿件 [编号] - 通过并发布稿件"),
    cmd!(["拒绝稿件"], Admin, IdAndReason, Reject, "拒绝稿件 [编号] [理由] - 拒绝稿件"),
    cmd!(["删除稿件"], Admin, RequiredId, DeleteSubmission, "删除稿件 <编号> - 删除稿件记录"),
    cmd!(["任务状态"], Admin, None, JobStatus, "任务状态 - 查看定时任务运行情况"),
    cmd!(["冲浪"], User, Subcommand, Surf, "冲浪 帮助 - 上网冲浪写说说"),
    cmd!(["说说帮助"], User, None, Help, "说说帮助 - 显示本帮助"),
];

/// 所有指令关键词，长的在前避免前缀误匹配
pub fn keywords() -> Vec<&'static str> {
    let mut all: Vec<&'static str> = COMMANDS
        .iter()
        .flat_map(|c| c.keywords.iter().copied())
        .collect();
    all.sort_by_key(|k| std::cmp::Reverse(k.chars().count()));
    all
}

pub fn find(keyword: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|c| c.keywords.contains(&keyword))
}

/// 一次指令调用的调用方信息与原始参数
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub user_id: i64,
    pub user_name: String,
    pub group_id: Option<i64>,
    pub self_id: Option<i64>,
    pub self_name: String,
    pub text: String,
    pub images: Vec<String>,
    pub mentions: Vec<i64>,
}

/// 按参数形态解析后的参数
#[derive(Debug, Clone, Default)]
pub struct Args {
    pub text: String,
    pub images: Vec<String>,
    pub target: Option<i64>,
    pub range: PostRange,
    pub id: Option<i64>,
    pub reason: Option<String>,
}

pub fn parse_args(shape: ArgShape, inv: &Invocation) -> QzoneResult<Args> {
    let mut args = Args {
        text: inv.text.clone(),
        ..Args::default()
    };
    let first = inv.text.split_whitespace().next();

    match shape {
        ArgShape::None | ArgShape::Subcommand => {}
        ArgShape::Content => args.images = inv.images.clone(),
        ArgShape::TargetRange => {
            args.target = inv
                .mentions
                .iter()
                .copied()
                .find(|id| Some(*id) != inv.self_id);
            args.range = PostRange::parse(&inv.text)?;
        }
        ArgShape::OptionalId => args.id = parse_id(first)?,
        ArgShape::RequiredId => {
            args.id = Some(
                parse_id(first)?
                    .ok_or_else(|| QzoneError::BadArgument("请指定稿件编号".to_string()))?,
            );
        }
        ArgShape::IdAndReason => {
            let (id, reason) = parse_id_and_reason(&inv.text)?;
            args.id = id;
            args.reason = reason;
        }
    }
    Ok(args)
}

/// 权限校验，先于一切外部调用
pub fn authorize(spec: &CommandSpec, user_id: i64, config: &QzoneConfig) -> QzoneResult<()> {
    if spec.tier == Tier::Admin && !config.is_admin(user_id) {
        return Err(QzoneError::PermissionDenied(spec.keywords[0].to_string()));
    }
    Ok(())
}

/// 执行指令；错误均转为回复文本
pub async fn dispatch(
    svc: &QzoneService,
    keyword: &str,
    inv: &Invocation,
    chat: &dyn ChatSource,
) -> Outcome {
    match execute(svc, keyword, inv, chat).await {
        Ok(outcome) => outcome,
        Err(e) => {
            if e.is_user_error() {
                warn!(target: "Qzone", "[{}] {} 调用失败: {}", keyword, inv.user_id, e);
            } else {
                error!(target: "Qzone", "[{}] {} 调用失败: {}", keyword, inv.user_id, e);
            }
            Outcome::text(e.user_message())
        }
    }
}

pub async fn execute(
    svc: &QzoneService,
    keyword: &str,
    inv: &Invocation,
    chat: &dyn ChatSource,
) -> QzoneResult<Outcome> {
    let spec = find(keyword).ok_or_else(|| QzoneError::NotFound(format!("指令 {}", keyword)))?;
    authorize(spec, inv.user_id, &svc.config)?;
    let args = parse_args(spec.shape, inv)?;

    match spec.action {
        Action::Publish => feeds::publish(svc, &args).await,
        Action::WriteDiary => feeds::write_diary(svc, chat, inv, &args).await,
        Action::Draft => feeds::draft(svc, chat, inv, &args).await,
        Action::ViewFeeds => feeds::view(svc, &args).await,
        Action::LikeFeeds => feeds::like(svc, &args).await,
        Action::CommentFeeds => feeds::comment(svc, &args).await,
        Action::DeleteFeeds => feeds::delete(svc, &args).await,
        Action::Visitors => feeds::visitors(svc).await,
        Action::Submit => wall::submit(svc, inv, &args, false).await,
        Action::SubmitAnonymous => wall::submit(svc, inv, &args, true).await,
        Action::ViewSubmission => wall::view(svc, &args).await,
        Action::ListSubmissions => wall::list(svc).await,
        Action::Approve => wall::approve(svc, &args).await,
        Action::Reject => wall::reject(svc, &args).await,
        Action::DeleteSubmission => wall::delete(svc, &args).await,
        Action::JobStatus => Ok(Outcome::text(jobs::status_report(svc))),
        Action::Surf => surfing::handle(svc, inv, &args).await,
        Action::Help => Ok(Outcome::text(render::help(
            svc.config.is_admin(inv.user_id),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::qzone::service::fixture::{self, ADMIN, BOT, USER};
    use crate::plugins::qzone::testing::{FakeChat, FakeQzone};

    fn inv(user_id: i64, text: &str) -> Invocation {
        Invocation {
            user_id,
            user_name: format!("用户{}", user_id),
            group_id: Some(555),
            self_id: Some(BOT),
            self_name: "Bot".into(),
            text: text.into(),
            ..Invocation::default()
        }
    }

    #[test]
    fn keywords_cover_table() {
        let all = keywords();
        for spec in COMMANDS {
            for kw in spec.keywords {
                assert!(all.contains(kw));
                assert_eq!(find(kw).map(|s| s.action), Some(spec.action));
            }
        }
        assert!(find("不存在").is_none());
    }

    #[tokio::test]
    async fn user_cannot_reach_admin_commands() {
        let fx = fixture::basic(FakeQzone::new(BOT).with_feeds(BOT, 3)).await;
        let chat = FakeChat::with_group(555, &["甲: 你好呀"]);

        for spec in COMMANDS.iter().filter(|c| c.tier == Tier::Admin) {
            let kw = spec.keywords[0];
            let res = execute(&fx.svc, kw, &inv(USER, "1"), &chat).await;
            assert!(
                matches!(res, Err(QzoneError::PermissionDenied(ref k)) if k == kw),
                "{kw}"
            );
        }
        assert_eq!(fx.api.calls(), 0);
        assert_eq!(fx.generator.count(), 0);
    }

    #[tokio::test]
    async fn range_selects_consecutive_posts() {
        let fx = fixture::basic(FakeQzone::new(BOT).with_feeds(2001, 6)).await;
        let chat = FakeChat::default();
        let mut call = inv(USER, "2~5");
        call.mentions = vec![2001];

        let out = execute(&fx.svc, "查看说说", &call, &chat).await.unwrap();
        for i in 2..=5 {
            assert!(out.text.contains(&format!("第{}条说说", i)), "{}", out.text);
        }
        assert!(!out.text.contains("第1条说说"));
        assert!(!out.text.contains("第6条说说"));
    }

    #[tokio::test]
    async fn range_beyond_list_yields_fewer() {
        let fx = fixture::basic(FakeQzone::new(BOT).with_feeds(2001, 3)).await;
        let mut call = inv(USER, "2~5");
        call.mentions = vec![2001];

        let out = execute(&fx.svc, "点赞说说", &call, &FakeChat::default())
            .await
            .unwrap();
        assert_eq!(fx.api.liked(), vec!["2001-2".to_string(), "2001-3".to_string()]);
        assert!(out.text.contains("已给用户2001的说说点赞"));
    }

    #[tokio::test]
    async fn errors_become_replies() {
        let fx = fixture::basic(FakeQzone::new(BOT)).await;
        let out = dispatch(&fx.svc, "查看说说", &inv(USER, "5~2"), &FakeChat::default()).await;
        assert!(out.text.starts_with("❌"));

        let out = dispatch(&fx.svc, "通过稿件", &inv(USER, ""), &FakeChat::default()).await;
        assert!(out.text.contains("权限不足"));
    }

    #[tokio::test]
    async fn wall_flow_through_router() {
        let fx = fixture::basic(FakeQzone::new(BOT)).await;
        let chat = FakeChat::default();

        let out = execute(&fx.svc, "投稿", &inv(USER, "hello"), &chat).await.unwrap();
        assert!(out.text.contains("#1"));
        assert_eq!(out.notices.len(), 1);
        assert_eq!(out.notices[0].group_id, 900);

        assert!(matches!(
            execute(&fx.svc, "投稿", &inv(USER, "  "), &chat).await,
            Err(QzoneError::EmptySubmission)
        ));

        execute(&fx.svc, "通过稿件", &inv(ADMIN, "1"), &chat).await.unwrap();
        let again = execute(&fx.svc, "通过稿件", &inv(ADMIN, "1"), &chat).await;
        assert!(matches!(again, Err(QzoneError::InvalidState { .. })));
        assert_eq!(fx.api.published().len(), 1);

        execute(&fx.svc, "投稿", &inv(USER, "second"), &chat).await.unwrap();
        let out = execute(&fx.svc, "拒绝稿件", &inv(ADMIN, "2 spam"), &chat)
            .await
            .unwrap();
        assert!(out.text.contains("spam"));
        let view = execute(&fx.svc, "查看稿件", &inv(USER, "2"), &chat).await.unwrap();
        assert!(view.text.contains("已拒绝"));
        assert!(view.text.contains("spam"));
    }

    #[test]
    fn delete_submission_requires_id() {
        let err = parse_args(ArgShape::RequiredId, &inv(ADMIN, "")).unwrap_err();
        assert!(err.is_user_error());
        let args = parse_args(ArgShape::RequiredId, &inv(ADMIN, "#4")).unwrap();
        assert_eq!(args.id, Some(4));
    }
}
