use super::config::LlmConfig;
use super::error::{QzoneError, QzoneResult};
use super::filter;
use crate::{debug, warn};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    types::images::{CreateImageRequestArgs, Image, ImageModel, ImageResponseFormat, ImageSize},
};
use futures_util::future::BoxFuture;
use rand::seq::{IndexedRandom, SliceRandom};
use std::time::Duration;

/// 多群聊模式最多参考的群数
pub const MULTI_GROUP_MAX: usize = 3;

/// 文本生成能力（OpenAI 兼容接口，测试中替换为假实现）
pub trait TextGenerator: Send + Sync {
    fn generate_text<'a>(
        &'a self,
        system: &'a str,
        prompt: &'a str,
    ) -> BoxFuture<'a, QzoneResult<String>>;
}

/// 配图能力，返回图片 URL 或 base64:// 数据
pub trait ImageGenerator: Send + Sync {
    fn generate_image<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, QzoneResult<Vec<String>>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatGroup {
    pub id: i64,
    pub name: String,
}

/// 群聊记录来源
pub trait ChatSource: Send + Sync {
    /// Bot 所在的群
    fn groups(&self) -> BoxFuture<'_, QzoneResult<Vec<ChatGroup>>>;

    /// 最近的群聊消息，按时间正序，每行 "昵称: 内容"
    fn group_history(&self, group_id: i64, max: usize) -> BoxFuture<'_, QzoneResult<Vec<String>>>;
}

pub struct OpenAiGenerator {
    client: Client<OpenAIConfig>,
    model: String,
    image_model: String,
    temperature: f32,
    timeout: Duration,
}

impl OpenAiGenerator {
    pub fn new(cfg: &LlmConfig) -> Self {
        let client = Client::with_config(
            OpenAIConfig::new()
                .with_api_base(&cfg.api_base)
                .with_api_key(&cfg.api_key),
        );
        Self {
            client,
            model: cfg.model.clone(),
            image_model: cfg.image_model.trim().to_string(),
            temperature: cfg.temperature,
            timeout: Duration::from_secs(cfg.timeout_secs.max(1)),
        }
    }

    async fn complete(&self, system: &str, prompt: &str) -> QzoneResult<String> {
        let build_err = |e: async_openai::error::OpenAIError| QzoneError::Llm(e.to_string());

        let req = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(self.temperature)
            .messages(vec![
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system)
                    .build()
                    .map_err(build_err)?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()
                    .map_err(build_err)?
                    .into(),
            ])
            .build()
            .map_err(build_err)?;

        let res = match tokio::time::timeout(self.timeout, self.client.chat().create(req)).await {
            Err(_) => {
                return Err(QzoneError::Llm(format!(
                    "请求超时（{} 秒）",
                    self.timeout.as_secs()
                )));
            }
            Ok(r) => r.map_err(build_err)?,
        };

        if let Some(choice) = res.choices.first()
            && let Some(content) = &choice.message.content
            && !content.trim().is_empty()
        {
            return Ok(content.trim().to_string());
        }
        Err(QzoneError::Llm("模型返回了空内容".to_string()))
    }

    async fn paint(&self, prompt: &str) -> QzoneResult<Vec<String>> {
        if self.image_model.is_empty() {
            return Err(QzoneError::Llm("未配置配图模型".to_string()));
        }
        let req = CreateImageRequestArgs::default()
            .prompt(prompt)
            .model(ImageModel::Other(self.image_model.clone()))
            .n(1u8)
            .size(ImageSize::S1024x1024)
            .response_format(ImageResponseFormat::Url)
            .build()
            .map_err(|e| QzoneError::Llm(e.to_string()))?;

        let res = match tokio::time::timeout(self.timeout, self.client.images().generate(req)).await
        {
            Err(_) => {
                return Err(QzoneError::Llm(format!(
                    "配图请求超时（{} 秒）",
                    self.timeout.as_secs()
                )));
            }
            Ok(r) => r.map_err(|e| QzoneError::Llm(e.to_string()))?,
        };

        let images: Vec<String> = res
            .data
            .iter()
            .map(|img| match img.as_ref() {
                Image::Url { url, .. } => url.clone(),
                Image::B64Json { b64_json, .. } => format!("base64://{}", b64_json),
            })
            .collect();
        debug!(target: "Qzone/LLM", "生成了 {} 张配图", images.len());
        Ok(images)
    }
}

impl TextGenerator for OpenAiGenerator {
    fn generate_text<'a>(
        &'a self,
        system: &'a str,
        prompt: &'a str,
    ) -> BoxFuture<'a, QzoneResult<String>> {
        Box::pin(self.complete(system, prompt))
    }
}

impl ImageGenerator for OpenAiGenerator {
    fn generate_image<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, QzoneResult<Vec<String>>> {
        Box::pin(self.paint(prompt))
    }
}

/// 说说写作风格
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiaryStyle {
    #[default]
    Default,
    Poetic,
    Humorous,
    Philosophical,
    Casual,
}

impl DiaryStyle {
    pub const ALL: [DiaryStyle; 5] = [
        DiaryStyle::Default,
        DiaryStyle::Poetic,
        DiaryStyle::Humorous,
        DiaryStyle::Philosophical,
        DiaryStyle::Casual,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DiaryStyle::Default => "默认",
            DiaryStyle::Poetic => "诗意",
            DiaryStyle::Humorous => "幽默",
            DiaryStyle::Philosophical => "哲理",
            DiaryStyle::Casual => "随意",
        }
    }

    pub fn parse(word: &str) -> Option<DiaryStyle> {
        Self::ALL.into_iter().find(|s| s.label() == word)
    }

    /// 默认风格使用配置的提示词，其余风格替换之
    fn prompt(self, base: &str) -> &str {
        match self {
            DiaryStyle::Default => base,
            DiaryStyle::Poetic => "请用诗意的语言表达，可以适当使用比喻和意象，让文字富有韵律感",
            DiaryStyle::Humorous => "请用幽默风趣的语言表达，可以加入一些俏皮话和轻松的笑点",
            DiaryStyle::Philosophical => "请用哲理性的语言表达，可以探讨一些人生哲理和深度思考",
            DiaryStyle::Casual => "请用轻松随意的语言表达，就像和朋友聊天一样自然",
        }
    }
}

/// 配图风格
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageStyle {
    #[default]
    Default,
    Artistic,
    Minimalist,
    Vibrant,
}

impl ImageStyle {
    fn prompt(self) -> &'static str {
        match self {
            ImageStyle::Default => "生成一张与文本内容相关的精美图片",
            ImageStyle::Artistic => "生成一张具有艺术感的图片，体现文本的意境",
            ImageStyle::Minimalist => "生成一张简约风格的图片，突出文本的核心",
            ImageStyle::Vibrant => "生成一张色彩鲜艳、充满活力的图片",
        }
    }
}

impl From<DiaryStyle> for ImageStyle {
    fn from(style: DiaryStyle) -> Self {
        match style {
            DiaryStyle::Poetic | DiaryStyle::Philosophical => ImageStyle::Artistic,
            DiaryStyle::Casual => ImageStyle::Minimalist,
            DiaryStyle::Humorous => ImageStyle::Vibrant,
            DiaryStyle::Default => ImageStyle::Default,
        }
    }
}

/// 一次写说说的参数
#[derive(Debug, Clone, Copy, Default)]
pub struct DiaryRequest<'a> {
    /// 参考的群，为空时随机挑一个
    pub group_id: Option<i64>,
    pub topic: Option<&'a str>,
    pub style: DiaryStyle,
    /// 综合多个群聊（忽略 group_id）
    pub multi_group: bool,
}

/// 写说说的 system prompt：[主题头] + 基础提示词 + 长度要求
pub fn diary_system_prompt(base: &str, topic: Option<&str>, max_length: usize) -> String {
    let mut prompt = match topic.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => format!("# 写作主题：{}\n\n{}", t, base),
        None => base.to_string(),
    };
    prompt.push_str(&format!("\n\n# 要求：内容长度不超过{}字", max_length));
    prompt
}

/// 按风格与模式组装基础提示词
pub fn styled_base(base: &str, style: DiaryStyle, multi_group: bool) -> String {
    let styled = style.prompt(base);
    if multi_group {
        format!("请综合多个群聊的聊天记录，提炼出有趣的话题和观点，生成一篇说说。{}", styled)
    } else {
        styled.to_string()
    }
}

pub fn diary_user_prompt(lines: &[String], multi_group: bool) -> String {
    let head = if multi_group {
        "请综合以下多个群聊的聊天记录，生成一篇说说："
    } else {
        "请根据以下聊天记录生成一篇说说："
    };
    format!("{}\n{}", head, lines.join("\n"))
}

pub fn comment_prompt(base: &str, post_text: &str) -> String {
    format!("{}\n帖子内容：{}", base, post_text)
}

pub fn image_prompt(style: ImageStyle, text: &str) -> String {
    format!("{}。文本内容：{}", style.prompt(), text)
}

async fn single_group_lines(
    chat: &dyn ChatSource,
    group_id: Option<i64>,
    max_msg: usize,
) -> QzoneResult<Vec<String>> {
    let group_id = match group_id {
        Some(id) => id,
        None => {
            let groups = chat.groups().await?;
            groups
                .choose(&mut rand::rng())
                .map(|g| g.id)
                .ok_or_else(|| QzoneError::NotFound("Bot 未加入任何群聊".to_string()))?
        }
    };
    let lines = chat.group_history(group_id, max_msg).await?;
    if lines.is_empty() {
        warn!(target: "Qzone/LLM", "群 {} 没有可用的聊天记录", group_id);
    }
    debug!(target: "Qzone/LLM", "写说说参考群 {} 的 {} 条消息", group_id, lines.len());
    Ok(lines)
}

/// 随机挑几个群，消息加上【群名】前缀后打乱，总数不超过 2 * max_msg
async fn multi_group_lines(chat: &dyn ChatSource, max_msg: usize) -> QzoneResult<Vec<String>> {
    let groups = chat.groups().await?;
    if groups.is_empty() {
        return Err(QzoneError::NotFound("Bot 未加入任何群聊".to_string()));
    }
    let picked: Vec<ChatGroup> = groups
        .choose_multiple(&mut rand::rng(), MULTI_GROUP_MAX)
        .cloned()
        .collect();

    let mut lines = Vec::new();
    for group in &picked {
        match chat.group_history(group.id, max_msg).await {
            Ok(history) => {
                debug!(target: "Qzone/LLM", "群 {}({}) 获取到 {} 条消息", group.name, group.id, history.len());
                lines.extend(history.into_iter().map(|l| format!("【{}】{}", group.name, l)));
            }
            Err(e) => warn!(target: "Qzone/LLM", "获取群 {}({}) 的消息失败: {}", group.name, group.id, e),
        }
    }

    lines.shuffle(&mut rand::rng());
    lines.truncate(max_msg.saturating_mul(2));
    debug!(target: "Qzone/LLM", "多群聊模式：从 {} 个群获取了 {} 条消息", picked.len(), lines.len());
    Ok(lines)
}

/// 根据群聊记录生成说说
pub async fn generate_diary(
    generator: &dyn TextGenerator,
    chat: &dyn ChatSource,
    cfg: &LlmConfig,
    req: &DiaryRequest<'_>,
) -> QzoneResult<String> {
    let lines = if req.multi_group {
        multi_group_lines(chat, cfg.diary_max_msg).await?
    } else {
        single_group_lines(chat, req.group_id, cfg.diary_max_msg).await?
    };

    let base = styled_base(&cfg.diary_prompt, req.style, req.multi_group);
    let system = diary_system_prompt(&base, req.topic, cfg.diary_max_length);
    let raw = generator
        .generate_text(&system, &diary_user_prompt(&lines, req.multi_group))
        .await?;
    let text = filter::sanitize(&raw, cfg.diary_max_length)?;
    debug!(target: "Qzone/LLM", "生成说说（风格：{}，多群聊：{}，{} 字）", req.style.label(), req.multi_group, text.chars().count());
    Ok(text)
}

pub async fn generate_comment(
    generator: &dyn TextGenerator,
    cfg: &LlmConfig,
    post_text: &str,
) -> QzoneResult<String> {
    let text = generator
        .generate_text("", &comment_prompt(&cfg.comment_prompt, post_text))
        .await?;
    Ok(text.trim().to_string())
}

/// 为文本生成配图；失败时记录警告并返回空列表
pub async fn illustrate(painter: &dyn ImageGenerator, style: ImageStyle, text: &str) -> Vec<String> {
    match painter.generate_image(&image_prompt(style, text)).await {
        Ok(images) => images,
        Err(e) => {
            warn!(target: "Qzone/LLM", "生成配图失败，按纯文本发布: {}", e);
            Vec::new()
        }
    }
}

pub const SENTIMENTS: &[&str] = &["积极", "消极", "中性", "混合"];
pub const TOPICS: &[&str] = &["生活", "工作", "学习", "情感", "娱乐", "科技", "其他"];

const ANALYSIS_SYSTEM: &str = "你是一个专业的情感分析和话题分类助手";

/// 情感与话题分类
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub sentiment: String,
    pub topic: String,
}

impl Default for Analysis {
    fn default() -> Self {
        Self {
            sentiment: "中性".to_string(),
            topic: "其他".to_string(),
        }
    }
}

pub fn analysis_prompt(text: &str) -> String {
    format!(
        "请分析以下文本的情感和话题，按以下格式返回：\n情感分类：[{}]\n话题分类：[{}]\n\n文本内容：{}",
        SENTIMENTS.join("/"),
        TOPICS.join("/"),
        text
    )
}

/// 解析 "情感分类：xx" / "话题分类：xx" 两行，不在候选内的取默认值
pub fn parse_analysis(reply: &str) -> Analysis {
    let mut out = Analysis::default();
    for line in reply.lines().map(str::trim) {
        if let Some(v) = line.strip_prefix("情感分类：") {
            let v = v.trim().trim_matches(['[', ']']);
            if SENTIMENTS.contains(&v) {
                out.sentiment = v.to_string();
            }
        } else if let Some(v) = line.strip_prefix("话题分类：") {
            let v = v.trim().trim_matches(['[', ']']);
            if TOPICS.contains(&v) {
                out.topic = v.to_string();
            }
        }
    }
    out
}

/// 分析说说的情感与话题；模型调用失败时返回默认分类
pub async fn analyze(generator: &dyn TextGenerator, text: &str) -> Analysis {
    match generator.generate_text(ANALYSIS_SYSTEM, &analysis_prompt(text)).await {
        Ok(reply) => parse_analysis(&reply),
        Err(e) => {
            warn!(target: "Qzone/LLM", "情感分析失败: {}", e);
            Analysis::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::qzone::testing::{FakeChat, FakeGenerator};

    #[test]
    fn diary_prompt_layout() {
        let p = diary_system_prompt("基础", Some("春天"), 300);
        assert_eq!(p, "# 写作主题：春天\n\n基础\n\n# 要求：内容长度不超过300字");
        let p = diary_system_prompt("基础", Some("  "), 50);
        assert_eq!(p, "基础\n\n# 要求：内容长度不超过50字");
    }

    #[test]
    fn prompts_embed_context() {
        let lines = vec!["甲: 早".to_string(), "乙: 早上好".to_string()];
        assert_eq!(
            diary_user_prompt(&lines, false),
            "请根据以下聊天记录生成一篇说说：\n甲: 早\n乙: 早上好"
        );
        assert!(diary_user_prompt(&lines, true).starts_with("请综合以下多个群聊的聊天记录"));
        assert_eq!(comment_prompt("评论它", "今天吃火锅"), "评论它\n帖子内容：今天吃火锅");
    }

    #[tokio::test]
    async fn diary_uses_history_and_filters() {
        let generator = FakeGenerator::reply("周末和朋友们一起去爬山，山顶的风景真的太美了");
        let chat = FakeChat::with_group(42, &["甲: 去爬山吗", "乙: 走起"]);
        let cfg = LlmConfig::default();

        let req = DiaryRequest {
            topic: Some("周末"),
            ..DiaryRequest::default()
        };
        let text = generate_diary(&generator, &chat, &cfg, &req).await.unwrap();
        assert!(text.starts_with("周末"));

        let (system, prompt) = generator.last_call().unwrap();
        assert!(system.starts_with("# 写作主题：周末"));
        assert!(prompt.contains("乙: 走起"));
    }

    #[tokio::test]
    async fn filtered_diary_is_an_error() {
        let generator = FakeGenerator::reply("哈哈哈");
        let chat = FakeChat::with_group(42, &["甲: 哈哈哈"]);
        let req = DiaryRequest {
            group_id: Some(42),
            ..DiaryRequest::default()
        };
        let res = generate_diary(&generator, &chat, &LlmConfig::default(), &req).await;
        assert!(matches!(res, Err(QzoneError::Filtered(_))));
    }

    #[tokio::test]
    async fn no_group_is_not_found() {
        let generator = FakeGenerator::reply("x");
        let chat = FakeChat::default();
        let cfg = LlmConfig::default();
        for multi_group in [false, true] {
            let req = DiaryRequest {
                multi_group,
                ..DiaryRequest::default()
            };
            let res = generate_diary(&generator, &chat, &cfg, &req).await;
            assert!(matches!(res, Err(QzoneError::NotFound(_))));
        }
    }

    #[test]
    fn styles_replace_base_prompt() {
        assert_eq!(DiaryStyle::parse("诗意"), Some(DiaryStyle::Poetic));
        assert_eq!(DiaryStyle::parse("认真"), None);
        assert_eq!(styled_base("基础", DiaryStyle::Default, false), "基础");
        assert!(styled_base("基础", DiaryStyle::Humorous, false).starts_with("请用幽默风趣"));
        let multi = styled_base("基础", DiaryStyle::Default, true);
        assert!(multi.starts_with("请综合多个群聊"));
        assert!(multi.ends_with("基础"));

        assert_eq!(ImageStyle::from(DiaryStyle::Poetic), ImageStyle::Artistic);
        assert_eq!(
            image_prompt(ImageStyle::Vibrant, "春游"),
            "生成一张色彩鲜艳、充满活力的图片。文本内容：春游"
        );
    }

    #[tokio::test]
    async fn multi_group_prefixes_and_skips_failures() {
        let generator = FakeGenerator::reply("周末和朋友们一起去爬山，山顶的风景真的太美了");
        let chat = FakeChat::with_group(1, &["甲: 去爬山吗"])
            .and_group(2, &["乙: 今晚吃火锅"])
            .and_failing(3);
        let req = DiaryRequest {
            style: DiaryStyle::Casual,
            multi_group: true,
            ..DiaryRequest::default()
        };
        generate_diary(&generator, &chat, &LlmConfig::default(), &req)
            .await
            .unwrap();

        let (system, prompt) = generator.last_call().unwrap();
        assert!(system.contains("轻松随意"));
        assert!(prompt.contains("【群1】甲: 去爬山吗"));
        assert!(prompt.contains("【群2】乙: 今晚吃火锅"));
    }

    #[tokio::test]
    async fn multi_group_caps_total_lines() {
        let generator = FakeGenerator::reply("周末和朋友们一起去爬山，山顶的风景真的太美了");
        let lines: Vec<String> = (0..10).map(|i| format!("甲: 消息{}", i)).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let chat = FakeChat::with_group(1, &refs)
            .and_group(2, &refs)
            .and_group(3, &refs);
        let cfg = LlmConfig {
            diary_max_msg: 4,
            ..LlmConfig::default()
        };
        let req = DiaryRequest {
            multi_group: true,
            ..DiaryRequest::default()
        };
        generate_diary(&generator, &chat, &cfg, &req).await.unwrap();

        let (_, prompt) = generator.last_call().unwrap();
        assert_eq!(prompt.matches("【群").count(), 8);
    }

    #[test]
    fn analysis_reply_is_validated() {
        let a = parse_analysis("情感分类：积极\n话题分类：[科技]");
        assert_eq!(a.sentiment, "积极");
        assert_eq!(a.topic, "科技");

        let a = parse_analysis("情感分类：开心\n随便说点什么");
        assert_eq!(a, Analysis::default());
        assert!(analysis_prompt("你好").ends_with("文本内容：你好"));
    }

    #[tokio::test]
    async fn illustrate_swallows_failures() {
        let painter = FakeGenerator::reply("x");
        assert_eq!(
            illustrate(&painter, ImageStyle::Default, "春游").await,
            vec![crate::plugins::qzone::testing::FAKE_IMAGE.to_string()]
        );
        assert!(painter.image_prompts()[0].ends_with("文本内容：春游"));

        painter.fail_images(true);
        assert!(illustrate(&painter, ImageStyle::Default, "春游").await.is_empty());
    }
}
