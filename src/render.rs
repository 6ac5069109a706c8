//! 渲染器
//!
//! 把平台无关的消息段序列按能力表映射为目标适配器的原生消息段序列。
//! 渲染是纯函数：不做 I/O，对任何合法输入都不会失败，最坏情况是全部降级为后备文本。

use crate::adapters::AdapterSpec;
use crate::capability::{CapabilityTable, Support};
use crate::segment::{ByteSource, Content, Segment};
use crate::target::RenderingTarget;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::Range;
use tracing::{debug, warn};

/// 原生消息段描述 (`{"type": ..., "data": {...}}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeSegment {
    #[serde(rename = "type")]
    pub type_: String,
    pub data: Map<String, Value>,
}

impl NativeSegment {
    pub fn new(type_: impl Into<String>) -> Self {
        Self {
            type_: type_.into(),
            data: Map::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// 仅在有值时写入
    pub fn with_opt(self, key: impl Into<String>, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(value) => self.with(key, value),
            None => self,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

/// 保真度标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fidelity {
    /// 原样渲染
    Full,
    /// 部分支持，借助平台数据渲染
    Degraded,
    /// 后备文本
    Fallback,
}

/// 渲染结果中的单个原生消息段
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedSegment {
    pub native: NativeSegment,
    pub fidelity: Fidelity,
    /// 来源消息段的下标范围，合并后的后备文本可能覆盖多个消息段
    pub sources: Range<usize>,
    /// 需要在投递前解析的资源
    #[serde(skip)]
    pub media: Option<ByteSource>,
}

/// 渲染结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedMessage {
    pub target: RenderingTarget,
    pub segments: Vec<RenderedSegment>,
}

impl RenderedMessage {
    pub fn iter(&self) -> std::slice::Iter<'_, RenderedSegment> {
        self.segments.iter()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn natives(&self) -> impl Iterator<Item = &NativeSegment> {
        self.segments.iter().map(|s| &s.native)
    }

    /// 是否没有任何保真度损失
    pub fn is_lossless(&self) -> bool {
        self.segments.iter().all(|s| s.fidelity == Fidelity::Full)
    }
}

impl<'a> IntoIterator for &'a RenderedMessage {
    type Item = &'a RenderedSegment;
    type IntoIter = std::slice::Iter<'a, RenderedSegment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

/// 使用全局能力表渲染
pub fn render(segments: &[Segment], target: &RenderingTarget) -> RenderedMessage {
    render_with(CapabilityTable::global(), segments, target)
}

/// 使用指定能力表渲染
pub fn render_with(
    table: &CapabilityTable,
    segments: &[Segment],
    target: &RenderingTarget,
) -> RenderedMessage {
    let adapter = table.adapter(target.family);
    let drafts = segments
        .iter()
        .enumerate()
        .map(|(index, segment)| draft(table, adapter, segment, target, index))
        .collect();

    let rendered = RenderedMessage {
        target: *target,
        segments: assemble(adapter, drafts, table.merges_fallback(target.family)),
    };
    debug!(
        "渲染完成: 目标 {} | {} 个消息段 -> {} 个原生消息段",
        target,
        segments.len(),
        rendered.len()
    );
    rendered
}

enum Body {
    Native(NativeSegment),
    /// 纯文本 (原文或后备文本)，可参与合并
    Text(String),
}

struct Draft {
    body: Body,
    fidelity: Fidelity,
    index: usize,
    media: Option<ByteSource>,
}

fn draft(
    table: &CapabilityTable,
    adapter: &AdapterSpec,
    segment: &Segment,
    target: &RenderingTarget,
    index: usize,
) -> Draft {
    let kind = segment.kind();
    let entry = table.lookup(target, kind);

    let fidelity = match entry.support {
        Support::Full => Some(Fidelity::Full),
        Support::Partial { requires } if segment.has_extra(requires) => Some(Fidelity::Degraded),
        Support::Partial { requires } => {
            warn!(
                "消息段 #{index} ({kind}) 在 {target} 上缺少平台数据 {:?}，降级为后备文本",
                requires
            );
            None
        }
        Support::Unsupported => {
            debug!("消息段 #{index} ({kind}) 在 {target} 上不受支持，使用后备文本");
            None
        }
    };

    if let Some(fidelity) = fidelity {
        if let Content::Text(text) = segment.content() {
            return Draft {
                body: Body::Text(text.clone()),
                fidelity,
                index,
                media: None,
            };
        }
        match (adapter.construct)(segment, target) {
            Some(native) => {
                return Draft {
                    body: Body::Native(native),
                    fidelity,
                    index,
                    media: segment.source().cloned(),
                };
            }
            None => warn!("适配器 {} 无法构造消息段 #{index} ({kind})，降级为后备文本", adapter.name),
        }
    }

    Draft {
        body: Body::Text(entry.fallback_text(segment)),
        fidelity: Fidelity::Fallback,
        index,
        media: None,
    }
}

/// 合并规则：相邻的文本 (原文或后备文本) 组成一段，段内只要有后备文本，
/// 就按顺序直接拼接为一个后备文本消息段；纯原文段保持不变。
fn assemble(adapter: &AdapterSpec, drafts: Vec<Draft>, merge: bool) -> Vec<RenderedSegment> {
    let mut out = Vec::with_capacity(drafts.len());
    let mut run = Vec::new();

    for draft in drafts {
        if merge && matches!(draft.body, Body::Text(_)) {
            run.push(draft);
        } else {
            flush_run(adapter, &mut run, &mut out);
            out.push(finish(adapter, draft));
        }
    }
    flush_run(adapter, &mut run, &mut out);
    out
}

fn flush_run(adapter: &AdapterSpec, run: &mut Vec<Draft>, out: &mut Vec<RenderedSegment>) {
    let (Some(first), Some(last)) = (run.first(), run.last()) else {
        return;
    };
    if !run.iter().any(|d| d.fidelity == Fidelity::Fallback) {
        out.extend(run.drain(..).map(|d| finish(adapter, d)));
        return;
    }

    let sources = first.index..last.index + 1;
    let text: String = run
        .drain(..)
        .filter_map(|d| match d.body {
            Body::Text(text) => Some(text),
            Body::Native(_) => None,
        })
        .collect();
    out.push(RenderedSegment {
        native: (adapter.text)(&text),
        fidelity: Fidelity::Fallback,
        sources,
        media: None,
    });
}

fn finish(adapter: &AdapterSpec, draft: Draft) -> RenderedSegment {
    let native = match draft.body {
        Body::Native(native) => native,
        Body::Text(text) => (adapter.text)(&text),
    };
    RenderedSegment {
        native,
        fidelity: draft.fidelity,
        sources: draft.index..draft.index + 1,
        media: draft.media,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{AdapterFamily, Specs};

    fn render_default(segments: &[Segment], target: RenderingTarget) -> RenderedMessage {
        render_with(&CapabilityTable::default(), segments, &target)
    }

    fn image_then_text() -> Vec<Segment> {
        vec![
            Segment::image("/tmp/cat.png").unwrap(),
            Segment::text("Hello world!"),
        ]
    }

    #[test]
    fn onebot_v11_renders_image_and_text_natively() {
        let rendered = render_default(&image_then_text(), RenderingTarget::new(AdapterFamily::OneBotV11));
        assert_eq!(rendered.len(), 2);
        assert!(rendered.is_lossless());
        assert_eq!(rendered.segments[0].native.type_, "image");
        assert_eq!(rendered.segments[0].native.get_str("file"), Some("file:///tmp/cat.png"));
        assert_eq!(rendered.segments[1].native.get_str("text"), Some("Hello world!"));
        assert_eq!(rendered.segments[1].sources, 1..2);
    }

    #[test]
    fn unsupported_image_merges_into_text() {
        let rendered = render_default(&image_then_text(), RenderingTarget::new(AdapterFamily::PlainText));
        assert_eq!(rendered.len(), 1);
        let only = &rendered.segments[0];
        assert_eq!(only.fidelity, Fidelity::Fallback);
        assert_eq!(only.native.type_, "text");
        assert_eq!(only.native.get_str("text"), Some("[图片]Hello world!"));
        assert_eq!(only.sources, 0..2);
    }

    #[test]
    fn pure_text_runs_are_not_merged() {
        let segments = vec![Segment::text("a"), Segment::text("b")];
        let rendered = render_default(&segments, RenderingTarget::new(AdapterFamily::PlainText));
        assert_eq!(rendered.len(), 2);
        assert!(rendered.is_lossless());
    }

    #[test]
    fn merging_can_be_disabled() {
        let table = CapabilityTable::default().with_merge_fallback(false);
        let rendered = render_with(
            &table,
            &image_then_text(),
            &RenderingTarget::new(AdapterFamily::PlainText),
        );
        assert_eq!(rendered.len(), 2);
        assert_eq!(rendered.segments[0].native.get_str("text"), Some("[图片]"));
        assert_eq!(rendered.segments[0].fidelity, Fidelity::Fallback);
        assert_eq!(rendered.segments[1].fidelity, Fidelity::Full);
    }

    #[test]
    fn partial_mention_needs_platform_data() {
        let target = RenderingTarget::new(AdapterFamily::Telegram);

        let bare = vec![Segment::mention(10001).unwrap()];
        let rendered = render_default(&bare, target);
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered.segments[0].fidelity, Fidelity::Fallback);
        assert_eq!(rendered.segments[0].native.get_str("text"), Some("@10001 "));

        let with_data = vec![Segment::mention(10001).unwrap().with_extra("username", "alice")];
        let rendered = render_default(&with_data, target);
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered.segments[0].fidelity, Fidelity::Degraded);
        assert_eq!(rendered.segments[0].native.type_, "mention");
        assert_eq!(rendered.segments[0].native.get_str("text"), Some("@alice"));
    }

    #[test]
    fn full_rendering_keeps_payload() {
        let target = RenderingTarget::new(AdapterFamily::OneBotV11);
        let segments = vec![
            Segment::share("https://example.com/post", "标题", Some("摘要"), None).unwrap(),
            Segment::location(39.9, 116.4, Some("北京"), None).unwrap(),
        ];
        let rendered = render_default(&segments, target);
        let share = &rendered.segments[0].native;
        assert_eq!(share.get_str("url"), Some("https://example.com/post"));
        assert_eq!(share.get_str("title"), Some("标题"));
        assert_eq!(share.get_str("content"), Some("摘要"));
        assert!(!share.data.contains_key("image"));
        let location = &rendered.segments[1].native;
        assert_eq!(location.data["lat"], Value::from(39.9));
        assert_eq!(location.data["lon"], Value::from(116.4));
        assert_eq!(location.get_str("title"), Some("北京"));
    }

    #[test]
    fn rendering_is_idempotent_and_order_preserving() {
        let target = RenderingTarget::new(AdapterFamily::OneBotV12).with_specs(Specs::PLATFORM_QQ);
        let segments = vec![
            Segment::text("前"),
            Segment::image("https://example.com/a.png").unwrap(),
            Segment::face(14).unwrap(),
            Segment::share("https://example.com", "链接", None, None).unwrap(),
            Segment::mention("u1").unwrap(),
            Segment::text("后"),
        ];
        let table = CapabilityTable::default();
        let first = render_with(&table, &segments, &target);
        let second = render_with(&table, &segments, &target);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );

        // 下标范围首尾相接且单调递增
        let mut next = 0;
        for segment in &first {
            assert_eq!(segment.sources.start, next);
            assert!(segment.sources.end > segment.sources.start);
            next = segment.sources.end;
        }
        assert_eq!(next, segments.len());
    }

    #[test]
    fn empty_input_renders_nothing() {
        let rendered = render_default(&[], RenderingTarget::new(AdapterFamily::OneBotV11));
        assert!(rendered.is_empty());
    }
}
