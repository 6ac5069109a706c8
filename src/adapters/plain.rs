//! 纯文本
//!
//! 没有注册能力表的适配器按此处理：除文本外全部使用后备文本，整条消息一次发送。

use super::{AdapterSpec, plan_single_message, text_segment};
use crate::capability::Support;
use crate::render::NativeSegment;
use crate::segment::{Content, Segment, SegmentKind};
use crate::target::{AdapterFamily, RenderingTarget};

pub static SPEC: AdapterSpec = AdapterSpec {
    family: AdapterFamily::PlainText,
    name: "plain",
    capabilities: &[(SegmentKind::Text, Support::Full)],
    variants: &[],
    labels: &[],
    merge_fallback: true,
    inline_media: false,
    construct,
    text: text_segment,
    plan: plan_single_message,
};

fn construct(segment: &Segment, _target: &RenderingTarget) -> Option<NativeSegment> {
    match segment.content() {
        Content::Text(text) => Some(text_segment(text)),
        _ => None,
    }
}
