//! OneBot V11
//!
//! 语音/视频/文件/分享/位置无法与其它消息段同条发送；回复之后的图片需另起一条。
//! 启用 go-cqhttp 扩展时文件改用上传接口。

use super::{AdapterSpec, text_segment};
use crate::bot::{Delivery, Destination, Outgoing};
use crate::capability::Support;
use crate::render::{NativeSegment, RenderedMessage};
use crate::segment::{Content, Segment, SegmentKind};
use crate::target::{AdapterFamily, RenderingTarget, Specs};
use serde_json::{Map, Value};
use tracing::debug;

pub static SPEC: AdapterSpec = AdapterSpec {
    family: AdapterFamily::OneBotV11,
    name: "onebot.v11",
    capabilities: &[
        (SegmentKind::Text, Support::Full),
        (SegmentKind::Image, Support::Full),
        (SegmentKind::Mention, Support::Full),
        (SegmentKind::Reply, Support::Full),
        (SegmentKind::Face, Support::Full),
        (SegmentKind::Audio, Support::Full),
        (SegmentKind::Video, Support::Full),
        (
            SegmentKind::File,
            Support::Partial {
                requires: &["file_id"],
            },
        ),
        (SegmentKind::Share, Support::Full),
        (SegmentKind::Location, Support::Full),
    ],
    variants: &[(Specs::OB11_GOCQHTTP, &[(SegmentKind::File, Support::Full)])],
    labels: &[],
    merge_fallback: true,
    inline_media: false,
    construct,
    text: text_segment,
    plan,
};

/// 必须单独成条的原生类型
const STANDALONE: [&str; 5] = ["record", "video", "file", "share", "location"];

fn construct(segment: &Segment, target: &RenderingTarget) -> Option<NativeSegment> {
    let native = match segment.content() {
        Content::Text(text) => text_segment(text),
        Content::Image(source) => NativeSegment::new("image").with("file", source.to_uri()),
        Content::Mention { user_id } => NativeSegment::new("at").with("qq", id_value(user_id)),
        Content::Reply { message_id } => NativeSegment::new("reply").with("id", id_value(message_id)),
        Content::Face { id } => NativeSegment::new("face").with("id", id_value(id)),
        Content::Audio(source) => NativeSegment::new("record").with("file", source.to_uri()),
        Content::Video(source) => NativeSegment::new("video").with("file", source.to_uri()),
        Content::File { source, name } => {
            let file = match source.local_path() {
                // 上传接口只接受实现端可访问的本地路径，URL 与内存缓冲降级为后备文本
                Some(path) if target.specs.contains(Specs::OB11_GOCQHTTP) => {
                    let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
                    Value::from(path.display().to_string())
                }
                _ => segment.extra().get("file_id")?.clone(),
            };
            NativeSegment::new("file")
                .with("file", file)
                .with("name", name.as_str())
        }
        Content::Share {
            url,
            title,
            description,
            image,
        } => NativeSegment::new("share")
            .with("url", url.as_str())
            .with("title", title.as_str())
            .with_opt("content", description.as_deref())
            .with_opt("image", image.as_deref()),
        Content::Location {
            lat,
            lon,
            title,
            content,
        } => NativeSegment::new("location")
            .with("lat", *lat)
            .with("lon", *lon)
            .with_opt("title", title.as_deref())
            .with_opt("content", content.as_deref()),
    };
    Some(native)
}

/// 纯数字 ID 按整数发送
fn id_value(id: &str) -> Value {
    id.parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(id))
}

fn plan(rendered: &RenderedMessage, destination: &Destination) -> Vec<Delivery> {
    let gocq = rendered.target.specs.contains(Specs::OB11_GOCQHTTP);
    let mut deliveries = Vec::new();
    let mut pending = Pending::default();

    for (index, segment) in rendered.iter().enumerate() {
        let native = &segment.native;
        if STANDALONE.contains(&native.type_.as_str()) {
            if !pending.is_empty() {
                debug!("{} 类型无法与其它消息段同条发送，先发送已有内容", native.type_);
            }
            pending.flush_into(&mut deliveries);
            let outgoing = match upload_file(native, destination) {
                Some(action) if gocq => action,
                _ => Outgoing::message(vec![native.clone()]),
            };
            deliveries.push(Delivery { index, outgoing });
            continue;
        }

        if native.type_ == "image" && pending.has_reply() {
            debug!("图片与回复无法在同一条内发送，拆分为两条");
            pending.flush_into(&mut deliveries);
        }
        pending.push(index, native.clone());
    }
    pending.flush_into(&mut deliveries);
    deliveries
}

/// go-cqhttp 文件上传动作
fn upload_file(native: &NativeSegment, destination: &Destination) -> Option<Outgoing> {
    if native.type_ != "file" {
        return None;
    }
    let mut params = Map::new();
    let action = match destination {
        Destination::Group { group_id } => {
            params.insert("group_id".to_string(), id_value(group_id));
            "upload_group_file"
        }
        Destination::Private { user_id } => {
            params.insert("user_id".to_string(), id_value(user_id));
            "upload_private_file"
        }
        Destination::Channel { .. } => return None,
    };
    params.insert("file".to_string(), native.data.get("file")?.clone());
    params.insert("name".to_string(), native.data.get("name")?.clone());
    Some(Outgoing::action(action, params))
}

/// 待发送的消息
#[derive(Default)]
struct Pending {
    start: usize,
    segments: Vec<NativeSegment>,
}

impl Pending {
    fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn has_reply(&self) -> bool {
        self.segments.iter().any(|s| s.type_ == "reply")
    }

    fn push(&mut self, index: usize, native: NativeSegment) {
        if self.segments.is_empty() {
            self.start = index;
        }
        self.segments.push(native);
    }

    fn flush_into(&mut self, deliveries: &mut Vec<Delivery>) {
        if self.segments.is_empty() {
            return;
        }
        deliveries.push(Delivery {
            index: self.start,
            outgoing: Outgoing::message(std::mem::take(&mut self.segments)),
        });
    }
}
