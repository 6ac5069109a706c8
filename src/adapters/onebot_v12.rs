//! OneBot V12
//!
//! 媒体类消息段只能引用已上传的文件 (`file_id`)，整条消息一次发送。

use super::{AdapterSpec, plan_single_message, text_segment};
use crate::capability::Support;
use crate::render::NativeSegment;
use crate::segment::{Content, Segment, SegmentKind};
use crate::target::{AdapterFamily, RenderingTarget, Specs};

const FILE_ID: Support = Support::Partial {
    requires: &["file_id"],
};

pub static SPEC: AdapterSpec = AdapterSpec {
    family: AdapterFamily::OneBotV12,
    name: "onebot.v12",
    capabilities: &[
        (SegmentKind::Text, Support::Full),
        (SegmentKind::Image, FILE_ID),
        (SegmentKind::Mention, Support::Full),
        (SegmentKind::Reply, Support::Full),
        (SegmentKind::Audio, FILE_ID),
        (SegmentKind::Video, FILE_ID),
        (SegmentKind::File, FILE_ID),
        (SegmentKind::Location, Support::Full),
    ],
    // QQ 平台扩展了表情
    variants: &[(Specs::PLATFORM_QQ, &[(SegmentKind::Face, Support::Full)])],
    labels: &[],
    merge_fallback: true,
    inline_media: false,
    construct,
    text: text_segment,
    plan: plan_single_message,
};

fn construct(segment: &Segment, _target: &RenderingTarget) -> Option<NativeSegment> {
    let native = match segment.content() {
        Content::Text(text) => text_segment(text),
        Content::Mention { user_id } => NativeSegment::new("mention").with("user_id", user_id.as_str()),
        Content::Reply { message_id } => {
            NativeSegment::new("reply").with("message_id", message_id.as_str())
        }
        Content::Face { id } => NativeSegment::new("face").with("id", id.as_str()),
        Content::Image(_) => file_segment("image", segment)?,
        Content::Audio(_) => file_segment("voice", segment)?,
        Content::Video(_) => file_segment("video", segment)?,
        Content::File { .. } => file_segment("file", segment)?,
        Content::Location {
            lat,
            lon,
            title,
            content,
        } => NativeSegment::new("location")
            .with("latitude", *lat)
            .with("longitude", *lon)
            .with("title", title.clone().unwrap_or_default())
            .with("content", content.clone().unwrap_or_default()),
        Content::Share { .. } => return None,
    };
    Some(native)
}

fn file_segment(type_: &str, segment: &Segment) -> Option<NativeSegment> {
    let file_id = segment.extra().get("file_id")?.clone();
    Some(NativeSegment::new(type_).with("file_id", file_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::{Destination, Outgoing};
    use crate::capability::CapabilityTable;
    use crate::render::{Fidelity, render_with};

    #[test]
    fn media_with_file_id_is_degraded_native() {
        let target = RenderingTarget::new(AdapterFamily::OneBotV12);
        let segments = vec![
            Segment::image("https://example.com/a.png")
                .unwrap()
                .with_extra("file_id", "f-1"),
            Segment::mention("alice").unwrap(),
        ];
        let rendered = render_with(&CapabilityTable::default(), &segments, &target);
        assert_eq!(rendered.segments[0].fidelity, Fidelity::Degraded);
        assert_eq!(rendered.segments[0].native.get_str("file_id"), Some("f-1"));
        assert_eq!(rendered.segments[1].native.get_str("user_id"), Some("alice"));

        let deliveries = plan_single_message(&rendered, &Destination::group("g"));
        assert_eq!(deliveries.len(), 1);
        let Outgoing::Message { segments, .. } = &deliveries[0].outgoing else {
            panic!("expected message");
        };
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn location_fills_required_fields() {
        let target = RenderingTarget::new(AdapterFamily::OneBotV12);
        let native = construct(&Segment::location(1.0, 2.0, None, None).unwrap(), &target).unwrap();
        assert_eq!(native.get_str("title"), Some(""));
        assert_eq!(native.get_str("content"), Some(""));
    }
}
