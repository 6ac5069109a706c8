//! Telegram
//!
//! 文本与提及组成一条消息，媒体/位置/贴纸各自单独发送；
//! 回复以 `reply_to_message_id` 参数附加在第一次投递上；只有回复时发送 `[回复]` 文本。

use super::{AdapterSpec, text_segment};
use crate::bot::{Delivery, Destination, Outgoing};
use crate::capability::{Support, default_label};
use crate::render::{NativeSegment, RenderedMessage};
use crate::segment::{Content, Segment, SegmentKind};
use crate::target::{AdapterFamily, RenderingTarget};
use serde_json::Value;

pub static SPEC: AdapterSpec = AdapterSpec {
    family: AdapterFamily::Telegram,
    name: "telegram",
    capabilities: &[
        (SegmentKind::Text, Support::Full),
        (SegmentKind::Image, Support::Full),
        (
            SegmentKind::Mention,
            Support::Partial {
                requires: &["username"],
            },
        ),
        (SegmentKind::Reply, Support::Full),
        (
            SegmentKind::Face,
            Support::Partial {
                requires: &["sticker"],
            },
        ),
        (SegmentKind::Audio, Support::Full),
        (SegmentKind::Video, Support::Full),
        (SegmentKind::File, Support::Full),
        (SegmentKind::Location, Support::Full),
    ],
    variants: &[],
    labels: &[(SegmentKind::Face, "[贴纸]")],
    merge_fallback: true,
    // Bot API 无法访问本地路径
    inline_media: true,
    construct,
    text: text_segment,
    plan,
};

const STANDALONE: [&str; 6] = ["photo", "voice", "video", "document", "location", "sticker"];

fn construct(segment: &Segment, _target: &RenderingTarget) -> Option<NativeSegment> {
    let native = match segment.content() {
        Content::Text(text) => text_segment(text),
        Content::Image(source) => NativeSegment::new("photo").with("file", source.to_uri()),
        Content::Audio(source) => NativeSegment::new("voice").with("file", source.to_uri()),
        Content::Video(source) => NativeSegment::new("video").with("file", source.to_uri()),
        Content::File { source, name } => NativeSegment::new("document")
            .with("file", source.to_uri())
            .with("filename", name.as_str()),
        Content::Mention { user_id } => {
            let username = segment.extra_str("username")?;
            NativeSegment::new("mention")
                .with("text", format!("@{}", username.trim_start_matches('@')))
                .with("user_id", user_id.as_str())
        }
        Content::Reply { message_id } => {
            NativeSegment::new("reply").with("message_id", message_id.as_str())
        }
        Content::Face { .. } => {
            let sticker = segment.extra().get("sticker")?.clone();
            NativeSegment::new("sticker").with("file", sticker)
        }
        Content::Location { lat, lon, .. } => NativeSegment::new("location")
            .with("latitude", *lat)
            .with("longitude", *lon),
        Content::Share { .. } => return None,
    };
    Some(native)
}

fn plan(rendered: &RenderedMessage, _destination: &Destination) -> Vec<Delivery> {
    let reply_to: Option<(usize, Value)> = rendered
        .natives()
        .enumerate()
        .find(|(_, native)| native.type_ == "reply")
        .and_then(|(index, native)| Some((index, native.data.get("message_id")?.clone())));

    let mut deliveries = Vec::new();
    let mut pending: Vec<NativeSegment> = Vec::new();
    let mut start = 0;
    for (index, segment) in rendered.iter().enumerate() {
        let native = &segment.native;
        if native.type_ == "reply" {
            continue;
        }
        if STANDALONE.contains(&native.type_.as_str()) {
            if !pending.is_empty() {
                deliveries.push(Delivery {
                    index: start,
                    outgoing: Outgoing::message(std::mem::take(&mut pending)),
                });
            }
            deliveries.push(Delivery {
                index,
                outgoing: Outgoing::message(vec![native.clone()]),
            });
            continue;
        }
        if pending.is_empty() {
            start = index;
        }
        pending.push(native.clone());
    }
    if !pending.is_empty() {
        deliveries.push(Delivery {
            index: start,
            outgoing: Outgoing::message(pending),
        });
    }

    // 只有回复时没有可附加的消息，以后备文本单独发出
    if let Some((index, _)) = reply_to
        && deliveries.is_empty()
    {
        deliveries.push(Delivery {
            index,
            outgoing: Outgoing::message(vec![text_segment(default_label(SegmentKind::Reply))]),
        });
    }
    if let Some((_, reply_to)) = reply_to
        && let Some(Delivery {
            outgoing: Outgoing::Message { params, .. },
            ..
        }) = deliveries.first_mut()
    {
        params.insert("reply_to_message_id".to_string(), reply_to);
    }
    deliveries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityTable;
    use crate::render::render_with;

    fn plan_for(segments: &[Segment]) -> Vec<Delivery> {
        let target = RenderingTarget::new(AdapterFamily::Telegram);
        let rendered = render_with(&CapabilityTable::default(), segments, &target);
        plan(&rendered, &Destination::private(1))
    }

    #[test]
    fn media_is_sent_on_its_own() {
        let deliveries = plan_for(&[
            Segment::reply(99).unwrap(),
            Segment::text("看这个"),
            Segment::image("https://example.com/a.png").unwrap(),
            Segment::text("怎么样"),
        ]);
        assert_eq!(deliveries.len(), 3);
        assert_eq!(deliveries[0].index, 1);
        assert_eq!(deliveries[1].index, 2);
        assert_eq!(deliveries[2].index, 3);

        let Outgoing::Message { segments, params } = &deliveries[0].outgoing else {
            panic!("expected message");
        };
        assert_eq!(segments[0].get_str("text"), Some("看这个"));
        assert_eq!(params["reply_to_message_id"], Value::from("99"));

        let Outgoing::Message { segments, params } = &deliveries[1].outgoing else {
            panic!("expected message");
        };
        assert_eq!(segments[0].type_, "photo");
        assert!(params.is_empty());
    }

    #[test]
    fn lone_reply_is_not_dropped() {
        let deliveries = plan_for(&[Segment::reply(77).unwrap()]);
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].index, 0);
        let Outgoing::Message { segments, params } = &deliveries[0].outgoing else {
            panic!("expected message");
        };
        assert_eq!(segments[0].get_str("text"), Some("[回复]"));
        assert_eq!(params["reply_to_message_id"], Value::from("77"));
    }

    #[test]
    fn sticker_needs_platform_data() {
        let deliveries = plan_for(&[Segment::face("smile").unwrap()]);
        let Outgoing::Message { segments, .. } = &deliveries[0].outgoing else {
            panic!("expected message");
        };
        assert_eq!(segments[0].get_str("text"), Some("[贴纸]"));

        let deliveries = plan_for(&[Segment::face("smile").unwrap().with_extra("sticker", "CAADAg")]);
        let Outgoing::Message { segments, .. } = &deliveries[0].outgoing else {
            panic!("expected message");
        };
        assert_eq!(segments[0].type_, "sticker");
    }

    #[test]
    fn share_falls_back_to_text() {
        let deliveries = plan_for(&[
            Segment::share("https://example.com/p", "文章", None, None).unwrap(),
        ]);
        let Outgoing::Message { segments, .. } = &deliveries[0].outgoing else {
            panic!("expected message");
        };
        assert_eq!(
            segments[0].get_str("text"),
            Some("[分享] 《文章》 https://example.com/p")
        );
    }
}
