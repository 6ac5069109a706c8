use crate::bot::{Delivery, Destination, Outgoing};
use crate::capability::Support;
use crate::render::{NativeSegment, RenderedMessage};
use crate::segment::{Segment, SegmentKind};
use crate::target::{AdapterFamily, RenderingTarget, Specs};
use serde_json::Map;
use std::sync::OnceLock;

pub mod onebot_v11;
pub mod onebot_v12;
pub mod plain;
pub mod telegram;

/// 原生消息段构造函数，返回 `None` 表示缺少必要数据，由渲染器降级为后备文本
pub type ConstructFn = fn(&Segment, &RenderingTarget) -> Option<NativeSegment>;

/// 纯文本原生消息段构造函数
pub type TextFn = fn(&str) -> NativeSegment;

/// 投递计划函数：把渲染结果按协议限制分组为若干次投递
pub type PlanFn = fn(&RenderedMessage, &Destination) -> Vec<Delivery>;

/// 适配器声明
///
/// 每个适配器家族以固定形状注册自己的能力行、扩展行、后备文本覆盖以及构造/投递函数，
/// 渲染器只通过这组数据与适配器交互。
pub struct AdapterSpec {
    pub family: AdapterFamily,
    /// 适配器名称 (如 "onebot.v11")
    pub name: &'static str,
    /// 基础能力行，未列出的类型视为不支持
    pub capabilities: &'static [(SegmentKind, Support)],
    /// 扩展行：目标包含对应标记时覆盖基础行
    pub variants: &'static [(Specs, &'static [(SegmentKind, Support)])],
    /// 后备文本覆盖
    pub labels: &'static [(SegmentKind, &'static str)],
    /// 是否合并相邻的后备文本
    pub merge_fallback: bool,
    /// 是否需要在投递前把本地资源内联为 base64
    pub inline_media: bool,
    pub construct: ConstructFn,
    pub text: TextFn,
    pub plan: PlanFn,
}

static ADAPTERS: OnceLock<Vec<&'static AdapterSpec>> = OnceLock::new();

/// 获取所有内置适配器
pub fn get_adapters() -> &'static [&'static AdapterSpec] {
    ADAPTERS.get_or_init(|| {
        vec![
            &onebot_v11::SPEC,
            &onebot_v12::SPEC,
            &telegram::SPEC,
            // 纯文本 (未注册适配器的兜底)
            &plain::SPEC,
        ]
    })
}

/// 根据名称查找适配器
pub fn find_adapter(name: &str) -> Option<&'static AdapterSpec> {
    get_adapters().iter().copied().find(|a| a.name == name)
}

/// 所有消息段合并为一条消息投递
pub fn plan_single_message(rendered: &RenderedMessage, _destination: &Destination) -> Vec<Delivery> {
    if rendered.is_empty() {
        return Vec::new();
    }
    vec![Delivery {
        index: 0,
        outgoing: Outgoing::Message {
            segments: rendered.natives().cloned().collect(),
            params: Map::new(),
        },
    }]
}

/// 以 `type` + `data.text` 构造文本消息段，各协议通用
pub(crate) fn text_segment(text: &str) -> NativeSegment {
    NativeSegment::new("text").with("text", text)
}
