//! 能力表 (CapabilityTable)
//!
//! 以 (渲染目标, 消息段类型) 为索引的静态表，描述每种消息段在目标适配器上的支持程度
//! 以及降级时使用的后备文本模板。表在启动时构造一次，之后只读。

use crate::adapters::{self, AdapterSpec};
use crate::segment::{Segment, SegmentKind};
use crate::target::{AdapterFamily, RenderingTarget, Specs};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// 支持程度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Support {
    /// 渲染为语义一致的原生消息段
    Full,
    /// 仅当调用方在构造时附带了 `requires` 中的全部平台数据才渲染为原生消息段
    Partial { requires: &'static [&'static str] },
    /// 总是渲染为后备文本
    Unsupported,
}

/// 单个 (渲染目标, 类型) 的能力条目
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityEntry<'a> {
    pub support: Support,
    /// 后备文本模板，`{field}` 从消息段载荷中取值
    pub fallback: &'a str,
}

impl CapabilityEntry<'_> {
    /// 按模板生成后备文本，未知占位符原样保留
    pub fn fallback_text(&self, segment: &Segment) -> String {
        placeholder_regex()
            .replace_all(self.fallback, |caps: &Captures| {
                segment
                    .field(&caps[1])
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();

fn placeholder_regex() -> &'static Regex {
    PLACEHOLDER_REGEX.get_or_init(|| Regex::new(r"\{(\w+)\}").expect("Invalid Regex"))
}

/// 默认后备文本
pub fn default_label(kind: SegmentKind) -> &'static str {
    match kind {
        SegmentKind::Text => "{text}",
        SegmentKind::Image => "[图片]",
        SegmentKind::Mention => "@{user_id} ",
        SegmentKind::Reply => "[回复]",
        SegmentKind::Face => "[表情]",
        SegmentKind::Audio => "[语音]",
        SegmentKind::Video => "[视频]",
        SegmentKind::File => "[文件]",
        SegmentKind::Share => "[分享] 《{title}》 {url}",
        SegmentKind::Location => "[纬度：{lat}，经度：{lon}]",
    }
}

/// 单个适配器家族的行集
struct FamilyRows {
    adapter: &'static AdapterSpec,
    base: HashMap<SegmentKind, Support>,
    variants: Vec<(Specs, HashMap<SegmentKind, Support>)>,
    labels: HashMap<SegmentKind, &'static str>,
    merge_fallback: bool,
}

impl FamilyRows {
    fn from_spec(adapter: &'static AdapterSpec) -> Self {
        Self {
            adapter,
            base: adapter.capabilities.iter().copied().collect(),
            variants: adapter
                .variants
                .iter()
                .map(|(specs, rows)| (*specs, rows.iter().copied().collect()))
                .collect(),
            labels: adapter.labels.iter().copied().collect(),
            merge_fallback: adapter.merge_fallback,
        }
    }
}

/// 能力表
pub struct CapabilityTable {
    families: HashMap<AdapterFamily, FamilyRows>,
    /// 全局后备文本覆盖 (来自配置)，优先于适配器自带的文本
    labels: HashMap<SegmentKind, String>,
}

static TABLE: OnceLock<CapabilityTable> = OnceLock::new();

impl CapabilityTable {
    /// 由一组适配器的能力声明构造
    pub fn from_adapters<'a, I>(specs: I) -> Self
    where
        I: IntoIterator<Item = &'a &'static AdapterSpec>,
    {
        let families = specs
            .into_iter()
            .map(|spec| (spec.family, FamilyRows::from_spec(*spec)))
            .collect();
        Self {
            families,
            labels: HashMap::new(),
        }
    }

    /// 覆盖后备文本模板
    pub fn with_labels(mut self, labels: HashMap<SegmentKind, String>) -> Self {
        self.labels.extend(labels);
        self
    }

    /// 统一开启或关闭后备文本合并
    pub fn with_merge_fallback(mut self, merge: bool) -> Self {
        for rows in self.families.values_mut() {
            rows.merge_fallback = merge;
        }
        self
    }

    /// 全局能力表，未安装时使用内置适配器构造
    pub fn global() -> &'static CapabilityTable {
        TABLE.get_or_init(CapabilityTable::default)
    }

    /// 安装全局能力表，只能成功一次；已安装时原样返回传入的表
    pub fn install(table: CapabilityTable) -> Result<&'static CapabilityTable, CapabilityTable> {
        TABLE.set(table)?;
        Ok(Self::global())
    }

    /// 查询能力条目，对任意 (目标, 类型) 均有结果：
    /// 基础行 → 按标记叠加扩展行 → 缺省为不支持
    pub fn lookup(&self, target: &RenderingTarget, kind: SegmentKind) -> CapabilityEntry<'_> {
        let rows = self.families.get(&target.family);

        let mut support = rows
            .and_then(|rows| rows.base.get(&kind).copied())
            .unwrap_or(Support::Unsupported);
        if let Some(rows) = rows {
            for (flags, overlay) in &rows.variants {
                if !flags.is_empty()
                    && target.specs.contains(*flags)
                    && let Some(upgraded) = overlay.get(&kind)
                {
                    support = *upgraded;
                }
            }
        }

        CapabilityEntry {
            support,
            fallback: self.label(rows, kind),
        }
    }

    fn label(&self, rows: Option<&FamilyRows>, kind: SegmentKind) -> &str {
        if let Some(label) = self.labels.get(&kind) {
            return label;
        }
        rows.and_then(|rows| rows.labels.get(&kind).copied())
            .unwrap_or_else(|| default_label(kind))
    }

    /// 目标家族的适配器声明，未注册的家族按纯文本处理
    pub fn adapter(&self, family: AdapterFamily) -> &'static AdapterSpec {
        self.families
            .get(&family)
            .map(|rows| rows.adapter)
            .unwrap_or(&adapters::plain::SPEC)
    }

    pub fn merges_fallback(&self, family: AdapterFamily) -> bool {
        self.families
            .get(&family)
            .map_or(adapters::plain::SPEC.merge_fallback, |rows| rows.merge_fallback)
    }

    pub fn families(&self) -> impl Iterator<Item = AdapterFamily> + '_ {
        self.families.keys().copied()
    }
}

impl fmt::Debug for CapabilityTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut families: Vec<&str> = self.families.values().map(|rows| rows.adapter.name).collect();
        families.sort_unstable();
        f.debug_struct("CapabilityTable")
            .field("families", &families)
            .field("labels", &self.labels)
            .finish()
    }
}

impl Default for CapabilityTable {
    fn default() -> Self {
        Self::from_adapters(adapters::get_adapters())
    }
}
