use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// 适配器家族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterFamily {
    OneBotV11,
    OneBotV12,
    Telegram,
    /// 未注册能力表的适配器，一律渲染为纯文本
    PlainText,
}

impl AdapterFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            AdapterFamily::OneBotV11 => "onebot.v11",
            AdapterFamily::OneBotV12 => "onebot.v12",
            AdapterFamily::Telegram => "telegram",
            AdapterFamily::PlainText => "plain",
        }
    }
}

impl fmt::Display for AdapterFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 特殊规则 (协议扩展标记)，可按位组合
///
/// ```
/// use msgbuf::Specs;
///
/// let specs = Specs::PLATFORM_QQ | Specs::OB11_GOCQHTTP;
/// assert!(specs.contains(Specs::OB11_GOCQHTTP));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Specs(u32);

impl Specs {
    pub const NONE: Specs = Specs(0);
    /// QQ 平台
    pub const PLATFORM_QQ: Specs = Specs(1);
    /// go-cqhttp 扩展 (文件上传等)
    pub const OB11_GOCQHTTP: Specs = Specs(1024);

    const NAMED: [(&'static str, Specs); 2] = [
        ("platform_qq", Specs::PLATFORM_QQ),
        ("ob11_gocqhttp", Specs::OB11_GOCQHTTP),
    ];

    pub const fn from_bits(bits: u32) -> Self {
        Specs(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Specs) -> bool {
        self.0 & other.0 == other.0
    }

    /// 按配置文件中的名称查找 (不区分大小写)
    pub fn from_name(name: &str) -> Option<Specs> {
        let name = name.trim().to_ascii_lowercase();
        Self::NAMED
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, specs)| *specs)
    }
}

impl BitOr for Specs {
    type Output = Specs;

    fn bitor(self, rhs: Specs) -> Specs {
        Specs(self.0 | rhs.0)
    }
}

impl BitOrAssign for Specs {
    fn bitor_assign(&mut self, rhs: Specs) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Specs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMED
            .iter()
            .filter(|(_, specs)| self.contains(*specs))
            .map(|(name, _)| *name)
            .collect();
        f.write_str(&names.join("+"))
    }
}

/// 渲染目标：适配器家族 + 协议扩展
///
/// 每次发送时从当前处理上下文解析一次。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderingTarget {
    pub family: AdapterFamily,
    pub specs: Specs,
}

impl RenderingTarget {
    pub fn new(family: AdapterFamily) -> Self {
        Self {
            family,
            specs: Specs::NONE,
        }
    }

    /// 叠加协议扩展
    pub fn with_specs(mut self, specs: Specs) -> Self {
        self.specs |= specs;
        self
    }
}

impl fmt::Display for RenderingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.specs.is_empty() {
            write!(f, "{}", self.family)
        } else {
            write!(f, "{}+{}", self.family, self.specs)
        }
    }
}
