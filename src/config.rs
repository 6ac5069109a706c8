use crate::buffer::MsgBuf;
use crate::capability::CapabilityTable;
use crate::segment::SegmentKind;
use crate::target::Specs;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读写配置文件失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("解析配置文件失败: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("序列化配置失败: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("配置项无效: {0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MsgBufConfig {
    // 作用域正常结束时是否自动发送
    #[serde(default = "default_true")]
    pub auto_send: bool,

    // 协议扩展 (如 ["ob11_gocqhttp"])
    #[serde(default)]
    pub specs: Vec<String>,

    // 是否合并相邻后备文本，不填则使用各适配器的默认值
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_fallback: Option<bool>,

    // 后备文本覆盖，键为消息段类型 (如 image = "[图]")
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

impl Default for MsgBufConfig {
    fn default() -> Self {
        Self {
            auto_send: true,
            specs: Vec::new(),
            merge_fallback: None,
            labels: BTreeMap::new(),
        }
    }
}

impl MsgBufConfig {
    /// 加载配置，如果文件不存在则创建默认配置
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !fs::try_exists(path).await? {
            let default_cfg = Self::default();
            default_cfg.save(path).await?;
            info!("已创建默认配置: {}", path.display());
            return Ok(default_cfg);
        }

        let content = fs::read_to_string(path).await?;
        Ok(toml::from_str(&content)?)
    }

    /// 写临时文件后重命名覆盖
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, content).await?;
        fs::rename(&tmp_path, path).await?;
        Ok(())
    }

    pub fn specs(&self) -> Result<Specs, ConfigError> {
        self.specs.iter().try_fold(Specs::NONE, |acc, name| {
            Specs::from_name(name)
                .map(|specs| acc | specs)
                .ok_or_else(|| ConfigError::Invalid(format!("未知的协议扩展: {name}")))
        })
    }

    pub fn labels(&self) -> Result<HashMap<SegmentKind, String>, ConfigError> {
        self.labels
            .iter()
            .map(|(kind, label)| {
                let kind = kind
                    .parse::<SegmentKind>()
                    .map_err(|e| ConfigError::Invalid(e.to_string()))?;
                Ok((kind, label.clone()))
            })
            .collect()
    }

    /// 按配置构造能力表，启动时交给 [`CapabilityTable::install`]
    pub fn build_table(&self) -> Result<CapabilityTable, ConfigError> {
        let mut table = CapabilityTable::default().with_labels(self.labels()?);
        if let Some(merge) = self.merge_fallback {
            table = table.with_merge_fallback(merge);
        }
        Ok(table)
    }

    /// 按配置创建消息缓冲
    pub fn msgbuf(&self) -> Result<MsgBuf, ConfigError> {
        Ok(MsgBuf::new()
            .auto_send(self.auto_send)
            .specs(self.specs()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{AdapterFamily, RenderingTarget};

    #[tokio::test]
    async fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("msgbuf.toml");

        let cfg = MsgBufConfig::load(&path).await.unwrap();
        assert_eq!(cfg, MsgBufConfig::default());
        assert!(path.exists());

        let reloaded = MsgBufConfig::load(&path).await.unwrap();
        assert_eq!(reloaded, cfg);
    }

    #[tokio::test]
    async fn parses_specs_and_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("msgbuf.toml");
        tokio::fs::write(
            &path,
            r#"
auto_send = false
specs = ["ob11_gocqhttp"]
merge_fallback = false

[labels]
image = "[图]"
"#,
        )
        .await
        .unwrap();

        let cfg = MsgBufConfig::load(&path).await.unwrap();
        assert!(!cfg.auto_send);
        assert_eq!(cfg.specs().unwrap(), Specs::OB11_GOCQHTTP);

        let table = cfg.build_table().unwrap();
        let plain = RenderingTarget::new(AdapterFamily::PlainText);
        assert_eq!(table.lookup(&plain, SegmentKind::Image).fallback, "[图]");
        assert!(!table.merges_fallback(AdapterFamily::PlainText));
    }

    #[test]
    fn unknown_names_are_rejected() {
        let cfg = MsgBufConfig {
            specs: vec!["napcat".to_string()],
            ..Default::default()
        };
        assert!(matches!(cfg.specs(), Err(ConfigError::Invalid(_))));

        let cfg = MsgBufConfig {
            labels: BTreeMap::from([("sticker".to_string(), "[贴纸]".to_string())]),
            ..Default::default()
        };
        assert!(matches!(cfg.build_table(), Err(ConfigError::Invalid(_))));
    }
}
