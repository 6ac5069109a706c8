use crate::error::AdapterResult;
use crate::segment::ByteSource;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// 延迟资源解析器，把路径/URL/内存缓冲读取为字节
#[async_trait]
pub trait SourceResolver: Send + Sync {
    async fn resolve(&self, source: &ByteSource) -> AdapterResult<Vec<u8>>;
}

/// 默认解析器：本地文件用 `tokio::fs` 读取，URL 用 `reqwest` 下载
#[derive(Debug, Clone)]
pub struct DefaultResolver {
    client: reqwest::Client,
}

impl DefaultResolver {
    pub fn new() -> AdapterResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for DefaultResolver {
    fn default() -> Self {
        Self::with_client(reqwest::Client::new())
    }
}

#[async_trait]
impl SourceResolver for DefaultResolver {
    async fn resolve(&self, source: &ByteSource) -> AdapterResult<Vec<u8>> {
        match source {
            ByteSource::Path(path) => {
                debug!("读取本地资源: {}", path.display());
                Ok(tokio::fs::read(path).await?)
            }
            ByteSource::Url(url) => {
                debug!("下载资源: {}", url);
                let resp = self.client.get(url.as_str()).send().await?;
                let resp = resp.error_for_status()?;
                Ok(resp.bytes().await?.to_vec())
            }
            ByteSource::Buffer(bytes) => Ok(bytes.to_vec()),
        }
    }
}
