use crate::adapters::AdapterSpec;
use crate::bot::{Bot, Delivery, Destination, Receipt};
use crate::error::{MsgBufError, MsgBufResult};
use crate::render::RenderedMessage;
use crate::resolver::SourceResolver;
use crate::segment::ByteSource;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use tracing::{debug, info, warn};

/// 发送回执，按投递顺序排列
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SendReceipt {
    pub receipts: Vec<Receipt>,
}

impl SendReceipt {
    pub fn is_empty(&self) -> bool {
        self.receipts.is_empty()
    }

    pub fn message_ids(&self) -> impl Iterator<Item = &str> {
        self.receipts.iter().filter_map(|r| r.message_id.as_deref())
    }
}

pub type SendResult = MsgBufResult<SendReceipt>;

/// 把渲染结果交给适配器的投递原语，逐条顺序投递，不重试
pub struct Sender<'a> {
    bot: &'a dyn Bot,
    adapter: &'static AdapterSpec,
    resolver: &'a dyn SourceResolver,
}

impl<'a> Sender<'a> {
    pub fn new(bot: &'a dyn Bot, adapter: &'static AdapterSpec, resolver: &'a dyn SourceResolver) -> Self {
        Self {
            bot,
            adapter,
            resolver,
        }
    }

    /// 投递计划 (不发送)
    pub fn plan(&self, rendered: &RenderedMessage, destination: &Destination) -> Vec<Delivery> {
        (self.adapter.plan)(rendered, destination)
    }

    pub async fn send(&self, mut rendered: RenderedMessage, destination: &Destination) -> SendResult {
        if self.adapter.inline_media {
            self.inline_media(&mut rendered).await?;
        }

        let deliveries = self.plan(&rendered, destination);
        debug!(
            "[{}] {} 个原生消息段分为 {} 次投递",
            self.bot.id(),
            rendered.len(),
            deliveries.len()
        );

        let mut receipts = Vec::with_capacity(deliveries.len());
        for delivery in deliveries {
            match self.bot.deliver(destination, &delivery.outgoing).await {
                Ok(receipt) => receipts.push(receipt),
                Err(source) => {
                    warn!(
                        "[{}] 发送至 {} 失败 (第 {} 个原生消息段): {}",
                        self.bot.id(),
                        destination,
                        delivery.index,
                        source
                    );
                    return Err(MsgBufError::DeliveryFailure {
                        index: delivery.index,
                        source,
                    });
                }
            }
        }

        info!(
            "[{}] 消息已发送至 {} ({} 次投递)",
            self.bot.id(),
            destination,
            receipts.len()
        );
        Ok(SendReceipt { receipts })
    }

    /// 本地文件读入内存并以 base64 内联
    async fn inline_media(&self, rendered: &mut RenderedMessage) -> MsgBufResult<()> {
        for (index, segment) in rendered.segments.iter_mut().enumerate() {
            let Some(source @ ByteSource::Path(_)) = &segment.media else {
                continue;
            };
            if !segment.native.data.contains_key("file") {
                continue;
            }
            let bytes = self
                .resolver
                .resolve(source)
                .await
                .map_err(|source| MsgBufError::DeliveryFailure { index, source })?;
            segment.native.data.insert(
                "file".to_string(),
                Value::from(format!("base64://{}", STANDARD.encode(bytes))),
            );
        }
        Ok(())
    }
}
