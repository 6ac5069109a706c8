use crate::bot::{Bot, Destination, Outgoing, Receipt};
use crate::error::AdapterResult;
use crate::target::AdapterFamily;
use async_trait::async_trait;
use chrono::Local;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

/// 把投递内容打印到标准输出的机器人，用于本地调试
pub struct ConsoleBot {
    id: String,
    family: AdapterFamily,
    msg_seq: AtomicU64,
}

impl ConsoleBot {
    pub fn new(family: AdapterFamily) -> Self {
        Self {
            id: format!("console-{}", family),
            family,
            msg_seq: AtomicU64::new(0),
        }
    }
}

impl Default for ConsoleBot {
    fn default() -> Self {
        Self::new(AdapterFamily::PlainText)
    }
}

#[async_trait]
impl Bot for ConsoleBot {
    fn id(&self) -> &str {
        &self.id
    }

    fn family(&self) -> AdapterFamily {
        self.family
    }

    async fn deliver(&self, destination: &Destination, outgoing: &Outgoing) -> AdapterResult<Receipt> {
        let seq = self.msg_seq.fetch_add(1, Ordering::Relaxed);
        let msg_id = format!("reply_{}", seq);
        let now = Local::now().format("%H:%M:%S");

        let body = match outgoing {
            Outgoing::Message { segments, params } => {
                let mut body = serde_json::to_string(segments)?;
                if !params.is_empty() {
                    body.push(' ');
                    body.push_str(&serde_json::to_string(params)?);
                }
                body
            }
            Outgoing::Action { action, params } => {
                format!("{} {}", action, serde_json::to_string(params)?)
            }
        };
        println!("[{}] {} -> {} #{}: {}", now, self.id, destination, msg_id, body);

        Ok(Receipt {
            message_id: Some(msg_id),
            raw: Value::Null,
        })
    }
}
