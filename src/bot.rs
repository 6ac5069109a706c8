use crate::error::AdapterResult;
use crate::render::NativeSegment;
use crate::target::AdapterFamily;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// 消息目的地
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Destination {
    /// 私聊
    Private { user_id: String },
    /// 群聊
    Group { group_id: String },
    /// 频道
    Channel { guild_id: String, channel_id: String },
}

impl Destination {
    pub fn private(user_id: impl ToString) -> Self {
        Destination::Private {
            user_id: user_id.to_string(),
        }
    }

    pub fn group(group_id: impl ToString) -> Self {
        Destination::Group {
            group_id: group_id.to_string(),
        }
    }

    pub fn channel(guild_id: impl ToString, channel_id: impl ToString) -> Self {
        Destination::Channel {
            guild_id: guild_id.to_string(),
            channel_id: channel_id.to_string(),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Private { user_id } => write!(f, "私聊 {user_id}"),
            Destination::Group { group_id } => write!(f, "群 {group_id}"),
            Destination::Channel {
                guild_id,
                channel_id,
            } => write!(f, "频道 {guild_id}/{channel_id}"),
        }
    }
}

/// 一次投递的内容
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outgoing {
    /// 发送消息
    Message {
        segments: Vec<NativeSegment>,
        /// 协议附加参数 (如 `reply_to_message_id`)
        params: Map<String, Value>,
    },
    /// 调用协议动作 (如 `upload_group_file`)
    Action {
        action: String,
        params: Map<String, Value>,
    },
}

impl Outgoing {
    pub fn message(segments: Vec<NativeSegment>) -> Self {
        Outgoing::Message {
            segments,
            params: Map::new(),
        }
    }

    pub fn action(action: impl Into<String>, params: Map<String, Value>) -> Self {
        Outgoing::Action {
            action: action.into(),
            params,
        }
    }
}

/// 投递计划中的一项
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivery {
    /// 本次投递中第一个原生消息段在渲染结果中的下标
    pub index: usize,
    pub outgoing: Outgoing,
}

/// 适配器回执
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub message_id: Option<String>,
    /// 协议原始响应
    #[serde(default)]
    pub raw: Value,
}

impl Receipt {
    pub fn with_id(message_id: impl ToString) -> Self {
        Self {
            message_id: Some(message_id.to_string()),
            raw: Value::Null,
        }
    }
}

/// 投递原语，由宿主框架实现
#[async_trait]
pub trait Bot: Send + Sync {
    /// 机器人唯一标识
    fn id(&self) -> &str;

    /// 所属适配器家族
    fn family(&self) -> AdapterFamily;

    /// 投递一条消息或一个动作
    async fn deliver(&self, destination: &Destination, outgoing: &Outgoing) -> AdapterResult<Receipt>;
}
