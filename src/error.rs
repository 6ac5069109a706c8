use crate::buffer::BufState;
use std::convert::Infallible;
use thiserror::Error;

/// 适配器投递原语返回的错误，与宿主框架的错误类型保持一致
pub type AdapterError = Box<dyn std::error::Error + Send + Sync>;

pub type AdapterResult<T> = Result<T, AdapterError>;

/// 消息构造与发送过程中的错误
#[derive(Debug, Error)]
pub enum MsgBufError {
    /// 构造消息段时载荷不合法，不会进入渲染阶段
    #[error("无效的消息段: {0}")]
    InvalidSegment(String),

    /// 当前上下文中没有可用的适配器，发送前即失败
    #[error("当前上下文中没有可用的适配器")]
    UnresolvedTarget,

    /// 消息缓冲状态不允许该操作 (编程错误)
    #[error("消息缓冲处于「{state}」状态，无法{operation}")]
    InvalidBufferState {
        state: BufState,
        operation: &'static str,
    },

    /// 适配器拒绝或无法投递
    #[error("第 {index} 个原生消息段投递失败: {source}")]
    DeliveryFailure {
        index: usize,
        #[source]
        source: AdapterError,
    },
}

pub type MsgBufResult<T> = Result<T, MsgBufError>;

impl MsgBufError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        MsgBufError::InvalidSegment(reason.into())
    }
}

// 供 `TryInto<ByteSource>` 的无失败转换使用
impl From<Infallible> for MsgBufError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}
