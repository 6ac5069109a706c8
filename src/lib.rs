// lib.rs
//
// ================================================================================
// msgbuf - 跨平台消息构造与发送
//
// 一次构造，按当前适配器的能力表渲染为原生消息段，不支持的内容降级为后备文本。
// 架构：消息段 | 能力表 | 渲染器 | 消息缓冲 | 发送器
// ================================================================================

pub mod adapters;
pub mod bot;
pub mod buffer;
pub mod capability;
pub mod config;
pub mod console;
pub mod context;
pub mod error;
pub mod log;
pub mod render;
pub mod resolver;
pub mod segment;
pub mod sender;
pub mod target;

pub use adapters::{AdapterSpec, find_adapter, get_adapters};
pub use bot::{Bot, Delivery, Destination, Outgoing, Receipt};
pub use buffer::{BufState, MsgBuf, scope};
pub use capability::{CapabilityEntry, CapabilityTable, Support};
pub use config::{ConfigError, MsgBufConfig};
pub use console::ConsoleBot;
pub use context::Session;
pub use error::{AdapterError, AdapterResult, MsgBufError, MsgBufResult};
pub use render::{Fidelity, NativeSegment, RenderedMessage, RenderedSegment, render, render_with};
pub use resolver::{DefaultResolver, SourceResolver};
pub use segment::{ByteSource, Content, Segment, SegmentKind};
pub use sender::{SendReceipt, SendResult, Sender};
pub use target::{AdapterFamily, RenderingTarget, Specs};

pub mod prelude {
    //! 常用类型的预导入模块
    //!
    //! ```rust
    //! use msgbuf::prelude::*;
    //! ```

    // 1. 消息构造
    pub use super::{ByteSource, MsgBuf, Segment, SegmentKind, scope};

    // 2. 上下文与投递
    pub use super::{Bot, Destination, Outgoing, Receipt, Session, Specs};

    // 3. 错误处理
    pub use super::{AdapterError, AdapterResult, MsgBufError, MsgBufResult, SendResult};

    // 4. 外部依赖
    pub use async_trait::async_trait;
}
