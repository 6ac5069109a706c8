//! 处理上下文 (Session)
//!
//! 宿主框架在处理一个事件时，把机器人句柄、回复目的地、协议扩展标记和资源解析器
//! 作为任务局部的环境上下文安装，消息缓冲在发送时从这里解析渲染目标。

use crate::bot::{Bot, Destination};
use crate::resolver::{DefaultResolver, SourceResolver};
use crate::target::{RenderingTarget, Specs};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

tokio::task_local! {
    static CURRENT: Session;
}

/// 当前处理上下文
#[derive(Clone)]
pub struct Session {
    bot: Arc<dyn Bot>,
    destination: Destination,
    specs: Specs,
    resolver: Arc<dyn SourceResolver>,
}

impl Session {
    pub fn new(bot: Arc<dyn Bot>, destination: Destination) -> Self {
        Self {
            bot,
            destination,
            specs: Specs::NONE,
            resolver: Arc::new(DefaultResolver::default()),
        }
    }

    /// 叠加协议扩展标记
    pub fn with_specs(mut self, specs: Specs) -> Self {
        self.specs |= specs;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn SourceResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn bot(&self) -> &Arc<dyn Bot> {
        &self.bot
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn specs(&self) -> Specs {
        self.specs
    }

    pub fn resolver(&self) -> &Arc<dyn SourceResolver> {
        &self.resolver
    }

    /// 由机器人所属家族与扩展标记得出的渲染目标
    pub fn target(&self) -> RenderingTarget {
        RenderingTarget::new(self.bot.family()).with_specs(self.specs)
    }

    /// 在该上下文中运行 future
    pub async fn scope<F: Future>(self, f: F) -> F::Output {
        CURRENT.scope(self, f).await
    }

    /// 当前任务的上下文，不在任何上下文中时返回 `None`
    pub fn current() -> Option<Session> {
        CURRENT.try_with(Session::clone).ok()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("bot", &self.bot.id())
            .field("destination", &self.destination)
            .field("specs", &self.specs)
            .finish_non_exhaustive()
    }
}
