//! 消息缓冲 (MsgBuf)
//!
//! 按顺序累积消息段，发送时从当前处理上下文解析渲染目标，渲染后交给发送器投递。
//!
//! ```no_run
//! use msgbuf::prelude::*;
//!
//! # async fn handler() -> MsgBufResult<()> {
//! msgbuf::scope(|buf| {
//!     Box::pin(async move {
//!         buf.image("cat.png")?.text("Hello world!")?;
//!         Ok::<_, MsgBufError>(())
//!     })
//! })
//! .await
//! # }
//! ```

use crate::capability::CapabilityTable;
use crate::bot::Destination;
use crate::context::Session;
use crate::error::{MsgBufError, MsgBufResult};
use crate::render::{RenderedMessage, render_with};
use crate::segment::{ByteSource, Segment};
use crate::sender::{SendReceipt, SendResult, Sender};
use crate::target::{AdapterFamily, RenderingTarget, Specs};
use futures_util::future::BoxFuture;
use std::fmt;
use std::ops::Shl;
use tracing::debug;

/// 缓冲生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufState {
    Open,
    Sent,
    Discarded,
}

impl fmt::Display for BufState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BufState::Open => "未发送",
            BufState::Sent => "已发送",
            BufState::Discarded => "已丢弃",
        };
        f.write_str(name)
    }
}

/// 消息缓冲
#[derive(Debug)]
pub struct MsgBuf {
    segments: Vec<Segment>,
    state: BufState,
    /// 在上下文之上额外叠加的协议扩展
    specs: Specs,
    /// 显式指定的上下文，为空时使用当前任务的环境上下文
    session: Option<Session>,
    auto_send: bool,
}

impl Default for MsgBuf {
    fn default() -> Self {
        Self::new()
    }
}

impl MsgBuf {
    pub fn new() -> Self {
        Self {
            segments: Vec::new(),
            state: BufState::Open,
            specs: Specs::NONE,
            session: None,
            auto_send: true,
        }
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    /// 叠加协议扩展标记 (如 `Specs::OB11_GOCQHTTP`)
    pub fn specs(mut self, specs: Specs) -> Self {
        self.specs |= specs;
        self
    }

    /// 作用域正常结束时是否自动发送
    pub fn auto_send(mut self, enabled: bool) -> Self {
        self.auto_send = enabled;
        self
    }

    pub fn state(&self) -> BufState {
        self.state
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn ensure_open(&self, operation: &'static str) -> MsgBufResult<()> {
        if self.state != BufState::Open {
            return Err(MsgBufError::InvalidBufferState {
                state: self.state,
                operation,
            });
        }
        Ok(())
    }

    // ================== 追加 ==================

    pub fn append(&mut self, segment: Segment) -> MsgBufResult<&mut Self> {
        self.ensure_open("追加消息段")?;
        self.segments.push(segment);
        Ok(self)
    }

    /// 批量追加
    pub fn add(&mut self, segments: impl IntoIterator<Item = Segment>) -> MsgBufResult<&mut Self> {
        self.ensure_open("追加消息段")?;
        self.segments.extend(segments);
        Ok(self)
    }

    /// 撤销最后 `n` 个消息段
    pub fn revert(&mut self, n: usize) -> MsgBufResult<&mut Self> {
        self.ensure_open("撤销消息段")?;
        let keep = self.segments.len().saturating_sub(n);
        self.segments.truncate(keep);
        Ok(self)
    }

    pub fn text(&mut self, text: impl Into<String>) -> MsgBufResult<&mut Self> {
        self.append(Segment::text(text))
    }

    pub fn image<S>(&mut self, source: S) -> MsgBufResult<&mut Self>
    where
        S: TryInto<ByteSource>,
        MsgBufError: From<S::Error>,
    {
        self.append(Segment::image(source)?)
    }

    pub fn mention(&mut self, user_id: impl ToString) -> MsgBufResult<&mut Self> {
        self.append(Segment::mention(user_id)?)
    }

    pub fn reply(&mut self, message_id: impl ToString) -> MsgBufResult<&mut Self> {
        self.append(Segment::reply(message_id)?)
    }

    pub fn face(&mut self, id: impl ToString) -> MsgBufResult<&mut Self> {
        self.append(Segment::face(id)?)
    }

    pub fn audio<S>(&mut self, source: S) -> MsgBufResult<&mut Self>
    where
        S: TryInto<ByteSource>,
        MsgBufError: From<S::Error>,
    {
        self.append(Segment::audio(source)?)
    }

    pub fn video<S>(&mut self, source: S) -> MsgBufResult<&mut Self>
    where
        S: TryInto<ByteSource>,
        MsgBufError: From<S::Error>,
    {
        self.append(Segment::video(source)?)
    }

    pub fn file<S>(&mut self, source: S) -> MsgBufResult<&mut Self>
    where
        S: TryInto<ByteSource>,
        MsgBufError: From<S::Error>,
    {
        self.append(Segment::file(source)?)
    }

    pub fn file_named<S>(&mut self, source: S, name: impl Into<String>) -> MsgBufResult<&mut Self>
    where
        S: TryInto<ByteSource>,
        MsgBufError: From<S::Error>,
    {
        self.append(Segment::file_named(source, name)?)
    }

    pub fn share(&mut self, url: &str, title: &str) -> MsgBufResult<&mut Self> {
        self.append(Segment::share(url, title, None, None)?)
    }

    pub fn location(&mut self, lat: f64, lon: f64) -> MsgBufResult<&mut Self> {
        self.append(Segment::location(lat, lon, None, None)?)
    }

    // ================== 渲染 ==================

    /// 发送时使用的上下文
    pub fn session(&self) -> MsgBufResult<Session> {
        self.session
            .clone()
            .or_else(Session::current)
            .ok_or(MsgBufError::UnresolvedTarget)
    }

    /// 发送时使用的渲染目标
    pub fn target(&self) -> MsgBufResult<RenderingTarget> {
        Ok(self.session()?.target().with_specs(self.specs))
    }

    /// 按当前上下文渲染，但不发送
    pub fn export(&self) -> MsgBufResult<RenderedMessage> {
        Ok(self.render_for(&self.target()?))
    }

    /// 按指定目标渲染
    pub fn render_for(&self, target: &RenderingTarget) -> RenderedMessage {
        render_with(CapabilityTable::global(), &self.segments, target)
    }

    // ================== 发送 ==================

    /// 发送到指定目的地
    ///
    /// 只要进入投递阶段，缓冲即标记为已发送，投递失败也不会再次发送。
    pub async fn send(&mut self, destination: &Destination) -> SendResult {
        self.ensure_open("发送")?;
        let session = self.session()?;
        self.state = BufState::Sent;
        self.deliver(&session, destination).await
    }

    /// 发送到当前上下文的回复目的地
    pub async fn respond(&mut self) -> SendResult {
        self.ensure_open("发送")?;
        let session = self.session()?;
        self.state = BufState::Sent;
        self.deliver(&session, session.destination()).await
    }

    /// 全部以后备文本拼成一条纯文本消息发送到指定目的地，不查询适配器能力
    pub async fn send_fallback(&mut self, destination: &Destination) -> SendResult {
        self.ensure_open("发送")?;
        let session = self.session()?;
        self.state = BufState::Sent;
        let target = RenderingTarget::new(AdapterFamily::PlainText);
        self.deliver_as(&session, &target, destination).await
    }

    /// 以纯文本发送到当前上下文的回复目的地，见 [`MsgBuf::send_fallback`]
    pub async fn respond_fallback(&mut self) -> SendResult {
        self.ensure_open("发送")?;
        let destination = self.session()?.destination().clone();
        self.send_fallback(&destination).await
    }

    /// 发送到当前上下文并清空缓冲，缓冲保持可用
    ///
    /// 投递失败时保留缓冲内容，可以再次发送。
    pub async fn flush(&mut self) -> SendResult {
        self.ensure_open("发送")?;
        let session = self.session()?;
        let receipt = self.deliver(&session, session.destination()).await?;
        self.segments.clear();
        Ok(receipt)
    }

    /// 丢弃缓冲内容，不发送
    pub fn discard(&mut self) {
        if self.state != BufState::Open {
            return;
        }
        if !self.segments.is_empty() {
            debug!("丢弃消息缓冲中的 {} 个消息段", self.segments.len());
        }
        self.segments.clear();
        self.state = BufState::Discarded;
    }

    async fn deliver(&self, session: &Session, destination: &Destination) -> SendResult {
        let target = session.target().with_specs(self.specs);
        self.deliver_as(session, &target, destination).await
    }

    async fn deliver_as(
        &self,
        session: &Session,
        target: &RenderingTarget,
        destination: &Destination,
    ) -> SendResult {
        if self.segments.is_empty() {
            debug!("消息缓冲为空，跳过发送");
            return Ok(SendReceipt::default());
        }
        let table = CapabilityTable::global();
        let rendered = render_with(table, &self.segments, target);
        Sender::new(
            session.bot().as_ref(),
            table.adapter(target.family),
            session.resolver().as_ref(),
        )
        .send(rendered, destination)
        .await
    }

    // ================== 作用域 ==================

    /// 在作用域中使用该缓冲
    ///
    /// 正常结束且未显式发送时，若缓冲非空且启用了自动发送，则发送到当前上下文；
    /// 作用域返回错误或被取消时丢弃缓冲，不会发生任何投递。
    pub async fn run<T, E, F>(mut self, body: F) -> Result<T, E>
    where
        F: for<'b> FnOnce(&'b mut MsgBuf) -> BoxFuture<'b, Result<T, E>>,
        E: From<MsgBufError>,
    {
        match body(&mut self).await {
            Ok(value) => {
                if self.state == BufState::Open {
                    if self.auto_send && !self.segments.is_empty() {
                        self.respond().await?;
                    } else {
                        self.discard();
                    }
                }
                Ok(value)
            }
            Err(err) => {
                self.discard();
                Err(err)
            }
        }
    }
}

/// 以新的缓冲运行作用域，见 [`MsgBuf::run`]
pub async fn scope<T, E, F>(body: F) -> Result<T, E>
where
    F: for<'b> FnOnce(&'b mut MsgBuf) -> BoxFuture<'b, Result<T, E>>,
    E: From<MsgBufError>,
{
    MsgBuf::new().run(body).await
}

impl Drop for MsgBuf {
    fn drop(&mut self) {
        // 作用域被取消时走到这里
        if self.state == BufState::Open && !self.segments.is_empty() {
            debug!("消息缓冲未发送即被释放，丢弃 {} 个消息段", self.segments.len());
        }
    }
}

impl<'a> Shl<Segment> for &'a mut MsgBuf {
    type Output = MsgBufResult<&'a mut MsgBuf>;

    fn shl(self, segment: Segment) -> Self::Output {
        self.append(segment)
    }
}

impl<'a> Shl<Segment> for MsgBufResult<&'a mut MsgBuf> {
    type Output = MsgBufResult<&'a mut MsgBuf>;

    fn shl(self, segment: Segment) -> Self::Output {
        self?.append(segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fluent_and_operator_append_agree() {
        let mut fluent = MsgBuf::new();
        fluent.text("a").unwrap().mention(1).unwrap();

        let mut operator = MsgBuf::new();
        (&mut operator << Segment::text("a") << Segment::mention(1).unwrap()).unwrap();

        assert_eq!(fluent.segments(), operator.segments());
    }

    #[test]
    fn add_and_revert() {
        let mut buf = MsgBuf::new();
        buf.add([Segment::text("1"), Segment::text("2"), Segment::text("3")])
            .unwrap()
            .revert(2)
            .unwrap();
        assert_eq!(buf.segments(), [Segment::text("1")]);
        buf.revert(5).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn invalid_segment_does_not_append() {
        let mut buf = MsgBuf::new();
        assert!(matches!(
            buf.location(100.0, 0.0),
            Err(MsgBufError::InvalidSegment(_))
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn append_after_discard_fails() {
        let mut buf = MsgBuf::new();
        buf.text("x").unwrap();
        buf.discard();
        assert_eq!(buf.state(), BufState::Discarded);
        assert!(buf.is_empty());
        let err = buf.text("y").unwrap_err();
        assert!(matches!(
            err,
            MsgBufError::InvalidBufferState {
                state: BufState::Discarded,
                ..
            }
        ));
        assert_eq!(err.to_string(), "消息缓冲处于「已丢弃」状态，无法追加消息段");
    }

    #[test]
    fn operator_chain_short_circuits() {
        let mut buf = MsgBuf::new();
        buf.discard();
        let result = &mut buf << Segment::text("a") << Segment::text("b");
        assert!(result.is_err());
    }

    #[test]
    fn export_without_context_is_unresolved() {
        let mut buf = MsgBuf::new();
        buf.text("hi").unwrap();
        assert!(matches!(buf.export(), Err(MsgBufError::UnresolvedTarget)));

        let rendered = buf.render_for(&RenderingTarget::new(AdapterFamily::OneBotV11));
        assert_eq!(rendered.len(), 1);
    }
}
