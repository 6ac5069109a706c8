//! 平台无关的消息段 (Segment)
//!
//! 一个消息段描述一条消息中的最小内容单元。消息段一经构造便不可变，
//! 构造时只做载荷校验，不会读取任何文件或网络资源。

use crate::error::{MsgBufError, MsgBufResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use url::Url;

/// 消息段类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Text,
    Image,
    Mention,
    Reply,
    Face,
    Audio,
    Video,
    File,
    Share,
    Location,
}

impl SegmentKind {
    pub const ALL: [SegmentKind; 10] = [
        SegmentKind::Text,
        SegmentKind::Image,
        SegmentKind::Mention,
        SegmentKind::Reply,
        SegmentKind::Face,
        SegmentKind::Audio,
        SegmentKind::Video,
        SegmentKind::File,
        SegmentKind::Share,
        SegmentKind::Location,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SegmentKind::Text => "text",
            SegmentKind::Image => "image",
            SegmentKind::Mention => "mention",
            SegmentKind::Reply => "reply",
            SegmentKind::Face => "face",
            SegmentKind::Audio => "audio",
            SegmentKind::Video => "video",
            SegmentKind::File => "file",
            SegmentKind::Share => "share",
            SegmentKind::Location => "location",
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SegmentKind {
    type Err = MsgBufError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        SegmentKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| MsgBufError::invalid(format!("未知的消息段类型: {s}")))
    }
}

// ================== 资源来源 ==================

/// 延迟读取的字节来源：本地路径、URL 或内存缓冲
///
/// 构造时不读取内容，直到渲染/发送阶段才由适配器或 [`SourceResolver`] 解析。
///
/// [`SourceResolver`]: crate::resolver::SourceResolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ByteSource {
    Path(PathBuf),
    Url(Url),
    Buffer(Arc<[u8]>),
}

impl ByteSource {
    /// 按 OneBot 惯例解析资源字符串
    /// - `http://` / `https://`: URL
    /// - `file://`: 本地路径
    /// - `base64://`: 内存缓冲
    /// - 其他: 本地路径
    pub fn parse(s: &str) -> MsgBufResult<Self> {
        if s.is_empty() {
            return Err(MsgBufError::invalid("资源地址为空"));
        }
        if let Some(encoded) = s.strip_prefix("base64://") {
            let bytes = STANDARD
                .decode(encoded)
                .map_err(|e| MsgBufError::invalid(format!("base64 数据无效: {e}")))?;
            return Ok(ByteSource::Buffer(bytes.into()));
        }
        if let Some(path) = s.strip_prefix("file://") {
            return Ok(ByteSource::Path(PathBuf::from(path)));
        }
        if s.starts_with("http://") || s.starts_with("https://") {
            let url = Url::parse(s).map_err(|e| MsgBufError::invalid(format!("URL 无效: {e}")))?;
            return Ok(ByteSource::Url(url));
        }
        Ok(ByteSource::Path(PathBuf::from(s)))
    }

    /// 转换为 OneBot 风格的资源字符串
    pub fn to_uri(&self) -> String {
        match self {
            ByteSource::Path(path) => std::path::absolute(path)
                .ok()
                .and_then(|path| Url::from_file_path(path).ok())
                .map(String::from)
                .unwrap_or_else(|| format!("file://{}", path.display())),
            ByteSource::Url(url) => url.to_string(),
            ByteSource::Buffer(bytes) => format!("base64://{}", STANDARD.encode(bytes)),
        }
    }

    /// 从来源推断文件名，内存缓冲无法推断
    pub fn file_name(&self) -> Option<String> {
        match self {
            ByteSource::Path(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            // path_segments 不包含查询串
            ByteSource::Url(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            ByteSource::Buffer(_) => None,
        }
    }

    pub fn local_path(&self) -> Option<&Path> {
        match self {
            ByteSource::Path(path) => Some(path),
            _ => None,
        }
    }

    /// 用于后备文本的简短描述
    fn describe(&self) -> String {
        match self {
            ByteSource::Path(path) => path.display().to_string(),
            ByteSource::Url(url) => url.to_string(),
            ByteSource::Buffer(bytes) => format!("<{} bytes>", bytes.len()),
        }
    }
}

impl From<PathBuf> for ByteSource {
    fn from(path: PathBuf) -> Self {
        ByteSource::Path(path)
    }
}

impl From<&Path> for ByteSource {
    fn from(path: &Path) -> Self {
        ByteSource::Path(path.to_path_buf())
    }
}

impl From<Url> for ByteSource {
    fn from(url: Url) -> Self {
        ByteSource::Url(url)
    }
}

impl From<Vec<u8>> for ByteSource {
    fn from(bytes: Vec<u8>) -> Self {
        ByteSource::Buffer(bytes.into())
    }
}

impl From<&[u8]> for ByteSource {
    fn from(bytes: &[u8]) -> Self {
        ByteSource::Buffer(bytes.into())
    }
}

impl From<Arc<[u8]>> for ByteSource {
    fn from(bytes: Arc<[u8]>) -> Self {
        ByteSource::Buffer(bytes)
    }
}

impl TryFrom<&str> for ByteSource {
    type Error = MsgBufError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        ByteSource::parse(s)
    }
}

impl TryFrom<String> for ByteSource {
    type Error = MsgBufError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        ByteSource::parse(&s)
    }
}

fn into_source<S>(source: S) -> MsgBufResult<ByteSource>
where
    S: TryInto<ByteSource>,
    MsgBufError: From<S::Error>,
{
    Ok(source.try_into()?)
}

// ================== 消息段 ==================

/// 消息段载荷
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Text(String),
    Image(ByteSource),
    Mention {
        user_id: String,
    },
    Reply {
        message_id: String,
    },
    Face {
        id: String,
    },
    Audio(ByteSource),
    Video(ByteSource),
    File {
        source: ByteSource,
        name: String,
    },
    Share {
        url: Url,
        title: String,
        description: Option<String>,
        image: Option<String>,
    },
    Location {
        lat: f64,
        lon: f64,
        title: Option<String>,
        content: Option<String>,
    },
}

/// 消息段 (Segment)
///
/// 除载荷外还可以附带平台数据 (`extra`)，供部分支持 (partial) 的适配器构造原生消息段。
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    content: Content,
    extra: Map<String, Value>,
}

impl Segment {
    fn new(content: Content) -> Self {
        Self {
            content,
            extra: Map::new(),
        }
    }

    // ================== 基础类 ==================

    /// 纯文本
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Content::Text(text.into()))
    }

    /// 提及 (At)
    pub fn mention(user_id: impl ToString) -> MsgBufResult<Self> {
        let user_id = non_empty(user_id.to_string(), "提及的用户 ID")?;
        Ok(Self::new(Content::Mention { user_id }))
    }

    /// 回复消息
    pub fn reply(message_id: impl ToString) -> MsgBufResult<Self> {
        let message_id = non_empty(message_id.to_string(), "回复的消息 ID")?;
        Ok(Self::new(Content::Reply { message_id }))
    }

    /// 表情 (ID 或名称)
    pub fn face(id: impl ToString) -> MsgBufResult<Self> {
        let id = non_empty(id.to_string(), "表情 ID")?;
        Ok(Self::new(Content::Face { id }))
    }

    // ================== 媒体资源类 ==================

    /// 图片
    pub fn image<S>(source: S) -> MsgBufResult<Self>
    where
        S: TryInto<ByteSource>,
        MsgBufError: From<S::Error>,
    {
        Ok(Self::new(Content::Image(into_source(source)?)))
    }

    /// 语音
    pub fn audio<S>(source: S) -> MsgBufResult<Self>
    where
        S: TryInto<ByteSource>,
        MsgBufError: From<S::Error>,
    {
        Ok(Self::new(Content::Audio(into_source(source)?)))
    }

    /// 视频
    pub fn video<S>(source: S) -> MsgBufResult<Self>
    where
        S: TryInto<ByteSource>,
        MsgBufError: From<S::Error>,
    {
        Ok(Self::new(Content::Video(into_source(source)?)))
    }

    /// 文件，文件名从来源推断
    pub fn file<S>(source: S) -> MsgBufResult<Self>
    where
        S: TryInto<ByteSource>,
        MsgBufError: From<S::Error>,
    {
        Self::file_named(source, "")
    }

    /// 文件
    /// - `name`: 显示的文件名，为空时从来源推断 (内存缓冲必须指定)
    pub fn file_named<S>(source: S, name: impl Into<String>) -> MsgBufResult<Self>
    where
        S: TryInto<ByteSource>,
        MsgBufError: From<S::Error>,
    {
        let source = into_source(source)?;
        let mut name = name.into();
        if name.is_empty() {
            name = source
                .file_name()
                .ok_or_else(|| MsgBufError::invalid("无法推断文件名，请显式指定"))?;
        }
        Ok(Self::new(Content::File { source, name }))
    }

    // ================== 分享/位置类 ==================

    /// 链接分享
    pub fn share(
        url: &str,
        title: &str,
        description: Option<&str>,
        image: Option<&str>,
    ) -> MsgBufResult<Self> {
        let url = Url::parse(url).map_err(|e| MsgBufError::invalid(format!("分享链接无效: {e}")))?;
        Ok(Self::new(Content::Share {
            url,
            title: title.to_string(),
            description: description.map(str::to_string),
            image: image.map(str::to_string),
        }))
    }

    /// 地理位置
    pub fn location(
        lat: f64,
        lon: f64,
        title: Option<&str>,
        content: Option<&str>,
    ) -> MsgBufResult<Self> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(MsgBufError::invalid(format!("纬度超出范围: {lat}")));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(MsgBufError::invalid(format!("经度超出范围: {lon}")));
        }
        Ok(Self::new(Content::Location {
            lat,
            lon,
            title: title.map(str::to_string),
            content: content.map(str::to_string),
        }))
    }

    // ================== 平台数据 ==================

    /// 附加平台数据，供部分支持该类型的适配器使用
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    /// 是否附带了全部所需的平台数据
    pub fn has_extra(&self, keys: &[&str]) -> bool {
        keys.iter().all(|key| self.extra.contains_key(*key))
    }

    // ================== 访问器 ==================

    pub fn kind(&self) -> SegmentKind {
        match &self.content {
            Content::Text(_) => SegmentKind::Text,
            Content::Image(_) => SegmentKind::Image,
            Content::Mention { .. } => SegmentKind::Mention,
            Content::Reply { .. } => SegmentKind::Reply,
            Content::Face { .. } => SegmentKind::Face,
            Content::Audio(_) => SegmentKind::Audio,
            Content::Video(_) => SegmentKind::Video,
            Content::File { .. } => SegmentKind::File,
            Content::Share { .. } => SegmentKind::Share,
            Content::Location { .. } => SegmentKind::Location,
        }
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    /// 媒体类消息段的资源来源
    pub fn source(&self) -> Option<&ByteSource> {
        match &self.content {
            Content::Image(source)
            | Content::Audio(source)
            | Content::Video(source)
            | Content::File { source, .. } => Some(source),
            _ => None,
        }
    }

    /// 按名称读取载荷字段，用于填充后备文本模板
    pub fn field(&self, name: &str) -> Option<String> {
        match (&self.content, name) {
            (Content::Text(text), "text") => Some(text.clone()),
            (Content::Mention { user_id }, "user_id") => Some(user_id.clone()),
            (Content::Reply { message_id }, "message_id") => Some(message_id.clone()),
            (Content::Face { id }, "id") => Some(id.clone()),
            (Content::File { name, .. }, "name") => Some(name.clone()),
            (Content::Share { url, .. }, "url") => Some(url.to_string()),
            (Content::Share { title, .. }, "title") => Some(title.clone()),
            (Content::Share { description, .. }, "description") => description.clone(),
            (Content::Share { image, .. }, "image") => image.clone(),
            (Content::Location { lat, .. }, "lat") => Some(coordinate(*lat)),
            (Content::Location { lon, .. }, "lon") => Some(coordinate(*lon)),
            (Content::Location { title, .. }, "title") => title.clone(),
            (Content::Location { content, .. }, "content") => content.clone(),
            (_, "source") => self.source().map(ByteSource::describe),
            _ => None,
        }
    }
}

// 整数坐标保留一位小数：40 → "40.0"
fn coordinate(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

fn non_empty(value: String, what: &str) -> MsgBufResult<String> {
    if value.trim().is_empty() {
        return Err(MsgBufError::invalid(format!("{what}不能为空")));
    }
    Ok(value)
}
