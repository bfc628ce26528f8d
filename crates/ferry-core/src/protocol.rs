//! 内建通信协议与序列化格式的稳定编码登记处。
//!
//! # 设计依据（Why）
//! - 协议与格式在目录数据中以小整数编码传输，编码一旦发布便不可变更；此处集中登记，
//!   避免各实现 crate 自行约定造成漂移；
//! - 能力模型中的 [`crate::capability::Endpoint`] 与 [`crate::capability::Format`]
//!   仍然携带开放的 `name + code`，枚举只是内建值的便捷入口，而非封闭世界。

use core::fmt;

use serde::{Deserialize, Serialize};

/// 内建通信协议。
///
/// # 契约说明（What）
/// - `code` 为线上传输使用的稳定编码；`name` 为人类可读的小写标识；
/// - 未登记的协议依旧可以通过 [`crate::capability::Endpoint`] 的开放字段表达。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum CommunicationProtocol {
    /// RSocket 双向通道。
    Rsocket,
    /// 原始套接字通道。
    Socket,
    /// HTTP/1.1 与 HTTP/2 明文通道。
    Http,
    /// gRPC 通道。
    Grpc,
    /// 承载 TLS 的 HTTP 通道。
    Https,
}

impl CommunicationProtocol {
    /// 返回稳定编码。
    pub const fn code(self) -> i32 {
        match self {
            Self::Rsocket => 0,
            Self::Socket => 1,
            Self::Http => 2,
            Self::Grpc => 3,
            Self::Https => 4,
        }
    }

    /// 返回小写协议名。
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rsocket => "rsocket",
            Self::Socket => "socket",
            Self::Http => "http",
            Self::Grpc => "grpc",
            Self::Https => "https",
        }
    }

    /// 按编码反查内建协议；未登记的编码返回 `None`。
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Rsocket),
            1 => Some(Self::Socket),
            2 => Some(Self::Http),
            3 => Some(Self::Grpc),
            4 => Some(Self::Https),
            _ => None,
        }
    }
}

impl fmt::Display for CommunicationProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 内建序列化格式。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum SerializationFormat {
    /// Protocol Buffers。
    Protobuf,
    /// JSON 文本。
    Json,
    /// CBOR 二进制。
    Cbor,
}

impl SerializationFormat {
    /// 返回稳定编码。
    pub const fn code(self) -> i32 {
        match self {
            Self::Protobuf => 0,
            Self::Json => 1,
            Self::Cbor => 2,
        }
    }

    /// 返回小写格式名。
    pub const fn name(self) -> &'static str {
        match self {
            Self::Protobuf => "protobuf",
            Self::Json => "json",
            Self::Cbor => "cbor",
        }
    }

    /// 按编码反查内建格式；未登记的编码返回 `None`。
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Protobuf),
            1 => Some(Self::Json),
            2 => Some(Self::Cbor),
            _ => None,
        }
    }
}

impl fmt::Display for SerializationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
