//! 能力模型：描述契约、实现、工作进程与其通信能力的不可变值对象。
//!
//! # 设计总览（Why）
//! - 解析链路的全部输入都以这些值对象表达：目录返回 [`Target`] 列表，过滤链在其上做
//!   多准则裁剪，协商器读取 [`Format`] 声明，执行器按 [`Endpoint`] 派发；
//! - 所有类型一经构造即不可变，发布后任意并发读取无需同步；
//! - 必填字段在构造函数中校验，可选维度通过 `with_*` 方法叠加——空的端点/格式列表
//!   语义为“未声明限制”，过滤链按开放世界处理。
//!
//! # 集成说明（How）
//! - 目录实现负责把注册数据反序列化为这些类型（全部携带 serde 派生）；
//! - 过滤与协商逻辑只消费只读视图，列表的替换采用整体换新，而非原地修改。

use alloc::{string::String, vec::Vec};
use core::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    FerryError, Result,
    error::codes,
    ids::{FitableId, GenericableId, WorkerId},
    protocol::{CommunicationProtocol, SerializationFormat},
    types::NonEmptyStr,
};

/// 序列化格式声明：人类可读的名字加线上传输的小整数编码。
///
/// # 契约说明（What）
/// - **前置条件**：`name` 非空，`code` 非负；
/// - **后置条件**：值不可变，可安全克隆与跨线程共享；
/// - 目标声明的格式列表顺序即其偏好排序，协商器在无显式偏好时按此顺序选取。
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Format {
    name: NonEmptyStr,
    code: i32,
}

impl Format {
    /// 构造格式声明；名字为空或编码为负时返回 `app.invalid_argument`。
    pub fn new(name: impl Into<String>, code: i32) -> Result<Self> {
        if code < 0 {
            return Err(FerryError::new(
                codes::APP_INVALID_ARGUMENT,
                "Format 编码必须为非负整数",
            ));
        }
        Ok(Self {
            name: NonEmptyStr::new(name.into())?,
            code,
        })
    }

    /// 读取格式名。
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// 读取稳定编码。
    pub fn code(&self) -> i32 {
        self.code
    }
}

impl From<SerializationFormat> for Format {
    fn from(format: SerializationFormat) -> Self {
        Self {
            name: NonEmptyStr::from_static(format.name()),
            code: format.code(),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.code)
    }
}

/// 目标上某个协议的可达地址。
///
/// # 契约说明（What）
/// - 一个 [`Target`] 可以同时暴露多个协议的端点；
/// - **前置条件**：`host` 非空，`protocol_name` 非空，`protocol_code` 非负；
/// - 端点列表的顺序即目标的协议偏好排序。
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    host: NonEmptyStr,
    port: u16,
    protocol_name: NonEmptyStr,
    protocol_code: i32,
}

impl Endpoint {
    /// 构造端点声明。
    pub fn new(
        host: impl Into<String>,
        port: u16,
        protocol_name: impl Into<String>,
        protocol_code: i32,
    ) -> Result<Self> {
        if protocol_code < 0 {
            return Err(FerryError::new(
                codes::APP_INVALID_ARGUMENT,
                "Endpoint 协议编码必须为非负整数",
            ));
        }
        Ok(Self {
            host: NonEmptyStr::new(host.into())?,
            port,
            protocol_name: NonEmptyStr::new(protocol_name.into())?,
            protocol_code,
        })
    }

    /// 以内建协议构造端点。
    pub fn for_protocol(
        host: impl Into<String>,
        port: u16,
        protocol: CommunicationProtocol,
    ) -> Result<Self> {
        Self::new(host, port, protocol.name(), protocol.code())
    }

    /// 读取主机名。
    pub fn host(&self) -> &str {
        self.host.as_str()
    }

    /// 读取端口。
    pub fn port(&self) -> u16 {
        self.port
    }

    /// 读取协议名。
    pub fn protocol_name(&self) -> &str {
        self.protocol_name.as_str()
    }

    /// 读取协议编码。
    pub fn protocol_code(&self) -> i32 {
        self.protocol_code
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.protocol_name, self.host, self.port)
    }
}

/// 能够承接某个实现的工作进程实例。
///
/// # 设计背景（Why）
/// - 目录针对 (genericable, fitable) 返回的候选单元就是 `Target`：工作进程标识加上它
///   声明的通信能力（端点与格式）；
/// - 空的端点或格式列表表示“该维度未声明限制”，过滤链对该半边直接放行——这是原始
///   注册数据的既有语义，不是实现的宽松化。
///
/// # 契约说明（What）
/// - **前置条件**：`worker_id` 在同一实现的同时在线实例中唯一，由注册机制保证；
/// - **后置条件**：值不可变；每次目录刷新产出整组新列表，不存在原地更新。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    worker_id: WorkerId,
    #[serde(default)]
    endpoints: Vec<Endpoint>,
    #[serde(default)]
    formats: Vec<Format>,
}

impl Target {
    /// 以工作进程标识构造目标，端点与格式维度默认未声明。
    pub fn new(worker_id: WorkerId) -> Self {
        Self {
            worker_id,
            endpoints: Vec::new(),
            formats: Vec::new(),
        }
    }

    /// 声明端点列表，顺序即协议偏好。
    pub fn with_endpoints(mut self, endpoints: Vec<Endpoint>) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// 声明格式列表，顺序即格式偏好。
    pub fn with_formats(mut self, formats: Vec<Format>) -> Self {
        self.formats = formats;
        self
    }

    /// 读取工作进程标识。
    pub fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    /// 读取端点声明。
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// 读取格式声明。
    pub fn formats(&self) -> &[Format] {
        &self.formats
    }

    /// 判断是否声明了指定编码的协议端点。空端点列表返回 `false`，开放世界判定由过滤链负责。
    pub fn declares_protocol(&self, protocol_code: i32) -> bool {
        self.endpoints
            .iter()
            .any(|endpoint| endpoint.protocol_code() == protocol_code)
    }

    /// 判断是否声明了指定编码的格式。
    pub fn declares_format(&self, format_code: i32) -> bool {
        self.formats.iter().any(|format| format.code() == format_code)
    }

    /// 返回第一个使用指定协议编码的端点。
    pub fn endpoint_for(&self, protocol_code: i32) -> Option<&Endpoint> {
        self.endpoints
            .iter()
            .find(|endpoint| endpoint.protocol_code() == protocol_code)
    }
}

/// 契约方法的签名描述符。
///
/// 原始系统通过反射推导方法签名；此处按约定改为显式传入预解析好的描述符，
/// 解析核心不触碰实现内部。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    name: NonEmptyStr,
    signature: NonEmptyStr,
}

impl MethodDescriptor {
    /// 构造方法描述符；名字与签名均不可为空。
    pub fn new(name: impl Into<String>, signature: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: NonEmptyStr::new(name.into())?,
            signature: NonEmptyStr::new(signature.into())?,
        })
    }

    /// 读取方法名。
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// 读取签名描述。
    pub fn signature(&self) -> &str {
        self.signature.as_str()
    }
}

/// 某个契约下一个具体实现的元数据。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitableMetadata {
    id: FitableId,
    genericable_id: GenericableId,
}

impl FitableMetadata {
    /// 构造实现元数据。
    pub fn new(id: FitableId, genericable_id: GenericableId) -> Self {
        Self { id, genericable_id }
    }

    /// 读取实现标识。
    pub fn id(&self) -> &FitableId {
        &self.id
    }

    /// 读取所属契约标识。
    pub fn genericable_id(&self) -> &GenericableId {
        &self.genericable_id
    }
}

/// 抽象服务契约：稳定标识、方法签名与已注册的实现清单。
///
/// # 契约说明（What）
/// - 注册期构造，对解析核心只读；
/// - **不变式**：实现清单中的每个条目都归属本契约，且实现标识互不重复，
///   [`Genericable::with_fitables`] 在构造期校验。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genericable {
    id: GenericableId,
    method: MethodDescriptor,
    #[serde(default)]
    fitables: Vec<FitableMetadata>,
}

impl Genericable {
    /// 构造契约，实现清单初始为空。
    pub fn new(id: GenericableId, method: MethodDescriptor) -> Self {
        Self {
            id,
            method,
            fitables: Vec::new(),
        }
    }

    /// 挂载实现清单，校验归属与唯一性。
    pub fn with_fitables(mut self, fitables: Vec<FitableMetadata>) -> Result<Self> {
        for (index, fitable) in fitables.iter().enumerate() {
            if fitable.genericable_id() != &self.id {
                return Err(FerryError::new(
                    codes::APP_INVALID_ARGUMENT,
                    "实现清单中存在不归属本契约的条目",
                ));
            }
            if fitables[..index].iter().any(|prior| prior.id() == fitable.id()) {
                return Err(FerryError::new(
                    codes::APP_INVALID_ARGUMENT,
                    "实现标识在契约范围内必须唯一",
                ));
            }
        }
        self.fitables = fitables;
        Ok(self)
    }

    /// 读取契约标识。
    pub fn id(&self) -> &GenericableId {
        &self.id
    }

    /// 读取方法描述符。
    pub fn method(&self) -> &MethodDescriptor {
        &self.method
    }

    /// 读取实现清单。
    pub fn fitables(&self) -> &[FitableMetadata] {
        &self.fitables
    }

    /// 按标识查找实现。
    pub fn fitable(&self, id: &FitableId) -> Option<&FitableMetadata> {
        self.fitables.iter().find(|fitable| fitable.id() == id)
    }
}
