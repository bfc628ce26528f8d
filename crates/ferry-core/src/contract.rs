//! 协作者契约：解析核心依赖的三个外部窄接口。
//!
//! # 设计初衷（Why）
//! - 服务发现存储、传输编解码与序列化实现都不属于解析核心；核心只依赖这里声明的
//!   签名，部署方以任意方式提供实现（远程注册中心、静态配置、内存表）；
//! - 三个契约全部对象安全，实现以 `Arc<dyn ...>` 注入执行器，便于在测试中替换。
//!
//! # 契约说明（What）
//! - [`Directory`]：目录查询。查询通道失败与“成功但无目标”是两种不同结果——
//!   前者返回错误，后者返回空列表；
//! - [`TransportClient`]：传输客户端。声明支持的协议集合，并执行一次字节级派发；
//! - [`SerializationService`]：序列化服务。按调用方偏好顺序给出支持的格式编码。

use alloc::{boxed::Box, vec::Vec};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    FerryError,
    capability::{Endpoint, Format, Target},
    ids::{FitableId, GenericableId},
    protocol::CommunicationProtocol,
};

/// 目录查询契约，由外部服务发现机制提供。
///
/// # 契约说明（What）
/// - **返回值**：成功时返回当前承接 (genericable, fitable) 的目标列表，列表可以为空；
/// - **错误语义**：仅当查询通道本身无法完成时返回错误（典型：注册中心不可达），
///   调用方应将其分类为可重试的 `broker.router_unavailable`；
/// - **后置条件**：返回的列表是一次性快照，实现不得在返回后继续修改。
#[async_trait]
pub trait Directory: Send + Sync {
    /// 查询承接指定实现的目标列表。
    async fn lookup(
        &self,
        genericable: &GenericableId,
        fitable: &FitableId,
    ) -> Result<Vec<Target>, FerryError>;
}

/// 传输客户端契约，一种协议栈一个实现。
///
/// # 设计初衷（Why）
/// - 字节级成帧、连接管理与信道安全全部属于客户端内部；解析核心只负责挑选
///   “目标端点的协议与某个客户端支持的协议有交集”的组合；
/// - `supported_protocols` 的结果用于未显式指定协议时的开放世界裁剪。
///
/// # 契约说明（What）
/// - **前置条件**：`endpoint` 必须来自 `target` 的端点声明，且其协议在
///   `supported_protocols` 集合内；
/// - **错误语义**：超时、连接失败等传输层错误应携带
///   [`crate::ErrorCategory::Timeout`] / [`crate::ErrorCategory::Retryable`]
///   等分类，执行器据此更新排除集并换候选重试；
/// - **取消语义**：在途调用被取消时返回 [`crate::ErrorCategory::Cancelled`]
///   分类的错误，薄记上等同于一次可重试的传输失败。
#[async_trait]
pub trait TransportClient: Send + Sync {
    /// 声明该客户端支持的协议集合。
    fn supported_protocols(&self) -> &[CommunicationProtocol];

    /// 通过指定端点以协商好的格式派发一次调用。
    async fn invoke(
        &self,
        target: &Target,
        endpoint: &Endpoint,
        format: &Format,
        payload: Bytes,
    ) -> Result<Bytes, FerryError>;
}

/// 序列化服务契约，为协商器提供调用方视角的格式能力。
pub trait SerializationService: Send + Sync {
    /// 按偏好顺序返回调用方针对某契约可用的格式编码。
    fn supported_formats(&self, genericable: &GenericableId) -> Vec<i32>;
}

/// 本进程内派发契约，由服务容器等外部机制提供。
///
/// # 设计初衷（Why）
/// - 本地短路选中本进程实例后，调用不应再绕道网络栈；实现体的构造与生命周期
///   属于外部容器，解析核心只依赖这一窄接口。
///
/// # 契约说明（What）
/// - **错误语义**：与 [`TransportClient::invoke`] 一致——失败携带结构化分类，
///   执行器据此决定换候选重试还是立即透出。
#[async_trait]
pub trait LocalInvoker: Send + Sync {
    /// 在本进程内执行指定实现。
    async fn invoke_local(
        &self,
        genericable: &GenericableId,
        fitable: &FitableId,
        payload: Bytes,
    ) -> Result<Bytes, FerryError>;
}
