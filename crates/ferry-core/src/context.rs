//! 单次调用尝试的只读元数据。

use core::num::NonZeroU32;
use core::time::Duration;

use crate::{
    ids::WorkerId,
    protocol::{CommunicationProtocol, SerializationFormat},
};

/// `CallContext` 描述一次调用尝试的出发点与显式约束。
///
/// # 设计背景（Why）
/// - 过滤链需要知道“谁在调用、从哪里调用”：本进程的工作标识决定本地短路，
///   显式的协议/格式要求决定能力裁剪的准绳；
/// - 上下文在一次尝试的生命周期内不可变，重试产生新的尝试而不是修改旧上下文，
///   因此跨线程共享无需同步。
///
/// # 契约说明（What）
/// - `local_worker`：发起调用的工作进程标识；
/// - `protocol` / `format`：显式指定时过滤链只接受完全匹配；未指定时退化为
///   “与可用传输客户端 / 序列化服务的能力求交”；
/// - `timeout` / `attempt_budget`：对配置默认值的单次调用覆盖，未设置时由
///   执行器读取配置。
#[derive(Clone, Debug)]
pub struct CallContext {
    local_worker: WorkerId,
    protocol: Option<CommunicationProtocol>,
    format: Option<SerializationFormat>,
    timeout: Option<Duration>,
    attempt_budget: Option<NonZeroU32>,
}

impl CallContext {
    /// 以发起方工作进程标识构造上下文，其余约束默认未指定。
    pub fn for_worker(local_worker: WorkerId) -> Self {
        Self {
            local_worker,
            protocol: None,
            format: None,
            timeout: None,
            attempt_budget: None,
        }
    }

    /// 显式要求通信协议。
    pub fn with_protocol(mut self, protocol: CommunicationProtocol) -> Self {
        self.protocol = Some(protocol);
        self
    }

    /// 显式要求序列化格式。
    pub fn with_format(mut self, format: SerializationFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// 覆盖本次调用的派发超时。
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// 覆盖本次调用的尝试预算。`NonZeroU32` 在类型层面排除了零预算。
    pub fn with_attempt_budget(mut self, budget: NonZeroU32) -> Self {
        self.attempt_budget = Some(budget);
        self
    }

    /// 读取发起方工作进程标识。
    pub fn local_worker(&self) -> &WorkerId {
        &self.local_worker
    }

    /// 读取显式协议要求。
    pub fn protocol(&self) -> Option<CommunicationProtocol> {
        self.protocol
    }

    /// 读取显式格式要求。
    pub fn format(&self) -> Option<SerializationFormat> {
        self.format
    }

    /// 读取超时覆盖。
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// 读取尝试预算覆盖。
    pub fn attempt_budget(&self) -> Option<NonZeroU32> {
        self.attempt_budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_leave_constraints_unspecified() {
        let ctx = CallContext::for_worker(WorkerId::parse("local").unwrap());
        assert!(ctx.protocol().is_none());
        assert!(ctx.format().is_none());
        assert!(ctx.timeout().is_none());
        assert!(ctx.attempt_budget().is_none());
    }

    #[test]
    fn overrides_are_recorded() {
        let ctx = CallContext::for_worker(WorkerId::parse("local").unwrap())
            .with_protocol(CommunicationProtocol::Grpc)
            .with_format(SerializationFormat::Cbor)
            .with_timeout(Duration::from_secs(3))
            .with_attempt_budget(NonZeroU32::new(5).unwrap());
        assert_eq!(ctx.protocol(), Some(CommunicationProtocol::Grpc));
        assert_eq!(ctx.format(), Some(SerializationFormat::Cbor));
        assert_eq!(ctx.timeout(), Some(Duration::from_secs(3)));
        assert_eq!(ctx.attempt_budget().unwrap().get(), 5);
    }
}
