//! 稳定错误域：错误码、重试/降级分类与统一的 `Result` 别名。

use alloc::{borrow::Cow, boxed::Box};
use core::error::Error;
use core::fmt;
use core::time::Duration;

/// 重试建议，描述“等待多久再试”。
///
/// # 契约说明（What）
/// - `wait` 为推荐的等待时长；若无法给出准确值，建议使用几十毫秒量级的默认值；
/// - `reason` 为可选的原因描述，帮助调用方生成观测日志。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryAdvice {
    /// 推荐的等待时长。
    pub wait: Duration,
    /// 可选的原因描述。
    pub reason: Option<Cow<'static, str>>,
}

impl RetryAdvice {
    /// 构造仅包含等待时间的建议。
    pub const fn after(wait: Duration) -> Self {
        Self { wait, reason: None }
    }

    /// 为建议附加原因描述。
    pub fn with_reason(mut self, reason: impl Into<Cow<'static, str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// 错误的处置分类，驱动调用方的自动化容错策略。
///
/// # 设计背景（Why）
/// - 解析链路必须区分三层语义：可立即重试（同一调用再试可能成功）、可降级（调用方可以
///   退回缓存值或默认值）、永久失败（部署不一致，重试只会放大故障）；
/// - 将判定显式化为结构化分类，避免调用方解析错误消息推断语义。
///
/// # 契约说明（What）
/// - `Retryable` 是 `Degradable` 的细化：凡可重试者必可降级，参见
///   [`ErrorCategory::is_degradable`]；
/// - `Timeout` 与 `Cancelled` 在派发语义下等价于可重试的传输失败：执行器据此更新
///   排除集并换一个候选重试；
/// - `NonRetryable` 标记永久失败，必须立即向调用方透出。
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// 立即重试可能成功，可附带退避建议。
    Retryable(RetryAdvice),
    /// 调用方可以优雅降级，但重试同一调用没有意义。
    Degradable,
    /// 永久失败，不得重试。
    NonRetryable,
    /// 派发超时。
    Timeout,
    /// 在途派发被取消。
    Cancelled,
}

impl ErrorCategory {
    /// 判断该分类是否允许立即重试。
    ///
    /// 超时与取消按可重试的传输失败处理：同一调用换一个候选再试是合理动作。
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_) | Self::Timeout | Self::Cancelled)
    }

    /// 判断该分类是否允许降级。可重试蕴含可降级。
    pub fn is_degradable(&self) -> bool {
        self.is_retryable() || matches!(self, Self::Degradable)
    }
}

/// 封装底层原因，保持 `Send + Sync` 以便跨线程传递。
pub type ErrorCause = Box<dyn Error + Send + Sync + 'static>;

/// `FerryError` 是跨 crate 共享的稳定错误域，所有可观察错误的最终形态。
///
/// # 设计背景（Why）
/// - 解析、过滤、协商与派发各阶段的失败需要合流为统一的错误码，日志与告警系统才能
///   做精确的自动化治理；
/// - 契约 crate 需兼容 `no_std + alloc`，因此不依赖 `thiserror`，错误链通过
///   [`core::error::Error`] 的 `source()` 暴露。
///
/// # 契约说明（What）
/// - **前置条件**：`code` 必须来自 [`codes`] 模块或遵循 `<域>.<语义>` 约定的自定义码值；
/// - **后置条件**：实例拥有独立所有权，`Send + Sync + 'static`，可安全跨线程移动；
///   除非显式调用 `with_*`，错误不含分类与底层原因。
///
/// # 设计取舍（Trade-offs）
/// - 消息采用 `Cow<'static, str>`，静态文案零分配，动态文案只付一次堆分配；
/// - 分类信息是可选的：未标注分类的错误按永久失败处理，宁可少重试也不放大故障。
#[derive(Debug)]
pub struct FerryError {
    code: &'static str,
    message: Cow<'static, str>,
    category: Option<ErrorCategory>,
    cause: Option<ErrorCause>,
}

impl FerryError {
    /// 使用稳定错误码与消息构造错误。
    pub fn new(code: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
            category: None,
            cause: None,
        }
    }

    /// 附带底层原因并返回新错误。
    pub fn with_cause(mut self, cause: impl Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// 为错误标记结构化分类。
    ///
    /// # 契约说明（What）
    /// - 分类应与错误码语义一致，不得将永久失败标记为 `Retryable`；
    /// - 返回新的错误实例，保持不可变语义。
    pub fn with_category(mut self, category: ErrorCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// 读取稳定错误码。
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// 读取面向排障人员的消息。
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 读取结构化分类；未标注时返回 `None`。
    pub fn category(&self) -> Option<&ErrorCategory> {
        self.category.as_ref()
    }

    /// 判断错误是否可立即重试；未标注分类按不可重试处理。
    pub fn is_retryable(&self) -> bool {
        self.category.as_ref().is_some_and(ErrorCategory::is_retryable)
    }

    /// 判断错误是否可降级；未标注分类按不可降级处理。
    pub fn is_degradable(&self) -> bool {
        self.category.as_ref().is_some_and(ErrorCategory::is_degradable)
    }

    /// 访问底层原因。
    pub fn cause(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }
}

impl fmt::Display for FerryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for FerryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| cause.as_ref() as &(dyn Error + 'static))
    }
}

/// 框架统一的返回值别名，默认错误类型为 [`FerryError`]。
pub type Result<T, E = FerryError> = core::result::Result<T, E>;

/// 框架内置的错误码常量集合，确保可观测性系统具有稳定识别符。
///
/// # 契约说明（What）
/// - 错误码遵循 `<域>.<语义>` 命名约定，便于跨组件日志检索与聚合；
/// - 实现者应将错误码封装进 [`FerryError`] 或下游错误类型，并携带完整上下文。
pub mod codes {
    /// 目录查询通道本身不可达。
    pub const BROKER_ROUTER_UNAVAILABLE: &str = "broker.router_unavailable";
    /// 过滤链产出空候选集。
    pub const BROKER_NO_CANDIDATE_TARGET: &str = "broker.no_candidate_target";
    /// 期望唯一实现时目录返回了多个等价候选。
    pub const BROKER_AMBIGUOUS_FITABLE: &str = "broker.ambiguous_fitable";
    /// 双方不存在共同的协议或格式。
    pub const BROKER_CONTRACT_MISMATCH: &str = "broker.contract_mismatch";
    /// 传输层 I/O 失败。
    pub const TRANSPORT_IO: &str = "transport.io";
    /// 派发超时。
    pub const TRANSPORT_TIMEOUT: &str = "transport.timeout";
    /// 注册中心拒绝当前凭据。
    pub const REGISTRY_UNAUTHORIZED: &str = "registry.unauthorized";
    /// 入参不符合契约。
    pub const APP_INVALID_ARGUMENT: &str = "app.invalid_argument";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_implies_degradable() {
        let retryable = ErrorCategory::Retryable(RetryAdvice::after(Duration::from_millis(50)));
        assert!(retryable.is_retryable());
        assert!(retryable.is_degradable());

        assert!(!ErrorCategory::Degradable.is_retryable());
        assert!(ErrorCategory::Degradable.is_degradable());

        assert!(!ErrorCategory::NonRetryable.is_degradable());
    }

    #[test]
    fn timeout_and_cancelled_count_as_retryable() {
        assert!(ErrorCategory::Timeout.is_retryable());
        assert!(ErrorCategory::Cancelled.is_retryable());
    }

    #[test]
    fn unclassified_error_is_permanent() {
        let err = FerryError::new(codes::BROKER_CONTRACT_MISMATCH, "no common format");
        assert!(!err.is_retryable());
        assert!(!err.is_degradable());
    }

    #[test]
    fn display_carries_code_and_message() {
        let err = FerryError::new(codes::TRANSPORT_IO, "connection refused");
        assert_eq!(alloc::format!("{err}"), "[transport.io] connection refused");
    }
}
