//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为解析流水线对外暴露的失败语义提供集中定义，确保与 `ferry-core::FerryError` 对齐；
//! - 每个变体对应一种明确的处置策略：立即重试、换候选重试、降级兜底或立即透出，
//!   避免调用方解析错误消息来推断下一步动作。
//!
//! ## 设计要求（What）
//! - 所有错误类型实现 `thiserror::Error`，与 `std::error::Error` 生态兼容；
//! - 通过 [`RouteError::category`] 暴露结构化分类，并经 `From` 转换为携带稳定
//!   错误码的 [`FerryError`]；
//! - 永久失败（契约不匹配、未知标识）绝不携带可重试分类，防止误触发重试风暴。

use std::time::Duration;

use thiserror::Error;

use ferry_core::{
    ErrorCategory, FerryError, RetryAdvice, codes,
    ids::{FitableId, GenericableId, WorkerId},
};

/// 目录查询失败后的默认退避建议。
const ROUTER_RETRY_WAIT: Duration = Duration::from_millis(50);

/// 解析流水线的错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：聚合解析、过滤、协商与派发各阶段的失败，并为上层统一转换为
///   [`FerryError`] 做准备；细粒度枚举帮助运维快速定位故障来源。
/// - **契约 (What)**：
///   - 所有变体均为 `Send + Sync + 'static`，可安全跨线程传播；
///   - [`RouteError::category`] 给出处置分类：`RouterUnavailable`、`AmbiguousFitable`
///     与传输失败可重试，`NoCandidateTarget` 可降级，其余为永久失败；
///   - 预算耗尽时执行器原样透出最后一次分类失败，不另行包装。
#[derive(Debug, Error)]
pub enum RouteError {
    /// 目录查询通道本身不可达。
    ///
    /// - **意图 (Why)**：与“查询成功但无目标”严格区分——通道故障是瞬态的，重试有意义。
    /// - **契约 (What)**：`cause` 保留目录实现返回的底层错误，供日志与告警携带根因。
    #[error("directory lookup channel unavailable for `{genericable}:{fitable}`")]
    RouterUnavailable {
        genericable: GenericableId,
        fitable: FitableId,
        #[source]
        cause: FerryError,
    },

    /// 过滤链产出空候选集。
    ///
    /// - **意图 (Why)**：调用方据此决定兜底策略（缓存值、默认值或稍后重新轮询）；
    ///   执行器不代替调用方做重新轮询的决定。
    #[error("no candidate target survives filtering for `{genericable}:{fitable}`")]
    NoCandidateTarget {
        genericable: GenericableId,
        fitable: FitableId,
    },

    /// 契约下没有任何已注册实现。
    #[error("genericable `{genericable}` has no registered fitable")]
    NoFitable { genericable: GenericableId },

    /// 期望唯一实现时解析出多个等价候选且无裁决准则。
    ///
    /// - **意图 (Why)**：注册数据可能正在收敛（实例上下线中），下一次解析可能恢复唯一，
    ///   因此分类为可重试。
    #[error("genericable `{genericable}` resolves to {count} equally valid fitables")]
    AmbiguousFitable {
        genericable: GenericableId,
        count: usize,
    },

    /// 指定的实现标识在契约下不存在。
    #[error("unknown fitable `{fitable}` under genericable `{genericable}`")]
    UnknownFitable {
        genericable: GenericableId,
        fitable: FitableId,
    },

    /// 与目标之间不存在共同的协议或格式。
    ///
    /// - **意图 (Why)**：这是部署或版本偏斜的征兆而非瞬态条件，必须立即透出并禁止重试。
    #[error("no common protocol or format with worker `{worker}`: {detail}")]
    ContractMismatch { worker: WorkerId, detail: String },

    /// 派发阶段的传输层失败（连接拒绝、对端关闭、在途取消等）。
    #[error("transport failure on worker `{worker}`")]
    TransportFailure {
        worker: WorkerId,
        #[source]
        cause: FerryError,
    },

    /// 派发超出时间上界。
    #[error("dispatch to worker `{worker}` timed out after {waited:?}")]
    DispatchTimeout { worker: WorkerId, waited: Duration },
}

impl RouteError {
    /// 给出该错误的处置分类。
    ///
    /// # 契约说明（What）
    /// - 传输失败默认可重试；仅当底层原因显式声明 `Cancelled` / `Timeout` 时原样传递，
    ///   两者在薄记上仍然等同于可重试；
    /// - 超时统一映射为 [`ErrorCategory::Timeout`]。
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::RouterUnavailable { .. } => ErrorCategory::Retryable(
                RetryAdvice::after(ROUTER_RETRY_WAIT).with_reason("router retrieval failed"),
            ),
            Self::NoCandidateTarget { .. } | Self::NoFitable { .. } => ErrorCategory::Degradable,
            Self::AmbiguousFitable { .. } => ErrorCategory::Retryable(
                RetryAdvice::after(ROUTER_RETRY_WAIT).with_reason("fitable resolution ambiguous"),
            ),
            Self::UnknownFitable { .. } | Self::ContractMismatch { .. } => {
                ErrorCategory::NonRetryable
            }
            Self::TransportFailure { cause, .. } => match cause.category() {
                Some(ErrorCategory::Cancelled) => ErrorCategory::Cancelled,
                Some(ErrorCategory::Timeout) => ErrorCategory::Timeout,
                _ => ErrorCategory::Retryable(
                    RetryAdvice::after(Duration::ZERO).with_reason("transport failure"),
                ),
            },
            Self::DispatchTimeout { .. } => ErrorCategory::Timeout,
        }
    }

    /// 判断是否允许立即重试。
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// 判断调用方是否可以降级兜底。
    pub fn is_degradable(&self) -> bool {
        self.category().is_degradable()
    }

    fn code(&self) -> &'static str {
        match self {
            Self::RouterUnavailable { .. } => codes::BROKER_ROUTER_UNAVAILABLE,
            Self::NoCandidateTarget { .. } | Self::NoFitable { .. } => {
                codes::BROKER_NO_CANDIDATE_TARGET
            }
            Self::AmbiguousFitable { .. } => codes::BROKER_AMBIGUOUS_FITABLE,
            Self::UnknownFitable { .. } => codes::APP_INVALID_ARGUMENT,
            Self::ContractMismatch { .. } => codes::BROKER_CONTRACT_MISMATCH,
            Self::TransportFailure { .. } => codes::TRANSPORT_IO,
            Self::DispatchTimeout { .. } => codes::TRANSPORT_TIMEOUT,
        }
    }
}

impl From<RouteError> for FerryError {
    /// 折叠为稳定错误域：挑选错误码、保留分类、把 `RouteError` 本体作为底层原因挂链。
    fn from(err: RouteError) -> Self {
        let code = err.code();
        let category = err.category();
        FerryError::new(code, err.to_string())
            .with_category(category)
            .with_cause(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gid() -> GenericableId {
        GenericableId::parse("g").unwrap()
    }

    fn fid() -> FitableId {
        FitableId::parse("f").unwrap()
    }

    fn wid() -> WorkerId {
        WorkerId::parse("w").unwrap()
    }

    #[test]
    fn retryable_kinds() {
        let unavailable = RouteError::RouterUnavailable {
            genericable: gid(),
            fitable: fid(),
            cause: FerryError::new(codes::TRANSPORT_IO, "connection refused"),
        };
        assert!(unavailable.is_retryable());

        let ambiguous = RouteError::AmbiguousFitable {
            genericable: gid(),
            count: 2,
        };
        assert!(ambiguous.is_retryable());

        let timeout = RouteError::DispatchTimeout {
            worker: wid(),
            waited: Duration::from_secs(3),
        };
        assert!(timeout.is_retryable());
    }

    #[test]
    fn permanent_kinds_refuse_retry() {
        let mismatch = RouteError::ContractMismatch {
            worker: wid(),
            detail: "no common format".into(),
        };
        assert!(!mismatch.is_retryable());
        assert!(!mismatch.is_degradable());

        let unknown = RouteError::UnknownFitable {
            genericable: gid(),
            fitable: fid(),
        };
        assert!(!unknown.is_retryable());
    }

    #[test]
    fn no_candidate_is_degradable_but_not_retryable() {
        let empty = RouteError::NoCandidateTarget {
            genericable: gid(),
            fitable: fid(),
        };
        assert!(!empty.is_retryable());
        assert!(empty.is_degradable());
    }

    #[test]
    fn conversion_keeps_code_and_category() {
        let err: FerryError = RouteError::NoCandidateTarget {
            genericable: gid(),
            fitable: fid(),
        }
        .into();
        assert_eq!(err.code(), codes::BROKER_NO_CANDIDATE_TARGET);
        assert!(err.is_degradable());
        assert!(err.cause().is_some());
    }

    #[test]
    fn cancelled_dispatch_counts_as_retryable() {
        let cancelled = RouteError::TransportFailure {
            worker: wid(),
            cause: FerryError::new(codes::TRANSPORT_IO, "aborted")
                .with_category(ErrorCategory::Cancelled),
        };
        assert_eq!(cancelled.category(), ErrorCategory::Cancelled);
        assert!(cancelled.is_retryable());
    }
}
