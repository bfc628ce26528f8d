//! 调用执行器：编排解析 → 过滤 → 挑选 → 协商 → 派发的完整状态机。

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use ferry_core::{
    CallContext, ErrorCategory,
    capability::{Endpoint, FitableMetadata, Genericable, Target},
    contract::{LocalInvoker, SerializationService, TransportClient},
    ids::{FitableId, WorkerId},
    protocol::{CommunicationProtocol, SerializationFormat},
};

use crate::{
    config::BrokerConfig,
    error::RouteError,
    filter::{CapabilityFilter, FilterChain, LocalityFilter, TargetFilter},
    negotiate::negotiate,
    retriever::TargetRetriever,
    router,
    select::{RoundRobin, SelectionStrategy},
};

/// `Invoker` 把一次逻辑契约调用落到具体工作进程实例上。
///
/// # 教案式解读
/// - **意图（Why）**：调用方只声明“调用哪个契约（可选指定实现）、从哪里发起、
///   有什么显式约束”；目标发现、能力裁剪、失败分类与重试全部收敛在这里，
///   调用方看到的或者是结果，或者是一个携带处置分类的失败。
/// - **状态机（How）**：每次尝试依次经历
///   Resolving（目录解析）→ Filtering（过滤链）→ Selecting（策略挑选）→
///   Negotiating（格式协商）→ Dispatching（派发）：
///   - 解析失败是可重试的 [`RouteError::RouterUnavailable`]，计入尝试预算后重来；
///   - 过滤产出空集：首次即空为 [`RouteError::NoCandidateTarget`]（可降级，立即透出）；
///     因排除集而空说明候选耗尽，透出最后一次分类失败；
///   - 协商失败与无可用通道是永久失败，立即透出，不消耗剩余预算；
///   - 派发的传输失败（含超时与在途取消）可重试：失败目标进入排除集，
///     换候选重来，同一调用内绝不重选已失败的目标。
/// - **并发（Trade-offs）**：执行器自身无共享可变状态（挑选策略的游标除外，
///   它是有意跨调用共享的），尝试计数与排除集都是调用本地变量。
pub struct Invoker {
    retriever: Arc<TargetRetriever>,
    clients: Vec<Arc<dyn TransportClient>>,
    serialization: Arc<dyn SerializationService>,
    strategy: Arc<dyn SelectionStrategy>,
    local: Option<Arc<dyn LocalInvoker>>,
    config: BrokerConfig,
}

impl Invoker {
    /// 构造执行器，挑选策略默认为稳定轮询。
    pub fn new(
        retriever: Arc<TargetRetriever>,
        clients: Vec<Arc<dyn TransportClient>>,
        serialization: Arc<dyn SerializationService>,
        config: BrokerConfig,
    ) -> Self {
        Self {
            retriever,
            clients,
            serialization,
            strategy: Arc::new(RoundRobin::new()),
            local: None,
            config,
        }
    }

    /// 替换挑选策略。
    pub fn with_strategy(mut self, strategy: Arc<dyn SelectionStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// 挂载本进程内派发通道；缺省时本地目标也走传输客户端。
    pub fn with_local_invoker(mut self, local: Arc<dyn LocalInvoker>) -> Self {
        self.local = Some(local);
        self
    }

    /// 执行一次逻辑调用。
    ///
    /// # 契约说明（What）
    /// - `fitable` 显式给出时精确调用该实现；否则契约下须恰有一个实现；
    /// - 重试预算取调用上下文覆盖值，否则取配置的 `max_attempts`；
    /// - 预算耗尽或候选耗尽时，原样透出最后一次分类失败。
    pub async fn invoke(
        &self,
        genericable: &Genericable,
        fitable: Option<&FitableId>,
        ctx: &CallContext,
        payload: Bytes,
    ) -> Result<Bytes, RouteError> {
        let resolved = router::route(genericable, fitable)?;
        let budget = ctx
            .attempt_budget()
            .map(|b| b.get())
            .unwrap_or_else(|| self.config.max_attempts());
        let timeout = ctx.timeout().unwrap_or_else(|| self.config.request_timeout());
        let protocol = ctx.protocol().or_else(|| self.config.protocol());
        let format = ctx.format().or_else(|| self.config.format());

        let chain = FilterChain::new(vec![
            Arc::new(LocalityFilter) as Arc<dyn TargetFilter>,
            Arc::new(CapabilityFilter::from_call(
                &self.clients,
                self.serialization.as_ref(),
                genericable.id(),
                protocol.map(CommunicationProtocol::code),
                format.map(|f| f.code()),
            )),
        ]);

        let mut excluded: HashSet<WorkerId> = HashSet::new();
        let mut last: Option<RouteError> = None;

        for attempt in 1..=budget {
            let targets = match self
                .retriever
                .resolve(genericable.id(), resolved.id())
                .await
            {
                Ok(targets) => targets,
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "目录解析失败，消耗一次尝试");
                    last = Some(err);
                    continue;
                }
            };

            let feasible: Vec<Target> = chain
                .apply(resolved, ctx.local_worker(), targets.to_vec(), ctx)
                .into_iter()
                .filter(|target| !excluded.contains(target.worker_id()))
                .collect();

            if feasible.is_empty() {
                if excluded.is_empty() {
                    return Err(RouteError::NoCandidateTarget {
                        genericable: genericable.id().clone(),
                        fitable: resolved.id().clone(),
                    });
                }
                // 候选耗尽：所有可行目标都在本调用中失败过。
                break;
            }

            let Some(target) = self.strategy.select(&feasible) else {
                break;
            };
            tracing::debug!(
                attempt,
                worker = %target.worker_id(),
                genericable = %genericable.id(),
                "目标选定，进入派发"
            );

            match self
                .dispatch(resolved, &target, protocol, format, timeout, payload.clone(), ctx)
                .await
            {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() => {
                    tracing::warn!(
                        attempt,
                        worker = %target.worker_id(),
                        error = %err,
                        "派发失败，目标进入排除集"
                    );
                    excluded.insert(target.worker_id().clone());
                    last = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last.unwrap_or_else(|| RouteError::NoCandidateTarget {
            genericable: genericable.id().clone(),
            fitable: resolved.id().clone(),
        }))
    }

    /// 单次派发：本地目标走进程内通道，远端目标经协商与传输客户端。
    #[allow(clippy::too_many_arguments)]
    async fn dispatch(
        &self,
        fitable: &FitableMetadata,
        target: &Target,
        protocol: Option<CommunicationProtocol>,
        format: Option<SerializationFormat>,
        timeout: Duration,
        payload: Bytes,
        ctx: &CallContext,
    ) -> Result<Bytes, RouteError> {
        if target.worker_id() == ctx.local_worker() {
            if let Some(local) = &self.local {
                let call =
                    local.invoke_local(fitable.genericable_id(), fitable.id(), payload);
                return self.bounded(target, timeout, call).await;
            }
        }

        let chosen = negotiate(
            target,
            format,
            &self.serialization.supported_formats(fitable.genericable_id()),
        )?;
        let (client, endpoint) = self.pick_channel(target, protocol)?;
        let call = client.invoke(target, endpoint, &chosen, payload);
        self.bounded(target, timeout, call).await
    }

    /// 为派发施加时间上界，并把失败折叠进错误域。
    async fn bounded(
        &self,
        target: &Target,
        timeout: Duration,
        call: impl Future<Output = Result<Bytes, ferry_core::FerryError>>,
    ) -> Result<Bytes, RouteError> {
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(cause)) => {
                // 显式声明为永久失败的底层错误不参与重试。
                if matches!(cause.category(), Some(ErrorCategory::NonRetryable)) {
                    return Err(RouteError::ContractMismatch {
                        worker: target.worker_id().clone(),
                        detail: cause.to_string(),
                    });
                }
                Err(RouteError::TransportFailure {
                    worker: target.worker_id().clone(),
                    cause,
                })
            }
            Err(_elapsed) => Err(RouteError::DispatchTimeout {
                worker: target.worker_id().clone(),
                waited: timeout,
            }),
        }
    }

    /// 选出“端点协议与某个客户端支持集合有交集”的派发通道。
    ///
    /// 显式要求协议时只接受对应端点；未要求时按目标端点声明顺序取第一个可用组合。
    /// 选不出组合是部署偏斜，分类为永久的 [`RouteError::ContractMismatch`]。
    fn pick_channel<'a>(
        &'a self,
        target: &'a Target,
        protocol: Option<CommunicationProtocol>,
    ) -> Result<(&'a Arc<dyn TransportClient>, &'a Endpoint), RouteError> {
        let mismatch = |detail: &str| RouteError::ContractMismatch {
            worker: target.worker_id().clone(),
            detail: detail.into(),
        };

        if target.endpoints().is_empty() {
            return Err(mismatch("目标未声明任何可派发端点"));
        }

        let supports = |client: &Arc<dyn TransportClient>, code: i32| {
            client
                .supported_protocols()
                .iter()
                .any(|candidate| candidate.code() == code)
        };

        match protocol {
            Some(required) => {
                let endpoint = target
                    .endpoint_for(required.code())
                    .ok_or_else(|| mismatch("目标未声明要求的协议端点"))?;
                let client = self
                    .clients
                    .iter()
                    .find(|client| supports(client, required.code()))
                    .ok_or_else(|| mismatch("没有支持要求协议的传输客户端"))?;
                Ok((client, endpoint))
            }
            None => target
                .endpoints()
                .iter()
                .find_map(|endpoint| {
                    self.clients
                        .iter()
                        .find(|client| supports(client, endpoint.protocol_code()))
                        .map(|client| (client, endpoint))
                })
                .ok_or_else(|| mismatch("目标端点协议与可用客户端无交集")),
        }
    }
}
