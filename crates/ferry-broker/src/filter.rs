//! 候选过滤链：本地短路与协议/格式能力裁剪。
//!
//! # 设计总览（Why）
//! - 目录返回的原始候选集需要经过多准则裁剪才能派发：本进程内的实例永远优先于
//!   远端实例；远端实例必须与调用方存在可用的协议与格式交集；
//! - 过滤器是其输入的纯函数：不持有隐藏可变状态，链条顺序与产出完全确定，
//!   可以在单元测试中逐个隔离验证。
//!
//! # 契约说明（What）
//! - 过滤器按声明顺序依次执行，每个过滤器消费前一个的产出；
//! - **本地短路是硬规则**：只要候选集中存在 workerId 等于本进程标识的目标，
//!   结果就恰为该目标，后续任何准则不再参与——进程内调用无条件胜过远程调用。

use std::collections::BTreeSet;
use std::sync::Arc;

use ferry_core::{
    CallContext,
    capability::{FitableMetadata, Target},
    contract::{SerializationService, TransportClient},
    ids::{GenericableId, WorkerId},
};

/// 单个候选过滤器的契约。
///
/// # 契约说明（What）
/// - **输入**：实现元数据、本进程工作标识、上游候选集与调用上下文；
/// - **纯函数要求**：实现不得持有随调用变化的可变状态，相同输入必须产出相同结果；
/// - **输出**：裁剪后的候选集，实现可以整体替换但不得修改单个 `Target`。
pub trait TargetFilter: Send + Sync {
    /// 依据自身准则裁剪候选集。
    fn filter(
        &self,
        fitable: &FitableMetadata,
        local_worker: &WorkerId,
        candidates: Vec<Target>,
        ctx: &CallContext,
    ) -> Vec<Target>;
}

/// 按声明顺序执行的过滤链。
pub struct FilterChain {
    filters: Vec<Arc<dyn TargetFilter>>,
}

impl FilterChain {
    /// 以固定顺序的过滤器列表构造链条。
    pub fn new(filters: Vec<Arc<dyn TargetFilter>>) -> Self {
        Self { filters }
    }

    /// 依次应用所有过滤器。
    pub fn apply(
        &self,
        fitable: &FitableMetadata,
        local_worker: &WorkerId,
        candidates: Vec<Target>,
        ctx: &CallContext,
    ) -> Vec<Target> {
        self.filters.iter().fold(candidates, |survivors, filter| {
            filter.filter(fitable, local_worker, survivors, ctx)
        })
    }
}

fn find_local(candidates: &[Target], local_worker: &WorkerId) -> Option<Target> {
    candidates
        .iter()
        .find(|target| target.worker_id() == local_worker)
        .cloned()
}

/// 本地优先过滤器。
///
/// 候选集中存在本进程实例时，结果恰为该实例；否则原样放行。
pub struct LocalityFilter;

impl TargetFilter for LocalityFilter {
    fn filter(
        &self,
        _fitable: &FitableMetadata,
        local_worker: &WorkerId,
        candidates: Vec<Target>,
        _ctx: &CallContext,
    ) -> Vec<Target> {
        match find_local(&candidates, local_worker) {
            Some(local) => vec![local],
            None => candidates,
        }
    }
}

/// 协议/格式能力过滤器。
///
/// # 教案式解读
/// - **意图（Why）**：远端候选必须满足两个半边——协议半边与格式半边——才值得派发；
///   在这里裁剪掉注定失败的候选，比在派发阶段报错便宜得多；
/// - **判定规则（What）**：
///   - 协议半边：显式要求协议时，候选须声明对应端点；未要求时，候选的某个端点协议
///     落在可用传输客户端的支持集合内即可；
///   - 格式半边：显式要求格式时，候选须声明该格式；未要求时，候选声明与序列化服务
///     支持集合存在交集即可；
///   - 候选未声明端点或格式的，按“该维度无限制”放行对应半边（开放世界默认）；
///   - 本地短路在本过滤器内同样成立，与上游原始实现保持一致；
/// - **构造方式（How）**：[`CapabilityFilter::from_call`] 在调用期采集传输客户端与
///   序列化服务的能力快照，过滤本身不再触碰协作者。
pub struct CapabilityFilter {
    client_protocols: BTreeSet<i32>,
    caller_formats: Vec<i32>,
    required_protocol: Option<i32>,
    required_format: Option<i32>,
}

impl CapabilityFilter {
    /// 直接以能力快照构造，供测试与特殊部署使用。
    pub fn new(
        client_protocols: BTreeSet<i32>,
        caller_formats: Vec<i32>,
        required_protocol: Option<i32>,
        required_format: Option<i32>,
    ) -> Self {
        Self {
            client_protocols,
            caller_formats,
            required_protocol,
            required_format,
        }
    }

    /// 在调用期采集能力快照构造过滤器。
    ///
    /// `required_protocol` / `required_format` 为已经合并了配置默认值的显式要求。
    pub fn from_call(
        clients: &[Arc<dyn TransportClient>],
        serialization: &dyn SerializationService,
        genericable: &GenericableId,
        required_protocol: Option<i32>,
        required_format: Option<i32>,
    ) -> Self {
        let client_protocols = clients
            .iter()
            .flat_map(|client| client.supported_protocols())
            .map(|protocol| protocol.code())
            .collect();
        Self {
            client_protocols,
            caller_formats: serialization.supported_formats(genericable),
            required_protocol,
            required_format,
        }
    }

    fn protocol_half(&self, target: &Target) -> bool {
        if target.endpoints().is_empty() {
            return true;
        }
        match self.required_protocol {
            Some(code) => target.declares_protocol(code),
            None => target
                .endpoints()
                .iter()
                .any(|endpoint| self.client_protocols.contains(&endpoint.protocol_code())),
        }
    }

    fn format_half(&self, target: &Target) -> bool {
        if target.formats().is_empty() {
            return true;
        }
        match self.required_format {
            Some(code) => target.declares_format(code),
            None => target
                .formats()
                .iter()
                .any(|format| self.caller_formats.contains(&format.code())),
        }
    }
}

impl TargetFilter for CapabilityFilter {
    fn filter(
        &self,
        _fitable: &FitableMetadata,
        local_worker: &WorkerId,
        candidates: Vec<Target>,
        _ctx: &CallContext,
    ) -> Vec<Target> {
        if let Some(local) = find_local(&candidates, local_worker) {
            return vec![local];
        }
        candidates
            .into_iter()
            .filter(|target| self.protocol_half(target) && self.format_half(target))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::capability::{Endpoint, Format};
    use ferry_core::ids::FitableId;
    use ferry_core::protocol::{CommunicationProtocol, SerializationFormat};

    fn fitable() -> FitableMetadata {
        let gid = GenericableId::parse("g").unwrap();
        FitableMetadata::new(FitableId::parse("f").unwrap(), gid)
    }

    fn worker(id: &str) -> WorkerId {
        WorkerId::parse(id).unwrap()
    }

    fn ctx() -> CallContext {
        CallContext::for_worker(worker("local"))
    }

    fn remote(id: &str, protocol: CommunicationProtocol, format: SerializationFormat) -> Target {
        Target::new(worker(id))
            .with_endpoints(vec![Endpoint::for_protocol("host", 8080, protocol).unwrap()])
            .with_formats(vec![Format::from(format)])
    }

    fn http_json_filter() -> CapabilityFilter {
        CapabilityFilter::new(
            BTreeSet::from([CommunicationProtocol::Http.code()]),
            vec![SerializationFormat::Json.code()],
            Some(CommunicationProtocol::Http.code()),
            Some(SerializationFormat::Json.code()),
        )
    }

    #[test]
    fn local_candidate_short_circuits_everything() {
        let candidates = vec![
            Target::new(worker("local")),
            remote("remote", CommunicationProtocol::Http, SerializationFormat::Json),
        ];
        let survivors =
            http_json_filter().filter(&fitable(), &worker("local"), candidates, &ctx());
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].worker_id(), &worker("local"));
    }

    #[test]
    fn requested_protocol_and_format_prune_mismatches() {
        let candidates = vec![
            remote("w1", CommunicationProtocol::Http, SerializationFormat::Json),
            remote("w2", CommunicationProtocol::Http, SerializationFormat::Cbor),
        ];
        let survivors =
            http_json_filter().filter(&fitable(), &worker("local"), candidates, &ctx());
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].worker_id(), &worker("w1"));
    }

    #[test]
    fn unspecified_requirements_fall_back_to_capability_intersection() {
        let filter = CapabilityFilter::new(
            BTreeSet::from([CommunicationProtocol::Http.code()]),
            vec![SerializationFormat::Json.code()],
            None,
            None,
        );
        let candidates = vec![
            remote("w1", CommunicationProtocol::Http, SerializationFormat::Json),
            remote("w2", CommunicationProtocol::Grpc, SerializationFormat::Json),
            remote("w3", CommunicationProtocol::Http, SerializationFormat::Cbor),
        ];
        let survivors = filter.filter(&fitable(), &worker("local"), candidates, &ctx());
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].worker_id(), &worker("w1"));
    }

    #[test]
    fn undeclared_axes_pass_open_world() {
        // 未声明端点与格式的候选在两个半边都放行。
        let bare = Target::new(worker("w1"));
        let survivors =
            http_json_filter().filter(&fitable(), &worker("local"), vec![bare], &ctx());
        assert_eq!(survivors.len(), 1);
    }

    #[test]
    fn locality_filter_passes_through_without_local_match() {
        let candidates = vec![
            remote("w1", CommunicationProtocol::Http, SerializationFormat::Json),
            remote("w2", CommunicationProtocol::Grpc, SerializationFormat::Cbor),
        ];
        let survivors =
            LocalityFilter.filter(&fitable(), &worker("local"), candidates.clone(), &ctx());
        assert_eq!(survivors, candidates);
    }

    #[test]
    fn chain_applies_filters_in_declared_order() {
        let chain = FilterChain::new(vec![
            Arc::new(LocalityFilter),
            Arc::new(http_json_filter()),
        ]);
        let candidates = vec![
            remote("w1", CommunicationProtocol::Http, SerializationFormat::Json),
            remote("w2", CommunicationProtocol::Http, SerializationFormat::Cbor),
        ];
        let survivors = chain.apply(&fitable(), &worker("local"), candidates, &ctx());
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].worker_id(), &worker("w1"));
    }
}
