//! 解析 → 过滤 → 派发状态机的端到端测试。
//!
//! 所有协作者均使用 `test_stubs` 的脚本化替身，场景覆盖：本地短路、能力裁剪、
//! 失败目标排除、预算耗尽、目录通道故障、空候选、契约不匹配、派发超时与
//! 受保护目录的令牌换新。

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use ferry_broker::test_stubs::{
    FixedSerialization, RecordingLocalInvoker, ScriptedClient, ScriptedOutcome, StaticDirectory,
};
use ferry_broker::{
    AuthenticatedDirectory, BrokerConfig, Invoker, RegistryAuthenticator, RouteError,
    SecuredDirectory, TargetRetriever,
    test_stubs::ScriptedTokenService,
};
use ferry_core::prelude::*;

fn gid() -> GenericableId {
    GenericableId::parse("genericable.echo").unwrap()
}

fn fid() -> FitableId {
    FitableId::parse("fitable.default").unwrap()
}

fn local_worker() -> WorkerId {
    WorkerId::parse("local").unwrap()
}

fn genericable() -> Genericable {
    let method = MethodDescriptor::new("echo", "(String)->String").unwrap();
    Genericable::new(gid(), method)
        .with_fitables(vec![FitableMetadata::new(fid(), gid())])
        .unwrap()
}

fn remote(id: &str, format: SerializationFormat) -> Target {
    Target::new(WorkerId::parse(id).unwrap())
        .with_endpoints(vec![
            Endpoint::for_protocol("10.0.0.1", 8080, CommunicationProtocol::Http).unwrap(),
        ])
        .with_formats(vec![Format::from(format)])
}

fn ctx() -> CallContext {
    CallContext::for_worker(local_worker())
}

fn invoker_over(
    directory: Arc<StaticDirectory>,
    client: Arc<ScriptedClient>,
    caller_formats: Vec<i32>,
) -> Invoker {
    let config = BrokerConfig::default();
    let retriever = Arc::new(TargetRetriever::new(directory, config.cache_staleness()));
    Invoker::new(
        retriever,
        vec![client as Arc<dyn TransportClient>],
        Arc::new(FixedSerialization::new(caller_formats)),
        config,
    )
}

fn http_client() -> Arc<ScriptedClient> {
    Arc::new(ScriptedClient::new(vec![CommunicationProtocol::Http]))
}

#[tokio::test]
async fn local_target_bypasses_transport() {
    let directory = Arc::new(StaticDirectory::new());
    directory.put(
        gid(),
        fid(),
        vec![
            Target::new(local_worker()),
            remote("remote-1", SerializationFormat::Json),
        ],
    );
    let client = http_client();
    let local = Arc::new(RecordingLocalInvoker::new());
    let invoker = invoker_over(directory, client.clone(), vec![SerializationFormat::Json.code()])
        .with_local_invoker(local.clone());

    let response = invoker
        .invoke(&genericable(), Some(&fid()), &ctx(), Bytes::from_static(b"hi"))
        .await
        .unwrap();

    assert_eq!(response, Bytes::from_static(b"local"));
    assert_eq!(local.calls(), 1);
    assert!(client.invoked_workers().is_empty());
}

#[tokio::test]
async fn capability_mismatch_is_pruned_before_dispatch() {
    // 要求 json 时，cbor 候选在过滤阶段即被裁剪，派发只触达 json 实例。
    let directory = Arc::new(StaticDirectory::new());
    directory.put(
        gid(),
        fid(),
        vec![
            remote("w-json", SerializationFormat::Json),
            remote("w-cbor", SerializationFormat::Cbor),
        ],
    );
    let client = http_client();
    let invoker = invoker_over(directory, client.clone(), vec![SerializationFormat::Json.code()]);

    let response = invoker
        .invoke(
            &genericable(),
            Some(&fid()),
            &ctx().with_format(SerializationFormat::Json),
            Bytes::from_static(b"hi"),
        )
        .await
        .unwrap();

    assert_eq!(response, Bytes::from_static(b"ok"));
    let invoked = client.invoked_workers();
    assert_eq!(invoked.len(), 1);
    assert_eq!(invoked[0].as_str(), "w-json");
}

#[tokio::test]
async fn retry_never_reselects_failed_target() {
    let directory = Arc::new(StaticDirectory::new());
    directory.put(
        gid(),
        fid(),
        vec![
            remote("w1", SerializationFormat::Json),
            remote("w2", SerializationFormat::Json),
        ],
    );
    let client = http_client();
    client.push(ScriptedOutcome::Fail(
        FerryError::new(codes::TRANSPORT_IO, "connection reset")
            .with_category(ErrorCategory::Retryable(RetryAdvice::after(Duration::ZERO))),
    ));
    client.push(ScriptedOutcome::Reply(Bytes::from_static(b"second")));
    let invoker = invoker_over(directory, client.clone(), vec![SerializationFormat::Json.code()]);

    let response = invoker
        .invoke(&genericable(), Some(&fid()), &ctx(), Bytes::from_static(b"hi"))
        .await
        .unwrap();

    assert_eq!(response, Bytes::from_static(b"second"));
    let invoked = client.invoked_workers();
    assert_eq!(invoked.len(), 2);
    // 同一调用内绝不重选已失败的目标。
    assert_ne!(invoked[0], invoked[1]);
}

#[tokio::test]
async fn exhausted_candidates_surface_last_failure() {
    let directory = Arc::new(StaticDirectory::new());
    directory.put(gid(), fid(), vec![remote("w1", SerializationFormat::Json)]);
    let client = http_client();
    client.push(ScriptedOutcome::Fail(
        FerryError::new(codes::TRANSPORT_IO, "connection reset")
            .with_category(ErrorCategory::Retryable(RetryAdvice::after(Duration::ZERO))),
    ));
    let invoker = invoker_over(directory, client.clone(), vec![SerializationFormat::Json.code()]);

    let err = invoker
        .invoke(&genericable(), Some(&fid()), &ctx(), Bytes::from_static(b"hi"))
        .await
        .unwrap_err();

    // 唯一候选失败后候选集耗尽，透出最后一次分类失败而非另行包装。
    assert!(matches!(err, RouteError::TransportFailure { .. }));
    assert_eq!(client.invoked_workers().len(), 1);
}

#[tokio::test]
async fn router_unavailable_consumes_budget_then_surfaces() {
    // 目录通道故障按预算重试，耗尽后原样透出。
    let directory = Arc::new(StaticDirectory::new());
    directory.fail_next(10);
    let client = http_client();
    let invoker = invoker_over(
        directory.clone(),
        client,
        vec![SerializationFormat::Json.code()],
    );

    let err = invoker
        .invoke(
            &genericable(),
            Some(&fid()),
            &ctx().with_attempt_budget(NonZeroU32::new(3).unwrap()),
            Bytes::from_static(b"hi"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, RouteError::RouterUnavailable { .. }));
    assert!(err.is_retryable());
    assert_eq!(directory.lookup_count(), 3);
}

#[tokio::test]
async fn router_recovers_within_budget() {
    let directory = Arc::new(StaticDirectory::new());
    directory.put(gid(), fid(), vec![remote("w1", SerializationFormat::Json)]);
    directory.fail_next(1);
    let client = http_client();
    let invoker = invoker_over(
        directory.clone(),
        client,
        vec![SerializationFormat::Json.code()],
    );

    let response = invoker
        .invoke(&genericable(), Some(&fid()), &ctx(), Bytes::from_static(b"hi"))
        .await
        .unwrap();

    assert_eq!(response, Bytes::from_static(b"ok"));
    assert_eq!(directory.lookup_count(), 2);
}

#[tokio::test]
async fn zero_live_targets_is_no_candidate_not_empty_success() {
    // 查询成功但无目标承接：空候选不是空成功。
    let directory = Arc::new(StaticDirectory::new());
    directory.put(gid(), fid(), Vec::new());
    let client = http_client();
    let invoker = invoker_over(
        directory.clone(),
        client,
        vec![SerializationFormat::Json.code()],
    );

    let err = invoker
        .invoke(&genericable(), Some(&fid()), &ctx(), Bytes::from_static(b"hi"))
        .await
        .unwrap_err();

    assert!(matches!(err, RouteError::NoCandidateTarget { .. }));
    assert!(err.is_degradable());
    assert!(!err.is_retryable());
    // 空候选立即透出，不消耗剩余预算。
    assert_eq!(directory.lookup_count(), 1);
}

#[tokio::test]
async fn contract_mismatch_surfaces_immediately() {
    // 目标未声明格式（开放世界通过过滤），而调用方序列化服务无任何能力：
    // 协商阶段暴露部署偏斜，永久失败，不得消耗预算重试。
    let directory = Arc::new(StaticDirectory::new());
    let bare = Target::new(WorkerId::parse("w1").unwrap()).with_endpoints(vec![
        Endpoint::for_protocol("10.0.0.1", 8080, CommunicationProtocol::Http).unwrap(),
    ]);
    directory.put(gid(), fid(), vec![bare]);
    let client = http_client();
    let invoker = invoker_over(directory.clone(), client.clone(), Vec::new());

    let err = invoker
        .invoke(&genericable(), Some(&fid()), &ctx(), Bytes::from_static(b"hi"))
        .await
        .unwrap_err();

    assert!(matches!(err, RouteError::ContractMismatch { .. }));
    assert!(!err.is_retryable());
    assert!(client.invoked_workers().is_empty());
    assert_eq!(directory.lookup_count(), 1);
}

#[tokio::test]
async fn dispatch_timeout_rotates_to_next_candidate() {
    let directory = Arc::new(StaticDirectory::new());
    directory.put(
        gid(),
        fid(),
        vec![
            remote("w1", SerializationFormat::Json),
            remote("w2", SerializationFormat::Json),
        ],
    );
    let client = http_client();
    client.push(ScriptedOutcome::Hang(Duration::from_millis(500)));
    let invoker = invoker_over(directory, client.clone(), vec![SerializationFormat::Json.code()]);

    let response = invoker
        .invoke(
            &genericable(),
            Some(&fid()),
            &ctx().with_timeout(Duration::from_millis(50)),
            Bytes::from_static(b"hi"),
        )
        .await
        .unwrap();

    assert_eq!(response, Bytes::from_static(b"ok"));
    let invoked = client.invoked_workers();
    assert_eq!(invoked.len(), 2);
    assert_ne!(invoked[0], invoked[1]);
}

#[tokio::test]
async fn ambiguous_fitable_without_explicit_id() {
    let method = MethodDescriptor::new("echo", "(String)->String").unwrap();
    let ambiguous = Genericable::new(gid(), method)
        .with_fitables(vec![
            FitableMetadata::new(FitableId::parse("f1").unwrap(), gid()),
            FitableMetadata::new(FitableId::parse("f2").unwrap(), gid()),
        ])
        .unwrap();
    let directory = Arc::new(StaticDirectory::new());
    let client = http_client();
    let invoker = invoker_over(directory, client, vec![SerializationFormat::Json.code()]);

    let err = invoker
        .invoke(&ambiguous, None, &ctx(), Bytes::from_static(b"hi"))
        .await
        .unwrap_err();

    assert!(matches!(err, RouteError::AmbiguousFitable { count: 2, .. }));
    assert!(err.is_retryable());
}

/// 受保护目录替身：拒绝首个令牌，强制刷新后放行。
struct PickyDirectory {
    inner: StaticDirectory,
    rejected: std::sync::atomic::AtomicBool,
}

#[async_trait]
impl SecuredDirectory for PickyDirectory {
    async fn lookup_with_token(
        &self,
        token: &str,
        genericable: &GenericableId,
        fitable: &FitableId,
    ) -> Result<Vec<Target>, FerryError> {
        use std::sync::atomic::Ordering;
        if token == "access-0" && !self.rejected.swap(true, Ordering::SeqCst) {
            return Err(FerryError::new(codes::REGISTRY_UNAUTHORIZED, "token expired"));
        }
        self.inner.lookup(genericable, fitable).await
    }
}

#[tokio::test]
async fn authenticated_directory_refreshes_rejected_token() {
    let inner = StaticDirectory::new();
    inner.put(gid(), fid(), vec![remote("w1", SerializationFormat::Json)]);
    let remote_dir = Arc::new(PickyDirectory {
        inner,
        rejected: std::sync::atomic::AtomicBool::new(false),
    });
    let tokens = Arc::new(ScriptedTokenService::long_lived());
    let auth = Arc::new(RegistryAuthenticator::new(tokens.clone(), "ak", "sk"));
    let directory = Arc::new(AuthenticatedDirectory::new(remote_dir, auth));

    let config = BrokerConfig::default();
    let retriever = Arc::new(TargetRetriever::new(directory, config.cache_staleness()));
    let client = http_client();
    let invoker = Invoker::new(
        retriever,
        vec![client as Arc<dyn TransportClient>],
        Arc::new(FixedSerialization::new(vec![SerializationFormat::Json.code()])),
        config,
    );

    let response = invoker
        .invoke(&genericable(), Some(&fid()), &ctx(), Bytes::from_static(b"hi"))
        .await
        .unwrap();

    assert_eq!(response, Bytes::from_static(b"ok"));
    // 首个令牌被拒绝后恰好强制换新一次：一次初始申请，一次刷新。
    assert_eq!(tokens.apply_calls(), 1);
    assert_eq!(tokens.refresh_calls(), 1);
}
