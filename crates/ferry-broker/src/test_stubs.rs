//! 协作者契约的脚本化测试替身。
//!
//! 供本 crate 与下游集成测试复用：目录、传输客户端、序列化服务、本地派发与
//! 鉴权服务各有一个可编排的内存实现。替身只依赖既有运行时设施，不引入额外依赖。

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use ferry_core::{
    ErrorCategory, FerryError, codes,
    capability::{Endpoint, Format, Target},
    contract::{Directory, LocalInvoker, SerializationService, TransportClient},
    ids::{FitableId, GenericableId, WorkerId},
    protocol::CommunicationProtocol,
};

use crate::auth::{TokenGrant, TokenService};

/// 内存目录：按 (genericable, fitable) 存放目标列表，可编排失败次数。
pub struct StaticDirectory {
    entries: DashMap<(GenericableId, FitableId), Vec<Target>>,
    failures: AtomicU32,
    lookups: AtomicUsize,
}

impl Default for StaticDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticDirectory {
    /// 构造空目录。
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            failures: AtomicU32::new(0),
            lookups: AtomicUsize::new(0),
        }
    }

    /// 写入或替换某个键的目标列表。
    pub fn put(&self, genericable: GenericableId, fitable: FitableId, targets: Vec<Target>) {
        self.entries.insert((genericable, fitable), targets);
    }

    /// 令接下来的 `count` 次查询以通道错误失败。
    pub fn fail_next(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// 读取累计查询次数（含失败的）。
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn lookup(
        &self,
        genericable: &GenericableId,
        fitable: &FitableId,
    ) -> Result<Vec<Target>, FerryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok()
        {
            return Err(FerryError::new(codes::TRANSPORT_IO, "directory connection refused")
                .with_category(ErrorCategory::Retryable(
                    ferry_core::RetryAdvice::after(Duration::from_millis(10)),
                )));
        }
        Ok(self
            .entries
            .get(&(genericable.clone(), fitable.clone()))
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}

/// 传输客户端的单次派发脚本。
pub enum ScriptedOutcome {
    /// 返回指定响应。
    Reply(Bytes),
    /// 以指定错误失败。
    Fail(FerryError),
    /// 挂起指定时长后才应答，用于触发派发超时。
    Hang(Duration),
}

/// 脚本化传输客户端：按队列顺序消耗派发结果，并记录派发过的目标。
pub struct ScriptedClient {
    protocols: Vec<CommunicationProtocol>,
    outcomes: Mutex<VecDeque<ScriptedOutcome>>,
    invoked: Mutex<Vec<WorkerId>>,
}

impl ScriptedClient {
    /// 以支持的协议集合构造客户端，脚本队列初始为空。
    pub fn new(protocols: Vec<CommunicationProtocol>) -> Self {
        Self {
            protocols,
            outcomes: Mutex::new(VecDeque::new()),
            invoked: Mutex::new(Vec::new()),
        }
    }

    /// 追加一条派发脚本；队列耗尽后派发一律成功返回 `b"ok"`。
    pub fn push(&self, outcome: ScriptedOutcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    /// 读取按派发顺序记录的目标工作标识。
    pub fn invoked_workers(&self) -> Vec<WorkerId> {
        self.invoked.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransportClient for ScriptedClient {
    fn supported_protocols(&self) -> &[CommunicationProtocol] {
        &self.protocols
    }

    async fn invoke(
        &self,
        target: &Target,
        _endpoint: &Endpoint,
        _format: &Format,
        _payload: Bytes,
    ) -> Result<Bytes, FerryError> {
        self.invoked.lock().unwrap().push(target.worker_id().clone());
        let outcome = self.outcomes.lock().unwrap().pop_front();
        match outcome {
            None => Ok(Bytes::from_static(b"ok")),
            Some(ScriptedOutcome::Reply(bytes)) => Ok(bytes),
            Some(ScriptedOutcome::Fail(err)) => Err(err),
            Some(ScriptedOutcome::Hang(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(Bytes::from_static(b"late"))
            }
        }
    }
}

/// 固定能力的序列化服务。
pub struct FixedSerialization(Vec<i32>);

impl FixedSerialization {
    /// 以偏好顺序的格式编码构造。
    pub fn new(formats: Vec<i32>) -> Self {
        Self(formats)
    }
}

impl SerializationService for FixedSerialization {
    fn supported_formats(&self, _genericable: &GenericableId) -> Vec<i32> {
        self.0.clone()
    }
}

/// 记录调用的本进程派发替身。
pub struct RecordingLocalInvoker {
    calls: AtomicUsize,
}

impl Default for RecordingLocalInvoker {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingLocalInvoker {
    /// 构造计数归零的替身。
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    /// 读取本地派发次数。
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocalInvoker for RecordingLocalInvoker {
    async fn invoke_local(
        &self,
        _genericable: &GenericableId,
        _fitable: &FitableId,
        _payload: Bytes,
    ) -> Result<Bytes, FerryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Bytes::from_static(b"local"))
    }
}

/// 脚本化鉴权服务：签发自增编号的令牌并统计申请/刷新次数。
pub struct ScriptedTokenService {
    access_ttl: Duration,
    refresh_ttl: Duration,
    serial: AtomicUsize,
    applies: AtomicUsize,
    refreshes: AtomicUsize,
    reject_refresh: AtomicBool,
}

impl ScriptedTokenService {
    /// 以令牌有效窗口构造。
    pub fn new(access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            access_ttl,
            refresh_ttl,
            serial: AtomicUsize::new(0),
            applies: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
            reject_refresh: AtomicBool::new(false),
        }
    }

    /// 签发长期有效的令牌，适合“缓存命中”类测试。
    pub fn long_lived() -> Self {
        Self::new(Duration::from_secs(3600), Duration::from_secs(7200))
    }

    /// 令后续刷新一律被拒绝。
    pub fn reject_refresh(&self) {
        self.reject_refresh.store(true, Ordering::SeqCst);
    }

    /// 读取申请次数。
    pub fn apply_calls(&self) -> usize {
        self.applies.load(Ordering::SeqCst)
    }

    /// 读取刷新次数。
    pub fn refresh_calls(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    fn grant(&self) -> TokenGrant {
        let serial = self.serial.fetch_add(1, Ordering::SeqCst);
        TokenGrant::new(
            format!("access-{serial}"),
            format!("refresh-{serial}"),
            self.access_ttl,
            self.refresh_ttl,
        )
    }
}

#[async_trait]
impl TokenService for ScriptedTokenService {
    async fn apply(
        &self,
        _access_key: &str,
        _timestamp: &str,
        _signature: &str,
    ) -> Result<TokenGrant, FerryError> {
        self.applies.fetch_add(1, Ordering::SeqCst);
        Ok(self.grant())
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant, FerryError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        if self.reject_refresh.load(Ordering::SeqCst) {
            return Err(FerryError::new(
                codes::REGISTRY_UNAUTHORIZED,
                "refresh token rejected",
            ));
        }
        Ok(self.grant())
    }
}
