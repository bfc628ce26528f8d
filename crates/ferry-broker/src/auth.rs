//! 注册中心令牌：单飞（single-flight）刷新的线程安全惰性缓存。
//!
//! # 设计总览（Why）
//! - 目录查询走受保护通道时需要携带访问令牌；令牌的申请与刷新是跨进程往返，
//!   绝不能让每个并发调用各自发起一次；
//! - 读路径必须无锁：令牌一旦填充，任何读者都不应为了拿“当前令牌”而阻塞；
//! - 刷新收敛在单个临界区内：同时发现过期的并发读者中只有一个执行上游调用，
//!   其余在临界区入口等待后直接复用新令牌。
//!
//! # 实现策略（How）
//! - 当前令牌放在 `ArcSwapOption` 槽位中，读取是一次原子加载；
//! - 申请/刷新由 `tokio::sync::Mutex` 串行化，拿到锁后先做双重检查，
//!   避免对同一次过期重复回源；
//! - 刷新失败或刷新令牌本身过期时回退到重新申请，对应上游鉴权服务的语义。

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use ferry_core::{
    FerryError,
    capability::Target,
    contract::Directory,
    ids::{FitableId, GenericableId},
    codes,
};

/// 鉴权服务签发的一组令牌及其有效窗口。
#[derive(Clone, Debug)]
pub struct TokenGrant {
    access_token: String,
    refresh_token: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenGrant {
    /// 构造签发结果。
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            access_ttl,
            refresh_ttl,
        }
    }

    /// 读取访问令牌。
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// 读取刷新令牌。
    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }
}

/// 带本地获取时刻的令牌快照。
#[derive(Debug)]
pub struct ClientToken {
    grant: TokenGrant,
    obtained_at: Instant,
}

impl ClientToken {
    /// 读取访问令牌。
    pub fn access_token(&self) -> &str {
        self.grant.access_token()
    }

    fn access_expired(&self) -> bool {
        self.obtained_at.elapsed() >= self.grant.access_ttl
    }

    fn refresh_expired(&self) -> bool {
        self.obtained_at.elapsed() >= self.grant.refresh_ttl
    }
}

/// 上游鉴权服务契约。
///
/// # 契约说明（What）
/// - `apply`：以访问键、时间戳与签名换取新令牌；签名构造见 [`sign`]；
/// - `refresh`：以刷新令牌换取新令牌；刷新令牌失效时应返回
///   `registry.unauthorized` 错误码，调用方据此回退到重新申请。
#[async_trait]
pub trait TokenService: Send + Sync {
    /// 申请新令牌。
    async fn apply(
        &self,
        access_key: &str,
        timestamp: &str,
        signature: &str,
    ) -> Result<TokenGrant, FerryError>;

    /// 以刷新令牌换取新令牌。
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, FerryError>;
}

/// 以密钥对 `access_key + timestamp` 做键控摘要，十六进制编码。
pub fn sign(timestamp: &str, access_key: &str, secret_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret_key.as_bytes());
    hasher.update(access_key.as_bytes());
    hasher.update(timestamp.as_bytes());
    hex::encode(hasher.finalize())
}

/// 注册中心令牌的单飞刷新缓存。
///
/// # 契约说明（What）
/// - [`RegistryAuthenticator::token`]：返回未过期的当前令牌；过期或尚未填充时
///   触发一次串行化的申请/刷新；
/// - [`RegistryAuthenticator::force_refresh`]：绕过新鲜度检查强制换新，
///   供“令牌被上游拒绝”的调用路径使用；
/// - **并发后置条件**：同一次过期窗口内的 N 个并发读者至多引发一次上游调用。
pub struct RegistryAuthenticator {
    service: Arc<dyn TokenService>,
    access_key: String,
    secret_key: String,
    current: ArcSwapOption<ClientToken>,
    refresh_gate: Mutex<()>,
}

impl RegistryAuthenticator {
    /// 以鉴权服务与密钥对构造缓存，令牌槽位初始为空。
    pub fn new(
        service: Arc<dyn TokenService>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            service,
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            current: ArcSwapOption::const_empty(),
            refresh_gate: Mutex::new(()),
        }
    }

    /// 读取当前令牌，必要时触发单飞换新。
    pub async fn token(&self) -> Result<Arc<ClientToken>, FerryError> {
        if let Some(token) = self.current.load_full() {
            if !token.access_expired() {
                return Ok(token);
            }
        }
        self.renew(false).await
    }

    /// 强制换新当前令牌。
    pub async fn force_refresh(&self) -> Result<Arc<ClientToken>, FerryError> {
        self.renew(true).await
    }

    async fn renew(&self, force: bool) -> Result<Arc<ClientToken>, FerryError> {
        let _gate = self.refresh_gate.lock().await;
        // 双重检查：排队期间别的读者可能已经完成了换新。
        if !force {
            if let Some(token) = self.current.load_full() {
                if !token.access_expired() {
                    return Ok(token);
                }
            }
        }

        let grant = match self.current.load_full() {
            Some(token) if !token.refresh_expired() => {
                match self.service.refresh(token.grant.refresh_token()).await {
                    Ok(grant) => grant,
                    Err(err) => {
                        tracing::warn!(error = %err, "令牌刷新失败，回退到重新申请");
                        self.apply_new().await?
                    }
                }
            }
            _ => self.apply_new().await?,
        };

        let token = Arc::new(ClientToken {
            grant,
            obtained_at: Instant::now(),
        });
        self.current.store(Some(Arc::clone(&token)));
        Ok(token)
    }

    async fn apply_new(&self) -> Result<TokenGrant, FerryError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|err| {
                FerryError::new(codes::APP_INVALID_ARGUMENT, "系统时钟早于 UNIX 纪元")
                    .with_cause(err)
            })?
            .as_secs()
            .to_string();
        let signature = sign(&timestamp, &self.access_key, &self.secret_key);
        self.service
            .apply(&self.access_key, &timestamp, &signature)
            .await
    }
}

/// 受保护目录的窄接口：查询时必须携带访问令牌。
#[async_trait]
pub trait SecuredDirectory: Send + Sync {
    /// 携带令牌查询目标列表。
    async fn lookup_with_token(
        &self,
        token: &str,
        genericable: &GenericableId,
        fitable: &FitableId,
    ) -> Result<Vec<Target>, FerryError>;
}

/// 把受保护目录适配为普通 [`Directory`] 的装饰器。
///
/// 查询前取当前令牌；上游以 `registry.unauthorized` 拒绝时强制刷新一次并重试，
/// 仍失败则原样透出，由解析器分类为 `broker.router_unavailable`。
pub struct AuthenticatedDirectory {
    remote: Arc<dyn SecuredDirectory>,
    auth: Arc<RegistryAuthenticator>,
}

impl AuthenticatedDirectory {
    /// 以受保护目录与令牌缓存构造装饰器。
    pub fn new(remote: Arc<dyn SecuredDirectory>, auth: Arc<RegistryAuthenticator>) -> Self {
        Self { remote, auth }
    }
}

#[async_trait]
impl Directory for AuthenticatedDirectory {
    async fn lookup(
        &self,
        genericable: &GenericableId,
        fitable: &FitableId,
    ) -> Result<Vec<Target>, FerryError> {
        let token = self.auth.token().await?;
        match self
            .remote
            .lookup_with_token(token.access_token(), genericable, fitable)
            .await
        {
            Err(err) if err.code() == codes::REGISTRY_UNAUTHORIZED => {
                tracing::warn!(genericable = %genericable, "令牌被上游拒绝，强制刷新后重试一次");
                let token = self.auth.force_refresh().await?;
                self.remote
                    .lookup_with_token(token.access_token(), genericable, fitable)
                    .await
            }
            other => other,
        }
    }
}
