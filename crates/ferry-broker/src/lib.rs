//! # ferry-broker
//!
//! ## 定位与职责（Why）
//! - 实现调用代理的核心流水线：目标解析 → 能力过滤 → 候选挑选 → 格式协商 → 派发重试。
//!   调用方以契约标识加方法签名发起逻辑调用，本 crate 负责把它落到一个双方都能通信的
//!   具体工作进程实例上；
//! - 分布式状态（哪些目标存在、各自支持什么、谁是本地）只进不出：全部经由
//!   `ferry-core` 的协作者契约注入，本 crate 不实现服务发现存储与字节级编解码。
//!
//! ## 架构嵌入（Where）
//! - `retriever` 模块维护按 (genericable, fitable) 键控、受陈旧上界约束的目标缓存；
//! - `router` 模块把契约解析到唯一实现，产出歧义裁决；
//! - `filter` 模块实现本地短路与协议/格式能力裁剪的纯函数过滤链；
//! - `negotiate` 模块执行确定性的序列化格式协商；
//! - `select` 模块提供可插拔的候选挑选策略；
//! - `invoke` 模块编排整条状态机，承载重试预算与失败分类；
//! - `auth` 模块实现注册中心令牌的单飞（single-flight）刷新缓存；
//! - `error` 模块集中定义错误类型，统一向外暴露 `thiserror` 风格的诊断信息。
//!
//! ## 并发模型（Trade-offs）
//! - 能力值对象一经发布即不可变，读取无锁；缓存采用整表换新（copy-on-write），
//!   读者永远不会观察到半更新的列表；
//! - 过滤器与协商器是纯函数，天然并发安全；每次调用的尝试计数与排除集都是调用
//!   本地状态，不跨调用共享。

pub mod auth;
pub mod config;
pub mod error;
pub mod filter;
pub mod invoke;
pub mod negotiate;
pub mod retriever;
pub mod router;
pub mod select;
pub mod test_stubs;

pub use auth::{AuthenticatedDirectory, RegistryAuthenticator, SecuredDirectory, TokenService};
pub use config::BrokerConfig;
pub use error::RouteError;
pub use filter::{CapabilityFilter, FilterChain, LocalityFilter, TargetFilter};
pub use invoke::Invoker;
pub use negotiate::negotiate;
pub use retriever::TargetRetriever;
pub use router::route;
pub use select::{FirstAvailable, RoundRobin, SelectionStrategy};
