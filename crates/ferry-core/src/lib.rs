#![cfg_attr(not(feature = "std"), no_std)]

//! # ferry-core
//!
//! ## 定位与职责（Why）
//! - 作为调用代理（broker）体系的契约核心：一次逻辑服务调用（Genericable + 方法签名）
//!   需要被解析到一个具体实现（Fitable）在某个工作进程（Target）上的可达实例，本 crate
//!   沉淀这条链路上所有参与方共享的不可变能力模型与协作者接口；
//! - 解析、过滤与派发的编排逻辑属于实现 crate（`ferry-broker`），本 crate 只负责“语言”：
//!   值对象、上下文、错误域与外部协作者的窄接口，保证实现层可以在不同运行时中替换。
//!
//! ## 架构嵌入（Where）
//! - `capability` 模块承载 Genericable/Fitable/Target/Endpoint/Format 等不可变值对象；
//! - `context` 模块定义单次调用尝试的只读元数据 [`CallContext`]；
//! - `contract` 模块定义目录查询、传输客户端与序列化服务三类协作者契约；
//! - `error` 模块提供稳定错误码、重试/降级分类与统一的 [`Result`] 别名；
//! - `protocol` 模块登记内建通信协议与序列化格式的稳定编码。
//!
//! ## Feature 策略（Trade-offs）
//! - 默认启用 `std`；关闭后退化为 `no_std + alloc`，契约与值对象不依赖任何运行时，
//!   便于在受限环境（嵌入式代理、wasm 插件）中复用同一套能力模型。

extern crate alloc;

pub mod capability;
pub mod context;
pub mod contract;
pub mod error;
pub mod ids;
pub mod prelude;
pub mod protocol;
pub mod types;

pub use context::CallContext;
pub use error::{ErrorCategory, FerryError, Result, RetryAdvice, codes};
