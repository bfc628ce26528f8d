//! 标识符契约，规范服务契约、实现与工作进程三类 ID 的构造与校验。
//!
//! # 设计动机（Why）
//! - 解析链路上三类标识符（契约、实现、工作进程）若都退化为裸字符串，过滤器与缓存键
//!   之间极易发生参数错位；新类型让编译器替我们守住边界；
//! - 统一经由 [`crate::types::NonEmptyStr`] 校验，保证 ID 不会是空白值。
//!
//! # 集成方式（How）
//! - 推荐通过 [`crate::prelude`] 一次性引入；
//! - ID 的生成规则（UUID、配置声明等）由部署方决定，落地前调用 `::parse` 完成契约校验。

use alloc::sync::Arc;
use core::fmt;

use serde::{Deserialize, Serialize};

use crate::{Result, types::NonEmptyStr};

/// 服务契约（Genericable）的全局唯一标识。
///
/// # 契约定义（What）
/// - **输入参数**：`value` 必须非空，在一次部署内全局唯一；
/// - **前置条件**：唯一性由注册机制保证，本类型仅负责结构校验；
/// - **后置条件**：构造成功后可通过 [`GenericableId::as_str`] 零拷贝读取。
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenericableId(NonEmptyStr);

impl GenericableId {
    /// 从原始字符串解析契约标识。
    pub fn parse(value: impl Into<Arc<str>>) -> Result<Self> {
        Ok(Self(NonEmptyStr::new(value)?))
    }

    /// 返回底层字符串切片。
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for GenericableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 具体实现（Fitable）的标识，在所属契约范围内唯一。
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FitableId(NonEmptyStr);

impl FitableId {
    /// 解析实现标识。
    pub fn parse(value: impl Into<Arc<str>>) -> Result<Self> {
        Ok(Self(NonEmptyStr::new(value)?))
    }

    /// 读取底层字符串切片。
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for FitableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 工作进程标识，在同一实现的同时在线实例中唯一。
///
/// 过滤链用它判定“本进程调用”，轮询策略用它的全序做确定性排序。
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(NonEmptyStr);

impl WorkerId {
    /// 解析工作进程标识。
    pub fn parse(value: impl Into<Arc<str>>) -> Result<Self> {
        Ok(Self(NonEmptyStr::new(value)?))
    }

    /// 读取底层字符串切片。
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_ids_are_rejected() {
        assert!(GenericableId::parse(" ").is_err());
        assert!(FitableId::parse("").is_err());
        assert!(WorkerId::parse("\t").is_err());
    }

    #[test]
    fn worker_ids_order_lexicographically() {
        let a = WorkerId::parse("worker-a").unwrap();
        let b = WorkerId::parse("worker-b").unwrap();
        assert!(a < b);
    }
}
