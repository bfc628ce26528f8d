//! 基础类型契约，约束标识符与配置值不被空白字符串污染。

use alloc::{string::String, sync::Arc};
use core::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::{FerryError, Result, error::codes};

/// 非空字符串封装，是各类标识符新类型的底层载体。
///
/// # 设计背景（Why）
/// - 目录返回的数据与配置文件中，“空字符串代表未配置”是一个反复出现的隐性假设；
///   将非空约束前移到构造期，解析链路的后续阶段便无需再防御；
/// - 以 `Arc<str>` 存储，标识符在过滤链与缓存键之间多次克隆时仅增加引用计数。
///
/// # 契约说明（What）
/// - **输入参数**：[`NonEmptyStr::new`] 接受任意 `Into<Arc<str>>`，内部执行 `trim` 检查；
/// - **前置条件**：格式层面的校验（命名空间、大小写）由调用方负责，本类型只保证非空；
/// - **后置条件**：实例可安全克隆与跨线程传递，读取路径零拷贝。
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonEmptyStr(Arc<str>);

impl NonEmptyStr {
    /// 构造受非空约束保护的字符串；输入为空或全空白时返回 `app.invalid_argument`。
    pub fn new(value: impl Into<Arc<str>>) -> Result<Self> {
        let arc: Arc<str> = value.into();
        if arc.trim().is_empty() {
            return Err(FerryError::new(
                codes::APP_INVALID_ARGUMENT,
                "NonEmptyStr 要求输入不能为空或仅包含空白字符",
            ));
        }
        Ok(Self(arc))
    }

    /// 从编译期保证非空的静态字面量构造，供内建常量使用。
    pub(crate) fn from_static(value: &'static str) -> Self {
        debug_assert!(!value.trim().is_empty());
        Self(Arc::from(value))
    }

    /// 以 `&str` 视图访问底层数据。
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NonEmptyStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for NonEmptyStr {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for NonEmptyStr {
    /// 反序列化时复用构造期校验，空白输入直接转化为反序列化错误。
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> core::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_input() {
        assert!(NonEmptyStr::new("").is_err());
        assert!(NonEmptyStr::new("   ").is_err());
    }

    #[test]
    fn keeps_original_value() {
        let value = NonEmptyStr::new("genericable.echo").unwrap();
        assert_eq!(value.as_str(), "genericable.echo");
    }
}
