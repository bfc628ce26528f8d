//! 解析流水线消费的配置面。

use std::time::Duration;

use serde::Deserialize;

use ferry_core::{
    FerryError, Result, codes,
    protocol::{CommunicationProtocol, SerializationFormat},
};

/// 解析与派发的配置面。
///
/// # 契约说明（What）
/// - `request_timeout_ms`：单次派发的时间上界；
/// - `max_attempts`：一次逻辑调用的尝试预算，必须不小于 1；
/// - `cache_staleness_ms`：目标缓存的陈旧上界，任何调用方都不会读到比它更旧的列表；
/// - `protocol` / `format`：部署级的显式协议/格式要求，调用上下文的同名设置优先。
///
/// 配置由部署方拥有，本 crate 只消费；字段以毫秒计数，避免在配置文件中出现
/// 人类难以校对的复合时长语法。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrokerConfig {
    request_timeout_ms: u64,
    max_attempts: u32,
    cache_staleness_ms: u64,
    protocol: Option<CommunicationProtocol>,
    format: Option<SerializationFormat>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 3_000,
            max_attempts: 3,
            cache_staleness_ms: 10_000,
            protocol: None,
            format: None,
        }
    }
}

impl BrokerConfig {
    /// 从 TOML 文本解析配置并完成校验。
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|err| {
            FerryError::new(codes::APP_INVALID_ARGUMENT, "代理配置解析失败").with_cause(err)
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(FerryError::new(
                codes::APP_INVALID_ARGUMENT,
                "max_attempts 必须不小于 1",
            ));
        }
        Ok(())
    }

    /// 覆盖派发超时。
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis().min(u128::from(u64::MAX)) as u64;
        self
    }

    /// 覆盖尝试预算；零值会在 [`BrokerConfig::from_toml`] 与执行器处被拒绝。
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// 覆盖缓存陈旧上界。
    pub fn with_cache_staleness(mut self, staleness: Duration) -> Self {
        self.cache_staleness_ms = staleness.as_millis().min(u128::from(u64::MAX)) as u64;
        self
    }

    /// 设置部署级协议要求。
    pub fn with_protocol(mut self, protocol: CommunicationProtocol) -> Self {
        self.protocol = Some(protocol);
        self
    }

    /// 设置部署级格式要求。
    pub fn with_format(mut self, format: SerializationFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// 读取派发超时。
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// 读取尝试预算。
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// 读取缓存陈旧上界。
    pub fn cache_staleness(&self) -> Duration {
        Duration::from_millis(self.cache_staleness_ms)
    }

    /// 读取部署级协议要求。
    pub fn protocol(&self) -> Option<CommunicationProtocol> {
        self.protocol
    }

    /// 读取部署级格式要求。
    pub fn format(&self) -> Option<SerializationFormat> {
        self.format
    }
}
