//! 序列化格式协商：在目标声明与调用方能力之间确定一种双方可用的格式。

use ferry_core::{
    capability::{Format, Target},
    protocol::SerializationFormat,
};

use crate::error::RouteError;

/// 为选定目标协商序列化格式。
///
/// # 契约说明（What）
/// - `preferred` 给出且双方都支持时，选它；
/// - 否则取目标声明顺序中第一个调用方也支持的格式——声明顺序即目标的偏好排序；
/// - 目标未声明格式时按无限制处理，落到调用方偏好列表的第一项；
/// - 不存在共同格式时返回 [`RouteError::ContractMismatch`]：这是部署偏斜，
///   永久失败，不得重试。
/// - 纯函数且确定性：相同输入的两次协商产出相同格式。
///
/// # 边界语义（Trade-offs）
/// - `caller_formats` 为空表示调用方序列化服务未声明任何能力：除非 `preferred`
///   显式给出（显式偏好来自配置或调用上下文，视为调用方的权威声明），否则协商失败；
/// - 双方都无声明且无偏好时同样失败——没有任何依据能命名一种格式。
pub fn negotiate(
    target: &Target,
    preferred: Option<SerializationFormat>,
    caller_formats: &[i32],
) -> Result<Format, RouteError> {
    if let Some(pref) = preferred {
        let target_ok = target.formats().is_empty() || target.declares_format(pref.code());
        let caller_ok = caller_formats.is_empty() || caller_formats.contains(&pref.code());
        if target_ok && caller_ok {
            return Ok(declared_or_builtin(target, pref));
        }
    }

    if target.formats().is_empty() {
        return caller_formats
            .iter()
            .find_map(|code| SerializationFormat::from_code(*code).map(Format::from))
            .ok_or_else(|| mismatch(target, "目标与调用方均未声明可命名的共同格式"));
    }

    target
        .formats()
        .iter()
        .find(|format| caller_formats.contains(&format.code()))
        .cloned()
        .ok_or_else(|| mismatch(target, "目标声明的格式与调用方支持集合无交集"))
}

/// 优先返回目标声明里的格式实例（带目标侧命名），内建枚举仅作兜底。
fn declared_or_builtin(target: &Target, pref: SerializationFormat) -> Format {
    target
        .formats()
        .iter()
        .find(|format| format.code() == pref.code())
        .cloned()
        .unwrap_or_else(|| Format::from(pref))
}

fn mismatch(target: &Target, detail: &str) -> RouteError {
    RouteError::ContractMismatch {
        worker: target.worker_id().clone(),
        detail: detail.into(),
    }
}
