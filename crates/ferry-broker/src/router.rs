//! 实现裁决：把契约解析到唯一的实现元数据。

use ferry_core::{
    capability::{FitableMetadata, Genericable},
    ids::FitableId,
};

use crate::error::RouteError;

/// 在契约的实现清单中裁决出唯一实现。
///
/// # 契约说明（What）
/// - 显式给出 `fitable` 时精确选中该实现，未注册的标识是永久失败
///   [`RouteError::UnknownFitable`]；
/// - 未给出时：恰有一个实现则选中它；零个实现为 [`RouteError::NoFitable`]；
///   多个等价实现且无裁决准则为 [`RouteError::AmbiguousFitable`]（可重试——
///   注册数据可能正在收敛）。
/// - 纯函数：相同输入恒产出相同结果。
pub fn route<'a>(
    genericable: &'a Genericable,
    fitable: Option<&FitableId>,
) -> Result<&'a FitableMetadata, RouteError> {
    match fitable {
        Some(id) => genericable
            .fitable(id)
            .ok_or_else(|| RouteError::UnknownFitable {
                genericable: genericable.id().clone(),
                fitable: id.clone(),
            }),
        None => match genericable.fitables() {
            [] => Err(RouteError::NoFitable {
                genericable: genericable.id().clone(),
            }),
            [only] => Ok(only),
            many => Err(RouteError::AmbiguousFitable {
                genericable: genericable.id().clone(),
                count: many.len(),
            }),
        },
    }
}
