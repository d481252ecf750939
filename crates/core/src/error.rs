//! 错误分类
//!
//! 分两档：表格/页面级条件就地恢复（记日志后继续），整档失败只
//! 终止当前任务，绝不影响其他任务或进度轮询。

use crate::rotate::InvalidRotation;
use thiserror::Error;

/// 单个任务的致命错误
#[derive(Debug, Error)]
pub enum EngineError {
    /// 旋转角度非法，当前任务失败
    #[error(transparent)]
    Rotation(#[from] InvalidRotation),

    /// 文档打开/保存失败
    #[error("文档读写失败: {0}")]
    DocumentIo(String),

    /// 脱敏或插入过程中后端抛出的其他错误
    #[error("页面变换失败: {0}")]
    Mutation(String),
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<InvalidRotation>() {
            Ok(rotation) => EngineError::Rotation(rotation),
            Err(other) => EngineError::Mutation(format!("{other:#}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anyhow_downcast_keeps_rotation_variant() {
        let err: anyhow::Error = InvalidRotation(45).into();
        let engine_err = EngineError::from(err);
        assert!(matches!(engine_err, EngineError::Rotation(InvalidRotation(45))));
    }

    #[test]
    fn test_other_anyhow_becomes_mutation() {
        let err = anyhow::anyhow!("stream decode failed");
        let engine_err = EngineError::from(err);
        assert!(matches!(engine_err, EngineError::Mutation(_)));
    }
}
