//! 任务配置
//!
//! 批处理开始前装载一次，只读地分发给所有工作线程。JSON 是主格式；
//! 编辑器导出的表格格式由 [`crate::interchange`] 负责换算。

use crate::interchange;
use crate::types::{is_standard_font, InsertionPoint, Rect, Region, DEFAULT_FONT};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

fn default_slot_offset() -> usize {
    1
}

/// 修订表模板配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionConfig {
    /// 修订历史表的检测裁剪区
    pub table_clip: Rect,
    /// 当前修订号标签区
    pub rev_label_clip: Rect,
    #[serde(default)]
    pub revision_date: String,
    #[serde(default)]
    pub revision_description: String,
    /// 插入槽相对最新修订行向上的行数，模板约定默认 1
    #[serde(default = "default_slot_offset")]
    pub slot_offset: usize,
}

/// 一次批处理的完整配置快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub regions: Vec<Region>,
    #[serde(default)]
    pub insertions: Vec<InsertionPoint>,
    pub revision: RevisionConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON 解析失败: {0}")]
    Json(#[from] serde_json::Error),
    #[error("工作簿读取失败: {0}")]
    Workbook(String),
    #[error("CSV 读写失败: {0}")]
    Csv(#[from] csv::Error),
    #[error("不支持的配置格式: {0}")]
    UnsupportedFormat(String),
    #[error("配置不完整: {0}")]
    Incomplete(String),
}

impl JobConfig {
    /// 按扩展名装载配置：`.json` 为结构化形式，`.xlsx` 为编辑器导出的
    /// 工作簿，目录则视为一组 CSV 表
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.is_dir() {
            return interchange::import_csv_dir(path);
        }
        let ext = path
            .extension()
            .and_then(std::ffi::OsStr::to_str)
            .unwrap_or("")
            .to_lowercase();
        match ext.as_str() {
            "json" => Self::load_json(path),
            "xlsx" => interchange::import_xlsx(path),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn load_json(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save_json(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(path, raw)?;
        Ok(())
    }

    /// 把字体名规整到标准集合内，未知名称回退 Helvetica
    pub fn normalize_fonts(&mut self) {
        for insertion in &mut self.insertions {
            if !is_standard_font(&insertion.font) {
                log::warn!(
                    "[配置] 未知字体 {:?}，回退到 {}",
                    insertion.font,
                    DEFAULT_FONT
                );
                insertion.font = DEFAULT_FONT.to_string();
            }
        }
    }

    /// 批处理开工前的完整性检查
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.revision.revision_date.is_empty() {
            return Err(ConfigError::Incomplete("缺少修订日期".to_string()));
        }
        if self.revision.revision_description.is_empty() {
            return Err(ConfigError::Incomplete("缺少修订说明".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point;

    fn sample() -> JobConfig {
        JobConfig {
            regions: vec![Region {
                coordinates: Rect::new(10.0, 10.0, 50.0, 30.0),
                title: "Stamp".to_string(),
            }],
            insertions: vec![InsertionPoint {
                position: Point::new(60.0, 60.0),
                text: "APPROVED".to_string(),
                font: "Helvetica".to_string(),
                size: 12,
            }],
            revision: RevisionConfig {
                table_clip: Rect::new(2068.0, 829.5, 2331.0, 1000.0),
                rev_label_clip: Rect::new(2298.0, 1613.0, 2326.0, 1640.0),
                revision_date: "09-Jan-25".to_string(),
                revision_description: "Issued for Tender".to_string(),
                slot_offset: 1,
            },
        }
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        let config = sample();
        config.save_json(&path).unwrap();
        let loaded = JobConfig::load(&path).unwrap();
        assert_eq!(loaded.regions[0].title, "Stamp");
        assert_eq!(loaded.insertions[0].text, "APPROVED");
        assert_eq!(loaded.revision.revision_date, "09-Jan-25");
        assert_eq!(loaded.revision.slot_offset, 1);
    }

    #[test]
    fn test_slot_offset_defaults_to_one() {
        let raw = r#"{
            "regions": [],
            "insertions": [],
            "revision": {
                "table_clip": [0, 0, 10, 10],
                "rev_label_clip": [0, 0, 5, 5],
                "revision_date": "d",
                "revision_description": "s"
            }
        }"#;
        let config: JobConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.revision.slot_offset, 1);
    }

    #[test]
    fn test_unknown_font_falls_back() {
        let mut config = sample();
        config.insertions[0].font = "helv".to_string();
        config.normalize_fonts();
        assert_eq!(config.insertions[0].font, "Helvetica");
    }

    #[test]
    fn test_validate_requires_revision_fields() {
        let mut config = sample();
        config.revision.revision_description.clear();
        assert!(config.validate().is_err());
        config.revision.revision_description = "x".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unsupported_format_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.toml");
        std::fs::write(&path, "x").unwrap();
        assert!(matches!(
            JobConfig::load(&path),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }
}
