//! 编辑器互通格式
//!
//! 编辑器按"一个关注点一张表"导出：
//! - `Deletion Areas`：`X0,Y0,X1,Y1,Title`
//! - `Insertion Points`：`X,Y,Text,Font,Size`
//! - `Table and Revision Areas`：`Type,X0,Y0,X1,Y1`，Type ∈ {Table, Revision}
//!
//! 本模块读入 `.xlsx` 工作簿（编辑器原生导出）与同列序的 CSV 表，
//! 写出 CSV 表；另有"仅区域"的 JSON 列表形式。字段集合与列序必须
//! 与编辑器保持一字不差，否则两边无法互导。
//!
//! 注意：工作簿里不含修订日期与说明，这两项由调用方单独提供。

use crate::config::{ConfigError, JobConfig, RevisionConfig};
use crate::types::{InsertionPoint, Point, Rect, Region};
use calamine::{open_workbook, Data, Reader, Xlsx};
use std::fs;
use std::path::Path;

pub const DELETION_SHEET: &str = "Deletion Areas";
pub const INSERTION_SHEET: &str = "Insertion Points";
pub const REVISION_SHEET: &str = "Table and Revision Areas";

const DELETION_HEADER: [&str; 5] = ["X0", "Y0", "X1", "Y1", "Title"];
const INSERTION_HEADER: [&str; 5] = ["X", "Y", "Text", "Font", "Size"];
const REVISION_HEADER: [&str; 5] = ["Type", "X0", "Y0", "X1", "Y1"];

fn cell_f64(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(f) => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn cell_str(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// 从编辑器导出的 `.xlsx` 工作簿装载配置
pub fn import_xlsx(path: &Path) -> Result<JobConfig, ConfigError> {
    let mut workbook: Xlsx<_> =
        open_workbook(path).map_err(|e: calamine::XlsxError| ConfigError::Workbook(e.to_string()))?;

    let mut regions = Vec::new();
    if let Ok(range) = workbook.worksheet_range(DELETION_SHEET) {
        for row in range.rows().skip(1) {
            let coords: Vec<f64> = row.iter().take(4).filter_map(cell_f64).collect();
            if coords.len() < 4 {
                continue;
            }
            regions.push(Region {
                coordinates: Rect::new(coords[0], coords[1], coords[2], coords[3]),
                title: row.get(4).map(cell_str).unwrap_or_default(),
            });
        }
    }

    let mut insertions = Vec::new();
    if let Ok(range) = workbook.worksheet_range(INSERTION_SHEET) {
        for row in range.rows().skip(1) {
            let (Some(x), Some(y)) = (
                row.first().and_then(cell_f64),
                row.get(1).and_then(cell_f64),
            ) else {
                continue;
            };
            insertions.push(InsertionPoint {
                position: Point::new(x, y),
                text: row.get(2).map(cell_str).unwrap_or_default(),
                font: row.get(3).map(cell_str).unwrap_or_default(),
                size: row.get(4).and_then(cell_f64).unwrap_or(8.0) as u32,
            });
        }
    }

    let mut table_clip = None;
    let mut rev_label_clip = None;
    if let Ok(range) = workbook.worksheet_range(REVISION_SHEET) {
        for row in range.rows().skip(1) {
            let kind = row.first().map(cell_str).unwrap_or_default();
            let coords: Vec<f64> = row.iter().skip(1).take(4).filter_map(cell_f64).collect();
            if coords.len() < 4 {
                continue;
            }
            let rect = Rect::new(coords[0], coords[1], coords[2], coords[3]);
            match kind.as_str() {
                "Table" => table_clip = Some(rect),
                "Revision" => rev_label_clip = Some(rect),
                other => log::warn!("[互通] 未知的区域类型 {other:?}，已忽略"),
            }
        }
    }

    build_config(regions, insertions, table_clip, rev_label_clip)
}

/// 从目录中的三张 CSV 表装载配置，文件名与工作簿的表名一致
pub fn import_csv_dir(dir: &Path) -> Result<JobConfig, ConfigError> {
    let mut regions = Vec::new();
    let deletion_path = dir.join(format!("{DELETION_SHEET}.csv"));
    if deletion_path.exists() {
        let mut reader = csv::Reader::from_path(&deletion_path)?;
        for record in reader.records() {
            let record = record?;
            let coords: Vec<f64> = (0..4)
                .filter_map(|i| record.get(i).and_then(|s| s.trim().parse().ok()))
                .collect();
            if coords.len() < 4 {
                continue;
            }
            regions.push(Region {
                coordinates: Rect::new(coords[0], coords[1], coords[2], coords[3]),
                title: record.get(4).unwrap_or("").to_string(),
            });
        }
    }

    let mut insertions = Vec::new();
    let insertion_path = dir.join(format!("{INSERTION_SHEET}.csv"));
    if insertion_path.exists() {
        let mut reader = csv::Reader::from_path(&insertion_path)?;
        for record in reader.records() {
            let record = record?;
            let (Some(x), Some(y)) = (
                record.get(0).and_then(|s| s.trim().parse().ok()),
                record.get(1).and_then(|s| s.trim().parse().ok()),
            ) else {
                continue;
            };
            insertions.push(InsertionPoint {
                position: Point::new(x, y),
                text: record.get(2).unwrap_or("").to_string(),
                font: record.get(3).unwrap_or("").to_string(),
                size: record
                    .get(4)
                    .and_then(|s| s.trim().parse().ok())
                    .unwrap_or(8),
            });
        }
    }

    let mut table_clip = None;
    let mut rev_label_clip = None;
    let revision_path = dir.join(format!("{REVISION_SHEET}.csv"));
    if revision_path.exists() {
        let mut reader = csv::Reader::from_path(&revision_path)?;
        for record in reader.records() {
            let record = record?;
            let coords: Vec<f64> = (1..5)
                .filter_map(|i| record.get(i).and_then(|s| s.trim().parse().ok()))
                .collect();
            if coords.len() < 4 {
                continue;
            }
            let rect = Rect::new(coords[0], coords[1], coords[2], coords[3]);
            match record.get(0).unwrap_or("") {
                "Table" => table_clip = Some(rect),
                "Revision" => rev_label_clip = Some(rect),
                other => log::warn!("[互通] 未知的区域类型 {other:?}，已忽略"),
            }
        }
    }

    build_config(regions, insertions, table_clip, rev_label_clip)
}

/// 把配置写成三张 CSV 表，列序与编辑器导出的工作簿一致
pub fn export_csv_dir(config: &JobConfig, dir: &Path) -> Result<(), ConfigError> {
    fs::create_dir_all(dir)?;

    let mut writer = csv::Writer::from_path(dir.join(format!("{DELETION_SHEET}.csv")))?;
    writer.write_record(DELETION_HEADER)?;
    for region in &config.regions {
        let r = region.coordinates;
        writer.write_record([
            r.x0.to_string(),
            r.y0.to_string(),
            r.x1.to_string(),
            r.y1.to_string(),
            region.title.clone(),
        ])?;
    }
    writer.flush()?;

    let mut writer = csv::Writer::from_path(dir.join(format!("{INSERTION_SHEET}.csv")))?;
    writer.write_record(INSERTION_HEADER)?;
    for insertion in &config.insertions {
        writer.write_record([
            insertion.position.x.to_string(),
            insertion.position.y.to_string(),
            insertion.text.clone(),
            insertion.font.clone(),
            insertion.size.to_string(),
        ])?;
    }
    writer.flush()?;

    let mut writer = csv::Writer::from_path(dir.join(format!("{REVISION_SHEET}.csv")))?;
    writer.write_record(REVISION_HEADER)?;
    for (kind, rect) in [
        ("Table", config.revision.table_clip),
        ("Revision", config.revision.rev_label_clip),
    ] {
        writer.write_record([
            kind.to_string(),
            rect.x0.to_string(),
            rect.y0.to_string(),
            rect.x1.to_string(),
            rect.y1.to_string(),
        ])?;
    }
    writer.flush()?;

    Ok(())
}

/// 仅区域的 JSON 列表（编辑器的快捷导入/导出形式）
pub fn export_regions_json(regions: &[Region], path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let raw = serde_json::to_string_pretty(regions)?;
    fs::write(path, raw)?;
    Ok(())
}

pub fn import_regions_json(path: &Path) -> Result<Vec<Region>, ConfigError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn build_config(
    regions: Vec<Region>,
    insertions: Vec<InsertionPoint>,
    table_clip: Option<Rect>,
    rev_label_clip: Option<Rect>,
) -> Result<JobConfig, ConfigError> {
    let table_clip =
        table_clip.ok_or_else(|| ConfigError::Incomplete("缺少 Table 裁剪区".to_string()))?;
    let rev_label_clip =
        rev_label_clip.ok_or_else(|| ConfigError::Incomplete("缺少 Revision 标签区".to_string()))?;
    Ok(JobConfig {
        regions,
        insertions,
        revision: RevisionConfig {
            table_clip,
            rev_label_clip,
            // 日期与说明不在表格格式里，由调用方补充
            revision_date: String::new(),
            revision_description: String::new(),
            slot_offset: 1,
        },
    })
}
