//! 单文档变换引擎
//!
//! 每页按固定顺序执行：先登记并提交所有删除区域的脱敏，再写入
//! 插入点文字，最后在裁剪区内检测修订表并完成"插行 + 改标签"。
//! 顺序不可调换：脱敏先清空旧标签区，后续插入才能读到干净的几何。
//!
//! 表格/页面级的失败就地恢复并记入报告；文档级错误向上冒泡，
//! 由任务边界转换成该任务的失败结果。

use crate::config::JobConfig;
use crate::document::{DocumentOps, TextAlign};
use crate::error::EngineError;
use crate::revision::{plan_revision, NewRevisionFields, RevisionOutcome};
use crate::rotate::{adjust_point, adjust_rect, normalize_rotation};
use crate::types::Rect;

/// 修订表写入使用的字号（左对齐插行、居中标签共用）
const REVISION_FONT_SIZE: f64 = 8.0;

/// 页面级与表格级的非致命条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineWarning {
    /// 裁剪区内没有检测到表格
    TableDetectionEmpty { page: usize },
    /// 某张表的修订分析被跳过
    RevisionSkipped {
        page: usize,
        table: usize,
        reason: &'static str,
    },
}

/// 一份文档处理完后的非致命事件汇总
#[derive(Debug, Default)]
pub struct MutationReport {
    pub warnings: Vec<EngineWarning>,
}

/// 对一份已打开的文档执行全部页面变换
pub fn mutate_document<D: DocumentOps>(
    doc: &mut D,
    config: &JobConfig,
) -> Result<MutationReport, EngineError> {
    let mut report = MutationReport::default();
    let fields = NewRevisionFields {
        date: config.revision.revision_date.clone(),
        description: config.revision.revision_description.clone(),
    };

    for page in 0..doc.page_count() {
        // 1. 读取页面旋转与未旋转尺寸，本页所有几何都按它们换算
        let rotation = normalize_rotation(doc.page_rotation(page)?);
        let (width, height) = doc.page_size(page)?;

        // 2/3. 登记所有删除区域并一次性提交脱敏
        let mut redactions = Vec::with_capacity(config.regions.len());
        for region in &config.regions {
            redactions.push(adjust_rect(region.coordinates, rotation, height, width)?);
        }
        if !redactions.is_empty() {
            doc.redact_rects(page, &redactions)?;
        }

        // 4. 插入点文字，方向跟随页面旋转
        for insertion in &config.insertions {
            let at = adjust_point(insertion.position, rotation, height, width)?;
            doc.insert_text(
                page,
                at,
                &insertion.text,
                &insertion.font,
                insertion.size as f64,
                rotation,
            )?;
        }

        // 5. 在裁剪区内检测修订表
        let table_clip = adjust_rect(config.revision.table_clip, rotation, height, width)?;
        let tables = doc.find_tables(page, table_clip)?;
        if tables.is_empty() {
            log::warn!("[引擎] 第 {} 页裁剪区内未检测到表格", page + 1);
            report.warnings.push(EngineWarning::TableDetectionEmpty { page });
            continue;
        }

        // 6. 逐表分析并执行"插行 + 改标签"
        let label = adjust_rect(config.revision.rev_label_clip, rotation, height, width)?;
        for (table_index, table) in tables.iter().enumerate() {
            match plan_revision(
                &table.rows,
                &table.cells,
                &fields,
                config.revision.slot_offset,
            ) {
                RevisionOutcome::Planned(plan) => {
                    apply_revision(doc, page, label, &plan.next_code, &plan.cells)?;
                    log::info!(
                        "[引擎] 第 {} 页表 {}：修订推进到 {}",
                        page + 1,
                        table_index + 1,
                        plan.next_code
                    );
                }
                outcome => {
                    // 非致命：跳过这张表，继续处理后续表和页
                    let reason = outcome.skip_reason().unwrap_or("未知原因");
                    log::warn!(
                        "[引擎] 第 {} 页表 {} 被跳过: {}",
                        page + 1,
                        table_index + 1,
                        reason
                    );
                    report.warnings.push(EngineWarning::RevisionSkipped {
                        page,
                        table: table_index,
                        reason,
                    });
                }
            }
        }
    }

    Ok(report)
}

/// 执行单张表的修订写入：插行单元左对齐，标签区先脱敏再居中写入新号
fn apply_revision<D: DocumentOps>(
    doc: &mut D,
    page: usize,
    label: Rect,
    next_code: &str,
    cells: &[crate::revision::CellWrite],
) -> Result<(), EngineError> {
    for cell in cells {
        doc.insert_textbox(page, cell.rect, &cell.text, REVISION_FONT_SIZE, TextAlign::Left)?;
    }
    doc.redact_rects(page, &[label])?;
    doc.insert_textbox(page, label, next_code, REVISION_FONT_SIZE, TextAlign::Center)?;
    Ok(())
}

/// 打开、变换、保存一份文档；任何一步失败都由调用方记为该任务的失败。
/// 保存放在最后：中途失败不会写出任何输出文件。
pub fn run_job<D: DocumentOps>(
    input_path: &std::path::Path,
    output_path: &std::path::Path,
    config: &JobConfig,
) -> Result<MutationReport, EngineError> {
    let mut doc =
        D::load(input_path).map_err(|e| EngineError::DocumentIo(format!("{e:#}")))?;
    let report = mutate_document(&mut doc, config)?;
    doc.save(output_path)
        .map_err(|e| EngineError::DocumentIo(format!("{e:#}")))?;
    Ok(report)
}
