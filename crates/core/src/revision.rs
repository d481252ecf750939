//! 修订历史表解析与递增
//!
//! 输入是文档库抽取出的表格单元文字与单元包围盒，输出一个"修订计划"：
//! 下一个修订号、要插入的整行内容，以及每个单元的文字落位矩形。
//!
//! 表格模板约定：最新修订位于自上而下第一个 0 列以 `P` 开头的行，
//! 其上方预留了空行作为插入槽。槽与最新行的行距 `slot_offset`
//! 是模板参数（默认 1），不硬编码在算法里。

use crate::types::Rect;

/// 修订号前缀
const REVISION_PREFIX: char = 'P';

/// 单元文字落位时左边缘向右的固定偏移
const CELL_TEXT_INSET: f64 = 2.0;

/// 单元底边向下的扩展量，容纳多行折行
const CELL_TEXT_OVERFLOW: f64 = 50.0;

/// 新修订行的可变字段；第 4、5 列从最新修订行照抄
#[derive(Debug, Clone)]
pub struct NewRevisionFields {
    pub date: String,
    pub description: String,
}

/// 一个单元的写入计划：文字与落位矩形
#[derive(Debug, Clone, PartialEq)]
pub struct CellWrite {
    pub rect: Rect,
    pub text: String,
}

/// 修订计划：分析成功时返回
#[derive(Debug, Clone)]
pub struct RevisionPlan {
    /// 下一个修订号，如 `P06`
    pub next_code: String,
    /// 完整的新行内容（含超出表格宽度而未落位的列）
    pub row: Vec<String>,
    /// 每个有效列的落位
    pub cells: Vec<CellWrite>,
    /// 最新修订行的行号
    pub latest_index: usize,
}

/// 分析结果：跳过原因用值表达，调用方按变体分支而不是捕获异常
#[derive(Debug, Clone)]
pub enum RevisionOutcome {
    Planned(RevisionPlan),
    /// 没有任何一行的 0 列以 `P` 开头
    NoRevisionFound,
    /// 修订号后缀不是数字，如 `PXX`
    InvalidRevisionFormat { code: String },
    /// 最新修订行上方没有预留的插入槽
    NoInsertionSlot,
}

impl RevisionOutcome {
    /// 非致命跳过原因的简短描述，用于日志与批处理汇总
    pub fn skip_reason(&self) -> Option<&'static str> {
        match self {
            RevisionOutcome::Planned(_) => None,
            RevisionOutcome::NoRevisionFound => Some("未找到修订行"),
            RevisionOutcome::InvalidRevisionFormat { .. } => Some("修订号格式无效"),
            RevisionOutcome::NoInsertionSlot => Some("没有可用的插入槽"),
        }
    }
}

/// 在抽取出的表格里定位最新修订并生成插入计划
///
/// `rows` 与 `cells` 按相同的行列下标对齐。扫描自上而下，在第一个
/// 命中的行停止：表格按"最新在上"排列，第一个 `P` 行即最新修订。
pub fn plan_revision(
    rows: &[Vec<String>],
    cells: &[Vec<Rect>],
    fields: &NewRevisionFields,
    slot_offset: usize,
) -> RevisionOutcome {
    let latest = rows.iter().enumerate().find_map(|(index, row)| {
        let code = row.first().map(String::as_str).unwrap_or("");
        if !code.is_empty() && code.starts_with(REVISION_PREFIX) {
            Some((index, code))
        } else {
            None
        }
    });

    let Some((latest_index, latest_code)) = latest else {
        return RevisionOutcome::NoRevisionFound;
    };

    let next_code = match next_revision_code(latest_code) {
        Some(code) => code,
        None => {
            return RevisionOutcome::InvalidRevisionFormat {
                code: latest_code.to_string(),
            }
        }
    };

    // 插入槽在最新修订行上方 slot_offset 行
    let Some(slot_index) = latest_index.checked_sub(slot_offset) else {
        return RevisionOutcome::NoInsertionSlot;
    };

    let latest_row = &rows[latest_index];
    let carry = |column: usize| latest_row.get(column).cloned().unwrap_or_default();
    let row = vec![
        next_code.clone(),
        fields.date.clone(),
        fields.description.clone(),
        carry(3),
        carry(4),
    ];

    let slot_cells = cells.get(slot_index).map(Vec::as_slice).unwrap_or(&[]);
    let cell_writes = row
        .iter()
        .zip(slot_cells.iter())
        .filter(|(text, _)| !text.is_empty())
        .map(|(text, cell)| CellWrite {
            rect: placement_rect(*cell),
            text: text.clone(),
        })
        .collect();

    RevisionOutcome::Planned(RevisionPlan {
        next_code,
        row,
        cells: cell_writes,
        latest_index,
    })
}

/// `P05 -> P06`；后缀无法解析时返回 `None`
///
/// 两位零填充是模板约定，`P99` 之后会产生三位的 `P100`，
/// 这里不截断也不另行处理。
fn next_revision_code(code: &str) -> Option<String> {
    let suffix = code.strip_prefix(REVISION_PREFIX)?;
    let number: u32 = suffix.trim().parse().ok()?;
    Some(format!("{}{:02}", REVISION_PREFIX, number + 1))
}

/// 由插入槽单元格计算文字落位矩形：
/// 左边缘右移 [`CELL_TEXT_INSET`]，底边下探 [`CELL_TEXT_OVERFLOW`]，
/// 其余边保持单元格原状。
fn placement_rect(cell: Rect) -> Rect {
    Rect::new(
        cell.x0 + CELL_TEXT_INSET,
        cell.y0,
        cell.x1,
        cell.y1 + CELL_TEXT_OVERFLOW,
    )
}
