//! 裁剪区域内的表格检测
//!
//! 不解析表格线，只按文字片段的几何对齐近似成行列：
//! 1. 取裁剪矩形内的全部文字片段；
//! 2. 按基线 Y 聚类成行（自上而下）；
//! 3. 按起始 X 跨行聚类成列；
//! 4. 每个单元取该行该列片段的拼接文字与包围盒。
//!
//! 返回的行列坐标已换算回顶部原点的页面坐标系。

use crate::content::{extract_spans, TextSpan};
use crate::page::{self, PageGeom, PdfRect};
use anyhow::Result;
use lopdf::{Document, ObjectId};
use revmark_core::document::TableGrid;
use revmark_core::types::Rect;

/// 同一行的基线 Y 容差
const ROW_TOLERANCE: f64 = 3.0;
/// 同一列的起始 X 容差
const COLUMN_TOLERANCE: f64 = 12.0;

/// 片段的近似包围盒（基线起点加估算宽高）
fn span_box(span: &TextSpan) -> PdfRect {
    PdfRect {
        x0: span.x,
        y0: span.y,
        x1: span.x + span.width,
        y1: span.y + span.size,
    }
}

/// 按基线 Y 把片段聚成行，行序自上而下（PDF 空间 Y 降序）
fn cluster_rows(mut spans: Vec<TextSpan>) -> Vec<Vec<TextSpan>> {
    spans.sort_by(|a, b| b.y.partial_cmp(&a.y).unwrap_or(std::cmp::Ordering::Equal));

    let mut rows: Vec<Vec<TextSpan>> = Vec::new();
    for span in spans {
        match rows.last_mut() {
            Some(row) if (row[0].y - span.y).abs() <= ROW_TOLERANCE => row.push(span),
            _ => rows.push(vec![span]),
        }
    }
    for row in &mut rows {
        row.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));
    }
    rows
}

/// 跨行聚类列起始 X，返回升序的列中心
fn cluster_columns(rows: &[Vec<TextSpan>]) -> Vec<f64> {
    let mut xs: Vec<f64> = rows.iter().flatten().map(|s| s.x).collect();
    xs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    // (列心, 成员数)，列心用滑动平均更新
    let mut clusters: Vec<(f64, f64)> = Vec::new();
    for x in xs {
        match clusters.last_mut() {
            Some((center, count)) if (x - *center).abs() <= COLUMN_TOLERANCE => {
                *count += 1.0;
                *center += (x - *center) / *count;
            }
            _ => clusters.push((x, 1.0)),
        }
    }
    clusters.into_iter().map(|(center, _)| center).collect()
}

fn column_index(centers: &[f64], x: f64) -> usize {
    let mut best = 0;
    let mut best_dist = f64::MAX;
    for (i, center) in centers.iter().enumerate() {
        let dist = (x - *center).abs();
        if dist < best_dist {
            best_dist = dist;
            best = i;
        }
    }
    best
}

/// 把聚类好的行列装配成网格
fn assemble_grid(geom: &PageGeom, rows: Vec<Vec<TextSpan>>) -> TableGrid {
    let centers = cluster_columns(&rows);
    let column_count = centers.len().max(1);

    let mut grid = TableGrid::default();
    for row in rows {
        let mut texts: Vec<String> = vec![String::new(); column_count];
        let mut boxes: Vec<Option<PdfRect>> = vec![None; column_count];

        for span in &row {
            let col = column_index(&centers, span.x);
            if !texts[col].is_empty() {
                texts[col].push(' ');
            }
            texts[col].push_str(span.text.trim());

            let b = span_box(span);
            boxes[col] = Some(match boxes[col] {
                Some(prev) => PdfRect {
                    x0: prev.x0.min(b.x0),
                    y0: prev.y0.min(b.y0),
                    x1: prev.x1.max(b.x1),
                    y1: prev.y1.max(b.y1),
                },
                None => b,
            });
        }

        // 空单元落在列心与该行基线上，保持行列下标对齐
        let row_y = row.first().map(|s| s.y).unwrap_or(0.0);
        let row_size = row.first().map(|s| s.size).unwrap_or(0.0);
        let cells: Vec<Rect> = boxes
            .iter()
            .enumerate()
            .map(|(i, b)| {
                let pdf = b.unwrap_or(PdfRect {
                    x0: centers.get(i).copied().unwrap_or(0.0),
                    y0: row_y,
                    x1: centers.get(i).copied().unwrap_or(0.0),
                    y1: row_y + row_size,
                });
                geom.to_page_rect(pdf)
            })
            .collect();

        grid.rows.push(texts);
        grid.cells.push(cells);
    }
    grid
}

/// 在裁剪矩形内检测表格；没有文字时返回空列表
pub fn find_tables_in_clip(
    doc: &Document,
    page_id: ObjectId,
    geom: &PageGeom,
    clip: Rect,
) -> Result<Vec<TableGrid>> {
    let content = page::page_content(doc, page_id)?;
    if content.is_empty() {
        return Ok(Vec::new());
    }

    let pdf_clip = geom.to_pdf_rect(clip);
    let spans: Vec<TextSpan> = extract_spans(&content)?
        .into_iter()
        .filter(|s| pdf_clip.contains(s.x, s.y))
        .collect();

    if spans.is_empty() {
        return Ok(Vec::new());
    }

    let rows = cluster_rows(spans);
    log::debug!("[表格] 裁剪区内聚出 {} 行", rows.len());
    Ok(vec![assemble_grid(geom, rows)])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(x: f64, y: f64, text: &str) -> TextSpan {
        TextSpan {
            x,
            y,
            width: text.len() as f64 * 4.4,
            size: 8.0,
            text: text.to_string(),
        }
    }

    fn geom() -> PageGeom {
        PageGeom { llx: 0.0, lly: 0.0, urx: 612.0, ury: 792.0 }
    }

    #[test]
    fn test_cluster_rows_orders_top_down() {
        let spans = vec![span(10.0, 100.0, "bottom"), span(10.0, 200.0, "top")];
        let rows = cluster_rows(spans);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0].text, "top");
        assert_eq!(rows[1][0].text, "bottom");
    }

    #[test]
    fn test_cluster_rows_merges_within_tolerance() {
        let spans = vec![
            span(10.0, 100.0, "a"),
            span(60.0, 101.5, "b"),
            span(110.0, 99.0, "c"),
        ];
        let rows = cluster_rows(spans);
        assert_eq!(rows.len(), 1);
        let texts: Vec<&str> = rows[0].iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_grid_aligns_columns_across_rows() {
        let spans = vec![
            span(50.0, 200.0, "P01"),
            span(120.0, 200.0, "01-Jan-25"),
            span(220.0, 200.0, "Issued"),
            span(51.0, 180.0, "P02"),
            span(121.0, 180.0, "02-Feb-25"),
            span(221.0, 180.0, "Revised"),
        ];
        let rows = cluster_rows(spans);
        let grid = assemble_grid(&geom(), rows);

        assert_eq!(grid.rows.len(), 2);
        assert_eq!(grid.rows[0], vec!["P01", "01-Jan-25", "Issued"]);
        assert_eq!(grid.rows[1], vec!["P02", "02-Feb-25", "Revised"]);
        assert_eq!(grid.cells[0].len(), 3);
        // 单元坐标是顶部原点坐标：y0 = 792 - (200 + 8)
        assert!((grid.cells[0][0].y0 - 584.0).abs() < 0.01);
        assert!((grid.cells[0][0].x0 - 50.0).abs() < 0.01);
    }

    #[test]
    fn test_grid_fills_missing_cells() {
        let spans = vec![
            span(50.0, 200.0, "P01"),
            span(120.0, 200.0, "01-Jan-25"),
            span(50.0, 180.0, "P02"),
        ];
        let rows = cluster_rows(spans);
        let grid = assemble_grid(&geom(), rows);

        assert_eq!(grid.rows[1], vec!["P02", ""]);
        assert_eq!(grid.cells[1].len(), 2);
    }

    #[test]
    fn test_multi_span_cell_concatenates() {
        // 三段起始 X 都落在同一列容差内
        let spans = vec![
            span(50.0, 200.0, "Issued"),
            span(55.0, 200.0, "for"),
            span(58.0, 200.0, "Tender"),
        ];
        let rows = cluster_rows(spans);
        let grid = assemble_grid(&geom(), rows);

        assert_eq!(grid.rows.len(), 1);
        assert_eq!(grid.rows[0], vec!["Issued for Tender"]);
    }
}
