//! revmark-pdf：基于 lopdf 的文档后端
//!
//! 实现 revmark-core 的 [`DocumentOps`] 能力集合。页面按加载时的
//! 顺序编号（从 0 起）；所有入参坐标都是顶部原点的页面坐标，在
//! 这里换算到 PDF 用户空间。

pub mod content;
pub mod insert;
pub mod page;
pub mod tables;

use anyhow::{anyhow, Result};
use lopdf::{Document, ObjectId};
use revmark_core::document::{DocumentOps, TableGrid, TextAlign};
use revmark_core::types::{Point, Rect};
use std::fs;
use std::path::Path;

/// 一份打开的 PDF 文档
pub struct PdfDocument {
    doc: Document,
    pages: Vec<ObjectId>,
}

impl PdfDocument {
    fn page_id(&self, page: usize) -> Result<ObjectId> {
        self.pages
            .get(page)
            .copied()
            .ok_or_else(|| anyhow!("页码越界: {page}（共 {} 页）", self.pages.len()))
    }
}

impl DocumentOps for PdfDocument {
    fn load(path: &Path) -> Result<Self> {
        let doc = Document::load(path)
            .map_err(|e| anyhow!("加载 PDF 失败 {}: {e}", path.display()))?;
        let pages: Vec<ObjectId> = doc.page_iter().collect();
        log::debug!("[文档] 打开 {}，共 {} 页", path.display(), pages.len());
        Ok(PdfDocument { doc, pages })
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_rotation(&self, page: usize) -> Result<i32> {
        let page_id = self.page_id(page)?;
        Ok(page::page_rotation(&self.doc, page_id))
    }

    fn page_size(&self, page: usize) -> Result<(f64, f64)> {
        let page_id = self.page_id(page)?;
        let geom = page::page_geom(&self.doc, page_id);
        Ok((geom.width(), geom.height()))
    }

    fn redact_rects(&mut self, page: usize, rects: &[Rect]) -> Result<()> {
        let page_id = self.page_id(page)?;
        let geom = page::page_geom(&self.doc, page_id);
        insert::erase_page_rects(&mut self.doc, page_id, &geom, rects)
    }

    fn insert_text(
        &mut self,
        page: usize,
        at: Point,
        text: &str,
        font: &str,
        size: f64,
        rotation: i32,
    ) -> Result<()> {
        let page_id = self.page_id(page)?;
        let geom = page::page_geom(&self.doc, page_id);
        insert::insert_text_at(
            &mut self.doc, page_id, &geom, at.x, at.y, text, font, size, rotation,
        )
    }

    fn insert_textbox(
        &mut self,
        page: usize,
        rect: Rect,
        text: &str,
        size: f64,
        align: TextAlign,
    ) -> Result<()> {
        let page_id = self.page_id(page)?;
        let geom = page::page_geom(&self.doc, page_id);
        insert::insert_textbox_at(
            &mut self.doc,
            page_id,
            &geom,
            rect,
            text,
            revmark_core::types::DEFAULT_FONT,
            size,
            align,
        )
    }

    fn find_tables(&self, page: usize, clip: Rect) -> Result<Vec<TableGrid>> {
        let page_id = self.page_id(page)?;
        let geom = page::page_geom(&self.doc, page_id);
        tables::find_tables_in_clip(&self.doc, page_id, &geom, clip)
    }

    fn save(&mut self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| anyhow!("创建输出目录失败 {}: {e}", parent.display()))?;
            }
        }
        self.doc.compress();
        self.doc
            .save(path)
            .map_err(|e| anyhow!("保存 PDF 失败 {}: {e}", path.display()))?;
        log::debug!("[文档] 已保存 {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};
    use tempfile::tempdir;

    /// 组一份单页文档写到磁盘，返回路径
    fn write_fixture(
        dir: &Path,
        name: &str,
        ops: Vec<Operation>,
        rotate: Option<i32>,
    ) -> std::path::PathBuf {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources = dictionary! {
            "Font" => dictionary! { "F1" => Object::Reference(font_id) },
        };
        let content = Content { operations: ops };
        let content_id = doc.add_object(Stream::new(
            lopdf::Dictionary::new(),
            content.encode().unwrap(),
        ));
        let mut page_dict = dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources,
            "Contents" => Object::Reference(content_id),
        };
        if let Some(r) = rotate {
            page_dict.set("Rotate", r as i64);
        }
        let page_id = doc.add_object(page_dict);
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let path = dir.join(name);
        doc.save(&path).unwrap();
        path
    }

    fn show_text(x: f64, y: f64, text: &str) -> Vec<Operation> {
        vec![
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(b"F1".to_vec()), Object::Real(8.0)],
            ),
            Operation::new("Td", vec![Object::Real(x as f32), Object::Real(y as f32)]),
            Operation::new(
                "Tj",
                vec![Object::String(
                    text.as_bytes().to_vec(),
                    lopdf::StringFormat::Literal,
                )],
            ),
            Operation::new("ET", vec![]),
        ]
    }

    #[test]
    fn test_load_and_page_metadata() {
        let dir = tempdir().unwrap();
        let path = write_fixture(dir.path(), "meta.pdf", vec![], Some(90));

        let doc = PdfDocument::load(&path).unwrap();
        assert_eq!(doc.page_count(), 1);
        assert_eq!(doc.page_rotation(0).unwrap(), 90);
        let (w, h) = doc.page_size(0).unwrap();
        assert_eq!((w, h), (612.0, 792.0));
    }

    #[test]
    fn test_page_out_of_bounds_is_error() {
        let dir = tempdir().unwrap();
        let path = write_fixture(dir.path(), "oob.pdf", vec![], None);

        let doc = PdfDocument::load(&path).unwrap();
        assert!(doc.page_rotation(5).is_err());
    }

    #[test]
    fn test_redact_then_save_round_trip() {
        let dir = tempdir().unwrap();
        // PDF 空间 y=700 对应顶部原点坐标 y=92
        let path = write_fixture(
            dir.path(),
            "in.pdf",
            show_text(100.0, 700.0, "CONFIDENTIAL"),
            None,
        );

        let mut doc = PdfDocument::load(&path).unwrap();
        doc.redact_rects(0, &[Rect::new(90.0, 80.0, 300.0, 110.0)])
            .unwrap();
        let out = dir.path().join("nested").join("out.pdf");
        doc.save(&out).unwrap();

        // 重新打开：矩形内不应再有可抽取文字
        let reopened = PdfDocument::load(&out).unwrap();
        let grids = reopened
            .find_tables(0, Rect::new(0.0, 0.0, 612.0, 792.0))
            .unwrap();
        assert!(
            grids.is_empty()
                || grids[0].rows.iter().flatten().all(|t| t.trim().is_empty())
        );
    }

    #[test]
    fn test_insert_text_visible_after_reload() {
        let dir = tempdir().unwrap();
        let path = write_fixture(dir.path(), "ins.pdf", vec![], None);

        let mut doc = PdfDocument::load(&path).unwrap();
        doc.insert_text(0, Point::new(50.0, 50.0), "P04", "Helvetica", 8.0, 0)
            .unwrap();
        let out = dir.path().join("ins_out.pdf");
        doc.save(&out).unwrap();

        let reopened = PdfDocument::load(&out).unwrap();
        let grids = reopened
            .find_tables(0, Rect::new(0.0, 0.0, 612.0, 792.0))
            .unwrap();
        assert_eq!(grids.len(), 1);
        assert_eq!(grids[0].rows[0][0], "P04");
    }

    #[test]
    fn test_find_tables_clusters_revision_rows() {
        let dir = tempdir().unwrap();
        let mut ops = Vec::new();
        // PDF 空间 y 越大越靠上：P02 行在 P01 行之上
        ops.extend(show_text(50.0, 180.0, "P01"));
        ops.extend(show_text(120.0, 180.0, "01-Jan-25"));
        ops.extend(show_text(50.0, 200.0, "P02"));
        ops.extend(show_text(120.0, 200.0, "14-Mar-25"));
        let path = write_fixture(dir.path(), "table.pdf", ops, None);

        let doc = PdfDocument::load(&path).unwrap();
        let clip = Rect::new(0.0, 550.0, 400.0, 650.0);
        let grids = doc.find_tables(0, clip).unwrap();
        assert_eq!(grids.len(), 1);
        let grid = &grids[0];
        assert_eq!(grid.rows.len(), 2);
        assert_eq!(grid.rows[0], vec!["P02", "14-Mar-25"]);
        assert_eq!(grid.rows[1], vec!["P01", "01-Jan-25"]);
    }
}
