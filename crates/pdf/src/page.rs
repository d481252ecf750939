//! 页面级辅助：旋转、边界框、内容流读写与坐标换算
//!
//! 任务配置里的坐标以页面左上角为原点、Y 轴向下；PDF 用户空间以
//! 左下角为原点、Y 轴向上。两套坐标在这里统一换算，换算时带上
//! MediaBox/CropBox 的原点偏移。

use anyhow::{anyhow, Result};
use lopdf::{Document, Object, Stream};
use revmark_core::types::{Point, Rect};

/// PDF 用户空间里的矩形，Y 轴向上
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfRect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl PdfRect {
    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }

    /// 字形包围盒与矩形是否相交
    pub fn intersects_glyph(&self, x: f64, y: f64, width: f64, height: f64) -> bool {
        let x_overlap = x < self.x1 && x + width > self.x0;
        let y_overlap = y < self.y1 && y + height > self.y0;
        x_overlap && y_overlap
    }
}

/// 页面的有效边界框（CropBox 优先）
#[derive(Debug, Clone, Copy)]
pub struct PageGeom {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl PageGeom {
    pub fn width(&self) -> f64 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f64 {
        self.ury - self.lly
    }

    /// 顶部原点的页面矩形 -> PDF 用户空间矩形
    pub fn to_pdf_rect(&self, r: Rect) -> PdfRect {
        PdfRect {
            x0: self.llx + r.x0,
            y0: self.ury - r.y1,
            x1: self.llx + r.x1,
            y1: self.ury - r.y0,
        }
    }

    /// 顶部原点的页面点 -> PDF 用户空间点
    pub fn to_pdf_point(&self, p: Point) -> (f64, f64) {
        (self.llx + p.x, self.ury - p.y)
    }

    /// PDF 用户空间矩形 -> 顶部原点的页面矩形
    pub fn to_page_rect(&self, r: PdfRect) -> Rect {
        Rect::new(r.x0 - self.llx, self.ury - r.y1, r.x1 - self.llx, self.ury - r.y0)
    }
}

/// 从 Object 取数值
pub fn get_number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// 从数组对象抽取 4 个边界值
fn extract_box_values(arr: &[Object]) -> Option<(f64, f64, f64, f64)> {
    let values: Vec<f64> = arr.iter().filter_map(get_number).collect();
    if values.len() == 4 {
        Some((values[0], values[1], values[2], values[3]))
    } else {
        None
    }
}

/// 页面 `/Rotate`，缺省取 0；页面自身没有时向父节点继承
pub fn page_rotation(doc: &Document, page_id: lopdf::ObjectId) -> i32 {
    if let Ok(Object::Dictionary(dict)) = doc.get_object(page_id) {
        if let Ok(Object::Integer(rotate)) = dict.get(b"Rotate") {
            return *rotate as i32;
        }
        if let Ok(Object::Reference(parent_ref)) = dict.get(b"Parent") {
            if let Ok(Object::Dictionary(parent_dict)) = doc.get_object(*parent_ref) {
                if let Ok(Object::Integer(rotate)) = parent_dict.get(b"Rotate") {
                    return *rotate as i32;
                }
            }
        }
    }
    0
}

/// 页面有效边界框：优先 CropBox，其次 MediaBox，再向父节点继承
pub fn page_geom(doc: &Document, page_id: lopdf::ObjectId) -> PageGeom {
    let raw_box = if let Ok(Object::Dictionary(dict)) = doc.get_object(page_id) {
        if let Ok(Object::Array(arr)) = dict.get(b"CropBox") {
            extract_box_values(arr)
        } else if let Ok(Object::Array(arr)) = dict.get(b"MediaBox") {
            extract_box_values(arr)
        } else if let Ok(Object::Reference(parent_ref)) = dict.get(b"Parent") {
            if let Ok(Object::Dictionary(parent_dict)) = doc.get_object(*parent_ref) {
                if let Ok(Object::Array(arr)) = parent_dict.get(b"MediaBox") {
                    extract_box_values(arr)
                } else {
                    None
                }
            } else {
                None
            }
        } else {
            None
        }
    } else {
        None
    };

    let (llx, lly, urx, ury) = raw_box.unwrap_or_else(|| {
        log::warn!("[页面] 未找到边界框，使用默认 Letter 尺寸");
        (0.0, 0.0, 612.0, 792.0)
    });
    PageGeom { llx, lly, urx, ury }
}

/// 流内容（压缩与未压缩都支持）
fn stream_content(stream: &Stream) -> Vec<u8> {
    match stream.decompressed_content() {
        Ok(data) => data,
        Err(_) => stream.content.clone(),
    }
}

/// 页面内容流数据；多段流拼接为一段
pub fn page_content(doc: &Document, page_id: lopdf::ObjectId) -> Result<Vec<u8>> {
    let page = doc
        .get_object(page_id)
        .map_err(|e| anyhow!("读取页面对象失败: {e}"))?;

    if let Object::Dictionary(dict) = page {
        if let Ok(contents) = dict.get(b"Contents") {
            match contents {
                Object::Reference(ref_id) => {
                    if let Ok(Object::Stream(stream)) = doc.get_object(*ref_id) {
                        return Ok(stream_content(stream));
                    }
                }
                Object::Array(arr) => {
                    let mut all_content = Vec::new();
                    for item in arr {
                        if let Object::Reference(ref_id) = item {
                            if let Ok(Object::Stream(stream)) = doc.get_object(*ref_id) {
                                all_content.extend(stream_content(stream));
                                all_content.push(b'\n');
                            }
                        }
                    }
                    return Ok(all_content);
                }
                Object::Stream(stream) => {
                    return Ok(stream_content(stream));
                }
                _ => {}
            }
        }
        // 没有 Contents 的空页面
        return Ok(Vec::new());
    }

    Err(anyhow!("页面对象不是字典"))
}

/// 用新的内容流整体替换页面 Contents
pub fn replace_page_content(
    doc: &mut Document,
    page_id: lopdf::ObjectId,
    data: Vec<u8>,
) -> Result<()> {
    let stream = Stream::new(lopdf::Dictionary::new(), data);
    let stream_id = doc.add_object(stream);
    if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(page_id) {
        dict.set(b"Contents".to_vec(), Object::Reference(stream_id));
        Ok(())
    } else {
        Err(anyhow!("页面对象不是字典"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geom() -> PageGeom {
        PageGeom { llx: 0.0, lly: 0.0, urx: 612.0, ury: 792.0 }
    }

    #[test]
    fn test_rect_round_trip_through_pdf_space() {
        let g = geom();
        let rect = Rect::new(10.0, 10.0, 50.0, 30.0);
        let pdf = g.to_pdf_rect(rect);
        // 顶部原点的 y0=10 对应 PDF 空间靠上的一侧
        assert_eq!(pdf.y1, 782.0);
        assert_eq!(pdf.y0, 762.0);
        assert_eq!(g.to_page_rect(pdf), rect);
    }

    #[test]
    fn test_offset_origin_is_respected() {
        let g = PageGeom { llx: 5.0, lly: 10.0, urx: 617.0, ury: 802.0 };
        let (x, y) = g.to_pdf_point(Point::new(60.0, 60.0));
        assert_eq!(x, 65.0);
        assert_eq!(y, 742.0);
    }

    #[test]
    fn test_glyph_intersection() {
        let rect = PdfRect { x0: 100.0, y0: 100.0, x1: 200.0, y1: 120.0 };
        assert!(rect.intersects_glyph(150.0, 105.0, 10.0, 8.0));
        assert!(!rect.intersects_glyph(250.0, 105.0, 10.0, 8.0));
        assert!(!rect.intersects_glyph(150.0, 130.0, 10.0, 8.0));
    }
}
