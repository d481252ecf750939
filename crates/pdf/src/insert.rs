//! 文字写入：单点插入与框内折行
//!
//! 写入走追加内容流的方式：解码原内容，追加 `q ... BT ... ET ... Q`
//! 一段，再整体编码回去。字体按 Type1 标准字体注册到页面 Resources，
//! 同名字体只注册一次。

use crate::content::erase_text_in_rects;
use crate::page::{self, PageGeom};
use anyhow::{anyhow, Result};
use lopdf::{
    content::{Content, Operation},
    Dictionary, Document, Object, ObjectId,
};
use revmark_core::document::TextAlign;

/// 行距系数
const LINE_SPACING: f64 = 1.2;

/// 估算一行文字的宽度（与擦除侧保持同一套估算）
pub fn estimate_line_width(text: &str, size: f64) -> f64 {
    text.bytes()
        .map(|b| if b < 128 { size * 0.55 } else { size })
        .sum()
}

/// 资源字典里的字体名：去掉连字符的 BaseFont 名加前缀
fn resource_font_name(base_font: &str) -> Vec<u8> {
    let mut name = b"RF".to_vec();
    name.extend(base_font.bytes().filter(|b| *b != b'-'));
    name
}

/// 确保页面 Resources 里注册了指定标准字体，返回资源名
pub fn ensure_font(
    doc: &mut Document,
    page_id: ObjectId,
    base_font: &str,
) -> Result<Vec<u8>> {
    let res_name = resource_font_name(base_font);

    let mut font_dict = Dictionary::new();
    font_dict.set("Type", Object::Name(b"Font".to_vec()));
    font_dict.set("Subtype", Object::Name(b"Type1".to_vec()));
    font_dict.set("BaseFont", Object::Name(base_font.as_bytes().to_vec()));
    font_dict.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
    let font_id = doc.add_object(Object::Dictionary(font_dict));

    // Resources 可能是内联字典、引用或缺失，逐一处理
    let resources_obj = {
        let page_dict = match doc.get_object(page_id) {
            Ok(Object::Dictionary(dict)) => dict,
            _ => return Err(anyhow!("页面对象不是字典")),
        };
        page_dict.get(b"Resources").ok().cloned()
    };

    match resources_obj {
        Some(Object::Reference(res_id)) => {
            if let Ok(Object::Dictionary(res_dict)) = doc.get_object_mut(res_id) {
                set_font_entry(res_dict, &res_name, font_id);
            } else {
                return Err(anyhow!("Resources 引用无效"));
            }
        }
        Some(Object::Dictionary(mut res_dict)) => {
            set_font_entry(&mut res_dict, &res_name, font_id);
            if let Ok(Object::Dictionary(page_dict)) = doc.get_object_mut(page_id) {
                page_dict.set(b"Resources".to_vec(), Object::Dictionary(res_dict));
            }
        }
        _ => {
            let mut res_dict = Dictionary::new();
            set_font_entry(&mut res_dict, &res_name, font_id);
            if let Ok(Object::Dictionary(page_dict)) = doc.get_object_mut(page_id) {
                page_dict.set(b"Resources".to_vec(), Object::Dictionary(res_dict));
            } else {
                return Err(anyhow!("页面对象不是字典"));
            }
        }
    }

    Ok(res_name)
}

fn set_font_entry(res_dict: &mut Dictionary, res_name: &[u8], font_id: ObjectId) {
    match res_dict.get_mut(b"Font") {
        Ok(Object::Dictionary(fonts)) => {
            if !fonts.has(res_name) {
                fonts.set(res_name.to_vec(), Object::Reference(font_id));
            }
        }
        _ => {
            let mut fonts = Dictionary::new();
            fonts.set(res_name.to_vec(), Object::Reference(font_id));
            res_dict.set(b"Font".to_vec(), Object::Dictionary(fonts));
        }
    }
}

/// 页面旋转对应的文字矩阵方向分量，逆时针补偿页面的顺时针显示旋转
fn rotation_matrix(rotation: i32) -> [f64; 4] {
    match ((rotation % 360) + 360) % 360 {
        90 => [0.0, 1.0, -1.0, 0.0],
        180 => [-1.0, 0.0, 0.0, -1.0],
        270 => [0.0, -1.0, 1.0, 0.0],
        _ => [1.0, 0.0, 0.0, 1.0],
    }
}

fn text_show_ops(
    font_res: &[u8],
    size: f64,
    matrix: [f64; 4],
    x: f64,
    y: f64,
    text: &str,
) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![
                Object::Name(font_res.to_vec()),
                Object::Real(size as f32),
            ],
        ),
        Operation::new(
            "rg",
            vec![Object::Real(0.0), Object::Real(0.0), Object::Real(0.0)],
        ),
        Operation::new(
            "Tm",
            vec![
                Object::Real(matrix[0] as f32),
                Object::Real(matrix[1] as f32),
                Object::Real(matrix[2] as f32),
                Object::Real(matrix[3] as f32),
                Object::Real(x as f32),
                Object::Real(y as f32),
            ],
        ),
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

/// 把一组算子追加到页面内容流末尾
fn append_ops(doc: &mut Document, page_id: ObjectId, ops: Vec<Operation>) -> Result<()> {
    let existing = page::page_content(doc, page_id)?;
    let mut content = if existing.is_empty() {
        Content { operations: Vec::new() }
    } else {
        Content::decode(&existing).map_err(|e| anyhow!("内容流解码失败: {e}"))?
    };

    content.operations.push(Operation::new("q", vec![]));
    content.operations.extend(ops);
    content.operations.push(Operation::new("Q", vec![]));

    let data = content.encode().map_err(|e| anyhow!("内容流编码失败: {e}"))?;
    page::replace_page_content(doc, page_id, data)
}

/// 在指定位置写入一段文字，位置为顶部原点坐标，方向跟随页面旋转
pub fn insert_text_at(
    doc: &mut Document,
    page_id: ObjectId,
    geom: &PageGeom,
    x: f64,
    y: f64,
    text: &str,
    base_font: &str,
    size: f64,
    rotation: i32,
) -> Result<()> {
    let font_res = ensure_font(doc, page_id, base_font)?;
    let (px, py) = geom.to_pdf_point(revmark_core::types::Point::new(x, y));
    let matrix = rotation_matrix(rotation);
    let ops = text_show_ops(&font_res, size, matrix, px, py, text);
    append_ops(doc, page_id, ops)
}

/// 按宽度折行；单行放不下的长词整体占一行
fn wrap_lines(text: &str, size: f64, max_width: f64) -> Vec<String> {
    let mut lines = Vec::new();
    for raw_line in text.split('\n') {
        let mut current = String::new();
        for word in raw_line.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if estimate_line_width(&candidate, size) <= max_width || current.is_empty() {
                current = candidate;
            } else {
                lines.push(current);
                current = word.to_string();
            }
        }
        lines.push(current);
    }
    lines
}

/// 在矩形内写入文字，超宽折行，支持左对齐与居中
pub fn insert_textbox_at(
    doc: &mut Document,
    page_id: ObjectId,
    geom: &PageGeom,
    rect: revmark_core::types::Rect,
    text: &str,
    base_font: &str,
    size: f64,
    align: TextAlign,
) -> Result<()> {
    let font_res = ensure_font(doc, page_id, base_font)?;
    let pdf_rect = geom.to_pdf_rect(rect);
    let max_width = pdf_rect.width().max(size);
    let lines = wrap_lines(text, size, max_width);

    let mut ops = Vec::new();
    // 首行基线从矩形顶部向下一个字号
    let mut baseline = pdf_rect.y1 - size;
    for line in &lines {
        if line.is_empty() {
            baseline -= size * LINE_SPACING;
            continue;
        }
        let line_width = estimate_line_width(line, size);
        let x = match align {
            TextAlign::Left => pdf_rect.x0,
            TextAlign::Center => pdf_rect.x0 + (max_width - line_width) / 2.0,
        };
        ops.extend(text_show_ops(
            &font_res,
            size,
            [1.0, 0.0, 0.0, 1.0],
            x,
            baseline,
            line,
        ));
        baseline -= size * LINE_SPACING;
    }

    if ops.is_empty() {
        return Ok(());
    }
    append_ops(doc, page_id, ops)
}

/// 对一页执行文字擦除（矩形为顶部原点坐标）
pub fn erase_page_rects(
    doc: &mut Document,
    page_id: ObjectId,
    geom: &PageGeom,
    rects: &[revmark_core::types::Rect],
) -> Result<()> {
    if rects.is_empty() {
        return Ok(());
    }
    let pdf_rects: Vec<_> = rects.iter().map(|r| geom.to_pdf_rect(*r)).collect();
    let content = page::page_content(doc, page_id)?;
    if content.is_empty() {
        return Ok(());
    }
    let new_content = erase_text_in_rects(&content, &pdf_rects)?;
    page::replace_page_content(doc, page_id, new_content)
}
