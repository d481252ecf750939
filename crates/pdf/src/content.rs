//! 内容流处理：字符级文字擦除与文字片段抽取
//!
//! 两个入口共享同一套图形状态跟踪（q/Q/cm 维护 CTM，BT/ET/Tm/Td/TD/T*
//! 维护文本矩阵）：
//! - [`erase_text_in_rects`] 把落在目标矩形内的字符替换为空格，
//!   保持后续字符位置不变，同时让被擦除的文字无法复制；
//! - [`extract_spans`] 收集每个显示算子的起始位置与文字，供表格
//!   检测做行列聚类。
//!
//! 图片与路径算子一律原样透传。

use crate::page::{get_number, PdfRect};
use anyhow::{anyhow, Result};
use lopdf::{
    content::{Content, Operation},
    Object,
};

/// 一段连续显示的文字及其用户空间起点
#[derive(Debug, Clone)]
pub struct TextSpan {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub size: f64,
    pub text: String,
}

/// 估算单个字符的宽度
fn estimate_char_width(byte: u8, font_size: f64) -> f64 {
    if byte < 128 {
        font_size * 0.55
    } else {
        font_size * 1.0
    }
}

/// 估算文字宽度
fn estimate_text_width(text: &[u8], font_size: f64) -> f64 {
    text.iter()
        .map(|&b| estimate_char_width(b, font_size))
        .sum()
}

/// 检查单个字符是否落在任何目标矩形内
fn char_in_rects(
    char_x: f64,
    char_y: f64,
    char_width: f64,
    font_size: f64,
    rects: &[PdfRect],
) -> bool {
    let char_height = font_size.abs().max(12.0);
    rects
        .iter()
        .any(|r| r.intersects_glyph(char_x, char_y, char_width, char_height))
}

/// 字符级擦除：把落在目标矩形内的字符替换为空格
fn erase_text_chars(
    text: &[u8],
    start_x: f64,
    start_y: f64,
    font_size: f64,
    rects: &[PdfRect],
) -> (Vec<u8>, bool) {
    let mut result = Vec::with_capacity(text.len());
    let mut current_x = start_x;
    let mut any_erased = false;

    for &byte in text.iter() {
        let char_width = estimate_char_width(byte, font_size);
        if char_in_rects(current_x, start_y, char_width, font_size, rects) {
            result.push(b' ');
            any_erased = true;
        } else {
            result.push(byte);
        }
        current_x += char_width;
    }

    (result, any_erased)
}

/// 2x3 仿射矩阵 [a b c d e f]
type Matrix = [f64; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

fn multiply(m: &Matrix, base: &Matrix) -> Matrix {
    [
        base[0] * m[0] + base[2] * m[1],
        base[1] * m[0] + base[3] * m[1],
        base[0] * m[2] + base[2] * m[3],
        base[1] * m[2] + base[3] * m[3],
        base[0] * m[4] + base[2] * m[5] + base[4],
        base[1] * m[4] + base[3] * m[5] + base[5],
    ]
}

fn read_matrix(operands: &[Object]) -> Option<Matrix> {
    if operands.len() < 6 {
        return None;
    }
    let mut m = IDENTITY;
    for (i, slot) in m.iter_mut().enumerate() {
        *slot = get_number(&operands[i])?;
    }
    Some(m)
}

/// 文本定位状态：CTM 栈与文本矩阵/行矩阵
struct TextTracker {
    ctm: Matrix,
    ctm_stack: Vec<Matrix>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    in_text: bool,
    font_size: f64,
    leading: f64,
}

impl TextTracker {
    fn new() -> Self {
        TextTracker {
            ctm: IDENTITY,
            ctm_stack: Vec::new(),
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            in_text: false,
            font_size: 12.0,
            leading: 0.0,
        }
    }

    /// 当前文字起点在用户空间的坐标
    fn origin(&self) -> (f64, f64) {
        let x = self.ctm[0] * self.text_matrix[4] + self.ctm[2] * self.text_matrix[5] + self.ctm[4];
        let y = self.ctm[1] * self.text_matrix[4] + self.ctm[3] * self.text_matrix[5] + self.ctm[5];
        (x, y)
    }

    fn next_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix[4] += tx;
        self.line_matrix[5] += ty;
        self.text_matrix = self.line_matrix;
    }

    /// 跟踪一个算子对定位状态的影响；返回该算子是否属于定位算子
    fn track(&mut self, op: &Operation) -> bool {
        match op.operator.as_str() {
            "q" => {
                self.ctm_stack.push(self.ctm);
                true
            }
            "Q" => {
                if let Some(saved) = self.ctm_stack.pop() {
                    self.ctm = saved;
                }
                true
            }
            "cm" => {
                if let Some(m) = read_matrix(&op.operands) {
                    self.ctm = multiply(&m, &self.ctm);
                }
                true
            }
            "BT" => {
                self.in_text = true;
                self.text_matrix = IDENTITY;
                self.line_matrix = IDENTITY;
                true
            }
            "ET" => {
                self.in_text = false;
                true
            }
            "Tm" if self.in_text => {
                if let Some(m) = read_matrix(&op.operands) {
                    self.text_matrix = m;
                    self.line_matrix = m;
                }
                true
            }
            "Td" if self.in_text && op.operands.len() >= 2 => {
                if let (Some(tx), Some(ty)) =
                    (get_number(&op.operands[0]), get_number(&op.operands[1]))
                {
                    self.next_line(tx, ty);
                }
                true
            }
            "TD" if self.in_text && op.operands.len() >= 2 => {
                if let (Some(tx), Some(ty)) =
                    (get_number(&op.operands[0]), get_number(&op.operands[1]))
                {
                    self.leading = -ty;
                    self.next_line(tx, ty);
                }
                true
            }
            "T*" if self.in_text => {
                let leading = self.leading;
                self.next_line(0.0, -leading);
                true
            }
            "TL" if op.operands.len() == 1 => {
                if let Some(l) = get_number(&op.operands[0]) {
                    self.leading = l;
                }
                true
            }
            "Tf" if op.operands.len() >= 2 => {
                if let Some(size) = get_number(&op.operands[1]) {
                    self.font_size = size.abs();
                }
                true
            }
            _ => false,
        }
    }
}

/// 从算子取出字符串操作数（Tj/' 取第一个，" 取第三个）
fn string_operand(op: &Operation, index: usize) -> (Vec<u8>, lopdf::StringFormat) {
    if let Some(Object::String(s, fmt)) = op.operands.get(index) {
        (s.clone(), *fmt)
    } else {
        (Vec::new(), lopdf::StringFormat::Literal)
    }
}

/// 处理内容流，把目标矩形内的文字替换为空格
pub fn erase_text_in_rects(content_data: &[u8], rects: &[PdfRect]) -> Result<Vec<u8>> {
    let content = Content::decode(content_data).map_err(|e| anyhow!("内容流解码失败: {e}"))?;
    let mut new_operations: Vec<Operation> = Vec::with_capacity(content.operations.len());
    let mut tracker = TextTracker::new();

    for op in content.operations {
        let operator = op.operator.clone();
        tracker.track(&op);

        match operator.as_str() {
            "Tj" | "'" if tracker.in_text => {
                let (x, y) = tracker.origin();
                let (text_bytes, str_format) = string_operand(&op, 0);
                let (erased, any) =
                    erase_text_chars(&text_bytes, x, y, tracker.font_size, rects);
                if any {
                    log::debug!(
                        "[擦除] {:?} -> {:?}",
                        String::from_utf8_lossy(&text_bytes),
                        String::from_utf8_lossy(&erased)
                    );
                    new_operations.push(Operation::new(
                        op.operator.as_str(),
                        vec![Object::String(erased, str_format)],
                    ));
                } else {
                    new_operations.push(op);
                }
            }
            "\"" if tracker.in_text && op.operands.len() >= 3 => {
                let (x, y) = tracker.origin();
                let (text_bytes, str_format) = string_operand(&op, 2);
                let (erased, any) =
                    erase_text_chars(&text_bytes, x, y, tracker.font_size, rects);
                if any {
                    let mut new_operands = op.operands.clone();
                    new_operands[2] = Object::String(erased, str_format);
                    new_operations.push(Operation::new("\"", new_operands));
                } else {
                    new_operations.push(op);
                }
            }
            "TJ" if tracker.in_text => {
                let (start_x, y) = tracker.origin();
                let mut current_x = start_x;
                let mut new_array: Vec<Object> = Vec::new();
                let mut any_erased = false;

                if let Some(Object::Array(arr)) = op.operands.first() {
                    for item in arr {
                        match item {
                            Object::String(s, fmt) => {
                                let (erased, erased_this) = erase_text_chars(
                                    s,
                                    current_x,
                                    y,
                                    tracker.font_size,
                                    rects,
                                );
                                if erased_this {
                                    any_erased = true;
                                }
                                current_x += estimate_text_width(s, tracker.font_size);
                                new_array.push(Object::String(erased, *fmt));
                            }
                            Object::Integer(n) => {
                                current_x -= (*n as f64) / 1000.0 * tracker.font_size;
                                new_array.push(item.clone());
                            }
                            Object::Real(n) => {
                                current_x -= (*n as f64) / 1000.0 * tracker.font_size;
                                new_array.push(item.clone());
                            }
                            _ => new_array.push(item.clone()),
                        }
                    }
                }

                if any_erased {
                    new_operations.push(Operation::new("TJ", vec![Object::Array(new_array)]));
                } else {
                    new_operations.push(op);
                }
            }
            _ => {
                new_operations.push(op);
            }
        }
    }

    let new_content = Content { operations: new_operations };
    new_content.encode().map_err(|e| anyhow!("内容流编码失败: {e}"))
}

/// 收集内容流里的文字片段（用户空间坐标）
pub fn extract_spans(content_data: &[u8]) -> Result<Vec<TextSpan>> {
    let content = Content::decode(content_data).map_err(|e| anyhow!("内容流解码失败: {e}"))?;
    let mut spans = Vec::new();
    let mut tracker = TextTracker::new();

    for op in content.operations {
        let operator = op.operator.clone();
        tracker.track(&op);

        match operator.as_str() {
            "Tj" | "'" if tracker.in_text => {
                let (x, y) = tracker.origin();
                let (bytes, _) = string_operand(&op, 0);
                push_span(&mut spans, x, y, tracker.font_size, &bytes);
            }
            "\"" if tracker.in_text && op.operands.len() >= 3 => {
                let (x, y) = tracker.origin();
                let (bytes, _) = string_operand(&op, 2);
                push_span(&mut spans, x, y, tracker.font_size, &bytes);
            }
            "TJ" if tracker.in_text => {
                let (start_x, y) = tracker.origin();
                let mut current_x = start_x;
                let mut bytes: Vec<u8> = Vec::new();

                if let Some(Object::Array(arr)) = op.operands.first() {
                    for item in arr {
                        match item {
                            Object::String(s, _) => {
                                bytes.extend_from_slice(s);
                                current_x += estimate_text_width(s, tracker.font_size);
                            }
                            Object::Integer(n) => {
                                current_x -= (*n as f64) / 1000.0 * tracker.font_size;
                            }
                            Object::Real(n) => {
                                current_x -= (*n as f64) / 1000.0 * tracker.font_size;
                            }
                            _ => {}
                        }
                    }
                }
                let _ = current_x;
                push_span(&mut spans, start_x, y, tracker.font_size, &bytes);
            }
            _ => {}
        }
    }

    Ok(spans)
}

fn push_span(spans: &mut Vec<TextSpan>, x: f64, y: f64, size: f64, bytes: &[u8]) {
    if bytes.is_empty() {
        return;
    }
    let text = String::from_utf8_lossy(bytes).into_owned();
    if text.trim().is_empty() {
        return;
    }
    spans.push(TextSpan {
        x,
        y,
        width: estimate_text_width(bytes, size),
        size,
        text,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_stream(ops: Vec<Operation>) -> Vec<u8> {
        Content { operations: ops }.encode().unwrap()
    }

    fn text_op(x: f64, y: f64, text: &str) -> Vec<Operation> {
        vec![
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(b"F1".to_vec()), Object::Real(10.0)],
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
    fn test_erase_replaces_covered_chars_with_spaces() {
        let data = build_stream(text_op(100.0, 700.0, "SECRET"));
        let rects = [PdfRect { x0: 90.0, y0: 690.0, x1: 300.0, y1: 720.0 }];
        let out = erase_text_in_rects(&data, &rects).unwrap();

        let content = Content::decode(&out).unwrap();
        let erased: Vec<&Operation> = content
            .operations
            .iter()
            .filter(|o| o.operator == "Tj")
            .collect();
        assert_eq!(erased.len(), 1);
        if let Some(Object::String(s, _)) = erased[0].operands.first() {
            assert_eq!(s.as_slice(), b"      ");
        } else {
            panic!("Tj 操作数不是字符串");
        }
    }

    #[test]
    fn test_erase_outside_rect_is_untouched() {
        let data = build_stream(text_op(100.0, 700.0, "KEEP"));
        let rects = [PdfRect { x0: 0.0, y0: 0.0, x1: 50.0, y1: 50.0 }];
        let out = erase_text_in_rects(&data, &rects).unwrap();

        let content = Content::decode(&out).unwrap();
        let kept: Vec<&Operation> = content
            .operations
            .iter()
            .filter(|o| o.operator == "Tj")
            .collect();
        if let Some(Object::String(s, _)) = kept[0].operands.first() {
            assert_eq!(s.as_slice(), b"KEEP");
        } else {
            panic!("Tj 操作数不是字符串");
        }
    }

    #[test]
    fn test_erase_partial_run() {
        // 10pt、每字符 5.5pt：矩形只盖住前三个字符
        let data = build_stream(text_op(100.0, 700.0, "ABCDEF"));
        let rects = [PdfRect { x0: 95.0, y0: 690.0, x1: 116.0, y1: 720.0 }];
        let out = erase_text_in_rects(&data, &rects).unwrap();

        let content = Content::decode(&out).unwrap();
        let op = content
            .operations
            .iter()
            .find(|o| o.operator == "Tj")
            .unwrap();
        if let Some(Object::String(s, _)) = op.operands.first() {
            assert!(s.starts_with(b"   "));
            assert!(s.ends_with(b"DEF"));
        } else {
            panic!("Tj 操作数不是字符串");
        }
    }

    #[test]
    fn test_non_text_ops_pass_through() {
        let mut ops = vec![
            Operation::new(
                "re",
                vec![
                    Object::Real(10.0),
                    Object::Real(10.0),
                    Object::Real(100.0),
                    Object::Real(100.0),
                ],
            ),
            Operation::new("f", vec![]),
        ];
        ops.extend(text_op(20.0, 20.0, "X"));
        let data = build_stream(ops);
        let rects = [PdfRect { x0: 0.0, y0: 0.0, x1: 200.0, y1: 200.0 }];
        let out = erase_text_in_rects(&data, &rects).unwrap();

        let content = Content::decode(&out).unwrap();
        assert!(content.operations.iter().any(|o| o.operator == "re"));
        assert!(content.operations.iter().any(|o| o.operator == "f"));
    }

    #[test]
    fn test_extract_spans_positions() {
        let mut ops = text_op(100.0, 700.0, "Alpha");
        ops.extend(text_op(200.0, 650.0, "Beta"));
        let data = build_stream(ops);

        let spans = extract_spans(&data).unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].text, "Alpha");
        assert!((spans[0].x - 100.0).abs() < 0.01);
        assert!((spans[0].y - 700.0).abs() < 0.01);
        assert_eq!(spans[1].text, "Beta");
        assert!((spans[1].y - 650.0).abs() < 0.01);
    }

    #[test]
    fn test_extract_spans_respects_ctm() {
        let mut ops = vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(1.0),
                    Object::Real(0.0),
                    Object::Real(0.0),
                    Object::Real(1.0),
                    Object::Real(50.0),
                    Object::Real(-10.0),
                ],
            ),
        ];
        ops.extend(text_op(100.0, 700.0, "Shifted"));
        ops.push(Operation::new("Q", vec![]));
        let data = build_stream(ops);

        let spans = extract_spans(&data).unwrap();
        assert_eq!(spans.len(), 1);
        assert!((spans[0].x - 150.0).abs() < 0.01);
        assert!((spans[0].y - 690.0).abs() < 0.01);
    }

    #[test]
    fn test_tj_array_kerning_advances_x() {
        let ops = vec![
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(b"F1".to_vec()), Object::Real(10.0)],
            ),
            Operation::new("Td", vec![Object::Real(100.0), Object::Real(700.0)]),
            Operation::new(
                "TJ",
                vec![Object::Array(vec![
                    Object::String(b"AB".to_vec(), lopdf::StringFormat::Literal),
                    Object::Integer(-500),
                    Object::String(b"CD".to_vec(), lopdf::StringFormat::Literal),
                ])],
            ),
            Operation::new("ET", vec![]),
        ];
        let data = build_stream(ops);
        // 只盖住 CD 的起点之后：AB 占 11pt，-500 间距再推 5pt
        let rects = [PdfRect { x0: 115.0, y0: 690.0, x1: 300.0, y1: 720.0 }];
        let out = erase_text_in_rects(&data, &rects).unwrap();

        let content = Content::decode(&out).unwrap();
        let op = content
            .operations
            .iter()
            .find(|o| o.operator == "TJ")
            .unwrap();
        if let Some(Object::Array(arr)) = op.operands.first() {
            if let Object::String(s, _) = &arr[0] {
                assert_eq!(s.as_slice(), b"AB");
            }
            if let Object::String(s, _) = &arr[2] {
                assert_eq!(s.as_slice(), b"  ");
            }
        } else {
            panic!("TJ 操作数不是数组");
        }
    }
}
