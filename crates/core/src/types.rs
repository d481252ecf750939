//! 基础数据类型
//!
//! 所有坐标均位于"未旋转页面坐标系"：原点在页面左上角，Y 轴向下，
//! 单位为 PDF 用户空间单位。旋转换算由 [`crate::rotate`] 统一处理，
//! 且每个坐标在触碰真实页面前只换算一次。

use serde::{Deserialize, Serialize};

/// 矩形区域，`(x0, y0)` 为左上角，`(x1, y1)` 为右下角
///
/// JSON 中序列化为 `[x0, y0, x1, y1]` 数组，与编辑器的导出格式一致。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// 判断点是否落在矩形内（含边界）
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }
}

impl From<[f64; 4]> for Rect {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<Rect> for [f64; 4] {
    fn from(r: Rect) -> Self {
        [r.x0, r.y0, r.x1, r.y1]
    }
}

/// 单个坐标点，JSON 中序列化为 `[x, y]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Point {
    fn from(v: [f64; 2]) -> Self {
        Self::new(v[0], v[1])
    }
}

impl From<Point> for [f64; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

/// 删除区域：在每一页上脱敏的矩形
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub coordinates: Rect,
    pub title: String,
}

/// 文字插入点：在每一页的指定位置写入一段文字
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertionPoint {
    pub position: Point,
    pub text: String,
    /// 字体名，限定在 [`STANDARD_FONTS`] 集合内
    pub font: String,
    pub size: u32,
}

/// 编辑器允许选择的标准字体集合（PDF Base-14 名称）
pub const STANDARD_FONTS: &[&str] = &[
    "Courier",
    "Courier-Oblique",
    "Courier-Bold",
    "Courier-BoldOblique",
    "Helvetica",
    "Helvetica-Oblique",
    "Helvetica-Bold",
    "Helvetica-BoldOblique",
    "Times-Roman",
    "Times-Italic",
    "Times-Bold",
    "Times-BoldItalic",
    "Symbol",
    "ZapfDingbats",
];

/// 字体集合之外的名称回退到 Helvetica
pub const DEFAULT_FONT: &str = "Helvetica";

pub fn is_standard_font(name: &str) -> bool {
    STANDARD_FONTS.contains(&name)
}
