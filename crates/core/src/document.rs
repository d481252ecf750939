//! 统一文档能力接口
//!
//! 变换引擎只依赖这组能力，不关心底层 PDF 库。任何后端都必须实现
//! 这些方法；测试里用内存后端替代真实文档。
//!
//! 除 `find_tables` 的返回值外，所有矩形与点参数都已经过旋转换算，
//! 位于该页旋转后的坐标系。

use crate::types::{Point, Rect};
use anyhow::Result;
use std::path::Path;

/// 表格抽取结果：单元文字与单元包围盒按相同行列下标对齐
#[derive(Debug, Clone, Default)]
pub struct TableGrid {
    pub rows: Vec<Vec<String>>,
    pub cells: Vec<Vec<Rect>>,
}

/// 框内文字的水平对齐方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
}

/// 文档后端能力集合
///
/// 一个实例对应一份打开的文档，由单个任务独占，跨任务不共享。
pub trait DocumentOps {
    /// 打开文档
    fn load(path: &Path) -> Result<Self>
    where
        Self: Sized;

    /// 页数
    fn page_count(&self) -> usize;

    /// 页面 `/Rotate` 值，已规整到 {0, 90, 180, 270} 以外也原样返回，
    /// 由坐标换算负责校验
    fn page_rotation(&self, page: usize) -> Result<i32>;

    /// 未旋转的页面尺寸 `(width, height)`
    fn page_size(&self, page: usize) -> Result<(f64, f64)>;

    /// 在一页上登记并一次性提交若干矩形的脱敏；
    /// 只移除矩形内的文字内容，嵌入图片与矢量线条保持原样
    fn redact_rects(&mut self, page: usize, rects: &[Rect]) -> Result<()>;

    /// 在指定位置写入一段文字，文字方向跟随页面旋转
    fn insert_text(
        &mut self,
        page: usize,
        at: Point,
        text: &str,
        font: &str,
        size: f64,
        rotation: i32,
    ) -> Result<()>;

    /// 在矩形内写入文字（黑色），超宽时按宽度折行
    fn insert_textbox(
        &mut self,
        page: usize,
        rect: Rect,
        text: &str,
        size: f64,
        align: TextAlign,
    ) -> Result<()>;

    /// 在裁剪矩形内检测表格；找不到时返回空列表而不是错误
    fn find_tables(&self, page: usize, clip: Rect) -> Result<Vec<TableGrid>>;

    /// 保存到目标路径，自动创建缺失的父目录。
    /// 保存是任务的最后一步：中途失败不会留下半成品输出。
    fn save(&mut self, path: &Path) -> Result<()>;
}
