//! 旋转坐标换算
//!
//! 用户在编辑器里选择的区域和插入点均以"未旋转页面坐标系"表达，
//! 而文档库操作的是按 `/Rotate` 渲染后的页面。本模块把矩形和点
//! 换算到旋转后的坐标系；纯函数，不依赖任何 PDF 库。
//!
//! `page_height` / `page_width` 始终是未旋转的页面尺寸。

use crate::types::{Point, Rect};
use thiserror::Error;

/// 旋转角度不在 {0, 90, 180, 270} 之内
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("无效的旋转角度: {0}（仅支持 0/90/180/270）")]
pub struct InvalidRotation(pub i32);

/// 将矩形换算到旋转后页面的坐标系
pub fn adjust_rect(
    rect: Rect,
    rotation: i32,
    page_height: f64,
    page_width: f64,
) -> Result<Rect, InvalidRotation> {
    let Rect { x0, y0, x1, y1 } = rect;
    match rotation {
        0 => Ok(rect),
        90 => Ok(Rect::new(y0, page_width - x1, y1, page_width - x0)),
        180 => Ok(Rect::new(
            page_width - x1,
            page_height - y1,
            page_width - x0,
            page_height - y0,
        )),
        270 => Ok(Rect::new(page_height - y1, x0, page_height - y0, x1)),
        other => Err(InvalidRotation(other)),
    }
}

/// 将单个点换算到旋转后页面的坐标系
pub fn adjust_point(
    point: Point,
    rotation: i32,
    page_height: f64,
    page_width: f64,
) -> Result<Point, InvalidRotation> {
    let Point { x, y } = point;
    match rotation {
        0 => Ok(point),
        90 => Ok(Point::new(y, page_width - x)),
        180 => Ok(Point::new(page_width - x, page_height - y)),
        270 => Ok(Point::new(page_height - y, x)),
        other => Err(InvalidRotation(other)),
    }
}

/// 把 `/Rotate` 的原始取值规整到 [0, 360) 区间
///
/// PDF 允许负值和 360 的倍数，规整后再交给 [`adjust_rect`] 校验。
pub fn normalize_rotation(raw: i32) -> i32 {
    ((raw % 360) + 360) % 360
}
