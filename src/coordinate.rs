//! 表示領域と画像の座標変換

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// 表示領域に収めて中央寄せした画像の位置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderedRect {
    pub rect: Rect,
    /// 表示上の長さ / 画像上の長さ
    pub ratio: f64,
}

impl RenderedRect {
    /// 表示領域上の矩形を画像上の矩形に変換する
    pub fn to_image(&self, view: Rect) -> Rect {
        let r = 1.0 / self.ratio;
        Rect {
            x: (view.x - self.rect.x) * r,
            y: (view.y - self.rect.y) * r,
            width: view.width * r,
            height: view.height * r,
        }
    }
}

pub fn rendered_rect(img_w: u32, img_h: u32, view_w: f64, view_h: f64) -> RenderedRect {
    let ratio = (view_w / img_w as f64).min(view_h / img_h as f64);
    let width = ratio * img_w as f64;
    let height = ratio * img_h as f64;
    RenderedRect {
        rect: Rect {
            x: (view_w - width) / 2.0,
            y: (view_h - height) / 2.0,
            width,
            height,
        },
        ratio,
    }
}

/// 2点を対角とする矩形 (どちらの向きにドラッグしても同じ)
pub fn two_point_to_rect(p1: Point, p2: Point) -> Rect {
    Rect {
        x: p1.x.min(p2.x),
        y: p1.y.min(p2.y),
        width: (p1.x - p2.x).abs(),
        height: (p1.y - p2.y).abs(),
    }
}
