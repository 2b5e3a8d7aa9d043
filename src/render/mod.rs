use crate::error::Result;
use image::RgbaImage;

pub mod canvas;
pub mod drawer;

pub use canvas::CanvasTarget;
pub use drawer::PageDrawer;

/// 描画先が共通で実装すべきトレイト。
/// 描画面を取得できない場合は `ViewerError::ContextUnavailable` を返す。
pub trait RenderTarget: Send {
    fn present(&mut self, frame: Frame) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLayout {
    Single { page: usize },
    /// 見開き。右綴じなので番号の大きいページが左に来る。
    Spread { left: usize, right: usize },
}

impl FrameLayout {
    pub fn is_spread(&self) -> bool {
        matches!(self, FrameLayout::Spread { .. })
    }
}

/// 合成済みの1画面分
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbaImage,
    pub layout: FrameLayout,
}

impl Frame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
