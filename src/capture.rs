//! 表示中の画面から範囲を選んで PNG に切り出す

use crate::coordinate::{rendered_rect, two_point_to_rect, Point, Rect};
use crate::error::{Result, ViewerError};
use crate::render::Frame;
use image::{imageops, ImageFormat};
use std::path::Path;
use std::sync::Arc;

/// ドラッグで作る選択範囲 (表示領域の座標)
#[derive(Debug, Default)]
pub struct Capture {
    p1: Point,
    p2: Point,
    enabled: bool,
}

impl Capture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn toggle(&mut self) {
        self.enabled = !self.enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn on_select_start(&mut self, x: f64, y: f64) {
        self.p1 = Point::new(x, y);
        self.p2 = self.p1;
    }

    pub fn on_select(&mut self, x: f64, y: f64) {
        self.p2 = Point::new(x, y);
    }

    pub fn on_select_end(&mut self, x: f64, y: f64) {
        self.on_select(x, y);
    }

    pub fn selection(&self) -> Rect {
        two_point_to_rect(self.p1, self.p2)
    }

    /// 選択範囲を画像座標に直して切り出し、`out_path` に PNG で書き出す。
    /// `view_size` はフレームを表示している領域の大きさ。
    /// 成功したら選択モードを抜ける。
    pub fn capture(&mut self, frame: &Frame, view_size: (f64, f64), out_path: &Path) -> Result<(u32, u32)> {
        let selection = self.selection();
        if selection.is_empty() {
            return Err(ViewerError::EmptySelection);
        }
        let rendered = rendered_rect(frame.width(), frame.height(), view_size.0, view_size.1);
        let rect = rendered.to_image(selection);

        // 画像の外にはみ出した分は切り捨てる
        let clamp = |v: f64, max: u32| v.round().clamp(0.0, max as f64) as u32;
        let x0 = clamp(rect.x, frame.width());
        let y0 = clamp(rect.y, frame.height());
        let x1 = clamp(rect.x + rect.width, frame.width());
        let y1 = clamp(rect.y + rect.height, frame.height());
        if x1 <= x0 || y1 <= y0 {
            return Err(ViewerError::EmptySelection);
        }

        let cropped = imageops::crop_imm(&frame.image, x0, y0, x1 - x0, y1 - y0).to_image();
        self.disable();

        cropped
            .save_with_format(out_path, ImageFormat::Png)
            .map_err(|e| ViewerError::Encode(Arc::new(e)))?;
        log::info!(
            "[Capture] {}x{} を {} に保存しました",
            cropped.width(),
            cropped.height(),
            out_path.display()
        );
        Ok((cropped.width(), cropped.height()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::FrameLayout;
    use image::{GenericImageView, Rgba, RgbaImage};

    fn frame(width: u32, height: u32) -> Frame {
        let image = RgbaImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        Frame {
            image,
            layout: FrameLayout::Single { page: 0 },
        }
    }

    #[test]
    fn toggling_selection_mode() {
        let mut capture = Capture::new();
        assert!(!capture.is_enabled());
        capture.toggle();
        assert!(capture.is_enabled());
        capture.disable();
        assert!(!capture.is_enabled());
    }

    #[test]
    fn selection_follows_drag() {
        let mut capture = Capture::new();
        capture.on_select_start(50.0, 60.0);
        capture.on_select(10.0, 70.0);
        capture.on_select_end(20.0, 20.0);
        assert_eq!(
            capture.selection(),
            Rect { x: 20.0, y: 20.0, width: 30.0, height: 40.0 }
        );
    }

    #[test]
    fn crops_through_letterbox_and_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("capture.png");
        let mut capture = Capture::new();
        capture.enable();

        // 400x600 を 800x600 の領域に表示すると左右に 200 ずつ余白ができる
        capture.on_select_start(350.0, 100.0);
        capture.on_select_end(450.0, 300.0);
        let size = capture.capture(&frame(400, 600), (800.0, 600.0), &out).unwrap();
        assert_eq!(size, (100, 200));
        assert!(!capture.is_enabled());

        let written = image::open(&out).unwrap();
        assert_eq!(written.dimensions(), (100, 200));
        assert_eq!(written.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(written.get_pixel(99, 0), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn selection_is_clamped_to_the_image() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("clamped.png");
        let mut capture = Capture::new();
        capture.on_select_start(100.0, -50.0);
        capture.on_select_end(300.0, 700.0);

        let size = capture.capture(&frame(400, 600), (800.0, 600.0), &out).unwrap();
        assert_eq!(size, (100, 600));
    }

    #[test]
    fn click_without_drag_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("click.png");
        let mut capture = Capture::new();
        capture.on_select_start(400.0, 300.0);
        capture.on_select_end(400.0, 300.0);

        assert!(matches!(
            capture.capture(&frame(400, 600), (800.0, 600.0), &out),
            Err(ViewerError::EmptySelection)
        ));
        assert!(!out.exists());
    }

    #[test]
    fn selection_in_the_margin_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("empty.png");
        let mut capture = Capture::new();
        capture.enable();
        capture.on_select_start(0.0, 0.0);
        capture.on_select_end(100.0, 100.0);

        assert!(matches!(
            capture.capture(&frame(400, 600), (800.0, 600.0), &out),
            Err(ViewerError::EmptySelection)
        ));
        assert!(capture.is_enabled());
        assert!(!out.exists());
    }
}
