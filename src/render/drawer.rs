use crate::error::Result;
use crate::image::decoder::DecodedImage;
use crate::image::loader::MangaFile;
use crate::render::{Frame, FrameLayout};
use image::{imageops, RgbaImage};
use std::sync::Arc;

/// ページを単ページか見開きの1画面に合成する
pub struct PageDrawer {
    manga_file: Arc<MangaFile>,
}

impl PageDrawer {
    pub fn new(manga_file: Arc<MangaFile>) -> Self {
        Self { manga_file }
    }

    /// `page` と `page + 1` がどちらも縦長なら見開きにする。
    /// サイズ取得の失敗は単ページ扱いにせずそのまま返す。
    pub async fn should_draw_spread(&self, page: usize) -> Result<bool> {
        if page + 1 >= self.manga_file.len() {
            return Ok(false);
        }
        if !self.manga_file.get_size(page).await?.is_portrait() {
            return Ok(false);
        }
        Ok(self.manga_file.get_size(page + 1).await?.is_portrait())
    }

    pub async fn draw_page(&self, page: usize) -> Result<Frame> {
        let first = self.manga_file.get_page_image(page, true).await?;
        if self.should_draw_spread(page).await? {
            let second = self.manga_file.get_page_image(page + 1, true).await?;
            return Ok(Frame {
                image: compose_spread(&second, &first),
                layout: FrameLayout::Spread {
                    left: page + 1,
                    right: page,
                },
            });
        }

        Ok(Frame {
            image: first.pixels.clone(),
            layout: FrameLayout::Single { page },
        })
    }
}

/// 横に並べ、それぞれ縦方向中央に置く
fn compose_spread(left: &DecodedImage, right: &DecodedImage) -> RgbaImage {
    let width = left.width + right.width;
    let height = left.height.max(right.height);
    let mut canvas = RgbaImage::new(width, height);

    imageops::replace(&mut canvas, &left.pixels, 0, ((height - left.height) / 2) as i64);
    imageops::replace(
        &mut canvas,
        &right.pixels,
        left.width as i64,
        ((height - right.height) / 2) as i64,
    );
    canvas
}
