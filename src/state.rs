//! ページ移動の状態機械。
//!
//! Idle (未表示) → Rendering(page) → Settled(page, 見開きか)。
//! 描画中に届いた移動要求は目標ページの更新だけ行い、
//! 描画が終わった時点で最新の目標と違えばもう一度描く。

use crate::config::Settings;
use crate::error::{Result, ViewerError};
use crate::image::loader::MangaFile;
use crate::render::{PageDrawer, RenderTarget};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Settled {
    page: usize,
    spread: bool,
}

#[derive(Debug, Default)]
struct NavigationState {
    target: Option<usize>,
    settled: Option<Settled>,
    rendering: bool,
}

// 描画ループの future が途中で破棄されたときだけ働く。
// 描画中フラグを下ろし、描かれなかった目標を表示中のページへ戻す。
struct RenderingGuard<'a> {
    state: &'a Mutex<NavigationState>,
    finished: bool,
}

impl Drop for RenderingGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut state = self.state.lock().unwrap();
        state.rendering = false;
        state.target = state.settled.map(|s| s.page);
    }
}

pub struct MangaView {
    manga_file: Arc<MangaFile>,
    drawer: PageDrawer,
    target: Mutex<Box<dyn RenderTarget>>,
    state: Mutex<NavigationState>,
    prefetch_behind: usize,
    prefetch_ahead: usize,
}

impl MangaView {
    pub fn new(manga_file: Arc<MangaFile>, target: Box<dyn RenderTarget>, settings: &Settings) -> Self {
        Self {
            drawer: PageDrawer::new(manga_file.clone()),
            manga_file,
            target: Mutex::new(target),
            state: Mutex::new(NavigationState::default()),
            prefetch_behind: settings.prefetch_behind,
            prefetch_ahead: settings.prefetch_ahead,
        }
    }

    pub fn manga_file(&self) -> &Arc<MangaFile> {
        &self.manga_file
    }

    /// 移動先として指定されている (描画中を含む) ページ
    pub fn current_page(&self) -> Option<usize> {
        self.state.lock().unwrap().target
    }

    /// 描画が完了して表示中のページ
    pub fn settled_page(&self) -> Option<usize> {
        self.state.lock().unwrap().settled.map(|s| s.page)
    }

    /// 表示中の画面が現在のページから始まる見開きか
    pub fn is_spread(&self) -> bool {
        let state = self.state.lock().unwrap();
        match state.settled {
            Some(settled) => settled.spread && state.target == Some(settled.page),
            None => false,
        }
    }

    pub fn is_rendering(&self) -> bool {
        self.state.lock().unwrap().rendering
    }

    pub async fn move_to_page(&self, page: usize) -> Result<()> {
        let len = self.manga_file.len();
        if page >= len {
            return Err(ViewerError::InvalidPageIndex { page, len });
        }

        {
            let mut state = self.state.lock().unwrap();
            if state.target == Some(page) {
                return Ok(());
            }
            state.target = Some(page);
            if state.rendering {
                log::debug!("[View] 描画中のためページ {} を予約しました", page);
                self.pre_fetch_range(page);
                return Ok(());
            }
            state.rendering = true;
        }

        self.pre_fetch_range(page);
        self.render_loop().await
    }

    pub async fn next_page(&self) -> Result<()> {
        let len = self.manga_file.len();
        if len == 0 {
            return Err(ViewerError::InvalidPageIndex { page: 0, len });
        }

        let next = match self.current_page() {
            None => 0,
            Some(current) => {
                let step = if self.is_spread() { 2 } else { 1 };
                (current + step).min(len - 1)
            }
        };
        self.move_to_page(next).await
    }

    /// 見開きは先頭ページで指定されるので、2つ前から見開きになるならそこへ戻る
    pub async fn prev_page(&self) -> Result<()> {
        let page = match self.current_page() {
            None | Some(0) => return self.move_to_page(0).await,
            Some(page) => page,
        };

        if page >= 2 && self.drawer.should_draw_spread(page - 2).await? {
            return self.move_to_page(page - 2).await;
        }
        self.move_to_page(page - 1).await
    }

    fn pre_fetch_range(&self, page: usize) {
        let from = page.saturating_sub(self.prefetch_behind);
        let to = (page + self.prefetch_ahead).min(self.manga_file.len());
        for i in from..to {
            self.manga_file.pre_fetch(i);
        }
    }

    async fn render_loop(&self) -> Result<()> {
        let mut guard = RenderingGuard {
            state: &self.state,
            finished: false,
        };

        loop {
            let page = {
                let mut state = self.state.lock().unwrap();
                match state.target {
                    Some(page) => page,
                    None => {
                        state.rendering = false;
                        guard.finished = true;
                        return Ok(());
                    }
                }
            };

            let result = self.draw_and_present(page).await;

            let mut state = self.state.lock().unwrap();
            match result {
                Ok(spread) => {
                    state.settled = Some(Settled { page, spread });
                    log::debug!("[View] ページ {} を表示しました (見開き: {})", page, spread);
                }
                Err(e) if state.target == Some(page) => {
                    // 表示は変えずに目標を表示中のページへ戻す
                    log::error!("[View] ページ {} を描画できません: {}", page, e);
                    state.target = state.settled.map(|s| s.page);
                    state.rendering = false;
                    guard.finished = true;
                    return Err(e);
                }
                Err(e) => {
                    log::warn!("[View] 古い目標ページ {} の描画に失敗しました: {}", page, e);
                }
            }

            // 終了判定とフラグの解除は同じロック内で行う (別スレッドからの移動要求を取りこぼさない)
            if state.target == Some(page) {
                state.rendering = false;
                guard.finished = true;
                return Ok(());
            }
        }
    }

    async fn draw_and_present(&self, page: usize) -> Result<bool> {
        let frame = self.drawer.draw_page(page).await?;
        let spread = frame.layout.is_spread();
        self.target.lock().unwrap().present(frame)?;
        Ok(spread)
    }
}
