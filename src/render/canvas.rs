use crate::error::Result;
use crate::render::{Frame, FrameLayout, RenderTarget};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct CanvasState {
    current: Option<Frame>,
    history: Vec<FrameLayout>,
}

/// メモリ上のキャンバス。クローンは同じキャンバスを指す。
#[derive(Clone, Default)]
pub struct CanvasTarget {
    state: Arc<Mutex<CanvasState>>,
}

impl CanvasTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// 最後に表示したフレーム
    pub fn current_frame(&self) -> Option<Frame> {
        self.state.lock().unwrap().current.clone()
    }

    /// これまでに表示したフレームの配置 (古い順)
    pub fn presented(&self) -> Vec<FrameLayout> {
        self.state.lock().unwrap().history.clone()
    }
}

impl RenderTarget for CanvasTarget {
    fn present(&mut self, frame: Frame) -> Result<()> {
        log::debug!(
            "[Canvas] {:?} を表示 ({}x{})",
            frame.layout,
            frame.width(),
            frame.height()
        );
        let mut state = self.state.lock().unwrap();
        state.history.push(frame.layout);
        state.current = Some(frame);
        Ok(())
    }
}
