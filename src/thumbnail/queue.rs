use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::task::JoinHandle;

/// ページ番号の FIFO とそれを消化するワーカーのハンドル
#[derive(Default)]
pub struct WorkQueue {
    jobs: Mutex<VecDeque<usize>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, page: usize) {
        self.jobs.lock().unwrap().push_back(page);
    }

    pub fn dequeue(&self) -> Option<usize> {
        self.jobs.lock().unwrap().pop_front()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// まだ始まっていないジョブを捨て、捨てた数を返す
    pub fn clear(&self) -> usize {
        let mut jobs = self.jobs.lock().unwrap();
        let dropped = jobs.len();
        jobs.clear();
        dropped
    }

    pub fn add_worker(&self, handle: JoinHandle<()>) {
        self.workers.lock().unwrap().push(handle);
    }

    /// 全ワーカーの終了を待つ。実行中のジョブは最後まで走る。
    pub async fn join(&self) {
        let handles = std::mem::take(&mut *self.workers.lock().unwrap());
        for handle in handles {
            if let Err(e) = handle.await {
                log::error!("[Thumbnail] ワーカーが異常終了しました: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn fifo_order_and_clear() {
        let queue = WorkQueue::new();
        for page in [3, 1, 2] {
            queue.enqueue(page);
        }
        assert_eq!(queue.dequeue(), Some(3));
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
        assert_eq!(queue.dequeue(), None);
    }

    #[tokio::test]
    async fn join_waits_for_every_worker() {
        let queue = Arc::new(WorkQueue::new());
        let done = Arc::new(AtomicUsize::new(0));
        for page in 0..10 {
            queue.enqueue(page);
        }

        for _ in 0..3 {
            let worker_queue = queue.clone();
            let done = done.clone();
            queue.add_worker(tokio::spawn(async move {
                while worker_queue.dequeue().is_some() {
                    tokio::task::yield_now().await;
                    done.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }

        queue.join().await;
        assert_eq!(done.load(Ordering::SeqCst), 10);
    }
}
