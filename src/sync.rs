//! 一度だけ値が確定するブロードキャスト。
//!
//! 状態は `Pending { waiters }` か `Resolved { value }` のどちらか。
//! 確定後に購読した側には、保持している値がその場で渡される。
//! 待機者への通知は登録順に行う。

use std::sync::Mutex;
use tokio::sync::oneshot;

type Callback<T> = Box<dyn FnOnce(T) + Send>;

enum Waiter<T> {
    Channel(oneshot::Sender<T>),
    Callback(Callback<T>),
}

enum State<T> {
    Pending(Vec<Waiter<T>>),
    Resolved(T),
}

pub struct OneShot<T> {
    state: Mutex<State<T>>,
}

impl<T: Clone + Send + 'static> OneShot<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::Pending(Vec::new())),
        }
    }

    /// 値を確定させて待機者に配る。既に確定していた場合は `false`。
    pub fn resolve(&self, value: T) -> bool {
        let waiters = {
            let mut state = self.state.lock().unwrap();
            match &mut *state {
                State::Resolved(_) => return false,
                State::Pending(waiters) => {
                    let waiters = std::mem::take(waiters);
                    *state = State::Resolved(value.clone());
                    waiters
                }
            }
        };

        // ロックを外してから通知する (コールバックから再入されても良いように)
        for waiter in waiters {
            match waiter {
                Waiter::Channel(tx) => {
                    let _ = tx.send(value.clone());
                }
                Waiter::Callback(f) => f(value.clone()),
            }
        }
        true
    }

    pub fn get(&self) -> Option<T> {
        match &*self.state.lock().unwrap() {
            State::Resolved(value) => Some(value.clone()),
            State::Pending(_) => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(&*self.state.lock().unwrap(), State::Resolved(_))
    }

    /// 確定済みなら即座に、そうでなければ確定時に `f` を呼ぶ。
    pub fn on_resolved<F>(&self, f: F)
    where
        F: FnOnce(T) + Send + 'static,
    {
        let value = {
            let mut state = self.state.lock().unwrap();
            match &mut *state {
                State::Resolved(value) => value.clone(),
                State::Pending(waiters) => {
                    waiters.push(Waiter::Callback(Box::new(f)));
                    return;
                }
            }
        };
        f(value);
    }

    pub async fn wait(&self) -> T {
        loop {
            let rx = {
                let mut state = self.state.lock().unwrap();
                match &mut *state {
                    State::Resolved(value) => return value.clone(),
                    State::Pending(waiters) => {
                        let (tx, rx) = oneshot::channel();
                        waiters.push(Waiter::Channel(tx));
                        rx
                    }
                }
            };

            if let Ok(value) = rx.await {
                return value;
            }
        }
    }
}

impl<T: Clone + Send + 'static> Default for OneShot<T> {
    fn default() -> Self {
        Self::new()
    }
}
