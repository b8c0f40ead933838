use crate::events::AppEvent;
use crate::input::{TickGuard, TickScheduler};
use async_channel::Sender;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;

/// Posts [`AppEvent::Tick`] at a fixed rate until the guard is dropped.
pub struct TokioTicker {
    handle: Handle,
    tx: Sender<AppEvent>,
}

impl TokioTicker {
    pub fn new(handle: Handle, tx: Sender<AppEvent>) -> Self {
        Self { handle, tx }
    }
}

impl TickScheduler for TokioTicker {
    fn start(&self, every: Duration) -> TickGuard {
        let tx = self.tx.clone();
        let task = self.handle.spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if tx.send(AppEvent::Tick).await.is_err() {
                    break;
                }
            }
        });
        TickGuard::new(move || task.abort())
    }
}
