//! StatusSink port - 進捗の通知先（通知バー、ステータス表示、ログ）
//!
//! emit は同期・失敗しない。通知先の不調が pass を止めることはない。

use crate::domain::SyncEvent;

pub trait StatusSink: Send + Sync {
    fn emit(&self, event: &SyncEvent);
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStatusSink;

impl StatusSink for NoopStatusSink {
    fn emit(&self, _event: &SyncEvent) {}
}

/// Fans one event out to several sinks.
#[derive(Default)]
pub struct FanoutStatusSink {
    sinks: Vec<std::sync::Arc<dyn StatusSink>>,
}

impl FanoutStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: std::sync::Arc<dyn StatusSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl StatusSink for FanoutStatusSink {
    fn emit(&self, event: &SyncEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}
