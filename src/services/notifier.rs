use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

/// Published after an entry's guidance is refined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryUpdate {
    pub entry_id: i64,
}

/// Fan-out of "history changed" signals. Every subscriber sees every update.
#[derive(Clone)]
pub struct UpdateNotifier {
    tx: broadcast::Sender<HistoryUpdate>,
}

impl Default for UpdateNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateNotifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn notify(&self, entry_id: i64) {
        // Err only means nobody is listening right now.
        let receivers = self.tx.send(HistoryUpdate { entry_id }).unwrap_or(0);
        tracing::debug!(entry_id, receivers, "History update published");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HistoryUpdate> {
        self.tx.subscribe()
    }
}
