use tokio::sync::broadcast;

/// Name of the push channel carrying downloader output.
pub const DOWNLOAD_LOG_CHANNEL: &str = "download-log";

/// Producer side of the "download-log" channel.
///
/// Lines are delivered to every subscriber in emission order. Emitting with
/// no subscriber attached is not an error; the line is simply dropped.
#[derive(Debug, Clone)]
pub struct HostEvents {
    sender: broadcast::Sender<String>,
}

impl HostEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn emit(&self, line: impl Into<String>) {
        let line = line.into();
        tracing::trace!(channel = DOWNLOAD_LOG_CHANNEL, %line);
        let _ = self.sender.send(line);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
