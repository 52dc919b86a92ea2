use std::collections::VecDeque;

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::{broadcast, oneshot};

use super::progress;
use crate::domain::LogLine;
use crate::host::HostEvents;
use crate::utils::get_timestamp;

pub const DEFAULT_LOG_CAPACITY: usize = 50;

/// Most recent downloader output lines, oldest evicted first.
#[derive(Debug, Clone)]
pub struct LogRing {
    lines: VecDeque<LogLine>,
    capacity: usize,
    appended: u64,
}

impl Default for LogRing {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl LogRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
            appended: 0,
        }
    }

    pub fn append(&mut self, text: impl Into<String>) {
        self.lines.push_back(LogLine {
            timestamp: get_timestamp(),
            text: text.into(),
        });
        self.appended += 1;
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
        }
    }

    pub fn snapshot(&self) -> Vec<LogLine> {
        self.lines.iter().cloned().collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of lines ever appended, evicted ones included.
    pub fn appended(&self) -> u64 {
        self.appended
    }

    #[cfg(test)]
    pub fn latest_progress(&self) -> Option<f32> {
        self.latest_progress_since(0)
    }

    /// Percentage from the newest line that carries one, looking only at
    /// lines appended after the `mark` taken from [`appended`](Self::appended).
    pub fn latest_progress_since(&self, mark: u64) -> Option<f32> {
        let fresh = self.appended.saturating_sub(mark).min(self.lines.len() as u64) as usize;
        self.lines
            .iter()
            .rev()
            .take(fresh)
            .find_map(|line| progress::extract(&line.text))
    }
}

/// Ownership of the single listener a view keeps on the "download-log" channel.
///
/// `attach` hands out a stream only once; the stream ends as soon as the
/// subscription is detached or dropped.
#[derive(Debug, Default)]
pub struct LogSubscription {
    shutdown: Option<oneshot::Sender<()>>,
}

impl LogSubscription {
    pub fn attach(&mut self, events: &HostEvents) -> Option<BoxStream<'static, String>> {
        if self.shutdown.is_some() {
            return None;
        }
        let (shutdown, stopped) = oneshot::channel();
        self.shutdown = Some(shutdown);
        tracing::debug!("download log listener attached");
        Some(log_stream(events.subscribe(), stopped))
    }

    pub fn detach(&mut self) -> bool {
        let attached = self.shutdown.take().is_some();
        if attached {
            tracing::debug!("download log listener detached");
        }
        attached
    }

    #[cfg(test)]
    pub fn is_attached(&self) -> bool {
        self.shutdown.is_some()
    }
}

fn log_stream(
    receiver: broadcast::Receiver<String>,
    stopped: oneshot::Receiver<()>,
) -> BoxStream<'static, String> {
    futures::stream::unfold(
        (receiver, stopped),
        |(mut receiver, mut stopped)| async move {
            loop {
                let received = tokio::select! {
                    biased;
                    _ = &mut stopped => return None,
                    received = receiver.recv() => received,
                };
                match received {
                    Ok(line) => return Some((line, (receiver, stopped))),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "download log listener fell behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        },
    )
    .boxed()
}
