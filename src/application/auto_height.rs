// Auto-height controller - fits a widget's grid rows to its content height
//
// Growth is applied at once. A shrink of one row is treated as reflow jitter
// and ignored; larger shrinks must be confirmed by a second measurement after
// `shrink_confirm_delay` before they are committed.
use serde::Deserialize;
use std::future;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct AutoHeightConfig {
    pub row_height_px: f64,
    pub min_rows: u32,
    pub max_rows: u32,
    #[serde(with = "millis")]
    pub shrink_confirm_delay: Duration,
    #[serde(with = "millis")]
    pub measure_debounce: Duration,
}

impl Default for AutoHeightConfig {
    fn default() -> Self {
        Self {
            row_height_px: 40.0,
            min_rows: 2,
            max_rows: 40,
            shrink_confirm_delay: Duration::from_millis(400),
            measure_debounce: Duration::from_millis(120),
        }
    }
}

impl AutoHeightConfig {
    /// Convert a content height to grid rows. Zero, negative or non-finite
    /// heights fall back to `min_rows`.
    pub fn rows_for(&self, content_px: f64) -> u32 {
        if !content_px.is_finite() || content_px <= 0.0 || self.row_height_px <= 0.0 {
            return self.min_rows;
        }
        let rows = (content_px / self.row_height_px).ceil();
        self.clamp(if rows >= u32::MAX as f64 { u32::MAX } else { rows as u32 })
    }

    fn clamp(&self, rows: u32) -> u32 {
        rows.clamp(self.min_rows, self.max_rows.max(self.min_rows))
    }
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeightState {
    Stable,
    PendingShrink { candidate: u32, deadline: Instant },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeightDecision {
    Commit(u32),
    Ignore,
    ScheduleShrink { deadline: Instant },
}

#[derive(Debug, Clone)]
pub struct AutoHeightController {
    config: AutoHeightConfig,
    committed: u32,
    state: HeightState,
}

impl AutoHeightController {
    pub fn new(config: AutoHeightConfig, committed_rows: u32) -> Self {
        Self {
            committed: config.clamp(committed_rows),
            config,
            state: HeightState::Stable,
        }
    }

    pub fn committed_rows(&self) -> u32 {
        self.committed
    }

    pub fn state(&self) -> HeightState {
        self.state
    }

    pub fn config(&self) -> &AutoHeightConfig {
        &self.config
    }

    pub fn on_measure(&mut self, content_px: f64, now: Instant) -> HeightDecision {
        let rows = self.config.rows_for(content_px);

        if rows > self.committed {
            self.committed = rows;
            self.state = HeightState::Stable;
            return HeightDecision::Commit(rows);
        }

        if rows.saturating_add(1) >= self.committed {
            return HeightDecision::Ignore;
        }

        let deadline = now + self.config.shrink_confirm_delay;
        self.state = HeightState::PendingShrink {
            candidate: rows,
            deadline,
        };
        HeightDecision::ScheduleShrink { deadline }
    }

    /// Confirmation timer for a pending shrink. `content_px` is a fresh
    /// measurement; the shrink only lands if it is still two or more rows
    /// below the committed height.
    pub fn on_timer(&mut self, content_px: f64, now: Instant) -> HeightDecision {
        let HeightState::PendingShrink { deadline, .. } = self.state else {
            return HeightDecision::Ignore;
        };
        if now < deadline {
            return HeightDecision::Ignore;
        }

        self.state = HeightState::Stable;
        let rows = self.config.rows_for(content_px);
        if rows.saturating_add(2) <= self.committed || rows > self.committed {
            self.committed = rows;
            return HeightDecision::Commit(rows);
        }
        HeightDecision::Ignore
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeightCommit {
    pub widget_id: String,
    pub rows: u32,
}

/// Owns a running auto-height driver. Dropping the handle stops the driver
/// and cancels any pending timers.
#[derive(Debug)]
pub struct AutoHeightHandle {
    samples: watch::Sender<Option<f64>>,
    task: JoinHandle<()>,
}

impl AutoHeightHandle {
    pub fn spawn(
        widget_id: String,
        controller: AutoHeightController,
        commits: mpsc::UnboundedSender<HeightCommit>,
    ) -> Self {
        let (tx, rx) = watch::channel(None);
        let task = tokio::spawn(drive(widget_id, controller, rx, commits));
        Self { samples: tx, task }
    }

    /// Feed a content height sample. Samples arriving faster than the driver
    /// wakes up overwrite each other, so it always sees the latest one.
    pub fn measure(&self, content_px: f64) {
        self.samples.send_replace(Some(content_px));
    }
}

impl Drop for AutoHeightHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}

async fn drive(
    widget_id: String,
    mut controller: AutoHeightController,
    mut samples: watch::Receiver<Option<f64>>,
    commits: mpsc::UnboundedSender<HeightCommit>,
) {
    let debounce = controller.config().measure_debounce;
    let mut latest: Option<f64> = None;
    let mut measure_at: Option<Instant> = None;

    loop {
        let shrink_at = match controller.state() {
            HeightState::PendingShrink { deadline, .. } => Some(deadline),
            HeightState::Stable => None,
        };

        let decision = tokio::select! {
            changed = samples.changed() => {
                if changed.is_err() {
                    break;
                }
                let sample = *samples.borrow_and_update();
                match sample {
                    // First sample measures immediately
                    Some(px) if latest.is_none() => {
                        latest = Some(px);
                        controller.on_measure(px, Instant::now())
                    }
                    Some(px) => {
                        latest = Some(px);
                        measure_at = Some(Instant::now() + debounce);
                        HeightDecision::Ignore
                    }
                    None => HeightDecision::Ignore,
                }
            }
            _ = sleep_until_opt(measure_at) => {
                measure_at = None;
                match latest {
                    Some(px) => controller.on_measure(px, Instant::now()),
                    None => HeightDecision::Ignore,
                }
            }
            _ = sleep_until_opt(shrink_at) => {
                controller.on_timer(latest.unwrap_or(0.0), Instant::now())
            }
        };

        match decision {
            HeightDecision::Commit(rows) => {
                tracing::debug!("Widget {} fits {} rows", widget_id, rows);
                let commit = HeightCommit {
                    widget_id: widget_id.clone(),
                    rows,
                };
                if commits.send(commit).is_err() {
                    break;
                }
            }
            HeightDecision::ScheduleShrink { deadline } => {
                if let HeightState::PendingShrink { candidate, .. } = controller.state() {
                    tracing::trace!(
                        "Widget {} shrink to {} rows pending until {:?}",
                        widget_id, candidate, deadline
                    );
                }
            }
            HeightDecision::Ignore => {}
        }
    }
    tracing::trace!("Auto-height driver for {} stopped", widget_id);
}
