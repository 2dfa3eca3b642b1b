//! 人工介入闸门（Manual-Pause Gate）
//!
//! 表单无法自动推进时挂起等待外部输入。每个等待只能被解决一次：
//! 外部的 resume / skip / cancel、到期、或运行被停止，先到者生效，之后的解决请求都是空操作。

use crate::services::notifier::{ControlEvent, Notifier};
use crate::services::pacing::RunSignal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{info, warn};

/// 外部给出的决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseDecision {
    Resume,
    Skip,
    Cancel,
}

/// 一次等待的最终结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseResolution {
    Resume,
    Skip,
    Cancel,
    TimedOut,
}

impl From<PauseDecision> for PauseResolution {
    fn from(decision: PauseDecision) -> Self {
        match decision {
            PauseDecision::Resume => PauseResolution::Resume,
            PauseDecision::Skip => PauseResolution::Skip,
            PauseDecision::Cancel => PauseResolution::Cancel,
        }
    }
}

struct PendingPause {
    ticket_id: u64,
    tx: oneshot::Sender<PauseDecision>,
}

struct GateInner {
    slot: Mutex<Option<PendingPause>>,
    seq: AtomicU64,
    notifier: Notifier,
    signal: RunSignal,
}

/// 人工介入闸门
#[derive(Clone)]
pub struct PauseGate {
    inner: Arc<GateInner>,
}

impl PauseGate {
    pub fn new(notifier: Notifier, signal: RunSignal) -> Self {
        Self {
            inner: Arc::new(GateInner {
                slot: Mutex::new(None),
                seq: AtomicU64::new(0),
                notifier,
                signal,
            }),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<PendingPause>> {
        self.inner.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 打开一次等待并通知控制端
    pub fn open(&self, deadline: Duration, reason: &str) -> PauseTicket {
        let (tx, rx) = oneshot::channel();
        let ticket_id = self.inner.seq.fetch_add(1, Ordering::SeqCst) + 1;

        let replaced = self.slot().replace(PendingPause { ticket_id, tx });
        if replaced.is_some() {
            warn!("⚠️ 上一次人工介入尚未解决，已被新的请求取代");
        }

        info!("⏸️ 等待人工处理 {} 秒 ({})", deadline.as_secs(), reason);
        self.inner.notifier.emit(ControlEvent::ManualPauseRequested {
            seconds: deadline.as_secs(),
            reason: reason.to_string(),
        });

        PauseTicket {
            ticket_id,
            rx,
            deadline,
            gate: self.clone(),
        }
    }

    /// 外部解决当前等待，没有等待时返回 `false`
    pub fn resolve(&self, decision: PauseDecision) -> bool {
        let pending = self.slot().take();
        match pending {
            Some(pending) => {
                let _ = pending.tx.send(decision);
                self.notify_cleared();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.slot().is_some()
    }

    /// 到期或停止时由等待方自己收回，票据已被解决时返回 `false`
    fn withdraw(&self, ticket_id: u64) -> bool {
        let mut slot = self.slot();
        if slot.as_ref().map(|p| p.ticket_id) == Some(ticket_id) {
            slot.take();
            drop(slot);
            self.notify_cleared();
            true
        } else {
            false
        }
    }

    fn notify_cleared(&self) {
        self.inner.notifier.emit(ControlEvent::ManualPauseCleared {
            is_running: self.inner.signal.is_running(),
        });
    }
}

/// 一次未解决的人工介入
pub struct PauseTicket {
    ticket_id: u64,
    rx: oneshot::Receiver<PauseDecision>,
    deadline: Duration,
    gate: PauseGate,
}

enum Woke {
    Decided(Result<PauseDecision, oneshot::error::RecvError>),
    Deadline,
    Stopped,
}

impl PauseTicket {
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// 等待解决
    pub async fn wait(self) -> PauseResolution {
        let PauseTicket {
            ticket_id,
            mut rx,
            deadline,
            gate,
        } = self;

        if !gate.inner.signal.is_running() && gate.withdraw(ticket_id) {
            return PauseResolution::Cancel;
        }

        let signal = gate.inner.signal.clone();
        let woke = tokio::select! {
            decided = &mut rx => Woke::Decided(decided),
            _ = tokio::time::sleep(deadline) => Woke::Deadline,
            _ = signal.stopped() => Woke::Stopped,
        };

        match woke {
            Woke::Decided(decided) => decided
                .map(PauseResolution::from)
                .unwrap_or(PauseResolution::Cancel),
            Woke::Deadline => {
                if gate.withdraw(ticket_id) {
                    info!("⏱️ 人工处理超时");
                    PauseResolution::TimedOut
                } else {
                    rx.try_recv()
                        .map(PauseResolution::from)
                        .unwrap_or(PauseResolution::TimedOut)
                }
            }
            Woke::Stopped => {
                if gate.withdraw(ticket_id) {
                    PauseResolution::Cancel
                } else {
                    rx.try_recv()
                        .map(PauseResolution::from)
                        .unwrap_or(PauseResolution::Cancel)
                }
            }
        }
    }
}
