//! 运行信号与节奏控制
//!
//! 所有挂起点（随机延迟、轮询、冷却、人工介入）都和停止信号赛跑，
//! 停止后在一个挂起周期内就能被观察到。

use rand::Rng;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

/// 运行已被停止
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("运行已停止")]
pub struct Stopped;

/// 全局运行信号（唯一的取消信号）
#[derive(Clone, Debug)]
pub struct RunSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for RunSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl RunSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_running(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn start(&self) {
        self.tx.send_replace(true);
    }

    /// 停止运行，返回之前是否在运行
    pub fn stop(&self) -> bool {
        self.tx.send_replace(false)
    }

    /// 运行中返回 `Ok`，否则返回 `Stopped`
    pub fn check(&self) -> Result<(), Stopped> {
        if self.is_running() {
            Ok(())
        } else {
            Err(Stopped)
        }
    }

    /// 等待直到运行被停止
    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|running| !*running).await;
    }
}

/// 可被停止信号打断的睡眠
pub async fn sleep(signal: &RunSignal, duration: Duration) -> Result<(), Stopped> {
    signal.check()?;
    tokio::select! {
        _ = tokio::time::sleep(duration) => signal.check(),
        _ = signal.stopped() => Err(Stopped),
    }
}

/// `[min_ms, max_ms]` 内的随机时长
pub fn random_duration(min_ms: u64, max_ms: u64) -> Duration {
    let (low, high) = if min_ms <= max_ms {
        (min_ms, max_ms)
    } else {
        (max_ms, min_ms)
    };
    Duration::from_millis(rand::thread_rng().gen_range(low..=high))
}

/// 拟人化节奏控制
#[derive(Clone, Debug)]
pub struct Pacer {
    signal: RunSignal,
}

impl Pacer {
    pub fn new(signal: RunSignal) -> Self {
        Self { signal }
    }

    pub fn signal(&self) -> &RunSignal {
        &self.signal
    }

    pub fn check(&self) -> Result<(), Stopped> {
        self.signal.check()
    }

    /// 随机等待 `[min_ms, max_ms]` 毫秒
    pub async fn between(&self, min_ms: u64, max_ms: u64) -> Result<(), Stopped> {
        sleep(&self.signal, random_duration(min_ms, max_ms)).await
    }

    pub async fn fixed(&self, duration: Duration) -> Result<(), Stopped> {
        sleep(&self.signal, duration).await
    }
}

#[derive(Debug)]
struct DeadlineState {
    expires_at: Instant,
    suspended_at: Option<Instant>,
    depth: u32,
}

/// 单个职位的处理时限
///
/// 人工介入期间计时暂停，恢复后到期时间顺延暂停的时长。
#[derive(Clone, Debug)]
pub struct ItemDeadline {
    state: Arc<Mutex<DeadlineState>>,
    budget: Duration,
}

impl ItemDeadline {
    pub fn start(budget: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(DeadlineState {
                expires_at: Instant::now() + budget,
                suspended_at: None,
                depth: 0,
            })),
            budget,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DeadlineState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 暂停计时，返回的守卫被丢弃时恢复
    pub fn suspend(&self) -> DeadlineSuspension {
        let mut state = self.lock();
        if state.depth == 0 {
            state.suspended_at = Some(Instant::now());
        }
        state.depth += 1;
        DeadlineSuspension {
            deadline: self.clone(),
        }
    }

    fn resume(&self) {
        let mut state = self.lock();
        state.depth = state.depth.saturating_sub(1);
        if state.depth == 0 {
            if let Some(at) = state.suspended_at.take() {
                let paused_for = Instant::now().saturating_duration_since(at);
                state.expires_at += paused_for;
            }
        }
    }

    /// 剩余时间，暂停中返回 `None`
    pub fn remaining(&self) -> Option<Duration> {
        let state = self.lock();
        match state.suspended_at {
            Some(_) => None,
            None => Some(state.expires_at.saturating_duration_since(Instant::now())),
        }
    }

    /// 等待到期
    pub async fn elapsed(&self) {
        loop {
            let target = {
                let state = self.lock();
                match state.suspended_at {
                    Some(_) => None,
                    None => Some(state.expires_at),
                }
            };
            match target {
                None => tokio::time::sleep(Duration::from_millis(250)).await,
                Some(at) => {
                    if Instant::now() >= at {
                        return;
                    }
                    tokio::time::sleep_until(at).await;
                }
            }
        }
    }
}

/// 计时暂停守卫
#[derive(Debug)]
pub struct DeadlineSuspension {
    deadline: ItemDeadline,
}

impl Drop for DeadlineSuspension {
    fn drop(&mut self) {
        self.deadline.resume();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_is_interrupted_by_stop() {
        let signal = RunSignal::new();
        signal.start();

        let stopper = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            stopper.stop();
        });

        let started = Instant::now();
        let result = sleep(&signal, Duration::from_secs(30)).await;
        assert_eq!(result, Err(Stopped));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_sleep_refuses_when_not_running() {
        let signal = RunSignal::new();
        assert_eq!(sleep(&signal, Duration::from_millis(1)).await, Err(Stopped));
    }

    #[test]
    fn test_random_duration_stays_in_range() {
        for _ in 0..100 {
            let d = random_duration(900, 300);
            assert!(d >= Duration::from_millis(300) && d <= Duration::from_millis(900));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_is_extended_while_suspended() {
        let deadline = ItemDeadline::start(Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(4)).await;

        {
            let _guard = deadline.suspend();
            assert!(deadline.remaining().is_none());
            tokio::time::sleep(Duration::from_secs(100)).await;
        }

        let remaining = deadline.remaining().unwrap();
        assert_eq!(remaining, Duration::from_secs(6));

        let started = Instant::now();
        deadline.elapsed().await;
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }
}
