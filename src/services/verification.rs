//! 提交结果验证
//!
//! 表单关闭后轮询页面上的成功信号，按可靠程度依次检查：
//!
//! 1. “查看申请”链接
//! 2. 卡片曾有申请入口，现在显示已申请
//! 3. 成功提示条
//! 4. 详情页顶部的申请结果区域
//! 5. “申请已发送”确认对话框
//! 6. 卡片文字
//! 7. 申请按钮变为“已申请”
//! 8. 表单关闭超过 2 秒且没有错误提示
//!
//! 超时仍没有任何信号时返回 `Unverified`，由配置决定按成功还是失败处理。

use crate::error::SurfaceResult;
use crate::services::applied_probe::AppliedProbe;
use crate::services::pacing::{Pacer, Stopped};
use crate::surface::{text_or_empty, Criteria, ElementRef, PageSurface, SelectorSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// 表示申请成功的文字
pub const SUCCESS_PHRASES: &[&str] = &[
    "applied",
    "submitted",
    "application submitted",
    "application sent",
    "in progress",
];

/// 表单关闭后等待多久再按“无错误即成功”判断
const STEP_CLOSED_GRACE: Duration = Duration::from_secs(2);

/// 成功信号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessSignal {
    SeeApplication,
    AppliedTransition,
    Toast,
    StatusRegion,
    ConfirmationDialog,
    SummaryText,
    AppliedControl,
    StepClosed,
}

/// 验证结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Confirmed(SuccessSignal),
    /// 表单关闭后出现了错误提示
    Rejected,
    /// 超时未看到任何信号
    Unverified,
}

fn has_success_phrase(text: &str) -> bool {
    let text = text.to_lowercase();
    SUCCESS_PHRASES.iter().any(|p| text.contains(p))
}

pub struct Verifier {
    probe: Arc<AppliedProbe>,
    see_application: Criteria,
    toasts: Vec<Criteria>,
    apply_result: Criteria,
    confirmation_dialog: Criteria,
    applied_button: Criteria,
    step_surface: Criteria,
    error_toast: Criteria,
}

impl Verifier {
    pub fn new(selectors: &SelectorSet, probe: Arc<AppliedProbe>) -> Self {
        Self {
            probe,
            see_application: Criteria::css(&selectors.see_application),
            toasts: selectors.success_toasts.iter().map(Criteria::css).collect(),
            apply_result: Criteria::css(&selectors.apply_result),
            confirmation_dialog: Criteria::css(&selectors.confirmation_dialog),
            applied_button: Criteria::css(&selectors.applied_button),
            step_surface: selectors.step_surface(),
            error_toast: Criteria::css(&selectors.error_toast),
        }
    }

    pub async fn verify<S: PageSurface + ?Sized>(
        &self,
        surface: &S,
        card: Option<&ElementRef>,
        had_affordance: bool,
        timeout: Duration,
        interval: Duration,
        pacer: &Pacer,
    ) -> Result<Verification, Stopped> {
        let started = Instant::now();
        let mut step_closed_at = None;

        while started.elapsed() <= timeout {
            match self
                .poll(surface, card, had_affordance, &mut step_closed_at)
                .await
            {
                Ok(Some(verdict)) => {
                    match verdict {
                        Verification::Confirmed(signal) => info!("✓ 申请已确认 ({:?})", signal),
                        _ => warn!("✗ 表单关闭后出现错误提示"),
                    }
                    return Ok(verdict);
                }
                Ok(None) => {}
                Err(e) => debug!("验证轮询出错: {}", e),
            }
            pacer.fixed(interval).await?;
        }

        warn!("⏱️ 验证超时 ({}ms)", timeout.as_millis());
        Ok(Verification::Unverified)
    }

    async fn poll<S: PageSurface + ?Sized>(
        &self,
        surface: &S,
        card: Option<&ElementRef>,
        had_affordance: bool,
        step_closed_at: &mut Option<Instant>,
    ) -> SurfaceResult<Option<Verification>> {
        use SuccessSignal::*;

        if surface.find_first(&self.see_application).await?.is_some() {
            return Ok(Some(Verification::Confirmed(SeeApplication)));
        }

        if had_affordance && self.probe.is_already_applied(surface, card).await? {
            return Ok(Some(Verification::Confirmed(AppliedTransition)));
        }

        for criteria in &self.toasts {
            if let Some(toast) = surface.find_first(criteria).await? {
                if has_success_phrase(&text_or_empty(surface, &toast).await) {
                    return Ok(Some(Verification::Confirmed(Toast)));
                }
            }
        }

        if let Some(region) = surface.find_first(&self.apply_result).await? {
            if has_success_phrase(&text_or_empty(surface, &region).await) {
                return Ok(Some(Verification::Confirmed(StatusRegion)));
            }
        }

        if surface.find_first(&self.confirmation_dialog).await?.is_some() {
            return Ok(Some(Verification::Confirmed(ConfirmationDialog)));
        }

        if let Some(card) = card {
            if has_success_phrase(&text_or_empty(surface, card).await) {
                return Ok(Some(Verification::Confirmed(SummaryText)));
            }
        }

        if surface.find_first(&self.applied_button).await?.is_some() {
            return Ok(Some(Verification::Confirmed(AppliedControl)));
        }

        if surface.find_first(&self.step_surface).await?.is_none() {
            let closed_at = *step_closed_at.get_or_insert_with(Instant::now);
            if closed_at.elapsed() > STEP_CLOSED_GRACE {
                if surface.find_first(&self.error_toast).await?.is_some() {
                    return Ok(Some(Verification::Rejected));
                }
                return Ok(Some(Verification::Confirmed(StepClosed)));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::pacing::RunSignal;
    use crate::surface::fake::FakeSurface;

    fn verifier() -> Verifier {
        let selectors = SelectorSet::default();
        let probe = Arc::new(AppliedProbe::new(&selectors).unwrap());
        Verifier::new(&selectors, probe)
    }

    fn pacer() -> Pacer {
        let signal = RunSignal::new();
        signal.start();
        Pacer::new(signal)
    }

    async fn run(surface: &FakeSurface, card: Option<&ElementRef>, had: bool) -> Verification {
        verifier()
            .verify(
                surface,
                card,
                had,
                Duration::from_secs(15),
                Duration::from_millis(400),
                &pacer(),
            )
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_toast_confirms() {
        let surface = FakeSurface::new("https://www.linkedin.com/jobs/view/4000000001/");
        surface.add(None, &[".jobs-easy-apply-modal"], "");
        surface.add(None, &[".artdeco-toast-item--success"], "Your application was sent");
        assert_eq!(
            run(&surface, None, false).await,
            Verification::Confirmed(SuccessSignal::Toast)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transition_requires_prior_affordance() {
        let surface = FakeSurface::new("https://www.linkedin.com/jobs/view/4000000001/");
        let card = surface.add(None, &["li.job-card-container"], "Rust Engineer");
        let footer = surface.add(Some(&card), &[".job-card-container__footer-item"], "Applied");
        surface.add(None, &[".jobs-easy-apply-modal"], "");

        assert_eq!(
            run(&surface, Some(&card), true).await,
            Verification::Confirmed(SuccessSignal::AppliedTransition)
        );

        surface.with(|dom| dom.set_text(&footer, "Promoted"));
        assert_eq!(run(&surface, Some(&card), false).await, Verification::Unverified);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_step_with_error_toast_is_rejected() {
        let surface = FakeSurface::new("https://www.linkedin.com/jobs/view/4000000001/");
        surface.add(None, &[".artdeco-toast-item--error"], "Something went wrong");
        assert_eq!(run(&surface, None, false).await, Verification::Rejected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_step_without_errors_confirms() {
        let surface = FakeSurface::new("https://www.linkedin.com/jobs/view/4000000001/");
        assert_eq!(
            run(&surface, None, false).await,
            Verification::Confirmed(SuccessSignal::StepClosed)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_step_without_signals_is_unverified() {
        let surface = FakeSurface::new("https://www.linkedin.com/jobs/view/4000000001/");
        surface.add(None, &[".jobs-easy-apply-modal"], "Review your application");
        assert_eq!(run(&surface, None, false).await, Verification::Unverified);
    }
}
