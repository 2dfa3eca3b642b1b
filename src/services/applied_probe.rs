//! “已申请”探测
//!
//! 调度器用它跳过已经申请过的职位，验证引擎用它确认“有申请入口 → 已申请”的转变。

use crate::error::SurfaceResult;
use crate::surface::{text_or_empty, Criteria, ElementRef, PageSurface, SelectorSet};
use regex::Regex;
use tracing::debug;

pub struct AppliedProbe {
    see_application: Criteria,
    detail_pane: Criteria,
    card_footers: Vec<String>,
    applied_button: Criteria,
    applied_ago: Regex,
    applied_on: Regex,
}

impl AppliedProbe {
    pub fn new(selectors: &SelectorSet) -> Result<Self, regex::Error> {
        Ok(Self {
            see_application: Criteria::css(&selectors.see_application),
            detail_pane: selectors.detail_pane(),
            card_footers: selectors.card_footers.clone(),
            applied_button: Criteria::css(&selectors.applied_button),
            applied_ago: Regex::new(r"applied\s+(\d+\s+)?(minute|hour|day|week|month)s?\s+ago")?,
            applied_on: Regex::new(r"applied\s+on\s+")?,
        })
    }

    /// 详情页文字是否显示已申请
    pub fn detail_text_shows_applied(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.applied_ago.is_match(&text)
            || self.applied_on.is_match(&text)
            || text.contains("application sent")
            || text.contains("application submitted")
            || text.contains("see application")
    }

    /// 卡片底部条目是否以 “applied” 开头
    pub fn footer_shows_applied(text: &str) -> bool {
        let text = text.trim().to_lowercase();
        text == "applied" || text.starts_with("applied ")
    }

    /// 卡片整体文字是否显示已申请或已关闭
    pub fn card_text_shows_applied(text: &str) -> bool {
        let text = text.to_lowercase();
        text.contains("application submitted")
            || text.contains("no longer accepting")
            || text.contains("application in progress")
    }

    pub async fn is_already_applied<S: PageSurface + ?Sized>(
        &self,
        surface: &S,
        card: Option<&ElementRef>,
    ) -> SurfaceResult<bool> {
        if surface.find_first(&self.see_application).await?.is_some() {
            debug!("✓ 通过“查看申请”链接确认已申请");
            return Ok(true);
        }

        if let Some(pane) = surface.find_first(&self.detail_pane).await? {
            let text = text_or_empty(surface, &pane).await;
            if self.detail_text_shows_applied(&text) {
                debug!("✓ 详情页显示已申请");
                return Ok(true);
            }
        }

        if let Some(card) = card {
            for selector in &self.card_footers {
                let criteria = Criteria::css(selector).within(card);
                if let Some(footer) = surface.find_first(&criteria).await? {
                    if Self::footer_shows_applied(&text_or_empty(surface, &footer).await) {
                        debug!("✓ 卡片底部显示已申请");
                        return Ok(true);
                    }
                }
            }
            if Self::card_text_shows_applied(&text_or_empty(surface, card).await) {
                debug!("✓ 卡片文字显示已申请");
                return Ok(true);
            }
        }

        if surface.find_first(&self.applied_button).await?.is_some() {
            debug!("✓ 申请按钮已变为“已申请”");
            return Ok(true);
        }

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::fake::FakeSurface;

    #[test]
    fn test_detail_text_patterns() {
        let probe = AppliedProbe::new(&SelectorSet::default()).unwrap();
        assert!(probe.detail_text_shows_applied("Applied 45 minutes ago"));
        assert!(probe.detail_text_shows_applied("applied 2 weeks ago · 30 applicants"));
        assert!(probe.detail_text_shows_applied("Applied on March 3"));
        assert!(!probe.detail_text_shows_applied("Easy Apply · 30 applicants"));
    }

    #[test]
    fn test_footer_must_start_with_applied() {
        assert!(AppliedProbe::footer_shows_applied("  Applied "));
        assert!(AppliedProbe::footer_shows_applied("Applied 3 days ago"));
        assert!(!AppliedProbe::footer_shows_applied("Be an early applicant"));
    }

    #[tokio::test]
    async fn test_probe_on_page() {
        let probe = AppliedProbe::new(&SelectorSet::default()).unwrap();
        let surface = FakeSurface::new("https://www.linkedin.com/jobs/view/4000000001/");
        let card = surface.add(None, &["li.job-card-container"], "Rust Engineer");
        surface.add(None, &[".jobs-details"], "Rust Engineer · Easy Apply");
        assert!(!probe.is_already_applied(&surface, Some(&card)).await.unwrap());

        surface.add(None, &["#jobs-apply-see-application-link"], "See application");
        assert!(probe.is_already_applied(&surface, Some(&card)).await.unwrap());
    }
}
