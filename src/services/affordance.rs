//! 申请入口查找
//!
//! 先找专用ID的按钮，再按候选选择器全局查找，然后在详情区和卡片内查找，最后扫描全部按钮。

use crate::error::SurfaceResult;
use crate::surface::{text_or_empty, Criteria, ElementRef, PageSurface, SelectorSet};
use tracing::{debug, info};

/// 按钮文字、aria-label、`data-is-easy-apply` 属性判断是否为申请按钮
pub fn is_apply_button(text: &str, aria_label: &str, easy_attr: Option<&str>, disabled: bool) -> bool {
    if disabled {
        return false;
    }
    let text = text.trim().to_lowercase();
    let aria = aria_label.trim().to_lowercase();

    let easy_apply_text = text.contains("easy apply") || aria.contains("easy apply");
    let apply_text = text.contains("apply") || aria.contains("apply");
    let easy_attr = matches!(easy_attr, Some("true") | Some("1"));
    let already_applied =
        text.contains("applied") || text.contains("application sent") || aria.contains("applied");

    easy_apply_text || (apply_text && !already_applied) || easy_attr
}

pub struct AffordanceLocator {
    primary: Criteria,
    candidates: Vec<String>,
    detail_pane: Criteria,
    scan: Criteria,
}

impl AffordanceLocator {
    pub fn new(selectors: &SelectorSet) -> Self {
        Self {
            primary: Criteria::css(&selectors.apply_primary),
            candidates: selectors.apply_candidates.clone(),
            detail_pane: selectors.detail_pane(),
            scan: Criteria::css(&selectors.apply_scan),
        }
    }

    pub async fn locate<S: PageSurface + ?Sized>(
        &self,
        surface: &S,
        card: Option<&ElementRef>,
    ) -> SurfaceResult<Option<ElementRef>> {
        if let Some(button) = surface.find_first(&self.primary).await? {
            let text = text_or_empty(surface, &button).await.to_lowercase();
            if !surface.is_disabled(&button).await? && text.contains("easy apply") {
                info!("✓ 通过 {} 找到申请按钮", self.primary.css);
                return Ok(Some(button));
            }
            debug!("{} 存在但文字为: {}", self.primary.css, text.trim());
        }

        for selector in &self.candidates {
            if let Some(button) = surface.find_first(&Criteria::css(selector)).await? {
                if self.qualifies(surface, &button).await? {
                    info!("✓ 找到申请按钮: {}", selector);
                    return Ok(Some(button));
                }
            }
        }

        let mut scopes = Vec::new();
        if let Some(pane) = surface.find_first(&self.detail_pane).await? {
            scopes.push(pane);
        }
        if let Some(card) = card {
            scopes.push(card.clone());
        }
        for scope in &scopes {
            for selector in &self.candidates {
                let criteria = Criteria::css(selector).within(scope);
                for button in surface.find_all(&criteria).await? {
                    if self.qualifies(surface, &button).await? {
                        info!("✓ 在 {} 范围内找到申请按钮: {}", scope, selector);
                        return Ok(Some(button));
                    }
                }
            }
        }

        for button in surface.find_all(&self.scan).await? {
            if self.qualifies(surface, &button).await? {
                info!("✓ 通过文字扫描找到申请按钮");
                return Ok(Some(button));
            }
        }

        info!("✗ 没有找到申请按钮");
        Ok(None)
    }

    async fn qualifies<S: PageSurface + ?Sized>(&self, surface: &S, button: &ElementRef) -> SurfaceResult<bool> {
        let text = text_or_empty(surface, button).await;
        let aria = surface.attr(button, "aria-label").await?.unwrap_or_default();
        let easy = surface.attr(button, "data-is-easy-apply").await?;
        let disabled = surface.is_disabled(button).await?;
        Ok(is_apply_button(&text, &aria, easy.as_deref(), disabled))
    }
}
