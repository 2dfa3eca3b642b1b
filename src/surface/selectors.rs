//! 默认选择器表
//!
//! 所有条目都可以通过 TOML 覆盖（缺省的条目使用内置值），页面改版时不需要改代码。

use crate::surface::Criteria;
use serde::{Deserialize, Serialize};

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SelectorSet {
    // ---------- 列表页 ----------
    /// 职位卡片（按顺序逐个扫描）
    pub item_cards: Vec<String>,
    /// 卡片内用来打开详情的点击目标
    pub card_click_targets: Vec<String>,
    /// 可滚动的列表容器
    pub list_containers: Vec<String>,
    /// 下一页按钮
    pub next_page: String,
    /// 卡片上直接携带职位ID的属性
    pub id_attributes: Vec<String>,
    /// 卡片内带职位链接的锚点
    pub id_anchors: String,
    /// 卡片内带职位ID的按钮
    pub id_buttons: String,
    pub title: Vec<String>,
    pub company: Vec<String>,
    /// 卡片内的职位详情链接
    pub item_link: String,
    /// 卡片上的“已申请”标识
    pub applied_markers: String,
    /// 卡片底部（用于判断“applied on”之类的文字）
    pub footer_wrappers: String,
    /// 卡片底部条目（“已申请”探测）
    pub card_footers: Vec<String>,

    // ---------- 详情页 ----------
    pub detail_pane: String,
    /// 详情页中的职位链接
    pub detail_links: String,
    /// 详情页中带 urn 的节点
    pub urn_nodes: String,
    /// 打开卡片后出现任意一个即认为详情已加载
    pub detail_ready: String,

    // ---------- 申请入口 ----------
    pub apply_primary: String,
    pub apply_candidates: Vec<String>,
    /// 兜底的全局按钮扫描
    pub apply_scan: String,

    // ---------- 表单 ----------
    pub step_surface: String,
    pub step_buttons: String,
    /// 点击申请后出现任意一个即认为表单已打开
    pub modal_open_probe: String,
    pub dismiss: String,
    pub error_markers: String,

    // ---------- 通知 / 结果 ----------
    pub error_toast: String,
    pub toast_message: String,
    pub success_toasts: Vec<String>,
    pub see_application: String,
    pub apply_result: String,
    pub confirmation_dialog: String,
    pub applied_button: String,
}

impl Default for SelectorSet {
    fn default() -> Self {
        Self {
            item_cards: owned(&[
                ".jobs-search-results__list li",
                ".jobs-search__results-list li",
                ".jobs-search-results li",
                ".jobs-search-two-pane__results-list li",
                ".jobs-search-seven-up__list li",
                ".jobs-home-jobs-module__list li",
                ".jobs-search-vertical__results-list li",
                ".scaffold-layout__list-container li",
                ".jobs-search-results-list__list-item",
                "li.jobs-search-results__list-item",
                "li.reusable-search__result-container",
                "li.job-card-container",
                "li.job-card-list__item",
                "li.jobs-search-two-pane__job-card-container",
                ".jobs-collection__list-item",
                ".jobs-collections__list-item",
                "li.scaffold-layout__list-item",
                ".job-card-container--clickable",
                ".reusable-search-simple-insight__container",
                "div.job-card-container",
                ".artdeco-list__item",
            ]),
            card_click_targets: owned(&[
                "a.job-card-list__title",
                ".job-card-container__link",
                "a[href*=\"/jobs/view/\"]",
                ".job-card-list__title a",
                ".result-card__full-card-link",
                "a[data-control-name=\"search_srp_result\"]",
            ]),
            list_containers: owned(&[
                ".jobs-search-results-list",
                ".jobs-search__results-list",
                ".jobs-search-results",
                ".jobs-search-two-pane__results-list",
                ".jobs-search-seven-up__list",
                ".jobs-home-jobs-module__list",
                ".jobs-search-vertical__results-list",
            ]),
            next_page: "button[aria-label=\"Next\"], button.artdeco-pagination__button--next"
                .to_string(),
            id_attributes: owned(&[
                "data-job-id",
                "data-occludable-job-id",
                "data-job-card-id",
                "data-id",
                "data-entity-urn",
            ]),
            id_anchors: "a[href*=\"/jobs/\"]".to_string(),
            id_buttons: "button[data-job-id]".to_string(),
            title: owned(&[
                ".job-card-list__title",
                ".job-card-container__link",
                ".artdeco-entity-lockup__title",
                ".job-card-container__metadata-item",
            ]),
            company: owned(&[
                ".job-card-container__primary-description",
                ".artdeco-entity-lockup__subtitle",
                ".job-card-container__company-name",
                "[data-anonymize=\"company-name\"]",
            ]),
            item_link: "a[href*=\"/jobs/view/\"]".to_string(),
            applied_markers: ".job-card-container__footer-item--highlighted, .job-card-container__applied-date, [data-test-job-card-footer-applied]".to_string(),
            footer_wrappers: ".job-card-container__footer-wrapper, .job-card-list__footer-wrapper"
                .to_string(),
            card_footers: owned(&[
                ".job-card-container__footer-item",
                ".job-card-list__footer",
                ".job-card-container__footer-wrapper",
                ".artdeco-entity-lockup__caption",
                ".job-card-container__metadata-item",
            ]),
            detail_pane: ".jobs-unified-top-card, .jobs-details__main-content, .jobs-search__job-details, .jobs-details".to_string(),
            detail_links: "a[href*=\"/jobs/view/\"]".to_string(),
            urn_nodes: "[data-entity-urn]".to_string(),
            detail_ready: "button.jobs-apply-button, button[data-test-apply-button], .jobs-easy-apply-modal, [role=\"dialog\"], .jobs-details__main-content, .jobs-search__job-details".to_string(),
            apply_primary: "#jobs-apply-button".to_string(),
            apply_candidates: owned(&[
                "button[aria-label*=\"Easy Apply\"]",
                "button[data-control-name*=\"jobdetails_topcard_inapply\"]",
                "button.jobs-apply-button",
                "button[data-test-global-apply-button]",
                ".jobs-apply-button--top-card button",
                "button.jobs-apply-button--top-card",
                "button[data-test-apply-button]",
                ".jobs-unified-top-card__content--two-pane button.jobs-apply-button",
                ".jobs-details__main-content button",
                "button.artdeco-button--primary",
                "a[role=\"button\"]",
            ]),
            apply_scan: "button, a[role=\"button\"]".to_string(),
            step_surface: ".jobs-easy-apply-modal, [role=\"dialog\"]".to_string(),
            step_buttons: "button".to_string(),
            modal_open_probe: ".jobs-easy-apply-modal, [role=\"dialog\"], .jobs-details__main-content, button.jobs-apply-button, button[data-test-apply-button]".to_string(),
            dismiss: ".artdeco-modal__dismiss, button[aria-label*=\"Dismiss\"]".to_string(),
            error_markers: "[aria-invalid=\"true\"], .artdeco-inline-feedback--error, .artdeco-inline-feedback__message".to_string(),
            error_toast: ".artdeco-toast-item--error".to_string(),
            toast_message: ".artdeco-toast-item__message".to_string(),
            success_toasts: owned(&[
                ".artdeco-toast-item--success",
                ".artdeco-toast-item__message",
                ".artdeco-toast-item",
            ]),
            see_application: "#jobs-apply-see-application-link".to_string(),
            apply_result: ".jobs-unified-top-card__apply-result, .jobs-unified-top-card__subtitle-secondary-grouping".to_string(),
            confirmation_dialog: "[role=\"dialog\"] [data-test-modal-id=\"application-sent-confirmation\"], [aria-label*=\"Application sent\"]".to_string(),
            applied_button: "button[aria-label*=\"Applied\"], .jobs-apply-button--applied"
                .to_string(),
        }
    }
}

impl SelectorSet {
    pub fn step_surface(&self) -> Criteria {
        Criteria::css(&self.step_surface)
    }

    pub fn detail_pane(&self) -> Criteria {
        Criteria::css(&self.detail_pane)
    }

    pub fn dismiss(&self) -> Criteria {
        Criteria::css(&self.dismiss)
    }
}
