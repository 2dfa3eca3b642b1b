//! 职位目录（Work Catalog）
//!
//! ## 职责
//!
//! - 扫描列表页，提取职位ID，按元素和ID双重去重
//! - 排除已处理的职位和带“已申请”标识的卡片
//! - 给合格的卡片打上标记，重复扫描时可以直接识别
//! - 记录每个职位的尝试次数（跨越多次启动）

use crate::error::{SurfaceError, SurfaceResult};
use crate::models::WorkItem;
use crate::services::pacing::{Pacer, Stopped};
use crate::surface::{text_or_empty, Criteria, ElementRef, PageSurface, SelectorSet, ITEM_TAG_ATTR};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock, Mutex};
use tracing::{debug, info};

const SITE_ORIGIN: &str = "https://www.linkedin.com";

// 正则只编译一次
static LONG_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{5,})").unwrap());
static VIEW_PATH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/jobs/view/(\d+)").unwrap());
static CURRENT_JOB_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]currentJobId=[^&#]*?(\d{5,})").unwrap());

fn first_capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// 提取第一段不少于 5 位的数字
pub fn normalize_id(raw: &str) -> Option<String> {
    first_capture(&LONG_DIGITS, raw)
}

/// 从职位链接中提取ID：`/jobs/view/<数字>` 或 `currentJobId=` 参数
pub fn id_from_href(href: &str) -> Option<String> {
    first_capture(&VIEW_PATH, href).or_else(|| first_capture(&CURRENT_JOB_ID, href))
}

/// 规范化职位链接：去掉查询参数，补全站点前缀
pub fn canonical_link(href: &str) -> String {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    if path.starts_with('/') {
        format!("{}{}", SITE_ORIGIN, path)
    } else {
        path.to_string()
    }
}

/// 扫描统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryStats {
    pub scanned: usize,
    pub no_id: usize,
    pub already_processed: usize,
    pub disqualified: usize,
}

/// 当前页的职位目录
#[derive(Debug, Default, Clone)]
pub struct WorkCatalog {
    pub items: Vec<WorkItem>,
    pub page_number: u32,
    pub stats: DiscoveryStats,
}

impl WorkCatalog {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&WorkItem> {
        self.items.get(index)
    }
}

/// 卡片排除规则：带“已申请”标识，或底部文字显示已申请
pub struct Disqualifier {
    applied_markers: String,
    footer_wrappers: String,
    phrases: Vec<&'static str>,
}

impl Disqualifier {
    pub fn from_selectors(selectors: &SelectorSet) -> Self {
        Self {
            applied_markers: selectors.applied_markers.clone(),
            footer_wrappers: selectors.footer_wrappers.clone(),
            phrases: vec!["applied on", "application sent"],
        }
    }

    pub async fn is_disqualified<S: PageSurface + ?Sized>(
        &self,
        surface: &S,
        card: &ElementRef,
    ) -> SurfaceResult<bool> {
        let marker = Criteria::css(&self.applied_markers).within(card);
        if surface.find_first(&marker).await?.is_some() {
            return Ok(true);
        }
        let footer = Criteria::css(&self.footer_wrappers).within(card);
        if let Some(footer) = surface.find_first(&footer).await? {
            let text = surface.text_of(&footer).await?.to_lowercase();
            if self.phrases.iter().any(|p| text.contains(p)) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

enum Candidate {
    NoId,
    Duplicate,
    Disqualified(String),
    Eligible(WorkItem),
}

/// 目录扫描器
pub struct Catalog {
    selectors: Arc<SelectorSet>,
    disqualifier: Disqualifier,
}

impl Catalog {
    pub fn new(selectors: Arc<SelectorSet>) -> Self {
        let disqualifier = Disqualifier::from_selectors(&selectors);
        Self {
            selectors,
            disqualifier,
        }
    }

    /// 扫描当前页，返回未处理过的合格职位（页面顺序）
    pub async fn discover<S: PageSurface + ?Sized>(
        &self,
        surface: &S,
        processed: &HashSet<String>,
        page_number: u32,
    ) -> SurfaceResult<WorkCatalog> {
        let mut catalog = WorkCatalog {
            page_number,
            ..Default::default()
        };
        let mut seen_elements = HashSet::new();
        let mut seen_ids = HashSet::new();

        for selector in &self.selectors.item_cards {
            for card in surface.find_all(&Criteria::css(selector)).await? {
                if !seen_elements.insert(card.clone()) {
                    continue;
                }
                catalog.stats.scanned += 1;

                let candidate = match self.inspect(surface, &card, processed, &seen_ids).await {
                    Ok(candidate) => candidate,
                    Err(SurfaceError::StaleElement(_)) => {
                        debug!("卡片 {} 在扫描过程中消失", card);
                        continue;
                    }
                    Err(e) => return Err(e),
                };

                match candidate {
                    Candidate::NoId => catalog.stats.no_id += 1,
                    Candidate::Duplicate => catalog.stats.already_processed += 1,
                    Candidate::Disqualified(id) => {
                        debug!("⏭️ 职位 {} 已带有申请标识，跳过", id);
                        catalog.stats.disqualified += 1;
                    }
                    Candidate::Eligible(item) => {
                        surface
                            .set_attr(&card, ITEM_TAG_ATTR, Some(item.id.as_str()))
                            .await?;
                        seen_ids.insert(item.id.clone());
                        catalog.items.push(item);
                    }
                }
            }
        }

        info!(
            "📄 第 {} 页扫描了 {} 张卡片，找到 {} 个可处理的职位",
            page_number,
            catalog.stats.scanned,
            catalog.len()
        );
        debug!(
            "   过滤: {} (无ID), {} (已处理), {} (已申请标识)",
            catalog.stats.no_id, catalog.stats.already_processed, catalog.stats.disqualified
        );
        for (idx, item) in catalog.items.iter().take(3).enumerate() {
            debug!("   {}. {} @ {} (ID: {})", idx + 1, item.title, item.company, item.id);
        }

        Ok(catalog)
    }

    async fn inspect<S: PageSurface + ?Sized>(
        &self,
        surface: &S,
        card: &ElementRef,
        processed: &HashSet<String>,
        seen_ids: &HashSet<String>,
    ) -> SurfaceResult<Candidate> {
        let Some(id) = self.extract_id(surface, card).await? else {
            return Ok(Candidate::NoId);
        };
        if processed.contains(&id) || seen_ids.contains(&id) {
            return Ok(Candidate::Duplicate);
        }
        if self.disqualifier.is_disqualified(surface, card).await? {
            return Ok(Candidate::Disqualified(id));
        }
        Ok(Candidate::Eligible(self.describe(surface, card, id).await?))
    }

    /// 提取卡片的职位ID
    ///
    /// 顺序：自己的标记 → 数据属性 → 锚点链接 → 按钮属性
    pub async fn extract_id<S: PageSurface + ?Sized>(
        &self,
        surface: &S,
        card: &ElementRef,
    ) -> SurfaceResult<Option<String>> {
        let attributes = std::iter::once(ITEM_TAG_ATTR)
            .chain(self.selectors.id_attributes.iter().map(String::as_str));
        for name in attributes {
            if let Some(id) = surface.attr(card, name).await?.as_deref().and_then(normalize_id) {
                return Ok(Some(id));
            }
        }

        let anchors = Criteria::css(&self.selectors.id_anchors).within(card);
        for anchor in surface.find_all(&anchors).await? {
            if let Some(id) = surface.attr(&anchor, "href").await?.as_deref().and_then(id_from_href) {
                return Ok(Some(id));
            }
        }

        let buttons = Criteria::css(&self.selectors.id_buttons).within(card);
        if let Some(button) = surface.find_first(&buttons).await? {
            if let Some(id) = surface
                .attr(&button, "data-job-id")
                .await?
                .as_deref()
                .and_then(normalize_id)
            {
                return Ok(Some(id));
            }
        }

        Ok(None)
    }

    /// 读取卡片上的职位名称、公司和链接
    async fn describe<S: PageSurface + ?Sized>(
        &self,
        surface: &S,
        card: &ElementRef,
        id: String,
    ) -> SurfaceResult<WorkItem> {
        let mut item = WorkItem::new(id, card.clone());

        for selector in &self.selectors.title {
            if let Some(el) = surface.find_first(&Criteria::css(selector).within(card)).await? {
                let text = text_or_empty(surface, &el).await;
                let line = text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
                if line.chars().count() > 3 {
                    item.title = line.to_string();
                    break;
                }
            }
        }

        for selector in &self.selectors.company {
            if let Some(el) = surface.find_first(&Criteria::css(selector).within(card)).await? {
                let text = text_or_empty(surface, &el).await;
                let text = text.trim();
                if !text.is_empty() {
                    item.company = text.to_string();
                    break;
                }
            }
        }

        let link = Criteria::css(&self.selectors.item_link).within(card);
        if let Some(anchor) = surface.find_first(&link).await? {
            if let Some(href) = surface.attr(&anchor, "href").await? {
                item.link = canonical_link(&href);
            }
        }

        Ok(item)
    }

    /// 滚动列表直到卡片数量稳定（列表是懒加载的）
    pub async fn auto_scroll<S: PageSurface + ?Sized>(
        &self,
        surface: &S,
        pacer: &Pacer,
    ) -> Result<(), Stopped> {
        let container = self.list_container(surface).await;
        let mut last_count = None;
        for _ in 0..8 {
            let cards = match self.all_cards(surface).await {
                Ok(cards) => cards,
                Err(e) => {
                    debug!("自动滚动时读取卡片失败: {}", e);
                    return Ok(());
                }
            };
            if last_count == Some(cards.len()) {
                break;
            }
            last_count = Some(cards.len());
            let Some(last) = cards.last() else {
                break;
            };
            if let Err(e) = surface.scroll_into_view(last).await {
                debug!("滚动失败: {}", e);
                break;
            }
            if let Some(container) = &container {
                if let Err(e) = surface.scroll_to_end(container).await {
                    debug!("滚动列表容器失败: {}", e);
                }
            }
            pacer.between(600, 1100).await?;
        }
        Ok(())
    }

    /// 第一个存在的列表容器
    async fn list_container<S: PageSurface + ?Sized>(&self, surface: &S) -> Option<ElementRef> {
        for selector in &self.selectors.list_containers {
            match surface.find_first(&Criteria::css(selector)).await {
                Ok(Some(container)) => return Some(container),
                Ok(None) => {}
                Err(e) => debug!("查找列表容器失败: {}", e),
            }
        }
        None
    }

    async fn all_cards<S: PageSurface + ?Sized>(&self, surface: &S) -> SurfaceResult<Vec<ElementRef>> {
        let mut seen = HashSet::new();
        let mut cards = Vec::new();
        for selector in &self.selectors.item_cards {
            for card in surface.find_all(&Criteria::css(selector)).await? {
                if seen.insert(card.clone()) {
                    cards.push(card);
                }
            }
        }
        Ok(cards)
    }
}

/// 职位尝试次数账本（跨越多次启动）
#[derive(Clone, Debug, Default)]
pub struct AttemptLedger {
    inner: Arc<Mutex<HashMap<String, u32>>>,
}

impl AttemptLedger {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, u32>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn attempts(&self, id: &str) -> u32 {
        self.lock().get(id).copied().unwrap_or(0)
    }

    /// 记录一次尝试，返回累计次数
    pub fn record(&self, id: &str) -> u32 {
        let mut ledger = self.lock();
        let count = ledger.entry(id.to_string()).or_insert(0);
        *count += 1;
        *count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::fake::FakeSurface;

    fn card(surface: &FakeSurface, id: &str, title: &str) -> ElementRef {
        let card = surface.add(None, &["li.job-card-container"], "");
        let anchor = surface.add(
            Some(&card),
            &["a[href*=\"/jobs/\"]", "a[href*=\"/jobs/view/\"]", ".job-card-list__title"],
            title,
        );
        surface.with(|dom| {
            dom.set_attribute(&anchor, "href", &format!("/jobs/view/{}/?refId=abc", id))
        });
        card
    }

    #[test]
    fn test_normalize_id() {
        assert_eq!(normalize_id("urn:li:jobPosting:4012345678"), Some("4012345678".into()));
        assert_eq!(normalize_id("1234"), None);
        assert_eq!(normalize_id("ab 12 345678"), Some("345678".into()));
    }

    #[test]
    fn test_id_from_href() {
        assert_eq!(id_from_href("/jobs/view/4012345678/?trk=x"), Some("4012345678".into()));
        assert_eq!(
            id_from_href("https://www.linkedin.com/jobs/search/?currentJobId=3999888777&f_AL=true"),
            Some("3999888777".into())
        );
        assert_eq!(id_from_href("/jobs/search/?keywords=rust"), None);
        assert_eq!(
            canonical_link("/jobs/view/4012345678/?trk=x"),
            "https://www.linkedin.com/jobs/view/4012345678/"
        );
    }

    #[test]
    fn test_view_path_wins_over_tracking_digits() {
        assert_eq!(
            id_from_href("/jobs/view/4011122233/?trk=public_jobs_topcard&refId=99999999"),
            Some("4011122233".into())
        );
        assert_eq!(
            id_from_href("https://www.linkedin.com/jobs/view/4011122233/?trk=flagship3&currentJobId=4000000001"),
            Some("4011122233".into())
        );
        assert_eq!(
            id_from_href("/jobs/collections/recommended/?start=25&currentJobId=urn%3A4012345678"),
            Some("4012345678".into())
        );
        assert_eq!(id_from_href("/jobs/search/?start=25&geoId=103644278"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_scroll_scrolls_the_list_container() {
        let surface = FakeSurface::new("https://www.linkedin.com/jobs/search/");
        let list = surface.add(None, &[".jobs-search-results-list"], "");
        let card = surface.add(Some(&list), &["li.job-card-container"], "");

        let signal = crate::services::pacing::RunSignal::new();
        signal.start();
        let catalog = Catalog::new(Arc::new(SelectorSet::default()));
        catalog.auto_scroll(&surface, &Pacer::new(signal)).await.unwrap();

        assert!(surface.with(|dom| dom.is_alive(&card)));
        assert_eq!(surface.with(|dom| dom.scrolled_to_end.clone()), vec![list]);
    }

    #[tokio::test]
    async fn test_discover_dedups_by_element_and_id() {
        let surface = FakeSurface::new("https://www.linkedin.com/jobs/search/");
        let first = card(&surface, "4000000001", "Rust Engineer");
        // same element matched by a second card selector
        surface.with(|dom| dom.set_attribute(&first, "data-job-id", "4000000001"));
        let twin = surface.add(None, &[".artdeco-list__item"], "");
        surface.with(|dom| dom.set_attribute(&twin, "data-occludable-job-id", "4000000001"));
        card(&surface, "4000000002", "Backend Engineer");
        surface.add(None, &["li.job-card-container"], "Promoted content");

        let catalog = Catalog::new(Arc::new(SelectorSet::default()));
        let result = catalog.discover(&surface, &HashSet::new(), 1).await.unwrap();

        let ids: Vec<_> = result.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["4000000001", "4000000002"]);
        assert_eq!(result.items[0].title, "Rust Engineer");
        assert_eq!(result.items[0].link, "https://www.linkedin.com/jobs/view/4000000001/");
        assert_eq!(result.stats.no_id, 1);
        assert_eq!(result.stats.already_processed, 1);
        assert_eq!(
            surface.with(|dom| dom.attribute(&first, ITEM_TAG_ATTR)),
            Some("4000000001".into())
        );
    }

    #[tokio::test]
    async fn test_processed_ids_are_never_reemitted() {
        let surface = FakeSurface::new("https://www.linkedin.com/jobs/search/");
        card(&surface, "4000000001", "Rust Engineer");
        card(&surface, "4000000002", "Backend Engineer");
        let catalog = Catalog::new(Arc::new(SelectorSet::default()));

        let mut processed = HashSet::new();
        for _ in 0..3 {
            let result = catalog.discover(&surface, &processed, 1).await.unwrap();
            assert!(result.items.iter().all(|i| !processed.contains(&i.id)));
            if let Some(first) = result.items.first() {
                processed.insert(first.id.clone());
            }
        }
        assert_eq!(processed.len(), 2);
    }

    #[tokio::test]
    async fn test_applied_cards_are_disqualified() {
        let surface = FakeSurface::new("https://www.linkedin.com/jobs/search/");
        let applied = card(&surface, "4000000003", "Data Engineer");
        surface.add(
            Some(&applied),
            &[".job-card-container__footer-wrapper"],
            "Applied on 3 March",
        );
        let catalog = Catalog::new(Arc::new(SelectorSet::default()));
        let result = catalog.discover(&surface, &HashSet::new(), 1).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(result.stats.disqualified, 1);
    }

    #[test]
    fn test_attempt_ledger_only_grows() {
        let ledger = AttemptLedger::default();
        assert_eq!(ledger.attempts("4000000001"), 0);
        assert_eq!(ledger.record("4000000001"), 1);
        assert_eq!(ledger.clone().record("4000000001"), 2);
        assert_eq!(ledger.attempts("4000000001"), 2);
    }
}
