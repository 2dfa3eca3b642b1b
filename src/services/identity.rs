//! 详情页身份确认
//!
//! 打开卡片后，确认详情区显示的确实是目标职位。连续三次轮询看到其他职位时放弃
//! （中间出现无法判断的读数会重新计数），超时也按加载失败处理，不会假定成功。

use crate::error::ItemError;
use crate::services::catalog::id_from_href;
use crate::services::pacing::Pacer;
use crate::surface::{Criteria, PageSurface, SelectorSet};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// 连续多少次看到错误的职位后放弃
pub const MAX_MISMATCHES: u32 = 3;

pub struct IdentityCheck {
    detail_pane: Criteria,
    urn_nodes: String,
    detail_links: String,
}

enum Observation {
    Match,
    Mismatch(String),
    Unknown,
}

/// 连续错配计数
#[derive(Debug, Default)]
struct MismatchStreak(u32);

impl MismatchStreak {
    fn push(&mut self, observation: &Observation) -> u32 {
        match observation {
            Observation::Mismatch(_) => self.0 += 1,
            _ => self.0 = 0,
        }
        self.0
    }
}

impl IdentityCheck {
    pub fn new(selectors: &SelectorSet) -> Self {
        Self {
            detail_pane: selectors.detail_pane(),
            urn_nodes: selectors.urn_nodes.clone(),
            detail_links: selectors.detail_links.clone(),
        }
    }

    pub async fn confirm<S: PageSurface + ?Sized>(
        &self,
        surface: &S,
        expected: &str,
        timeout: Duration,
        pacer: &Pacer,
    ) -> Result<(), ItemError> {
        let started = Instant::now();
        let mut streak = MismatchStreak::default();

        while started.elapsed() < timeout {
            let observation = self.observe(surface, expected).await?;
            let mismatches = streak.push(&observation);
            match observation {
                Observation::Match => {
                    info!("[职位 {}] ✅ 详情页已确认", expected);
                    return Ok(());
                }
                Observation::Mismatch(found) => {
                    warn!(
                        "[职位 {}] ⚠️ 详情页显示的是 {} (第 {} 次)",
                        expected, found, mismatches
                    );
                    if mismatches >= MAX_MISMATCHES {
                        return Err(ItemError::IdentityMismatch {
                            expected: expected.to_string(),
                            found,
                        });
                    }
                }
                Observation::Unknown => {}
            }
            pacer.between(400, 600).await?;
        }

        Err(ItemError::LoadTimeout {
            expected: expected.to_string(),
            waited_ms: timeout.as_millis() as u64,
        })
    }

    async fn observe<S: PageSurface + ?Sized>(
        &self,
        surface: &S,
        expected: &str,
    ) -> Result<Observation, ItemError> {
        let Some(pane) = surface.find_first(&self.detail_pane).await? else {
            return Ok(Observation::Unknown);
        };
        let mut wrong = None;

        let urns = Criteria::css(&self.urn_nodes).within(&pane);
        for node in surface.find_all(&urns).await? {
            if let Some(urn) = surface.attr(&node, "data-entity-urn").await? {
                if urn.contains(expected) {
                    return Ok(Observation::Match);
                }
            }
        }

        let links = Criteria::css(&self.detail_links).within(&pane);
        for link in surface.find_all(&links).await? {
            let Some(id) = surface.attr(&link, "href").await?.as_deref().and_then(id_from_href) else {
                continue;
            };
            if id == expected {
                return Ok(Observation::Match);
            }
            wrong.get_or_insert(id);
        }

        if let Some(id) = id_from_href(&surface.current_url().await?) {
            if id == expected {
                return Ok(Observation::Match);
            }
            wrong.get_or_insert(id);
        }

        let marked = Criteria::css(format!("[id*=\"{0}\"], [class*=\"{0}\"]", expected)).within(&pane);
        if surface.find_first(&marked).await?.is_some() {
            return Ok(Observation::Match);
        }

        Ok(wrong.map(Observation::Mismatch).unwrap_or(Observation::Unknown))
    }
}
