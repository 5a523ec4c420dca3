//! Layered suggestion-overlay detection
//!
//! Suggestion overlays are third-party markup that changes across releases,
//! so a single selector is brittle. Detection degrades from specific (known
//! container class names) to generic (a geometric heuristic over list-like
//! elements), short-circuiting on the first layer that matches. False
//! positives are bounded by a size floor and a position band below the
//! search box; a miss is a recoverable outcome, not an error.

use async_trait::async_trait;
use chromiumoxide::Page;
use tracing::{debug, trace};

use crate::DetectorConfig;

/// One poll's answer: is a suggestion overlay visible right now?
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionResult {
    pub found: bool,
    /// Which strategy matched, for diagnostics
    pub strategy: Option<String>,
}

impl DetectionResult {
    pub fn hit(strategy: impl Into<String>) -> Self {
        Self {
            found: true,
            strategy: Some(strategy.into()),
        }
    }

    pub fn miss() -> Self {
        Self {
            found: false,
            strategy: None,
        }
    }
}

/// Seam for the typing driver: anything that can answer "is the overlay
/// visible now". The real implementation queries the page; tests stub it.
#[async_trait]
pub trait SuggestionProbe {
    async fn detect(&self) -> DetectionResult;
}

/// Page-backed detector implementing the layered strategy
pub struct SuggestionDetector<'a> {
    page: &'a Page,
    config: &'a DetectorConfig,
}

impl<'a> SuggestionDetector<'a> {
    pub fn new(page: &'a Page, config: &'a DetectorConfig) -> Self {
        Self { page, config }
    }

    /// Evaluate a page-side boolean probe. Evaluation failures (bad
    /// selector, page mid-navigation) count as a definite no-match for
    /// that layer.
    async fn probe(&self, script: String) -> bool {
        match self.page.evaluate(script).await {
            Ok(res) => res.value().and_then(|v| v.as_bool()).unwrap_or(false),
            Err(e) => {
                trace!("detection probe failed: {e}");
                false
            }
        }
    }

    /// Layer 1: known suggestion-container selectors, in priority order.
    /// A match must be rendered, above the size floor, and positioned
    /// below the search box.
    async fn selector_layer(&self) -> Option<String> {
        for selector in &self.config.selectors {
            let script = format!(
                "(() => {{ \
                    const els = document.querySelectorAll({selector:?}); \
                    for (const el of els) {{ \
                        const s = window.getComputedStyle(el); \
                        if (s.display === 'none' || s.visibility === 'hidden') continue; \
                        const r = el.getBoundingClientRect(); \
                        if (r.height > {min_h} && r.width > {min_w} && r.top > {min_top}) return true; \
                    }} \
                    return false; \
                }})()",
                min_h = self.config.min_height,
                min_w = self.config.min_width,
                min_top = self.config.min_top,
            );
            if self.probe(script).await {
                return Some(selector.clone());
            }
        }
        None
    }

    /// Layer 2: generic geometry heuristic over list-like containers in
    /// the band just under the search box, requiring at least two entries.
    async fn heuristic_layer(&self) -> bool {
        let script = format!(
            "(() => {{ \
                const lists = document.querySelectorAll('ul, ol, div[class*=\"list\"]'); \
                for (const list of lists) {{ \
                    const r = list.getBoundingClientRect(); \
                    if (r.height > {min_h} && r.top > {top} && r.top < {bottom}) {{ \
                        if (list.querySelectorAll('li, a').length >= 2) return true; \
                    }} \
                }} \
                return false; \
            }})()",
            min_h = self.config.heuristic_min_height,
            top = self.config.band_top,
            bottom = self.config.band_bottom,
        );
        self.probe(script).await
    }
}

#[async_trait]
impl SuggestionProbe for SuggestionDetector<'_> {
    async fn detect(&self) -> DetectionResult {
        if let Some(selector) = self.selector_layer().await {
            debug!("suggestion overlay detected via selector: {}", selector);
            return DetectionResult::hit(format!("selector:{selector}"));
        }
        if self.heuristic_layer().await {
            debug!("suggestion overlay detected via geometry heuristic");
            return DetectionResult::hit("heuristic");
        }
        DetectionResult::miss()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_records_strategy() {
        let r = DetectionResult::hit("selector:.sw-SuggestList");
        assert!(r.found);
        assert_eq!(r.strategy.as_deref(), Some("selector:.sw-SuggestList"));
    }

    #[test]
    fn miss_has_no_strategy() {
        let r = DetectionResult::miss();
        assert!(!r.found);
        assert!(r.strategy.is_none());
    }
}
