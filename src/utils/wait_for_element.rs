//! Input-field polling utility
//!
//! Provides wait_for_input() which polls an ordered list of selectors until
//! one of them resolves to a visible, enabled element. The target page
//! renders its search box via JavaScript after the initial load event, so a
//! single find_element call right after navigation is not reliable.

use std::time::Duration;

use chromiumoxide::Page;
use chromiumoxide::element::Element;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum LocateError {
    #[error("no visible search input matched {selectors:?} within {waited_ms}ms")]
    Timeout {
        selectors: Vec<String>,
        waited_ms: u128,
    },
}

/// Is the first element matching `selector` rendered and interactable?
///
/// Geometry and the disabled flag are only observable page-side, so this
/// goes through a page evaluation rather than element attributes.
async fn is_usable(page: &Page, selector: &str) -> bool {
    let script = format!(
        "(() => {{ \
            const el = document.querySelector({selector:?}); \
            if (!el || el.disabled) return false; \
            const r = el.getBoundingClientRect(); \
            return r.width > 0 && r.height > 0; \
        }})()"
    );
    page.evaluate(script)
        .await
        .ok()
        .and_then(|res| res.value().and_then(|v| v.as_bool()))
        .unwrap_or(false)
}

/// Wait for the search input to appear, trying selectors in priority order
///
/// # Polling Strategy
/// - Starts at 100ms intervals
/// - Doubles each retry (exponential backoff)
/// - Caps at 1 second maximum interval
/// - Total duration limited by timeout parameter
///
/// Each round walks the full selector list so the most specific selector
/// always wins when several match at once.
pub async fn wait_for_input(
    page: &Page,
    selectors: &[String],
    timeout: Duration,
) -> Result<Element, LocateError> {
    let start = std::time::Instant::now();
    let mut poll_interval = Duration::from_millis(100);
    let max_interval = Duration::from_secs(1);

    loop {
        for selector in selectors {
            if is_usable(page, selector).await
                && let Ok(element) = page.find_element(selector.as_str()).await
            {
                debug!("search input matched selector: {}", selector);
                return Ok(element);
            }
        }

        if start.elapsed() >= timeout {
            return Err(LocateError::Timeout {
                selectors: selectors.to_vec(),
                waited_ms: timeout.as_millis(),
            });
        }

        tokio::time::sleep(poll_interval).await;
        poll_interval = (poll_interval * 2).min(max_interval);
    }
}
