//! Keystroke injection with interleaved suggestion detection
//!
//! Two strategies, selected by `TypingMode`:
//!
//! - **incremental detect**: type one character at a time and poll the
//!   detector after each character past a minimum prefix, stopping the
//!   instant the overlay shows up.
//! - **forced settle**: type the whole keyword blind, then nudge the page
//!   with a small keyboard gesture and wait, leaving classification to the
//!   capture step.
//!
//! The driver is generic over `SearchInput` and `SuggestionProbe` so the
//! state machine is unit-testable without a browser.

use async_trait::async_trait;
use chromiumoxide::element::Element;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::TypingConfig;
use crate::TypingMode;
use crate::detect::SuggestionProbe;

/// Filler character for the forced-settle nudge gesture
const FILLER_CHAR: char = 'a';

#[derive(Error, Debug)]
#[error("input interaction failed: {0}")]
pub struct TypingError(pub String);

/// What one keyword's typing pass concluded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypingOutcome {
    /// Overlay seen; `typed` is the prefix entered up to that moment
    SuggestionConfirmed { typed: String },
    /// Full keyword typed, trailing check negative
    TypedInFull,
    /// Forced-settle mode: no classification attempted
    Settled,
    /// Focusing, clearing, or sending keys failed partway through
    InputError { typed: String },
}

/// Seam over the search field: focus, clear, and key injection.
/// Implemented by `PageSearchInput` for a live element; stubbed in tests.
#[async_trait]
pub trait SearchInput {
    async fn focus(&mut self) -> Result<(), TypingError>;
    async fn clear(&mut self) -> Result<(), TypingError>;
    async fn push_char(&mut self, c: char) -> Result<(), TypingError>;
    async fn press_key(&mut self, key: &str) -> Result<(), TypingError>;
}

/// Live search field backed by a chromiumoxide element
pub struct PageSearchInput {
    element: Element,
}

impl PageSearchInput {
    pub fn new(element: Element) -> Self {
        Self { element }
    }

    fn map_err(e: impl std::fmt::Display) -> TypingError {
        TypingError(e.to_string())
    }
}

#[async_trait]
impl SearchInput for PageSearchInput {
    async fn focus(&mut self) -> Result<(), TypingError> {
        self.element
            .scroll_into_view()
            .await
            .map_err(Self::map_err)?;
        self.element.click().await.map_err(Self::map_err)?;
        Ok(())
    }

    /// Robust clear. The page's JS framework ignores single-strategy
    /// clears, so this layers a scripted value reset (with synthetic
    /// input/change events) and a select-all-and-delete pass.
    async fn clear(&mut self) -> Result<(), TypingError> {
        self.element
            .call_js_fn(
                "function() { \
                    this.value = ''; \
                    this.dispatchEvent(new Event('input', { bubbles: true })); \
                    this.dispatchEvent(new Event('change', { bubbles: true })); \
                }",
                false,
            )
            .await
            .map_err(Self::map_err)?;

        // Last resort for frameworks that resurrect the old value
        self.element
            .call_js_fn("function() { this.select(); }", false)
            .await
            .map_err(Self::map_err)?;
        self.element.press_key("Delete").await.map_err(Self::map_err)?;
        Ok(())
    }

    async fn push_char(&mut self, c: char) -> Result<(), TypingError> {
        self.element
            .type_str(&c.to_string())
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn press_key(&mut self, key: &str) -> Result<(), TypingError> {
        self.element.press_key(key).await.map_err(Self::map_err)?;
        Ok(())
    }
}

pub struct TypingDriver<'a> {
    config: &'a TypingConfig,
}

impl<'a> TypingDriver<'a> {
    pub fn new(config: &'a TypingConfig) -> Self {
        Self { config }
    }

    /// Type `keyword` into `input` under the configured mode.
    ///
    /// Never errors: interaction failures are folded into
    /// `TypingOutcome::InputError` so a single keyword cannot abort the
    /// batch.
    pub async fn run(
        &self,
        input: &mut impl SearchInput,
        probe: &impl SuggestionProbe,
        keyword: &str,
    ) -> TypingOutcome {
        let mut typed = String::new();
        let result = match self.config.mode {
            TypingMode::IncrementalDetect => {
                self.incremental(input, probe, keyword, &mut typed).await
            }
            TypingMode::ForcedSettle => self.forced_settle(input, keyword, &mut typed).await,
        };

        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("input error after typing {:?}: {}", typed, e);
                TypingOutcome::InputError { typed }
            }
        }
    }

    async fn incremental(
        &self,
        input: &mut impl SearchInput,
        probe: &impl SuggestionProbe,
        keyword: &str,
        typed: &mut String,
    ) -> Result<TypingOutcome, TypingError> {
        input.focus().await?;
        input.clear().await?;

        for (i, c) in keyword.chars().enumerate() {
            input.push_char(c).await?;
            typed.push(c);
            sleep(self.config.char_interval()).await;

            if i >= self.config.min_chars_before_check {
                let detection = probe.detect().await;
                if detection.found {
                    info!(
                        "suggestion overlay at {} of {} chars ({:?})",
                        i + 1,
                        keyword.chars().count(),
                        detection.strategy,
                    );
                    return Ok(TypingOutcome::SuggestionConfirmed {
                        typed: typed.clone(),
                    });
                }
            }
        }

        // One settle pause and one final check before giving up
        sleep(self.config.pause_after_type()).await;
        let detection = probe.detect().await;
        if detection.found {
            info!("suggestion overlay after full keyword ({:?})", detection.strategy);
            return Ok(TypingOutcome::SuggestionConfirmed {
                typed: typed.clone(),
            });
        }

        debug!("no suggestion overlay for {:?}", keyword);
        Ok(TypingOutcome::TypedInFull)
    }

    /// Type everything, then nudge the overlay open: append a filler
    /// character, delete it, and send ArrowDown. Capture happens after the
    /// settle delay regardless of what the page did.
    async fn forced_settle(
        &self,
        input: &mut impl SearchInput,
        keyword: &str,
        typed: &mut String,
    ) -> Result<TypingOutcome, TypingError> {
        input.focus().await?;
        input.clear().await?;

        for c in keyword.chars() {
            input.push_char(c).await?;
            typed.push(c);
            sleep(self.config.char_interval()).await;
        }

        input.push_char(FILLER_CHAR).await?;
        input.press_key("Backspace").await?;
        input.press_key("ArrowDown").await?;

        sleep(self.config.pause_after_type()).await;
        Ok(TypingOutcome::Settled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::DetectionResult;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Op {
        Focus,
        Clear,
        Char(char),
        Key(String),
    }

    #[derive(Default)]
    struct StubInput {
        ops: Vec<Op>,
        fail_on_char: Option<usize>,
        chars_sent: usize,
    }

    impl StubInput {
        fn typed(&self) -> String {
            self.ops
                .iter()
                .filter_map(|op| match op {
                    Op::Char(c) => Some(*c),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl SearchInput for StubInput {
        async fn focus(&mut self) -> Result<(), TypingError> {
            self.ops.push(Op::Focus);
            Ok(())
        }
        async fn clear(&mut self) -> Result<(), TypingError> {
            self.ops.push(Op::Clear);
            Ok(())
        }
        async fn push_char(&mut self, c: char) -> Result<(), TypingError> {
            if self.fail_on_char == Some(self.chars_sent) {
                return Err(TypingError("synthetic key failure".into()));
            }
            self.chars_sent += 1;
            self.ops.push(Op::Char(c));
            Ok(())
        }
        async fn press_key(&mut self, key: &str) -> Result<(), TypingError> {
            self.ops.push(Op::Key(key.to_string()));
            Ok(())
        }
    }

    /// Probe that reports found on the n-th call (1-based), never before
    struct StubProbe {
        found_on_call: Option<usize>,
        calls: AtomicUsize,
    }

    impl StubProbe {
        fn found_on(call: usize) -> Self {
            Self {
                found_on_call: Some(call),
                calls: AtomicUsize::new(0),
            }
        }
        fn never() -> Self {
            Self {
                found_on_call: None,
                calls: AtomicUsize::new(0),
            }
        }
        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SuggestionProbe for StubProbe {
        async fn detect(&self) -> DetectionResult {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.found_on_call == Some(n) {
                DetectionResult::hit("stub")
            } else {
                DetectionResult::miss()
            }
        }
    }

    fn fast_config(mode: TypingMode, min_chars: usize) -> TypingConfig {
        TypingConfig {
            mode,
            char_interval_ms: 0,
            min_chars_before_check: min_chars,
            pause_after_type_ms: 0,
        }
    }

    #[tokio::test]
    async fn stops_typing_the_moment_detection_fires() {
        let config = fast_config(TypingMode::IncrementalDetect, 0);
        let mut input = StubInput::default();
        // probed after every char; found on the 3rd probe = after 't','e','s'
        let probe = StubProbe::found_on(3);

        let outcome = TypingDriver::new(&config)
            .run(&mut input, &probe, "test")
            .await;

        assert_eq!(
            outcome,
            TypingOutcome::SuggestionConfirmed {
                typed: "tes".to_string()
            }
        );
        assert_eq!(input.typed(), "tes");
        assert_eq!(probe.call_count(), 3);
    }

    #[tokio::test]
    async fn full_keyword_and_one_trailing_check_when_never_found() {
        let config = fast_config(TypingMode::IncrementalDetect, 0);
        let mut input = StubInput::default();
        let probe = StubProbe::never();

        let outcome = TypingDriver::new(&config)
            .run(&mut input, &probe, "test")
            .await;

        assert_eq!(outcome, TypingOutcome::TypedInFull);
        assert_eq!(input.typed(), "test");
        // one probe per char plus exactly one trailing check
        assert_eq!(probe.call_count(), 5);
    }

    #[tokio::test]
    async fn short_prefixes_are_not_probed() {
        let config = fast_config(TypingMode::IncrementalDetect, 5);
        let mut input = StubInput::default();
        let probe = StubProbe::never();

        TypingDriver::new(&config)
            .run(&mut input, &probe, "suggest")
            .await;

        // 7 chars, checks start at index 5: probes at 6th, 7th, trailing
        assert_eq!(probe.call_count(), 3);
    }

    #[tokio::test]
    async fn clear_happens_before_any_keystroke() {
        let config = fast_config(TypingMode::IncrementalDetect, 0);
        let mut input = StubInput::default();
        let probe = StubProbe::found_on(1);

        TypingDriver::new(&config).run(&mut input, &probe, "x").await;

        assert_eq!(input.ops[0], Op::Focus);
        assert_eq!(input.ops[1], Op::Clear);
        assert!(matches!(input.ops[2], Op::Char('x')));
    }

    #[tokio::test]
    async fn key_failure_becomes_input_error_with_prefix() {
        let config = fast_config(TypingMode::IncrementalDetect, 10);
        let mut input = StubInput {
            fail_on_char: Some(2),
            ..StubInput::default()
        };
        let probe = StubProbe::never();

        let outcome = TypingDriver::new(&config)
            .run(&mut input, &probe, "test")
            .await;

        assert_eq!(
            outcome,
            TypingOutcome::InputError {
                typed: "te".to_string()
            }
        );
    }

    #[tokio::test]
    async fn forced_settle_types_everything_then_nudges() {
        let config = fast_config(TypingMode::ForcedSettle, 0);
        let mut input = StubInput::default();
        let probe = StubProbe::never();

        let outcome = TypingDriver::new(&config)
            .run(&mut input, &probe, "ab")
            .await;

        assert_eq!(outcome, TypingOutcome::Settled);
        assert_eq!(probe.call_count(), 0);
        let tail: Vec<_> = input.ops[input.ops.len() - 3..].to_vec();
        assert_eq!(
            tail,
            vec![
                Op::Char(FILLER_CHAR),
                Op::Key("Backspace".to_string()),
                Op::Key("ArrowDown".to_string()),
            ]
        );
        assert_eq!(input.typed(), format!("ab{FILLER_CHAR}"));
    }

    #[tokio::test]
    async fn run_is_strictly_sequential() {
        let order: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());
        struct SeqProbe<'a>(&'a Mutex<Vec<&'static str>>);

        #[async_trait]
        impl SuggestionProbe for SeqProbe<'_> {
            async fn detect(&self) -> DetectionResult {
                self.0.lock().unwrap().push("probe");
                DetectionResult::miss()
            }
        }

        let config = fast_config(TypingMode::IncrementalDetect, 0);
        let mut input = StubInput::default();
        let probe = SeqProbe(&order);
        TypingDriver::new(&config).run(&mut input, &probe, "ab").await;

        // two per-char probes plus the trailing one, no interleaving
        assert_eq!(order.lock().unwrap().len(), 3);
    }
}
