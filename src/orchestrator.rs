//! Per-keyword state machine and batch loop
//!
//! Each keyword walks Navigating -> LocatingInput -> Typing -> Capturing ->
//! Recorded, dropping into Failed from any step. A keyword's failure is a
//! record, not an abort: the batch always attempts the full sequence in
//! input order. Only a dead browser session terminates the loop early, and
//! even then everything recorded so far is still emitted.

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::Config;
use crate::browser::{BrowserError, SearchSession};
use crate::capture::{ArtifactStore, CapturePolicy};
use crate::detect::SuggestionDetector;
use crate::typing::{PageSearchInput, TypingDriver, TypingOutcome};
use crate::utils::wait_for_input;

/// How one keyword's processing ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeywordOutcome {
    /// Overlay seen; holds the prefix typed when it appeared
    Suggest { typed: String },
    /// Typed in full, no overlay
    NoSuggest,
    /// Forced-settle capture
    View,
    /// Keystroke injection failed partway
    InputError,
    /// Search field never became interactable within the bounded wait
    InputNotFound,
    /// Navigation or capture failed
    Failed(String),
}

impl From<&TypingOutcome> for KeywordOutcome {
    fn from(outcome: &TypingOutcome) -> Self {
        match outcome {
            TypingOutcome::SuggestionConfirmed { typed } => KeywordOutcome::Suggest {
                typed: typed.clone(),
            },
            TypingOutcome::TypedInFull => KeywordOutcome::NoSuggest,
            TypingOutcome::Settled => KeywordOutcome::View,
            TypingOutcome::InputError { .. } => KeywordOutcome::InputError,
        }
    }
}

impl fmt::Display for KeywordOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeywordOutcome::Suggest { typed } => write!(f, "suggestion captured after {typed:?}"),
            KeywordOutcome::NoSuggest => write!(f, "no suggestion, captured anyway"),
            KeywordOutcome::View => write!(f, "captured after settle"),
            KeywordOutcome::InputError => write!(f, "input error"),
            KeywordOutcome::InputNotFound => write!(f, "search input not found"),
            KeywordOutcome::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRecord {
    pub keyword: String,
    pub outcome: KeywordOutcome,
    pub artifact_path: Option<PathBuf>,
}

/// Ordered outcomes for the whole batch, one record per attempted keyword
#[derive(Debug, Default)]
pub struct BatchReport {
    pub records: Vec<KeywordRecord>,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn captured(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.artifact_path.is_some())
            .count()
    }

    /// Human-readable run summary, one line per keyword plus totals
    pub fn render_summary(&self) -> String {
        let mut out = String::from("batch summary\n");
        for record in &self.records {
            let marker = match record.outcome {
                KeywordOutcome::Suggest { .. } => "ok  ",
                KeywordOutcome::NoSuggest | KeywordOutcome::View => "warn",
                _ => "fail",
            };
            out.push_str(&format!(
                "  [{marker}] {}: {}\n",
                record.keyword, record.outcome
            ));
        }
        out.push_str(&format!(
            "{} keywords processed, {} screenshots written\n",
            self.len(),
            self.captured()
        ));
        out
    }
}

/// Seam between the batch loop and one keyword's processing, so the loop's
/// ordering and isolation guarantees are testable without a browser.
/// `Err` is reserved for session-fatal conditions.
#[async_trait]
pub trait KeywordRunner {
    async fn run_keyword(&mut self, keyword: &str) -> Result<KeywordRecord, BrowserError>;
}

/// Run the whole batch strictly in order, one keyword at a time.
///
/// Per-keyword failures are already folded into records by the runner;
/// a session-fatal error records the current keyword as failed and stops,
/// preserving everything recorded so far.
pub async fn run_batch(
    runner: &mut impl KeywordRunner,
    keywords: &[String],
    pause_between: std::time::Duration,
) -> BatchReport {
    let mut report = BatchReport::default();

    for (i, keyword) in keywords.iter().enumerate() {
        info!("keyword {}/{}: {}", i + 1, keywords.len(), keyword);

        match runner.run_keyword(keyword).await {
            Ok(record) => {
                info!("{}: {}", keyword, record.outcome);
                report.records.push(record);
            }
            Err(e) => {
                warn!("session lost while processing {:?}: {}", keyword, e);
                report.records.push(KeywordRecord {
                    keyword: keyword.clone(),
                    outcome: KeywordOutcome::Failed(format!("session lost: {e}")),
                    artifact_path: None,
                });
                break;
            }
        }

        if i + 1 < keywords.len() {
            sleep(pause_between).await;
        }
    }

    report
}

/// Browser-backed runner wiring the typing driver, detector, capture
/// policy, and artifact store together per keyword
pub struct BatchOrchestrator<'a> {
    config: &'a Config,
    session: &'a SearchSession,
    store: ArtifactStore,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(config: &'a Config, session: &'a SearchSession, store: ArtifactStore) -> Self {
        Self {
            config,
            session,
            store,
        }
    }

    /// Process the full keyword batch
    pub async fn run(&mut self, keywords: &[String]) -> BatchReport {
        let pause = self.config.batch.pause_between_keywords();
        run_batch(self, keywords, pause).await
    }

    fn record(
        &self,
        keyword: &str,
        outcome: KeywordOutcome,
        artifact_path: Option<PathBuf>,
    ) -> KeywordRecord {
        KeywordRecord {
            keyword: keyword.to_string(),
            outcome,
            artifact_path,
        }
    }
}

#[async_trait]
impl KeywordRunner for BatchOrchestrator<'_> {
    async fn run_keyword(&mut self, keyword: &str) -> Result<KeywordRecord, BrowserError> {
        // A dead browser is the one thing a keyword cannot recover from;
        // check before investing the typing time.
        self.session.health_check().await?;

        // Navigating: always a fresh load, no page state reuse
        if let Err(e) = self.session.navigate_fresh(&self.config.target_url).await {
            warn!("navigation failed for {:?}: {}", keyword, e);
            return Ok(self.record(
                keyword,
                KeywordOutcome::Failed(format!("navigation: {e}")),
                None,
            ));
        }
        sleep(self.config.batch.navigation_settle()).await;

        // LocatingInput: bounded wait over the selector list
        let page = self.session.page();
        let element = match wait_for_input(
            page,
            &self.config.batch.input_selectors,
            self.config.batch.input_wait(),
        )
        .await
        {
            Ok(element) => element,
            Err(e) => {
                warn!("{}", e);
                return Ok(self.record(keyword, KeywordOutcome::InputNotFound, None));
            }
        };

        // Typing: driver folds its own failures into the outcome
        let detector = SuggestionDetector::new(page, &self.config.detector);
        let mut input = PageSearchInput::new(element);
        let typing_outcome = TypingDriver::new(&self.config.typing)
            .run(&mut input, &detector, keyword)
            .await;

        // Capturing: one artifact per keyword that makes it this far,
        // input errors included
        let policy = CapturePolicy::new(&self.config.capture);
        match policy.capture(page, keyword, &typing_outcome).await {
            Ok(artifact) => match self.store.write(&artifact) {
                Ok(path) => Ok(self.record(
                    keyword,
                    KeywordOutcome::from(&typing_outcome),
                    Some(path),
                )),
                Err(e) => Ok(self.record(
                    keyword,
                    KeywordOutcome::Failed(format!("artifact write: {e}")),
                    None,
                )),
            },
            Err(e) => Ok(self.record(
                keyword,
                KeywordOutcome::Failed(format!("capture: {e}")),
                None,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Runner whose behavior is scripted per keyword
    struct ScriptedRunner {
        fail_input_on: Vec<usize>,
        fatal_on: Option<usize>,
        calls: usize,
    }

    impl ScriptedRunner {
        fn new() -> Self {
            Self {
                fail_input_on: Vec::new(),
                fatal_on: None,
                calls: 0,
            }
        }
    }

    #[async_trait]
    impl KeywordRunner for ScriptedRunner {
        async fn run_keyword(&mut self, keyword: &str) -> Result<KeywordRecord, BrowserError> {
            let call = self.calls;
            self.calls += 1;

            if self.fatal_on == Some(call) {
                return Err(BrowserError::SessionLost("gone".into()));
            }
            let outcome = if self.fail_input_on.contains(&call) {
                KeywordOutcome::InputNotFound
            } else {
                KeywordOutcome::Suggest {
                    typed: keyword.to_string(),
                }
            };
            let artifact_path = match &outcome {
                KeywordOutcome::Suggest { .. } => Some(PathBuf::from(format!("{keyword}.png"))),
                _ => None,
            };
            Ok(KeywordRecord {
                keyword: keyword.to_string(),
                outcome,
                artifact_path,
            })
        }
    }

    fn keywords(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("kw{i}")).collect()
    }

    #[tokio::test]
    async fn one_record_per_keyword_in_input_order() {
        let mut runner = ScriptedRunner::new();
        runner.fail_input_on = vec![1, 3];
        let kws = keywords(5);

        let report = run_batch(&mut runner, &kws, Duration::ZERO).await;

        assert_eq!(report.len(), 5);
        let order: Vec<_> = report.records.iter().map(|r| r.keyword.clone()).collect();
        assert_eq!(order, kws);
        assert_eq!(report.records[1].outcome, KeywordOutcome::InputNotFound);
        assert!(report.records[1].artifact_path.is_none());
        assert_eq!(report.captured(), 3);
    }

    #[tokio::test]
    async fn failed_keyword_does_not_stop_the_batch() {
        let mut runner = ScriptedRunner::new();
        runner.fail_input_on = vec![0];
        let kws = keywords(2);

        let report = run_batch(&mut runner, &kws, Duration::ZERO).await;

        assert_eq!(report.len(), 2);
        assert!(matches!(
            report.records[1].outcome,
            KeywordOutcome::Suggest { .. }
        ));
    }

    #[tokio::test]
    async fn session_fatal_stops_but_keeps_prior_records() {
        let mut runner = ScriptedRunner::new();
        runner.fatal_on = Some(2);
        let kws = keywords(4);

        let report = run_batch(&mut runner, &kws, Duration::ZERO).await;

        // two successes, one fatal record, nothing after
        assert_eq!(report.len(), 3);
        assert!(matches!(
            report.records[2].outcome,
            KeywordOutcome::Failed(_)
        ));
    }

    #[test]
    fn summary_counts_artifacts_not_attempts() {
        let report = BatchReport {
            records: vec![
                KeywordRecord {
                    keyword: "a".into(),
                    outcome: KeywordOutcome::Suggest { typed: "a".into() },
                    artifact_path: Some("a.png".into()),
                },
                KeywordRecord {
                    keyword: "b".into(),
                    outcome: KeywordOutcome::InputNotFound,
                    artifact_path: None,
                },
            ],
        };
        let summary = report.render_summary();
        assert!(summary.contains("2 keywords processed, 1 screenshots written"));
        assert!(summary.contains("[fail] b: search input not found"));
    }
}
