//! Screenshot capture and artifact naming
//!
//! Every keyword that reaches this step gets exactly one artifact, whether
//! or not a suggestion was seen: a missing-suggestion screenshot is itself
//! a recorded result. Filenames are derived deterministically from capture
//! date, sanitized keyword, outcome tag, and (optionally) time of day.

use anyhow::{Context, Result};
use chromiumoxide::Page;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide_cdp::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tokio::time::sleep;
use tracing::info;

use crate::CaptureConfig;
use crate::typing::TypingOutcome;

/// Filename tag recording how the typing pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeTag {
    /// Overlay confirmed visible at capture time
    Suggest,
    /// Full keyword typed, no overlay seen (also used for input errors:
    /// the screenshot documents whatever state the page was left in)
    NoSuggest,
    /// Forced-settle capture, no classification attempted
    View,
}

impl OutcomeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeTag::Suggest => "suggest",
            OutcomeTag::NoSuggest => "no_suggest",
            OutcomeTag::View => "view",
        }
    }
}

impl From<&TypingOutcome> for OutcomeTag {
    fn from(outcome: &TypingOutcome) -> Self {
        match outcome {
            TypingOutcome::SuggestionConfirmed { .. } => OutcomeTag::Suggest,
            TypingOutcome::TypedInFull | TypingOutcome::InputError { .. } => OutcomeTag::NoSuggest,
            TypingOutcome::Settled => OutcomeTag::View,
        }
    }
}

/// One keyword's screenshot plus its derived filename
pub struct CaptureArtifact {
    pub bytes: Vec<u8>,
    pub filename: String,
}

/// Keep characters that are safe in filenames on every platform we write
/// to: ASCII alphanumerics, hiragana, katakana, and CJK ideographs.
/// Everything else (path separators, punctuation, spaces) is stripped.
fn sanitize_keyword(keyword: &str) -> String {
    let cleaned: String = keyword
        .chars()
        .filter(|c| {
            c.is_ascii_alphanumeric()
                || ('\u{3040}'..='\u{30FF}').contains(c)
                || ('\u{4E00}'..='\u{9FFF}').contains(c)
        })
        .collect();
    if cleaned.is_empty() {
        // a fully-symbolic keyword must still produce a usable filename
        "keyword".to_string()
    } else {
        cleaned
    }
}

/// Derive the artifact filename for a capture taken at `at`
pub fn derive_filename(
    keyword: &str,
    tag: OutcomeTag,
    at: &DateTime<Local>,
    with_time_suffix: bool,
) -> String {
    let date = at.format("%Y%m%d");
    let stem = sanitize_keyword(keyword);
    if with_time_suffix {
        format!("{date}_{stem}_{}_{}.png", tag.as_str(), at.format("%H%M%S"))
    } else {
        format!("{date}_{stem}_{}.png", tag.as_str())
    }
}

pub struct CapturePolicy<'a> {
    config: &'a CaptureConfig,
}

impl<'a> CapturePolicy<'a> {
    pub fn new(config: &'a CaptureConfig) -> Self {
        Self { config }
    }

    /// Scroll to the top, let rendering settle, and take a full-viewport
    /// screenshot. Always runs regardless of outcome.
    pub async fn capture(
        &self,
        page: &Page,
        keyword: &str,
        outcome: &TypingOutcome,
    ) -> Result<CaptureArtifact> {
        // suggestions can shift scroll position
        page.evaluate("window.scrollTo(0, 0);")
            .await
            .context("scroll-to-top before capture failed")?;
        sleep(self.config.screenshot_delay()).await;

        let bytes = page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .build(),
            )
            .await
            .context("viewport screenshot failed")?;

        let filename = derive_filename(
            keyword,
            OutcomeTag::from(outcome),
            &Local::now(),
            self.config.with_time_suffix,
        );
        info!("captured {} ({} bytes)", filename, bytes.len());

        Ok(CaptureArtifact { bytes, filename })
    }
}

/// Durable storage for capture artifacts
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Create the store, making sure the output directory exists
    pub fn open(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write the artifact; either the whole file lands under the final
    /// name or nothing does. Bytes go to a `.tmp` sibling first and are
    /// renamed into place, so an interrupted write never leaves a
    /// truncated file under the canonical name.
    pub fn write(&self, artifact: &CaptureArtifact) -> std::io::Result<PathBuf> {
        let path = self.root.join(&artifact.filename);
        let tmp = self.root.join(format!("{}.tmp", artifact.filename));
        if let Err(e) = std::fs::write(&tmp, &artifact.bytes) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 8, 29, 9, 30, 15).unwrap()
    }

    #[test]
    fn sanitizer_keeps_native_script_and_alnum() {
        assert_eq!(sanitize_keyword("埋没法"), "埋没法");
        assert_eq!(sanitize_keyword("メガリス 10mg"), "メガリス10mg");
        assert_eq!(sanitize_keyword("a/b\\c:d*e?f"), "abcdef");
        assert_eq!(sanitize_keyword("ひらがなーカナ"), "ひらがなーカナ");
    }

    #[test]
    fn sanitizer_never_empties_a_nonempty_keyword() {
        assert_eq!(sanitize_keyword("!!??//"), "keyword");
    }

    #[test]
    fn filename_encodes_date_keyword_tag_and_time() {
        let name = derive_filename("タダリス", OutcomeTag::Suggest, &at(), true);
        assert_eq!(name, "20260829_タダリス_suggest_093015.png");
    }

    #[test]
    fn filename_without_time_suffix() {
        let name = derive_filename("test", OutcomeTag::NoSuggest, &at(), false);
        assert_eq!(name, "20260829_test_no_suggest.png");
    }

    #[test]
    fn distinct_tags_and_keywords_never_collide() {
        let a = derive_filename("kw", OutcomeTag::Suggest, &at(), true);
        let b = derive_filename("kw", OutcomeTag::NoSuggest, &at(), true);
        let c = derive_filename("kw2", OutcomeTag::Suggest, &at(), true);
        assert_ne!(a, b);
        assert_ne!(a, c);
        // and derivation is idempotent
        assert_eq!(a, derive_filename("kw", OutcomeTag::Suggest, &at(), true));
    }

    #[test]
    fn outcome_to_tag_mapping() {
        let confirmed = TypingOutcome::SuggestionConfirmed { typed: "t".into() };
        assert_eq!(OutcomeTag::from(&confirmed), OutcomeTag::Suggest);
        assert_eq!(OutcomeTag::from(&TypingOutcome::TypedInFull), OutcomeTag::NoSuggest);
        assert_eq!(OutcomeTag::from(&TypingOutcome::Settled), OutcomeTag::View);
        let err = TypingOutcome::InputError { typed: String::new() };
        assert_eq!(OutcomeTag::from(&err), OutcomeTag::NoSuggest);
    }

    #[test]
    fn store_creates_missing_directories_and_writes_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path().join("nested/out")).unwrap();
        let artifact = CaptureArtifact {
            bytes: vec![0x89, 0x50, 0x4e, 0x47],
            filename: "20260829_test_suggest_093015.png".to_string(),
        };
        let path = store.write(&artifact).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), artifact.bytes);
    }

    #[test]
    fn write_leaves_no_stray_files_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let artifact = CaptureArtifact {
            bytes: vec![1, 2, 3],
            filename: "20260829_kw_suggest_093015.png".to_string(),
        };
        store.write(&artifact).unwrap();
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec![artifact.filename.clone()]);
    }

    #[test]
    fn failed_write_never_creates_the_final_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let artifact = CaptureArtifact {
            bytes: vec![1, 2, 3],
            filename: "20260829_kw_suggest_093015.png".to_string(),
        };
        // a directory squatting on the temp sibling forces the byte write
        // to fail before anything reaches the canonical name
        std::fs::create_dir(dir.path().join(format!("{}.tmp", artifact.filename))).unwrap();

        assert!(store.write(&artifact).is_err());
        assert!(!dir.path().join(&artifact.filename).exists());
    }
}
