//! Autosuggest-triggered screenshot capture for mobile search pages
//!
//! Drives a Chrome/Chromium instance emulating a phone, types keywords into
//! the target page's search box one character at a time, watches for the
//! autosuggest overlay to appear, and captures a screenshot the moment it
//! does. Runs a whole keyword batch sequentially and records one outcome
//! per keyword.

mod browser;
pub mod browser_setup;
pub mod capture;
pub mod detect;
pub mod keywords;
pub mod orchestrator;
pub mod typing;
mod utils;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::utils::constants::{
    DEFAULT_TARGET_URL, INPUT_SELECTORS, MOBILE_USER_AGENT, SUGGEST_SELECTORS,
};

/// How the process is being run, resolved once at startup
///
/// `Interactive` keeps the browser window visible for watching a run live;
/// `Automated` (CI, cron) runs headless. Both use an isolated per-process
/// profile directory so repeated runs never collide over browser state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnvironment {
    Interactive,
    Automated,
}

impl RunEnvironment {
    /// Resolve from the process environment
    ///
    /// `SUGGESTSHOT_HEADLESS` or `CI` set to a truthy value (`1`, `true`,
    /// `yes`) selects `Automated`; everything else, including `CI=false`
    /// as some runners set it, is `Interactive`.
    pub fn resolve() -> Self {
        Self::from_vars(
            std::env::var("SUGGESTSHOT_HEADLESS").ok().as_deref(),
            std::env::var("CI").ok().as_deref(),
        )
    }

    fn from_vars(headless: Option<&str>, ci: Option<&str>) -> Self {
        let truthy = |v: Option<&str>| matches!(v, Some("1" | "true" | "yes"));
        if truthy(headless) || truthy(ci) {
            RunEnvironment::Automated
        } else {
            RunEnvironment::Interactive
        }
    }

    pub fn headless(&self) -> bool {
        matches!(self, RunEnvironment::Automated)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_target_url")]
    pub target_url: String,

    #[serde(default)]
    pub sheet: SheetConfig,

    #[serde(default)]
    pub browser: BrowserProfile,

    #[serde(default)]
    pub typing: TypingConfig,

    #[serde(default)]
    pub detector: DetectorConfig,

    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub batch: BatchConfig,
}

/// Remote keyword sheet (CSV export) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetConfig {
    /// CSV export URL of the keyword sheet
    #[serde(default = "default_sheet_url")]
    pub csv_url: String,

    /// Zero-based column the keywords live in (column E)
    #[serde(default = "default_keyword_column")]
    pub keyword_column: usize,

    /// Leading rows to skip (header + reserved row)
    #[serde(default = "default_skip_rows")]
    pub skip_rows: usize,
}

/// Emulated device profile for the browser session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserProfile {
    /// Viewport dimensions (iPhone 16 form factor)
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,

    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,

    #[serde(default = "default_device_scale_factor")]
    pub device_scale_factor: f64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_accept_language")]
    pub accept_language: String,

    #[serde(default = "default_incognito")]
    pub incognito: bool,
}

/// Which typing strategy the driver uses
///
/// The two strategies trade precision for robustness in opposite
/// directions: `incremental_detect` stops the moment the overlay is seen,
/// `forced_settle` always types everything and nudges the page with a
/// keyboard gesture before capturing blind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TypingMode {
    #[default]
    IncrementalDetect,
    ForcedSettle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingConfig {
    #[serde(default)]
    pub mode: TypingMode,

    /// Delay between keystrokes
    #[serde(default = "default_char_interval_ms")]
    pub char_interval_ms: u64,

    /// Minimum typed prefix length before detection is attempted
    /// (short prefixes produce noisy, irrelevant suggestions)
    #[serde(default = "default_min_chars_before_check")]
    pub min_chars_before_check: usize,

    /// Settle wait after the full keyword has been typed
    #[serde(default = "default_pause_after_type_ms")]
    pub pause_after_type_ms: u64,
}

/// Thresholds for the layered suggestion detection
///
/// These are empirical values tuned against the target page's current
/// markup and will drift as the page changes, which is why they are
/// configuration rather than constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Suggestion container selectors, most specific first
    #[serde(default = "default_suggest_selectors")]
    pub selectors: Vec<String>,

    /// Minimum rendered height for a selector-layer match (px)
    #[serde(default = "default_min_height")]
    pub min_height: f64,

    /// Minimum rendered width for a selector-layer match (px)
    #[serde(default = "default_min_width")]
    pub min_width: f64,

    /// A real overlay sits below the search box, so its top edge must be
    /// at least this far down the viewport (px)
    #[serde(default = "default_min_top")]
    pub min_top: f64,

    /// Heuristic layer: minimum list height (px)
    #[serde(default = "default_heuristic_min_height")]
    pub heuristic_min_height: f64,

    /// Heuristic layer: vertical band the list's top edge must fall in (px)
    #[serde(default = "default_band_top")]
    pub band_top: f64,

    #[serde(default = "default_band_bottom")]
    pub band_bottom: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Where screenshots are written; created if absent.
    /// Overridable via SUGGESTSHOT_OUTPUT_DIR.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Render-settle wait before the screenshot is taken
    #[serde(default = "default_screenshot_delay_ms")]
    pub screenshot_delay_ms: u64,

    /// Append HHMMSS so repeated captures of one keyword on the same day
    /// stay distinguishable
    #[serde(default = "default_with_time_suffix")]
    pub with_time_suffix: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Settle wait after each fresh navigation
    #[serde(default = "default_navigation_settle_ms")]
    pub navigation_settle_ms: u64,

    /// Bounded wait for the search input to appear
    #[serde(default = "default_input_wait_ms")]
    pub input_wait_ms: u64,

    /// Search input selectors, tried in order
    #[serde(default = "default_input_selectors")]
    pub input_selectors: Vec<String>,

    /// Breather between keywords
    #[serde(default = "default_pause_between_keywords_ms")]
    pub pause_between_keywords_ms: u64,
}

fn default_target_url() -> String {
    DEFAULT_TARGET_URL.to_string()
}

fn default_sheet_url() -> String {
    "https://docs.google.com/spreadsheets/d/1i2SKztLstWUeD0y9mNsNtdYrwdtZ7zCzNDA7vhojA8s/export?format=csv&gid=1060586181"
        .to_string()
}
fn default_keyword_column() -> usize {
    4
}
fn default_skip_rows() -> usize {
    2
}

fn default_viewport_width() -> u32 {
    393
}
fn default_viewport_height() -> u32 {
    852
}
fn default_device_scale_factor() -> f64 {
    3.0
}
fn default_user_agent() -> String {
    MOBILE_USER_AGENT.to_string()
}
fn default_accept_language() -> String {
    "ja-JP".to_string()
}
fn default_incognito() -> bool {
    true
}

fn default_char_interval_ms() -> u64 {
    300
}
fn default_min_chars_before_check() -> usize {
    5
}
fn default_pause_after_type_ms() -> u64 {
    1000
}

fn default_suggest_selectors() -> Vec<String> {
    SUGGEST_SELECTORS.iter().map(|s| s.to_string()).collect()
}
fn default_min_height() -> f64 {
    20.0
}
fn default_min_width() -> f64 {
    100.0
}
fn default_min_top() -> f64 {
    50.0
}
fn default_heuristic_min_height() -> f64 {
    50.0
}
fn default_band_top() -> f64 {
    100.0
}
fn default_band_bottom() -> f64 {
    500.0
}

fn default_output_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("suggestshot")
}
fn default_screenshot_delay_ms() -> u64 {
    500
}
fn default_with_time_suffix() -> bool {
    true
}

fn default_navigation_settle_ms() -> u64 {
    2000
}
fn default_input_wait_ms() -> u64 {
    10_000
}
fn default_input_selectors() -> Vec<String> {
    INPUT_SELECTORS.iter().map(|s| s.to_string()).collect()
}
fn default_pause_between_keywords_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_url: default_target_url(),
            sheet: SheetConfig::default(),
            browser: BrowserProfile::default(),
            typing: TypingConfig::default(),
            detector: DetectorConfig::default(),
            capture: CaptureConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            csv_url: default_sheet_url(),
            keyword_column: default_keyword_column(),
            skip_rows: default_skip_rows(),
        }
    }
}

impl Default for BrowserProfile {
    fn default() -> Self {
        Self {
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            device_scale_factor: default_device_scale_factor(),
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
            incognito: default_incognito(),
        }
    }
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            mode: TypingMode::default(),
            char_interval_ms: default_char_interval_ms(),
            min_chars_before_check: default_min_chars_before_check(),
            pause_after_type_ms: default_pause_after_type_ms(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            selectors: default_suggest_selectors(),
            min_height: default_min_height(),
            min_width: default_min_width(),
            min_top: default_min_top(),
            heuristic_min_height: default_heuristic_min_height(),
            band_top: default_band_top(),
            band_bottom: default_band_bottom(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            screenshot_delay_ms: default_screenshot_delay_ms(),
            with_time_suffix: default_with_time_suffix(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            navigation_settle_ms: default_navigation_settle_ms(),
            input_wait_ms: default_input_wait_ms(),
            input_selectors: default_input_selectors(),
            pause_between_keywords_ms: default_pause_between_keywords_ms(),
        }
    }
}

impl TypingConfig {
    pub fn char_interval(&self) -> Duration {
        Duration::from_millis(self.char_interval_ms)
    }
    pub fn pause_after_type(&self) -> Duration {
        Duration::from_millis(self.pause_after_type_ms)
    }
}

impl CaptureConfig {
    pub fn screenshot_delay(&self) -> Duration {
        Duration::from_millis(self.screenshot_delay_ms)
    }
}

impl BatchConfig {
    pub fn navigation_settle(&self) -> Duration {
        Duration::from_millis(self.navigation_settle_ms)
    }
    pub fn input_wait(&self) -> Duration {
        Duration::from_millis(self.input_wait_ms)
    }
    pub fn pause_between_keywords(&self) -> Duration {
        Duration::from_millis(self.pause_between_keywords_ms)
    }
}

impl Config {
    /// Apply environment overrides on top of file/default values
    ///
    /// Deployment-sensitive values only; everything else comes from
    /// config.yaml or the compiled defaults.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var("SUGGESTSHOT_OUTPUT_DIR")
            && !dir.trim().is_empty()
        {
            self.capture.output_dir = PathBuf::from(dir);
        }
        if let Ok(url) = std::env::var("SUGGESTSHOT_SHEET_URL")
            && !url.trim().is_empty()
        {
            self.sheet.csv_url = url;
        }
        self
    }
}

/// Load config from config.yaml in the package root, falling back to
/// compiled defaults when the file is absent
pub fn load_yaml_config() -> anyhow::Result<Config> {
    let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config.yaml");

    if config_path.exists() {
        let contents = fs::read_to_string(&config_path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    } else {
        Ok(Config::default())
    }
}

pub use browser::{BrowserError, BrowserResult, BrowserWrapper, SearchSession};
pub use browser_setup::{download_managed_browser, find_browser_executable, launch_browser};
pub use capture::{ArtifactStore, CaptureArtifact, CapturePolicy, OutcomeTag};
pub use detect::{DetectionResult, SuggestionDetector, SuggestionProbe};
pub use keywords::{KeywordProvider, ProviderError};
pub use orchestrator::{
    BatchOrchestrator, BatchReport, KeywordOutcome, KeywordRecord, KeywordRunner, run_batch,
};
pub use typing::{PageSearchInput, SearchInput, TypingDriver, TypingOutcome};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_tuned_values() {
        let cfg = Config::default();
        assert_eq!(cfg.browser.viewport_width, 393);
        assert_eq!(cfg.browser.viewport_height, 852);
        assert_eq!(cfg.typing.char_interval_ms, 300);
        assert_eq!(cfg.typing.min_chars_before_check, 5);
        assert_eq!(cfg.detector.min_height, 20.0);
        assert_eq!(cfg.batch.input_selectors[0], "input[name='p']");
    }

    #[test]
    fn yaml_partial_config_fills_defaults() {
        let cfg: Config = serde_yaml::from_str(
            "typing:\n  mode: forced_settle\n  char_interval_ms: 150\n",
        )
        .unwrap();
        assert_eq!(cfg.typing.mode, TypingMode::ForcedSettle);
        assert_eq!(cfg.typing.char_interval_ms, 150);
        // untouched sections keep defaults
        assert_eq!(cfg.capture.screenshot_delay_ms, 500);
        assert_eq!(cfg.sheet.keyword_column, 4);
    }

    #[test]
    fn environment_requires_truthy_values() {
        use RunEnvironment::{Automated, Interactive};
        assert_eq!(RunEnvironment::from_vars(None, None), Interactive);
        assert_eq!(RunEnvironment::from_vars(Some("1"), None), Automated);
        assert_eq!(RunEnvironment::from_vars(Some("yes"), None), Automated);
        assert_eq!(RunEnvironment::from_vars(None, Some("true")), Automated);
        // runners that export CI=false are not CI
        assert_eq!(RunEnvironment::from_vars(None, Some("false")), Interactive);
        assert_eq!(RunEnvironment::from_vars(Some("0"), Some("")), Interactive);
    }
}
