//! Shared default values for the capture pipeline
//!
//! This module contains default values and configuration constants used
//! throughout the codebase to ensure consistency and avoid magic numbers.

/// iOS Safari user agent string for mobile emulation
///
/// Matches the emulated iPhone form factor configured in `BrowserProfile`.
/// Safari UA strings move slowly; revisit when the target page starts
/// serving a different mobile layout.
pub const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";

/// Default target page (Yahoo! JAPAN mobile top)
pub const DEFAULT_TARGET_URL: &str = "https://www.yahoo.co.jp/";

/// Built-in keyword list used when the remote sheet cannot be fetched
pub const FALLBACK_KEYWORDS: [&str; 4] = ["メガリス", "レカネマブ", "タダリス", "埋没法"];

/// Search input selectors for the target page, tried in order
pub const INPUT_SELECTORS: [&str; 4] = [
    "input[name='p']",
    "input#srchtxt",
    "input[type='search']",
    "input.SearchBox__searchInput",
];

/// Suggestion container selectors for the target page, tried in order.
/// Specific class names first, generic attribute probes last.
pub const SUGGEST_SELECTORS: [&str; 9] = [
    ".sw-SuggestList",
    ".sw-Card",
    ".sw-CardBase",
    ".Suggest",
    "ul.SuggestList",
    "[role='listbox']",
    "div[class*='suggest']",
    "ul[class*='suggest']",
    "ul li a[href*='search.yahoo']",
];
