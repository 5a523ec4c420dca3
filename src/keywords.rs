//! Keyword acquisition from the remote sheet
//!
//! The work queue lives in a spreadsheet exported as CSV. Keywords sit in a
//! fixed column starting at the third row (first row is the header, second
//! is reserved). Any transport or parse failure falls back to a small
//! built-in list so a sheet outage never kills a scheduled run.

use thiserror::Error;
use tracing::{info, warn};

use crate::SheetConfig;
use crate::utils::constants::FALLBACK_KEYWORDS;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("keyword sheet fetch failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("keyword sheet parse failed: {0}")]
    Parse(#[from] csv::Error),

    #[error("keyword sheet yielded no usable keywords")]
    Empty,
}

pub struct KeywordProvider {
    config: SheetConfig,
    client: reqwest::Client,
}

impl KeywordProvider {
    pub fn new(config: SheetConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Fetch the keyword batch, substituting the built-in fallback list on
    /// any failure. Never errors and never returns an empty list.
    pub async fn fetch(&self) -> Vec<String> {
        match self.fetch_remote().await {
            Ok(keywords) => {
                info!("fetched {} keywords from sheet", keywords.len());
                keywords
            }
            Err(e) => {
                warn!("keyword sheet unavailable ({e}), using fallback list");
                FALLBACK_KEYWORDS.iter().map(|k| k.to_string()).collect()
            }
        }
    }

    async fn fetch_remote(&self) -> Result<Vec<String>, ProviderError> {
        let body = self
            .client
            .get(&self.config.csv_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let keywords =
            parse_keyword_csv(&body, self.config.keyword_column, self.config.skip_rows)?;
        if keywords.is_empty() {
            return Err(ProviderError::Empty);
        }
        Ok(keywords)
    }
}

/// Extract keywords from CSV text: one per row from `column`, starting
/// after `skip_rows` leading rows, dropping blank and whitespace-only
/// values (including the full-width space the sheet uses as a placeholder).
fn parse_keyword_csv(
    text: &str,
    column: usize,
    skip_rows: usize,
) -> Result<Vec<String>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut keywords = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        if i < skip_rows {
            continue;
        }
        let Some(raw) = record.get(column) else {
            continue;
        };
        let keyword = raw.trim().trim_matches('　').trim();
        if !keyword.is_empty() {
            keywords.push(keyword.to_string());
        }
    }
    Ok(keywords)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = "\
h1,h2,h3,h4,keyword\n\
,,,,\n\
a,b,c,d,メガリス\n\
a,b,c,d,\n\
a,b,c,d,\u{20}\u{20}\n\
a,b,c,d,\u{3000}\n\
a,b,c,d,埋没法\n\
short,row\n\
a,b,c,d,\u{20}タダリス\u{20}\n";

    #[test]
    fn skips_header_rows_and_blank_values() {
        let keywords = parse_keyword_csv(SHEET, 4, 2).unwrap();
        assert_eq!(keywords, vec!["メガリス", "埋没法", "タダリス"]);
    }

    #[test]
    fn short_rows_are_ignored_not_errors() {
        // flexible mode: a row without the keyword column is skipped
        let keywords = parse_keyword_csv("a,b\nc,d\n,,,,kw\n", 4, 2).unwrap();
        assert_eq!(keywords, vec!["kw"]);
    }

    #[tokio::test]
    async fn transport_failure_yields_fallback_list() {
        let provider = KeywordProvider::new(SheetConfig {
            // unroutable port on loopback
            csv_url: "http://127.0.0.1:9/export.csv".to_string(),
            ..SheetConfig::default()
        });
        let keywords = provider.fetch().await;
        assert_eq!(keywords.len(), 4);
        assert_eq!(keywords[0], "メガリス");
    }
}
