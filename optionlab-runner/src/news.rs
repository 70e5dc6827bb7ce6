//! Headline and calendar news filter.
//!
//! Blocks a symbol when a recent headline mentions a configured keyword,
//! when recent headlines are net negative, or when a high-impact calendar
//! event is imminent. Calendar events apply to every symbol.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use optionlab_core::config::NewsConfig;
use optionlab_core::providers::NewsProvider;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headline {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    /// In [-1, 1].
    pub sentiment: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub impact: Impact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    Keyword,
    Sentiment,
    Calendar,
}

#[derive(Debug, Clone)]
pub struct HeadlineNewsFilter {
    config: NewsConfig,
    keywords: Vec<String>,
    headlines: HashMap<String, Vec<Headline>>,
    events: Vec<CalendarEvent>,
}

impl HeadlineNewsFilter {
    pub fn new(config: &NewsConfig) -> Self {
        Self {
            keywords: config.keywords.iter().map(|k| k.to_lowercase()).collect(),
            config: config.clone(),
            headlines: HashMap::new(),
            events: Vec::new(),
        }
    }

    pub fn add_headline(&mut self, headline: Headline) {
        self.headlines.entry(headline.symbol.clone()).or_default().push(headline);
    }

    pub fn add_event(&mut self, event: CalendarEvent) {
        self.events.push(event);
    }

    /// First reason `symbol` is blocked at `ts`, if any.
    pub fn block_reason(&self, symbol: &str, ts: DateTime<Utc>) -> Option<BlockReason> {
        let window_start = ts - Duration::minutes(i64::from(self.config.headline_window_minutes));
        let recent: Vec<&Headline> = self
            .headlines
            .get(symbol)
            .map(|hs| {
                hs.iter()
                    .filter(|h| h.timestamp >= window_start && h.timestamp <= ts)
                    .collect()
            })
            .unwrap_or_default();

        if recent.iter().any(|h| self.mentions_keyword(&h.text)) {
            return Some(BlockReason::Keyword);
        }
        if !recent.is_empty() {
            let mean = recent.iter().map(|h| h.sentiment).sum::<f64>() / recent.len() as f64;
            if mean < self.config.sentiment_threshold {
                return Some(BlockReason::Sentiment);
            }
        }

        let horizon = ts + Duration::minutes(i64::from(self.config.lookahead_minutes));
        let imminent = self
            .events
            .iter()
            .any(|e| e.impact == Impact::High && e.timestamp >= ts && e.timestamp <= horizon);
        imminent.then_some(BlockReason::Calendar)
    }

    fn mentions_keyword(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }
}

impl NewsProvider for HeadlineNewsFilter {
    fn is_blocked(&self, symbol: &str, timestamp: DateTime<Utc>) -> bool {
        match self.block_reason(symbol, timestamp) {
            Some(reason) => {
                info!(symbol, ?reason, outcome = "news_block", "news filter blocks trading");
                true
            }
            None => false,
        }
    }
}
