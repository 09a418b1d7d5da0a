//! Keyword density and readability analysis of the page body.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use siteplug_core::result::AppResult;
use siteplug_plugin::api::context::PluginContext;
use siteplug_plugin::traits::{LoadGuard, Plugin, PluginMetadata};

use crate::document::SharedDocument;
use crate::hooks;
use crate::seo;

pub const PLUGIN_NAME: &str = "keyword-tagging";

/// Runs after the SEO plugin's own keyword handling.
const KEYWORD_FILTER_PRIORITY: i32 = 20;

static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+(?:'\p{L}+)?").expect("word pattern is valid"));

static SENTENCE_END_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]+").expect("sentence pattern is valid"));

static VOWEL_GROUP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[aeiouy]+").expect("vowel pattern is valid"));

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "also", "am", "an", "and", "any", "are", "as",
    "at", "be", "because", "been", "before", "being", "below", "between", "both", "but", "by",
    "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for", "from",
    "further", "had", "has", "have", "having", "he", "her", "here", "hers", "him", "his", "how",
    "i", "if", "in", "into", "is", "it", "its", "itself", "just", "me", "more", "most", "my",
    "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours",
    "out", "over", "own", "same", "she", "should", "so", "some", "such", "than", "that", "the",
    "their", "them", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours",
];

static STOP_WORD_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| STOP_WORDS.iter().copied().collect());

/// Settings stored in the plugin record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeywordSettings {
    /// Phrases whose density is reported.
    pub target_keywords: Vec<String>,
    /// How many extracted keywords are kept.
    pub max_keywords: usize,
    /// Shorter words are never extracted as keywords.
    pub min_word_length: usize,
}

impl Default for KeywordSettings {
    fn default() -> Self {
        Self {
            target_keywords: Vec::new(),
            max_keywords: 10,
            min_word_length: 3,
        }
    }
}

/// Occurrence count and density of one keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordScore {
    pub keyword: String,
    pub count: usize,
    /// Percent of all words.
    pub density: f64,
}

/// Result of analysing one body of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentAnalysis {
    pub word_count: usize,
    pub sentence_count: usize,
    pub average_words_per_sentence: f64,
    /// Target phrase → density percent.
    pub keyword_density: BTreeMap<String, f64>,
    pub top_keywords: Vec<KeywordScore>,
    /// Flesch reading ease; higher is easier.
    pub reading_ease: f64,
}

impl ContentAnalysis {
    pub fn keywords(&self) -> Vec<String> {
        self.top_keywords.iter().map(|k| k.keyword.clone()).collect()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn tokenize(text: &str) -> Vec<String> {
    WORD_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

fn count_sentences(text: &str) -> usize {
    SENTENCE_END_RE
        .split(text)
        .filter(|segment| WORD_RE.is_match(segment))
        .count()
}

/// Vowel-group syllable estimate, at least one per word.
pub fn count_syllables(word: &str) -> usize {
    let word = word.to_lowercase();
    let mut count = VOWEL_GROUP_RE.find_iter(&word).count();
    if count > 1 && word.ends_with('e') && !word.ends_with("le") {
        count -= 1;
    }
    count.max(1)
}

fn phrase_occurrences(tokens: &[String], phrase: &[String]) -> usize {
    if phrase.is_empty() || phrase.len() > tokens.len() {
        return 0;
    }
    tokens.windows(phrase.len()).filter(|w| *w == phrase).count()
}

/// Analyses `text` for word statistics, keyword density and readability.
pub fn analyze(text: &str, settings: &KeywordSettings) -> ContentAnalysis {
    let tokens = tokenize(text);
    let word_count = tokens.len();
    let sentence_count = if word_count == 0 {
        0
    } else {
        count_sentences(text).max(1)
    };

    let percent = |count: usize| {
        if word_count == 0 {
            0.0
        } else {
            round2(count as f64 / word_count as f64 * 100.0)
        }
    };

    let keyword_density = settings
        .target_keywords
        .iter()
        .map(|keyword| {
            let phrase = tokenize(keyword);
            (keyword.clone(), percent(phrase_occurrences(&tokens, &phrase)))
        })
        .collect();

    let mut frequency: HashMap<&str, usize> = HashMap::new();
    for token in &tokens {
        if token.chars().count() >= settings.min_word_length
            && !STOP_WORD_SET.contains(token.as_str())
            && !token.chars().all(|c| c.is_numeric())
        {
            *frequency.entry(token.as_str()).or_default() += 1;
        }
    }
    let mut ranked: Vec<(&str, usize)> = frequency.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let top_keywords = ranked
        .into_iter()
        .take(settings.max_keywords)
        .map(|(keyword, count)| KeywordScore {
            keyword: keyword.to_string(),
            count,
            density: percent(count),
        })
        .collect();

    let (average_words_per_sentence, reading_ease) = if word_count == 0 {
        (0.0, 0.0)
    } else {
        let syllables: usize = tokens.iter().map(|t| count_syllables(t)).sum();
        let words_per_sentence = word_count as f64 / sentence_count as f64;
        let syllables_per_word = syllables as f64 / word_count as f64;
        (
            round2(words_per_sentence),
            round2(206.835 - 1.015 * words_per_sentence - 84.6 * syllables_per_word),
        )
    };

    ContentAnalysis {
        word_count,
        sentence_count,
        average_words_per_sentence,
        keyword_density,
        top_keywords,
        reading_ease,
    }
}

/// Appends `extra` to a keyword list value, skipping case-insensitive
/// duplicates.
fn merge_keywords(value: Value, extra: &[String]) -> AppResult<Value> {
    let mut list: Vec<String> = serde_json::from_value(value)?;
    let mut seen: HashSet<String> = list.iter().map(|k| k.to_lowercase()).collect();
    for keyword in extra {
        if seen.insert(keyword.to_lowercase()) {
            list.push(keyword.clone());
        }
    }
    Ok(json!(list))
}

/// Analyses the document body and feeds extracted keywords to the SEO tags.
#[derive(Debug)]
pub struct KeywordTaggingPlugin {
    settings: KeywordSettings,
    document: SharedDocument,
    guard: LoadGuard,
    analysis: Mutex<Option<ContentAnalysis>>,
}

impl KeywordTaggingPlugin {
    pub fn new(settings: KeywordSettings, document: SharedDocument) -> Self {
        Self {
            settings,
            document,
            guard: LoadGuard::new(),
            analysis: Mutex::new(None),
        }
    }

    /// Analysis from the last load, if loaded.
    pub fn analysis(&self) -> Option<ContentAnalysis> {
        self.analysis.lock().clone()
    }
}

#[async_trait]
impl Plugin for KeywordTaggingPlugin {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata::new(PLUGIN_NAME, "1.0.0")
            .with_description("Keyword density, extraction and readability scoring")
            .with_capabilities(["keywords", "content-analysis"])
            .depends_on([seo::PLUGIN_NAME])
    }

    async fn load(&self, ctx: &PluginContext) -> AppResult<()> {
        if self.guard.is_loaded() {
            return Ok(());
        }

        let text = self.document.read().body_text().to_string();
        let analysis = analyze(&text, &self.settings);
        let keywords = Arc::new(analysis.keywords());

        ctx.add_filter(hooks::SEO_KEYWORDS, KEYWORD_FILTER_PRIORITY, move |value, _| {
            merge_keywords(value, &keywords)
        });
        ctx.hooks().do_action(hooks::SEO_REFRESH, &[]);

        let path = self.document.read().path().to_string();
        ctx.emit(
            hooks::CONTENT_ANALYZED,
            json!({
                "path": path,
                "wordCount": analysis.word_count,
                "readingEase": analysis.reading_ease,
                "keywords": analysis.keywords(),
            }),
        );

        info!(
            words = analysis.word_count,
            keywords = analysis.top_keywords.len(),
            reading_ease = analysis.reading_ease,
            "Content analyzed"
        );
        *self.analysis.lock() = Some(analysis);
        self.guard.mark_loaded();
        Ok(())
    }

    async fn unload(&self, ctx: &PluginContext) -> AppResult<()> {
        if !self.guard.is_loaded() {
            return Ok(());
        }
        ctx.remove_own_hooks();
        ctx.hooks().do_action(hooks::SEO_REFRESH, &[]);
        self.analysis.lock().take();
        self.guard.mark_unloaded();
        debug!("Keyword tags removed");
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.guard.is_loaded()
    }
}
