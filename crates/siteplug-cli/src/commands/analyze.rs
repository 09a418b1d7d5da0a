//! Keyword and readability analysis command.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use plugin_marketing::keyword::{self, KeywordSettings};
use siteplug_core::error::AppError;

use super::CliContext;
use crate::output::{self, OutputFormat};

/// Arguments for the analyze command
#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Text file to analyze
    pub file: String,

    /// Target keyword or phrase (repeatable)
    #[arg(short, long = "keyword")]
    pub keywords: Vec<String>,

    /// Number of extracted keywords to show
    #[arg(short, long)]
    pub top: Option<usize>,
}

/// Keyword display row for table output
#[derive(Debug, Serialize, Tabled)]
struct KeywordRow {
    /// Keyword
    keyword: String,
    /// Occurrences
    count: usize,
    /// Percent of all words
    density: String,
}

/// Execute the analyze command
pub async fn execute(args: &AnalyzeArgs, ctx: &CliContext) -> Result<(), AppError> {
    let text = tokio::fs::read_to_string(&args.file).await.map_err(|e| {
        AppError::not_found(format!("Cannot read '{}': {}", args.file, e))
    })?;

    let record = ctx.record_or_default(keyword::PLUGIN_NAME)?;
    let mut settings: KeywordSettings = plugin_marketing::parse_settings(&record)?;
    if !args.keywords.is_empty() {
        settings.target_keywords = args.keywords.clone();
    }
    if let Some(top) = args.top {
        settings.max_keywords = top;
    }

    let analysis = keyword::analyze(&text, &settings);

    match ctx.format {
        OutputFormat::Json => output::print_json(&analysis, "{}"),
        OutputFormat::Table => {
            output::print_heading(&format!("Analysis of {}:", args.file));
            output::print_kv("Words", &analysis.word_count.to_string());
            output::print_kv("Sentences", &analysis.sentence_count.to_string());
            output::print_kv(
                "Words/Sentence",
                &format!("{:.2}", analysis.average_words_per_sentence),
            );
            output::print_kv("Reading Ease", &format!("{:.2}", analysis.reading_ease));
            for (phrase, density) in &analysis.keyword_density {
                output::print_kv(&format!("Density '{}'", phrase), &format!("{:.2}%", density));
            }
            println!();
            let rows: Vec<KeywordRow> = analysis
                .top_keywords
                .iter()
                .map(|k| KeywordRow {
                    keyword: k.keyword.clone(),
                    count: k.count,
                    density: format!("{:.2}%", k.density),
                })
                .collect();
            output::print_list(&rows, OutputFormat::Table);
        }
    }

    Ok(())
}
