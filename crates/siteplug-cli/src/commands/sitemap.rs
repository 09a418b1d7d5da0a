//! sitemap.xml and robots.txt generation commands.

use clap::Args;

use plugin_marketing::sitemap::{self, SitemapUrl};
use siteplug_core::error::AppError;

use super::CliContext;

/// Arguments for the sitemap command
#[derive(Debug, Args)]
pub struct SitemapArgs {
    /// Extra URL paths to include
    #[arg(short, long = "url")]
    pub urls: Vec<String>,

    /// Write to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<String>,
}

/// Arguments for the robots command
#[derive(Debug, Args)]
pub struct RobotsArgs {
    /// Write to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<String>,
}

/// Execute the sitemap command
pub async fn execute_sitemap(args: &SitemapArgs, ctx: &CliContext) -> Result<(), AppError> {
    let record = ctx.record_or_default(sitemap::PLUGIN_NAME)?;
    let generator = plugin_marketing::build_sitemap(&record, &ctx.config.site)?;
    for loc in &args.urls {
        generator.add_url(SitemapUrl::new(loc.as_str()))?;
    }
    super::emit_text(&generator.render_sitemap(), args.output.as_deref()).await
}

/// Execute the robots command
pub async fn execute_robots(args: &RobotsArgs, ctx: &CliContext) -> Result<(), AppError> {
    let record = ctx.record_or_default(sitemap::PLUGIN_NAME)?;
    let generator = plugin_marketing::build_sitemap(&record, &ctx.config.site)?;
    super::emit_text(&generator.render_robots(), args.output.as_deref()).await
}
