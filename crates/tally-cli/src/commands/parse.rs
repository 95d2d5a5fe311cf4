//! Parser commands: run an extractor without the bot

use std::path::Path;

use anyhow::{Context, Result};
use tally_core::{AiParser, ExtractionResult, TextParser};

/// Extract from text with the rule-based parser, or the AI parser when `ai` is set
///
/// `None` means the rule-based parser found no amount.
pub async fn parse_text(
    config: &tally_core::Config,
    text: &str,
    ai: bool,
) -> Result<Option<ExtractionResult>> {
    if ai {
        let parser = AiParser::from_config(&config.ai).context("Failed to build AI parser")?;
        Ok(Some(parser.parse_text(text).await))
    } else {
        Ok(TextParser::new().parse(text))
    }
}

pub async fn cmd_parse(config: &tally_core::Config, text: &str, ai: bool) -> Result<()> {
    match parse_text(config, text, ai).await? {
        Some(result) => print_result(&result),
        None => {
            println!("❌ No amount found in \"{}\"", text);
            println!("   Try: 'add 15rs as coffee' or 'spent 50 on food'");
            Ok(())
        }
    }
}

pub async fn parse_image(config: &tally_core::Config, file: &Path) -> Result<ExtractionResult> {
    let bytes = std::fs::read(file)
        .with_context(|| format!("Failed to read image {}", file.display()))?;
    let parser = AiParser::from_config(&config.ai).context("Failed to build AI parser")?;
    Ok(parser.parse_image(&bytes).await)
}

pub async fn cmd_parse_image(config: &tally_core::Config, file: &Path) -> Result<()> {
    println!("🔍 Reading {}...", file.display());
    let result = parse_image(config, file).await?;
    if result.rate_limited {
        println!("⏳ The AI provider is rate limiting requests; try again in a minute.");
        return Ok(());
    }
    if result.usable_amount().is_none() {
        println!("❌ No amount found in the image.");
    }
    print_result(&result)
}

fn print_result(result: &ExtractionResult) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}
