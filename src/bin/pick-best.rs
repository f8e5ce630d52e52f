//! Offline disambiguation: score a saved provider response against a title.
//!
//! Usage:
//!   pick-best tmdb_search.json --provider tmdb --title "Dune" --date 2021-10-22
//!   pick-best goodreads_search.html --provider goodreads --title "Dune"

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::Value;
use std::path::PathBuf;

use media_sync::logging::init_tracing;
use media_sync::models::{Candidate, Target};
use media_sync::providers::{goodreads, google_books, igdb, openlibrary, rawg, tmdb, Provider};
use media_sync::scoring::{score_all, select_best};

#[derive(Parser)]
#[command(name = "pick-best")]
#[command(about = "Score saved provider search results and show which one would be picked")]
struct Args {
    /// Saved response: JSON (array, or object with results/docs/items), or Goodreads search HTML
    input: PathBuf,

    #[arg(long)]
    provider: String,

    #[arg(long)]
    title: String,

    /// Release date of the entry (YYYY-MM-DD, a year, or epoch seconds)
    #[arg(long)]
    date: Option<String>,

    #[arg(long, default_value = "warn")]
    log_level: String,
}

/// The list of raw results inside a saved response.
fn result_list(body: &Value) -> Vec<Value> {
    if let Some(list) = body.as_array() {
        return list.clone();
    }
    ["results", "docs", "items"]
        .iter()
        .find_map(|key| body.get(key).and_then(Value::as_array))
        .cloned()
        .unwrap_or_default()
}

fn load_candidates(provider: Provider, text: &str) -> Result<Vec<Candidate>> {
    let adapt: fn(&Value) -> Candidate = match provider {
        Provider::Tmdb => tmdb::to_candidate,
        Provider::Igdb => igdb::to_candidate,
        Provider::Rawg => rawg::to_candidate,
        Provider::OpenLibrary => openlibrary::to_candidate,
        Provider::GoogleBooks => google_books::to_candidate,
        Provider::Goodreads => {
            return goodreads::parse_search_rows(text, goodreads::BASE_URL)
                .context("Failed to parse Goodreads search page");
        }
    };

    let body: Value = serde_json::from_str(text).context("Input is not valid JSON")?;
    Ok(result_list(&body).iter().map(adapt).collect())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let Some(provider) = Provider::from_name(&args.provider) else {
        let known: Vec<&str> = Provider::ALL.iter().map(|p| p.name()).collect();
        bail!("Unknown provider '{}' (expected one of: {})", args.provider, known.join(", "));
    };

    let text = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let candidates = load_candidates(provider, &text)?;

    let target = Target::new(args.title.clone(), args.date.as_deref());
    let policy = provider.policy();

    println!(
        "{} candidates from {} (date cap {} days)",
        candidates.len(),
        provider.name(),
        policy.date_cap.days()
    );
    println!("{:-<96}", "");
    println!(
        "{:>3}  {:<44} {:<12} {:>6} {:>6} {:>6} {:>7}",
        "#", "title", "date", "title", "date", "pop", "final"
    );
    for (i, scored) in score_all(&candidates, &target, &policy).iter().enumerate() {
        let c = scored.candidate;
        let title: String = c.title.chars().take(44).collect();
        println!(
            "{:>3}  {:<44} {:<12} {:>6.3} {:>6.3} {:>6.3} {:>7.4}",
            i,
            title,
            c.release_date.as_deref().unwrap_or("-"),
            scored.title_score,
            scored.date_score,
            scored.popularity_score,
            scored.final_score
        );
    }
    println!("{:-<96}", "");

    match select_best(&candidates, &target, &policy) {
        Some(best) => println!(
            "Picked: {} ({}) id={}",
            best.title,
            best.release_date.as_deref().unwrap_or("no date"),
            best.id.as_deref().unwrap_or("-")
        ),
        None => println!("No candidates."),
    }

    Ok(())
}
