mod cache;
mod category;
mod error;
mod extract;
mod fetch;
mod output;
mod record;
mod stats;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

use category::{CategoryConfig, CATEGORIES};
use record::ExtractionResult;

#[derive(Parser)]
#[command(
    name = "mygap_scraper",
    about = "MyGAP/MyOrganic certification registry scraper"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Force a live fetch of one category and save the JSON artifact
    Fetch {
        /// Category name (pf, am, tanaman, organic)
        category: String,
        /// Also write a CSV artifact
        #[arg(long)]
        csv: bool,
        /// Skip writing artifacts
        #[arg(long)]
        no_save: bool,
        /// Directory for artifacts
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Load records through the freshness gate (cache if younger than a day)
    Data {
        category: String,
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Field completion statistics from a fresh fetch (nothing saved)
    Stats { category: String },
    /// List known categories and their field schemas
    Categories,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Fetch {
            category,
            csv,
            no_save,
            dir,
        } => {
            let cfg = CategoryConfig::parse(&category)?;
            let result = fetch::extract_category(cfg, !no_save, &dir).await?;
            if csv && !result.records.is_empty() {
                let path = output::write_csv(&result, &dir)?;
                println!("CSV saved to {}", path.display());
            }
            display_sample(&result, 5);
            print_completion(&result);
            println!("\nTotal records extracted: {}", result.records.len());
            Ok(())
        }
        Commands::Data { category, dir } => {
            let cfg = CategoryConfig::parse(&category)?;
            let (result, source) = cache::load_or_fetch(cfg, &dir).await?;
            let source = match source {
                cache::Source::Cache => "cache",
                cache::Source::Fresh => "fresh",
            };
            println!(
                "Loaded {} {} records from {}",
                result.records.len(),
                cfg.label,
                source
            );
            Ok(())
        }
        Commands::Stats { category } => {
            let cfg = CategoryConfig::parse(&category)?;
            let result = fetch::extract_category(cfg, false, std::path::Path::new(".")).await?;
            print_completion(&result);
            println!("\nTotal records: {}", result.records.len());
            Ok(())
        }
        Commands::Categories => {
            for cfg in CATEGORIES {
                println!("{:<8} {} ({})", cfg.name, cfg.label, cfg.list_path);
                println!("         fields: {}", cfg.fields.join(", "));
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }

    result
}

fn display_sample(result: &ExtractionResult, count: usize) {
    if result.records.is_empty() {
        return;
    }
    println!(
        "\nFirst {} of {} records:",
        count.min(result.records.len()),
        result.records.len()
    );
    println!("{}", "-".repeat(60));

    for (i, record) in result.records.iter().take(count).enumerate() {
        println!("\nRecord {}:", i + 1);
        for (field, value) in result.cfg.fields.iter().zip(record.values()) {
            if !value.is_empty() {
                println!("  {}: {}", field, value);
            }
        }
    }
}

fn print_completion(result: &ExtractionResult) {
    println!("\nField completion rates:");
    for s in stats::field_completion(result.cfg, &result.records) {
        println!(
            "  {:<20} {:>5}/{} ({:.1}%)",
            s.field, s.completed, s.total, s.percentage
        );
    }
}
