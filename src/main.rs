use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use place_reconciliation::{
    insert_event, open_database, read_places_json, reconcile_sources, replace_places,
    write_issues_csv, write_places_json, Category, Event, PipelineConfig, QualityGate,
    QualityThresholds, StoreStats,
};

#[derive(Parser)]
#[command(name = "place-reconciliation", version, about = "Merge venue lists from several providers into one canonical directory")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile provider payloads into the canonical place list
    Reconcile {
        /// Pipeline config (TOML). Without it the standard data/raw layout is used.
        #[arg(long, env = "PLACES_CONFIG")]
        config: Option<PathBuf>,

        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Overrides the configured output path
        #[arg(long)]
        output: Option<PathBuf>,

        /// Also store the result in SQLite (read API)
        #[arg(long, env = "PLACES_DB")]
        db: Option<PathBuf>,
    },

    /// Run the quality gate over a published list
    Qa {
        #[arg(long, default_value = "data/places.json")]
        places: PathBuf,

        #[arg(long, default_value = "data_quality_issues.csv")]
        issues_csv: PathBuf,

        #[arg(long, default_value_t = 0.20)]
        max_missing_address: f64,

        #[arg(long, default_value_t = 0.40)]
        max_no_photo: f64,
    },

    /// Print a published list, optionally one category
    Inspect {
        #[arg(long, default_value = "data/places.json")]
        places: PathBuf,

        #[arg(long)]
        category: Option<Category>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "place_reconciliation=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Reconcile { config, data_dir, output, db } => run_reconcile(config, &data_dir, output, db),
        Command::Qa { places, issues_csv, max_missing_address, max_no_photo } => run_qa(
            &places,
            &issues_csv,
            QualityThresholds {
                max_missing_address_ratio: max_missing_address,
                max_no_photo_ratio: max_no_photo,
            },
        ),
        Command::Inspect { places, category } => run_inspect(&places, category),
    }
}

fn run_reconcile(
    config_path: Option<PathBuf>,
    data_dir: &Path,
    output: Option<PathBuf>,
    db: Option<PathBuf>,
) -> Result<()> {
    println!("⚖️  Place Reconciliation");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut config = match config_path {
        Some(path) => PipelineConfig::from_file(&path)?,
        None => PipelineConfig::default_layout(data_dir),
    };
    if let Some(output) = output {
        config.output = output;
    }
    if db.is_some() {
        config.database = db;
    }

    println!("\n📂 Sources ({}):", config.sources.len());
    for source in &config.sources {
        println!("   {:<12} {:?} {}", source.name, source.role(), source.path.display());
    }

    let report = reconcile_sources(&config.sources, config.engine_options());

    println!("\n✓ {}", report.summary());
    for issue in &report.issues {
        println!("   ⚠️  {:?}: {} ({})", issue.kind, issue.subject, issue.detail);
    }
    if report.is_empty() {
        println!("   ⚠️  No places produced");
    }

    write_places_json(&config.output, &report.places)?;
    println!("\n💾 Wrote {} places → {}", report.places.len(), config.output.display());

    if let Some(db_path) = &config.database {
        let mut conn = open_database(db_path)?;
        let stored: StoreStats = replace_places(&mut conn, &report.places)?;
        insert_event(&conn, &Event::reconciliation_run(&config.namespace, &report, &stored))?;
        println!(
            "🗄️  Database {}: {} inserted, {} updated, {} unchanged, {} removed",
            db_path.display(),
            stored.inserted,
            stored.updated,
            stored.unchanged,
            stored.removed
        );
        if stored.duplicates > 0 {
            println!("   ⚠️  {} places share an id with an earlier entry and were not stored", stored.duplicates);
        }
    }

    Ok(())
}

fn run_qa(places_path: &Path, issues_csv: &Path, thresholds: QualityThresholds) -> Result<()> {
    let places = if places_path.exists() {
        read_places_json(places_path)?
    } else {
        Vec::new()
    };

    if places.is_empty() {
        eprintln!("❌ No places found; failing QA.");
        std::process::exit(2);
    }

    let report = QualityGate::new(thresholds).evaluate(&places);
    write_issues_csv(issues_csv, &report.issues)?;

    println!("{}", report.summary());
    println!("   Issues written → {}", issues_csv.display());

    if !report.passed {
        for failure in &report.failures {
            eprintln!("❌ {}", failure);
        }
        std::process::exit(3);
    }

    Ok(())
}

fn run_inspect(places_path: &Path, category: Option<Category>) -> Result<()> {
    let places = read_places_json(places_path)?;

    let mut shown = 0;
    for place in places.iter().filter(|p| category.map_or(true, |c| p.category == c)) {
        println!(
            "{:<50} {:>10.5} {:>10.5}  {}  [{}]",
            place.id,
            place.location.lat,
            place.location.lon,
            place.location.address.as_deref().unwrap_or("-"),
            place.sources.keys().cloned().collect::<Vec<_>>().join(",")
        );
        shown += 1;
    }

    println!("\n✓ {} of {} places", shown, places.len());
    Ok(())
}
