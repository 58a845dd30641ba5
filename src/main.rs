mod config;
mod error;
mod fetcher;
mod images;
mod model;
mod pipeline;
mod sources;
mod store;
mod verifier;

use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};

use model::EntityKind;

#[derive(Parser)]
#[command(name = "chronicle", about = "Historical figure and event acquisition pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    Person,
    Event,
}

impl From<Kind> for EntityKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Person => EntityKind::Person,
            Kind::Event => EntityKind::Event,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire subjects by name and merge accepted ones into the collection
    Acquire {
        /// Entity kind the names refer to
        #[arg(short, long, value_enum, default_value_t = Kind::Person)]
        kind: Kind,
        /// Subject names (person names or event titles), processed in order
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Show collection statistics
    Stats,
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
    let settings = config::Settings::load();

    let result = match cli.command {
        Commands::Acquire { kind, names } => {
            let verifier = verifier::for_settings(&settings)?;
            let pipeline = pipeline::Pipeline::new(settings, verifier)?;
            println!("Acquiring {} subjects...", names.len());
            let stats = pipeline.acquire(kind.into(), names).await?;
            stats.print();
            Ok(())
        }
        Commands::Stats => {
            for kind in [EntityKind::Person, EntityKind::Event] {
                let collection = store::Collection::load(&settings.data_dir, kind)?;
                let with_image = collection
                    .entities
                    .iter()
                    .filter(|e| e.image.is_some())
                    .count();
                let with_years = collection
                    .entities
                    .iter()
                    .filter(|e| e.details.has_year())
                    .count();
                let provisional = collection
                    .entities
                    .iter()
                    .filter(|e| !e.issues.is_empty())
                    .count();
                println!(
                    "{:<7} {:>5} entities | {:>4} with image | {:>4} with years | {:>4} provisional",
                    kind.label(),
                    collection.len(),
                    with_image,
                    with_years,
                    provisional,
                );
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
