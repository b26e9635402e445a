mod config;
mod display;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use lasearch_core::{DocumentKind, Evidence, parse_con29, parse_llc1};
use lasearch_store::{DuckStore, Ingestor, MatterStore, SourceDocument};

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "lasearch", version)]
#[command(about = "Extract facts and flag risks from LLC1 and CON29 search results")]
struct Cli {
    #[command(flatten)]
    settings: Settings,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract facts from one document and print them as JSON.
    Parse { kind: DocumentKind, file: PathBuf },
    /// Ingest search documents for a matter and recompute its risks.
    Ingest {
        #[arg(long)]
        matter: String,
        #[arg(long, required_unless_present = "con29")]
        llc1: Option<PathBuf>,
        #[arg(long)]
        con29: Option<PathBuf>,
    },
    /// List the current findings for a matter.
    Findings {
        #[arg(long)]
        matter: String,
    },
    /// List the current risks for a matter.
    Risks {
        #[arg(long)]
        matter: String,
    },
    /// Findings, risks and checklist for a matter.
    Report {
        #[arg(long)]
        matter: String,
        #[arg(long)]
        json: bool,
    },
    /// Delete every finding and risk for a matter.
    Reset {
        #[arg(long)]
        matter: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.settings.log_level())
        .with_writer(std::io::stderr)
        .init();
    tracing::debug!("lasearch v{}", env!("CARGO_PKG_VERSION"));

    run(cli)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = cli.settings;
    match cli.command {
        Command::Parse { kind, file } => {
            let text = String::from_utf8_lossy(&read(&file)?).into_owned();
            let evidence = Evidence::new(file.display().to_string(), None);
            let json = match kind {
                DocumentKind::Llc1 => {
                    serde_json::to_string_pretty(&parse_llc1(&text).attach_evidence(&evidence))?
                }
                DocumentKind::Con29 => {
                    serde_json::to_string_pretty(&parse_con29(&text).attach_evidence(&evidence))?
                }
            };
            println!("{json}");
        }
        Command::Ingest {
            matter,
            llc1,
            con29,
        } => {
            let mut documents = Vec::new();
            for (kind, path) in [(DocumentKind::Llc1, llc1), (DocumentKind::Con29, con29)] {
                if let Some(path) = path {
                    documents.push(SourceDocument::new(
                        kind.as_str(),
                        path.display().to_string(),
                        read(&path)?,
                    ));
                }
            }
            let ingestor = ingestor(&settings)?;
            let report = ingestor
                .ingest_documents(&matter, &documents)
                .with_context(|| format!("ingesting documents for matter {matter}"))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Findings { matter } => {
            let store = settings.open_store()?;
            display::print_findings(&store.findings(&matter)?);
        }
        Command::Risks { matter } => {
            let store = settings.open_store()?;
            display::print_risks(&store.risks(&matter)?);
        }
        Command::Report { matter, json } => {
            let report = ingestor(&settings)?.report(&matter)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                display::print_report(&report);
            }
        }
        Command::Reset { matter } => {
            ingestor(&settings)?.reset(&matter)?;
            println!("matter {matter} reset");
        }
    }
    Ok(())
}

fn ingestor(settings: &Settings) -> anyhow::Result<Ingestor<DuckStore>> {
    Ok(Ingestor::with_options(
        settings.open_store()?,
        settings.ingest_options(),
    ))
}

fn read(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}
