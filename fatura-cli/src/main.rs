use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use fatura_core::{
    CategoryDictionary, DictionaryStore, JsonFileStore, MatchPolicy, Normalizer, PendingItem, Reconciler, Sample,
    Suggester, Suggestion, SuggestionRequest,
};
use fatura_finance::{BatchInput, BatchOptions, BatchReport, BatchRunner, summarize_file};
use fatura_ingest::SourceProfile;

use crate::config::Config;
use crate::console::ConsolePrompter;
use crate::llm::RemoteClassifier;

mod config;
mod console;
mod llm;
mod state;

#[derive(Parser, Debug)]
#[command(
    name = "fatura",
    version,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("FATURA_BUILD_SHA"), ")"),
    about = "Classify bank and credit card statements into spending categories"
)]
struct Cli {
    /// More logging on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify statement CSVs and write `<name>_classificado.csv` next to each
    Classify {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Statement format (see `fatura sources`)
        #[arg(long, default_value = "nubank")]
        source: String,

        /// exact or prefix (default from config)
        #[arg(long)]
        policy: Option<MatchPolicy>,

        /// Category dictionary JSON (default from config)
        #[arg(long)]
        dictionary: Option<PathBuf>,

        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Classify from the dictionary only; never prompt
        #[arg(long)]
        no_interactive: bool,

        /// Do not ask the remote model for suggestions
        #[arg(long)]
        no_remote: bool,
    },

    /// Print the normalized form of a description
    Normalize {
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// Inspect or edit the category dictionary
    Dictionary {
        #[command(subcommand)]
        command: DictionaryCommand,

        #[arg(long, global = true)]
        path: Option<PathBuf>,
    },

    /// Per-category totals of an already classified file
    Summary {
        file: PathBuf,

        #[arg(long, default_value = "nubank")]
        source: String,

        /// Category column (default from config)
        #[arg(long)]
        column: Option<String>,
    },

    /// Ask the remote model for a category, without changing anything
    Suggest {
        description: String,

        #[arg(long, default_value_t = 0.0)]
        amount: f64,

        #[arg(long)]
        raw_category: Option<String>,
    },

    /// Manage ~/.fatura/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// List known statement formats
    Sources,
}

#[derive(Subcommand, Debug)]
enum DictionaryCommand {
    /// Categories and their descriptions, in file order
    Show,
    /// Create an empty dictionary if none exists
    Init,
    /// File a description under a category (created if missing)
    Add { category: String, description: String },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    Init,
    Path,
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config()?;

    match cli.command {
        Command::Classify {
            files,
            source,
            policy,
            dictionary,
            output_dir,
            no_interactive,
            no_remote,
        } => {
            let profile = resolve_source(&cfg, &source)?;
            let store = JsonFileStore::new(match dictionary {
                Some(p) => p,
                None => cfg.dictionary_path()?,
            });
            let options = BatchOptions {
                policy: policy.unwrap_or(cfg.classifier.policy),
                output_dir: output_dir.or_else(|| cfg.output.dir.clone()),
                output_suffix: cfg.output.suffix.clone(),
                category_column: cfg.output.column.clone(),
            };
            let inputs: Vec<BatchInput> = files
                .into_iter()
                .map(|p| BatchInput::new(p, profile.clone()))
                .collect();

            let report = classify(&cfg, &store, options, &inputs, !no_interactive, !no_remote)?;
            print_report(&report);

            if !report.files.is_empty() && report.failed().count() == report.files.len() {
                bail!("no file could be classified");
            }
        }

        Command::Normalize { text } => {
            let normalizer = Normalizer::new(&cfg.normalize).context("compile normalize patterns")?;
            println!("{}", normalizer.normalize(&text.join(" ")));
        }

        Command::Dictionary { command, path } => {
            let store = JsonFileStore::new(match path {
                Some(p) => p,
                None => cfg.dictionary_path()?,
            });
            dictionary_cmd(&cfg, &store, command)?;
        }

        Command::Summary { file, source, column } => {
            let profile = resolve_source(&cfg, &source)?;
            let column = column.unwrap_or_else(|| cfg.output.column.clone());
            let summary = summarize_file(&file, &profile, &column, &cfg.dictionary.fallback)?;
            println!("{} ({} rows)", file.display(), summary.row_count());
            print!("{}", summary.render());
        }

        Command::Suggest {
            description,
            amount,
            raw_category,
        } => {
            suggest_cmd(&cfg, &description, amount, raw_category)?;
        }

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Path => println!("{}", config::config_path()?.display()),
            ConfigCommand::Show => {
                print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
            }
        },

        Command::Sources => {
            for s in cfg.sources() {
                println!(
                    "{:<14} delimiter={:?} description={:?} amount={:?} date={} category={}",
                    s.name,
                    s.delimiter,
                    s.description_column,
                    s.amount_column,
                    s.date_column
                        .as_deref()
                        .map(|c| format!("{c:?} ({})", s.date_format))
                        .unwrap_or_else(|| "-".to_string()),
                    s.category_column.as_deref().unwrap_or("-"),
                );
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn resolve_source(cfg: &Config, name: &str) -> Result<SourceProfile> {
    cfg.source(name)
        .ok_or_else(|| anyhow!("unknown source '{name}' (run: fatura sources)"))
}

fn classify(
    cfg: &Config,
    store: &JsonFileStore,
    options: BatchOptions,
    inputs: &[BatchInput],
    interactive: bool,
    use_remote: bool,
) -> Result<BatchReport> {
    let mut dict = store
        .load_or_empty(&cfg.dictionary.fallback)
        .context("loading dictionary")?;
    let normalizer = Normalizer::new(&cfg.normalize).context("compile normalize patterns")?;

    if !interactive {
        return Ok(BatchRunner::new(&normalizer, options).run(&mut dict, inputs));
    }

    let mut remote = if use_remote && cfg.remote.enabled {
        match RemoteClassifier::from_config(&cfg.remote) {
            Ok(r) => Some(r),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "remote suggestions disabled");
                None
            }
        }
    } else {
        None
    };

    let mut prompter =
        ConsolePrompter::new(io::stdin().lock(), io::stdout(), cfg.dictionary.fallback.clone());
    let mut reconciler = Reconciler::new(&mut prompter, store);
    if let Some(r) = remote.as_mut() {
        reconciler = reconciler.with_suggester(r);
    }

    Ok(BatchRunner::new(&normalizer, options)
        .with_reconciler(reconciler)
        .run(&mut dict, inputs))
}

fn print_report(report: &BatchReport) {
    for f in &report.files {
        let Some(out) = &f.output else {
            if let Some(e) = &f.error {
                eprintln!("FAILED {}: {e}", f.input.display());
            }
            continue;
        };
        println!(
            "\n{} -> {} ({} rows, {} unclassified, {} resolved, {} skipped)",
            f.input.display(),
            out.display(),
            f.rows,
            f.unclassified,
            f.resolved,
            f.skipped.len()
        );
        if let Some(e) = &f.error {
            eprintln!("  written with partial decisions: {e}");
        }
        for s in &f.skipped {
            println!("  skipped line {}: {}", s.line, s.reason);
        }
        if let Some(summary) = &f.summary {
            print!("{}", summary.render());
        }
    }
    if report.aborted {
        println!("\nStopped prompting early; decisions made so far are saved.");
    }
}

fn dictionary_cmd(cfg: &Config, store: &JsonFileStore, command: DictionaryCommand) -> Result<()> {
    let fallback = &cfg.dictionary.fallback;
    match command {
        DictionaryCommand::Show => {
            let dict = store.load(fallback)?;
            println!("{}", store.path().display());
            for e in dict.entries() {
                println!("{} ({})", e.name, e.descriptions.len());
                for d in &e.descriptions {
                    println!("  - {d}");
                }
            }
        }
        DictionaryCommand::Init => {
            if store.exists() {
                println!("Dictionary already exists: {}", store.path().display());
                return Ok(());
            }
            store.save(&CategoryDictionary::new(fallback.clone()))?;
            println!("Wrote {}", store.path().display());
        }
        DictionaryCommand::Add { category, description } => {
            let normalizer = Normalizer::new(&cfg.normalize).context("compile normalize patterns")?;
            let description = normalizer.normalize(&description);
            if description.is_empty() {
                bail!("description is empty after normalization");
            }
            let category = category.trim().to_lowercase();
            if category.is_empty() {
                bail!("category name is empty");
            }

            let mut dict = store.load_or_empty(fallback)?;
            let assignment = dict.assign(&description, &category);
            if assignment.changed() {
                store.save(&dict)?;
            }
            println!("{category}: \"{description}\" ({assignment:?})");
        }
    }
    Ok(())
}

fn suggest_cmd(cfg: &Config, description: &str, amount: f64, raw_category: Option<String>) -> Result<()> {
    let store = JsonFileStore::new(cfg.dictionary_path()?);
    let dict = store.load_or_empty(&cfg.dictionary.fallback)?;
    let normalizer = Normalizer::new(&cfg.normalize).context("compile normalize patterns")?;

    let item = PendingItem {
        description: normalizer.normalize(description),
        occurrences: 1,
        samples: vec![Sample {
            date: None,
            amount,
            raw_category,
            raw_description: description.to_string(),
        }],
    };
    let request = SuggestionRequest::for_item(&dict, &item);

    let mut remote = RemoteClassifier::from_config(&cfg.remote)?;
    let raw = remote.suggest(&request)?;
    match Suggestion::parse(&raw, &dict) {
        Some(s) if s.known => println!("{}", s.category),
        Some(s) => println!("{} (new category)", s.category),
        None => println!("(no answer from {:?} {})", remote.provider(), remote.model()),
    }
    Ok(())
}
