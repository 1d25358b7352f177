use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use workforge::artifact::ParseOptions;
use workforge::config::{Config, RepoConfig};
use workforge::extract::{extract, FindingSeverity};
use workforge::pipeline::{Pipeline, ProcessOutcome, ServiceCache};
use workforge::prompt::assemble;
use workforge::record::{enrich, RawRecord};
use workforge::tracker::TrackerClient;

#[derive(Parser, Debug)]
#[command(
    name = "workforge",
    about = "Turn work-tracker items into generated code change bundles",
    version
)]
struct Args {
    /// Work item id to fetch from the configured tracker
    #[arg(short, long, conflicts_with = "record_file")]
    id: Option<u64>,

    /// Process a record from a local JSON file instead of the tracker
    #[arg(short, long)]
    record_file: Option<PathBuf>,

    /// Repository root holding workforge.toml (defaults to current directory)
    #[arg(long, default_value = ".")]
    repo: PathBuf,

    /// Print the assembled prompt and validation findings, then exit
    #[arg(long)]
    dry_run: bool,

    /// Skip the advisory path-safety warnings
    #[arg(long)]
    no_path_checks: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load();
    let repo = RepoConfig::load(&args.repo)?;

    let raw = load_record(&args, &config).await?;

    if args.dry_run {
        return dry_run(&raw, &repo);
    }

    let options = ParseOptions {
        check_paths: !args.no_path_checks,
        ..Default::default()
    };
    let cache = ServiceCache::new();
    let pipeline = Pipeline::new(&config, &repo, &cache).with_options(options);

    match pipeline.process(&raw).await? {
        ProcessOutcome::Completed {
            branch,
            bundle,
            findings,
            warnings,
            usage,
        } => {
            print_findings(&findings);
            for warning in &warnings {
                eprintln!("  Warning: {}", warning);
            }
            if let Some(usage) = usage {
                eprintln!("  Tokens: {} in / {} out", usage.prompt_tokens, usage.completion_tokens);
            }
            eprintln!(
                "  + Generated {} file(s) for branch '{}'",
                bundle.file_count(),
                branch
            );
            println!("{}", serde_json::to_string_pretty(&bundle)?);
            Ok(())
        }
        ProcessOutcome::ValidationBlocked { findings } => {
            print_findings(&findings);
            Err(anyhow!("validation errors blocked prompt assembly"))
        }
        ProcessOutcome::InvocationFailed { failure, findings } => {
            print_findings(&findings);
            Err(anyhow!(
                "generation failed after {} attempt(s): {}",
                failure.attempts,
                failure.source
            ))
        }
        ProcessOutcome::ParseFailed { errors, warnings, .. } => {
            for warning in &warnings {
                eprintln!("  Warning: {}", warning);
            }
            for error in &errors {
                eprintln!("  Error: {}", error);
            }
            Err(anyhow!("generation reply could not be parsed"))
        }
    }
}

async fn load_record(args: &Args, config: &Config) -> Result<RawRecord> {
    if let Some(path) = &args.record_file {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse record from {}", path.display()));
    }

    let id = args
        .id
        .ok_or_else(|| anyhow!("Provide --id or --record-file"))?;
    let base_url = config
        .tracker_url
        .as_deref()
        .ok_or_else(|| anyhow!("tracker_url is not configured"))?;
    let token = config
        .tracker_token()
        .ok_or_else(|| anyhow!("tracker token is not configured"))?;

    let client = TrackerClient::new(base_url, &token);
    let record = client
        .fetch_record(id, &config.retry.policy())
        .await
        .map_err(|failure| anyhow!("{}", failure))?;
    Ok(record)
}

fn dry_run(raw: &RawRecord, repo: &RepoConfig) -> Result<()> {
    let record = enrich(raw)?;
    let (fields, findings) = extract(&record);
    print_findings(&findings);
    let prompt = assemble(&record, &fields, repo);
    println!("{}", prompt.render());
    Ok(())
}

fn print_findings(findings: &[workforge::extract::ValidationFinding]) {
    for finding in findings {
        let tag = match finding.severity {
            FindingSeverity::Error => "Error",
            FindingSeverity::Warning => "Warning",
            FindingSeverity::Info => "Info",
        };
        eprintln!("  {}: {}: {}", tag, finding.field, finding.message);
    }
}
