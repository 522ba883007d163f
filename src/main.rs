use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

use forkcast_tester::cleanup::{self, postgrest, CleanupBackend, FilterSpec, PatternFilter};
use forkcast_tester::utils::config::{Config, Overrides, BASE_URL_ENV};
use forkcast_tester::{report, runner};

#[derive(Parser)]
#[command(name = "forkcast-tester")]
#[command(version = "0.1.0")]
#[command(about = "Conformance tests for the Forkcast meal-planning API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a suite file or every suite in a directory
    Run {
        /// Path to suite file or directory
        path: PathBuf,

        /// API base URL, e.g. http://localhost:3000/api
        #[arg(long, env = BASE_URL_ENV)]
        base_url: Option<String>,

        /// Per-request timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Variable available as ${KEY}. Can be specified multiple times.
        #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        vars: Vec<(String, String)>,

        /// Output directory for reports
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        /// Write results.json and junit.xml
        #[arg(long, default_value = "false")]
        report: bool,

        /// Filter suites by tags (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        tags: Option<Vec<String>>,
    },

    /// Generate report from saved results
    Report {
        /// Path to results.json
        results: PathBuf,

        /// Output format (json, junit, text)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Remove test data through the REST API
    Cleanup {
        /// API base URL
        #[arg(long, env = BASE_URL_ENV)]
        base_url: String,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Remove test data directly from the database
    DbCleanup {
        /// Database URL
        #[arg(long, env = postgrest::URL_ENV)]
        url: String,

        /// Service role key
        #[arg(long, env = postgrest::SERVICE_KEY_ENV, hide_env_values = true)]
        service_key: String,

        #[command(flatten)]
        filter: FilterArgs,
    },
}

#[derive(Args)]
struct FilterArgs {
    /// YAML file with denyUsernames, allowUsernames and titleKeywords
    #[arg(long)]
    filter: Option<PathBuf>,

    /// Username regex marking test accounts (matched from the start)
    #[arg(long)]
    deny: Vec<String>,

    /// Username regex that is never cleaned up
    #[arg(long)]
    allow: Vec<String>,

    /// Case-insensitive meal title keyword marking test content
    #[arg(long = "title-keyword")]
    title_keywords: Vec<String>,

    /// Report what would be deleted without deleting
    #[arg(long, default_value = "false")]
    dry_run: bool,
}

impl FilterArgs {
    fn build(&self) -> anyhow::Result<PatternFilter> {
        let mut spec = match &self.filter {
            Some(path) => FilterSpec::load(path)?,
            None => FilterSpec::default(),
        };
        spec.extend(&self.deny, &self.allow, &self.title_keywords);
        PatternFilter::new(&spec)
    }
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(e) = ctrlc::set_handler(|| {
        println!("\n{} Interrupted", "⏹️ ".yellow());
        std::process::exit(1);
    }) {
        log::warn!("could not install Ctrl+C handler: {}", e);
    }

    match run(Cli::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// Execute a command; `Ok(false)` means it ran but did not succeed
async fn run(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Commands::Run {
            path,
            base_url,
            timeout_ms,
            vars,
            output,
            report,
            tags,
        } => {
            println!(
                "{} Running suites from: {}",
                "▶".green().bold(),
                path.display()
            );
            if let Some(ref url) = base_url {
                println!("  Base URL: {}", url.cyan());
            }
            if let Some(ref tags_list) = tags {
                println!("  Tags: {}", tags_list.join(", ").yellow());
            }
            if report {
                println!("  Reports: {}", output.display().to_string().cyan());
            }

            let options = runner::RunOptions {
                overrides: Overrides {
                    base_url,
                    timeout_ms,
                    output_dir: Some(output),
                    write_reports: report,
                },
                vars: vars.into_iter().collect::<HashMap<_, _>>(),
                tags,
            };
            let summary = runner::run_tests(&path, &options).await?;
            Ok(summary.success())
        }

        Commands::Report {
            results,
            format,
            output,
        } => {
            report::generate_report(&results, &format, output.as_deref())?;
            Ok(true)
        }

        Commands::Cleanup { base_url, filter } => {
            let predicate = filter.build()?;
            let client = Config::default().build_client()?;
            let backend = cleanup::ApiBackend::connect(client, &base_url).await?;
            run_cleanup(&backend, &predicate, filter.dry_run).await
        }

        Commands::DbCleanup {
            url,
            service_key,
            filter,
        } => {
            let predicate = filter.build()?;
            let client = Config::default().build_client()?;
            let backend = cleanup::PostgrestBackend::new(client, &url, &service_key)?;
            run_cleanup(&backend, &predicate, filter.dry_run).await
        }
    }
}

async fn run_cleanup(
    backend: &dyn CleanupBackend,
    filter: &PatternFilter,
    dry_run: bool,
) -> anyhow::Result<bool> {
    println!(
        "{} Cleaning test data via {}{}",
        "🧹".to_string().blue(),
        backend.describe().cyan(),
        if dry_run { " (dry run)" } else { "" }
    );

    let report = cleanup::run_cleanup(backend, filter, dry_run).await?;
    print!("{}", cleanup::render_report(&report));

    if report.success() {
        println!("{}", "✅ No test data remaining".green());
    } else {
        println!(
            "{}",
            format!("⚠️ {} test items remaining", report.remaining).yellow()
        );
    }
    Ok(report.success())
}
