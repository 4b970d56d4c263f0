//! `research` - run the agentic research pipeline from the command line
//!
//! Logs go to stderr; stdout carries only results.

mod config;
mod render;

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use config::CliConfig;
use research_core::{PipelineError, ResearchPipeline, ResearchQuestion};
use research_providers::{ArxivPaperSource, OpenAiReasoner};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Exit code for a rejected question
const EXIT_INVALID_INPUT: u8 = 2;

fn cli() -> Command {
    Command::new("research")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Agentic research assistant over arXiv")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Configuration file (defaults to ./research.toml when present)"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .default_value("text")
                .value_parser(["text", "json"])
                .help("Log output format on stderr"),
        )
        .subcommand(
            Command::new("papers")
                .about("Fetch the top arXiv papers for a question")
                .arg(Arg::new("question").required(true).help("Research question"))
                .arg(
                    Arg::new("max")
                        .long("max")
                        .default_value("5")
                        .value_parser(value_parser!(usize))
                        .help("Number of papers to fetch"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("run")
                .about("Run the research pipeline and print the report")
                .arg(Arg::new("question").required(true).help("Research question"))
                .arg(
                    Arg::new("with-papers")
                        .long("with-papers")
                        .default_value("0")
                        .value_parser(value_parser!(usize))
                        .help("Pre-fetch this many arXiv papers as a shared evidence pool"),
                )
                .arg(
                    Arg::new("max-sub-questions")
                        .long("max-sub-questions")
                        .value_parser(value_parser!(usize))
                        .help("Override the sub-question limit"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output the full run result as JSON"),
                ),
        )
}

fn init_tracing(format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let matches = cli().get_matches();

    let log_format = matches
        .get_one::<String>("log-format")
        .map_or("text", String::as_str);
    init_tracing(log_format);

    let config = CliConfig::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;

    match matches.subcommand() {
        Some(("papers", args)) => papers(args, &config).await,
        Some(("run", args)) => run(args, config).await,
        _ => Ok(ExitCode::FAILURE),
    }
}

/// Exit status for errors reported to the user instead of propagated
fn reported_exit_status(err: &PipelineError) -> Option<u8> {
    match err {
        PipelineError::InvalidInput(_) => Some(EXIT_INVALID_INPUT),
        _ => None,
    }
}

/// Print reportable errors and map them to their exit code
fn exit_with(err: PipelineError) -> anyhow::Result<ExitCode> {
    match reported_exit_status(&err) {
        Some(status) => {
            eprintln!("error: {err}");
            Ok(ExitCode::from(status))
        }
        None => Err(err).context("research run violated an internal contract"),
    }
}

/// Validate the positional question before any provider is built
fn question_arg(args: &ArgMatches) -> anyhow::Result<Result<ResearchQuestion, PipelineError>> {
    let raw = args
        .get_one::<String>("question")
        .context("question is required")?;
    Ok(ResearchQuestion::new(raw))
}

async fn papers(args: &ArgMatches, config: &CliConfig) -> anyhow::Result<ExitCode> {
    let question = match question_arg(args)? {
        Ok(question) => question,
        Err(e) => return exit_with(e),
    };
    let max = args.get_one::<usize>("max").copied().unwrap_or(5);

    let source = ArxivPaperSource::new(config.arxiv.clone())?;
    let papers = source
        .fetch(question.as_str(), max)
        .await
        .context("arXiv search failed")?;

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&papers)?);
    } else {
        print!("{}", render::papers(&papers));
    }
    Ok(ExitCode::SUCCESS)
}

async fn run(args: &ArgMatches, mut config: CliConfig) -> anyhow::Result<ExitCode> {
    let question = match question_arg(args)? {
        Ok(question) => question,
        Err(e) => return exit_with(e),
    };
    if let Some(max) = args.get_one::<usize>("max-sub-questions") {
        config.pipeline = config.pipeline.with_max_sub_questions(*max);
    }
    let prefetch = args.get_one::<usize>("with-papers").copied().unwrap_or(0);

    let papers = Arc::new(ArxivPaperSource::new(config.arxiv.clone())?);
    let reasoner = Arc::new(
        OpenAiReasoner::new(config.reasoner.clone()).context("reasoner configuration")?,
    );

    let pool = if prefetch > 0 {
        // A failed pre-fetch only shrinks the evidence available
        match papers.fetch(question.as_str(), prefetch).await {
            Ok(pool) => pool,
            Err(e) => {
                tracing::warn!(error = %e, "Evidence pool pre-fetch failed, continuing without it");
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    let pipeline = ResearchPipeline::new(reasoner, papers, config.pipeline)
        .context("invalid pipeline configuration")?;

    let result = match pipeline.run_with_pool(question.as_str(), pool).await {
        Ok(result) => result,
        Err(e) => return exit_with(e),
    };

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render::report(&result));
    }
    Ok(ExitCode::SUCCESS)
}
