use anyhow::{bail, Context, Result};
use chatops_e2e::{scenarios, E2eConfig, SlackTransport, SuiteRunner};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "chatops-e2e",
    about = "Drive a chatops bot through Slack and verify its replies",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Run scenarios against a live workspace.
    Run(RunArgs),
    /// Print the scenario catalogue.
    List,
}

#[derive(Debug, clap::Args)]
struct RunArgs {
    #[command(flatten)]
    config: E2eConfig,

    #[arg(
        long = "scenario",
        help = "Only run the named scenario; repeat to select several"
    )]
    scenarios: Vec<String>,

    #[arg(long, value_enum, default_value_t = CliReportFormat::Text)]
    report: CliReportFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CliReportFormat {
    Text,
    Json,
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        CliCommand::List => {
            for scenario in scenarios::catalog() {
                println!("{}\t{}", scenario.name, scenario.command);
            }
            Ok(())
        }
        CliCommand::Run(args) => {
            init_tracing();
            run(args).await
        }
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let selected = scenarios::select(&args.scenarios).map_err(anyhow::Error::msg)?;
    let transport = SlackTransport::from_config(&args.config)?;
    let mut runner = SuiteRunner::new(transport, args.config.suite_settings());

    let report = runner.run_all(&selected).await?;
    match args.report {
        CliReportFormat::Text => println!("{}", report.render_text()),
        CliReportFormat::Json => println!(
            "{}",
            report
                .render_json()
                .context("failed to render suite report")?
        ),
    }

    if !report.is_success() {
        bail!(
            "{} of {} scenario(s) did not pass",
            report.outcomes.len() - report.passed_count(),
            report.outcomes.len()
        );
    }
    Ok(())
}
