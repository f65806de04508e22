use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use lumi_acceptance::driver::web::{BrowserType, WebDriver, WebDriverConfig};
use lumi_acceptance::driver::DeviceProfile;
use lumi_acceptance::invocation::{InvocationRequest, Invoker};
use lumi_acceptance::report::{
    json, HttpReportService, LocalReportService, ReportScope, ReportService, ReportStatus,
};
use lumi_acceptance::runner::{
    ConsoleEventListener, Deadline, ExecutionEnvironment, ScreenshotDiffEngine, SuiteCatalog,
    SuiteScheduler, SuiteSource, TimeBudget, Unbounded,
};
use lumi_acceptance::server::{self, AppState, ServerConfig};
use lumi_acceptance::utils::config::{ConfigOverride, RunnerConfig};
use lumi_acceptance::utils::otp;

#[derive(Parser)]
#[command(name = "lumi-acceptance")]
#[command(version = "0.1.0")]
#[command(about = "Resumable browser acceptance-test runner", long_about = None)]
struct Cli {
    /// Config file; searched upwards from the current directory when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start or resume a run
    Run {
        /// Run only this suite, against a new report
        #[arg(short, long)]
        suite: Option<String>,

        /// Report to resume
        #[arg(long)]
        report_id: Option<String>,

        /// Remaining suites of an interrupted run (comma-separated)
        #[arg(long, value_delimiter = ',')]
        next_suites: Option<Vec<String>>,

        /// Invocation token, required in live mode
        #[arg(long)]
        token: Option<String>,

        /// Suspend once this many seconds have passed
        #[arg(long)]
        max_seconds: Option<u64>,

        /// Write the outcome JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long)]
        base_url: Option<String>,

        #[arg(long)]
        digital_product: Option<String>,

        /// Report environment name
        #[arg(long)]
        environment: Option<String>,

        /// Default action timeout (ms)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Serve the invocation endpoint
    Serve {
        #[arg(long, default_value = "9333")]
        port: u16,

        /// Wall-clock limit per invocation
        #[arg(long)]
        max_seconds: Option<u64>,
    },

    /// One-time passwords for test accounts
    Otp {
        #[command(subcommand)]
        command: OtpCommands,
    },

    /// List supported device profiles
    Devices,

    /// List suites available to the configured runner
    Suites,
}

#[derive(Subcommand)]
enum OtpCommands {
    /// Print the current token
    Generate,
    /// Check a token against the current time step
    Verify { token: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            suite,
            report_id,
            next_suites,
            token,
            max_seconds,
            output,
            base_url,
            digital_product,
            environment,
            timeout,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let overrides = ConfigOverride {
                digital_product,
                environment,
                base_url,
                timeout,
                suites_list: None,
            };

            println!(
                "{} Running against: {}",
                "▶".green().bold(),
                overrides.base_url.as_deref().unwrap_or(&config.base_url).cyan()
            );
            if let Some(ref s) = suite {
                println!("  Suite: {}", s.cyan());
            }
            if let Some(ref id) = report_id {
                println!("  Resuming report: {}", id.yellow());
            }

            // The token is checked before the browser starts
            let environment = ExecutionEnvironment::from_env();
            log::info!("Execution environment: {:?}", environment);
            let Some(invoker) =
                Invoker::build_authorized(config, environment, token.as_deref(), |config| {
                    build_scheduler(config, environment)
                })
                .await?
            else {
                eprintln!("{} Unauthorized", "✗".red());
                std::process::exit(2);
            };
            let listener = tokio::spawn(ConsoleEventListener::listen(
                invoker.scheduler().events().subscribe(),
            ));

            let budget: Box<dyn TimeBudget> = match max_seconds {
                Some(secs) => Box::new(Deadline::from_remaining(
                    Duration::from_secs(secs),
                    Duration::ZERO,
                )),
                None => Box::new(Unbounded),
            };

            let response = match suite {
                Some(name) => {
                    invoker
                        .handle_single(&name, token.as_deref(), Some(&overrides), budget.as_ref())
                        .await?
                }
                None => {
                    let request = InvocationRequest {
                        report_id,
                        token,
                        next_suites,
                    };
                    invoker
                        .handle(request, Some(&overrides), budget.as_ref())
                        .await?
                }
            };

            // Closing the event channel lets the listener drain and exit
            drop(invoker);
            let _ = listener.await;

            let Some(outcome) = response.outcome else {
                eprintln!("{} {}", "✗".red(), response.message.unwrap_or_default());
                std::process::exit(2);
            };
            json::write_outcome(&outcome, output.as_deref())?;
            if outcome.status() == ReportStatus::Failed {
                std::process::exit(1);
            }
        }

        Commands::Serve { port, max_seconds } => {
            let config = load_config(cli.config.as_deref())?;
            let environment = ExecutionEnvironment::from_env();
            log::info!("Execution environment: {:?}", environment);
            let scheduler = build_scheduler(config.clone(), environment).await?;
            let invoker = Invoker::new(config, environment, scheduler);
            let max_run = max_seconds.map(Duration::from_secs);
            let state = Arc::new(AppState::new(invoker, max_run));

            println!("\n{} Runner listening", "🔍".to_string().blue());
            println!("   Open: http://localhost:{}/run", port);
            println!("\n   Press Ctrl+C to stop.\n");
            server::serve(state, &ServerConfig { port, max_run }).await?;
        }

        Commands::Otp { command } => match command {
            OtpCommands::Generate => {
                println!("{}", otp::generate_token()?);
            }
            OtpCommands::Verify { token } => {
                if otp::verify_token(&token)? {
                    println!("{} Token is valid", "✓".green());
                } else {
                    println!("{} Token is not valid for the current time step", "✗".red());
                    std::process::exit(1);
                }
            }
        },

        Commands::Devices => {
            for profile in DeviceProfile::ALL {
                let d = profile.descriptor();
                println!(
                    "  {:<10} {}x{} @{}x{}",
                    profile.name().cyan(),
                    d.width,
                    d.height,
                    d.scale_factor,
                    if d.is_mobile { " (mobile)" } else { "" }
                );
            }
        }

        Commands::Suites => {
            let config = load_config(cli.config.as_deref())?;
            let catalog = SuiteCatalog::new().with_dir(config.suites_path());
            let queued = &config.suites_list;
            for name in catalog.available() {
                let mark = if queued.contains(&name) {
                    "•".green()
                } else {
                    " ".normal()
                };
                println!("  {} {}", mark, name);
            }
            for name in queued {
                if catalog.load(name).is_err() {
                    println!("  {} {} (listed in config, not found)", "✗".red(), name);
                }
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RunnerConfig> {
    let config = match path {
        Some(p) => RunnerConfig::load(p)?,
        None => RunnerConfig::discover(&std::env::current_dir()?)?,
    };
    Ok(config)
}

/// Wire browser, report collaborator and suites for `config`
async fn build_scheduler(
    config: RunnerConfig,
    environment: ExecutionEnvironment,
) -> anyhow::Result<SuiteScheduler> {
    let reports: Arc<dyn ReportService> = match &config.report_api_url {
        Some(url) => {
            let scope = ReportScope::from(&config.upload_model(None, Vec::new()));
            Arc::new(HttpReportService::new(url, config.report_api_key.clone(), scope)?)
        }
        None => {
            log::info!("No report API configured; writing reports to {}", config.output_path().display());
            Arc::new(LocalReportService::new(config.output_path()))
        }
    };

    let web_config = WebDriverConfig {
        browser_type: config
            .browser
            .as_deref()
            .map(BrowserType::from_name)
            .unwrap_or_default(),
        headless: config.headless(),
        ..WebDriverConfig::default()
    };
    let driver = Arc::new(WebDriver::new(web_config).await?);

    let catalog = SuiteCatalog::new().with_dir(config.suites_path());
    Ok(SuiteScheduler::new(
        Arc::new(catalog),
        reports.clone(),
        driver,
        ScreenshotDiffEngine::new(environment, reports),
        config.timeout,
    ))
}
