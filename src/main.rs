use clap::{Parser, Subcommand};
use devicefarm_runner::runner::{
    CleanupArgs, Failure, RunArgs, SettingsSource, run_cleanup, run_tests,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser, Clone)]
#[command(about = "Schedule Device Farm test runs and collect their results")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Subcommand)]
enum Command {
    /// Resolve, upload, schedule and wait for a test run
    Run {
        /// Path to the run settings JSON document
        #[arg(
            long,
            required_unless_present = "run_settings_json",
            conflicts_with = "run_settings_json"
        )]
        run_settings: Option<PathBuf>,

        /// Run settings JSON given inline
        #[arg(long)]
        run_settings_json: Option<String>,

        /// Override the run name from the settings document
        #[arg(long)]
        run_name: Option<String>,

        /// Comma-separated artifact types to download, or ALL
        #[arg(long, default_value = "")]
        artifact_types: String,

        /// Milliseconds between upload status checks
        #[arg(long, default_value = "1000")]
        upload_poll_interval: u64,

        /// Milliseconds between run status checks
        #[arg(long, default_value = "30000")]
        run_poll_interval: u64,

        /// Prefix for upload names (defaults to a random UUID)
        #[arg(long, env = "GITHUB_RUN_ID")]
        invocation_id: Option<String>,

        /// AWS region of the Device Farm project
        #[arg(short, long, env = "AWS_REGION", default_value = "us-west-2")]
        region: String,

        /// Directory the artifact folder is created in
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// File that records what cleanup needs to find
        #[arg(long, default_value = ".devicefarm-runner-state.json")]
        state_file: PathBuf,

        /// Quiet mode - minimal output, only show outputs
        #[arg(short, long)]
        quiet: bool,
    },
    /// Delete unfinished uploads and artifacts left by an interrupted run
    Cleanup {
        /// AWS region of the Device Farm project
        #[arg(short, long, env = "AWS_REGION", default_value = "us-west-2")]
        region: String,

        /// State file written by the run
        #[arg(long, default_value = ".devicefarm-runner-state.json")]
        state_file: PathBuf,

        /// Quiet mode - warnings and errors only
        #[arg(short, long)]
        quiet: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    match args.command {
        Command::Run {
            run_settings,
            run_settings_json,
            run_name,
            artifact_types,
            upload_poll_interval,
            run_poll_interval,
            invocation_id,
            region,
            output_dir,
            state_file,
            quiet,
        } => {
            cli::init_tracing(quiet);

            let settings = match (run_settings, run_settings_json) {
                (Some(path), _) => SettingsSource::File(path),
                (None, Some(json)) => SettingsSource::Json(json),
                (None, None) => {
                    anyhow::bail!("Either --run-settings or --run-settings-json is required")
                }
            };

            let run_args = RunArgs {
                settings,
                run_name,
                artifact_types,
                upload_poll_interval: Duration::from_millis(upload_poll_interval),
                run_poll_interval: Duration::from_millis(run_poll_interval),
                invocation_id: invocation_id.unwrap_or_else(cli::random_invocation_id),
                region,
                output_dir,
                state_file,
                quiet,
            };

            let report = run_tests(run_args).await?;

            if let Some(outputs) = &report.outputs {
                println!("arn={}", outputs.arn);
                println!("status={}", outputs.status);
                println!("result={}", outputs.result.as_deref().unwrap_or_default());
                println!("artifact-folder={}", outputs.artifact_folder.display());
                println!("console-url={}", outputs.console_url);
            }

            match &report.failure {
                None => Ok(ExitCode::SUCCESS),
                Some(Failure::RunResult(result)) => {
                    eprintln!("Run result: {}", result);
                    Ok(ExitCode::FAILURE)
                }
                Some(Failure::Error(message)) => {
                    eprintln!("Error: {}", message);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Cleanup {
            region,
            state_file,
            quiet,
        } => {
            cli::init_tracing(quiet);

            match run_cleanup(CleanupArgs { region, state_file }).await {
                Ok(summary) => {
                    if !quiet {
                        println!("Deleted uploads: {}", summary.deleted_uploads.len());
                        if let Some(folder) = summary.removed_folder {
                            println!("Removed folder: {}", folder);
                        }
                    }
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("Error: {:#}", e);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

/// CLI helpers
mod cli {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    /// Install the global subscriber; quiet mode keeps warnings and errors only
    pub fn init_tracing(quiet: bool) {
        let filter = if quiet {
            EnvFilter::new("devicefarm_runner=warn,aws_config=off,aws_smithy_runtime=off")
        } else {
            EnvFilter::new("devicefarm_runner=info,aws_config=warn,aws_smithy_runtime=warn")
        };
        let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    pub fn random_invocation_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}
