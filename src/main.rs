use anyhow::Context;
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use browser_vision::batch::{BatchCoordinator, Datastore, JsonDatastore, compose_task};
use browser_vision::config::{self, ENV_ARTIFACT_DIR, ENV_CAPTURE_INTERVAL_MS};
use browser_vision::engine::{
    Agent, AgentScript, AutomationEngine, CommandAgent, CommandEngine, MockEngine, ScriptedAgent,
};
use browser_vision::logging;
use browser_vision::orchestrator::{RunOrchestrator, RunResponse, RunResult};

/// Browser Vision - visually recorded browser-automation test runs
#[derive(Parser, Debug)]
#[command(
    name = "browser-vision",
    about = "Run browser-automation tests with timelapse capture and PDF reports",
    after_help = "ENVIRONMENT VARIABLES:\n\
        BROWSER_VISION_ARTIFACT_DIR        Root directory for run artifacts\n\
        BROWSER_VISION_PUBLIC_PREFIX       URL prefix artifacts are served under\n\
        BROWSER_VISION_CAPTURE_INTERVAL_MS Delay between frame captures (ms)\n\
        BROWSER_VISION_AGENT_TIMEOUT       Agent timeout in seconds (0 = none)\n\
        BROWSER_VISION_LOGIN_URL           Login page used by composed tasks\n\
        BROWSER_VISION_LOGIN_MARKER        Text confirming a successful login\n\
        BROWSER_VISION_AGENT_CMD           Agent program and arguments\n\
        BROWSER_VISION_SCREENSHOT_CMD      Screenshot command ({path} is replaced)\n\
        BROWSER_VISION_BROWSER_CMD         Browser launcher kept alive per session\n\
        RUST_LOG                           Log filter (logs go to stderr)"
)]
struct Args {
    /// Root directory for run artifacts
    #[arg(long, global = true, env = ENV_ARTIFACT_DIR)]
    artifact_dir: Option<PathBuf>,

    /// Delay between frame captures in milliseconds
    #[arg(long, global = true, env = ENV_CAPTURE_INTERVAL_MS)]
    interval_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in as a user and run a free-form test prompt
    Run {
        /// Actions to perform after login
        #[arg(short, long)]
        prompt: String,

        /// Login email
        #[arg(short, long)]
        username: String,

        /// Login password
        #[arg(long, env = "BROWSER_VISION_PASSWORD", hide_env_values = true)]
        password: String,

        /// Output the response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run stored test cases one after another
    Batch {
        /// JSON datastore holding identities and test cases
        #[arg(short, long)]
        store: PathBuf,

        /// JSON object mapping case ids to passwords
        #[arg(short, long)]
        credentials: PathBuf,

        /// Comma-separated case ids (default: every stored case)
        #[arg(long, value_delimiter = ',')]
        cases: Vec<String>,
    },

    /// Run against the mock engine with a scripted agent
    Demo {
        /// How long the scripted agent works before replying (ms)
        #[arg(long, default_value = "3000")]
        agent_delay_ms: u64,

        /// Make the scripted agent fail instead of reply
        #[arg(long)]
        fail: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    logging::init(logging::DEFAULT_FILTER);
    let args = Args::parse();

    let mut settings = config::get().run.clone();
    if let Some(dir) = args.artifact_dir {
        settings = settings.artifact_dir(dir);
    }
    if let Some(ms) = args.interval_ms {
        settings = settings.capture_interval(Duration::from_millis(ms));
    }

    match args.command {
        Commands::Run {
            prompt,
            username,
            password,
            json,
        } => {
            let task = compose_task(&config::get().scenario, &username, &password, &prompt);
            let orchestrator = RunOrchestrator::new(command_engine(), command_agent(), settings.clone());

            match orchestrator.run(&task).await {
                Ok(result) => {
                    let response = result.to_response(&settings.artifact_dir, &settings.public_prefix);
                    if json {
                        println!("{}", serde_json::to_string_pretty(&response)?);
                    } else {
                        print_result(&result, &response);
                    }
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&RunResponse::error(e.to_string()))?);
                    } else {
                        eprintln!("Run failed: {}", e);
                    }
                    Ok(ExitCode::FAILURE)
                }
            }
        }

        Commands::Batch {
            store,
            credentials,
            cases,
        } => {
            let datastore = Arc::new(
                JsonDatastore::open(&store)
                    .with_context(|| format!("failed to open datastore {}", store.display()))?,
            );
            let credentials: HashMap<String, String> = serde_json::from_slice(
                &std::fs::read(&credentials)
                    .with_context(|| format!("failed to read credentials {}", credentials.display()))?,
            )
            .context("credentials must be a JSON object of case id to password")?;

            let case_ids = if cases.is_empty() {
                datastore.snapshot().await.cases.into_iter().map(|c| c.id).collect()
            } else {
                cases
            };
            info!(cases = case_ids.len(), store = %store.display(), "starting batch");

            let orchestrator = RunOrchestrator::new(command_engine(), command_agent(), settings);
            let store: Arc<dyn Datastore> = datastore;
            let coordinator =
                BatchCoordinator::with_orchestrator(orchestrator, store, config::get().scenario.clone());
            let batch = coordinator.run_batch(&case_ids, &credentials).await;

            println!("{}", serde_json::to_string_pretty(&batch.to_response())?);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Demo {
            agent_delay_ms,
            fail,
        } => {
            let delay = Duration::from_millis(agent_delay_ms);
            let script = if fail {
                AgentScript::Fail {
                    message: "demo agent gave up".to_string(),
                    delay,
                }
            } else {
                AgentScript::Reply {
                    output: DEMO_OUTPUT.to_string(),
                    delay,
                }
            };
            let engine: Arc<dyn AutomationEngine> = Arc::new(MockEngine::default());
            let agent: Arc<dyn Agent> = Arc::new(ScriptedAgent::new([script]));
            let orchestrator = RunOrchestrator::new(engine, agent, settings.clone());

            let result = orchestrator.run("demo").await?;
            let response = result.to_response(&settings.artifact_dir, &settings.public_prefix);
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

const DEMO_OUTPUT: &str = r#"{
  "steps": [
    {"action": "navigate", "description": "Opened the login page"},
    {"action": "login", "description": "Signed in and saw the Courses tab"}
  ],
  "final_text": "Logged in successfully",
  "status": "success"
}"#;

fn command_engine() -> Arc<dyn AutomationEngine> {
    Arc::new(CommandEngine::from_settings(&config::get().commands))
}

fn command_agent() -> Arc<dyn Agent> {
    Arc::new(CommandAgent::new(config::get().commands.agent.clone()))
}

fn print_result(result: &RunResult, response: &RunResponse) {
    println!("Run {} finished: {}", result.run_id, result.status);
    println!("  Frames: {}", result.frame_count);
    for (i, step) in result.steps.iter().enumerate() {
        println!("  {}. {}: {}", i + 1, step.action, step.description);
    }
    println!("  Result: {}", result.text);
    if let Some(url) = &response.gif_url {
        println!("  Timelapse: {}", url);
    }
    if let Some(url) = &response.pdf_url {
        println!("  Report: {}", url);
    }
}
