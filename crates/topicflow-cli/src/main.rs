//! topicflow - onboard a Kafka topic across the pipeline repositories
//!
//! ## Commands
//!
//! - `run`: open one PR per applicable repository, then notify the team
//! - `plan`: show the derived table name and the steps a run would take
//!
//! Every option can also be set through the environment variable shown in
//! `--help`; command-line values win.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, Level};

use topicflow_core::{
    plan_run, run_stamp, CommandMutation, DagTrigger, GitCli, Notifier, Orchestrator, RawTopicInput,
    RepoTarget, RepositorySet, RunPlan, RunResult, StandardMutations, StepCatalog, StepExecutor,
    StepStatus, TopicConfig, TopicMutation, TracingNotifier,
};
use topicflow_hosting::{
    GitHubConfig, GitHubPrHost, SlackConfig, SlackWebhookNotifier, DEFAULT_API_BASE,
    DEFAULT_CLONE_BASE,
};

#[derive(Parser)]
#[command(name = "topicflow")]
#[command(author = "Data Platform")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Onboard a Kafka topic: one PR per pipeline repository, in parallel", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mutate every applicable repository, open PRs and send the notification
    Run(RunArgs),

    /// Show what `run` would do without touching any repository
    Plan(PlanArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Args, Debug)]
struct TopicArgs {
    /// Kafka topic name, e.g. customer.action.v1
    #[arg(long, env = "TOPIC")]
    topic: Option<String>,

    /// Message value encoding: json or protobuf [default: json]
    #[arg(long, env = "VALUE_TYPE")]
    value_type: Option<String>,

    /// Sink type: realtime or s3 [default: realtime]
    #[arg(long, env = "SINK_TYPE")]
    sink_type: Option<String>,
}

impl TopicArgs {
    fn raw(&self) -> RawTopicInput {
        RawTopicInput {
            topic: self.topic.clone(),
            value_type: self.value_type.clone(),
            sink_type: self.sink_type.clone(),
        }
    }
}

#[derive(Args, Debug)]
struct RepoArgs {
    /// helm-apps repository (org/name)
    #[arg(long, env = "HELM_APPS_REPO")]
    helm_apps_repo: String,

    /// data-airflow repository (org/name)
    #[arg(long, env = "DATA_AIRFLOW_REPO")]
    data_airflow_repo: String,

    /// dbt repository (org/name)
    #[arg(long, env = "DBT_REPO")]
    dbt_repo: String,

    /// Base branch for helm-apps PRs
    #[arg(long, env = "HELM_BRANCH", default_value = "master")]
    helm_branch: String,

    /// Base branch for data-airflow PRs
    #[arg(long, env = "AIRFLOW_BRANCH", default_value = "develop")]
    airflow_branch: String,

    /// Base branch for dbt PRs
    #[arg(long, env = "DBT_BRANCH", default_value = "master")]
    dbt_branch: String,
}

impl RepoArgs {
    fn repository_set(&self) -> Result<RepositorySet> {
        let repos = RepositorySet {
            helm_apps: RepoTarget::new(&self.helm_apps_repo, &self.helm_branch),
            data_airflow: RepoTarget::new(&self.data_airflow_repo, &self.airflow_branch),
            dbt: RepoTarget::new(&self.dbt_repo, &self.dbt_branch),
        };
        repos.validate().context("Invalid repository configuration")?;
        Ok(repos)
    }
}

#[derive(Args, Debug)]
struct MutationArgs {
    /// Command that adds the topic to the helm-apps checkout
    #[arg(long, env = "HELM_APPS_MUTATE_CMD")]
    helm_apps_mutate_cmd: Option<String>,

    /// Command that adds the stream config to the data-airflow checkout
    #[arg(long, env = "DATA_AIRFLOW_MUTATE_CMD")]
    data_airflow_mutate_cmd: Option<String>,

    /// Command that adds the S3 external source to the dbt checkout
    #[arg(long, env = "DBT_MUTATE_CMD")]
    dbt_mutate_cmd: Option<String>,

    /// Command that adds the realtime extraction model to the dbt checkout
    #[arg(long, env = "DBT_REALTIME_MUTATE_CMD")]
    dbt_realtime_mutate_cmd: Option<String>,

    /// Per-command timeout for mutation commands and git, in seconds
    #[arg(long, env = "MUTATE_TIMEOUT_SECS", default_value = "300")]
    command_timeout_secs: u64,
}

impl MutationArgs {
    fn timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    fn command(&self, template: Option<&String>) -> Arc<dyn TopicMutation> {
        let template = template.cloned().unwrap_or_default();
        Arc::new(CommandMutation::new(template).with_timeout(self.timeout()))
    }

    fn standard(&self) -> StandardMutations {
        StandardMutations {
            helm_apps: self.command(self.helm_apps_mutate_cmd.as_ref()),
            data_airflow: self.command(self.data_airflow_mutate_cmd.as_ref()),
            dbt_s3: self.command(self.dbt_mutate_cmd.as_ref()),
            dbt_realtime: self.command(self.dbt_realtime_mutate_cmd.as_ref()),
        }
    }

    fn configured(&self, step: &str) -> bool {
        let cmd = match step {
            topicflow_core::steps::HELM_APPS_STEP => &self.helm_apps_mutate_cmd,
            topicflow_core::steps::DATA_AIRFLOW_STEP => &self.data_airflow_mutate_cmd,
            topicflow_core::steps::DBT_STEP => &self.dbt_mutate_cmd,
            topicflow_core::steps::DBT_REALTIME_STEP => &self.dbt_realtime_mutate_cmd,
            _ => return false,
        };
        cmd.as_deref().is_some_and(|c| !c.trim().is_empty())
    }
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    topic: TopicArgs,

    #[command(flatten)]
    repos: RepoArgs,

    #[command(flatten)]
    mutations: MutationArgs,

    /// GitHub token used for cloning, pushing and opening PRs
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: String,

    /// GitHub REST API root
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_BASE)]
    github_api_url: String,

    /// Root for HTTPS clone URLs
    #[arg(long, env = "GITHUB_SERVER_URL", default_value = DEFAULT_CLONE_BASE)]
    github_server_url: String,

    /// Slack incoming webhook; without it the summary is only logged
    #[arg(long, env = "SLACK_WEBHOOK", hide_env_values = true)]
    slack_webhook: Option<String>,

    /// Airflow base URL for the manual trigger link
    #[arg(long, env = "AIRFLOW_URL")]
    airflow_url: Option<String>,

    /// Airflow DAG id for the manual trigger link
    #[arg(long, env = "AIRFLOW_DAG_ID")]
    airflow_dag_id: Option<String>,

    /// Skip the notification entirely
    #[arg(long)]
    no_notify: bool,

    /// Directory for per-step checkouts (default: system temp dir)
    #[arg(long)]
    workspace: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Args, Debug)]
struct PlanArgs {
    #[command(flatten)]
    topic: TopicArgs,

    #[command(flatten)]
    repos: RepoArgs,

    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    topicflow_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run(args) => cmd_run(args).await,
        Commands::Plan(args) => cmd_plan(args),
    }
}

fn cmd_plan(args: PlanArgs) -> Result<ExitCode> {
    let topic = TopicConfig::resolve(&args.topic.raw()).context("Invalid topic input")?;
    let repos = args.repos.repository_set()?;
    let catalog = StepCatalog::standard(StandardMutations::uniform(Arc::new(CommandMutation::new(""))))
        .context("Failed to build step catalog")?;

    let plan = plan_run(&catalog, &repos, &topic, &run_stamp(chrono::Utc::now(), &uuid::Uuid::new_v4()));
    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
        OutputFormat::Text => print_plan(&plan),
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_run(args: RunArgs) -> Result<ExitCode> {
    let topic = TopicConfig::resolve(&args.topic.raw()).context("Invalid topic input")?;
    let repos = args.repos.repository_set()?;
    let catalog =
        StepCatalog::standard(args.mutations.standard()).context("Failed to build step catalog")?;

    let missing: Vec<&str> = catalog
        .select(topic.sink_type())
        .into_iter()
        .map(|s| s.id())
        .filter(|id| !args.mutations.configured(id))
        .collect();
    if !missing.is_empty() {
        bail!(
            "No mutation command configured for step(s): {} (see --help for the *_MUTATE_CMD variables)",
            missing.join(", ")
        );
    }

    let github = GitHubConfig::new(&args.github_token)
        .with_api_base(&args.github_api_url)
        .with_clone_base(&args.github_server_url);
    let scm = GitCli::new(github.remote_layout()).with_timeout(args.mutations.timeout());
    let pr_host = GitHubPrHost::new(github).context("Failed to create GitHub client")?;

    let mut executor = StepExecutor::new(Arc::new(scm), Arc::new(pr_host), repos);
    if let Some(dir) = &args.workspace {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create workspace directory {}", dir.display()))?;
        executor = executor.with_workspace_root(dir);
    }

    let trigger = DagTrigger::from_parts(args.airflow_url.clone(), args.airflow_dag_id.clone());
    let notifier: Arc<dyn Notifier> = match &args.slack_webhook {
        Some(url) if !args.no_notify && !url.trim().is_empty() => Arc::new(
            SlackWebhookNotifier::new(SlackConfig::new(url))
                .context("Invalid Slack webhook configuration")?
                .with_trigger(trigger),
        ),
        _ => Arc::new(TracingNotifier),
    };

    let orchestrator = Orchestrator::new(catalog, executor, notifier);
    info!(topic = topic.topic(), table = topic.table_name(), sink = %topic.sink_type(), "starting run");
    let run = orchestrator.execute(&topic).await;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&run)?),
        OutputFormat::Text => print_run(&run),
    }

    if !args.no_notify {
        orchestrator
            .notify(&run, &topic)
            .await
            .context("Failed to send notification (PRs above were still created)")?;
    }

    Ok(if run.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn print_plan(plan: &RunPlan) {
    println!("Topic:      {}", plan.topic);
    println!("Table:      {}", plan.table_name);
    println!("Sink type:  {}", plan.sink_type);
    println!();
    println!("Steps:");
    for step in &plan.steps {
        println!("  {} -> {} ({} <- {})", step.step, step.repo, step.base_branch, step.branch);
    }
    if !plan.excluded.is_empty() {
        println!("\nExcluded:");
        for excluded in &plan.excluded {
            println!("  {} ({})", excluded.step, excluded.reason);
        }
    }
}

fn print_run(run: &RunResult) {
    println!("Run {} for {} -> {}", run.run_id, run.topic, run.table_name);
    for outcome in &run.outcomes {
        let marker = match outcome.status {
            StepStatus::Success => "ok",
            StepStatus::Skipped => "skip",
            StepStatus::Failed => "FAIL",
        };
        println!("  [{marker:>4}] {}: {} ({} ms)", outcome.step, outcome.detail, outcome.duration_ms);
    }
    for excluded in &run.excluded {
        println!("  [   -] {}: {}", excluded.step, excluded.reason);
    }
    println!("\n{}", run.summary());
}
