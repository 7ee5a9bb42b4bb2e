//! Scorekeeper CLI
//!
//! The `scorekeeper` command drives the submission pipeline against a store
//! directly, without the daemon.
//!
//! ## Commands
//!
//! - `task`: publish an answer key, open or close a task
//! - `participant`: register display details
//! - `submit`: upload a submission file (optionally scoring it inline)
//! - `drain`: score every pending submission
//! - `ranking` / `history` / `status`: read-side queries

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use scorekeeper_core::{
    answer_map, init_tracing, MetricKind, NoopScheduler, ScoreScheduler, Scoreboard,
    ScoringConfig, ScoringQueue, ScoringWorker, SubmissionFormat, SubmissionIngest, METRICS,
};
use scorekeeper_state::{
    AnswerMap, ParticipantDirectory, ParticipantId, ParticipantRecord, StoreLocation,
    SubmissionId, SubmissionStore, SurrealScoreStore, TaskId, TaskRecord, TaskStore,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "scorekeeper")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Submission validation, scoring and ranking", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Output format for query results
    #[arg(long, global = true, value_enum, default_value_t = Output::Text)]
    output: Output,

    /// Local store directory (overrides SURREALDB_* settings)
    #[arg(long, global = true, conflicts_with = "memory")]
    db: Option<PathBuf>,

    /// Use a throwaway in-memory store
    #[arg(long, global = true)]
    memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Output {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage tasks
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },

    /// Manage participant display details
    Participant {
        #[command(subcommand)]
        action: ParticipantAction,
    },

    /// Upload a submission file
    Submit {
        /// Task to submit to
        task: String,

        /// Submitting participant
        #[arg(short, long)]
        participant: String,

        /// Submission file (`id,result` rows)
        file: PathBuf,

        /// Score before returning instead of leaving the submission pending
        #[arg(long)]
        wait: bool,
    },

    /// Score every pending submission, then exit
    Drain,

    /// Show the ranked best score per participant
    Ranking {
        /// Task to rank
        task: String,
    },

    /// Show a participant's scored submissions, newest first
    History {
        /// Task to query
        task: String,

        /// Participant to query
        #[arg(short, long)]
        participant: String,
    },

    /// Show the scoring status of a submission
    Status {
        /// Submission id
        submission: String,
    },
}

#[derive(Subcommand)]
enum TaskAction {
    /// Publish (or replace) a task and its answer key
    Publish {
        /// Task id
        id: String,

        /// Human-readable task name
        #[arg(short, long)]
        name: String,

        /// Scoring function (mse, mape, mae)
        #[arg(short, long, default_value = "mse")]
        metric: String,

        /// Answer key file (`id,result` rows)
        key: PathBuf,
    },

    /// Stop accepting submissions for a task
    Close {
        /// Task id
        id: String,
    },

    /// Accept submissions for a task again
    Open {
        /// Task id
        id: String,
    },
}

#[derive(Subcommand)]
enum ParticipantAction {
    /// Register or update a participant
    Add {
        /// Participant id
        id: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Avatar URL
        #[arg(long)]
        avatar: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let location = match (&cli.db, cli.memory) {
        (_, true) => StoreLocation::Memory,
        (Some(path), false) => StoreLocation::Local(path.clone()),
        (None, false) => StoreLocation::from_env(),
    };
    let store = Arc::new(
        SurrealScoreStore::connect(&location)
            .await
            .with_context(|| format!("Failed to connect to store at {}", location.describe()))?,
    );

    let result = match cli.command {
        Commands::Task { action } => match action {
            TaskAction::Publish {
                id,
                name,
                metric,
                key,
            } => cmd_task_publish(store.as_ref(), &id, &name, &metric, &key).await,
            TaskAction::Close { id } => cmd_task_set_active(store.as_ref(), &id, false).await,
            TaskAction::Open { id } => cmd_task_set_active(store.as_ref(), &id, true).await,
        },
        Commands::Participant { action } => match action {
            ParticipantAction::Add { id, name, avatar } => {
                cmd_participant_add(store.as_ref(), &id, &name, avatar).await
            }
        },
        Commands::Submit {
            task,
            participant,
            file,
            wait,
        } => cmd_submit(store, &task, &participant, &file, wait, cli.output).await,
        Commands::Drain => cmd_drain(store).await,
        Commands::Ranking { task } => cmd_ranking(store, &task, cli.output).await,
        Commands::History { task, participant } => {
            cmd_history(store, &task, &participant, cli.output).await
        }
        Commands::Status { submission } => cmd_status(store.as_ref(), &submission, cli.output).await,
    };

    METRICS.flush();
    result
}

/// Read and validate an answer key file.
///
/// The key uses the submission layout, and every value must be numeric.
fn read_answer_key(path: &Path) -> Result<AnswerMap> {
    let content =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let records = SubmissionFormat::answers()
        .validate_bytes(&content)
        .map_err(|problems| {
            let lines: Vec<String> = problems.iter().map(ToString::to_string).collect();
            anyhow::anyhow!("Invalid answer key {}:\n  {}", path.display(), lines.join("\n  "))
        })?;
    let key = answer_map(&records);
    if key.is_empty() {
        bail!("Answer key {} has no rows", path.display());
    }
    for (question, value) in &key {
        match value.parse::<f64>() {
            Ok(v) if v.is_finite() => {}
            _ => bail!("Answer key value for question {question} is not a number: {value:?}"),
        }
    }
    Ok(key)
}

async fn cmd_task_publish(
    store: &SurrealScoreStore,
    id: &str,
    name: &str,
    metric: &str,
    key_path: &Path,
) -> Result<()> {
    let metric: MetricKind = metric.parse()?;
    let key = read_answer_key(key_path)?;
    let questions = key.len();
    store
        .put_task(&TaskRecord::new(id, name, key, metric.as_str()))
        .await
        .context("Failed to store task")?;
    info!(task_id = %id, metric = %metric, questions, "task published");
    println!("Published task '{}' ({}, {} questions)", id, metric, questions);
    Ok(())
}

async fn cmd_task_set_active(store: &SurrealScoreStore, id: &str, active: bool) -> Result<()> {
    let task_id = TaskId::from(id);
    let Some(mut task) = store.get_task(&task_id).await? else {
        bail!("Task '{}' not found", id);
    };
    task.is_active = active;
    store.put_task(&task).await?;
    let state = if active { "open" } else { "closed" };
    println!("Task '{}' is now {}", id, state);
    Ok(())
}

async fn cmd_participant_add(
    store: &SurrealScoreStore,
    id: &str,
    name: &str,
    avatar: Option<String>,
) -> Result<()> {
    store
        .put_participant(&ParticipantRecord {
            participant_id: ParticipantId::from(id),
            display_name: name.to_string(),
            avatar_url: avatar,
        })
        .await?;
    println!("Registered participant '{}' as {}", id, name);
    Ok(())
}

fn scoring_queue(store: &Arc<SurrealScoreStore>) -> Result<ScoringQueue> {
    let config = ScoringConfig::from_env().context("Invalid scoring configuration")?;
    let worker = Arc::new(ScoringWorker::new(store.clone(), store.clone(), config));
    Ok(ScoringQueue::start(worker))
}

async fn cmd_submit(
    store: Arc<SurrealScoreStore>,
    task: &str,
    participant: &str,
    file: &Path,
    wait: bool,
    output: Output,
) -> Result<()> {
    let content =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;

    let queue = if wait { Some(scoring_queue(&store)?) } else { None };
    let scheduler: Arc<dyn ScoreScheduler> = match &queue {
        Some(q) => Arc::new(q.handle()),
        None => Arc::new(NoopScheduler),
    };
    let ingest = SubmissionIngest::new(store.clone(), store.clone(), scheduler);
    let submitted = ingest
        .submit(&TaskId::from(task), &ParticipantId::from(participant), &content)
        .await;

    // Drain before reporting so a waited-on score has landed.
    if let Some(q) = queue {
        q.shutdown().await;
    }
    let id = submitted?;

    if wait {
        cmd_status(store.as_ref(), id.as_str(), output).await
    } else {
        print_value(output, &serde_json::json!({ "answer_id": id }), || {
            println!("Submitted {} (pending; run `scorekeeper drain` to score)", id);
        })
    }
}

async fn cmd_drain(store: Arc<SurrealScoreStore>) -> Result<()> {
    let queue = scoring_queue(&store)?;
    let queued = queue
        .recover_pending(store.as_ref())
        .await
        .context("Failed to list pending submissions")?;
    queue.shutdown().await;

    let snapshot = METRICS.snapshot();
    println!(
        "Drained {} pending submission(s): {} scored, {} failed, {} retries",
        queued, snapshot.scores_recorded, snapshot.scoring_failures, snapshot.scoring_retries
    );
    Ok(())
}

async fn cmd_ranking(store: Arc<SurrealScoreStore>, task: &str, output: Output) -> Result<()> {
    let scoreboard = Scoreboard::new(store.clone(), store);
    let entries = scoreboard.ranking(&TaskId::from(task)).await?;
    print_value(output, &entries, || {
        if entries.is_empty() {
            println!("No scored submissions for '{}'", task);
            return;
        }
        println!("{:>4}  {:<24} {:>14}  submission", "rank", "participant", "score");
        for e in &entries {
            let who = e
                .display_name
                .clone()
                .unwrap_or_else(|| e.participant_id.to_string());
            println!(
                "{:>4}  {:<24} {:>14.6}  {}",
                e.rank, who, e.score, e.submission_id
            );
        }
    })
}

async fn cmd_history(
    store: Arc<SurrealScoreStore>,
    task: &str,
    participant: &str,
    output: Output,
) -> Result<()> {
    let scoreboard = Scoreboard::new(store.clone(), store);
    let entries = scoreboard
        .history(&TaskId::from(task), &ParticipantId::from(participant))
        .await?;
    print_value(output, &entries, || {
        if entries.is_empty() {
            println!("No scored submissions for '{}' on '{}'", participant, task);
            return;
        }
        for e in &entries {
            println!(
                "{}  {:>14.6}  {}",
                e.submitted_at.format("%Y-%m-%d %H:%M:%S"),
                e.score,
                e.submission_id
            );
        }
    })
}

#[derive(Serialize)]
struct StatusView<'a> {
    submission_id: &'a SubmissionId,
    task_id: &'a TaskId,
    participant_id: &'a ParticipantId,
    status: String,
    score: Option<f64>,
    failure_reason: Option<&'a str>,
    attempts: u32,
}

async fn cmd_status(store: &SurrealScoreStore, submission: &str, output: Output) -> Result<()> {
    let record = store
        .get_submission(&SubmissionId::from(submission))
        .await
        .with_context(|| format!("Failed to load submission {}", submission))?;
    let view = StatusView {
        submission_id: &record.submission_id,
        task_id: &record.task_id,
        participant_id: &record.participant_id,
        status: record.status.to_string(),
        score: record.score,
        failure_reason: record.failure_reason.as_deref(),
        attempts: record.attempts,
    };
    print_value(output, &view, || {
        println!("Submission:  {}", view.submission_id);
        println!("Task:        {}", view.task_id);
        println!("Participant: {}", view.participant_id);
        println!("Status:      {}", view.status);
        if let Some(score) = view.score {
            println!("Score:       {}", score);
        }
        if let Some(reason) = view.failure_reason {
            println!("Reason:      {}", reason);
        }
        println!("Attempts:    {}", view.attempts);
    })
}

fn print_value<T: Serialize>(output: Output, value: &T, text: impl FnOnce()) -> Result<()> {
    match output {
        Output::Json => println!("{}", serde_json::to_string_pretty(value)?),
        Output::Text => text(),
    }
    Ok(())
}
