//! Collaborators backed by external commands.
//!
//! Each invocation spawns the configured argv in the project root, writes one
//! JSON document to stdin, closes it, and reads the reply from stdout. A
//! non-zero exit status or a timeout is an `Err`; a reply that does not parse
//! is an error outcome, except for the planner, whose garbage means "wait".

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::{
    Collaborators, Decision, GenerationOutcome, GenerationRequest, Generator, OverrideRequest,
    Planner, ValidationOutcome, ValidationRequest, Validator,
};
use crate::config::ProjectContext;
use crate::matrix::Matrix;
use crate::scanner::memory::IndexRequest;
use crate::util::extract_json_object;

/// One configured command line.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: String,
    args: Vec<String>,
    working_dir: PathBuf,
    timeout: Duration,
}

impl CommandRunner {
    pub fn from_argv(argv: &[String], working_dir: &Path, timeout: Duration) -> Result<Self> {
        let Some((program, args)) = argv.split_first() else {
            bail!("Collaborator command is empty");
        };
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            working_dir: working_dir.to_path_buf(),
            timeout,
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run the command with `payload` on stdin and return its stdout.
    pub async fn invoke(&self, payload: &Value) -> Result<String> {
        let input = serde_json::to_string(payload).context("Failed to serialize payload")?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn collaborator: {}", self.program))?;

        // Feed stdin while draining stdout, all inside the deadline: a
        // command that never reads its input must not block the loop.
        let stdin = child.stdin.take();
        let feed = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(input.as_bytes()).await {
                // A command may answer without reading its input.
                Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => Err(e),
                _ => Ok(()),
            }
        };
        let exchange = async move { tokio::join!(feed, child.wait_with_output()) };

        let output = match timeout(self.timeout, exchange).await {
            Ok((fed, output)) => {
                let output = output.context("Failed to wait for collaborator")?;
                fed.context("Failed to write collaborator stdin")?;
                output
            }
            Err(_) => bail!(
                "{} timed out after {} seconds",
                self.program,
                self.timeout.as_secs()
            ),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!(program = %self.program, stderr = %stderr.trim(), "collaborator stderr");
        }
        if !output.status.success() {
            bail!(
                "{} exited with code {}: {}",
                self.program,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }
        Ok(stdout)
    }
}

/// Parse the first JSON object in `text` as `T`.
fn parse_reply<T: serde::de::DeserializeOwned>(text: &str) -> Result<T> {
    let object = extract_json_object(text).context("reply contained no JSON object")?;
    serde_json::from_str(&object).context("reply did not match the expected shape")
}

pub struct CommandPlanner {
    runner: CommandRunner,
    project_root: PathBuf,
}

impl CommandPlanner {
    pub fn new(runner: CommandRunner, project_root: PathBuf) -> Self {
        Self {
            runner,
            project_root,
        }
    }
}

#[async_trait]
impl Planner for CommandPlanner {
    async fn plan(
        &self,
        matrix: &Matrix,
        override_request: Option<&OverrideRequest>,
    ) -> Result<Decision> {
        let payload = json!({
            "matrix": matrix,
            "override": override_request,
            "project_root": self.project_root,
        });
        let reply = self.runner.invoke(&payload).await?;
        Ok(Decision::parse_lenient(&reply))
    }
}

pub struct CommandNarrator {
    runner: CommandRunner,
}

impl CommandNarrator {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Generator for CommandNarrator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutcome> {
        let payload = serde_json::to_value(request)?;
        let reply = self.runner.invoke(&payload).await?;
        Ok(parse_reply(&reply).unwrap_or_else(|e| {
            GenerationOutcome::error(format!("{}: {:#}", self.runner.program(), e))
        }))
    }
}

pub struct CommandEditor {
    runner: CommandRunner,
}

impl CommandEditor {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Validator for CommandEditor {
    async fn validate(&self, request: &ValidationRequest) -> Result<ValidationOutcome> {
        let payload = serde_json::to_value(request)?;
        let reply = self.runner.invoke(&payload).await?;
        Ok(parse_reply(&reply).unwrap_or_else(|e| {
            ValidationOutcome::error(format!("{}: {:#}", self.runner.program(), e))
        }))
    }
}

/// Feeds changed units to an external retrieval-memory indexer.
pub struct CommandMemoryIndexer {
    runner: CommandRunner,
}

impl CommandMemoryIndexer {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }

    /// Drain `rx` on a background task until every sender is dropped.
    /// Indexing failures are logged and never reach the loop.
    pub fn spawn(self, mut rx: mpsc::Receiver<IndexRequest>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                let payload = match serde_json::to_value(&request) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(unit = %request.unit_id, error = %e, "could not encode index request");
                        continue;
                    }
                };
                match self.runner.invoke(&payload).await {
                    Ok(_) => debug!(unit = %request.unit_id, "unit indexed"),
                    Err(e) => warn!(unit = %request.unit_id, error = %format!("{:#}", e), "memory indexing failed"),
                }
            }
        })
    }
}

/// Build the command-backed collaborators configured for `ctx`.
pub fn command_collaborators(ctx: &ProjectContext) -> Result<Collaborators> {
    let section = &ctx.settings.collaborators;
    let limit = Duration::from_secs(section.timeout_secs);
    let planner = CommandRunner::from_argv(&section.planner_cmd, &ctx.root, limit)
        .context("collaborators.planner_cmd")?;
    let narrator = CommandRunner::from_argv(&section.narrator_cmd, &ctx.root, limit)
        .context("collaborators.narrator_cmd")?;
    let editor = CommandRunner::from_argv(&section.editor_cmd, &ctx.root, limit)
        .context("collaborators.editor_cmd")?;

    Ok(Collaborators {
        planner: Arc::new(CommandPlanner::new(planner, ctx.root.clone())),
        narrator: Arc::new(CommandNarrator::new(narrator)),
        editor: Arc::new(CommandEditor::new(editor)),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::collaborators::{ActionType, Agent, CollaboratorStatus, GenerationMode, Verdict};
    use tempfile::tempdir;

    fn sh(script: &str, dir: &Path) -> CommandRunner {
        let argv = vec!["sh".to_string(), "-c".to_string(), script.to_string()];
        CommandRunner::from_argv(&argv, dir, Duration::from_secs(10)).unwrap()
    }

    fn generation_request(root: &Path) -> GenerationRequest {
        GenerationRequest {
            target_file: "ch01_Start.md".to_string(),
            action: ActionType::Generate,
            mode: GenerationMode::Draft,
            context_notes: "open with the lighthouse".to_string(),
            editor_notes: Vec::new(),
            project_root: root.to_path_buf(),
        }
    }

    #[test]
    fn test_from_argv_rejects_empty() {
        let dir = tempdir().unwrap();
        assert!(CommandRunner::from_argv(&[], dir.path(), Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_invoke_passes_payload_on_stdin() {
        let dir = tempdir().unwrap();
        let runner = sh("cat", dir.path());
        let out = runner.invoke(&json!({"hello": "world"})).await.unwrap();
        assert_eq!(out, r#"{"hello":"world"}"#);
    }

    #[tokio::test]
    async fn test_invoke_nonzero_exit_is_error() {
        let dir = tempdir().unwrap();
        let runner = sh("cat >/dev/null; echo broken >&2; exit 3", dir.path());
        let err = runner.invoke(&json!({})).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("code 3"), "{msg}");
        assert!(msg.contains("broken"), "{msg}");
    }

    #[tokio::test]
    async fn test_invoke_times_out() {
        let dir = tempdir().unwrap();
        let argv = vec!["sh".to_string(), "-c".to_string(), "sleep 5".to_string()];
        let runner =
            CommandRunner::from_argv(&argv, dir.path(), Duration::from_millis(100)).unwrap();
        let err = runner.invoke(&json!({})).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_invoke_times_out_when_stdin_is_never_read() {
        let dir = tempdir().unwrap();
        let argv = vec!["sh".to_string(), "-c".to_string(), "sleep 30".to_string()];
        let runner = CommandRunner::from_argv(&argv, dir.path(), Duration::from_secs(1)).unwrap();
        // Far larger than a pipe buffer, so the write blocks until the deadline.
        let payload = json!({"blob": "x".repeat(1 << 20)});

        let started = std::time::Instant::now();
        let err = runner.invoke(&payload).await.unwrap_err();
        assert!(err.to_string().contains("timed out"), "{err}");
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_command_planner_parses_decision() {
        let dir = tempdir().unwrap();
        let script = r#"cat >/dev/null; echo 'Plan: {"action_type": "generate", "target_file": "ch01", "assigned_agent": "narrator"}'"#;
        let planner = CommandPlanner::new(sh(script, dir.path()), dir.path().to_path_buf());
        let decision = planner.plan(&Matrix::default(), None).await.unwrap();
        assert_eq!(
            decision,
            Decision::dispatch(ActionType::Generate, Agent::Narrator, "ch01", "")
        );
    }

    #[tokio::test]
    async fn test_command_planner_garbage_is_wait() {
        let dir = tempdir().unwrap();
        let planner = CommandPlanner::new(
            sh("cat >/dev/null; echo 'I am not sure'", dir.path()),
            dir.path().to_path_buf(),
        );
        let decision = planner.plan(&Matrix::default(), None).await.unwrap();
        assert_eq!(decision.action_type(), ActionType::Wait);
    }

    #[tokio::test]
    async fn test_command_planner_sees_override() {
        let dir = tempdir().unwrap();
        // Only plans an edit when the override reached stdin.
        let script = r#"grep -q '"instruction":"rewrite ch02"' && echo '{"action_type": "edit", "target_file": "ch02", "assigned_agent": "editor"}' || echo '{"action_type": "wait"}'"#;
        let planner = CommandPlanner::new(sh(script, dir.path()), dir.path().to_path_buf());
        let request = OverrideRequest {
            instruction: Some("rewrite ch02".to_string()),
            force_target: None,
        };
        let decision = planner
            .plan(&Matrix::default(), Some(&request))
            .await
            .unwrap();
        assert_eq!(decision.action_type(), ActionType::Edit);
    }

    #[tokio::test]
    async fn test_command_narrator_reads_outcome() {
        let dir = tempdir().unwrap();
        let narrator = CommandNarrator::new(sh(
            r#"cat >/dev/null; echo '{"status": "success", "modified_files": ["ch01_Start.md"]}'"#,
            dir.path(),
        ));
        let outcome = narrator
            .generate(&generation_request(dir.path()))
            .await
            .unwrap();
        assert_eq!(outcome.status, CollaboratorStatus::Success);
        assert_eq!(outcome.modified_files, vec!["ch01_Start.md"]);
    }

    #[tokio::test]
    async fn test_command_narrator_malformed_reply_is_error_outcome() {
        let dir = tempdir().unwrap();
        let narrator = CommandNarrator::new(sh("cat >/dev/null; echo done", dir.path()));
        let outcome = narrator
            .generate(&generation_request(dir.path()))
            .await
            .unwrap();
        assert_eq!(outcome.status, CollaboratorStatus::Error);
        assert!(outcome.message.is_some());
    }

    #[tokio::test]
    async fn test_command_editor_reads_verdict() {
        let dir = tempdir().unwrap();
        let editor = CommandEditor::new(sh(
            r#"cat >/dev/null; echo '{"status": "success", "verdict": "FAIL", "editor_notes": ["timeline slip"]}'"#,
            dir.path(),
        ));
        let request = ValidationRequest {
            target_file: "ch01".to_string(),
            context_notes: String::new(),
            project_root: dir.path().to_path_buf(),
        };
        let outcome = editor.validate(&request).await.unwrap();
        assert_eq!(outcome.verdict, Verdict::Fail);
        assert_eq!(outcome.editor_notes, vec!["timeline slip"]);
    }

    #[tokio::test]
    async fn test_memory_indexer_drains_channel() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("indexed.log");
        let script = format!("cat >> {}; echo >> {}", log.display(), log.display());
        let indexer = CommandMemoryIndexer::new(sh(&script, dir.path()));
        let (tx, rx) = mpsc::channel(4);
        let handle = indexer.spawn(rx);

        tx.send(IndexRequest {
            unit_id: "ch01".to_string(),
            path: dir.path().join("ch01_Start.md"),
            word_count: 12,
        })
        .await
        .unwrap();
        drop(tx);
        handle.await.unwrap();

        let logged = std::fs::read_to_string(&log).unwrap();
        assert!(logged.contains("\"unit_id\":\"ch01\""));
    }

    #[test]
    fn test_command_collaborators_rejects_empty_command() {
        let dir = tempdir().unwrap();
        let mut settings = crate::engine_config::EngineToml::default();
        settings.collaborators.narrator_cmd.clear();
        let ctx = ProjectContext::with_settings(dir.path().to_path_buf(), settings);
        let err = command_collaborators(&ctx).err().unwrap();
        assert!(format!("{:#}", err).contains("narrator_cmd"));
    }
}
