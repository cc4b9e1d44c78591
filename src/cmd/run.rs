//! The long-running loop: `textcraft run`.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn run_orchestrator(project_dir: &Path, max_cycles: Option<u64>) -> Result<()> {
    use textcraft::collaborators::{CommandMemoryIndexer, CommandRunner, command_collaborators};
    use textcraft::config::ProjectContext;
    use textcraft::control::FileControl;
    use textcraft::init::is_initialized;
    use textcraft::orchestrator::Orchestrator;
    use textcraft::scanner::{ChannelIndex, MemoryIndex, NoopIndex};

    if !is_initialized(project_dir) {
        anyhow::bail!(
            "No textcraft project at {}. Run 'textcraft init' first.",
            project_dir.display()
        );
    }

    let ctx = ProjectContext::new(project_dir.to_path_buf())?;
    for warning in ctx.settings.validate() {
        warn!("config: {}", warning);
    }

    let collaborators = command_collaborators(&ctx)?;

    let memory_cmd = &ctx.settings.collaborators.memory_cmd;
    let (memory, indexer): (Arc<dyn MemoryIndex>, _) = if memory_cmd.is_empty() {
        (Arc::new(NoopIndex), None)
    } else {
        let runner = CommandRunner::from_argv(
            memory_cmd,
            &ctx.root,
            std::time::Duration::from_secs(ctx.settings.collaborators.timeout_secs),
        )
        .context("collaborators.memory_cmd")?;
        let (index, rx) = ChannelIndex::channel(64);
        let handle = CommandMemoryIndexer::new(runner).spawn(rx);
        (Arc::new(index), Some(handle))
    };

    let control = Arc::new(FileControl::new(ctx.control_file.clone()));
    let mut orchestrator = Orchestrator::new(ctx, control, collaborators, memory);
    let result = orchestrator.run_cycles(max_cycles).await;

    // Closing the last sender lets the indexer drain and exit.
    drop(orchestrator);
    if let Some(handle) = indexer
        && let Err(e) = handle.await
    {
        warn!(error = %e, "memory indexer task failed");
    }

    let summary = result?;
    info!(cycles = summary.cycles, dispatches = summary.dispatches, "run finished");
    println!();
    println!(
        "{} after {} cycles ({} dispatches): {}",
        console::style("Stopped").bold(),
        summary.cycles,
        summary.dispatches,
        summary.stop_reason
    );
    Ok(())
}
