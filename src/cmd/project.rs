//! Project initialization, one-off scan, and status commands.

use anyhow::Result;
use std::path::Path;

pub fn cmd_init(project_dir: &Path) -> Result<()> {
    use textcraft::init::{init_project, is_initialized};

    let was_initialized = is_initialized(project_dir);
    let result = init_project(project_dir)?;

    if result.created && !was_initialized {
        println!(
            "Initialized textcraft project at {}",
            result.data_dir.display()
        );
        println!();
        println!("Created directory structure:");
        println!("  textcraft.toml        # Engine settings");
        println!("  data/");
        println!("  ├── matrix.json       # Unit status (written by the engine)");
        println!("  ├── control.json      # Run / pause / stop and overrides");
        println!("  ├── manuscripts/      # One file per chapter: ch01_Title.md");
        println!("  ├── story_bible/      # project_conf.json, story_brief.json");
        println!("  └── logs/");
        println!();
        println!("Next steps:");
        println!("  1. Point [collaborators] in textcraft.toml at your planner, narrator and editor");
        println!("  2. Run `textcraft run` to start the loop");
    } else if was_initialized && !result.created {
        println!(
            "Textcraft project already initialized at {}",
            result.data_dir.display()
        );
        println!("Directory structure verified.");
    } else {
        println!(
            "Completed textcraft initialization at {}",
            result.data_dir.display()
        );
    }

    Ok(())
}

pub fn cmd_scan(project_dir: &Path) -> Result<()> {
    use std::sync::Arc;
    use textcraft::config::ProjectContext;
    use textcraft::scanner::{NoopIndex, Scanner};

    let ctx = ProjectContext::new(project_dir.to_path_buf())?;
    ctx.ensure_directories()?;
    let scanner = Scanner::new(&ctx, Arc::new(NoopIndex));
    let matrix = scanner.scan()?;

    println!();
    println!(
        "Scanned {} units, {} words, {} locked (target {} words per unit)",
        matrix.metrics.unit_count,
        matrix.metrics.total_word_count,
        matrix.metrics.locked_units,
        scanner.target_word_count()
    );
    println!("Project status: {}", matrix.meta.project_status);
    println!();
    Ok(())
}

pub fn cmd_status(project_dir: &Path) -> Result<()> {
    use textcraft::config::ProjectContext;
    use textcraft::control::{FileControl, SystemStatus};
    use textcraft::init::is_initialized;
    use textcraft::matrix::{ContinuityCheck, MatrixStore, UnitStatus};

    if !is_initialized(project_dir) {
        println!();
        println!("No textcraft project found. Run 'textcraft init' first.");
        println!();
        return Ok(());
    }

    let ctx = ProjectContext::new(project_dir.to_path_buf())?;
    let matrix = MatrixStore::new(ctx.matrix_file.clone()).load()?;
    let control = FileControl::new(ctx.control_file.clone()).load()?;

    println!();
    println!("Project: {}", console::style(ctx.name()).bold());
    let system = match control.system_status {
        SystemStatus::Running => console::style(control.system_status.to_string()).green(),
        SystemStatus::Paused => console::style(control.system_status.to_string()).yellow(),
        SystemStatus::Stop => console::style(control.system_status.to_string()).red(),
    };
    println!(
        "Status: {} (loop: {})",
        matrix.meta.project_status, system
    );
    if let Some(scan) = matrix.meta.last_scan {
        println!("Last scan: {}", scan.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(request) = control.pending_override() {
        println!(
            "Pending override: {} {}",
            request.instruction.as_deref().unwrap_or("-"),
            request
                .force_target
                .map(|t| format!("(target {})", t))
                .unwrap_or_default()
        );
    }
    if let Some(task) = &matrix.active_task {
        println!(
            "In flight: {} {} {} since {}",
            task.assigned_to,
            task.action,
            task.target,
            task.started_at.format("%H:%M:%S")
        );
    }
    println!();

    if matrix.content.is_empty() {
        println!("No units yet.");
        println!();
        return Ok(());
    }

    println!(
        "{:<8} {:<30} {:>7} {:<13} Review",
        "Unit", "Title", "Words", "Status"
    );
    println!(
        "{:<8} {:<30} {:>7} {:<13} ------",
        "--------", "------------------------------", "-------", "-------------"
    );
    for (id, record) in &matrix.content {
        let title: String = record.title.chars().take(30).collect();
        let status = format!("{:<13}", record.status.to_string());
        let status = match record.status {
            UnitStatus::Locked => console::style(status).green(),
            UnitStatus::ReviewReady => console::style(status).cyan(),
            UnitStatus::Drafting => console::style(status).yellow(),
            UnitStatus::Empty => console::style(status).dim(),
        };
        let review = match record.continuity_check {
            ContinuityCheck::Fail => console::style(record.continuity_check.to_string()).red(),
            _ => console::style(record.continuity_check.to_string()),
        };
        println!(
            "{:<8} {:<30} {:>7} {} {}",
            id, title, record.word_count, status, review
        );
        if record.continuity_check == ContinuityCheck::Fail {
            for note in &record.editor_notes {
                println!("         - {}", console::style(note).dim());
            }
        }
    }
    println!();
    println!(
        "{} units, {} words, {} locked",
        matrix.metrics.unit_count, matrix.metrics.total_word_count, matrix.metrics.locked_units
    );
    println!();
    Ok(())
}
