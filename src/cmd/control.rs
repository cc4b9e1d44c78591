//! Operator control commands: `pause`, `resume`, `stop`, `override`.
//!
//! These only write `data/control.json`; a running loop picks the change up at
//! the start of its next cycle.

use anyhow::Result;
use std::path::Path;
use textcraft::control::{FileControl, SystemStatus};

fn control_for(project_dir: &Path) -> Result<FileControl> {
    use textcraft::init::is_initialized;

    if !is_initialized(project_dir) {
        anyhow::bail!(
            "No textcraft project at {}. Run 'textcraft init' first.",
            project_dir.display()
        );
    }
    Ok(FileControl::new(project_dir.join("data").join("control.json")))
}

fn set_status(project_dir: &Path, status: SystemStatus) -> Result<()> {
    control_for(project_dir)?.set_status(status)?;
    println!("Loop status set to {}", console::style(status).bold());
    Ok(())
}

pub fn cmd_pause(project_dir: &Path) -> Result<()> {
    set_status(project_dir, SystemStatus::Paused)
}

pub fn cmd_resume(project_dir: &Path) -> Result<()> {
    set_status(project_dir, SystemStatus::Running)
}

pub fn cmd_stop(project_dir: &Path) -> Result<()> {
    set_status(project_dir, SystemStatus::Stop)
}

pub fn cmd_override(project_dir: &Path, instruction: &str, target: Option<&str>) -> Result<()> {
    let instruction = instruction.trim();
    if instruction.is_empty() && target.is_none() {
        anyhow::bail!("An override needs an instruction or a --target");
    }
    let instruction = (!instruction.is_empty()).then(|| instruction.to_string());
    control_for(project_dir)?.issue_override(instruction, target.map(String::from))?;
    match target {
        Some(target) => println!("Override queued for {}", console::style(target).bold()),
        None => println!("Override queued"),
    }
    println!("It will be delivered to the next planning call.");
    Ok(())
}
