//! Configuration view and validation: `textcraft config`.

use anyhow::Result;
use std::path::Path;

pub fn cmd_config(project_dir: &Path) -> Result<()> {
    use textcraft::config::ProjectContext;
    use textcraft::engine_config::CONFIG_FILE;

    let config_path = project_dir.join(CONFIG_FILE);
    let ctx = ProjectContext::new(project_dir.to_path_buf())?;
    let settings = &ctx.settings;

    println!();
    println!("Textcraft Configuration");
    println!("=======================");
    println!();
    if config_path.exists() {
        println!("Config file: {}", config_path.display());
    } else {
        println!("No {} found, using defaults.", CONFIG_FILE);
    }
    println!();

    println!("Effective values (with env overrides):");
    println!("[loop]");
    let l = &settings.loop_settings;
    println!("  cycle_delay_secs = {}", l.cycle_delay_secs);
    println!("  idle_delay_secs = {}", l.idle_delay_secs);
    println!("  pause_poll_secs = {}", l.pause_poll_secs);
    println!("  error_backoff_secs = {}", l.error_backoff_secs);
    println!("  max_consecutive_errors = {}", l.max_consecutive_errors);
    println!("  auto_continue_drafting = {}", l.auto_continue_drafting);
    println!();

    println!("[scanner]");
    let s = &settings.scanner;
    println!("  target_word_count = {}", s.target_word_count);
    println!("  min_word_count = {}", s.min_word_count);
    println!("  incomplete_markers = {:?}", s.incomplete_markers);
    println!("  extensions = {:?}", s.extensions);
    println!("  default_planned_units = {}", s.default_planned_units);
    println!();

    println!("[collaborators]");
    let c = &settings.collaborators;
    println!("  planner_cmd = {:?}", c.planner_cmd);
    println!("  narrator_cmd = {:?}", c.narrator_cmd);
    println!("  editor_cmd = {:?}", c.editor_cmd);
    println!("  memory_cmd = {:?}", c.memory_cmd);
    println!("  timeout_secs = {}", c.timeout_secs);
    println!();

    let warnings = settings.validate();
    if warnings.is_empty() {
        println!("Configuration is valid.");
    } else {
        println!("Configuration warnings:");
        for warning in warnings {
            println!("  - {}", console::style(warning).yellow());
        }
    }
    println!();
    Ok(())
}
