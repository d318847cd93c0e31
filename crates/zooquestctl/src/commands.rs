//! Command handlers for zooquestctl.

use anyhow::{Context as _, Result};
use owo_colors::OwoColorize;
use serde_json::json;
use zooquest_shared::conservation::{conservation_actions, conservation_projects, REFLECTION_EXPERIENCE};
use zooquest_shared::profile::{ProfileUpdate, UserProfile};
use zooquest_shared::{ZooQuest, ZooQuestConfig, ZooQuestError};

const HR: &str = "----------------------------------------";

pub struct Context {
    config: ZooQuestConfig,
    engine: ZooQuest,
    json: bool,
}

impl Context {
    pub fn new(config: ZooQuestConfig, json: bool) -> Self {
        let engine = ZooQuest::open(config.storage.data_dir.clone());
        Self { config, engine, json }
    }
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Stable error code, looking through any added context
fn error_code(err: &anyhow::Error) -> &'static str {
    err.downcast_ref::<ZooQuestError>()
        .map(ZooQuestError::code)
        .unwrap_or("error")
}

fn error_body(err: &anyhow::Error) -> serde_json::Value {
    json!({ "error": error_code(err), "message": format!("{:#}", err) })
}

/// Report a failed command on stdout (JSON) or stderr (text)
pub fn report_error(err: &anyhow::Error, json_output: bool) {
    if json_output {
        println!("{}", error_body(err));
        return;
    }
    match err.downcast_ref::<ZooQuestError>() {
        Some(e @ ZooQuestError::InsufficientPoints { .. }) => eprintln!("{}", e.to_string().yellow()),
        _ => eprintln!("{} {:#}", "error:".red().bold(), err),
    }
}

fn print_kv(key: &str, value: &str) {
    println!("{:14} {}", key.dimmed(), value);
}

fn print_profile(profile: &UserProfile) {
    println!();
    println!("{}", profile.name.bold());
    println!("{}", HR.dimmed());
    print_kv("id", &profile.id);
    print_kv("level", &profile.level.to_string());
    print_kv(
        "experience",
        &format!("{} ({} to next level)", profile.experience, profile.experience_to_next_level()),
    );
    print_kv("facts", &profile.learned_facts.len().to_string());
    print_kv("visits", &profile.visit_count.to_string());
    if !profile.badges.is_empty() {
        println!();
        for badge in &profile.badges {
            println!("  [{}] {} - {}", badge.level, badge.name.green(), badge.description);
        }
    }
    println!();
}

pub fn profile(ctx: &Context) -> Result<()> {
    let profile = ctx.engine.profile()?;
    if ctx.json {
        return print_json(&serde_json::to_value(&profile)?);
    }
    print_profile(&profile);
    Ok(())
}

pub fn set_profile(ctx: &Context, name: Option<String>, age: Option<u8>, avatar: Option<String>) -> Result<()> {
    if name.is_none() && age.is_none() && avatar.is_none() {
        anyhow::bail!("Nothing to update. Pass --name, --age or --avatar");
    }
    let profile = ctx
        .engine
        .update_profile(vec![ProfileUpdate::Identity { name, age, avatar }])?;
    if ctx.json {
        return print_json(&serde_json::to_value(&profile)?);
    }
    print_profile(&profile);
    Ok(())
}

pub fn visit(ctx: &Context) -> Result<()> {
    let profile = ctx.engine.record_visit()?;
    if ctx.json {
        return print_json(&json!({ "visitCount": profile.visit_count }));
    }
    println!("Welcome back, {}! Visit #{}", profile.name, profile.visit_count);
    Ok(())
}

pub fn fact(ctx: &Context, animal: &str, category: &str, content: &str) -> Result<()> {
    let outcome = ctx.engine.track_fact(animal, category, content)?;
    if ctx.json {
        return print_json(&serde_json::to_value(&outcome)?);
    }
    if !outcome.is_new {
        println!("{}", "Already learned that one.".dimmed());
        return Ok(());
    }
    println!("{} +{} XP", "New fact!".green(), outcome.experience_gained);
    if let Some(level) = outcome.new_level {
        println!("{} You reached level {}", "LEVEL UP".bold().yellow(), level);
    }
    Ok(())
}

pub fn quest(ctx: &Context, quest_type: &str, context: Option<&str>) -> Result<()> {
    let progress = ctx.engine.update_quest(quest_type, context)?;
    if ctx.json {
        return print_json(&serde_json::to_value(&progress)?);
    }
    println!("{} progress: {}", quest_type, progress.new_progress);
    if let Some(badge) = &progress.new_badge {
        println!(
            "{} {} ({}) +{} XP",
            "Badge earned:".bold().green(),
            badge.name,
            badge.description,
            progress.experience_gained
        );
    }
    Ok(())
}

pub fn quests(ctx: &Context) -> Result<()> {
    let active = ctx.engine.active_quests()?;
    if ctx.json {
        return print_json(&serde_json::to_value(&active)?);
    }
    println!();
    for quest in &active {
        println!("{}", quest.title.bold());
        println!("  {}", quest.description.dimmed());
        println!(
            "  {}/{} ({}%) next: {} (+{} XP)",
            quest.progress, quest.target_count, quest.progress_percent, quest.next_title, quest.next_reward
        );
    }
    if active.is_empty() {
        println!("All quests complete.");
    }
    println!();
    Ok(())
}

pub fn allocate(ctx: &Context, project: &str, amount: u32) -> Result<()> {
    let receipt = ctx.engine.allocate(project, amount)?;
    if ctx.json {
        return print_json(&serde_json::to_value(&receipt)?);
    }
    println!(
        "Allocated {} points to {} (project total {}, {} points left)",
        receipt.amount, receipt.project_id, receipt.project_total, receipt.remaining_points
    );
    Ok(())
}

pub fn projects(ctx: &Context) -> Result<()> {
    let allocations = ctx.engine.allocations()?;
    let remaining = ctx.engine.remaining_points()?;
    if ctx.json {
        return print_json(&json!({ "allocations": allocations, "remainingPoints": remaining }));
    }
    println!();
    for project in conservation_projects() {
        let mine = allocations.get(project.id).copied().unwrap_or(0);
        println!("{} {}", project.id.dimmed(), project.name.bold());
        println!(
            "  {}  {}/{} funded, your contribution: {}",
            project.organization, project.current_amount, project.target_amount, mine
        );
    }
    let others: Vec<_> = allocations
        .iter()
        .filter(|(id, _)| !conservation_projects().iter().any(|p| p.id == id.as_str()))
        .collect();
    for (id, points) in others {
        println!("{} {} points", id.dimmed(), points);
    }
    println!();
    print_kv("available", &remaining.to_string());
    Ok(())
}

pub fn task(ctx: &Context, action: &str, task: &str) -> Result<()> {
    let toggle = ctx.engine.toggle_task(action, task)?;
    if ctx.json {
        return print_json(&serde_json::to_value(&toggle)?);
    }
    if toggle.completed {
        println!("{} {}/{} +{} XP", "[x]".green(), action, task, toggle.experience_gained);
        if let Some(level) = toggle.new_level {
            println!("{} You reached level {}", "LEVEL UP".bold().yellow(), level);
        }
    } else {
        println!("[ ] {}/{}", action, task);
    }
    Ok(())
}

pub fn actions(ctx: &Context) -> Result<()> {
    let completed = ctx.engine.completed_tasks()?;
    if ctx.json {
        return print_json(&serde_json::to_value(&completed)?);
    }
    println!();
    for action in conservation_actions() {
        let done = completed.get(action.id).cloned().unwrap_or_default();
        println!("{} ({})", action.title.bold(), action.id.dimmed());
        for task in action.tasks {
            let mark = if done.iter().any(|id| id == task.id) { "[x]" } else { "[ ]" };
            println!("  {} {:18} {} (+{})", mark, task.id, task.text, task.points);
        }
    }
    println!();
    Ok(())
}

pub fn reflect(ctx: &Context, text: &str) -> Result<()> {
    let reflection = ctx.engine.submit_reflection(text)?;
    if ctx.json {
        return print_json(&serde_json::to_value(&reflection)?);
    }
    println!(
        "Thanks for sharing! +{} XP ({})",
        REFLECTION_EXPERIENCE,
        reflection.id.dimmed()
    );
    Ok(())
}

pub fn config(ctx: &Context, init: bool) -> Result<()> {
    if init {
        let path = ZooQuestConfig::user_config_path().context("Cannot determine config directory")?;
        ctx.config
            .save_to_path(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote {}", path.display());
        return Ok(());
    }
    if ctx.json {
        return print_json(&serde_json::to_value(&ctx.config)?);
    }
    print_kv("data_dir", &ctx.config.storage.data_dir.display().to_string());
    print_kv("temperature", &ctx.config.chat.temperature.to_string());
    print_kv("max_tokens", &ctx.config.chat.max_tokens.to_string());
    print_kv("history", &ctx.config.chat.history_window.to_string());
    print_kv("log_level", &ctx.config.log.level);
    Ok(())
}
