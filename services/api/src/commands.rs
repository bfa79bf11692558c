use crate::infra::{build_supervisor, load_host, load_settings, settings_path};
use auto_priority::assignment::{
    AssignmentEngine, AssignmentPlan, FormulaFailurePolicy, InMemoryHost, Priority,
    ReassignOutcome, SiteId, SiteSnapshot, WorkCategory, WorkHost, WorkSettings,
};
use auto_priority::config::AppConfig;
use auto_priority::error::AppError;
use auto_priority::telemetry;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct RunArgs {
    /// CSV roster to assign
    #[arg(long)]
    pub(crate) roster: PathBuf,
    /// Settings file (defaults to APP_SETTINGS_PATH)
    #[arg(long)]
    pub(crate) settings: Option<PathBuf>,
    /// Override the retry bound
    #[arg(long)]
    pub(crate) max_attempts: Option<u32>,
    /// Rank workers whose formula fails last instead of retrying the pass
    #[arg(long)]
    pub(crate) rank_last: bool,
    /// Print the selection without applying it
    #[arg(long)]
    pub(crate) dry_run: bool,
    /// Emit JSON instead of the text report
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Subcommand, Debug)]
pub(crate) enum SettingsCommand {
    /// Print every configured category
    Show {
        /// Settings file (defaults to APP_SETTINGS_PATH, then work-settings.json)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Set the desired headcount and priority for one category
    Set {
        category: String,
        desired_count: u32,
        priority: u8,
        /// Settings file (defaults to APP_SETTINGS_PATH, then work-settings.json)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
struct RunReport<'a> {
    outcome: &'a ReassignOutcome,
    roster: Vec<SiteSnapshot>,
}

pub(crate) fn run_assignment(args: RunArgs) -> Result<(), AppError> {
    let RunArgs {
        roster,
        settings,
        max_attempts,
        rank_last,
        dry_run,
        json,
    } = args;

    let mut config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    if let Some(max_attempts) = max_attempts {
        config.assignment.max_attempts = max_attempts;
    }
    if rank_last {
        config.assignment.formula_failures = FormulaFailurePolicy::RankLast;
    }

    let host = load_host(Some(roster.as_path()))?;
    let settings_file = settings.or_else(|| config.assignment.settings_path.clone());
    let settings = load_settings(settings_file.as_deref())?;
    let supervisor = build_supervisor(&config.assignment);

    if dry_run {
        let plans = plan_all(&host, &settings, supervisor.engine());
        if json {
            print_json(&plans);
        } else {
            render_plans(&plans);
        }
        return Ok(());
    }

    let outcome = supervisor.reassign(&host, &settings);
    if json {
        print_json(&RunReport {
            outcome: &outcome,
            roster: host.snapshot(),
        });
    } else {
        render_outcome(&outcome, &host, &settings);
    }

    Ok(())
}

pub(crate) fn run_settings(command: SettingsCommand) -> Result<(), AppError> {
    let config = AppConfig::load()?;

    match command {
        SettingsCommand::Show { path } => {
            let path = settings_path(path, &config.assignment);
            let settings = WorkSettings::load_from_path(&path)?;
            println!("Work settings ({})", path.display());
            render_settings(&settings);
        }
        SettingsCommand::Set {
            category,
            desired_count,
            priority,
            path,
        } => {
            let path = settings_path(path, &config.assignment);
            let mut settings = WorkSettings::load_from_path(&path)?;
            settings.set(category.as_str(), desired_count, Priority(priority));
            settings.save_to_path(&path)?;

            let entry = settings.get(&WorkCategory::from(category.as_str()));
            println!(
                "Saved {category}: {} worker(s) at priority {}{} -> {}",
                entry.desired_count,
                entry.priority,
                if entry.is_active() { "" } else { " (inactive)" },
                path.display()
            );
        }
    }

    Ok(())
}

fn plan_all(
    host: &InMemoryHost,
    settings: &WorkSettings,
    engine: &AssignmentEngine,
) -> Vec<AssignmentPlan> {
    let mut plans = Vec::new();
    for site in host.sites() {
        if site.workers.is_empty() {
            continue;
        }
        for (category, entry) in settings.active() {
            plans.push(engine.plan(&site, category, entry));
        }
    }
    plans
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(err) => println!("JSON output unavailable: {err}"),
    }
}

fn render_settings(settings: &WorkSettings) {
    if settings.is_empty() {
        println!("- no categories configured");
        return;
    }

    for (category, entry) in settings.iter() {
        println!(
            "- {category}: {} worker(s) at priority {}{}",
            entry.desired_count,
            entry.priority,
            if entry.is_active() { "" } else { " (inactive)" }
        );
    }
}

fn render_plans(plans: &[AssignmentPlan]) {
    println!("Dry run: no priorities were changed");
    if plans.is_empty() {
        println!("- nothing to assign (no active categories or no workers)");
        return;
    }

    let mut current_site: Option<&SiteId> = None;
    for plan in plans {
        if current_site != Some(&plan.site) {
            println!("\nSite {}", plan.site);
            current_site = Some(&plan.site);
        }

        if plan.blocked {
            println!(
                "  {} (priority {}): skipped, {} formula failure(s)",
                plan.category,
                plan.settings.priority,
                plan.formula_failures.len()
            );
            for failure in &plan.formula_failures {
                println!("    ! {}", failure.detail);
            }
            continue;
        }

        let chosen: Vec<String> = plan
            .chosen
            .iter()
            .map(|ranked| match ranked.score {
                Some(score) => format!("{} ({score:.2})", ranked.worker),
                None => format!("{} (unscored)", ranked.worker),
            })
            .collect();
        println!(
            "  {} (priority {}, want {}): {} | clears {}",
            plan.category,
            plan.settings.priority,
            plan.settings.desired_count,
            if chosen.is_empty() {
                "nobody eligible".to_string()
            } else {
                chosen.join(", ")
            },
            plan.cleared.len()
        );
    }
}

fn render_outcome(outcome: &ReassignOutcome, host: &InMemoryHost, settings: &WorkSettings) {
    println!(
        "Work assignment {} after {} attempt(s) ({} ms)",
        outcome.status.label(),
        outcome.attempts,
        (outcome.finished_at - outcome.started_at).num_milliseconds()
    );
    println!(
        "- {} priority change(s) applied in the final pass",
        outcome.last_pass.mutations
    );

    let active = settings.active_categories();
    if active.is_empty() {
        println!("- no active categories configured; nothing was assigned");
    }

    for snapshot in host.snapshot() {
        println!("\nSite {} ({} workers)", snapshot.site, snapshot.workers.len());
        for category in &active {
            let holders: Vec<&str> = snapshot
                .workers
                .iter()
                .filter(|worker| worker.priority(category).is_assigned())
                .map(|worker| worker.name.as_str())
                .collect();
            println!(
                "  {category} (priority {}): {}",
                settings.get(category).priority,
                if holders.is_empty() {
                    "-".to_string()
                } else {
                    holders.join(", ")
                }
            );
        }
    }

    if !outcome.last_pass.failures.is_empty() {
        println!("\nUnresolved failures:");
        for failure in &outcome.last_pass.failures {
            println!(
                "  - {} / {} / {}: {}",
                failure.site, failure.category, failure.worker, failure.detail
            );
        }
    }
    if !outcome.last_pass.warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &outcome.last_pass.warnings {
            println!(
                "  - {} / {} / {}: {}",
                warning.site, warning.category, warning.worker, warning.detail
            );
        }
    }
}
