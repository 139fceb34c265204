//! habitrack - command-line client for the habitrack goal and habit tracker.
//!
//! Signs in against the habitrack REST backend and lists goals, today's
//! processes and standards, reflections, and progress statistics.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use habitrack_core::api::{ApiClient, ApiError};
use habitrack_core::auth::Session;
use habitrack_core::config::Config;
use habitrack_core::models::{GoalType, LoginCredentials, ReflectionPeriod, ReflectionType, Registration};
use habitrack_core::routes::{guard, Navigation, Route};
use habitrack_core::stores::{GamificationStore, GoalsStore, ReflectionsStore, StandardsStore};
use habitrack_core::utils::{check_mark, format_date, format_date_range, progress_bar, truncate_string};

// ============================================================================
// Constants
// ============================================================================

/// Width of titles in list output
const TITLE_WIDTH: usize = 48;

/// Width of text progress bars
const BAR_WIDTH: usize = 20;

const USAGE: &str = "\
Usage: habitrack <command> [args]

Commands:
  login [username]           Sign in (prompts for the password)
  register                   Create an account and sign in
  logout                     Sign out and forget stored tokens
  whoami                     Show the signed-in user
  goals                      List goals by hierarchy level
  today                      Today's daily processes and standards
  standards                  List standards by category
  reflections [start end]    Latest reflections, or those starting in a date range
  period <type>              Current weekly|monthly|quarterly|yearly period
  stats                      Goal, standard and points statistics

Environment:
  HABITRACK_API_URL          Backend base URL (default http://localhost:8000/api)
  RUST_LOG                   Log filter, e.g. RUST_LOG=habitrack_core=debug";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

/// Everything a command needs, built once at startup.
struct App {
    config: Config,
    session: Arc<Session>,
    api: ApiClient,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        println!("{}", USAGE);
        return Ok(());
    };
    if matches!(command, "help" | "--help" | "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = Config::load().context("Failed to load configuration")?;
    let api_url = config.api_url();
    info!(api_url = %api_url, "habitrack starting");

    let session = Arc::new(Session::new(api_url, config.token_store()?)?);
    if let Err(e) = session.restore() {
        debug!(error = %e, "No stored session");
    }
    let api = ApiClient::new(session.clone());
    let mut app = App { config, session, api };

    let rest = &args[1..];
    if let Some(route) = route_for(command) {
        check_access(&app, route)?;
    }

    match command {
        "login" => login(&mut app, rest.first().cloned()).await,
        "register" => register(&mut app).await,
        "logout" => {
            app.session.logout();
            println!("Signed out.");
            Ok(())
        }
        "whoami" => whoami(&app).await,
        "goals" => goals(&app).await,
        "today" => today(&app).await,
        "standards" => standards(&app).await,
        "reflections" => reflections(&app, rest).await,
        "period" => period(rest),
        "stats" => stats(&app).await,
        other => bail!("Unknown command '{}'\n\n{}", other, USAGE),
    }
}

/// Screen each command stands for; commands without one are never gated.
fn route_for(command: &str) -> Option<Route> {
    match command {
        "login" => Some(Route::Login),
        "register" => Some(Route::Register),
        "whoami" => Some(Route::Profile),
        "goals" => Some(Route::Goals),
        "today" | "stats" => Some(Route::Dashboard),
        "standards" => Some(Route::Standards),
        "reflections" => Some(Route::Reflections),
        _ => None,
    }
}

fn check_access(app: &App, route: Route) -> Result<()> {
    match guard(route, app.session.is_authenticated()) {
        Navigation::Proceed => Ok(()),
        Navigation::Redirect { to: Route::Login, redirect } => {
            debug!(?redirect, "not signed in");
            bail!("Not signed in. Run `habitrack login` first.")
        }
        Navigation::Redirect { .. } => {
            let who = app
                .config
                .last_username
                .clone()
                .unwrap_or_else(|| "an existing account".to_string());
            bail!("Already signed in as {}. Run `habitrack logout` first.", who)
        }
    }
}

/// Turn a failed store action into a CLI error, preferring the store's message.
fn report<T>(result: Result<T, ApiError>, message: Option<&str>) -> Result<T> {
    result.map_err(|e| match e {
        ApiError::Unauthorized | ApiError::RefreshFailed(_) => {
            anyhow::anyhow!("Session expired. Run `habitrack login` to sign in again.")
        }
        other => match message {
            Some(m) => anyhow::anyhow!("{}", m),
            None => anyhow::anyhow!(other),
        },
    })
}

fn prompt(label: &str, default: Option<&str>) -> Result<String> {
    match default {
        Some(d) => print!("{} [{}]: ", label, d),
        None => print!("{}: ", label),
    }
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let value = line.trim();
    match (value.is_empty(), default) {
        (true, Some(d)) => Ok(d.to_string()),
        (true, None) => bail!("{} is required", label),
        (false, _) => Ok(value.to_string()),
    }
}

fn prompt_optional(label: &str) -> Result<Option<String>> {
    print!("{} (optional): ", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let value = line.trim();
    Ok((!value.is_empty()).then(|| value.to_string()))
}

// ============================================================================
// Account commands
// ============================================================================

async fn login(app: &mut App, username: Option<String>) -> Result<()> {
    let username = match username {
        Some(u) => u,
        None => prompt("Username", app.config.last_username.as_deref())?,
    };
    let password = rpassword::prompt_password("Password: ")?;

    if !app.session.login(&LoginCredentials::new(username.clone(), password)).await {
        let message = app.session.last_error().unwrap_or_else(|| "Login failed".to_string());
        bail!("{}", message);
    }

    app.config.last_username = Some(username.clone());
    app.config.save()?;

    let name = app
        .session
        .user()
        .map(|u| u.display_name())
        .unwrap_or(username);
    println!("Signed in as {}.", name);
    if let Some(warning) = app.session.last_error() {
        eprintln!("Warning: {}", warning);
    }
    Ok(())
}

async fn register(app: &mut App) -> Result<()> {
    let username = prompt("Username", None)?;
    let email = prompt("Email", None)?;
    let first_name = prompt_optional("First name")?;
    let last_name = prompt_optional("Last name")?;
    let password = rpassword::prompt_password("Password: ")?;
    let password2 = rpassword::prompt_password("Confirm password: ")?;

    let registration = Registration {
        username: username.clone(),
        email,
        password,
        password2,
        first_name,
        last_name,
    };
    if !app.session.register(&registration).await {
        let message = app
            .session
            .last_error()
            .unwrap_or_else(|| "Registration failed".to_string());
        bail!("{}", message);
    }

    app.config.last_username = Some(username.clone());
    app.config.save()?;
    println!("Account created. Signed in as {}.", username);
    Ok(())
}

async fn whoami(app: &App) -> Result<()> {
    let result = app.api.fetch_user().await;
    let error = app.session.last_error();
    let user = report(result, error.as_deref())?;
    println!("{} ({})", user.display_name(), user.username);
    if let Some(email) = user.email.as_deref().filter(|e| !e.is_empty()) {
        println!("  Email:    {}", email);
    }
    if let Some(tz) = user.timezone.as_deref() {
        println!("  Timezone: {}", tz);
    }
    if let Some(time) = user.preferred_reminder_time.as_deref() {
        println!("  Reminder: {}", time);
    }
    Ok(())
}

// ============================================================================
// Resource commands
// ============================================================================

async fn goals(app: &App) -> Result<()> {
    let mut store = GoalsStore::new(app.api.clone());
    let result = store.fetch_all_goals().await;
    report(result, store.error.as_deref())?;

    for goal_type in GoalType::ALL {
        let goals = store.goals.of_type(goal_type);
        println!("{} ({})", goal_type.display_name(), goals.len());
        for goal in goals {
            println!(
                "  {} {:<width$} {} -> {}",
                check_mark(goal.is_completed),
                truncate_string(&goal.title, TITLE_WIDTH),
                format_date(goal.start_date),
                format_date(goal.target_date),
                width = TITLE_WIDTH,
            );
            let children = store.child_goals(&goal.id);
            if !children.is_empty() {
                println!("      {} sub-goal(s)", children.len());
            }
        }
        println!();
    }
    Ok(())
}

async fn today(app: &App) -> Result<()> {
    let mut goals = GoalsStore::new(app.api.clone());
    let mut standards = StandardsStore::new(app.api.clone());

    let (progress, (standard_list, standard_progress)) = tokio::join!(
        goals.fetch_today_progress(),
        async {
            let listed = standards.fetch_standards().await;
            (listed, standards.fetch_today_progress().await)
        },
    );
    report(progress, goals.error.as_deref())?;
    report(standard_list, standards.error.as_deref())?;
    report(standard_progress, standards.error.as_deref())?;

    println!("Today, {}", format_date(Local::now().date_naive()));
    println!();
    println!("Daily processes");
    if goals.daily_progress.is_empty() {
        println!("  (none scheduled)");
    }
    for entry in &goals.daily_progress {
        let title = entry.process_title.as_deref().unwrap_or(&entry.process);
        let spent = if entry.time_spent_minutes > 0 {
            format!(" ({} min)", entry.time_spent_minutes)
        } else {
            String::new()
        };
        println!(
            "  {} {}{}",
            check_mark(entry.is_completed),
            truncate_string(title, TITLE_WIDTH),
            spent
        );
    }

    println!();
    println!("Daily standards");
    let by_standard = standards.today_progress_by_standard();
    let daily = standards.daily_standards();
    if daily.is_empty() {
        println!("  (none)");
    }
    for standard in daily {
        let done = by_standard
            .get(standard.id.as_str())
            .is_some_and(|p| p.is_completed);
        println!(
            "  {} {:<width$} {}",
            check_mark(done),
            truncate_string(&standard.title, TITLE_WIDTH),
            standard.category_name(),
            width = TITLE_WIDTH,
        );
    }
    Ok(())
}

async fn standards(app: &App) -> Result<()> {
    let mut store = StandardsStore::new(app.api.clone());
    let result = store.fetch_standards().await;
    report(result, store.error.as_deref())?;

    for (category, standards) in store.standards_by_category() {
        println!("{}", category);
        for standard in standards {
            let inactive = if standard.is_active { "" } else { " (inactive)" };
            println!(
                "  {:<width$} {:?}{}",
                truncate_string(&standard.title, TITLE_WIDTH),
                standard.frequency,
                inactive,
                width = TITLE_WIDTH,
            );
        }
    }
    Ok(())
}

async fn reflections(app: &App, args: &[String]) -> Result<()> {
    let range = match args {
        [] => None,
        [start, end] => Some((parse_date(start)?, parse_date(end)?)),
        _ => bail!("Usage: habitrack reflections [start end] (dates as YYYY-MM-DD)"),
    };

    let mut store = ReflectionsStore::new(app.api.clone());
    let result = store.fetch_all_reflections().await;
    report(result, store.error.as_deref())?;

    let shown = match range {
        Some((start, end)) => store.reflections_in_range(start, end),
        None => store.latest_reflections(),
    };
    if shown.is_empty() {
        println!("No reflections found.");
    }
    for reflection in shown {
        println!(
            "{:<10} {}",
            reflection.reflection_type.as_str(),
            format_date_range(reflection.start_date, reflection.end_date)
        );
        if !reflection.content.is_empty() {
            println!("  {}", truncate_string(&reflection.content, TITLE_WIDTH * 2));
        }
        for highlight in &reflection.highlights {
            println!("  + {}", highlight);
        }
        for challenge in &reflection.challenges {
            println!("  - {}", challenge);
        }
    }
    Ok(())
}

fn period(args: &[String]) -> Result<()> {
    let kind = args
        .first()
        .and_then(|s| s.parse::<ReflectionType>().ok())
        .context("Usage: habitrack period <weekly|monthly|quarterly|yearly>")?;
    let period = ReflectionPeriod::containing(kind, Local::now().date_naive());
    println!(
        "{} {} ({} to {})",
        kind.as_str(),
        format_date_range(period.start_date, period.end_date),
        period.start_date,
        period.end_date
    );
    Ok(())
}

async fn stats(app: &App) -> Result<()> {
    let mut goals = GoalsStore::new(app.api.clone());
    let mut standards = StandardsStore::new(app.api.clone());
    let mut game = GamificationStore::new(app.api.clone());

    let (goal_result, standard_result, game_result) =
        tokio::join!(goals.fetch_stats(), standards.fetch_stats(), game.fetch_stats());
    report(goal_result, goals.error.as_deref())?;
    report(standard_result, standards.error.as_deref())?;
    report(game_result, game.error.as_deref())?;

    println!(
        "Goals      {} ({}/{} completed)",
        progress_bar(goals.stats.completion_rate, BAR_WIDTH),
        goals.stats.completed_goals,
        goals.stats.total_goals
    );
    println!(
        "Standards  {} (streak {} days)",
        progress_bar(standards.stats.completion_rate, BAR_WIDTH),
        standards.stats.current_streak
    );

    let profile = &game.stats.profile;
    println!(
        "Level {}   {} points, {} to next level (longest streak {} days)",
        profile.level,
        profile.total_points,
        game.stats.points_remaining(),
        profile.longest_streak
    );
    for unlocked in &game.stats.recent_achievements {
        println!(
            "  * {} ({})",
            unlocked.achievement.name,
            format_date(unlocked.unlocked_at.date_naive())
        );
    }
    Ok(())
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}
