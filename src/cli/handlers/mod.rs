use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::api::{ChecklistApi, ErrorKind, Gateway, HttpTransport};
use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io::{cache_dir, read_config};
use crate::io::session::{clear_session, load_session, save_session};
use crate::io::store::{FileStore, KvStore, atomic_write};
use crate::model::{AppConfig, Checklist, EntityId, PhotoKind, Project, filter_projects};
use crate::ops::aggregate::{SortDirection, SortKey, sort_breakdown, sort_summaries};
use crate::ops::export::{export_file_name, to_csv, to_printable_html};
use crate::ops::reconcile::{Reconciler, SyncError, ToggleOutcome};
use crate::ops::task_ops::find_checklist;
use crate::util::clock::SystemClock;

type CmdResult = Result<(), Box<dyn Error>>;
type Engine = Reconciler<Gateway<HttpTransport>>;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub async fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;
    let config = read_config(cli.config.as_deref())?;
    let dir = cache_dir(&config);
    debug!(dir = %dir.display(), "using state directory");
    let store: Arc<dyn KvStore> = Arc::new(FileStore::new(dir));

    let token = cli.token;

    match cli.command {
        // Session commands work on the stored session directly
        Commands::Login(args) => cmd_login(args, &config, store.as_ref(), json).await,
        Commands::Logout => cmd_logout(store.as_ref(), json),

        Commands::Projects(args) => cmd_projects(&open_engine(&config, store, token)?, &config, args, json).await,
        Commands::Select(args) => cmd_select(&open_engine(&config, store, token)?, &config, args, json).await,
        Commands::Show(args) => cmd_show(&open_engine(&config, store, token)?, args, json).await,
        Commands::Toggle(args) => cmd_toggle(&open_engine(&config, store, token)?, args, json).await,
        Commands::Summary(args) => cmd_summary(&open_engine(&config, store, token)?, args, json).await,
        Commands::Stats => cmd_stats(&open_engine(&config, store, token)?, json).await,
        Commands::Export(args) => cmd_export(&open_engine(&config, store, token)?, args).await,
        Commands::Print(args) => cmd_print(&open_engine(&config, store, token)?, args).await,
        Commands::Photos(args) => cmd_photos(&open_engine(&config, store, token)?, args, json).await,
        Commands::Cache(args) => match args.action {
            CacheAction::Clear => cmd_cache_clear(&open_engine(&config, store, token)?, json),
        },
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn open_engine(config: &AppConfig, store: Arc<dyn KvStore>, token: Option<String>) -> Result<Engine, Box<dyn Error>> {
    let gateway = Gateway::new(HttpTransport::new(&config.api)?);
    let engine = Reconciler::new(gateway, store, Arc::new(SystemClock), config);
    if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
        engine.set_token(token);
    }
    Ok(engine)
}

fn require_token(engine: &Engine) -> Result<String, Box<dyn Error>> {
    engine
        .session()
        .token()
        .map(str::to_string)
        .ok_or_else(|| "No API token. Run `punch login <token>` first.".into())
}

fn selected_project(engine: &Engine) -> Result<Project, Box<dyn Error>> {
    engine
        .session()
        .project
        .ok_or_else(|| "Please select a project first.".into())
}

fn find_loaded(checklists: &[Checklist], id: &str) -> Result<Checklist, Box<dyn Error>> {
    find_checklist(checklists, &EntityId::from(id))
        .cloned()
        .ok_or_else(|| format!("checklist not found: {}", id).into())
}

fn print_json<T: serde::Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Write `content` to `output`, or stdout for `-`
fn write_output(output: &Path, content: &str) -> CmdResult {
    if output == Path::new("-") {
        print!("{}", content);
        return Ok(());
    }
    atomic_write(output, content.as_bytes()).map_err(|e| format!("could not write {}: {}", output.display(), e))?;
    Ok(())
}

fn photo_kind(size: PhotoSize) -> PhotoKind {
    match size {
        PhotoSize::Thumbnail => PhotoKind::Thumbnail,
        PhotoSize::Web => PhotoKind::Web,
        PhotoSize::Original => PhotoKind::Original,
    }
}

// ---------------------------------------------------------------------------
// Session commands
// ---------------------------------------------------------------------------

async fn cmd_login(args: LoginArgs, config: &AppConfig, store: &dyn KvStore, json: bool) -> CmdResult {
    let token = args.token.trim();
    if token.is_empty() {
        return Err("token must not be empty".into());
    }

    let gateway = Gateway::new(HttpTransport::new(&config.api)?);
    gateway.fetch_projects(1, token).await.map_err(|e| match e.kind() {
        ErrorKind::Auth => "Authentication error: the API token was rejected.".to_string(),
        _ => format!("could not verify token: {}", e),
    })?;

    let mut session = load_session(store);
    session.token = Some(token.to_string());
    save_session(store, &session)?;

    if json {
        return print_json(&serde_json::json!({ "logged_in": true }));
    }
    println!("Logged in.");
    Ok(())
}

fn cmd_logout(store: &dyn KvStore, json: bool) -> CmdResult {
    clear_session(store)?;
    if json {
        return print_json(&serde_json::json!({ "logged_in": false }));
    }
    println!("Logged out.");
    Ok(())
}

async fn cmd_projects(engine: &Engine, config: &AppConfig, args: ProjectsArgs, json: bool) -> CmdResult {
    let token = require_token(engine)?;
    let projects = engine
        .api()
        .fetch_projects(config.api.project_limit, &token)
        .await
        .map_err(|e| format!("Failed to fetch projects: {}", e))?;
    let matches = filter_projects(&projects, args.filter.as_deref().unwrap_or(""), args.limit);

    if json {
        return print_json(&matches);
    }
    if matches.is_empty() {
        println!("No projects found.");
        return Ok(());
    }
    for project in matches {
        println!("{}", format_project_line(project));
    }
    Ok(())
}

async fn cmd_select(engine: &Engine, config: &AppConfig, args: SelectArgs, json: bool) -> CmdResult {
    let token = require_token(engine)?;
    let wanted = EntityId::from(args.project_id.trim());
    let projects = engine
        .api()
        .fetch_projects(config.api.project_limit, &token)
        .await
        .map_err(|e| format!("Failed to fetch projects: {}", e))?;
    let project = projects
        .into_iter()
        .find(|p| p.id == wanted)
        .ok_or_else(|| format!("project not found: {}", wanted))?;

    engine.select_project(project.clone());
    if json {
        return print_json(&project);
    }
    println!("Selected {} ({})", project.name, project.id);
    Ok(())
}

// ---------------------------------------------------------------------------
// Checklist commands
// ---------------------------------------------------------------------------

async fn cmd_show(engine: &Engine, args: ShowArgs, json: bool) -> CmdResult {
    let checklists = engine.refresh(args.fresh).await?;
    let project = selected_project(engine)?;

    if json {
        return print_json(&ShowJson {
            project,
            cache_status: engine.cache_status(),
            last_updated: engine.last_updated().map(|t| t.to_rfc3339()),
            stats: engine.overall_stats(),
            checklists: checklists.iter().map(checklist_to_json).collect(),
        });
    }

    println!("{} ({})", project.name, format_status_line(engine.cache_status(), engine.last_updated()));
    if checklists.is_empty() {
        println!("No checklists found for this project.");
        return Ok(());
    }
    println!("{}", format_stats(&engine.overall_stats()));
    let updating = engine.updating();
    for checklist in checklists.iter() {
        println!();
        for line in format_checklist(checklist, &updating) {
            println!("{}", line);
        }
    }
    Ok(())
}

async fn cmd_toggle(engine: &Engine, args: ToggleArgs, json: bool) -> CmdResult {
    let checklists = engine.refresh(false).await?;
    let checklist_id = EntityId::from(args.checklist.as_str());
    let task_id = EntityId::from(args.task.as_str());
    // Unknown ids are rejected by toggle_task
    let currently_completed = find_checklist(&checklists, &checklist_id)
        .and_then(|c| c.find_task(&task_id))
        .is_some_and(|t| t.completed());

    let outcome = engine.toggle_task(&checklist_id, &task_id, currently_completed).await?;
    let notices: Vec<String> = engine.notices().iter().map(format_notice).collect();

    match outcome {
        ToggleOutcome::Confirmed => {
            if json {
                return print_json(&ToggleJson {
                    checklist_id,
                    task_id,
                    completed: !currently_completed,
                    confirmed: true,
                    notices,
                });
            }
            let state = if currently_completed { "incomplete" } else { "complete" };
            println!("Marked task {} {}.", task_id, state);
            Ok(())
        }
        ToggleOutcome::Resynced => Err(notices.join("\n").into()),
        ToggleOutcome::ResyncFailed(err) => {
            Err(format!("{}\nReloading checklists also failed: {}", notices.join("\n"), err).into())
        }
    }
}

async fn cmd_summary(engine: &Engine, args: SummaryArgs, json: bool) -> CmdResult {
    engine.refresh(false).await?;
    let key = match args.sort {
        SummarySort::Name => SortKey::Name,
        SummarySort::Percent => SortKey::Percentage,
    };
    let direction = if args.desc { SortDirection::Descending } else { SortDirection::Ascending };
    let mut summaries = engine.summaries();

    if let Some(name) = args.section {
        let mut summary = summaries
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| format!("section not found: {}", name))?;
        sort_breakdown(&mut summary, key, direction);
        if json {
            return print_json(&summary);
        }
        for line in format_section_detail(&summary) {
            println!("{}", line);
        }
        return Ok(());
    }

    sort_summaries(&mut summaries, key, direction);
    if json {
        return print_json(&summaries);
    }
    if summaries.is_empty() {
        println!("No sections found.");
        return Ok(());
    }
    for line in format_summary_rows(&summaries) {
        println!("{}", line);
    }
    Ok(())
}

async fn cmd_stats(engine: &Engine, json: bool) -> CmdResult {
    let checklists = engine.refresh(false).await?;
    let stats = engine.overall_stats();
    if json {
        return print_json(&stats);
    }
    println!("{} checklists", checklists.len());
    println!("{}", format_stats(&stats));
    Ok(())
}

async fn cmd_export(engine: &Engine, args: ExportArgs) -> CmdResult {
    let checklists = engine.refresh(false).await?;
    let checklist = find_loaded(&checklists, &args.checklist)?;
    let output = args.output.unwrap_or_else(|| PathBuf::from(export_file_name(&checklist)));
    write_output(&output, &to_csv(&checklist))?;
    if output != Path::new("-") {
        eprintln!("Exported {} tasks to {}", checklist.task_counts().1, output.display());
    }
    Ok(())
}

async fn cmd_print(engine: &Engine, args: PrintArgs) -> CmdResult {
    let checklists = engine.refresh(false).await?;
    let checklist = find_loaded(&checklists, &args.checklist)?;
    let project = selected_project(engine)?;
    let html = to_printable_html(&checklist, &project.name);
    let output = args.output.unwrap_or_else(|| PathBuf::from("-"));
    write_output(&output, &html)
}

async fn cmd_photos(engine: &Engine, args: PhotosArgs, json: bool) -> CmdResult {
    let kind = photo_kind(args.kind);

    let photos = match args.task {
        Some(task) => {
            let checklists = engine.refresh(false).await?;
            let task_id = EntityId::from(task.as_str());
            let task = checklists
                .iter()
                .find_map(|c| c.find_task(&task_id))
                .ok_or_else(|| format!("task not found: {}", task_id))?;
            if task.has_photos() {
                task.photos.clone()
            } else {
                engine.fetch_task_photos(&task_id).await;
                engine.task_photos(&task_id).unwrap_or_default()
            }
        }
        None => match engine.project_photos().await {
            Ok(photos) => photos,
            Err(SyncError::NoPhotos) => Vec::new(),
            Err(e) => return Err(e.into()),
        },
    };

    let rows = photos_to_json(&photos, kind);
    if json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("{}", SyncError::NoPhotos);
        return Ok(());
    }
    for row in rows {
        println!("{}", row.url);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

fn cmd_cache_clear(engine: &Engine, json: bool) -> CmdResult {
    engine.clear_cache()?;
    if json {
        let project = selected_project(engine)?;
        return print_json(&serde_json::json!({ "cleared": true, "project_id": project.id }));
    }
    for notice in engine.notices() {
        println!("{}", format_notice(&notice));
    }
    Ok(())
}
