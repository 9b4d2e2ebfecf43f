use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use directing::{
    history_labels, restore_version, run_batch, set_current_plan, BatchSummary, DirectingDesk, DirectingService,
    HttpProviderFactory, MockConfig, MockDirectingProvider, RoutingService,
};
use project::{ArtifactKey, ConsoleContext, ProjectDb, WorkingCopy};
use publish::{GitPublisher, PublishRequest, PublishResponse};
use std::path::PathBuf;
use std::sync::Arc;
use timeline::{
    clock, fit_document, format_seconds, layout_document, scene_duration, DirectorDocument, LayoutParams, Mode,
    step_zoom, Ruler, TimelineLayout, TrackKind, ZoomStep, DEFAULT_ZOOM,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sft-console")]
#[command(about = "SFT Console - editorial timeline, directing and versioning from the terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Store location
    #[arg(long, global = true, env = "SFT_CONSOLE_DB")]
    db: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or list projects
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Store a director document (JSON) for a project
    Import {
        project: String,
        file: PathBuf,
    },

    /// Print the timeline layout and ruler of a project
    Timeline {
        project: String,

        /// Pixels per second
        #[arg(long, conflicts_with = "fit")]
        zoom: Option<f64>,

        /// Fit the whole timeline into a viewport this many pixels wide
        #[arg(long)]
        fit: Option<f64>,

        /// Zoom in or out by one step after sizing; repeatable
        #[arg(long = "step", value_name = "in|out")]
        steps: Vec<ZoomStep>,

        /// Report the clip under a point in content coordinates
        #[arg(long, value_name = "X,Y", value_parser = parse_point)]
        at: Option<(f64, f64)>,

        /// Dump the layout as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Snapshot, list, restore and apply versioned artifacts
    ///
    /// Keys: `settings`, `prompt:<general|experience|style>`,
    /// `stage:<project>:<stage>:<type>`.
    Snapshot {
        #[command(subcommand)]
        action: SnapshotAction,
    },

    /// Generate a directing plan for one scene
    Direct {
        project: String,
        scene: String,

        #[arg(long, default_value = "general")]
        mode: Mode,

        /// Use the offline mock provider
        #[arg(long)]
        mock: bool,
    },

    /// Generate plans for every target scene of a mode ("Gen All")
    DirectAll {
        project: String,

        #[arg(long, default_value = "general")]
        mode: Mode,

        #[arg(long)]
        mock: bool,
    },

    /// Inspect or change a scene's plan history
    Plan {
        #[command(subcommand)]
        action: PlanAction,
    },

    /// Commit and push the configured local folder to GitHub
    Publish,
}

#[derive(Subcommand)]
enum ProjectAction {
    New { title: String },
    List,
}

#[derive(Subcommand)]
enum SnapshotAction {
    /// Snapshot the live content of a key
    Save {
        key: String,
        #[arg(short, long)]
        label: Option<String>,
    },
    List {
        key: String,
    },
    /// Print a snapshot, optionally making it live
    Restore {
        key: String,
        id: i64,
        #[arg(long)]
        apply: bool,
    },
    /// Make the content of a file live for a key
    Apply {
        key: String,
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum PlanAction {
    History {
        project: String,
        scene: String,
        #[arg(long, default_value = "general")]
        mode: Mode,
    },
    Restore {
        project: String,
        scene: String,
        id: i64,
        #[arg(long, default_value = "general")]
        mode: Mode,
    },
    /// Replace the current plan with JSON from a file; history is kept
    Edit {
        project: String,
        scene: String,
        file: PathBuf,
        #[arg(long, default_value = "general")]
        mode: Mode,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let db_path = cli.db.unwrap_or_else(project::default_db_path);
    let db = ProjectDb::open_or_create(&db_path)
        .with_context(|| format!("failed to open store at {}", db_path.display()))?;
    info!("Using store {}", db_path.display());

    match cli.command {
        Commands::Project { action } => project_command(&db, action),
        Commands::Import { project, file } => import_command(&db, &project, file),
        Commands::Timeline {
            project,
            zoom,
            fit,
            steps,
            at,
            json,
        } => {
            let view = TimelineView { zoom, fit, steps, at };
            timeline_command(&db, &project, &view, json)
        }
        Commands::Snapshot { action } => snapshot_command(&db, action),
        Commands::Direct {
            project,
            scene,
            mode,
            mock,
        } => direct_command(&db, &ConsoleContext::for_project(project).with_scene(scene), mode, mock).await,
        Commands::DirectAll { project, mode, mock } => direct_all_command(&db, &project, mode, mock).await,
        Commands::Plan { action } => plan_command(&db, action),
        Commands::Publish => publish_command(&db).await,
    }
}

fn project_command(db: &ProjectDb, action: ProjectAction) -> Result<()> {
    match action {
        ProjectAction::New { title } => {
            let info = db.create_project(&title)?;
            println!("{}", info.id);
        }
        ProjectAction::List => {
            for p in db.list_projects()? {
                println!(
                    "{}  {}  (updated {})",
                    p.id,
                    p.title,
                    p.updated_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
    }
    Ok(())
}

fn import_command(db: &ProjectDb, project_id: &str, file: PathBuf) -> Result<()> {
    db.require_project(project_id)?;
    let raw = std::fs::read_to_string(&file).with_context(|| format!("failed to read {}", file.display()))?;
    db.import_director_document(project_id, &raw)?;
    // Loading once runs the backfill and stores its result.
    let doc = db.load_director_document(project_id)?;
    println!(
        "Imported {} sequence(s), {} scene(s), total {}",
        doc.sequences.len(),
        doc.scene_count(),
        format_seconds(timeline::total_duration(&doc))
    );
    Ok(())
}

/// How the `timeline` command sizes the layout and what it points at.
#[derive(Debug, Clone, Default)]
struct TimelineView {
    zoom: Option<f64>,
    fit: Option<f64>,
    steps: Vec<ZoomStep>,
    at: Option<(f64, f64)>,
}

impl TimelineView {
    fn zoom_for(&self, doc: &DirectorDocument, params: &LayoutParams) -> f64 {
        let base = match (self.zoom, self.fit) {
            (_, Some(viewport)) => fit_document(doc, viewport, DEFAULT_ZOOM, params),
            (Some(z), None) => timeline::clamp_zoom(z),
            (None, None) => DEFAULT_ZOOM,
        };
        self.steps.iter().fold(base, |zoom, step| step_zoom(zoom, *step))
    }
}

fn parse_point(raw: &str) -> Result<(f64, f64), String> {
    let (x, y) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got '{raw}'"))?;
    let coord = |v: &str| v.trim().parse::<f64>().map_err(|e| format!("bad coordinate '{v}': {e}"));
    Ok((coord(x)?, coord(y)?))
}

fn timeline_command(db: &ProjectDb, project_id: &str, view: &TimelineView, json: bool) -> Result<()> {
    let doc = db.load_director_document(project_id)?;
    let params = LayoutParams::default();
    let layout = layout_document(&doc, view.zoom_for(&doc, &params), &params);

    if let Some((x, y)) = view.at {
        println!("{}", describe_hit(&layout, x, y));
        return Ok(());
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&layout)?);
        return Ok(());
    }
    print!("{}", render_layout(&doc, &layout, &params));
    Ok(())
}

fn describe_hit(layout: &TimelineLayout, x: f64, y: f64) -> String {
    match layout.hit_test(x, y) {
        Some(clip) => format!(
            "{} {:?} x={:.0} w={:.0} {}",
            clip.scene_id,
            clip.track,
            clip.x,
            clip.width,
            format_seconds(clip.duration)
        ),
        None => format!("nothing at ({x:.0}, {y:.0})"),
    }
}

fn render_layout(doc: &DirectorDocument, layout: &TimelineLayout, params: &LayoutParams) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "zoom {:.2} px/s, total {} ({}), width {:.0}px\n",
        layout.zoom,
        format_seconds(layout.total_duration),
        clock::label(layout.total_duration),
        layout.content_width
    ));
    for (span, seq) in layout.spans.iter().zip(&doc.sequences) {
        out.push_str(&format!(
            "\n[{}] {} scene(s) @ x={:.0} w={:.0}  {}\n",
            span.title, span.scene_count, span.x, span.width, span.caption
        ));
        for scene in &seq.scenes {
            let Some(clip) = layout.clip_for(&scene.formatted_id, TrackKind::Scene) else {
                continue;
            };
            let marks: String = [
                (TrackKind::Experience, 'X'),
                (TrackKind::AiGeneral, 'G'),
                (TrackKind::AiExperience, 'E'),
            ]
            .iter()
            .map(|(track, c)| if layout.clip_for(&scene.formatted_id, *track).is_some() { *c } else { '.' })
            .collect();
            out.push_str(&format!(
                "  {:<10} x={:>7.0} w={:>6.0} {:>7} {}{}\n",
                scene.formatted_id,
                clip.x,
                clip.width,
                format_seconds(scene_duration(scene)),
                marks,
                if scene.is_screen_rec { "  (screen rec)" } else { "" }
            ));
        }
    }

    let ruler = Ruler::new(layout.zoom, layout.total_duration, *params);
    let labels: Vec<String> = ruler.ticks().filter_map(|t| t.label).collect();
    out.push_str(&format!(
        "\nruler: {} tick(s) to {}s, labels: {}\n",
        ruler.ticks().len(),
        ruler.end_seconds(),
        labels.join(" ")
    ));
    out
}

fn parse_key(raw: &str) -> Result<ArtifactKey> {
    raw.parse::<ArtifactKey>()
        .with_context(|| format!("'{raw}' is not a valid key (settings | prompt:<scope> | stage:<project>:<stage>:<type>)"))
}

fn snapshot_command(db: &ProjectDb, action: SnapshotAction) -> Result<()> {
    match action {
        SnapshotAction::Save { key, label } => {
            let copy = WorkingCopy::open(db, parse_key(&key)?)?;
            let entry = copy.record_snapshot(db, label.as_deref())?;
            println!("saved snapshot {} ({})", entry.id, entry.label);
        }
        SnapshotAction::List { key } => {
            let key = parse_key(&key)?;
            let entries = db.list_snapshots(&key)?;
            if entries.is_empty() {
                println!("no snapshots for {key}");
            }
            for numbered in project::numbered_newest_first(&entries) {
                println!("{:>6}  {}", numbered.entry.id, numbered.display_label());
            }
        }
        SnapshotAction::Restore { key, id, apply } => {
            let mut copy = WorkingCopy::open(db, parse_key(&key)?)?;
            let entry = copy.restore_snapshot(db, id)?;
            if apply {
                copy.apply_live(db)?;
                println!("snapshot {} ({}) is now live", entry.id, entry.label);
            } else {
                println!("{}", copy.content());
            }
        }
        SnapshotAction::Apply { key, file } => {
            let mut copy = WorkingCopy::open(db, parse_key(&key)?)?;
            let content =
                std::fs::read_to_string(&file).with_context(|| format!("failed to read {}", file.display()))?;
            copy.edit(content);
            copy.apply_live(db)?;
            println!("applied {} to {}", file.display(), copy.key());
        }
    }
    Ok(())
}

fn build_desk(mock: bool) -> DirectingDesk {
    let service: Arc<dyn DirectingService> = if mock {
        Arc::new(MockDirectingProvider::new(MockConfig::default()))
    } else {
        Arc::new(RoutingService::new(HttpProviderFactory))
    };
    DirectingDesk::new(service)
}

async fn direct_command(db: &ProjectDb, ctx: &ConsoleContext, mode: Mode, mock: bool) -> Result<()> {
    let (project_id, scene_id) = (ctx.project()?, ctx.scene()?);
    let mut doc = db.load_director_document(project_id)?;
    if doc.scene(scene_id).is_none() {
        bail!("scene {scene_id} not found in project {project_id}");
    }
    let prompts = db.load_prompts()?;
    let config = db.load_settings()?.ai_config;
    let desk = build_desk(mock);

    let scene_id_owned = scene_id.to_string();
    let (doc, outcome) = tokio::task::spawn_blocking(move || {
        let outcome = match doc.scene_mut(&scene_id_owned) {
            Some(scene) => desk.request_directing(scene, mode, &prompts, &config).map(Some),
            None => Ok(None),
        };
        (doc, outcome)
    })
    .await?;

    match outcome? {
        Some(record) => {
            db.save_director_document(project_id, &doc)?;
            println!("{}", serde_json::to_string_pretty(&record.data)?);
            info!("Plan {} recorded for {} ({}) by {}", record.id, scene_id, mode, record.model);
        }
        None => bail!("scene {scene_id} disappeared during directing"),
    }
    Ok(())
}

async fn direct_all_command(db: &ProjectDb, project_id: &str, mode: Mode, mock: bool) -> Result<()> {
    let doc = db.load_director_document(project_id)?;
    let prompts = db.load_prompts()?;
    let config = db.load_settings()?.ai_config;
    let desk = build_desk(mock);

    let (doc, summary): (DirectorDocument, BatchSummary) = tokio::task::spawn_blocking(move || {
        let mut doc = doc;
        let mut progress = |done: usize, total: usize, scene: &str| println!("[{done}/{total}] {scene}");
        let summary = run_batch(&desk, &mut doc, mode, &prompts, &config, Some(&mut progress));
        (doc, summary)
    })
    .await?;

    db.save_director_document(project_id, &doc)?;
    for (scene, err) in &summary.failures {
        warn!("{} failed: {}", scene, err);
    }
    println!("Success: {}, Failed: {}", summary.success, summary.failed);
    Ok(())
}

fn plan_command(db: &ProjectDb, action: PlanAction) -> Result<()> {
    match action {
        PlanAction::History { project, scene, mode } => {
            let doc = db.load_director_document(&project)?;
            let scene = doc
                .scene(&scene)
                .with_context(|| format!("scene {scene} not found"))?;
            let labels = history_labels(scene, mode);
            if labels.is_empty() {
                println!("no {mode} plans for {}", scene.formatted_id);
            }
            for entry in labels {
                println!("{:>14}  {}", entry.id, entry.label);
            }
        }
        PlanAction::Restore { project, scene, id, mode } => {
            let mut doc = db.load_director_document(&project)?;
            let target = doc.require_scene_mut(&scene)?;
            restore_version(target, mode, id)?;
            db.save_director_document(&project, &doc)?;
            println!("restored plan {id} for {scene} ({mode})");
        }
        PlanAction::Edit {
            project,
            scene,
            file,
            mode,
        } => {
            let raw = std::fs::read_to_string(&file).with_context(|| format!("failed to read {}", file.display()))?;
            let mut doc = db.load_director_document(&project)?;
            set_current_plan(doc.require_scene_mut(&scene)?, mode, &raw)?;
            db.save_director_document(&project, &doc)?;
            println!("current {mode} plan for {scene} replaced");
        }
    }
    Ok(())
}

async fn publish_command(db: &ProjectDb) -> Result<()> {
    let settings = db.load_settings()?;
    let request = PublishRequest::from_settings(&settings.github_config)?;
    let response: PublishResponse = tokio::task::spawn_blocking(move || {
        GitPublisher::new()
            .and_then(|git| git.publish(&request))
            .unwrap_or_else(PublishResponse::from)
    })
    .await?;
    println!("{}", response.message);
    if !response.success {
        bail!("publish failed");
    }
    Ok(())
}
