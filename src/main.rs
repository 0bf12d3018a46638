use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{FmtSubscriber, filter::EnvFilter};

use narrative_atlas::export::{ExportFormat, export_to_path};
use narrative_atlas::{ChapterRange, EntityKind, Event, FilterSpec, GraphKind, Selection, Session, Settings};

#[derive(Parser)]
#[command(
    name = "narrative-atlas",
    about = "Location, character and activity statistics for narrative event tables"
)]
struct Cli {
    /// Event table (CSV)
    #[arg(long, global = true, default_value = "events.csv")]
    source: PathBuf,

    /// YAML settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Row counts, chapter span and every identified entity
    Summary,
    /// Print the filtered events
    Filter {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Per-entity statistics along one dimension
    Stats {
        /// location, character or activity
        #[arg(long, default_value = "location")]
        by: EntityKind,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Map markers, one per location
    Markers {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Bipartite relationship graph
    Graph {
        /// character-location or location-activity
        #[arg(long, default_value = "character-location")]
        kind: GraphKind,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Grouped summary table
    Rollup {
        #[arg(long, default_value = "location")]
        by: EntityKind,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Write a summary table to a CSV or spreadsheet file
    Export {
        #[arg(long, default_value = "location")]
        by: EntityKind,
        /// csv or spreadsheet
        #[arg(long, default_value = "csv")]
        format: ExportFormat,
        /// Target file; defaults to a name derived from the dimension
        #[arg(long)]
        out: Option<PathBuf>,
        #[command(flatten)]
        filter: FilterArgs,
    },
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// Keep only these locations (repeatable)
    #[arg(long = "location")]
    locations: Vec<String>,
    /// Keep only these characters (repeatable)
    #[arg(long = "character")]
    characters: Vec<String>,
    /// Keep only these activity types (repeatable)
    #[arg(long = "activity")]
    activities: Vec<String>,
    /// Chapter range, e.g. "10-12" or "15"
    #[arg(long)]
    chapters: Option<ChapterRange>,
}

impl FilterArgs {
    /// Unset flags select everything in the table.
    fn to_spec(&self, session: &Session) -> FilterSpec {
        let mut spec = session.everything();
        spec.locations = Selection::from_values(&self.locations);
        spec.characters = Selection::from_values(&self.characters);
        spec.activities = Selection::from_values(&self.activities);
        if let Some(range) = self.chapters {
            spec.chapters = range;
        }
        spec
    }
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("narrative_atlas=info,warn"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("failed to set tracing subscriber: {e}"))?;

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    let session = Session::load(&cli.source, settings)?;

    match cli.command.unwrap_or(Command::Summary) {
        Command::Summary => print_json(&session.summary()),
        Command::Filter { filter } => {
            let subset = select(&session, &filter);
            print_json(&subset)
        }
        Command::Stats { by, filter } => {
            let subset = select(&session, &filter);
            let stats = session.aggregate(&subset, by);
            print_json(&stats.into_vec())
        }
        Command::Markers { filter } => {
            let subset = select(&session, &filter);
            print_json(&session.markers(&subset))
        }
        Command::Graph { kind, filter } => {
            let subset = select(&session, &filter);
            let graph = session.graph(&subset, kind);
            info!(nodes = graph.nodes.len(), edges = graph.edges.len(), "{}", kind.as_chinese());
            print_json(&graph)
        }
        Command::Rollup { by, filter } => {
            let subset = select(&session, &filter);
            print_json(&session.rollup(&subset, by))
        }
        Command::Export {
            by,
            format,
            out,
            filter,
        } => {
            let subset = select(&session, &filter);
            let rows = session.rollup(&subset, by);
            let path = out.unwrap_or_else(|| default_export_name(by, format, &filter));
            export_to_path(&rows, by, format, &session.settings().display, &path)
                .with_context(|| format!("writing {}", path.display()))?;
            eprintln!("  {} ({} rows)", path.display(), rows.len());
            Ok(())
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  HELPERS
// ═══════════════════════════════════════════════════════════════════════

/// Apply the command's filter flags. An empty subset is reported but is
/// still a valid result.
fn select(session: &Session, args: &FilterArgs) -> Vec<Event> {
    let spec = args.to_spec(session);
    let subset = session.filter(&spec);
    if subset.is_empty() {
        warn!(chapters = %spec.chapters, "no events match the filter");
    }
    subset
}

fn print_json<T: serde::Serialize + ?Sized>(data: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(data).context("JSON serialization failed")?;
    println!("{json}");
    Ok(())
}

/// "按地点统计_10-12.csv"; the chapter part is omitted when unrestricted.
fn default_export_name(by: EntityKind, format: ExportFormat, filter: &FilterArgs) -> PathBuf {
    let title = narrative_atlas::rollup::table_title(by);
    let name = match filter.chapters {
        Some(range) => format!("{title}_{range}.{}", format.extension()),
        None => format!("{title}.{}", format.extension()),
    };
    PathBuf::from(name)
}
