use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use editor::settings::EditorSettings;
use editor::{Geometry, MapModel, Services};

/// Cadastral edit history tool
#[derive(Parser, Debug)]
#[command(name = "cedit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Override the configured line scale factor
    #[arg(long, global = true)]
    scale: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay an edit stream and list the resulting features
    Replay {
        /// Stream to read (the autosaved session when omitted)
        file: Option<PathBuf>,
    },

    /// Replay an edit stream and verify the dependency graph
    Check {
        /// Stream to read (the autosaved session when omitted)
        file: Option<PathBuf>,
    },

    /// Undo the latest edits of a stream and write the result
    Undo {
        /// Stream to read (the autosaved session when omitted)
        file: Option<PathBuf>,

        /// Where to write the shortened stream (the autosave file when omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// How many edits to undo
        #[arg(short, long, default_value_t = 1)]
        count: usize,
    },

    /// Print the effective settings
    Settings {
        /// Also save them to the user's config directory
        #[arg(long)]
        write: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut settings = EditorSettings::load();
    if let Some(scale) = cli.scale {
        settings.coordinates.scale_factor = scale;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| settings.logging.filter.as_str().into()),
        )
        .init();

    match run(cli.command, &settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("cedit: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load(file: Option<&Path>, settings: &EditorSettings) -> editor::Result<MapModel> {
    let services = Services::from_settings(settings);
    match file {
        Some(file) => MapModel::load_from(file, services),
        None => MapModel::load_autosave(services),
    }
}

fn describe(file: Option<&Path>) -> String {
    match file {
        Some(file) => file.display().to_string(),
        None => "autosave".into(),
    }
}

fn run(command: Command, settings: &EditorSettings) -> editor::Result<()> {
    match command {
        Command::Replay { file } => {
            let model = load(file.as_deref(), settings)?;
            let unit = settings.units;
            for f in model.active_features() {
                match &f.geometry {
                    Geometry::Point(p) => println!(
                        "{:>6}  point  {:.3} {:.3} {}  ({})",
                        f.id.to_string(),
                        unit.from_meters(p.x),
                        unit.from_meters(p.y),
                        unit.abbrev(),
                        f.entity
                    ),
                    Geometry::Line(l) => {
                        println!("{:>6}  line   {} -> {}  ({})", f.id.to_string(), l.start(), l.end(), f.entity)
                    }
                    Geometry::Text { anchor, text, .. } => {
                        println!("{:>6}  text   at {}  \"{}\"", f.id.to_string(), anchor, text)
                    }
                }
            }
            for e in model.edits() {
                if let Some(adj) = e.adjustment() {
                    println!("edit {}: connection path precision {}", e.id, adj.precision);
                }
            }
            println!("{} edits, {} active features", model.edits().len(), model.active_features().count());
        }
        Command::Check { file } => {
            let model = load(file.as_deref(), settings)?;
            model.check_integrity()?;
            println!("{}: ok ({} edits)", describe(file.as_deref()), model.edits().len());
        }
        Command::Undo { file, out, count } => {
            let mut model = load(file.as_deref(), settings)?;
            for _ in 0..count {
                let undone = model.undo_last()?;
                tracing::info!("Undid {:?}", undone);
            }
            let written = match out {
                Some(out) => {
                    model.save_to(&out)?;
                    out
                }
                None => model.autosave()?,
            };
            println!("wrote {}", written.display());
        }
        Command::Settings { write } => {
            println!("{}", serde_json::to_string_pretty(settings)?);
            if write {
                let path = settings.save()?;
                println!("saved {}", path.display());
            }
        }
    }
    Ok(())
}
