/// sliceview - place, pack and slice STL models from the terminal
///
/// Controls in the viewer:
///   - WASD / Arrow Keys: Orbit, +/-: Zoom
///   - M: Toggle view/slicing mode, P: Pack, E: Export slices
///   - Tab / Backspace: Select next model / clear selection
///   - [ ]: Scale, J/L U/O I/K: Move along x y z, , .: Clipping plane
///   - { }: Halve / double the slicing step, H: Hide or show models
///   - Ctrl+C / Ctrl+V: Copy / paste the selected model
///   - Esc: Cancel export or quit, Q: Quit

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sliceview_core::{stl, Mode, Settings, Viewer};
use sliceview_terminal::TerminalApp;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

const DEFAULT_FILTER: &str = "sliceview=info,sliceview_core=info,sliceview_terminal=info";

#[derive(Parser)]
#[command(name = "sliceview")]
#[command(about = "Place, pack and slice STL models in the terminal", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Settings file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write logs to this file while the viewer is open
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,

    /// STL files to open in the viewer
    files: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open STL files in the interactive viewer
    View {
        /// STL files to load
        files: Vec<PathBuf>,

        /// Directory receiving exported archives
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// Slice STL files without opening the viewer
    Export {
        /// STL files to load
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output archive, or a directory to place it in
        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// Slice spacing in workspace units
        #[arg(long)]
        step: Option<f32>,

        /// Slice image width in pixels
        #[arg(long)]
        width: Option<u32>,

        /// Slice image height in pixels
        #[arg(long)]
        height: Option<u32>,

        /// Zero padding of slice indices
        #[arg(long)]
        digits: Option<usize>,
    },

    /// Print triangle count and bounds of an STL file
    Info {
        /// STL file to inspect
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };

    match cli.command {
        Some(Commands::View { files, out }) => {
            init_file_logging(cli.log_file.as_deref())?;
            view(settings, &files, out)
        }
        None => {
            init_file_logging(cli.log_file.as_deref())?;
            view(settings, &cli.files, PathBuf::from("."))
        }
        Some(Commands::Export {
            files,
            out,
            step,
            width,
            height,
            digits,
        }) => {
            init_stderr_logging();
            let overrides = SliceOverrides {
                step,
                width,
                height,
                digits,
            };
            export(overrides.apply(settings), &files, &out)
        }
        Some(Commands::Info { file }) => {
            init_stderr_logging();
            describe(&file)
        }
    }
}

fn env_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into())
}

/// The viewer owns the terminal, so logs only go to a file when asked.
fn init_file_logging(path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = fs::File::create(path)
        .with_context(|| format!("failed to create log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

fn load_models(viewer: &mut Viewer, files: &[PathBuf]) -> Result<()> {
    for path in files {
        let data = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let id = viewer
            .upload_stl(&data)
            .with_context(|| format!("failed to load {}", path.display()))?;
        info!(%id, path = %path.display(), "loaded model");
    }
    Ok(())
}

fn view(settings: Settings, files: &[PathBuf], out: PathBuf) -> Result<()> {
    let mut viewer = Viewer::new(settings, (1, 1))?;
    load_models(&mut viewer, files)?;

    let mut app = TerminalApp::new(viewer, out)?;
    app.run()?;
    Ok(())
}

/// Command line replacements for the configured slicing settings
struct SliceOverrides {
    step: Option<f32>,
    width: Option<u32>,
    height: Option<u32>,
    digits: Option<usize>,
}

impl SliceOverrides {
    fn apply(self, mut settings: Settings) -> Settings {
        let slicing = &mut settings.slicing;
        if let Some(step) = self.step {
            slicing.step = step;
        }
        if let Some(width) = self.width {
            slicing.width_resolution = width;
        }
        if let Some(height) = self.height {
            slicing.height_resolution = height;
        }
        if let Some(digits) = self.digits {
            slicing.digits = digits;
        }
        // Nobody watches a headless export
        slicing.view_slice = false;
        settings
    }
}

fn export(settings: Settings, files: &[PathBuf], out: &Path) -> Result<()> {
    let resolution = (
        settings.slicing.width_resolution,
        settings.slicing.height_resolution,
    );
    let mut viewer = Viewer::new(settings, resolution)?;
    load_models(&mut viewer, files)?;
    viewer.set_mode(Mode::Slicing)?;

    let archive = viewer.save_images()?;
    let path = if out.is_dir() {
        archive.save_to(out)?
    } else {
        archive.write(out)?;
        out.to_path_buf()
    };
    println!(
        "Wrote {} slices to {}",
        archive.entries.len(),
        path.display()
    );
    Ok(())
}

fn describe(path: &Path) -> Result<()> {
    let geometry = stl::load_stl(path).with_context(|| format!("failed to load {}", path.display()))?;
    if geometry.is_empty() {
        bail!("{} contains no triangles", path.display());
    }
    let bounds = geometry.bounds();
    let size = bounds.size();
    println!("{}", path.display());
    println!("  triangles: {}", geometry.triangle_count());
    println!(
        "  min:       ({:.4}, {:.4}, {:.4})",
        bounds.min.x, bounds.min.y, bounds.min.z
    );
    println!(
        "  max:       ({:.4}, {:.4}, {:.4})",
        bounds.max.x, bounds.max.y, bounds.max.z
    );
    println!("  size:      {:.4} x {:.4} x {:.4}", size.x, size.y, size.z);
    Ok(())
}
