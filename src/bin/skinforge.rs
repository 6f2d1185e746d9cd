use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use futures::executor::block_on;
use skinforge::{
    DirectorySourceLoader, ExportMode, MemorySourceLoader, NoticeLevel, SkinCatalog, SkinStudio,
    StudioConfig,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "skinforge", version)]
struct Cli {
    /// Studio settings JSON.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Flatten layer images (bottom first) into a skin PNG.
    Compose(ComposeArgs),
    /// Save layer images (bottom first) as a project file.
    Pack(PackArgs),
    /// Load a project file and write its skin PNG.
    Unpack(UnpackArgs),
}

#[derive(Parser, Debug)]
struct ComposeArgs {
    /// Layer images, bottom layer first.
    #[arg(required = true)]
    layers: Vec<PathBuf>,

    /// Output PNG path.
    #[arg(short, long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct PackArgs {
    /// Layer images, bottom layer first.
    #[arg(required = true)]
    layers: Vec<PathBuf>,

    /// Output project path.
    #[arg(short, long)]
    out: PathBuf,

    /// How layer images are stored. Defaults to the configured mode.
    #[arg(long)]
    mode: Option<ExportMode>,

    /// Catalog JSON. Layers whose file name matches a catalog entry become library layers.
    #[arg(long)]
    catalog: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct UnpackArgs {
    /// Input project path.
    project: PathBuf,

    /// Output PNG path.
    #[arg(short, long)]
    out: PathBuf,

    /// Directory that referenced library skins are resolved against.
    /// Defaults to the project's directory.
    #[arg(long)]
    assets: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => {
            let json = read_string(path)?;
            StudioConfig::from_json(&json)
                .with_context(|| format!("parse config '{}'", path.display()))?
        }
        None => StudioConfig::default(),
    };
    let mut studio = SkinStudio::new(config);

    let result = match cli.cmd {
        Command::Compose(args) => cmd_compose(&mut studio, args),
        Command::Pack(args) => cmd_pack(&mut studio, args),
        Command::Unpack(args) => cmd_unpack(&mut studio, args),
    };
    print_notices(&mut studio);
    result
}

fn cmd_compose(studio: &mut SkinStudio, args: ComposeArgs) -> anyhow::Result<()> {
    for path in &args.layers {
        let bytes = read_bytes(path)?;
        studio.import_image(layer_name(path), Some(path.display().to_string()), &bytes)?;
    }
    write_png(studio, &args.out)
}

fn cmd_pack(studio: &mut SkinStudio, args: PackArgs) -> anyhow::Result<()> {
    let catalog = match &args.catalog {
        Some(path) => {
            let json = read_string(path)?;
            SkinCatalog::from_json(&json)
                .with_context(|| format!("parse catalog '{}'", path.display()))?
        }
        None => SkinCatalog::default(),
    };

    for path in &args.layers {
        let bytes = read_bytes(path)?;
        match find_in_catalog(&catalog, path) {
            Some(skin) => {
                let loader = MemorySourceLoader::new().with_asset(skin.src.clone(), bytes);
                block_on(studio.add_library_skin(skin, &loader))?;
            }
            None => {
                studio.import_image(layer_name(path), Some(path.display().to_string()), &bytes)?;
            }
        }
    }

    let mode = args.mode.unwrap_or(studio.config().default_export_mode);
    let json = studio.export_project(mode)?;
    create_parent_dir(&args.out)?;
    std::fs::write(&args.out, json)
        .with_context(|| format!("write project '{}'", args.out.display()))?;

    eprintln!("wrote {} ({} layers)", args.out.display(), studio.stack().len());
    Ok(())
}

fn cmd_unpack(studio: &mut SkinStudio, args: UnpackArgs) -> anyhow::Result<()> {
    let json = read_string(&args.project)?;
    let root = match args.assets {
        Some(dir) => dir,
        None => args
            .project
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf(),
    };
    let loader = DirectorySourceLoader::new(root);

    let report = block_on(studio.import_project(&json, &loader))
        .with_context(|| format!("load project '{}'", args.project.display()))?;
    for failure in &report.failures {
        eprintln!("layer {} ({}): {}", failure.index, failure.name, failure.reason);
    }

    write_png(studio, &args.out)
}

fn write_png(studio: &mut SkinStudio, out: &Path) -> anyhow::Result<()> {
    let skin = studio.export_png()?;
    create_parent_dir(out)?;
    std::fs::write(out, &skin.png).with_context(|| format!("write png '{}'", out.display()))?;

    eprintln!("wrote {}", out.display());
    Ok(())
}

fn find_in_catalog<'a>(catalog: &'a SkinCatalog, path: &Path) -> Option<&'a skinforge::CatalogSkin> {
    let file_name = path.file_name()?;
    catalog
        .skins
        .iter()
        .find(|skin| Path::new(&skin.src).file_name() == Some(file_name))
}

fn layer_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_notices(studio: &mut SkinStudio) {
    for notice in studio.drain_notices() {
        let level = match notice.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        eprintln!("{level}: {}", notice.message);
    }
}

fn read_bytes(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("read '{}'", path.display()))
}

fn read_string(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("read '{}'", path.display()))
}

fn create_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    Ok(())
}
