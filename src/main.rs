//! rfpreview CLI
//!
//! Commands: normalize, document, icons, thumbnail, capture (feature `cdp`)
//! JSON goes to stdout; failures exit non-zero.

use anyhow::{bail, Context};
use base64::Engine as Base64Engine;
use clap::{Parser, Subcommand};
use rfpreview::capture::{derive_thumbnail, encode_jpeg_data_uri};
use rfpreview::{compile, normalize, Bindings, IconCatalog, PreviewConfig, SandboxDocument, Theme};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "rfpreview")]
#[command(about = "Sandboxed component preview and thumbnail capture")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration file (PreviewConfig); defaults apply to missing fields
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the normalized source and detected component as JSON
    Normalize {
        /// Component source file
        file: PathBuf,
    },

    /// Generate the sandbox host document
    Document {
        file: PathBuf,

        #[arg(short, long, default_value = "light")]
        theme: Theme,

        /// Write here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// List the built-in icon catalog
    Icons {
        /// Print SVG markup instead of names
        #[arg(long)]
        svg: bool,
    },

    /// Derive a thumbnail from an existing PNG raster
    Thumbnail {
        png: PathBuf,

        #[arg(short, long, default_value = "light")]
        theme: Theme,

        /// Write the JPEG here instead of printing a data URI
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Render a component in headless Chrome and capture its thumbnail
    #[cfg(feature = "cdp")]
    Capture {
        file: PathBuf,

        #[arg(short, long, default_value = "light")]
        theme: Theme,

        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Milliseconds to wait for the sandbox to report
        #[arg(long, default_value_t = 15_000)]
        timeout_ms: u64,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", serde_json::json!({ "error": format!("{:#}", e) }));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Normalize { file } => {
            let source = read_source(&file)?;
            let normalized = normalize(&source, config.icon_packages.as_slice())?;
            println!("{}", serde_json::to_string_pretty(&normalized)?);
        }

        Commands::Document { file, theme, out } => {
            let source = read_source(&file)?;
            let bindings = Bindings::from_config(&config);
            let doc = match compile(&source, &bindings) {
                Ok(factory) => SandboxDocument::render(&factory, theme, 1, &config.runtime),
                Err(e) => SandboxDocument::failure(&e.to_string(), theme, 1, &config.runtime),
            };
            match out {
                Some(path) => {
                    std::fs::write(&path, doc.html()).with_context(|| format!("writing {}", path.display()))?;
                    println!(
                        "{}",
                        serde_json::json!({
                            "path": path,
                            "component": doc.component(),
                            "digest": doc.digest(),
                        })
                    );
                }
                None => println!("{}", doc.html()),
            }
        }

        Commands::Icons { svg } => {
            let catalog = IconCatalog::builtin();
            if svg {
                for name in catalog.names() {
                    println!("{}", catalog.lookup(name).to_svg(24, None));
                }
            } else {
                let names: Vec<_> = catalog.names().collect();
                println!("{}", serde_json::to_string_pretty(&names)?);
            }
        }

        Commands::Thumbnail { png, theme, out } => {
            let bytes = std::fs::read(&png).with_context(|| format!("reading {}", png.display()))?;
            let raster = image::load_from_memory(&bytes)?.to_rgba8();
            let thumb = derive_thumbnail(&raster, &config.capture, theme.palette().background_rgb())?;
            let uri = encode_jpeg_data_uri(&thumb, config.capture.jpeg_quality)?;
            emit_thumbnail(&uri, out.as_deref())?;
        }

        #[cfg(feature = "cdp")]
        Commands::Capture {
            file,
            theme,
            out,
            timeout_ms,
        } => {
            let source = read_source(&file)?;
            let surface = rfpreview::cdp::CdpSurface::launch(&config)?;
            let mut controller = rfpreview::PreviewController::new(surface, config)?;
            controller.render_preview(&source, theme)?;
            let state = controller.settle(std::time::Duration::from_millis(timeout_ms))?;
            if let Some(error) = controller.error() {
                bail!("render failed ({:?}): {}", state, error);
            }
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
            match runtime.block_on(controller.capture())? {
                Some(uri) => emit_thumbnail(&uri, out.as_deref())?,
                None => bail!("nothing to capture"),
            }
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PreviewConfig> {
    match path {
        Some(p) => {
            let text = std::fs::read_to_string(p).with_context(|| format!("reading config {}", p.display()))?;
            Ok(PreviewConfig::from_json(&text)?)
        }
        None => Ok(PreviewConfig::default()),
    }
}

fn read_source(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn emit_thumbnail(uri: &str, out: Option<&Path>) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            let Some(payload) = uri.strip_prefix("data:image/jpeg;base64,") else {
                bail!("unexpected thumbnail encoding");
            };
            let jpeg = base64::engine::general_purpose::STANDARD.decode(payload)?;
            std::fs::write(path, &jpeg).with_context(|| format!("writing {}", path.display()))?;
            println!("{}", serde_json::json!({ "path": path, "bytes": jpeg.len() }));
        }
        None => println!("{}", uri),
    }
    Ok(())
}
