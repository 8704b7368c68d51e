//! mojiraster - render text with emoji bitmaps into a PNG
//!
//! ```text
//! text ──► tokenizer ──► FetchManager ──► CdnSource (disk cache → CDN)
//!                              ↓
//!                   Renderer ──► RasterCanvas ──► PNG
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;

use mojiraster::config::Config;
use mojiraster::fetch::{FetchManager, FetchObserver, LogProgress, NoopObserver};
use mojiraster::render::{Point, RasterCanvas, RasterFont, Renderer};
use mojiraster::source::{AssetSource, CdnSource, EmojiStyle, HttpTransport, LocalSource};

/// Print help message
fn print_help() {
    println!(
        r#"mojiraster {} - render text with emoji images into a PNG

USAGE:
    mojiraster [OPTIONS] <TEXT> --font PATH --out PATH
    mojiraster [OPTIONS] --file PATH --font PATH --out PATH
    mojiraster --prefetch[=STYLE]
    mojiraster --init-config [--force]

OPTIONS:
    -h, --help              Print this help message
    -V, --version           Print version information
    --file PATH             Read text from PATH ("-" = stdin)
    --font PATH             TrueType/OpenType font
    --out PATH              Output PNG
    --size PX               Font size in pixels
    --style STYLE           Emoji style (apple, google, twitter, ...)
    --custom-emoji          Render <:name:id> custom emoji markup
    --cache-dir PATH        Persistent emoji cache directory
    --offline               Only use emoji already in the cache directory
    --progress              Log download progress
    --prefetch[=STYLE]      Download every emoji of STYLE into the cache
    --init-config           Generate config file
    -f, --force             Overwrite config file

EXAMPLES:
    mojiraster "Hello 👋 world" --font DejaVuSans.ttf --out hello.png
    mojiraster --file notes.txt --style twitter --font font.ttf --out notes.png
    mojiraster --prefetch=google

CONFIG FILE:
    ~/.config/mojiraster/config.toml (override with MOJIRASTER_CONFIG)

Set RUST_LOG=info for progress output.
"#,
        env!("CARGO_PKG_VERSION")
    );
}

/// Render job assembled from arguments and config
#[derive(Debug, Default)]
struct Job {
    text: Option<String>,
    file: Option<PathBuf>,
    font: Option<PathBuf>,
    out: Option<PathBuf>,
    prefetch: Option<Option<String>>,
}

/// Value for `--name VALUE` or `--name=VALUE`
fn option_value(args: &[String], i: &mut usize, name: &str) -> Result<Option<String>> {
    let arg = &args[*i];
    if let Some(value) = arg.strip_prefix(name).and_then(|rest| rest.strip_prefix('=')) {
        return Ok(Some(value.to_string()));
    }
    if arg != name {
        return Ok(None);
    }
    *i += 1;
    match args.get(*i) {
        Some(value) => Ok(Some(value.clone())),
        None => bail!("{} needs a value", name),
    }
}

/// Apply arguments on top of the loaded config
fn parse_args(args: &[String], cfg: &mut Config) -> Result<Job> {
    let mut job = Job::default();
    let mut i = 0;

    while i < args.len() {
        let arg = args[i].as_str();
        match arg {
            "--custom-emoji" => cfg.render.custom_emoji = true,
            "--offline" => cfg.source.offline = true,
            "--progress" => cfg.fetch.progress = true,
            "--prefetch" => job.prefetch = Some(None),
            "-f" | "--force" => bail!("{} only applies to --init-config", arg),
            _ if arg.starts_with("--prefetch=") => {
                job.prefetch = Some(arg.split_once('=').map(|(_, s)| s.to_string()));
            }
            _ if arg.starts_with("--") => {
                if let Some(v) = option_value(args, &mut i, "--file")? {
                    job.file = Some(PathBuf::from(v));
                } else if let Some(v) = option_value(args, &mut i, "--font")? {
                    job.font = Some(PathBuf::from(v));
                } else if let Some(v) = option_value(args, &mut i, "--out")? {
                    job.out = Some(PathBuf::from(v));
                } else if let Some(v) = option_value(args, &mut i, "--style")? {
                    cfg.source.style = v;
                } else if let Some(v) = option_value(args, &mut i, "--cache-dir")? {
                    cfg.source.cache_dir = v;
                } else if let Some(v) = option_value(args, &mut i, "--size")? {
                    cfg.font.size = v
                        .parse()
                        .with_context(|| format!("Invalid --size {:?}", v))?;
                } else {
                    bail!("Unknown option {} (see --help)", arg);
                }
            }
            _ => {
                if job.text.is_some() {
                    bail!("Unexpected argument {:?} (quote the text)", arg);
                }
                job.text = Some(arg.to_string());
            }
        }
        i += 1;
    }

    if job.font.is_none() && !cfg.font.path.is_empty() {
        job.font = Some(PathBuf::from(&cfg.font.path));
    }
    Ok(job)
}

fn build_manager(cfg: &Config) -> Result<Arc<FetchManager>> {
    let cache_dir = cfg.source.cache_dir();
    let source: Arc<dyn AssetSource> = if cfg.source.offline {
        info!("Offline: serving emoji from {}", cache_dir.display());
        Arc::new(LocalSource::new(cache_dir))
    } else {
        let transport = HttpTransport::new(cfg.fetch.max_concurrent.max(1))
            .context("Failed to create HTTP client")?;
        Arc::new(
            CdnSource::new(Arc::new(transport), cache_dir)
                .with_base_url(&cfg.source.base_url)
                .with_custom_base_url(&cfg.source.custom_base_url),
        )
    };

    let observer: Arc<dyn FetchObserver> = if cfg.fetch.progress {
        Arc::new(LogProgress::new())
    } else {
        Arc::new(NoopObserver)
    };
    Ok(Arc::new(FetchManager::with_observer(
        source,
        cfg.fetch.settings(),
        observer,
    )))
}

fn read_text(job: &Job) -> Result<String> {
    match (&job.text, &job.file) {
        (Some(_), Some(_)) => bail!("Pass either TEXT or --file, not both"),
        (Some(text), None) => Ok(text.clone()),
        (None, Some(path)) if path.as_os_str() == "-" => {
            std::io::read_to_string(std::io::stdin()).context("Failed to read stdin")
        }
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        (None, None) => bail!("No text given (see --help)"),
    }
}

async fn prefetch(cfg: &Config, style: Option<String>) -> Result<()> {
    let style: EmojiStyle = match style {
        Some(name) => name.parse()?,
        None => cfg.source.style(),
    };
    let manager = build_manager(cfg)?;
    let found = manager.prefetch_style(style).await;
    manager.shutdown();
    println!(
        "Prefetched {} {} emoji into {}",
        found,
        style,
        cfg.source.cache_dir().display()
    );
    Ok(())
}

async fn render(cfg: &Config, job: &Job) -> Result<()> {
    let text = read_text(job)?;
    let font_path = job
        .font
        .as_ref()
        .context("No font given: pass --font or set [font] path in the config")?;
    let out = job.out.as_ref().context("No output path given: pass --out")?;

    let font = RasterFont::load(font_path, cfg.font.size)?;
    let options = cfg.render.options();

    let manager = build_manager(cfg)?;
    let renderer = Renderer::new(manager.clone(), cfg.source.style());

    // Measured with the same fetched bitmaps and fallbacks the render uses
    let padding = cfg.output.padding;
    let block = match renderer.measure(&text, &font, &options).await {
        Ok(block) => block,
        Err(e) => {
            manager.shutdown();
            return Err(e.into());
        }
    };
    let width = match cfg.output.width {
        0 => block.width.max(1) as u32 + padding * 2,
        w => w,
    };
    let height = match cfg.output.height {
        0 => block.height.max(1) as u32 + padding * 2,
        h => h,
    };

    let mut canvas = RasterCanvas::new(width, height, cfg.output.background());

    let origin = Point::new(padding as i32, padding as i32);
    let result = renderer
        .render(&mut canvas, origin, &text, &font, &options)
        .await;
    manager.shutdown();
    let summary = result?;

    canvas.save(out)?;
    info!(
        "Rendered {} lines ({} emoji, {} fallback) to {}",
        summary.lines,
        summary.emoji_draws,
        summary.fallbacks,
        out.display()
    );
    println!("{}", out.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    // Check command line arguments
    let args: Vec<String> = std::env::args().collect();

    // --help
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    // --version
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("mojiraster {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Config file generation mode
    if args.iter().any(|a| a == "--init-config") {
        let force = args.iter().any(|a| a == "--force" || a == "-f");
        let path = Config::write_default_config(force)?;
        println!("Config file generated: {}", path.display());
        return Ok(());
    }

    let mut cfg = Config::load();
    let job = parse_args(&args[1..], &mut cfg)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    match job.prefetch.clone() {
        Some(style) => runtime.block_on(prefetch(&cfg, style)),
        None => runtime.block_on(render(&cfg, &job)),
    }
}
