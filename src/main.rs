use clap::{Parser, Subcommand};
use sitepipe::config;
use sitepipe::output;
use sitepipe::plan::{self, TaskName};
use sitepipe::tasks::Project;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Flags for commands that start the dev server.
#[derive(clap::Args, Clone)]
struct ServeArgs {
    /// Port for the dev server (overrides `serve.port`)
    #[arg(long)]
    port: Option<u16>,
}

fn version_string() -> &'static str {
    let revision = env!("SITEPIPE_REVISION");
    if revision.is_empty() {
        env!("CARGO_PKG_VERSION")
    } else {
        // Leaked once at startup
        Box::leak(format!("{} ({revision})", env!("CARGO_PKG_VERSION")).into_boxed_str())
    }
}

#[derive(Parser)]
#[command(name = "sitepipe")]
#[command(about = "Static-site asset pipeline with a live-reloading dev server")]
#[command(long_about = "\
Static-site asset pipeline with a live-reloading dev server

Project layout (all directories configurable in sitepipe.toml):

  sitepipe.toml                    # Optional, sparse overrides of stock config
  src/
  ├── index.html                   # Pages → temp/ (page)
  └── assets/
      ├── styles/main.scss         # Sass → temp/assets/styles/main.css (style)
      ├── styles/_variables.scss   # Partials are imported, never emitted
      ├── scripts/main.js          # → temp/ via optional transpiler (script)
      ├── images/                  # Compressed → dist/ (image)
      └── fonts/                   # → dist/ (font)
  public/                          # Copied/compressed → dist/ root (extra)
  temp/                            # Compiled pages, styles, scripts
  dist/                            # Deployable output

Composite tasks:
  compile = parallel(page, style, script)
  develop = series(clean, compile, serve)
  build   = series(clean, parallel(image, font, extra, series(compile, useref)))

Logging from the dev server honors RUST_LOG (default: info).

Run 'sitepipe gen-config' to generate a documented sitepipe.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Project root
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Config file (default: <root>/sitepipe.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable ANSI colors in log output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Delete the temp and dist directories
    Clean,
    /// Copy pages into temp
    Page,
    /// Compile Sass stylesheets into temp
    Style,
    /// Transpile scripts into temp
    Script,
    /// Compress images into dist
    Image,
    /// Copy fonts into dist
    Font,
    /// Copy public files into dist, compressing images
    Extra,
    /// Watch sources and serve with live reload
    Serve(ServeArgs),
    /// Run page, style and script in parallel
    Compile,
    /// Clean, compile, then serve
    Develop(ServeArgs),
    /// Bundle build blocks and minify pages into dist
    Useref,
    /// Produce the deployable dist directory
    Build,
    /// Print a stock sitepipe.toml with all options documented
    GenConfig,
}

impl Command {
    /// The task to run and an optional port override; `None` for `gen-config`.
    fn task(&self) -> Option<(TaskName, Option<u16>)> {
        let task = match self {
            Command::Clean => TaskName::Clean,
            Command::Page => TaskName::Page,
            Command::Style => TaskName::Style,
            Command::Script => TaskName::Script,
            Command::Image => TaskName::Image,
            Command::Font => TaskName::Font,
            Command::Extra => TaskName::Extra,
            Command::Serve(args) => return Some((TaskName::Serve, args.port)),
            Command::Compile => TaskName::Compile,
            Command::Develop(args) => return Some((TaskName::Develop, args.port)),
            Command::Useref => TaskName::Useref,
            Command::Build => TaskName::Build,
            Command::GenConfig => return None,
        };
        Some((task, None))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.no_color);

    let Some((task, port)) = cli.command.task() else {
        print!("{}", config::stock_config_toml());
        return Ok(());
    };

    let mut site_config = config::load_config(&cli.root, cli.config.as_deref())?;
    if let Some(port) = port {
        site_config.serve.port = port;
        site_config.validate()?;
    }
    init_thread_pool(&site_config.processing);

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            output::print_event(&event);
        }
    });

    let project = Project::new(&cli.root, site_config).with_events(tx);
    let started = Instant::now();
    let result = plan::run(&project, &task.plan());
    // Closes the event channel so the printer drains and exits.
    drop(project);
    printer.join().map_err(|_| "output thread panicked")?;

    let reports = result?;
    output::print_summary(task, &reports, started.elapsed());
    Ok(())
}

/// Diagnostics go to stderr; stdout carries task output.
fn init_tracing(no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(!no_color)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores. Users can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
