use clap::{Args, Parser, Subcommand, ValueEnum};
use console::{Term, set_colors_enabled, style};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use chrono::Utc;
use driftkit::{
    ClockTracker, Continent, DriftError, HttpProber, HttpTimeSource, ProbeBoard, ProbeTarget,
    Provider, Selector, adapters::http::build_client, adapters::time_source, catalog,
    config::{ConfigStore, seconds_to_duration}, estimate_offset, fmt, services::clock::RESYNC_INTERVAL,
    services::latency::{BATCH_SIZE, RunSummary}, spawn_run,
    stats::{compute_latency_stats, fastest_by_provider},
};

const LOG_ENV: &str = "DRIFTKIT_LOG";
const DEFAULT_TIMEOUT_SECS: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Simple,
}

#[derive(Parser, Debug)]
#[command(name = "driftkit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Clock drift and endpoint latency inspection kit")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output format: text, json or simple
    #[arg(short = 'f', long, value_enum, global = true)]
    format: Option<OutputFormat>,

    /// Alias for JSON output
    #[arg(short = 'j', long, global = true)]
    json: bool,

    /// Pretty-print JSON
    #[arg(short = 'p', long, global = true)]
    pretty: bool,

    /// Disable colored output
    #[arg(long = "no-color", alias = "nocolor", global = true)]
    no_color: bool,

    /// Show detailed output and debug logs
    #[arg(short = 'v', long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Estimate the local clock offset against an HTTP time source
    Clock(ClockArgs),
    /// Measure latency to cloud regions in batches
    Latency(LatencyArgs),
    /// List the probe targets matching a filter
    Targets(FilterArgs),
    /// Inspect or edit the configuration file
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug)]
struct ClockArgs {
    /// Time source URL returning a JSON document
    #[arg(long)]
    url: Option<String>,

    /// JSON field holding epoch milliseconds or an RFC 3339 date-time
    #[arg(long)]
    field: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<f64>,

    /// Keep running: re-sync periodically and on Enter, print the server clock every second
    #[arg(short = 'w', long)]
    watch: bool,

    /// Seconds between automatic re-syncs (only with --watch)
    #[arg(short = 'i', long, requires = "watch")]
    interval: Option<f64>,
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// Provider to keep (AWS, GCP, Azure, Oracle, Contabo or all)
    #[arg(long, default_value = "all", value_parser = parse_selector::<Provider>)]
    provider: Selector<Provider>,

    /// Continent to keep (e.g. europe, north-america or all)
    #[arg(long, default_value = "all", value_parser = parse_selector::<Continent>)]
    continent: Selector<Continent>,

    /// TOML catalog file replacing the built-in targets
    #[arg(long)]
    catalog: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct LatencyArgs {
    #[command(flatten)]
    filter: FilterArgs,

    /// Number of targets probed concurrently
    #[arg(long, value_parser = clap::value_parser!(usize))]
    batch_size: Option<usize>,

    /// Live dashboard
    #[cfg(feature = "tui")]
    #[arg(long)]
    tui: bool,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the current configuration
    Show,
    /// Print the configuration file location
    Path,
    /// Set a default (timeout, format, time_url, time_field, resync_interval, batch_size, catalog)
    Set { key: String, value: String },
    /// Remove a default
    Unset { key: String },
}

fn parse_selector<T>(s: &str) -> Result<Selector<T>, DriftError>
where
    T: std::str::FromStr<Err = DriftError>,
{
    s.parse()
}

struct Ctx {
    term: Term,
    format: OutputFormat,
    pretty: bool,
    verbose: bool,
    store: ConfigStore,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let term = Term::stdout();

    let store = match ConfigStore::load() {
        Ok(store) => store,
        Err(e) => process::exit(handle_error(&term, e)),
    };

    let format = if cli.json {
        OutputFormat::Json
    } else if let Some(f) = cli.format {
        f
    } else {
        match store.defaults().format.as_deref() {
            Some("json") => OutputFormat::Json,
            Some("simple") => OutputFormat::Simple,
            _ => OutputFormat::Text,
        }
    };

    // colors
    let want_color = format != OutputFormat::Json
        && io::stdout().is_terminal()
        && std::env::var_os("NO_COLOR").is_none()
        && !cli.no_color;
    set_colors_enabled(want_color);

    let ctx = Ctx {
        term,
        format,
        pretty: cli.pretty,
        verbose: cli.verbose,
        store,
    };

    let res = match cli.command {
        Command::Clock(args) => run_clock(args, &ctx).await,
        Command::Latency(args) => run_latency(args, &ctx).await,
        Command::Targets(args) => run_targets(args, &ctx),
        Command::Config(cmd) => run_config(cmd, ctx.store, &ctx.term),
    };

    let exit_code = match res {
        Ok(code) => code,
        Err(e) => handle_error(&ctx.term, e),
    };
    process::exit(exit_code);
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "driftkit=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn run_clock(args: ClockArgs, ctx: &Ctx) -> Result<i32, DriftError> {
    let defaults = ctx.store.defaults();
    let url = args
        .url
        .or_else(|| defaults.time_url.clone())
        .unwrap_or_else(|| time_source::DEFAULT_TIME_URL.to_string());
    let field = args
        .field
        .or_else(|| defaults.time_field.clone())
        .unwrap_or_else(|| time_source::DEFAULT_TIME_FIELD.to_string());
    let timeout = seconds_to_duration(
        "timeout",
        args.timeout.or(defaults.timeout).unwrap_or(DEFAULT_TIMEOUT_SECS),
    )?;
    let source = HttpTimeSource::new(build_client()?, url, field, timeout);

    if args.watch {
        let interval = match args.interval.or(defaults.resync_interval) {
            Some(secs) => seconds_to_duration("interval", secs)?,
            None => RESYNC_INTERVAL,
        };
        watch_clock(Arc::new(source), interval, ctx).await;
        return Ok(0);
    }

    let est = estimate_offset(&source).await?;
    let now = Utc::now();
    match ctx.format {
        OutputFormat::Text => {
            ctx.term
                .write_line(&fmt::text::render_estimate(&est, source.url(), now))
                .ok();
        }
        OutputFormat::Simple => {
            ctx.term.write_line(&fmt::text::render_simple_estimate(&est)).ok();
        }
        OutputFormat::Json => {
            println!("{}", fmt::json::estimate_to_json(&est, source.url(), now, ctx.pretty)?);
        }
    }
    Ok(0)
}

async fn watch_clock(source: Arc<HttpTimeSource>, interval: Duration, ctx: &Ctx) {
    let tracker = ClockTracker::new();
    let cancel = CancellationToken::new();
    let sync_task = tracker.spawn_periodic(source.clone(), interval, cancel.clone());

    if ctx.format != OutputFormat::Json {
        ctx.term
            .write_line(
                &style("Press Enter to resync now, Ctrl-C to stop")
                    .dim()
                    .to_string(),
            )
            .ok();
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = ticker.tick() => print_clock_tick(&tracker, source.url(), ctx),
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(_)) => {
                    // overlapping re-syncs are allowed, the last answer wins
                    let tracker = tracker.clone();
                    let source = source.clone();
                    tokio::spawn(async move {
                        tracker.resync(source.as_ref()).await;
                    });
                }
                _ => stdin_open = false,
            },
            _ = signal::ctrl_c() => break,
        }
    }

    cancel.cancel();
    if let Err(e) = sync_task.await {
        tracing::error!(error = %e, "clock sync task failed");
    }
    if ctx.term.is_term() {
        ctx.term.write_line("").ok();
    }
}

fn print_clock_tick(tracker: &ClockTracker, source: &str, ctx: &Ctx) {
    let current = tracker.current();
    let now = Utc::now();
    match ctx.format {
        OutputFormat::Json => {
            if let Some(est) = current {
                match fmt::json::estimate_to_json(&est, source, now, false) {
                    Ok(s) => println!("{}", s),
                    Err(e) => eprintln!("error serializing: {}", e),
                }
            }
        }
        OutputFormat::Simple => {
            if let Some(est) = current {
                ctx.term.write_line(&fmt::text::render_simple_estimate(&est)).ok();
            }
        }
        OutputFormat::Text => {
            let line = fmt::text::render_clock_line(current.as_ref(), now);
            if ctx.term.is_term() {
                ctx.term.clear_line().ok();
                ctx.term.write_str(&line).ok();
            } else {
                ctx.term.write_line(&line).ok();
            }
        }
    }
}

fn load_targets(filter: &FilterArgs, store: &ConfigStore) -> Result<Vec<ProbeTarget>, DriftError> {
    let all = match filter.catalog.as_ref().or(store.data.catalog_path.as_ref()) {
        Some(path) => catalog::load_catalog(path)?,
        None => catalog::builtin(),
    };
    Ok(catalog::filter(&all, filter.provider, filter.continent))
}

async fn run_latency(args: LatencyArgs, ctx: &Ctx) -> Result<i32, DriftError> {
    let targets = load_targets(&args.filter, &ctx.store)?;
    if targets.is_empty() {
        return Err(DriftError::Config(format!(
            "no targets match provider={} continent={}",
            args.filter.provider, args.filter.continent
        )));
    }
    let batch_size = match args.batch_size.or(ctx.store.defaults().batch_size) {
        Some(0) => return Err(DriftError::Config("batch size must be at least 1".into())),
        Some(n) => n,
        None => BATCH_SIZE,
    };
    let prober = Arc::new(HttpProber::new(build_client()?));
    let board = ProbeBoard::new();

    #[cfg(feature = "tui")]
    if args.tui {
        let label = format!("{} / {}", args.filter.provider, args.filter.continent);
        return latency_tui(targets, prober, board, batch_size, label).await;
    }

    let cancel = CancellationToken::new();
    let mut handle = spawn_run(targets, prober, board.clone(), cancel.clone(), batch_size);
    let show_progress = ctx.format == OutputFormat::Text && ctx.term.is_term();
    let mut ticker = tokio::time::interval(Duration::from_millis(250));

    let joined = loop {
        tokio::select! {
            res = &mut handle => break res,
            _ = ticker.tick(), if show_progress => {
                let counts = board.counts();
                ctx.term.clear_line().ok();
                ctx.term
                    .write_str(&format!("probing... {}/{} settled", counts.settled(), counts.total()))
                    .ok();
            }
            _ = signal::ctrl_c(), if !cancel.is_cancelled() => {
                cancel.cancel();
                if show_progress {
                    ctx.term.clear_line().ok();
                }
                eprintln!("{}", style("cancelling after the current batch...").yellow());
            }
        }
    };
    if show_progress {
        ctx.term.clear_line().ok();
    }
    let summary = joined.map_err(|e| DriftError::Other(format!("probe task failed: {e}")))?;
    print_run(&board, &summary, ctx)?;
    Ok(0)
}

fn print_run(board: &ProbeBoard, summary: &RunSummary, ctx: &Ctx) -> Result<(), DriftError> {
    let entries = board.snapshot();
    let results: Vec<_> = entries.iter().map(|(_, r)| *r).collect();
    let stats = compute_latency_stats(&results);
    let fastest = fastest_by_provider(&entries);
    match ctx.format {
        OutputFormat::Text => {
            ctx.term
                .write_str(&fmt::text::render_board(&entries, ctx.verbose))
                .ok();
            ctx.term
                .write_line(&fmt::text::render_summary(summary, &stats, &fastest))
                .ok();
        }
        OutputFormat::Simple => {
            ctx.term.write_line(&fmt::text::render_simple_board(&entries)).ok();
        }
        OutputFormat::Json => {
            println!(
                "{}",
                fmt::json::run_to_json(&entries, summary, &stats, &fastest, ctx.pretty)?
            );
        }
    }
    Ok(())
}

#[cfg(feature = "tui")]
async fn latency_tui(
    targets: Vec<ProbeTarget>,
    prober: Arc<HttpProber>,
    board: ProbeBoard,
    batch_size: usize,
    label: String,
) -> Result<i32, DriftError> {
    use driftkit::tui::{TuiApp, run_tui};
    use tokio::sync::mpsc;

    let (tx, mut rx) = mpsc::unbounded_channel::<RunSummary>();
    let launch = |cancel: CancellationToken| {
        let handle = spawn_run(targets.clone(), prober.clone(), board.clone(), cancel, batch_size);
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Ok(summary) = handle.await {
                let _ = tx.send(summary);
            }
        });
    };

    let mut app = TuiApp::new(board.clone(), label);
    let mut cancel = CancellationToken::new();
    launch(cancel.clone());
    app.start_run();

    // the dashboard loop is synchronous, keep the runtime free for the probes
    let res = tokio::task::block_in_place(|| {
        run_tui(&mut app, |app| {
            if app.cancel_requested && !cancel.is_cancelled() {
                cancel.cancel();
            }
            while let Ok(summary) = rx.try_recv() {
                app.finish_run(summary);
            }
            if app.rerun_requested {
                cancel = CancellationToken::new();
                launch(cancel.clone());
                app.start_run();
            }
            Ok(true)
        })
    });
    cancel.cancel();
    res?;
    Ok(0)
}

fn run_targets(args: FilterArgs, ctx: &Ctx) -> Result<i32, DriftError> {
    let targets = load_targets(&args, &ctx.store)?;
    match ctx.format {
        OutputFormat::Text => {
            ctx.term.write_line(&fmt::text::render_targets(&targets)).ok();
        }
        OutputFormat::Simple => {
            for t in &targets {
                ctx.term.write_line(&t.id).ok();
            }
        }
        OutputFormat::Json => {
            println!("{}", fmt::json::targets_to_json(&targets, ctx.pretty)?);
        }
    }
    Ok(0)
}

fn run_config(cmd: ConfigCommand, mut store: ConfigStore, term: &Term) -> Result<i32, DriftError> {
    match cmd {
        ConfigCommand::Path => {
            term.write_line(&store.path().display().to_string()).ok();
        }
        ConfigCommand::Show => {
            let content = store.to_toml_string()?;
            term.write_line(&format!(
                "{} {}",
                style("Config file:").cyan().bold(),
                store.path().display()
            ))
            .ok();
            if content.trim().is_empty() {
                term.write_line(&style("(no defaults set)").dim().to_string()).ok();
            } else {
                term.write_line(content.trim_end()).ok();
            }
        }
        ConfigCommand::Set { key, value } => {
            store.set(&key, &value)?;
            store.save()?;
            term.write_line(&format!(
                "{} {} = {}",
                style("Saved").green(),
                key,
                value
            ))
            .ok();
        }
        ConfigCommand::Unset { key } => {
            if store.unset(&key)? {
                store.save()?;
                term.write_line(&format!("{} {}", style("Removed").green(), key)).ok();
            } else {
                term.write_line(&format!("{} was not set", key)).ok();
            }
        }
    }
    Ok(0)
}

fn handle_error(term: &Term, err: DriftError) -> i32 {
    term.write_line(&style(format!("Error: {}", err)).red().to_string())
        .ok();
    match err {
        DriftError::Network(_) | DriftError::Http(_) => 2,
        DriftError::Timeout(_) => 3,
        DriftError::Config(_) => 4,
        _ => 1,
    }
}
