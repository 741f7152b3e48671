mod app;
mod client;
mod config;
mod estimate;
mod picker;
mod theme;
mod ui;

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{
        self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use app::{App, Popup};
use client::MeasureClient;
use config::AppConfig;
use estimate::{Command, Estimation, Phase, View};

#[derive(Parser, Debug)]
#[command(name = "bodymeasure")]
#[command(version)]
#[command(about = "Estimate body measurements from front, side and standing photographs")]
struct Args {
    /// Front view image (with --side/--standing: estimate once, no TUI)
    #[arg(long)]
    front: Option<PathBuf>,

    /// Side view image
    #[arg(long)]
    side: Option<PathBuf>,

    /// Standing view image
    #[arg(long)]
    standing: Option<PathBuf>,

    /// Print the one-shot result as JSON
    #[arg(long)]
    json: bool,

    /// Inference endpoint URL
    #[arg(long, env = "BODYMEASURE_ENDPOINT")]
    endpoint: Option<String>,

    /// Request timeout in seconds (0 waits indefinitely)
    #[arg(long)]
    timeout: Option<u64>,

    /// Write the effective configuration to the config file and exit
    #[arg(long)]
    init_config: bool,
}

impl Args {
    fn one_shot(&self) -> bool {
        self.front.is_some() || self.side.is_some() || self.standing.is_some()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut config, load_error) = AppConfig::load();
    if let Some(endpoint) = args.endpoint.clone() {
        config.endpoint = endpoint;
    }
    if let Some(timeout) = args.timeout {
        config.request_timeout_secs = timeout;
    }

    // The TUI owns the terminal, so it logs to a file
    init_logging(&config, !args.one_shot() && !args.init_config);
    if let Some(e) = load_error {
        tracing::warn!("{:#}; using defaults", e);
    }

    if args.init_config {
        let path = AppConfig::config_path()?;
        config.save_to(&path)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    if args.one_shot() {
        return run_once(&config, &args).await;
    }

    ui::set_theme(theme::Theme::load(config.theme_file.as_deref()));
    run_tui(config).await
}

fn init_logging(config: &AppConfig, to_file: bool) {
    let registry = tracing_subscriber::registry().with(EnvFilter::from_default_env());

    if !to_file {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
        return;
    }

    let file = config.log_path().and_then(|path| {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).ok()?;
        }
        std::fs::OpenOptions::new().create(true).append(true).open(path).ok()
    });

    match file {
        Some(file) => registry
            .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .init(),
        None => registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::sink))
            .init(),
    }
}

async fn run_once(config: &AppConfig, args: &Args) -> Result<()> {
    let client = MeasureClient::new(
        config.endpoint.clone(),
        config.request_timeout(),
        config.connect_timeout(),
    )?;

    let mut estimation = Estimation::new();
    let paths = [
        (View::Front, &args.front),
        (View::Side, &args.side),
        (View::Standing, &args.standing),
    ];
    for (view, path) in paths {
        let Some(path) = path else { continue };
        match picker::pick(path)? {
            Some(selection) => {
                estimation = estimation.step(estimate::Event::Select(view, selection)).0;
            }
            None => tracing::warn!("{} is not an image; ignoring", path.display()),
        }
    }

    let (next, command) = estimation.step(estimate::Event::Estimate);
    estimation = next;

    if let Some(Command::Submit { request, images }) = command {
        tracing::info!("Uploading to {}", client.endpoint());
        tokio::select! {
            outcome = client.estimate(&images) => {
                estimation = estimation.step(estimate::Event::Completed { request, outcome }).0;
            }
            _ = tokio::signal::ctrl_c() => {
                estimation.step(estimate::Event::Cancel);
                anyhow::bail!("Estimation cancelled");
            }
        }
    }

    match estimation.phase() {
        Phase::Success(result) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(result)?);
            } else {
                print!("{}", estimate::results::render_table(result));
            }
            Ok(())
        }
        Phase::Failure(e) => {
            if args.json {
                let output = serde_json::json!({
                    "error": e.user_message(),
                    "detail": e.to_string(),
                    "status": e.status(),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            anyhow::bail!("{}", e.user_message())
        }
        Phase::Idle | Phase::Submitting(_) => anyhow::bail!("Estimation did not run"),
    }
}

async fn run_tui(config: AppConfig) -> Result<()> {
    // Create app state before touching the terminal so config errors print normally
    let mut app = App::new(config)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableBracketedPaste)?;
    terminal.show_cursor()?;

    // Dropping the app aborts any request still in flight
    drop(app);
    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(std::time::Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('q') if app.popup == Popup::None => return Ok(()),
                    KeyCode::Char('c') if key.modifiers.contains(event::KeyModifiers::CONTROL) => {
                        return Ok(())
                    }
                    _ => {
                        // Handle key and catch any errors to prevent crashes
                        if let Err(e) = app.handle_key(key) {
                            app.status_message = Some(format!("Error: {}", e));
                        }
                    }
                },
                Event::Paste(text) => app.handle_paste(&text),
                _ => {}
            }
        }

        // Let the spawned request make progress and pick up its completion
        tokio::task::yield_now().await;
        app.tick()?;
    }
}
