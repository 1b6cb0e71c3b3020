use std::{fs::{self, OpenOptions}, io::Stdout, path::PathBuf, sync::Mutex, time::Duration};
use anyhow::bail;
use chrono::Local;
use clap::{ArgGroup, Parser, Subcommand};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tipday::app::App;
use tipday::config::Settings;
use tipday::engine::TipEngine;
use tipday::input::handle_key;
use tipday::loader::TipLoader;
use tipday::localization::{self, SUPPORTED_LANGUAGES};
use tipday::models::{Tip, View};
use tipday::prefs::{FileStore, KeyValueStore, TipState};
use tipday::schedule::today_local;
use tipday::theme::Theme;
use tipday::ui;

#[derive(Parser, Debug)]
#[command(name = "tipday", version, about = "A tip of the day for your terminal")]
struct Cli {
    /// Extra config file, layered over the user config
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Where to keep the persisted state (overrides `state_file`)
    #[arg(long, global = true, value_name = "FILE")]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the panel on a fresh tip (default)
    Show,
    /// Open the panel only if the configured frequency says it is due
    Startup,
    /// Print the current tip
    Current,
    /// Step to the next tip and print it
    Next,
    /// Step to the previous tip and print it
    Previous,
    /// Pick an unseen tip at random and print it
    Random,
    /// Toggle a tip as favorite (the current tip if no id is given)
    Favorite { id: Option<u32> },
    /// Open the favorites view
    Favorites {
        /// Print the favorites instead of opening the panel
        #[arg(long)]
        list: bool,
    },
    /// Switch the tip language
    Language { code: String },
    /// List the supported languages
    Languages,
    /// Stop showing tips at startup
    #[command(group(ArgGroup::new("when").required(true).args(["today", "forever"])))]
    Dismiss {
        #[arg(long)]
        today: bool,
        #[arg(long)]
        forever: bool,
    },
    /// Undo a permanent dismissal
    Enable,
    /// Forget history, favorites and dismissals
    Reset,
    /// Show what is persisted and whether a startup tip is due
    Status,
}

impl Command {
    fn opens_panel(&self) -> bool {
        matches!(self, Command::Show | Command::Startup | Command::Favorites { list: false })
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Show);
    init_tracing(command.opens_panel());

    let settings = Settings::new(cli.config.as_deref())?;
    let state_path = cli.state.unwrap_or_else(|| settings.state_path());
    let state = TipState::new(FileStore::open(&state_path)?);
    let language = state.language().unwrap_or_else(|| settings.language.clone());
    info!(state = %state_path.display(), language, "starting");

    let mut engine = TipEngine::new(Box::new(TipLoader::new(settings.tips_path())), state, &language);
    // Selection is left to the command, so read-only ones write nothing.
    let load_error = engine.restore(today_local());
    let mut app = App::new(engine, settings).with_settings_write_back(true);
    if let Some(err) = &load_error {
        app.report(err);
        if !command.opens_panel() {
            eprintln!("warning: {err}");
        }
    }

    let now = Local::now();
    match command {
        Command::Show => {
            app.show_random(now);
            run_panel(&mut app)?;
        }
        Command::Startup => {
            if app.startup_due(&now) {
                app.show_current(now);
                run_panel(&mut app)?;
            }
        }
        Command::Current => print_tip(app.engine.ensure_current()),
        Command::Next => print_tip(app.engine.advance_next()),
        Command::Previous => print_tip(app.engine.advance_previous()),
        Command::Random => print_tip(app.engine.select_random_unshown()),
        Command::Favorite { id } => {
            let Some(id) = id.or_else(|| app.engine.ensure_current().id) else {
                bail!("the current tip has no id and cannot be a favorite");
            };
            let Some(title) = app.engine.collection().by_id(id).map(|t| t.title.clone()) else {
                bail!("no tip with id {id} in language '{}'", app.engine.language());
            };
            if app.engine.toggle_favorite(id) {
                println!("★ Added \"{title}\" to favorites");
            } else {
                println!("Removed \"{title}\" from favorites");
            }
        }
        Command::Favorites { list: true } => {
            let favorites = app.engine.favorite_tips();
            if favorites.is_empty() {
                println!("No favorites yet.");
            }
            for (id, tip) in favorites {
                println!("{id:>4}  {}", tip.title);
            }
        }
        Command::Favorites { list: false } => {
            app.show(View::Favorites);
            run_panel(&mut app)?;
        }
        Command::Language { code } => {
            localization::resolve(&code)?;
            app.change_language(&code);
            if let Some(notice) = &app.notice {
                println!("{}", notice.text);
            }
        }
        Command::Languages => {
            for lang in SUPPORTED_LANGUAGES {
                let marker = if app.engine.language().starts_with(lang.code) { "*" } else { " " };
                println!("{marker} {:<4} {} ({})", lang.code, lang.native_name, lang.name);
            }
        }
        Command::Dismiss { today, .. } => {
            if today {
                app.dismiss_today(now);
                println!("No more tips today.");
            } else {
                app.dismiss_forever();
                println!("Startup tips disabled. Run `tipday enable` to turn them back on.");
            }
        }
        Command::Enable => {
            app.enable();
            println!("Startup tips enabled.");
        }
        Command::Reset => {
            app.engine.reset()?;
            println!("State cleared.");
        }
        Command::Status => print_status(&app, &now),
    }
    Ok(())
}

/// The panel owns the terminal, so its logs go to a file instead of stderr.
fn init_tracing(to_file: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if to_file
        && let Some(file) = open_log_file()
    {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
        return;
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_log_file() -> Option<fs::File> {
    let dir = dirs::data_dir()?.join("tipday");
    fs::create_dir_all(&dir).ok()?;
    OpenOptions::new().create(true).append(true).open(dir.join("tipday.log")).ok()
}

fn run_panel<S: KeyValueStore>(app: &mut App<S>) -> anyhow::Result<()> {
    terminal::enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, app);

    // Restore the terminal even if the loop failed.
    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

fn event_loop<S: KeyValueStore>(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App<S>,
) -> anyhow::Result<()> {
    let theme = Theme::default();
    while app.is_open() {
        terminal.draw(|f| ui::render(f, app, &theme))?;

        if event::poll(Duration::from_millis(200))?
            && let Event::Key(key_event) = event::read()?
            && key_event.kind == KeyEventKind::Press
        {
            if key_event.modifiers.contains(KeyModifiers::CONTROL) && key_event.code == KeyCode::Char('c') {
                app.close();
                break;
            }
            if !handle_key(key_event.code, app)? {
                app.close();
            }
        }
    }
    Ok(())
}

fn print_tip(tip: &Tip) {
    println!("💡 {}", tip.title);
    println!();
    println!("{}", tip.content);
    if let Some(shortcuts) = &tip.shortcuts {
        println!();
        println!("Shortcut: {}", shortcuts.default);
    }
    if let Some(source) = &tip.source {
        println!("Contributed by @{source}");
    }
}

fn print_status<S: KeyValueStore>(app: &App<S>, now: &chrono::DateTime<Local>) {
    let engine = &app.engine;
    let state = engine.state();
    let position = engine
        .current_index()
        .map(|i| format!("{}/{}", i + 1, engine.collection().len()))
        .unwrap_or_else(|| "-".to_string());
    let last_shown = state
        .last_shown_date()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "never".to_string());

    println!("language:        {}", engine.language());
    println!("current tip:     {position}");
    println!("shown (round):   {}", engine.history().len());
    println!("favorites:       {}", state.favorites().len());
    println!("last shown:      {last_shown}");
    println!("frequency:       {}", app.settings.frequency.label());
    println!("disabled:        {}", engine.is_disabled() || !app.settings.enabled);
    println!("startup due:     {}", app.startup_due(now));
}
