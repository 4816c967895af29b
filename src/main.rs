//! Dare admin console - browse and moderate dares from the terminal
//!
//! Without a subcommand this starts the interactive dare browser. The other
//! subcommands run one lookup and print JSON to stdout.

use std::io;
use std::panic;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use serde_json::json;
use thiserror::Error;
use tracing::info;

use dare_admin::app::{App, AppState};
use dare_admin::cache::{BatchedTtlCache, SystemClock};
use dare_admin::cli::{
    dare_filter_from_args, parse_notification_type_arg, validate_limit, Cli, CliError, Command,
};
use dare_admin::config::Config;
use dare_admin::data::sol_price::{format_sol_amount, lamports_to_sol, lamports_to_usd};
use dare_admin::data::{
    DareListClient, DareStatsClient, IpfsClient, NotificationClient, NotificationRequest,
    PriceCache, ProfileClient, SolPriceClient,
};
use dare_admin::logging::{self, LogTarget};
use dare_admin::pager::CursorPager;
use dare_admin::ui;

/// Failures of one-shot commands that are not argument or config errors
#[derive(Debug, Error)]
enum CommandError {
    #[error("SOL price is unavailable")]
    PriceUnavailable,
}

/// Sets up a panic hook that restores the terminal before printing the panic message.
/// This ensures the terminal is usable even if the application panics.
fn setup_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // Attempt to restore the terminal
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        // Call the original panic hook
        original_hook(panic_info);
    }));
}

/// Renders the UI based on the current application state
fn render_ui(frame: &mut ratatui::Frame, app: &App) {
    match &app.state {
        AppState::Loading => {
            render_loading(frame);
        }
        AppState::DareList => {
            ui::render_dare_table(frame, app);
        }
    }
    if app.show_help {
        ui::render_help_overlay(frame);
    }
}

/// Renders a loading message while the first page is being fetched
fn render_loading(frame: &mut ratatui::Frame) {
    use ratatui::{
        layout::{Alignment, Constraint, Direction, Layout},
        style::{Color, Style},
        widgets::Paragraph,
    };

    let area = frame.area();

    // Center the loading message vertically
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(45),
            Constraint::Length(3),
            Constraint::Percentage(45),
        ])
        .split(area);

    let loading_text = Paragraph::new("Loading dares...")
        .style(Style::default().fg(Color::Cyan))
        .alignment(Alignment::Center);

    frame.render_widget(loading_text, chunks[1]);
}

async fn run_tui(config: &Config, log_level: &str) -> Result<(), Box<dyn std::error::Error>> {
    let _log_guard = logging::init(log_level, &LogTarget::for_tui())?;
    let api_gateway = config.api_gateway().unwrap_or_default().to_string();
    info!(api_gateway = %api_gateway, "starting dare browser");

    // Set up panic hook to restore terminal on crash
    setup_panic_hook();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::from_config(config, &api_gateway);

    // Main event loop
    loop {
        if app.pending().is_some() {
            // Show the loading state before blocking on the fetch
            terminal.draw(|f| render_ui(f, &app))?;
            app.process_pending().await;
        }
        app.poll_titles();

        terminal.draw(|f| render_ui(f, &app))?;

        // Poll for keyboard events with 100ms timeout
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }

        // Check if we should quit
        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;

    Ok(())
}

fn print_json(value: &serde_json::Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_profiles(config: &Config, wallets: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    if wallets.iter().all(|w| w.trim().is_empty()) {
        return Err(CliError::MissingArguments("wallet").into());
    }
    let api_gateway = config.api_gateway().unwrap_or_default();
    let cache = BatchedTtlCache::new(
        ProfileClient::new(api_gateway, config.auth()),
        config.profile_cache(),
    );

    let mut profiles = cache.get_many(wallets).await;
    let mut seen = std::collections::HashSet::new();
    let ordered: Vec<_> = wallets
        .iter()
        .filter(|w| seen.insert(w.as_str()))
        .filter_map(|w| profiles.remove(w))
        .collect();
    print_json(&json!(ordered))
}

async fn run_metadata(config: &Config, cids: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    if cids.iter().all(|c| c.trim().is_empty()) {
        return Err(CliError::MissingArguments("CID").into());
    }
    let client =
        IpfsClient::new(config.ipfs_gateway.as_deref()).with_timeout(config.ipfs_timeout());
    let cache = BatchedTtlCache::new(client, config.metadata_cache());

    let metadata = cache.get_many(cids).await;
    let mut seen = std::collections::HashSet::new();
    let entries: Vec<_> = cids
        .iter()
        .filter(|c| seen.insert(c.as_str()))
        .filter_map(|cid| {
            metadata.get(cid).map(|meta| {
                json!({
                    "cid": cid,
                    "url": cache.fetcher().ipfs_url(cid),
                    "title": meta.display_title(),
                    "metadata": meta,
                })
            })
        })
        .collect();
    print_json(&json!(entries))
}

async fn run_dares(
    config: &Config,
    status: Option<&str>,
    submission_status: Option<&str>,
    limit: Option<usize>,
    pages: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter = dare_filter_from_args(status, submission_status)?;
    let limit = validate_limit(limit.unwrap_or(config.page_size))?;
    let api_gateway = config.api_gateway().unwrap_or_default();

    let mut pager = CursorPager::new(DareListClient::new(api_gateway, config.auth()), limit, filter);
    pager.reset_and_fetch(filter).await?;

    let mut output = Vec::new();
    for _ in 0..pages.max(1) {
        let state = pager.state();
        output.push(json!({
            "page": state.page_number(),
            "cursor": state.current_cursor.as_ref().map(|c| c.as_str()),
            "hasNext": state.has_next,
            "rows": pager.rows(),
        }));
        if !state.has_next {
            break;
        }
        if output.len() < pages {
            pager.go_next().await?;
        }
    }
    print_json(&json!(output))
}

async fn run_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let api_gateway = config.api_gateway().unwrap_or_default();
    let client = DareStatsClient::new(api_gateway, config.auth());
    let price = PriceCache::with_clock(
        SolPriceClient::new(),
        config.sol_price_ttl(),
        Arc::new(SystemClock),
    );

    let (stats, sol_price) = tokio::join!(client.fetch_stats(), price.get_price());
    let summary = stats?.summarize(sol_price);
    if sol_price.is_none() {
        info!("SOL price unavailable, payouts in SOL only");
    }
    print_json(&json!(summary))
}

async fn run_notify(
    config: &Config,
    wallet: &str,
    kind: &str,
    dare_mint: Option<String>,
    remarks: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let kind = parse_notification_type_arg(kind)?;
    let mut request = NotificationRequest::new(wallet, kind);
    if let Some(dare_mint) = dare_mint {
        request = request.with_dare_mint(dare_mint);
    }
    if let Some(remarks) = remarks {
        request = request.with_remarks(remarks);
    }

    let api_gateway = config.api_gateway().unwrap_or_default();
    NotificationClient::new(api_gateway, config.auth())
        .try_send(&request)
        .await?;
    info!(kind = ?request.kind, wallet = %request.wallet, "notification sent");
    print_json(&json!({ "sent": true, "request": request }))
}

async fn run_price(config: &Config, lamports: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    let cache = PriceCache::with_clock(
        SolPriceClient::new(),
        config.sol_price_ttl(),
        Arc::new(SystemClock),
    );
    let price = cache.get_price().await.ok_or(CommandError::PriceUnavailable)?;

    let mut output = json!({ "usd": price });
    if let Some(lamports) = lamports {
        output["lamports"] = json!(lamports);
        output["sol"] = json!(format_sol_amount(lamports_to_sol(lamports), 9));
        output["usdValue"] = json!(lamports_to_usd(lamports, Some(price)));
    }
    print_json(&output)
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let command = cli.command();
    if let Command::Dares {
        status,
        submission_status,
        limit,
        ..
    } = &command
    {
        // Reject bad arguments before touching config or the network
        dare_filter_from_args(status.as_deref(), submission_status.as_deref())?;
        if let Some(limit) = limit {
            validate_limit(*limit)?;
        }
    }
    if let Command::Notify { kind, .. } = &command {
        parse_notification_type_arg(kind)?;
    }

    let config = Config::load(cli.config.as_deref())?;
    let needs_backend = matches!(
        command,
        Command::Browse
            | Command::Profiles { .. }
            | Command::Dares { .. }
            | Command::Stats
            | Command::Notify { .. }
    );
    config.validate(needs_backend)?;

    if command == Command::Browse {
        return run_tui(&config, &cli.log_level).await;
    }

    let _log_guard = logging::init(&cli.log_level, &LogTarget::Stderr)?;
    match command {
        Command::Browse => Ok(()),
        Command::Profiles { wallets } => run_profiles(&config, &wallets).await,
        Command::Metadata { cids } => run_metadata(&config, &cids).await,
        Command::Dares {
            status,
            submission_status,
            limit,
            pages,
        } => {
            run_dares(
                &config,
                status.as_deref(),
                submission_status.as_deref(),
                limit,
                pages,
            )
            .await
        }
        Command::Stats => run_stats(&config).await,
        Command::Notify {
            wallet,
            kind,
            dare_mint,
            remarks,
        } => run_notify(&config, &wallet, &kind, dare_mint, remarks).await,
        Command::Price { lamports } => run_price(&config, lamports).await,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
    Ok(())
}
