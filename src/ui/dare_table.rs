//! Dare table screen rendering
//!
//! Renders one page of dares with their titles, creators, status and payout,
//! plus a header with the active filters and a status line for errors.

use chrono::{Local, TimeZone};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::App;
use crate::data::sol_price::{format_sol_amount, lamports_to_sol, lamports_to_usd, parse_lamports};
use crate::data::{DareItem, DareStatus, ProfileData};
use crate::pager::PagerStatus;

const TITLE_WIDTH: usize = 28;
const CREATOR_WIDTH: usize = 20;

/// Color for a dare status badge
fn status_color(status: DareStatus) -> Color {
    match status {
        DareStatus::Open => Color::Blue,
        DareStatus::Accepted => Color::Yellow,
        DareStatus::Completed => Color::Green,
        DareStatus::Censored | DareStatus::Failed => Color::Red,
        DareStatus::Unverified | DareStatus::Withdrawn | DareStatus::Expired => Color::Gray,
    }
}

/// `first8...last8`, or the input when it is already short
pub fn short_mint(mint: &str) -> String {
    let chars: Vec<char> = mint.chars().collect();
    if chars.len() <= 16 {
        return mint.to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 8..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Creator cell: username when known, otherwise the shortened wallet
pub fn creator_label(wallet: &str, profile: Option<&ProfileData>) -> String {
    match profile.and_then(|p| p.username.as_deref()).filter(|u| !u.trim().is_empty()) {
        Some(username) => username.to_string(),
        None => short_mint(wallet),
    }
}

/// `dd-MM-yyyy HH:mm` in local time; `Not opened` for a zero timestamp
pub fn format_open_time(timestamp: i64) -> String {
    if timestamp == 0 {
        return "Not opened".to_string();
    }
    match Local.timestamp_opt(timestamp, 0).single() {
        Some(time) => time.format("%d-%m-%Y %H:%M").to_string(),
        None => "Invalid time".to_string(),
    }
}

/// `2d 5h`, or `7h` under a day
pub fn format_duration(seconds: i64) -> String {
    let hours = seconds.max(0) / 3600;
    let days = hours / 24;
    if days > 0 {
        format!("{}d {}h", days, hours % 24)
    } else {
        format!("{}h", hours)
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        format!("{:<width$}", text, width = width)
    } else {
        let cut: String = text.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

/// Renders the dare table screen
pub fn render_dare_table(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Filters and page
            Constraint::Length(1), // Aggregate stats
            Constraint::Min(5),    // Table
            Constraint::Length(1), // Status line
            Constraint::Length(1), // Key hints
        ])
        .split(area);

    render_header(frame, chunks[0], app);
    render_stats(frame, chunks[1], app);
    render_rows(frame, chunks[2], app);
    render_status_line(frame, chunks[3], app);
    render_help(frame, chunks[4]);
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let filter = app.filter();
    let status = filter
        .status
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|| "all".to_string());

    let mut spans = vec![
        Span::styled("Status: ", Style::default().fg(Color::DarkGray)),
        Span::styled(status, Style::default().fg(Color::Cyan)),
    ];
    if let Some(submission) = filter.effective_submission_status() {
        spans.push(Span::styled("  Submissions: ", Style::default().fg(Color::DarkGray)));
        spans.push(Span::styled(submission.as_str(), Style::default().fg(Color::Cyan)));
    }
    spans.push(Span::styled(
        format!("  Page {}", app.pager_state().page_number()),
        Style::default().fg(Color::White),
    ));
    spans.push(Span::styled(
        format!("  {} rows", app.page_size()),
        Style::default().fg(Color::DarkGray),
    ));
    if let Some(price) = app.sol_price {
        spans.push(Span::styled(
            format!("  SOL ${:.2}", price),
            Style::default().fg(Color::DarkGray),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_stats(frame: &mut Frame, area: Rect, app: &App) {
    let label = Style::default().fg(Color::DarkGray);
    let value = Style::default().fg(Color::White);

    let line = match app.stats_summary() {
        Some(stats) => Line::from(vec![
            Span::styled("Total ", label),
            Span::styled(stats.total_dares.to_string(), value),
            Span::styled("  Active ", label),
            Span::styled(stats.active_dares.to_string(), value),
            Span::styled("  Completed ", label),
            Span::styled(stats.completed_dares.to_string(), value),
            Span::styled("  Unverified ", label),
            Span::styled(stats.unverified_dares.to_string(), value),
            Span::styled("  Payout ", label),
            Span::styled(stats.total_payout_label(), Style::default().fg(Color::Green)),
            Span::styled("  Avg ", label),
            Span::styled(stats.average_payout_label(), Style::default().fg(Color::Green)),
        ]),
        None => Line::from(Span::styled("Total --  Active --  Completed --", label)),
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn title_cell(app: &App, dare: &DareItem) -> (String, Style) {
    match app.dare_title(&dare.ipfs_cid) {
        Some(Some(title)) => (title.to_string(), Style::default().fg(Color::White)),
        None if app.titles_loading() && !dare.ipfs_cid.is_empty() => (
            "Loading...".to_string(),
            Style::default().fg(Color::DarkGray),
        ),
        _ => (short_mint(&dare.token_mint), Style::default().fg(Color::Gray)),
    }
}

fn payout_cell(app: &App, dare: &DareItem) -> String {
    match parse_lamports(&dare.payout) {
        Some(lamports) => {
            let sol = format!("{} SOL", format_sol_amount(lamports_to_sol(lamports), 4));
            match lamports_to_usd(lamports, app.sol_price) {
                Some(usd) => format!("{} ({})", sol, usd),
                None => sol,
            }
        }
        None => "--".to_string(),
    }
}

fn render_rows(frame: &mut Frame, area: Rect, app: &App) {
    let mut lines = vec![Line::from(Span::styled(
        format!(
            "   {} {} {:<10} {:<16} {:>6} {}",
            truncate("Title", TITLE_WIDTH),
            truncate("Creator", CREATOR_WIDTH),
            "Status",
            "Opened",
            "Length",
            "Payout"
        ),
        Style::default().add_modifier(Modifier::BOLD),
    ))];

    if app.rows().is_empty() {
        let message = match app.pager_status() {
            PagerStatus::Loading => "Loading dares...",
            PagerStatus::Error(_) => "Failed to load dares",
            _ => "No dares match the current filter",
        };
        lines.push(Line::from(Span::styled(
            format!("   {}", message),
            Style::default().fg(Color::DarkGray),
        )));
    }

    for (i, dare) in app.rows().iter().enumerate() {
        let is_selected = i == app.selected_index;
        let cursor = if is_selected { " ▸ " } else { "   " };
        let (title, title_style) = title_cell(app, dare);
        let title_style = if is_selected {
            title_style.fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            title_style
        };
        let creator = creator_label(&dare.creator, app.creator_profile(&dare.creator));
        let mut status = dare.dare_status.as_str().to_string();
        if dare.is_blocked {
            status.push('!');
        }

        lines.push(Line::from(vec![
            Span::styled(cursor, Style::default().fg(Color::Cyan)),
            Span::styled(truncate(&title, TITLE_WIDTH), title_style),
            Span::raw(" "),
            Span::raw(truncate(&creator, CREATOR_WIDTH)),
            Span::raw(" "),
            Span::styled(
                format!("{:<10}", status),
                Style::default().fg(status_color(dare.dare_status)),
            ),
            Span::raw(" "),
            Span::raw(format!("{:<16}", format_open_time(dare.open_timestamp))),
            Span::raw(" "),
            Span::raw(format!("{:>6}", format_duration(dare.open_duration))),
            Span::raw(" "),
            Span::styled(payout_cell(app, dare), Style::default().fg(Color::Green)),
        ]));
    }

    let block = Block::default()
        .title(" Dares ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_status_line(frame: &mut Frame, area: Rect, app: &App) {
    let line = match (&app.status_message, app.pager_status()) {
        (Some(message), _) => Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Red),
        )),
        (None, PagerStatus::Loading) => Line::from(Span::styled(
            "Loading...",
            Style::default().fg(Color::Yellow),
        )),
        (None, _) => {
            let state = app.pager_state();
            let mut text = format!("{} rows", app.rows().len());
            if state.has_prev {
                text.push_str(" │ ← prev");
            }
            if state.has_next {
                text.push_str(" │ next →");
            }
            if let Some(last_refresh) = app.last_refresh {
                text.push_str(&format!(" │ Loaded {}", last_refresh.format("%H:%M:%S")));
            }
            Line::from(Span::styled(text, Style::default().fg(Color::DarkGray)))
        }
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn render_help(frame: &mut Frame, area: Rect) {
    let help_text = Line::from(vec![
        Span::styled("j/k", Style::default().fg(Color::Yellow)),
        Span::raw(" Move  "),
        Span::styled("n/p", Style::default().fg(Color::Yellow)),
        Span::raw(" Page  "),
        Span::styled("s", Style::default().fg(Color::Yellow)),
        Span::raw(" Status  "),
        Span::styled("z", Style::default().fg(Color::Yellow)),
        Span::raw(" Rows  "),
        Span::styled("u", Style::default().fg(Color::Yellow)),
        Span::raw(" Submissions  "),
        Span::styled("r", Style::default().fg(Color::Yellow)),
        Span::raw(" Reload  "),
        Span::styled("?", Style::default().fg(Color::Yellow)),
        Span::raw(" Help  "),
        Span::styled("q", Style::default().fg(Color::Yellow)),
        Span::raw(" Quit"),
    ]);
    let paragraph = Paragraph::new(help_text).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}
