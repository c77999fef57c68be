use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, SettingsRow, Tab, TranslationStatus};
use crate::models::ReadingMode;
use crate::prefs::Theme;

/// Colors for the active theme. Auto leaves the text color to the
/// terminal so the app follows its light/dark scheme.
struct Palette {
    text: Color,
    dim: Color,
    accent: Color,
    highlight: Color,
}

impl Palette {
    fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Auto => Palette {
                text: Color::Reset,
                dim: Color::DarkGray,
                accent: Color::Cyan,
                highlight: Color::DarkGray,
            },
            Theme::Dark => Palette {
                text: Color::White,
                dim: Color::DarkGray,
                accent: Color::Cyan,
                highlight: Color::DarkGray,
            },
            Theme::Light => Palette {
                text: Color::Black,
                dim: Color::Gray,
                accent: Color::Blue,
                highlight: Color::Gray,
            },
        }
    }
}

pub fn draw(frame: &mut Frame, app: &App) {
    let palette = Palette::for_theme(app.theme);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tab bar
            Constraint::Min(0),    // Body
            Constraint::Length(1), // Status line
        ])
        .split(frame.area());

    render_tabs(frame, app, &palette, chunks[0]);

    match app.tab {
        Tab::Articles => render_articles(frame, app, &palette, chunks[1]),
        Tab::Bookmarks => render_bookmarks(frame, app, &palette, chunks[1]),
        Tab::Settings => render_settings(frame, app, &palette, chunks[1]),
    }

    render_status_line(frame, app, &palette, chunks[2]);

    // Render help popup if active
    if app.show_help {
        render_help(frame, &palette);
    }
}

fn render_tabs(frame: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let block = Block::default()
        .title(" Babel Reader ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut spans = Vec::new();
    for (i, tab) in Tab::ALL.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled("  |  ", Style::default().fg(palette.dim)));
        }
        let style = if *tab == app.tab {
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(palette.dim)
        };
        spans.push(Span::styled(tab.label(), style));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), inner);
}

fn render_articles(frame: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    // 1/3 list, 2/3 reading pane
    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 3), Constraint::Ratio(2, 3)])
        .split(area);

    render_article_list(frame, app, palette, panes[0]);
    render_article_detail(frame, app, palette, panes[1]);
}

fn render_article_list(frame: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let block = Block::default()
        .title(format!(" Articles ({}) ", app.articles.len()))
        .borders(Borders::ALL);

    if app.articles.is_empty() {
        let message = if app.is_fetching {
            "Loading latest articles..."
        } else {
            "No articles. Press r to refresh."
        };
        let paragraph = Paragraph::new(message)
            .block(block)
            .style(Style::default().fg(palette.dim));
        frame.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = app
        .articles
        .iter()
        .map(|article| {
            let line = Line::from(vec![
                Span::styled(
                    format!("[{}] ", article.origin_title()),
                    Style::default().fg(palette.accent),
                ),
                Span::styled(article.title.as_str(), Style::default().fg(palette.text)),
            ]);
            ListItem::new(line)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(palette.highlight)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(Some(app.article_index));

    frame.render_stateful_widget(list, area, &mut state);
}

fn render_article_detail(frame: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Article title
            Constraint::Min(0),    // Reading pane
            Constraint::Length(1), // Translation status
        ])
        .split(area);

    let title = app
        .selected_article()
        .map(|a| a.title.as_str())
        .unwrap_or("No article selected");

    let title_block = Block::default()
        .title(" Article ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent));
    let paragraph = Paragraph::new(title)
        .block(title_block)
        .style(Style::default().fg(palette.text))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, chunks[0]);

    let body = match app.selected_article() {
        None => String::new(),
        Some(article) => {
            let original = article.plain_content();
            if app.reading_mode != ReadingMode::Original
                && app.translation_status == TranslationStatus::Translating
            {
                "Translating...".to_string()
            } else {
                app.reading_mode
                    .compose(&original, app.translated_text.as_deref())
            }
        }
    };

    let body_block = Block::default()
        .title(format!(" {} ", app.reading_mode.label()))
        .borders(Borders::ALL);
    let paragraph = Paragraph::new(body)
        .block(body_block)
        .style(Style::default().fg(palette.text))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, chunks[1]);

    render_article_status(frame, app, palette, chunks[2]);
}

fn render_article_status(frame: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let Some(article) = app.selected_article() else {
        return;
    };

    let mut parts = Vec::new();
    if let Some(published) = article.published_label() {
        parts.push(published);
    }
    parts.push(match app.translation_status {
        TranslationStatus::NotRequested => "Enter: translate".to_string(),
        TranslationStatus::Translating => "Translating...".to_string(),
        TranslationStatus::Translated => {
            format!("Translated ({})", app.translations.engine().label())
        }
        TranslationStatus::Failed => "Translation failed".to_string(),
    });
    if app.is_bookmarked {
        parts.push("Bookmarked".to_string());
    }

    let paragraph =
        Paragraph::new(parts.join("  |  ")).style(Style::default().fg(palette.dim));
    frame.render_widget(paragraph, area);
}

fn render_bookmarks(frame: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 3), Constraint::Ratio(2, 3)])
        .split(area);

    let block = Block::default()
        .title(format!(" Bookmarks ({}) ", app.bookmarks.len()))
        .borders(Borders::ALL);

    if app.bookmarks.is_empty() {
        let paragraph = Paragraph::new("No bookmarks yet. Press b on an article to save it.")
            .block(block)
            .style(Style::default().fg(palette.dim));
        frame.render_widget(paragraph, panes[0]);
    } else {
        let items: Vec<ListItem> = app
            .bookmarks
            .iter()
            .map(|bookmark| {
                let line = Line::from(vec![
                    Span::styled(
                        format!("[{}] ", bookmark.origin.as_deref().unwrap_or("saved")),
                        Style::default().fg(palette.accent),
                    ),
                    Span::styled(bookmark.title.as_str(), Style::default().fg(palette.text)),
                ]);
                ListItem::new(line)
            })
            .collect();

        let list = List::new(items)
            .block(block)
            .highlight_style(
                Style::default()
                    .bg(palette.highlight)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");

        let mut state = ListState::default();
        state.select(Some(app.bookmark_index));
        frame.render_stateful_widget(list, panes[0], &mut state);
    }

    render_bookmark_detail(frame, app, palette, panes[1]);
}

fn render_bookmark_detail(frame: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    let title = app
        .selected_bookmark()
        .map(|b| b.title.as_str())
        .unwrap_or("No bookmark selected");

    let title_block = Block::default()
        .title(" Bookmark ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent));
    let paragraph = Paragraph::new(title)
        .block(title_block)
        .style(Style::default().fg(palette.text))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, chunks[0]);

    let body = app
        .selected_bookmark()
        .map(|bookmark| {
            app.reading_mode
                .compose(&bookmark.content, bookmark.translated_content.as_deref())
        })
        .unwrap_or_default();

    let body_block = Block::default()
        .title(format!(" {} ", app.reading_mode.label()))
        .borders(Borders::ALL);
    let paragraph = Paragraph::new(body)
        .block(body_block)
        .style(Style::default().fg(palette.text))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, chunks[1]);

    if let Some(bookmark) = app.selected_bookmark() {
        let saved = bookmark.created_at.format("%Y-%m-%d %H:%M").to_string();
        let mut parts = vec![format!("Saved {saved}")];
        if bookmark.translated_content.is_some() {
            parts.push(format!("Translated ({})", bookmark.engine));
        }
        let paragraph =
            Paragraph::new(parts.join("  |  ")).style(Style::default().fg(palette.dim));
        frame.render_widget(paragraph, chunks[2]);
    }
}

fn render_settings(frame: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let settings = app.speech.settings();
    let target = app.translations.target_language();

    let items: Vec<ListItem> = SettingsRow::ALL
        .iter()
        .map(|row| {
            let value = match row {
                SettingsRow::Engine => app.translations.engine().label().to_string(),
                SettingsRow::Theme => app.theme.label().to_string(),
                SettingsRow::Voice => voice_label(settings.voice.as_deref()).to_string(),
                SettingsRow::Rate => format!("{:.2}", settings.rate),
                SettingsRow::Pitch => format!("{:.2}", settings.pitch),
                SettingsRow::Volume => format!("{:.2}", settings.volume),
                SettingsRow::LanguageModel => {
                    format!("{target} ({})", app.translations.model_state(target).label())
                }
            };

            let line = Line::from(vec![
                Span::styled(
                    format!("{:<20}", row.label()),
                    Style::default().fg(palette.text),
                ),
                Span::styled(value, Style::default().fg(palette.accent)),
            ]);
            ListItem::new(line)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().title(" Settings ").borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .bg(palette.highlight)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(Some(app.settings_index));

    frame.render_stateful_widget(list, area, &mut state);
}

fn render_status_line(frame: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let playback = app
        .speech
        .progress()
        .map(|(current, total)| format!("Reading {current}/{total}  |  "))
        .unwrap_or_default();

    let (message, style) = if let Some(error) = &app.feed_error {
        (
            format!("Feed error: {error}"),
            Style::default().fg(Color::Red),
        )
    } else if let Some(status) = &app.status {
        (status.clone(), Style::default().fg(palette.dim))
    } else if app.is_fetching {
        ("Refreshing stream...".to_string(), Style::default().fg(palette.dim))
    } else {
        let hints = match app.tab {
            Tab::Articles => {
                "j/k:nav  Enter:translate  m:mode  e:engine  b:bookmark  p:read  ?:help  q:quit"
            }
            Tab::Bookmarks => "j/k:nav  m:mode  d:delete  p:read  ?:help  q:quit",
            Tab::Settings => "j/k:nav  h/l:adjust  Enter:apply  ?:help  q:quit",
        };
        (hints.to_string(), Style::default().fg(palette.dim))
    };

    let paragraph = Paragraph::new(format!("{playback}{message}")).style(style);
    frame.render_widget(paragraph, area);
}

fn render_help(frame: &mut Frame, palette: &Palette) {
    let area = centered_rect(50, 70, frame.area());

    let help_text = vec![
        "",
        " Navigation:",
        "   Tab      Switch tab",
        "   j / ↓    Move down",
        "   k / ↑    Move up",
        "   Enter    Translate article / apply setting",
        "",
        " Reading:",
        "   m        Cycle reading mode",
        "   e        Cycle translation engine",
        "   p        Read aloud / stop",
        "",
        " Bookmarks:",
        "   b        Bookmark or unbookmark article",
        "   d        Delete bookmark (Bookmarks tab)",
        "",
        " Settings:",
        "   h / l    Adjust selected setting",
        "",
        " General:",
        "   r        Refresh articles",
        "   ?        Toggle this help",
        "   q        Quit",
        "",
        " Press any key to close",
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent));

    let paragraph = Paragraph::new(help_text.join("\n"))
        .block(block)
        .style(Style::default().fg(palette.text));

    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

fn voice_label(voice: Option<&str>) -> &str {
    match voice {
        None => "system default",
        Some("+f3") => "female variant",
        Some("+m3") => "male variant",
        Some(other) => other,
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
