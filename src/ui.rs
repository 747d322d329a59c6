use crate::achievements::NO_MATCHES;
use crate::app::{drawer_width, App, Viewport, MIN_COLS, MIN_ROWS};
use crate::braille::BrailleCanvas;
use crate::data::OutlineSource;
use crate::geo::{vec3_to_lat_lng, EARTH_RADIUS};
use crate::lighting::DaylightPhase;
use crate::map::globe::{render_globe, GlobeFrame, SceneView};
use crate::map::labels::LabelKind;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
    Frame,
};

/// Render the UI
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();
    if !app.viewport.is_supported() {
        render_unsupported(frame, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Globe
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    let inner = render_globe_area(frame, app, chunks[0]);
    if let Some(text) = app.hover_text() {
        render_tooltip(frame, app, inner, &text);
    }
    if app.drawer_open {
        render_drawer(frame, app, inner);
    }
    render_status_bar(frame, app, chunks[1]);
}

/// Capability check failed: message only, nothing else is drawn.
fn render_unsupported(frame: &mut Frame, area: Rect) {
    let text = vec![
        Line::from(Span::styled(
            "Globe unavailable",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::from(format!(
            "Terminal is {}x{}, needs at least {MIN_COLS}x{MIN_ROWS}.",
            area.width, area.height
        )),
        Line::from(Span::styled(
            "Resize and press r to retry, q to quit",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let top = area.height.saturating_sub(3) / 2;
    let rect = Rect::new(area.x, area.y + top, area.width, area.height.min(3));
    frame.render_widget(
        Paragraph::new(text).alignment(Alignment::Center).wrap(Wrap { trim: true }),
        rect,
    );
}

fn render_globe_area(frame: &mut Frame, app: &App, area: Rect) -> Rect {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            " Office Globe ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let camera = app.current_camera();
    let view = SceneView {
        camera: &camera,
        coastlines: app.coastlines(),
        markers: &app.registry,
        labels: app.show_labels.then_some(&app.labels),
        sun_direction: app.lighting.sun().direction,
        selected: app.selected,
        flash: app.flashing(),
        frame: app.frame,
    };
    let globe = render_globe(&view, inner.width, inner.height);

    let levels = app.lighting.levels();
    let day = ((levels.sun + levels.ambient) / 3.3).clamp(0.25, 1.0);
    let night = ((levels.sun + levels.ambient + levels.night_ambient.unwrap_or(0.0)) / 0.75).clamp(0.35, 1.0);

    frame.render_widget(
        GlobeWidget {
            globe,
            day_brightness: day,
            night_brightness: night,
        },
        inner,
    );
    inner
}

fn scale((r, g, b): (u8, u8, u8), k: f64) -> Color {
    let f = |c: u8| (c as f64 * k).round().clamp(0.0, 255.0) as u8;
    Color::Rgb(f(r), f(g), f(b))
}

struct GlobeWidget {
    globe: GlobeFrame,
    day_brightness: f64,
    night_brightness: f64,
}

impl GlobeWidget {
    /// Copy the non-empty cells of a Braille layer into the buffer.
    fn render_layer(canvas: &BrailleCanvas, color: Color, area: Rect, buf: &mut Buffer) {
        for (col, row, ch) in canvas.glyphs() {
            if col >= area.width || row >= area.height {
                continue;
            }
            buf[(area.x + col, area.y + row)].set_char(ch).set_fg(color);
        }
    }

    fn render_text(text: &str, col: u16, row: u16, style: Style, area: Rect, buf: &mut Buffer) {
        if row >= area.height {
            return;
        }
        let y = area.y + row;
        for (i, ch) in text.chars().enumerate() {
            let x = col as usize + i;
            if x >= area.width as usize {
                break;
            }
            buf[(area.x + x as u16, y)].set_char(ch).set_style(style);
        }
    }
}

impl Widget for GlobeWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let g = &self.globe;
        Self::render_layer(&g.stars, Color::DarkGray, area, buf);
        Self::render_layer(&g.day_fill, scale((40, 90, 160), self.day_brightness), area, buf);
        Self::render_layer(&g.limb, Color::Blue, area, buf);
        Self::render_layer(&g.night_land, scale((0x44, 0x66, 0xaa), self.night_brightness), area, buf);
        Self::render_layer(&g.day_land, scale((120, 230, 140), self.day_brightness), area, buf);

        for marker in &g.markers {
            let (r, gr, b) = marker.glow_color;
            Self::render_layer(&marker.glow, Color::Rgb(r, gr, b), area, buf);
            let (r, gr, b) = marker.color;
            Self::render_layer(&marker.core, Color::Rgb(r, gr, b), area, buf);
        }

        for label in &g.labels {
            let style = match label.kind {
                LabelKind::Continent => Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
                LabelKind::Country => Style::default().fg(Color::Gray),
                LabelKind::City => Style::default().fg(Color::DarkGray),
            };
            Self::render_text(&label.text, label.col, label.row, style, area, buf);
        }
    }
}

fn render_tooltip(frame: &mut Frame, app: &App, area: Rect, text: &str) {
    let Some((x, y)) = app.pointer else {
        return;
    };
    let width = (text.chars().count() as u16 + 2).min(area.width);
    let col = ((x / 2.0) as u16 + 2).min(area.width.saturating_sub(width));
    let row = ((y / 4.0) as u16).saturating_sub(1).min(area.height.saturating_sub(1));
    let rect = Rect::new(area.x + col, area.y + row, width, 1);
    frame.render_widget(Clear, rect);
    frame.render_widget(
        Paragraph::new(format!(" {text} ")).style(Style::default().fg(Color::Black).bg(Color::Cyan)),
        rect,
    );
}

fn render_drawer(frame: &mut Frame, app: &App, area: Rect) {
    let Some(location) = app.selected_location() else {
        tracing::warn!("drawer open without a selected location");
        return;
    };
    let width = drawer_width(area.width);
    let rect = Rect::new(area.x + area.width - width, area.y, width, area.height);

    let muted = Style::default().fg(Color::DarkGray);
    let mut lines = vec![];
    if let Some(role) = &location.role {
        lines.push(Line::from(Span::styled(role.clone(), Style::default().fg(Color::Cyan))));
    }
    lines.push(Line::from(Span::styled(
        format!(
            "Established {} · {} employees",
            location.established_year, location.employee_count
        ),
        muted,
    )));
    if let Some(description) = &location.description {
        lines.push(Line::from(description.clone()));
    }
    lines.push(Line::from(vec![
        Span::styled("Filter: ", muted),
        Span::styled(app.filter.describe(), Style::default().fg(Color::Yellow)),
        Span::styled("  (c/y)", muted),
    ]));
    lines.push(Line::default());

    let items = app.drawer_items();
    if items.is_empty() {
        lines.push(Line::from(Span::styled(NO_MATCHES, muted)));
    }
    for achievement in items {
        lines.push(Line::from(Span::styled(
            achievement.title.clone(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(
            format!("{} · {}", achievement.year, achievement.category),
            Style::default().fg(Color::Magenta),
        )));
        lines.push(Line::from(achievement.description.clone()));
        if !achievement.impact.is_empty() {
            lines.push(Line::from(vec![
                Span::styled("Impact: ", muted),
                Span::raw(achievement.impact.clone()),
            ]));
        }
        if !achievement.metrics.is_empty() {
            let metrics = achievement
                .metrics
                .iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect::<Vec<_>>()
                .join(" · ");
            lines.push(Line::from(Span::styled(metrics, Style::default().fg(Color::Green))));
        }
        lines.push(Line::default());
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Span::styled(
            format!(" {} ", location.name),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
        .title_bottom(Line::from(Span::styled(" Esc: close ", muted)).right_aligned());

    frame.render_widget(Clear, rect);
    frame.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: true }), rect);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let summary = app.summary();
    let muted = Style::default().fg(Color::DarkGray);
    let mut outline = match app.outline_source() {
        OutlineSource::File(path) => path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("geojson")
            .to_string(),
        OutlineSource::Procedural => "procedural".to_string(),
    };
    if app.outline_pending() {
        outline.push_str(" (loading)");
    }
    let phase = app.lighting.phase();
    let lit = !matches!(phase, DaylightPhase::Nighttime);
    let milestone = app
        .timeline
        .milestone()
        .map(|(year, text)| format!(" ({year}: {text})"))
        .unwrap_or_default();

    let status = Line::from(vec![
        Span::styled(
            format!(" {} ", phase.icon()),
            Style::default().fg(if lit { Color::Yellow } else { Color::Blue }),
        ),
        Span::styled(
            format!("{} {:.0}% ", app.lighting.status_text(app.clock), app.lighting.intensity() * 100.0),
            Style::default().fg(Color::Yellow),
        ),
        Span::styled("| Over: ", muted),
        Span::styled(
            format!("{} ", format_lat_lng(vec3_to_lat_lng(app.camera.position()))),
            Style::default().fg(Color::Magenta),
        ),
        Span::styled(
            format!("{:.1}R ", app.camera.distance() / EARTH_RADIUS),
            Style::default().fg(Color::Magenta),
        ),
        Span::styled("| Year: ", muted),
        Span::styled(
            format!("{}{}", app.timeline.year(), if app.timeline.is_playing() { "▶" } else { "" }),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled(format!("{milestone} "), muted),
        Span::styled(
            format!(
                "| {} offices {} staff {} achievements {} projects ",
                summary.locations,
                app.live.employees(summary.employees),
                summary.achievements,
                app.live.projects()
            ),
            Style::default().fg(Color::Green),
        ),
        Span::styled(format!("| map: {outline} "), muted),
        Span::styled(
            "| 1-9/Tab:fly c/y:filter m [ ]:light , . p:timeline L:labels q:quit",
            muted,
        ),
    ]);

    frame.render_widget(Paragraph::new(status), area);
}

fn format_lat_lng((lat, lng): (f64, f64)) -> String {
    let ns = if lat >= 0.0 { 'N' } else { 'S' };
    let ew = if lng >= 0.0 { 'E' } else { 'W' };
    format!("{:.1}°{ns} {:.1}°{ew}", lat.abs(), lng.abs())
}
