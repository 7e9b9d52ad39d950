use crate::app::App;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span, Text},
    widgets::{
        canvas::{Canvas, Circle, Line as CanvasLine, Rectangle},
        Block, Borders, Paragraph, Wrap,
    },
    Frame,
};
use room::SlotContent;
use room_core::{ConnectionState, PresenceStatus};
use visualization::{Rgba, Scene, Shape};

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(4), // Status
            Constraint::Length(7), // Slot cards
            Constraint::Min(8), // Visualization
            Constraint::Length(1), // Key help
        ])
        .split(f.size());

    draw_status(f, app, chunks[0]);
    draw_slots(f, app, chunks[1]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(chunks[2]);
    draw_scene(f, &app.scene.borrow(), body[0]);
    draw_activity(f, app, body[1]);

    let help = Paragraph::new("c connect   d disconnect   m mute/unmute   q quit")
        .style(Style::default().fg(Color::DarkGray));
    f.render_widget(help, chunks[3]);
}

fn state_color(state: ConnectionState) -> Color {
    match state {
        ConnectionState::Idle | ConnectionState::Disconnected => Color::Gray,
        ConnectionState::Connecting => Color::Yellow,
        ConnectionState::Connected => Color::Green,
        ConnectionState::Error => Color::Red,
    }
}

fn presence_color(status: PresenceStatus) -> Color {
    match status {
        PresenceStatus::Offline => Color::DarkGray,
        PresenceStatus::Online => Color::Green,
        PresenceStatus::Speaking => Color::Yellow,
    }
}

fn draw_status(f: &mut Frame, app: &App, area: Rect) {
    let microphone = match app.controller.session() {
        Some(session) if session.microphone_enabled() => "on",
        Some(_) => "muted",
        None => "-",
    };
    let mut lines = vec![Line::from(vec![
        Span::styled(
            "mentor_room",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(
            "  room {} as {}  ",
            app.controller.room(),
            app.controller.identity()
        )),
        Span::styled(
            app.state.to_string(),
            Style::default().fg(state_color(app.state)),
        ),
        Span::raw(format!("  mic {}", microphone)),
    ])];
    if let Some(message) = &app.status_message {
        lines.push(Line::styled(message.clone(), Style::default().fg(Color::Red)));
    }

    let status = Paragraph::new(Text::from(lines))
        .wrap(Wrap { trim: true })
        .block(Block::default().title("Session").borders(Borders::ALL));
    f.render_widget(status, area);
}

fn draw_slots(f: &mut Frame, app: &App, area: Rect) {
    let router = app.controller.router();
    let entries = router.registry().entries();
    if entries.is_empty() {
        return;
    }
    let constraints: Vec<Constraint> = entries
        .iter()
        .map(|_| Constraint::Ratio(1, entries.len() as u32))
        .collect();
    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);

    for (entry, card) in entries.iter().zip(cards.iter()) {
        let presence = router.presence(entry.slot);
        let body = match router.target(entry.slot).map(|target| target.content()) {
            Some(SlotContent::Video(element)) => vec![
                Line::styled("● live", Style::default().fg(Color::Green)),
                Line::raw(element.participant.clone()),
                Line::styled(
                    element.track.to_string(),
                    Style::default().fg(Color::DarkGray),
                ),
            ],
            Some(SlotContent::Placeholder(placeholder)) => vec![
                Line::styled(
                    placeholder.initials.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Line::raw(placeholder.caption.clone()),
            ],
            None => vec![Line::raw("no render target")],
        };
        let mut text = Text::from(body);
        text.lines.push(Line::styled(
            presence.to_string(),
            Style::default().fg(presence_color(presence)),
        ));

        let card_widget = Paragraph::new(text)
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .title(entry.placeholder.display_name.clone())
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(presence_color(presence))),
            );
        f.render_widget(card_widget, *card);
    }
}

fn to_color(color: Rgba) -> Color {
    Color::Rgb(color.r, color.g, color.b)
}

fn draw_scene(f: &mut Frame, scene: &Scene, area: Rect) {
    let height = scene.height as f64;
    let canvas = Canvas::default()
        .block(
            Block::default()
                .title(format!("Microphone  {:>3.0}%", scene.pulse * 100.0))
                .borders(Borders::ALL),
        )
        .marker(Marker::Braille)
        .x_bounds([0.0, scene.width as f64])
        .y_bounds([0.0, height])
        .paint(|ctx| {
            // Scene coordinates grow downwards, the canvas grows upwards
            for shape in &scene.shapes {
                match *shape {
                    Shape::Circle { x, y, radius, fill } => ctx.draw(&Circle {
                        x: x as f64,
                        y: height - y as f64,
                        radius: radius as f64,
                        color: to_color(fill),
                    }),
                    Shape::Ray {
                        x1, y1, x2, y2, color, ..
                    } => ctx.draw(&CanvasLine {
                        x1: x1 as f64,
                        y1: height - y1 as f64,
                        x2: x2 as f64,
                        y2: height - y2 as f64,
                        color: to_color(color),
                    }),
                    Shape::Bar {
                        x,
                        y,
                        width,
                        height: bar_height,
                        gradient,
                    } => {
                        let top_fraction = if height > 0.0 {
                            (bar_height as f64 / height) as f32
                        } else {
                            0.0
                        };
                        ctx.draw(&Rectangle {
                            x: x as f64,
                            y: height - (y + bar_height) as f64,
                            width: width as f64,
                            height: bar_height as f64,
                            color: to_color(gradient.at(top_fraction)),
                        })
                    }
                }
            }
        });
    f.render_widget(canvas, area);
}

fn draw_activity(f: &mut Frame, app: &App, area: Rect) {
    let lines: Vec<Line> = app
        .activity
        .iter()
        .map(|line| Line::raw(line.clone()))
        .collect();
    let activity = Paragraph::new(Text::from(lines))
        .block(Block::default().title("Activity").borders(Borders::ALL));
    f.render_widget(activity, area);
}
