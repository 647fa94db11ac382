//! Output formatting: tables, JSON, and notification lines.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use sumo_core::{Dialog, Notification, PortEvent, Severity};

use crate::cli::{ColorMode, OutputFormat};

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render rows as a table, JSON array, or one identifier per line.
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, serde_json::Error>
where
    T: serde::Serialize,
    R: Tabled,
{
    Ok(match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Table::new(rows).with(Style::rounded()).to_string()
        }
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
        OutputFormat::Plain => data.iter().map(&id_fn).collect::<Vec<_>>().join("\n"),
    })
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Notifications ────────────────────────────────────────────────────

/// Renders the notification stream for a terminal or a log pipeline.
#[derive(Debug, Clone, Copy)]
pub struct NotificationPrinter {
    pub format: OutputFormat,
    pub color: bool,
    pub quiet: bool,
}

impl NotificationPrinter {
    pub fn print(&self, note: &Notification) {
        let line = match self.format {
            OutputFormat::Json => match serde_json::to_string(note) {
                Ok(json) => json,
                Err(e) => {
                    tracing::warn!(error = %e, "notification not serializable");
                    return;
                }
            },
            OutputFormat::Table | OutputFormat::Plain => {
                // Errors always reach the operator, even in quiet mode.
                if self.quiet && !is_error(note) {
                    return;
                }
                render_notification(note, self.color)
            }
        };
        let mut out = io::stdout().lock();
        let _ = writeln!(out, "{line}");
    }
}

fn is_error(note: &Notification) -> bool {
    match note {
        Notification::Status { severity, .. } => *severity == Severity::Error,
        Notification::Dialog(d) => !d.details.is_empty(),
        Notification::Port(_) => false,
    }
}

pub fn render_notification(note: &Notification, color: bool) -> String {
    match note {
        Notification::Status { severity, text } => {
            let tag = format!("[{severity}]");
            let tag = if color {
                match severity {
                    Severity::Info => tag.green().to_string(),
                    Severity::Warning => tag.yellow().to_string(),
                    Severity::Error => tag.red().bold().to_string(),
                }
            } else {
                tag
            };
            format!("{tag} {text}")
        }
        Notification::Dialog(dialog) => render_dialog(dialog, color),
        Notification::Port(event) => {
            let text = match event {
                PortEvent::Connected(port) => format!("SumoRobot connected on {port}"),
                PortEvent::Disconnected => "SumoRobot disconnected".to_owned(),
                PortEvent::NetworksLoaded(networks) if networks.is_empty() => {
                    "No WiFi networks in range".to_owned()
                }
                PortEvent::NetworksLoaded(networks) => {
                    format!("WiFi networks: {}", networks.join(", "))
                }
            };
            if color {
                format!("{} {text}", "->".cyan())
            } else {
                format!("-> {text}")
            }
        }
    }
}

fn render_dialog(dialog: &Dialog, color: bool) -> String {
    let title = if color {
        dialog.title.bold().to_string()
    } else {
        dialog.title.clone()
    };
    let mut out = format!("== {title} ==");
    let message = strip_markup(&dialog.message);
    if !message.is_empty() {
        out.push('\n');
        out.push_str(&message);
    }
    if !dialog.details.is_empty() {
        out.push_str("\nDetails:\n");
        for line in dialog.details.lines() {
            out.push_str("  ");
            out.push_str(line);
            out.push('\n');
        }
        out.truncate(out.trim_end().len());
    }
    if let Some(image) = &dialog.image {
        out.push_str(&format!("\n(see {image})"));
    }
    out
}

/// Dialog bodies may carry simple HTML; a terminal gets text plus link targets.
pub fn strip_markup(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let Some(end) = rest[start..].find('>') else {
            rest = &rest[start..];
            break;
        };
        let tag = &rest[start + 1..start + end];
        if let Some(href) = attribute(tag, "href") {
            out.push_str(&format!("{href} "));
        }
        if tag.eq_ignore_ascii_case("/p") || tag.eq_ignore_ascii_case("br") {
            out.push('\n');
        }
        rest = &rest[start + end + 1..];
    }
    out.push_str(rest);

    // Links render as "target text"; keep just the target when they match.
    out.lines()
        .map(|l| dedupe_link(l.trim()))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn attribute<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let after = tag.split_once(&format!("{name}=\""))?.1;
    after.split_once('"').map(|(value, _)| value)
}

fn dedupe_link(line: &str) -> String {
    match line.split_once(' ') {
        Some((target, text)) if target.ends_with(text) => target.to_owned(),
        _ => line.to_owned(),
    }
}
