//! Markup rendering of a widget snapshot

use std::fmt::Write;

use crate::state::{WidgetSnapshot, ACTIVITY_TIMER, OFFICE_TIMER};

fn timer_label(name: &str) -> &str {
    match name {
        ACTIVITY_TIMER => "Activity",
        OFFICE_TIMER => "Office",
        other => other,
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Render the widget as markup for the host's header slot
pub fn render(snapshot: &WidgetSnapshot) -> String {
    let mut html = String::from("<div class=\"dashboard-timers\">");

    for timer in &snapshot.timers {
        let state = if timer.is_running { "running" } else { "stopped" };
        let _ = write!(
            html,
            "<div class=\"timer timer--{}\" data-timer=\"{}\"><span class=\"timer__label\">{}</span><span class=\"timer__elapsed\">{}</span></div>",
            state,
            escape(&timer.name),
            escape(timer_label(&timer.name)),
            timer.elapsed,
        );
    }

    if snapshot.client_name.is_some() || snapshot.project_name.is_some() {
        html.push_str("<div class=\"timer__context\">");
        if let Some(client) = &snapshot.client_name {
            let _ = write!(html, "<span class=\"timer__client\">{}</span>", escape(client));
        }
        if let Some(project) = &snapshot.project_name {
            let _ = write!(html, "<span class=\"timer__project\">{}</span>", escape(project));
        }
        html.push_str("</div>");
    }

    if let (Some(id), Some(display)) = (snapshot.active_incident_id, &snapshot.incident_countdown_display) {
        let modifier = if snapshot.countdown_completed { " incident-countdown--completed" } else { "" };
        let _ = write!(
            html,
            "<div class=\"incident-countdown{}\" data-incident=\"{}\">{}</div>",
            modifier, id, display,
        );
    }

    html.push_str("</div>");
    html
}
