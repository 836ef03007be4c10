//! Console log format for the fwup tool.
//!
//! ```text
//! [14:02:11.408] [session ] [ℹ INFO ] <awaiting tree ack> Done writing firmware version 4 in 1.2s
//! ```
//!
//! The component column comes from an explicit `component` field, or else
//! from the crate that emitted the event. Events carrying a `phase` field
//! (the session state machine records one on every transition) show it in
//! angle brackets; any other fields trail the message as `key=value`.

use std::fmt;
use std::io::IsTerminal;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{format::Writer, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

const COLOR_RESET: &str = "\x1b[0m";
const COLOR_CYAN: &str = "\x1b[36m";
const COLOR_MAGENTA: &str = "\x1b[35m";
const COLOR_GREEN: &str = "\x1b[32m";
const COLOR_BRIGHT_YELLOW: &str = "\x1b[93m";
const COLOR_BRIGHT_RED: &str = "\x1b[91m";
const COLOR_BRIGHT_GRAY: &str = "\x1b[90m";

const COMPONENT_WIDTH: usize = 8;

/// Crate prefix stripped when a component is derived from the event target
const CRATE_PREFIX: &str = "fwup_";

/// fwup console formatter
pub struct FwupLogFormatter {
    tool_name: String,
    color_enabled: bool,
}

/// Log with a `component` field shown in the component column
#[macro_export]
macro_rules! component_info {
    ($component:expr, $($arg:tt)*) => {
        tracing::info!(component = $component, $($arg)*)
    };
}

#[macro_export]
macro_rules! component_error {
    ($component:expr, $($arg:tt)*) => {
        tracing::error!(component = $component, $($arg)*)
    };
}

impl FwupLogFormatter {
    /// Formatter for stderr; color only when stderr is a terminal
    pub fn new(tool_name: String) -> Self {
        let color_enabled =
            std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none();
        Self {
            tool_name,
            color_enabled,
        }
    }

    /// `fwup_session::transport` becomes `session`; the binary's own target
    /// maps to the tool name
    fn component_for<'a>(&'a self, field: Option<&'a str>, target: &'a str) -> &'a str {
        if let Some(component) = field {
            return component;
        }
        let krate = target.split("::").next().unwrap_or(target);
        match krate.strip_prefix(CRATE_PREFIX) {
            Some(short) if !short.is_empty() => short,
            _ => &self.tool_name,
        }
    }

    fn format_component(&self, component: &str) -> String {
        if component.chars().count() > COMPONENT_WIDTH {
            let head: String = component.chars().take(COMPONENT_WIDTH - 1).collect();
            format!("{}…", head)
        } else {
            format!("{:<width$}", component, width = COMPONENT_WIDTH)
        }
    }

    fn level_tag(level: &tracing::Level) -> &'static str {
        match *level {
            tracing::Level::ERROR => "✗ ERROR",
            tracing::Level::WARN => "⚠ WARN ",
            tracing::Level::INFO => "ℹ INFO ",
            tracing::Level::DEBUG => "◦ DEBUG",
            tracing::Level::TRACE => "· TRACE",
        }
    }

    fn paint(&self, color: &'static str) -> &'static str {
        if self.color_enabled {
            color
        } else {
            ""
        }
    }

    fn level_color(&self, level: &tracing::Level) -> &'static str {
        self.paint(match *level {
            tracing::Level::ERROR => COLOR_BRIGHT_RED,
            tracing::Level::WARN => COLOR_BRIGHT_YELLOW,
            tracing::Level::INFO => COLOR_GREEN,
            tracing::Level::DEBUG | tracing::Level::TRACE => COLOR_BRIGHT_GRAY,
        })
    }

    fn render(&self, level: &tracing::Level, target: &str, fields: &EventFields) -> String {
        let timestamp = chrono::Local::now().format("%H:%M:%S%.3f");
        let component = self.component_for(fields.component.as_deref(), target);
        let reset = self.paint(COLOR_RESET);

        let mut line = format!(
            "{}[{}]{} [{}] [{}{}{}] ",
            self.paint(COLOR_CYAN),
            timestamp,
            reset,
            self.format_component(component),
            self.level_color(level),
            Self::level_tag(level),
            reset,
        );
        if let Some(phase) = &fields.phase {
            line.push_str(&format!("{}<{}>{} ", self.paint(COLOR_MAGENTA), phase, reset));
        }
        line.push_str(&fields.message);
        for (key, value) in &fields.extra {
            line.push_str(&format!(" {}={}", key, value));
        }
        line
    }
}

impl<S, N> FormatEvent<S, N> for FwupLogFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut fields = EventFields::default();
        event.record(&mut fields);

        let metadata = event.metadata();
        writeln!(
            writer,
            "{}",
            self.render(metadata.level(), metadata.target(), &fields)
        )
    }
}

/// Fields pulled out of one event
#[derive(Debug, Default)]
struct EventFields {
    message: String,
    component: Option<String>,
    phase: Option<String>,
    extra: Vec<(&'static str, String)>,
}

impl EventFields {
    fn set(&mut self, name: &'static str, value: String) {
        match name {
            "message" => self.message = value,
            "component" => self.component = Some(value),
            "phase" => self.phase = Some(value),
            _ => self.extra.push((name, value)),
        }
    }
}

impl tracing::field::Visit for EventFields {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        self.set(field.name(), unquote(format!("{:?}", value)));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.set(field.name(), value.to_string());
    }
}

fn unquote(text: String) -> String {
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        text[1..text.len() - 1].to_string()
    } else {
        text
    }
}
