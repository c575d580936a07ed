use chrono::Utc;
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_error::ErrorLayer;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{self, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Registry};

const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[90m";

/// Human readable, column aligned output.
pub struct PrettyFormatter;

impl<S, N> FormatEvent<S, N> for PrettyFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> std::fmt::Result {
        let meta = event.metadata();
        let now = Utc::now().format("%y-%m-%d %H:%M:%S");

        let level_color = match *meta.level() {
            Level::TRACE => "\x1b[90m",
            Level::DEBUG => "\x1b[34m",
            Level::INFO => "\x1b[32m",
            Level::WARN => "\x1b[33m",
            Level::ERROR => "\x1b[31m",
        };
        let ts_color = "\x1b[96m";
        let service_color = "\x1b[92m";
        let msg_color = "\x1b[97m";

        let mut visitor = PrettyFieldVisitor::default();
        event.record(&mut visitor);

        // Timestamp | Level | Service | Message (fields)
        write!(writer, "{ts_color}{now}{RESET} {DIM}|{RESET} ")?;
        write!(writer, "{level_color}{:<5}{RESET} {DIM}|{RESET} ", *meta.level())?;
        write!(writer, "{service_color}{:<10}{RESET} {DIM}|{RESET} ", service_name(meta.target()))?;
        write!(writer, "{msg_color}{}{RESET}", visitor.message)?;

        if let Some(span) = ctx.lookup_current() {
            write!(writer, " {DIM}[{}]{RESET}", span.metadata().name())?;
        }
        if !visitor.fields.is_empty() {
            write!(writer, " ({})", visitor.fields)?;
        }
        writeln!(writer)
    }
}

#[derive(Default)]
struct PrettyFieldVisitor {
    message: String,
    fields: String,
}

impl Visit for PrettyFieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let value = format!("{value:?}");
        let value = value.trim_matches('"');
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            if !self.fields.is_empty() {
                self.fields.push_str(", ");
            }
            self.fields.push_str(&format!("{DIM}{}={value}{RESET}", field.name()));
        }
    }
}

/// One JSON object per line, for log collectors.
pub struct JsonEventFormatter;

#[derive(Default)]
struct JsonFieldVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl Visit for JsonFieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let value = format!("{value:?}").trim_matches('"').to_string();
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.fields.insert(field.name().to_string(), Value::String(value));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }
}

impl<S, N> FormatEvent<S, N> for JsonEventFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> std::fmt::Result {
        let meta = event.metadata();
        let mut visitor = JsonFieldVisitor::default();
        event.record(&mut visitor);

        let mut root = Map::new();
        root.insert("timestamp".into(), Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true).into());
        root.insert("level".into(), meta.level().to_string().into());
        root.insert("target".into(), meta.target().into());
        root.insert("service".into(), service_name(meta.target()).into());
        if let Some(message) = visitor.message.take() {
            root.insert("message".into(), message.into());
        }

        let mut fields = visitor.fields;
        if let Some(span) = ctx.lookup_current() {
            fields.insert("span_name".into(), span.metadata().name().into());
        }
        if !fields.is_empty() {
            root.insert("fields".into(), Value::Object(fields));
        }

        let line = serde_json::to_string(&Value::Object(root)).map_err(|_| std::fmt::Error)?;
        writeln!(writer, "{line}")
    }
}

/// Installs `color_eyre` and the global tracing subscriber.
///
/// `RUST_LOG` selects the filter (default `info`), `LOG_FORMAT=json` switches
/// from the pretty console output to JSON lines.
pub fn init_logging() -> anyhow::Result<()> {
    color_eyre::install().map_err(|err| anyhow::anyhow!("Unable to install color_eyre: {err}"))?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::builder().with_default_directive(Level::INFO.into()).parse(""))?;

    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json");
    let fmt_layer = if json {
        fmt::layer().event_format(JsonEventFormatter).boxed()
    } else {
        fmt::layer().event_format(PrettyFormatter).boxed()
    };

    let subscriber = Registry::default().with(env_filter).with(fmt_layer).with(ErrorLayer::default());
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Short display name of the crate emitting an event.
fn service_name(target: &str) -> &'static str {
    const SERVICES: &[(&str, &str)] = &[
        ("ec_checkpoint", "CHECKPOINT"),
        ("ec_executor", "EXECUTOR"),
        ("ec_export", "EXPORT"),
        ("ec_rpc", "RPC"),
        ("ec_sink", "SINK"),
        ("ec_sync", "SYNC"),
        ("ep_", "PRIMITIVES"),
        ("ethetl", "-"),
    ];
    SERVICES.iter().find(|(prefix, _)| target.starts_with(prefix)).map_or("EXTERNAL", |&(_, name)| name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ec_export::planner", "EXPORT")]
    #[case("ec_sync", "SYNC")]
    #[case("ep_resilience::retry", "PRIMITIVES")]
    #[case("ethetl", "-")]
    #[case("sqlx::query", "EXTERNAL")]
    fn service_names(#[case] target: &str, #[case] expected: &str) {
        assert_eq!(service_name(target), expected);
    }
}
