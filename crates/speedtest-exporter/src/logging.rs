//! Log line layout: `level=<LEVEL> datetime=<local time> <message> key=value...`.

use std::fmt;

use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Event formatter for the `level=… datetime=…` layout.
#[derive(Debug, Default, Clone, Copy)]
pub struct LevelDatetimeFormat;

impl<S, N> FormatEvent<S, N> for LevelDatetimeFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(
            writer,
            "level={} datetime={} ",
            event.metadata().level(),
            chrono::Local::now().format(DATETIME_FORMAT)
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the `info` default.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .event_format(LevelDatetimeFormat)
        .init();
}
