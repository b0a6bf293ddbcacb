// homeworks/src/telemetry.rs

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` sets the filter (default `info`);
/// `LOG_FORMAT=json` switches to one JSON object per line.
pub fn init_tracing() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let json = std::env::var("LOG_FORMAT").map_or(false, |v| v.eq_ignore_ascii_case("json"));

  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_span_events(FmtSpan::CLOSE);
  // A second init (tests) is harmless; the first subscriber stays.
  let _ = if json {
    builder.json().try_init()
  } else {
    builder.try_init()
  };
}
