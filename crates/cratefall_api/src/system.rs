//! # System Routes
//!
//! The probe endpoints: a canned weather forecast that exercises the
//! store, a trivial status check, and the telemetry stream.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use cratefall_server::{Server, ServerError};

use crate::payloads::{Telemetry, WeatherReport};
use crate::store::UserStore;

/// Registers `1` (weather), `2` (status), and the `3` telemetry stream.
///
/// # Errors
///
/// Propagates registration failures (reserved/colliding ids, started
/// server).
pub fn register_system_routes(
    server: &mut Server,
    store: Arc<UserStore>,
    start_time: Instant,
) -> Result<(), ServerError> {
    #[allow(clippy::cast_possible_truncation)]
    server.register_command(
        b'1',
        "GetWeatherForecast",
        WeatherReport::SIZE as u32,
        "",
        "u32:date|i32:temp|c16:summary",
        move |_conn, _body| {
            store.bump_hits();
            bytemuck::bytes_of(&WeatherReport::sample()).to_vec()
        },
    )?;

    server.register_command(
        b'2',
        "GetSystemStatus",
        2,
        "",
        "c2:status",
        |_conn, _body| b"OK".to_vec(),
    )?;

    let counter = AtomicU32::new(0);
    server.register_stream(
        b'3',
        "LiveTelemetry",
        8,
        "u32:counter|f32:uptime",
        move || {
            let frame = Telemetry {
                counter: counter.fetch_add(1, Ordering::Relaxed) + 1,
                uptime: start_time.elapsed().as_secs_f32(),
            };
            bytemuck::bytes_of(&frame).to_vec()
        },
    )?;

    Ok(())
}
