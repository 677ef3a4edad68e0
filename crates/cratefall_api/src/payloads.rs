//! # Fixed-Width Wire Payloads
//!
//! Packed little-endian records exchanged with clients. Sizes are load-
//! bearing: the contract table advertises them and generated client
//! proxies read exactly these layouts.

use bytemuck::{Pod, Zeroable};

/// Response of `GetWeatherForecast` (24 bytes).
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub struct WeatherReport {
    /// Date as `yyyymmdd`.
    pub date: u32,
    /// Temperature in °C.
    pub temp_c: i32,
    /// Zero-padded summary text.
    pub summary: [u8; 16],
}

impl WeatherReport {
    /// Packed size in bytes.
    pub const SIZE: usize = 24;

    /// The canned forecast the sandbox serves.
    #[must_use]
    pub fn sample() -> Self {
        let mut summary = [0u8; 16];
        summary[..6].copy_from_slice(b"Chilly");
        Self {
            date: 20_260_120,
            temp_c: 22,
            summary,
        }
    }
}

/// Frame of the `LiveTelemetry` stream (8 bytes).
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
#[repr(C)]
pub struct Telemetry {
    /// Frames produced since startup.
    pub counter: u32,
    /// Server uptime in seconds.
    pub uptime: f32,
}

/// One row of the `GetEntitiesInfo` response (20 bytes).
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
#[repr(C)]
pub struct EntityMetadata {
    /// Wire id of the entity.
    pub entity_id: u32,
    /// Red component.
    pub r: f32,
    /// Green component.
    pub g: f32,
    /// Blue component.
    pub b: f32,
    /// Alpha component.
    pub a: f32,
}

/// Request body of `MoveEntity` (16 bytes).
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
#[repr(C)]
pub struct MoveRequest {
    /// Wire id of the entity to steer.
    pub entity_id: u32,
    /// X intent.
    pub x: f32,
    /// Y intent.
    pub y: f32,
    /// Z intent.
    pub z: f32,
}

impl MoveRequest {
    /// Packed size in bytes.
    pub const SIZE: usize = 16;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_sizes() {
        assert_eq!(std::mem::size_of::<WeatherReport>(), WeatherReport::SIZE);
        assert_eq!(std::mem::size_of::<Telemetry>(), 8);
        assert_eq!(std::mem::size_of::<EntityMetadata>(), 20);
        assert_eq!(std::mem::size_of::<MoveRequest>(), MoveRequest::SIZE);
    }

    #[test]
    fn test_weather_sample_bytes() {
        let bytes = bytemuck::bytes_of(&WeatherReport::sample()).to_vec();
        assert_eq!(&bytes[..4], &20_260_120u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &22i32.to_le_bytes());
        assert_eq!(&bytes[8..14], b"Chilly");
        assert_eq!(bytes[14..], [0u8; 10]);
    }
}
