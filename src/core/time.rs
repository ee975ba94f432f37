//! Time representation at the boundary: signed milliseconds (i64).
//! Streams carry their own rational time base; everything handed to a
//! caller is converted to milliseconds here.

/// Time in milliseconds from the start of the media
pub type Millis = i64;

/// Time constants for conversions
pub mod constants {
    use super::Millis;

    pub const MILLIS_PER_SECOND: Millis = 1_000;
    /// FFmpeg's AV_TIME_BASE: container-level durations and seek targets are in microseconds
    pub const MICROS_PER_MILLI: i64 = 1_000;
}

/// Convert container microseconds (AV_TIME_BASE) to milliseconds
#[inline]
pub fn from_micros(micros: i64) -> Millis {
    micros / constants::MICROS_PER_MILLI
}

/// Convert milliseconds to container microseconds (AV_TIME_BASE)
#[inline]
pub fn to_micros(millis: Millis) -> i64 {
    millis.saturating_mul(constants::MICROS_PER_MILLI)
}

/// Convert a stream timestamp to milliseconds.
/// Stream time base is rational: `ticks * (num/den)` = seconds.
pub fn ticks_to_millis(ticks: i64, num: i32, den: i32) -> Millis {
    if den == 0 {
        return 0;
    }
    // i128 so 90kHz timestamps on long files cannot overflow
    let result = (ticks as i128 * num as i128 * constants::MILLIS_PER_SECOND as i128) / den as i128;
    result as Millis
}

/// Duration of one frame at `fps`, in milliseconds (0 when fps is unknown)
#[inline]
pub fn frame_interval(fps: f64) -> Millis {
    if fps > 0.0 {
        (constants::MILLIS_PER_SECOND as f64 / fps).round() as Millis
    } else {
        0
    }
}

/// Format time as HH:MM:SS.mmm
pub fn format_time(millis: Millis) -> String {
    let sign = if millis < 0 { "-" } else { "" };
    let millis = millis.unsigned_abs();
    let hours = millis / 3_600_000;
    let minutes = (millis % 3_600_000) / 60_000;
    let seconds = (millis % 60_000) / 1_000;
    let rest = millis % 1_000;

    format!("{}{:02}:{:02}:{:02}.{:03}", sign, hours, minutes, seconds, rest)
}
