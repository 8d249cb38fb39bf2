//! Line-oriented decoding of capture reports.

use tracing::trace;

use super::reading::SensorReading;

/// Lazily decodes every well-formed line of `report`.
///
/// Lines may end in `\n` or `\r\n`. Blank lines, log chatter and malformed
/// or truncated JSON are skipped without interrupting the lines after them.
/// Each yielded reading already carries its canonical model key.
pub fn parse(report: &str) -> impl Iterator<Item = SensorReading> + '_ {
    report
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(index, line)| match serde_json::from_str::<SensorReading>(line) {
            Ok(reading) => Some(reading.canonicalize()),
            Err(e) => {
                trace!("Skipping line {}: {}", index + 1, e);
                None
            }
        })
}
