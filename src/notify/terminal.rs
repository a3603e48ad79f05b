//! Terminal alert output.

use std::io::Write;

use crate::models::Alert;

/// Human-readable alert line plus link.
pub fn format_alert(alert: &Alert) -> String {
    format!(
        "ALERT {} ({}): {}. Lowest price: {} {}\n{}",
        alert.watch_name,
        alert.watch_id,
        alert.reason,
        alert.lowest_price,
        alert.currency,
        alert.url
    )
}

/// Write the alert; write errors are ignored.
pub fn write_alert(out: &mut impl Write, alert: &Alert) {
    let _ = writeln!(out, "{}", format_alert(alert));
}
