//! Plain-text rendering of dashboard snapshots.

use aero_core::{Alert, MatchView, Snapshot};

pub fn render_snapshot(snapshot: &Snapshot) -> String {
    let mut out = String::new();

    let cards: Vec<String> = snapshot
        .stats
        .cards()
        .iter()
        .map(|(label, value)| format!("{label}: {value}"))
        .collect();
    out.push_str(&cards.join(" | "));
    out.push('\n');

    match (&snapshot.selected_camera, &snapshot.stream_url) {
        (Some(cam), Some(url)) => {
            out.push_str(&format!("Streaming {}: {url}\n", cam.to_uppercase()))
        }
        (Some(cam), None) => out.push_str(&format!("Selected {} (stopped)\n", cam.to_uppercase())),
        (None, _) => out.push_str("Select a camera to start streaming...\n"),
    }

    let upload = snapshot.upload.label();
    if !upload.is_empty() {
        out.push_str(&format!("Upload: {upload}\n"));
    }

    if !snapshot.matches.is_empty() {
        out.push_str(&render_matches(&snapshot.matches));
    }

    out.push_str("Security alerts:\n");
    if snapshot.alerts.is_empty() {
        out.push_str("  No alerts\n");
    }
    for alert in &snapshot.alerts {
        out.push_str(&format!("  {}\n", render_alert(alert)));
    }
    out
}

pub fn render_alert(alert: &Alert) -> String {
    format!(
        "[{}] {:<7} {}",
        alert.timestamp.format("%H:%M:%S"),
        alert.level.label(),
        alert.message
    )
}

pub fn render_matches(matches: &[MatchView]) -> String {
    let mut out = String::new();
    for view in matches {
        let marker = if view.meets_threshold { "" } else { " (below threshold)" };
        out.push_str(&format!(
            "Match #{}: {}  confidence {}%  distance {:.3}{marker}\n",
            view.rank, view.urn, view.confidence, view.distance
        ));
    }
    out
}
