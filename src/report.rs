use std::fmt::Write;

use crate::models::{Dataset, Direction, PeriodWindow, RankedEntry, Trend};
use crate::{insights, kpi};

/// "45m" under an hour, "2h 05m" above.
pub fn format_minutes(minutes: f64) -> String {
    let total = minutes.max(0.0).ceil() as i64;
    if total < 60 {
        format!("{total}m")
    } else {
        format!("{}h {:02}m", total / 60, total % 60)
    }
}

/// "38s" under a minute, "1m 35s" above.
pub fn format_seconds(seconds: f64) -> String {
    let total = seconds.max(0.0).ceil() as i64;
    if total < 60 {
        format!("{total}s")
    } else {
        format!("{}m {:02}s", total / 60, total % 60)
    }
}

fn trend_note(trend: &Trend) -> String {
    let movement = match trend.direction {
        Direction::Improved => "improved",
        Direction::Worsened => "worsened",
        Direction::Flat => "steady",
    };
    format!("{:+.1} vs previous, {movement}", trend.delta)
}

fn write_leaderboard(output: &mut String, title: &str, entries: &[RankedEntry], empty: &str) {
    let _ = writeln!(output, "### {title}");
    if entries.is_empty() {
        let _ = writeln!(output, "{empty}");
    } else {
        for entry in entries {
            match entry.avg {
                Some(avg) => {
                    let _ = writeln!(output, "- {}: {} (avg rating {:.1})", entry.key, entry.count, avg);
                }
                None => {
                    let _ = writeln!(output, "- {}: {}", entry.key, entry.count);
                }
            }
        }
    }
    let _ = writeln!(output);
}

/// Renders the executive summary for the current window against the
/// previous one.
pub fn build_report(
    dataset: &Dataset,
    current: &PeriodWindow,
    previous: &PeriodWindow,
) -> String {
    let current_kpi = kpi::aggregate(
        &dataset.chats,
        &dataset.assistance,
        &dataset.development,
        current,
    );
    let previous_kpi = kpi::aggregate(
        &dataset.chats,
        &dataset.assistance,
        &dataset.development,
        previous,
    );
    let trends = kpi::trends(&current_kpi, &previous_kpi);
    let trend_for = |name: &str| {
        trends
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, t)| t.clone())
            .unwrap_or_else(|| Trend::between(0.0, 0.0, false))
    };

    let mut output = String::new();
    let _ = writeln!(output, "# Support Desk KPI Report");
    let _ = writeln!(
        output,
        "{} ({} to {}), compared with {}",
        current.label, current.start, current.end, previous.label
    );
    let _ = writeln!(output);

    let _ = writeln!(output, "## Chat & Team");
    let _ = writeln!(
        output,
        "- Chats handled: {} ({})",
        current_kpi.chat_volume as i64,
        trend_note(&trend_for("Chats handled"))
    );
    let _ = writeln!(
        output,
        "- Average wait: {} ({})",
        format_seconds(current_kpi.chat_wait_seconds),
        trend_note(&trend_for("Average wait (s)"))
    );
    if current_kpi.chat_rating > 0.0 {
        let _ = writeln!(
            output,
            "- Satisfaction: {:.1}/5.0 ({})",
            current_kpi.chat_rating,
            trend_note(&trend_for("Chat rating"))
        );
    } else {
        let _ = writeln!(output, "- Satisfaction: N/A");
    }
    let _ = writeln!(output);
    write_leaderboard(
        &mut output,
        "Top operators",
        &insights::top_operators(&dataset.chats, current, 4),
        "No chats in this window.",
    );

    let _ = writeln!(output, "## Technical Assistance");
    let _ = writeln!(
        output,
        "- New tickets: {} ({})",
        current_kpi.assistance_new as i64,
        trend_note(&trend_for("Assistance new"))
    );
    let _ = writeln!(
        output,
        "- Closed tickets: {} ({})",
        current_kpi.assistance_closed as i64,
        trend_note(&trend_for("Assistance closed"))
    );
    let _ = writeln!(
        output,
        "- Resolution SLA: {} ({})",
        format_minutes(current_kpi.assistance_resolution_minutes),
        trend_note(&trend_for("Assistance resolution (min)"))
    );
    let _ = writeln!(output);
    write_leaderboard(
        &mut output,
        "Most frequent categories",
        &insights::top_categories(&dataset.assistance, current, 4),
        "No tickets in this window.",
    );

    let _ = writeln!(output, "## Development & Bugs");
    let _ = writeln!(
        output,
        "- Active backlog: {} ({})",
        current_kpi.backlog as i64,
        trend_note(&trend_for("Open backlog"))
    );
    let _ = writeln!(
        output,
        "- Bugs closed: {} ({})",
        current_kpi.development_closed as i64,
        trend_note(&trend_for("Development closed"))
    );
    let _ = writeln!(
        output,
        "- Development time: {} ({})",
        format_minutes(current_kpi.development_resolution_minutes),
        trend_note(&trend_for("Development resolution (min)"))
    );
    let _ = writeln!(output);
    write_leaderboard(
        &mut output,
        "Open backlog by category",
        &insights::open_categories(&dataset.development, 4),
        "No open bugs.",
    );

    let _ = writeln!(output, "### Backlog day by day");
    for (day, open) in kpi::backlog_series(&dataset.development, current) {
        let _ = writeln!(output, "- {day}: {open} open");
    }
    let _ = writeln!(output);

    let trainings_in_window: Vec<_> = dataset
        .trainings
        .iter()
        .filter(|t| kpi::in_window(Some(t.created_at), current))
        .cloned()
        .collect();
    let total_minutes: f64 = trainings_in_window.iter().map(|t| t.duration_minutes).sum();

    let _ = writeln!(output, "## Trainings");
    let _ = writeln!(
        output,
        "- Sessions delivered: {} ({} total)",
        trainings_in_window.len(),
        format_minutes(total_minutes)
    );
    let _ = writeln!(output);
    write_leaderboard(
        &mut output,
        "Topics covered",
        &insights::top_by(&trainings_in_window, |t| t.topic.as_str().to_string(), 4),
        "No trainings in this window.",
    );

    output
}
