use crate::store::{DailyRow, RunRecord, StoredRun};

const SPARK_CHARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Sparkline scaled between the series' own min and max.
pub fn ascii_trend(values: &[f64]) -> String {
    if values.is_empty() {
        return String::new();
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min == max {
        return SPARK_CHARS[0].to_string().repeat(values.len());
    }
    let top = (SPARK_CHARS.len() - 1) as f64;
    values
        .iter()
        .map(|v| {
            let norm = (v - min) / (max - min);
            SPARK_CHARS[(norm * top).round() as usize]
        })
        .collect()
}

fn series(days: &[DailyRow], metric: fn(&DailyRow) -> f64) -> Vec<f64> {
    days.iter().map(metric).collect()
}

pub fn build_run_report(stored: &StoredRun) -> String {
    let StoredRun { run, days } = stored;
    let mut lines = vec![
        format!("# Chaos Garden Report — Run {}", run.id),
        String::new(),
        format!("Scenario: **{}**", run.scenario_name),
        format!("Days: **{}**", run.days),
        format!("Average resilience: **{:.4}**", run.average_resilience),
        format!("Final resilience: **{:.4}**", run.final_resilience),
        String::new(),
        "## Trends".to_string(),
        format!(
            "- Resilience: `{}`",
            ascii_trend(&series(days, |d| d.resilience_score))
        ),
        format!("- Pollinators: `{}`", ascii_trend(&series(days, |d| d.pollinators))),
        format!("- Pests: `{}`", ascii_trend(&series(days, |d| d.pests))),
    ];
    if let Some(last) = days.last() {
        lines.extend([
            String::new(),
            "## Last day snapshot".to_string(),
            format!("- Pollinators: {}", last.pollinators),
            format!("- Pests: {}", last.pests),
            format!("- Soil moisture: {}", last.soil_moisture),
            format!("- Crop health: {}", last.crop_health),
        ]);
    }
    lines.join("\n")
}

pub fn build_run_html_report(stored: &StoredRun) -> String {
    let StoredRun { run, days } = stored;
    let title = format!("Chaos Garden Report — Run {}", run.id);
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", escape_html(&title)));
    html.push_str("</head>\n<body>\n");
    html.push_str(&format!("<h1>{}</h1>\n", escape_html(&title)));
    html.push_str("<ul>\n");
    html.push_str(&format!(
        "<li>Scenario: <strong>{}</strong></li>\n",
        escape_html(&run.scenario_name)
    ));
    html.push_str(&format!("<li>Days: <strong>{}</strong></li>\n", run.days));
    html.push_str(&format!(
        "<li>Average resilience: <strong>{:.4}</strong></li>\n",
        run.average_resilience
    ));
    html.push_str(&format!(
        "<li>Final resilience: <strong>{:.4}</strong></li>\n",
        run.final_resilience
    ));
    html.push_str("</ul>\n<h2>Trends</h2>\n<pre>\n");
    html.push_str(&format!(
        "Resilience  {}\nPollinators {}\nPests       {}\n",
        ascii_trend(&series(days, |d| d.resilience_score)),
        ascii_trend(&series(days, |d| d.pollinators)),
        ascii_trend(&series(days, |d| d.pests)),
    ));
    html.push_str("</pre>\n<h2>Daily states</h2>\n<table>\n");
    html.push_str("<tr><th>Day</th><th>Resilience</th><th>Pollinators</th><th>Pests</th><th>Crop health</th><th>Soil moisture</th></tr>\n");
    for day in days {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{:.4}</td><td>{:.3}</td><td>{:.3}</td><td>{:.4}</td><td>{:.4}</td></tr>\n",
            day.day,
            day.resilience_score,
            day.pollinators,
            day.pests,
            day.crop_health,
            day.soil_moisture
        ));
    }
    html.push_str("</table>\n</body>\n</html>\n");
    html
}

pub fn build_sweep_summary(rows: &[RunRecord]) -> String {
    let mut lines = vec![
        "# Sweep Summary".to_string(),
        String::new(),
        "| Run ID | Scenario | Avg Resilience | Final Resilience |".to_string(),
        "|---|---|---:|---:|".to_string(),
    ];
    for row in rows {
        lines.push(format!(
            "| {} | {} | {:.4} | {:.4} |",
            row.id, row.scenario_name, row.average_resilience, row.final_resilience
        ));
    }
    lines.join("\n")
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_has_one_char_per_value() {
        let out = ascii_trend(&[0.1, 0.2, 0.8, 0.3]);
        let chars: Vec<char> = out.chars().collect();
        assert_eq!(chars.len(), 4);
        assert_ne!(chars[0], chars[2]);
        assert_eq!(chars[0], '▁');
        assert_eq!(chars[2], '█');
    }

    #[test]
    fn test_flat_and_empty_trends() {
        assert_eq!(ascii_trend(&[]), "");
        assert_eq!(ascii_trend(&[0.4, 0.4, 0.4]), "▁▁▁");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a<b & \"c\">"), "a&lt;b &amp; &quot;c&quot;&gt;");
    }
}
