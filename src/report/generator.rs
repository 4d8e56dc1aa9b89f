//! Markdown and JSON report generation.
//!
//! Renders the final snapshot of an aggregation: a per-category summary
//! table, optional event listings and the run metadata.

use crate::config::ReportConfig;
use crate::models::{Category, CategorySummary, Event, Report, ReportMetadata};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, options: &ReportConfig) -> String {
    let mut output = String::new();

    output.push_str("# OurPlanet Event Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(&report.summary, options));

    if options.include_events {
        output.push_str(&generate_events_section(&report.categories, options));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** {}\n", metadata.source));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Window:** last {} days\n", metadata.days));
    section.push_str(&format!(
        "- **Concurrent Fetches:** {}\n",
        metadata.max_concurrent
    ));
    section.push_str(&format!(
        "- **Categories Fetched:** {}\n",
        metadata.categories_fetched
    ));
    if metadata.categories_failed > 0 {
        section.push_str(&format!(
            "- **Categories Failed:** {}\n",
            metadata.categories_failed
        ));
    }
    section.push_str(&format!("- **Distinct Events:** {}\n", metadata.total_events));
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the per-category summary table.
fn generate_summary_section(summary: &[CategorySummary], options: &ReportConfig) -> String {
    let mut section = String::new();

    section.push_str("## Categories\n\n");
    section.push_str("| Category | Events | Open | Closed | Status |\n");
    section.push_str("|:---|:---:|:---:|:---:|:---|\n");

    for entry in summary {
        if entry.event_count == 0 && !entry.fetch_failed && !options.include_empty {
            continue;
        }
        let status = if entry.fetch_failed {
            "⚠️ fetch failed"
        } else {
            "✅"
        };
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            entry.name, entry.event_count, entry.open_count, entry.closed_count, status
        ));
    }
    section.push('\n');

    section
}

/// Generate the event listings, one subsection per non-empty category.
fn generate_events_section(categories: &[Category<Event>], options: &ReportConfig) -> String {
    let mut section = String::new();

    section.push_str("## Events\n\n");

    let populated: Vec<_> = categories.iter().filter(|c| !c.events.is_empty()).collect();
    if populated.is_empty() {
        section.push_str("No events were found in the selected window.\n\n");
        return section;
    }

    for category in populated {
        section.push_str(&format!(
            "### {} ({})\n\n",
            category.name,
            category.events.len()
        ));
        if !category.description.is_empty() {
            section.push_str(&format!("*{}*\n\n", category.description));
        }

        for event in category.events.iter().take(options.max_events_per_category) {
            section.push_str(&generate_event_line(event));
        }

        let hidden = category
            .events
            .len()
            .saturating_sub(options.max_events_per_category);
        if hidden > 0 {
            section.push_str(&format!("- *... and {} more*\n", hidden));
        }
        section.push('\n');
    }

    section
}

/// Generate a single event bullet.
fn generate_event_line(event: &Event) -> String {
    let date = event
        .date()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "undated".to_string());

    let title = match event.link {
        Some(ref link) => format!("[{}]({})", event.title, link),
        None => event.title.clone(),
    };

    let status = match event.closed {
        Some(closed) => format!("closed {}", closed.format("%Y-%m-%d")),
        None => "open".to_string(),
    };

    format!("- {} {} ({})\n", date, title, status)
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Event data courtesy of NASA EONET*\n");

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tests::event;
    use crate::models::{Completion, Snapshot};
    use chrono::Utc;
    use std::sync::Arc;

    fn create_test_report() -> Report {
        let mut fires: Category<Event> =
            Category::new(8, "Wildfires", "http://x/8").with_description("Wildland fires");
        let mut fire = event("EONET_1", &[8], "2019-07-28T00:00:00Z");
        fire.title = "Tucker Fire".to_string();
        fire.link = Some("https://eonet.gsfc.nasa.gov/api/v2.1/events/EONET_1".to_string());
        let mut closed = event("EONET_2", &[8], "2019-06-01T00:00:00Z");
        closed.closed = Some("2019-06-10T00:00:00Z".parse().unwrap());
        fires.events = vec![fire, closed];

        let drought: Category<Event> = Category::new(6, "Drought", "http://x/6");
        let storms: Category<Event> = Category::new(10, "Severe Storms", "http://x/10");

        let completion = Completion {
            snapshot: Arc::new(Snapshot::new(vec![drought, storms, fires])),
            failed: vec![10],
        };

        let metadata = ReportMetadata {
            source: "https://eonet.gsfc.nasa.gov/api/v2.1".to_string(),
            generated_at: Utc::now(),
            days: 360,
            max_concurrent: 2,
            categories_fetched: 3,
            categories_failed: 1,
            total_events: 2,
            duration_seconds: 4.2,
        };

        Report::from_completion(&completion, metadata)
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = create_test_report();
        let markdown = generate_markdown_report(&report, &ReportConfig::default());

        assert!(markdown.contains("# OurPlanet Event Report"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("## Categories"));
        assert!(markdown.contains("| Wildfires | 2 | 1 | 1 |"));
        assert!(markdown.contains("| Severe Storms | 0 | 0 | 0 | ⚠️ fetch failed |"));
        assert!(markdown.contains("Categories Failed:** 1"));
        assert!(markdown.contains("### Wildfires (2)"));
        assert!(markdown.contains(
            "- 2019-07-28 [Tucker Fire](https://eonet.gsfc.nasa.gov/api/v2.1/events/EONET_1) (open)"
        ));
        assert!(markdown.contains("(closed 2019-06-10)"));
    }

    #[test]
    fn test_empty_categories_can_be_hidden() {
        let report = create_test_report();
        let options = ReportConfig {
            include_empty: false,
            ..ReportConfig::default()
        };
        let markdown = generate_markdown_report(&report, &options);

        assert!(!markdown.contains("| Drought |"));
        // Failed categories are always listed.
        assert!(markdown.contains("| Severe Storms |"));
    }

    #[test]
    fn test_event_listing_is_truncated() {
        let report = create_test_report();
        let options = ReportConfig {
            max_events_per_category: 1,
            ..ReportConfig::default()
        };
        let markdown = generate_markdown_report(&report, &options);

        assert!(markdown.contains("Tucker Fire"));
        assert!(!markdown.contains("Event EONET_2"));
        assert!(markdown.contains("... and 1 more"));
    }

    #[test]
    fn test_events_section_can_be_disabled() {
        let report = create_test_report();
        let options = ReportConfig {
            include_events: false,
            ..ReportConfig::default()
        };
        let markdown = generate_markdown_report(&report, &options);

        assert!(!markdown.contains("## Events"));
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report();
        let json = generate_json_report(&report).unwrap();

        assert!(json.contains("\"metadata\""));
        assert!(json.contains("\"summary\""));
        assert!(json.contains("\"EONET_1\""));
        assert!(json.contains("\"fetch_failed\": true"));
    }
}
