//! Human-readable output formatting.
//!
//! Plain-text mode groups results by source engine (at most five items per
//! engine with a "... N more" tail), then prints the engine-status summary
//! and the low-credit warning list. JSON mode serializes the report
//! verbatim elsewhere; nothing here is machine-parseable.

use crate::types::{CreditSnapshot, SearchReport, SearchResultItem};

const ITEMS_PER_ENGINE: usize = 5;
const SNIPPET_WIDTH: usize = 160;

pub fn print_report(report: &SearchReport, low_credit: &[CreditSnapshot]) {
    if report.items.is_empty() {
        println!("No results for \"{}\".", report.query);
    } else {
        for (engine_id, items) in group_by_engine(&report.items) {
            println!("== {engine_id} ({} results)", items.len());
            for item in items.iter().take(ITEMS_PER_ENGINE) {
                let score = item
                    .score
                    .map(|s| format!(" [{s:.2}]"))
                    .unwrap_or_default();
                println!("  {}{score}", item.title);
                println!("    {}", item.url);
                if !item.snippet.is_empty() {
                    println!("    {}", truncate(&item.snippet, SNIPPET_WIDTH));
                }
            }
            if items.len() > ITEMS_PER_ENGINE {
                println!("  ... {} more", items.len() - ITEMS_PER_ENGINE);
            }
            println!();
        }
    }

    println!("Engines:");
    for attempt in &report.engines_tried {
        match (attempt.success, &attempt.reason) {
            (true, _) => println!("  [ok]     {}", attempt.engine_id),
            (false, Some(reason)) => println!("  [failed] {} ({reason})", attempt.engine_id),
            (false, None) => println!("  [failed] {}", attempt.engine_id),
        }
    }

    for snapshot in low_credit {
        println!(
            "warning: {} is low on credits ({} of {} remaining)",
            snapshot.engine_id, snapshot.remaining, snapshot.quota
        );
    }
}

pub fn print_credits(snapshots: &[CreditSnapshot]) {
    println!(
        "{:<12} {:>10} {:>10} {:>10}  {:<12} {}",
        "ENGINE", "USED", "QUOTA", "REMAINING", "LAST RESET", "STATUS"
    );
    for snapshot in snapshots {
        let status = if snapshot.is_exhausted { "exhausted" } else { "ok" };
        let last_reset = snapshot.last_reset.format("%Y-%m-%d").to_string();
        println!(
            "{:<12} {:>10} {:>10} {:>10}  {:<12} {}",
            snapshot.engine_id, snapshot.used, snapshot.quota, snapshot.remaining, last_reset, status
        );
    }
}

pub fn print_health(results: &[(String, bool)]) {
    for (engine_id, healthy) in results {
        let status = if *healthy { "healthy" } else { "unhealthy" };
        println!("{engine_id:<12} {status}");
    }
}

/// Items grouped by engine, in first-appearance order.
fn group_by_engine(items: &[SearchResultItem]) -> Vec<(String, Vec<&SearchResultItem>)> {
    let mut groups: Vec<(String, Vec<&SearchResultItem>)> = Vec::new();
    for item in items {
        match groups.iter_mut().find(|(id, _)| *id == item.source_engine) {
            Some((_, bucket)) => bucket.push(item),
            None => groups.push((item.source_engine.clone(), vec![item])),
        }
    }
    groups
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let head: String = text.chars().take(width).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(engine: &str, title: &str) -> SearchResultItem {
        SearchResultItem {
            title: title.to_string(),
            url: format!("https://example.com/{title}"),
            snippet: String::new(),
            score: None,
            source_engine: engine.to_string(),
        }
    }

    #[test]
    fn grouping_preserves_first_appearance_order() {
        let items = vec![
            item("c", "1"),
            item("a", "2"),
            item("c", "3"),
            item("b", "4"),
        ];
        let groups = group_by_engine(&items);
        let order: Vec<_> = groups.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
        assert_eq!(groups[0].1.len(), 2);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("aaaaaaaaaa", 4), "aaaa...");
    }
}
