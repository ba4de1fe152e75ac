//! # Statistics Tests
//!
//! Energy aggregation across channels, report sections, and serialization.

use asymdram_core::dram::EnergyBreakdown;
use asymdram_core::stats::{MemoryCounter, STATS_SECTIONS};
use pretty_assertions::assert_eq;

fn report(stats: &MemoryCounter, sections: &[&str]) -> String {
    let sections: Vec<String> = sections.iter().map(|s| (*s).to_string()).collect();
    let mut out = Vec::new();
    stats.write_sections(&mut out, &sections).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_energy_sums_channels() {
    let a = EnergyBreakdown {
        act_pre: 10,
        read: 20,
        background: 5,
        data_bus: 7,
        ..EnergyBreakdown::default()
    };
    let b = EnergyBreakdown {
        act_pre: 1,
        write: 2,
        migrate: 3,
        clock: 4,
        ..EnergyBreakdown::default()
    };

    let mut stats = MemoryCounter::default();
    stats.energy.refresh_from([a, b]);
    assert_eq!(stats.energy.act_pre, 11);
    assert_eq!(stats.energy.read, 20);
    assert_eq!(stats.energy.write, 2);
    assert_eq!(stats.energy.migrate, 3);
    assert_eq!(stats.energy.background, 5);
    assert_eq!(stats.energy.total, a.total() + b.total());
    assert_eq!(stats.energy.total, 52);

    // Refreshing replaces rather than accumulates.
    stats.energy.refresh_from([b]);
    assert_eq!(stats.energy.act_pre, 1);
    assert_eq!(stats.energy.total, 10);
}

#[test]
fn test_report_has_every_section_by_default() {
    let mut stats = MemoryCounter::default();
    stats.access.count = 4;
    stats.access.queue_length = 6;
    stats.access.row_buffer = 1;
    stats.access.slow_segment = 3;
    stats.row.migration = 2;
    stats.energy.total = 1500;

    let text = report(&stats, &[]);
    for heading in ["ACCESS", "ROW", "ENERGY (nJ)"] {
        assert!(text.contains(heading), "missing {heading}:\n{text}");
    }
    assert!(text.contains("access.queue_avg       1.50"));
    assert!(text.contains("access.row_buffer      1 (25.00%)"));
    assert!(text.contains("access.slow_segment    3 (75.00%)"));
    assert!(text.contains("row.migration          2"));
    assert!(text.contains("energy.total           1.500"));
}

#[test]
fn test_report_filters_sections() {
    let text = report(&MemoryCounter::default(), &["row"]);
    assert!(text.contains("ROW"));
    assert!(!text.contains("ACCESS"));
    assert!(!text.contains("ENERGY"));
}

#[test]
fn test_empty_counters_report_zero_percentages() {
    let text = report(&MemoryCounter::default(), &["access"]);
    assert!(text.contains("access.row_buffer      0 (0.00%)"));
    assert!(text.contains("access.queue_avg       0.00"));
}

#[test]
fn test_section_names() {
    assert_eq!(STATS_SECTIONS, &["access", "row", "energy"]);
}

#[test]
fn test_counters_serialize_as_nested_json() {
    let mut stats = MemoryCounter::default();
    stats.row.query = 9;
    stats.access.fast_segment = 2;
    let value = serde_json::to_value(stats).unwrap();
    assert_eq!(value["row"]["query"], 9);
    assert_eq!(value["access"]["fast_segment"], 2);
    assert_eq!(value["energy"]["total"], 0);
}
