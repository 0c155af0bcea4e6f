//! Tallies over a user's history records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::detection::{verdict_of, DetectionRecord};
use crate::models::generation::GenerationRecord;

const VERDICTS: [&str; 3] = ["real", "fake", "misleading"];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DetectionStats {
    pub total: usize,
    /// `real`, `fake`, `misleading` and `unknown` are always present.
    pub by_verdict: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GenerationStats {
    pub total: usize,
    pub by_strategy: BTreeMap<String, usize>,
    pub by_style: BTreeMap<String, usize>,
    pub by_domain: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Stats {
    pub detections: DetectionStats,
    pub generations: GenerationStats,
}

fn bump(map: &mut BTreeMap<String, usize>, key: &str) {
    *map.entry(key.to_string()).or_insert(0) += 1;
}

fn verdict_label(record: &DetectionRecord) -> String {
    let verdict = record
        .verdict
        .clone()
        .or_else(|| verdict_of(&record.result))
        .map(|v| v.to_ascii_lowercase());
    match verdict {
        Some(v) if VERDICTS.contains(&v.as_str()) => v,
        _ => "unknown".to_string(),
    }
}

/// Single pass over both lists.
pub fn compute(detections: &[DetectionRecord], generations: &[GenerationRecord]) -> Stats {
    let mut d = DetectionStats {
        total: detections.len(),
        by_verdict: VERDICTS
            .iter()
            .chain(std::iter::once(&"unknown"))
            .map(|v| (v.to_string(), 0))
            .collect(),
        by_type: BTreeMap::new(),
    };
    for record in detections {
        bump(&mut d.by_verdict, &verdict_label(record));
        bump(&mut d.by_type, &record.detection_type);
    }

    let mut g = GenerationStats {
        total: generations.len(),
        ..Default::default()
    };
    for record in generations {
        bump(&mut g.by_strategy, &record.strategy);
        bump(&mut g.by_style, record.style.as_deref().unwrap_or("unknown"));
        bump(&mut g.by_domain, record.domain.as_deref().unwrap_or("unknown"));
    }

    Stats {
        detections: d,
        generations: g,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detection(result: serde_json::Value) -> DetectionRecord {
        DetectionRecord::new(None, "improved", "t".into(), None, json!({}), result)
    }

    #[test]
    fn test_empty_input_yields_zero_counts() {
        let stats = compute(&[], &[]);
        assert_eq!(stats.detections.total, 0);
        assert_eq!(stats.detections.by_verdict.len(), 4);
        assert!(stats.detections.by_verdict.values().all(|c| *c == 0));
        assert!(stats.generations.by_style.is_empty());
    }

    #[test]
    fn test_verdict_tally() {
        let records = vec![
            detection(json!({"final_prediction": {"prediction": "fake"}})),
            detection(json!({"final_prediction": {"prediction": "FAKE"}})),
            detection(json!({"ensemble": {"prediction": "real"}})),
            detection(json!({"final_prediction": {"prediction": "misleading"}})),
            detection(json!({"final_prediction": {"prediction": "satire"}})),
            detection(json!({})),
        ];
        let stats = compute(&records, &[]);
        let v = &stats.detections.by_verdict;
        assert_eq!(v["fake"], 2);
        assert_eq!(v["real"], 1);
        assert_eq!(v["misleading"], 1);
        assert_eq!(v["unknown"], 2);
        assert_eq!(stats.detections.by_type["improved"], 6);
    }

    #[test]
    fn test_generation_grouping() {
        let mut a = GenerationRecord::new(None, "single", "t".into(), "conspiracy".into(), "gpt-4o".into());
        a.style = Some("sensational".into());
        a.domain = Some("politics".into());
        let b = GenerationRecord::new(None, "single", "t".into(), "conspiracy".into(), "gpt-4o".into());
        let stats = compute(&[], &[a, b]);
        assert_eq!(stats.generations.total, 2);
        assert_eq!(stats.generations.by_strategy["conspiracy"], 2);
        assert_eq!(stats.generations.by_style["sensational"], 1);
        assert_eq!(stats.generations.by_style["unknown"], 1);
        assert_eq!(stats.generations.by_domain["politics"], 1);
    }
}
