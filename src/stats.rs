use crate::category::CategoryConfig;
use crate::record::RowRecord;

/// Completion rate for one schema field across a record set.
#[derive(Debug, PartialEq)]
pub struct FieldStats {
    pub field: &'static str,
    pub completed: usize,
    pub total: usize,
    pub percentage: f64,
}

/// Per-field completion counts, in schema order. A field counts as completed
/// when its value is non-empty after trimming.
pub fn field_completion(cfg: &'static CategoryConfig, records: &[RowRecord]) -> Vec<FieldStats> {
    let total = records.len();
    cfg.fields
        .iter()
        .enumerate()
        .map(|(index, field)| {
            let completed = records
                .iter()
                .filter(|r| !r.get(index).trim().is_empty())
                .count();
            let percentage = if total > 0 {
                (completed as f64 / total as f64 * 1000.0).round() / 10.0
            } else {
                0.0
            };
            FieldStats {
                field,
                completed,
                total,
                percentage,
            }
        })
        .collect()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_non_blank_values_per_field() {
        let cfg = CategoryConfig::parse("tanaman").unwrap();
        let mut a = RowRecord::blank(cfg);
        a.set(0, "MyGAP 1".into());
        a.set(2, "Ali".into());
        let mut b = RowRecord::blank(cfg);
        b.set(0, "MyGAP 2".into());
        b.set(2, "   ".into()); // whitespace only, not completed

        let stats = field_completion(cfg, &[a, b]);
        assert_eq!(stats.len(), cfg.fields.len());
        assert_eq!(stats[0].completed, 2);
        assert_eq!(stats[0].percentage, 100.0);
        assert_eq!(stats[2].completed, 1);
        assert_eq!(stats[2].percentage, 50.0);
        assert_eq!(stats[3].completed, 0);
    }

    #[test]
    fn empty_record_set_yields_zero_percentages() {
        let cfg = CategoryConfig::parse("organic").unwrap();
        let stats = field_completion(cfg, &[]);
        assert!(stats.iter().all(|s| s.total == 0 && s.percentage == 0.0));
    }
}
