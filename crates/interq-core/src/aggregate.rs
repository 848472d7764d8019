//! Turn a raw report payload into chart and table series
//!
//! The per-transaction risk score is the plain sum of that transaction's
//! feature importances. It is not re-normalized, so it can exceed 1 when the
//! inputs are not normalized.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::models::{ReportDetail, TransactionDetail};

/// Share below which a feature is left out of the relative-share chart
pub const RELATIVE_SHARE_THRESHOLD: f64 = 0.01;

/// One bar of the overall importance chart and one row of the detail table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeaturePoint {
    pub label: String,
    pub importance: f64,
    pub reason: String,
}

/// One bar of the transaction risk comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionPoint {
    pub label: String,
    pub risk_score: f64,
    pub feature_count: usize,
    pub predicted_fee: String,
    pub actual_fee: String,
    pub downgraded: bool,
}

/// Headline numbers for the report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummaryStats {
    pub features_analyzed: usize,
    pub transactions_reviewed: usize,
    pub downgraded_transactions: usize,
    /// Highest-importance overall feature
    pub primary_driver: Option<FeaturePoint>,
}

/// Everything the report view renders
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedReport {
    /// All overall features, in payload order
    pub overall_series: Vec<FeaturePoint>,
    /// Overall features above [`RELATIVE_SHARE_THRESHOLD`]
    pub relative_share: Vec<FeaturePoint>,
    pub per_transaction_series: Vec<TransactionPoint>,
    /// Same order as `per_transaction_series`
    pub risk_scores: Vec<f64>,
    pub summary: ReportSummaryStats,
}

impl AggregatedReport {
    /// Each relative-share feature's fraction of their combined importance,
    /// in `relative_share` order. All zero when the total is not positive.
    pub fn share_fractions(&self) -> Vec<f64> {
        let finite = |v: f64| if v.is_finite() { v } else { 0.0 };
        let total: f64 = self.relative_share.iter().map(|p| finite(p.importance)).sum();
        self.relative_share
            .iter()
            .map(|p| {
                if total > 0.0 {
                    finite(p.importance) / total
                } else {
                    0.0
                }
            })
            .collect()
    }
}

/// Build every derived series from a report payload
pub fn aggregate(detail: &ReportDetail) -> AggregatedReport {
    let overall_series: Vec<FeaturePoint> = detail
        .overall
        .features
        .iter()
        .map(|f| FeaturePoint {
            label: format_feature_name(&f.name),
            importance: f.importance,
            reason: f.reason.clone(),
        })
        .collect();

    let relative_share = overall_series
        .iter()
        .filter(|p| p.importance > RELATIVE_SHARE_THRESHOLD)
        .cloned()
        .collect();

    let per_transaction_series: Vec<TransactionPoint> = detail
        .per_transaction
        .iter()
        .map(|tx| TransactionPoint {
            label: transaction_label(tx),
            risk_score: risk_score(tx),
            feature_count: tx.features.len(),
            predicted_fee: tx.predicted_fee.clone(),
            actual_fee: tx.actual_fee.clone(),
            downgraded: tx.downgraded,
        })
        .collect();

    let risk_scores = per_transaction_series.iter().map(|p| p.risk_score).collect();

    let primary_driver = overall_series
        .iter()
        .filter(|p| p.importance.is_finite())
        .max_by(|a, b| a.importance.total_cmp(&b.importance))
        .cloned();

    let summary = ReportSummaryStats {
        features_analyzed: overall_series.len(),
        transactions_reviewed: detail.per_transaction.len(),
        downgraded_transactions: detail.per_transaction.iter().filter(|t| t.downgraded).count(),
        primary_driver,
    };

    AggregatedReport {
        overall_series,
        relative_share,
        per_transaction_series,
        risk_scores,
        summary,
    }
}

/// Sum of a transaction's feature importances (zero when it has none)
pub fn risk_score(tx: &TransactionDetail) -> f64 {
    tx.features.iter().map(|f| f.importance).sum()
}

/// Display label of a transaction; indices are zero-based on the wire
pub fn transaction_label(tx: &TransactionDetail) -> String {
    format!("Transaction {}", tx.index + 1)
}

/// Readable label for a raw feature column name
///
/// Drops the brand prefix, turns underscores into spaces and capitalizes
/// each word: `mc_cvv2_result_code` becomes `Cvv2 Result Code`.
pub fn format_feature_name(name: &str) -> String {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    let prefix = PREFIX.get_or_init(|| Regex::new(r"(?i)^\s*(?:mc|visa)_").expect("valid regex"));

    prefix
        .replace(name, "")
        .split(|c: char| c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Format a fraction as a percentage with one decimal: `0.1234` → `12.3%`
pub fn percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OverallFeature, OverallFeatures, TransactionFeature};

    fn tx_feature(name: &str, importance: f64) -> TransactionFeature {
        TransactionFeature {
            name: name.to_string(),
            value: "Y".to_string(),
            importance,
            reason: String::new(),
        }
    }

    fn tx(index: u64, importances: &[f64]) -> TransactionDetail {
        TransactionDetail {
            index,
            predicted_fee: "1.20".to_string(),
            actual_fee: "1.80".to_string(),
            downgraded: index % 2 == 0,
            features: importances
                .iter()
                .map(|i| tx_feature("mc_channel_type", *i))
                .collect(),
        }
    }

    fn overall(features: &[(&str, f64)]) -> OverallFeatures {
        OverallFeatures {
            features: features
                .iter()
                .map(|(n, i)| OverallFeature {
                    name: n.to_string(),
                    importance: *i,
                    reason: format!("{} reason", n),
                })
                .collect(),
        }
    }

    #[test]
    fn test_share_fractions() {
        let detail = ReportDetail {
            overall: overall(&[("mc_a", 0.3), ("mc_b", 0.005), ("mc_c", 0.1)]),
            per_transaction: Vec::new(),
        };
        let agg = aggregate(&detail);
        let fractions = agg.share_fractions();
        assert_eq!(fractions.len(), 2);
        assert!((fractions[0] - 0.75).abs() < 1e-9);
        assert!((fractions[1] - 0.25).abs() < 1e-9);

        assert!(aggregate(&ReportDetail::default()).share_fractions().is_empty());
    }

    #[test]
    fn test_empty_report() {
        let agg = aggregate(&ReportDetail::default());
        assert!(agg.overall_series.is_empty());
        assert!(agg.relative_share.is_empty());
        assert!(agg.per_transaction_series.is_empty());
        assert!(agg.summary.primary_driver.is_none());
    }

    #[test]
    fn test_empty_feature_list_scores_zero() {
        assert_eq!(risk_score(&tx(0, &[])), 0.0);
    }

    #[test]
    fn test_risk_score_sums() {
        assert!((risk_score(&tx(0, &[0.6, 0.4])) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_risk_score_not_normalized() {
        assert!((risk_score(&tx(0, &[0.9, 0.8])) - 1.7).abs() < 1e-12);
    }

    #[test]
    fn test_relative_share_excludes_small_but_table_keeps_them() {
        let detail = ReportDetail {
            overall: overall(&[
                ("mc_channel_type", 0.65),
                ("mc_cvv2_result_code", 0.2),
                ("mc_avs_result_code", 0.005),
            ]),
            per_transaction: vec![],
        };
        let agg = aggregate(&detail);
        assert_eq!(agg.overall_series.len(), 3);
        assert_eq!(agg.relative_share.len(), 2);
        assert!(agg
            .relative_share
            .iter()
            .all(|p| p.importance > RELATIVE_SHARE_THRESHOLD));
        assert_eq!(agg.overall_series[2].label, "Avs Result Code");
    }

    #[test]
    fn test_transaction_series() {
        let detail = ReportDetail {
            overall: overall(&[]),
            per_transaction: vec![tx(0, &[0.5, 0.25]), tx(1, &[0.1])],
        };
        let agg = aggregate(&detail);
        assert_eq!(agg.per_transaction_series[0].label, "Transaction 1");
        assert_eq!(agg.per_transaction_series[1].label, "Transaction 2");
        assert_eq!(agg.per_transaction_series[0].feature_count, 2);
        assert_eq!(agg.risk_scores, vec![0.75, 0.1]);
        assert_eq!(agg.summary.transactions_reviewed, 2);
        assert_eq!(agg.summary.downgraded_transactions, 1);
    }

    #[test]
    fn test_primary_driver() {
        let detail = ReportDetail {
            overall: overall(&[("visa_eci_indicator", 0.3), ("visa_channel_type", 0.65)]),
            per_transaction: vec![],
        };
        let driver = aggregate(&detail).summary.primary_driver.unwrap();
        assert_eq!(driver.label, "Channel Type");
        assert_eq!(percent(driver.importance), "65.0%");
    }

    #[test]
    fn test_format_feature_name() {
        assert_eq!(format_feature_name("mc_channel_type"), "Channel Type");
        assert_eq!(format_feature_name("visa_cross_border_indicator"), "Cross Border Indicator");
        assert_eq!(format_feature_name("MC_pos_entry_mode"), "Pos Entry Mode");
        assert_eq!(format_feature_name("interchange_fee"), "Interchange Fee");
        assert_eq!(format_feature_name("eci_3ds_auth"), "Eci 3ds Auth");
        assert_eq!(format_feature_name("amount"), "Amount");
        assert_eq!(format_feature_name(""), "");
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(0.1234), "12.3%");
        assert_eq!(percent(1.0), "100.0%");
        assert_eq!(percent(0.0), "0.0%");
    }
}
