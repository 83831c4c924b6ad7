use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize, Serializer};

use crate::calls::Linker;
use crate::errors::ConfigError;
use crate::lanes::LaneParams;

/// The QC metrics, declared in the order they are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricName {
    LinkerConservation(Linker),
    WhitelistMismatch(Linker),
    LaneAnomalies(Linker),
    OnTissueRatio,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricName::LinkerConservation(l) => write!(f, "linker_conservation_{l}"),
            MetricName::WhitelistMismatch(l) => write!(f, "whitelist_mismatch_{l}"),
            MetricName::LaneAnomalies(l) => write!(f, "lane_anomalies_{l}"),
            MetricName::OnTissueRatio => f.write_str("on_tissue_ratio"),
        }
    }
}

impl Serialize for MetricName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Pass,
    Caution,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Pass => f.write_str("PASS"),
            Status::Caution => f.write_str("CAUTION"),
        }
    }
}

/// Which side of the threshold passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    AtLeast,
    AtMost,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct QcMetricResult {
    pub metric: MetricName,
    pub value: f64,
    pub status: Status,
    pub threshold: f64,
}

/// Pass/caution thresholds and the lane dispersion settings. When read from a file every field
/// must be present.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Thresholds {
    pub min_linker_conservation: f64,
    pub max_whitelist_mismatch: f64,
    pub lane_dispersion_k: f64,
    pub lane_min_relative_spread: f64,
    pub max_lane_anomaly_fraction: f64,
    pub min_on_tissue_ratio: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            min_linker_conservation: 0.7,
            max_whitelist_mismatch: 0.05,
            lane_dispersion_k: 3.0,
            lane_min_relative_spread: 0.1,
            max_lane_anomaly_fraction: 0.0,
            min_on_tissue_ratio: 0.5,
        }
    }
}

impl Thresholds {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Thresholds {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let thresholds: Thresholds =
            serde_json::from_str(&text).map_err(|e| ConfigError::Thresholds {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fractions = [
            ("min_linker_conservation", self.min_linker_conservation),
            ("max_whitelist_mismatch", self.max_whitelist_mismatch),
            ("lane_min_relative_spread", self.lane_min_relative_spread),
            ("max_lane_anomaly_fraction", self.max_lane_anomaly_fraction),
            ("min_on_tissue_ratio", self.min_on_tissue_ratio),
        ];
        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ThresholdOutOfRange {
                    name,
                    expected: "within [0, 1]",
                    value,
                });
            }
        }
        if !(self.lane_dispersion_k.is_finite() && self.lane_dispersion_k > 0.0) {
            return Err(ConfigError::ThresholdOutOfRange {
                name: "lane_dispersion_k",
                expected: "finite and greater than 0",
                value: self.lane_dispersion_k,
            });
        }
        Ok(())
    }

    pub fn lane_params(&self) -> LaneParams {
        LaneParams {
            k: self.lane_dispersion_k,
            min_relative_spread: self.lane_min_relative_spread,
        }
    }

    fn rule(&self, metric: MetricName) -> (f64, Direction) {
        match metric {
            MetricName::LinkerConservation(_) => (self.min_linker_conservation, Direction::AtLeast),
            MetricName::WhitelistMismatch(_) => (self.max_whitelist_mismatch, Direction::AtMost),
            MetricName::LaneAnomalies(_) => (self.max_lane_anomaly_fraction, Direction::AtMost),
            MetricName::OnTissueRatio => (self.min_on_tissue_ratio, Direction::AtLeast),
        }
    }

    /// Applies the threshold for `metric` to `value`. An undefined (NaN) value never passes.
    pub fn evaluate(&self, metric: MetricName, value: f64) -> QcMetricResult {
        let (threshold, direction) = self.rule(metric);
        let pass = match direction {
            Direction::AtLeast => value >= threshold,
            Direction::AtMost => value <= threshold,
        };
        QcMetricResult {
            metric,
            value,
            status: if pass { Status::Pass } else { Status::Caution },
            threshold,
        }
    }
}

/// The final QC verdict: one result per computed metric in canonical order.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(transparent)]
pub struct StatusTable {
    results: Vec<QcMetricResult>,
}

impl StatusTable {
    /// Evaluates every metric value that was computed. Metrics whose input was absent are simply
    /// not passed in, and so do not appear in the table.
    pub fn aggregate(
        values: impl IntoIterator<Item = (MetricName, f64)>,
        thresholds: &Thresholds,
    ) -> Self {
        let mut results: Vec<QcMetricResult> = values
            .into_iter()
            .map(|(metric, value)| thresholds.evaluate(metric, value))
            .collect();
        results.sort_by_key(|r| r.metric);
        debug_assert!(
            results.windows(2).all(|w| w[0].metric != w[1].metric),
            "metric reported twice"
        );
        StatusTable { results }
    }

    pub fn results(&self) -> &[QcMetricResult] {
        &self.results
    }

    #[cfg(test)]
    pub fn get(&self, metric: MetricName) -> Option<&QcMetricResult> {
        self.results.iter().find(|r| r.metric == metric)
    }

    /// PASS only if every metric passed.
    pub fn overall(&self) -> Status {
        if self.results.iter().all(|r| r.status == Status::Pass) {
            Status::Pass
        } else {
            Status::Caution
        }
    }

    pub fn cautions(&self) -> impl Iterator<Item = &QcMetricResult> {
        self.results.iter().filter(|r| r.status == Status::Caution)
    }
}

/// Printable summary of the verdict.
impl fmt::Display for StatusTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<26} {:>10}  {:<8} {:>10}", "metric", "value", "status", "threshold")?;
        for r in self.results.iter() {
            let value = if r.value.is_nan() {
                "NA".to_string()
            } else {
                format!("{:.4}", r.value)
            };
            writeln!(
                f,
                "{:<26} {:>10}  {:<8} {:>10.4}",
                r.metric.to_string(),
                value,
                r.status.to_string(),
                r.threshold
            )?;
        }
        write!(f, "overall: {}", self.overall())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_metrics() -> Vec<(MetricName, f64)> {
        vec![
            (MetricName::OnTissueRatio, 0.8),
            (MetricName::LaneAnomalies(Linker::L2), 0.0),
            (MetricName::WhitelistMismatch(Linker::L1), 0.01),
            (MetricName::LinkerConservation(Linker::L2), 0.95),
            (MetricName::LaneAnomalies(Linker::L1), 0.02),
            (MetricName::LinkerConservation(Linker::L1), 0.6),
            (MetricName::WhitelistMismatch(Linker::L2), 0.2),
        ]
    }

    #[test]
    fn canonical_order() {
        let table = StatusTable::aggregate(all_metrics(), &Thresholds::default());
        let names: Vec<String> = table.results().iter().map(|r| r.metric.to_string()).collect();
        assert_eq!(
            names,
            [
                "linker_conservation_L1",
                "linker_conservation_L2",
                "whitelist_mismatch_L1",
                "whitelist_mismatch_L2",
                "lane_anomalies_L1",
                "lane_anomalies_L2",
                "on_tissue_ratio",
            ]
        );
    }

    #[test]
    fn aggregation_is_stable() {
        let t = Thresholds::default();
        let mut reversed = all_metrics();
        reversed.reverse();
        assert_eq!(
            StatusTable::aggregate(all_metrics(), &t),
            StatusTable::aggregate(reversed, &t)
        );
    }

    #[test]
    fn applies_threshold_direction() {
        let table = StatusTable::aggregate(all_metrics(), &Thresholds::default());
        let status = |m| table.get(m).unwrap().status;
        assert_eq!(status(MetricName::LinkerConservation(Linker::L1)), Status::Caution);
        assert_eq!(status(MetricName::LinkerConservation(Linker::L2)), Status::Pass);
        assert_eq!(status(MetricName::WhitelistMismatch(Linker::L1)), Status::Pass);
        assert_eq!(status(MetricName::WhitelistMismatch(Linker::L2)), Status::Caution);
        assert_eq!(status(MetricName::LaneAnomalies(Linker::L1)), Status::Caution);
        assert_eq!(status(MetricName::LaneAnomalies(Linker::L2)), Status::Pass);
        assert_eq!(status(MetricName::OnTissueRatio), Status::Pass);
        assert_eq!(table.overall(), Status::Caution);
        assert_eq!(table.cautions().count(), 3);
    }

    #[test]
    fn thresholds_are_inclusive_and_nan_cautions() {
        let t = Thresholds::default();
        assert_eq!(t.evaluate(MetricName::LinkerConservation(Linker::L1), 0.7).status, Status::Pass);
        assert_eq!(t.evaluate(MetricName::LaneAnomalies(Linker::L1), 0.0).status, Status::Pass);
        assert_eq!(
            t.evaluate(MetricName::LaneAnomalies(Linker::L1), f64::NAN).status,
            Status::Caution
        );
    }

    #[test]
    fn absent_metric_is_not_reported() {
        let values = all_metrics()
            .into_iter()
            .filter(|(m, _)| *m != MetricName::OnTissueRatio);
        let table = StatusTable::aggregate(values, &Thresholds::default());
        assert_eq!(table.results().len(), 6);
        assert!(table.get(MetricName::OnTissueRatio).is_none());
        assert!(!table.to_string().contains("on_tissue_ratio"));
    }

    #[test]
    fn threshold_file_requires_every_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thresholds.json");

        std::fs::write(&path, serde_json::to_string(&Thresholds::default()).unwrap()).unwrap();
        assert_eq!(Thresholds::from_path(&path).unwrap(), Thresholds::default());

        std::fs::write(&path, r#"{"min_linker_conservation": 0.9}"#).unwrap();
        let err = Thresholds::from_path(&path).unwrap_err();
        assert!(err.to_string().contains("missing field"));

        let mut bad = Thresholds::default();
        bad.max_whitelist_mismatch = 1.5;
        assert!(matches!(bad.validate(), Err(ConfigError::ThresholdOutOfRange { .. })));
        bad = Thresholds::default();
        bad.lane_dispersion_k = 0.0;
        assert!(bad.validate().is_err());
    }
}
