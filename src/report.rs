//! Aggregations behind the dashboard panels.
//!
//! Everything here is a pure function of a [`ScoredTable`].

use crate::types::{PredictedLabel, ScoredTable};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Rows shown in the ranking panel and the location chart
pub const TOP_N: usize = 10;
/// Histogram bin count
pub const HISTOGRAM_BINS: usize = 30;
/// Points on the density curve
const KDE_GRID: usize = 200;

/// Class split of a scored batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub fraud_count: usize,
    pub real_count: usize,
    pub fraud_pct: f64,
}

impl Summary {
    pub fn from_table(table: &ScoredTable) -> Self {
        let total = table.len();
        let fraud_count = table.labels().iter().filter(|l| l.is_fraud()).count();
        let fraud_pct = if total > 0 {
            fraud_count as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        Self {
            total,
            fraud_count,
            real_count: total - fraud_count,
            fraud_pct,
        }
    }
}

/// One line of the ranking panel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedListing {
    pub row: usize,
    pub title: String,
    pub location: String,
    pub fraud_probability: f64,
}

/// Most suspicious listings, highest probability first. Ties keep upload
/// order.
pub fn top_suspicious(table: &ScoredTable, n: usize) -> Vec<RankedListing> {
    let mut rows: Vec<_> = table.rows().collect();
    rows.sort_by(|a, b| b.probability.total_cmp(&a.probability));
    rows.into_iter()
        .take(n)
        .map(|r| RankedListing {
            row: r.index,
            title: r.title().to_string(),
            location: r.location().to_string(),
            fraud_probability: r.probability,
        })
        .collect()
}

/// Rows per predicted class, largest class first
pub fn label_counts(table: &ScoredTable) -> Vec<(PredictedLabel, usize)> {
    let summary = Summary::from_table(table);
    let mut counts: Vec<(PredictedLabel, usize)> = vec![
        (PredictedLabel::Real, summary.real_count),
        (PredictedLabel::Fraud, summary.fraud_count),
    ]
    .into_iter()
    .filter(|(_, c)| *c > 0)
    .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// Most frequent locations among predicted-fraud rows. Blank locations are
/// skipped; ties keep first appearance.
pub fn top_fraud_locations(table: &ScoredTable, n: usize) -> Vec<(String, usize)> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in table.rows().filter(|r| r.label.is_fraud()) {
        let location = row.location().trim();
        if location.is_empty() {
            continue;
        }
        let count = counts.entry(location).or_insert(0);
        if *count == 0 {
            order.push(location);
        }
        *count += 1;
    }

    let mut ranked: Vec<(String, usize)> = order
        .into_iter()
        .map(|loc| (loc.to_string(), counts[loc]))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(n);
    ranked
}

/// Remote/logo combination key, e.g. `1_0`. Blank flags read as `nan`.
pub fn combo_key(telecommuting: &str, has_company_logo: &str) -> String {
    let part = |v: &str| {
        let v = v.trim();
        if v.is_empty() {
            "nan".to_string()
        } else {
            v.to_string()
        }
    };
    format!("{}_{}", part(telecommuting), part(has_company_logo))
}

/// Share of predicted fraud per remote/logo combination, keys ascending
pub fn fraud_rate_by_combo(table: &ScoredTable) -> Vec<(String, f64)> {
    let mut groups: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for row in table.rows() {
        let entry = groups
            .entry(combo_key(row.telecommuting(), row.has_company_logo()))
            .or_insert((0, 0));
        entry.0 += row.label.is_fraud() as usize;
        entry.1 += 1;
    }
    groups
        .into_iter()
        .map(|(key, (fraud, total))| (key, fraud as f64 / total as f64))
        .collect()
}

/// Description length vs probability, one point per row
pub fn description_points(table: &ScoredTable) -> Vec<(usize, f64, PredictedLabel)> {
    table
        .rows()
        .map(|r| (r.desc_length, r.probability, r.label))
        .collect()
}

/// Equal-width histogram with a density overlay in count units
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// Bin edges, `counts.len() + 1` of them
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
    /// (x, expected count per bin) along the data range; empty when the
    /// density is undefined
    pub density: Vec<(f64, f64)>,
}

impl Histogram {
    /// Bin `values` over their range. A constant sample gets a unit-wide
    /// range centered on the value.
    pub fn new(values: &[f64], bins: usize) -> Self {
        let bins = bins.max(1);
        if values.is_empty() {
            return Self {
                edges: Vec::new(),
                counts: Vec::new(),
                density: Vec::new(),
            };
        }

        let (mut lo, mut hi) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }
        let width = (hi - lo) / bins as f64;
        let edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();

        let mut counts = vec![0usize; bins];
        for &v in values {
            // last bin is closed on the right
            let idx = (((v - lo) / width) as usize).min(bins - 1);
            counts[idx] += 1;
        }

        let density = gaussian_kde(values, lo, hi, KDE_GRID)
            .into_iter()
            .map(|(x, d)| (x, d * values.len() as f64 * width))
            .collect();

        Self {
            edges,
            counts,
            density,
        }
    }

    pub fn bin_width(&self) -> f64 {
        match self.edges.as_slice() {
            [first, second, ..] => second - first,
            _ => 0.0,
        }
    }
}

/// Gaussian kernel density estimate on `points` grid points over [lo, hi],
/// bandwidth by Scott's rule. Empty when fewer than two distinct values.
pub fn gaussian_kde(values: &[f64], lo: f64, hi: f64, points: usize) -> Vec<(f64, f64)> {
    let n = values.len();
    if n < 2 || points < 2 {
        return Vec::new();
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let std = var.sqrt();
    if std <= 0.0 || !std.is_finite() {
        return Vec::new();
    }

    let bandwidth = std * (n as f64).powf(-1.0 / 5.0);
    let norm = 1.0 / (n as f64 * bandwidth * (2.0 * std::f64::consts::PI).sqrt());
    let step = (hi - lo) / (points - 1) as f64;

    (0..points)
        .map(|i| {
            let x = lo + step * i as f64;
            let density = values
                .iter()
                .map(|v| {
                    let z = (x - v) / bandwidth;
                    (-0.5 * z * z).exp()
                })
                .sum::<f64>()
                * norm;
            (x, density)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawTable;

    fn table(rows: &[(&str, &str, &str, &str, f64)]) -> ScoredTable {
        let mut csv = String::from("title,location,description,telecommuting,has_company_logo");
        for (title, location, tele, logo, _) in rows {
            csv.push_str(&format!("\n{},\"{}\",text,{},{}", title, location, tele, logo));
        }
        let raw = RawTable::from_reader(csv.as_bytes(), "t.csv").unwrap();
        let cols = raw.listing_columns().unwrap();
        let probs = rows.iter().map(|r| r.4).collect();
        ScoredTable::new(raw, cols, probs, 0.5)
    }

    #[test]
    fn test_summary_counts_sum_to_total() {
        let t = table(&[
            ("a", "X", "0", "1", 0.1),
            ("b", "X", "0", "1", 0.5),
            ("c", "Y", "1", "0", 0.9),
        ]);
        let s = Summary::from_table(&t);
        assert_eq!(s.total, 3);
        assert_eq!(s.fraud_count, 2);
        assert_eq!(s.fraud_count + s.real_count, s.total);
        assert!((s.fraud_pct - 66.666).abs() < 0.01);
    }

    #[test]
    fn test_empty_summary() {
        let t = table(&[]);
        let s = Summary::from_table(&t);
        assert_eq!(s.total, 0);
        assert_eq!(s.fraud_pct, 0.0);
        assert!(top_suspicious(&t, TOP_N).is_empty());
        assert!(label_counts(&t).is_empty());
    }

    #[test]
    fn test_top_suspicious_is_sorted_and_stable() {
        let rows: Vec<(String, f64)> = (0..14)
            .map(|i| (format!("job{}", i), [0.3, 0.9, 0.6][i % 3]))
            .collect();
        let fixture: Vec<(&str, &str, &str, &str, f64)> = rows
            .iter()
            .map(|(t, p)| (t.as_str(), "L", "0", "0", *p))
            .collect();
        let t = table(&fixture);

        let top = top_suspicious(&t, TOP_N);
        assert_eq!(top.len(), 10);
        assert!(top
            .windows(2)
            .all(|w| w[0].fraud_probability >= w[1].fraud_probability));
        // ties keep upload order
        assert_eq!(top[0].title, "job1");
        assert_eq!(top[1].title, "job4");

        let short = table(&fixture[..3]);
        assert_eq!(top_suspicious(&short, TOP_N).len(), 3);
    }

    #[test]
    fn test_top_fraud_locations() {
        let t = table(&[
            ("a", "US, NY", "0", "0", 0.9),
            ("b", "GB, LND", "0", "0", 0.8),
            ("c", "GB, LND", "0", "0", 0.7),
            ("d", "US, NY", "0", "0", 0.1),
            ("e", "", "0", "0", 0.95),
            ("f", "DE", "0", "0", 0.6),
        ]);
        let locations = top_fraud_locations(&t, TOP_N);
        assert_eq!(
            locations,
            vec![
                ("GB, LND".to_string(), 2),
                ("US, NY".to_string(), 1),
                ("DE".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_fraud_rate_by_combo() {
        let t = table(&[
            ("a", "L", "0", "1", 0.9),
            ("b", "L", "0", "1", 0.1),
            ("c", "L", "1", "0", 0.9),
            ("d", "L", "", "0", 0.2),
        ]);
        let rates = fraud_rate_by_combo(&t);
        assert_eq!(
            rates,
            vec![
                ("0_1".to_string(), 0.5),
                ("1_0".to_string(), 1.0),
                ("nan_0".to_string(), 0.0),
            ]
        );
    }

    #[test]
    fn test_label_counts_largest_first() {
        let t = table(&[
            ("a", "L", "0", "0", 0.9),
            ("b", "L", "0", "0", 0.1),
            ("c", "L", "0", "0", 0.2),
        ]);
        let counts = label_counts(&t);
        assert_eq!(counts, vec![(PredictedLabel::Real, 2), (PredictedLabel::Fraud, 1)]);
    }

    #[test]
    fn test_histogram_counts_every_value() {
        let values = [0.0, 0.1, 0.5, 0.5, 0.99, 1.0];
        let h = Histogram::new(&values, HISTOGRAM_BINS);
        assert_eq!(h.counts.len(), HISTOGRAM_BINS);
        assert_eq!(h.edges.len(), HISTOGRAM_BINS + 1);
        assert_eq!(h.counts.iter().sum::<usize>(), values.len());
        assert_eq!(h.counts[HISTOGRAM_BINS - 1], 2);
        assert!(!h.density.is_empty());
    }

    #[test]
    fn test_constant_histogram_has_no_density() {
        let h = Histogram::new(&[0.7, 0.7], 10);
        assert_eq!(h.counts.iter().sum::<usize>(), 2);
        assert!((h.bin_width() - 0.1).abs() < 1e-12);
        assert!(h.density.is_empty());
    }

    #[test]
    fn test_kde_integrates_to_about_one() {
        let values: Vec<f64> = (0..200).map(|i| (i as f64 / 200.0).powi(2)).collect();
        let kde = gaussian_kde(&values, -1.0, 2.0, 600);
        let step = kde[1].0 - kde[0].0;
        let area: f64 = kde.iter().map(|(_, d)| d * step).sum();
        assert!((area - 1.0).abs() < 0.02);
    }
}
