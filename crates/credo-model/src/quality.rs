//! Internal clustering-quality indices.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Row, squared_distance};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct QualityReport {
    /// Mean silhouette coefficient, in `[-1, 1]`; higher is better.
    pub silhouette: f64,
    /// Lower is better; 0 for perfectly compact, separated clusters.
    pub davies_bouldin: f64,
    /// Between/within dispersion ratio; higher is better.
    pub calinski_harabasz: f64,
}

impl QualityReport {
    /// `None` unless there are at least two clusters and fewer clusters
    /// than rows.
    pub fn compute(rows: &[Row], labels: &[usize]) -> Option<Self> {
        let groups = group(rows, labels);
        if rows.len() != labels.len() || groups.len() < 2 || groups.len() >= rows.len() {
            return None;
        }
        Some(Self {
            silhouette: silhouette(rows, labels, &groups),
            davies_bouldin: davies_bouldin(rows, &groups),
            calinski_harabasz: calinski_harabasz(rows, &groups),
        })
    }
}

fn group(rows: &[Row], labels: &[usize]) -> BTreeMap<usize, Vec<usize>> {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &l) in labels.iter().enumerate().take(rows.len()) {
        groups.entry(l).or_default().push(i);
    }
    groups
}

fn centroid(rows: &[Row], members: &[usize]) -> Vec<f64> {
    let mut c = vec![0.0; rows.first().map_or(0, |r| r.len())];
    for &i in members {
        for (s, x) in c.iter_mut().zip(&rows[i]) {
            *s += x;
        }
    }
    let n = members.len().max(1) as f64;
    c.iter_mut().for_each(|s| *s /= n);
    c
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    squared_distance(a, b).sqrt()
}

fn silhouette(rows: &[Row], labels: &[usize], groups: &BTreeMap<usize, Vec<usize>>) -> f64 {
    let mut total = 0.0;
    for (i, row) in rows.iter().enumerate() {
        let own = labels[i];
        let own_members = &groups[&own];
        if own_members.len() <= 1 {
            continue;
        }
        let a = own_members.iter().filter(|&&j| j != i).map(|&j| distance(row, &rows[j])).sum::<f64>()
            / (own_members.len() - 1) as f64;
        let b = groups
            .iter()
            .filter(|(l, _)| **l != own)
            .map(|(_, m)| m.iter().map(|&j| distance(row, &rows[j])).sum::<f64>() / m.len() as f64)
            .fold(f64::INFINITY, f64::min);
        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }
    total / rows.len() as f64
}

fn davies_bouldin(rows: &[Row], groups: &BTreeMap<usize, Vec<usize>>) -> f64 {
    let centroids: Vec<Vec<f64>> = groups.values().map(|m| centroid(rows, m)).collect();
    let spread: Vec<f64> = groups
        .values()
        .zip(&centroids)
        .map(|(m, c)| m.iter().map(|&i| distance(&rows[i], c)).sum::<f64>() / m.len() as f64)
        .collect();

    let k = centroids.len();
    let mut any_separation = false;
    let mut total = 0.0;
    for i in 0..k {
        let mut worst = 0.0f64;
        for j in (0..k).filter(|&j| j != i) {
            let sep = distance(&centroids[i], &centroids[j]);
            if sep > 0.0 {
                any_separation = true;
                worst = worst.max((spread[i] + spread[j]) / sep);
            }
        }
        total += worst;
    }
    if !any_separation || spread.iter().all(|s| *s == 0.0) {
        return 0.0;
    }
    total / k as f64
}

fn calinski_harabasz(rows: &[Row], groups: &BTreeMap<usize, Vec<usize>>) -> f64 {
    let all: Vec<usize> = (0..rows.len()).collect();
    let overall = centroid(rows, &all);
    let mut between = 0.0;
    let mut within = 0.0;
    for members in groups.values() {
        let c = centroid(rows, members);
        between += members.len() as f64 * squared_distance(&c, &overall);
        within += members.iter().map(|&i| squared_distance(&rows[i], &c)).sum::<f64>();
    }
    if within == 0.0 {
        return 1.0;
    }
    let (n, k) = (rows.len() as f64, groups.len() as f64);
    between * (n - k) / (within * (k - 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use credo_core::constants::FEATURE_COUNT;

    fn at(v: f64) -> Row {
        let mut r = [0.0; FEATURE_COUNT];
        r[0] = v;
        r
    }

    #[test]
    fn two_tight_pairs() {
        // Clusters {0, 1} and {10, 11} on one axis.
        let rows = vec![at(0.0), at(1.0), at(10.0), at(11.0)];
        let labels = vec![0, 0, 1, 1];
        let q = QualityReport::compute(&rows, &labels).unwrap();

        // Point 0: a = 1, b = 10.5 -> 0.9047..; point 1: a = 1, b = 9.5 -> 0.8947..
        let expected = (2.0 * (9.5 / 10.5) + 2.0 * (8.5 / 9.5)) / 4.0;
        assert!((q.silhouette - expected).abs() < 1e-12);

        // Spreads 0.5 each, centroid gap 10.
        assert!((q.davies_bouldin - 0.1).abs() < 1e-12);

        // Between = 4 * 5^2 = 100, within = 4 * 0.25 = 1; (100 * 2) / (1 * 1).
        assert!((q.calinski_harabasz - 200.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_clusterings_are_none() {
        let rows = vec![at(0.0), at(1.0), at(2.0)];
        assert!(QualityReport::compute(&rows, &[0, 0, 0]).is_none());
        assert!(QualityReport::compute(&rows, &[0, 1, 2]).is_none());
        assert!(QualityReport::compute(&rows, &[0, 1]).is_none());
    }

    #[test]
    fn singleton_cluster_contributes_zero_silhouette() {
        let rows = vec![at(0.0), at(1.0), at(50.0)];
        let q = QualityReport::compute(&rows, &[0, 0, 1]).unwrap();
        let s0 = (50.0 - 1.0) / 50.0;
        let s1 = (49.0 - 1.0) / 49.0;
        assert!((q.silhouette - (s0 + s1) / 3.0).abs() < 1e-12);
    }

    #[test]
    fn coincident_points_are_well_defined() {
        let rows = vec![at(1.0), at(1.0), at(4.0), at(4.0)];
        let q = QualityReport::compute(&rows, &[0, 0, 1, 1]).unwrap();
        assert_eq!(q.silhouette, 1.0);
        assert_eq!(q.davies_bouldin, 0.0);
        assert_eq!(q.calinski_harabasz, 1.0);
    }
}
