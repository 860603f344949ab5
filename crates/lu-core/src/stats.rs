//! Box-plot statistics
//!
//! `LazyBoxPlot` collects numbers and computes its five-number summary on
//! first access. Renderers read the same summary for box geometry and for the
//! tooltip label, so the computation is memoized per instance.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

/// Reduction used to compare rows holding several numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMethod {
    Min,
    Max,
    #[default]
    Median,
    Q1,
    Q3,
    Mean,
}

impl SortMethod {
    /// Reduce a set of numbers, NaN for an empty set
    pub fn reduce(self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return f64::NAN;
        }
        if values.len() == 1 {
            return values[0];
        }
        match self {
            SortMethod::Mean => values.iter().sum::<f64>() / values.len() as f64,
            other => match LazyBoxPlot::new(values.iter().copied()).summary() {
                Some(summary) => summary.get(other),
                None => f64::NAN,
            },
        }
    }
}

/// Five-number summary with whiskers and outliers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxPlotData {
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub q1: f64,
    pub q3: f64,
    #[serde(default)]
    pub mean: f64,
    /// Lowest value within `q1 - 1.5 * IQR`
    #[serde(default)]
    pub whisker_low: f64,
    /// Highest value within `q3 + 1.5 * IQR`
    #[serde(default)]
    pub whisker_high: f64,
    /// Sorted values strictly beyond the whiskers
    #[serde(default)]
    pub outliers: Vec<f64>,
}

impl BoxPlotData {
    /// Build a summary from pre-computed quartiles
    pub fn from_quartiles(min: f64, q1: f64, median: f64, q3: f64, max: f64) -> Self {
        let (whisker_low, whisker_high) = whiskers(min, q1, q3, max);
        Self {
            min,
            max,
            median,
            q1,
            q3,
            mean: median,
            whisker_low,
            whisker_high,
            outliers: Vec::new(),
        }
    }

    /// Value selected by a sort method
    pub fn get(&self, method: SortMethod) -> f64 {
        match method {
            SortMethod::Min => self.min,
            SortMethod::Max => self.max,
            SortMethod::Median => self.median,
            SortMethod::Q1 => self.q1,
            SortMethod::Q3 => self.q3,
            SortMethod::Mean => self.mean,
        }
    }

    /// Apply a scale to every statistic, e.g. to normalize for rendering
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            min: f(self.min),
            max: f(self.max),
            median: f(self.median),
            q1: f(self.q1),
            q3: f(self.q3),
            mean: f(self.mean),
            whisker_low: f(self.whisker_low),
            whisker_high: f(self.whisker_high),
            outliers: self.outliers.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Tooltip text listing the five numbers
    pub fn label(&self) -> String {
        format!(
            "min = {}\nq1 = {}\nmedian = {}\nq3 = {}\nmax = {}",
            format_number(self.min),
            format_number(self.q1),
            format_number(self.median),
            format_number(self.q3),
            format_number(self.max),
        )
    }
}

/// Lazily computed box-plot summary over an unordered collection of numbers
#[derive(Debug, Default)]
pub struct LazyBoxPlot {
    values: Vec<f64>,
    summary: OnceCell<Option<BoxPlotData>>,
}

impl LazyBoxPlot {
    /// Collect the values, NaN entries are ignored
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            values: values.into_iter().filter(|v| !v.is_nan()).collect(),
            summary: OnceCell::new(),
        }
    }

    /// Number of valid values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The summary, `None` when there is no valid value
    pub fn summary(&self) -> Option<&BoxPlotData> {
        self.summary.get_or_init(|| compute(&self.values)).as_ref()
    }

    pub fn min(&self) -> f64 {
        self.stat(|s| s.min)
    }

    pub fn max(&self) -> f64 {
        self.stat(|s| s.max)
    }

    pub fn median(&self) -> f64 {
        self.stat(|s| s.median)
    }

    pub fn q1(&self) -> f64 {
        self.stat(|s| s.q1)
    }

    pub fn q3(&self) -> f64 {
        self.stat(|s| s.q3)
    }

    pub fn outliers(&self) -> &[f64] {
        self.summary().map(|s| s.outliers.as_slice()).unwrap_or_default()
    }

    fn stat(&self, f: impl Fn(&BoxPlotData) -> f64) -> f64 {
        self.summary().map(f).unwrap_or(f64::NAN)
    }
}

/// Quantile of sorted data using linear interpolation between order statistics
pub fn quantile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            if p <= 0.0 {
                return sorted[0];
            }
            if p >= 1.0 {
                return sorted[n - 1];
            }
            let h = (n - 1) as f64 * p;
            let i = h.floor() as usize;
            let lo = sorted[i];
            let hi = sorted[i + 1];
            lo + (hi - lo) * (h - i as f64)
        }
    }
}

fn whiskers(min: f64, q1: f64, q3: f64, max: f64) -> (f64, f64) {
    let iqr = q3 - q1;
    ((q1 - 1.5 * iqr).max(min), (q3 + 1.5 * iqr).min(max))
}

fn compute(values: &[f64]) -> Option<BoxPlotData> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    let q1 = quantile(&sorted, 0.25);
    let median = quantile(&sorted, 0.5);
    let q3 = quantile(&sorted, 0.75);
    let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;
    let (whisker_low, whisker_high) = whiskers(min, q1, q3, max);
    let outliers = sorted
        .iter()
        .copied()
        .filter(|&v| v < whisker_low || v > whisker_high)
        .collect();

    Some(BoxPlotData {
        min,
        max,
        median,
        q1,
        q3,
        mean,
        whisker_low,
        whisker_high,
        outliers,
    })
}

/// Format with three significant digits and no trailing zeros
pub fn format_number(v: f64) -> String {
    if !v.is_finite() {
        return if v.is_nan() { "NaN".to_string() } else { v.to_string() };
    }
    if v == 0.0 {
        return "0".to_string();
    }
    let magnitude = v.abs().log10().floor() as i32;
    let decimals = (2 - magnitude).max(0) as usize;
    let factor = 10f64.powi(magnitude - 2);
    let rounded = if magnitude > 2 { (v / factor).round() * factor } else { v };
    let text = format!("{:.*}", decimals, rounded);
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_plot_with_outlier() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 100.0];
        let boxplot = LazyBoxPlot::new(data.iter().rev().copied());
        let s = boxplot.summary().unwrap();

        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 100.0);
        assert_eq!(s.q1, 3.5);
        assert_eq!(s.median, 6.0);
        assert_eq!(s.q3, 8.5);
        assert_eq!(s.whisker_low, 1.0);
        assert_eq!(s.whisker_high, 16.0);
        assert_eq!(s.outliers, vec![100.0]);
    }

    #[test]
    fn test_summary_is_memoized() {
        let boxplot = LazyBoxPlot::new([3.0, 1.0, 2.0]);
        let first = boxplot.summary().unwrap() as *const BoxPlotData;
        let second = boxplot.summary().unwrap() as *const BoxPlotData;
        assert_eq!(first, second);
        assert_eq!(boxplot.median(), 2.0);
    }

    #[test]
    fn test_empty_and_nan_input() {
        let boxplot = LazyBoxPlot::new([f64::NAN]);
        assert!(boxplot.is_empty());
        assert!(boxplot.summary().is_none());
        assert!(boxplot.median().is_nan());
        assert!(boxplot.outliers().is_empty());
    }

    #[test]
    fn test_sort_method_reduce() {
        let values = [4.0, 1.0, 7.0];
        assert_eq!(SortMethod::Min.reduce(&values), 1.0);
        assert_eq!(SortMethod::Max.reduce(&values), 7.0);
        assert_eq!(SortMethod::Median.reduce(&values), 4.0);
        assert_eq!(SortMethod::Mean.reduce(&values), 4.0);
        assert!(SortMethod::Q1.reduce(&[]).is_nan());
    }

    #[test]
    fn test_label_format() {
        let data = BoxPlotData::from_quartiles(0.0, 0.25, 0.5, 1234.5, 2.0 / 3.0);
        let label = data.label();
        assert!(label.starts_with("min = 0\nq1 = 0.25\nmedian = 0.5\nq3 = 1230\n"));
        assert!(label.ends_with("max = 0.667"));
    }
}
