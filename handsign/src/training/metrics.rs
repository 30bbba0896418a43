//! Evaluation metrics

use std::fmt::Write;

/// Rows are actual classes, columns predicted classes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    labels: Vec<String>,
    counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn new(labels: Vec<String>) -> Self {
        let n = labels.len();
        Self {
            labels,
            counts: vec![vec![0; n]; n],
        }
    }

    /// Count one prediction. Indices outside the label set are ignored.
    pub fn record(&mut self, actual: usize, predicted: usize) {
        if let Some(cell) = self.counts.get_mut(actual).and_then(|row| row.get_mut(predicted)) {
            *cell += 1;
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn count(&self, actual: usize, predicted: usize) -> usize {
        self.counts
            .get(actual)
            .and_then(|row| row.get(predicted))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        (0..self.labels.len()).map(|i| self.counts[i][i]).sum()
    }

    /// `None` when nothing was recorded
    pub fn accuracy(&self) -> Option<f64> {
        let total = self.total();
        (total > 0).then(|| self.correct() as f64 / total as f64)
    }

    /// Samples whose actual class is `class`
    pub fn support(&self, class: usize) -> usize {
        self.counts.get(class).map(|row| row.iter().sum()).unwrap_or(0)
    }

    pub fn precision(&self, class: usize) -> Option<f64> {
        let predicted: usize = self.counts.iter().map(|row| row.get(class).copied().unwrap_or(0)).sum();
        (predicted > 0).then(|| self.count(class, class) as f64 / predicted as f64)
    }

    pub fn recall(&self, class: usize) -> Option<f64> {
        let support = self.support(class);
        (support > 0).then(|| self.count(class, class) as f64 / support as f64)
    }

    pub fn f1(&self, class: usize) -> Option<f64> {
        let p = self.precision(class)?;
        let r = self.recall(class)?;
        (p + r > 0.0).then(|| 2.0 * p * r / (p + r))
    }

    /// Per-class precision/recall/f1 table
    pub fn classification_report(&self) -> String {
        let width = self.labels.iter().map(String::len).max().unwrap_or(5).max(5);
        let fmt = |v: Option<f64>| v.map(|x| format!("{:>9.2}", x)).unwrap_or_else(|| format!("{:>9}", "-"));
        let mut out = String::new();
        let _ = writeln!(out, "{:<width$} {:>9} {:>9} {:>9} {:>9}", "class", "precision", "recall", "f1", "support", width = width);
        for (i, label) in self.labels.iter().enumerate() {
            let _ = writeln!(
                out,
                "{:<width$} {} {} {} {:>9}",
                label,
                fmt(self.precision(i)),
                fmt(self.recall(i)),
                fmt(self.f1(i)),
                self.support(i),
                width = width
            );
        }
        let _ = writeln!(out, "{:<width$} {}", "accuracy", fmt(self.accuracy()), width = width);
        out
    }

    /// Matrix as a text grid
    pub fn render(&self) -> String {
        let width = self.labels.iter().map(String::len).max().unwrap_or(1).max(6);
        let mut out = String::new();
        let _ = write!(out, "{:<width$}", "", width = width);
        for label in &self.labels {
            let _ = write!(out, " {:>width$}", label, width = width);
        }
        let _ = writeln!(out);
        for (label, row) in self.labels.iter().zip(&self.counts) {
            let _ = write!(out, "{:<width$}", label, width = width);
            for count in row {
                let _ = write!(out, " {:>width$}", count, width = width);
            }
            let _ = writeln!(out);
        }
        out
    }
}
