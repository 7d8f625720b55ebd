/// Column standardization fitted on training rows only.
///
/// Uses population standard deviation; constant columns get a scale of 1.0
/// so they transform to zero instead of NaN.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let Some(first) = rows.first() else {
            return Self::default();
        };
        let width = first.len();
        let n = rows.len() as f64;

        let mut means = vec![0.0; width];
        for row in rows {
            for (m, v) in means.iter_mut().zip(row.iter()) {
                *m += v;
            }
        }
        means.iter_mut().for_each(|m| *m /= n);

        let mut scales = vec![0.0; width];
        for row in rows {
            for ((s, v), m) in scales.iter_mut().zip(row.iter()).zip(means.iter()) {
                *s += (v - m).powi(2);
            }
        }
        for s in scales.iter_mut() {
            let std = (*s / n).sqrt();
            *s = if std > 0.0 && std.is_finite() { std } else { 1.0 };
        }

        Self { means, scales }
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter()
            .map(|row| {
                row.iter()
                    .zip(self.means.iter().zip(self.scales.iter()))
                    .map(|(v, (m, s))| (v - m) / s)
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standardizes_columns() {
        let rows = vec![vec![1.0, 5.0], vec![3.0, 5.0]];
        let scaler = StandardScaler::fit(&rows);
        let out = scaler.transform(&rows);
        assert_eq!(out[0], vec![-1.0, 0.0]);
        assert_eq!(out[1], vec![1.0, 0.0]);
    }

    #[test]
    fn test_uses_training_statistics_only() {
        let scaler = StandardScaler::fit(&[vec![0.0], vec![2.0]]);
        assert_eq!(scaler.transform(&[vec![4.0]]), vec![vec![3.0]]);
    }
}
