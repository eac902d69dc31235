//! Tabular key/value logger

/// Collects key/value pairs for one iteration and dumps them as a table
///
/// Keys keep their first-recorded order; recording a key twice overwrites
/// the value.
#[derive(Debug, Default)]
pub struct TabularLogger {
    rows: Vec<(String, f64)>,
}

impl TabularLogger {
    /// Create an empty logger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` under `key` for the current iteration
    pub fn record(&mut self, key: &str, value: f64) {
        match self.rows.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.rows.push((key.to_string(), value)),
        }
    }

    /// Value recorded under `key`, if any
    pub fn get(&self, key: &str) -> Option<f64> {
        self.rows.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    /// Recorded pairs in insertion order
    pub fn rows(&self) -> &[(String, f64)] {
        &self.rows
    }

    /// Render the recorded pairs as an aligned table
    pub fn render(&self) -> String {
        let key_width = self.rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        let values: Vec<String> = self.rows.iter().map(|(_, v)| format_value(*v)).collect();
        let value_width = values.iter().map(String::len).max().unwrap_or(0);
        let rule = "-".repeat(key_width + value_width + 7);

        let mut out = String::new();
        out.push_str(&rule);
        out.push('\n');
        for ((key, _), value) in self.rows.iter().zip(&values) {
            out.push_str(&format!("| {:<kw$} | {:>vw$} |\n", key, value, kw = key_width, vw = value_width));
        }
        out.push_str(&rule);
        out
    }

    /// Log the table through `tracing` and clear it
    pub fn dump(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        tracing::info!("\n{}", self.render());
        self.rows.clear();
    }
}

fn format_value(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else if v != 0.0 && (v.abs() < 1e-3 || v.abs() >= 1e6) {
        format!("{:.4e}", v)
    } else {
        format!("{:.5}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_overwrite() {
        let mut logger = TabularLogger::new();
        logger.record("EpRewMean", -1200.5);
        logger.record("KL", 0.002);
        logger.record("EpRewMean", -900.0);

        assert_eq!(logger.rows().len(), 2);
        assert_eq!(logger.get("EpRewMean"), Some(-900.0));
        assert_eq!(logger.rows()[1].0, "KL");
    }

    #[test]
    fn test_render_aligns_columns() {
        let mut logger = TabularLogger::new();
        logger.record("Iteration", 3.0);
        logger.record("StepSize", 0.045);

        let table = logger.render();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("| Iteration |"));
        assert!(lines[2].starts_with("| StepSize  |"));
        assert_eq!(lines[1].len(), lines[2].len());
    }

    #[test]
    fn test_dump_clears() {
        let mut logger = TabularLogger::new();
        logger.record("NumPaths", 13.0);
        logger.dump();
        assert!(logger.rows().is_empty());
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(2500.0), "2500");
        assert_eq!(format_value(0.5), "0.50000");
        assert_eq!(format_value(1e-8), "1.0000e-8");
    }
}
