use super::FileFormatError;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Per-coefficient scan ranges keyed by `<process>_<dof>`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LimitsTable {
    entries: HashMap<String, (f64, f64)>,
}

impl LimitsTable {
    /// Loads a `key low high` table. Rows without exactly three fields are ignored.
    pub fn load(path: &Path) -> Result<Self, FileFormatError> {
        let text = fs::read_to_string(path)?;
        let mut entries = HashMap::new();
        for (idx, line) in text.lines().enumerate() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [key, low, high] = fields.as_slice() else {
                continue;
            };
            let parse = |s: &str| {
                s.parse::<f64>().map_err(|_| FileFormatError::InvalidFloat {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    value: s.to_string(),
                })
            };
            entries.insert(key.to_string(), (parse(low)?, parse(high)?));
        }
        Ok(Self { entries })
    }

    pub fn insert(&mut self, key: impl Into<String>, low: f64, high: f64) {
        self.entries.insert(key.into(), (low, high));
    }

    pub fn get(&self, key: &str) -> Option<(f64, f64)> {
        self.entries.get(key).copied()
    }

    /// Range of `dof` for the process whose limits are stored under `limits_name`.
    pub fn lookup(&self, limits_name: &str, dof: &str) -> Option<(f64, f64)> {
        self.get(&format!("{}_{}", limits_name, dof))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
