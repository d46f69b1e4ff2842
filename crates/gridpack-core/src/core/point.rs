use std::collections::BTreeMap;
use std::fmt;

/// Number of decimal digits kept for every generated coordinate.
pub const POINT_PRECISION: i32 = 6;

/// Rounds a value to [`POINT_PRECISION`] decimal digits, folding `-0.0` into `0.0`.
pub fn round_to_precision(value: f64) -> f64 {
    let scale = 10f64.powi(POINT_PRECISION);
    let rounded = (value * scale).round() / scale;
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Formats a value in its shortest round-trip form, always keeping at least one decimal.
///
/// `4.0` becomes `"4.0"`, `-0.25` stays `"-0.25"`. This matches the text the
/// downstream fitting tools already expect in scan-point tables and reweight names.
pub fn format_value(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// A single point in Wilson-coefficient space, keyed by degree-of-freedom name.
///
/// Missing names are treated as the SM value `0.0`, both by [`ScanPoint::get`]
/// and by equality.
#[derive(Debug, Clone, Default)]
pub struct ScanPoint {
    values: BTreeMap<String, f64>,
}

impl ScanPoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// The all-zero point over the given names.
    pub fn sm<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names.into_iter().map(|n| (n.into(), 0.0)).collect()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> f64 {
        self.values.get(name).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_sm(&self) -> bool {
        self.values.values().all(|v| *v == 0.0)
    }

    /// Returns a copy with every coordinate rounded to [`POINT_PRECISION`] digits.
    pub fn rounded(&self) -> Self {
        self.iter()
            .map(|(k, v)| (k.to_string(), round_to_precision(v)))
            .collect()
    }
}

impl PartialEq for ScanPoint {
    fn eq(&self, other: &Self) -> bool {
        self.values.iter().all(|(k, v)| *v == other.get(k))
            && other.values.iter().all(|(k, v)| *v == self.get(k))
    }
}

impl FromIterator<(String, f64)> for ScanPoint {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<(&'a str, f64)> for ScanPoint {
    fn from_iter<T: IntoIterator<Item = (&'a str, f64)>>(iter: T) -> Self {
        iter.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }
}

impl fmt::Display for ScanPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (idx, (k, v)) in self.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", k, format_value(v))?;
        }
        write!(f, "}}")
    }
}
