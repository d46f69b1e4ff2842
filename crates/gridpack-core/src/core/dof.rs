use std::collections::BTreeMap;

/// Start value and scan range of a single degree of freedom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    pub start: f64,
    pub low: Option<f64>,
    pub high: Option<f64>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            start: 0.0,
            low: None,
            high: None,
        }
    }
}

/// A named scan axis that drives one or more model couplings.
///
/// Evaluating the axis at `x` sets every related coupling `c` to `x * scale(c)`.
/// A DoF tied to several couplings lets a single scan coordinate move a whole
/// family of Wilson coefficients together (for example the three lepton
/// generations of one four-fermion operator).
#[derive(Debug, Clone, PartialEq)]
pub struct DegreeOfFreedom {
    name: String,
    relations: BTreeMap<String, f64>,
    limits: Limits,
}

impl DegreeOfFreedom {
    /// Creates a DoF that scales every coupling in `couplings` by `scale`.
    ///
    /// An empty coupling list ties the DoF to the coupling of the same name.
    pub fn new<I, S>(name: impl Into<String>, couplings: I, scale: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let mut relations: BTreeMap<String, f64> =
            couplings.into_iter().map(|c| (c.into(), scale)).collect();
        if relations.is_empty() {
            relations.insert(name.clone(), scale);
        }
        Self {
            name,
            relations,
            limits: Limits::default(),
        }
    }

    /// Shorthand for a DoF driving exactly the coupling of the same name with unit scale.
    pub fn single(name: impl Into<String>) -> Self {
        Self::new(name, std::iter::empty::<String>(), 1.0)
    }

    pub fn with_coefficient<I, S>(mut self, couplings: I, scale: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_coefficient(couplings, scale);
        self
    }

    pub fn with_limits(mut self, start: f64, low: Option<f64>, high: Option<f64>) -> Self {
        self.set_limits(start, low, high);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn coefficients(&self) -> impl Iterator<Item = &str> {
        self.relations.keys().map(String::as_str)
    }

    pub fn scale_of(&self, coupling: &str) -> Option<f64> {
        self.relations.get(coupling).copied()
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn start(&self) -> f64 {
        self.limits.start
    }

    pub fn low(&self) -> Option<f64> {
        self.limits.low
    }

    pub fn high(&self) -> Option<f64> {
        self.limits.high
    }

    /// Sets (or overwrites) the scale for every coupling in `couplings`.
    pub fn set_coefficient<I, S>(&mut self, couplings: I, scale: f64)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for c in couplings {
            self.relations.insert(c.into(), scale);
        }
    }

    pub fn set_limits(&mut self, start: f64, low: Option<f64>, high: Option<f64>) {
        self.limits = Limits { start, low, high };
    }

    pub fn has_limits(&self) -> bool {
        self.limits.low.is_some() && self.limits.high.is_some()
    }

    /// Removes a coupling, returning its scale if it was present.
    ///
    /// The last remaining coupling cannot be removed.
    pub fn pop_coefficient(&mut self, coupling: &str) -> Option<f64> {
        if self.relations.len() == 1 && self.relations.contains_key(coupling) {
            return None;
        }
        self.relations.remove(coupling)
    }

    /// Maps a scan coordinate onto every related coupling.
    pub fn eval(&self, x: f64) -> BTreeMap<String, f64> {
        self.relations
            .iter()
            .map(|(c, scale)| {
                let v = x * scale;
                (c.clone(), if v == 0.0 { 0.0 } else { v })
            })
            .collect()
    }

    /// Coupling-order restriction selecting only diagrams linear in this DoF's couplings.
    pub fn coupling_string(&self) -> String {
        let mut s = String::from("FCNC=0 DIM6^2==1");
        for c in self.relations.keys() {
            s.push_str(&format!(" DIM6_{}^2==1", c));
        }
        s
    }
}
