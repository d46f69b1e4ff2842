use super::CardError;
use super::options::OptionSet;
use super::substitution::apply_named_substitution;
use super::traits::{Card, copy_template};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const LINE_COMMENT: char = '#';

/// A customize card: an ordered list of opaque command lines.
///
/// Options are keyed by their position in the list (`"0"`, `"1"`, ...).
#[derive(Debug, Clone)]
pub struct CustomizeCard {
    source: PathBuf,
    options: OptionSet,
    raw_lines: HashMap<String, String>,
    parsed: HashMap<String, String>,
}

impl CustomizeCard {
    pub fn from_text(source: &Path, text: &str) -> Self {
        let mut card = Self {
            source: source.to_path_buf(),
            options: OptionSet::new(),
            raw_lines: HashMap::new(),
            parsed: HashMap::new(),
        };
        for raw in text.lines() {
            let line = match raw.find(LINE_COMMENT) {
                Some(idx) => &raw[..idx],
                None => raw,
            }
            .trim();
            if line.is_empty() {
                continue;
            }
            let key = card.push_option(line);
            card.parsed.insert(key.clone(), line.to_string());
            card.raw_lines.insert(key, raw.to_string());
        }
        card
    }

    /// Appends a command line, returning the key it was stored under.
    pub fn push_option(&mut self, line: &str) -> String {
        let key = self.options.len().to_string();
        self.options.set(&key, line);
        key
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(|(_, v)| v)
    }

    fn render(&self, template: &str) -> String {
        let mut text = template.to_string();
        let mut appended = Vec::new();
        for (key, value) in self.options.iter() {
            match (self.parsed.get(key), self.raw_lines.get(key)) {
                (Some(orig), Some(raw)) if orig != value => {
                    let new_raw = apply_named_substitution(raw, orig, value);
                    text = apply_named_substitution(&text, raw, &new_raw);
                }
                (Some(_), _) => {}
                (None, _) => appended.push(value),
            }
        }
        if !appended.is_empty() && !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        for line in appended {
            text.push_str(line);
            text.push('\n');
        }
        text
    }
}

impl Card for CustomizeCard {
    fn parse(source: &Path) -> Result<Self, CardError> {
        let text = fs::read_to_string(source)?;
        Ok(Self::from_text(source, &text))
    }

    fn source(&self) -> &Path {
        &self.source
    }

    fn options(&self) -> &OptionSet {
        &self.options
    }

    fn set_option(&mut self, key: &str, value: &str) {
        self.options.set(key, value);
    }

    fn save(&self, dst: &Path, force: bool) -> Result<(), CardError> {
        copy_template(&self.source, dst, force)?;
        let template = fs::read_to_string(dst)?;
        let rendered = self.render(&template);
        if rendered != template {
            fs::write(dst, rendered)?;
        }
        Ok(())
    }

    fn dump(&self) -> String {
        let ops = self.options();
        ops.iter()
            .map(|(k, v)| format!("[{:>w$}] {}", k, v, w = ops.key_width()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
