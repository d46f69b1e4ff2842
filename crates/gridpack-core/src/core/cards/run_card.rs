use super::CardError;
use super::options::OptionSet;
use super::substitution::{apply_named_substitution, rewrite_assignment_line};
use super::traits::{Card, copy_template};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const LINE_COMMENT: char = '#';
const EOL_COMMENT: char = '!';

/// A generator run card made of `value = key ! comment` lines.
#[derive(Debug, Clone)]
pub struct RunCard {
    source: PathBuf,
    options: OptionSet,
    raw_lines: HashMap<String, String>,
    parsed: HashMap<String, String>,
    line_width: usize,
}

impl RunCard {
    /// Parses run-card text as if it were read from `source`.
    pub fn from_text(source: &Path, text: &str) -> Self {
        let mut card = Self {
            source: source.to_path_buf(),
            options: OptionSet::new(),
            raw_lines: HashMap::new(),
            parsed: HashMap::new(),
            line_width: 0,
        };
        for raw in text.lines() {
            let Some((value, key)) = parse_assignment(raw) else {
                continue;
            };
            card.options.set(key, value);
            card.parsed.insert(key.to_string(), value.to_string());
            card.raw_lines.insert(key.to_string(), raw.to_string());
            card.line_width = card.line_width.max(raw.len());
        }
        card
    }

    /// Original template line for `key`, if the key was parsed from the template.
    pub fn raw_line(&self, key: &str) -> Option<&str> {
        self.raw_lines.get(key).map(String::as_str)
    }

    /// Keys whose value differs from the template, in option order.
    pub fn modified_keys(&self) -> impl Iterator<Item = &str> {
        self.options
            .iter()
            .filter(|(k, v)| self.parsed.get(*k).is_some_and(|orig| orig != v))
            .map(|(k, _)| k)
    }

    /// Keys set on the card that do not exist in the template.
    pub fn added_keys(&self) -> impl Iterator<Item = &str> {
        self.options.keys().filter(|k| !self.parsed.contains_key(*k))
    }

    fn render(&self, template: &str) -> Result<String, CardError> {
        let mut text = template.to_string();
        let vw = self.options.value_width();
        let kw = self.options.key_width();
        for key in self.modified_keys() {
            let (Some(old), Some(value)) = (self.raw_lines.get(key), self.options.get(key)) else {
                continue;
            };
            let new = rewrite_assignment_line(old, key, value, vw, kw)?;
            debug!("{:<w$} --> {}", old, new, w = self.line_width);
            text = apply_named_substitution(&text, old, &new);
        }
        Ok(text)
    }
}

fn parse_assignment(raw: &str) -> Option<(&str, &str)> {
    let mut line = raw;
    if let Some(idx) = line.find(LINE_COMMENT) {
        line = &line[..idx];
    }
    if let Some(idx) = line.find(EOL_COMMENT) {
        line = &line[..idx];
    }
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let mut parts = line.split('=');
    let (Some(value), Some(key), None) = (parts.next(), parts.next(), parts.next()) else {
        return None;
    };
    Some((value.trim(), key.trim()))
}

impl Card for RunCard {
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
        if self.modified_keys().next().is_none() {
            return Ok(());
        }
        let template = fs::read_to_string(dst)?;
        fs::write(dst, self.render(&template)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TEMPLATE: &str = "\
#*********************************************************************
#                       MadGraph5_aMC@NLO                            *
#*********************************************************************
  tag_1     = run_tag ! name of the run
#*********************************************************************
  10000 = nevents ! Number of unweighted events requested
  0   = iseed   ! rnd seed (0=assigned automatically=default))
     4 = maxjetflavor    ! Maximum jet pdg code

   15.0  = bwcutoff      ! (M+/-bwcutoff*Gamma)
";

    fn write_template(dir: &Path) -> PathBuf {
        let path = dir.join("run_card.dat");
        fs::write(&path, TEMPLATE).unwrap();
        path
    }

    #[test]
    fn parse_extracts_value_key_pairs() {
        let card = RunCard::from_text(Path::new("run_card.dat"), TEMPLATE);
        assert_eq!(
            card.options().keys().collect::<Vec<_>>(),
            vec!["run_tag", "nevents", "iseed", "maxjetflavor", "bwcutoff"]
        );
        assert_eq!(card.get_option("nevents"), Some("10000"));
        assert_eq!(card.get_option("iseed"), Some("0"));
        assert_eq!(card.get_option("bwcutoff"), Some("15.0"));
        assert!(!card.has_option("xqcut"));
        assert_eq!(
            card.raw_line("maxjetflavor"),
            Some("     4 = maxjetflavor    ! Maximum jet pdg code")
        );
    }

    #[test]
    fn save_without_changes_is_byte_identical() {
        let dir = tempdir().unwrap();
        let src = write_template(dir.path());
        let dst = dir.path().join("out_run_card.dat");

        let card = RunCard::parse(&src).unwrap();
        card.save(&dst, false).unwrap();

        assert_eq!(fs::read(&dst).unwrap(), TEMPLATE.as_bytes());
    }

    #[test]
    fn save_rewrites_only_modified_lines() {
        let dir = tempdir().unwrap();
        let src = write_template(dir.path());
        let dst = dir.path().join("out_run_card.dat");

        let mut card = RunCard::parse(&src).unwrap();
        card.set_option("nevents", "500");
        card.set_option("iseed", "0");
        card.save(&dst, false).unwrap();

        let out = fs::read_to_string(&dst).unwrap();
        let changed: Vec<_> = TEMPLATE
            .lines()
            .zip(out.lines())
            .filter(|(a, b)| a != b)
            .collect();
        assert_eq!(changed.len(), 1);
        assert!(changed[0].1.contains("500 = nevents"));
        assert!(changed[0].1.ends_with("! Number of unweighted events requested"));

        let reparsed = RunCard::parse(&dst).unwrap();
        assert_eq!(reparsed.get_option("nevents"), Some("500"));
        assert_eq!(reparsed.get_option("bwcutoff"), Some("15.0"));
    }

    #[test]
    fn save_refuses_existing_destination_without_force() {
        let dir = tempdir().unwrap();
        let src = write_template(dir.path());
        let dst = dir.path().join("out_run_card.dat");
        fs::write(&dst, "stale").unwrap();

        let card = RunCard::parse(&src).unwrap();
        assert!(matches!(card.save(&dst, false), Err(CardError::AlreadyExists(_))));

        card.save(&dst, true).unwrap();
        assert_eq!(fs::read_to_string(&dst).unwrap(), TEMPLATE);
    }

    #[test]
    fn save_refuses_to_overwrite_template() {
        let dir = tempdir().unwrap();
        let src = write_template(dir.path());

        let card = RunCard::parse(&src).unwrap();
        assert!(matches!(card.save(&src, true), Err(CardError::SameFile { .. })));
        assert_eq!(fs::read_to_string(&src).unwrap(), TEMPLATE);
    }

    #[test]
    fn added_keys_are_tracked_separately() {
        let mut card = RunCard::from_text(Path::new("run_card.dat"), TEMPLATE);
        card.set_option("xqcut", "30");
        assert_eq!(card.added_keys().collect::<Vec<_>>(), vec!["xqcut"]);
        assert_eq!(card.modified_keys().count(), 0);
    }
}
