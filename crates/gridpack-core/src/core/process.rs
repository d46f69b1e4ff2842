use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Directory, relative to the card directory, that holds all template-card sets.
pub const TEMPLATE_ROOT: &str = "template_cards";
pub const TEMPLATE_RUN_CARD: &str = "run_card.dat";
pub const TEMPLATE_CUSTOMIZE_CARD: &str = "customizecards.dat";

const FLAVOR_KEY: &str = "maxjetflavor";

/// A physics process that can be turned into gridpack jobs.
///
/// `name` is what job identifiers carry, `limits_name` is the prefix used when
/// looking up coefficient ranges in the limits table, and `template_dir` points
/// at the set of template cards the job instance is materialized from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDefinition {
    name: String,
    limits_name: String,
    process_card: String,
    template_dir: PathBuf,
}

impl ProcessDefinition {
    pub fn new(
        name: impl Into<String>,
        limits_name: impl Into<String>,
        process_card: impl Into<String>,
        template_subdir: impl AsRef<Path>,
    ) -> Self {
        Self {
            name: name.into(),
            limits_name: limits_name.into(),
            process_card: process_card.into(),
            template_dir: Path::new(TEMPLATE_ROOT).join(template_subdir),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn limits_name(&self) -> &str {
        &self.limits_name
    }

    pub fn process_card(&self) -> &str {
        &self.process_card
    }

    /// Template directory relative to the card directory.
    pub fn template_dir(&self) -> &Path {
        &self.template_dir
    }

    pub fn run_card_template(&self, card_dir: &Path) -> PathBuf {
        card_dir.join(&self.template_dir).join(TEMPLATE_RUN_CARD)
    }

    pub fn customize_card_template(&self, card_dir: &Path) -> PathBuf {
        card_dir.join(&self.template_dir).join(TEMPLATE_CUSTOMIZE_CARD)
    }

    /// Reads the `maxjetflavor` setting from the template run card.
    ///
    /// Returns `Ok(None)` when the card does not set it.
    pub fn flavor_scheme(&self, card_dir: &Path) -> io::Result<Option<u32>> {
        let text = fs::read_to_string(self.run_card_template(card_dir))?;
        Ok(parse_flavor_scheme(&text))
    }
}

fn parse_flavor_scheme(text: &str) -> Option<u32> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter(|l| l.contains(FLAVOR_KEY))
        .find_map(|l| {
            let (value, _) = l.split_once('=')?;
            value.trim().parse().ok()
        })
}
