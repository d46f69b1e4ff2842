use super::CardError;
use super::options::OptionSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Common interface of the editable configuration cards.
///
/// A card is parsed from a template file, mutated through its options, and
/// saved to a new location as a copy of the template with only the modified
/// options rewritten.
pub trait Card: Sized {
    /// Parses the template card at `source`.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::Io`] if the template cannot be read.
    fn parse(source: &Path) -> Result<Self, CardError>;

    /// Path of the template this card was parsed from.
    fn source(&self) -> &Path;

    fn options(&self) -> &OptionSet;

    /// Sets an option, appending it if the key is new.
    fn set_option(&mut self, key: &str, value: &str);

    /// Writes the edited card to `dst`.
    ///
    /// # Arguments
    ///
    /// * `dst` - Full path of the output card, including the file name.
    /// * `force` - Overwrite `dst` if it already exists.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::AlreadyExists`] if `dst` exists and `force` is
    /// false, and [`CardError::SameFile`] if `dst` is the template itself.
    fn save(&self, dst: &Path, force: bool) -> Result<(), CardError>;

    fn has_option(&self, key: &str) -> bool {
        self.options().contains(key)
    }

    fn get_option(&self, key: &str) -> Option<&str> {
        self.options().get(key)
    }

    /// Aligned listing of every option, one per line.
    fn dump(&self) -> String {
        let ops = self.options();
        ops.iter()
            .map(|(k, v)| {
                format!(
                    "{:>kw$} = {:<vw$}",
                    k,
                    v,
                    kw = ops.key_width(),
                    vw = ops.value_width()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Copies the template `src` to `dst`, honouring the overwrite rules of [`Card::save`].
pub(crate) fn copy_template(src: &Path, dst: &Path, force: bool) -> Result<(), CardError> {
    if dst.exists() {
        if !dst.is_file() {
            return Err(CardError::NotAFile(dst.to_path_buf()));
        }
        if fs::canonicalize(src)? == fs::canonicalize(dst)? {
            return Err(CardError::SameFile {
                src: src.to_path_buf(),
                dst: dst.to_path_buf(),
            });
        }
        if !force {
            return Err(CardError::AlreadyExists(dst.to_path_buf()));
        }
        info!("Removing existing file {}", dst.display());
        fs::remove_file(dst)?;
    }
    debug!("Copying {} to {}", src.display(), dst.display());
    fs::copy(src, dst)?;
    Ok(())
}
