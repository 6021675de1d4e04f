//! Configuration access port.
//!
//! Sections and keys are case-insensitive. Values come back as raw text;
//! `config_validation` parses them and reports malformed ones.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    /// Trimmed value, `None` when missing or blank.
    fn get_non_empty(&self, section: &str, key: &str) -> Option<String> {
        self.get_string(section, key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}
