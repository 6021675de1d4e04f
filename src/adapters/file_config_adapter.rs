//! INI file configuration adapter.

use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }

    /// Drop a trailing `; comment` or `# comment` preceded by whitespace.
    fn strip_inline_comment(value: &str) -> &str {
        let cut = value
            .char_indices()
            .zip(value.chars().skip(1))
            .find(|((_, c), next)| c.is_whitespace() && (*next == ';' || *next == '#'))
            .map(|((i, _), _)| i);
        match cut {
            Some(i) => value[..i].trim_end(),
            None => value,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .get(section, key)
            .map(|v| Self::strip_inline_comment(&v).to_string())
    }
}
