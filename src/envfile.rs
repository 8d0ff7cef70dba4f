//! Parsing of the bot's `.env` file.
//!
//! The format is the usual dotenv subset: `KEY=VALUE` per line, blank lines
//! and `#` comments ignored, an optional leading `export `, and matching
//! single or double quotes stripped from the value.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{DeployError, Result};

/// Key/value pairs read from an env file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvFile {
    vars: BTreeMap<String, String>,
}

impl EnvFile {
    /// Read and parse `path`.
    ///
    /// Returns `DeployError::MissingEnvFile` (with `example` as the suggested
    /// template) when the file does not exist.
    pub fn load(path: &Path, example: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(DeployError::MissingEnvFile {
                path: path.to_path_buf(),
                example: example.to_path_buf(),
            });
        }
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut vars = BTreeMap::new();

        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.strip_prefix("export ").map_or(line, str::trim_start);

            let Some((key, value)) = line.split_once('=') else {
                return Err(DeployError::validation(format!(
                    "env file line {}: expected KEY=VALUE",
                    index + 1
                )));
            };

            let key = key.trim();
            if key.is_empty()
                || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                || key.starts_with(|c: char| c.is_ascii_digit())
            {
                return Err(DeployError::validation(format!(
                    "env file line {}: invalid variable name {:?}",
                    index + 1,
                    key
                )));
            }

            vars.insert(key.to_string(), unquote(value.trim()).to_string());
        }

        Ok(Self { vars })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Required keys that are absent or set to an empty value, in input order
    pub fn missing_keys<'a, I>(&self, required: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        required
            .into_iter()
            .filter(|key| self.get(key).is_none_or(str::is_empty))
            .cloned()
            .collect()
    }
}

/// Strip one pair of matching quotes; otherwise drop a trailing ` # comment`
fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    match value.find(" #") {
        Some(pos) => value[..pos].trim_end(),
        None => value,
    }
}
