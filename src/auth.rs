use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

use crate::error::{BlockersError, Result};

/// Bearer token for the Concourse API.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// Keep tokens out of logs.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

/// The fly CLI's target file, usually `~/.flyrc`.
#[derive(Debug, Default, Deserialize)]
pub struct FlyRc {
    #[serde(default)]
    targets: HashMap<String, FlyTarget>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlyTarget {
    pub api: String,
    #[serde(default = "default_team")]
    pub team: String,
    #[serde(default)]
    pub insecure: bool,
    pub token: Option<FlyToken>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlyToken {
    #[serde(rename = "type")]
    pub type_: String,
    pub value: String,
}

fn default_team() -> String {
    "main".to_string()
}

impl FlyTarget {
    pub fn token(&self) -> Option<Token> {
        self.token
            .as_ref()
            .filter(|t| !t.value.is_empty())
            .map(|t| Token::from(t.value.as_str()))
    }
}

impl FlyRc {
    /// Default location of the target file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".flyrc"))
    }

    /// Loads the target file. A missing file is an empty target list.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            return Ok(Self::default());
        };

        if !path.exists() {
            debug!("No fly target file at {}", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path)?;
        let flyrc: Self = serde_yaml::from_str(&contents)?;
        debug!(
            "Loaded {} fly targets from {}",
            flyrc.targets.len(),
            path.display()
        );
        Ok(flyrc)
    }

    /// Looks up a target by name.
    ///
    /// # Errors
    ///
    /// Returns [`BlockersError::UnknownTarget`] if no target has that name.
    pub fn target(&self, name: &str) -> Result<&FlyTarget> {
        self.targets
            .get(name)
            .ok_or_else(|| BlockersError::UnknownTarget(name.to_string()))
    }
}
