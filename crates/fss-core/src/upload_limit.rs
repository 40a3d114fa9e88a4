use serde::{Deserialize, Serialize};

/// How the extension list of an [`UploadLimit`] is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionMode {
    /// Only the listed extensions may be uploaded.
    #[default]
    Allowed,
    /// Every extension except the listed ones may be uploaded.
    Rejected,
}

/// Extension restrictions applied to uploads of one content type.
///
/// An empty extension list places no restriction, whatever the mode.
/// Extensions are stored without the leading dot and compared ignoring ASCII case.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "RawUploadLimit")]
pub struct UploadLimit {
    extensions: Vec<String>,
    mode: ExtensionMode,
}

#[derive(Deserialize)]
struct RawUploadLimit {
    #[serde(default)]
    extensions: Vec<String>,
    #[serde(default)]
    mode: ExtensionMode,
}

impl From<RawUploadLimit> for UploadLimit {
    fn from(raw: RawUploadLimit) -> Self {
        Self::new(raw.extensions, raw.mode)
    }
}

impl UploadLimit {
    pub fn new<I, S>(extensions: I, mode: ExtensionMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.into().trim().trim_start_matches('.').to_string())
                .filter(|e| !e.is_empty())
                .collect(),
            mode,
        }
    }

    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn allowing<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(extensions, ExtensionMode::Allowed)
    }

    pub fn rejecting<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(extensions, ExtensionMode::Rejected)
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn mode(&self) -> ExtensionMode {
        self.mode
    }

    pub fn is_unrestricted(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Whether a file with `extension` (no leading dot, may be empty) may be uploaded.
    pub fn permits(&self, extension: &str) -> bool {
        if self.is_unrestricted() {
            return true;
        }
        let listed = self
            .extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension));
        match self.mode {
            ExtensionMode::Allowed => listed,
            ExtensionMode::Rejected => !listed,
        }
    }
}
