use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Storage providers
///
/// `Own` is reserved for storage the service keeps itself (the local
/// filesystem). Objects stored under `Own` are never mirrored locally a second
/// time, and policies that demand local reads resolve their read URLs through
/// the `Own` authorizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Own,
    S3,
}

impl Provider {
    pub fn is_own(self) -> bool {
        self == Provider::Own
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Own => "own",
            Provider::S3 => "s3",
        }
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "own" | "local" => Ok(Provider::Own),
            "s3" => Ok(Provider::S3),
            _ => Err(anyhow::anyhow!("Invalid storage provider: {}", s)),
        }
    }
}

impl Display for Provider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}
