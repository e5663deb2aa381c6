use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Storage provider kinds
///
/// This enum names the available storage backends. It lives in core because
/// it's used by configuration as well as the provider factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    Local,
    S3,
    Dropbox,
    GoogleDrive,
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(ProviderKind::Local),
            "s3" => Ok(ProviderKind::S3),
            "dropbox" => Ok(ProviderKind::Dropbox),
            "google-drive" | "google_drive" | "gdrive" => Ok(ProviderKind::GoogleDrive),
            _ => Err(anyhow::anyhow!("Unsupported storage provider: {}", s)),
        }
    }
}

impl Display for ProviderKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ProviderKind::Local => write!(f, "local"),
            ProviderKind::S3 => write!(f, "s3"),
            ProviderKind::Dropbox => write!(f, "dropbox"),
            ProviderKind::GoogleDrive => write!(f, "google-drive"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases() {
        assert_eq!(
            "gdrive".parse::<ProviderKind>().unwrap(),
            ProviderKind::GoogleDrive
        );
        assert_eq!(
            "google_drive".parse::<ProviderKind>().unwrap(),
            ProviderKind::GoogleDrive
        );
        assert_eq!("S3".parse::<ProviderKind>().unwrap(), ProviderKind::S3);
        assert!("ftp".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn display_round_trips() {
        for kind in [
            ProviderKind::Local,
            ProviderKind::S3,
            ProviderKind::Dropbox,
            ProviderKind::GoogleDrive,
        ] {
            assert_eq!(kind.to_string().parse::<ProviderKind>().unwrap(), kind);
        }
    }
}
