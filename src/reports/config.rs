use std::path::PathBuf;
use std::sync::Arc;

use super::pdf::JpegImage;

/// Identity printed in every page header and footer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Institution {
    pub name: String,
    pub subtitle: String,
    pub location: String,
    pub tagline: String,
}

impl Default for Institution {
    fn default() -> Self {
        Self {
            name: "INSTITUTO BALLIVIÁN".to_string(),
            subtitle: "Sistema de Gestión Académica".to_string(),
            location: "La Paz - Bolivia".to_string(),
            tagline: "Instituto Ballivián - www.institutoballivian.edu.bo".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
    pub institution: Institution,
    pub logo_path: Option<PathBuf>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("storage/reports"),
            institution: Institution::default(),
            logo_path: None,
        }
    }
}

impl ReportConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        let defaults = Institution::default();
        let var = |key: &str, fallback: String| {
            std::env::var(key)
                .ok()
                .filter(|value| !value.trim().is_empty())
                .unwrap_or(fallback)
        };

        Self {
            output_dir: PathBuf::from(var("REPORTS_DIR", "storage/reports".to_string())),
            institution: Institution {
                name: var("INSTITUTION_NAME", defaults.name),
                subtitle: var("INSTITUTION_SUBTITLE", defaults.subtitle),
                location: var("INSTITUTION_LOCATION", defaults.location),
                tagline: var("INSTITUTION_TAGLINE", defaults.tagline),
            },
            logo_path: std::env::var("INSTITUTION_LOGO")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    /// Reads the configured logo. A missing or unreadable file only costs
    /// the picture: the header falls back to a monogram.
    pub async fn load_logo(&self) -> Option<Arc<JpegImage>> {
        let path = self.logo_path.as_ref()?;

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "logo not readable, using monogram");
                return None;
            }
        };

        match JpegImage::from_bytes(bytes) {
            Ok(image) => Some(Arc::new(image)),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "logo is not a usable JPEG, using monogram");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_logo_is_not_an_error() {
        let config = ReportConfig {
            logo_path: Some(PathBuf::from("/definitely/not/here.jpg")),
            ..ReportConfig::default()
        };
        assert!(config.load_logo().await.is_none());
    }

    #[tokio::test]
    async fn non_jpeg_logo_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        std::fs::write(&path, b"\x89PNG\r\n").unwrap();

        let config = ReportConfig {
            logo_path: Some(path),
            ..ReportConfig::new(dir.path())
        };
        assert!(config.load_logo().await.is_none());
    }
}
