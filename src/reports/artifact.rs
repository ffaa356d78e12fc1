use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use uuid::Uuid;

/// `<slug>_<YYYYMMDD_HHMMSS_mmm>_<8 hex>.pdf`. The random suffix keeps two
/// generations within the same millisecond apart.
pub fn artifact_file_name(slug: &str, generated_at: NaiveDateTime) -> String {
    let stamp = generated_at.format("%Y%m%d_%H%M%S_%3f");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{slug}_{stamp}_{}.pdf", &suffix[..8])
}

/// Writes the bytes under `dir`, creating it if needed. The file only
/// appears under its final name once completely written.
pub async fn persist(dir: &Path, file_name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;

    let final_path = dir.join(file_name);
    let temp_path = dir.join(format!(".{file_name}.partial"));

    let written = async {
        tokio::fs::write(&temp_path, bytes).await?;
        tokio::fs::rename(&temp_path, &final_path).await
    }
    .await;

    if let Err(err) = written {
        if let Err(cleanup) = tokio::fs::remove_file(&temp_path).await {
            tracing::debug!(path = %temp_path.display(), error = %cleanup, "partial artifact not removed");
        }
        return Err(err);
    }

    Ok(final_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_milli_opt(9, 5, 7, 42)
            .unwrap()
    }

    #[test]
    fn file_name_embeds_kind_and_timestamp() {
        let name = artifact_file_name("estudiantes", at());
        assert!(name.starts_with("estudiantes_20250301_090507_042_"));
        assert!(name.ends_with(".pdf"));
        assert_eq!(name.len(), "estudiantes_20250301_090507_042_".len() + 8 + 4);
    }

    #[test]
    fn same_instant_yields_distinct_names() {
        assert_ne!(artifact_file_name("notas", at()), artifact_file_name("notas", at()));
    }

    #[tokio::test]
    async fn persist_creates_directory_and_leaves_no_partial() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("reports");

        let path = persist(&target, "a.pdf", b"%PDF-1.5").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.5");

        let entries: Vec<_> = std::fs::read_dir(&target).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn failed_write_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        assert!(persist(&blocker, "a.pdf", b"data").await.is_err());
    }
}
