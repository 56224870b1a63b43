use log::info;
use std::io;
use std::path::{Path, PathBuf};

const OUTPUT_DIR_NAME: &str = "glhe_output";

/// `<platform data dir>/glhe_output`, or `./glhe_output` when the platform has none.
pub fn default_output_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(OUTPUT_DIR_NAME)
}

/// Creates `path` (and parents) unless it already is a directory.
pub async fn ensure_dir_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => {
            if !metadata.is_dir() {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("Path exists but is not a directory: {}", path.display()),
                ));
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Creating directory: {}", path.display());
            tokio::fs::create_dir_all(path).await
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_dir_exists() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let nested = dir.path().join("a").join("b");
        ensure_dir_exists(&nested).await?;
        assert!(nested.is_dir());
        // Idempotent.
        ensure_dir_exists(&nested).await?;

        let file = dir.path().join("file.txt");
        tokio::fs::write(&file, "x").await?;
        assert!(ensure_dir_exists(&file).await.is_err());
        Ok(())
    }

    #[test]
    fn test_default_output_root_name() {
        assert!(default_output_root().ends_with("glhe_output"));
    }
}
