//! Temp-file previews of fetched documents

use std::fs;
use std::io::Write;

use firmador_core::Preview;

/// Writes each loaded PDF to a temporary file so it can be opened in a
/// viewer while the session is alive. The file is removed on release.
#[derive(Debug, Default)]
pub struct TempFilePreview;

impl Preview for TempFilePreview {
    fn open(&self, bytes: &[u8]) -> Result<String, String> {
        let mut file = tempfile::Builder::new()
            .prefix("firmador-")
            .suffix(".pdf")
            .tempfile()
            .map_err(|e| e.to_string())?;
        file.write_all(bytes).map_err(|e| e.to_string())?;

        let (_, path) = file.keep().map_err(|e| e.to_string())?;
        Ok(path.display().to_string())
    }

    fn release(&self, handle: &str) {
        if let Err(e) = fs::remove_file(handle) {
            tracing::warn!(path = handle, "Could not remove preview: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_preview_file_lifecycle() {
        let preview = TempFilePreview;
        let handle = preview.open(b"%PDF-1.7").unwrap();
        assert!(handle.ends_with(".pdf"));
        assert_eq!(fs::read(&handle).unwrap(), b"%PDF-1.7");

        preview.release(&handle);
        assert!(!Path::new(&handle).exists());
    }
}
