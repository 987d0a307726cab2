//! PEM handling - config values are either inline PEM data or a file path.

use log::debug;

pub(super) fn is_pem_file_path(s: &str) -> bool {
    !s.trim_start().starts_with("-----BEGIN")
}

/// Resolve a PEM config value to its bytes, reading the file if it is a path.
pub fn load_pem(value: &str) -> std::io::Result<Vec<u8>> {
    if !is_pem_file_path(value) {
        return Ok(value.as_bytes().to_vec());
    }
    debug!("Reading PEM file: {value}");
    std::fs::read(value).map_err(|e| {
        std::io::Error::new(e.kind(), format!("Failed to read PEM file '{value}': {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_pem() {
        let inline = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n";
        assert!(!is_pem_file_path(inline));
        assert_eq!(load_pem(inline).unwrap(), inline.as_bytes());
    }

    #[test]
    fn test_pem_file() {
        let path = std::env::temp_dir().join(format!("synctls-pem-{}.pem", std::process::id()));
        std::fs::write(&path, b"pem contents").unwrap();
        let path_str = path.to_str().unwrap();
        assert!(is_pem_file_path(path_str));
        assert_eq!(load_pem(path_str).unwrap(), b"pem contents");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_pem_file() {
        let err = load_pem("/nonexistent/synctls/missing.pem").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
        assert!(err.to_string().contains("missing.pem"));
    }
}
