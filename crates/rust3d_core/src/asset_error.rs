//! Asset error types
//!
//! Errors for reading mesh sources from disk. Parsing itself never fails; see
//! [`ObjLoader`](crate::ObjLoader).

use std::io;
use std::fmt;

/// Error type for asset operations
#[derive(Debug)]
pub enum AssetError {
    /// IO error (file not found, permission denied, etc.)
    Io(io::Error),
    /// The file exists but is not usable text
    Parse(String),
    /// Asset path does not exist
    NotFound(String),
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::Io(err) => write!(f, "Asset IO error: {}", err),
            AssetError::Parse(msg) => write!(f, "Asset parse error: {}", msg),
            AssetError::NotFound(path) => write!(f, "Asset not found: {}", path),
        }
    }
}

impl std::error::Error for AssetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AssetError::Io(err) => Some(err),
            AssetError::Parse(_) => None,
            AssetError::NotFound(_) => None,
        }
    }
}

impl From<io::Error> for AssetError {
    fn from(err: io::Error) -> Self {
        AssetError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_io_error_display() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let msg = format!("{}", AssetError::Io(io_err));
        assert!(msg.contains("IO error"));
        assert!(msg.contains("access denied"));
    }

    #[test]
    fn test_not_found_display() {
        let err = AssetError::NotFound("assets/teapot.obj".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("not found"));
        assert!(msg.contains("assets/teapot.obj"));
    }

    #[test]
    fn test_error_source() {
        let io_err = io::Error::new(io::ErrorKind::Other, "boom");
        assert!(AssetError::Io(io_err).source().is_some());
        assert!(AssetError::Parse("binary data".into()).source().is_none());
    }

    #[test]
    fn test_from_io_error() {
        let err: AssetError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, AssetError::Io(e) if e.kind() == io::ErrorKind::NotFound));
    }
}
