use std::sync::Arc;

/// Fieldless error code. Every `LoadError` maps to exactly one of these, which is what callers and
/// script-hosted handlers compare against.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NoLoader,
    ImporterMissing,
    LoadFailed,
    RemapFailed,
    AlreadyInProgress,
    NotImported,
    CantOpen,
    FileCorrupt,
    LoaderListFull,
    AlreadyRegistered,
    InvalidScript,
    InvalidConfiguration,
    Io,
    Json,
    Other,
}

impl ErrorKind {
    const ALL: [ErrorKind; 15] = [
        ErrorKind::NoLoader,
        ErrorKind::ImporterMissing,
        ErrorKind::LoadFailed,
        ErrorKind::RemapFailed,
        ErrorKind::AlreadyInProgress,
        ErrorKind::NotImported,
        ErrorKind::CantOpen,
        ErrorKind::FileCorrupt,
        ErrorKind::LoaderListFull,
        ErrorKind::AlreadyRegistered,
        ErrorKind::InvalidScript,
        ErrorKind::InvalidConfiguration,
        ErrorKind::Io,
        ErrorKind::Json,
        ErrorKind::Other,
    ];

    /// Integer code used when crossing the script bridge. 0 is reserved for "no error".
    pub fn code(self) -> i64 {
        Self::ALL
            .iter()
            .position(|x| *x == self)
            .map(|x| x as i64 + 1)
            .unwrap_or(0)
    }

    /// Inverse of `code()`. Returns None for 0 (success) and for unknown codes.
    pub fn from_code(code: i64) -> Option<ErrorKind> {
        if code <= 0 {
            return None;
        }

        Self::ALL.get((code - 1) as usize).copied()
    }
}

#[derive(Debug, Clone)]
pub enum LoadError {
    // No registered format loader recognized the path
    NoLoader(String),
    // An .import sidecar names an importer that isn't registered
    ImporterMissing { path: String, importer: String },
    // At least one loader recognized the path but none produced a resource
    LoadFailed {
        path: String,
        cause: Option<Box<LoadError>>,
    },
    RemapFailed(String),
    // The same thread is already loading this path
    AlreadyInProgress(String),
    NotImported(String),
    CantOpen(String),
    FileCorrupt {
        path: String,
        line: usize,
        message: String,
    },
    LoaderListFull(usize),
    AlreadyRegistered(String),
    InvalidScript(String),
    InvalidConfiguration(String),
    IoError(Arc<std::io::Error>),
    JsonError(Arc<serde_json::Error>),
    StringError(String),
}

impl LoadError {
    pub fn kind(&self) -> ErrorKind {
        match *self {
            LoadError::NoLoader(_) => ErrorKind::NoLoader,
            LoadError::ImporterMissing { .. } => ErrorKind::ImporterMissing,
            LoadError::LoadFailed { .. } => ErrorKind::LoadFailed,
            LoadError::RemapFailed(_) => ErrorKind::RemapFailed,
            LoadError::AlreadyInProgress(_) => ErrorKind::AlreadyInProgress,
            LoadError::NotImported(_) => ErrorKind::NotImported,
            LoadError::CantOpen(_) => ErrorKind::CantOpen,
            LoadError::FileCorrupt { .. } => ErrorKind::FileCorrupt,
            LoadError::LoaderListFull(_) => ErrorKind::LoaderListFull,
            LoadError::AlreadyRegistered(_) => ErrorKind::AlreadyRegistered,
            LoadError::InvalidScript(_) => ErrorKind::InvalidScript,
            LoadError::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
            LoadError::IoError(_) => ErrorKind::Io,
            LoadError::JsonError(_) => ErrorKind::Json,
            LoadError::StringError(_) => ErrorKind::Other,
        }
    }

    /// Builds an error from a code returned by a script-hosted handler. Unknown codes become
    /// `LoadFailed`.
    pub fn from_kind(
        kind: ErrorKind,
        path: &str,
    ) -> LoadError {
        let path = path.to_string();
        match kind {
            ErrorKind::NoLoader => LoadError::NoLoader(path),
            ErrorKind::ImporterMissing => LoadError::ImporterMissing {
                path,
                importer: String::default(),
            },
            ErrorKind::RemapFailed => LoadError::RemapFailed(path),
            ErrorKind::AlreadyInProgress => LoadError::AlreadyInProgress(path),
            ErrorKind::NotImported => LoadError::NotImported(path),
            ErrorKind::CantOpen => LoadError::CantOpen(path),
            ErrorKind::FileCorrupt => LoadError::FileCorrupt {
                path,
                line: 0,
                message: String::default(),
            },
            ErrorKind::InvalidScript => LoadError::InvalidScript(path),
            _ => LoadError::LoadFailed { path, cause: None },
        }
    }

    /// Errors that stop the loader registry from trying the next matching loader. Everything else
    /// lets dispatch fall through to lower priority loaders.
    pub fn aborts_dispatch(&self) -> bool {
        matches!(self, LoadError::ImporterMissing { .. })
    }

    /// For `LoadFailed`, the error the handler reported. Otherwise self.
    pub fn root_cause(&self) -> &LoadError {
        match self {
            LoadError::LoadFailed {
                cause: Some(cause), ..
            } => cause.root_cause(),
            _ => self,
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            LoadError::LoadFailed {
                cause: Some(ref e), ..
            } => Some(&**e),
            LoadError::IoError(ref e) => Some(&**e),
            LoadError::JsonError(ref e) => Some(&**e),
            _ => None,
        }
    }
}

impl core::fmt::Display for LoadError {
    fn fmt(
        &self,
        fmt: &mut core::fmt::Formatter,
    ) -> core::fmt::Result {
        match *self {
            LoadError::NoLoader(ref path) => write!(fmt, "No loader found for resource: {}", path),
            LoadError::ImporterMissing {
                ref path,
                ref importer,
            } => write!(
                fmt,
                "Importer '{}' named by the import file of {} is not registered",
                importer, path
            ),
            LoadError::LoadFailed {
                ref path,
                ref cause,
            } => match cause {
                Some(cause) => write!(fmt, "Failed loading resource: {} ({})", path, cause),
                None => write!(fmt, "Failed loading resource: {}", path),
            },
            LoadError::RemapFailed(ref path) => write!(fmt, "Could not remap path {}", path),
            LoadError::AlreadyInProgress(ref path) => write!(
                fmt,
                "Resource '{}' is already being loaded. Cyclic reference?",
                path
            ),
            LoadError::NotImported(ref path) => write!(fmt, "{} has not been imported", path),
            LoadError::CantOpen(ref path) => write!(fmt, "Can't open {}", path),
            LoadError::FileCorrupt {
                ref path,
                line,
                ref message,
            } => write!(fmt, "Parse error: {}:{} error: {}.", path, line, message),
            LoadError::LoaderListFull(capacity) => {
                write!(fmt, "Format loader list is full ({} loaders)", capacity)
            }
            LoadError::AlreadyRegistered(ref e) => write!(fmt, "Already registered: {}", e),
            LoadError::InvalidScript(ref e) => write!(fmt, "Invalid script: {}", e),
            LoadError::InvalidConfiguration(ref e) => write!(fmt, "Invalid configuration: {}", e),
            LoadError::IoError(ref e) => e.fmt(fmt),
            LoadError::JsonError(ref e) => e.fmt(fmt),
            LoadError::StringError(ref e) => e.fmt(fmt),
        }
    }
}

impl From<&str> for LoadError {
    fn from(str: &str) -> Self {
        LoadError::StringError(str.to_string())
    }
}

impl From<String> for LoadError {
    fn from(string: String) -> Self {
        LoadError::StringError(string)
    }
}

impl From<std::io::Error> for LoadError {
    fn from(error: std::io::Error) -> Self {
        LoadError::IoError(Arc::new(error))
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(error: serde_json::Error) -> Self {
        LoadError::JsonError(Arc::new(error))
    }
}

pub type LoadResult<T> = Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_round_trip() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ErrorKind::from_code(0), None);
        assert_eq!(ErrorKind::from_code(1000), None);
    }

    #[test]
    fn root_cause_unwraps_load_failed() {
        let error = LoadError::LoadFailed {
            path: "res://a.png".to_string(),
            cause: Some(Box::new(LoadError::NotImported("res://a.png".to_string()))),
        };
        assert_eq!(error.kind(), ErrorKind::LoadFailed);
        assert_eq!(error.root_cause().kind(), ErrorKind::NotImported);
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn only_missing_importer_aborts_dispatch() {
        assert!(LoadError::ImporterMissing {
            path: "res://a.obj".to_string(),
            importer: "obj".to_string()
        }
        .aborts_dispatch());
        assert!(!LoadError::NotImported("res://a.obj".to_string()).aborts_dispatch());
        assert!(!LoadError::CantOpen("res://a.obj".to_string()).aborts_dispatch());
    }
}
