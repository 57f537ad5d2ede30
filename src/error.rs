use std::io;
use std::path::PathBuf;

/// Errors raised while checking tools or running the mapping pipeline.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("{tool} not found at location \"{path}\": {source}")]
    ToolUnavailable {
        tool: &'static str,
        path: String,
        source: io::Error,
    },

    #[error("{tool} at \"{path}\" is not usable (--version exited with {}): {stderr}", describe_code(.code))]
    ToolBroken {
        tool: &'static str,
        path: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{role} file not found: {}", .path.display())]
    MissingInput { role: &'static str, path: PathBuf },

    #[error("failed to launch {stage} ({program}): {source}")]
    Spawn {
        stage: String,
        program: String,
        source: io::Error,
    },

    #[error("{stage} exited with {}:\n{stderr}", describe_code(.code))]
    StageFailed {
        stage: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("I/O error: {source} ({})", .path.display())]
    Io { source: io::Error, path: PathBuf },
}

impl MapError {
    /// Wrap an `io::Error` with the path it concerns.
    pub fn io(source: io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: path.into(),
        }
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

impl From<MapError> for io::Error {
    fn from(err: MapError) -> Self {
        let kind = match &err {
            MapError::ToolUnavailable { .. } | MapError::MissingInput { .. } => {
                io::ErrorKind::NotFound
            }
            MapError::Io { source, .. } | MapError::Spawn { source, .. } => source.kind(),
            MapError::ToolBroken { .. } | MapError::StageFailed { .. } => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_failed_message_carries_stderr() {
        let err = MapError::StageFailed {
            stage: "minimap2".to_string(),
            code: Some(1),
            stderr: "[ERROR] failed to open file".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("minimap2 exited with status 1"));
        assert!(msg.contains("[ERROR] failed to open file"));
    }

    #[test]
    fn test_signal_termination_message() {
        let err = MapError::StageFailed {
            stage: "samtools sort".to_string(),
            code: None,
            stderr: String::new(),
        };
        assert!(err.to_string().contains("terminated by signal"));
    }

    #[test]
    fn test_tool_broken_message() {
        let err = MapError::ToolBroken {
            tool: "minimap2",
            path: "/opt/minimap2".to_string(),
            code: Some(127),
            stderr: "error while loading shared libraries".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "minimap2 at \"/opt/minimap2\" is not usable (--version exited with status 127): \
             error while loading shared libraries"
        );
    }

    #[test]
    fn test_into_io_error_keeps_kind() {
        let err = MapError::MissingInput {
            role: "reads",
            path: PathBuf::from("missing.fq"),
        };
        let io_err: io::Error = err.into();
        assert_eq!(io_err.kind(), io::ErrorKind::NotFound);
        assert!(io_err.to_string().contains("reads file not found: missing.fq"));
    }
}
