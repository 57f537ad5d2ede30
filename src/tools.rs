use crate::error::MapError;
use crate::process::{CommandSpec, ProcessRunner, StdoutSink};
use log::info;

pub const MINIMAP2: &str = "minimap2";
pub const SAMTOOLS: &str = "samtools";

/// Environment variable overriding the minimap2 executable
pub const MINIMAP2_PATH_VAR: &str = "MINIMAP2_PATH";
/// Environment variable overriding the samtools executable
pub const SAMTOOLS_PATH_VAR: &str = "SAMTOOLS_PATH";

/// Locations of the external executables. Each is a path or a bare name
/// resolved through `PATH`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolPaths {
    pub minimap2: String,
    pub samtools: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        ToolPaths {
            minimap2: MINIMAP2.to_string(),
            samtools: SAMTOOLS.to_string(),
        }
    }
}

impl ToolPaths {
    /// Read `MINIMAP2_PATH` / `SAMTOOLS_PATH`, falling back to the bare names.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        ToolPaths {
            minimap2: pick(MINIMAP2_PATH_VAR, MINIMAP2),
            samtools: pick(SAMTOOLS_PATH_VAR, SAMTOOLS),
        }
    }

    fn iter(&self) -> [(&'static str, &str); 2] {
        [(MINIMAP2, &self.minimap2), (SAMTOOLS, &self.samtools)]
    }
}

/// Make sure both tools can be launched and answer `--version`. Call once at
/// startup, before any mapping job.
pub fn check_tools(tools: &ToolPaths, runner: &dyn ProcessRunner) -> Result<(), MapError> {
    for (tool, path) in tools.iter() {
        let cmd = CommandSpec::new(path).arg("--version");
        let output = runner
            .run(&cmd, &StdoutSink::Capture)
            .map_err(|source| MapError::ToolUnavailable {
                tool,
                path: path.to_string(),
                source,
            })?;

        if !output.success() {
            return Err(MapError::ToolBroken {
                tool,
                path: path.to_string(),
                code: output.code,
                stderr: output.stderr,
            });
        }

        let version = output
            .stdout
            .lines()
            .next()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or("unknown version");
        info!("Found {} at {} ({})", tool, path, version);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessOutput;
    use std::collections::HashMap;
    use std::io;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeRunner {
        missing: Vec<&'static str>,
        broken: Vec<&'static str>,
        calls: Mutex<Vec<CommandSpec>>,
    }

    impl ProcessRunner for FakeRunner {
        fn run(&self, cmd: &CommandSpec, _stdout: &StdoutSink) -> io::Result<ProcessOutput> {
            self.calls.lock().unwrap().push(cmd.clone());
            if self.missing.iter().any(|m| *m == cmd.program) {
                return Err(io::Error::new(io::ErrorKind::NotFound, "No such file"));
            }
            if self.broken.iter().any(|b| *b == cmd.program) {
                return Ok(ProcessOutput {
                    code: Some(127),
                    stdout: String::new(),
                    stderr: "error while loading shared libraries: libz.so.1".to_string(),
                });
            }
            Ok(ProcessOutput {
                code: Some(0),
                stdout: "2.28-r1209\n".to_string(),
                stderr: String::new(),
            })
        }
    }

    #[test]
    fn test_defaults_without_overrides() {
        let tools = ToolPaths::from_lookup(|_| None);
        assert_eq!(tools, ToolPaths::default());
        assert_eq!(tools.minimap2, "minimap2");
        assert_eq!(tools.samtools, "samtools");
    }

    #[test]
    fn test_overrides_from_lookup() {
        let env: HashMap<&str, &str> = [
            (MINIMAP2_PATH_VAR, "/opt/mm2/minimap2"),
            (SAMTOOLS_PATH_VAR, ""),
        ]
        .into_iter()
        .collect();
        let tools = ToolPaths::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(tools.minimap2, "/opt/mm2/minimap2");
        // An empty override falls back to the bare name
        assert_eq!(tools.samtools, "samtools");
    }

    #[test]
    fn test_check_tools_passes_when_both_launch() {
        let runner = FakeRunner::default();
        check_tools(&ToolPaths::default(), &runner).unwrap();
        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.args == vec!["--version".to_string()]));
    }

    #[test]
    fn test_check_tools_names_missing_tool_and_path() {
        let tools = ToolPaths {
            minimap2: "minimap2".to_string(),
            samtools: "/nowhere/samtools".to_string(),
        };
        let runner = FakeRunner {
            missing: vec!["/nowhere/samtools"],
            ..Default::default()
        };
        let err = check_tools(&tools, &runner).unwrap_err();
        match &err {
            MapError::ToolUnavailable { tool, path, .. } => {
                assert_eq!(*tool, "samtools");
                assert_eq!(path, "/nowhere/samtools");
            }
            other => panic!("Expected ToolUnavailable, got {other:?}"),
        }
        assert!(err
            .to_string()
            .starts_with("samtools not found at location \"/nowhere/samtools\""));
    }

    #[test]
    fn test_check_tools_rejects_tool_failing_version() {
        let runner = FakeRunner {
            broken: vec!["minimap2"],
            ..Default::default()
        };
        let err = check_tools(&ToolPaths::default(), &runner).unwrap_err();
        match err {
            MapError::ToolBroken {
                tool,
                path,
                code,
                stderr,
            } => {
                assert_eq!(tool, "minimap2");
                assert_eq!(path, "minimap2");
                assert_eq!(code, Some(127));
                assert!(stderr.contains("libz.so.1"));
            }
            other => panic!("Expected ToolBroken, got {other:?}"),
        }
        // samtools is not checked once minimap2 has failed
        assert_eq!(runner.calls.lock().unwrap().len(), 1);
    }
}
