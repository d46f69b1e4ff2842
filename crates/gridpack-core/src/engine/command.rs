use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("I/O error while running '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// A fully specified external command: program, positional arguments and working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl Invocation {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Seam between job configuration and the external generation scripts.
///
/// A launched command counts as submitted; exit codes are reported but never
/// interpreted, since the outcome of a job is only learned by polling its
/// artifacts later.
pub trait CommandRunner {
    /// Runs the command to completion and returns its stdout lines.
    fn run(&self, invocation: &Invocation) -> Result<Vec<String>, CommandError>;

    /// Starts the command in the background with stdout and stderr sent to `log_path`.
    fn spawn_detached(&self, invocation: &Invocation, log_path: &Path) -> Result<(), CommandError>;
}

/// Runs commands as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<Vec<String>, CommandError> {
        let program = invocation.program.clone();
        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|source| CommandError::Spawn {
                program: program.clone(),
                source,
            })?;

        let mut lines = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines() {
                let line = line.map_err(|source| CommandError::Io {
                    program: program.clone(),
                    source,
                })?;
                let line = line.trim().to_string();
                info!("{}", line);
                lines.push(line);
            }
        }

        let status = child
            .wait()
            .map_err(|source| CommandError::Io { program, source })?;
        if !status.success() {
            warn!("'{}' exited with {}", invocation, status);
        }
        Ok(lines)
    }

    fn spawn_detached(&self, invocation: &Invocation, log_path: &Path) -> Result<(), CommandError> {
        let io_err = |source| CommandError::Io {
            program: invocation.program.clone(),
            source,
        };
        let log = File::create(log_path).map_err(io_err)?;
        let log_err = log.try_clone().map_err(io_err)?;
        Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdout(log)
            .stderr(log_err)
            .spawn()
            .map_err(|source| CommandError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;

    type Hook = Box<dyn Fn(&Invocation)>;

    /// Records every invocation instead of running it.
    #[derive(Default)]
    pub(crate) struct RecordingRunner {
        pub(crate) calls: RefCell<Vec<Invocation>>,
        pub(crate) detached: RefCell<Vec<(Invocation, PathBuf)>>,
        hook: Option<Hook>,
    }

    impl RecordingRunner {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// Runs `hook` on every invocation, e.g. to fake the artifacts a script would produce.
        pub(crate) fn with_hook(hook: impl Fn(&Invocation) + 'static) -> Self {
            Self {
                hook: Some(Box::new(hook)),
                ..Self::default()
            }
        }

        pub(crate) fn programs(&self) -> Vec<String> {
            let mut out: Vec<String> = self.calls.borrow().iter().map(|c| c.program.clone()).collect();
            out.extend(self.detached.borrow().iter().map(|(c, _)| c.program.clone()));
            out
        }
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, invocation: &Invocation) -> Result<Vec<String>, CommandError> {
            if let Some(hook) = &self.hook {
                hook(invocation);
            }
            self.calls.borrow_mut().push(invocation.clone());
            Ok(Vec::new())
        }

        fn spawn_detached(&self, invocation: &Invocation, log_path: &Path) -> Result<(), CommandError> {
            if let Some(hook) = &self.hook {
                hook(invocation);
            }
            self.detached
                .borrow_mut()
                .push((invocation.clone(), log_path.to_path_buf()));
            Ok(())
        }
    }
}
