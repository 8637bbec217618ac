//! Toolchain invocation.
//!
//! Runs `go build` for one candidate and its bridge. Dependencies are taken
//! from the vendor directory only (`-mod=vendor`); the invoker never lets the
//! toolchain reach the network.
//!
//! Known limitation: the toolchain looks for `go.mod` and `vendor/` from the
//! candidate's directory upwards, not from the entrypoint's directory. A tree
//! whose module root is not an ancestor of the lambda directories will not
//! resolve its vendored packages.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::errors::CompileError;
use crate::build::Cancellation;
use crate::error::{Error, Result};
use crate::provision::GoEnv;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Invokes the `go` toolchain with a provisioned environment.
#[derive(Debug, Clone)]
pub struct GoCompiler {
    go: PathBuf,
    env: Arc<GoEnv>,
}

impl GoCompiler {
    pub fn new(go: impl Into<PathBuf>, env: Arc<GoEnv>) -> Self {
        Self { go: go.into(), env }
    }

    /// The command line for one candidate, without spawning it.
    pub fn command(&self, binary_path: &Path, bridge: &Path, candidate: &Path, cwd: &Path) -> Command {
        let mut cmd = Command::new(&self.go);
        cmd.arg("build")
            .arg("-mod=vendor")
            .arg("-o")
            .arg(binary_path)
            .arg(bridge)
            .arg(candidate)
            .current_dir(cwd);
        self.env.apply(&mut cmd);
        cmd
    }

    /// Compile `bridge` and `candidate` into `binary_path`.
    ///
    /// The process is polled and killed as soon as `cancel` reports that the
    /// build should stop.
    ///
    /// # Errors
    /// - [`Error::Compile`] if the toolchain exits with a non-zero status
    /// - the cancellation error if the build was stopped
    /// - [`Error::Io`] if the toolchain cannot be spawned
    pub fn compile(
        &self,
        binary_path: &Path,
        bridge: &Path,
        candidate: &Path,
        cwd: &Path,
        cancel: &Cancellation,
    ) -> Result<()> {
        cancel.check()?;

        let mut cmd = self.command(binary_path, bridge, candidate, cwd);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Own process group, so cancellation reaches the compile and link steps too
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        tracing::debug!(
            go = %self.go.display(),
            output = %binary_path.display(),
            cwd = %cwd.display(),
            "running go build"
        );

        let start = Instant::now();
        let mut child = cmd.spawn()?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if let Err(e) = cancel.check() {
                kill(&mut child);
                // Reader threads are left to finish when the pipes close
                return Err(e);
            }
            thread::sleep(POLL_INTERVAL);
        };

        let mut output = join(stdout);
        output.push_str(&join(stderr));

        tracing::debug!(
            status = ?status.code(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "go build finished"
        );
        if !output.trim().is_empty() {
            tracing::debug!(output = %output.trim_end(), "go build output");
        }

        if !status.success() {
            return Err(Error::Compile(CompileError::new(status.code(), output)));
        }

        Ok(())
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn join(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

fn kill(child: &mut Child) {
    #[cfg(unix)]
    {
        // SIGKILL the whole group led by the toolchain process
        let pgid = child.id() as libc::pid_t;
        if unsafe { libc::kill(-pgid, libc::SIGKILL) } != 0 {
            tracing::warn!(
                "failed to kill go build: {}",
                std::io::Error::last_os_error()
            );
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = child.kill() {
            tracing::warn!("failed to kill go build: {}", e);
        }
    }

    let _ = child.wait();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::build::AbortHandle;
    use crate::compile::GitHelper;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn env(temp: &Path) -> Arc<GoEnv> {
        let git = GitHelper {
            bin_dir: temp.join("git"),
            exec_path: temp.join("git"),
        };
        Arc::new(GoEnv::new(&temp.join("gopath"), &git).unwrap())
    }

    fn fake_go(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("go");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_command_line() {
        let temp = TempDir::new().unwrap();
        let compiler = GoCompiler::new("/usr/bin/go", env(temp.path()));
        let cmd = compiler.command(
            Path::new("/out/handler"),
            Path::new("/src/main__lambdakit__bridge__.go"),
            Path::new("/src/lambda.go"),
            Path::new("/src"),
        );

        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().to_string()).collect();
        assert_eq!(
            args,
            vec![
                "build",
                "-mod=vendor",
                "-o",
                "/out/handler",
                "/src/main__lambdakit__bridge__.go",
                "/src/lambda.go"
            ]
        );
        assert_eq!(cmd.get_current_dir(), Some(Path::new("/src")));
        assert!(cmd.get_envs().any(|(k, v)| k == "CGO_ENABLED" && v == Some(std::ffi::OsStr::new("0"))));
    }

    #[test]
    fn test_compile_success_writes_binary() {
        let temp = TempDir::new().unwrap();
        // Writes the path following -o
        let go = fake_go(
            temp.path(),
            "[ \"$GOOS\" = linux ] || exit 9\nshift 2\nprintf bin > \"$2\"",
        );

        let compiler = GoCompiler::new(&go, env(temp.path()));
        let binary = temp.path().join("handler");
        compiler
            .compile(
                &binary,
                Path::new("bridge.go"),
                Path::new("lambda.go"),
                temp.path(),
                &Cancellation::default(),
            )
            .unwrap();

        assert_eq!(fs::read_to_string(&binary).unwrap(), "bin");
    }

    #[test]
    fn test_compile_failure_carries_diagnostics() {
        let temp = TempDir::new().unwrap();
        let go = fake_go(
            temp.path(),
            "echo '# command-line-arguments' >&2\necho './lambda.go:3:1: syntax error' >&2\nexit 1",
        );

        let compiler = GoCompiler::new(&go, env(temp.path()));
        let result = compiler.compile(
            &temp.path().join("handler"),
            Path::new("bridge.go"),
            Path::new("lambda.go"),
            temp.path(),
            &Cancellation::default(),
        );

        match result {
            Err(Error::Compile(err)) => {
                assert_eq!(err.status, Some(1));
                assert_eq!(err.diagnostics.len(), 1);
                assert_eq!(err.diagnostics[0].message, "syntax error");
            }
            other => panic!("expected compile error, got {:?}", other),
        }
    }

    #[test]
    fn test_abort_kills_process() {
        let temp = TempDir::new().unwrap();
        let go = fake_go(temp.path(), "exec sleep 30");

        let abort = AbortHandle::new();
        let cancel = Cancellation::new(Some(abort.clone()), None);
        let trigger = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            abort.abort();
        });

        let start = Instant::now();
        let compiler = GoCompiler::new(&go, env(temp.path()));
        let result = compiler.compile(
            &temp.path().join("handler"),
            Path::new("bridge.go"),
            Path::new("lambda.go"),
            temp.path(),
            &cancel,
        );
        trigger.join().unwrap();

        assert!(matches!(result, Err(Error::Aborted)));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    /// Whether `pid` is gone or only a zombie waiting to be reaped.
    #[cfg(target_os = "linux")]
    fn is_dead(pid: &str) -> bool {
        match fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => stat
                .rsplit_once(')')
                .is_some_and(|(_, rest)| rest.trim_start().starts_with('Z')),
            Err(_) => true,
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_abort_kills_spawned_steps() {
        let temp = TempDir::new().unwrap();
        let pid_file = temp.path().join("step.pid");
        let go = fake_go(
            temp.path(),
            &format!("sleep 30 &\necho $! > '{}'\nwait", pid_file.display()),
        );

        let abort = AbortHandle::new();
        let cancel = Cancellation::new(Some(abort.clone()), None);
        let watched = pid_file.clone();
        let trigger = thread::spawn(move || {
            let start = Instant::now();
            while !watched.exists() && start.elapsed() < Duration::from_secs(5) {
                thread::sleep(Duration::from_millis(10));
            }
            thread::sleep(Duration::from_millis(50));
            abort.abort();
        });

        let compiler = GoCompiler::new(&go, env(temp.path()));
        let result = compiler.compile(
            &temp.path().join("handler"),
            Path::new("bridge.go"),
            Path::new("lambda.go"),
            temp.path(),
            &cancel,
        );
        trigger.join().unwrap();
        assert!(matches!(result, Err(Error::Aborted)));

        let pid = fs::read_to_string(&pid_file).unwrap().trim().to_string();
        let start = Instant::now();
        while !is_dead(&pid) && start.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(20));
        }
        assert!(is_dead(&pid), "step {} outlived the cancelled build", pid);
    }

    #[test]
    fn test_deadline_kills_process() {
        let temp = TempDir::new().unwrap();
        let go = fake_go(temp.path(), "exec sleep 30");

        let cancel = Cancellation::new(None, Some(Instant::now() + Duration::from_millis(100)));
        let compiler = GoCompiler::new(&go, env(temp.path()));
        let result = compiler.compile(
            &temp.path().join("handler"),
            Path::new("bridge.go"),
            Path::new("lambda.go"),
            temp.path(),
            &cancel,
        );

        assert!(matches!(result, Err(Error::DeadlineExceeded)));
    }
}
