//! `git show <revision>:<path>` as a revision source, bounded by a timeout.

use std::io::Read as _;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use tracing::trace;

use crate::error::Error;
use crate::store::RevisionSource;

/// Output collected by the reader thread: stdout read result, stdout bytes, stderr text.
type Collected = (std::io::Result<usize>, Vec<u8>, String);

/// Reads files from the history of a local git checkout.
pub struct GitSource {
    /// Working tree or bare repository to query.
    repo: PathBuf,
    /// Upper bound on one `git show`.
    timeout: Duration,
}

impl GitSource {
    /// Source over the repository at `repo`.
    pub fn new(repo: PathBuf, timeout: Duration) -> Self {
        return Self { repo, timeout };
    }

    /// Start `git show` with piped output.
    ///
    /// # Errors
    ///
    /// Returns `Error::FetchFailed` if git cannot be spawned.
    fn spawn(&self, revision: &str, path: &str) -> Result<Child, Error> {
        return Command::new("git")
            .arg("-C")
            .arg(&self.repo)
            .arg("show")
            .arg(format!("{revision}:{path}"))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| return failed(revision, path, format!("cannot run git: {e}")));
    }
}

impl RevisionSource for GitSource {
    fn file_at(&self, revision: &str, path: &str) -> Result<String, Error> {
        // A leading dash would be read by git as an option.
        if revision.starts_with('-') || path.starts_with('-') {
            return Err(failed(revision, path, "refusing option-like argument".to_string()));
        }

        let mut child = self.spawn(revision, path)?;
        let Some(mut stdout) = child.stdout.take() else {
            return Err(failed(revision, path, "git stdout not captured".to_string()));
        };
        let stderr = child.stderr.take();

        let (tx, rx) = crossbeam_channel::bounded::<Collected>(1);
        std::thread::spawn(move || {
            let mut out = Vec::new();
            let read = stdout.read_to_end(&mut out);
            let mut err = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut err);
            }
            let _ = tx.send((read, out, err));
        });

        let Ok((read, out, err)) = rx.recv_timeout(self.timeout) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::FetchTimeout {
                path: path.to_string(),
                revision: revision.to_string(),
                timeout: self.timeout,
            });
        };

        let status = child.wait().map_err(|e| return failed(revision, path, e.to_string()))?;
        if let Err(e) = read {
            return Err(failed(revision, path, e.to_string()));
        }
        if !status.success() {
            return Err(failed(revision, path, err.trim().to_string()));
        }

        trace!(revision, path, bytes = out.len(), "git show");
        return String::from_utf8(out)
            .map_err(|_err| return failed(revision, path, "content is not UTF-8".to_string()));
    }
}

/// Build a `FetchFailed` error.
fn failed(revision: &str, path: &str, reason: String) -> Error {
    return Error::FetchFailed {
        path: path.to_string(),
        reason,
        revision: revision.to_string(),
    };
}
