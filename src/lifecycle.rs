//! Process lifecycle (spec §5/§9): the PID file guard and the cooperative
//! cancellation flag observed by long-running worker loops. Installed once
//! at startup; the CLI tears down generator → learning → store → audio on
//! signal, in that order.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Writes a PID file at construction, removes it on drop (including the
/// early-return/panic-unwind paths, not just a clean `main` exit).
pub struct ProcessGuard {
    path: PathBuf,
}

impl ProcessGuard {
    pub fn acquire(path: &Path) -> std::io::Result<Self> {
        std::fs::write(path, std::process::id().to_string())?;
        Ok(ProcessGuard { path: path.to_path_buf() })
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        std::fs::remove_file(&self.path).ok();
    }
}

/// Cooperative cancellation flag: SIGINT/SIGTERM/SIGQUIT set it once; worker
/// loops (generator phases, training epochs) poll it and unwind cleanly.
#[derive(Clone)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken { flag: Arc::new(AtomicBool::new(false)) }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn should_continue(&self) -> bool {
        !self.is_cancelled()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Installs SIGINT/SIGTERM/SIGQUIT handlers that set this token. Call once
    /// at startup; returns an error if the handlers are already registered
    /// for this process or the platform refuses the registration.
    pub fn install_signal_handlers(&self) -> Result<(), std::io::Error> {
        for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM, signal_hook::consts::SIGQUIT] {
            signal_hook::flag::register(signal, self.flag.clone())?;
        }
        Ok(())
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_removes_pid_file_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("songforge.pid");
        {
            let _guard = ProcessGuard::acquire(&path).unwrap();
            assert!(path.exists());
            let contents = std::fs::read_to_string(&path).unwrap();
            assert_eq!(contents, std::process::id().to_string());
        }
        assert!(!path.exists());
    }

    #[test]
    fn token_starts_uncancelled_and_latches() {
        let token = CancellationToken::new();
        assert!(token.should_continue());
        token.cancel();
        assert!(token.is_cancelled());
        assert!(!token.should_continue());
    }

    #[test]
    fn token_clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
