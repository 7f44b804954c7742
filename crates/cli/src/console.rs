//! Terminal collaborators: a y/n approval prompt and a stdout publisher.

use std::io::{BufRead, Write};

use async_trait::async_trait;
use docflow_core::Document;
use orchestrator::{ApprovalGate, OrchestratorError, Publisher, Result};
use tokio::sync::oneshot;

/// Shows the draft and asks on stdin. Anything other than `y`/`yes` rejects.
pub struct ConsoleApprovalGate;

#[async_trait]
impl ApprovalGate for ConsoleApprovalGate {
    async fn request_approval(&self, document: &Document) -> Result<bool> {
        let preview = format!(
            "\n── {} ──\n{}\n────────\nRevisions exhausted. Publish this document? [y/N] ",
            document.title(),
            document.content()
        );

        let answer = read_answer(preview, || std::io::stdin().lock()).await?;
        Ok(is_yes(&answer))
    }
}

/// Print `prompt` and read one line on a detached thread.
///
/// The thread is never joined: if the run is cancelled while the prompt is
/// open, the future is dropped and shutdown does not wait on `read_line`.
async fn read_answer<R, F>(prompt: String, open: F) -> Result<String>
where
    R: BufRead,
    F: FnOnce() -> R + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("approval-prompt".to_string())
        .spawn(move || {
            let read = || -> std::io::Result<String> {
                let mut stdout = std::io::stdout();
                stdout.write_all(prompt.as_bytes())?;
                stdout.flush()?;
                let mut line = String::new();
                open().read_line(&mut line)?;
                Ok(line)
            };
            let _ = tx.send(read());
        })
        .map_err(|e| OrchestratorError::Approval(format!("prompt thread failed: {}", e)))?;

    rx.await
        .map_err(|_| OrchestratorError::Approval("prompt thread exited without an answer".to_string()))?
        .map_err(|e| OrchestratorError::Approval(e.to_string()))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

pub struct StdoutPublisher;

#[async_trait]
impl Publisher for StdoutPublisher {
    async fn publish(&self, document: &Document) -> Result<()> {
        println!();
        println!("# {}", document.title());
        println!();
        println!("{}", document.content());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor, Read};
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    /// Blocks every read until its sender is dropped.
    struct Stalled(mpsc::Receiver<()>);

    impl Read for Stalled {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("n"));
        assert!(!is_yes("yep"));
    }

    #[tokio::test]
    async fn test_read_answer_returns_line() {
        let answer = read_answer(String::new(), || Cursor::new(b"y\nrest".to_vec()))
            .await
            .unwrap();
        assert_eq!(answer, "y\n");
    }

    #[test]
    fn test_abandoned_prompt_does_not_block_shutdown() {
        let (hold, stalled) = mpsc::channel::<()>();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let outcome = runtime.block_on(async move {
            tokio::time::timeout(
                Duration::from_millis(50),
                read_answer(String::new(), move || BufReader::new(Stalled(stalled))),
            )
            .await
        });
        assert!(outcome.is_err());

        let started = Instant::now();
        drop(runtime);
        assert!(started.elapsed() < Duration::from_secs(1));

        drop(hold);
    }
}
