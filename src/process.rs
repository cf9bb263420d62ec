//! Child process plumbing for the configurator.
//!
//! stdout and stderr are each drained by a blocking reader thread into one
//! channel, so the session thread only performs non-blocking receives and can
//! never wedge on a quiet stream while the other one has data.

use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{BuildError, Result};

/// How long a child may be gone while its pipes stay open (held by a
/// descendant) before the streams are treated as closed anyway.
const EXIT_GRACE: Duration = Duration::from_secs(1);

const READ_CHUNK: usize = 4096;

/// The session's view of the configurator.
pub trait ConfiguratorIo {
    /// Next available line or line fragment, without blocking.
    fn try_read_line(&mut self) -> Option<String>;

    /// True once both streams are exhausted and the child has exited.
    fn is_closed(&mut self) -> Result<bool>;

    /// Exit code of the child. Only meaningful once [`is_closed`] is true.
    ///
    /// [`is_closed`]: ConfiguratorIo::is_closed
    fn exit_code(&mut self) -> Result<i32>;

    /// Write raw text to the child's stdin and flush it.
    fn send(&mut self, text: &str) -> Result<()>;
}

/// Interleaved, line-oriented reader over a set of output streams.
pub struct StreamReader {
    rx: Receiver<String>,
    drained: bool,
    echo: bool,
}

impl StreamReader {
    /// Start one forwarding thread per stream.
    pub fn spawn<R>(streams: Vec<R>, echo: bool) -> Self
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        for stream in streams {
            let tx = tx.clone();
            thread::spawn(move || forward_lines(stream, tx));
        }
        Self {
            rx,
            drained: false,
            echo,
        }
    }

    pub fn try_read_line(&mut self) -> Option<String> {
        match self.rx.try_recv() {
            Ok(line) => {
                if self.echo {
                    let mut stdout = io::stdout().lock();
                    let _ = stdout.write_all(line.as_bytes());
                    let _ = stdout.flush();
                }
                Some(line)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.drained = true;
                None
            }
        }
    }

    /// True once every stream hit EOF and all their lines were consumed.
    pub fn is_drained(&self) -> bool {
        self.drained
    }
}

/// Forward chunks from `stream`, split after each newline.
///
/// A trailing fragment without a newline is sent as-is: prompts such as
/// `Enter selection [1-75] : ` never end their line.
fn forward_lines<R: Read>(mut stream: R, tx: Sender<String>) {
    let mut buf = [0u8; READ_CHUNK];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                let text = String::from_utf8_lossy(&buf[..n]);
                for piece in text.split_inclusive('\n') {
                    if tx.send(piece.to_string()).is_err() {
                        return;
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
}

/// A spawned configurator with piped stdio.
///
/// Dropping it kills the child if still running and reaps it.
pub struct ChildProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    reader: StreamReader,
    exit: Option<(i32, Instant)>,
}

impl ChildProcess {
    pub fn spawn(program: &Path, cwd: &Path) -> Result<Self> {
        let mut cmd = Command::new(program);
        cmd.current_dir(cwd);
        Self::spawn_command(cmd, &program.display().to_string())
    }

    pub fn spawn_command(mut cmd: Command, label: &str) -> Result<Self> {
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| BuildError::io(format!("spawning '{}'", label), e))?;
        debug!(pid = child.id(), program = label, "spawned configurator");

        let stdin = child.stdin.take();
        let stdout = child.stdout.take().ok_or_else(|| {
            BuildError::io(
                format!("capturing stdout of '{}'", label),
                io::Error::new(io::ErrorKind::BrokenPipe, "stdout not piped"),
            )
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            BuildError::io(
                format!("capturing stderr of '{}'", label),
                io::Error::new(io::ErrorKind::BrokenPipe, "stderr not piped"),
            )
        })?;

        let streams: Vec<Box<dyn Read + Send>> = vec![Box::new(stderr), Box::new(stdout)];
        Ok(Self {
            child,
            stdin,
            reader: StreamReader::spawn(streams, true),
            exit: None,
        })
    }

    fn poll_exit(&mut self) -> Result<Option<i32>> {
        if let Some((code, _)) = self.exit {
            return Ok(Some(code));
        }
        let status = self
            .child
            .try_wait()
            .map_err(|e| BuildError::io("polling configurator status", e))?;
        Ok(status.map(|status| {
            let code = status.code().unwrap_or(-1);
            self.exit = Some((code, Instant::now()));
            code
        }))
    }
}

impl ConfiguratorIo for ChildProcess {
    fn try_read_line(&mut self) -> Option<String> {
        self.reader.try_read_line()
    }

    fn is_closed(&mut self) -> Result<bool> {
        if self.poll_exit()?.is_none() {
            return Ok(false);
        }
        let grace_over = self
            .exit
            .map(|(_, exited_at)| exited_at.elapsed() >= EXIT_GRACE)
            .unwrap_or(false);
        Ok(self.reader.is_drained() || grace_over)
    }

    fn exit_code(&mut self) -> Result<i32> {
        match self.poll_exit()? {
            Some(code) => Ok(code),
            None => {
                let status = self
                    .child
                    .wait()
                    .map_err(|e| BuildError::io("waiting for configurator", e))?;
                let code = status.code().unwrap_or(-1);
                self.exit = Some((code, Instant::now()));
                Ok(code)
            }
        }
    }

    fn send(&mut self, text: &str) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or_else(|| {
            BuildError::io(
                "answering configurator",
                io::Error::new(io::ErrorKind::BrokenPipe, "stdin already closed"),
            )
        })?;
        stdin
            .write_all(text.as_bytes())
            .and_then(|_| stdin.flush())
            .map_err(|e| BuildError::io("answering configurator", e))
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if matches!(self.child.try_wait(), Ok(None)) {
            debug!(pid = self.child.id(), "killing configurator");
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read_all(reader: &mut StreamReader) -> Vec<String> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut lines = Vec::new();
        while !reader.is_drained() && Instant::now() < deadline {
            match reader.try_read_line() {
                Some(line) => lines.push(line),
                None => thread::sleep(Duration::from_millis(5)),
            }
        }
        lines
    }

    #[test]
    fn unterminated_prompt_is_delivered() {
        let stream = Cursor::new(b"menu line\nEnter selection [1-4] : ".to_vec());
        let mut reader = StreamReader::spawn(vec![stream], false);
        let lines = read_all(&mut reader);
        assert_eq!(lines, vec!["menu line\n", "Enter selection [1-4] : "]);
    }

    #[test]
    fn empty_poll_is_not_end_of_stream() {
        let (_tx, rx) = mpsc::channel::<String>();
        let mut reader = StreamReader {
            rx,
            drained: false,
            echo: false,
        };
        assert_eq!(reader.try_read_line(), None);
        assert!(!reader.is_drained());
    }

    #[test]
    fn both_streams_are_interleaved_into_one() {
        let out = Cursor::new(b"from stdout\n".to_vec());
        let err = Cursor::new(b"from stderr\n".to_vec());
        let mut reader = StreamReader::spawn(vec![out, err], false);
        let mut lines = read_all(&mut reader);
        lines.sort();
        assert_eq!(lines, vec!["from stderr\n", "from stdout\n"]);
    }

    #[test]
    fn child_round_trip_and_exit_code() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "read answer; echo \"got $answer\"; exit 3"]);
        let mut child = ChildProcess::spawn_command(cmd, "sh").unwrap();
        child.send("42\n").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = String::new();
        while !child.is_closed().unwrap() && Instant::now() < deadline {
            if let Some(line) = child.try_read_line() {
                seen.push_str(&line);
            } else {
                thread::sleep(Duration::from_millis(5));
            }
        }
        while let Some(line) = child.try_read_line() {
            seen.push_str(&line);
        }
        assert!(seen.contains("got 42"));
        assert_eq!(child.exit_code().unwrap(), 3);
    }

    #[test]
    fn spawn_failure_is_an_io_error() {
        let result = ChildProcess::spawn(
            Path::new("/definitely/not/a/configure"),
            Path::new("/"),
        );
        assert!(matches!(result, Err(BuildError::Io { .. })));
    }
}
