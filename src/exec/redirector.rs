// src/exec/redirector.rs

//! Runtime side of stream redirection.
//!
//! Forked mode:
//! - [`Redirector::prepare`] opens every sink and input file *before* the
//!   process is spawned and hands back the `Stdio` triple for the command.
//! - [`Redirector::attach`] takes the child's pipes and starts one reader
//!   task per redirected stream plus one writer task per distinct sink.
//!   Readers push chunks into the sink's channel, so two streams aimed at
//!   the same file share a single serialized writer.
//! - [`Redirector::complete`] waits for every reader to hit end-of-stream
//!   (or gives up after a grace period when the child was killed), then for
//!   every writer, and returns the captured variables.
//!
//! Same-runtime mode uses [`Redirector::in_process_streams`], which wires the
//! same sinks as plain `std::io` readers/writers.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::command::redirect::{InputSource, OutputSink, RedirectionSpec};
use crate::errors::{ExecError, Result};
use crate::report::{OutputStore, Reporter};
use crate::types::Severity;

const READ_CHUNK: usize = 8 * 1024;
const SINK_QUEUE: usize = 64;

/// Captured-variable values, available once draining has finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    values: BTreeMap<String, String>,
}

impl CapturedOutput {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn publish_to(&self, store: &dyn OutputStore) {
        for (name, value) in self.iter() {
            store.publish(name, value);
        }
    }

    fn insert(&mut self, name: String, bytes: Vec<u8>) {
        let value = String::from_utf8(bytes)
            .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());
        self.values.insert(name, value);
    }
}

/// Stdio triple for a command about to be spawned.
#[derive(Debug)]
pub struct ChildStdio {
    pub stdin: Stdio,
    pub stdout: Stdio,
    pub stderr: Stdio,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SinkKey {
    File(PathBuf),
    Capture(String),
    HostLog,
}

/// An opened destination.
#[derive(Debug)]
enum OpenSink {
    File(File),
    Capture { name: String, buf: Vec<u8> },
    HostLog(LineReporter),
}

impl OpenSink {
    fn finish(self, captured: &mut CapturedOutput) {
        match self {
            OpenSink::File(_) => {}
            OpenSink::Capture { name, buf } => captured.insert(name, buf),
            OpenSink::HostLog(mut lines) => lines.finish(),
        }
    }
}

impl Write for OpenSink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        match self {
            OpenSink::File(f) => f.write(data),
            OpenSink::Capture { buf, .. } => {
                buf.extend_from_slice(data);
                Ok(data.len())
            }
            OpenSink::HostLog(lines) => {
                lines.push(data);
                Ok(data.len())
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OpenSink::File(f) => f.flush(),
            _ => Ok(()),
        }
    }
}

/// Splits a byte stream into lines for the host reporter.
struct LineReporter {
    reporter: Arc<dyn Reporter>,
    pending: Vec<u8>,
}

impl std::fmt::Debug for LineReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineReporter")
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl LineReporter {
    fn new(reporter: Arc<dyn Reporter>) -> Self {
        Self {
            reporter,
            pending: Vec::new(),
        }
    }

    fn push(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.emit(&line[..line.len() - 1]);
        }
    }

    fn finish(&mut self) {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.emit(&rest);
        }
    }

    fn emit(&self, line: &[u8]) {
        let text = String::from_utf8_lossy(line);
        let text = text.strip_suffix('\r').unwrap_or(&text);
        self.reporter.log(text, Severity::Warn);
    }
}

/// Sinks opened for one invocation. `output`/`error` index into `sinks`;
/// `None` means pass-through to the console.
#[derive(Debug, Default)]
struct SinkSet {
    keys: Vec<SinkKey>,
    sinks: Vec<OpenSink>,
    output: Option<usize>,
    error: Option<usize>,
}

impl SinkSet {
    fn open(spec: &RedirectionSpec, reporter: &Arc<dyn Reporter>) -> Result<Self> {
        let mut set = SinkSet::default();
        set.output = set.slot_for(spec.output(), false, reporter)?;
        set.error = set.slot_for(&spec.effective_error(), spec.log_error(), reporter)?;
        Ok(set)
    }

    fn slot_for(
        &mut self,
        sink: &OutputSink,
        log_to_host: bool,
        reporter: &Arc<dyn Reporter>,
    ) -> Result<Option<usize>> {
        let key = match sink {
            OutputSink::Console if log_to_host => SinkKey::HostLog,
            OutputSink::Console => return Ok(None),
            OutputSink::File { path, .. } => SinkKey::File(file_identity(path)),
            OutputSink::Capture(name) => SinkKey::Capture(name.clone()),
        };

        if let Some(idx) = self.keys.iter().position(|k| *k == key) {
            return Ok(Some(idx));
        }

        let opened = match sink {
            OutputSink::File { path, append } => OpenSink::File(open_output(path, *append)?),
            OutputSink::Capture(name) => OpenSink::Capture {
                name: name.clone(),
                buf: Vec::new(),
            },
            OutputSink::Console => OpenSink::HostLog(LineReporter::new(Arc::clone(reporter))),
        };

        self.keys.push(key);
        self.sinks.push(opened);
        Ok(Some(self.sinks.len() - 1))
    }
}

/// Canonical name of an output file, so `out.txt`, `sub/../out.txt` and
/// symlinks to it all map to one sink.
fn file_identity(path: &Path) -> PathBuf {
    if let Ok(real) = path.canonicalize() {
        return real;
    }
    // Not created yet: resolve the directory and keep the file name.
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return path.to_path_buf();
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    parent
        .canonicalize()
        .map(|dir| dir.join(name))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn open_output(path: &Path, append: bool) -> Result<File> {
    let mut opts = OpenOptions::new();
    opts.create(true);
    if append {
        opts.append(true);
    } else {
        opts.write(true).truncate(true);
    }
    opts.open(path)
        .map_err(|e| ExecError::execution(format!("opening output file {}: {e}", path.display())))
}

fn open_input(path: &Path) -> Result<File> {
    File::open(path)
        .map_err(|e| ExecError::execution(format!("opening input file {}: {e}", path.display())))
}

/// State between `prepare` and `attach`.
#[derive(Debug)]
struct Prepared {
    sinks: SinkSet,
    literal_input: Option<String>,
}

/// Tasks running between `attach` and `complete`.
#[derive(Debug)]
struct ActiveStreams {
    readers: Vec<(&'static str, JoinHandle<io::Result<()>>)>,
    feeder: Option<JoinHandle<io::Result<()>>>,
    writers: Vec<JoinHandle<io::Result<Option<OpenSink>>>>,
}

/// Binds the three standard streams of one invocation. Not reusable.
#[derive(Debug)]
pub struct Redirector {
    spec: RedirectionSpec,
    reporter: Arc<dyn Reporter>,
    prepared: Option<Prepared>,
    active: Option<ActiveStreams>,
}

impl Redirector {
    /// Relative paths in `spec` are resolved against `base_dir`.
    pub fn new(spec: &RedirectionSpec, base_dir: &Path, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            spec: spec.resolve_against(base_dir),
            reporter,
            prepared: None,
            active: None,
        }
    }

    pub fn spec(&self) -> &RedirectionSpec {
        &self.spec
    }

    /// Open sinks and input for a forked child.
    ///
    /// Truncation of non-append output files happens here, once.
    pub fn prepare(&mut self) -> Result<ChildStdio> {
        let sinks = SinkSet::open(&self.spec, &self.reporter)?;

        let (stdin, literal_input) = match self.spec.input() {
            InputSource::None => (Stdio::null(), None),
            InputSource::File(path) => (Stdio::from(open_input(path)?), None),
            InputSource::Literal(text) => (Stdio::piped(), Some(text.clone())),
        };

        let stdout = if sinks.output.is_some() {
            Stdio::piped()
        } else {
            Stdio::inherit()
        };
        let stderr = if sinks.error.is_some() {
            Stdio::piped()
        } else {
            Stdio::inherit()
        };

        self.prepared = Some(Prepared {
            sinks,
            literal_input,
        });

        Ok(ChildStdio {
            stdin,
            stdout,
            stderr,
        })
    }

    /// Start draining `child`'s pipes. Must run inside a Tokio runtime.
    pub fn attach(&mut self, child: &mut Child) -> Result<()> {
        let prepared = self
            .prepared
            .take()
            .ok_or_else(|| ExecError::execution("redirector streams were not prepared"))?;

        let SinkSet {
            sinks,
            output,
            error,
            ..
        } = prepared.sinks;

        let mut senders = Vec::with_capacity(sinks.len());
        let mut writers = Vec::with_capacity(sinks.len());
        for sink in sinks {
            let (tx, rx) = mpsc::channel::<Vec<u8>>(SINK_QUEUE);
            senders.push(tx);
            writers.push(tokio::spawn(write_sink(sink, rx)));
        }

        let mut readers = Vec::new();
        if let (Some(slot), Some(stdout)) = (output, child.stdout.take()) {
            let tx = senders[slot].clone();
            readers.push(("stdout", tokio::spawn(pump("stdout", stdout, tx))));
        }
        if let (Some(slot), Some(stderr)) = (error, child.stderr.take()) {
            let tx = senders[slot].clone();
            readers.push(("stderr", tokio::spawn(pump("stderr", stderr, tx))));
        }
        // Writers finish once every reader has dropped its sender.
        drop(senders);

        let feeder = match (prepared.literal_input, child.stdin.take()) {
            (Some(text), Some(stdin)) => Some(tokio::spawn(feed_input(stdin, text))),
            _ => None,
        };

        self.active = Some(ActiveStreams {
            readers,
            feeder,
            writers,
        });
        Ok(())
    }

    /// Wait for all drains, then return captured variables.
    ///
    /// `grace` bounds how long readers may take after the child was killed;
    /// stragglers (typically held open by orphaned grandchildren) are
    /// aborted. `None` waits for end-of-stream unconditionally.
    pub async fn complete(&mut self, grace: Option<Duration>) -> Result<CapturedOutput> {
        self.prepared = None;
        let Some(active) = self.active.take() else {
            return Ok(CapturedOutput::default());
        };

        let deadline = grace.map(|g| Instant::now() + g);
        let mut first_error: Option<ExecError> = None;

        for (stream, reader) in active.readers {
            if let Err(e) = join_within(reader, deadline, stream).await {
                first_error.get_or_insert(e);
            }
        }
        if let Some(feeder) = active.feeder {
            if let Err(e) = join_within(feeder, deadline, "stdin").await {
                first_error.get_or_insert(e);
            }
        }

        let mut captured = CapturedOutput::default();
        for writer in active.writers {
            match writer.await {
                Ok(Ok(Some(sink))) => sink.finish(&mut captured),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    first_error.get_or_insert(ExecError::execution(format!(
                        "writing redirected output: {e}"
                    )));
                }
                Err(e) => {
                    first_error.get_or_insert(ExecError::execution(format!(
                        "output writer task failed: {e}"
                    )));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(captured),
        }
    }

    /// Wire streams for a same-runtime call.
    pub fn in_process_streams(&mut self) -> Result<InProcessStreams> {
        let SinkSet {
            sinks,
            output,
            error,
            ..
        } = SinkSet::open(&self.spec, &self.reporter)?;

        let shared: Vec<Arc<Mutex<OpenSink>>> =
            sinks.into_iter().map(|s| Arc::new(Mutex::new(s))).collect();

        let stdin: Box<dyn Read + Send> = match self.spec.input() {
            InputSource::None => Box::new(io::stdin()),
            InputSource::File(path) => Box::new(open_input(path)?),
            InputSource::Literal(text) => Box::new(Cursor::new(text.clone().into_bytes())),
        };

        let stdout = StreamWriter(match output {
            Some(slot) => WriterKind::Sink(Arc::clone(&shared[slot])),
            None => WriterKind::Stdout(io::stdout()),
        });
        let stderr = StreamWriter(match error {
            Some(slot) => WriterKind::Sink(Arc::clone(&shared[slot])),
            None => WriterKind::Stderr(io::stderr()),
        });

        Ok(InProcessStreams {
            stdin,
            stdout,
            stderr,
            sinks: shared,
        })
    }
}

async fn join_within(
    mut handle: JoinHandle<io::Result<()>>,
    deadline: Option<Instant>,
    stream: &'static str,
) -> Result<()> {
    let joined = match deadline {
        None => (&mut handle).await,
        Some(deadline) => match tokio::time::timeout_at(deadline, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(stream, "stream still open after process was killed; abandoning drain");
                handle.abort();
                return Ok(());
            }
        },
    };

    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ExecError::execution(format!("redirecting {stream}: {e}"))),
        Err(e) => Err(ExecError::execution(format!("{stream} task failed: {e}"))),
    }
}

/// Copy one pipe into a sink queue until end-of-stream.
async fn pump<R>(stream: &'static str, mut reader: R, tx: mpsc::Sender<Vec<u8>>) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK];
    let mut total = 0usize;
    let mut discarding = false;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            debug!(stream, bytes = total, "stream drained");
            return Ok(());
        }
        total += n;

        // Keep reading after a writer failure so the child never blocks.
        if !discarding && tx.send(buf[..n].to_vec()).await.is_err() {
            warn!(stream, "sink closed early; discarding remaining output");
            discarding = true;
        }
    }
}

/// Single writer for one sink.
async fn write_sink(
    sink: OpenSink,
    mut rx: mpsc::Receiver<Vec<u8>>,
) -> io::Result<Option<OpenSink>> {
    match sink {
        OpenSink::File(file) => {
            let mut file = tokio::fs::File::from_std(file);
            while let Some(chunk) = rx.recv().await {
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok(None)
        }
        mut other => {
            while let Some(chunk) = rx.recv().await {
                other.write_all(&chunk)?;
            }
            Ok(Some(other))
        }
    }
}

async fn feed_input(mut stdin: ChildStdin, text: String) -> io::Result<()> {
    let res = async {
        stdin.write_all(text.as_bytes()).await?;
        stdin.shutdown().await
    }
    .await;

    match res {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            debug!("child closed stdin before reading all input");
            Ok(())
        }
        other => other,
    }
}

/// Writer for one standard stream of an in-process call.
#[derive(Debug)]
pub struct StreamWriter(WriterKind);

#[derive(Debug)]
enum WriterKind {
    Stdout(io::Stdout),
    Stderr(io::Stderr),
    Sink(Arc<Mutex<OpenSink>>),
}

impl Write for StreamWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        match &mut self.0 {
            WriterKind::Stdout(s) => s.write(data),
            WriterKind::Stderr(s) => s.write(data),
            WriterKind::Sink(sink) => lock(sink).write(data),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.0 {
            WriterKind::Stdout(s) => s.flush(),
            WriterKind::Stderr(s) => s.flush(),
            WriterKind::Sink(sink) => lock(sink).flush(),
        }
    }
}

fn lock(sink: &Mutex<OpenSink>) -> MutexGuard<'_, OpenSink> {
    sink.lock().unwrap_or_else(|e| e.into_inner())
}

/// Streams handed to an in-process entry point.
pub struct InProcessStreams {
    pub stdin: Box<dyn Read + Send>,
    pub stdout: StreamWriter,
    pub stderr: StreamWriter,
    sinks: Vec<Arc<Mutex<OpenSink>>>,
}

impl InProcessStreams {
    /// Flush and close every sink, returning captured variables.
    pub fn finish(self) -> Result<CapturedOutput> {
        let InProcessStreams {
            stdin,
            mut stdout,
            mut stderr,
            sinks,
        } = self;
        drop(stdin);

        let flushed = stdout.flush().and(stderr.flush());
        drop(stdout);
        drop(stderr);
        flushed.map_err(|e| ExecError::execution(format!("flushing redirected output: {e}")))?;

        let mut captured = CapturedOutput::default();
        for sink in sinks {
            let sink = Arc::try_unwrap(sink)
                .map_err(|_| ExecError::execution("redirected stream still in use"))?
                .into_inner()
                .unwrap_or_else(|e| e.into_inner());
            sink.finish(&mut captured);
        }
        Ok(captured)
    }
}
