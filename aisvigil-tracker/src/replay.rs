//! Log replay source
//!
//! Feeds recorded NMEA data back into the pipeline, either as fast as the
//! parser can go or paced to the original wall-clock cadence. Realtime
//! pacing anchors on the first valid ZDA ("TimeDate") sentence and
//! schedules every later sentence against that absolute reference, so the
//! replay cannot drift no matter how long it runs.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, Utc};

use aisvigil_core::clock::{Clock, SystemClock};
use aisvigil_core::error::ParseError;
use aisvigil_core::nmea::decode::decode_zda;
use aisvigil_core::nmea::{NmeaSentence, SentenceId};

/// Longest single sleep in realtime mode; the pacing loop wakes at least
/// this often to notice a stop request
const MAX_PACING_SLEEP: Duration = Duration::from_millis(100);

/// With `suppress_outdated_messages`, sentences lagging the newest seen
/// timestamp by more than this are dropped (live-link heuristic; replay
/// turns it off)
const OUTDATED_MESSAGE_WINDOW: Duration = Duration::from_secs(30);

/// One replay input: a file on disk or a caller-owned byte stream
pub enum ReplayInput {
    File(PathBuf),
    Stream(Box<dyn Read + Send>),
}

impl ReplayInput {
    fn open(self) -> std::io::Result<Box<dyn Read + Send>> {
        match self {
            ReplayInput::File(path) => {
                log::info!("Replaying {}", path.display());
                Ok(Box::new(File::open(path)?))
            }
            ReplayInput::Stream(stream) => Ok(stream),
        }
    }
}

/// Configuration for the recorded-stream parser
#[derive(Debug, Clone, Copy)]
pub struct LogParserConfig {
    /// Accept pipe-delimited log records (`<unix-millis>|<sentence>`) in
    /// addition to plain sentence lines
    pub support_log_reading: bool,
    /// Drop sentences that are out of date relative to the newest seen
    /// timestamp. Must be off for replay, where every sentence counts.
    pub suppress_outdated_messages: bool,
}

impl Default for LogParserConfig {
    fn default() -> Self {
        LogParserConfig {
            support_log_reading: true,
            suppress_outdated_messages: false,
        }
    }
}

/// Pulls framed sentences out of a sequence of recorded byte streams.
///
/// Timestamp assignment, in order of preference: the pipe-delimited record
/// timestamp, the running log time derived from ZDA sentences, the wall
/// clock. End of the final stream reports as [`ParseError::PortClosed`].
struct LogParser {
    config: LogParserConfig,
    clock: Arc<dyn Clock>,
    pending: VecDeque<Box<dyn Read + Send>>,
    current: Option<BufReader<Box<dyn Read + Send>>>,
    /// Advancing log time, from record timestamps and ZDA sentences
    log_time: Option<DateTime<Utc>>,
    /// Newest timestamp seen, for the outdated-message heuristic
    newest: Option<DateTime<Utc>>,
}

impl LogParser {
    fn new(
        inputs: Vec<Box<dyn Read + Send>>,
        config: LogParserConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        LogParser {
            config,
            clock,
            pending: inputs.into(),
            current: None,
            log_time: None,
            newest: None,
        }
    }

    fn next_line(&mut self) -> Result<String, ParseError> {
        loop {
            match self.current.as_mut() {
                None => match self.pending.pop_front() {
                    Some(stream) => self.current = Some(BufReader::new(stream)),
                    None => return Err(ParseError::PortClosed),
                },
                Some(reader) => {
                    let mut line = String::new();
                    match reader.read_line(&mut line) {
                        // Stream exhausted; move on to the next one
                        Ok(0) => self.current = None,
                        Ok(_) => return Ok(line),
                        Err(e) => {
                            log::warn!("Read error during replay, closing stream: {}", e);
                            self.current = None;
                        }
                    }
                }
            }
        }
    }

    /// The next framed sentence, skipping blank and comment lines.
    /// [`ParseError::PortClosed`] signals clean end of data.
    fn next_sentence(&mut self) -> Result<NmeaSentence, ParseError> {
        loop {
            let line = self.next_line()?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (record_time, text) = match (self.config.support_log_reading, line.split_once('|'))
            {
                (true, Some((stamp, rest))) => {
                    let time = stamp
                        .trim()
                        .parse::<i64>()
                        .ok()
                        .and_then(DateTime::<Utc>::from_timestamp_millis)
                        .ok_or_else(|| ParseError::InvalidField {
                            field: "logTimestamp",
                            reason: stamp.trim().to_string(),
                        })?;
                    (Some(time), rest)
                }
                _ => (None, line),
            };

            let fallback = record_time
                .or(self.log_time)
                .unwrap_or_else(|| self.clock.now());
            let mut sentence = NmeaSentence::parse(text, fallback)?;

            // ZDA sentences carry the log's own wall clock
            if sentence.id == SentenceId::ZDA {
                if let Ok(zda) = decode_zda(&sentence) {
                    sentence.timestamp = record_time.unwrap_or(zda.time);
                    self.log_time = Some(sentence.timestamp);
                }
            }
            if let Some(time) = record_time {
                self.log_time = Some(time);
            }

            if self.config.suppress_outdated_messages {
                let window = chrono::Duration::seconds(OUTDATED_MESSAGE_WINDOW.as_secs() as i64);
                if let Some(newest) = self.newest {
                    if sentence.timestamp + window < newest {
                        log::trace!("Dropping outdated sentence: {}", sentence);
                        continue;
                    }
                }
                if self.newest.map(|n| sentence.timestamp > n).unwrap_or(true) {
                    self.newest = Some(sentence.timestamp);
                }
            }

            return Ok(sentence);
        }
    }
}

/// Latched completion event; waiters block until the replay thread signals
#[derive(Default)]
struct DoneEvent {
    done: Mutex<bool>,
    condvar: Condvar,
}

impl DoneEvent {
    fn signal(&self) {
        *self.done.lock().unwrap() = true;
        self.condvar.notify_all();
    }

    fn wait(&self) {
        let mut done = self.done.lock().unwrap();
        while !*done {
            done = self.condvar.wait(done).unwrap();
        }
    }

    fn is_set(&self) -> bool {
        *self.done.lock().unwrap()
    }
}

type SentenceCallback = Box<dyn Fn(&NmeaSentence) + Send + Sync>;

/// Replays one or more recorded NMEA streams onto a sentence event.
///
/// In fast mode (the default) the recording is parsed to completion as
/// fast as possible and `stop_decode` blocks until end-of-data, so a
/// replay-driven test run is deterministic. In realtime mode sentences are
/// released on the original cadence with their timestamps rewritten to the
/// present, and `stop_decode` returns without waiting.
pub struct LogReplaySource {
    inputs: Mutex<Vec<ReplayInput>>,
    decode_in_realtime: bool,
    clock: Arc<dyn Clock>,
    callbacks: Arc<RwLock<Vec<SentenceCallback>>>,
    stop: Arc<AtomicBool>,
    done: Arc<DoneEvent>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl LogReplaySource {
    pub fn new(inputs: Vec<ReplayInput>, decode_in_realtime: bool) -> Self {
        Self::with_clock(inputs, decode_in_realtime, Arc::new(SystemClock))
    }

    pub fn with_clock(
        inputs: Vec<ReplayInput>,
        decode_in_realtime: bool,
        clock: Arc<dyn Clock>,
    ) -> Self {
        LogReplaySource {
            inputs: Mutex::new(inputs),
            decode_in_realtime,
            clock,
            callbacks: Arc::new(RwLock::new(Vec::new())),
            stop: Arc::new(AtomicBool::new(false)),
            done: Arc::new(DoneEvent::default()),
            handle: Mutex::new(None),
        }
    }

    /// Convenience constructor over plain file paths
    pub fn from_files<I, P>(paths: I, decode_in_realtime: bool) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::new(
            paths
                .into_iter()
                .map(|p| ReplayInput::File(p.into()))
                .collect(),
            decode_in_realtime,
        )
    }

    /// Register the outbound sentence event. Must be called before
    /// `start_decode`; callbacks run on the replay thread.
    pub fn on_sentence(&self, callback: impl Fn(&NmeaSentence) + Send + Sync + 'static) {
        self.callbacks.write().unwrap().push(Box::new(callback));
    }

    /// Spawn the replay thread over the configured inputs.
    ///
    /// File inputs are opened here so the caller gets open errors
    /// synchronously. Calling again after a completed run restarts with
    /// whatever inputs remain (normally none).
    pub fn start_decode(&self) -> std::io::Result<()> {
        let inputs = std::mem::take(&mut *self.inputs.lock().unwrap());
        let mut streams = Vec::with_capacity(inputs.len());
        for input in inputs {
            streams.push(input.open()?);
        }

        let parser = LogParser::new(
            streams,
            LogParserConfig {
                support_log_reading: true,
                suppress_outdated_messages: false,
            },
            self.clock.clone(),
        );

        self.stop.store(false, Ordering::SeqCst);
        let realtime = self.decode_in_realtime;
        let clock = self.clock.clone();
        let callbacks = self.callbacks.clone();
        let stop = self.stop.clone();
        let done = self.done.clone();

        let handle = std::thread::Builder::new()
            .name("ais-replay".to_string())
            .spawn(move || run_replay(parser, realtime, clock, callbacks, stop, done))?;
        *self.handle.lock().unwrap() = Some(handle);
        Ok(())
    }

    /// Stop replaying and release the parser.
    ///
    /// In fast mode this waits for the end-of-data event first, so all
    /// recorded sentences are guaranteed to have been delivered. In
    /// realtime mode it signals the thread and returns immediately.
    pub fn stop_decode(&self) {
        if self.decode_in_realtime {
            self.stop.store(true, Ordering::SeqCst);
            // The thread winds down on its own after the current sleep slice
            drop(self.handle.lock().unwrap().take());
        } else {
            if self.handle.lock().unwrap().is_none() {
                return;
            }
            self.done.wait();
            if let Some(handle) = self.handle.lock().unwrap().take() {
                if handle.join().is_err() {
                    log::error!("Replay thread panicked");
                }
            }
        }
    }

    /// Whether the recording has been fully delivered
    pub fn is_done(&self) -> bool {
        self.done.is_set()
    }
}

impl Drop for LogReplaySource {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

fn run_replay(
    mut parser: LogParser,
    realtime: bool,
    clock: Arc<dyn Clock>,
    callbacks: Arc<RwLock<Vec<SentenceCallback>>>,
    stop: Arc<AtomicBool>,
    done: Arc<DoneEvent>,
) {
    // (time in the log, wall clock) captured at the first valid ZDA
    let mut reference: Option<(DateTime<Utc>, DateTime<Utc>)> = None;
    let mut emitted = 0usize;

    'replay: while !stop.load(Ordering::SeqCst) {
        let mut sentence = match parser.next_sentence() {
            Ok(sentence) => sentence,
            Err(ParseError::PortClosed) => {
                log::debug!("Replay reached end of data after {} sentences", emitted);
                break;
            }
            Err(e) => {
                log::warn!("Skipping unreadable replay line: {}", e);
                continue;
            }
        };

        if realtime {
            let (log_reference, wall_reference) = match reference {
                Some(anchor) => anchor,
                None => {
                    // Only a valid date/time sentence can anchor the replay;
                    // everything before it is dropped silently.
                    if sentence.id != SentenceId::ZDA || decode_zda(&sentence).is_err() {
                        continue;
                    }
                    let anchor = (sentence.timestamp, clock.now());
                    reference = Some(anchor);
                    anchor
                }
            };
            let due = wall_reference + (sentence.timestamp - log_reference);
            loop {
                let wait = due.signed_duration_since(clock.now());
                let wait = match wait.to_std() {
                    Ok(wait) if !wait.is_zero() => wait,
                    _ => break,
                };
                clock.sleep(wait.min(MAX_PACING_SLEEP));
                if stop.load(Ordering::SeqCst) {
                    break 'replay;
                }
            }
            // The sentence goes out "now"; consumers see the present, not
            // the recording date
            sentence.timestamp = clock.now();
        }

        for callback in callbacks.read().unwrap().iter() {
            callback(&sentence);
        }
        emitted += 1;
    }

    done.signal();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use aisvigil_core::clock::ManualClock;
    use chrono::TimeZone;

    fn stream(text: &str) -> ReplayInput {
        ReplayInput::Stream(Box::new(Cursor::new(text.to_string().into_bytes())))
    }

    fn collect_sentences(source: &LogReplaySource) -> Arc<Mutex<Vec<NmeaSentence>>> {
        let collected = Arc::new(Mutex::new(Vec::new()));
        let sink = collected.clone();
        source.on_sentence(move |sentence| sink.lock().unwrap().push(sentence.clone()));
        collected
    }

    fn wait_done(source: &LogReplaySource) {
        for _ in 0..200 {
            if source.is_done() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("replay did not finish in time");
    }

    #[test]
    fn test_fast_mode_delivers_everything() {
        let log = "\
$GPZDA,120000.00,01,06,2024,00,00\n\
$GPHDT,274.07,T*03\n\
$GPRMC,120001,A,4807.038,N,01131.000,E,022.4,084.4,010624,,\n";
        let source = LogReplaySource::new(vec![stream(log)], false);
        let collected = collect_sentences(&source);

        source.start_decode().unwrap();
        source.stop_decode();

        let sentences = collected.lock().unwrap();
        assert_eq!(sentences.len(), 3);
        assert_eq!(sentences[0].id, SentenceId::ZDA);
        assert_eq!(sentences[1].field(0), "274.07");
        assert!(source.is_done());
    }

    #[test]
    fn test_multiple_inputs_processed_in_order() {
        let source = LogReplaySource::new(
            vec![stream("$GPHDT,10.0,T\n"), stream("$GPHDT,20.0,T\n")],
            false,
        );
        let collected = collect_sentences(&source);

        source.start_decode().unwrap();
        source.stop_decode();

        let sentences = collected.lock().unwrap();
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].field(0), "10.0");
        assert_eq!(sentences[1].field(0), "20.0");
    }

    #[test]
    fn test_pipe_delimited_records_carry_timestamps() {
        // 2024-06-01T12:00:00Z in unix milliseconds
        let t0 = 1_717_243_200_000i64;
        let log = format!(
            "{}|$GPHDT,10.0,T\n{}|$GPHDT,20.0,T\n",
            t0,
            t0 + 2_000
        );
        let source = LogReplaySource::new(vec![stream(&log)], false);
        let collected = collect_sentences(&source);

        source.start_decode().unwrap();
        source.stop_decode();

        let sentences = collected.lock().unwrap();
        assert_eq!(sentences.len(), 2);
        assert_eq!(
            sentences[0].timestamp,
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
        );
        assert_eq!(
            sentences[1].timestamp,
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 2).unwrap()
        );
    }

    #[test]
    fn test_garbage_lines_are_skipped() {
        let log = "# comment\n\nnot a sentence\n$GPHDT,10.0,T\n";
        let source = LogReplaySource::new(vec![stream(log)], false);
        let collected = collect_sentences(&source);

        source.start_decode().unwrap();
        source.stop_decode();

        assert_eq!(collected.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_realtime_pacing_and_timestamp_rewrite() {
        // ZDA anchors the log at 12:00:00; later sentences at +1 s and +3 s
        let log = "\
$GPRMC,115959,A,4807.038,N,01131.000,E,0.0,0.0,010624,,\n\
$GPZDA,120000.00,01,06,2024,00,00\n\
1717243201000|$GPHDT,10.0,T\n\
1717243203000|$GPHDT,20.0,T\n";

        let start = Utc.with_ymd_and_hms(2030, 1, 1, 8, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let source = LogReplaySource::with_clock(vec![stream(log)], true, clock.clone());
        let collected = collect_sentences(&source);

        source.start_decode().unwrap();
        wait_done(&source);
        source.stop_decode();

        let sentences = collected.lock().unwrap();
        // The RMC precedes the time reference and is dropped
        assert_eq!(sentences.len(), 3);
        assert_eq!(sentences[0].id, SentenceId::ZDA);

        // Rewritten timestamps follow the wall clock at the original cadence
        assert_eq!(sentences[0].timestamp, start);
        assert_eq!(
            sentences[1].timestamp,
            start + chrono::Duration::seconds(1)
        );
        assert_eq!(
            sentences[2].timestamp,
            start + chrono::Duration::seconds(3)
        );
    }

    #[test]
    fn test_realtime_timestamps_are_monotonic() {
        let log = "\
$GPZDA,120000.00,01,06,2024,00,00\n\
1717243200500|$GPHDT,10.0,T\n\
1717243200700|$GPHDT,20.0,T\n\
1717243201000|$GPHDT,30.0,T\n";
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2030, 1, 1, 8, 0, 0).unwrap(),
        ));
        let source = LogReplaySource::with_clock(vec![stream(log)], true, clock);
        let collected = collect_sentences(&source);

        source.start_decode().unwrap();
        wait_done(&source);
        source.stop_decode();

        let sentences = collected.lock().unwrap();
        assert_eq!(sentences.len(), 4);
        for pair in sentences.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }
}
