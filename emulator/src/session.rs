use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufWriter, Write};
use std::path::Path;

use trigger_core::telemetry::{DecoderRecord, EventId};
use trigger_core::{FilterLevel, MaxCrankAngle, SharedDecoder, SyncStatus, TriggerConfig};

use crate::command::{Command, parse_command};
use crate::wheel::{Glitch, WheelEdge, WheelSimulator};

/// Polling period of the simulated main loop.
const POLL_PERIOD_MICROS: u64 = 10_000;
/// Lead time given by `wrap` before the timestamp counter overflows.
const WRAP_LEAD_MICROS: u32 = 2_000;

pub const HELP_TOPICS: &[(&str, &str)] = &[
    ("rpm", "rpm <n>                 - set wheel speed (0 stops the wheel)"),
    ("spin", "spin [revolutions]      - turn the wheel, polling every 10ms"),
    ("advance", "advance <duration>      - let simulated time pass"),
    ("stall", "stall <duration>        - stop the wheel and wait"),
    ("drop", "drop                    - swallow the next tooth"),
    ("extra", "extra [percent]         - add a noise pulse into the next pitch (default 30%)"),
    ("cam", "cam on|off              - enable the once-per-cycle cam tooth"),
    ("wrap", "wrap                    - make the 32-bit clock overflow shortly"),
    ("status", "status                  - show decoder state"),
    ("angle", "angle                   - show the current crank angle"),
    ("reset", "reset                   - reset the decoder (engine stopped)"),
    ("log", "log                     - list retained decoder events"),
    ("help", "help [topic]            - show help for a command"),
    ("quit", "quit | exit             - close the session"),
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptProfile {
    Cranking,
    Running,
    Sequential,
}

impl TranscriptProfile {
    pub fn log_path(self) -> &'static str {
        match self {
            TranscriptProfile::Cranking => "transcripts/emulator-cranking.log",
            TranscriptProfile::Running => "transcripts/emulator-running.log",
            TranscriptProfile::Sequential => "transcripts/emulator-sequential.log",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            TranscriptProfile::Cranking => "Trigger emulator cranking transcript (60-2)",
            TranscriptProfile::Running => "Trigger emulator running transcript (36-1)",
            TranscriptProfile::Sequential => "Trigger emulator sequential transcript (36-1 + cam)",
        }
    }

    /// Wheel and decoder tuning simulated by the profile.
    pub fn config(self) -> TriggerConfig {
        match self {
            TranscriptProfile::Cranking => {
                TriggerConfig::missing_tooth(60, 2).with_noise_filter(20, FilterLevel::Lite)
            }
            TranscriptProfile::Running => TriggerConfig::missing_tooth(36, 1),
            TranscriptProfile::Sequential => TriggerConfig::missing_tooth(36, 1)
                .with_max_crank_angle(MaxCrankAngle::Degrees720),
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("cranking") {
            Ok(Self::Cranking)
        } else if tag.eq_ignore_ascii_case("running") {
            Ok(Self::Running)
        } else if tag.eq_ignore_ascii_case("sequential") {
            Ok(Self::Sequential)
        } else {
            Err(format!("Unknown transcript profile `{tag}`"))
        }
    }
}

pub struct Session {
    decoder: SharedDecoder,
    wheel: WheelSimulator,
    transcript: TranscriptLogger,
    next_event: EventId,
    closed: bool,
}

impl Session {
    /// Starts a session that records its transcript under the profile's log path.
    pub fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let transcript = TranscriptLogger::new(profile)?;
        Self::with_transcript(profile, transcript)
    }

    /// Starts a session whose transcript is discarded.
    #[cfg(test)]
    pub fn detached(profile: TranscriptProfile) -> io::Result<Self> {
        Self::with_transcript(profile, TranscriptLogger::discard())
    }

    fn with_transcript(
        profile: TranscriptProfile,
        transcript: TranscriptLogger,
    ) -> io::Result<Self> {
        let config = profile.config();
        let decoder = SharedDecoder::new(config)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
        Ok(Self {
            decoder,
            wheel: WheelSimulator::new(config.teeth_per_revolution, config.missing_teeth),
            transcript,
            next_event: 0,
            closed: false,
        })
    }

    /// Prompts on `output` and executes lines from `input` until `quit` or
    /// end of input.
    pub fn run_repl(&mut self, mut input: impl BufRead, mut output: impl Write) -> io::Result<()> {
        let mut line = String::new();
        while !self.closed {
            write!(output, "> ")?;
            output.flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                writeln!(output)?;
                break;
            }
            for response in self.handle_command(&line)? {
                writeln!(output, "{response}")?;
            }
        }
        Ok(())
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.wheel.elapsed_micros();
        self.transcript
            .append_line(elapsed, TranscriptRole::Host, trimmed)?;

        let lines = match parse_command(trimmed) {
            Ok(command) => self.execute(command),
            Err(err) => vec![format!("ERR syntax {err}")],
        };

        let elapsed = self.wheel.elapsed_micros();
        self.record_output(elapsed, &lines)?;
        Ok(lines)
    }

    fn execute(&mut self, command: Command) -> Vec<String> {
        match command {
            Command::Rpm(rpm) => {
                self.wheel.set_rpm(rpm);
                match self.wheel.pitch_micros() {
                    Some(pitch) => vec![format!("OK rpm={rpm} pitch={pitch}us")],
                    None => vec!["OK wheel stopped".to_string()],
                }
            }
            Command::Spin(revolutions) => match self.wheel.revolution_micros() {
                Some(revolution) => {
                    let edges = self.run_for(revolution * u64::from(revolutions));
                    self.report_run(format!("OK spun {revolutions} rev edges={edges}"))
                }
                None => vec!["ERR wheel stopped; set rpm first".to_string()],
            },
            Command::Advance(millis) => {
                let edges = self.run_for(u64::from(millis) * 1_000);
                self.report_run(format!("OK advanced {millis}ms edges={edges}"))
            }
            Command::Stall(millis) => {
                self.wheel.set_rpm(0);
                self.run_for(u64::from(millis) * 1_000);
                self.report_run(format!("OK wheel stopped for {millis}ms"))
            }
            Command::Drop => {
                self.wheel.inject(Glitch::Drop);
                vec!["OK next tooth will be dropped".to_string()]
            }
            Command::Extra(percent) => match u8::try_from(percent) {
                Ok(percent @ 1..=99) => {
                    self.wheel.inject(Glitch::Extra { percent });
                    vec![format!("OK noise pulse armed at {percent}% of the next pitch")]
                }
                _ => vec!["ERR extra pulse must land inside the pitch (1-99%)".to_string()],
            },
            Command::Cam(enabled) => {
                self.wheel.set_cam(enabled);
                vec![format!("OK cam {}", if enabled { "on" } else { "off" })]
            }
            Command::Wrap => {
                self.wheel.wrap_clock_in(WRAP_LEAD_MICROS);
                vec![format!(
                    "OK clock at {} wraps in {}us",
                    self.wheel.now(),
                    WRAP_LEAD_MICROS
                )]
            }
            Command::Status => self.status_lines(),
            Command::Angle => {
                let angle = self.decoder.crank_angle(self.wheel.now());
                vec![format!("angle={}", format_millidegrees(angle))]
            }
            Command::Reset => {
                self.decoder.reset_decoder(self.wheel.now());
                self.report_run("OK decoder reset".to_string())
            }
            Command::Log => {
                let records = self.decoder.events_since(0);
                if records.is_empty() {
                    return vec!["log: empty".to_string()];
                }
                records.iter().map(describe_record).collect()
            }
            Command::Help(topic) => help_lines(topic.as_deref()),
            Command::Quit => {
                self.closed = true;
                vec!["Session closed.".to_string()]
            }
        }
    }

    /// Runs the wheel for `micros`, polling the decoder every period like the
    /// firmware main loop. Returns the number of edges delivered.
    fn run_for(&mut self, micros: u64) -> usize {
        let mut remaining = micros;
        let mut edges = 0;
        while remaining > 0 {
            let step = remaining.min(POLL_PERIOD_MICROS);
            let decoder = &self.decoder;
            self.wheel.advance(step, |edge| {
                edges += 1;
                match edge {
                    WheelEdge::Crank(timestamp) => {
                        decoder.on_tooth_edge(timestamp);
                    }
                    WheelEdge::Cam(timestamp) => {
                        decoder.on_secondary_tooth_edge(timestamp);
                    }
                }
            });
            self.decoder.tick(self.wheel.now());
            remaining -= step;
        }
        edges
    }

    fn report_run(&mut self, head: String) -> Vec<String> {
        let mut lines = vec![head];
        for record in self.decoder.events_since(self.next_event) {
            lines.push(format!("EVENT {}", describe_record(&record)));
            self.next_event = record.id.wrapping_add(1);
        }
        lines.push(self.summary());
        lines
    }

    fn summary(&self) -> String {
        let snapshot = self.decoder.snapshot();
        format!(
            "sync={} rpm={} angle={} losses={}",
            sync_label(snapshot.sync_status()),
            snapshot.rpm(),
            format_millidegrees(snapshot.crank_angle(self.wheel.now())),
            snapshot.state.sync_loss_count()
        )
    }

    fn status_lines(&self) -> Vec<String> {
        let snapshot = self.decoder.snapshot();
        let state = &snapshot.state;
        vec![
            self.summary(),
            format!(
                "revolutions={} tooth={} revolution-time={}us stall-after={}us",
                state.revolution_count(),
                state.tooth_index(),
                state.revolution_time_micros(),
                state.max_stall_interval_micros()
            ),
            format!(
                "wheel rpm={} cam={} clock={}",
                self.wheel.rpm(),
                if self.wheel.cam_enabled() { "on" } else { "off" },
                self.wheel.now()
            ),
        ]
    }

    fn record_output(&mut self, elapsed: u64, lines: &[String]) -> io::Result<()> {
        for line in lines {
            self.transcript
                .append_line(elapsed, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }
}

struct TranscriptLogger {
    writer: BufWriter<Box<dyn Write>>,
}

impl TranscriptLogger {
    fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let path = Path::new(profile.log_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(Box::new(file)),
        };

        logger.write_header(profile)?;
        Ok(logger)
    }

    #[cfg(test)]
    fn discard() -> Self {
        Self {
            writer: BufWriter::new(Box::new(io::sink())),
        }
    }

    fn write_header(&mut self, profile: TranscriptProfile) -> io::Result<()> {
        writeln!(self.writer, "# {}", profile.header())?;
        writeln!(
            self.writer,
            "# Timestamps are simulated milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed_micros: u64,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6}.{:03} ms] {} {}",
            elapsed_micros / 1_000,
            elapsed_micros % 1_000,
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

fn help_lines(topic: Option<&str>) -> Vec<String> {
    match topic {
        None => {
            let mut lines = vec![format!("Commands: {}", help_topic_list())];
            lines.push("Use `help <topic>` for details.".to_string());
            lines
        }
        Some(topic) => match HELP_TOPICS.iter().find(|(name, _)| *name == topic) {
            Some((_, text)) => vec![(*text).to_string()],
            None => vec![format!("ERR unknown help topic `{topic}`")],
        },
    }
}

fn help_topic_list() -> String {
    let mut buffer = String::new();
    for (index, (name, _)) in HELP_TOPICS.iter().enumerate() {
        if index > 0 {
            buffer.push_str(", ");
        }
        buffer.push_str(name);
    }
    buffer
}

fn describe_record(record: &DecoderRecord) -> String {
    format!("#{} t={}us {}", record.id, record.timestamp, record.event)
}

fn sync_label(status: SyncStatus) -> &'static str {
    match status {
        SyncStatus::Unsynced => "none",
        SyncStatus::HalfSync => "half",
        SyncStatus::FullSync => "full",
    }
}

fn format_millidegrees(angle: i32) -> String {
    format!("{}.{:03}deg", angle / 1_000, angle % 1_000)
}
