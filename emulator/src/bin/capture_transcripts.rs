use std::io;

#[allow(dead_code)]
#[path = "../command.rs"]
mod command;
#[allow(dead_code)]
#[path = "../session.rs"]
mod session;
#[allow(dead_code)]
#[path = "../wheel.rs"]
mod wheel;

use session::{Session, TranscriptProfile};

fn main() -> io::Result<()> {
    record_profile(TranscriptProfile::Cranking)?;
    record_profile(TranscriptProfile::Running)?;
    record_profile(TranscriptProfile::Sequential)?;
    Ok(())
}

fn record_profile(profile: TranscriptProfile) -> io::Result<()> {
    let mut session = Session::new(profile)?;
    let script: &[&str] = match profile {
        TranscriptProfile::Cranking => CRANKING,
        TranscriptProfile::Running => RUNNING,
        TranscriptProfile::Sequential => SEQUENTIAL,
    };
    for line in script {
        let _ = session.handle_command(line)?;
    }
    Ok(())
}

/// Starter speed, a false start, then a catch.
const CRANKING: &[&str] = &[
    "help",
    "rpm 180",
    "spin 3",
    "status",
    "stall 1500",
    "rpm 220",
    "spin 2",
    "extra",
    "spin",
    "rpm 900",
    "spin 3",
    "status",
    "log",
];

/// Steady running with glitches and a counter wrap.
const RUNNING: &[&str] = &[
    "rpm 3000",
    "spin 3",
    "angle",
    "advance 7",
    "angle",
    "drop",
    "spin",
    "extra",
    "spin",
    "extra 65%",
    "spin",
    "wrap",
    "spin 2",
    "status",
    "reset",
    "spin 2",
    "log",
];

/// Cam confirmation, cam failure, recovery.
const SEQUENTIAL: &[&str] = &[
    "cam on",
    "rpm 2500",
    "spin 4",
    "status",
    "advance 30",
    "angle",
    "cam off",
    "spin 4",
    "status",
    "cam on",
    "spin 2",
    "status",
    "log",
];
