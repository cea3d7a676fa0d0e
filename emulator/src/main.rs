mod command;
mod session;
mod wheel;

use std::env;
use std::io::{self, Write};
use std::process;

use session::{Session, TranscriptProfile};

const USAGE: &str =
    "Usage: trigger-emulator [cranking|running|sequential] [--rpm <n>] [--cam]";

/// Command-line launch settings.
#[derive(Debug, Eq, PartialEq)]
struct LaunchOptions {
    profile: TranscriptProfile,
    /// Wheel speed set before the first prompt.
    rpm: Option<u32>,
    cam: bool,
}

impl LaunchOptions {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, String> {
        let mut options = Self {
            profile: TranscriptProfile::Running,
            rpm: None,
            cam: false,
        };
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--rpm" => {
                    let value = args.next().ok_or("Expected a speed after --rpm")?;
                    let rpm = value
                        .parse()
                        .map_err(|_| format!("Invalid wheel speed `{value}`"))?;
                    options.rpm = Some(rpm);
                }
                "--cam" => options.cam = true,
                tag => options.profile = TranscriptProfile::from_tag(tag)?,
            }
        }
        Ok(options)
    }

    /// REPL lines replayed before handing control to the user.
    fn startup_commands(&self) -> Vec<String> {
        let mut commands = Vec::new();
        if self.cam {
            commands.push("cam on".to_string());
        }
        if let Some(rpm) = self.rpm {
            commands.push(format!("rpm {rpm}"));
        }
        commands
    }
}

fn main() -> io::Result<()> {
    let options = LaunchOptions::parse(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let mut session = Session::new(options.profile)?;
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    writeln!(
        writer,
        "{} ready. Type `help` for commands or `quit` to leave.",
        options.profile.header()
    )?;
    for command in options.startup_commands() {
        writeln!(writer, "> {command}")?;
        for response in session.handle_command(&command)? {
            writeln!(writer, "{response}")?;
        }
    }

    session.run_repl(io::stdin().lock(), writer)
}
