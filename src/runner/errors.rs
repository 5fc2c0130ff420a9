use std::error::Error;

use owo_colors::{OwoColorize, Stream};

use itergen::errors::{Diagnostic, Level};

fn format_level(level: Level) -> String {
    match level {
        Level::Internal => format!(
            "{}",
            "ICE  ".if_supports_color(Stream::Stderr, |text| text.magenta())
        ),

        Level::Fatal => format!(
            "{}",
            "FATAL".if_supports_color(Stream::Stderr, |text| text.red())
        ),

        Level::Error => format!(
            "{}",
            "ERROR".if_supports_color(Stream::Stderr, |text| text.bright_red())
        ),

        Level::Warn => format!(
            "{}",
            "WARN ".if_supports_color(Stream::Stderr, |text| text.yellow())
        ),

        Level::Info => format!(
            "{}",
            "INFO ".if_supports_color(Stream::Stderr, |text| text.bright_cyan())
        ),
    }
}

pub fn print_diagnostic(diagnostic: &Diagnostic) {
    let level = format_level(diagnostic.level);
    eprintln!("{} {}", level, diagnostic.message);

    let mut source = diagnostic.source();

    while let Some(e) = source {
        let cause = e.to_string();

        if cause != diagnostic.message.message {
            eprintln!("      caused by: {}", cause);
        }

        source = e.source();
    }
}
