use std::io::{self, Write};

use itergen::bound::BoundProgram;
use itergen::lower::LoweringOutput;
use itergen::util::Indented;
use ron::ser::PrettyConfig;
use serde::Serialize;

use super::config::{BoundOutputFormat, LoweredOutputFormat};

fn dump_ron(value: &impl Serialize, mut out: impl Write) -> io::Result<()> {
    let config = PrettyConfig::new().struct_names(true);
    let text = ron::ser::to_string_pretty(value, config)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

    writeln!(out, "{}", text)
}

pub fn dump_bound(
    format: BoundOutputFormat,
    program: &BoundProgram,
    mut out: impl Write,
) -> io::Result<()> {
    match format {
        BoundOutputFormat::Ron => dump_ron(program, out),
        BoundOutputFormat::Debug => writeln!(out, "{:#?}", program),
    }
}

pub fn dump_lowered(
    format: LoweredOutputFormat,
    output: &LoweringOutput,
    mut out: impl Write,
) -> io::Result<()> {
    match format {
        LoweredOutputFormat::Text => dump_lowered_text(output, out),
        LoweredOutputFormat::Ron => dump_ron(output, out),
        LoweredOutputFormat::Debug => writeln!(out, "{:#?}", output),
    }
}

fn dump_lowered_text(output: &LoweringOutput, mut out: impl Write) -> io::Result<()> {
    use std::fmt::Write as _;

    let mut text = String::new();

    for ty in output.types.values() {
        writeln!(text, "{}", ty).ok();
    }

    for (name, method) in &output.methods {
        let kind = if method.is_static { "static " } else { "" };
        writeln!(text, "{}method {}:", kind, name).ok();
        write!(Indented::new(&mut text), "{}", method.body).ok();
        writeln!(text).ok();
    }

    write!(out, "{}", text)
}
