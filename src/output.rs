//! Output formatting for query results

use crate::index::types::Pos;
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

fn stdout(color: bool) -> StandardStream {
    let choice = if color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stdout(choice)
}

/// Print single-statement matches, one per line
pub fn print_positions(positions: &[Pos], color: bool) -> io::Result<()> {
    let mut out = stdout(color);
    write_positions(&mut out, positions)
}

/// Print statement sequences, chains separated by `--`
pub fn print_sequences(chains: &[Vec<Pos>], color: bool) -> io::Result<()> {
    let mut out = stdout(color);
    write_sequences(&mut out, chains)
}

/// Print results as pretty JSON
pub fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> io::Result<()> {
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)
}

pub fn write_positions<W: WriteColor>(out: &mut W, positions: &[Pos]) -> io::Result<()> {
    for pos in positions {
        write_pos(out, pos)?;
    }
    Ok(())
}

pub fn write_sequences<W: WriteColor>(out: &mut W, chains: &[Vec<Pos>]) -> io::Result<()> {
    for (i, chain) in chains.iter().enumerate() {
        if i > 0 {
            out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
            writeln!(out, "--")?;
            out.reset()?;
        }
        write_positions(out, chain)?;
    }
    Ok(())
}

/// `file:line:col-line:col [project]`, then the enclosing method when known
fn write_pos<W: WriteColor>(out: &mut W, pos: &Pos) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
    write!(out, "{}", pos.file)?;
    out.reset()?;
    write!(out, ":")?;

    out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
    write!(out, "{}-{}", pos.start, pos.end)?;
    out.reset()?;

    out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
    write!(out, " [{}]", pos.project)?;
    out.reset()?;

    if !pos.method_start.is_none() {
        write!(out, " in method {}-{}", pos.method_start, pos.method_end)?;
    }
    writeln!(out)
}
