//! Output formatting for the qtree CLI

use qtree::query::{ItemId, QueryTree};
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

const BYTES_PER_LINE: usize = 16;

fn stdout(color: bool) -> StandardStream {
    let choice = if color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stdout(choice)
}

/// Print the one-line text form of the query
pub fn print_text(tree: &QueryTree) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", tree)
}

/// Print the query as an indented outline, one item per line
pub fn print_outline(tree: &QueryTree, color: bool) -> io::Result<()> {
    let mut stdout = stdout(color);
    if let Some(root) = tree.query_root() {
        print_outline_item(&mut stdout, tree, root, 0)?;
    }
    Ok(())
}

fn print_outline_item(stdout: &mut StandardStream, tree: &QueryTree, id: ItemId, depth: usize) -> io::Result<()> {
    let Ok(item) = tree.item(id) else {
        return Ok(());
    };
    write!(stdout, "{:width$}", "", width = depth * 2)?;

    let composite = item.is_composite();
    let color = if composite { Color::Cyan } else { Color::Green };
    stdout.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(composite))?;
    write!(stdout, "{}", item.item_type())?;
    stdout.reset()?;

    if !composite || tree.child_count(id) == 0 {
        write!(stdout, " {}", tree.display(id))?;
    }

    stdout.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
    if let Some(uid) = item.unique_id() {
        write!(stdout, " [id {}]", uid)?;
    }
    if let Some(label) = item.label() {
        write!(stdout, " [label {}]", label)?;
    }
    if let Some(significance) = item.significance() {
        write!(stdout, " [significance {}]", significance)?;
    }
    if let Some(edge) = tree.connectivity(id) {
        let target = tree.item(edge.target).ok().and_then(|t| t.unique_id());
        match target {
            Some(uid) => write!(stdout, " [-> {} w={}]", uid, edge.weight)?,
            None => write!(stdout, " [-> {} w={}]", edge.target, edge.weight)?,
        }
    }
    if tree.locked_segment(id).is_some() {
        write!(stdout, " [locked]")?;
    }
    stdout.reset()?;
    writeln!(stdout)?;

    if composite {
        for &child in tree.children(id) {
            print_outline_item(stdout, tree, child, depth + 1)?;
        }
    }
    Ok(())
}

/// Print the JSON description of the query
pub fn print_json(tree: &QueryTree) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    match tree.to_spec() {
        Some(spec) => {
            let json = serde_json::to_string_pretty(&spec).map_err(io::Error::other)?;
            writeln!(stdout, "{}", json)
        }
        None => writeln!(stdout, "null"),
    }
}

/// Print an encoded payload as a hex dump followed by its item count
pub fn print_payload(payload: &[u8], item_count: usize, color: bool) -> io::Result<()> {
    let mut stdout = stdout(color);
    for (line, chunk) in payload.chunks(BYTES_PER_LINE).enumerate() {
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
        write!(stdout, "{:08x}", line * BYTES_PER_LINE)?;
        stdout.reset()?;
        write!(stdout, "  {}", hex_line(chunk))?;
        writeln!(stdout, "  |{}|", ascii_line(chunk))?;
    }
    stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
    write!(stdout, "{}", item_count)?;
    stdout.reset()?;
    writeln!(stdout, " items, {} bytes", payload.len())
}

/// Write the raw payload bytes to stdout
pub fn write_raw(payload: &[u8]) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(payload)?;
    stdout.flush()
}

fn hex_line(chunk: &[u8]) -> String {
    let mut out = String::with_capacity(BYTES_PER_LINE * 3);
    for i in 0..BYTES_PER_LINE {
        if i == BYTES_PER_LINE / 2 {
            out.push(' ');
        }
        match chunk.get(i) {
            Some(byte) => out.push_str(&format!("{:02x} ", byte)),
            None => out.push_str("   "),
        }
    }
    out.pop();
    out
}

fn ascii_line(chunk: &[u8]) -> String {
    chunk
        .iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
        .collect()
}
