use std::env;
use std::io::{self, BufRead, IsTerminal};

use dbfetch_s3::{
    format_size, format_timestamp, BucketSummary, Error, Resolution, Result, Selection,
    SelectionIndex,
};
use owo_colors::OwoColorize;

fn render_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect();
    format!("{}\n", padded.join("  ").trim_end())
}

/// Left aligned table with a header rule, every row ends in a newline.
pub fn render_table<S: AsRef<str>>(headers: &[&str], rows: &[Vec<S>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            let cell: &str = cell.as_ref();
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = render_line(headers.iter().copied(), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&render_line(rule.iter().map(String::as_str), &widths));
    for row in rows {
        out.push_str(&render_line(row.iter().map(|cell| cell.as_ref()), &widths));
    }
    out
}

pub fn bucket_table(buckets: &[BucketSummary]) -> String {
    let rows: Vec<Vec<String>> = buckets
        .iter()
        .map(|b| {
            vec![
                b.name.clone(),
                b.created.as_deref().map(format_timestamp).unwrap_or_default(),
            ]
        })
        .collect();
    render_table(&["Name", "Created"], &rows)
}

pub fn object_table(resolution: &Resolution) -> String {
    let rows: Vec<Vec<String>> = resolution
        .objects
        .iter()
        .enumerate()
        .map(|(i, obj)| {
            vec![
                (i + 1).to_string(),
                obj.key.clone(),
                format_size(obj.size),
                obj.last_modified
                    .as_deref()
                    .map(format_timestamp)
                    .unwrap_or_default(),
            ]
        })
        .collect();
    render_table(&["#", "Key", "Size", "Last Modified"], &rows)
}

pub fn print_buckets(buckets: &[BucketSummary]) {
    if buckets.is_empty() {
        warning("No buckets found.");
        return;
    }
    print!("{}", bucket_table(buckets));
}

pub fn print_objects(resolution: &Resolution) {
    print!("{}", object_table(resolution));
    let hidden = resolution.hidden();
    if hidden > 0 {
        note(&format!(
            "Showing {} of {} matches, {hidden} hidden. Raise --max-keys to see more.",
            resolution.objects.len(),
            resolution.total_seen
        ));
    }
}

/// Which standard streams are attached to a terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Tty {
    stdin: bool,
    stdout: bool,
    stderr: bool,
    no_color: bool,
}

impl Tty {
    fn detect() -> Self {
        Self {
            stdin: io::stdin().is_terminal(),
            stdout: io::stdout().is_terminal(),
            stderr: io::stderr().is_terminal(),
            no_color: env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty()),
        }
    }

    /// dialoguer reads from stdin and draws on stderr, it needs both.
    fn can_prompt(&self) -> bool {
        self.stdin && self.stderr
    }

    fn color_stdout(&self) -> bool {
        self.stdout && !self.no_color
    }

    fn color_stderr(&self) -> bool {
        self.stderr && !self.no_color
    }
}

#[derive(Debug, Clone, Copy)]
enum Tone {
    Note,
    Success,
    Warning,
}

fn styled(msg: &str, tone: Tone, color: bool) -> String {
    if !color {
        return msg.to_string();
    }
    match tone {
        Tone::Note => msg.dimmed().to_string(),
        Tone::Success => msg.green().to_string(),
        Tone::Warning => msg.yellow().to_string(),
    }
}

fn error_line(err: &Error, color: bool) -> String {
    let label = if err.is_store() { "AWS Error" } else { "Error" };
    if color {
        format!("{}: {err}", label.red().bold())
    } else {
        format!("{label}: {err}")
    }
}

pub fn note(msg: &str) {
    println!("{}", styled(msg, Tone::Note, Tty::detect().color_stdout()));
}

pub fn success(msg: &str) {
    println!("{}", styled(msg, Tone::Success, Tty::detect().color_stdout()));
}

pub fn warning(msg: &str) {
    println!("{}", styled(msg, Tone::Warning, Tty::detect().color_stdout()));
}

pub fn report_error(err: &Error) {
    eprintln!("{}", error_line(err, Tty::detect().color_stderr()));
}

fn prompt_text(index: &SelectionIndex) -> String {
    format!("Backup to download [1-{}], empty to skip", index.len())
}

/// Asks which backup to fetch. A terminal gets re-prompted until the input
/// is valid, anything else gets exactly one attempt.
pub fn prompt_selection(index: &SelectionIndex) -> Result<Selection> {
    if !Tty::detect().can_prompt() {
        return read_selection(io::stdin().lock(), index);
    }

    let input: String = dialoguer::Input::new()
        .with_prompt(prompt_text(index))
        .allow_empty(true)
        .validate_with(|input: &String| index.validate(input).map(|_| ()).map_err(|e| e.0))
        .interact_text()
        .map_err(io::Error::other)?;

    Ok(index.validate(&input)?)
}

/// Reads a single answer, EOF counts as skip.
pub fn read_selection(mut reader: impl BufRead, index: &SelectionIndex) -> Result<Selection> {
    println!("{}:", prompt_text(index));
    let mut line = String::new();
    reader.read_line(&mut line)?;
    Ok(index.validate(&line)?)
}
