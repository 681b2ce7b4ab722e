//! Rendering of command results for `--output`.
//!
//! A [`Printer`] is built once from the global flags and handed to every
//! command. Tables go through `tabled`; json, json-compact and yaml encode
//! the serde form of the data, so structured output never depends on the
//! table columns.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};
use touchwand_core::ThingStatus;

use crate::cli::{ColorMode, GlobalOpts, OutputFormat};
use crate::error::CliError;

pub struct Printer {
    format: OutputFormat,
    color: bool,
    quiet: bool,
}

impl Printer {
    pub fn new(global: &GlobalOpts) -> Self {
        Self {
            format: global.output.clone(),
            color: color_enabled(&global.color),
            quiet: global.quiet,
        }
    }

    /// `true` for json, json-compact and yaml.
    pub fn is_structured(&self) -> bool {
        !matches!(self.format, OutputFormat::Table | OutputFormat::Plain)
    }

    /// Several items: a rounded table, one key per line in plain mode.
    pub fn list<T, R>(
        &self,
        items: &[T],
        row: impl Fn(&T) -> R,
        key: impl Fn(&T) -> String,
    ) -> Result<(), CliError>
    where
        T: Serialize,
        R: Tabled,
    {
        let out = match self.format {
            OutputFormat::Table => {
                Table::new(items.iter().map(row)).with(Style::rounded()).to_string()
            }
            OutputFormat::Plain => items.iter().map(key).collect::<Vec<_>>().join("\n"),
            _ => encode(&self.format, items)?,
        };
        self.text(&out);
        Ok(())
    }

    /// One item: `detail` renders the human view for table mode.
    pub fn item<T: Serialize>(
        &self,
        item: &T,
        detail: impl FnOnce(&T) -> String,
        key: impl FnOnce(&T) -> String,
    ) -> Result<(), CliError> {
        let out = match self.format {
            OutputFormat::Table => detail(item),
            OutputFormat::Plain => key(item),
            _ => encode(&self.format, item)?,
        };
        self.text(&out);
        Ok(())
    }

    /// A streamed record: one compact JSON object per line for structured
    /// formats, `line` otherwise.
    pub fn record<T: Serialize>(
        &self,
        item: &T,
        line: impl FnOnce(&T, bool) -> String,
    ) -> Result<(), CliError> {
        let out = if self.is_structured() {
            encode(&OutputFormat::JsonCompact, item)?
        } else {
            line(item, self.color)
        };
        self.text(&out);
        Ok(())
    }

    /// Raw text to stdout. Suppressed by `--quiet`.
    pub fn text(&self, out: &str) {
        if self.quiet || out.is_empty() {
            return;
        }
        // Broken pipes (`| head`) are not worth an error.
        let _ = writeln!(io::stdout().lock(), "{out}");
    }

    /// A status note for humans, on stderr.
    pub fn note(&self, message: &str) {
        if !self.quiet {
            eprintln!("{message}");
        }
    }
}

fn color_enabled(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

fn encode<T: Serialize + ?Sized>(format: &OutputFormat, data: &T) -> Result<String, CliError> {
    let encoded = match format {
        OutputFormat::JsonCompact => serde_json::to_string(data).map_err(|e| e.to_string()),
        OutputFormat::Yaml => serde_yaml::to_string(data)
            .map(|s| s.trim_end().to_owned())
            .map_err(|e| e.to_string()),
        _ => serde_json::to_string_pretty(data).map_err(|e| e.to_string()),
    };
    encoded.map_err(|e| CliError::Internal(format!("cannot encode output: {e}")))
}

/// Reachability label; green online, red offline, dimmed unknown.
pub fn paint_status(status: ThingStatus, color: bool) -> String {
    let label = status.to_string();
    if !color {
        return label;
    }
    match status {
        ThingStatus::Online => label.green().to_string(),
        ThingStatus::Offline(_) => label.red().to_string(),
        ThingStatus::Unknown => label.dimmed().to_string(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use pretty_assertions::assert_eq;
    use touchwand_core::OfflineReason;

    use super::*;

    #[derive(Serialize)]
    struct Lamp {
        id: u32,
        name: &'static str,
    }

    #[test]
    fn compact_json_is_one_line() {
        let out = encode(&OutputFormat::JsonCompact, &Lamp { id: 7, name: "lamp" }).unwrap();
        assert_eq!(out, r#"{"id":7,"name":"lamp"}"#);
    }

    #[test]
    fn yaml_has_no_trailing_newline() {
        let out = encode(&OutputFormat::Yaml, &[Lamp { id: 1, name: "a" }]).unwrap();
        assert_eq!(out, "- id: 1\n  name: a");
    }

    #[test]
    fn plain_and_table_are_not_structured() {
        let printer = |format| Printer {
            format,
            color: false,
            quiet: true,
        };
        assert!(!printer(OutputFormat::Plain).is_structured());
        assert!(!printer(OutputFormat::Table).is_structured());
        assert!(printer(OutputFormat::Yaml).is_structured());
    }

    #[test]
    fn status_label_without_color() {
        assert_eq!(paint_status(ThingStatus::Online, false), "ONLINE");
        assert_eq!(
            paint_status(ThingStatus::Offline(OfflineReason::BridgeOffline), false),
            ThingStatus::Offline(OfflineReason::BridgeOffline).to_string()
        );
    }
}
