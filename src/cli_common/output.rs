//! Модуль для форматирования и вывода результатов

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use std::io::{self, Write};
use std::str::FromStr;

/// Формат вывода результатов
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "table" => Ok(OutputFormat::Table),
            _ => Err(anyhow::anyhow!("Unknown output format: {}", s)),
        }
    }
}

/// Writer для вывода результатов
pub struct OutputWriter {
    writer: Box<dyn Write>,
    format: OutputFormat,
    pretty: bool,
}

impl OutputWriter {
    /// Создает writer для stdout
    pub fn stdout(format: OutputFormat) -> Self {
        Self::new(Box::new(io::stdout()), format)
    }

    pub fn new(writer: Box<dyn Write>, format: OutputFormat) -> Self {
        Self {
            writer,
            format,
            pretty: true,
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Включает pretty-печать для JSON
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Записывает сериализуемый объект как JSON
    pub fn write_object<T: Serialize>(&mut self, obj: &T) -> Result<()> {
        let json = if self.pretty {
            serde_json::to_string_pretty(obj)?
        } else {
            serde_json::to_string(obj)?
        };
        writeln!(self.writer, "{}", json)?;
        Ok(())
    }

    /// Записывает строку
    pub fn write_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.writer, "{}", line)?;
        Ok(())
    }

    /// Записывает заголовок
    pub fn write_header(&mut self, header: &str) -> Result<()> {
        match self.format {
            OutputFormat::Text => {
                writeln!(self.writer, "\n{}", header.bold().blue())?;
                writeln!(self.writer, "{}", "=".repeat(header.chars().count()).blue())?;
            }
            _ => {
                writeln!(self.writer, "{}", header)?;
            }
        }
        Ok(())
    }

    /// Записывает таблицу; ширина колонок считается в символах
    pub fn write_table(&mut self, headers: &[&str], rows: Vec<Vec<String>>) -> Result<()> {
        let mut widths = headers.iter().map(|h| h.chars().count()).collect::<Vec<_>>();
        for row in &rows {
            for (i, cell) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(cell.chars().count());
                }
            }
        }

        for (i, header) in headers.iter().enumerate() {
            if i > 0 {
                write!(self.writer, " │ ")?;
            }
            write!(self.writer, "{}", pad(header, widths[i]).bold())?;
        }
        writeln!(self.writer)?;

        for (i, width) in widths.iter().enumerate() {
            if i > 0 {
                write!(self.writer, "─┼─")?;
            }
            write!(self.writer, "{}", "─".repeat(*width))?;
        }
        writeln!(self.writer)?;

        for row in rows {
            for (i, cell) in row.iter().enumerate() {
                if i > 0 {
                    write!(self.writer, " │ ")?;
                }
                match widths.get(i) {
                    Some(width) => write!(self.writer, "{}", pad(cell, *width))?,
                    None => write!(self.writer, "{}", cell)?,
                }
            }
            writeln!(self.writer)?;
        }
        Ok(())
    }

    /// Завершает запись и сбрасывает буфер
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

fn pad(text: &str, width: usize) -> String {
    let len = text.chars().count();
    format!("{}{}", text, " ".repeat(width.saturating_sub(len)))
}
