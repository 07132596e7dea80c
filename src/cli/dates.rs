use std::fmt::Display;

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate};
use chrono_english::parse_date_string;
use clap::{CommandFactory, ValueEnum};

use crate::utils::time::record_name_to_month;

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

fn validation_error(message: String) -> anyhow::Error {
    Args::command()
        .error(clap::error::ErrorKind::ValueValidation, message)
        .into()
}

/// Parses a calendar day like "yesterday", "15/03/2025" or "2 days ago" relative to `now`.
pub fn parse_day(input: &str, style: DateStyle, now: DateTime<Local>) -> Result<NaiveDate> {
    match parse_date_string(input, now, style.into()) {
        Ok(date) => Ok(date.date_naive()),
        Err(e) => Err(validation_error(format!(
            "Failed to validate date {input:?} {e}"
        ))),
    }
}

/// Parses `YYYY-MM`.
pub fn parse_month(input: &str) -> Result<(i32, u32)> {
    record_name_to_month(input)
        .ok_or_else(|| validation_error(format!("Expected a month as YYYY-MM, got {input:?}")))
}
