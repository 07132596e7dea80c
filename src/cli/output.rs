use ansi_term::{Colour, Style};
use chrono::{Datelike, Weekday};

use crate::{
    health::goal::DayEvaluation,
    stats::{CalendarDay, MonthStats, StatsValue, WeekDay},
    sync::SyncReport,
};

const WALKED: &str = "●";
const NOT_WALKED: &str = "○";

fn mark(walked: bool) -> String {
    if walked {
        Colour::Green.paint(WALKED).to_string()
    } else {
        Style::new().dimmed().paint(NOT_WALKED).to_string()
    }
}

pub fn print_report(report: &SyncReport) {
    if report.skipped {
        println!("Sync already completed");
        return;
    }
    if report.cloud_walks > 0 {
        println!("Cloud:\t{} manual walks", report.cloud_walks);
    }
    if report.permissions_missing {
        println!(
            "{}",
            Colour::Yellow.paint("Health data isn't available, nothing was detected")
        );
        return;
    }
    println!(
        "Checked {} days, {} new walks",
        report.days_checked, report.walks_detected
    );
    if report.timed_out {
        println!(
            "{}",
            Colour::Yellow.paint("Stopped early, run sync again to continue")
        );
    }
}

pub fn print_stat(value: &StatsValue) {
    println!("{}\t{}", Style::new().bold().paint(&value.label), value.value);
}

pub fn print_week(days: &[WeekDay]) {
    let labels = days
        .iter()
        .map(|day| format!("{:<4}", day.label))
        .collect::<String>();
    let marks = days
        .iter()
        .map(|day| format!("{}   ", mark(day.walked)))
        .collect::<String>();
    println!("{labels}");
    println!("{marks}");
}

/// Splits a month into weeks starting on Monday. Days before the first and after the last day
/// of the month are `None`.
pub fn calendar_rows(days: &[CalendarDay]) -> Vec<Vec<Option<CalendarDay>>> {
    let Some(first) = days.first() else {
        return vec![];
    };
    let padding = first.date.weekday().num_days_from_monday() as usize;

    let mut cells = vec![None; padding];
    cells.extend(days.iter().copied().map(Some));
    while cells.len() % 7 != 0 {
        cells.push(None);
    }
    cells.chunks(7).map(<[_]>::to_vec).collect()
}

pub fn print_calendar(days: &[CalendarDay]) {
    let header = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ]
    .map(|day| format!("{:<5}", &day.to_string()[..2]))
    .concat();
    println!("{}", Style::new().bold().paint(header));

    for row in calendar_rows(days) {
        let line = row
            .iter()
            .map(|cell| match cell {
                Some(day) => {
                    let number = format!("{:>2}", day.date.day());
                    let number = if day.walked {
                        Colour::Green.paint(number).to_string()
                    } else {
                        number
                    };
                    let manual = if day.manual { "*" } else { " " };
                    format!("{number}{manual}  ")
                }
                None => "     ".to_string(),
            })
            .collect::<String>();
        println!("{line}");
    }
    println!("{}", Style::new().dimmed().paint("* marked manually"));
}

pub fn print_history(years: &[i32], months: &[MonthStats], total: usize) {
    let years = years
        .iter()
        .map(i32::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    println!("Years with walks: {years}");

    for month in months {
        let line = format!("{}\t{}", month.month_name, month.walk_count);
        if month.enabled {
            println!("{line}");
        } else {
            println!("{}", Style::new().dimmed().paint(line));
        }
    }
    println!("{}\t{total}", Style::new().bold().paint("Total"));
}

pub fn print_evaluation(evaluation: &DayEvaluation) {
    println!("{}\t{}", evaluation.date, mark(evaluation.goal_met));
    println!("Sessions:\t{}", evaluation.sessions);
    println!(
        "Longest session:\t{}m",
        evaluation.longest_session_minutes
    );
    println!(
        "Longest streak:\t{}m",
        evaluation.longest_streak_minutes
    );
    println!("Steps:\t{}", evaluation.total_steps);
}
