//! Human-friendly and JSON output.

use std::io::Write;

use chrono::{Datelike, NaiveDateTime, Timelike};
use outage_core::{Address, City, House, OutageWindow, Street};
use serde::Serialize;

pub type Out<'a> = &'a mut dyn Write;

pub fn json<T: Serialize + ?Sized>(out: Out<'_>, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

pub fn list<'i>(out: Out<'_>, title: &str, items: impl IntoIterator<Item = &'i str>) -> anyhow::Result<()> {
    writeln!(out, "{title}\n")?;
    for item in items {
        writeln!(out, "  {item}")?;
    }
    Ok(())
}

pub fn cities(out: Out<'_>, cities: &[City]) -> anyhow::Result<()> {
    list(out, "Available cities/settlements:", cities.iter().map(|c| c.name.as_str()))
}

pub fn streets(out: Out<'_>, city: &str, streets: &[Street]) -> anyhow::Result<()> {
    list(out, &format!("Streets in {city}:"), streets.iter().map(|s| s.name.as_str()))
}

pub fn houses(out: Out<'_>, city: &str, street: &str, houses: &[House]) -> anyhow::Result<()> {
    list(out, &format!("Houses on {street} ({city}):"), houses.iter().map(|h| h.number.as_str()))
}

/// Outage windows grouped by day.
pub fn outages(out: Out<'_>, address: &Address, windows: &[OutageWindow]) -> anyhow::Result<()> {
    writeln!(out, "Checking schedule for: {address}\n")?;

    if windows.is_empty() {
        writeln!(out, "There are no scheduled outages for this address.")?;
        return Ok(());
    }

    let mut current_day = None;
    for window in windows {
        let day = window.start.date();
        if current_day != Some(day) {
            if current_day.is_some() {
                writeln!(out)?;
            }
            writeln!(out, "{} ({})", day.format("%d.%m.%Y"), day.weekday())?;
            current_day = Some(day);
        }

        writeln!(
            out,
            "  {}-{}  {:<9}  {}",
            clock(window.start, window.start),
            clock(window.start, window.end),
            window.status.label(),
            window.status.description(),
        )?;
    }

    Ok(())
}

/// `HH:MM`, with the midnight that ends a day shown as `24:00`.
fn clock(day_of: NaiveDateTime, t: NaiveDateTime) -> String {
    if t.date() > day_of.date() && t.hour() == 0 && t.minute() == 0 {
        "24:00".to_string()
    } else {
        t.format("%H:%M").to_string()
    }
}
