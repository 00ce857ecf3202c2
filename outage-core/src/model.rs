use std::{cmp::Ordering, fmt, str::FromStr};

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A physical address as the provider knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub city: String,
    pub street: String,
    pub house: String,
}

impl Address {
    /// Build an address from already separated parts. Each part is trimmed
    /// and must be non-empty.
    pub fn new(city: &str, street: &str, house: &str) -> Result<Self> {
        let parts = [("city", city.trim()), ("street", street.trim()), ("house", house.trim())];

        if let Some((name, _)) = parts.iter().find(|(_, v)| v.is_empty()) {
            return Err(Error::usage(format!("Invalid address: {name} must not be empty")));
        }

        Ok(Self {
            city: parts[0].1.to_string(),
            street: parts[1].1.to_string(),
            house: parts[2].1.to_string(),
        })
    }
}

impl FromStr for Address {
    type Err = Error;

    /// Parse `"city, street, house"`.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(',').collect();
        match parts.as_slice() {
            [city, street, house] => Self::new(city, street, house),
            _ => Err(Error::usage(format!(
                "Invalid address format: '{s}'. Expected format: 'city, street, house'"
            ))),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.city, self.street, self.house)
    }
}

/// A city or settlement. The provider keys cities by display name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct City {
    pub name: String,
}

/// A street within a city, keyed by display name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Street {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct House {
    pub number: String,
    /// Power group (queue) the house belongs to, e.g. `GPV6.1`.
    pub group: Option<String>,
}

impl Ord for House {
    fn cmp(&self, other: &Self) -> Ordering {
        natural_cmp(&self.number, &other.number)
            .then_with(|| self.number.cmp(&other.number))
            .then_with(|| self.group.cmp(&other.group))
    }
}

impl PartialOrd for House {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare strings so that digit runs order numerically: `2 < 10 < 10A`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut a, mut b) = (a, b);
    loop {
        match (a.chars().next(), b.chars().next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let (da, ra) = split_digits(a);
                let (db, rb) = split_digits(b);
                let na = da.trim_start_matches('0');
                let nb = db.trim_start_matches('0');
                let ord = na.len().cmp(&nb.len()).then_with(|| na.cmp(nb));
                if ord != Ordering::Equal {
                    return ord;
                }
                (a, b) = (ra, rb);
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                (a, b) = (&a[x.len_utf8()..], &b[y.len_utf8()..]);
            }
        }
    }
}

fn split_digits(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

/// Power availability for one hourly slot, as coded by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PowerStatus {
    /// `yes`: power is available.
    On,
    /// `no`: scheduled outage for the whole hour.
    Off,
    /// `maybe`: possible outage.
    Maybe,
    /// `first`: no power during the first half of the hour.
    OffFirstHalf,
    /// `second`: no power during the second half of the hour.
    OffSecondHalf,
    /// `mfirst`
    MaybeFirstHalf,
    /// `msecond`
    MaybeSecondHalf,
    /// Any code we do not know, kept verbatim.
    Other(String),
}

impl PowerStatus {
    pub fn code(&self) -> &str {
        match self {
            PowerStatus::On => "yes",
            PowerStatus::Off => "no",
            PowerStatus::Maybe => "maybe",
            PowerStatus::OffFirstHalf => "first",
            PowerStatus::OffSecondHalf => "second",
            PowerStatus::MaybeFirstHalf => "mfirst",
            PowerStatus::MaybeSecondHalf => "msecond",
            PowerStatus::Other(code) => code,
        }
    }

    pub fn has_power(&self) -> bool {
        matches!(self, PowerStatus::On)
    }

    pub fn is_uncertain(&self) -> bool {
        matches!(
            self,
            PowerStatus::Maybe | PowerStatus::MaybeFirstHalf | PowerStatus::MaybeSecondHalf
        )
    }

    /// Short status label: `scheduled`, `possible`, or the raw code.
    pub fn label(&self) -> &str {
        match self {
            PowerStatus::On => "none",
            PowerStatus::Off | PowerStatus::OffFirstHalf | PowerStatus::OffSecondHalf => "scheduled",
            PowerStatus::Maybe | PowerStatus::MaybeFirstHalf | PowerStatus::MaybeSecondHalf => {
                "possible"
            }
            PowerStatus::Other(code) => code,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            PowerStatus::On => "Power ON",
            PowerStatus::Off => "Power OFF",
            PowerStatus::Maybe => "Maybe OFF",
            PowerStatus::OffFirstHalf => "OFF first 30 min",
            PowerStatus::OffSecondHalf => "OFF second 30 min",
            PowerStatus::MaybeFirstHalf => "Maybe OFF first 30 min",
            PowerStatus::MaybeSecondHalf => "Maybe OFF second 30 min",
            PowerStatus::Other(code) => code,
        }
    }

    /// Offsets in minutes, relative to the slot start, of the part of the
    /// hour without power.
    fn off_minutes(&self) -> Option<(i64, i64)> {
        match self {
            PowerStatus::On => None,
            PowerStatus::OffFirstHalf | PowerStatus::MaybeFirstHalf => Some((0, 30)),
            PowerStatus::OffSecondHalf | PowerStatus::MaybeSecondHalf => Some((30, 60)),
            _ => Some((0, 60)),
        }
    }
}

impl From<String> for PowerStatus {
    fn from(code: String) -> Self {
        match code.as_str() {
            "yes" => PowerStatus::On,
            "no" => PowerStatus::Off,
            "maybe" => PowerStatus::Maybe,
            "first" => PowerStatus::OffFirstHalf,
            "second" => PowerStatus::OffSecondHalf,
            "mfirst" => PowerStatus::MaybeFirstHalf,
            "msecond" => PowerStatus::MaybeSecondHalf,
            _ => PowerStatus::Other(code),
        }
    }
}

impl From<&str> for PowerStatus {
    fn from(code: &str) -> Self {
        PowerStatus::from(code.to_string())
    }
}

impl From<PowerStatus> for String {
    fn from(status: PowerStatus) -> Self {
        status.code().to_string()
    }
}

impl fmt::Display for PowerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A contiguous stretch of time without (or possibly without) power.
///
/// Times are naive local times of the provider's zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutageWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub status: PowerStatus,
}

/// Status of one hourly slot. `hour` is 1-based: hour 1 covers 00:00-01:00.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourStatus {
    pub hour: u8,
    pub status: PowerStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub date: NaiveDate,
    /// Provider day name, may be empty.
    pub day_name: String,
    pub group: String,
    pub hours: Vec<HourStatus>,
}

impl DaySchedule {
    /// Merge the non-`yes` slots of the day into outage windows. Adjacent
    /// slots with the same status form one window.
    pub fn outage_windows(&self) -> Vec<OutageWindow> {
        let midnight = self.date.and_time(NaiveTime::MIN);
        let mut windows: Vec<OutageWindow> = Vec::new();

        for slot in &self.hours {
            let Some((from, to)) = slot.status.off_minutes() else {
                continue;
            };
            let slot_start = midnight + Duration::hours(i64::from(slot.hour) - 1);
            let start = slot_start + Duration::minutes(from);
            let end = slot_start + Duration::minutes(to);

            match windows.last_mut() {
                Some(last) if last.end == start && last.status == slot.status => last.end = end,
                _ => windows.push(OutageWindow { start, end, status: slot.status.clone() }),
            }
        }

        windows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(statuses: &[(u8, &str)]) -> DaySchedule {
        let mut hours: Vec<HourStatus> =
            (1..=24).map(|hour| HourStatus { hour, status: PowerStatus::On }).collect();
        for (hour, code) in statuses {
            hours[usize::from(*hour) - 1].status = PowerStatus::from(*code);
        }
        DaySchedule {
            date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            day_name: String::new(),
            group: "GPV1.1".into(),
            hours,
        }
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn parses_and_trims_address() {
        let addr: Address = " Kyiv ,Khreshchatyk,  10 ".parse().unwrap();
        assert_eq!(addr, Address::new("Kyiv", "Khreshchatyk", "10").unwrap());
        assert_eq!(addr.to_string(), "Kyiv, Khreshchatyk, 10");
    }

    #[test]
    fn rejects_wrong_number_of_parts() {
        let err = "Kyiv, Khreshchatyk".parse::<Address>().unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
        assert!(err.to_string().contains("Expected format"));

        assert!("a, b, c, d".parse::<Address>().is_err());
    }

    #[test]
    fn rejects_empty_part() {
        let err = "Kyiv, , 10".parse::<Address>().unwrap_err();
        assert!(err.to_string().contains("street must not be empty"));
    }

    #[test]
    fn houses_sort_naturally() {
        let mut houses: Vec<House> = ["10", "2", "10А", "1", "11/2", "11"]
            .into_iter()
            .map(|n| House { number: n.into(), group: None })
            .collect();
        houses.sort();
        let numbers: Vec<&str> = houses.iter().map(|h| h.number.as_str()).collect();
        assert_eq!(numbers, ["1", "2", "10", "10А", "11", "11/2"]);
    }

    #[test]
    fn unknown_status_code_is_kept() {
        let status = PowerStatus::from("blackout");
        assert_eq!(status, PowerStatus::Other("blackout".into()));
        assert_eq!(status.label(), "blackout");
        assert!(!status.has_power());
    }

    #[test]
    fn consecutive_off_hours_merge() {
        let windows = day(&[(15, "no"), (16, "no"), (17, "no"), (18, "no")]).outage_windows();
        assert_eq!(
            windows,
            vec![OutageWindow { start: at(14, 0), end: at(18, 0), status: PowerStatus::Off }]
        );
        assert_eq!(windows[0].status.label(), "scheduled");
    }

    #[test]
    fn status_change_splits_windows() {
        let windows = day(&[(9, "no"), (10, "maybe"), (12, "no")]).outage_windows();
        assert_eq!(windows.len(), 3);
        assert_eq!((windows[0].start, windows[0].end), (at(8, 0), at(9, 0)));
        assert_eq!(windows[1].status.label(), "possible");
        assert_eq!((windows[2].start, windows[2].end), (at(11, 0), at(12, 0)));
    }

    #[test]
    fn half_hour_statuses_give_half_hour_windows() {
        let windows = day(&[(8, "second"), (9, "no"), (10, "first")]).outage_windows();
        assert_eq!(windows.len(), 3);
        assert_eq!((windows[0].start, windows[0].end), (at(7, 30), at(8, 0)));
        assert_eq!((windows[1].start, windows[1].end), (at(8, 0), at(9, 0)));
        assert_eq!((windows[2].start, windows[2].end), (at(9, 0), at(9, 30)));
    }

    #[test]
    fn last_hour_ends_at_next_midnight() {
        let windows = day(&[(24, "no")]).outage_windows();
        let next_midnight = NaiveDate::from_ymd_opt(2025, 1, 16).unwrap().and_time(NaiveTime::MIN);
        assert_eq!(windows[0].end, next_midnight);
    }

    #[test]
    fn all_on_yields_no_windows() {
        assert!(day(&[]).outage_windows().is_empty());
    }
}
