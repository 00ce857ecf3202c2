use crate::{
    error::Result,
    model::{Address, City, DaySchedule, House, OutageWindow, Street},
    provider::dtek::DtekProvider,
};
use async_trait::async_trait;
use std::{fmt::Debug, time::Duration};

pub mod dtek;

/// Default provider endpoint (DTEK Odesa grids).
pub const DEFAULT_BASE_URL: &str = "https://www.dtek-oem.com.ua";

/// Default timeout for a single HTTP request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything the CLI can ask the outage provider.
///
/// Implementations issue their requests one after another; none of the
/// methods retry.
#[async_trait]
pub trait OutageProvider: Send + Sync + Debug {
    /// All known cities, sorted by name.
    async fn list_cities(&self) -> Result<Vec<City>>;

    /// Streets of `city`, sorted. Fails with `NotFound` for an unknown city.
    async fn list_streets(&self, city: &str) -> Result<Vec<Street>>;

    /// Houses on a street in natural order. Fails with `NotFound` for an
    /// unknown city or street.
    async fn list_houses(&self, city: &str, street: &str) -> Result<Vec<House>>;

    /// Power group of the address, `None` if the provider does not know the house.
    async fn resolve_group(&self, address: &Address) -> Result<Option<String>>;

    /// Per-day schedule for the address, sorted by date.
    async fn get_schedule(&self, address: &Address) -> Result<Vec<DaySchedule>>;

    /// Outage windows for the address ordered by start. An empty vector
    /// means no outages are scheduled.
    async fn get_outages(&self, city: &str, street: &str, house: &str) -> Result<Vec<OutageWindow>> {
        let address = Address::new(city, street, house)?;
        let days = self.get_schedule(&address).await?;
        Ok(flatten_windows(&days))
    }
}

/// All windows of all days in chronological order.
pub fn flatten_windows(days: &[DaySchedule]) -> Vec<OutageWindow> {
    let mut windows: Vec<OutageWindow> = days.iter().flat_map(DaySchedule::outage_windows).collect();
    windows.sort_by_key(|w| w.start);
    windows
}

/// Connection settings for the provider client.
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self { base_url: DEFAULT_BASE_URL.to_string(), timeout: DEFAULT_TIMEOUT }
    }
}

/// Construct the provider client.
pub fn provider_from_options(options: &ProviderOptions) -> Result<Box<dyn OutageProvider>> {
    Ok(Box::new(DtekProvider::new(options)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HourStatus, PowerStatus};
    use chrono::NaiveDate;

    fn day(date: NaiveDate, off_hour: u8) -> DaySchedule {
        DaySchedule {
            date,
            day_name: String::new(),
            group: "GPV1.1".into(),
            hours: (1..=24)
                .map(|hour| HourStatus {
                    hour,
                    status: if hour == off_hour { PowerStatus::Off } else { PowerStatus::On },
                })
                .collect(),
        }
    }

    #[test]
    fn flatten_orders_windows_across_days() {
        let d1 = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2025, 1, 16).unwrap();

        let windows = flatten_windows(&[day(d2, 3), day(d1, 20)]);

        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].start.date(), d1);
        assert_eq!(windows[1].start.date(), d2);
    }

    #[test]
    fn default_options_point_at_dtek() {
        let opts = ProviderOptions::default();
        assert_eq!(opts.base_url, DEFAULT_BASE_URL);
        assert_eq!(opts.timeout, DEFAULT_TIMEOUT);
        assert!(provider_from_options(&opts).is_ok());
    }
}
