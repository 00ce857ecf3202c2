//! Client for the DTEK shutdowns page.
//!
//! The page embeds its data as JavaScript object literals
//! (`DisconSchedule.streets`, `DisconSchedule.preset`, `DisconSchedule.fact`);
//! house lookups go through a form-encoded AJAX endpoint that needs the
//! session cookie and CSRF token handed out with the page.

use std::{
    collections::{BTreeMap, HashMap},
    sync::LazyLock,
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate};
use reqwest::{
    Client, Response,
    header::{self, HeaderMap, HeaderValue},
};
use regex::Regex;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::{
    error::{Error, Result},
    model::{Address, City, DaySchedule, HourStatus, House, PowerStatus, Street},
};

use super::{OutageProvider, ProviderOptions};

const STREETS_VAR: &str = "DisconSchedule.streets";
const PRESET_VAR: &str = "DisconSchedule.preset";
const FACT_VAR: &str = "DisconSchedule.fact";
const CSRF_FIELD: &str = "_csrf-dtek-oem";

static CSRF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"name="_csrf-dtek-oem"[^>]*value="([^"]+)""#).unwrap());

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug)]
pub struct DtekProvider {
    page_url: String,
    ajax_url: String,
    timeout_secs: u64,
    http: Client,
    page: OnceCell<Page>,
}

/// The shutdowns page, fetched once per client.
#[derive(Debug)]
struct Page {
    html: String,
    csrf_token: Option<String>,
}

impl DtekProvider {
    pub fn new(options: &ProviderOptions) -> Result<Self> {
        let base = options.base_url.trim_end_matches('/');

        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json, text/html, */*"));
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("uk-UA,uk;q=0.9,en;q=0.8"));

        let http = Client::builder()
            .timeout(options.timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .cookie_store(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            page_url: format!("{base}/ua/shutdowns"),
            ajax_url: format!("{base}/ua/ajax"),
            timeout_secs: options.timeout.as_secs(),
            http,
            page: OnceCell::new(),
        })
    }

    async fn page(&self) -> Result<&Page> {
        self.page.get_or_try_init(|| self.fetch_page()).await
    }

    async fn fetch_page(&self) -> Result<Page> {
        tracing::debug!(url = %self.page_url, "fetching schedule page");

        let res = self.http.get(&self.page_url).send().await.map_err(|e| self.transport_error(e))?;
        let html = self.success_body(res).await?;
        let csrf_token = extract_csrf_token(&html);

        if csrf_token.is_none() {
            tracing::warn!("schedule page carries no CSRF token");
        }

        Ok(Page { html, csrf_token })
    }

    async fn streets_by_city(&self) -> Result<BTreeMap<String, Vec<String>>> {
        let page = self.page().await?;
        let js = find_js_object(&page.html, STREETS_VAR)?
            .ok_or_else(|| Error::malformed(format!("could not find {STREETS_VAR} in page")))?;
        parse_js_object(js, STREETS_VAR)
    }

    /// Ensure `city` and `street` exist before asking about houses.
    async fn check_street(&self, city: &str, street: &str) -> Result<()> {
        let streets = self.streets_by_city().await?;
        let city_streets = streets.get(city).ok_or_else(|| Error::not_found("city", city))?;

        if !city_streets.iter().any(|s| s == street) {
            return Err(Error::not_found("street", format!("{street} ({city})")));
        }
        Ok(())
    }

    /// Query the house endpoint. An empty `house` asks for every house on
    /// the street.
    async fn fetch_houses(&self, city: &str, street: &str, house: &str) -> Result<Vec<House>> {
        let page = self.page().await?;

        let mut form: Vec<(String, String)> = vec![("method".into(), "getHomeNum".into())];
        if let Some(token) = &page.csrf_token {
            form.push((CSRF_FIELD.into(), token.clone()));
        }
        for (i, (name, value)) in [("city", city), ("street", street), ("house_num", house)]
            .into_iter()
            .enumerate()
        {
            form.push((format!("data[{i}][name]"), name.into()));
            form.push((format!("data[{i}][value]"), value.into()));
        }

        tracing::debug!(url = %self.ajax_url, city, street, house, "querying houses");

        let res = self
            .http
            .post(&self.ajax_url)
            .header("X-Requested-With", "XMLHttpRequest")
            .header(header::REFERER, &self.page_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let body = self.success_body(res).await?;
        let parsed: HomeNumResponse = serde_json::from_str(&body)
            .map_err(|e| Error::malformed(format!("invalid JSON from house lookup: {e}")))?;

        Ok(parsed.houses())
    }

    async fn success_body(&self, res: Response) -> Result<String> {
        let status = res.status();
        let body = res.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            tracing::debug!(%status, "provider returned an error status");
            return Err(Error::Provider { status: Some(status.as_u16()), message: truncate_body(&body) });
        }

        Ok(body)
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            return Error::Timeout(self.timeout_secs);
        }

        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Error::Network(message)
    }
}

#[async_trait]
impl OutageProvider for DtekProvider {
    async fn list_cities(&self) -> Result<Vec<City>> {
        let streets = self.streets_by_city().await?;
        Ok(streets.into_keys().map(|name| City { name }).collect())
    }

    async fn list_streets(&self, city: &str) -> Result<Vec<Street>> {
        let mut streets = self.streets_by_city().await?;
        let names = streets.remove(city).ok_or_else(|| Error::not_found("city", city))?;

        let mut streets: Vec<Street> = names.into_iter().map(|name| Street { name }).collect();
        streets.sort();
        streets.dedup();
        Ok(streets)
    }

    async fn list_houses(&self, city: &str, street: &str) -> Result<Vec<House>> {
        self.check_street(city, street).await?;

        let mut houses = self.fetch_houses(city, street, "").await?;
        if houses.is_empty() {
            return Err(Error::not_found("street", format!("{street} ({city})")));
        }
        houses.sort();
        Ok(houses)
    }

    async fn resolve_group(&self, address: &Address) -> Result<Option<String>> {
        let houses = self.fetch_houses(&address.city, &address.street, &address.house).await?;

        Ok(houses.into_iter().find(|h| h.number == address.house).and_then(|h| h.group))
    }

    async fn get_schedule(&self, address: &Address) -> Result<Vec<DaySchedule>> {
        self.check_street(&address.city, &address.street).await?;

        let group = self
            .resolve_group(address)
            .await?
            .ok_or_else(|| Error::not_found("house", address.to_string()))?;

        tracing::debug!(%address, %group, "resolved power group");

        let page = self.page().await?;
        let fact: Fact = match find_js_object(&page.html, FACT_VAR)? {
            Some(js) => parse_js_object(js, FACT_VAR)?,
            None => return Err(Error::malformed(format!("could not find {FACT_VAR} in page"))),
        };
        let preset: Preset = match find_js_object(&page.html, PRESET_VAR)? {
            Some(js) => parse_js_object(js, PRESET_VAR)?,
            None => Preset::default(),
        };

        let mut days = Vec::with_capacity(fact.data.len());
        for (stamp, groups) in &fact.data {
            let date = day_from_stamp(stamp)?;
            let slots = groups.get(&group);

            let hours = (1..=24u8)
                .map(|hour| {
                    let status = slots
                        .and_then(|s| s.get(&hour.to_string()))
                        .map(|code| PowerStatus::from(code.as_str()))
                        .unwrap_or(PowerStatus::On);
                    HourStatus { hour, status }
                })
                .collect();

            let weekday = chrono::Datelike::weekday(&date).number_from_monday().to_string();
            days.push(DaySchedule {
                date,
                day_name: preset.days.get(&weekday).cloned().unwrap_or_default(),
                group: group.clone(),
                hours,
            });
        }

        days.sort_by_key(|d| d.date);
        Ok(days)
    }
}

#[derive(Debug, Default, Deserialize)]
struct Preset {
    /// ISO weekday number ("1" = Monday) to day name.
    #[serde(default)]
    days: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct Fact {
    /// Day-stamp -> power group -> hour ("1".."24") -> status code.
    #[serde(default)]
    data: BTreeMap<String, HashMap<String, HashMap<String, String>>>,
}

#[derive(Debug, Deserialize)]
struct HomeNumResponse {
    #[serde(default)]
    result: bool,
    /// Object keyed by house number, or `[]` when there is nothing.
    #[serde(default)]
    data: Value,
}

impl HomeNumResponse {
    fn houses(self) -> Vec<House> {
        if !self.result {
            return Vec::new();
        }
        let Value::Object(map) = self.data else {
            return Vec::new();
        };

        map.into_iter()
            .map(|(number, info)| {
                let group = info
                    .get("sub_type_reason")
                    .and_then(Value::as_array)
                    .and_then(|groups| groups.first())
                    .and_then(|g| match g {
                        Value::String(s) if !s.is_empty() => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    });
                House { number, group }
            })
            .collect()
    }
}

/// Calendar date of a provider day-stamp.
///
/// Stamps are local midnights in the provider's zone. Taking the UTC date of
/// the stamp plus twelve hours gives the right day for any zone within
/// twelve hours of UTC.
fn day_from_stamp(stamp: &str) -> Result<NaiveDate> {
    let secs: i64 =
        stamp.trim().parse().map_err(|_| Error::malformed(format!("invalid day stamp '{stamp}'")))?;

    DateTime::from_timestamp(secs, 0)
        .map(|dt| (dt + Duration::hours(12)).date_naive())
        .ok_or_else(|| Error::malformed(format!("day stamp out of range '{stamp}'")))
}

fn extract_csrf_token(html: &str) -> Option<String> {
    CSRF_RE.captures(html).map(|caps| caps[1].to_string())
}

/// Cut the object literal assigned to `var_name` out of the page.
///
/// Returns `Ok(None)` when the variable is not assigned anywhere. Braces
/// inside double-quoted strings are ignored.
fn find_js_object<'a>(html: &'a str, var_name: &str) -> Result<Option<&'a str>> {
    // `==` comparisons do not count as assignments.
    let assignment = Regex::new(&format!(r"{}\s*=\s*([^=\s])", regex::escape(var_name)))
        .map_err(|e| Error::malformed(format!("bad pattern for {var_name}: {e}")))?;
    let Some(start) = assignment.captures(html).and_then(|caps| caps.get(1)).map(|m| m.start()) else {
        return Ok(None);
    };
    let rest = &html[start..];
    if !rest.starts_with('{') {
        return Err(Error::malformed(format!("expected object after {var_name}")));
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in rest.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => in_string = !in_string,
            _ if in_string => {}
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(Some(&rest[..=i]));
                }
            }
            _ => {}
        }
    }

    Err(Error::malformed(format!("unbalanced braces in {var_name}")))
}

fn parse_js_object<T: DeserializeOwned>(js: &str, var_name: &str) -> Result<T> {
    let cleaned = js.replace("\\/", "/");
    serde_json::from_str(&cleaned).map_err(|e| Error::malformed(format!("failed to parse {var_name}: {e}")))
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}
