//! Text formatting for the screens: clocks, dates, relative times, money
//! and picture URLs.

use chrono::{DateTime, TimeZone};
use std::fmt::Display;

use crate::rpc::ImageSet;

/// "Friday 16 October 2026"
pub fn long_date<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    dt.format("%A %-d %B %Y").to_string()
}

/// "14:03:07"
pub fn clock_time<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    dt.format("%H:%M:%S").to_string()
}

/// "Fri 16 Oct, 14:03"
pub fn activity_timestamp<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    dt.format("%a %-d %b, %H:%M").to_string()
}

/// "16-10-2026"
pub fn day_month_year<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    dt.format("%d-%m-%Y").to_string()
}

/// "14:03"
pub fn hour_minute<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    dt.format("%H:%M").to_string()
}

/// Human distance between `target` and `now`: "in 5 minutes", "an hour ago".
///
/// Every unit is rounded from the full duration, and the unit is picked
/// with fixed cut-offs: under a minute counts seconds, under 45
/// minutes counts minutes, under 22 hours counts hours, under 26 days
/// counts days, under 11 months counts months.
pub fn relative_time<Tz1: TimeZone, Tz2: TimeZone>(
    target: &DateTime<Tz1>,
    now: &DateTime<Tz2>,
) -> String {
    let millis = target
        .clone()
        .signed_duration_since(now.clone())
        .num_milliseconds();
    let future = millis > 0;
    let phrase = duration_phrase(millis.unsigned_abs() as f64 / 1000.0);

    if future {
        format!("in {}", phrase)
    } else {
        format!("{} ago", phrase)
    }
}

fn duration_phrase(secs: f64) -> String {
    let seconds = secs.round();
    let minutes = (secs / 60.0).round();
    let hours = (secs / 3_600.0).round();
    let days = (secs / 86_400.0).round();
    let months = (secs / 86_400.0 / 30.436875).round();
    let years = (secs / 86_400.0 / 365.2425).round();

    if seconds < 60.0 {
        format!("{} seconds", seconds as i64)
    } else if minutes <= 1.0 {
        "a minute".to_string()
    } else if minutes < 45.0 {
        format!("{} minutes", minutes as i64)
    } else if hours <= 1.0 {
        "an hour".to_string()
    } else if hours < 22.0 {
        format!("{} hours", hours as i64)
    } else if days <= 1.0 {
        "a day".to_string()
    } else if days < 26.0 {
        format!("{} days", days as i64)
    } else if months <= 1.0 {
        "a month".to_string()
    } else if months < 11.0 {
        format!("{} months", months as i64)
    } else if years <= 1.0 {
        "a year".to_string()
    } else {
        format!("{} years", years as i64)
    }
}

/// Euro amount in Dutch notation: "€ 1.234,50"
pub fn euro(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    let whole = (cents / 100).to_string();

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    format!("€ {}{},{:02}", sign, grouped, cents % 100)
}

/// Picture URL for the room screen: `large` unless it is missing or a
/// placeholder, else `original`; local media paths point at the public
/// media host.
pub fn room_image_url(image: &ImageSet, media_url: &str) -> Option<String> {
    let large = image
        .large
        .as_deref()
        .filter(|url| !url.ends_with("/amelie/None") && !url.ends_with("/site_media/None"));
    let url = large.or(image.original.as_deref())?;
    Some(url.replacen("/site_media/data", media_url, 1))
}
