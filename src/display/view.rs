//! View rows shared by several pages

use chrono::{DateTime, TimeZone};
use serde::Serialize;
use std::fmt::Display;

use super::format;
use crate::rpc::{Activity, NewsItem};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClockView {
    pub date: String,
    pub time: String,
}

impl ClockView {
    pub fn at<Tz: TimeZone>(now: &DateTime<Tz>) -> Self
    where
        Tz::Offset: Display,
    {
        Self {
            date: format::long_date(now),
            time: format::clock_time(now),
        }
    }
}

/// One line of an upcoming-activities table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityRow {
    pub when: String,
    pub title: String,
}

impl ActivityRow {
    pub fn from_activity<Tz: TimeZone>(activity: &Activity, tz: &Tz) -> Self
    where
        Tz::Offset: Display,
    {
        Self {
            when: format::activity_timestamp(&activity.begin_date.with_timezone(tz)),
            title: activity.title.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsRow {
    pub when: String,
    pub title: String,
    pub introduction: String,
}

impl NewsRow {
    pub fn from_news<Tz: TimeZone>(item: &NewsItem, tz: &Tz) -> Self
    where
        Tz::Offset: Display,
    {
        Self {
            when: format::activity_timestamp(&item.publication_date.with_timezone(tz)),
            title: item.title.clone(),
            introduction: item.introduction.clone(),
        }
    }
}
