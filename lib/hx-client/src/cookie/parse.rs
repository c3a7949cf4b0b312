/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx authors.
 */

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};

/// A `Set-Cookie` header value after attribute resolution.
///
/// `expires` already folds together `Max-Age` (which wins) and `Expires`.
pub(crate) struct SetCookie {
    pub(crate) name: String,
    pub(crate) value: String,
    pub(crate) expires: Option<DateTime<Utc>>,
    pub(crate) domain: Option<String>,
    pub(crate) path: Option<String>,
    pub(crate) secure: bool,
    pub(crate) http_only: bool,
}

pub(crate) fn parse_set_cookie(header: &str, now: DateTime<Utc>) -> Option<SetCookie> {
    let mut parts = header.split(';');

    let pair = parts.next()?;
    let eq = pair.find('=')?;
    let name = pair[..eq].trim();
    if name.is_empty() {
        return None;
    }
    let value = pair[eq + 1..].trim();

    let mut set = SetCookie {
        name: name.to_string(),
        value: value.trim_matches('"').to_string(),
        expires: None,
        domain: None,
        path: None,
        secure: false,
        http_only: false,
    };

    let mut max_age_seen = false;
    for attr in parts {
        let (attr_name, attr_value) = match attr.find('=') {
            Some(p) => (attr[..p].trim(), attr[p + 1..].trim()),
            None => (attr.trim(), ""),
        };
        if attr_name.eq_ignore_ascii_case("Max-Age") {
            if let Ok(secs) = attr_value.parse::<i64>() {
                max_age_seen = true;
                set.expires = if secs <= 0 {
                    Some(DateTime::<Utc>::MIN_UTC)
                } else {
                    Some(now + TimeDelta::seconds(secs))
                };
            }
        } else if attr_name.eq_ignore_ascii_case("Expires") {
            if !max_age_seen {
                if let Some(at) = parse_cookie_date(attr_value) {
                    set.expires = Some(at);
                }
            }
        } else if attr_name.eq_ignore_ascii_case("Domain") {
            let d = attr_value.strip_prefix('.').unwrap_or(attr_value);
            if !d.is_empty() {
                set.domain = Some(d.to_lowercase());
            }
        } else if attr_name.eq_ignore_ascii_case("Path") {
            if attr_value.starts_with('/') {
                set.path = Some(attr_value.to_string());
            }
        } else if attr_name.eq_ignore_ascii_case("Secure") {
            set.secure = true;
        } else if attr_name.eq_ignore_ascii_case("HttpOnly") {
            set.http_only = true;
        }
    }

    Some(set)
}

/// The date algorithm of RFC 6265 section 5.1.1: scan date tokens in any
/// order, accepting the wild variety of formats servers actually emit.
pub(crate) fn parse_cookie_date(s: &str) -> Option<DateTime<Utc>> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];

    let mut time: Option<(u32, u32, u32)> = None;
    let mut day: Option<u32> = None;
    let mut month: Option<u32> = None;
    let mut year: Option<i32> = None;

    for token in s.split(|c: char| !c.is_ascii_alphanumeric() && c != ':') {
        if token.is_empty() {
            continue;
        }
        if time.is_none() {
            let mut it = token.split(':');
            if let (Some(h), Some(m), Some(sec), None) = (it.next(), it.next(), it.next(), it.next())
            {
                if let (Ok(h), Ok(m), Ok(sec)) =
                    (h.parse::<u32>(), m.parse::<u32>(), sec.parse::<u32>())
                {
                    time = Some((h, m, sec));
                    continue;
                }
            }
        }
        if month.is_none() && token.len() >= 3 {
            let prefix = token[..3].to_lowercase();
            if let Some(p) = MONTHS.iter().position(|m| **m == prefix) {
                month = Some(p as u32 + 1);
                continue;
            }
        }
        if let Ok(num) = token.parse::<i32>() {
            if day.is_none() && (1..=31).contains(&num) && token.len() <= 2 {
                day = Some(num as u32);
                continue;
            }
            if year.is_none() {
                let num = match num {
                    0..=69 => num + 2000,
                    70..=99 => num + 1900,
                    _ => num,
                };
                year = Some(num);
            }
        }
    }

    let (hour, minute, second) = time?;
    if hour > 23 || minute > 59 || second > 59 {
        return None;
    }
    let year = year.filter(|y| *y >= 1601)?;

    let date = NaiveDate::from_ymd_opt(year, month?, day?)?;
    let naive = date.and_hms_opt(hour, minute, second)?;
    Some(naive.and_utc())
}
