use crate::error::StoreFailure;
use chrono::{Datelike, NaiveDate};
use contacts_data::DataError;
use regex::Regex;
use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

fn email_regex() -> &'static Regex {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$")
            .expect("Failed to compile email regex")
    })
}

/// Validates an email address using regex and additional checks
pub fn is_valid_email(email: &str) -> bool {
    // Check length constraints
    if email.len() > 254 {
        return false;
    }

    if !email_regex().is_match(email) {
        return false;
    }

    // Check for consecutive dots
    if email.contains("..") {
        return false;
    }

    // Domain needs a TLD of at least 2 characters
    let Some((_, domain)) = email.split_once('@') else {
        return false;
    };
    match domain.rsplit_once('.') {
        Some((_, tld)) => tld.len() >= 2,
        None => false,
    }
}

/// Run a store call under `limit`. Elapsed calls become
/// `StoreFailure::Timeout`, which callers surface as service unavailable.
pub(crate) async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, StoreFailure>
where
    F: Future<Output = Result<T, DataError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(StoreFailure::Data(e)),
        Err(_) => Err(StoreFailure::Timeout),
    }
}

/// First occurrence of `birthday` on or after `today`, ignoring the birth
/// year. Feb 29 falls on Mar 1 in non-leap years.
pub fn next_birthday(birthday: NaiveDate, today: NaiveDate) -> Option<NaiveDate> {
    let in_year = |year: i32| {
        NaiveDate::from_ymd_opt(year, birthday.month(), birthday.day())
            .or_else(|| NaiveDate::from_ymd_opt(year, 3, 1))
    };

    let this_year = in_year(today.year())?;
    if this_year >= today {
        Some(this_year)
    } else {
        in_year(today.year() + 1)
    }
}
