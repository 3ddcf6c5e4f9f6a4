use chrono::{Datelike, Local, NaiveDate};

/// Weekday and month vocabulary used by the upstream catalog, injected so
/// the countdown math itself is locale-agnostic. Weekday indices follow
/// the 0 = Sunday convention.
pub struct ReleaseLocale {
    weekdays: &'static [(&'static str, u32)],
    months: &'static [(&'static str, u32)],
    just_released: &'static str,
    tomorrow: &'static str,
    days_left: &'static str,
}

static INDONESIAN: ReleaseLocale = ReleaseLocale {
    weekdays: &[
        ("Minggu", 0),
        ("Senin", 1),
        ("Selasa", 2),
        ("Rabu", 3),
        ("Kamis", 4),
        ("Jumat", 5),
        ("Sabtu", 6),
    ],
    months: &[
        ("jan", 0),
        ("feb", 1),
        ("mar", 2),
        ("apr", 3),
        ("mei", 4),
        ("jun", 5),
        ("jul", 6),
        ("agu", 7),
        ("agt", 7),
        ("sep", 8),
        ("okt", 9),
        ("nov", 10),
        ("des", 11),
    ],
    just_released: "Baru",
    tomorrow: "Besok",
    days_left: "hari lagi",
};

impl ReleaseLocale {
    /// Vocabulary of the Otakudesu schedule pages.
    pub fn indonesian() -> &'static ReleaseLocale {
        &INDONESIAN
    }

    fn weekday_index(&self, name: &str) -> Option<u32> {
        self.weekdays
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, index)| *index)
    }

    fn month_index(&self, abbrev: &str) -> Option<u32> {
        self.months
            .iter()
            .find(|(candidate, _)| *candidate == abbrev)
            .map(|(_, index)| *index)
    }
}

/// Countdown to a title's next weekly episode. Derived from the wall clock
/// on every call; never persisted or cached.
#[derive(Debug, Clone, PartialEq)]
pub struct NextRelease {
    pub days_until: u32,
    pub text: String,
    pub is_soon: bool,
    pub just_released: bool,
}

/// Parse a short "DD Mon" date like "03 Des" into a (day-of-month,
/// zero-based month) pair. Anything malformed is `None`.
fn parse_release_date(locale: &ReleaseLocale, raw: &str) -> Option<(u32, u32)> {
    let lowered = raw.trim().to_lowercase();
    let mut parts = lowered.split_whitespace();

    let day_raw = parts.next()?;
    let digits: String = day_raw.chars().take_while(char::is_ascii_digit).collect();
    let day: u32 = digits.parse().ok()?;

    let month_raw = parts.next()?;
    let abbrev: String = month_raw.chars().take(3).collect();
    let month = locale.month_index(&abbrev)?;

    Some((day, month))
}

fn is_release_date_today(locale: &ReleaseLocale, release_date: Option<&str>, today: NaiveDate) -> bool {
    let Some(raw) = release_date else {
        return false;
    };
    match parse_release_date(locale, raw) {
        Some((day, month)) => day == today.day() && month == today.month0(),
        None => false,
    }
}

/// Compute the countdown for a title that airs every `release_day`, given
/// an optional "last aired" date string from the catalog.
///
/// An unrecognized weekday yields `None`. A `release_date` naming today
/// reports "just released" with a fresh 7-day cycle. Otherwise the gap to
/// the next occurrence of the weekday is computed, where "it airs today"
/// counts as a full week out (the episode already dropped today).
pub fn next_release(
    locale: &ReleaseLocale,
    release_day: &str,
    release_date: Option<&str>,
    today: NaiveDate,
) -> Option<NextRelease> {
    let target = locale.weekday_index(release_day)?;

    if is_release_date_today(locale, release_date, today) {
        return Some(NextRelease {
            days_until: 7,
            text: locale.just_released.to_string(),
            is_soon: false,
            just_released: true,
        });
    }

    let current = today.weekday().num_days_from_sunday();
    let mut days_until = target as i64 - current as i64;
    if days_until <= 0 {
        days_until += 7;
    }
    let days_until = days_until as u32;

    let text = if days_until == 1 {
        locale.tomorrow.to_string()
    } else if days_until <= 2 {
        format!("{days_until} {}", locale.days_left)
    } else {
        release_day.to_string()
    };

    Some(NextRelease {
        is_soon: days_until == 1,
        just_released: false,
        days_until,
        text,
    })
}

/// `next_release` against the local wall clock.
pub fn next_release_now(
    locale: &ReleaseLocale,
    release_day: &str,
    release_date: Option<&str>,
) -> Option<NextRelease> {
    next_release(locale, release_day, release_date, Local::now().date_naive())
}
