//! Spoken times matched against a list of appointment slots.
//!
//! Slots are caller strings whose first `H:MM` (optionally followed by `AM`/`PM`)
//! is the slot start, e.g. `"09:00 AM - 10:00 AM"` or `"14:00-15:00"`.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static SLOT_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d{1,2}):(\d{2})\s*(am|pm)?").expect("valid slot pattern")
});

static GLUED_MERIDIEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d)\s*(am|pm)\b").expect("valid meridiem pattern"));

const HOUR_WORDS: [(&str, u32); 12] = [
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eleven", 11),
    ("twelve", 12),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SpokenTime {
    hour: u32,
    minute: u32,
    meridiem: Option<Meridiem>,
}

fn to_24h(hour: u32, meridiem: Option<Meridiem>) -> u32 {
    match meridiem {
        Some(Meridiem::Pm) if hour < 12 => hour + 12,
        Some(Meridiem::Am) if hour == 12 => 0,
        _ => hour,
    }
}

fn normalize(text: &str) -> String {
    let lowered = text
        .to_lowercase()
        .replace("a.m.", "am")
        .replace("p.m.", "pm")
        .replace("a.m", "am")
        .replace("p.m", "pm");
    GLUED_MERIDIEM.replace_all(&lowered, "$1 $2").into_owned()
}

fn parse_hour_token(token: &str) -> Option<(u32, u32)> {
    if let Some(&(_, hour)) = HOUR_WORDS.iter().find(|(w, _)| *w == token) {
        return Some((hour, 0));
    }
    let (h, m) = token.split_once(':').unwrap_or((token, "0"));
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    (hour < 24 && minute < 60).then_some((hour, minute))
}

fn spoken_time(tokens: &[&str]) -> Option<SpokenTime> {
    let has = |w: &str| tokens.contains(&w);
    let position = tokens.iter().position(|t| parse_hour_token(t).is_some());
    let (hour, minute) = match position {
        Some(i) => parse_hour_token(tokens[i])?,
        None if has("noon") => (12, 0),
        None => return None,
    };

    let after = position.and_then(|i| tokens.get(i + 1)).copied();
    let meridiem = if after == Some("pm") || has("pm") || has("afternoon") || has("evening") || has("night") {
        Some(Meridiem::Pm)
    } else if after == Some("am") || has("morning") {
        Some(Meridiem::Am)
    } else if position.is_none() {
        Some(Meridiem::Pm)
    } else {
        None
    };
    Some(SpokenTime { hour, minute, meridiem })
}

fn slot_start(slot: &str) -> Option<SpokenTime> {
    let caps = SLOT_START.captures(slot)?;
    let meridiem = caps.get(3).map(|m| {
        if m.as_str().eq_ignore_ascii_case("pm") {
            Meridiem::Pm
        } else {
            Meridiem::Am
        }
    });
    Some(SpokenTime {
        hour: caps[1].parse().ok()?,
        minute: caps[2].parse().ok()?,
        meridiem,
    })
}

fn slot_matches(slot: &str, spoken: SpokenTime) -> bool {
    let Some(start) = slot_start(slot) else {
        return false;
    };
    if start.minute != spoken.minute {
        return false;
    }
    let slot_hour = to_24h(start.hour, start.meridiem);
    match spoken.meridiem {
        Some(_) => slot_hour == to_24h(spoken.hour, spoken.meridiem),
        // Without am/pm "two" means 02:00 or 14:00, whichever is offered first.
        None if spoken.hour <= 12 => slot_hour % 12 == spoken.hour % 12,
        None => slot_hour == spoken.hour,
    }
}

fn first_containing<'a>(slots: &'a [String], needle: &str) -> Option<&'a str> {
    slots
        .iter()
        .find(|s| s.to_uppercase().contains(needle))
        .map(String::as_str)
}

/// The slot the user asked for, if it is on offer.
pub fn parse_time_slot<'a>(text: &str, slots: &'a [String]) -> Option<&'a str> {
    let normalized = normalize(text);
    let tokens: Vec<&str> = normalized
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == ':'))
        .filter(|t| !t.is_empty())
        .collect();

    if let Some(spoken) = spoken_time(&tokens) {
        debug!(?spoken, "spoken time");
        if let Some(slot) = slots.iter().find(|s| slot_matches(s, spoken)) {
            return Some(slot.as_str());
        }
        return None;
    }

    let has = |w: &str| tokens.contains(&w);
    if has("morning") {
        first_containing(slots, "09:00 AM")
    } else if has("afternoon") {
        first_containing(slots, "02:00 PM")
    } else if has("evening") {
        first_containing(slots, "04:00 PM")
    } else {
        None
    }
}
