use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_english::{parse_date_string, Dialect};

pub fn parse_due_date(date_str: &str) -> Result<DateTime<Utc>> {
    parse_date_string(date_str, Utc::now(), Dialect::Us)
        .map_err(|e| anyhow::anyhow!("Failed to parse due date '{}': {}", date_str, e))
}

/// Parses a day-of-week list like "mon,wed,fri" (or the groups
/// "weekdays" / "weekends") into weekday numbers with Sunday = 0.
pub fn parse_weekdays(days_str: &str) -> Result<Vec<u8>> {
    let input = days_str.trim().to_lowercase();

    match input.as_str() {
        "weekdays" | "workdays" => return Ok(vec![1, 2, 3, 4, 5]),
        "weekends" => return Ok(vec![0, 6]),
        _ => {}
    }

    let mut days = Vec::new();
    let mut invalid = Vec::new();
    for day in input.split(',') {
        let day = day.trim();
        if day.is_empty() {
            continue;
        }
        let n = match day {
            "sun" | "sunday" | "su" => 0,
            "mon" | "monday" | "m" => 1,
            "tue" | "tuesday" | "tu" => 2,
            "wed" | "wednesday" | "w" => 3,
            "thu" | "thursday" | "th" => 4,
            "fri" | "friday" | "f" => 5,
            "sat" | "saturday" | "sa" => 6,
            _ => {
                invalid.push(day.to_string());
                continue;
            }
        };
        if !days.contains(&n) {
            days.push(n);
        }
    }

    if !invalid.is_empty() {
        return Err(anyhow::anyhow!(
            "Invalid day(s): {}. Use names like 'mon,wed,fri' or the groups 'weekdays'/'weekends'",
            invalid.join(", ")
        ));
    }
    if days.is_empty() {
        return Err(anyhow::anyhow!("No valid days specified in: '{days_str}'"));
    }
    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekday_names_and_groups() {
        assert_eq!(parse_weekdays("mon,wed,fri").unwrap(), vec![1, 3, 5]);
        assert_eq!(parse_weekdays("weekdays").unwrap(), vec![1, 2, 3, 4, 5]);
        assert_eq!(parse_weekdays("weekends").unwrap(), vec![0, 6]);
        assert_eq!(parse_weekdays("Sunday, sat").unwrap(), vec![0, 6]);
    }

    #[test]
    fn invalid_weekdays_are_rejected() {
        assert!(parse_weekdays("mon,frob").is_err());
        assert!(parse_weekdays("").is_err());
    }
}
