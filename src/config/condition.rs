//! Building the member condition from the `[condition]` section

use super::types::{Config, RangeEntry};
use crate::condition::{parse_partial, Condition, Range, TimezonePolicy};
use crate::model::{Literal, Value};
use crate::{ConfigError, ConfigResult};
use chrono::{DateTime, Utc};

impl Config {
    /// Builds the condition every replicated member must satisfy
    ///
    /// `after` and `before` bound the timestamp path: a member is kept when
    /// `after <= timestamp < before`, each bound taken at the start of the
    /// (possibly partial) date/time it names. Every `[[condition.range]]`
    /// entry adds a further bound on its own path.
    ///
    /// # Returns
    ///
    /// * `Ok(Condition)` - The conjunction of all bounds, `Condition::True` if none
    /// * `Err(ConfigError)` - A bound does not parse, or a window is set without a timestamp path
    pub fn condition(&self) -> ConfigResult<Condition> {
        let policy = self.replication.default_timezone;
        let after = self
            .condition
            .after
            .as_deref()
            .map(|raw| window_start(raw, policy))
            .transpose()?;
        let before = self
            .condition
            .before
            .as_deref()
            .map(|raw| window_start(raw, policy))
            .transpose()?;

        let mut condition = Condition::True;

        if after.is_some() || before.is_some() {
            let path = self
                .stream
                .timestamp_path
                .clone()
                .ok_or(ConfigError::MissingTimestampPath)?;
            condition = condition.and(Condition::window(path, after, before));
        }

        for entry in &self.condition.ranges {
            let range = entry_range(entry, policy)?;
            condition = condition.and(Condition::leaf(entry.path.clone(), range));
        }

        Ok(condition)
    }
}

fn window_start(raw: &str, policy: TimezonePolicy) -> ConfigResult<DateTime<Utc>> {
    parse_partial(raw, policy)
        .map(|(start, _)| start)
        .ok_or_else(|| ConfigError::InvalidBound(format!("'{}' is not a date/time", raw)))
}

fn entry_range(entry: &RangeEntry, policy: TimezonePolicy) -> ConfigResult<Range> {
    if entry.path.is_empty() {
        return Err(ConfigError::Validation(
            "condition range path cannot be empty".to_string(),
        ));
    }

    let value = |raw: &String| Value::from_literal_in(&Literal::plain(raw.as_str()), policy);
    let range = Range {
        min: entry.min.as_ref().map(value),
        max: entry.max.as_ref().map(value),
        min_inclusive: entry.min_inclusive,
        max_inclusive: entry.max_inclusive,
    };

    if let (Some(min), Some(max)) = (&range.min, &range.max) {
        match min.partial_compare(max) {
            Some(std::cmp::Ordering::Greater) => {
                return Err(ConfigError::InvalidBound(format!(
                    "range on {:?} has min {} above max {}",
                    entry.path, min, max
                )));
            }
            None => {
                return Err(ConfigError::InvalidBound(format!(
                    "range on {:?} mixes incomparable bounds {} and {}",
                    entry.path, min, max
                )));
            }
            _ => {}
        }
    }

    Ok(range)
}
