//! Numeric limits, range expressions and multi-range interval sets.
//!
//! Range expressions keep the textual form of their numbers so that an
//! expression like `[1.50;10>` is written to the backend exactly as given.

use crate::query::error::{QueryError, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// A number as written in a query, with its parsed value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Number {
    text: String,
    value: f64,
}

impl Number {
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        let value = match trimmed.parse::<i64>() {
            Ok(n) => n as f64,
            Err(_) => trimmed.parse::<f64>().ok().filter(|v| !v.is_nan())?,
        };
        Some(Self {
            text: trimmed.to_string(),
            value,
        })
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Integral value, when the text is an integer
    pub fn as_i64(&self) -> Option<i64> {
        self.text.parse().ok()
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Self {
            text: value.to_string(),
            value: value as f64,
        }
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Self {
            text: value.to_string(),
            value,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// One end of a numeric range. `number == None` means unbounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Limit {
    pub number: Option<Number>,
    pub inclusive: bool,
}

impl Limit {
    pub fn inclusive(number: impl Into<Number>) -> Self {
        Self {
            number: Some(number.into()),
            inclusive: true,
        }
    }

    pub fn exclusive(number: impl Into<Number>) -> Self {
        Self {
            number: Some(number.into()),
            inclusive: false,
        }
    }

    pub fn unbounded() -> Self {
        Self {
            number: None,
            inclusive: true,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.number.is_none()
    }

    fn write_start(&self, out: &mut String) {
        out.push(if self.inclusive { '[' } else { '<' });
        if let Some(n) = &self.number {
            out.push_str(n.as_str());
        }
    }

    fn write_end(&self, out: &mut String) {
        if let Some(n) = &self.number {
            out.push_str(n.as_str());
        }
        out.push(if self.inclusive { ']' } else { '>' });
    }
}

/// Payload of an INT item: a single number or a range with an optional hit limit.
///
/// Accepted expressions: `5`, `-2.5`, `<5` (below), `>5` (above), `[1;5]`,
/// `<1;5>`, `[;5]`, `[1;]` and the hit-limited forms `[1;5;100]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntTerm {
    pub index: String,
    pub from: Limit,
    pub to: Limit,
    /// Non-zero limits the number of hits; negative values take from the top
    pub hit_limit: i32,
}

impl IntTerm {
    pub fn parse(index: impl Into<String>, expression: &str) -> Result<Self> {
        let (from, to, hit_limit) = parse_expression(expression)?;
        Ok(Self {
            index: index.into(),
            from,
            to,
            hit_limit,
        })
    }

    pub fn exact(index: impl Into<String>, number: impl Into<Number>) -> Self {
        let number = number.into();
        Self {
            index: index.into(),
            from: Limit::inclusive(number.clone()),
            to: Limit::inclusive(number),
            hit_limit: 0,
        }
    }

    pub fn range(index: impl Into<String>, from: Limit, to: Limit) -> Self {
        Self {
            index: index.into(),
            from,
            to,
            hit_limit: 0,
        }
    }

    /// True when both limits are the same inclusive number and there is no hit limit
    pub fn is_single_number(&self) -> bool {
        self.hit_limit == 0
            && self.from.inclusive
            && self.to.inclusive
            && self.from.number.is_some()
            && self.from.number == self.to.number
    }

    /// Canonical textual form written to the backend
    pub fn expression(&self) -> String {
        if self.is_single_number() {
            if let Some(n) = &self.from.number {
                return n.to_string();
            }
        }
        let mut out = String::new();
        self.from.write_start(&mut out);
        out.push(';');
        // The hit limit goes inside the closing bracket
        let mut end = String::new();
        self.to.write_end(&mut end);
        if self.hit_limit != 0 {
            let (number, bracket) = end.split_at(end.len() - 1);
            out.push_str(number);
            out.push(';');
            out.push_str(&self.hit_limit.to_string());
            out.push_str(bracket);
        } else {
            out.push_str(&end);
        }
        out
    }
}

fn invalid(expression: &str, reason: impl Into<String>) -> QueryError {
    QueryError::InvalidRange {
        expression: expression.to_string(),
        reason: reason.into(),
    }
}

fn parse_number(expression: &str, text: &str) -> Result<Option<Number>> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    Number::parse(text)
        .map(Some)
        .ok_or_else(|| invalid(expression, format!("'{}' is not a number", text)))
}

fn parse_expression(expression: &str) -> Result<(Limit, Limit, i32)> {
    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return Err(invalid(expression, "empty expression"));
    }

    let first = trimmed.as_bytes()[0];
    let last = trimmed.as_bytes()[trimmed.len() - 1];

    let bracketed = (first == b'[' || first == b'<') && (last == b']' || last == b'>');
    if bracketed && trimmed.contains(';') {
        let inner = &trimmed[1..trimmed.len() - 1];
        let parts: Vec<&str> = inner.split(';').collect();
        if parts.len() > 3 {
            return Err(invalid(expression, "too many ';' separated parts"));
        }
        let from = Limit {
            number: parse_number(expression, parts[0])?,
            inclusive: first == b'[',
        };
        let to = Limit {
            number: parse_number(expression, parts.get(1).copied().unwrap_or(""))?,
            inclusive: last == b']',
        };
        let hit_limit = match parts.get(2).map(|s| s.trim()) {
            None | Some("") => 0,
            Some(s) => s
                .parse::<i32>()
                .map_err(|_| invalid(expression, format!("'{}' is not a hit limit", s)))?,
        };
        if let (Some(low), Some(high)) = (&from.number, &to.number) {
            if low.value() > high.value() {
                return Err(invalid(expression, "lower limit is above upper limit"));
            }
        }
        return Ok((from, to, hit_limit));
    }

    if let Some(rest) = trimmed.strip_prefix('<') {
        let number = parse_number(expression, rest)?
            .ok_or_else(|| invalid(expression, "missing number after '<'"))?;
        return Ok((Limit::unbounded(), Limit::exclusive(number), 0));
    }
    if let Some(rest) = trimmed.strip_prefix('>') {
        let number = parse_number(expression, rest)?
            .ok_or_else(|| invalid(expression, "missing number after '>'"))?;
        return Ok((Limit::exclusive(number), Limit::unbounded(), 0));
    }

    let number = parse_number(expression, trimmed)?
        .ok_or_else(|| invalid(expression, "empty expression"))?;
    Ok((Limit::inclusive(number.clone()), Limit::inclusive(number), 0))
}

/// Whether an interval starting at `start` overlaps one ending at `end`
fn touches(closed: bool, end: f64, start: f64) -> bool {
    if closed { start <= end } else { start < end }
}

/// Numeric type of the values in a multi-range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NumberType {
    #[default]
    Integer,
    Float,
}

/// Closed numeric interval `[start, end]` (inclusivity is shared by the whole set)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub start: f64,
    pub end: f64,
}

/// Set of numeric intervals matched against one field, or against a
/// start/end field pair describing an interval stored in the document.
///
/// Intervals are kept sorted and non-overlapping. Adding in ascending order of
/// start merges in place; an out-of-order add defers a sort-and-merge pass to
/// the next read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiRange {
    pub number_type: NumberType,
    pub start_index: String,
    pub start_inclusive: bool,
    pub end_index: String,
    pub end_inclusive: bool,
    intervals: Vec<Interval>,
    sorted: bool,
}

impl MultiRange {
    /// Ranges over a single field
    pub fn new(number_type: NumberType, index: impl Into<String>, start_inclusive: bool, end_inclusive: bool) -> Self {
        let index = index.into();
        Self::between(number_type, index.clone(), start_inclusive, index, end_inclusive)
    }

    /// Ranges matched against a document interval stored in two fields
    pub fn between(
        number_type: NumberType,
        start_index: impl Into<String>,
        start_inclusive: bool,
        end_index: impl Into<String>,
        end_inclusive: bool,
    ) -> Self {
        Self {
            number_type,
            start_index: start_index.into(),
            start_inclusive,
            end_index: end_index.into(),
            end_inclusive,
            intervals: Vec::new(),
            sorted: true,
        }
    }

    pub fn is_single_field(&self) -> bool {
        self.start_index == self.end_index
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Number of stored intervals; exact only after a read has merged them
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// Add `[start, end]`. Reversed or NaN bounds are rejected.
    pub fn add(&mut self, start: f64, end: f64) -> Result<()> {
        if start.is_nan() || end.is_nan() || start > end {
            return Err(QueryError::InvalidRange {
                expression: format!("[{};{}]", start, end),
                reason: "lower limit is above upper limit".to_string(),
            });
        }
        let (start, end) = match self.number_type {
            NumberType::Integer => (start.trunc(), end.trunc()),
            NumberType::Float => (start, end),
        };
        let interval = Interval { start, end };

        if !self.sorted {
            self.intervals.push(interval);
            return Ok(());
        }
        let closed = self.is_closed();
        match self.intervals.last_mut() {
            Some(last) if start < last.start => {
                self.intervals.push(interval);
                self.sorted = false;
            }
            Some(last) if touches(closed, last.end, start) => {
                last.end = last.end.max(end);
            }
            _ => self.intervals.push(interval),
        }
        Ok(())
    }

    /// Sorted, merged intervals, merging in place if needed
    pub fn intervals(&mut self) -> &[Interval] {
        if !self.sorted {
            self.intervals = self.merged().into_owned();
            self.sorted = true;
        }
        &self.intervals
    }

    /// Sorted, merged intervals without mutating
    pub fn merged(&self) -> Cow<'_, [Interval]> {
        if self.sorted {
            return Cow::Borrowed(&self.intervals);
        }
        let mut all = self.intervals.clone();
        all.sort_by(|a, b| a.start.total_cmp(&b.start));
        let closed = self.is_closed();
        let mut merged: Vec<Interval> = Vec::with_capacity(all.len());
        for interval in all {
            match merged.last_mut() {
                Some(last) if touches(closed, last.end, interval.start) => {
                    last.end = last.end.max(interval.end);
                }
                _ => merged.push(interval),
            }
        }
        Cow::Owned(merged)
    }

    fn is_closed(&self) -> bool {
        self.start_inclusive && self.end_inclusive
    }

    /// Format a bound for the configured number type
    pub fn format_value(&self, value: f64) -> String {
        match self.number_type {
            NumberType::Integer => (value as i64).to_string(),
            NumberType::Float => value.to_string(),
        }
    }

    /// Expression matching `interval` on a single field
    pub fn interval_expression(&self, interval: &Interval) -> String {
        format!(
            "{}{};{}{}",
            if self.start_inclusive { '[' } else { '<' },
            self.format_value(interval.start),
            self.format_value(interval.end),
            if self.end_inclusive { ']' } else { '>' },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_number() {
        let term = IntTerm::parse("year", "2020").unwrap();
        assert!(term.is_single_number());
        assert_eq!(term.expression(), "2020");
    }

    #[test]
    fn test_closed_and_open_ranges() {
        assert_eq!(IntTerm::parse("f", "[1;5]").unwrap().expression(), "[1;5]");
        assert_eq!(IntTerm::parse("f", "<1;5>").unwrap().expression(), "<1;5>");
        assert_eq!(IntTerm::parse("f", "[1.50;10>").unwrap().expression(), "[1.50;10>");
        assert_eq!(IntTerm::parse("f", "[;5]").unwrap().expression(), "[;5]");
        assert_eq!(IntTerm::parse("f", "[3;]").unwrap().expression(), "[3;]");
    }

    #[test]
    fn test_comparison_forms() {
        let below = IntTerm::parse("f", "<5").unwrap();
        assert!(below.from.is_unbounded());
        assert!(!below.to.inclusive);
        assert_eq!(below.expression(), "[;5>");

        let above = IntTerm::parse("f", ">5").unwrap();
        assert_eq!(above.expression(), "<5;]");
    }

    #[test]
    fn test_hit_limit() {
        let term = IntTerm::parse("f", "[1;5;-100]").unwrap();
        assert_eq!(term.hit_limit, -100);
        assert_eq!(term.expression(), "[1;5;-100]");
        assert_eq!(IntTerm::parse("f", "[1;1;10]").unwrap().expression(), "[1;1;10]");
    }

    #[test]
    fn test_invalid_expressions() {
        assert!(IntTerm::parse("f", "").is_err());
        assert!(IntTerm::parse("f", "abc").is_err());
        assert!(IntTerm::parse("f", "[5;1]").is_err());
        assert!(IntTerm::parse("f", "[1;2;3;4]").is_err());
        assert!(IntTerm::parse("f", "[1;2;x]").is_err());
        assert!(IntTerm::parse("f", "<").is_err());
    }

    #[test]
    fn test_ascending_adds_merge_in_place() {
        let mut ranges = MultiRange::new(NumberType::Integer, "f", true, true);
        ranges.add(1.0, 3.0).unwrap();
        ranges.add(3.0, 5.0).unwrap();
        ranges.add(7.0, 9.0).unwrap();
        assert_eq!(ranges.len(), 2);
        assert_eq!(
            ranges.intervals(),
            &[Interval { start: 1.0, end: 5.0 }, Interval { start: 7.0, end: 9.0 }]
        );
    }

    #[test]
    fn test_exclusive_ends_do_not_merge_on_touch() {
        let mut ranges = MultiRange::new(NumberType::Integer, "f", true, false);
        ranges.add(1.0, 3.0).unwrap();
        ranges.add(3.0, 5.0).unwrap();
        assert_eq!(ranges.intervals().len(), 2);
    }

    #[test]
    fn test_out_of_order_adds_sort_on_read() {
        let mut ranges = MultiRange::new(NumberType::Float, "f", true, true);
        ranges.add(10.0, 12.0).unwrap();
        ranges.add(1.0, 2.0).unwrap();
        ranges.add(1.5, 11.0).unwrap();
        ranges.add(20.0, 21.0).unwrap();
        assert_eq!(
            ranges.merged().as_ref(),
            &[Interval { start: 1.0, end: 12.0 }, Interval { start: 20.0, end: 21.0 }]
        );
        assert_eq!(ranges.intervals().len(), 2);
        // merged state is kept, so later ascending adds merge again
        ranges.add(21.0, 30.0).unwrap();
        assert_eq!(ranges.intervals().last(), Some(&Interval { start: 20.0, end: 30.0 }));
    }

    #[test]
    fn test_reversed_interval_rejected() {
        let mut ranges = MultiRange::new(NumberType::Integer, "f", true, true);
        assert!(ranges.add(5.0, 1.0).is_err());
        assert!(ranges.is_empty());
    }

    #[test]
    fn test_interval_expression() {
        let mut ranges = MultiRange::new(NumberType::Integer, "f", true, false);
        ranges.add(1.0, 4.0).unwrap();
        let first = ranges.intervals()[0];
        assert_eq!(ranges.interval_expression(&first), "[1;4>");
    }
}
