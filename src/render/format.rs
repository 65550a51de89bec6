//! Display formatting for deal rows
//!
//! Anything that cannot be formatted (NaN, infinities, out-of-range amounts)
//! falls back to the raw `to_string()` of the value.

use chrono::{DateTime, Local, TimeZone, Utc};
use std::fmt::Display;

use crate::models::{Deal, Side};

const DATE_FORMAT: &str = "%H:%M:%S %d.%m.%Y";

/// Display strings for one deal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealRow {
    pub date: String,
    pub instrument: String,
    pub price: String,
    pub amount: String,
    pub side: String,
    pub is_buy: bool,
}

impl DealRow {
    pub fn from_deal(deal: &Deal) -> Self {
        Self {
            date: format_date(&deal.timestamp),
            instrument: deal.instrument_name.clone(),
            price: format_price(deal.price),
            amount: format_amount(deal.amount),
            side: deal.side.as_str().to_string(),
            is_buy: deal.side == Side::Buy,
        }
    }
}

/// `HH:MM:SS dd.mm.yyyy` in local time
pub fn format_date(ts: &DateTime<Utc>) -> String {
    format_date_in(ts, &Local)
}

pub fn format_date_in<Tz>(ts: &DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    ts.with_timezone(tz).format(DATE_FORMAT).to_string()
}

/// Rounded to cents, always two decimals
pub fn format_price(price: f64) -> String {
    if !price.is_finite() {
        return price.to_string();
    }
    format!("{:.2}", (price * 100.0).round() / 100.0)
}

/// Rounded to an integer, thousands separated by spaces
pub fn format_amount(amount: f64) -> String {
    let rounded = amount.round();
    if !rounded.is_finite() || rounded.abs() >= i64::MAX as f64 {
        return amount.to_string();
    }
    group_thousands(rounded as i64)
}

fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_always_has_two_decimals() {
        assert_eq!(format_price(61.5), "61.50");
        assert_eq!(format_price(61.456), "61.46");
        assert_eq!(format_price(70.0), "70.00");
        assert_eq!(format_price(f64::NAN), "NaN");
    }

    #[test]
    fn test_amount_grouping() {
        assert_eq!(format_amount(0.4), "0");
        assert_eq!(format_amount(999.5), "1 000");
        assert_eq!(format_amount(1_234_567.2), "1 234 567");
        assert_eq!(format_amount(-45_000.0), "-45 000");
        assert_eq!(format_amount(f64::INFINITY), "inf");
    }

    #[test]
    fn test_date_layout() {
        let ts = Utc.with_ymd_and_hms(2023, 4, 7, 9, 5, 3).unwrap();
        assert_eq!(format_date_in(&ts, &Utc), "09:05:03 07.04.2023");
    }

    #[test]
    fn test_row_marks_side() {
        let ts = Utc.with_ymd_and_hms(2023, 4, 7, 9, 5, 3).unwrap();
        let row = DealRow::from_deal(&Deal::new(1, ts, "USD/JPY_TOM", 64.0, 12_000.0, Side::Sell));
        assert_eq!(row.side, "sell");
        assert!(!row.is_buy);
        assert_eq!(row.amount, "12 000");
        assert_eq!(row.price, "64.00");
    }
}
