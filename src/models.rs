use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trade side. `Sell < Buy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Sell,
    Buy,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Sell, Side::Buy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Sell => "sell",
            Side::Buy => "buy",
        }
    }
}

/// A single executed trade as delivered by the feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub instrument_name: String,
    pub price: f64,
    pub amount: f64,
    pub side: Side,
}

impl Deal {
    pub fn new(
        id: i64,
        timestamp: DateTime<Utc>,
        instrument_name: impl Into<String>,
        price: f64,
        amount: f64,
        side: Side,
    ) -> Self {
        Self {
            id,
            timestamp,
            instrument_name: instrument_name.into(),
            price,
            amount,
            side,
        }
    }
}

/// Column the deal list is ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Date,
    Name,
    Price,
    Amount,
    Side,
}

impl SortKey {
    /// Header order, left to right
    pub const ALL: [SortKey; 5] = [
        SortKey::Date,
        SortKey::Name,
        SortKey::Price,
        SortKey::Amount,
        SortKey::Side,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SortKey::Date => "Date",
            SortKey::Name => "Name",
            SortKey::Price => "Price",
            SortKey::Amount => "Amount",
            SortKey::Side => "Side",
        }
    }

    /// Position in the header segment control
    pub fn index(&self) -> usize {
        match self {
            SortKey::Date => 0,
            SortKey::Name => 1,
            SortKey::Price => 2,
            SortKey::Amount => 3,
            SortKey::Side => 4,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn next(&self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(&self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_orders_sell_before_buy() {
        assert!(Side::Sell < Side::Buy);
        assert_eq!(Side::Buy.as_str(), "buy");
    }

    #[test]
    fn sort_key_cycles_through_header() {
        assert_eq!(SortKey::default(), SortKey::Date);
        assert_eq!(SortKey::Side.next(), SortKey::Date);
        assert_eq!(SortKey::Date.prev(), SortKey::Side);
        assert_eq!(SortKey::from_index(2), Some(SortKey::Price));
        assert_eq!(SortKey::from_index(5), None);
        for key in SortKey::ALL {
            assert_eq!(SortKey::from_index(key.index()), Some(key));
        }
    }
}
