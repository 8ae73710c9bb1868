use serde::{Deserialize, Serialize};

/// Direction from the maker's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferDirection {
    Buy,
    Sell,
}

/// Negotiated terms published by the maker. Read-only once a trade starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub direction: OfferDirection,
    /// Maximum trade amount in sompi.
    pub amount: u64,
    pub min_amount: u64,
    /// Fiat price per KAS, in minor units of `currency_code`.
    pub price: u64,
    pub currency_code: String,
    pub payment_method: String,
    pub buyer_security_deposit: u64,
    pub seller_security_deposit: u64,
    pub maker_fee: u64,
    pub taker_fee: u64,
}

impl Offer {
    pub fn is_maker_buyer(&self) -> bool {
        self.direction == OfferDirection::Buy
    }

    pub fn is_valid_trade_amount(&self, trade_amount: u64) -> bool {
        trade_amount >= self.min_amount && trade_amount <= self.amount
    }
}
