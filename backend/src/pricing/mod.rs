//! Margin pricing with currency conversion.
//!
//! The cost basis of a product is its lowest price. An extra discount lowers
//! the cost, then the margin is applied on revenue:
//!
//! ```text
//! cost     = lowest_price × rate × (1 − discount/100)
//! selling  = cost / (1 − margin/100)
//! profit   = selling − cost
//! ```
//!
//! Values stay unrounded; [`PriceQuote::display`] rounds to cents for output.

pub mod rates;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{PricingError, PricingResult};
use crate::models::{CalculationRecord, Product};

pub use rates::{currency_symbol, effective_rate, RateTable, StaticRates, BASE_CURRENCY};

/// Convert a base-currency amount into `currency`.
pub fn convert_to_currency(amount: f64, currency: &str, rates: &dyn RateTable) -> f64 {
    amount * effective_rate(rates, currency)
}

/// Convert an amount in `currency` back to the base currency.
pub fn convert_from_currency(amount: f64, currency: &str, rates: &dyn RateTable) -> f64 {
    amount / effective_rate(rates, currency)
}

/// Selling price for a cost and a margin on revenue.
pub fn selling_price(cost: f64, margin_percent: f64) -> PricingResult<f64> {
    check_margin(margin_percent)?;
    Ok(cost / (1.0 - margin_percent / 100.0))
}

/// Round to two decimals.
pub fn round_money(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

fn check_margin(margin_percent: f64) -> PricingResult<()> {
    if !margin_percent.is_finite() || margin_percent >= 100.0 {
        return Err(PricingError::InvalidMargin(margin_percent));
    }
    Ok(())
}

fn check_discount(discount_percent: f64) -> PricingResult<()> {
    if !discount_percent.is_finite() {
        return Err(PricingError::InvalidDiscount(discount_percent));
    }
    Ok(())
}

/// A computed price. Money fields are in `currency` except `selling_price_base`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    /// Lowest price converted to `currency`
    pub base_cost: f64,
    /// Base cost after the extra discount
    pub cost_price: f64,
    pub profit_amount: f64,
    pub selling_price: f64,
    /// Selling price in the base currency
    pub selling_price_base: f64,
    pub currency: String,
    pub symbol: String,
    pub margin_percent: f64,
    pub extra_discount_percent: f64,
}

impl PriceQuote {
    /// Copy with money fields rounded to cents.
    pub fn display(&self) -> Self {
        Self {
            base_cost: round_money(self.base_cost),
            cost_price: round_money(self.cost_price),
            profit_amount: round_money(self.profit_amount),
            selling_price: round_money(self.selling_price),
            selling_price_base: round_money(self.selling_price_base),
            ..self.clone()
        }
    }

    /// Selling price with its currency symbol, e.g. `$3.88`.
    pub fn formatted(&self) -> String {
        format!("{}{:.2}", self.symbol, self.selling_price)
    }

    /// Values an external store would persist for this calculation.
    pub fn to_record(&self, product: &Product, user_id: Option<String>) -> CalculationRecord {
        CalculationRecord {
            user_id,
            product_name: product.product_name.clone(),
            supplier_name: product.company.clone(),
            original_price: product.lowest_price,
            margin_percent: self.margin_percent,
            final_price: self.selling_price_base,
            currency: self.currency.clone(),
            calculated_at: Utc::now(),
        }
    }
}

/// Quote one product.
///
/// An empty `currency` means the base currency. Unknown currencies convert at 1.
pub fn price(
    product: &Product,
    margin_percent: f64,
    extra_discount_percent: f64,
    currency: &str,
    rates: &dyn RateTable,
) -> PricingResult<PriceQuote> {
    check_margin(margin_percent)?;
    check_discount(extra_discount_percent)?;

    let currency = match currency.trim() {
        "" => rates.base_currency().to_uppercase(),
        code => code.to_uppercase(),
    };

    let base_cost = convert_to_currency(product.lowest_price, &currency, rates);
    let cost_price = base_cost * (1.0 - extra_discount_percent / 100.0);
    let selling = selling_price(cost_price, margin_percent)?;

    Ok(PriceQuote {
        base_cost,
        cost_price,
        profit_amount: selling - cost_price,
        selling_price: selling,
        selling_price_base: convert_from_currency(selling, &currency, rates),
        symbol: currency_symbol(rates, &currency),
        currency,
        margin_percent,
        extra_discount_percent,
    })
}

/// Quote several products with the same terms.
pub fn price_all(
    products: &[Product],
    margin_percent: f64,
    extra_discount_percent: f64,
    currency: &str,
    rates: &dyn RateTable,
) -> PricingResult<Vec<PriceQuote>> {
    products
        .iter()
        .map(|p| price(p, margin_percent, extra_discount_percent, currency, rates))
        .collect()
}
