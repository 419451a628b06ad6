use serde::Serialize;

/// Rounds a currency amount to cents.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Pricing fields derived from a product's base and discounted price at read time.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    pub effective_price: f64,
    pub has_discount: bool,
    pub discount_percentage: u32,
}

impl Pricing {
    pub fn of(price: f64, discounted_price: Option<f64>) -> Self {
        let effective_price = match discounted_price {
            Some(discounted) if discounted < price => discounted,
            _ => price,
        };
        let has_discount = effective_price < price;

        // price > 0 whenever a lower discounted price exists
        let discount_percentage = if has_discount {
            ((price - effective_price) / price * 100.0).round() as u32
        } else {
            0
        };

        Pricing {
            effective_price,
            has_discount,
            discount_percentage,
        }
    }

    pub fn savings(&self, price: f64) -> f64 {
        round2(price - self.effective_price)
    }
}
