use serde::{Deserialize, Serialize};

/// One line of a checkout request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutItem {
    #[serde(rename = "productId")]
    pub product_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutRequest<'a> {
    pub items: &'a [CheckoutItem],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub total: f64,
    pub status: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(rename = "productId")]
    pub product_id: i64,
    pub name: Option<String>,
    pub price: f64,
    pub quantity: i32,
}

impl Order {
    pub fn status_display(&self) -> &str {
        self.status.as_deref().unwrap_or("UNKNOWN")
    }

    pub fn item_count(&self) -> i32 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}
