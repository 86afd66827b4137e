use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub stock: i32,
}

impl Product {
    pub fn description_display(&self) -> &str {
        match self.description.as_deref() {
            Some(d) if !d.trim().is_empty() => d,
            _ => "-",
        }
    }

    pub fn price_display(&self) -> String {
        format!("{:.2}", self.price)
    }

    pub fn in_stock(&self, quantity: i32) -> bool {
        quantity > 0 && self.stock >= quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(description: Option<&str>) -> Product {
        Product {
            id: 7,
            name: "Mug".to_string(),
            description: description.map(str::to_string),
            price: 4.5,
            stock: 3,
        }
    }

    #[test]
    fn test_parse_product() {
        let json = r#"{"id": 1, "name": "Tea", "description": null, "price": 12.99, "stock": 40}"#;
        let p: Product = serde_json::from_str(json).unwrap();
        assert_eq!(p.id, 1);
        assert_eq!(p.description_display(), "-");
        assert_eq!(p.price_display(), "12.99");
    }

    #[test]
    fn test_description_display() {
        assert_eq!(product(Some("Ceramic")).description_display(), "Ceramic");
        assert_eq!(product(Some("  ")).description_display(), "-");
    }

    #[test]
    fn test_in_stock() {
        let p = product(None);
        assert!(p.in_stock(1));
        assert!(p.in_stock(3));
        assert!(!p.in_stock(4));
        assert!(!p.in_stock(0));
    }
}
