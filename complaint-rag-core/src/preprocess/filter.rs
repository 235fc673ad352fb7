use super::clean::clean_text;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Products the complaint assistant covers by default.
pub const ALLOWED_PRODUCTS: [&str; 5] = [
    "Credit card",
    "Personal loan",
    "Buy Now, Pay Later",
    "Savings account",
    "Money transfers",
];

/// One row of a CFPB complaint export.
///
/// Columns other than the product and narrative are kept as-is so they can be
/// carried into fragment metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Complaint {
    #[serde(rename = "Product")]
    pub product: String,

    #[serde(rename = "Consumer complaint narrative", default)]
    pub narrative: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Complaint {
    pub fn new(product: impl Into<String>, narrative: Option<&str>) -> Self {
        Self {
            product: product.into(),
            narrative: narrative.map(str::to_string),
            extra: serde_json::Map::new(),
        }
    }
}

/// Keeps complaints whose product is in `products`, or in
/// [`ALLOWED_PRODUCTS`] when `None`. Matching is exact.
pub fn filter_by_product(complaints: Vec<Complaint>, products: Option<&[&str]>) -> Vec<Complaint> {
    let products = products.unwrap_or(&ALLOWED_PRODUCTS);
    let before = complaints.len();
    let kept: Vec<Complaint> = complaints
        .into_iter()
        .filter(|c| products.contains(&c.product.as_str()))
        .collect();

    debug!(before, after = kept.len(), "Filtered complaints by product");
    kept
}

/// Drops complaints that have no narrative at all.
pub fn drop_empty_narratives(complaints: Vec<Complaint>) -> Vec<Complaint> {
    complaints.into_iter().filter(|c| c.narrative.is_some()).collect()
}

/// Runs [`clean_text`] over every narrative in place.
pub fn apply_text_cleaning(complaints: &mut [Complaint]) {
    for complaint in complaints.iter_mut() {
        if let Some(narrative) = complaint.narrative.as_mut() {
            *narrative = clean_text(narrative);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complaints() -> Vec<Complaint> {
        vec![
            Complaint::new("Credit card", Some("Charged twice!")),
            Complaint::new("Mortgage", Some("Escrow problem")),
            Complaint::new("Money transfers", None),
            Complaint::new("Savings account", Some("")),
        ]
    }

    #[test]
    fn test_filter_by_default_products() {
        let kept = filter_by_product(complaints(), None);
        let products: Vec<_> = kept.iter().map(|c| c.product.as_str()).collect();
        assert_eq!(products, vec!["Credit card", "Money transfers", "Savings account"]);
    }

    #[test]
    fn test_filter_by_explicit_products() {
        let kept = filter_by_product(complaints(), Some(&["Mortgage"][..]));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].narrative.as_deref(), Some("Escrow problem"));
    }

    #[test]
    fn test_drop_empty_narratives_keeps_blank_strings() {
        let kept = drop_empty_narratives(complaints());
        assert_eq!(kept.len(), 3);
        assert!(kept.iter().all(|c| c.narrative.is_some()));
    }

    #[test]
    fn test_apply_text_cleaning() {
        let mut rows = complaints();
        apply_text_cleaning(&mut rows);
        assert_eq!(rows[0].narrative.as_deref(), Some("charged twice"));
        assert_eq!(rows[2].narrative, None);
    }

    #[test]
    fn test_complaint_serde_columns() {
        let json =
            r#"{"Product":"Credit card","Consumer complaint narrative":"Late fee","Complaint ID":123}"#;
        let complaint: Complaint = serde_json::from_str(json).unwrap();
        assert_eq!(complaint.product, "Credit card");
        assert_eq!(complaint.narrative.as_deref(), Some("Late fee"));
        assert_eq!(complaint.extra["Complaint ID"], 123);

        let missing: Complaint = serde_json::from_str(r#"{"Product":"Personal loan"}"#).unwrap();
        assert_eq!(missing.narrative, None);
    }
}
