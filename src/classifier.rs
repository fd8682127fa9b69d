use serde::{Deserialize, Serialize};

/// Verdict for a single availability check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    InStock,
    OutOfStock,
    /// The selector matched nothing on the page. Treated as "not in stock"
    /// for decision purposes but logged distinctly from a confirmed
    /// out-of-stock reading.
    Indeterminate,
}

impl Availability {
    pub fn is_in_stock(&self) -> bool {
        matches!(self, Availability::InStock)
    }
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Availability::InStock => write!(f, "in stock"),
            Availability::OutOfStock => write!(f, "out of stock"),
            Availability::Indeterminate => write!(f, "indeterminate"),
        }
    }
}

/// Classify extracted page text against the configured out-of-stock marker.
///
/// The product is considered in stock when the marker is absent from the
/// extracted text. Comparison is case-insensitive.
pub fn classify(extracted: Option<&str>, out_of_stock_marker: &str) -> Availability {
    let Some(text) = extracted else {
        return Availability::Indeterminate;
    };

    if text
        .to_lowercase()
        .contains(&out_of_stock_marker.to_lowercase())
    {
        Availability::OutOfStock
    } else {
        Availability::InStock
    }
}
