//! Commodity model: one tracked item stored in an area.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use stockpile_core::types::EntityId;

/// A row from the `commodities` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Commodity {
    pub id: EntityId,
    pub name: String,
    pub short_name: String,
    pub commodity_type: String,
    pub area_id: EntityId,
    pub count: i32,
    pub original_price: f64,
    pub original_price_currency: String,
    pub converted_original_price: f64,
    pub current_price: f64,
    pub serial_number: Option<String>,
    pub extra_serial_numbers: Vec<String>,
    pub part_numbers: Vec<String>,
    pub tags: Vec<String>,
    pub status: String,
    pub purchase_date: Option<NaiveDate>,
    pub registered_date: Option<NaiveDate>,
    pub last_modified_date: Option<NaiveDate>,
    pub urls: Vec<String>,
    pub comments: String,
    pub draft: bool,
}

impl Commodity {
    /// A commodity with the given identity and neutral defaults elsewhere.
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>, area_id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            short_name: String::new(),
            commodity_type: "other".to_string(),
            area_id: area_id.into(),
            count: 1,
            original_price: 0.0,
            original_price_currency: String::new(),
            converted_original_price: 0.0,
            current_price: 0.0,
            serial_number: None,
            extra_serial_numbers: Vec::new(),
            part_numbers: Vec::new(),
            tags: Vec::new(),
            status: "in_use".to_string(),
            purchase_date: None,
            registered_date: None,
            last_modified_date: None,
            urls: Vec::new(),
            comments: String::new(),
            draft: false,
        }
    }
}
