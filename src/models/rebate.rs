//! Rebate (deal) records attached to products by id.

use sea_orm::Value;
use serde::Deserialize;

use super::ids;
use crate::bulk::{BulkRecord, TableKind};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rebate {
    #[serde(deserialize_with = "ids::deserialize")]
    pub id: String,
    #[serde(default, deserialize_with = "ids::deserialize_option")]
    pub brand_id: Option<String>,
    pub detailed_description: Option<String>,
    pub expires_at: Option<String>,
    pub img: Option<String>,
    pub instant_rebate: Option<bool>,
    pub name: Option<String>,
    pub price: Option<f64>,
    pub short_description: Option<String>,
    pub starts_at: Option<String>,
    pub submission_date: Option<String>,
    pub submission_link: Option<String>,
    pub title: Option<String>,
}

impl Rebate {
    /// GraphQL selection for one deal.
    pub const SELECTION: &'static str = "brandId detailedDescription expiresAt id img \
        instantRebate name price shortDescription startsAt submissionDate submissionLink title";
}

impl BulkRecord for Rebate {
    const KIND: TableKind = TableKind::Rebates;
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "brand_id",
        "detailed_description",
        "expires_at",
        "img",
        "instant_rebate",
        "name",
        "price",
        "short_description",
        "starts_at",
        "submission_date",
        "submission_link",
        "title",
    ];
    const KEY_COLUMN: &'static str = "id";

    fn key(&self) -> &str {
        &self.id
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.id.clone().into(),
            self.brand_id.clone().into(),
            self.detailed_description.clone().into(),
            self.expires_at.clone().into(),
            self.img.clone().into(),
            self.instant_rebate.into(),
            self.name.clone().into(),
            self.price.into(),
            self.short_description.clone().into(),
            self.starts_at.clone().into(),
            self.submission_date.clone().into(),
            self.submission_link.clone().into(),
            self.title.clone().into(),
        ]
    }
}
