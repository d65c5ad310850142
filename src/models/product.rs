//! Catalog records as returned by the upstream API, and the brand/model rows
//! derived from them.
//!
//! Products reference brands and models by name rather than by surrogate id.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use sea_orm::Value;

use super::catalog::Catalog;
use super::ids;
use crate::bulk::{BulkRecord, TableKind};

const TIRE_PRODUCT_COLUMNS: &[&str] = &[
    "id",
    "availability",
    "currency",
    "description",
    "dual_load_index",
    "dual_max_inflation_pressure",
    "dual_max_load",
    "featured",
    "image_url",
    "load_index",
    "max_inflation_pressure",
    "max_load",
    "mpn",
    "overall_diameter",
    "price",
    "revs_per_mile",
    "rim_width_range",
    "road_condition",
    "sect_width",
    "sidewall",
    "size_desc",
    "sku",
    "speed_rating",
    "temperature",
    "traction",
    "tread_depth",
    "tread_type",
    "treadwear",
    "url",
    "utqg",
    "warranty",
    "aspect_ratio",
    "diameter",
    "width",
    "brand_name",
    "model_name",
    "rebate_id",
];

const WHEEL_PRODUCT_COLUMNS: &[&str] = &[
    "id",
    "availability",
    "back_spacing",
    "bolt_circle",
    "currency",
    "featured",
    "finish",
    "hub_bore",
    "image_url",
    "length",
    "lugs",
    "wheel_offset",
    "price",
    "url",
    "weight",
    "bolt_pattern",
    "diameter",
    "width",
    "brand_name",
    "model_name",
    "rebate_id",
];

/// Column count of the widest record any catalog writes.
pub const WIDEST_RECORD_PARAMS: usize = TIRE_PRODUCT_COLUMNS.len();

/// A product type belonging to exactly one catalog.
pub trait CatalogProduct: BulkRecord + DeserializeOwned + Send + Sync + 'static {
    const CATALOG: Catalog;
    /// Paginated collection field, e.g. `allTires`.
    const COLLECTION: &'static str;
    /// GraphQL operation name, e.g. `AllTires`.
    const OPERATION: &'static str;
    /// Item selection set requested for each page.
    const SELECTION: &'static str;

    fn id(&self) -> &str;
    fn brand_name(&self) -> Option<&str>;
    fn model_name(&self) -> Option<&str>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BrandRecord {
    pub name: String,
}

impl BulkRecord for BrandRecord {
    const KIND: TableKind = TableKind::Brands;
    const COLUMNS: &'static [&'static str] = &["brand_name"];
    const KEY_COLUMN: &'static str = "brand_name";

    fn key(&self) -> &str {
        &self.name
    }

    fn values(&self) -> Vec<Value> {
        vec![self.name.clone().into()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRecord {
    pub name: String,
    pub brand_name: Option<String>,
    pub taxonomy_id: Option<String>,
}

impl BulkRecord for ModelRecord {
    const KIND: TableKind = TableKind::Models;
    const COLUMNS: &'static [&'static str] = &["model_name", "brand_name", "model_taxon_id"];
    const KEY_COLUMN: &'static str = "model_name";

    fn key(&self) -> &str {
        &self.name
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.name.clone().into(),
            self.brand_name.clone().into(),
            self.taxonomy_id.clone().into(),
        ]
    }
}

/// `rebate { id }` on a product; `null` when the product has no rebate.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RebateRef {
    #[serde(deserialize_with = "ids::deserialize")]
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TireSize {
    pub aspect_ratio: Option<f64>,
    pub diameter: Option<f64>,
    pub width: Option<f64>,
}

/// Numeric attributes are untyped JSON numbers upstream and are read as `f64`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TireProduct {
    #[serde(deserialize_with = "ids::deserialize")]
    pub id: String,
    pub availability: Option<String>,
    pub brand: Option<String>,
    pub currency: Option<String>,
    pub description: Option<String>,
    pub dual_load_index: Option<f64>,
    pub dual_max_inflation_pressure: Option<f64>,
    pub dual_max_load: Option<f64>,
    pub featured: Option<bool>,
    pub image_url: Option<String>,
    pub load_index: Option<f64>,
    pub max_inflation_pressure: Option<f64>,
    pub max_load: Option<f64>,
    pub model_name: Option<String>,
    pub mpn: Option<String>,
    pub overall_diameter: Option<f64>,
    pub price: Option<f64>,
    pub revs_per_mile: Option<f64>,
    pub rim_width_range: Option<String>,
    pub road_condition: Option<String>,
    pub sect_width: Option<f64>,
    pub sidewall: Option<String>,
    pub size_desc: Option<String>,
    pub sku: Option<String>,
    pub speed_rating: Option<String>,
    pub temperature: Option<String>,
    pub traction: Option<String>,
    pub tread_depth: Option<f64>,
    pub tread_type: Option<String>,
    pub treadwear: Option<String>,
    pub url: Option<String>,
    pub utqg: Option<String>,
    pub warranty: Option<String>,
    pub size: Option<TireSize>,
    pub rebate: Option<RebateRef>,
}

impl TireProduct {
    /// Warranty text with commas removed.
    pub fn normalized_warranty(&self) -> Option<String> {
        self.warranty.as_deref().map(|w| w.replace(',', ""))
    }
}

impl BulkRecord for TireProduct {
    const KIND: TableKind = TableKind::Products;
    const COLUMNS: &'static [&'static str] = TIRE_PRODUCT_COLUMNS;
    const KEY_COLUMN: &'static str = "id";

    fn key(&self) -> &str {
        &self.id
    }

    fn values(&self) -> Vec<Value> {
        let size = self.size.as_ref();
        vec![
            self.id.clone().into(),
            self.availability.clone().into(),
            self.currency.clone().into(),
            self.description.clone().into(),
            self.dual_load_index.into(),
            self.dual_max_inflation_pressure.into(),
            self.dual_max_load.into(),
            self.featured.into(),
            self.image_url.clone().into(),
            self.load_index.into(),
            self.max_inflation_pressure.into(),
            self.max_load.into(),
            self.mpn.clone().into(),
            self.overall_diameter.into(),
            self.price.into(),
            self.revs_per_mile.into(),
            self.rim_width_range.clone().into(),
            self.road_condition.clone().into(),
            self.sect_width.into(),
            self.sidewall.clone().into(),
            self.size_desc.clone().into(),
            self.sku.clone().into(),
            self.speed_rating.clone().into(),
            self.temperature.clone().into(),
            self.traction.clone().into(),
            self.tread_depth.into(),
            self.tread_type.clone().into(),
            self.treadwear.clone().into(),
            self.url.clone().into(),
            self.utqg.clone().into(),
            self.normalized_warranty().into(),
            size.and_then(|s| s.aspect_ratio).into(),
            size.and_then(|s| s.diameter).into(),
            size.and_then(|s| s.width).into(),
            self.brand.clone().into(),
            self.model_name.clone().into(),
            self.rebate.as_ref().map(|r| r.id.clone()).into(),
        ]
    }
}

impl CatalogProduct for TireProduct {
    const CATALOG: Catalog = Catalog::Tires;
    const COLLECTION: &'static str = "allTires";
    const OPERATION: &'static str = "AllTires";
    const SELECTION: &'static str = "availability brand currency description dualLoadIndex \
        dualMaxInflationPressure dualMaxLoad featured id imageUrl loadIndex maxInflationPressure \
        maxLoad modelName mpn overallDiameter price revsPerMile rimWidthRange roadCondition \
        sectWidth sidewall sizeDesc sku speedRating temperature traction treadDepth treadType \
        treadwear url utqg warranty size { aspectRatio diameter width } rebate { id }";

    fn id(&self) -> &str {
        &self.id
    }

    fn brand_name(&self) -> Option<&str> {
        self.brand.as_deref()
    }

    fn model_name(&self) -> Option<&str> {
        self.model_name.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WheelSize {
    pub bolt_pattern: Option<String>,
    pub diameter: Option<f64>,
    pub width: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WheelProduct {
    #[serde(deserialize_with = "ids::deserialize")]
    pub id: String,
    pub availability: Option<String>,
    pub back_spacing: Option<f64>,
    pub bolt_circle: Option<f64>,
    pub brand: Option<String>,
    pub currency: Option<String>,
    pub featured: Option<bool>,
    pub finish: Option<String>,
    pub hub_bore: Option<f64>,
    pub image_url: Option<String>,
    pub length: Option<f64>,
    pub lugs: Option<f64>,
    pub model_name: Option<String>,
    pub offset: Option<f64>,
    pub price: Option<f64>,
    pub url: Option<String>,
    pub weight: Option<f64>,
    pub size: Option<WheelSize>,
    pub rebate: Option<RebateRef>,
}

impl BulkRecord for WheelProduct {
    const KIND: TableKind = TableKind::Products;
    const COLUMNS: &'static [&'static str] = WHEEL_PRODUCT_COLUMNS;
    const KEY_COLUMN: &'static str = "id";

    fn key(&self) -> &str {
        &self.id
    }

    fn values(&self) -> Vec<Value> {
        let size = self.size.as_ref();
        vec![
            self.id.clone().into(),
            self.availability.clone().into(),
            self.back_spacing.into(),
            self.bolt_circle.into(),
            self.currency.clone().into(),
            self.featured.into(),
            self.finish.clone().into(),
            self.hub_bore.into(),
            self.image_url.clone().into(),
            self.length.into(),
            self.lugs.into(),
            self.offset.into(),
            self.price.into(),
            self.url.clone().into(),
            self.weight.into(),
            size.and_then(|s| s.bolt_pattern.clone()).into(),
            size.and_then(|s| s.diameter).into(),
            size.and_then(|s| s.width).into(),
            self.brand.clone().into(),
            self.model_name.clone().into(),
            self.rebate.as_ref().map(|r| r.id.clone()).into(),
        ]
    }
}

impl CatalogProduct for WheelProduct {
    const CATALOG: Catalog = Catalog::Wheels;
    const COLLECTION: &'static str = "allWheels";
    const OPERATION: &'static str = "AllWheels";
    const SELECTION: &'static str = "availability backSpacing boltCircle brand currency featured \
        finish hubBore id imageUrl length lugs modelName offset price url weight \
        size { boltPattern diameter width } rebate { id }";

    fn id(&self) -> &str {
        &self.id
    }

    fn brand_name(&self) -> Option<&str> {
        self.brand.as_deref()
    }

    fn model_name(&self) -> Option<&str> {
        self.model_name.as_deref()
    }
}

/// Item shape for tombstone pages: only the id is needed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeletedItem {
    #[serde(deserialize_with = "ids::deserialize")]
    pub id: String,
}
