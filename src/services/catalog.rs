//! Storefront catalog: text search, filters, sorting and fixed-size pages.
//!
//! Filter state round-trips through the query string (`q, category, price,
//! minPrice, maxPrice, minStock, maxStock, inStock, sort, page`) so views can be
//! bookmarked and shared. Filtering runs in memory over the active products,
//! which keeps the semantics identical to the storefront's own list filtering.

use crate::{
    entities::{category, product, product_image},
    errors::ServiceError,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, str::FromStr, sync::Arc};
use tracing::instrument;
use url::form_urlencoded;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Canned price ranges offered next to the free min/max inputs
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PriceBucket {
    /// Below $ 10.000
    Low,
    /// $ 10.000 to $ 50.000
    Mid,
    /// Above $ 50.000
    High,
}

impl PriceBucket {
    pub fn contains(&self, price: Decimal) -> bool {
        match self {
            PriceBucket::Low => price < dec!(10000),
            PriceBucket::Mid => price >= dec!(10000) && price <= dec!(50000),
            PriceBucket::High => price > dec!(50000),
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CatalogSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    NameAsc,
    NameDesc,
    StockDesc,
}

/// Catalog filter state as it appears in the URL
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase", default)]
#[into_params(parameter_in = Query)]
pub struct CatalogQuery {
    /// Case-insensitive substring over name, description, sku and barcode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    /// Category slug or id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<PriceBucket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_stock: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_stock: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_stock: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<CatalogSort>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
}

impl CatalogQuery {
    /// Parses a raw query string; unknown keys are ignored, malformed values rejected
    pub fn from_query_string(raw: &str) -> Result<Self, ServiceError> {
        let mut query = CatalogQuery::default();
        for (key, value) in form_urlencoded::parse(raw.trim_start_matches('?').as_bytes()) {
            let value = value.trim().to_string();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "q" => query.q = Some(value),
                "category" => query.category = Some(value),
                "price" => query.price = Some(parse_value(&key, &value)?),
                "minPrice" => query.min_price = Some(parse_value(&key, &value)?),
                "maxPrice" => query.max_price = Some(parse_value(&key, &value)?),
                "minStock" => query.min_stock = Some(parse_value(&key, &value)?),
                "maxStock" => query.max_stock = Some(parse_value(&key, &value)?),
                "inStock" => query.in_stock = Some(parse_value(&key, &value)?),
                "sort" => query.sort = Some(parse_value(&key, &value)?),
                "page" => query.page = Some(parse_value(&key, &value)?),
                _ => {}
            }
        }
        Ok(query)
    }

    /// Serialises the set filters back into a query string (without the leading `?`)
    pub fn to_query_string(&self) -> String {
        let mut out = form_urlencoded::Serializer::new(String::new());
        if let Some(q) = &self.q {
            out.append_pair("q", q);
        }
        if let Some(category) = &self.category {
            out.append_pair("category", category);
        }
        if let Some(price) = self.price {
            out.append_pair("price", &price.to_string());
        }
        if let Some(v) = self.min_price {
            out.append_pair("minPrice", &v.to_string());
        }
        if let Some(v) = self.max_price {
            out.append_pair("maxPrice", &v.to_string());
        }
        if let Some(v) = self.min_stock {
            out.append_pair("minStock", &v.to_string());
        }
        if let Some(v) = self.max_stock {
            out.append_pair("maxStock", &v.to_string());
        }
        if let Some(v) = self.in_stock {
            out.append_pair("inStock", &v.to_string());
        }
        if let Some(sort) = self.sort {
            out.append_pair("sort", &sort.to_string());
        }
        if let Some(page) = self.page {
            out.append_pair("page", &page.to_string());
        }
        out.finish()
    }

    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Whether `p` passes every filter except the category one
    fn matches(&self, p: &product::Model, needle: Option<&str>) -> bool {
        if let Some(needle) = needle {
            let hit = contains_ci(&p.name, needle)
                || p.description.as_deref().is_some_and(|d| contains_ci(d, needle))
                || p.sku.as_deref().is_some_and(|s| contains_ci(s, needle))
                || p.barcode.as_deref().is_some_and(|b| contains_ci(b, needle));
            if !hit {
                return false;
            }
        }
        if let Some(bucket) = self.price {
            if !bucket.contains(p.base_price) {
                return false;
            }
        }
        if self.min_price.is_some_and(|min| p.base_price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| p.base_price > max) {
            return false;
        }
        if self.min_stock.is_some_and(|min| p.stock < min) {
            return false;
        }
        if self.max_stock.is_some_and(|max| p.stock > max) {
            return false;
        }
        if self.in_stock == Some(true) && p.stock <= 0 {
            return false;
        }
        true
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ServiceError> {
    value
        .parse()
        .map_err(|_| ServiceError::InvalidInput(format!("invalid value '{}' for '{}'", value, key)))
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

/// Filters, sorts and pages `products`. `category_id` is the resolved category filter.
pub fn filter_products(
    products: Vec<product::Model>,
    query: &CatalogQuery,
    category_id: Option<Uuid>,
    page_size: u64,
) -> CatalogPage<product::Model> {
    let needle = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let mut matched: Vec<product::Model> = products
        .into_iter()
        .filter(|p| category_id.map_or(true, |id| p.category_id == Some(id)))
        .filter(|p| query.matches(p, needle.as_deref()))
        .collect();

    sort_products(&mut matched, query.sort.unwrap_or_default());
    paginate(matched, query.page(), page_size)
}

pub fn sort_products(products: &mut [product::Model], sort: CatalogSort) {
    match sort {
        CatalogSort::Newest => products.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        CatalogSort::PriceAsc => products.sort_by(|a, b| a.base_price.cmp(&b.base_price)),
        CatalogSort::PriceDesc => products.sort_by(|a, b| b.base_price.cmp(&a.base_price)),
        CatalogSort::NameAsc => {
            products.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        }
        CatalogSort::NameDesc => {
            products.sort_by(|a, b| b.name.to_lowercase().cmp(&a.name.to_lowercase()))
        }
        CatalogSort::StockDesc => products.sort_by(|a, b| b.stock.cmp(&a.stock)),
    }
}

/// One page of results
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CatalogPage<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

pub fn paginate<T>(items: Vec<T>, page: u64, per_page: u64) -> CatalogPage<T> {
    let per_page = per_page.max(1);
    let total = items.len() as u64;
    let total_pages = total.div_ceil(per_page);
    let page = page.max(1);
    // pages past the end come back empty, even near u64::MAX
    let skip = usize::try_from((page - 1).saturating_mul(per_page)).unwrap_or(usize::MAX);
    let take = usize::try_from(per_page).unwrap_or(usize::MAX);

    CatalogPage {
        items: items.into_iter().skip(skip).take(take).collect(),
        total,
        page,
        per_page,
        total_pages,
    }
}

/// Catalog card: the product plus its primary image
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CatalogItem {
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub product: product::Model,
    pub image_url: Option<String>,
    pub in_stock: bool,
}

#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    page_size: u64,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, page_size: u64) -> Self {
        Self { db, page_size }
    }

    /// Runs `query` over the active products
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query: &CatalogQuery,
    ) -> Result<CatalogPage<CatalogItem>, ServiceError> {
        let db = &*self.db;

        let category_id = match query.category.as_deref() {
            Some(raw) => Some(self.resolve_category(raw).await?),
            None => None,
        };

        let products = product::Entity::find()
            .filter(product::Column::Active.eq(true))
            .all(db)
            .await?;

        let page = filter_products(products, query, category_id, self.page_size);

        let ids: Vec<Uuid> = page.items.iter().map(|p| p.id).collect();
        let mut primary: HashMap<Uuid, String> = HashMap::new();
        if !ids.is_empty() {
            let images = product_image::Entity::find()
                .filter(product_image::Column::ProductId.is_in(ids))
                .order_by_desc(product_image::Column::IsPrimary)
                .order_by_asc(product_image::Column::Position)
                .all(db)
                .await?;
            for image in images {
                primary.entry(image.product_id).or_insert(image.url);
            }
        }

        Ok(CatalogPage {
            items: page
                .items
                .into_iter()
                .map(|p| CatalogItem {
                    image_url: primary.remove(&p.id),
                    in_stock: p.in_stock(),
                    product: p,
                })
                .collect(),
            total: page.total,
            page: page.page,
            per_page: page.per_page,
            total_pages: page.total_pages,
        })
    }

    /// Featured active products for the home page
    pub async fn featured(&self, limit: usize) -> Result<Vec<product::Model>, ServiceError> {
        let mut products = product::Entity::find()
            .filter(product::Column::Active.eq(true))
            .filter(product::Column::Featured.eq(true))
            .order_by_desc(product::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        products.truncate(limit);
        Ok(products)
    }

    /// Accepts a category id or slug
    async fn resolve_category(&self, raw: &str) -> Result<Uuid, ServiceError> {
        let found = match Uuid::parse_str(raw) {
            Ok(id) => category::Entity::find_by_id(id).one(&*self.db).await?,
            Err(_) => {
                category::Entity::find()
                    .filter(category::Column::Slug.eq(raw))
                    .one(&*self.db)
                    .await?
            }
        };
        found
            .map(|c| c.id)
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", raw)))
    }
}
