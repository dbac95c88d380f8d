//! Bulk product import and CSV export for the back office.
//!
//! Import requires the `name, price, stock, category` columns and accepts
//! `description, image_url`. A missing column or any bad row rejects the whole
//! file; nothing is written unless every row is valid.

use crate::{
    entities::{category, product, product_image, MovementType},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        categories::slugify,
        inventory::{InventoryLedger, MovementRequest},
        products::unique_slug,
    },
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set, TransactionTrait};
use serde::Serialize;
use serde_json::Value;
use std::{collections::HashMap, str::FromStr, sync::Arc};
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

pub const REQUIRED_COLUMNS: [&str; 4] = ["name", "price", "stock", "category"];
pub const OPTIONAL_COLUMNS: [&str; 2] = ["description", "image_url"];

/// One validated row of an import file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    pub line: u64,
    pub name: String,
    pub price: Decimal,
    pub stock: i32,
    pub category: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ImportSummary {
    pub imported: usize,
    pub categories_created: usize,
    pub product_ids: Vec<Uuid>,
}

/// Parses and validates an import file without touching the database
pub fn parse_import(data: &str) -> Result<Vec<ImportRow>, ServiceError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(false)
        .from_reader(data.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_lowercase())
        .collect();

    let position = |column: &str| headers.iter().position(|h| h == column);
    let mut required = [0usize; 4];
    for (slot, column) in required.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = position(column)
            .ok_or_else(|| ServiceError::csv_column(column, "missing required column"))?;
    }
    let [name_idx, price_idx, stock_idx, category_idx] = required;
    let description_idx = position(OPTIONAL_COLUMNS[0]);
    let image_idx = position(OPTIONAL_COLUMNS[1]);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let field = |idx: usize| record.get(idx).unwrap_or("").trim();
        let optional = |idx: Option<usize>| {
            idx.map(|i| field(i))
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let name = field(name_idx);
        if name.is_empty() {
            return Err(row_error(line, "name", "name is empty"));
        }

        let price = Decimal::from_str(&field(price_idx).replace(',', "."))
            .map_err(|_| row_error(line, "price", "price is not a number"))?;
        if price.is_sign_negative() {
            return Err(row_error(line, "price", "price cannot be negative"));
        }

        let stock: i32 = field(stock_idx)
            .parse()
            .map_err(|_| row_error(line, "stock", "stock is not an integer"))?;
        if stock < 0 {
            return Err(row_error(line, "stock", "stock cannot be negative"));
        }

        let category = field(category_idx);
        if category.is_empty() {
            return Err(row_error(line, "category", "category is empty"));
        }

        rows.push(ImportRow {
            line,
            name: name.to_string(),
            price,
            stock,
            category: category.to_string(),
            description: optional(description_idx),
            image_url: optional(image_idx),
        });
    }

    if rows.is_empty() {
        return Err(ServiceError::CsvError {
            message: "the file has no rows".to_string(),
            column: None,
        });
    }
    Ok(rows)
}

fn row_error(line: u64, column: &str, message: &str) -> ServiceError {
    ServiceError::csv_column(column, format!("line {}: {}", line, message))
}

/// Serialises rows to CSV, one column per field the rows contain
pub fn export_rows<T: Serialize>(rows: &[T]) -> Result<String, ServiceError> {
    let values = rows
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;

    let mut headers: Vec<String> = Vec::new();
    for value in &values {
        if let Value::Object(map) = value {
            for key in map.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
        }
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    if headers.is_empty() {
        return Ok(String::new());
    }
    writer.write_record(&headers)?;
    for value in &values {
        let record: Vec<String> = headers
            .iter()
            .map(|h| value.get(h).map(value_to_cell).unwrap_or_default())
            .collect();
        writer.write_record(&record)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ServiceError::InternalError(format!("csv flush failed: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| ServiceError::SerializationError(format!("csv is not utf-8: {}", e)))
}

fn value_to_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Clone)]
pub struct CsvService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl CsvService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Imports every row in one transaction, creating unknown categories by name
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn import_products(
        &self,
        data: &str,
        user_id: Option<Uuid>,
    ) -> Result<ImportSummary, ServiceError> {
        let rows = parse_import(data)?;

        let txn = self.db.begin().await?;
        let existing = category::Entity::find().all(&txn).await?;
        let mut by_slug: HashMap<String, Uuid> =
            existing.iter().map(|c| (c.slug.clone(), c.id)).collect();
        let mut categories: HashMap<String, Uuid> = existing
            .into_iter()
            .map(|c| (c.name.to_lowercase(), c.id))
            .collect();

        let now = Utc::now();
        let mut categories_created = 0;
        let mut product_ids = Vec::with_capacity(rows.len());

        for row in rows {
            let key = row.category.to_lowercase();
            let slug = slugify(&row.category);
            let known = categories.get(&key).or_else(|| by_slug.get(&slug)).copied();
            let category_id = match known {
                Some(id) => id,
                None => {
                    if slug.is_empty() {
                        return Err(row_error(
                            row.line,
                            "category",
                            "category has no letters or digits",
                        ));
                    }
                    let created = category::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        name: Set(row.category.clone()),
                        slug: Set(slug.clone()),
                        description: Set(None),
                        image_url: Set(None),
                        parent_id: Set(None),
                        created_at: Set(now),
                        updated_at: Set(now),
                    }
                    .insert(&txn)
                    .await?;
                    categories_created += 1;
                    categories.insert(key, created.id);
                    by_slug.insert(slug, created.id);
                    created.id
                }
            };

            let slug = unique_slug(&txn, &row.name, None).await?;
            let product = product::ActiveModel {
                id: Set(Uuid::new_v4()),
                name: Set(row.name),
                slug: Set(slug),
                description: Set(row.description),
                base_price: Set(row.price),
                wholesale_price: Set(None),
                stock: Set(0),
                min_stock: Set(0),
                sku: Set(None),
                barcode: Set(None),
                category_id: Set(Some(category_id)),
                unit: Set(None),
                featured: Set(false),
                active: Set(true),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await?;

            if let Some(url) = row.image_url {
                product_image::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    product_id: Set(product.id),
                    url: Set(url),
                    position: Set(0),
                    is_primary: Set(true),
                    created_at: Set(now),
                }
                .insert(&txn)
                .await?;
            }

            if row.stock > 0 {
                let request = MovementRequest::new(product.id, MovementType::Entry, row.stock)
                    .reason("importación CSV")
                    .by(user_id);
                InventoryLedger::record_movement(&txn, request).await?;
            }

            product_ids.push(product.id);
        }

        txn.commit().await.map_err(|e| {
            error!("Failed to commit product import: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        info!(
            imported = product_ids.len(),
            categories_created, "products imported"
        );
        self.event_sender
            .send_or_log(Event::ProductsImported {
                count: product_ids.len(),
            })
            .await;

        Ok(ImportSummary {
            imported: product_ids.len(),
            categories_created,
            product_ids,
        })
    }

    pub async fn export_products(&self) -> Result<String, ServiceError> {
        let products = product::Entity::find().all(&*self.db).await?;
        export_rows(&products)
    }

    pub async fn export_customers(&self) -> Result<String, ServiceError> {
        let customers = crate::entities::customer::Entity::find()
            .all(&*self.db)
            .await?;
        export_rows(&customers)
    }

    pub async fn export_orders(&self) -> Result<String, ServiceError> {
        let orders = crate::entities::order::Entity::find().all(&*self.db).await?;
        export_rows(&orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_required_and_optional_columns() {
        let data = "Name,Price,Stock,Category,Description\n\
                    Cemento,9500.50,40,Obra gruesa,Bolsa 50kg\n\
                    Arena,\"15000,75\",0,Obra gruesa,\n";
        let rows = parse_import(data).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].price, dec!(9500.50));
        assert_eq!(rows[0].description.as_deref(), Some("Bolsa 50kg"));
        assert_eq!(rows[1].price, dec!(15000.75));
        assert_eq!(rows[1].description, None);
        assert_eq!(rows[1].image_url, None);
    }

    #[test]
    fn missing_category_column_names_the_column() {
        let data = "name,price,stock\nCemento,9500,40\n";
        assert_matches!(
            parse_import(data),
            Err(ServiceError::CsvError { column: Some(c), .. }) if c == "category"
        );
    }

    #[test]
    fn bad_row_rejects_the_file() {
        let data = "name,price,stock,category\nCemento,9500,40,Obra\nArena,abc,1,Obra\n";
        assert_matches!(
            parse_import(data),
            Err(ServiceError::CsvError { column: Some(c), message })
                if c == "price" && message.contains("line 3")
        );

        let data = "name,price,stock,category\nCemento,9500,-1,Obra\n";
        assert_matches!(
            parse_import(data),
            Err(ServiceError::CsvError { column: Some(c), .. }) if c == "stock"
        );
    }

    #[test]
    fn empty_file_is_rejected() {
        assert!(parse_import("name,price,stock,category\n").is_err());
    }

    #[derive(Serialize)]
    struct Row {
        name: &'static str,
        note: Option<&'static str>,
        qty: i32,
    }

    #[test]
    fn export_writes_header_from_fields_and_escapes() {
        let csv = export_rows(&[
            Row {
                name: "Pintura, blanca",
                note: None,
                qty: 3,
            },
            Row {
                name: "Rodillo",
                note: Some("con \"mango\""),
                qty: 1,
            },
        ])
        .unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("name,note,qty"));
        assert_eq!(lines.next(), Some("\"Pintura, blanca\",,3"));
        assert_eq!(lines.next(), Some("Rodillo,\"con \"\"mango\"\"\",1"));
        assert_eq!(export_rows::<Row>(&[]).unwrap(), "");
    }
}
