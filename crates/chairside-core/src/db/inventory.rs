//! Inventory stock operations.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::InventoryItem;

impl Database {
    /// Insert or update an item, keyed by clinic and name.
    pub fn upsert_inventory_item(&self, item: &InventoryItem) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO inventory_items (
                item_id, clinic_id, name, stock_quantity, min_stock_level, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(clinic_id, name) DO UPDATE SET
                stock_quantity = excluded.stock_quantity,
                min_stock_level = excluded.min_stock_level,
                updated_at = excluded.updated_at
            "#,
            params![
                item.item_id,
                item.clinic_id,
                item.name,
                item.stock_quantity,
                item.min_stock_level,
                item.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get an item by ID.
    pub fn get_inventory_item(&self, item_id: &str) -> DbResult<Option<InventoryItem>> {
        self.conn
            .query_row(
                r#"
                SELECT item_id, clinic_id, name, stock_quantity, min_stock_level, updated_at
                FROM inventory_items
                WHERE item_id = ?
                "#,
                [item_id],
                |row| {
                    Ok(InventoryItem {
                        item_id: row.get(0)?,
                        clinic_id: row.get(1)?,
                        name: row.get(2)?,
                        stock_quantity: row.get(3)?,
                        min_stock_level: row.get(4)?,
                        updated_at: row.get(5)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    /// Add `delta` (may be negative) to an item's stock.
    ///
    /// Returns the new quantity, or `None` when the item does not exist.
    pub fn adjust_stock(&self, item_id: &str, delta: i64) -> DbResult<Option<i64>> {
        let rows_affected = self
            .conn
            .execute(
                r#"
                UPDATE inventory_items
                SET stock_quantity = stock_quantity + ?2, updated_at = ?3
                WHERE item_id = ?1
                "#,
                params![item_id, delta, Utc::now()],
            )
            .map_err(|e| match e.sqlite_error_code() {
                Some(rusqlite::ErrorCode::ConstraintViolation) => {
                    DbError::Constraint(format!("Stock for {} cannot go negative", item_id))
                }
                _ => DbError::Sqlite(e),
            })?;
        if rows_affected == 0 {
            return Ok(None);
        }
        Ok(self.get_inventory_item(item_id)?.map(|item| item.stock_quantity))
    }

    /// Names of items at or below their minimum stock level.
    pub fn low_stock_items(&self, clinic_id: &str) -> DbResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT name FROM inventory_items
            WHERE clinic_id = ? AND stock_quantity <= min_stock_level
            ORDER BY name
            "#,
        )?;
        let rows = stmt.query_map([clinic_id], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
