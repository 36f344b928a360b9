//! Transaction operations

use chrono::NaiveDate;
use rusqlite::{params, Row};

use super::Database;
use crate::error::{Error, Result};
use crate::models::{NewTransaction, TransactionRecord, TransactionType};

/// Minimum description length for a row to count as training material
const MIN_DESCRIPTION_LENGTH: usize = 3;

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<TransactionRecord> {
    let date_str: String = row.get("date")?;
    let type_str: String = row.get("transaction_type")?;

    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let transaction_type = type_str.parse::<TransactionType>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            e.into(),
        )
    })?;

    Ok(TransactionRecord {
        id: row.get("id")?,
        date,
        amount: row.get("amount")?,
        description: row.get("description")?,
        transaction_type,
        category: row.get("category")?,
    })
}

impl Database {
    /// Insert a transaction, returning its new id
    pub fn insert_transaction(&self, tx: &NewTransaction) -> Result<i64> {
        if tx.amount <= 0.0 {
            return Err(Error::InvalidData(format!(
                "Amount must be positive, got {}",
                tx.amount
            )));
        }
        if tx.description.trim().is_empty() {
            return Err(Error::InvalidData("Description must not be empty".to_string()));
        }

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO transactions (date, amount, description, transaction_type, category)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                tx.date.to_string(),
                tx.amount,
                tx.description,
                tx.transaction_type.as_str(),
                tx.category,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// List transactions, newest first, with optional type/category filters
    pub fn list_transactions(
        &self,
        transaction_type: Option<TransactionType>,
        category: Option<&str>,
        limit: i64,
    ) -> Result<Vec<TransactionRecord>> {
        let conn = self.conn()?;

        let mut sql = "SELECT * FROM transactions WHERE 1=1".to_string();
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(t) = transaction_type {
            sql.push_str(" AND transaction_type = ?");
            args.push(Box::new(t.as_str().to_string()));
        }
        if let Some(c) = category {
            sql.push_str(" AND category = ?");
            args.push(Box::new(c.to_string()));
        }
        sql.push_str(" ORDER BY date DESC, id DESC LIMIT ?");
        args.push(Box::new(limit));

        let mut stmt = conn.prepare(&sql)?;
        let params = rusqlite::params_from_iter(args.iter().map(|b| b.as_ref()));
        let rows = stmt.query_map(params, record_from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// All transactions in chronological order (bulk read for the predictors)
    pub fn all_transactions(&self) -> Result<Vec<TransactionRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT * FROM transactions ORDER BY date ASC, id ASC")?;
        let rows = stmt.query_map([], record_from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Rows usable as classifier training material: non-null description and
    /// category, description longer than the minimum.
    pub fn training_corpus(&self) -> Result<Vec<TransactionRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM transactions
            WHERE description IS NOT NULL AND category IS NOT NULL
              AND LENGTH(description) > ?
            ORDER BY date ASC, id ASC
            "#,
        )?;
        let rows = stmt.query_map(params![MIN_DESCRIPTION_LENGTH as i64], record_from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Count of rows with both description and category set
    pub fn count_labeled(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE description IS NOT NULL AND category IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Set the category of an existing transaction
    pub fn update_category(&self, id: i64, category: &str) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE transactions SET category = ? WHERE id = ?",
            params![category, id],
        )?;
        if updated == 0 {
            return Err(Error::InvalidData(format!("No transaction with id {}", id)));
        }
        Ok(())
    }
}
