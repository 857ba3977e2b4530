//! SQLite card store.
//!
//! Connections are opened per operation and dropped right after;
//! nothing in the pipeline holds a connection across a crawl. Rows are
//! unique on `(bank, name)`: re-importing a card overwrites its fields
//! and bumps `updated_at`, and the pipeline never deletes rows.

mod normalize;

pub use normalize::{distill_application_condition, normalize, parse_annual_fee, NormalizeError};

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;
use tracing::debug;

use crate::models::{
    AnnualFee, ApplicationCondition, CanonicalCard, RawCardRecord, Requirement,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

pub struct CardStore {
    path: PathBuf,
}

impl CardStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }

    /// Create the schema. Safe to call on every start.
    pub fn init(&self) -> Result<(), StoreError> {
        let conn = self.open()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS credit_cards (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                bank TEXT NOT NULL,
                name TEXT NOT NULL,
                card_type TEXT,
                level TEXT,
                annual_fee TEXT NOT NULL DEFAULT '{}',
                points_rule TEXT,
                benefits TEXT NOT NULL DEFAULT '[]',
                requirements TEXT NOT NULL DEFAULT '[]',
                credit_limit TEXT,
                application_condition TEXT NOT NULL DEFAULT '{}',
                foreign_transaction_fee TEXT,
                card_organization TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (bank, name)
            );
            CREATE INDEX IF NOT EXISTS idx_credit_cards_bank ON credit_cards(bank);
            "#,
        )?;
        debug!("Card store ready at {}", self.path.display());
        Ok(())
    }

    /// Insert or overwrite one card on its `(bank, name)` key.
    ///
    /// An existing row keeps its id and `created_at`; everything else is
    /// overwritten and `updated_at` bumped. Returns the row id.
    pub fn upsert(&self, card: &CanonicalCard) -> Result<i64, StoreError> {
        let conn = self.open()?;
        let now = Utc::now();
        conn.execute(
            r#"
            INSERT INTO credit_cards (
                bank, name, card_type, level, annual_fee, points_rule,
                benefits, requirements, credit_limit, application_condition,
                foreign_transaction_fee, card_organization, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)
            ON CONFLICT (bank, name) DO UPDATE SET
                card_type = excluded.card_type,
                level = excluded.level,
                annual_fee = excluded.annual_fee,
                points_rule = excluded.points_rule,
                benefits = excluded.benefits,
                requirements = excluded.requirements,
                credit_limit = excluded.credit_limit,
                application_condition = excluded.application_condition,
                foreign_transaction_fee = excluded.foreign_transaction_fee,
                card_organization = excluded.card_organization,
                updated_at = excluded.updated_at
            "#,
            params![
                card.bank,
                card.name,
                card.card_type,
                card.level,
                serde_json::to_string(&card.annual_fee)?,
                card.points_rule,
                serde_json::to_string(&card.benefits)?,
                serde_json::to_string(&card.requirements)?,
                card.credit_limit,
                serde_json::to_string(&card.application_condition)?,
                card.foreign_transaction_fee,
                card.card_organization,
                now.to_rfc3339(),
            ],
        )?;
        let id = conn.query_row(
            "SELECT id FROM credit_cards WHERE bank = ?1 AND name = ?2",
            params![card.bank, card.name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Normalize a raw record and upsert it.
    pub fn upsert_raw(&self, record: &RawCardRecord) -> Result<i64, StoreError> {
        let card = normalize(record)?;
        self.upsert(&card)
    }

    pub fn get(&self, bank: &str, name: &str) -> Result<Option<CanonicalCard>, StoreError> {
        let conn = self.open()?;
        let card = conn
            .query_row(
                &format!("{SELECT_CARD} WHERE bank = ?1 AND name = ?2"),
                params![bank, name],
                row_to_card,
            )
            .optional()?;
        Ok(card)
    }

    /// All cards, optionally limited to one bank, ordered for stable
    /// listings.
    pub fn list(&self, bank: Option<&str>) -> Result<Vec<CanonicalCard>, StoreError> {
        let conn = self.open()?;
        let mut cards = Vec::new();
        match bank {
            Some(bank) => {
                let mut stmt = conn
                    .prepare(&format!("{SELECT_CARD} WHERE bank = ?1 ORDER BY bank, name"))?;
                let rows = stmt.query_map(params![bank], row_to_card)?;
                for row in rows {
                    cards.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare(&format!("{SELECT_CARD} ORDER BY bank, name"))?;
                let rows = stmt.query_map([], row_to_card)?;
                for row in rows {
                    cards.push(row?);
                }
            }
        }
        Ok(cards)
    }

    pub fn count(&self) -> Result<i64, StoreError> {
        let conn = self.open()?;
        let count = conn.query_row("SELECT COUNT(*) FROM credit_cards", [], |row| row.get(0))?;
        Ok(count)
    }
}

const SELECT_CARD: &str = r#"
    SELECT id, bank, name, card_type, level, annual_fee, points_rule,
           benefits, requirements, credit_limit, application_condition,
           foreign_transaction_fee, card_organization, created_at, updated_at
    FROM credit_cards
"#;

fn row_to_card(row: &Row<'_>) -> rusqlite::Result<CanonicalCard> {
    let annual_fee: String = row.get(5)?;
    let benefits: String = row.get(7)?;
    let requirements: String = row.get(8)?;
    let application_condition: String = row.get(10)?;
    let created_at: String = row.get(13)?;
    let updated_at: String = row.get(14)?;
    Ok(CanonicalCard {
        id: Some(row.get(0)?),
        bank: row.get(1)?,
        name: row.get(2)?,
        card_type: row.get(3)?,
        level: row.get(4)?,
        annual_fee: serde_json::from_str::<AnnualFee>(&annual_fee).unwrap_or_default(),
        points_rule: row.get(6)?,
        benefits: serde_json::from_str::<Vec<String>>(&benefits).unwrap_or_default(),
        requirements: serde_json::from_str::<Vec<Requirement>>(&requirements).unwrap_or_default(),
        credit_limit: row.get(9)?,
        application_condition: serde_json::from_str::<ApplicationCondition>(&application_condition)
            .unwrap_or_default(),
        foreign_transaction_fee: row.get(11)?,
        card_organization: row.get(12)?,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExtractionSource;

    fn store() -> (tempfile::TempDir, CardStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CardStore::new(dir.path().join("cards.db"));
        store.init().unwrap();
        (dir, store)
    }

    fn record(bank: &str, name: &str) -> RawCardRecord {
        let mut record = RawCardRecord::new(bank, name, ExtractionSource::SearchLlm);
        record.level = Some("白金卡".to_string());
        record.annual_fee = Some("首年免年费，300元/年".to_string());
        record
    }

    #[test]
    fn reimport_overwrites_instead_of_duplicating() {
        let (_dir, store) = store();
        let first_id = store.upsert_raw(&record("测试银行", "白金卡")).unwrap();

        let mut updated = record("测试银行", "白金卡");
        updated.level = Some("钻石卡".to_string());
        let second_id = store.upsert_raw(&updated).unwrap();

        assert_eq!(first_id, second_id);
        assert_eq!(store.count().unwrap(), 1);
        let card = store.get("测试银行", "白金卡").unwrap().unwrap();
        assert_eq!(card.level.as_deref(), Some("钻石卡"));
    }

    #[test]
    fn reimport_keeps_created_at_and_bumps_updated_at() {
        let (_dir, store) = store();
        store.upsert_raw(&record("测试银行", "白金卡")).unwrap();
        let before = store.get("测试银行", "白金卡").unwrap().unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));
        store.upsert_raw(&record("测试银行", "白金卡")).unwrap();
        let after = store.get("测试银行", "白金卡").unwrap().unwrap();

        assert_eq!(after.created_at, before.created_at);
        assert!(after.updated_at > before.updated_at);
    }

    #[test]
    fn distinct_keys_get_distinct_rows() {
        let (_dir, store) = store();
        let a = store.upsert_raw(&record("测试银行", "白金卡")).unwrap();
        let b = store.upsert_raw(&record("测试银行", "金卡")).unwrap();
        let c = store.upsert_raw(&record("另一银行", "白金卡")).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn structured_fields_roundtrip() {
        let (_dir, store) = store();
        let mut raw = record("测试银行", "白金卡");
        raw.benefits = vec![crate::models::Benefit::new("贵宾厅", "每年6次")];
        raw.requirements = vec![Requirement::new("年龄", "18-65周岁")];
        store.upsert_raw(&raw).unwrap();

        let card = store.get("测试银行", "白金卡").unwrap().unwrap();
        assert_eq!(card.annual_fee.first_year.as_deref(), Some("首年免年费"));
        assert_eq!(card.benefits, vec!["贵宾厅：每年6次"]);
        assert_eq!(card.requirements[0].title, "年龄");
        assert_eq!(card.application_condition.age.as_deref(), Some("年龄：18-65周岁"));
    }

    #[test]
    fn list_filters_by_bank() {
        let (_dir, store) = store();
        store.upsert_raw(&record("测试银行", "白金卡")).unwrap();
        store.upsert_raw(&record("另一银行", "金卡")).unwrap();

        assert_eq!(store.list(None).unwrap().len(), 2);
        let filtered = store.list(Some("测试银行")).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "白金卡");
    }

    #[test]
    fn invalid_records_are_rejected() {
        let (_dir, store) = store();
        let bad = RawCardRecord::new("", "白金卡", ExtractionSource::Api);
        assert!(matches!(
            store.upsert_raw(&bad),
            Err(StoreError::Normalize(_))
        ));
        assert_eq!(store.count().unwrap(), 0);
    }
}
