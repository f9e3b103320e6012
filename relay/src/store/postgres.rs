use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{RelayError, RelayResult};
use crate::store::{ItemStore, TransactionStore};
use crate::types::{Item, SyncStatus, Transaction};

/// Number of bind parameters per transaction row in the batch upsert.
const UPSERT_PARAMS_PER_ROW: usize = 9;

/// Postgres-backed store for items and transactions.
///
/// Shares one bounded [`PgPool`] across all workers. Every operation is a
/// single statement, which keeps each write atomic without explicit
/// transactions.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn item_from_row(row: &PgRow) -> RelayResult<Item> {
        let status: String = row.get("sync_status");
        let sync_status = SyncStatus::parse(&status).ok_or_else(|| {
            RelayError::data_conversion("sync_status", status.clone())
        })?;

        Ok(Item {
            id: row.get("id"),
            tenant_id: row.get("tenant_id"),
            provider_item_id: row.get("provider_item_id"),
            access_token_enc: row.get("access_token_enc"),
            next_cursor: row.get("next_cursor"),
            sync_status,
            error_message: row.get("error_message"),
            last_synced_at: row.get("last_synced_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

const SELECT_ITEM_COLUMNS: &str = r#"
    select id, tenant_id, provider_item_id, access_token_enc,
           sync_status, next_cursor, error_message, last_synced_at,
           created_at, updated_at
    from items
"#;

impl ItemStore for PostgresStore {
    async fn get_by_id(&self, id: Uuid) -> RelayResult<Item> {
        let query = format!("{SELECT_ITEM_COLUMNS} where id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Self::item_from_row(&row),
            None => Err(RelayError::item_not_found(id)),
        }
    }

    async fn get_by_provider_item_id(&self, provider_item_id: &str) -> RelayResult<Item> {
        let query = format!("{SELECT_ITEM_COLUMNS} where provider_item_id = $1");
        let row = sqlx::query(&query)
            .bind(provider_item_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Self::item_from_row(&row),
            None => Err(RelayError::item_not_found(provider_item_id)),
        }
    }

    async fn create(&self, item: &Item) -> RelayResult<()> {
        let result = sqlx::query(
            r#"
            insert into items (
                id, tenant_id, provider_item_id, access_token_enc,
                sync_status, next_cursor, created_at, updated_at
            ) values ($1, $2, $3, $4, $5, $6, now(), now())
            "#,
        )
        .bind(item.id)
        .bind(item.tenant_id)
        .bind(&item.provider_item_id)
        .bind(&item.access_token_enc)
        .bind(item.sync_status.as_str())
        .bind(&item.next_cursor)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
                Err(RelayError::item_already_exists(&item.provider_item_id))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn update_success(&self, id: Uuid, cursor: &str) -> RelayResult<()> {
        sqlx::query(
            r#"
            update items
            set next_cursor = $1,
                sync_status = 'active',
                error_message = null,
                last_synced_at = now(),
                updated_at = now()
            where id = $2
            "#,
        )
        .bind(cursor)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_resyncing(&self, id: Uuid) -> RelayResult<()> {
        sqlx::query(
            r#"
            update items
            set sync_status = 'resyncing',
                updated_at = now()
            where id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_error(&self, id: Uuid, message: &str) -> RelayResult<()> {
        sqlx::query(
            r#"
            update items
            set sync_status = 'error',
                error_message = $1,
                updated_at = now()
            where id = $2
            "#,
        )
        .bind(message)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl TransactionStore for PostgresStore {
    async fn upsert_batch(&self, transactions: &[Transaction]) -> RelayResult<()> {
        if transactions.is_empty() {
            return Ok(());
        }

        let mut placeholders = Vec::with_capacity(transactions.len());
        for i in 0..transactions.len() {
            let base = i * UPSERT_PARAMS_PER_ROW;
            placeholders.push(format!(
                "(gen_random_uuid(), ${}, ${}, ${}, ${}, ${}, ${}, ${}, ${}, ${}, now(), now())",
                base + 1,
                base + 2,
                base + 3,
                base + 4,
                base + 5,
                base + 6,
                base + 7,
                base + 8,
                base + 9,
            ));
        }

        let statement = format!(
            r#"
            insert into transactions (
                id, item_id, provider_transaction_id, provider_pending_id,
                amount_cents, currency_code, date, merchant_name, status,
                raw_payload, created_at, updated_at
            )
            values {}
            on conflict (provider_transaction_id) do update set
                amount_cents = excluded.amount_cents,
                currency_code = excluded.currency_code,
                date = excluded.date,
                merchant_name = excluded.merchant_name,
                provider_pending_id = excluded.provider_pending_id,
                status = excluded.status,
                raw_payload = excluded.raw_payload,
                is_removed = false,
                updated_at = now()
            "#,
            placeholders.join(",")
        );

        let mut query = sqlx::query(&statement);
        for tx in transactions {
            query = query
                .bind(tx.item_id)
                .bind(&tx.provider_transaction_id)
                .bind(&tx.provider_pending_id)
                .bind(tx.amount_cents)
                .bind(&tx.currency_code)
                .bind(tx.date)
                .bind(&tx.merchant_name)
                .bind(tx.status.as_str())
                .bind(&tx.raw_payload);
        }

        query.execute(&self.pool).await?;

        Ok(())
    }

    async fn mark_removed_batch(
        &self,
        item_id: Uuid,
        provider_transaction_ids: &[String],
    ) -> RelayResult<()> {
        if provider_transaction_ids.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            update transactions
            set is_removed = true, updated_at = now()
            where item_id = $1 and provider_transaction_id = any($2)
            "#,
        )
        .bind(item_id)
        .bind(provider_transaction_ids)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
