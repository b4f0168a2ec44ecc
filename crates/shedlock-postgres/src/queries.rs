//! SQL text for the lock table, rendered once per table name.

/// The store's own clock, in UTC to match the `TIMESTAMP` columns.
pub const DB_NOW: &str = "timezone('utc', now())";

/// Statements issued against one lock table.
#[derive(Debug, Clone)]
pub struct Queries {
    pub create_table: String,
    pub insert: String,
    pub renew: String,
    pub renew_db_time: String,
    pub expire: String,
    pub expire_db_time: String,
    pub delete: String,
}

impl Queries {
    /// Renders all statements for `table`. The name must already be validated.
    pub fn for_table(table: &str) -> Self {
        Self {
            create_table: format!(
                "CREATE TABLE IF NOT EXISTS {table} (\
                 name VARCHAR(64) NOT NULL, \
                 lock_until TIMESTAMP NOT NULL, \
                 locked_at TIMESTAMP NOT NULL, \
                 locked_by VARCHAR(255) NOT NULL, \
                 PRIMARY KEY (name))"
            ),
            insert: format!(
                "INSERT INTO {table} (name, lock_until, locked_at, locked_by) \
                 VALUES ($1, $2, $3, $4) ON CONFLICT (name) DO NOTHING"
            ),
            renew: format!(
                "UPDATE {table} SET lock_until = $1, locked_at = $2, locked_by = $3 \
                 WHERE name = $4 AND lock_until <= $5"
            ),
            renew_db_time: format!(
                "UPDATE {table} SET lock_until = $1, locked_at = $2, locked_by = $3 \
                 WHERE name = $4 AND lock_until <= {DB_NOW}"
            ),
            expire: format!(
                "UPDATE {table} SET lock_until = $1 WHERE name = $2 AND lock_until > $1"
            ),
            expire_db_time: format!(
                "UPDATE {table} SET lock_until = {DB_NOW} WHERE name = $1 AND lock_until > {DB_NOW}"
            ),
            delete: format!("DELETE FROM {table} WHERE name = $1"),
        }
    }
}
