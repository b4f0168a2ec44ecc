//! SQL text for the lock table.

/// The server clock in UTC, millisecond precision to match the columns.
pub const DB_NOW: &str = "UTC_TIMESTAMP(3)";

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
    pub fn for_table(table: &str) -> Self {
        Self {
            create_table: format!(
                "CREATE TABLE IF NOT EXISTS {table} (\
                 name VARCHAR(64) NOT NULL, \
                 lock_until TIMESTAMP(3) NOT NULL, \
                 locked_at TIMESTAMP(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3), \
                 locked_by VARCHAR(255) NOT NULL, \
                 PRIMARY KEY (name))"
            ),
            // Plain INSERT: a duplicate key must surface as an error so it can be
            // told apart from other failures. INSERT IGNORE would hide both.
            insert: format!(
                "INSERT INTO {table} (name, lock_until, locked_at, locked_by) VALUES (?, ?, ?, ?)"
            ),
            renew: format!(
                "UPDATE {table} SET lock_until = ?, locked_at = ?, locked_by = ? \
                 WHERE name = ? AND lock_until <= ?"
            ),
            renew_db_time: format!(
                "UPDATE {table} SET lock_until = ?, locked_at = ?, locked_by = ? \
                 WHERE name = ? AND lock_until <= {DB_NOW}"
            ),
            expire: format!(
                "UPDATE {table} SET lock_until = ? WHERE name = ? AND lock_until > ?"
            ),
            expire_db_time: format!(
                "UPDATE {table} SET lock_until = {DB_NOW} WHERE name = ? AND lock_until > {DB_NOW}"
            ),
            delete: format!("DELETE FROM {table} WHERE name = ?"),
        }
    }
}
