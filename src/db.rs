//! Creating the application's database schema.

use rusqlite::Connection;

use crate::{
    auth::{create_password_reset_table, create_refresh_token_table},
    user::create_user_table,
};

/// Enable foreign keys and create the tables for all domain models.
///
/// Every table is created with `IF NOT EXISTS`, so this is safe to call on an
/// existing database.
///
/// # Errors
/// Returns an error if a table could not be created.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch("PRAGMA foreign_keys = ON;")?;

    create_user_table(connection)?;
    create_refresh_token_table(connection)?;
    create_password_reset_table(connection)?;
    create_wallet_table(connection)?;
    create_category_table(connection)?;
    create_recurring_transaction_table(connection)?;
    create_transaction_table(connection)?;
    create_budget_table(connection)?;
    create_attachment_table(connection)?;

    Ok(())
}

fn create_wallet_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS wallet (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                type TEXT NOT NULL CHECK (type IN ('cash', 'bank_account', 'credit_card')),
                balance INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    Ok(())
}

fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS category (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                type TEXT NOT NULL CHECK (type IN ('income', 'expense')),
                icon TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    Ok(())
}

fn create_recurring_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS recurring_transaction (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                category_id INTEGER NOT NULL,
                wallet_id INTEGER NOT NULL,
                type TEXT NOT NULL CHECK (type IN ('income', 'expense')),
                amount INTEGER NOT NULL,
                description TEXT,
                frequency TEXT NOT NULL
                    CHECK (frequency IN ('daily', 'weekly', 'monthly', 'yearly')),
                start_date TEXT NOT NULL,
                end_date TEXT,
                next_execution_date TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(category_id) REFERENCES category(id)
                    ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(wallet_id) REFERENCES wallet(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    Ok(())
}

fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                category_id INTEGER NOT NULL,
                wallet_id INTEGER NOT NULL,
                recurring_transaction_id INTEGER,
                amount INTEGER NOT NULL,
                description TEXT,
                date TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(category_id) REFERENCES category(id)
                    ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(wallet_id) REFERENCES wallet(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(recurring_transaction_id) REFERENCES recurring_transaction(id)
                    ON UPDATE CASCADE ON DELETE SET NULL
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_date ON \"transaction\"(user_id, date)",
        (),
    )?;

    Ok(())
}

fn create_budget_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS budget (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                category_id INTEGER NOT NULL,
                amount INTEGER NOT NULL,
                period TEXT NOT NULL CHECK (period IN ('monthly', 'quarterly', 'yearly')),
                start_date TEXT NOT NULL,
                end_date TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(category_id) REFERENCES category(id)
                    ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    Ok(())
}

fn create_attachment_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS attachment (
                id INTEGER PRIMARY KEY,
                transaction_id INTEGER NOT NULL,
                url TEXT NOT NULL,
                type TEXT NOT NULL CHECK (type IN ('image', 'pdf', 'other')),
                description TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT,
                FOREIGN KEY(transaction_id) REFERENCES \"transaction\"(id)
                    ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use crate::{db::initialize, test_utils::insert_test_user};

    fn count(connection: &Connection, table: &str) -> i64 {
        connection
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })
            .unwrap()
    }

    #[test]
    fn initialize_is_idempotent() {
        let connection = Connection::open_in_memory().unwrap();

        initialize(&connection).unwrap();
        initialize(&connection).unwrap();
    }

    #[test]
    fn deleting_user_cascades_to_their_data() {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let user = insert_test_user(&connection, "foo@bar.baz", "foo");
        let id = user.id.as_i64();
        connection
            .execute_batch(&format!(
                "INSERT INTO wallet (id, user_id, name, type, balance, created_at, updated_at)
                    VALUES (1, {id}, 'Cash', 'cash', 1000, 'now', 'now');
                INSERT INTO category (id, user_id, name, type, created_at, updated_at)
                    VALUES (1, {id}, 'Food', 'expense', 'now', 'now');
                INSERT INTO recurring_transaction (id, user_id, category_id, wallet_id, type,
                    amount, frequency, start_date, next_execution_date, created_at, updated_at)
                    VALUES (1, {id}, 1, 1, 'expense', 500, 'monthly', '2024-01-01',
                    '2024-02-01', 'now', 'now');
                INSERT INTO \"transaction\" (id, user_id, category_id, wallet_id,
                    recurring_transaction_id, amount, date, created_at, updated_at)
                    VALUES (1, {id}, 1, 1, 1, 500, '2024-01-01', 'now', 'now');
                INSERT INTO budget (user_id, category_id, amount, period, start_date,
                    created_at, updated_at)
                    VALUES ({id}, 1, 20000, 'monthly', '2024-01-01', 'now', 'now');
                INSERT INTO attachment (transaction_id, url, type, created_at, updated_at)
                    VALUES (1, 'https://example.com/receipt.pdf', 'pdf', 'now', 'now');"
            ))
            .unwrap();

        connection
            .execute("DELETE FROM user WHERE id = ?1", (id,))
            .unwrap();

        for table in [
            "wallet",
            "category",
            "recurring_transaction",
            "\"transaction\"",
            "budget",
            "attachment",
        ] {
            assert_eq!(count(&connection, table), 0, "{table} was not emptied");
        }
    }

    #[test]
    fn deleting_recurring_transaction_keeps_its_transactions() {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let user = insert_test_user(&connection, "foo@bar.baz", "foo");
        let id = user.id.as_i64();
        connection
            .execute_batch(&format!(
                "INSERT INTO wallet (id, user_id, name, type, created_at, updated_at)
                    VALUES (1, {id}, 'Cash', 'cash', 'now', 'now');
                INSERT INTO category (id, user_id, name, type, created_at, updated_at)
                    VALUES (1, {id}, 'Rent', 'expense', 'now', 'now');
                INSERT INTO recurring_transaction (id, user_id, category_id, wallet_id, type,
                    amount, frequency, start_date, next_execution_date, created_at, updated_at)
                    VALUES (1, {id}, 1, 1, 'expense', 500, 'monthly', '2024-01-01',
                    '2024-02-01', 'now', 'now');
                INSERT INTO \"transaction\" (id, user_id, category_id, wallet_id,
                    recurring_transaction_id, amount, date, created_at, updated_at)
                    VALUES (1, {id}, 1, 1, 1, 500, '2024-01-01', 'now', 'now');"
            ))
            .unwrap();

        connection
            .execute("DELETE FROM recurring_transaction WHERE id = 1", ())
            .unwrap();

        let recurring_id: Option<i64> = connection
            .query_row(
                "SELECT recurring_transaction_id FROM \"transaction\" WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(recurring_id, None);
    }

    #[test]
    fn rejects_unknown_wallet_type() {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let user = insert_test_user(&connection, "foo@bar.baz", "foo");

        let result = connection.execute(
            "INSERT INTO wallet (user_id, name, type, created_at, updated_at)
             VALUES (?1, 'Piggy', 'piggy_bank', 'now', 'now')",
            (user.id.as_i64(),),
        );

        assert!(result.is_err());
    }
}
