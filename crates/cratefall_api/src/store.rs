//! # User Store
//!
//! SQLite-backed user accounts and the hit-counter row, all through
//! prepared statements. The connection sits behind a mutex: handler
//! queries are short and the reactor tolerates brief blocking, so one
//! connection is plenty for the sandbox.

use parking_lot::Mutex;
use rusqlite::Connection;

/// Result of a registration attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// Account created with this row id.
    Created {
        /// Assigned user id.
        id: u32,
    },
    /// Name or email already taken.
    Duplicate,
}

/// SQLite-backed store for users and request statistics.
pub struct UserStore {
    conn: Mutex<Connection>,
}

impl UserStore {
    /// Opens (or creates) the database at `path` and applies the schema.
    ///
    /// # Errors
    ///
    /// Surfaces SQLite open/DDL failures.
    pub fn open(path: &str) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        tracing::info!(path, "user store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for tests.
    ///
    /// # Errors
    ///
    /// Surfaces SQLite failures.
    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS stats (id INTEGER PRIMARY KEY, hits INTEGER);
             INSERT INTO stats (id, hits) VALUES (1, 0) ON CONFLICT(id) DO NOTHING;
             CREATE TABLE IF NOT EXISTS users (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 name TEXT UNIQUE,
                 email TEXT UNIQUE,
                 password TEXT
             );
             CREATE UNIQUE INDEX IF NOT EXISTS idx_users_name ON users(name);
             CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users(email);",
        )
    }

    /// Increments the request hit counter.
    pub fn bump_hits(&self) {
        let conn = self.conn.lock();
        if let Err(err) = conn.execute("UPDATE stats SET hits = hits + 1 WHERE id = 1;", []) {
            tracing::warn!(%err, "failed to bump hit counter");
        }
    }

    /// Current hit-counter value.
    ///
    /// # Errors
    ///
    /// Surfaces SQLite failures.
    pub fn hits(&self) -> rusqlite::Result<u32> {
        let conn = self.conn.lock();
        conn.query_row("SELECT hits FROM stats WHERE id = 1;", [], |row| row.get(0))
    }

    /// Creates an account, reporting uniqueness violations as
    /// [`RegisterOutcome::Duplicate`].
    ///
    /// # Errors
    ///
    /// Surfaces SQLite failures other than uniqueness violations.
    pub fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> rusqlite::Result<RegisterOutcome> {
        let conn = self.conn.lock();
        let inserted = conn.query_row(
            "INSERT INTO users (name, email, password) VALUES (?1, ?2, ?3) RETURNING id;",
            (name, email, password),
            |row| row.get::<_, u32>(0),
        );
        match inserted {
            Ok(id) => Ok(RegisterOutcome::Created { id }),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Ok(RegisterOutcome::Duplicate)
            }
            Err(err) => Err(err),
        }
    }

    /// Checks credentials; `Some((id, name))` on success.
    ///
    /// # Errors
    ///
    /// Surfaces SQLite failures.
    pub fn login(&self, email: &str, password: &str) -> rusqlite::Result<Option<(u32, String)>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, name FROM users WHERE email = ?1 AND password = ?2;",
            (email, password),
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map(Some)
        .or_else(no_rows_as_none)
    }

    /// Fetches a user record by id.
    ///
    /// # Errors
    ///
    /// Surfaces SQLite failures.
    #[allow(clippy::type_complexity)]
    pub fn get(&self, id: u32) -> rusqlite::Result<Option<(u32, String, String)>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, name, email FROM users WHERE id = ?1;",
            [id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .map(Some)
        .or_else(no_rows_as_none)
    }

    /// Rewrites name and email; true when a row changed.
    ///
    /// # Errors
    ///
    /// Surfaces SQLite failures.
    pub fn update(&self, id: u32, name: &str, email: &str) -> rusqlite::Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE users SET name = ?1, email = ?2 WHERE id = ?3;",
            (name, email, id),
        )?;
        Ok(changed > 0)
    }

    /// Deletes an account; true when a row was removed.
    ///
    /// # Errors
    ///
    /// Surfaces SQLite failures.
    pub fn delete(&self, id: u32) -> rusqlite::Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute("DELETE FROM users WHERE id = ?1;", [id])?;
        Ok(changed > 0)
    }

    /// Changes the password only when the old one matches.
    ///
    /// # Errors
    ///
    /// Surfaces SQLite failures.
    pub fn change_password(
        &self,
        id: u32,
        old_password: &str,
        new_password: &str,
    ) -> rusqlite::Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE users SET password = ?1 WHERE id = ?2 AND password = ?3;",
            (new_password, id, old_password),
        )?;
        Ok(changed > 0)
    }

    /// Debug listing of all accounts.
    ///
    /// # Errors
    ///
    /// Surfaces SQLite failures.
    pub fn list(&self) -> rusqlite::Result<String> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id, name, email FROM users;")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, u32>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut out = String::from("LIST:\n");
        for row in rows {
            let (id, name, email) = row?;
            out.push_str(&format!("{id}: {name} ({email})\n"));
        }
        Ok(out)
    }
}

fn no_rows_as_none<T>(err: rusqlite::Error) -> rusqlite::Result<Option<T>> {
    if err == rusqlite::Error::QueryReturnedNoRows {
        Ok(None)
    } else {
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> UserStore {
        UserStore::open_in_memory().expect("in-memory store")
    }

    #[test]
    fn test_register_login_round_trip() {
        let store = store();
        let outcome = store.register("ada", "ada@example.com", "hunter2").unwrap();
        let RegisterOutcome::Created { id } = outcome else {
            panic!("expected creation");
        };

        let login = store.login("ada@example.com", "hunter2").unwrap();
        assert_eq!(login, Some((id, "ada".to_string())));
        assert_eq!(store.login("ada@example.com", "wrong").unwrap(), None);
    }

    #[test]
    fn test_duplicate_registration() {
        let store = store();
        store.register("ada", "ada@example.com", "x").unwrap();
        let again = store.register("ada", "other@example.com", "x").unwrap();
        assert_eq!(again, RegisterOutcome::Duplicate);
        let same_mail = store.register("grace", "ada@example.com", "x").unwrap();
        assert_eq!(same_mail, RegisterOutcome::Duplicate);
    }

    #[test]
    fn test_crud_cycle() {
        let store = store();
        let RegisterOutcome::Created { id } =
            store.register("ada", "ada@example.com", "pw").unwrap()
        else {
            panic!("expected creation");
        };

        assert_eq!(
            store.get(id).unwrap(),
            Some((id, "ada".to_string(), "ada@example.com".to_string()))
        );

        assert!(store.update(id, "ada2", "ada2@example.com").unwrap());
        assert_eq!(
            store.get(id).unwrap().unwrap().2,
            "ada2@example.com".to_string()
        );

        assert!(store.list().unwrap().contains("ada2 (ada2@example.com)"));

        assert!(store.delete(id).unwrap());
        assert_eq!(store.get(id).unwrap(), None);
        assert!(!store.delete(id).unwrap());
    }

    #[test]
    fn test_change_password_requires_old() {
        let store = store();
        let RegisterOutcome::Created { id } =
            store.register("ada", "ada@example.com", "old").unwrap()
        else {
            panic!("expected creation");
        };

        assert!(!store.change_password(id, "wrong", "new").unwrap());
        assert!(store.change_password(id, "old", "new").unwrap());
        assert!(store.login("ada@example.com", "new").unwrap().is_some());
    }

    #[test]
    fn test_hit_counter() {
        let store = store();
        assert_eq!(store.hits().unwrap(), 0);
        store.bump_hits();
        store.bump_hits();
        assert_eq!(store.hits().unwrap(), 2);
    }
}
