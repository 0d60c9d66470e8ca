use crate::db::*;
use crate::error::{AppError, Result};
use crate::library::{Book, CatalogImport, ImportSummary, Series};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

const USER_COLUMNS: &str =
    "id, username, api_key, role, shared_all_libraries, restrictions_json, created_at";

const SERIES_COLUMNS: &str = "id, library_id, title, title_sort, status, publisher, language,
    age_rating, release_date, genres_json, tags_json, sharing_labels_json, total_book_count,
    one_shot, deleted, created_at";

const BOOK_COLUMNS: &str = "id, series_id, library_id, title, number, number_sort, release_date,
    tags_json, authors_json, media_status, page_count, one_shot, deleted, created_at";

/// Database wrapper for thread-safe access.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Open in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- Users table
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT UNIQUE NOT NULL,
                api_key TEXT UNIQUE NOT NULL,
                role TEXT NOT NULL DEFAULT 'user',
                shared_all_libraries INTEGER NOT NULL DEFAULT 1,
                restrictions_json TEXT NOT NULL DEFAULT '{}',
                created_at INTEGER NOT NULL
            );

            -- Libraries table
            CREATE TABLE IF NOT EXISTS libraries (
                id TEXT PRIMARY KEY,
                name TEXT UNIQUE NOT NULL,
                path TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            -- Libraries shared with users that do not share all libraries
            CREATE TABLE IF NOT EXISTS user_library_sharing (
                user_id TEXT NOT NULL,
                library_id TEXT NOT NULL,
                PRIMARY KEY (user_id, library_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (library_id) REFERENCES libraries(id) ON DELETE CASCADE
            );

            -- Series table
            CREATE TABLE IF NOT EXISTS series (
                id TEXT PRIMARY KEY,
                library_id TEXT NOT NULL,
                title TEXT NOT NULL,
                title_sort TEXT NOT NULL,
                status TEXT NOT NULL,
                publisher TEXT NOT NULL DEFAULT '',
                language TEXT NOT NULL DEFAULT '',
                age_rating INTEGER,
                release_date INTEGER,
                genres_json TEXT NOT NULL DEFAULT '[]',
                tags_json TEXT NOT NULL DEFAULT '[]',
                sharing_labels_json TEXT NOT NULL DEFAULT '[]',
                total_book_count INTEGER,
                one_shot INTEGER NOT NULL DEFAULT 0,
                deleted INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (library_id) REFERENCES libraries(id) ON DELETE CASCADE
            );

            -- Books table
            CREATE TABLE IF NOT EXISTS books (
                id TEXT PRIMARY KEY,
                series_id TEXT NOT NULL,
                library_id TEXT NOT NULL,
                title TEXT NOT NULL,
                number TEXT NOT NULL DEFAULT '',
                number_sort REAL NOT NULL DEFAULT 0,
                release_date INTEGER,
                tags_json TEXT NOT NULL DEFAULT '[]',
                authors_json TEXT NOT NULL DEFAULT '[]',
                media_status TEXT NOT NULL,
                page_count INTEGER NOT NULL DEFAULT 0,
                one_shot INTEGER NOT NULL DEFAULT 0,
                deleted INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (series_id) REFERENCES series(id) ON DELETE CASCADE,
                FOREIGN KEY (library_id) REFERENCES libraries(id) ON DELETE CASCADE
            );

            -- Reading progress table
            CREATE TABLE IF NOT EXISTS read_progress (
                user_id TEXT NOT NULL,
                book_id TEXT NOT NULL,
                page INTEGER NOT NULL DEFAULT 0,
                completed INTEGER NOT NULL DEFAULT 0,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, book_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_series_library ON series(library_id);
            CREATE INDEX IF NOT EXISTS idx_books_series ON books(series_id);
            CREATE INDEX IF NOT EXISTS idx_books_library ON books(library_id);
            CREATE INDEX IF NOT EXISTS idx_progress_user ON read_progress(user_id);
            "#,
        )
        .map_err(|e| AppError::Internal(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    // ========== USER OPERATIONS ==========

    /// Create a new user.
    pub fn create_user(&self, user: &User) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))?;

        tx.execute(
            "INSERT INTO users (id, username, api_key, role, shared_all_libraries,
                                restrictions_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.id,
                user.username,
                user.api_key,
                user.role,
                user.shared_all_libraries,
                json_text(&user.restrictions)?,
                user.created_at,
            ],
        )
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint") {
                AppError::InvalidRequest(format!("Username '{}' already exists", user.username))
            } else {
                AppError::Internal(format!("Failed to create user: {}", e))
            }
        })?;
        replace_sharing(&tx, user)?;

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to create user: {}", e)))
    }

    /// Get user by username.
    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.find_user("username", username)
    }

    /// Get user by ID.
    pub fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        self.find_user("id", id)
    }

    /// Get user by API key.
    pub fn get_user_by_api_key(&self, api_key: &str) -> Result<Option<User>> {
        self.find_user("api_key", api_key)
    }

    fn find_user(&self, column: &str, value: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"),
                params![value],
                row_to_user,
            )
            .optional()
            .map_err(|e| AppError::Internal(format!("Failed to get user: {}", e)))?;

        match user {
            Some(mut user) => {
                user.shared_library_ids = shared_libraries(&conn, &user.id)?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    /// List all users.
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY username"))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let mut users = stmt
            .query_map([], row_to_user)
            .map_err(|e| AppError::Internal(format!("Failed to list users: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect users: {}", e)))?;

        for user in &mut users {
            user.shared_library_ids = shared_libraries(&conn, &user.id)?;
        }

        Ok(users)
    }

    /// Store the library sharing and restriction settings of `user`.
    pub fn update_user_access(&self, user: &User) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))?;

        let rows = tx
            .execute(
                "UPDATE users SET shared_all_libraries = ?1, restrictions_json = ?2 WHERE id = ?3",
                params![
                    user.shared_all_libraries,
                    json_text(&user.restrictions)?,
                    user.id
                ],
            )
            .map_err(|e| AppError::Internal(format!("Failed to update user access: {}", e)))?;
        if rows == 0 {
            return Ok(false);
        }
        replace_sharing(&tx, user)?;

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to update user access: {}", e)))?;
        Ok(true)
    }

    /// Delete user.
    pub fn delete_user(&self, username: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM users WHERE username = ?1", params![username])
            .map_err(|e| AppError::Internal(format!("Failed to delete user: {}", e)))?;
        Ok(rows > 0)
    }

    // ========== LIBRARY OPERATIONS ==========

    /// Create library.
    pub fn create_library(&self, library: &Library) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO libraries (id, name, path, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![library.id, library.name, library.path, library.created_at],
        )
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint") {
                AppError::InvalidRequest(format!("Library '{}' already exists", library.name))
            } else {
                AppError::Internal(format!("Failed to create library: {}", e))
            }
        })?;
        Ok(())
    }

    /// Get library by name.
    pub fn get_library_by_name(&self, name: &str) -> Result<Option<Library>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, name, path, created_at FROM libraries WHERE name = ?1",
            params![name],
            row_to_library,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get library: {}", e)))
    }

    /// List all libraries.
    pub fn list_libraries(&self) -> Result<Vec<Library>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT id, name, path, created_at FROM libraries ORDER BY name")
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let libraries = stmt
            .query_map([], row_to_library)
            .map_err(|e| AppError::Internal(format!("Failed to list libraries: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect libraries: {}", e)))?;

        Ok(libraries)
    }

    /// Delete library with its series, books and sharing entries.
    pub fn delete_library(&self, name: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM libraries WHERE name = ?1", params![name])
            .map_err(|e| AppError::Internal(format!("Failed to delete library: {}", e)))?;
        Ok(rows > 0)
    }

    // ========== CATALOG OPERATIONS ==========

    /// Save or update a series.
    pub fn save_series(&self, series: &Series) -> Result<()> {
        let conn = self.conn.lock();
        upsert_series(&conn, series).map_err(|e| catalog_error("series", &series.id, e))?;
        Ok(())
    }

    /// Save or update a book. The book must live in its series' library.
    pub fn save_book(&self, book: &Book) -> Result<()> {
        let conn = self.conn.lock();
        save_book_checked(&conn, book)
    }

    /// Import a catalog file in one transaction. Missing libraries are
    /// created, series and books are upserted.
    pub fn import_catalog(&self, import: &CatalogImport) -> Result<ImportSummary> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))?;

        let mut summary = ImportSummary::default();
        for library in &import.libraries {
            summary.libraries += tx
                .execute(
                    "INSERT OR IGNORE INTO libraries (id, name, path, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![library.id, library.name, library.path, library.created_at],
                )
                .map_err(|e| AppError::Internal(format!("Failed to import library: {}", e)))?;
        }
        for series in &import.series {
            upsert_series(&tx, series).map_err(|e| catalog_error("series", &series.id, e))?;
            summary.series += 1;
        }
        for book in &import.books {
            save_book_checked(&tx, book)?;
            summary.books += 1;
        }

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to import catalog: {}", e)))?;
        Ok(summary)
    }

    /// Get all series from all libraries.
    pub fn get_all_series(&self) -> Result<Vec<Series>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!("SELECT {SERIES_COLUMNS} FROM series"))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let series = stmt
            .query_map([], row_to_series)
            .map_err(|e| AppError::Internal(format!("Failed to get series: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect series: {}", e)))?;

        Ok(series)
    }

    /// Get all books from all libraries.
    pub fn get_all_books(&self) -> Result<Vec<Book>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!("SELECT {BOOK_COLUMNS} FROM books"))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let books = stmt
            .query_map([], row_to_book)
            .map_err(|e| AppError::Internal(format!("Failed to get all books: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect books: {}", e)))?;

        Ok(books)
    }

    // ========== PROGRESS OPERATIONS ==========

    /// Save or update reading progress.
    pub fn save_progress(&self, progress: &ReadProgress) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO read_progress (user_id, book_id, page, completed, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (user_id, book_id) DO UPDATE SET
                page = excluded.page,
                completed = excluded.completed,
                updated_at = excluded.updated_at",
            params![
                progress.user_id,
                progress.book_id,
                progress.page,
                progress.completed,
                progress.updated_at,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to save progress: {}", e)))?;
        Ok(())
    }

    /// Get all reading progress of a user.
    pub fn get_progress_for_user(&self, user_id: &str) -> Result<Vec<ReadProgress>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT user_id, book_id, page, completed, updated_at
                 FROM read_progress WHERE user_id = ?1",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let progress = stmt
            .query_map(params![user_id], |row| {
                Ok(ReadProgress {
                    user_id: row.get(0)?,
                    book_id: row.get(1)?,
                    page: row.get(2)?,
                    completed: row.get(3)?,
                    updated_at: row.get(4)?,
                })
            })
            .map_err(|e| AppError::Internal(format!("Failed to get progress: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect progress: {}", e)))?;

        Ok(progress)
    }
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        api_key: row.get(2)?,
        role: row.get(3)?,
        shared_all_libraries: row.get(4)?,
        shared_library_ids: Default::default(),
        restrictions: json_column(row, 5)?,
        created_at: row.get(6)?,
    })
}

fn row_to_library(row: &Row<'_>) -> rusqlite::Result<Library> {
    Ok(Library {
        id: row.get(0)?,
        name: row.get(1)?,
        path: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn row_to_series(row: &Row<'_>) -> rusqlite::Result<Series> {
    Ok(Series {
        id: row.get(0)?,
        library_id: row.get(1)?,
        title: row.get(2)?,
        title_sort: row.get(3)?,
        status: enum_column(row, 4)?,
        publisher: row.get(5)?,
        language: row.get(6)?,
        age_rating: row.get(7)?,
        release_date: row.get::<_, Option<i64>>(8)?.map(timestamp_to_datetime),
        genres: json_column(row, 9)?,
        tags: json_column(row, 10)?,
        sharing_labels: json_column(row, 11)?,
        total_book_count: row.get(12)?,
        one_shot: row.get(13)?,
        deleted: row.get(14)?,
        created: timestamp_to_datetime(row.get(15)?),
    })
}

fn row_to_book(row: &Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get(0)?,
        series_id: row.get(1)?,
        library_id: row.get(2)?,
        title: row.get(3)?,
        number: row.get(4)?,
        number_sort: row.get(5)?,
        release_date: row.get::<_, Option<i64>>(6)?.map(timestamp_to_datetime),
        tags: json_column(row, 7)?,
        authors: json_column(row, 8)?,
        media_status: enum_column(row, 9)?,
        page_count: row.get(10)?,
        one_shot: row.get(11)?,
        deleted: row.get(12)?,
        created: timestamp_to_datetime(row.get(13)?),
    })
}

fn shared_libraries(
    conn: &Connection,
    user_id: &str,
) -> Result<std::collections::BTreeSet<String>> {
    let mut stmt = conn
        .prepare("SELECT library_id FROM user_library_sharing WHERE user_id = ?1")
        .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

    stmt.query_map(params![user_id], |row| row.get::<_, String>(0))
        .map_err(|e| AppError::Internal(format!("Failed to get shared libraries: {}", e)))?
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| AppError::Internal(format!("Failed to collect shared libraries: {}", e)))
}

fn replace_sharing(conn: &Connection, user: &User) -> Result<()> {
    conn.execute(
        "DELETE FROM user_library_sharing WHERE user_id = ?1",
        params![user.id],
    )
    .map_err(|e| AppError::Internal(format!("Failed to clear shared libraries: {}", e)))?;

    for library_id in &user.shared_library_ids {
        conn.execute(
            "INSERT INTO user_library_sharing (user_id, library_id) VALUES (?1, ?2)",
            params![user.id, library_id],
        )
        .map_err(|e| {
            if e.to_string().contains("FOREIGN KEY constraint") {
                AppError::InvalidRequest(format!("Unknown library '{}'", library_id))
            } else {
                AppError::Internal(format!("Failed to share library: {}", e))
            }
        })?;
    }
    Ok(())
}

fn upsert_series(conn: &Connection, series: &Series) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO series
         (id, library_id, title, title_sort, status, publisher, language, age_rating,
          release_date, genres_json, tags_json, sharing_labels_json, total_book_count,
          one_shot, deleted, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
         ON CONFLICT (id) DO UPDATE SET
            library_id = excluded.library_id,
            title = excluded.title,
            title_sort = excluded.title_sort,
            status = excluded.status,
            publisher = excluded.publisher,
            language = excluded.language,
            age_rating = excluded.age_rating,
            release_date = excluded.release_date,
            genres_json = excluded.genres_json,
            tags_json = excluded.tags_json,
            sharing_labels_json = excluded.sharing_labels_json,
            total_book_count = excluded.total_book_count,
            one_shot = excluded.one_shot,
            deleted = excluded.deleted",
        params![
            series.id,
            series.library_id,
            series.title,
            series.effective_title_sort(),
            enum_text(&series.status),
            series.publisher,
            series.language,
            series.age_rating,
            series.release_date.map(|d| d.timestamp()),
            sql_json(&series.genres)?,
            sql_json(&series.tags)?,
            sql_json(&series.sharing_labels)?,
            series.total_book_count,
            series.one_shot,
            series.deleted,
            series.created.timestamp(),
        ],
    )
}

fn upsert_book(conn: &Connection, book: &Book) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO books
         (id, series_id, library_id, title, number, number_sort, release_date, tags_json,
          authors_json, media_status, page_count, one_shot, deleted, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
         ON CONFLICT (id) DO UPDATE SET
            series_id = excluded.series_id,
            library_id = excluded.library_id,
            title = excluded.title,
            number = excluded.number,
            number_sort = excluded.number_sort,
            release_date = excluded.release_date,
            tags_json = excluded.tags_json,
            authors_json = excluded.authors_json,
            media_status = excluded.media_status,
            page_count = excluded.page_count,
            one_shot = excluded.one_shot,
            deleted = excluded.deleted",
        params![
            book.id,
            book.series_id,
            book.library_id,
            book.title,
            book.number,
            book.number_sort,
            book.release_date.map(|d| d.timestamp()),
            sql_json(&book.tags)?,
            sql_json(&book.authors)?,
            enum_text(&book.media_status),
            book.page_count,
            book.one_shot,
            book.deleted,
            book.created.timestamp(),
        ],
    )
}

/// Upsert `book` after checking that its library matches its series'.
/// An unknown series is left to the foreign key.
fn save_book_checked(conn: &Connection, book: &Book) -> Result<()> {
    let series_library: Option<String> = conn
        .query_row(
            "SELECT library_id FROM series WHERE id = ?1",
            params![book.series_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| catalog_error("book", &book.id, e))?;

    if let Some(library_id) = series_library
        && library_id != book.library_id
    {
        return Err(AppError::InvalidRequest(format!(
            "The book '{}' is in library '{}' but its series '{}' is in '{}'",
            book.id, book.library_id, book.series_id, library_id
        )));
    }

    upsert_book(conn, book).map_err(|e| catalog_error("book", &book.id, e))?;
    Ok(())
}

fn catalog_error(kind: &str, id: &str, e: rusqlite::Error) -> AppError {
    if e.to_string().contains("FOREIGN KEY constraint") {
        AppError::InvalidRequest(format!("The {} '{}' references an unknown parent", kind, id))
    } else {
        AppError::Internal(format!("Failed to save {} '{}': {}", kind, id, e))
    }
}

/// Unit enum as its serde name ("ONGOING", "READY", ...).
fn enum_text<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default()
}

fn enum_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_value(serde_json::Value::String(text))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn sql_json<T: Serialize + ?Sized>(value: &T) -> rusqlite::Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn json_text<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| AppError::Internal(format!("Failed to encode JSON: {}", e)))
}
