//! libSQL analytical sink.
//!
//! The [`Storage`] struct wraps a local libSQL database that holds the
//! enriched summaries as a plain relational table, so the output of a run
//! can be queried with ordinary SQL instead of re-parsing CSV.

use std::path::Path;

use libsql::{Connection, Database, params, params_from_iter};
use mspscout_shared::{MspScoutError, PersonRecord, Result, SummaryRecord, normalize_name};

/// How an incoming CSV interacts with an existing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Drop any existing table and recreate it from the CSV header.
    Replace,
    /// Insert rows into the existing table; columns must match.
    Append,
    /// Create the table if absent; refuse to touch an existing one.
    CreateOnly,
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Storage {
    /// Open or create a database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| MspScoutError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| MspScoutError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| MspScoutError::Storage(e.to_string()))?;

        Ok(Self { db, conn })
    }

    /// Bulk-load a CSV file into `table` and return the row count now
    /// present in the table.
    ///
    /// All columns are created as TEXT, named after the CSV header. In
    /// [`LoadMode::Append`] the CSV header must match the table's columns
    /// exactly, in order.
    pub async fn load_csv(&self, csv_path: &Path, table: &str, mode: LoadMode) -> Result<u64> {
        validate_identifier(table)?;

        let mut reader = csv::Reader::from_path(csv_path)
            .map_err(|e| MspScoutError::Storage(format!("{}: {e}", csv_path.display())))?;
        let header: Vec<String> = reader
            .headers()
            .map_err(|e| MspScoutError::Storage(format!("{}: {e}", csv_path.display())))?
            .iter()
            .map(str::to_string)
            .collect();
        if header.is_empty() {
            return Err(MspScoutError::Storage(format!(
                "{}: CSV has no header row",
                csv_path.display()
            )));
        }
        for column in &header {
            validate_identifier(column)?;
        }

        let exists = self.table_exists(table).await?;
        match mode {
            LoadMode::Replace => {
                self.conn
                    .execute(&format!("DROP TABLE IF EXISTS {table}"), params![])
                    .await
                    .map_err(|e| MspScoutError::Storage(e.to_string()))?;
                self.create_table(table, &header).await?;
            }
            LoadMode::Append => {
                if !exists {
                    return Err(MspScoutError::Storage(format!(
                        "table '{table}' does not exist; cannot append"
                    )));
                }
                let existing = self.table_columns(table).await?;
                if existing != header {
                    return Err(MspScoutError::Storage(format!(
                        "CSV columns [{}] do not match table '{table}' columns [{}]",
                        header.join(", "),
                        existing.join(", ")
                    )));
                }
            }
            LoadMode::CreateOnly => {
                if exists {
                    return Err(MspScoutError::Storage(format!(
                        "table '{table}' already exists; use replace or append"
                    )));
                }
                self.create_table(table, &header).await?;
            }
        }

        let placeholders: Vec<String> = (1..=header.len()).map(|i| format!("?{i}")).collect();
        let insert = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            header.join(", "),
            placeholders.join(", ")
        );

        self.conn
            .execute("BEGIN", params![])
            .await
            .map_err(|e| MspScoutError::Storage(e.to_string()))?;

        // A bad row must not leave the connection inside an open transaction.
        let inserted = match self.insert_rows(&mut reader, &insert, &header, csv_path).await {
            Ok(inserted) => inserted,
            Err(e) => {
                self.rollback().await;
                return Err(e);
            }
        };

        self.conn
            .execute("COMMIT", params![])
            .await
            .map_err(|e| MspScoutError::Storage(e.to_string()))?;

        let total = self.row_count(table).await?;
        tracing::info!(table, inserted, total, "csv load complete");
        Ok(total)
    }

    async fn insert_rows(
        &self,
        reader: &mut csv::Reader<std::fs::File>,
        insert: &str,
        header: &[String],
        csv_path: &Path,
    ) -> Result<u64> {
        let mut inserted: u64 = 0;
        for record in reader.records() {
            let record = record
                .map_err(|e| MspScoutError::Storage(format!("{}: {e}", csv_path.display())))?;
            let values: Vec<String> = record.iter().map(str::to_string).collect();
            if values.len() != header.len() {
                return Err(MspScoutError::Storage(format!(
                    "{}: row {} has {} fields, expected {}",
                    csv_path.display(),
                    inserted + 1,
                    values.len(),
                    header.len()
                )));
            }
            self.conn
                .execute(insert, params_from_iter(values))
                .await
                .map_err(|e| MspScoutError::Storage(e.to_string()))?;
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn rollback(&self) {
        if let Err(e) = self.conn.execute("ROLLBACK", params![]).await {
            tracing::warn!(error = %e, "rollback failed");
        }
    }

    /// Create the linked companies/people schema, dropping any previous
    /// version of the two tables.
    ///
    /// `people.profile_url` is unique so re-loading the same discovery CSV
    /// never duplicates a profile.
    pub async fn create_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "DROP TABLE IF EXISTS people;
                 DROP TABLE IF EXISTS companies;
                 CREATE TABLE companies (
                     id INTEGER PRIMARY KEY AUTOINCREMENT,
                     name TEXT NOT NULL,
                     name_norm TEXT UNIQUE,
                     website TEXT,
                     linkedin TEXT,
                     phone TEXT,
                     address TEXT,
                     summary TEXT,
                     top_urls TEXT
                 );
                 CREATE TABLE people (
                     id INTEGER PRIMARY KEY AUTOINCREMENT,
                     company_id INTEGER REFERENCES companies(id),
                     profile_url TEXT NOT NULL UNIQUE,
                     title TEXT,
                     snippet TEXT,
                     query_used TEXT,
                     crawled_at TEXT DEFAULT CURRENT_TIMESTAMP
                 );",
            )
            .await
            .map_err(|e| MspScoutError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Load a summaries CSV into `companies` and, when given, a people CSV
    /// into `people`, linking the two by normalized company name. Returns
    /// the number of companies and people loaded.
    ///
    /// Companies upsert on `name_norm`, so re-running an enrichment and
    /// re-loading refreshes existing rows instead of duplicating them.
    /// People whose company is absent from the summaries CSV are skipped.
    pub async fn populate_companies_people(
        &self,
        summaries_csv: &Path,
        people_csv: Option<&Path>,
    ) -> Result<(u64, u64)> {
        let companies = read_records::<SummaryRecord>(summaries_csv)?;
        let people = match people_csv {
            Some(path) => read_records::<PersonRecord>(path)?,
            None => Vec::new(),
        };

        self.conn
            .execute("BEGIN", params![])
            .await
            .map_err(|e| MspScoutError::Storage(e.to_string()))?;

        let loaded = match self.upsert_companies_people(&companies, &people).await {
            Ok(loaded) => loaded,
            Err(e) => {
                self.rollback().await;
                return Err(e);
            }
        };

        self.conn
            .execute("COMMIT", params![])
            .await
            .map_err(|e| MspScoutError::Storage(e.to_string()))?;

        tracing::info!(
            companies = loaded.0,
            people = loaded.1,
            "schema load complete"
        );
        Ok(loaded)
    }

    async fn upsert_companies_people(
        &self,
        companies: &[SummaryRecord],
        people: &[PersonRecord],
    ) -> Result<(u64, u64)> {
        let mut companies_loaded: u64 = 0;
        for record in companies {
            let name_norm = normalize_name(&record.name);
            if name_norm.is_empty() {
                continue;
            }
            self.conn
                .execute(
                    "INSERT INTO companies
                         (name, name_norm, website, linkedin, phone, address, summary, top_urls)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(name_norm) DO UPDATE SET
                         website = excluded.website,
                         linkedin = excluded.linkedin,
                         phone = excluded.phone,
                         address = excluded.address,
                         summary = excluded.summary,
                         top_urls = excluded.top_urls",
                    params![
                        record.name.as_str(),
                        name_norm.as_str(),
                        record.website.as_str(),
                        record.linkedin.as_str(),
                        record.phone.as_str(),
                        record.address.as_str(),
                        record.summary.as_str(),
                        record.top_urls.as_str(),
                    ],
                )
                .await
                .map_err(|e| MspScoutError::Storage(e.to_string()))?;
            companies_loaded += 1;
        }

        let mut people_loaded: u64 = 0;
        for person in people {
            let name_norm = normalize_name(&person.company);
            let affected = self
                .conn
                .execute(
                    "INSERT INTO people (company_id, profile_url, title, snippet)
                     SELECT id, ?2, ?3, ?4 FROM companies WHERE name_norm = ?1
                     ON CONFLICT(profile_url) DO NOTHING",
                    params![
                        name_norm.as_str(),
                        person.profile_url.as_str(),
                        person.title.as_str(),
                        person.snippet.as_str(),
                    ],
                )
                .await
                .map_err(|e| MspScoutError::Storage(e.to_string()))?;
            people_loaded += affected;
        }

        Ok((companies_loaded, people_loaded))
    }

    /// Count the rows currently in `table`.
    pub async fn row_count(&self, table: &str) -> Result<u64> {
        validate_identifier(table)?;
        let mut rows = self
            .conn
            .query(&format!("SELECT COUNT(*) FROM {table}"), params![])
            .await
            .map_err(|e| MspScoutError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| MspScoutError::Storage(e.to_string()))?;
                Ok(count as u64)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(MspScoutError::Storage(e.to_string())),
        }
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
            )
            .await
            .map_err(|e| MspScoutError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(row) => Ok(row.is_some()),
            Err(e) => Err(MspScoutError::Storage(e.to_string())),
        }
    }

    /// Column names of `table`, in declaration order.
    async fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query(&format!("PRAGMA table_info({table})"), params![])
            .await
            .map_err(|e| MspScoutError::Storage(e.to_string()))?;

        let mut columns = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let name: String = row
                .get(1)
                .map_err(|e| MspScoutError::Storage(e.to_string()))?;
            columns.push(name);
        }
        Ok(columns)
    }

    async fn create_table(&self, table: &str, columns: &[String]) -> Result<()> {
        let defs: Vec<String> = columns.iter().map(|c| format!("{c} TEXT")).collect();
        self.conn
            .execute(
                &format!("CREATE TABLE {table} ({})", defs.join(", ")),
                params![],
            )
            .await
            .map_err(|e| MspScoutError::Storage(e.to_string()))?;
        Ok(())
    }
}

fn read_records<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| MspScoutError::Storage(format!("{}: {e}", path.display())))?;
    reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()
        .map_err(|e| MspScoutError::Storage(format!("{}: {e}", path.display())))
}

/// Reject anything that is not a plain SQL identifier before it is
/// interpolated into DDL.
fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(MspScoutError::Storage(format!(
            "invalid identifier '{name}': use letters, digits and underscores"
        )))
    }
}
