//! Redb Draft Store

use std::cmp::Ordering;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use cashier_common::database::{self, DraftDatabase};
use cashier_common::draft::{TempLink, TempLinkUpdate};
use cashier_common::Principal;
use redb::{Database, ReadableTable, TableDefinition};
use tracing::instrument;

use super::error::Error;

// <(Owner, Temp_link_id), TempLink>
const DRAFTS_TABLE: TableDefinition<(&str, &str), &str> = TableDefinition::new("drafts");
const CONFIG_TABLE: TableDefinition<&str, &str> = TableDefinition::new("config");

const DATABASE_VERSION: u32 = 1;

/// Draft Redb Database
#[derive(Debug, Clone)]
pub struct RedbDraftDatabase {
    db: Arc<Database>,
}

impl RedbDraftDatabase {
    /// Create new [`RedbDraftDatabase`]
    pub fn new(path: &Path) -> Result<Self, Error> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("Parent directory does not exist: {}", parent.display()),
                )));
            }
        }

        Self::from_database(Database::create(path)?)
    }

    /// Wrap an opened database, initializing or checking its schema version
    pub fn from_database(db: Database) -> Result<Self, Error> {
        let db_version: Option<String>;
        {
            // Check database version
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(CONFIG_TABLE);

            db_version = match table {
                Ok(table) => table.get("db_version")?.map(|v| v.value().to_string()),
                Err(_) => None,
            };
        }

        match db_version {
            Some(db_version) => {
                let current_file_version = u32::from_str(&db_version)?;
                match current_file_version.cmp(&DATABASE_VERSION) {
                    Ordering::Equal => {
                        tracing::info!("Database is at current version {}", DATABASE_VERSION);
                    }
                    Ordering::Less | Ordering::Greater => {
                        tracing::warn!(
                            "Database version {} is not supported, current is {}",
                            current_file_version,
                            DATABASE_VERSION
                        );
                        return Err(Error::UnknownDatabaseVersion);
                    }
                }
            }
            None => {
                let write_txn = db.begin_write()?;
                {
                    let mut table = write_txn.open_table(CONFIG_TABLE)?;
                    // Open all tables to init a new db
                    let _ = write_txn.open_table(DRAFTS_TABLE)?;
                    table.insert("db_version", DATABASE_VERSION.to_string().as_str())?;
                }

                write_txn.commit()?;
            }
        }

        Ok(Self { db: Arc::new(db) })
    }

    fn read(&self, owner: &Principal, id: &str) -> Result<Option<TempLink>, Error> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DRAFTS_TABLE)?;

        let temp_link = table
            .get((owner.as_str(), id))?
            .map(|value| serde_json::from_str(value.value()))
            .transpose()?;

        Ok(temp_link)
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl DraftDatabase for RedbDraftDatabase {
    type Err = database::Error;

    #[instrument(skip(self, temp_link), fields(id = %temp_link.id))]
    async fn create(&self, owner: &Principal, temp_link: TempLink) -> Result<(), Self::Err> {
        let write_txn = self.db.begin_write().map_err(Error::from)?;
        {
            let mut table = write_txn.open_table(DRAFTS_TABLE).map_err(Error::from)?;

            if table
                .get((owner.as_str(), temp_link.id.as_str()))
                .map_err(Error::from)?
                .is_some()
            {
                return Err(database::Error::Duplicate(temp_link.id));
            }

            table
                .insert(
                    (owner.as_str(), temp_link.id.as_str()),
                    serde_json::to_string(&temp_link)
                        .map_err(Error::from)?
                        .as_str(),
                )
                .map_err(Error::from)?;
        }
        write_txn.commit().map_err(Error::from)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, owner: &Principal) -> Result<Vec<TempLink>, Self::Err> {
        let read_txn = self.db.begin_read().map_err(Error::from)?;
        let table = read_txn.open_table(DRAFTS_TABLE).map_err(Error::from)?;

        let mut temp_links = Vec::new();
        for result in table
            .range((owner.as_str(), "")..)
            .map_err(Error::from)?
        {
            let (key, value) = result.map_err(Error::from)?;
            let (record_owner, _) = key.value();
            if record_owner != owner.as_str() {
                break;
            }

            match serde_json::from_str::<TempLink>(value.value()) {
                Ok(temp_link) => temp_links.push(temp_link),
                Err(err) => tracing::warn!("Skipping unreadable draft record: {}", err),
            }
        }

        temp_links.sort_by_key(|temp_link| temp_link.created_at_nanos);

        Ok(temp_links)
    }

    #[instrument(skip(self))]
    async fn get_one(&self, owner: &Principal, id: &str) -> Result<Option<TempLink>, Self::Err> {
        Ok(self.read(owner, id)?)
    }

    #[instrument(skip(self, update))]
    async fn update(
        &self,
        owner: &Principal,
        id: &str,
        update: TempLinkUpdate,
    ) -> Result<TempLink, Self::Err> {
        let write_txn = self.db.begin_write().map_err(Error::from)?;
        let temp_link = {
            let mut table = write_txn.open_table(DRAFTS_TABLE).map_err(Error::from)?;

            let mut temp_link: TempLink = match table
                .get((owner.as_str(), id))
                .map_err(Error::from)?
            {
                Some(value) => serde_json::from_str(value.value()).map_err(Error::from)?,
                None => return Err(database::Error::NotFound(id.to_string())),
            };

            temp_link.apply(update);

            table
                .insert(
                    (owner.as_str(), id),
                    serde_json::to_string(&temp_link)
                        .map_err(Error::from)?
                        .as_str(),
                )
                .map_err(Error::from)?;

            temp_link
        };
        write_txn.commit().map_err(Error::from)?;

        Ok(temp_link)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str, owner: &Principal) -> Result<(), Self::Err> {
        let write_txn = self.db.begin_write().map_err(Error::from)?;
        {
            let mut table = write_txn.open_table(DRAFTS_TABLE).map_err(Error::from)?;
            table.remove((owner.as_str(), id)).map_err(Error::from)?;
        }
        write_txn.commit().map_err(Error::from)?;

        Ok(())
    }
}
