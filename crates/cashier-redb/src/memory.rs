//! In-memory database

use redb::backends::InMemoryBackend;
use redb::Builder;

use crate::error::Error;
use crate::wallet::RedbDraftDatabase;

/// Creates a new in-memory [`RedbDraftDatabase`] instance
pub fn empty() -> Result<RedbDraftDatabase, Error> {
    let db = Builder::new().create_with_backend(InMemoryBackend::new())?;
    RedbDraftDatabase::from_database(db)
}
