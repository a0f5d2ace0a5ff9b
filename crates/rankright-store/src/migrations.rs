use rusqlite::{Connection, Transaction};

use crate::{StoreError, StoreResult};

pub(crate) const CURRENT_SCHEMA_VERSION: i32 = 1;

pub(crate) fn run_migrations(conn: &mut Connection) -> StoreResult<()> {
    let mut version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version > CURRENT_SCHEMA_VERSION {
        return Err(StoreError::UnsupportedSchema {
            found: version,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }

    if version == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;

    while version < CURRENT_SCHEMA_VERSION {
        let next_version = version + 1;
        apply_migration(&tx, next_version)?;
        tracing::debug!(version = next_version, "Applied schema migration");
        version = next_version;
    }

    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;
    tx.commit()?;

    Ok(())
}

fn apply_migration(tx: &Transaction<'_>, version: i32) -> StoreResult<()> {
    match version {
        1 => {
            tx.execute_batch(include_str!("schemas/schema_v1.sql"))?;
            Ok(())
        }
        other => Err(StoreError::UnsupportedSchema {
            found: other,
            supported: CURRENT_SCHEMA_VERSION,
        }),
    }
}
