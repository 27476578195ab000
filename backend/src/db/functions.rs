//! Application-defined SQL functions
//!
//! Registered on every pooled connection from `after_connect`.

use std::ffi::{c_char, c_int};
use std::ptr;

use libsqlite3_sys as ffi;
use sqlx::sqlite::SqliteConnection;

/// Unicode-aware lower-casing of a TEXT value. NULL stays NULL.
pub const UNICODE_LOWER: &str = "unicode_lower";

/// Register every application function on `conn`.
pub async fn register(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    let mut handle = conn.lock_handle().await?;
    let db = handle.as_raw_handle().as_ptr();

    // SAFETY: `db` is a live handle, held locked for the duration of the
    // call, and the callback only touches the context and arguments SQLite
    // hands it.
    let rc = unsafe {
        ffi::sqlite3_create_function_v2(
            db,
            c"unicode_lower".as_ptr(),
            1,
            ffi::SQLITE_UTF8 | ffi::SQLITE_DETERMINISTIC,
            ptr::null_mut(),
            Some(unicode_lower),
            None,
            None,
            None,
        )
    };

    if rc != ffi::SQLITE_OK {
        return Err(sqlx::Error::Protocol(format!(
            "failed to register {UNICODE_LOWER} (sqlite error {rc})"
        )));
    }
    Ok(())
}

unsafe extern "C" fn unicode_lower(
    ctx: *mut ffi::sqlite3_context,
    argc: c_int,
    argv: *mut *mut ffi::sqlite3_value,
) {
    // SAFETY: SQLite passes `argc` valid values in `argv`; text returned by
    // `sqlite3_value_text` is valid UTF-8 of `sqlite3_value_bytes` length
    // until the next call on the same value.
    unsafe {
        if argc != 1 {
            ffi::sqlite3_result_null(ctx);
            return;
        }
        let value = *argv;
        if ffi::sqlite3_value_type(value) == ffi::SQLITE_NULL {
            ffi::sqlite3_result_null(ctx);
            return;
        }

        let text = ffi::sqlite3_value_text(value);
        let len = ffi::sqlite3_value_bytes(value);
        let lowered = if text.is_null() || len <= 0 {
            String::new()
        } else {
            let bytes = std::slice::from_raw_parts(text, len as usize);
            String::from_utf8_lossy(bytes).to_lowercase()
        };

        ffi::sqlite3_result_text(
            ctx,
            lowered.as_ptr() as *const c_char,
            lowered.len() as c_int,
            ffi::SQLITE_TRANSIENT(),
        );
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;

    #[tokio::test]
    async fn test_unicode_lower() {
        let db = Database::in_memory().await.unwrap();
        let (lowered, null): (String, Option<String>) =
            sqlx::query_as("SELECT unicode_lower('ÖKOLOGIE Straße'), unicode_lower(NULL)")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(lowered, "ökologie straße");
        assert_eq!(null, None);
    }
}
