//! Exclusive write transactions with bounded retry on lock contention.

use std::thread;

use log::warn;

use crate::config::RetryPolicy;
use crate::db::Database;
use crate::error::{ClinicError, ClinicResult};

/// Run `op` in a `BEGIN IMMEDIATE` transaction, retrying the whole
/// transaction while another writer holds the database lock.
///
/// Every attempt starts from scratch; a failed attempt leaves nothing behind.
/// After `policy.max_attempts` contended attempts this returns
/// [`ClinicError::ConcurrencyConflict`]. Any other error is returned as is.
pub fn exclusive<T, F>(db: &Database, policy: &RetryPolicy, mut op: F) -> ClinicResult<T>
where
    F: FnMut(&Database) -> ClinicResult<T>,
{
    let mut attempt = 1;
    loop {
        match db.immediate(&mut op) {
            Err(e) if e.is_contention() => {
                if attempt >= policy.max_attempts {
                    warn!("Giving up after {} contended attempts: {}", attempt, e);
                    return Err(ClinicError::ConcurrencyConflict { attempts: attempt });
                }
                let delay = policy.delay_for(attempt);
                warn!(
                    "Write contention (attempt {}/{}), retrying in {:?}",
                    attempt, policy.max_attempts, delay
                );
                thread::sleep(delay);
                attempt += 1;
            }
            result => return result,
        }
    }
}
