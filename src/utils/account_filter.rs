use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures::StreamExt;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::{PoisonError, RwLock};

/// Expected capacity and false-positive rate.
const FILTER_CAPACITY: usize = 50_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

/// Registered employee numbers. A miss means the number is definitely free.
static EMPLOYEE_NUMBER_FILTER: Lazy<RwLock<CuckooFilter<String>>> =
    Lazy::new(|| RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)));

#[inline]
pub fn normalize(employee_number: &str) -> String {
    employee_number.trim().to_uppercase()
}

/// False positives possible, false negatives not.
pub fn might_exist(employee_number: &str) -> bool {
    let key = normalize(employee_number);
    EMPLOYEE_NUMBER_FILTER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .contains(&key)
}

pub fn insert(employee_number: &str) {
    let key = normalize(employee_number);
    EMPLOYEE_NUMBER_FILTER
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .add(&key);
}

fn insert_batch(keys: &[String]) {
    let mut filter = EMPLOYEE_NUMBER_FILTER
        .write()
        .unwrap_or_else(PoisonError::into_inner);

    for key in keys {
        filter.add(key);
    }
}

/// Streams every registered employee number into the filter.
pub async fn warmup(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_as::<_, (String,)>("SELECT employee_number FROM users").fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        let (employee_number,) = row.map_err(|e| anyhow!("DB row fetch failed: {}", e))?;

        batch.push(normalize(&employee_number));
        total += 1;

        if batch.len() == batch_size {
            insert_batch(&batch);
            batch.clear();
        }
    }

    if !batch.is_empty() {
        insert_batch(&batch);
    }

    tracing::info!(total, "Employee number filter warmup complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserted_numbers_are_found_regardless_of_case() {
        insert("emp-test-0001");
        assert!(might_exist(" EMP-TEST-0001 "));
    }

    #[test]
    fn unseen_number_is_probably_absent() {
        assert!(!might_exist("never-registered-zz-9999"));
    }
}
