//! 任务键生成
//! Task key generation

use rand::Rng;

/// Generates a random decimal task key in the non-negative `i64` range.
pub fn generate_task_key() -> String {
    let value: u64 = rand::rng().random_range(0..=i64::MAX as u64);
    value.to_string()
}
