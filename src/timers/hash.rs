use sha2::{Digest, Sha256};

/// Width of a task hash in hex characters.
///
/// Stored hashes depend on this width, so it must never change. Six hex
/// characters give 2^24 buckets; collisions between distinct task names of
/// the same user become likely past a few thousand tasks. Aggregation treats
/// colliding tasks as one.
pub const TASK_HASH_LEN: usize = 6;

/// Identifies "the same task" within a team and project.
///
/// The inputs are concatenated without a separator and hashed as raw bytes
/// (no trimming or case folding).
pub fn task_hash(team_id: &str, project_id: &str, task_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(team_id.as_bytes());
    hasher.update(project_id.as_bytes());
    hasher.update(task_name.as_bytes());
    let digest = hasher.finalize();

    let mut hex = hex::encode(&digest[..TASK_HASH_LEN.div_ceil(2)]);
    hex.truncate(TASK_HASH_LEN);
    hex
}
