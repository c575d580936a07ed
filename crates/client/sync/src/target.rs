/// Outcome of the target computation for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTarget {
    pub target: u64,
    pub to_sync: u64,
}

/// `target = min(current_head - lag, last_synced + block_batch_size)`, clamped
/// to `end_block`, and `to_sync = max(target - last_synced, 0)`.
///
/// Every subtraction saturates, so a head behind the lag or behind the
/// checkpoint yields `to_sync == 0` and never a negative range.
pub fn calculate_target_block(
    current_head: u64,
    last_synced: u64,
    lag: u64,
    block_batch_size: u64,
    end_block: Option<u64>,
) -> SyncTarget {
    let mut target = current_head.saturating_sub(lag).min(last_synced.saturating_add(block_batch_size));
    if let Some(end_block) = end_block {
        target = target.min(end_block);
    }
    SyncTarget { target, to_sync: target.saturating_sub(last_synced) }
}
