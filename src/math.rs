//! Pure queue math - extracted for Kani formal verification.
//!
//! No Solana/Pubkey dependencies. Just arithmetic over timestamps,
//! day buckets and lamport amounts.

/// Seconds in one day (unix time has no leap seconds).
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Number of maturity-day buckets. One per weekday.
pub const DAYS_PER_WEEK: usize = 7;

/// Default delay between a withdrawal request and its unlock: 7 days.
pub const WITHDRAWAL_DELAY_SECONDS: u64 = 7 * SECONDS_PER_DAY;

/// Unlock timestamp for a request booked at `now`.
///
/// # Returns
/// * `Some(now + delay)`
/// * `None` - timestamp overflow
pub fn unlock_time(now: u64, delay_seconds: u64) -> Option<u64> {
    now.checked_add(delay_seconds)
}

/// Weekday bucket of a timestamp: `(t / SECONDS_PER_DAY) mod 7`.
///
/// Always `< DAYS_PER_WEEK`, so it indexes the bucket array without a check.
pub fn unlock_day(timestamp: u64) -> usize {
    ((timestamp / SECONDS_PER_DAY) % DAYS_PER_WEEK as u64) as usize
}

/// A request is payable once `now >= unlock_time`. Monotonic in `now`.
pub fn is_matured(now: u64, unlock_time: u64) -> bool {
    now >= unlock_time
}

/// Idle capital that may be pushed back to the pool.
///
/// `idle = custody - total_pending`. Every pending request reserves its
/// amount regardless of maturity, so a request that unlocks next week still
/// keeps its capital in custody today.
///
/// # Returns
/// * `Some(idle)` when `idle > 0`
/// * `None` when custody does not exceed total pending
pub fn idle_surplus(custody_balance: u64, total_pending: u64) -> Option<u64> {
    match custody_balance.checked_sub(total_pending) {
        Some(idle) if idle > 0 => Some(idle),
        _ => None,
    }
}

/// Lamports of the custody account usable for payouts and restaking.
/// The rent-exempt reserve of the account is never spendable.
pub fn available_custody(lamports: u64, rent_reserve: u64) -> u64 {
    lamports.saturating_sub(rent_reserve)
}

/// Checked sum of all buckets. `None` on overflow (broken accounting).
pub fn bucket_sum(buckets: &[u64; DAYS_PER_WEEK]) -> Option<u64> {
    buckets.iter().try_fold(0u64, |acc, b| acc.checked_add(*b))
}

/// Pending amount unlocking on the weekday of `now` and the following
/// `days - 1` weekdays. `days` is capped at a full week.
///
/// Matured-but-unclaimed requests stay in their bucket until completed, so
/// the result is an upper bound on what a scheduler has to fund.
pub fn maturing_within(buckets: &[u64; DAYS_PER_WEEK], now: u64, days: u64) -> u64 {
    let span = days.min(DAYS_PER_WEEK as u64) as usize;
    let today = unlock_day(now);
    (0..span)
        .map(|offset| buckets[(today + offset) % DAYS_PER_WEEK])
        .fold(0u64, |acc, b| acc.saturating_add(b))
}

/// How much custody must still be added to cover `required`.
pub fn custody_shortfall(required: u64, custody_balance: u64) -> u64 {
    required.saturating_sub(custody_balance)
}


// ═══════════════════════════════════════════════════════════════
// Kani Formal Verification
// ═══════════════════════════════════════════════════════════════
//
// u64 proofs over these helpers live in tests/kani.rs; the bucket
// accounting state machine is proved on a u32 mirror in kani-proofs/.
