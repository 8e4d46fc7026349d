//! Unit tests for the withdrawal queue engine: booking, completion,
//! rebalance and disbursement planning on the Pod state structs.

use bytemuck::Zeroable;
use solana_program::pubkey::Pubkey;
use stake_withdrawal_queue::error::QueueError;
use stake_withdrawal_queue::math::{
    available_custody, unlock_day, SECONDS_PER_DAY, WITHDRAWAL_DELAY_SECONDS,
};
use stake_withdrawal_queue::state::{
    derive_queue_pda, derive_request_pda, PendingRequest, QueueState,
};

const LAMPORTS_PER_SOL: u64 = 1_000_000_000;
/// 2023-11-14T22:13:20Z
const T0: u64 = 1_700_000_000;

// ═══════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════

fn new_queue() -> QueueState {
    let mut queue = QueueState::zeroed();
    queue.is_initialized = 1;
    queue.bump = 255;
    queue.delay_seconds = WITHDRAWAL_DELAY_SECONDS;
    queue
}

fn new_request() -> PendingRequest {
    let mut request = PendingRequest::zeroed();
    request.is_initialized = 1;
    request.bump = 254;
    request
}

fn assert_consistent(queue: &QueueState, live: &[&PendingRequest]) {
    let sum: u64 = live.iter().map(|r| r.amount).sum();
    assert_eq!(queue.total_pending, sum, "total_pending must equal live amounts");
    assert!(queue.buckets_consistent(), "bucket sum must equal total_pending");
    let count = live.iter().filter(|r| r.is_live()).count() as u64;
    assert_eq!(queue.live_requests, count);
}

// ═══════════════════════════════════════════════════════════════
// Request Submission
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_request_books_amount_and_unlock_time() {
    let mut queue = new_queue();
    let mut request = new_request();

    let unlock = queue.book_request(&mut request, 100, T0).unwrap();

    assert_eq!(unlock, T0 + 604_800);
    assert_eq!(request.snapshot(), (100, T0 + 604_800));
    assert_eq!(request.requested_at, T0);
    assert_eq!(queue.total_pending(), 100);
    assert_eq!(queue.pending_by_day(unlock_day(unlock)), Some(100));
    assert_eq!(queue.total_requested, 100);
    assert_consistent(&queue, &[&request]);
}

#[test]
fn test_request_zero_amount_rejected() {
    let mut queue = new_queue();
    let mut request = new_request();

    assert_eq!(queue.book_request(&mut request, 0, T0), Err(QueueError::ZeroAmount));
    assert_eq!(request.snapshot(), (0, 0));
    assert_eq!(queue.total_pending, 0);
    assert_eq!(queue.live_requests, 0);
}

#[test]
fn test_request_unlock_overflow_rejected_without_mutation() {
    let mut queue = new_queue();
    let mut request = new_request();

    assert_eq!(
        queue.book_request(&mut request, 100, u64::MAX - 10),
        Err(QueueError::Overflow)
    );
    assert_eq!(request.snapshot(), (0, 0));
    assert_eq!(queue.total_pending, 0);
    assert_eq!(queue.total_requested, 0);
}

#[test]
fn test_request_total_overflow_rejected_without_mutation() {
    let mut queue = new_queue();
    let mut a = new_request();
    let mut b = new_request();

    queue.book_request(&mut a, u64::MAX, T0).unwrap();
    let before = queue;

    assert_eq!(queue.book_request(&mut b, 1, T0), Err(QueueError::Overflow));
    assert_eq!(bytemuck::bytes_of(&queue), bytemuck::bytes_of(&before));
    assert_eq!(b.snapshot(), (0, 0));
}

#[test]
fn test_requests_on_different_days_land_in_different_buckets() {
    let mut queue = new_queue();
    let mut a = new_request();
    let mut b = new_request();

    let ua = queue.book_request(&mut a, 100, T0).unwrap();
    let ub = queue.book_request(&mut b, 250, T0 + SECONDS_PER_DAY).unwrap();

    assert_ne!(unlock_day(ua), unlock_day(ub));
    assert_eq!(queue.pending_by_day(unlock_day(ua)), Some(100));
    assert_eq!(queue.pending_by_day(unlock_day(ub)), Some(250));
    assert_eq!(queue.total_pending, 350);
    assert_consistent(&queue, &[&a, &b]);
}

#[test]
fn test_requests_on_same_day_share_bucket() {
    let mut queue = new_queue();
    let mut a = new_request();
    let mut b = new_request();

    let ua = queue.book_request(&mut a, 100, T0).unwrap();
    let ub = queue.book_request(&mut b, 50, T0 + 60).unwrap();

    assert_eq!(unlock_day(ua), unlock_day(ub));
    assert_eq!(queue.pending_by_day(unlock_day(ua)), Some(150));
    assert_consistent(&queue, &[&a, &b]);
}

#[test]
fn test_custom_delay_applies_to_new_requests() {
    let mut queue = new_queue();
    queue.delay_seconds = 3 * SECONDS_PER_DAY;
    let mut request = new_request();

    let unlock = queue.book_request(&mut request, 10, T0).unwrap();
    assert_eq!(unlock, T0 + 3 * SECONDS_PER_DAY);
    assert_eq!(queue.delay(), 3 * SECONDS_PER_DAY);
}

// ═══════════════════════════════════════════════════════════════
// Overwrite Policy (one live request per account)
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_second_request_overwrites_first() {
    let mut queue = new_queue();
    let mut request = new_request();

    let first_unlock = queue.book_request(&mut request, 100, T0).unwrap();
    let second_unlock = queue
        .book_request(&mut request, 40, T0 + 2 * SECONDS_PER_DAY)
        .unwrap();

    assert_eq!(request.snapshot(), (40, second_unlock));
    assert_eq!(queue.total_pending, 40);
    assert_eq!(queue.pending_by_day(unlock_day(first_unlock)), Some(0));
    assert_eq!(queue.pending_by_day(unlock_day(second_unlock)), Some(40));
    assert_eq!(queue.live_requests, 1);
    // Lifetime counter still records both bookings
    assert_eq!(queue.total_requested, 140);
    assert_consistent(&queue, &[&request]);
}

#[test]
fn test_overwrite_resets_maturity() {
    let mut queue = new_queue();
    let mut request = new_request();

    let unlock = queue.book_request(&mut request, 100, T0).unwrap();
    assert!(request.is_matured(unlock));

    // Re-requested after maturity: back to pending with a fresh delay
    let new_unlock = queue.book_request(&mut request, 100, unlock).unwrap();
    assert!(!request.is_matured(unlock));
    assert_eq!(
        queue.settle_request(&mut request, unlock, u64::MAX),
        Err(QueueError::DelayNotElapsed)
    );
    assert_eq!(queue.settle_request(&mut request, new_unlock, 100), Ok(100));
}

#[test]
fn test_overwrite_does_not_touch_other_accounts() {
    let mut queue = new_queue();
    let mut a = new_request();
    let mut b = new_request();

    queue.book_request(&mut a, 100, T0).unwrap();
    queue.book_request(&mut b, 200, T0).unwrap();
    queue.book_request(&mut a, 5, T0 + 1).unwrap();

    assert_eq!(b.amount, 200);
    assert_eq!(queue.total_pending, 205);
    assert_consistent(&queue, &[&a, &b]);
}

// ═══════════════════════════════════════════════════════════════
// Completion
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_complete_lifecycle_scenario() {
    let mut queue = new_queue();
    let mut request = new_request();

    let unlock = queue.book_request(&mut request, 100, T0).unwrap();
    let day = unlock_day(unlock);
    assert_eq!(queue.pending_by_day(day), Some(100));

    // One second early
    assert_eq!(
        queue.settle_request(&mut request, T0 + 604_799, 100),
        Err(QueueError::DelayNotElapsed)
    );
    // Matured but underfunded
    assert_eq!(
        queue.settle_request(&mut request, T0 + 604_800, 50),
        Err(QueueError::InsufficientFunds)
    );
    assert_eq!(queue.total_pending, 100);
    assert_eq!(request.snapshot(), (100, unlock));

    // Funded
    assert_eq!(queue.settle_request(&mut request, T0 + 604_800, 100), Ok(100));
    assert_eq!(request.snapshot(), (0, 0));
    assert_eq!(queue.total_pending, 0);
    assert_eq!(queue.pending_by_day(day), Some(0));
    assert_eq!(queue.total_completed, 100);
    assert_eq!(queue.live_requests, 0);

    // Rebalance on an empty queue
    assert_eq!(queue.idle_surplus(100), Ok(100));
    assert_eq!(queue.idle_surplus(0), Err(QueueError::NoSurplus));
}

#[test]
fn test_complete_twice_pays_once() {
    let mut queue = new_queue();
    let mut request = new_request();
    let unlock = queue.book_request(&mut request, 32 * LAMPORTS_PER_SOL, T0).unwrap();

    assert_eq!(
        queue.settle_request(&mut request, unlock, 64 * LAMPORTS_PER_SOL),
        Ok(32 * LAMPORTS_PER_SOL)
    );
    assert_eq!(
        queue.settle_request(&mut request, unlock, 64 * LAMPORTS_PER_SOL),
        Err(QueueError::NoLiveRequest)
    );
    assert_eq!(queue.total_completed, 32 * LAMPORTS_PER_SOL);
}

#[test]
fn test_complete_empty_request() {
    let mut queue = new_queue();
    let mut request = new_request();

    assert_eq!(
        queue.settle_request(&mut request, T0, u64::MAX),
        Err(QueueError::NoLiveRequest)
    );
}

#[test]
fn test_no_live_request_checked_before_delay() {
    let mut queue = new_queue();
    let mut request = new_request();

    // Empty request at time 0: unlock_time 0 would count as matured,
    // the liveness check must win
    assert_eq!(
        queue.settle_request(&mut request, 0, 0),
        Err(QueueError::NoLiveRequest)
    );
}

#[test]
fn test_delay_checked_before_funds() {
    let mut queue = new_queue();
    let mut request = new_request();
    let unlock = queue.book_request(&mut request, 100, T0).unwrap();

    assert_eq!(
        queue.settle_request(&mut request, unlock - 1, 0),
        Err(QueueError::DelayNotElapsed)
    );
}

#[test]
fn test_failed_completion_leaves_state_identical() {
    let mut queue = new_queue();
    let mut request = new_request();
    let unlock = queue.book_request(&mut request, 100, T0).unwrap();

    let queue_before = queue;
    let request_before = request;

    let _ = queue.settle_request(&mut request, unlock - 1, 1_000);
    let _ = queue.settle_request(&mut request, unlock, 99);

    assert_eq!(bytemuck::bytes_of(&queue), bytemuck::bytes_of(&queue_before));
    assert_eq!(bytemuck::bytes_of(&request), bytemuck::bytes_of(&request_before));
}

#[test]
fn test_complete_long_after_unlock() {
    let mut queue = new_queue();
    let mut request = new_request();
    let unlock = queue.book_request(&mut request, 100, T0).unwrap();

    // Maturity is monotonic: a year later it is still payable
    assert_eq!(
        queue.settle_request(&mut request, unlock + 365 * SECONDS_PER_DAY, 100),
        Ok(100)
    );
}

#[test]
fn test_complete_one_of_many() {
    let mut queue = new_queue();
    let mut a = new_request();
    let mut b = new_request();
    let mut c = new_request();

    let ua = queue.book_request(&mut a, 100, T0).unwrap();
    queue.book_request(&mut b, 200, T0 + SECONDS_PER_DAY).unwrap();
    queue.book_request(&mut c, 300, T0 + 2 * SECONDS_PER_DAY).unwrap();

    assert_eq!(queue.settle_request(&mut a, ua, 1_000), Ok(100));
    assert_eq!(queue.total_pending, 500);
    assert_eq!(queue.pending_by_day(unlock_day(ua)), Some(0));
    assert_consistent(&queue, &[&a, &b, &c]);
}

// ═══════════════════════════════════════════════════════════════
// Rebalance
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_rebalance_keeps_pending_reserved() {
    let mut queue = new_queue();
    let mut request = new_request();
    queue.book_request(&mut request, 32 * LAMPORTS_PER_SOL, T0).unwrap();

    // Custody exactly covers the immature request: nothing to stake
    assert_eq!(
        queue.idle_surplus(32 * LAMPORTS_PER_SOL),
        Err(QueueError::NoSurplus)
    );
    // Underfunded custody
    assert_eq!(queue.idle_surplus(LAMPORTS_PER_SOL), Err(QueueError::NoSurplus));
    // Surplus above pending
    assert_eq!(queue.idle_surplus(40 * LAMPORTS_PER_SOL), Ok(8 * LAMPORTS_PER_SOL));
}

#[test]
fn test_rebalance_does_not_change_aggregates() {
    let mut queue = new_queue();
    let mut request = new_request();
    queue.book_request(&mut request, 100, T0).unwrap();
    let before = queue;

    let idle = queue.idle_surplus(1_000).unwrap();
    assert_eq!(idle, 900);
    assert_eq!(bytemuck::bytes_of(&queue), bytemuck::bytes_of(&before));

    queue.record_restake(idle).unwrap();
    assert_eq!(queue.total_restaked, 900);
    assert_eq!(queue.total_pending, before.total_pending);
    assert_eq!(queue.pending_by_day, before.pending_by_day);
}

#[test]
fn test_record_restake_overflow() {
    let mut queue = new_queue();
    queue.total_restaked = u64::MAX;
    assert_eq!(queue.record_restake(1), Err(QueueError::Overflow));
    assert_eq!(queue.total_restaked, u64::MAX);
}

// ═══════════════════════════════════════════════════════════════
// Disbursement Planning
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_pending_by_day_out_of_range() {
    let queue = new_queue();
    assert_eq!(queue.pending_by_day(6), Some(0));
    assert_eq!(queue.pending_by_day(7), None);
}

#[test]
fn test_maturing_within_full_week_equals_total() {
    let mut queue = new_queue();
    let mut reqs = [new_request(), new_request(), new_request()];
    for (i, r) in reqs.iter_mut().enumerate() {
        queue
            .book_request(r, (i as u64 + 1) * 10, T0 + i as u64 * SECONDS_PER_DAY)
            .unwrap();
    }
    assert_eq!(queue.maturing_within(T0, 7), queue.total_pending);
}

#[test]
fn test_custody_shortfall_for_next_days() {
    let mut queue = new_queue();
    let mut a = new_request();
    let mut b = new_request();

    // Booked a day apart: with a 7-day delay they unlock on today's and tomorrow's weekday
    queue.book_request(&mut a, 100, T0).unwrap();
    queue.book_request(&mut b, 200, T0 + SECONDS_PER_DAY).unwrap();

    assert_eq!(queue.maturing_within(T0, 1), 100);
    assert_eq!(queue.maturing_within(T0, 2), 300);
    assert_eq!(queue.custody_shortfall(120, T0, 2), 180);
    assert_eq!(queue.custody_shortfall(500, T0, 2), 0);
}

// ═══════════════════════════════════════════════════════════════
// PDA Derivation
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_queue_pda_is_deterministic_per_pool_authority() {
    let program_id = Pubkey::new_unique();
    let pool_a = Pubkey::new_unique();
    let pool_b = Pubkey::new_unique();

    assert_eq!(derive_queue_pda(&program_id, &pool_a), derive_queue_pda(&program_id, &pool_a));
    assert_ne!(derive_queue_pda(&program_id, &pool_a).0, derive_queue_pda(&program_id, &pool_b).0);
}

#[test]
fn test_request_pda_unique_per_account() {
    let program_id = Pubkey::new_unique();
    let (queue, _) = derive_queue_pda(&program_id, &Pubkey::new_unique());
    let alice = Pubkey::new_unique();
    let bob = Pubkey::new_unique();

    let (ra, _) = derive_request_pda(&program_id, &queue, &alice);
    let (rb, _) = derive_request_pda(&program_id, &queue, &bob);
    assert_ne!(ra, rb);
    assert_ne!(ra, queue);
}

#[test]
fn test_pubkey_accessors_roundtrip() {
    let mut queue = new_queue();
    let admin = Pubkey::new_unique();
    let reserve = Pubkey::new_unique();
    queue.admin = admin.to_bytes();
    queue.pool_reserve = reserve.to_bytes();
    assert_eq!(queue.admin_pubkey(), admin);
    assert_eq!(queue.pool_reserve_pubkey(), reserve);

    let mut request = new_request();
    let account = Pubkey::new_unique();
    request.account = account.to_bytes();
    assert_eq!(request.account_pubkey(), account);
}

// ═══════════════════════════════════════════════════════════════
// Custody
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_day_length_matches_runtime_clock() {
    assert_eq!(SECONDS_PER_DAY, solana_sdk::clock::SECONDS_PER_DAY);
}

#[test]
fn test_rent_reserve_is_not_custody() {
    let reserve = solana_sdk::rent::Rent::default()
        .minimum_balance(stake_withdrawal_queue::state::QUEUE_STATE_SIZE);
    assert!(reserve > 0);

    let lamports = reserve + 3 * LAMPORTS_PER_SOL;
    let custody = available_custody(lamports, reserve);
    assert_eq!(custody, 3 * LAMPORTS_PER_SOL);

    // A freshly funded PDA holding only rent has nothing to pay out
    assert_eq!(available_custody(reserve, reserve), 0);

    let mut queue = new_queue();
    let mut request = new_request();
    queue.book_request(&mut request, custody, T0).unwrap();
    assert_eq!(queue.idle_surplus(custody), Err(QueueError::NoSurplus));
    assert_eq!(
        queue.settle_request(&mut request, T0 + WITHDRAWAL_DELAY_SECONDS, custody),
        Ok(3 * LAMPORTS_PER_SOL)
    );
}

#[test]
fn test_pending_request_of_account_data() {
    use stake_withdrawal_queue::state::pending_request_of;

    let mut queue = new_queue();
    let mut request = new_request();
    let unlock = queue.book_request(&mut request, 7 * LAMPORTS_PER_SOL, T0).unwrap();

    // Account data as fetched off-chain, at an odd offset
    let mut data = vec![0u8];
    data.extend_from_slice(bytemuck::bytes_of(&request));
    assert_eq!(pending_request_of(&data[1..]), (7 * LAMPORTS_PER_SOL, unlock));

    assert_eq!(pending_request_of(&data[1..64]), (0, 0));
    assert_eq!(pending_request_of(bytemuck::bytes_of(&PendingRequest::zeroed())), (0, 0));
}
