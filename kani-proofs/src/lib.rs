//! Kani formal verification for stake-withdrawal-queue bucket accounting.
//!
//! ZERO dependencies. Pure Rust. CBMC-friendly.
//!
//! KEY DESIGN DECISION: amounts are u32 and timestamps u32 here.
//! The production code uses u64, but the properties (bucket sum equals
//! total, failed calls change nothing, surplus never dips into pending)
//! do not depend on width. u32 keeps SAT formulas tractable for CBMC.
//!
//! Run all:   cargo kani --lib
//! Run one:   cargo kani --harness proof_book_preserves_bucket_sum

// ═══════════════════════════════════════════════════════════════
// Bucket accounting (u32 mirror of stake-withdrawal-queue/src/state.rs)
// Control flow is IDENTICAL - just narrower types for CBMC tractability.
// ═══════════════════════════════════════════════════════════════

pub const SECONDS_PER_DAY: u32 = 86_400;
pub const DAYS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fail {
    ZeroAmount,
    Overflow,
    NoLiveRequest,
    DelayNotElapsed,
    InsufficientFunds,
    NoSurplus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Queue {
    pub total: u32,
    pub days: [u32; DAYS],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Request {
    pub amount: u32,
    pub unlock: u32,
}

pub fn unlock_day(t: u32) -> usize {
    ((t / SECONDS_PER_DAY) % DAYS as u32) as usize
}

pub fn bucket_sum(q: &Queue) -> Option<u32> {
    q.days.iter().try_fold(0u32, |acc, d| acc.checked_add(*d))
}

/// Book (or overwrite) a request. Commits only on success.
pub fn book(q: &mut Queue, r: &mut Request, amount: u32, now: u32, delay: u32) -> Result<u32, Fail> {
    if amount == 0 {
        return Err(Fail::ZeroAmount);
    }
    let unlock = now.checked_add(delay).ok_or(Fail::Overflow)?;
    let mut days = q.days;
    let mut total = q.total;
    if r.amount != 0 {
        let d = unlock_day(r.unlock);
        days[d] = days[d].checked_sub(r.amount).ok_or(Fail::Overflow)?;
        total = total.checked_sub(r.amount).ok_or(Fail::Overflow)?;
    }
    let d = unlock_day(unlock);
    days[d] = days[d].checked_add(amount).ok_or(Fail::Overflow)?;
    total = total.checked_add(amount).ok_or(Fail::Overflow)?;
    q.days = days;
    q.total = total;
    r.amount = amount;
    r.unlock = unlock;
    Ok(unlock)
}

/// Settle a request against custody. Commits only on success.
pub fn settle(q: &mut Queue, r: &mut Request, now: u32, custody: u32) -> Result<u32, Fail> {
    if r.amount == 0 {
        return Err(Fail::NoLiveRequest);
    }
    if now < r.unlock {
        return Err(Fail::DelayNotElapsed);
    }
    if custody < r.amount {
        return Err(Fail::InsufficientFunds);
    }
    let d = unlock_day(r.unlock);
    let bucket = q.days[d].checked_sub(r.amount).ok_or(Fail::Overflow)?;
    let total = q.total.checked_sub(r.amount).ok_or(Fail::Overflow)?;
    let paid = r.amount;
    q.days[d] = bucket;
    q.total = total;
    *r = Request::default();
    Ok(paid)
}

pub fn idle_surplus(custody: u32, total: u32) -> Result<u32, Fail> {
    match custody.checked_sub(total) {
        Some(idle) if idle > 0 => Ok(idle),
        _ => Err(Fail::NoSurplus),
    }
}

// ═══════════════════════════════════════════════════════════════
// KANI PROOFS
// ═══════════════════════════════════════════════════════════════

#[cfg(kani)]
mod proofs {
    use super::*;

    /// Queue holding exactly one live request `r` (I1/I2 hold by construction).
    fn queue_with(r: &Request) -> Queue {
        let mut q = Queue::default();
        if r.amount != 0 {
            q.total = r.amount;
            q.days[unlock_day(r.unlock)] = r.amount;
        }
        q
    }

    fn any_request() -> Request {
        let amount: u32 = kani::any();
        let unlock: u32 = kani::any();
        if amount == 0 {
            Request::default()
        } else {
            Request { amount, unlock }
        }
    }

    // ── 1. Bucket Sum Invariant ──

    /// Booking on top of any single-request queue keeps Σ days == total.
    #[kani::proof]
    #[kani::unwind(8)]
    fn proof_book_preserves_bucket_sum() {
        let mut r = any_request();
        let mut q = queue_with(&r);
        let _ = book(&mut q, &mut r, kani::any(), kani::any(), kani::any());
        assert_eq!(bucket_sum(&q), Some(q.total));
        assert_eq!(q.total, r.amount);
    }

    /// Settling keeps Σ days == total and empties the queue on success.
    #[kani::proof]
    #[kani::unwind(8)]
    fn proof_settle_preserves_bucket_sum() {
        let mut r = any_request();
        let mut q = queue_with(&r);
        if settle(&mut q, &mut r, kani::any(), kani::any()).is_ok() {
            assert_eq!(q, Queue::default());
            assert_eq!(r, Request::default());
        }
        assert_eq!(bucket_sum(&q), Some(q.total));
    }

    // ── 2. Failure Atomicity ──

    #[kani::proof]
    #[kani::unwind(8)]
    fn proof_failed_book_changes_nothing() {
        let mut r = any_request();
        let mut q = queue_with(&r);
        let (q0, r0) = (q, r);
        if book(&mut q, &mut r, kani::any(), kani::any(), kani::any()).is_err() {
            assert_eq!(q, q0);
            assert_eq!(r, r0);
        }
    }

    #[kani::proof]
    #[kani::unwind(8)]
    fn proof_failed_settle_changes_nothing() {
        let mut r = any_request();
        let mut q = queue_with(&r);
        let (q0, r0) = (q, r);
        if settle(&mut q, &mut r, kani::any(), kani::any()).is_err() {
            assert_eq!(q, q0);
            assert_eq!(r, r0);
        }
    }

    // ── 3. Gates ──

    /// Success implies matured and funded.
    #[kani::proof]
    #[kani::unwind(8)]
    fn proof_settle_requires_maturity_and_funds() {
        let mut r = any_request();
        let mut q = queue_with(&r);
        let r0 = r;
        let now: u32 = kani::any();
        let custody: u32 = kani::any();
        if let Ok(paid) = settle(&mut q, &mut r, now, custody) {
            assert!(now >= r0.unlock);
            assert!(custody >= paid);
            assert_eq!(paid, r0.amount);
        }
    }

    /// Second settle of the same request always fails with NoLiveRequest.
    #[kani::proof]
    #[kani::unwind(8)]
    fn proof_no_double_payout() {
        let mut r = any_request();
        let mut q = queue_with(&r);
        let now: u32 = kani::any();
        let custody: u32 = kani::any();
        if settle(&mut q, &mut r, now, custody).is_ok() {
            assert_eq!(settle(&mut q, &mut r, now, custody), Err(Fail::NoLiveRequest));
        }
    }

    // ── 4. Rebalance Conservatism ──

    #[kani::proof]
    fn proof_surplus_never_touches_pending() {
        let custody: u32 = kani::any();
        let total: u32 = kani::any();
        if let Ok(idle) = idle_surplus(custody, total) {
            assert!(idle > 0);
            assert!(custody - idle >= total);
        }
    }

    // ── 5. Day Index ──

    #[kani::proof]
    fn proof_unlock_day_in_range() {
        assert!(unlock_day(kani::any()) < DAYS);
    }
}
