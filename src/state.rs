use bytemuck::{Pod, Zeroable};
use solana_program::pubkey::Pubkey;

use crate::error::QueueError;
use crate::math::{self, DAYS_PER_WEEK};

/// Withdrawal queue state - one per pool authority.
/// PDA seeds: [b"withdrawal_queue", pool_authority]
///
/// The PDA is also the custody account: lamports above its rent-exempt
/// reserve fund completions, and anything above `total_pending` is idle
/// surplus that StakeRemaining pushes back to the pool reserve.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct QueueState {
    /// Whether the queue is initialized (1 = yes, 0 = no)
    pub is_initialized: u8,

    /// Bump seed for the queue PDA
    pub bump: u8,

    /// Padding for alignment
    pub _padding: [u8; 6],

    /// Queue admin (can update config)
    pub admin: [u8; 32],

    /// Pool signer allowed to book withdrawal requests
    pub pool_authority: [u8; 32],

    /// Capital pool program (receives AcceptRestake CPI)
    pub pool_program: [u8; 32],

    /// Pool account that receives restaked idle capital
    pub pool_reserve: [u8; 32],

    /// Seconds between a request and its unlock
    pub delay_seconds: u64,

    /// Sum of amounts over all live requests
    pub total_pending: u64,

    /// Pending amount per unlock weekday: (unlock_time / 86400) mod 7
    pub pending_by_day: [u64; DAYS_PER_WEEK],

    /// Total booked by requests (lifetime, overwritten amounts included)
    pub total_requested: u64,

    /// Total paid out by completions (lifetime)
    pub total_completed: u64,

    /// Total idle capital pushed back to the pool (lifetime)
    pub total_restaked: u64,

    /// Number of accounts with a live request
    pub live_requests: u64,

    /// Reserved for future use
    pub _reserved: [u8; 64],
}

/// Size of QueueState in bytes
pub const QUEUE_STATE_SIZE: usize = core::mem::size_of::<QueueState>();

/// Per-account pending withdrawal. At most one live request per account.
/// PDA seeds: [b"withdraw_request", queue_pda, account]
///
/// Empty (never requested, or completed) is `amount == 0 && unlock_time == 0`.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct PendingRequest {
    /// Whether this record is initialized
    pub is_initialized: u8,

    /// Bump seed for the request PDA
    pub bump: u8,

    /// Padding
    pub _padding: [u8; 6],

    /// The queue this request belongs to
    pub queue: [u8; 32],

    /// Account that receives the payout
    pub account: [u8; 32],

    /// Lamports owed
    pub amount: u64,

    /// Unix timestamp after which the request is payable
    pub unlock_time: u64,

    /// Unix timestamp of the last booking
    pub requested_at: u64,

    /// Reserved for future use
    pub _reserved: [u8; 32],
}

/// Size of PendingRequest in bytes
pub const PENDING_REQUEST_SIZE: usize = core::mem::size_of::<PendingRequest>();

impl PendingRequest {
    pub fn account_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.account)
    }

    /// A request is live while it still owes something.
    pub fn is_live(&self) -> bool {
        self.amount != 0
    }

    pub fn is_matured(&self, now: u64) -> bool {
        math::is_matured(now, self.unlock_time)
    }

    /// Maturity-day bucket this request is counted in.
    pub fn unlock_day(&self) -> usize {
        math::unlock_day(self.unlock_time)
    }

    /// `(amount, unlock_time)` as seen by an auditor.
    pub fn snapshot(&self) -> (u64, u64) {
        (self.amount, self.unlock_time)
    }
}

impl QueueState {
    pub fn admin_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.admin)
    }

    pub fn pool_authority_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.pool_authority)
    }

    pub fn pool_program_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.pool_program)
    }

    pub fn pool_reserve_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.pool_reserve)
    }

    pub fn delay(&self) -> u64 {
        self.delay_seconds
    }

    pub fn total_pending(&self) -> u64 {
        self.total_pending
    }

    /// Pending amount unlocking on weekday `day`. `None` for `day >= 7`.
    pub fn pending_by_day(&self, day: usize) -> Option<u64> {
        self.pending_by_day.get(day).copied()
    }

    /// Book `amount` for `request` at time `now`, replacing any live request.
    ///
    /// All new aggregate values are computed first; nothing is written
    /// unless every checked step succeeds.
    ///
    /// # Returns
    /// * `Ok(unlock_time)` of the booked request
    /// * `Err(ZeroAmount | Overflow)` with both structs untouched
    pub fn book_request(
        &mut self,
        request: &mut PendingRequest,
        amount: u64,
        now: u64,
    ) -> Result<u64, QueueError> {
        if amount == 0 {
            return Err(QueueError::ZeroAmount);
        }
        let unlock_time = math::unlock_time(now, self.delay_seconds)
            .ok_or(QueueError::Overflow)?;

        let mut buckets = self.pending_by_day;
        let mut total = self.total_pending;
        let mut live = self.live_requests;

        // Overwrite: release the previous booking from every aggregate first
        if request.is_live() {
            let prev_day = request.unlock_day();
            buckets[prev_day] = buckets[prev_day]
                .checked_sub(request.amount)
                .ok_or(QueueError::Overflow)?;
            total = total.checked_sub(request.amount).ok_or(QueueError::Overflow)?;
        } else {
            live = live.checked_add(1).ok_or(QueueError::Overflow)?;
        }

        let day = math::unlock_day(unlock_time);
        buckets[day] = buckets[day].checked_add(amount).ok_or(QueueError::Overflow)?;
        total = total.checked_add(amount).ok_or(QueueError::Overflow)?;
        let requested = self.total_requested
            .checked_add(amount)
            .ok_or(QueueError::Overflow)?;

        self.pending_by_day = buckets;
        self.total_pending = total;
        self.live_requests = live;
        self.total_requested = requested;

        request.amount = amount;
        request.unlock_time = unlock_time;
        request.requested_at = now;

        Ok(unlock_time)
    }

    /// Settle a matured request against `available_custody`.
    ///
    /// Checks run in order: live request, delay elapsed, custody covers the
    /// amount. On success the request is reset to empty and the amount to pay
    /// is returned; the caller moves the lamports.
    pub fn settle_request(
        &mut self,
        request: &mut PendingRequest,
        now: u64,
        available_custody: u64,
    ) -> Result<u64, QueueError> {
        if !request.is_live() {
            return Err(QueueError::NoLiveRequest);
        }
        if !request.is_matured(now) {
            return Err(QueueError::DelayNotElapsed);
        }
        let amount = request.amount;
        if available_custody < amount {
            return Err(QueueError::InsufficientFunds);
        }

        let day = request.unlock_day();
        let bucket = self.pending_by_day[day]
            .checked_sub(amount)
            .ok_or(QueueError::Overflow)?;
        let total = self.total_pending.checked_sub(amount).ok_or(QueueError::Overflow)?;
        let live = self.live_requests.checked_sub(1).ok_or(QueueError::Overflow)?;
        let completed = self.total_completed
            .checked_add(amount)
            .ok_or(QueueError::Overflow)?;

        self.pending_by_day[day] = bucket;
        self.total_pending = total;
        self.live_requests = live;
        self.total_completed = completed;

        request.amount = 0;
        request.unlock_time = 0;

        Ok(amount)
    }

    /// Idle surplus above total pending that may be restaked.
    /// Read-only: the surplus was never counted in any aggregate.
    pub fn idle_surplus(&self, custody_balance: u64) -> Result<u64, QueueError> {
        math::idle_surplus(custody_balance, self.total_pending).ok_or(QueueError::NoSurplus)
    }

    /// Record a restake that already moved `amount` out of custody.
    pub fn record_restake(&mut self, amount: u64) -> Result<(), QueueError> {
        self.total_restaked = self.total_restaked
            .checked_add(amount)
            .ok_or(QueueError::Overflow)?;
        Ok(())
    }

    /// Pending amount unlocking within the next `days` weekdays, starting today.
    pub fn maturing_within(&self, now: u64, days: u64) -> u64 {
        math::maturing_within(&self.pending_by_day, now, days)
    }

    /// Custody a scheduler must add so every request unlocking within
    /// `days` can be completed.
    pub fn custody_shortfall(&self, custody_balance: u64, now: u64, days: u64) -> u64 {
        math::custody_shortfall(self.maturing_within(now, days), custody_balance)
    }

    /// Check the bucket array against `total_pending` (auditors, tests).
    pub fn buckets_consistent(&self) -> bool {
        math::bucket_sum(&self.pending_by_day) == Some(self.total_pending)
    }
}

/// `(amount, unlock_time)` of a request account as read by a client.
/// Short or uninitialized data reads as `(0, 0)`.
pub fn pending_request_of(data: &[u8]) -> (u64, u64) {
    data.get(..PENDING_REQUEST_SIZE)
        .and_then(|bytes| bytemuck::try_pod_read_unaligned::<PendingRequest>(bytes).ok())
        .filter(|request| request.is_initialized == 1)
        .map_or((0, 0), |request| request.snapshot())
}

/// Derive the queue PDA for a pool authority.
/// This PDA also holds custody lamports and signs AcceptRestake.
pub fn derive_queue_pda(program_id: &Pubkey, pool_authority: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[b"withdrawal_queue", pool_authority.as_ref()], program_id)
}

/// Derive the per-account request PDA.
pub fn derive_request_pda(program_id: &Pubkey, queue: &Pubkey, account: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[b"withdraw_request", queue.as_ref(), account.as_ref()], program_id)
}
