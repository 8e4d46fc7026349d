//! Stake Withdrawal Queue Program
//!
//! Deferred redemption for a liquid staking pool. The pool burns a holder's
//! claim and forwards the owed lamports here; the request matures after a
//! fixed delay and is paid from the queue's custody balance. Capital in
//! custody above everything still owed is idle and gets pushed back to the
//! pool for redeployment.
//!
//! Architecture:
//! - One queue PDA per pool authority: aggregate state + custody lamports
//! - One request PDA per account: at most one live request, a new request
//!   overwrites the previous one
//! - `total_pending` reserves capital for every request, matured or not;
//!   StakeRemaining only ever moves `custody - total_pending`
//! - `pending_by_day[7]` buckets pending lamports by unlock weekday so a
//!   disbursement bot can pre-fund custody without scanning requests
//! - The engine (`state::QueueState`) takes `now` and custody as inputs and
//!   commits nothing on failure; the processor only gathers inputs and moves
//!   lamports
//!
//! Instructions:
//!   0 - InitQueue:          Create queue PDA (custody), set pool authority/reserve
//!   1 - RequestWithdrawal:  Pool-signed; book amount, unlock = now + delay
//!   2 - CompleteWithdrawal: Anyone; pay matured request to its account
//!   3 - StakeRemaining:     Anyone; move idle surplus to pool reserve + CPI notify
//!   4 - UpdateConfig:       Admin updates delay / pool reserve

pub mod error;
pub mod instruction;
pub mod math;
pub mod processor;
pub mod state;
pub mod cpi;

#[cfg(not(feature = "no-entrypoint"))]
mod entrypoint;
