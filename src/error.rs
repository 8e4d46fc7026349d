use solana_program::program_error::ProgramError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum QueueError {
    /// Queue already initialized for this pool authority
    AlreadyInitialized = 0,
    /// Queue or request account not initialized
    NotInitialized = 1,
    /// Unauthorized - not admin / not the pool authority
    Unauthorized = 2,
    /// Withdrawal delay has not elapsed yet
    DelayNotElapsed = 3,
    /// Custody balance below the amount owed
    InsufficientFunds = 4,
    /// Nothing above total pending to restake
    NoSurplus = 5,
    /// Account has no live request
    NoLiveRequest = 6,
    /// Zero amount
    ZeroAmount = 7,
    /// Arithmetic overflow
    Overflow = 8,
    /// Invalid PDA derivation
    InvalidPda = 9,
    /// Pool program does not match the one stored at init
    InvalidPoolProgram = 10,
    /// Payout destination is not the account that owns the request
    InvalidBeneficiary = 11,
    /// Clock sysvar reported a negative unix timestamp
    InvalidClock = 12,
    /// Pool reserve may not be the queue's own custody account
    InvalidPoolReserve = 13,
}

impl From<QueueError> for ProgramError {
    fn from(e: QueueError) -> Self {
        ProgramError::Custom(e as u32)
    }
}
