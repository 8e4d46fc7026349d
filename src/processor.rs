use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program_error::ProgramError,
    pubkey::Pubkey,
    rent::Rent,
    sysvar::{clock::Clock, Sysvar},
};

use crate::cpi;
use crate::error::QueueError;
use crate::instruction::QueueInstruction;
use crate::math::{self, WITHDRAWAL_DELAY_SECONDS};
use crate::state::{
    self, PendingRequest, QueueState, PENDING_REQUEST_SIZE, QUEUE_STATE_SIZE,
};

pub fn process(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    let instruction = QueueInstruction::unpack(instruction_data)?;

    match instruction {
        QueueInstruction::InitQueue { delay_seconds } => {
            process_init_queue(program_id, accounts, delay_seconds)
        }
        QueueInstruction::RequestWithdrawal { amount } => {
            process_request_withdrawal(program_id, accounts, amount)
        }
        QueueInstruction::CompleteWithdrawal => {
            process_complete_withdrawal(program_id, accounts)
        }
        QueueInstruction::StakeRemaining => {
            process_stake_remaining(program_id, accounts)
        }
        QueueInstruction::UpdateConfig { new_delay_seconds, new_pool_reserve } => {
            process_update_config(program_id, accounts, new_delay_seconds, new_pool_reserve)
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Helpers: account views, clock, custody
// ═══════════════════════════════════════════════════════════════

fn queue_state_mut(data: &mut [u8]) -> Result<&mut QueueState, ProgramError> {
    let bytes = data
        .get_mut(..QUEUE_STATE_SIZE)
        .ok_or(ProgramError::InvalidAccountData)?;
    bytemuck::try_from_bytes_mut(bytes).map_err(|_| ProgramError::InvalidAccountData)
}

fn pending_request_mut(data: &mut [u8]) -> Result<&mut PendingRequest, ProgramError> {
    let bytes = data
        .get_mut(..PENDING_REQUEST_SIZE)
        .ok_or(ProgramError::InvalidAccountData)?;
    bytemuck::try_from_bytes_mut(bytes).map_err(|_| ProgramError::InvalidAccountData)
}

/// Program-owned accounts only. A foreign account with the right bytes must
/// never be read as queue or request state.
fn verify_owner(account: &AccountInfo, program_id: &Pubkey) -> ProgramResult {
    if account.owner != program_id {
        msg!("Error: account {} not owned by this program", account.key);
        return Err(ProgramError::IncorrectProgramId);
    }
    Ok(())
}

/// On-chain unix time as the engine's `now`.
fn unix_now(clock_sysvar: &AccountInfo) -> Result<u64, ProgramError> {
    let clock = Clock::from_account_info(clock_sysvar)?;
    u64::try_from(clock.unix_timestamp).map_err(|_| QueueError::InvalidClock.into())
}

/// Lamports held by the queue PDA above its rent-exempt reserve.
fn custody_balance(queue_pda: &AccountInfo) -> Result<u64, ProgramError> {
    let rent = Rent::get()?;
    let reserve = rent.minimum_balance(queue_pda.data_len());
    Ok(math::available_custody(queue_pda.lamports(), reserve))
}

/// Move lamports out of the program-owned queue PDA.
fn transfer_from_custody(queue_pda: &AccountInfo, to: &AccountInfo, amount: u64) -> ProgramResult {
    let queue_lamports = queue_pda.lamports()
        .checked_sub(amount)
        .ok_or(QueueError::InsufficientFunds)?;
    let to_lamports = to.lamports()
        .checked_add(amount)
        .ok_or(QueueError::Overflow)?;
    **queue_pda.try_borrow_mut_lamports()? = queue_lamports;
    **to.try_borrow_mut_lamports()? = to_lamports;
    Ok(())
}

fn effective_delay(delay_seconds: u64) -> u64 {
    if delay_seconds == 0 {
        WITHDRAWAL_DELAY_SECONDS
    } else {
        delay_seconds
    }
}

// ═══════════════════════════════════════════════════════════════
// 0: InitQueue
// ═══════════════════════════════════════════════════════════════

fn process_init_queue(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    delay_seconds: u64,
) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let admin = next_account_info(accounts_iter)?;
    let queue_pda = next_account_info(accounts_iter)?;
    let pool_authority = next_account_info(accounts_iter)?;
    let pool_program = next_account_info(accounts_iter)?;
    let pool_reserve = next_account_info(accounts_iter)?;
    let system_program = next_account_info(accounts_iter)?;

    if !admin.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let (expected_queue, queue_bump) = state::derive_queue_pda(program_id, pool_authority.key);
    if *queue_pda.key != expected_queue {
        return Err(QueueError::InvalidPda.into());
    }

    if !queue_pda.data_is_empty() {
        return Err(QueueError::AlreadyInitialized.into());
    }

    // Custody payouts would credit and debit the same account
    if pool_reserve.key == queue_pda.key {
        return Err(QueueError::InvalidPoolReserve.into());
    }

    let queue_seeds: &[&[u8]] = &[b"withdrawal_queue", pool_authority.key.as_ref(), &[queue_bump]];
    cpi::cpi_create_pda(admin, queue_pda, system_program, QUEUE_STATE_SIZE, program_id, queue_seeds)?;

    let mut queue_data = queue_pda.try_borrow_mut_data()?;
    let queue = queue_state_mut(&mut queue_data)?;

    queue.is_initialized = 1;
    queue.bump = queue_bump;
    queue.admin = admin.key.to_bytes();
    queue.pool_authority = pool_authority.key.to_bytes();
    queue.pool_program = pool_program.key.to_bytes();
    queue.pool_reserve = pool_reserve.key.to_bytes();
    queue.delay_seconds = effective_delay(delay_seconds);
    queue.total_pending = 0;
    queue.pending_by_day = [0; math::DAYS_PER_WEEK];
    queue.total_requested = 0;
    queue.total_completed = 0;
    queue.total_restaked = 0;
    queue.live_requests = 0;

    msg!(
        "WithdrawalQueue initialized for pool authority {} (delay {}s)",
        pool_authority.key,
        queue.delay_seconds,
    );
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 1: RequestWithdrawal - forwarded by the pool after the claim burn
// ═══════════════════════════════════════════════════════════════

fn process_request_withdrawal(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    amount: u64,
) -> ProgramResult {
    if amount == 0 {
        return Err(QueueError::ZeroAmount.into());
    }

    let accounts_iter = &mut accounts.iter();

    let pool_authority = next_account_info(accounts_iter)?;
    let payer = next_account_info(accounts_iter)?;
    let queue_pda = next_account_info(accounts_iter)?;
    let request_pda = next_account_info(accounts_iter)?;
    let account = next_account_info(accounts_iter)?;
    let clock_sysvar = next_account_info(accounts_iter)?;
    let system_program = next_account_info(accounts_iter)?;

    if !pool_authority.is_signer || !payer.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }
    verify_owner(queue_pda, program_id)?;

    let now = unix_now(clock_sysvar)?;

    let mut queue_data = queue_pda.try_borrow_mut_data()?;
    let queue = queue_state_mut(&mut queue_data)?;

    if queue.is_initialized != 1 {
        return Err(QueueError::NotInitialized.into());
    }
    // Only the pool books requests: it burned the claim and computed the amount
    if queue.pool_authority != pool_authority.key.to_bytes() {
        return Err(QueueError::Unauthorized.into());
    }

    let (expected_request, request_bump) =
        state::derive_request_pda(program_id, queue_pda.key, account.key);
    if *request_pda.key != expected_request {
        return Err(QueueError::InvalidPda.into());
    }

    if request_pda.data_is_empty() {
        let request_seeds: &[&[u8]] = &[
            b"withdraw_request", queue_pda.key.as_ref(), account.key.as_ref(), &[request_bump],
        ];
        cpi::cpi_create_pda(
            payer, request_pda, system_program, PENDING_REQUEST_SIZE, program_id, request_seeds,
        )?;
    } else {
        verify_owner(request_pda, program_id)?;
    }

    let mut request_data = request_pda.try_borrow_mut_data()?;
    let request = pending_request_mut(&mut request_data)?;

    if request.is_initialized != 1 {
        request.is_initialized = 1;
        request.bump = request_bump;
        request.queue = queue_pda.key.to_bytes();
        request.account = account.key.to_bytes();
    }

    let replaced = request.amount;
    let unlock_time = queue.book_request(request, amount, now)?;

    if replaced > 0 {
        msg!("Replaced pending withdrawal of {} for {}", replaced, account.key);
    }
    msg!(
        "Withdrawal requested: {} lamports for {}, unlocks at {} (day {})",
        amount,
        account.key,
        unlock_time,
        math::unlock_day(unlock_time),
    );
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 2: CompleteWithdrawal - permissionless payout of a matured request
// ═══════════════════════════════════════════════════════════════

fn process_complete_withdrawal(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let caller = next_account_info(accounts_iter)?;
    let queue_pda = next_account_info(accounts_iter)?;
    let request_pda = next_account_info(accounts_iter)?;
    let account = next_account_info(accounts_iter)?;
    let clock_sysvar = next_account_info(accounts_iter)?;

    if !caller.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }
    verify_owner(queue_pda, program_id)?;
    verify_owner(request_pda, program_id)?;
    if account.key == queue_pda.key {
        return Err(QueueError::InvalidBeneficiary.into());
    }

    let now = unix_now(clock_sysvar)?;
    let custody = custody_balance(queue_pda)?;

    // State is settled before any lamports move; both borrows end here
    let amount = {
        let mut queue_data = queue_pda.try_borrow_mut_data()?;
        let queue = queue_state_mut(&mut queue_data)?;
        let mut request_data = request_pda.try_borrow_mut_data()?;
        let request = pending_request_mut(&mut request_data)?;

        if queue.is_initialized != 1 || request.is_initialized != 1 {
            return Err(QueueError::NotInitialized.into());
        }
        if request.queue != queue_pda.key.to_bytes() {
            return Err(QueueError::InvalidPda.into());
        }
        if request.account != account.key.to_bytes() {
            return Err(QueueError::InvalidBeneficiary.into());
        }

        match queue.settle_request(request, now, custody) {
            Ok(amount) => amount,
            Err(e) => {
                msg!(
                    "CompleteWithdrawal rejected for {}: {:?} (owed {}, unlocks {}, now {}, custody {})",
                    account.key,
                    e,
                    request.amount,
                    request.unlock_time,
                    now,
                    custody,
                );
                return Err(e.into());
            }
        }
    };

    transfer_from_custody(queue_pda, account, amount)?;

    // The emptied request account stays open and program-owned; the next
    // RequestWithdrawal for this account rebooks it without a create CPI.
    msg!("Withdrawal completed: paid {} lamports to {}", amount, account.key);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 3: StakeRemaining - push idle surplus back to the pool
// ═══════════════════════════════════════════════════════════════

fn process_stake_remaining(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let caller = next_account_info(accounts_iter)?;
    let queue_pda = next_account_info(accounts_iter)?;
    let pool_reserve = next_account_info(accounts_iter)?;
    let pool_program = next_account_info(accounts_iter)?;

    if !caller.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }
    verify_owner(queue_pda, program_id)?;

    let custody = custody_balance(queue_pda)?;

    // Queue data must be released before the CPI borrows the account
    let (amount, pool_authority, bump) = {
        let mut queue_data = queue_pda.try_borrow_mut_data()?;
        let queue = queue_state_mut(&mut queue_data)?;

        if queue.is_initialized != 1 {
            return Err(QueueError::NotInitialized.into());
        }
        if queue.pool_reserve != pool_reserve.key.to_bytes() {
            return Err(QueueError::InvalidPda.into());
        }
        if queue.pool_program != pool_program.key.to_bytes() {
            return Err(QueueError::InvalidPoolProgram.into());
        }

        let amount = match queue.idle_surplus(custody) {
            Ok(amount) => amount,
            Err(e) => {
                msg!(
                    "No lamports available to stake: custody {} <= pending {}",
                    custody,
                    queue.total_pending,
                );
                return Err(e.into());
            }
        };
        queue.record_restake(amount)?;
        (amount, queue.pool_authority, queue.bump)
    };

    transfer_from_custody(queue_pda, pool_reserve, amount)?;

    let queue_seeds: &[&[u8]] = &[b"withdrawal_queue", &pool_authority[..], &[bump]];
    cpi::cpi_accept_restake(pool_program, queue_pda, pool_reserve, amount, queue_seeds)?;

    msg!("Restaked {} idle lamports to pool reserve {}", amount, pool_reserve.key);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// 4: UpdateConfig
// ═══════════════════════════════════════════════════════════════

fn process_update_config(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    new_delay_seconds: Option<u64>,
    new_pool_reserve: Option<Pubkey>,
) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let admin = next_account_info(accounts_iter)?;
    let queue_pda = next_account_info(accounts_iter)?;

    if !admin.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }
    verify_owner(queue_pda, program_id)?;

    let mut queue_data = queue_pda.try_borrow_mut_data()?;
    let queue = queue_state_mut(&mut queue_data)?;

    if queue.is_initialized != 1 {
        return Err(QueueError::NotInitialized.into());
    }
    if queue.admin != admin.key.to_bytes() {
        return Err(QueueError::Unauthorized.into());
    }

    if new_pool_reserve.as_ref() == Some(queue_pda.key) {
        return Err(QueueError::InvalidPoolReserve.into());
    }

    // Live requests keep the unlock_time they were booked with
    if let Some(delay) = new_delay_seconds {
        queue.delay_seconds = effective_delay(delay);
    }
    if let Some(reserve) = new_pool_reserve {
        queue.pool_reserve = reserve.to_bytes();
    }

    msg!("Queue config updated (delay {}s)", queue.delay_seconds);
    Ok(())
}
