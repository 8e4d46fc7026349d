//! CPI helpers for calling the capital pool program and the system program.
//!
//! We construct raw pool instruction data manually since we don't depend on
//! the pool crate. The tag must match the pool's instruction decoder.

use solana_program::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    instruction::{AccountMeta, Instruction},
    program::invoke_signed,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
    sysvar::Sysvar,
};

// ═══════════════════════════════════════════════════════════════
// Pool instruction tags
// ═══════════════════════════════════════════════════════════════

/// AcceptRestake: pool credits lamports already moved into its reserve.
pub const TAG_ACCEPT_RESTAKE: u8 = 7;

/// Instruction data for AcceptRestake: tag(1) + amount(8).
pub fn accept_restake_data(amount: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(9);
    data.push(TAG_ACCEPT_RESTAKE);
    data.extend_from_slice(&amount.to_le_bytes());
    data
}

// ═══════════════════════════════════════════════════════════════
// AcceptRestake (Tag 7) - only the registered withdrawal queue may call
// ═══════════════════════════════════════════════════════════════
// Accounts: [queue(signer), pool_reserve(w)]
// Data: tag(1) + amount(8)
// The lamports are moved before the CPI; the pool only books them.

pub fn cpi_accept_restake<'a>(
    pool_program: &AccountInfo<'a>,
    queue_pda: &AccountInfo<'a>,     // we sign
    pool_reserve: &AccountInfo<'a>,
    amount: u64,
    queue_seeds: &[&[u8]],
) -> ProgramResult {
    let ix = Instruction {
        program_id: *pool_program.key,
        accounts: vec![
            AccountMeta::new_readonly(*queue_pda.key, true),
            AccountMeta::new(*pool_reserve.key, false),
        ],
        data: accept_restake_data(amount),
    };

    invoke_signed(
        &ix,
        &[queue_pda.clone(), pool_reserve.clone(), pool_program.clone()],
        &[queue_seeds],
    )
}

// ═══════════════════════════════════════════════════════════════
// System program: PDA creation
// ═══════════════════════════════════════════════════════════════
// PDA addresses are public, so anyone can send lamports to one before it
// exists. `create_account` rejects a funded address; in that case the
// account is topped up to rent exemption, then allocated and assigned.

/// System instructions that turn `pda` into a `space`-byte account owned by
/// `owner`, given the lamports it already holds.
pub fn create_pda_instructions(
    payer: &Pubkey,
    pda: &Pubkey,
    current_lamports: u64,
    rent_minimum: u64,
    space: u64,
    owner: &Pubkey,
) -> Vec<Instruction> {
    if current_lamports == 0 {
        return vec![system_instruction::create_account(payer, pda, rent_minimum, space, owner)];
    }

    let mut ixs = Vec::with_capacity(3);
    let top_up = rent_minimum.saturating_sub(current_lamports);
    if top_up > 0 {
        ixs.push(system_instruction::transfer(payer, pda, top_up));
    }
    ixs.push(system_instruction::allocate(pda, space));
    ixs.push(system_instruction::assign(pda, owner));
    ixs
}

pub fn cpi_create_pda<'a>(
    payer: &AccountInfo<'a>,
    pda: &AccountInfo<'a>,       // we sign
    system_program: &AccountInfo<'a>,
    space: usize,
    owner: &Pubkey,
    pda_seeds: &[&[u8]],
) -> ProgramResult {
    let rent = Rent::get()?;
    let ixs = create_pda_instructions(
        payer.key,
        pda.key,
        pda.lamports(),
        rent.minimum_balance(space),
        space as u64,
        owner,
    );

    for ix in &ixs {
        invoke_signed(
            ix,
            &[payer.clone(), pda.clone(), system_program.clone()],
            &[pda_seeds],
        )?;
    }
    Ok(())
}
