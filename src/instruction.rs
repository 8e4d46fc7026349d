use solana_program::{program_error::ProgramError, pubkey::Pubkey};

/// Instructions for the stake withdrawal queue program.
#[derive(Debug)]
pub enum QueueInstruction {
    /// Initialize the withdrawal queue for a pool authority.
    /// Creates the queue PDA, which doubles as the custody account.
    /// `delay_seconds == 0` selects the default 7-day delay.
    ///
    /// Accounts:
    ///   0. `[signer, writable]` Admin (pays rent, becomes queue admin)
    ///   1. `[writable]` Queue PDA (withdrawal_queue, to be created)
    ///   2. `[]` Pool authority (signer of future RequestWithdrawal CPIs)
    ///   3. `[]` Pool program
    ///   4. `[]` Pool reserve (receives restaked idle capital)
    ///   5. `[]` System program
    InitQueue { delay_seconds: u64 },

    /// Book a withdrawal for `account`. Called by the pool after burning the
    /// holder's claim. Replaces any live request of that account.
    ///
    /// Accounts:
    ///   0. `[signer]` Pool authority
    ///   1. `[signer, writable]` Payer (funds the request PDA if new)
    ///   2. `[writable]` Queue PDA
    ///   3. `[writable]` Request PDA (per-account, created if needed)
    ///   4. `[]` Account (payout destination)
    ///   5. `[]` Clock sysvar
    ///   6. `[]` System program
    RequestWithdrawal { amount: u64 },

    /// Pay out a matured request from custody. Permissionless: the
    /// destination is always the account stored in the request.
    ///
    /// Accounts:
    ///   0. `[signer]` Caller (any)
    ///   1. `[writable]` Queue PDA
    ///   2. `[writable]` Request PDA
    ///   3. `[writable]` Account (payout destination)
    ///   4. `[]` Clock sysvar
    CompleteWithdrawal,

    /// Push custody lamports above total pending back to the pool reserve
    /// and notify the pool via CPI. Permissionless.
    ///
    /// Accounts:
    ///   0. `[signer]` Caller (any)
    ///   1. `[writable]` Queue PDA (signs AcceptRestake CPI)
    ///   2. `[writable]` Pool reserve
    ///   3. `[]` Pool program
    StakeRemaining,

    /// Admin updates delay (applies to new requests only) and/or pool reserve.
    ///
    /// Accounts:
    ///   0. `[signer]` Queue admin
    ///   1. `[writable]` Queue PDA
    UpdateConfig {
        new_delay_seconds: Option<u64>,
        new_pool_reserve: Option<Pubkey>,
    },
}

impl QueueInstruction {
    pub fn unpack(data: &[u8]) -> Result<Self, ProgramError> {
        let (&tag, rest) = data.split_first().ok_or(ProgramError::InvalidInstructionData)?;

        match tag {
            0 => {
                let delay_seconds = read_u64(rest, 0)?;
                Ok(Self::InitQueue { delay_seconds })
            }
            1 => {
                let amount = read_u64(rest, 0)?;
                Ok(Self::RequestWithdrawal { amount })
            }
            2 => Ok(Self::CompleteWithdrawal),
            3 => Ok(Self::StakeRemaining),
            4 => {
                // has_delay(1) + delay(8) + has_reserve(1) + reserve(32)
                if rest.len() < 42 {
                    return Err(ProgramError::InvalidInstructionData);
                }
                let has_delay = rest[0] != 0;
                let delay = read_u64(rest, 1)?;
                let has_reserve = rest[9] != 0;
                let reserve = Pubkey::try_from(&rest[10..42])
                    .map_err(|_| ProgramError::InvalidInstructionData)?;
                Ok(Self::UpdateConfig {
                    new_delay_seconds: if has_delay { Some(delay) } else { None },
                    new_pool_reserve: if has_reserve { Some(reserve) } else { None },
                })
            }
            _ => Err(ProgramError::InvalidInstructionData),
        }
    }

    /// Serialize into the wire layout `unpack` reads.
    pub fn pack(&self) -> Vec<u8> {
        match self {
            Self::InitQueue { delay_seconds } => {
                let mut data = vec![0u8];
                data.extend_from_slice(&delay_seconds.to_le_bytes());
                data
            }
            Self::RequestWithdrawal { amount } => {
                let mut data = vec![1u8];
                data.extend_from_slice(&amount.to_le_bytes());
                data
            }
            Self::CompleteWithdrawal => vec![2u8],
            Self::StakeRemaining => vec![3u8],
            Self::UpdateConfig { new_delay_seconds, new_pool_reserve } => {
                let mut data = Vec::with_capacity(43);
                data.push(4u8);
                data.push(new_delay_seconds.is_some() as u8);
                data.extend_from_slice(&new_delay_seconds.unwrap_or(0).to_le_bytes());
                data.push(new_pool_reserve.is_some() as u8);
                data.extend_from_slice(new_pool_reserve.unwrap_or_default().as_ref());
                data
            }
        }
    }
}

fn read_u64(data: &[u8], offset: usize) -> Result<u64, ProgramError> {
    data.get(offset..offset + 8)
        .and_then(|bytes| bytes.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or(ProgramError::InvalidInstructionData)
}
