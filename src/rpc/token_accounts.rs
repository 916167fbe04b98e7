//! Associated-token-account provisioning and wrapped-SOL custody helpers.

use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_instruction;

use crate::constants::WSOL;
use crate::errors::{DexResult, RpcError};
use crate::logger::{log, LogTag};
use crate::rpc::SolClient;
use crate::utils::token_account_amount;

/// Derive the associated token account for `(owner, mint)`.
pub fn find_associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    spl_associated_token_account::get_associated_token_address(owner, mint)
}

/// Instruction creating the ATA for `(owner, mint)`, funded by `payer`.
pub fn create_ata_instruction(payer: &Pubkey, owner: &Pubkey, mint: &Pubkey) -> Instruction {
    spl_associated_token_account::instruction::create_associated_token_account(
        payer,
        owner,
        mint,
        &spl_token::id(),
    )
}

/// Return the owner's ATA for `mint`. When the account does not exist yet,
/// the create instruction is returned alongside so the caller can prepend it.
pub async fn select_or_create_spl_token_account(
    client: &SolClient,
    owner: &Pubkey,
    mint: &Pubkey,
) -> DexResult<(Pubkey, Option<Instruction>)> {
    let ata = find_associated_token_address(owner, mint);
    match client.get_account_optional(&ata).await {
        Ok(Some(_)) => Ok((ata, None)),
        Ok(None) => {
            log(
                LogTag::Wallet,
                "INFO",
                &format!("token account {} missing, will create", ata),
            );
            Ok((ata, Some(create_ata_instruction(owner, owner, mint))))
        }
        // Probe failures fall back to the derived address; the transaction
        // will surface the real problem
        Err(err) => {
            log(
                LogTag::Wallet,
                "WARN",
                &format!("could not probe token account {}: {}", ata, err),
            );
            Ok((ata, None))
        }
    }
}

/// Current balance of the owner's ATA for `mint`; zero when absent.
pub async fn get_user_token_balance(
    client: &SolClient,
    owner: &Pubkey,
    mint: &Pubkey,
) -> DexResult<u64> {
    let ata = find_associated_token_address(owner, mint);
    match client.get_account_optional(&ata).await? {
        Some(account) => Ok(token_account_amount(&account.data).unwrap_or(0)),
        None => Ok(0),
    }
}

/// Instructions wrapping `amount` lamports into the owner's WSOL ATA:
/// idempotent create, native transfer, then sync.
pub fn cover_wsol_instructions(owner: &Pubkey, amount: u64) -> DexResult<Vec<Instruction>> {
    let wsol_ata = find_associated_token_address(owner, &WSOL);
    let create_ix =
        spl_associated_token_account::instruction::create_associated_token_account_idempotent(
            owner,
            owner,
            &WSOL,
            &spl_token::id(),
        );
    let transfer_ix = system_instruction::transfer(owner, &wsol_ata, amount);
    let sync_ix = spl_token::instruction::sync_native(&spl_token::id(), &wsol_ata)
        .map_err(|e| RpcError::Permanent(format!("sync_native: {}", e)))?;
    Ok(vec![create_ix, transfer_ix, sync_ix])
}

/// Instruction closing the owner's WSOL ATA, unwrapping back to native SOL.
pub fn close_wsol_instruction(owner: &Pubkey) -> DexResult<Instruction> {
    let wsol_ata = find_associated_token_address(owner, &WSOL);
    spl_token::instruction::close_account(&spl_token::id(), &wsol_ata, owner, owner, &[])
        .map_err(|e| RpcError::Permanent(format!("close_account: {}", e)).into())
}
