use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};

use dexrouter::logger::{log, LogTag};
use dexrouter::protocols::{
    MeteoraDlmmProtocol, OrcaWhirlpoolProtocol, PumpAmmProtocol, RaydiumAmmProtocol,
    RaydiumClmmProtocol, RaydiumCpmmProtocol,
};
use dexrouter::rpc::{cover_wsol_instructions, get_user_token_balance, SolClient};
use dexrouter::{constants, utils, SimpleRouter};

const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

fn detect_cluster(url: &str) -> &'static str {
    let url = url.to_lowercase();
    if url.contains("devnet") {
        "devnet"
    } else if url.contains("testnet") {
        "testnet"
    } else {
        "mainnet"
    }
}

/// 1 SOL in lamports
const DEFAULT_AMOUNT_IN: u64 = 1_000_000_000;

/// 1% slippage protection
const SLIPPAGE_BPS: u64 = 100;

#[tokio::main]
async fn main() -> Result<()> {
    utils::load_env();
    log(
        LogTag::System,
        "INFO",
        &format!("dexrouter starting (build {})", env!("BUILD_NUMBER")),
    );

    let private_key = std::env::var("PRIVATE_KEY").context("PRIVATE_KEY is required")?;
    let keypair = Keypair::from_base58_string(&private_key);
    let user = keypair.pubkey();
    log(LogTag::Wallet, "INFO", &format!("wallet: {}", user));

    let rpc_url = std::env::var("RPC_URL")
        .unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".to_string());
    let ws_rpc_url = std::env::var("WS_RPC_URL")
        .unwrap_or_else(|_| "wss://api.mainnet-beta.solana.com".to_string());
    if detect_cluster(&rpc_url) != detect_cluster(&ws_rpc_url) {
        anyhow::bail!(
            "RPC and WS endpoints target different clusters ({} vs {})",
            detect_cluster(&rpc_url),
            detect_cluster(&ws_rpc_url)
        );
    }

    // Program-id overrides must land before any adapter is constructed
    if detect_cluster(&rpc_url) == "devnet" {
        dexrouter::pools::raydium::constants::use_devnet_clmm_program();
    }
    let client = Arc::new(SolClient::new(&rpc_url));

    let usdc = Pubkey::from_str(USDC_MINT)?;
    let wsol = constants::WSOL;

    // Ensure enough wrapped SOL is available for the swap
    let wsol_balance = get_user_token_balance(&client, &user, &wsol).await?;
    log(
        LogTag::Wallet,
        "BALANCE",
        &format!("WSOL balance: {}", wsol_balance),
    );
    let mut setup_instructions = Vec::new();
    if wsol_balance < DEFAULT_AMOUNT_IN {
        setup_instructions
            .extend(cover_wsol_instructions(&user, DEFAULT_AMOUNT_IN - wsol_balance)?);
    }

    let mut router = SimpleRouter::new(vec![
        Box::new(PumpAmmProtocol::new(client.clone())),
        Box::new(RaydiumAmmProtocol::new(client.clone())),
        Box::new(RaydiumClmmProtocol::new(client.clone())),
        Box::new(RaydiumCpmmProtocol::new(client.clone())),
        Box::new(MeteoraDlmmProtocol::new(client.clone())),
        Box::new(OrcaWhirlpoolProtocol::new(client.clone())),
    ]);

    let pools = router.query_all_pools(&usdc, &wsol).await?;
    for pool in pools {
        log(
            LogTag::Router,
            "INFO",
            &format!("found pool {} ({})", pool.id(), pool.protocol_name()),
        );
    }

    let (best_pool, amount_out) = router
        .get_best_pool(&client, &wsol, &usdc, DEFAULT_AMOUNT_IN)
        .await?;
    log(
        LogTag::Router,
        "SUCCESS",
        &format!(
            "best pool {} ({}) quotes {}",
            best_pool.id(),
            best_pool.protocol_name(),
            amount_out
        ),
    );

    let min_amount_out = amount_out * (10_000 - SLIPPAGE_BPS) / 10_000;
    let mut instructions = setup_instructions;
    instructions.extend(
        best_pool
            .build_swap_instructions(&client, &user, &wsol, DEFAULT_AMOUNT_IN, min_amount_out)
            .await?,
    );
    log(
        LogTag::Swap,
        "INFO",
        &format!("built {} instructions", instructions.len()),
    );

    let simulate_only = std::env::var("SIMULATE")
        .map(|v| v != "false")
        .unwrap_or(true);
    let blockhash = client.get_latest_blockhash().await?;
    match client
        .send_transaction(blockhash, &[&keypair], &instructions, simulate_only)
        .await?
    {
        Some(signature) => log(
            LogTag::Swap,
            "SUCCESS",
            &format!("https://solscan.io/tx/{}", signature),
        ),
        None => log(LogTag::Swap, "SUCCESS", "simulation passed"),
    }

    Ok(())
}
