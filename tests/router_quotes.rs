//! Router selection behavior and instruction determinism.

use async_trait::async_trait;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

use dexrouter::errors::{DexResult, SwapError};
use dexrouter::pools::{Pool, ProtocolKind};
use dexrouter::rpc::SolClient;
use dexrouter::SimpleRouter;

/// Fixed-quote pool used to drive the router without a network.
#[derive(Debug)]
struct FixturePool {
    id: Pubkey,
    kind: ProtocolKind,
    base: Pubkey,
    quote_mint: Pubkey,
    quote_result: Result<u64, ()>,
}

#[async_trait]
impl Pool for FixturePool {
    fn protocol_kind(&self) -> ProtocolKind {
        self.kind
    }

    fn program_id(&self) -> Pubkey {
        Pubkey::default()
    }

    fn id(&self) -> Pubkey {
        self.id
    }

    fn tokens(&self) -> (Pubkey, Pubkey) {
        (self.base, self.quote_mint)
    }

    async fn quote(
        &mut self,
        _client: &SolClient,
        _input_mint: &Pubkey,
        _amount_in: u64,
    ) -> DexResult<u64> {
        self.quote_result
            .map_err(|_| SwapError::PoolNotQuotable("fixture failure".to_string()).into())
    }

    async fn build_swap_instructions(
        &self,
        _client: &SolClient,
        user: &Pubkey,
        _input_mint: &Pubkey,
        amount_in: u64,
        min_amount_out: u64,
    ) -> DexResult<Vec<Instruction>> {
        let mut data = vec![0u8];
        data.extend_from_slice(&amount_in.to_le_bytes());
        data.extend_from_slice(&min_amount_out.to_le_bytes());
        Ok(vec![Instruction {
            program_id: Pubkey::default(),
            accounts: vec![AccountMeta::new_readonly(*user, true)],
            data,
        }])
    }
}

fn offline_client() -> SolClient {
    SolClient::new("http://127.0.0.1:1")
}

#[tokio::test]
async fn test_router_picks_maximum_and_skips_failures() {
    let base = Pubkey::new_unique();
    let quote_mint = Pubkey::new_unique();

    let clmm_id = Pubkey::new_unique();
    let dlmm_id = Pubkey::new_unique();
    let broken_id = Pubkey::new_unique();

    let mut router = SimpleRouter::with_pools(vec![
        Box::new(FixturePool {
            id: clmm_id,
            kind: ProtocolKind::RaydiumClmm,
            base,
            quote_mint,
            quote_result: Ok(5_000),
        }),
        Box::new(FixturePool {
            id: dlmm_id,
            kind: ProtocolKind::MeteoraDlmm,
            base,
            quote_mint,
            quote_result: Ok(6_000),
        }),
        Box::new(FixturePool {
            id: broken_id,
            kind: ProtocolKind::OrcaWhirlpool,
            base,
            quote_mint,
            quote_result: Err(()),
        }),
    ]);

    let client = offline_client();
    let (best, amount_out) = router
        .get_best_pool(&client, &base, &quote_mint, 1_000_000)
        .await
        .unwrap();
    assert_eq!(best.id(), dlmm_id);
    assert_eq!(best.protocol_kind(), ProtocolKind::MeteoraDlmm);
    assert_eq!(amount_out, 6_000);
}

#[tokio::test]
async fn test_router_tie_breaks_by_discovery_order() {
    let base = Pubkey::new_unique();
    let quote_mint = Pubkey::new_unique();
    let first = Pubkey::new_unique();
    let second = Pubkey::new_unique();

    let mut router = SimpleRouter::with_pools(vec![
        Box::new(FixturePool {
            id: first,
            kind: ProtocolKind::RaydiumAmm,
            base,
            quote_mint,
            quote_result: Ok(9_000),
        }),
        Box::new(FixturePool {
            id: second,
            kind: ProtocolKind::PumpAmm,
            base,
            quote_mint,
            quote_result: Ok(9_000),
        }),
    ]);

    let client = offline_client();
    let (best, _) = router
        .get_best_pool(&client, &base, &quote_mint, 1)
        .await
        .unwrap();
    assert_eq!(best.id(), first);
}

#[tokio::test]
async fn test_router_no_route_found_when_all_fail() {
    let base = Pubkey::new_unique();
    let quote_mint = Pubkey::new_unique();

    let mut router = SimpleRouter::with_pools(vec![Box::new(FixturePool {
        id: Pubkey::new_unique(),
        kind: ProtocolKind::RaydiumClmm,
        base,
        quote_mint,
        quote_result: Err(()),
    })]);

    let client = offline_client();
    let err = router
        .get_best_pool(&client, &base, &quote_mint, 1)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        dexrouter::DexError::Router(dexrouter::errors::RouterError::NoRouteFound)
    ));
}

#[tokio::test]
async fn test_pump_instruction_determinism() {
    use dexrouter::pools::pump::PumpPool;

    let data = vec![0u8; PumpPool::span()];
    let mut pool = PumpPool::decode(&data).unwrap();
    pool.pool_id = Pubkey::new_unique();
    pool.base_mint = Pubkey::new_unique();
    pool.quote_mint = Pubkey::new_unique();
    pool.pool_base_token_account = Pubkey::new_unique();
    pool.pool_quote_token_account = Pubkey::new_unique();

    let client = offline_client();
    let user = Pubkey::new_unique();
    let base_mint = pool.base_mint;

    let first = pool
        .build_swap_instructions(&client, &user, &base_mint, 1_000, 900)
        .await
        .unwrap();
    let second = pool
        .build_swap_instructions(&client, &user, &base_mint, 1_000, 900)
        .await
        .unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].data, second[0].data);
    assert_eq!(first[0].program_id, second[0].program_id);
    let metas_first: Vec<_> = first[0]
        .accounts
        .iter()
        .map(|m| (m.pubkey, m.is_signer, m.is_writable))
        .collect();
    let metas_second: Vec<_> = second[0]
        .accounts
        .iter()
        .map(|m| (m.pubkey, m.is_signer, m.is_writable))
        .collect();
    assert_eq!(metas_first, metas_second);
    // sell(base_in, min_quote_out) layout
    assert_eq!(&first[0].data[..8], &[51, 230, 133, 164, 1, 127, 131, 173]);
    assert_eq!(&first[0].data[8..16], &1_000u64.to_le_bytes());
    assert_eq!(&first[0].data[16..24], &900u64.to_le_bytes());
}

#[tokio::test]
async fn test_clmm_instruction_shape() {
    use dexrouter::math::clmm::get_sqrt_price_x64_from_tick;
    use dexrouter::pools::raydium::constants::{clmm_program_id, TICK_ARRAY_SIZE};
    use dexrouter::pools::raydium::tick_array::get_pda_tick_array_address;
    use dexrouter::pools::raydium::{ClmmPool, TickArrayState, TickState};

    let data = vec![0u8; ClmmPool::span()];
    let mut pool = ClmmPool::decode(&data).unwrap();
    pool.pool_id = Pubkey::new_unique();
    pool.token_mint_0 = Pubkey::new_unique();
    pool.token_mint_1 = Pubkey::new_unique();
    pool.tick_spacing = 1;
    pool.tick_current = 0;
    pool.sqrt_price_x64 = get_sqrt_price_x64_from_tick(0).unwrap();
    pool.liquidity = 1_000_000_000_000_000_000;
    pool.fee_rate = 500;

    // Initialize tick +60 in the array starting at 60
    let start = 60;
    let mut ticks = Vec::new();
    for i in 0..TICK_ARRAY_SIZE {
        let tick = start + i;
        let mut state = TickState {
            tick,
            ..TickState::default()
        };
        if tick == 60 {
            state.liquidity_gross = 1;
            state.liquidity_net = 1_000_000_000_000_000_000;
        }
        ticks.push(state);
    }
    pool.tick_array_cache.insert(
        start,
        TickArrayState {
            pool_id: pool.pool_id,
            start_tick_index: start,
            ticks,
            initialized_tick_count: 1,
        },
    );
    let g = (start / 60 + 512) as usize;
    pool.tick_array_bitmap[g / 64] |= 1 << (g % 64);

    // Quote upward: at most the single tick at +60 is crossed
    let (amount_out, visited) = pool.swap_compute(false, 1_000_000).unwrap();
    assert!(amount_out > 0);
    assert_eq!(visited, vec![60]);

    let client = offline_client();
    let user = Pubkey::new_unique();
    let input_mint = pool.token_mint_1;
    let instructions = pool
        .build_swap_instructions(&client, &user, &input_mint, 1_000_000, amount_out)
        .await
        .unwrap();
    assert_eq!(instructions.len(), 1);

    let instruction = &instructions[0];
    assert_eq!(instruction.program_id, clmm_program_id());
    assert_eq!(&instruction.data[..8], &[43, 4, 237, 11, 26, 201, 30, 98]);

    // Remaining accounts: exactly one tick array, the one at start 60
    let expected_tick_array =
        get_pda_tick_array_address(&clmm_program_id(), &pool.pool_id, start);
    let tick_array_metas: Vec<_> = instruction.accounts[14..]
        .iter()
        .map(|m| m.pubkey)
        .collect();
    assert_eq!(tick_array_metas, vec![expected_tick_array]);
}
