//! Demo: apalancamiento con flash loan sobre el ledger en memoria.
//!
//! Lee `RECIPE_FLASH_FEE_BPS` / `RECIPE_SLIPPAGE_BPS` / `RECIPE_REGISTRY`
//! (o `.env`). Con un fee > 0 la corrida revierte con `FlashLoanUnpaid`.

use alloy_primitives::U256;
use recipe_adapters::tokens::{DAI, WETH};
use recipe_adapters::{LedgerSubstrate, PriceTable, StaticQuoteService};
use recipe_core::{Action, ComposerConfig, ComposerError, ExecutionContext, QuoteService, Recipe, Slot};

const E18: u128 = 1_000_000_000_000_000_000;

fn build_recipe(quotes: &impl QuoteService) -> Result<Recipe, ComposerError> {
    let amount = U256::from(1_000 * E18);
    let quote = quotes.get_quote(DAI, WETH, amount, "demo-route")?;
    Recipe::builder("leverage-weth").then(Action::flash_begin(DAI, amount)?)?
                                    .then(Action::swap_with_quote(Slot::parse_token("$1")?, &quote)?)?
                                    .then(Action::supply(WETH, Slot::parse_token("$2")?)?)?
                                    .then(Action::borrow(DAI, amount)?)?
                                    .then(Action::flash_end()?)?
                                    .build()
}

fn main() -> Result<(), ComposerError> {
    let config = ComposerConfig::from_env()?;
    let prices = PriceTable::new().with_rate(DAI, WETH, 1, 2_000);
    let quotes = StaticQuoteService::new(prices.clone(), config.slippage_bps);
    let recipe = build_recipe(&quotes)?;
    let message = recipe.encode()?;
    println!("recipe `{}`: {} actions, {} bytes, hash {}",
             recipe.name(),
             recipe.len(),
             message.len(),
             recipe.recipe_hash()?);

    let ledger = LedgerSubstrate::new(prices).with_collateral(WETH, U256::from(E18))
                                             .with_flash_liquidity(DAI, U256::from(1_000_000 * E18))
                                             .with_oracle_price(DAI, 1)
                                             .with_oracle_price(WETH, 2_000);
    let mut ctx = ExecutionContext::new(ledger, config);
    let outcome = ctx.submit(&message)?;

    match &outcome.failure_reason {
        None => println!("committed: fingerprint {}", outcome.fingerprint.as_deref().unwrap_or("-")),
        Some(reason) => println!("reverted: {reason}"),
    }
    for event in ctx.events() {
        println!("  #{} {}", event.seq, serde_json::to_string(&event.kind).unwrap_or_default());
    }
    let state = ctx.substrate().state();
    println!("collateral WETH = {}, debt DAI = {}", state.collateral_of(WETH), state.debt_of(DAI));
    Ok(())
}
