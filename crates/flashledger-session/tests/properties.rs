//! Randomized checks over seeded operation sequences.
//!
//! Every trial is reproducible from its seed. The checks:
//! - the nonzero counter always equals the number of nonzero rows
//! - a reverted nested call leaves the enclosing balances untouched
//! - a failed session leaves the ledger, the lock and the vault exactly
//!   as they were before it started

use std::panic::{self, AssertUnwindSafe};

use flashledger_session::{CallbackDispatcher, InMemoryVault, Session};
use flashledger_types::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const ASSETS: [&str; 4] = ["USD", "EUR", "GBP", "JPY"];
const TRIALS: u64 = 200;
const RESERVE: Delta = 1_000_000_000_000;

fn dispatcher() -> CallbackDispatcher<InMemoryVault> {
    let mut vault = InMemoryVault::new();
    for asset in ASSETS {
        vault.fund(asset, RESERVE);
    }
    CallbackDispatcher::new(vault)
}

fn pick_asset(rng: &mut StdRng) -> AssetId {
    AssetId::from(ASSETS[rng.gen_range(0..ASSETS.len())])
}

fn balances(s: &Session<'_, InMemoryVault>) -> Vec<Delta> {
    ASSETS.iter().map(|a| s.read(&AssetId::from(*a))).collect()
}

fn assert_counter_consistent(s: &Session<'_, InMemoryVault>) {
    let rows = balances(s).into_iter().filter(|d| *d != 0).count();
    assert_eq!(s.nonzero_count(), rows);
    assert_eq!(s.is_fully_settled(), rows == 0);
}

/// Apply `steps` random operations, occasionally nesting a savepoint that
/// fails half the time.
fn random_ops(
    s: &mut Session<'_, InMemoryVault>,
    rng: &mut StdRng,
    steps: usize,
    nesting: usize,
) -> Result<()> {
    for _ in 0..steps {
        let asset = pick_asset(rng);
        let amount: Delta = rng.gen_range(-1_000..=1_000);
        match rng.gen_range(0..10) {
            0..=4 => {
                s.adjust(&asset, amount)?;
            }
            5 | 6 => {
                s.settle(&asset, amount.abs())?;
            }
            7 => {
                let recipient = AccountId::fixture(rng.gen_range(1..=8));
                s.take(&asset, amount.abs(), recipient)?;
            }
            _ if nesting > 0 => {
                let before = balances(s);
                let fail = rng.gen_bool(0.5);
                let inner_steps = rng.gen_range(1..6);
                let result = s.call(|inner| {
                    random_ops(inner, &mut *rng, inner_steps, nesting - 1)?;
                    if fail {
                        Err(FlashError::callback("leg failed"))
                    } else {
                        Ok(())
                    }
                });
                if result.is_err() {
                    assert_eq!(balances(s), before, "reverted call leaked state");
                }
            }
            _ => {}
        }
        assert_counter_consistent(s);
    }
    Ok(())
}

/// Pay in every debt and pay out every credit.
fn settle_all(s: &mut Session<'_, InMemoryVault>, recipient: AccountId) -> Result<()> {
    for asset in ASSETS.map(AssetId::from) {
        let delta = s.read(&asset);
        if delta > 0 {
            s.settle(&asset, delta)?;
        } else if delta < 0 {
            s.take(&asset, -delta, recipient)?;
        }
    }
    assert_counter_consistent(s);
    Ok(())
}

#[test]
fn settled_sessions_always_close() {
    let mut d = dispatcher();
    for trial in 0..TRIALS {
        let mut rng = StdRng::seed_from_u64(0x5EED_0000 + trial);
        let steps = rng.gen_range(1..40);
        let payee = AccountId::fixture(0xEE);

        d.run(|s| {
            random_ops(s, &mut rng, steps, 3)?;
            settle_all(s, payee)
        })
        .unwrap_or_else(|err| panic!("trial {trial}: {err}"));

        assert!(d.ledger().is_fully_settled(), "trial {trial}");
        assert_eq!(d.ledger().nonzero_count(), 0);
        assert_eq!(d.ledger().journal_len(), 0);
        assert_eq!(d.phase(), SessionPhase::Idle);
    }
}

#[test]
fn failed_sessions_leave_no_trace() {
    let mut d = dispatcher();
    for trial in 0..TRIALS {
        let mut rng = StdRng::seed_from_u64(0xFA11_0000 + trial);
        let steps = rng.gen_range(1..40);
        let unsettled = rng.gen_bool(0.5);

        let digest = d.ledger().digest();
        let vault = d.collaborator().clone();

        let err = d
            .run(|s| {
                random_ops(s, &mut rng, steps, 3)?;
                if unsettled {
                    settle_all(s, AccountId::fixture(0xEE))?;
                    s.adjust(&AssetId::from("USD"), 1)?;
                    Ok(())
                } else {
                    Err(FlashError::callback("abandoned"))
                }
            })
            .unwrap_err();

        let expected = if unsettled {
            ErrorKind::UnsettledSession
        } else {
            ErrorKind::Callback
        };
        assert_eq!(err.kind(), expected, "trial {trial}");
        assert_eq!(d.ledger().digest(), digest, "trial {trial}: ledger changed");
        assert_eq!(d.collaborator(), &vault, "trial {trial}: vault changed");
        assert_eq!(d.phase(), SessionPhase::Idle);
    }
}

#[test]
fn panicking_sessions_leave_no_trace() {
    let mut d = dispatcher();
    let mut rng = StdRng::seed_from_u64(0xDEAD);
    let vault = d.collaborator().clone();

    let caught = panic::catch_unwind(AssertUnwindSafe(|| {
        d.run(|s| -> Result<()> {
            random_ops(s, &mut rng, 30, 2)?;
            panic!("participant crashed");
        })
    }));

    assert!(caught.is_err());
    assert!(d.ledger().is_fully_settled());
    assert_eq!(d.collaborator(), &vault);
    assert_eq!(d.phase(), SessionPhase::Idle);

    // The dispatcher is usable afterwards.
    d.run(|s| {
        s.adjust(&AssetId::from("EUR"), 3)?;
        s.settle(&AssetId::from("EUR"), 3)?;
        Ok(())
    })
    .unwrap();
}
