// SPDX-License-Identifier: CC0-1.0

use std::rc::Rc;

use bitcoin::hashes::Hash;
use bitcoin::{Amount, OutPoint, ScriptBuf, Txid, TxOut, Weight};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::mock::StepRng;

use coin_selection::{
    select_coins_bnb, select_coins_knapsack, select_coins_srd, OutputGroup, SelectionParams, Utxo,
};

fn build_group(vout: u32, value: Amount) -> OutputGroup {
    let utxo = Rc::new(Utxo::with_fee(
        OutPoint { txid: Txid::all_zeros(), vout },
        TxOut { value, script_pubkey: ScriptBuf::new() },
        6,
        Some(Weight::from_vb_unwrap(68)),
        true,
        true,
        true,
        0,
        true,
        Amount::ZERO,
        Amount::ZERO,
    ));

    let mut group = OutputGroup::new(&SelectionParams::new());
    group.insert(&utxo, 0, 0);
    group
}

/// A pool of 1,000 coins that do not combine into the target plus one coin that matches
/// when combined with any of the others, forcing branch and bound through its whole node
/// budget.
fn build_pool() -> Vec<OutputGroup> {
    let mut pool: Vec<OutputGroup> =
        (0..1_000).map(|i| build_group(i, Amount::from_sat(1_000))).collect();
    pool.push(build_group(1_000, Amount::from_sat(3)));
    pool
}

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("bnb 1000", |b| {
        let pool = build_pool();
        let target = Amount::from_sat(1_003);
        let cost_of_change = Amount::from_sat(50);

        b.iter(|| {
            let result = select_coins_bnb(
                black_box(&mut pool.clone()),
                black_box(target),
                black_box(cost_of_change),
            )
            .unwrap();
            assert_eq!(result.input_set().len(), 2);
        })
    });

    c.bench_function("srd 1000", |b| {
        let pool = build_pool();
        let target = Amount::from_sat(250_000);

        b.iter(|| {
            let result = select_coins_srd(
                black_box(&pool),
                black_box(target),
                &mut StepRng::new(0, 1),
            )
            .unwrap();
            assert!(result.input_set().len() >= 250);
        })
    });

    c.bench_function("knapsack 1000", |b| {
        let pool = build_pool();
        let target = Amount::from_sat(250_000);

        b.iter(|| {
            let result = select_coins_knapsack(
                black_box(&mut pool.clone()),
                black_box(target),
                black_box(Amount::from_sat(25_000)),
                &mut StepRng::new(0, 1),
            )
            .unwrap();
            assert!(!result.input_set().is_empty());
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
