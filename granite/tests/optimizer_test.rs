use granite::optimizer::{IntHistogram, IO_COST_PER_PAGE};
use rand::Rng;
use substrate::field::{CmpOp, Field};

mod common;

use common::{int_desc, int_row};

#[test]
fn uniform_histogram_estimates_half_above_the_median() {
    let mut hist = IntHistogram::new(10, 1, 100);
    let mut rng = rand::thread_rng();
    for _ in 0..10_000 {
        hist.add_value(rng.gen_range(1..=100));
    }
    let sel = hist.estimate_selectivity(CmpOp::Gt, 50);
    assert!((0.45..=0.55).contains(&sel), "got {}", sel);
}

#[test]
fn table_stats_count_tuples_and_pages() {
    let fx = common::setup();
    let table = fx.create_table("t", int_desc(&["a", "b"]));

    let tx = fx.db.begin();
    fx.insert_rows(
        tx,
        table,
        (0..600).map(|v| int_row(&[v, v * 2])).collect::<Vec<_>>(),
    );
    fx.db.commit(tx).unwrap();

    let stats = fx.db.table_stats(table, IO_COST_PER_PAGE).unwrap();
    assert_eq!(stats.total_tuples(), 600);
    // 600 eight-byte tuples spill onto a second page
    assert_eq!(stats.estimate_scan_cost(), 2.0 * IO_COST_PER_PAGE * 2.0);
    assert_eq!(stats.estimate_table_cardinality(0.5), 300);
    assert_eq!(stats.estimate_table_cardinality(1.0), 600);
}

#[test]
fn table_stats_selectivity_tracks_the_data() {
    let fx = common::setup();
    let table = fx.create_table("t", int_desc(&["a", "b"]));

    let tx = fx.db.begin();
    fx.insert_rows(
        tx,
        table,
        (1..=100).map(|v| int_row(&[v, 0])).collect::<Vec<_>>(),
    );
    fx.db.commit(tx).unwrap();

    let stats = fx.db.table_stats(table, IO_COST_PER_PAGE).unwrap();
    let gt_half = stats.estimate_selectivity(0, CmpOp::Gt, &Field::Int(50));
    assert!((0.4..=0.6).contains(&gt_half), "got {}", gt_half);

    let none = stats.estimate_selectivity(0, CmpOp::Gt, &Field::Int(100));
    assert_eq!(none, 0.0);

    let all = stats.estimate_selectivity(0, CmpOp::Gt, &Field::Int(0));
    assert_eq!(all, 1.0);

    // column b holds a single value
    let b_eq = stats.estimate_selectivity(1, CmpOp::Eq, &Field::Int(0));
    assert!(b_eq > 0.9, "got {}", b_eq);
}

#[test]
fn stats_are_cached_per_context_until_invalidated() {
    let fx = common::setup();
    let table = fx.create_table("t", int_desc(&["a"]));

    let tx = fx.db.begin();
    fx.insert_rows(tx, table, vec![int_row(&[1])]);
    fx.db.commit(tx).unwrap();

    let first = fx.db.table_stats(table, IO_COST_PER_PAGE).unwrap();
    let second = fx.db.table_stats(table, IO_COST_PER_PAGE).unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));

    let tx = fx.db.begin();
    fx.insert_rows(tx, table, vec![int_row(&[2])]);
    fx.db.commit(tx).unwrap();

    fx.db.invalidate_stats(table);
    let third = fx.db.table_stats(table, IO_COST_PER_PAGE).unwrap();
    assert_eq!(third.total_tuples(), 2);
}

#[test]
fn avg_selectivity_is_positive_for_populated_columns() {
    let fx = common::setup();
    let table = fx.create_table("t", int_desc(&["a"]));

    let tx = fx.db.begin();
    fx.insert_rows(tx, table, (0..50).map(|v| int_row(&[v])).collect::<Vec<_>>());
    fx.db.commit(tx).unwrap();

    let stats = fx.db.table_stats(table, IO_COST_PER_PAGE).unwrap();
    let avg = stats.avg_selectivity(0, CmpOp::Eq);
    assert!(avg > 0.0);
    assert!(avg <= 1.0);
}
