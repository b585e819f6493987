//! End-to-end scenarios, one per testable property in `SPEC_FULL.md` §8.

use std::sync::Arc;

use sheetql::{
    Aggregation, BinaryOp, Column, Data, Expression, Function, Job, Raster, SqlData,
    SqlExecutor, SqliteDialect, Stream, VecStream,
};
use sheetql_parser::{Locale, Value};

fn columns(names: &[&str]) -> Vec<Column> {
    names.iter().map(|n| Column::new(*n)).collect()
}

// S1 — calculate a new column.
#[test]
fn s1_calculate_adds_a_column() {
    let raster = Raster::new(
        columns(&["Name", "A", "B"]),
        vec![
            vec![Value::string("x"), Value::Int(2), Value::Int(3)],
            vec![Value::string("y"), Value::Int(5), Value::Int(7)],
        ],
    );
    let job = Job::new();
    let data = Data::from_raster(raster).calculate(vec![(
        Column::new("Sum"),
        Expression::binary(BinaryOp::Add, Expression::sibling("A"), Expression::sibling("B")),
    )]);
    let out = data.materialize(&job).unwrap();

    assert_eq!(out.columns(), columns(&["Name", "A", "B", "Sum"]).as_slice());
    assert_eq!(out.get(0, 3), Value::Int(5));
    assert_eq!(out.get(1, 3), Value::Int(12));
}

// S2 — aggregate by group.
#[test]
fn s2_aggregate_sums_by_group() {
    let raster = Raster::new(
        columns(&["City", "Amount"]),
        vec![
            vec![Value::string("A"), Value::Int(1)],
            vec![Value::string("B"), Value::Int(2)],
            vec![Value::string("A"), Value::Int(3)],
            vec![Value::string("B"), Value::Int(4)],
        ],
    );
    let job = Job::new();
    let data = Data::from_raster(raster)
        .aggregate(
            vec![(Column::new("City"), Expression::sibling("City"))],
            vec![Aggregation::new(
                Column::new("Total"),
                Expression::sibling("Amount"),
                Function::Sum,
            )],
            &job,
        )
        .unwrap();
    let out = data.materialize(&job).unwrap();

    let totals: Vec<(String, Value)> = out
        .rows()
        .iter()
        .map(|r| (r[0].to_string(), r[1].clone()))
        .collect();
    assert!(totals.contains(&("A".to_string(), Value::Double(4.0))));
    assert!(totals.contains(&("B".to_string(), Value::Double(6.0))));
}

// S3 — pivot.
#[test]
fn s3_pivot_spreads_region_into_columns() {
    let raster = Raster::new(
        columns(&["Year", "Region", "Sales"]),
        vec![
            vec![Value::Int(2020), Value::string("N"), Value::Int(10)],
            vec![Value::Int(2020), Value::string("S"), Value::Int(20)],
            vec![Value::Int(2021), Value::string("N"), Value::Int(30)],
        ],
    );
    let job = Job::new();
    let data = Data::from_raster(raster)
        .pivot(
            vec![Column::new("Region")],
            vec![Column::new("Year")],
            vec![Column::new("Sales")],
            &job,
        )
        .unwrap();
    let out = data.materialize(&job).unwrap();

    assert_eq!(out.columns(), columns(&["Year", "N_Sales", "S_Sales"]).as_slice());
    assert_eq!(out.get(0, 0), Value::Int(2020));
    assert_eq!(out.get(0, 1), Value::Int(10));
    assert_eq!(out.get(0, 2), Value::Int(20));
    assert_eq!(out.get(1, 0), Value::Int(2021));
    assert_eq!(out.get(1, 1), Value::Int(30));
    assert_eq!(out.get(1, 2), Value::Invalid);
}

// S4 — formula parse and evaluate, with a non-default locale.
#[test]
fn s4_parses_and_evaluates_with_custom_argument_separator() {
    let locale = Locale {
        argument_separator: ';',
        ..Locale::english()
    };
    let columns = columns(&["Name"]);
    let row = vec![Value::string("ada")];

    let concat = sheetql_parser::parse(r#"=UPPER([@Name]) & " " & (1+2)"#, &locale).unwrap();
    assert_eq!(concat.apply(&row, &columns, None), Value::string("ADA 3"));

    let mid = sheetql_parser::parse("=MID([@Name];1;3)", &locale).unwrap();
    assert_eq!(mid.apply(&row, &columns, None), Value::string("ada"));
}

struct FixedExecutor {
    raster: Raster,
}

impl SqlExecutor for FixedExecutor {
    fn execute(&self, _sql: &SqlData) -> Box<dyn Stream> {
        Box::new(VecStream::new(self.raster.columns().to_vec(), self.raster.rows().to_vec()))
    }
}

// S5 — SQL push-down fallback: an unlowerable function falls back to the
// stream path and produces the same result as the reference raster path.
#[test]
fn s5_unlowerable_function_falls_back_and_matches_reference() {
    let source = Raster::new(
        columns(&["A"]),
        vec![vec![Value::string("box")], vec![Value::string("fox")]],
    );
    let job = Job::new();

    let target = Expression::call(
        Function::RegexSubstitute,
        vec![
            Expression::sibling("A"),
            Expression::literal("x"),
            Expression::literal("y"),
        ],
    );

    let executor: Arc<dyn SqlExecutor> = Arc::new(FixedExecutor { raster: source.clone() });
    let dialect = Arc::new(SqliteDialect);
    let sql = SqlData::from_table("input", columns(&["A"]), dialect);
    let pushed = Data::from_sql(sql, executor).calculate(vec![(Column::new("C"), target.clone())]);
    let pushed_out = pushed.materialize(&job).unwrap();

    let reference = Data::from_raster(source).calculate(vec![(Column::new("C"), target)]);
    let reference_out = reference.materialize(&job).unwrap();

    assert!(pushed_out.compare(&reference_out));
}

// S6 — cancellation: a cancelled future delivers no final callback.
#[test]
fn s6_cancel_suppresses_delayed_delivery() {
    use sheetql::Future;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Barrier;

    let delivered = Arc::new(AtomicBool::new(false));
    let started = Arc::new(Barrier::new(2));

    let delivered2 = delivered.clone();
    let started2 = started.clone();
    let future = Future::new(move |job, satisfy| {
        started2.wait();
        while !job.cancelled() {
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        // cancelled: a well-behaved producer stops without delivering.
        let _ = satisfy;
    });

    let job = future.get(Box::new(move |_| {
        delivered2.store(true, Ordering::SeqCst);
    }));
    started.wait();
    job.cancel();
    future.cancel();

    std::thread::sleep(std::time::Duration::from_millis(50));
    assert!(!delivered.load(Ordering::SeqCst));
}

// S6 — expiry only flags the job; a producer that satisfies anyway still
// reaches waiters registered before the expiry fired.
#[test]
fn s6_expire_still_allows_a_late_satisfy() {
    use sheetql::Future;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    let delivered = Arc::new(AtomicBool::new(false));
    let delivered2 = delivered.clone();

    let future = Future::new(move |_job, satisfy| {
        std::thread::sleep(Duration::from_millis(30));
        satisfy(42i64);
    })
    .with_time_limit(Duration::from_millis(5));

    future.get(Box::new(move |v| {
        assert_eq!(v, 42);
        delivered2.store(true, Ordering::SeqCst);
    }));

    std::thread::sleep(Duration::from_millis(60));
    assert!(delivered.load(Ordering::SeqCst));
}
