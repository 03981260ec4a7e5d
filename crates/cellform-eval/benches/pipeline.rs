use criterion::{Criterion, black_box, criterion_group, criterion_main};

use cellform_eval::{
    CellValue, FormulaEngine, FunctionRegistry, SheetSnapshot, build_ast, tokenize,
};

const FORMULAS: &[&str] = &[
    "=1+2*3-4/5",
    "=SUM(A1:D4)*2+MAX(B1,B2,10)",
    "=IF(SUM(A1:A4)>10,CONCATENATE(\"big:\",B1),IFERROR(1/0,\"small\"))",
    "=-2^2+50%*ROUND(1.2345,2)",
];

fn snapshot() -> SheetSnapshot {
    let mut snap = SheetSnapshot::new().with_sheet("Sheet1", 16, 16);
    for row in 1..=4u32 {
        for col in 1..=4u32 {
            snap = snap.with_cell("Sheet1", row, col, CellValue::Int((row * col) as i64));
        }
    }
    snap
}

fn bench_tokenize(c: &mut Criterion) {
    c.bench_function("tokenize", |b| {
        b.iter(|| {
            for f in FORMULAS {
                black_box(tokenize(black_box(f)).unwrap());
            }
        })
    });
}

fn bench_build(c: &mut Criterion) {
    let registry = FunctionRegistry::with_builtins();
    let trees: Vec<_> = FORMULAS.iter().map(|f| tokenize(f).unwrap()).collect();
    c.bench_function("build_ast", |b| {
        b.iter(|| {
            for tree in &trees {
                black_box(build_ast(black_box(tree), &registry).unwrap());
            }
        })
    });
}

fn bench_evaluate(c: &mut Criterion) {
    let engine = FormulaEngine::new().with_snapshot(snapshot());
    let asts: Vec<_> = FORMULAS.iter().map(|f| engine.parse(f).unwrap()).collect();
    c.bench_function("evaluate", |b| {
        b.iter(|| {
            for ast in &asts {
                black_box(engine.evaluate_ast(black_box(ast)).settle());
            }
        })
    });
}

fn bench_end_to_end(c: &mut Criterion) {
    let engine = FormulaEngine::new().with_snapshot(snapshot());
    c.bench_function("end_to_end", |b| {
        b.iter(|| {
            for f in FORMULAS {
                black_box(engine.evaluate(black_box(f)).unwrap().settle());
            }
        })
    });
}

criterion_group!(
    benches,
    bench_tokenize,
    bench_build,
    bench_evaluate,
    bench_end_to_end
);
criterion_main!(benches);
