use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use efex::ecode::{self, EcodeKind, StimOverrides, StimParams};

fn bench_interpret_step(c: &mut Criterion) {
    let params = StimParams {
        ton: 500.0,
        toff: 1500.0,
        tend: 3000.0,
        amp: 0.2,
        hypamp: -0.02,
        dt: 0.1,
    };
    let (t, current) = ecode::generate(EcodeKind::Step, &params);
    c.bench_function("interpret step [30k samples]", |b| {
        b.iter(|| {
            ecode::interpret(
                EcodeKind::Step,
                "IDRest",
                black_box(&t),
                Some(black_box(&current)),
                &StimOverrides::default(),
            )
            .unwrap()
        })
    });
}

fn bench_generate_sinespec(c: &mut Criterion) {
    let params = StimParams {
        ton: 150.0,
        toff: 5100.0,
        tend: 5500.0,
        amp: 0.1,
        hypamp: -0.02,
        dt: 0.1,
    };
    c.bench_function("generate sinespec [55k samples]", |b| {
        b.iter(|| ecode::generate(EcodeKind::SineSpec, black_box(&params)))
    });
}

criterion_group!(benches, bench_interpret_step, bench_generate_sinespec);
criterion_main!(benches);
