use bufunpack::*;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

// Representative programs, from a single bare handle to many buffers.

const BARE_HANDLE: &str = r#"
buffer buf: f32, 3
consume(buf)
"#;

const LOOP_NEST: &str = r#"
buffer img: u8, 2
buffer out: u8, 2
for (y, out.min.1, out.extent.1) {
  for (x, out.min.0, out.extent.0) {
    out[((y * out.stride.1) + x)] = img[((y * img.stride.1) + x)]
  }
}
"#;

const BLUR: &str = r#"
buffer input: u8, 1
buffer output: u8, 1
image kernel: i16, 1
param scale: i32
for (x, output.min.0, output.extent.0) {
  let base = (x - input.min.0)
  output[x] = (((input[base] * kernel[0]) + (input[(base + 1)] * kernel[1])) / scale)
}
"#;

fn scenarios() -> [(&'static str, &'static str); 3] {
    [
        ("bare_handle", BARE_HANDLE),
        ("loop_nest", LOOP_NEST),
        ("blur", BLUR),
    ]
}

/// `n` rank-4 buffers, each touching every field.
fn generate_wide_program(n: usize) -> String {
    let mut src = String::new();
    for i in 0..n {
        src.push_str(&format!("buffer b{}: f32, 4\n", i));
    }
    for i in 0..n {
        src.push_str(&format!(
            "use(b{i}.elem_size, b{i}.host_dirty, b{i}.dev_dirty)\n",
            i = i
        ));
        for d in 0..4 {
            src.push_str(&format!(
                "use(b{i}.min.{d}, b{i}.extent.{d}, b{i}.stride.{d})\n",
                i = i,
                d = d
            ));
        }
        src.push_str(&format!("b{i}[0] = b{i}[1]\n", i = i));
    }
    src
}

fn resolve_source(source: &str) -> ir::Program {
    let parse_result = parser::parse(source);
    let file = parse_result.file.expect("benchmark scenario must parse");
    let resolve_result = resolve::resolve(&file);
    assert!(!diag::has_errors(&resolve_result.diagnostics));
    resolve_result.program
}

// Parse + resolve + unpack from source text.
fn bench_full_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_pipeline");

    for (name, source) in scenarios() {
        group.bench_with_input(BenchmarkId::from_parameter(name), source, |b, source| {
            b.iter(|| {
                let program = resolve_source(black_box(source));
                black_box(unpack::unpack_buffers(program.body));
            });
        });
    }

    group.finish();
}

// The pass alone, on already-resolved programs.
fn bench_unpack(c: &mut Criterion) {
    let mut group = c.benchmark_group("unpack");

    for (name, source) in scenarios() {
        let program = resolve_source(source);
        group.bench_function(name, |b| {
            b.iter_batched(
                || program.body.clone(),
                |body| black_box(unpack::unpack_buffers(body)),
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

// Scaling vs number of buffers.
fn bench_unpack_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("unpack_scaling");

    for n in [1_usize, 8, 32, 128] {
        let program = resolve_source(&generate_wide_program(n));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}buffers", n)),
            &program,
            |b, program| {
                b.iter_batched(
                    || program.body.clone(),
                    |body| black_box(unpack::unpack_buffers(body)),
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_full_pipeline,
    bench_unpack,
    bench_unpack_scaling
);
criterion_main!(benches);
