use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dexgen::lens::NoKeep;
use dexgen::options::WriterOptions;
use dexgen::program::{DexClass, DexCode, DexProgram, EncodedMethod, PoolBuilder};
use dexgen::writer::{DexWriter, HeapBufferProvider};

fn synthetic_program(class_count: usize, methods_per_class: usize) -> DexProgram {
    let mut builder = PoolBuilder::new();
    let descriptors: Vec<String> = (0..class_count)
        .map(|index| format!("Lbench/Class{:04};", index))
        .collect();
    for descriptor in &descriptors {
        for method in 0..methods_per_class {
            builder.add_method(descriptor, &format!("method{}", method), &["I"], "V");
        }
    }
    let mut program = builder.build();
    for descriptor in &descriptors {
        let mut class = DexClass::new(program.type_index(descriptor).unwrap(), 1);
        for method in 0..methods_per_class {
            let method_idx = program
                .find_method(descriptor, &format!("method{}", method))
                .unwrap();
            let code = DexCode {
                registers_size: 2,
                ins_size: 2,
                outs_size: 0,
                insns: vec![0x000e],
                tries: Vec::new(),
                handlers: Vec::new(),
                debug_info: None,
            };
            class
                .virtual_methods
                .push(EncodedMethod::new(method_idx, 1, Some(code)));
        }
        program.add_class(class);
    }
    program
}

fn generate_small_program(c: &mut Criterion) {
    let program = synthetic_program(16, 4);
    let provider = HeapBufferProvider::new();
    c.bench_function("generate_small_program", |b| {
        b.iter(|| {
            let mut keep = NoKeep;
            let (bytes, length) = DexWriter::new(&program, WriterOptions::for_api(26))
                .generate(&provider, &mut keep)
                .unwrap();
            black_box((bytes, length));
        })
    });
}

fn generate_large_program(c: &mut Criterion) {
    let program = synthetic_program(256, 16);
    let provider = HeapBufferProvider::new();
    c.bench_function("generate_large_program", |b| {
        b.iter(|| {
            let mut keep = NoKeep;
            let (bytes, length) = DexWriter::new(&program, WriterOptions::for_api(26))
                .generate(&provider, &mut keep)
                .unwrap();
            black_box((bytes, length));
        })
    });
}

criterion_group!(benches, generate_small_program, generate_large_program);
criterion_main!(benches);
