extern crate criterion;

use criterion::{black_box, measurement::Measurement, BenchmarkGroup, BenchmarkId, Criterion, Throughput};
use pyrastitch::codec::{Codec, CodecOptions, CodecRegistry};
use pyrastitch::{CompressionMethod, PhotometricInterpretation, SampleType};

fn codec_options() -> CodecOptions {
    CodecOptions {
        tile_width: 1,
        tile_height: 1,
        samples_per_pixel: 1,
        bits_per_sample: 8,
        sample_type: SampleType::U8,
        little_endian: true,
        interleaved: true,
        ycbcr: false,
        photometric: PhotometricInterpretation::BlackIsZero,
        quality: None,
        jpeg_tables: None,
    }
}

fn lzw_round_trip(data: &[u8]) {
    let registry = CodecRegistry::with_defaults();
    let opts = codec_options();
    let lzw = registry
        .get(CompressionMethod::LZW.to_u16())
        .expect("lzw codec registered by default");
    let encoded = lzw.encode(black_box(data), &opts).unwrap();
    let _decoded = lzw.decode(&encoded, &opts).unwrap();
}

fn main() {
    struct BenchDef {
        data: Vec<u8>,
        id: &'static str,
        sample_size: usize,
    }

    fn run_bench_def<M: Measurement>(group: &mut BenchmarkGroup<M>, def: BenchDef) {
        group
            .sample_size(def.sample_size)
            .throughput(Throughput::Bytes(def.data.len() as u64))
            .bench_with_input(BenchmarkId::new(def.id, def.data.len()), &def.data, |b, input| {
                b.iter(|| lzw_round_trip(input))
            });
    }

    let mut c = Criterion::default().configure_from_args();
    let mut group = c.benchmark_group("lzw");

    run_bench_def(
        &mut group,
        BenchDef {
            data: (0..1usize << 16).map(|i| (i % 7) as u8).collect(),
            id: "repetitive-64k",
            sample_size: 50,
        },
    );

    run_bench_def(
        &mut group,
        BenchDef {
            data: (0..1usize << 18).map(|i| ((i * 37) % 251) as u8).collect(),
            id: "noisy-256k",
            sample_size: 20,
        },
    );

    group.finish();
    c.final_summary();
}
