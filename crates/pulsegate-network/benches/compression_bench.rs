//! pulsegate-network 압축 풀 벤치마크
//!
//! 실행: cargo bench -p pulsegate-network
//!
//! 벤치마크 대상:
//! - 알고리즘별 풀 압축 (gzip, zstd)
//! - 풀 재사용 vs 매번 새 압축기 생성

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pulsegate_core::config::CompressionAlgorithm;
use pulsegate_network::compression::{CompressorPool, PayloadCompressor};
use std::hint::black_box;

/// 테스트용 데이터 생성 (데이터포인트 JSON과 비슷한 반복 패턴)
fn create_datapoint_payload(size: usize) -> Vec<u8> {
    let pattern = br#"{"metric":"system.cpu.utilization","value":42.5,"dimensions":{"host_name":"web-01","os_type":"linux"},"timestamp":1700000000000},"#;
    pattern.iter().cycle().take(size).copied().collect()
}

/// 알고리즘별 풀 압축
fn bench_pool_by_algorithm(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_compress");

    let sizes = [2_048, 16_384, 131_072];
    let algorithms = [
        ("gzip", CompressionAlgorithm::Gzip),
        ("zstd", CompressionAlgorithm::Zstd),
    ];

    for (name, algo) in algorithms {
        let pool = CompressorPool::new(algo, 4, 0);
        for size in sizes {
            let data = create_datapoint_payload(size);
            group.throughput(Throughput::Bytes(size as u64));
            group.bench_with_input(
                BenchmarkId::new(name, format!("{}KB", size / 1024)),
                &data,
                |b, data| {
                    b.iter(|| black_box(pool.compress(data.clone()).unwrap()));
                },
            );
        }
    }

    group.finish();
}

/// 풀 재사용 효과 (gzip)
fn bench_pool_vs_fresh(c: &mut Criterion) {
    let mut group = c.benchmark_group("gzip_reuse");
    let data = create_datapoint_payload(4_096);
    group.throughput(Throughput::Bytes(data.len() as u64));

    let pool = CompressorPool::new(CompressionAlgorithm::Gzip, 4, 0);
    group.bench_function("pooled", |b| {
        b.iter(|| {
            let mut guard = pool.acquire().unwrap();
            black_box(guard.compress(&data).unwrap())
        });
    });

    group.bench_function("fresh", |b| {
        b.iter(|| {
            let mut compressor = PayloadCompressor::new(CompressionAlgorithm::Gzip).unwrap();
            black_box(compressor.compress(&data).unwrap())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_pool_by_algorithm, bench_pool_vs_fresh);
criterion_main!(benches);
