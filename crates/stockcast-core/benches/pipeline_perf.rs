//! Performance benchmark for the full pipeline over synthetic SKU catalogues
//!
//! Run with: cargo bench --bench pipeline_perf

use stockcast_core::{
    adjust_outliers, classify_abc, classify_all, forecast_all, run_pipeline, ConsumptionRecord,
    PipelineConfig, ReferenceData, YearMonth,
};
use std::time::{Duration, Instant};

fn generate_records(n_skus: usize, n_months: u32) -> Vec<ConsumptionRecord> {
    let start = YearMonth::new(2021, 1).expect("valid month");
    let warehouses = ["MACROS", "MICROS"];
    let mut records = Vec::with_capacity(n_skus * n_months as usize);
    for s in 0..n_skus {
        let base = 20.0 + (s % 17) as f64 * 5.0;
        for m in 0..n_months {
            let seasonal = 0.3 * base * (2.0 * std::f64::consts::PI * m as f64 / 12.0).sin();
            let trend = 0.05 * (s % 5) as f64 * m as f64;
            let noise = ((s * 31 + m as usize * 7) % 11) as f64 * 0.4;
            records.push(ConsumptionRecord::new(
                format!("SKU{:05}", s),
                warehouses[s % warehouses.len()],
                start.add_months(m),
                (base + seasonal + trend + noise).max(0.0),
            ));
        }
    }
    records
}

fn benchmark_fn<F, R>(name: &str, iterations: usize, mut f: F) -> Duration
where
    F: FnMut() -> R,
{
    // Warmup
    let _ = f();

    let start = Instant::now();
    for _ in 0..iterations {
        let _ = std::hint::black_box(f());
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "{}: total={:?}, per_iter={:?}, iters={}",
        name, elapsed, per_iter, iterations
    );
    elapsed
}

fn main() {
    // RUST_LOG=warn keeps per-stage events out of the timings
    stockcast_core::logging::init();
    println!("=== Pipeline Performance Benchmark ===\n");

    let config = PipelineConfig::default();
    let reference = ReferenceData::default();

    for &n_skus in &[10, 100, 500] {
        let records = generate_records(n_skus, 36);
        let iters = if n_skus <= 100 { 5 } else { 1 };
        println!("--- {} SKUs x 36 months ---", n_skus);

        benchmark_fn("adjust_outliers", iters * 10, || {
            adjust_outliers(&records, config.iqr_multiplier)
        });

        let adjusted = adjust_outliers(&records, config.iqr_multiplier);
        benchmark_fn("classify_all", iters * 10, || classify_all(&adjusted, &config));
        benchmark_fn("classify_abc", iters * 10, || classify_abc(&adjusted));
        benchmark_fn("forecast_all", iters, || forecast_all(&records, &config));
        benchmark_fn("run_pipeline", iters, || {
            run_pipeline(&records, &reference, &config)
        });
        println!();
    }

    println!("=== Benchmark Complete ===");
}
