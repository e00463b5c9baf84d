#![no_main]

use benchtrend::ancestry::OrderKey;
use benchtrend::regression::{RollingDistributionEngine, SeriesPoint};
use libfuzzer_sys::fuzz_target;

// Each 10-byte chunk is one point: lineage, commit timestamp, value bits
// (NaN and infinities included), marker flag.
fuzz_target!(|data: &[u8]| {
    let Some((&window, rest)) = data.split_first() else {
        return;
    };

    let points: Vec<SeriesPoint> = rest
        .chunks_exact(10)
        .enumerate()
        .map(|(i, chunk)| {
            let ts = i64::from(chunk[0] & 0x3f);
            let mut bits = [0u8; 8];
            bits.copy_from_slice(&chunk[1..9]);
            SeriesPoint {
                id: format!("p{i}"),
                commit_sha: format!("c{ts}"),
                order_key: if chunk[0] & 0x40 == 0 {
                    OrderKey::default_branch(ts)
                } else {
                    OrderKey::branch(ts)
                },
                timestamp: i as i64,
                value: f64::from_le_bytes(bits),
                begins_distribution_change: chunk[9] & 1 == 1,
            }
        })
        .collect();

    let series = RollingDistributionEngine::new(usize::from(window)).compute(points);
    for pos in 0..series.len() {
        let _ = series.baseline_at(pos);
        let _ = series.incl_window(pos);
    }
    let _ = series.baseline_before(&OrderKey::branch(i64::MAX));
});
