//! Benchmarks for the degradation and level-measurement pipeline

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use specdegrade::asl::{active_speech_level, Prefilter};
use specdegrade::degrade::{apply_spectral_subtraction, DegradeConfig};
use specdegrade::ltass::LtassModel;
use specdegrade::stft::{fft_frequencies, forward, WindowType};
use specdegrade::AslOptions;

fn test_signal(fs: u32, seconds: f32) -> Vec<f32> {
    let n = (fs as f32 * seconds) as usize;
    (0..n)
        .map(|i| {
            let t = i as f32 / fs as f32;
            if (t % 1.0) < 0.6 {
                let w = 2.0 * std::f32::consts::PI * t;
                ((220.0 * w).sin() + 0.5 * (870.0 * w).sin()) * 0.1
            } else {
                0.0
            }
        })
        .collect()
}

fn bench_stft(c: &mut Criterion) {
    let fs = 48_000u32;
    let signal = test_signal(fs, 1.0);

    c.bench_function("stft_2048", |b| {
        b.iter(|| forward(black_box(&signal), 2048, 512, WindowType::Hann, true))
    });

    c.bench_function("stft_8192", |b| {
        b.iter(|| forward(black_box(&signal), 8192, 2048, WindowType::Hann, true))
    });
}

fn bench_ltass(c: &mut Criterion) {
    let freqs = fft_frequencies(48_000, 8192);

    c.bench_function("ltass_reference_filter", |b| {
        b.iter(|| LtassModel::ReferenceFilter.levels(black_box(&freqs)))
    });

    c.bench_function("ltass_polynomial", |b| {
        b.iter(|| LtassModel::Polynomial.levels(black_box(&freqs)))
    });
}

fn bench_degrade(c: &mut Criterion) {
    let fs = 48_000u32;
    let signal = test_signal(fs, 2.0);
    let config = DegradeConfig {
        n_fft: 2048,
        ..DegradeConfig::default()
    };

    c.bench_function("degrade_2s_48k", |b| {
        b.iter(|| {
            let mut rng = StdRng::seed_from_u64(1);
            apply_spectral_subtraction(
                black_box(&signal),
                fs,
                -26.0,
                10.0,
                black_box(&config),
                &mut rng,
            )
        })
    });
}

fn bench_asl(c: &mut Criterion) {
    let fs = 48_000u32;
    let signal = test_signal(fs, 5.0);
    let opts = AslOptions::default();

    c.bench_function("asl_5s_48k", |b| {
        b.iter(|| active_speech_level(black_box(&signal), fs, black_box(&opts)))
    });

    c.bench_function("prefilter_design_narrowband", |b| {
        b.iter(|| Prefilter::Narrowband.design(black_box(48_000)))
    });
}

criterion_group!(benches, bench_stft, bench_ltass, bench_degrade, bench_asl);
criterion_main!(benches);
