use criterion::{black_box, criterion_group, criterion_main, Criterion};

use platescale::fits::Header;
use platescale::horizon::HorizonFrame;
use platescale::observer::Site;
use platescale::time::parse_time;
use platescale::wcs::WcsSolution;

/// TAN-SIP solution of a 512 × 512 all-sky-ish camera.
fn solution() -> WcsSolution {
    let mut h = Header::new();
    h.set_str("CTYPE1", "RA---TAN-SIP");
    h.set_str("CTYPE2", "DEC--TAN-SIP");
    h.set_f64("CRPIX1", 256.5);
    h.set_f64("CRPIX2", 256.5);
    h.set_f64("CRVAL1", 280.0);
    h.set_f64("CRVAL2", 45.0);
    h.set_f64("CD1_1", -0.05);
    h.set_f64("CD1_2", 0.001);
    h.set_f64("CD2_1", 0.001);
    h.set_f64("CD2_2", 0.05);
    h.set_i64("A_ORDER", 2);
    h.set_i64("B_ORDER", 2);
    h.set_f64("A_2_0", 1e-6);
    h.set_f64("B_0_2", -1e-6);
    h.set_i64("AP_ORDER", 2);
    h.set_i64("BP_ORDER", 2);
    h.set_f64("AP_2_0", -1e-6);
    h.set_f64("BP_0_2", 1e-6);
    WcsSolution::from_header(&h, 512, 512, "bench").expect("valid solution")
}

fn bench_pixel_grid(c: &mut Criterion) {
    let wcs = solution();
    c.bench_function("pixel_grid 512x512", |b| {
        b.iter(|| wcs.pixel_grid(black_box(512), black_box(512)))
    });
}

fn bench_radec_to_azel(c: &mut Criterion) {
    let (ra, dec) = solution().pixel_grid(512, 512);
    let site = Site::new(65.1, -147.5, 200.0, None).expect("valid site");
    let time = parse_time("2013-04-14T08:30:12").expect("valid time");
    let frame = HorizonFrame::new(&site, time, None);

    c.bench_function("radec_grid_to_azel 512x512", |b| {
        b.iter(|| frame.radec_grid_to_azel(black_box(&ra), black_box(&dec)))
    });
}

criterion_group!(benches, bench_pixel_grid, bench_radec_to_azel);
criterion_main!(benches);
