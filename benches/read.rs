#[macro_use]
extern crate bencher;

extern crate pik;
use pik::prelude::*;

use bencher::Bencher;

fn encoded(params: &CompressParams) -> Vec<u8> {
    let size = Vec2(512, 384);
    let pixels: Vec<u8> = (0 .. size.area() * 3)
        .map(|index| {
            let pixel = index / 3;
            ((pixel % size.width()) / 2 + (pixel / size.width()) / 3 + (index % 3) * 30 + pixel * 31 % 7) as u8
        })
        .collect();

    let image = CodecInOut::from_srgb8(size, &pixels).unwrap();
    pixels_to_pik(params, &image, &WorkerPool::new(0), None).unwrap()
}

/// Single pass, sequential
fn read_single_pass_sequential(bench: &mut Bencher) {
    let bytes = encoded(&CompressParams::default());
    let pool = WorkerPool::sequential();

    bench.iter(||{
        let image = pik_to_pixels(&DecompressParams::default(), &bytes, &pool, None).unwrap();
        bencher::black_box(image);
    })
}

/// Single pass, one thread per cpu
fn read_single_pass_parallel(bench: &mut Bencher) {
    let bytes = encoded(&CompressParams::default());
    let pool = WorkerPool::new(0);

    bench.iter(||{
        let image = pik_to_pixels(&DecompressParams::default(), &bytes, &pool, None).unwrap();
        bencher::black_box(image);
    })
}

/// Only the low frequency pass of a progressive file
fn read_progressive_first_pass(bench: &mut Bencher) {
    let bytes = encoded(&CompressParams::progressive());
    let pool = WorkerPool::new(0);
    let params = DecompressParams::default().with_max_passes(1);

    bench.iter(||{
        let image = pik_to_pixels(&params, &bytes, &pool, None).unwrap();
        bencher::black_box(image);
    })
}

/// The lossless pass of a file
fn read_lossless_parallel(bench: &mut Bencher) {
    let bytes = encoded(&CompressParams::lossless());
    let pool = WorkerPool::new(0);

    bench.iter(||{
        let image = pik_to_pixels(&DecompressParams::default(), &bytes, &pool, None).unwrap();
        bencher::black_box(image);
    })
}

benchmark_group!(read,
    read_single_pass_sequential,
    read_single_pass_parallel,
    read_progressive_first_pass,
    read_lossless_parallel
);

benchmark_main!(read);
