#[macro_use]
extern crate bencher;

extern crate pik;
use pik::prelude::*;

use bencher::Bencher;

fn test_image() -> CodecInOut {
    let size = Vec2(512, 384);
    let pixels: Vec<u8> = (0 .. size.area() * 3)
        .map(|index| {
            let pixel = index / 3;
            ((pixel % size.width()) / 2 + (pixel / size.width()) / 3 + (index % 3) * 30 + pixel * 31 % 7) as u8
        })
        .collect();

    CodecInOut::from_srgb8(size, &pixels).unwrap()
}

/// Single pass, sequential
fn write_single_pass_sequential(bench: &mut Bencher) {
    let image = test_image();
    let pool = WorkerPool::sequential();

    bench.iter(||{
        let bytes = pixels_to_pik(&CompressParams::default(), &image, &pool, None).unwrap();
        bencher::black_box(bytes);
    })
}

/// Single pass, one thread per cpu
fn write_single_pass_parallel(bench: &mut Bencher) {
    let image = test_image();
    let pool = WorkerPool::new(0);

    bench.iter(||{
        let bytes = pixels_to_pik(&CompressParams::default(), &image, &pool, None).unwrap();
        bencher::black_box(bytes);
    })
}

/// Progressive passes followed by a lossless pass
fn write_progressive_lossless_parallel(bench: &mut Bencher) {
    let image = test_image();
    let pool = WorkerPool::new(0);
    let params = CompressParams::progressive().with_lossless_mode();

    bench.iter(||{
        let bytes = pixels_to_pik(&params, &image, &pool, None).unwrap();
        bencher::black_box(bytes);
    })
}

benchmark_group!(write,
    write_single_pass_sequential,
    write_single_pass_parallel,
    write_progressive_lossless_parallel
);

benchmark_main!(write);
