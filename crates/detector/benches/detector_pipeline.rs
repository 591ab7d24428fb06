use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use detector::{
    ChannelOrder, Predict,
    predictor::PlaceholderPredictor,
    processing::{
        post::{PostProcessor, TransformParams},
        pre::{Letterbox, PreProcessor},
    },
};
use image::{Rgb, RgbImage};
use ndarray::{Array, IxDyn};

/// Mock YOLO head `[1, 5, candidates]` with `num_detections` confident boxes
/// spread over the input so NMS has real work to do.
fn create_mock_yolo_output(num_candidates: usize, num_detections: usize) -> Array<f32, IxDyn> {
    let mut head = Array::<f32, IxDyn>::zeros(IxDyn(&[1, 5, num_candidates]));
    for i in 0..num_candidates {
        head[[0, 0, i]] = 20.0 + (i % 30) as f32 * 20.0;
        head[[0, 1, i]] = 20.0 + (i / 30 % 30) as f32 * 20.0;
        head[[0, 2, i]] = 32.0;
        head[[0, 3, i]] = 32.0;
        head[[0, 4, i]] = if i < num_detections { 0.9 } else { 0.01 };
    }
    head
}

fn benchmark_preprocessing(c: &mut Criterion) {
    let mut group = c.benchmark_group("preprocessing");

    let resolutions = [(640, 480), (1280, 720), (1920, 1080)];

    for (width, height) in resolutions {
        let image = RgbImage::from_pixel(width, height, Rgb([128, 64, 32]));

        for order in [ChannelOrder::Rgb, ChannelOrder::Bgr] {
            let mut preprocessor = PreProcessor::new(640, order).unwrap();
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}_letterbox", order), format!("{}x{}", width, height)),
                &image,
                |b, image| b.iter(|| preprocessor.preprocess(black_box(image))),
            );
        }
    }

    group.finish();
}

fn benchmark_postprocessing(c: &mut Criterion) {
    let mut group = c.benchmark_group("postprocessing");

    let postprocessor = PostProcessor::new(0.7);
    let transform = TransformParams {
        orig_width: 1280,
        orig_height: 720,
        letterbox: Letterbox {
            scale: 0.5,
            offset_x: 0.0,
            offset_y: 140.0,
        },
    };

    for num_detections in [0, 10, 100, 1000] {
        let head = create_mock_yolo_output(8400, num_detections);
        group.bench_with_input(
            BenchmarkId::new("yolo_decode_nms", num_detections),
            &head,
            |b, head| {
                b.iter(|| postprocessor.parse_detections(black_box(&head.view()), 0.5, &transform))
            },
        );
    }

    group.finish();
}

fn benchmark_placeholder(c: &mut Criterion) {
    let predictor = PlaceholderPredictor::with_seed(1);
    let image = RgbImage::new(1280, 720);

    c.bench_function("placeholder_predict", |b| {
        b.iter(|| predictor.predict(black_box(&image), 0.5))
    });
}

criterion_group!(
    benches,
    benchmark_preprocessing,
    benchmark_postprocessing,
    benchmark_placeholder
);
criterion_main!(benches);
