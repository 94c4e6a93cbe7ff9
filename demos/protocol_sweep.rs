//! Example demonstrating threshold sweeps and the protocol presets.

use spatial_eval::{
    evaluate, evaluate_with_curves, sweep, BoundingBox, CurveAccumulator, EvaluationConfig,
    FrameInterval, GeometricObject, Geometry,
};

fn boxed(id: &str, label: &str, x: f64, y: f64, w: f64, h: f64) -> GeometricObject {
    GeometricObject::new(id, label, Geometry::Box(BoundingBox::new(x, y, w, h)))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Threshold Sweep Example ===\n");

    let ground_truths = vec![
        boxed("gt-1", "person", 100.0, 100.0, 60.0, 120.0),
        boxed("gt-2", "person", 220.0, 110.0, 55.0, 115.0),
        boxed("gt-3", "car", 400.0, 200.0, 150.0, 80.0),
    ];
    let predictions = vec![
        boxed("pred-1", "person", 104.0, 96.0, 60.0, 122.0).with_confidence(0.96),
        boxed("pred-2", "person", 230.0, 118.0, 52.0, 110.0).with_confidence(0.83),
        boxed("pred-3", "car", 395.0, 205.0, 152.0, 78.0).with_confidence(0.91),
        boxed("pred-4", "person", 600.0, 400.0, 50.0, 100.0).with_confidence(0.35),
    ];

    // Example 1: COCO-style sweep
    println!("1. COCO Sweep (IoU 0.50:0.05:0.95)");
    let outcome = evaluate_with_curves(&ground_truths, &predictions, &EvaluationConfig::coco())?;
    println!("   mAP: {:.4}", outcome.curves.map);
    for curve in &outcome.curves.curves {
        println!("   ├─ {} AP: {:.4} ({} ground truths)", curve.label, curve.ap, curve.num_gt);
    }
    let matched = outcome.records.iter().filter(|r| r.is_true_positive()).count();
    println!("   └─ {} of {} predictions matched at IoU 0.5", matched, predictions.len());
    println!();

    // Example 2: Per-threshold match counts
    println!("2. Matches per Swept Threshold");
    let config = EvaluationConfig::coco();
    let per_threshold = sweep(&ground_truths, &predictions, &config)?;
    println!("   IoU  | matches");
    println!("   -----|--------");
    for (threshold, records) in config.iou_thresholds.iter().zip(per_threshold.iter()) {
        let matches = records.iter().filter(|r| r.is_match()).count();
        println!("   {:.2} | {}", threshold, matches);
    }
    println!();

    // Example 3: Protocol presets on the same scene
    println!("3. Protocol Presets");
    let standard = evaluate(&ground_truths, &predictions, &EvaluationConfig::coco())?;
    let strict = evaluate(&ground_truths, &predictions, &EvaluationConfig::open_images())?;
    println!(
        "   COCO matches: {}, Open Images matches: {}",
        standard.iter().filter(|r| r.is_match()).count(),
        strict.iter().filter(|r| r.is_match()).count(),
    );
    println!();

    // Example 4: Temporal intervals
    println!("4. ActivityNet Intervals");
    let segments = vec![GeometricObject::new(
        "seg-1",
        "dribbling",
        Geometry::Interval(FrameInterval::new(120.0, 480.0)),
    )];
    let detected = vec![GeometricObject::new(
        "det-1",
        "dribbling",
        Geometry::Interval(FrameInterval::new(150.0, 470.0)),
    )
    .with_confidence(0.88)];
    let records = evaluate(&segments, &detected, &EvaluationConfig::activity_net())?;
    println!("   temporal IoU: {:.4}", records[0].iou.unwrap_or(0.0));
    println!();

    // Example 5: Streaming accumulation over many samples
    println!("5. Streaming Accumulation");
    let mut accumulator = CurveAccumulator::new(&config)?;
    for shift in [0.0, 2.0, 8.0] {
        let sample_preds: Vec<GeometricObject> = predictions
            .iter()
            .map(|p| {
                let Geometry::Box(b) = &p.geometry else { unreachable!() };
                boxed(&p.id, &p.label, b.x + shift, b.y, b.width, b.height)
                    .with_confidence(p.confidence.unwrap_or(0.5))
            })
            .collect();
        accumulator.add_sample(&sweep(&ground_truths, &sample_preds, &config)?)?;
    }
    let curves = accumulator.finalize();
    println!("   mAP over three samples: {:.4}", curves.map);
    println!();

    println!("=== Example Complete ===");

    Ok(())
}
