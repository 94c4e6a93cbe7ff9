//! Basic matching example demonstrating core functionality.

use spatial_eval::{
    evaluate, geometry::box_iou, Average, BoundingBox, ConfusionMatrix, EvaluationConfig,
    GeometricObject, Geometry,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Spatial Matching Example ===\n");

    // Example 1: IoU calculation
    println!("1. Box IoU");
    let a = BoundingBox::new(10.0, 10.0, 50.0, 50.0);
    let b = BoundingBox::new(30.0, 30.0, 50.0, 50.0);
    println!("   IoU between overlapping boxes: {:.4}", box_iou(&a, &b, false));
    println!("   IoU against the same box as a crowd: {:.4}", box_iou(&a, &b, true));
    println!();

    // Example 2: Building objects
    println!("2. Building Objects");
    let ground_truths = vec![
        GeometricObject::new(
            "gt-1",
            "person",
            Geometry::Box(BoundingBox::new(100.0, 100.0, 200.0, 150.0)),
        ),
        GeometricObject::new(
            "gt-2",
            "car",
            Geometry::Box(BoundingBox::new(350.0, 200.0, 100.0, 120.0)),
        ),
    ];
    let predictions = vec![
        GeometricObject::new(
            "pred-1",
            "person",
            Geometry::Box(BoundingBox::new(105.0, 98.0, 195.0, 155.0)),
        )
        .with_confidence(0.95),
        GeometricObject::new(
            "pred-2",
            "car",
            Geometry::Box(BoundingBox::new(348.0, 198.0, 105.0, 125.0)),
        )
        .with_confidence(0.87),
        GeometricObject::new(
            "pred-3",
            "person",
            Geometry::Box(BoundingBox::new(50.0, 50.0, 80.0, 90.0)),
        )
        .with_confidence(0.42),
    ];
    println!("   {} ground truths, {} predictions", ground_truths.len(), predictions.len());
    println!();

    // Example 3: Matching
    println!("3. Greedy Matching at IoU 0.5");
    let records = evaluate(&ground_truths, &predictions, &EvaluationConfig::default())?;
    println!("   gt       | prediction | IoU    | confidence");
    println!("   ---------|------------|--------|-----------");
    for record in &records {
        println!(
            "   {:<8} | {:<10} | {:<6} | {}",
            record.gt_id.as_deref().unwrap_or("-"),
            record.pred_id.as_deref().unwrap_or("-"),
            record.iou.map_or("-".to_string(), |v| format!("{v:.4}")),
            record.confidence.map_or("-".to_string(), |v| format!("{v:.2}")),
        );
    }
    println!();

    // Example 4: Crowd ground truth
    println!("4. Crowd Ground Truth");
    let herd = vec![GeometricObject::new(
        "herd",
        "sheep",
        Geometry::Box(BoundingBox::new(0.0, 0.0, 300.0, 300.0)),
    )
    .with_crowd(true)];
    let sheep = vec![
        GeometricObject::new("s1", "sheep", Geometry::Box(BoundingBox::new(20.0, 20.0, 40.0, 40.0)))
            .with_confidence(0.9),
        GeometricObject::new("s2", "sheep", Geometry::Box(BoundingBox::new(120.0, 80.0, 40.0, 40.0)))
            .with_confidence(0.8),
        GeometricObject::new("s3", "sheep", Geometry::Box(BoundingBox::new(200.0, 220.0, 40.0, 40.0)))
            .with_confidence(0.7),
    ];
    let crowd_records = evaluate(&herd, &sheep, &EvaluationConfig::default())?;
    let matched = crowd_records.iter().filter(|r| r.is_true_positive()).count();
    println!("   {} predictions absorbed by one crowd region", matched);
    println!();

    // Example 5: Confusion matrix
    println!("5. Confusion Matrix");
    let matrix = ConfusionMatrix::from_records(&records, None)?;
    for report in matrix.per_class() {
        println!(
            "   ├─ {}: precision {:.2}, recall {:.2}, f1 {:.2} (support {})",
            report.label, report.precision, report.recall, report.f1, report.support
        );
    }
    let micro = matrix.summary(Average::Micro);
    println!("   └─ micro: precision {:.2}, recall {:.2}, f1 {:.2}", micro.precision, micro.recall, micro.f1);
    println!();

    println!("=== Example Complete ===");

    Ok(())
}
