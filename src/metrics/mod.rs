//! Aggregate metrics derived from match records.
//!
//! [`curve`] turns threshold-sweep outputs into precision-recall curves
//! and (mean) average precision; [`confusion`] builds confusion matrices
//! with per-class and averaged summary reports.

pub mod confusion;
pub mod curve;

pub use confusion::{
    f1_from_counts, precision_from_counts, recall_from_counts, Average, ClassReport,
    ConfusionMatrix, SummaryReport,
};
pub use curve::{
    average_precision, monotonize_precision, recall_grid, resample_curve, CurveAccumulator,
    CurveSet, PRCurve,
};
