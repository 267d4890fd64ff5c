/// Labeled crime-report datasets
///
/// - CSV loading by header name
/// - Rare class filtering per column and jointly
/// - Stratified splits for validation and cross-validation

pub mod filter;
pub mod loader;
pub mod record;
pub mod split;

pub use filter::{class_counts, filter_rare_classes, filter_rare_classes_joint, ClassDistribution};
pub use loader::{load_csv, read_csv, DatasetSchema};
pub use record::{Dataset, LabelColumn, Labeled, PreparedRecord, Record};
pub use split::{stratified_k_fold, stratified_split, SplitIndices};
