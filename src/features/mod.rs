// Feature response ingestion
// Record validation, path parsing, and bucket grouping

pub mod bucket;
pub mod grouper;
pub mod path;
pub mod record;

pub use bucket::{Bucket, BucketRole, MetreBucket, NoteBucket, TempoBucket, TimingArrays, TimingBucket};
pub use grouper::{group, BucketMap};
pub use path::FeaturePath;
pub use record::{parse_records, records_from_value, FlattenedRecord, InputError, InputResult};
