//! Input data: question records, the CSV loader and the in-memory data view
//! the pipeline operates on.

pub mod loader;
pub mod record;
pub mod split;
pub mod view;

pub use loader::CsvLoader;
pub use record::QuestionRecord;
pub use split::train_test_split;
pub use view::{DataView, Row, Value};
