pub mod subject_name;

pub use subject_name::{MAX_NAME_LEN, SubjectName};
