pub mod fragment;
pub mod operation;
pub mod worker;

pub use fragment::Fragment;
pub use operation::Operation;
pub use worker::WorkerRecord;
