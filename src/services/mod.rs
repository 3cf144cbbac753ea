pub mod activity;
pub mod extraction;
pub mod storage;
pub mod verification;
pub mod vision;

pub use storage::Storage;
pub use vision::VisionClient;
