pub mod error;
pub mod fs;
pub mod memory;
pub mod sign;
pub mod store;

pub use error::BlobError;
pub use fs::FsStore;
pub use memory::MemoryStore;
pub use sign::UrlSigner;
pub use store::ObjectStore;
