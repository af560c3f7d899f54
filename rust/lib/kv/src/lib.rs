pub mod error;
pub mod memory;
pub mod redb;
pub mod traits;

pub use error::KVError;
pub use memory::MemoryStorage;
pub use self::redb::RedbStorage;
pub use traits::Storage;
