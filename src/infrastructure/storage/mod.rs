mod object_storage;
mod storage_factory;

pub use object_storage::ObjectStorage;
pub use storage_factory::StorageFactory;
