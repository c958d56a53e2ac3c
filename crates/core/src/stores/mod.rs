pub mod memory;
pub mod pinecone;

pub use memory::MemoryVectorIndex;
pub use pinecone::PineconeStore;
