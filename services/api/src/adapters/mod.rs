pub mod completion;
pub mod db;
pub mod embedding;

pub use completion::DeepSeekCompletionAdapter;
pub use db::DbAdapter;
pub use embedding::DeepSeekEmbeddingAdapter;
