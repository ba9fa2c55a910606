pub mod chunking_strategy;
pub mod debouncer;
pub mod directory_watcher;
pub mod file_scanner;
pub mod index_manager;
pub mod index_state;
pub mod search;
pub mod vector_store;
