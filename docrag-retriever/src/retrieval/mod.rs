pub mod answer;
pub mod chunking_strategy;
pub mod extract;
pub mod ingestion;
pub mod vector_index;
