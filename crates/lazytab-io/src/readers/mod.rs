//! Readers that fill a [`MemoryDataset`](crate::memory::MemoryDataset) from
//! external files. Only delimited text is supported.

pub mod csv;
