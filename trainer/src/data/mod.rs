mod dataloader;
mod dataset;
mod local;
mod synthetic;

pub use dataloader::DataLoader;
pub use dataset::SequenceDataset;
pub use local::load_local;
pub use synthetic::synthetic;
