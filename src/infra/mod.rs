pub mod artifact_store;
pub mod file_collector;
pub mod http_client;

pub use artifact_store::FsArtifactStore;
pub use file_collector::FileCollector;
pub use http_client::ReqwestProbe;
