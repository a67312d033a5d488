pub mod client;

pub use client::{ClientStatus, DownloadInfo, TorrentClient, TorrentMap};
