pub mod engine;

pub use engine::{
    BatchRejected, DownloadSummary, EpisodeItem, LibraryItem, LibraryKind, LibraryOverview,
    Reconciler, SeasonEpisodes, SeasonSummary, TorrentDetail,
};
