//! # TRDP Train Topology Information
//!
//! Client-side cache and request engine for the train topology information
//! (TTI) of IEC 61375-2-3 train networks.
//!
//! The crate keeps a consistent view of the train composition. It is fed by
//! the periodic operational train directory status telegram and by on-demand
//! request/reply exchanges with the ECSP:
//!
//! - Bounded, CRC-checked decoding of the TTDB wire records
//! - Topology store with topology count change detection
//! - Bounded consist info cache with a slot reserved for the own consist
//! - Non-blocking query API: stale data triggers a request and `NoData`
//!
//! The crate opens no sockets and spawns no threads. It talks to the network
//! through a [`MessagingSession`] and is driven by the application
//! forwarding received telegrams to [`EventHandler`].
//!
//! ## Features
//!
//! - `serde`: Enable serialization/deserialization support
//!
//! ## Example
//!
//! ```
//! use trdp_tti::core::{CstUuid, Label, Version};
//! use trdp_tti::directory::{Consist, TrainDirectory};
//!
//! let dir = TrainDirectory {
//!     version: Version::new(1, 0),
//!     etb_id: 0,
//!     cst_list: vec![Consist {
//!         cst_uuid: CstUuid::new([7; 16]),
//!         cst_topo_cnt: 0x1234,
//!         trn_cst_no: 1,
//!         cst_orient: 1,
//!     }],
//!     trn_topo_cnt: 0xCAFE,
//! };
//! let decoded = TrainDirectory::decode(&dir.to_bytes())?;
//! assert_eq!(decoded, dir);
//! assert!(Label::new("ICE 4711")?.matches("ice 4711"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cache;
pub mod config;
pub mod consist;
pub mod core;
pub mod directory;
pub mod dispatcher;
pub mod encoding;
pub mod error;
pub mod request;
pub mod session;
pub mod store;
pub mod transport;

#[cfg(test)]
mod testutil;

pub use cache::{ConsistInfoCache, ReplacementPolicy};
pub use config::{TtiConfig, TtiConfigBuilder};
pub use consist::ConsistInfo;
pub use crate::core::{CstUuid, Label, Orientation, TopoCountKind};
pub use dispatcher::EventHandler;
pub use error::{Result, TtiError};
pub use request::ArtifactKind;
pub use session::{OwnIds, Tti, TtiSnapshot};
pub use transport::{MessagingSession, TopoCounters, TopologySignal};

/// IEC 61375-2-3 TTDB constants
pub mod iec61375 {
    /// Maximum number of consists in a train
    pub const MAX_CST_CNT: usize = 63;

    /// Maximum number of vehicles in a train
    pub const MAX_VEH_CNT: usize = 255;

    /// Length of a network label in bytes
    pub const LABEL_LEN: usize = 16;

    /// Length of a consist UUID in bytes
    pub const UUID_LEN: usize = 16;

    /// Consist infos held per session, slot 0 is the own consist
    pub const TTI_CACHED_CONSISTS: usize = 8;

    /// Communication identifiers of the TTDB telegrams
    pub mod com_id {
        /// Operational train directory status (PD)
        pub const TTDB_STATUS: u32 = 100;
        /// Operational train directory notification (MD)
        pub const OP_DIR_INFO: u32 = 101;
        /// Operational train directory request
        pub const OP_DIR_INFO_REQ: u32 = 102;
        /// Operational train directory reply
        pub const OP_DIR_INFO_REP: u32 = 103;
        /// Train directory request
        pub const TRN_DIR_REQ: u32 = 104;
        /// Train directory reply
        pub const TRN_DIR_REP: u32 = 105;
        /// Train network directory request
        pub const NET_DIR_REQ: u32 = 106;
        /// Train network directory reply
        pub const NET_DIR_REP: u32 = 107;
        /// Static consist info request
        pub const STAT_CST_REQ: u32 = 108;
        /// Static consist info reply
        pub const STAT_CST_REP: u32 = 109;
        /// Complete TTDB read request
        pub const READ_CMPLT_REQ: u32 = 110;
        /// Complete TTDB read reply
        pub const READ_CMPLT_REP: u32 = 111;
    }
}
