//! Topology store: latest validated copies of the TTDB directories

use crate::core::{CstUuid, TopoCountKind};
use crate::directory::{
    OpTrainDirStatusInfo, OpTrainDirectory, ReadCompleteReply, TrainDirectory,
    TrainNetworkDirectory,
};
use crate::error::Result;
use crate::transport::TopoCounters;
use log::info;

/// Per-session copies of the operational train state and the three directories
///
/// Every store operation decodes the complete record first and only then
/// overwrites the held copy, so a rejected record leaves the store untouched.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TopologyStore {
    status: OpTrainDirStatusInfo,
    op_trn_dir: OpTrainDirectory,
    trn_dir: TrainDirectory,
    trn_net_dir: TrainNetworkDirectory,
}

/// Write a counter, reporting whether it changed
fn update_count(counters: &mut dyn TopoCounters, kind: TopoCountKind, value: u32) -> bool {
    let old = counters.topo_count(kind);
    if old == value {
        return false;
    }
    info!("{} topocount changed (old: {:#010x}, new: {:#010x})", kind, old, value);
    counters.set_topo_count(kind, value);
    true
}

impl TopologyStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a validated status telegram and update both topology counters
    ///
    /// Returns the number of counters that changed.
    pub fn store_status(
        &mut self,
        status: OpTrainDirStatusInfo,
        counters: &mut dyn TopoCounters,
    ) -> usize {
        let etb_changed = update_count(counters, TopoCountKind::Etb, status.etb_topo_cnt);
        let op_changed = update_count(
            counters,
            TopoCountKind::OpTrain,
            status.state.op_trn_topo_cnt,
        );
        self.status = status;
        usize::from(etb_changed) + usize::from(op_changed)
    }

    /// Decode and store an operational train directory
    ///
    /// Returns whether the operational train topology count changed.
    pub fn store_op_trn_dir(&mut self, data: &[u8], counters: &mut dyn TopoCounters) -> Result<bool> {
        let dir = OpTrainDirectory::decode(data)?;
        Ok(self.put_op_trn_dir(dir, counters))
    }

    fn put_op_trn_dir(&mut self, dir: OpTrainDirectory, counters: &mut dyn TopoCounters) -> bool {
        let changed = update_count(counters, TopoCountKind::OpTrain, dir.op_trn_topo_cnt);
        self.op_trn_dir = dir;
        changed
    }

    /// Decode and store a train directory
    pub fn store_trn_dir(&mut self, data: &[u8]) -> Result<()> {
        self.trn_dir = TrainDirectory::decode(data)?;
        Ok(())
    }

    /// Decode and store a train network directory
    pub fn store_trn_net_dir(&mut self, data: &[u8]) -> Result<()> {
        self.trn_net_dir = TrainNetworkDirectory::decode(data)?;
        Ok(())
    }

    /// Decode a read-complete reply and cascade its parts into the store
    ///
    /// Returns whether the operational train topology count changed.
    pub fn store_read_complete(&mut self, data: &[u8], counters: &mut dyn TopoCounters) -> Result<bool> {
        let reply = ReadCompleteReply::decode(data)?;
        let changed = update_count(
            counters,
            TopoCountKind::OpTrain,
            reply.state.op_trn_topo_cnt,
        );
        self.status.state = reply.state;
        self.put_op_trn_dir(reply.op_trn_dir, counters);
        self.trn_dir = reply.trn_dir;
        self.trn_net_dir = reply.trn_net_dir;
        Ok(changed)
    }

    /// Last status telegram (host order)
    pub fn status(&self) -> &OpTrainDirStatusInfo {
        &self.status
    }

    /// Operational train directory
    pub fn op_trn_dir(&self) -> &OpTrainDirectory {
        &self.op_trn_dir
    }

    /// Train directory
    pub fn trn_dir(&self) -> &TrainDirectory {
        &self.trn_dir
    }

    /// Train network directory
    pub fn trn_net_dir(&self) -> &TrainNetworkDirectory {
        &self.trn_net_dir
    }

    /// UUID of the own consist, looked up by own train consist number
    pub fn own_cst_uuid(&self) -> Option<CstUuid> {
        self.op_trn_dir
            .consist_by_trn_cst_no(self.status.own_trn_cst_no)
            .map(|cst| cst.cst_uuid)
    }

    /// Check if `uuid` names the own consist
    pub fn is_own_consist(&self, uuid: &CstUuid) -> bool {
        self.own_cst_uuid().is_some_and(|own| own == *uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{op_dir, status_info, train_dir, uuid};
    use crate::transport::LocalCounters;

    #[test]
    fn test_op_dir_change_detection() -> Result<()> {
        let mut store = TopologyStore::new();
        let mut counters = LocalCounters::default();
        let bytes = op_dir(0x42, &[(uuid(1), 1, 1)]).to_bytes();

        assert!(store.store_op_trn_dir(&bytes, &mut counters)?);
        assert_eq!(counters.topo_count(TopoCountKind::OpTrain), 0x42);
        assert!(!store.store_op_trn_dir(&bytes, &mut counters)?);

        let newer = op_dir(0x43, &[(uuid(1), 1, 1), (uuid(2), 2, 2)]).to_bytes();
        assert!(store.store_op_trn_dir(&newer, &mut counters)?);
        assert_eq!(store.op_trn_dir().op_cst_cnt(), 2);
        Ok(())
    }

    #[test]
    fn test_rejected_record_leaves_store_unchanged() -> Result<()> {
        let mut store = TopologyStore::new();
        let mut counters = LocalCounters::default();
        store.store_trn_dir(&train_dir(5, &[(uuid(1), 9)]).to_bytes())?;

        let bytes = train_dir(6, &[(uuid(1), 9), (uuid(2), 10)]).to_bytes();
        assert!(store.store_trn_dir(&bytes[..bytes.len() - 2]).is_err());
        assert_eq!(store.trn_dir().trn_topo_cnt, 5);
        assert_eq!(store.trn_dir().cst_cnt(), 1);

        let mut op = op_dir(7, &[(uuid(1), 1, 1)]).to_bytes();
        op[7] = 200;
        assert!(store.store_op_trn_dir(&op, &mut counters).is_err());
        assert_eq!(counters.topo_count(TopoCountKind::OpTrain), 0);
        Ok(())
    }

    #[test]
    fn test_status_counts_changes() {
        let mut store = TopologyStore::new();
        let mut counters = LocalCounters::default();
        assert_eq!(store.store_status(status_info(1, 2, 1, 1), &mut counters), 2);
        assert_eq!(store.store_status(status_info(1, 2, 1, 1), &mut counters), 0);
        assert_eq!(store.store_status(status_info(1, 3, 1, 1), &mut counters), 1);
        assert_eq!(store.status().own_trn_cst_no, 1);
    }

    #[test]
    fn test_own_consist_resolution() -> Result<()> {
        let mut store = TopologyStore::new();
        let mut counters = LocalCounters::default();
        store.store_status(status_info(1, 2, 2, 2), &mut counters);
        store.store_op_trn_dir(&op_dir(2, &[(uuid(1), 1, 1), (uuid(2), 2, 2)]).to_bytes(), &mut counters)?;
        assert_eq!(store.own_cst_uuid(), Some(uuid(2)));
        assert!(store.is_own_consist(&uuid(2)));
        assert!(!store.is_own_consist(&uuid(1)));
        Ok(())
    }
}
