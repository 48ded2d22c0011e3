//! Event dispatcher: routes received telegrams into the store and cache
//!
//! The embedding application's I/O loop forwards every telegram delivered
//! for a TTI registration to the [`EventHandler`] of the owning handle.
//! Decode failures are logged and the telegram dropped; they never reach
//! query callers.

use crate::consist::ConsistInfo;
use crate::core::{CstUuid, TopoCountKind};
use crate::directory::OpTrainDirStatusInfo;
use crate::error::TtiError;
use crate::iec61375::com_id;
use crate::request::ArtifactKind;
use crate::session::Tti;
use crate::transport::{MdInfo, MessagingSession, PdInfo, ResultCode, TopoCounters};
use log::{debug, error, info, warn};

/// Entry points for telegrams received on the TTI registrations
pub trait EventHandler {
    /// Status telegram (PD 100) received or timed out
    fn on_status_telegram(&mut self, info: &PdInfo, data: &[u8]);

    /// Reply to a TTDB request or op-dir notification received
    fn on_reply_or_notification(&mut self, info: &MdInfo, data: &[u8]);
}

impl<S: MessagingSession> Tti<S> {
    fn invalidate_op_train(&mut self) {
        self.session.set_topo_count(TopoCountKind::OpTrain, 0);
    }

    /// Drop all cached consists and ask for the ones listed in the train directory
    fn refill_cache(&mut self) {
        self.cache.clear();
        let uuids: Vec<CstUuid> = self
            .store
            .trn_dir()
            .cst_list
            .iter()
            .take(self.cache.capacity())
            .take_while(|cst| cst.cst_topo_cnt != 0)
            .map(|cst| cst.cst_uuid)
            .collect();
        for uuid in &uuids {
            self.request(ArtifactKind::StaticConsistInfo, Some(uuid));
        }
    }

    fn store_consist_info(&mut self, data: &[u8]) {
        match ConsistInfo::decode_verified(data) {
            Ok(info) => {
                let uuid = info.cst_uuid;
                self.engine
                    .reply_received(ArtifactKind::StaticConsistInfo, Some(&uuid));
                let is_own = self.store.is_own_consist(&uuid);
                let slot = self.cache.store(info, is_own);
                debug!("Consist info {} stored in cache slot {}", uuid, slot);
            }
            Err(TtiError::Checksum { expected, computed }) => {
                warn!(
                    "CRC error of received consist info ({:08x} != {:08x})!",
                    computed, expected
                );
            }
            Err(err) => error!("Consist info could not be stored: {}", err),
        }
    }
}

impl<S: MessagingSession> EventHandler for Tti<S> {
    fn on_status_telegram(&mut self, info: &PdInfo, data: &[u8]) {
        if info.com_id != com_id::TTDB_STATUS {
            debug!("Ignored process data with comId {}", info.com_id);
            return;
        }

        let mut changed = 0;
        match info.result {
            ResultCode::Ok => match OpTrainDirStatusInfo::decode(data) {
                Ok(status) => {
                    // the status telegram comes from the physical address of the active ECSP
                    if !info.src_addr.is_unspecified() {
                        self.ecsp_source = Some(info.src_addr);
                    }
                    changed = self.store.store_status(status, &mut self.session);
                    self.last_status_dest = Some(info.dest_addr);
                }
                Err(TtiError::Checksum { expected, computed }) => {
                    warn!(
                        "CRC error of received operational status info ({:08x} != {:08x})!",
                        computed, expected
                    );
                    self.invalidate_op_train();
                    return;
                }
                Err(err) => {
                    warn!("Dropped operational status info: {}", err);
                    return;
                }
            },
            ResultCode::Timeout => {
                // only the group the last valid telegram came in on invalidates
                if self.last_status_dest.map_or(true, |dest| dest == info.dest_addr) {
                    warn!(
                        "Operational status info timed out on {}, invalidating topocounts",
                        info.dest_addr
                    );
                    for kind in [TopoCountKind::Etb, TopoCountKind::OpTrain] {
                        if self.session.topo_count(kind) != 0 {
                            self.session.set_topo_count(kind, 0);
                            changed += 1;
                        }
                    }
                }
            }
            ResultCode::Other(code) => {
                info!("Unsolicited status telegram received (result {})", code);
            }
        }

        if changed > 0 {
            self.signal();
        }
    }

    fn on_reply_or_notification(&mut self, info: &MdInfo, data: &[u8]) {
        if info.result != ResultCode::Ok {
            warn!(
                "Unsolicited message received (comId {}, result {:?})!",
                info.com_id, info.result
            );
            self.invalidate_op_train();
            return;
        }
        match ArtifactKind::from_reply_com_id(info.com_id) {
            // released per UUID once the reply decoded
            Some(ArtifactKind::StaticConsistInfo) | None => {}
            Some(kind) => self.engine.reply_received(kind, None),
        }

        match info.com_id {
            com_id::OP_DIR_INFO | com_id::OP_DIR_INFO_REP => {
                match self.store.store_op_trn_dir(data, &mut self.session) {
                    Ok(true) => self.signal(),
                    Ok(false) => {}
                    Err(err) => warn!("Dropped operational train directory: {}", err),
                }
            }
            com_id::TRN_DIR_REP => match self.store.store_trn_dir(data) {
                Ok(()) => self.refill_cache(),
                Err(err) => warn!("Dropped train directory: {}", err),
            },
            com_id::NET_DIR_REP => {
                if let Err(err) = self.store.store_trn_net_dir(data) {
                    warn!("Dropped train network directory: {}", err);
                }
            }
            com_id::READ_CMPLT_REP => {
                match self.store.store_read_complete(data, &mut self.session) {
                    Ok(true) => self.signal(),
                    Ok(false) => {}
                    Err(TtiError::Checksum { expected, computed }) => {
                        warn!(
                            "CRC error of received TTDB read complete reply ({:08x} != {:08x})!",
                            computed, expected
                        );
                        self.invalidate_op_train();
                    }
                    Err(err) => warn!("Dropped TTDB read complete reply: {}", err),
                }
            }
            com_id::STAT_CST_REP => self.store_consist_info(data),
            other => debug!("Ignored message data with comId {}", other),
        }
    }
}
