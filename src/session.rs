//! TTI session handle and public query API
//!
//! Every query checks whether the held copy is still current. A stale or
//! missing artifact triggers one request and the query returns
//! [`TtiError::NoData`]; callers poll again later. Decode failures never
//! surface here, only `Param` and `NoData` do.

use crate::cache::ConsistInfoCache;
use crate::config::TtiConfig;
use crate::consist::{ConsistInfo, FunctionInfo, VehicleInfo};
use crate::core::{CstUuid, Label, Orientation, TopoCountKind};
use crate::directory::{
    OpTrainDirState, OpTrainDirStatusInfo, OpTrainDirectory, TrainDirectory,
    TrainNetworkDirectory,
};
use crate::error::{Result, TtiError};
use crate::iec61375::{com_id, LABEL_LEN};
use crate::request::{ArtifactKind, RequestEngine};
use crate::store::TopologyStore;
use crate::transport::{
    ListenerHandle, MdListener, MessagingSession, PdSubscription, SubscriptionHandle,
    TimeoutPolicy, TopoCounters, TopologySignal,
};
use log::{info, warn};
use std::net::Ipv4Addr;

/// Everything the store holds, copied out at once
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TtiSnapshot {
    /// Operational train state
    pub state: OpTrainDirState,
    /// Operational train directory
    pub op_trn_dir: OpTrainDirectory,
    /// Train directory
    pub trn_dir: TrainDirectory,
    /// Train network directory
    pub trn_net_dir: TrainNetworkDirectory,
}

/// Own identifiers usable as host part of the own domain name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OwnIds {
    /// Own device (function) label, if the own address names a function
    pub dev_id: Option<Label>,
    /// Label of the vehicle hosting the own device
    pub veh_id: Option<Label>,
    /// Own consist label
    pub cst_id: Label,
}

/// Per-session train topology information accessor
pub struct Tti<S: MessagingSession> {
    pub(crate) session: S,
    pub(crate) config: TtiConfig,
    pub(crate) store: TopologyStore,
    pub(crate) cache: ConsistInfoCache,
    pub(crate) engine: RequestEngine,
    pub(crate) signal: Option<Box<dyn TopologySignal + Send>>,
    subscriptions: Vec<SubscriptionHandle>,
    listeners: Vec<ListenerHandle>,
    /// Group of the last valid status telegram
    pub(crate) last_status_dest: Option<Ipv4Addr>,
    pub(crate) ecsp_source: Option<Ipv4Addr>,
}

fn check_label(label: Option<&str>) -> Result<()> {
    match label {
        Some(text) if text.len() > LABEL_LEN => Err(TtiError::param(format!(
            "Label '{}' longer than {} bytes",
            text, LABEL_LEN
        ))),
        _ => Ok(()),
    }
}

impl<S: MessagingSession> Tti<S> {
    /// Register with the messaging session
    ///
    /// Subscribes the status telegram and listens for the op-dir notification
    /// on both configured groups. If any registration fails, the ones made so
    /// far are undone and an `Init` error is returned.
    ///
    /// The handle is `Send` whenever the session is, so it can be shared with
    /// an I/O thread behind a `Mutex`.
    pub fn init(
        session: S,
        config: TtiConfig,
        signal: Option<Box<dyn TopologySignal + Send>>,
    ) -> Result<Self> {
        let mut tti = Tti {
            session,
            store: TopologyStore::new(),
            cache: ConsistInfoCache::new(config.replacement),
            engine: RequestEngine::new(&config),
            config,
            signal,
            subscriptions: Vec::new(),
            listeners: Vec::new(),
            last_status_dest: None,
            ecsp_source: None,
        };

        if let Err(err) = tti.register() {
            tti.unregister();
            return Err(TtiError::init(format!("TTI registration failed: {}", err)));
        }
        Ok(tti)
    }

    fn register(&mut self) -> Result<()> {
        for dest in self.config.status_addrs {
            let handle = self.session.subscribe(&PdSubscription {
                com_id: com_id::TTDB_STATUS,
                src_filter: None,
                dest,
                timeout: self.config.status_timeout,
                timeout_policy: TimeoutPolicy::SetToZero,
            })?;
            self.subscriptions.push(handle);
        }
        for dest in self.config.notify_addrs {
            let handle = self.session.add_listener(&MdListener {
                com_id: com_id::OP_DIR_INFO,
                src_filter: None,
                dest,
            })?;
            self.listeners.push(handle);
        }
        Ok(())
    }

    fn unregister(&mut self) {
        for handle in self.subscriptions.drain(..) {
            if let Err(err) = self.session.unsubscribe(handle) {
                warn!("Unsubscribing status telegram failed: {}", err);
            }
        }
        for handle in self.listeners.drain(..) {
            if let Err(err) = self.session.remove_listener(handle) {
                warn!("Removing notification listener failed: {}", err);
            }
        }
    }

    /// Unregister everything, drop store and cache, hand the session back
    pub fn teardown(mut self) -> S {
        self.unregister();
        info!("TTI access closed");
        self.session
    }

    /// The messaging session
    pub fn session(&self) -> &S {
        &self.session
    }

    /// The messaging session, mutably
    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    /// Session configuration
    pub fn config(&self) -> &TtiConfig {
        &self.config
    }

    /// Topology store
    pub fn store(&self) -> &TopologyStore {
        &self.store
    }

    /// Consist info cache
    pub fn cache(&self) -> &ConsistInfoCache {
        &self.cache
    }

    /// Source of the last valid status telegram, i.e. the active ECSP
    pub fn ecsp_source(&self) -> Option<Ipv4Addr> {
        self.ecsp_source
    }

    pub(crate) fn request(&mut self, kind: ArtifactKind, uuid: Option<&CstUuid>) {
        // failures are logged by the engine; the next stale query asks again
        let _ = self.engine.request(&mut self.session, kind, uuid);
    }

    fn stale(&mut self, kind: ArtifactKind, what: &str) -> TtiError {
        self.request(kind, None);
        TtiError::no_data(format!("{} not available yet", what))
    }

    pub(crate) fn signal(&self) {
        if let Some(signal) = &self.signal {
            signal.give();
        }
    }

    fn topo_count(&self, kind: TopoCountKind) -> u32 {
        self.session.topo_count(kind)
    }

    /// Ask the ECSP for state and all three directories at once
    pub fn request_read_complete(&mut self) -> Result<()> {
        self.engine
            .request(&mut self.session, ArtifactKind::ReadComplete, None)
            .map(|_| ())
    }

    /// Operational train state and directory
    pub fn get_op_tr_directory(&mut self) -> Result<(OpTrainDirState, OpTrainDirectory)> {
        let dir = self.store.op_trn_dir();
        if dir.op_cst_cnt() == 0 || dir.op_trn_topo_cnt != self.topo_count(TopoCountKind::OpTrain) {
            return Err(self.stale(ArtifactKind::OpTrainDir, "Operational train directory"));
        }
        Ok((self.store.status().state.clone(), dir.clone()))
    }

    /// Last status telegram as received, current or not
    pub fn get_op_trn_directory_status_info(&self) -> OpTrainDirStatusInfo {
        self.store.status().clone()
    }

    /// Train directory
    pub fn get_tr_directory(&mut self) -> Result<TrainDirectory> {
        let dir = self.store.trn_dir();
        if dir.cst_cnt() == 0 || dir.trn_topo_cnt != self.topo_count(TopoCountKind::Etb) {
            return Err(self.stale(ArtifactKind::TrainDir, "Train directory"));
        }
        Ok(dir.clone())
    }

    /// Train network directory
    pub fn get_trn_net_directory(&mut self) -> Result<TrainNetworkDirectory> {
        let dir = self.store.trn_net_dir();
        if dir.entry_cnt() == 0 || dir.etb_topo_cnt != self.topo_count(TopoCountKind::Etb) {
            return Err(self.stale(ArtifactKind::NetDir, "Train network directory"));
        }
        Ok(dir.clone())
    }

    /// Everything held, without staleness check
    pub fn get_tti(&self) -> TtiSnapshot {
        TtiSnapshot {
            state: self.store.status().state.clone(),
            op_trn_dir: self.store.op_trn_dir().clone(),
            trn_dir: self.store.trn_dir().clone(),
            trn_net_dir: self.store.trn_net_dir().clone(),
        }
    }

    /// Static consist info by UUID, `None` for the own consist
    pub fn get_static_cst_info(&mut self, uuid: Option<&CstUuid>) -> Result<ConsistInfo> {
        if let Some(info) = self.cache.lookup(uuid) {
            return Ok(info.clone());
        }
        match uuid.copied().or_else(|| self.store.own_cst_uuid()) {
            Some(uuid) => self.request(ArtifactKind::StaticConsistInfo, Some(&uuid)),
            None => self.request(ArtifactKind::OpTrainDir, None),
        }
        Err(TtiError::no_data("Consist info not cached"))
    }

    /// Number of consists in the train
    pub fn get_trn_cst_cnt(&mut self) -> Result<usize> {
        if self.store.trn_dir().cst_cnt() == 0
            || self.store.status().etb_topo_cnt != self.topo_count(TopoCountKind::Etb)
        {
            return Err(self.stale(ArtifactKind::TrainDir, "Train directory"));
        }
        Ok(self.store.trn_dir().cst_cnt())
    }

    /// Number of vehicles in the train
    pub fn get_trn_veh_cnt(&mut self) -> Result<usize> {
        let dir = self.store.op_trn_dir();
        if dir.op_cst_cnt() == 0
            || dir.op_veh_cnt() == 0
            || self.store.status().etb_topo_cnt != self.topo_count(TopoCountKind::Etb)
        {
            return Err(self.stale(ArtifactKind::OpTrainDir, "Operational train directory"));
        }
        Ok(dir.op_veh_cnt())
    }

    fn consist_by_label(&mut self, cst_label: Option<&str>) -> Result<&ConsistInfo> {
        check_label(cst_label)?;
        if self.cache.lookup_label(cst_label).is_none() {
            let uuid = match cst_label {
                None => self.store.own_cst_uuid(),
                Some(label) => self.store.op_trn_dir().uuid_for_label(label),
            };
            match uuid {
                Some(uuid) => self.request(ArtifactKind::StaticConsistInfo, Some(&uuid)),
                // the label cannot be resolved until the directory is known
                None => self.request(ArtifactKind::OpTrainDir, None),
            }
            return Err(TtiError::no_data(format!(
                "Consist info of {} not cached",
                cst_label.unwrap_or("own consist")
            )));
        }
        self.cache
            .lookup_label(cst_label)
            .ok_or_else(|| TtiError::no_data("Consist info not cached"))
    }

    /// Number of vehicles of a consist, `None` for the own consist
    pub fn get_cst_veh_cnt(&mut self, cst_label: Option<&str>) -> Result<usize> {
        self.consist_by_label(cst_label).map(ConsistInfo::veh_cnt)
    }

    /// Number of functions of a consist, `None` for the own consist
    pub fn get_cst_fct_cnt(&mut self, cst_label: Option<&str>) -> Result<usize> {
        self.consist_by_label(cst_label).map(ConsistInfo::fct_cnt)
    }

    /// Up to `max_fct_cnt` functions of a consist, `None` for the own consist
    pub fn get_cst_fct_info(
        &mut self,
        cst_label: Option<&str>,
        max_fct_cnt: usize,
    ) -> Result<Vec<FunctionInfo>> {
        if max_fct_cnt == 0 {
            return Err(TtiError::param("Function list capacity is zero"));
        }
        let info = self.consist_by_label(cst_label)?;
        Ok(info.fct_info_list.iter().take(max_fct_cnt).copied().collect())
    }

    /// Whole consist info by label, `None` for the own consist
    pub fn get_cst_info(&mut self, cst_label: Option<&str>) -> Result<ConsistInfo> {
        self.consist_by_label(cst_label).cloned()
    }

    /// Vehicle info
    ///
    /// Without a vehicle label the own vehicle is returned for the own
    /// consist (derived from the own address), otherwise the first vehicle.
    pub fn get_veh_info(
        &mut self,
        veh_label: Option<&str>,
        cst_label: Option<&str>,
    ) -> Result<VehicleInfo> {
        check_label(veh_label)?;
        let own_fct_id = self.config.own_fct_id();
        let info = self.consist_by_label(cst_label)?;
        let vehicle = match veh_label {
            Some(label) => info.vehicle_by_label(label),
            None if cst_label.is_none() => info
                .function_by_id(own_fct_id)
                .and_then(|fct| info.vehicle_by_no(fct.cst_veh_no))
                .or_else(|| info.veh_info_list.first()),
            None => info.veh_info_list.first(),
        };
        vehicle.cloned().ok_or_else(|| {
            TtiError::param(format!(
                "No vehicle {} in consist {}",
                veh_label.unwrap_or("at all"),
                info.cst_id
            ))
        })
    }

    /// Orientation of a vehicle and of its consist in the operational train
    ///
    /// Returns `(vehicle, consist)`. Without a vehicle label the first
    /// vehicle of the consist is used.
    pub fn get_veh_orient(
        &mut self,
        veh_label: Option<&str>,
        cst_label: Option<&str>,
    ) -> Result<(Orientation, Orientation)> {
        check_label(veh_label)?;
        let uuid = self.consist_by_label(cst_label)?.cst_uuid;
        let dir = self.store.op_trn_dir();
        let Some(cst) = dir.consist_by_uuid(&uuid) else {
            return Err(self.stale(ArtifactKind::OpTrainDir, "Consist in operational train directory"));
        };
        let mut vehicles = dir
            .op_veh_list
            .iter()
            .filter(|veh| veh.own_op_cst_no == cst.op_cst_no);
        let veh_orient = match veh_label {
            Some(label) => vehicles
                .find(|veh| veh.veh_id.matches(label))
                .map(|veh| veh.orientation())
                .ok_or_else(|| TtiError::param(format!("No vehicle {} in operational train", label)))?,
            None => vehicles
                .next()
                .map_or(Orientation::NotKnown, |veh| veh.orientation()),
        };
        Ok((veh_orient, cst.orientation()))
    }

    /// Own device, vehicle and consist labels
    pub fn get_own_ids(&mut self) -> Result<OwnIds> {
        let own_trn_cst_no = self.store.status().own_trn_cst_no;
        if self.store.trn_net_dir().entry_cnt() == 0 || own_trn_cst_no == 0 {
            return Err(self.stale(ArtifactKind::NetDir, "Train network directory"));
        }

        let Some(own) = self.cache.own() else {
            let uuid = self
                .store
                .trn_net_dir()
                .entries
                .get(usize::from(own_trn_cst_no) - 1)
                .map(|entry| entry.cst_uuid);
            match uuid {
                Some(uuid) => self.request(ArtifactKind::StaticConsistInfo, Some(&uuid)),
                None => self.request(ArtifactKind::NetDir, None),
            }
            return Err(TtiError::no_data("Own consist info not cached"));
        };

        let fct = own.function_by_id(self.config.own_fct_id());
        Ok(OwnIds {
            dev_id: fct.map(|fct| fct.fct_name),
            veh_id: fct
                .and_then(|fct| own.vehicle_by_no(fct.cst_veh_no))
                .map(|veh| veh.veh_id),
            cst_id: own.cst_id,
        })
    }

    /// Own operational consist number, 0 if unknown
    pub fn get_own_op_cst_no(&self) -> u8 {
        self.store.status().own_op_cst_no
    }

    /// Own train consist number, 0 if unknown
    pub fn get_own_trn_cst_no(&self) -> u8 {
        self.store.status().own_trn_cst_no
    }
}
