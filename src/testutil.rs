//! Record builders and a recording messaging session for unit tests

use crate::consist::{CltrCstInfo, ConsistInfo, EtbInfo, FunctionInfo, Properties, VehicleInfo};
use crate::core::{CstUuid, Label, TopoCountKind, Version};
use crate::directory::{
    Consist, OpConsist, OpTrainDirState, OpTrainDirStatusInfo, OpTrainDirectory, OpVehicle,
    TrainDirectory,
};
use crate::error::{Result, TtiError};
use crate::transport::{
    ListenerHandle, LocalCounters, MdListener, MdRequest, MessagingSession, PdSubscription,
    SubscriptionHandle, TopoCounters,
};
use std::time::Duration;

pub fn uuid(n: u8) -> CstUuid {
    let mut raw = [0u8; 16];
    raw[0] = 0xC0;
    raw[15] = n;
    CstUuid(raw)
}

pub fn label(text: &str) -> Label {
    Label::new(text).unwrap()
}

pub fn status_info(etb_topo: u32, op_topo: u32, own_op: u8, own_trn: u8) -> OpTrainDirStatusInfo {
    OpTrainDirStatusInfo {
        state: OpTrainDirState {
            version: Version::new(1, 0),
            etb_id: 0,
            trn_dir_state: 2,
            op_trn_dir_state: 2,
            trn_id: label("IC 2314"),
            trn_operator: label("op.rail"),
            op_trn_topo_cnt: op_topo,
            crc: 0,
        },
        etb_topo_cnt: etb_topo,
        own_op_cst_no: own_op,
        own_trn_cst_no: own_trn,
        ..OpTrainDirStatusInfo::default()
    }
}

/// One vehicle per consist, labelled `veh<op_cst_no>`
pub fn op_dir(topo: u32, consists: &[(CstUuid, u8, u8)]) -> OpTrainDirectory {
    OpTrainDirectory {
        version: Version::new(1, 0),
        etb_id: 0,
        op_trn_orient: 1,
        op_cst_list: consists
            .iter()
            .map(|&(cst_uuid, op_cst_no, trn_cst_no)| OpConsist {
                cst_uuid,
                op_cst_no,
                op_cst_orient: 1,
                trn_cst_no,
            })
            .collect(),
        op_veh_list: consists
            .iter()
            .map(|&(_, op_cst_no, _)| OpVehicle {
                veh_id: label(&format!("veh{}", op_cst_no)),
                op_veh_no: op_cst_no,
                is_lead: 1,
                lead_dir: 0,
                trn_veh_no: op_cst_no,
                veh_orient: if op_cst_no % 2 == 0 { 2 } else { 1 },
                own_op_cst_no: op_cst_no,
            })
            .collect(),
        op_trn_topo_cnt: topo,
    }
}

pub fn train_dir(topo: u32, consists: &[(CstUuid, u32)]) -> TrainDirectory {
    TrainDirectory {
        version: Version::new(1, 0),
        etb_id: 0,
        cst_list: consists
            .iter()
            .enumerate()
            .map(|(i, &(cst_uuid, cst_topo_cnt))| Consist {
                cst_uuid,
                cst_topo_cnt,
                trn_cst_no: i as u8 + 1,
                cst_orient: 1,
            })
            .collect(),
        trn_topo_cnt: topo,
    }
}

/// Unsealed consist info: vehicles `<label>-veh<n>`, functions `0x100 + n` in vehicle `n + 1`
pub fn consist_info(cst_uuid: CstUuid, name: &str, veh_cnt: u8, fct_cnt: u8) -> ConsistInfo {
    ConsistInfo {
        version: Version::new(1, 0),
        cst_class: 1,
        cst_id: label(name),
        cst_type: label("EMU"),
        cst_owner: label("owner"),
        cst_uuid,
        cst_prop_version: Version::default(),
        etb_info_list: vec![EtbInfo { etb_id: 0, cn_cnt: 1 }],
        veh_info_list: (1..=veh_cnt)
            .map(|n| VehicleInfo {
                veh_id: label(&format!("{}-veh{}", name, n)),
                veh_type: label("car"),
                veh_orient: 1,
                cst_veh_no: n,
                tract_veh: u8::from(n == 1),
                veh_prop: Properties {
                    version: Version::new(1, 0),
                    data: if n == 2 { vec![0xA5, 0x5A] } else { Vec::new() },
                },
            })
            .collect(),
        fct_info_list: (0..fct_cnt)
            .map(|n| FunctionInfo {
                fct_name: label(&format!("fct{}", n)),
                fct_id: 0x100 + u16::from(n),
                grp: 0,
                cst_veh_no: n + 1,
                etb_id: 0,
                cn_id: 0,
            })
            .collect(),
        cltr_cst_info_list: vec![CltrCstInfo {
            cltr_cst_uuid: cst_uuid,
            cltr_cst_orient: 1,
            cltr_cst_no: 1,
        }],
        cst_topo_cnt: 0,
    }
}

/// Consist info as it comes out of a verified reply
pub fn sealed(info: ConsistInfo) -> ConsistInfo {
    ConsistInfo::decode(&info.to_bytes()).unwrap()
}

/// Messaging session recording everything the subsystem asks of it
#[derive(Debug, Default)]
pub struct FakeSession {
    pub counters: LocalCounters,
    pub subscriptions: Vec<(SubscriptionHandle, PdSubscription)>,
    pub listeners: Vec<(ListenerHandle, MdListener)>,
    pub requests: Vec<MdRequest>,
    pub cycles: usize,
    pub fail_requests: bool,
    pub fail_cycles: bool,
    /// Fail registrations once this many have succeeded
    pub fail_registration_after: Option<usize>,
    pub registrations: usize,
    pub next_handle: u64,
}

impl FakeSession {
    fn register(&mut self) -> Result<u64> {
        if self.fail_registration_after == Some(self.registrations) {
            return Err(TtiError::transport("registration refused"));
        }
        self.registrations += 1;
        self.next_handle += 1;
        Ok(self.next_handle)
    }

    /// Requests issued for a request comId
    pub fn requests_for(&self, com_id: u32) -> Vec<&MdRequest> {
        self.requests.iter().filter(|r| r.com_id == com_id).collect()
    }
}

impl TopoCounters for FakeSession {
    fn topo_count(&self, kind: TopoCountKind) -> u32 {
        self.counters.topo_count(kind)
    }

    fn set_topo_count(&mut self, kind: TopoCountKind, value: u32) {
        self.counters.set_topo_count(kind, value)
    }
}

impl MessagingSession for FakeSession {
    fn subscribe(&mut self, sub: &PdSubscription) -> Result<SubscriptionHandle> {
        let handle = SubscriptionHandle(self.register()?);
        self.subscriptions.push((handle, sub.clone()));
        Ok(handle)
    }

    fn unsubscribe(&mut self, handle: SubscriptionHandle) -> Result<()> {
        self.subscriptions.retain(|(h, _)| *h != handle);
        Ok(())
    }

    fn add_listener(&mut self, listener: &MdListener) -> Result<ListenerHandle> {
        let handle = ListenerHandle(self.register()?);
        self.listeners.push((handle, listener.clone()));
        Ok(handle)
    }

    fn remove_listener(&mut self, handle: ListenerHandle) -> Result<()> {
        self.listeners.retain(|(h, _)| *h != handle);
        Ok(())
    }

    fn request(&mut self, request: &MdRequest) -> Result<()> {
        if self.fail_requests {
            return Err(TtiError::transport("send failed"));
        }
        self.requests.push(request.clone());
        Ok(())
    }

    fn drive_one_cycle(&mut self) -> Result<Duration> {
        if self.fail_cycles {
            return Err(TtiError::transport("cycle failed"));
        }
        self.cycles += 1;
        Ok(Duration::from_millis(10))
    }
}
