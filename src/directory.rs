//! Fixed-layout TTDB directory records
//!
//! Operational train directory status (PD 100), operational train directory,
//! train directory, train network directory and the aggregate read-complete
//! reply. Arrays are sent compact: only `cnt` entries follow their counter.
//! The topology count is always the last field of its record.

use crate::core::{CstUuid, Label, Orientation, Version};
use crate::encoding::{verify_trailing_crc, WireReader, WireWriter};
use crate::error::{Result, TtiError};
use crate::iec61375::MAX_CST_CNT;

/// State block of the operational train directory
///
/// Carried in the status telegram and in the read-complete reply, protected
/// by its own trailing CRC.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OpTrainDirState {
    /// Structure version
    pub version: Version,
    /// Identification of the related ETB
    pub etb_id: u8,
    /// Train directory state: 1 unconfirmed, 2 confirmed
    pub trn_dir_state: u8,
    /// Operational train directory state: 1 invalid, 2 valid, 4 shared
    pub op_trn_dir_state: u8,
    /// Train identifier
    pub trn_id: Label,
    /// Train operator
    pub trn_operator: Label,
    /// Operational train topology count
    pub op_trn_topo_cnt: u32,
    /// CRC over the preceding fields, in host order
    pub crc: u32,
}

impl OpTrainDirState {
    /// Encoded size in bytes
    pub const SIZE: usize = 46;

    /// Decode and CRC-check the state block
    pub fn read_from(reader: &mut WireReader<'_>) -> Result<Self> {
        reader.ensure(Self::SIZE, "operational train directory state")?;
        let raw = reader.bytes(Self::SIZE)?;
        let computed = crate::encoding::crc32(&raw[..Self::SIZE - 4]);

        let mut r = WireReader::new(raw);
        let version = r.version()?;
        let etb_id = r.u8()?;
        let trn_dir_state = r.u8()?;
        let op_trn_dir_state = r.u8()?;
        r.skip(1)?;
        let trn_id = r.label()?;
        let trn_operator = r.label()?;
        let op_trn_topo_cnt = r.u32()?;
        let crc = r.u32()?;

        if crc != computed {
            return Err(TtiError::checksum(crc, computed));
        }

        Ok(OpTrainDirState {
            version,
            etb_id,
            trn_dir_state,
            op_trn_dir_state,
            trn_id,
            trn_operator,
            op_trn_topo_cnt,
            crc,
        })
    }

    /// Encode the state block, computing a fresh CRC
    pub fn write_to(&self, w: &mut WireWriter) {
        let start = w.len();
        w.version(self.version)
            .u8(self.etb_id)
            .u8(self.trn_dir_state)
            .u8(self.op_trn_dir_state)
            .zeros(1)
            .label(&self.trn_id)
            .label(&self.trn_operator)
            .u32(self.op_trn_topo_cnt)
            .crc_from(start);
    }
}

/// Safety trail appended to the status telegram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SafetyTrail {
    /// User data version
    pub user_data_version: Version,
    /// Safe sequence counter
    pub safe_seq_count: u32,
    /// Safety code
    pub safety_code: u32,
}

/// Periodic operational train directory status info (status telegram)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OpTrainDirStatusInfo {
    /// Operational train state
    pub state: OpTrainDirState,
    /// ETB topology count
    pub etb_topo_cnt: u32,
    /// Own operational consist number
    pub own_op_cst_no: u8,
    /// Own train consist number
    pub own_trn_cst_no: u8,
    /// Safety trail
    pub safety_trail: SafetyTrail,
}

impl OpTrainDirStatusInfo {
    /// Encoded size in bytes
    pub const SIZE: usize = OpTrainDirState::SIZE + 8 + 16;

    /// Decode a status telegram
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = WireReader::new(data);
        reader.ensure(Self::SIZE, "operational train directory status info")?;
        let state = OpTrainDirState::read_from(&mut reader)?;
        let etb_topo_cnt = reader.u32()?;
        let own_op_cst_no = reader.u8()?;
        let own_trn_cst_no = reader.u8()?;
        reader.skip(2)?;
        reader.skip(6)?;
        let user_data_version = reader.version()?;
        let safe_seq_count = reader.u32()?;
        let safety_code = reader.u32()?;

        Ok(OpTrainDirStatusInfo {
            state,
            etb_topo_cnt,
            own_op_cst_no,
            own_trn_cst_no,
            safety_trail: SafetyTrail {
                user_data_version,
                safe_seq_count,
                safety_code,
            },
        })
    }

    /// Encode a status telegram
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = WireWriter::new();
        self.state.write_to(&mut w);
        w.u32(self.etb_topo_cnt)
            .u8(self.own_op_cst_no)
            .u8(self.own_trn_cst_no)
            .zeros(2)
            .zeros(6)
            .version(self.safety_trail.user_data_version)
            .u32(self.safety_trail.safe_seq_count)
            .u32(self.safety_trail.safety_code);
        w.into_vec()
    }
}

/// Entry of the operational consist list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OpConsist {
    /// Consist UUID
    pub cst_uuid: CstUuid,
    /// Operational consist number in train direction
    pub op_cst_no: u8,
    /// Raw consist orientation
    pub op_cst_orient: u8,
    /// Train consist number
    pub trn_cst_no: u8,
}

impl OpConsist {
    /// Encoded size in bytes
    pub const SIZE: usize = 20;

    fn read_from(r: &mut WireReader<'_>) -> Result<Self> {
        let cst_uuid = r.uuid()?;
        let op_cst_no = r.u8()?;
        let op_cst_orient = r.u8()?;
        let trn_cst_no = r.u8()?;
        r.skip(1)?;
        Ok(OpConsist {
            cst_uuid,
            op_cst_no,
            op_cst_orient,
            trn_cst_no,
        })
    }

    fn write_to(&self, w: &mut WireWriter) {
        w.uuid(&self.cst_uuid)
            .u8(self.op_cst_no)
            .u8(self.op_cst_orient)
            .u8(self.trn_cst_no)
            .zeros(1);
    }

    /// Decoded consist orientation
    pub fn orientation(&self) -> Orientation {
        Orientation::from(self.op_cst_orient)
    }
}

/// Entry of the operational vehicle list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OpVehicle {
    /// Vehicle label
    pub veh_id: Label,
    /// Operational vehicle number in train direction
    pub op_veh_no: u8,
    /// Leading vehicle flag (antivalent: 1 false, 2 true)
    pub is_lead: u8,
    /// Leading direction
    pub lead_dir: u8,
    /// Sequence number of the vehicle in the train
    pub trn_veh_no: u8,
    /// Raw vehicle orientation
    pub veh_orient: u8,
    /// Operational number of the consist the vehicle belongs to
    pub own_op_cst_no: u8,
}

impl OpVehicle {
    /// Encoded size in bytes
    pub const SIZE: usize = 24;

    fn read_from(r: &mut WireReader<'_>) -> Result<Self> {
        let veh_id = r.label()?;
        let op_veh_no = r.u8()?;
        let is_lead = r.u8()?;
        let lead_dir = r.u8()?;
        let trn_veh_no = r.u8()?;
        let veh_orient = r.u8()?;
        let own_op_cst_no = r.u8()?;
        r.skip(2)?;
        Ok(OpVehicle {
            veh_id,
            op_veh_no,
            is_lead,
            lead_dir,
            trn_veh_no,
            veh_orient,
            own_op_cst_no,
        })
    }

    fn write_to(&self, w: &mut WireWriter) {
        w.label(&self.veh_id)
            .u8(self.op_veh_no)
            .u8(self.is_lead)
            .u8(self.lead_dir)
            .u8(self.trn_veh_no)
            .u8(self.veh_orient)
            .u8(self.own_op_cst_no)
            .zeros(2);
    }

    /// Decoded vehicle orientation
    pub fn orientation(&self) -> Orientation {
        Orientation::from(self.veh_orient)
    }
}

/// Operational train directory
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OpTrainDirectory {
    /// Structure version
    pub version: Version,
    /// Identification of the related ETB
    pub etb_id: u8,
    /// Orientation of the operational train
    pub op_trn_orient: u8,
    /// Operational consists, at most `MAX_CST_CNT`
    pub op_cst_list: Vec<OpConsist>,
    /// Operational vehicles, at most `MAX_VEH_CNT`
    pub op_veh_list: Vec<OpVehicle>,
    /// Operational train topology count
    pub op_trn_topo_cnt: u32,
}

impl OpTrainDirectory {
    /// Size with empty lists
    pub const MIN_SIZE: usize = 8 + 4 + 4;

    /// Decode from a buffer holding exactly this record
    pub fn decode(data: &[u8]) -> Result<Self> {
        Self::read_from(&mut WireReader::new(data))
    }

    /// Decode from a reader, leaving it positioned after the record
    pub fn read_from(r: &mut WireReader<'_>) -> Result<Self> {
        r.ensure(Self::MIN_SIZE, "operational train directory")?;
        let version = r.version()?;
        let etb_id = r.u8()?;
        let op_trn_orient = r.u8()?;
        r.skip(3)?;
        let op_cst_cnt = usize::from(r.u8()?);
        if op_cst_cnt > MAX_CST_CNT {
            return Err(TtiError::malformed(format!(
                "Max count of consists of operational dir exceeded ({})",
                op_cst_cnt
            )));
        }
        r.ensure_array(op_cst_cnt, OpConsist::SIZE, "operational consist list")?;
        let op_cst_list = (0..op_cst_cnt)
            .map(|_| OpConsist::read_from(r))
            .collect::<Result<Vec<_>>>()?;

        r.skip(3)?;
        let op_veh_cnt = usize::from(r.u8()?);
        r.ensure_array(op_veh_cnt, OpVehicle::SIZE, "operational vehicle list")?;
        let op_veh_list = (0..op_veh_cnt)
            .map(|_| OpVehicle::read_from(r))
            .collect::<Result<Vec<_>>>()?;

        let op_trn_topo_cnt = r.u32()?;

        Ok(OpTrainDirectory {
            version,
            etb_id,
            op_trn_orient,
            op_cst_list,
            op_veh_list,
            op_trn_topo_cnt,
        })
    }

    /// Append the encoded record
    pub fn write_to(&self, w: &mut WireWriter) {
        w.version(self.version)
            .u8(self.etb_id)
            .u8(self.op_trn_orient)
            .zeros(3)
            .u8(self.op_cst_list.len() as u8);
        for cst in &self.op_cst_list {
            cst.write_to(w);
        }
        w.zeros(3).u8(self.op_veh_list.len() as u8);
        for veh in &self.op_veh_list {
            veh.write_to(w);
        }
        w.u32(self.op_trn_topo_cnt);
    }

    /// Encode into a new buffer
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = WireWriter::new();
        self.write_to(&mut w);
        w.into_vec()
    }

    /// Number of operational consists
    pub fn op_cst_cnt(&self) -> usize {
        self.op_cst_list.len()
    }

    /// Number of operational vehicles
    pub fn op_veh_cnt(&self) -> usize {
        self.op_veh_list.len()
    }

    /// Find the consist with the given train consist number
    pub fn consist_by_trn_cst_no(&self, trn_cst_no: u8) -> Option<&OpConsist> {
        self.op_cst_list.iter().find(|c| c.trn_cst_no == trn_cst_no)
    }

    /// Find the consist with the given UUID
    pub fn consist_by_uuid(&self, uuid: &CstUuid) -> Option<&OpConsist> {
        self.op_cst_list.iter().find(|c| c.cst_uuid == *uuid)
    }

    /// Resolve a consist UUID from a label
    ///
    /// The first vehicle of a consist carries the consist's label, so the
    /// label is matched against vehicle ids and mapped to the owning consist.
    pub fn uuid_for_label(&self, label: &str) -> Option<CstUuid> {
        self.op_veh_list
            .iter()
            .filter(|veh| veh.veh_id.matches(label))
            .find_map(|veh| {
                self.op_cst_list
                    .iter()
                    .find(|cst| cst.op_cst_no == veh.own_op_cst_no)
                    .map(|cst| cst.cst_uuid)
            })
    }
}

/// Entry of the train directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Consist {
    /// Consist UUID
    pub cst_uuid: CstUuid,
    /// Consist topology count, 0 marks an empty entry
    pub cst_topo_cnt: u32,
    /// Train consist number
    pub trn_cst_no: u8,
    /// Raw consist orientation
    pub cst_orient: u8,
}

impl Consist {
    /// Encoded size in bytes
    pub const SIZE: usize = 24;

    fn read_from(r: &mut WireReader<'_>) -> Result<Self> {
        let cst_uuid = r.uuid()?;
        let cst_topo_cnt = r.u32()?;
        let trn_cst_no = r.u8()?;
        let cst_orient = r.u8()?;
        r.skip(2)?;
        Ok(Consist {
            cst_uuid,
            cst_topo_cnt,
            trn_cst_no,
            cst_orient,
        })
    }

    fn write_to(&self, w: &mut WireWriter) {
        w.uuid(&self.cst_uuid)
            .u32(self.cst_topo_cnt)
            .u8(self.trn_cst_no)
            .u8(self.cst_orient)
            .zeros(2);
    }
}

/// Train directory (physical consists)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrainDirectory {
    /// Structure version
    pub version: Version,
    /// Identification of the related ETB
    pub etb_id: u8,
    /// Consists, at most `MAX_CST_CNT`
    pub cst_list: Vec<Consist>,
    /// Train topology count
    pub trn_topo_cnt: u32,
}

impl TrainDirectory {
    /// Size with an empty list
    pub const MIN_SIZE: usize = 4 + 4;

    /// Decode from a buffer holding exactly this record
    pub fn decode(data: &[u8]) -> Result<Self> {
        Self::read_from(&mut WireReader::new(data))
    }

    /// Decode from a reader, leaving it positioned after the record
    pub fn read_from(r: &mut WireReader<'_>) -> Result<Self> {
        r.ensure(Self::MIN_SIZE, "train directory")?;
        let version = r.version()?;
        let etb_id = r.u8()?;
        let cst_cnt = usize::from(r.u8()?);
        if cst_cnt > MAX_CST_CNT {
            return Err(TtiError::malformed(format!(
                "Max count of consists of train dir exceeded ({})",
                cst_cnt
            )));
        }
        r.ensure_array(cst_cnt, Consist::SIZE, "consist list")?;
        let cst_list = (0..cst_cnt)
            .map(|_| Consist::read_from(r))
            .collect::<Result<Vec<_>>>()?;
        let trn_topo_cnt = r.u32()?;

        Ok(TrainDirectory {
            version,
            etb_id,
            cst_list,
            trn_topo_cnt,
        })
    }

    /// Append the encoded record
    pub fn write_to(&self, w: &mut WireWriter) {
        w.version(self.version)
            .u8(self.etb_id)
            .u8(self.cst_list.len() as u8);
        for cst in &self.cst_list {
            cst.write_to(w);
        }
        w.u32(self.trn_topo_cnt);
    }

    /// Encode into a new buffer
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = WireWriter::new();
        self.write_to(&mut w);
        w.into_vec()
    }

    /// Number of consists
    pub fn cst_cnt(&self) -> usize {
        self.cst_list.len()
    }
}

/// Entry of the train network directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrainNetDirEntry {
    /// Consist UUID
    pub cst_uuid: CstUuid,
    /// Consist network properties
    pub cst_net_prop: u32,
}

impl TrainNetDirEntry {
    /// Encoded size in bytes
    pub const SIZE: usize = 20;
}

/// Train network directory
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrainNetworkDirectory {
    /// Entries, at most `MAX_CST_CNT`
    pub entries: Vec<TrainNetDirEntry>,
    /// ETB topology count
    pub etb_topo_cnt: u32,
}

impl TrainNetworkDirectory {
    /// Size with an empty list
    pub const MIN_SIZE: usize = 4 + 4;

    /// Decode from a buffer holding exactly this record
    pub fn decode(data: &[u8]) -> Result<Self> {
        Self::read_from(&mut WireReader::new(data))
    }

    /// Decode from a reader, leaving it positioned after the record
    pub fn read_from(r: &mut WireReader<'_>) -> Result<Self> {
        r.ensure(Self::MIN_SIZE, "train network directory")?;
        r.skip(2)?;
        let entry_cnt = usize::from(r.u16()?);
        if entry_cnt > MAX_CST_CNT {
            return Err(TtiError::malformed(format!(
                "Max count of consists of train net dir exceeded ({})",
                entry_cnt
            )));
        }
        r.ensure_array(entry_cnt, TrainNetDirEntry::SIZE, "network directory entries")?;
        let entries = (0..entry_cnt)
            .map(|_| {
                Ok(TrainNetDirEntry {
                    cst_uuid: r.uuid()?,
                    cst_net_prop: r.u32()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let etb_topo_cnt = r.u32()?;

        Ok(TrainNetworkDirectory {
            entries,
            etb_topo_cnt,
        })
    }

    /// Append the encoded record
    pub fn write_to(&self, w: &mut WireWriter) {
        w.zeros(2).u16(self.entries.len() as u16);
        for entry in &self.entries {
            w.uuid(&entry.cst_uuid).u32(entry.cst_net_prop);
        }
        w.u32(self.etb_topo_cnt);
    }

    /// Encode into a new buffer
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = WireWriter::new();
        self.write_to(&mut w);
        w.into_vec()
    }

    /// Number of entries
    pub fn entry_cnt(&self) -> usize {
        self.entries.len()
    }
}

/// Aggregate reply to a read-complete request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReadCompleteReply {
    /// Operational train state
    pub state: OpTrainDirState,
    /// Operational train directory
    pub op_trn_dir: OpTrainDirectory,
    /// Train directory
    pub trn_dir: TrainDirectory,
    /// Train network directory
    pub trn_net_dir: TrainNetworkDirectory,
}

impl ReadCompleteReply {
    /// Decode and check both the payload CRC and the state block CRC
    pub fn decode(data: &[u8]) -> Result<Self> {
        let body = verify_trailing_crc(data)?;
        let mut r = WireReader::new(body);
        let state = OpTrainDirState::read_from(&mut r)?;
        let op_trn_dir = OpTrainDirectory::read_from(&mut r)?;
        let trn_dir = TrainDirectory::read_from(&mut r)?;
        let trn_net_dir = TrainNetworkDirectory::read_from(&mut r)?;
        Ok(ReadCompleteReply {
            state,
            op_trn_dir,
            trn_dir,
            trn_net_dir,
        })
    }

    /// Encode with a trailing payload CRC
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = WireWriter::new();
        self.state.write_to(&mut w);
        self.op_trn_dir.write_to(&mut w);
        self.trn_dir.write_to(&mut w);
        self.trn_net_dir.write_to(&mut w);
        w.crc_from(0);
        w.into_vec()
    }
}
