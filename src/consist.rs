//! Variable-length static consist info record
//!
//! A fixed header is followed by four independently sized arrays (ETB,
//! vehicle, function and closed train consist info). Each count is read
//! from the wire before its elements; the whole record fails on the first
//! overrun or allocation failure, dropping whatever was decoded so far.

use crate::core::{CstUuid, Label, Version};
use crate::encoding::{crc32, WireReader, WireWriter};
use crate::error::{Result, TtiError};

/// ETB the consist is connected to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EtbInfo {
    /// ETB identifier
    pub etb_id: u8,
    /// Number of consist networks connected to this ETB
    pub cn_cnt: u8,
}

impl EtbInfo {
    /// Encoded size in bytes
    pub const SIZE: usize = 4;
}

/// Opaque property block (only carried for vehicles)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Properties {
    /// Property structure version
    pub version: Version,
    /// Raw property bytes
    pub data: Vec<u8>,
}

/// Static vehicle info
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VehicleInfo {
    /// Vehicle label
    pub veh_id: Label,
    /// Vehicle type
    pub veh_type: Label,
    /// Raw orientation within the consist
    pub veh_orient: u8,
    /// Sequence number of the vehicle in the consist (1-based)
    pub cst_veh_no: u8,
    /// Traction vehicle flag
    pub tract_veh: u8,
    /// Vehicle properties
    pub veh_prop: Properties,
}

impl VehicleInfo {
    /// Size with an empty property block
    pub const MIN_SIZE: usize = 16 + 16 + 4 + 4;
}

/// Function (device group) hosted by the consist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FunctionInfo {
    /// Function name
    pub fct_name: Label,
    /// Host part of the function address
    pub fct_id: u16,
    /// Function group flag
    pub grp: u8,
    /// Vehicle the function lives in (1-based)
    pub cst_veh_no: u8,
    /// ETB identifier
    pub etb_id: u8,
    /// Consist network identifier
    pub cn_id: u8,
}

impl FunctionInfo {
    /// Encoded size in bytes
    pub const SIZE: usize = 24;
}

/// Member of a closed train composition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CltrCstInfo {
    /// UUID of the member consist
    pub cltr_cst_uuid: CstUuid,
    /// Raw orientation of the member consist
    pub cltr_cst_orient: u8,
    /// Sequence number within the closed train
    pub cltr_cst_no: u8,
}

impl CltrCstInfo {
    /// Encoded size in bytes
    pub const SIZE: usize = 20;
}

/// Decoded static consist info
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConsistInfo {
    /// Structure version
    pub version: Version,
    /// Consist class
    pub cst_class: u8,
    /// Consist label (UIC identifier)
    pub cst_id: Label,
    /// Consist type
    pub cst_type: Label,
    /// Consist owner
    pub cst_owner: Label,
    /// Consist UUID
    pub cst_uuid: CstUuid,
    /// Version of the (discarded) consist property block
    pub cst_prop_version: Version,
    /// Connected ETBs
    pub etb_info_list: Vec<EtbInfo>,
    /// Vehicles
    pub veh_info_list: Vec<VehicleInfo>,
    /// Functions
    pub fct_info_list: Vec<FunctionInfo>,
    /// Closed train composition
    pub cltr_cst_info_list: Vec<CltrCstInfo>,
    /// Consist topology count (safety code over the record)
    pub cst_topo_cnt: u32,
}

/// Read an array count and allocate exactly that many slots
fn reserve_list<T>(r: &WireReader<'_>, count: usize, elem_size: usize, what: &str) -> Result<Vec<T>> {
    r.ensure_array(count, elem_size, what)?;
    let mut list = Vec::new();
    list.try_reserve_exact(count)?;
    Ok(list)
}

impl ConsistInfo {
    /// Size of a record with empty arrays and no properties
    pub const MIN_SIZE: usize = 96;

    /// Decode a consist info record
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = WireReader::new(data);
        r.ensure(Self::MIN_SIZE, "consist info")?;

        let version = r.version()?;
        let cst_class = r.u8()?;
        r.skip(1)?;
        let cst_id = r.label()?;
        let cst_type = r.label()?;
        let cst_owner = r.label()?;
        let cst_uuid = r.uuid()?;
        r.skip(4)?;

        // consist properties are not supported, but their length is honoured
        let cst_prop_version = r.version()?;
        let cst_prop_len = usize::from(r.u16()?);
        r.ensure(cst_prop_len, "consist properties")?;
        r.skip(cst_prop_len)?;
        r.skip(2)?;

        let etb_cnt = usize::from(r.u16()?);
        let mut etb_info_list = reserve_list(&r, etb_cnt, EtbInfo::SIZE, "ETB info list")?;
        for _ in 0..etb_cnt {
            let etb_id = r.u8()?;
            let cn_cnt = r.u8()?;
            r.skip(2)?;
            etb_info_list.push(EtbInfo { etb_id, cn_cnt });
        }
        r.skip(2)?;

        let veh_cnt = usize::from(r.u16()?);
        let mut veh_info_list = reserve_list(&r, veh_cnt, VehicleInfo::MIN_SIZE, "vehicle info list")?;
        for _ in 0..veh_cnt {
            let veh_id = r.label()?;
            let veh_type = r.label()?;
            let veh_orient = r.u8()?;
            let cst_veh_no = r.u8()?;
            let tract_veh = r.u8()?;
            r.skip(1)?;
            let prop_version = r.version()?;
            let prop_len = usize::from(r.u16()?);
            let mut prop = Vec::new();
            prop.try_reserve_exact(prop_len)?;
            prop.extend_from_slice(r.bytes(prop_len)?);
            veh_info_list.push(VehicleInfo {
                veh_id,
                veh_type,
                veh_orient,
                cst_veh_no,
                tract_veh,
                veh_prop: Properties {
                    version: prop_version,
                    data: prop,
                },
            });
        }
        r.skip(2)?;

        let fct_cnt = usize::from(r.u16()?);
        let mut fct_info_list = reserve_list(&r, fct_cnt, FunctionInfo::SIZE, "function info list")?;
        for _ in 0..fct_cnt {
            let fct_name = r.label()?;
            let fct_id = r.u16()?;
            let grp = r.u8()?;
            r.skip(1)?;
            let cst_veh_no = r.u8()?;
            let etb_id = r.u8()?;
            let cn_id = r.u8()?;
            r.skip(1)?;
            fct_info_list.push(FunctionInfo {
                fct_name,
                fct_id,
                grp,
                cst_veh_no,
                etb_id,
                cn_id,
            });
        }
        r.skip(2)?;

        let cltr_cst_cnt = usize::from(r.u16()?);
        let mut cltr_cst_info_list =
            reserve_list(&r, cltr_cst_cnt, CltrCstInfo::SIZE, "closed train consist list")?;
        for _ in 0..cltr_cst_cnt {
            let cltr_cst_uuid = r.uuid()?;
            let cltr_cst_orient = r.u8()?;
            let cltr_cst_no = r.u8()?;
            r.skip(2)?;
            cltr_cst_info_list.push(CltrCstInfo {
                cltr_cst_uuid,
                cltr_cst_orient,
                cltr_cst_no,
            });
        }

        let cst_topo_cnt = r.u32()?;

        Ok(ConsistInfo {
            version,
            cst_class,
            cst_id,
            cst_type,
            cst_owner,
            cst_uuid,
            cst_prop_version,
            etb_info_list,
            veh_info_list,
            fct_info_list,
            cltr_cst_info_list,
            cst_topo_cnt,
        })
    }

    /// Check the trailing safety code of a static consist info reply, then decode it
    pub fn decode_verified(payload: &[u8]) -> Result<Self> {
        if payload.len() < Self::MIN_SIZE {
            return Err(TtiError::malformed(format!(
                "Consist info of {} bytes is shorter than {}",
                payload.len(),
                Self::MIN_SIZE
            )));
        }
        let (body, tail) = payload.split_at(payload.len() - 4);
        let expected = u32::from_be_bytes([tail[0], tail[1], tail[2], tail[3]]);
        let computed = Self::safety_code(body);
        if computed != expected {
            return Err(TtiError::checksum(expected, computed));
        }
        Self::decode(payload)
    }

    /// Safety code over a record body; 0 is reserved for "invalid"
    pub fn safety_code(body: &[u8]) -> u32 {
        match crc32(body) {
            0 => 0xFFFF_FFFF,
            crc => crc,
        }
    }

    /// Encode, sealing the record with a freshly computed topology count
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = WireWriter::new();
        w.version(self.version)
            .u8(self.cst_class)
            .zeros(1)
            .label(&self.cst_id)
            .label(&self.cst_type)
            .label(&self.cst_owner)
            .uuid(&self.cst_uuid)
            .zeros(4)
            .version(self.cst_prop_version)
            .u16(0)
            .zeros(2);

        w.u16(self.etb_info_list.len() as u16);
        for etb in &self.etb_info_list {
            w.u8(etb.etb_id).u8(etb.cn_cnt).zeros(2);
        }
        w.zeros(2).u16(self.veh_info_list.len() as u16);
        for veh in &self.veh_info_list {
            w.label(&veh.veh_id)
                .label(&veh.veh_type)
                .u8(veh.veh_orient)
                .u8(veh.cst_veh_no)
                .u8(veh.tract_veh)
                .zeros(1)
                .version(veh.veh_prop.version)
                .u16(veh.veh_prop.data.len() as u16)
                .bytes(&veh.veh_prop.data);
        }
        w.zeros(2).u16(self.fct_info_list.len() as u16);
        for fct in &self.fct_info_list {
            w.label(&fct.fct_name)
                .u16(fct.fct_id)
                .u8(fct.grp)
                .zeros(1)
                .u8(fct.cst_veh_no)
                .u8(fct.etb_id)
                .u8(fct.cn_id)
                .zeros(1);
        }
        w.zeros(2).u16(self.cltr_cst_info_list.len() as u16);
        for cltr in &self.cltr_cst_info_list {
            w.uuid(&cltr.cltr_cst_uuid)
                .u8(cltr.cltr_cst_orient)
                .u8(cltr.cltr_cst_no)
                .zeros(2);
        }

        let code = Self::safety_code(w.as_slice());
        w.u32(code);
        w.into_vec()
    }

    /// Number of ETBs
    pub fn etb_cnt(&self) -> usize {
        self.etb_info_list.len()
    }

    /// Number of vehicles
    pub fn veh_cnt(&self) -> usize {
        self.veh_info_list.len()
    }

    /// Number of functions
    pub fn fct_cnt(&self) -> usize {
        self.fct_info_list.len()
    }

    /// Find a vehicle by label (case-insensitive)
    pub fn vehicle_by_label(&self, label: &str) -> Option<&VehicleInfo> {
        self.veh_info_list.iter().find(|veh| veh.veh_id.matches(label))
    }

    /// Find a function by its id
    pub fn function_by_id(&self, fct_id: u16) -> Option<&FunctionInfo> {
        self.fct_info_list.iter().find(|fct| fct.fct_id == fct_id)
    }

    /// Vehicle with the given 1-based sequence number
    pub fn vehicle_by_no(&self, cst_veh_no: u8) -> Option<&VehicleInfo> {
        usize::from(cst_veh_no)
            .checked_sub(1)
            .and_then(|idx| self.veh_info_list.get(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{consist_info, uuid};

    #[test]
    fn test_decode_full_record() -> Result<()> {
        let info = consist_info(uuid(4), "CST4", 3, 2);
        let bytes = info.to_bytes();
        let decoded = ConsistInfo::decode_verified(&bytes)?;
        assert_eq!(decoded.cst_uuid, uuid(4));
        assert!(decoded.cst_id.matches("cst4"));
        assert_eq!(decoded.veh_cnt(), 3);
        assert_eq!(decoded.fct_cnt(), 2);
        assert_eq!(decoded.etb_cnt(), 1);
        assert_eq!(decoded.cltr_cst_info_list.len(), 1);
        assert_eq!(decoded.veh_info_list[1].veh_prop.data, vec![0xA5, 0x5A]);
        assert_eq!(decoded.cst_topo_cnt, ConsistInfo::safety_code(&bytes[..bytes.len() - 4]));
        Ok(())
    }

    #[test]
    fn test_empty_record_has_min_size() -> Result<()> {
        let info = ConsistInfo {
            cst_uuid: uuid(9),
            ..ConsistInfo::default()
        };
        let bytes = info.to_bytes();
        assert_eq!(bytes.len(), ConsistInfo::MIN_SIZE);
        assert_eq!(ConsistInfo::decode_verified(&bytes)?.veh_cnt(), 0);
        Ok(())
    }

    #[test]
    fn test_idempotent_decode() -> Result<()> {
        let bytes = consist_info(uuid(1), "A", 2, 1).to_bytes();
        assert_eq!(ConsistInfo::decode(&bytes)?, ConsistInfo::decode(&bytes)?);
        Ok(())
    }

    #[test]
    fn test_consist_properties_are_skipped() -> Result<()> {
        let bytes = consist_info(uuid(2), "B", 1, 0).to_bytes();
        // splice a 3 byte property block behind the cstProp length field
        let len_at = 2 + 2 + 48 + 16 + 4 + 2;
        let mut spliced = bytes[..len_at].to_vec();
        spliced.extend_from_slice(&3u16.to_be_bytes());
        spliced.extend_from_slice(&[1, 2, 3]);
        spliced.extend_from_slice(&bytes[len_at + 2..]);
        let decoded = ConsistInfo::decode(&spliced)?;
        assert_eq!(decoded.veh_cnt(), 1);
        assert_eq!(decoded.cst_uuid, uuid(2));
        Ok(())
    }

    #[test]
    fn test_checksum_gate() {
        let bytes = consist_info(uuid(5), "C", 2, 2).to_bytes();
        for byte in [0, 20, 70, bytes.len() / 2, bytes.len() - 5] {
            let mut corrupted = bytes.clone();
            corrupted[byte] ^= 0x04;
            assert!(matches!(
                ConsistInfo::decode_verified(&corrupted),
                Err(TtiError::Checksum { .. })
            ));
        }
    }

    #[test]
    fn test_array_overrun_is_malformed() {
        let bytes = consist_info(uuid(6), "D", 1, 0).to_bytes();
        // bump the ETB count far beyond the buffer
        let etb_cnt_at = 2 + 2 + 48 + 16 + 4 + 4 + 2;
        let mut corrupted = bytes.clone();
        corrupted[etb_cnt_at..etb_cnt_at + 2].copy_from_slice(&0xFFFFu16.to_be_bytes());
        assert!(matches!(
            ConsistInfo::decode(&corrupted),
            Err(TtiError::Malformed(_))
        ));
        assert!(matches!(
            ConsistInfo::decode(&bytes[..ConsistInfo::MIN_SIZE - 1]),
            Err(TtiError::Malformed(_))
        ));
    }

    #[test]
    fn test_lookup_helpers() {
        let info = consist_info(uuid(7), "E", 3, 2);
        assert!(info.vehicle_by_label("e-veh2").is_some());
        assert_eq!(info.vehicle_by_no(1).map(|v| v.cst_veh_no), Some(1));
        assert!(info.vehicle_by_no(0).is_none());
        assert_eq!(info.function_by_id(0x101).map(|f| f.cst_veh_no), Some(2));
    }
}
