//! Request engine: on-demand refresh of topology artifacts
//!
//! Fire-and-forget. Replies arrive later through the dispatcher; a lost
//! reply is recovered by the next stale query issuing the request again.

use crate::config::TtiConfig;
use crate::core::{CstUuid, TopoCountKind};
use crate::error::Result;
use crate::iec61375::com_id;
use crate::transport::{MdRequest, MessagingSession};
use log::{debug, warn};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Topology artifact that can be requested from the ECSP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArtifactKind {
    /// Operational train directory
    OpTrainDir,
    /// Train directory
    TrainDir,
    /// Train network directory
    NetDir,
    /// State plus all three directories at once
    ReadComplete,
    /// Static info of one consist
    StaticConsistInfo,
}

impl ArtifactKind {
    /// ComId of the request
    pub fn request_com_id(&self) -> u32 {
        match self {
            ArtifactKind::OpTrainDir => com_id::OP_DIR_INFO_REQ,
            ArtifactKind::TrainDir => com_id::TRN_DIR_REQ,
            ArtifactKind::NetDir => com_id::NET_DIR_REQ,
            ArtifactKind::ReadComplete => com_id::READ_CMPLT_REQ,
            ArtifactKind::StaticConsistInfo => com_id::STAT_CST_REQ,
        }
    }

    /// ComId of the expected reply
    pub fn reply_com_id(&self) -> u32 {
        match self {
            ArtifactKind::OpTrainDir => com_id::OP_DIR_INFO_REP,
            ArtifactKind::TrainDir => com_id::TRN_DIR_REP,
            ArtifactKind::NetDir => com_id::NET_DIR_REP,
            ArtifactKind::ReadComplete => com_id::READ_CMPLT_REP,
            ArtifactKind::StaticConsistInfo => com_id::STAT_CST_REP,
        }
    }

    /// Artifact answered by a reply comId
    pub fn from_reply_com_id(id: u32) -> Option<Self> {
        match id {
            com_id::OP_DIR_INFO_REP => Some(ArtifactKind::OpTrainDir),
            com_id::TRN_DIR_REP => Some(ArtifactKind::TrainDir),
            com_id::NET_DIR_REP => Some(ArtifactKind::NetDir),
            com_id::READ_CMPLT_REP => Some(ArtifactKind::ReadComplete),
            com_id::STAT_CST_REP => Some(ArtifactKind::StaticConsistInfo),
            _ => None,
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::OpTrainDir => write!(f, "operational train directory"),
            ArtifactKind::TrainDir => write!(f, "train directory"),
            ArtifactKind::NetDir => write!(f, "train network directory"),
            ArtifactKind::ReadComplete => write!(f, "complete TTDB"),
            ArtifactKind::StaticConsistInfo => write!(f, "static consist info"),
        }
    }
}

/// Issues TTDB requests through the messaging session
#[derive(Debug, Clone)]
pub struct RequestEngine {
    dest_uri: String,
    reply_timeout: Duration,
    holdoff: Option<Duration>,
    last_issued: HashMap<(ArtifactKind, Option<CstUuid>), Instant>,
    issued: u64,
}

impl RequestEngine {
    /// Create an engine from the session configuration
    pub fn new(config: &TtiConfig) -> Self {
        RequestEngine {
            dest_uri: config.ecsp_uri.clone(),
            reply_timeout: config.reply_timeout,
            holdoff: config.request_holdoff,
            last_issued: HashMap::new(),
            issued: 0,
        }
    }

    /// Number of requests handed to the session so far
    pub fn issued(&self) -> u64 {
        self.issued
    }

    /// Build the request for an artifact
    pub fn build_request<S: MessagingSession + ?Sized>(
        &self,
        session: &S,
        kind: ArtifactKind,
        uuid: Option<&CstUuid>,
    ) -> MdRequest {
        let payload = match kind {
            ArtifactKind::StaticConsistInfo => uuid.copied().unwrap_or(CstUuid::NIL).0.to_vec(),
            // ETB 0
            _ => vec![0u8],
        };
        MdRequest {
            com_id: kind.request_com_id(),
            etb_topo_cnt: session.topo_count(TopoCountKind::Etb),
            op_trn_topo_cnt: session.topo_count(TopoCountKind::OpTrain),
            dest_uri: self.dest_uri.clone(),
            reply_com_id: kind.reply_com_id(),
            timeout: self.reply_timeout,
            payload,
        }
    }

    /// Issue one request and flush it with a processing cycle
    ///
    /// Returns `false` when the request was suppressed by the hold-off.
    pub fn request<S: MessagingSession + ?Sized>(
        &mut self,
        session: &mut S,
        kind: ArtifactKind,
        uuid: Option<&CstUuid>,
    ) -> Result<bool> {
        let key = (kind, uuid.copied());
        if let Some(holdoff) = self.holdoff {
            // replies that never arrived must not pin entries forever
            self.last_issued.retain(|_, at| at.elapsed() < holdoff);
            if self.last_issued.contains_key(&key) {
                debug!("Suppressed repeated request for {}", kind);
                return Ok(false);
            }
        }

        let request = self.build_request(session, kind, uuid);
        debug!(
            "Requesting {} (comId {}) from {}",
            kind, request.com_id, request.dest_uri
        );
        if let Err(err) = session.request(&request) {
            warn!("Request for {} failed: {}", kind, err);
            return Err(err);
        }
        self.issued += 1;
        if self.holdoff.is_some() {
            self.last_issued.insert(key, Instant::now());
        }

        if let Err(err) = session.drive_one_cycle() {
            warn!("Processing cycle after {} request failed: {}", kind, err);
            return Err(err);
        }
        Ok(true)
    }

    /// Lift the hold-off for an artifact once its reply arrived
    ///
    /// Static consist info replies only release the request for their own
    /// UUID, directory replies pass `None`.
    pub fn reply_received(&mut self, kind: ArtifactKind, uuid: Option<&CstUuid>) {
        self.last_issued.remove(&(kind, uuid.copied()));
    }

    /// Number of requests currently held off
    pub fn pending(&self) -> usize {
        self.last_issued.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{uuid, FakeSession};

    #[test]
    fn test_request_and_flush() -> Result<()> {
        let mut session = FakeSession::default();
        session.counters.etb = 5;
        let mut engine = RequestEngine::new(&TtiConfig::default());

        assert!(engine.request(&mut session, ArtifactKind::TrainDir, None)?);
        assert_eq!(session.requests.len(), 1);
        assert_eq!(session.cycles, 1);
        let req = &session.requests[0];
        assert_eq!(req.com_id, com_id::TRN_DIR_REQ);
        assert_eq!(req.reply_com_id, com_id::TRN_DIR_REP);
        assert_eq!(req.etb_topo_cnt, 5);
        assert_eq!(req.payload, vec![0]);
        assert_eq!(req.timeout, Duration::from_secs(3));
        Ok(())
    }

    #[test]
    fn test_consist_request_carries_uuid() -> Result<()> {
        let mut session = FakeSession::default();
        let mut engine = RequestEngine::new(&TtiConfig::default());
        engine.request(&mut session, ArtifactKind::StaticConsistInfo, Some(&uuid(3)))?;
        assert_eq!(session.requests[0].payload, uuid(3).0.to_vec());
        assert_eq!(session.requests[0].com_id, com_id::STAT_CST_REQ);
        Ok(())
    }

    #[test]
    fn test_every_call_requests_without_holdoff() -> Result<()> {
        let mut session = FakeSession::default();
        let mut engine = RequestEngine::new(&TtiConfig::default());
        for _ in 0..3 {
            assert!(engine.request(&mut session, ArtifactKind::OpTrainDir, None)?);
        }
        assert_eq!(session.requests.len(), 3);
        Ok(())
    }

    #[test]
    fn test_holdoff_suppresses_storms() -> Result<()> {
        let mut session = FakeSession::default();
        let config = TtiConfig::builder()
            .with_request_holdoff(Duration::from_secs(60))
            .build();
        let mut engine = RequestEngine::new(&config);

        assert!(engine.request(&mut session, ArtifactKind::OpTrainDir, None)?);
        assert!(!engine.request(&mut session, ArtifactKind::OpTrainDir, None)?);
        // a different artifact is not affected
        assert!(engine.request(&mut session, ArtifactKind::TrainDir, None)?);
        engine.reply_received(ArtifactKind::OpTrainDir, None);
        assert!(engine.request(&mut session, ArtifactKind::OpTrainDir, None)?);
        assert_eq!(engine.issued(), 3);
        Ok(())
    }

    #[test]
    fn test_consist_reply_releases_only_its_uuid() -> Result<()> {
        let mut session = FakeSession::default();
        let config = TtiConfig::builder()
            .with_request_holdoff(Duration::from_secs(60))
            .build();
        let mut engine = RequestEngine::new(&config);
        let kind = ArtifactKind::StaticConsistInfo;
        assert!(engine.request(&mut session, kind, Some(&uuid(1)))?);
        assert!(engine.request(&mut session, kind, Some(&uuid(2)))?);

        engine.reply_received(kind, Some(&uuid(1)));
        assert!(engine.request(&mut session, kind, Some(&uuid(1)))?);
        // uuid 2 is still waiting for its reply
        assert!(!engine.request(&mut session, kind, Some(&uuid(2)))?);
        assert_eq!(session.requests_for(com_id::STAT_CST_REQ).len(), 3);
        Ok(())
    }

    #[test]
    fn test_expired_holdoff_entries_are_pruned() -> Result<()> {
        let mut session = FakeSession::default();
        let config = TtiConfig::builder()
            .with_request_holdoff(Duration::from_millis(1))
            .build();
        let mut engine = RequestEngine::new(&config);
        for n in 1..=4 {
            engine.request(&mut session, ArtifactKind::StaticConsistInfo, Some(&uuid(n)))?;
        }
        assert!(engine.pending() >= 1);
        std::thread::sleep(Duration::from_millis(5));
        assert!(engine.request(&mut session, ArtifactKind::TrainDir, None)?);
        assert_eq!(engine.pending(), 1);
        Ok(())
    }

    #[test]
    fn test_failed_request_is_reported() {
        let mut session = FakeSession {
            fail_requests: true,
            ..FakeSession::default()
        };
        let mut engine = RequestEngine::new(&TtiConfig::default());
        assert!(engine.request(&mut session, ArtifactKind::NetDir, None).is_err());
        assert_eq!(engine.issued(), 0);
        assert_eq!(session.cycles, 0);
    }

    #[test]
    fn test_failed_cycle_is_reported() {
        let mut session = FakeSession {
            fail_cycles: true,
            ..FakeSession::default()
        };
        let mut engine = RequestEngine::new(&TtiConfig::default());
        assert!(engine.request(&mut session, ArtifactKind::OpTrainDir, None).is_err());
        // the request itself went out
        assert_eq!(session.requests.len(), 1);
        assert_eq!(engine.issued(), 1);
    }

    #[test]
    fn test_reply_com_id_mapping() {
        for kind in [
            ArtifactKind::OpTrainDir,
            ArtifactKind::TrainDir,
            ArtifactKind::NetDir,
            ArtifactKind::ReadComplete,
            ArtifactKind::StaticConsistInfo,
        ] {
            assert_eq!(ArtifactKind::from_reply_com_id(kind.reply_com_id()), Some(kind));
        }
        assert_eq!(ArtifactKind::from_reply_com_id(com_id::OP_DIR_INFO), None);
    }
}
