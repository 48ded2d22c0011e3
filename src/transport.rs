//! Interfaces consumed from the TRDP messaging session
//!
//! The TTI subsystem never opens sockets or spawns threads. It registers
//! with a [`MessagingSession`], issues requests through it, and is driven
//! by the embedding application forwarding received telegrams to
//! [`crate::EventHandler`].

use crate::core::TopoCountKind;
use crate::error::Result;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Process-wide topology counters owned by the session
pub trait TopoCounters {
    /// Current value of a counter
    fn topo_count(&self, kind: TopoCountKind) -> u32;

    /// Overwrite a counter
    fn set_topo_count(&mut self, kind: TopoCountKind, value: u32);
}

/// Plain in-memory counters for sessions without their own storage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalCounters {
    /// ETB topology count
    pub etb: u32,
    /// Operational train topology count
    pub op_train: u32,
}

impl TopoCounters for LocalCounters {
    fn topo_count(&self, kind: TopoCountKind) -> u32 {
        match kind {
            TopoCountKind::Etb => self.etb,
            TopoCountKind::OpTrain => self.op_train,
        }
    }

    fn set_topo_count(&mut self, kind: TopoCountKind, value: u32) {
        match kind {
            TopoCountKind::Etb => self.etb = value,
            TopoCountKind::OpTrain => self.op_train = value,
        }
    }
}

/// Handle of a process data subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub u64);

/// Handle of a message data listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(pub u64);

/// What the session does with the received data when a subscription times out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPolicy {
    /// Zero the buffer and report the timeout
    SetToZero,
    /// Keep the last received data and report the timeout
    KeepLast,
}

/// Process data subscription parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdSubscription {
    /// Communication identifier
    pub com_id: u32,
    /// Only accept telegrams from this source
    pub src_filter: Option<Ipv4Addr>,
    /// Destination (multicast group) to join
    pub dest: Ipv4Addr,
    /// Receive timeout
    pub timeout: Duration,
    /// Behaviour on timeout
    pub timeout_policy: TimeoutPolicy,
}

/// Message data listener parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdListener {
    /// Communication identifier
    pub com_id: u32,
    /// Only accept messages from this source
    pub src_filter: Option<Ipv4Addr>,
    /// Destination (multicast group) to listen on
    pub dest: Ipv4Addr,
}

/// Message data request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdRequest {
    /// Communication identifier of the request
    pub com_id: u32,
    /// ETB topology count to send with the request
    pub etb_topo_cnt: u32,
    /// Operational train topology count to send with the request
    pub op_trn_topo_cnt: u32,
    /// Destination URI, resolved by the session
    pub dest_uri: String,
    /// Expected reply communication identifier
    pub reply_com_id: u32,
    /// Reply timeout
    pub timeout: Duration,
    /// Request payload
    pub payload: Vec<u8>,
}

/// Outcome attached to a delivered telegram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    /// Data received
    Ok,
    /// Nothing received within the timeout
    Timeout,
    /// Any other session error code
    Other(i32),
}

/// Header information of a delivered process data telegram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdInfo {
    /// Communication identifier
    pub com_id: u32,
    /// Source address
    pub src_addr: Ipv4Addr,
    /// Destination address (multicast group)
    pub dest_addr: Ipv4Addr,
    /// Delivery outcome
    pub result: ResultCode,
}

/// Header information of a delivered message data telegram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MdInfo {
    /// Communication identifier
    pub com_id: u32,
    /// Source address
    pub src_addr: Ipv4Addr,
    /// Destination address
    pub dest_addr: Ipv4Addr,
    /// Delivery outcome
    pub result: ResultCode,
}

/// Opaque TRDP session as seen by the TTI subsystem
pub trait MessagingSession: TopoCounters {
    /// Subscribe to cyclic process data
    fn subscribe(&mut self, sub: &PdSubscription) -> Result<SubscriptionHandle>;

    /// Drop a subscription
    fn unsubscribe(&mut self, handle: SubscriptionHandle) -> Result<()>;

    /// Listen for message data notifications
    fn add_listener(&mut self, listener: &MdListener) -> Result<ListenerHandle>;

    /// Drop a listener
    fn remove_listener(&mut self, handle: ListenerHandle) -> Result<()>;

    /// Send a request; the reply, if any, is delivered later
    fn request(&mut self, request: &MdRequest) -> Result<()>;

    /// Run one processing cycle, returning the recommended wait interval
    fn drive_one_cycle(&mut self) -> Result<Duration>;
}

impl<T: TopoCounters + ?Sized> TopoCounters for &mut T {
    fn topo_count(&self, kind: TopoCountKind) -> u32 {
        (**self).topo_count(kind)
    }

    fn set_topo_count(&mut self, kind: TopoCountKind, value: u32) {
        (**self).set_topo_count(kind, value)
    }
}

/// Lets a TTI handle borrow a session that the application keeps owning
impl<T: MessagingSession + ?Sized> MessagingSession for &mut T {
    fn subscribe(&mut self, sub: &PdSubscription) -> Result<SubscriptionHandle> {
        (**self).subscribe(sub)
    }

    fn unsubscribe(&mut self, handle: SubscriptionHandle) -> Result<()> {
        (**self).unsubscribe(handle)
    }

    fn add_listener(&mut self, listener: &MdListener) -> Result<ListenerHandle> {
        (**self).add_listener(listener)
    }

    fn remove_listener(&mut self, handle: ListenerHandle) -> Result<()> {
        (**self).remove_listener(handle)
    }

    fn request(&mut self, request: &MdRequest) -> Result<()> {
        (**self).request(request)
    }

    fn drive_one_cycle(&mut self) -> Result<Duration> {
        (**self).drive_one_cycle()
    }
}

/// Synchronisation primitive fired when a topology count changed
pub trait TopologySignal {
    /// Wake up whoever waits for a new inauguration
    fn give(&self);
}

impl<F: Fn()> TopologySignal for F {
    fn give(&self) {
        self()
    }
}

impl TopologySignal for std::sync::mpsc::Sender<()> {
    fn give(&self) {
        // a dropped receiver simply is not interested any more
        let _ = self.send(());
    }
}
